//! Job models and state management for conversion requests.

use crate::error::ConversionError;
use crate::format::{output_file_name, Format};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A file as received from the client.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub content: Vec<u8>,
    /// Source format token supplied by the client, if any.
    pub declared_format: Option<String>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            declared_format: None,
        }
    }

    pub fn with_declared_format(mut self, format: impl Into<String>) -> Self {
        self.declared_format = Some(format.into());
        self
    }
}

/// Conversion hints, passed through to the capability untouched.
///
/// Each capability reads the keys it understands (`quality`, `resolution`,
/// `bitrate`, ...) and ignores the rest. A same-format request with hints
/// is re-encoded when a capability handles that format, otherwise the
/// original bytes come back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversionOptions(BTreeMap<String, String>);

impl ConversionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns the trimmed value for `key`, treating blank values as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Parses the value for `key`, failing the conversion on malformed input.
    pub fn parse<T: FromStr>(&self, key: &str) -> Result<Option<T>, ConversionError> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
                ConversionError::ConversionFailure(format!("invalid value for option {}: {:?}", key, raw))
            }),
        }
    }

    /// Parses a `WIDTHxHEIGHT` option such as `resolution=1280x720`.
    pub fn dimensions(&self, key: &str) -> Result<Option<(u32, u32)>, ConversionError> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        let invalid = || {
            ConversionError::ConversionFailure(format!(
                "invalid value for option {}: {:?} (expected WIDTHxHEIGHT)",
                key, raw
            ))
        };
        let (w, h) = raw.split_once(['x', 'X']).ok_or_else(invalid)?;
        let width: u32 = w.trim().parse().map_err(|_| invalid())?;
        let height: u32 = h.trim().parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Some((width, height)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Converting,
    Done,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Converting => write!(f, "converting"),
            JobStatus::Done => write!(f, "done"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One requested file conversion. Lives for the duration of a single request.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub job_id: String,
    pub file_name: String,
    pub content: Vec<u8>,
    pub declared_format: Option<String>,
    pub source_format: Option<Format>,
    pub target_format: String,
    pub options: ConversionOptions,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl ConversionJob {
    pub fn new(file: UploadedFile, target_format: String, options: ConversionOptions) -> Self {
        let now = Utc::now();
        Self {
            job_id: Uuid::new_v4().to_string(),
            file_name: file.name,
            content: file.content,
            declared_format: file.declared_format,
            source_format: None,
            target_format,
            options,
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            error: None,
        }
    }

    pub fn start_converting(&mut self, source: Format) {
        self.source_format = Some(source);
        self.status = JobStatus::Converting;
        self.updated_at = Utc::now();
    }

    pub fn mark_done(&mut self) {
        self.status = JobStatus::Done;
        self.updated_at = Utc::now();
        self.error = None;
    }

    pub fn mark_failed(&mut self, error: String) {
        self.status = JobStatus::Failed;
        self.updated_at = Utc::now();
        self.error = Some(error);
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, JobStatus::Done | JobStatus::Failed)
    }

    pub fn processing_duration_ms(&self) -> Option<i64> {
        if self.is_finished() {
            Some(self.updated_at.signed_duration_since(self.created_at).num_milliseconds())
        } else {
            None
        }
    }
}

/// A successfully converted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedFile {
    pub file_name: String,
    pub converted_file_name: String,
    pub format: Format,
    pub bytes: Vec<u8>,
}

impl ConvertedFile {
    pub fn new(file_name: String, format: Format, bytes: Vec<u8>) -> Self {
        let converted_file_name = output_file_name(&file_name, format);
        Self {
            file_name,
            converted_file_name,
            format,
            bytes,
        }
    }
}

/// Outcome of one job: converted bytes or the reason it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionResult {
    Converted(ConvertedFile),
    Failed {
        file_name: String,
        error: ConversionError,
    },
}

impl ConversionResult {
    pub fn file_name(&self) -> &str {
        match self {
            ConversionResult::Converted(file) => &file.file_name,
            ConversionResult::Failed { file_name, .. } => file_name,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ConversionResult::Converted(_))
    }

    pub fn format(&self) -> Option<Format> {
        match self {
            ConversionResult::Converted(file) => Some(file.format),
            ConversionResult::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ConversionError> {
        match self {
            ConversionResult::Converted(_) => None,
            ConversionResult::Failed { error, .. } => Some(error),
        }
    }

    pub fn into_result(self) -> Result<ConvertedFile, ConversionError> {
        match self {
            ConversionResult::Converted(file) => Ok(file),
            ConversionResult::Failed { error, .. } => Err(error),
        }
    }
}
