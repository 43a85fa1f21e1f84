//! Request handlers for the conversion endpoints.

use super::{AppState, ServerError};
use crate::error::BatchError;
use crate::format::{sanitize_file_name, Format, MediaKind};
use crate::job::{ConversionOptions, ConversionResult, UploadedFile};
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

/// `GET /`
pub async fn index() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "message": "media converter API" }))
}

#[derive(Serialize)]
pub struct FormatsResponse {
    pub formats: &'static [Format],
    pub supported_extensions: Vec<&'static str>,
}

/// `GET /formats`
pub async fn formats(State(state): State<Arc<AppState>>) -> Json<FormatsResponse> {
    Json(FormatsResponse {
        formats: state.handler.supported_formats(),
        supported_extensions: Format::supported_extensions(),
    })
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub target_format: String,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<ResultEntry>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ResultEntry {
    Success {
        file_name: String,
        converted_file_name: String,
        format: &'static str,
        media_kind: MediaKind,
        size: usize,
        /// Converted bytes, base64 encoded.
        data: String,
    },
    Error {
        file_name: String,
        error: &'static str,
        message: String,
    },
}

impl From<ConversionResult> for ResultEntry {
    fn from(result: ConversionResult) -> Self {
        match result {
            ConversionResult::Converted(file) => ResultEntry::Success {
                size: file.bytes.len(),
                data: BASE64.encode(&file.bytes),
                format: file.format.extension(),
                media_kind: file.format.kind(),
                converted_file_name: file.converted_file_name,
                file_name: file.file_name,
            },
            ConversionResult::Failed { file_name, error } => ResultEntry::Error {
                file_name,
                error: error.code(),
                message: error.to_string(),
            },
        }
    }
}

/// `POST /convert`
///
/// Multipart fields:
/// - `file` (repeatable): the files to convert
/// - `file_type` (repeatable, optional): declared source format, matched to
///   `file` parts by position; blank means infer
/// - `convert_to` or `target_format`: the target format
/// - anything else: option hints such as `quality` or `bitrate`
pub async fn convert(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<BatchResponse>, ServerError> {
    let form = ConvertForm::read(multipart).await?;
    let (files, target_format, options) = form.validate()?;
    debug!(files = files.len(), %target_format, "received batch conversion request");

    let results = state
        .handler
        .submit_batch(files, &target_format, &options)
        .await?;

    let succeeded = results.iter().filter(|r| r.is_success()).count();
    let failed = results.len() - succeeded;
    info!(succeeded, failed, %target_format, "batch conversion finished");

    Ok(Json(BatchResponse {
        target_format,
        succeeded,
        failed,
        results: results.into_iter().map(ResultEntry::from).collect(),
    }))
}

/// `POST /download`
///
/// Same fields as `/convert` with exactly one file. Responds with the
/// converted bytes as an attachment.
pub async fn download(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ServerError> {
    let form = ConvertForm::read(multipart).await?;
    let (mut files, target_format, options) = form.validate()?;
    if files.len() > 1 {
        return Err(ServerError::bad_request(
            "too_many_files",
            format!("expected exactly one file, got {}", files.len()),
        ));
    }
    let file = files.pop().ok_or(ServerError::Batch(BatchError::EmptyBatch))?;

    let converted = state
        .handler
        .convert_file(file, &target_format, &options)
        .await
        .into_result()?;

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        converted.converted_file_name
    ))
    .map_err(|e| ServerError::Internal(format!("invalid download file name: {}", e)))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(converted.format.mime_type())),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        converted.bytes,
    )
        .into_response())
}

/// Parsed multipart conversion form.
#[derive(Debug, Default)]
struct ConvertForm {
    files: Vec<UploadedFile>,
    declared_formats: Vec<String>,
    target_format: Option<String>,
    options: ConversionOptions,
}

impl ConvertForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ServerError> {
        let mut form = ConvertForm::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" | "files" | "file[]" => {
                    let file_name = sanitize_file_name(field.file_name().unwrap_or_default());
                    let content = field.bytes().await.map_err(multipart_error)?;
                    form.files.push(UploadedFile::new(file_name, content.to_vec()));
                }
                "file_type" => form
                    .declared_formats
                    .push(field.text().await.map_err(multipart_error)?),
                "convert_to" | "target_format" => {
                    form.target_format = Some(field.text().await.map_err(multipart_error)?);
                }
                _ => {
                    let value = field.text().await.map_err(multipart_error)?;
                    form.options.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    /// Checks for files and a target, and pairs declared formats with files.
    fn validate(self) -> Result<(Vec<UploadedFile>, String, ConversionOptions), ServerError> {
        if self.files.is_empty() {
            return Err(ServerError::Batch(BatchError::EmptyBatch));
        }
        let target_format = self
            .target_format
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ServerError::bad_request(
                    "missing_target_format",
                    "provide the target format in the `convert_to` field",
                )
            })?;

        let mut files = self.files;
        for (file, declared) in files.iter_mut().zip(self.declared_formats) {
            if !declared.trim().is_empty() {
                file.declared_format = Some(declared);
            }
        }
        Ok((files, target_format, self.options))
    }
}

fn multipart_error(e: MultipartError) -> ServerError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServerError::PayloadTooLarge(e.body_text())
    } else {
        ServerError::bad_request(
            "invalid_multipart",
            format!("failed to read multipart field: {}", e.body_text()),
        )
    }
}
