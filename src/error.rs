//! Error types for conversion jobs and batches.

use crate::format::{Format, MediaKind};
use thiserror::Error;

/// Why a single file could not be converted.
///
/// These never abort a batch; each one becomes the result for its own file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// The source or target format is not in the supported set.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// No capability converts between these two media kinds.
    #[error("cannot convert {from} ({from_kind}) to {to} ({to_kind})")]
    MismatchedKind {
        from: Format,
        from_kind: MediaKind,
        to: Format,
        to_kind: MediaKind,
    },

    /// The input bytes could not be decoded as the source format.
    #[error("corrupt or unreadable input: {0}")]
    CorruptInput(String),

    /// The conversion capability itself failed.
    #[error("conversion failed: {0}")]
    ConversionFailure(String),

    /// The conversion did not finish within the per-file time limit, in milliseconds.
    #[error("conversion timed out after {0} ms")]
    Timeout(u64),

    /// The submitted file carried no content.
    #[error("missing file: {0}")]
    MissingFile(String),
}

impl ConversionError {
    pub fn mismatched(from: Format, to: Format) -> Self {
        ConversionError::MismatchedKind {
            from,
            from_kind: from.kind(),
            to,
            to_kind: to.kind(),
        }
    }

    /// Stable machine readable code, used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            ConversionError::UnsupportedFormat(_) => "unsupported_format",
            ConversionError::MismatchedKind { .. } => "mismatched_media_kind",
            ConversionError::CorruptInput(_) => "corrupt_input",
            ConversionError::ConversionFailure(_) => "conversion_failed",
            ConversionError::Timeout(_) => "conversion_timeout",
            ConversionError::MissingFile(_) => "missing_file",
        }
    }
}

/// Errors that reject a whole batch before any conversion starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("no files were submitted")]
    EmptyBatch,
}

impl BatchError {
    pub fn code(&self) -> &'static str {
        match self {
            BatchError::EmptyBatch => "missing_file",
        }
    }
}
