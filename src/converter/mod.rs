//! Conversion capabilities: the codecs and tools that do the actual work.
//!
//! The handler only sees [`ConversionCapability`]. Each implementation
//! decides which format pairs it accepts, how to sniff its own formats from
//! raw bytes, and which option hints it honours.

mod ffmpeg;
mod raster;
mod svg;

pub use self::ffmpeg::FfmpegConverter;
pub use self::raster::ImageConverter;
pub use self::svg::SvgConverter;

use crate::config::Config;
use crate::error::ConversionError;
use crate::format::Format;
use crate::job::ConversionOptions;
use async_trait::async_trait;
use std::sync::Arc;

/// An external conversion capability.
///
/// Implementations may block internally; they are expected to move heavy
/// work off the async executor themselves.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversionCapability: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Identifies one of this capability's formats from magic bytes.
    fn detect_format(&self, bytes: &[u8]) -> Option<Format>;

    /// Whether this capability can convert `from` into `to`.
    fn accepts(&self, from: Format, to: Format) -> bool;

    /// Converts `input` from one format to another.
    async fn convert(
        &self,
        input: Vec<u8>,
        from: Format,
        to: Format,
        options: ConversionOptions,
    ) -> Result<Vec<u8>, ConversionError>;
}

/// Builds the capabilities the service ships with, in lookup order.
pub fn default_capabilities(config: &Config) -> Vec<Arc<dyn ConversionCapability>> {
    vec![
        Arc::new(ImageConverter::new()),
        Arc::new(SvgConverter::new()),
        Arc::new(FfmpegConverter::new(
            config.ffmpeg_path.clone(),
            config.temp_dir.clone(),
        )),
    ]
}

/// Runs CPU-bound codec work on the blocking pool.
async fn run_blocking<F>(work: F) -> Result<Vec<u8>, ConversionError>
where
    F: FnOnce() -> Result<Vec<u8>, ConversionError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ConversionError::ConversionFailure(format!("conversion task aborted: {}", e)))?
}
