//! Conversion request handler: batches of files in, one result per file out.

use crate::converter::ConversionCapability;
use crate::error::{BatchError, ConversionError};
use crate::format::Format;
use crate::job::{ConversionJob, ConversionOptions, ConversionResult, ConvertedFile, UploadedFile};
use crate::telemetry;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Settings the handler is constructed with.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Files converted concurrently within one batch.
    pub max_concurrency: usize,
    /// Best-effort time limit for a single file.
    pub job_timeout: Duration,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            job_timeout: Duration::from_secs(120),
        }
    }
}

/// Converts batches of uploaded files through the registered capabilities.
///
/// Each file is its own job: a failure is recorded in that file's result and
/// never affects its siblings. Results always come back in submission order.
pub struct ConversionHandler {
    config: HandlerConfig,
    capabilities: Vec<Arc<dyn ConversionCapability>>,
}

impl ConversionHandler {
    pub fn new(config: HandlerConfig, capabilities: Vec<Arc<dyn ConversionCapability>>) -> Self {
        Self {
            config,
            capabilities,
        }
    }

    /// All formats a client may name as source or target.
    pub fn supported_formats(&self) -> &'static [Format] {
        Format::all()
    }

    /// Converts every file to `target_format`.
    ///
    /// Returns exactly one result per file, in the order submitted. The only
    /// batch-level error is an empty submission, rejected before any
    /// capability is invoked.
    pub async fn submit_batch(
        &self,
        files: Vec<UploadedFile>,
        target_format: &str,
        options: &ConversionOptions,
    ) -> Result<Vec<ConversionResult>, BatchError> {
        if files.is_empty() {
            return Err(BatchError::EmptyBatch);
        }

        let started = Instant::now();
        let batch_size = files.len();
        info!(batch_size, target_format, "Processing conversion batch");

        let permits = Semaphore::new(self.config.max_concurrency.max(1));
        let jobs = files.into_iter().map(|file| {
            let permits = &permits;
            async move {
                // The semaphore is never closed, so acquisition only fails in theory.
                let _permit = permits.acquire().await.ok();
                self.convert_file(file, target_format, options).await
            }
        });
        let results = join_all(jobs).await;

        let failed = results.iter().filter(|r| !r.is_success()).count();
        telemetry::record_batch_telemetry(batch_size, failed, started.elapsed());
        Ok(results)
    }

    /// Converts a single file. Never fails as a whole; errors are in the result.
    pub async fn convert_file(
        &self,
        file: UploadedFile,
        target_format: &str,
        options: &ConversionOptions,
    ) -> ConversionResult {
        let mut job = ConversionJob::new(file, target_format.to_string(), options.clone());
        let outcome = self.run_job(&mut job).await;

        let result = match outcome {
            Ok((format, bytes)) => {
                job.mark_done();
                info!(
                    job_id = %job.job_id,
                    file_name = %job.file_name,
                    format = %format,
                    bytes = bytes.len(),
                    "Conversion complete"
                );
                ConversionResult::Converted(ConvertedFile::new(job.file_name.clone(), format, bytes))
            }
            Err(error) => {
                job.mark_failed(error.to_string());
                warn!(
                    job_id = %job.job_id,
                    file_name = %job.file_name,
                    error = %error,
                    "Conversion failed"
                );
                ConversionResult::Failed {
                    file_name: job.file_name.clone(),
                    error,
                }
            }
        };

        telemetry::record_job_telemetry(&job);
        result
    }

    async fn run_job(&self, job: &mut ConversionJob) -> Result<(Format, Vec<u8>), ConversionError> {
        if job.content.is_empty() {
            return Err(ConversionError::MissingFile(format!(
                "{} has no content",
                job.file_name
            )));
        }

        let source = self.resolve_source(job)?;
        let target = Format::from_token(&job.target_format)
            .ok_or_else(|| ConversionError::UnsupportedFormat(job.target_format.clone()))?;

        job.start_converting(source);
        let input = std::mem::take(&mut job.content);

        let capability = self.capabilities.iter().find(|c| c.accepts(source, target));

        // Same-format requests carrying hints are re-encoded when a capability can.
        if source.same_encoding(&target) && (job.options.is_empty() || capability.is_none()) {
            debug!(job_id = %job.job_id, format = %target, "Identity conversion, returning input");
            return Ok((target, input));
        }

        let capability = capability.ok_or_else(|| ConversionError::mismatched(source, target))?;

        debug!(
            job_id = %job.job_id,
            capability = capability.name(),
            from = %source,
            to = %target,
            "Dispatching conversion"
        );

        let conversion = capability.convert(input, source, target, job.options.clone());
        match tokio::time::timeout(self.config.job_timeout, conversion).await {
            Ok(Ok(bytes)) => Ok((target, bytes)),
            Ok(Err(error)) => Err(error),
            Err(_) => Err(ConversionError::Timeout(self.config.job_timeout.as_millis() as u64)),
        }
    }

    /// Declared format first, then the file name's extension, then sniffing.
    fn resolve_source(&self, job: &ConversionJob) -> Result<Format, ConversionError> {
        if let Some(declared) = job
            .declared_format
            .as_deref()
            .filter(|d| !d.trim().is_empty())
        {
            return Format::from_token(declared)
                .ok_or_else(|| ConversionError::UnsupportedFormat(declared.to_string()));
        }

        if let Some(format) = Format::from_file_name(&job.file_name) {
            return Ok(format);
        }

        self.capabilities
            .iter()
            .find_map(|c| c.detect_format(&job.content))
            .ok_or_else(|| {
                ConversionError::UnsupportedFormat(format!(
                    "could not determine the format of {}",
                    job.file_name
                ))
            })
    }
}
