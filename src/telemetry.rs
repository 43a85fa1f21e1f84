//! Telemetry and structured logging for conversion jobs.

use crate::job::{ConversionJob, ConversionOptions, JobStatus};
use opentelemetry::trace::{Span, Tracer};
use opentelemetry::{global, KeyValue};
use std::time::Duration;
use tracing::{info, warn};

const TRACER_NAME: &str = "media-converter";

/// Jobs slower than this are logged as warnings.
const SLOW_JOB_THRESHOLD_MS: i64 = 5000;

/// Records telemetry for a finished conversion job.
///
/// Emits a structured log line and an OpenTelemetry span carrying the job
/// id, formats, status, duration and error (if failed). Without an installed
/// exporter the span goes to the global no-op tracer.
pub fn record_job_telemetry(job: &ConversionJob) {
    let tracer = global::tracer(TRACER_NAME);
    let mut span = tracer.start("conversion_job");

    span.set_attribute(KeyValue::new("job_id", job.job_id.clone()));
    span.set_attribute(KeyValue::new("file_name", job.file_name.clone()));
    span.set_attribute(KeyValue::new("status", job.status.to_string()));
    span.set_attribute(KeyValue::new("target_format", job.target_format.clone()));
    if let Some(source) = job.source_format {
        span.set_attribute(KeyValue::new("source_format", source.extension()));
        span.set_attribute(KeyValue::new("media_kind", source.kind().to_string()));
    }
    span.set_attribute(KeyValue::new("option_count", job.options.len() as i64));
    if let Some(keys) = option_keys(&job.options) {
        span.set_attribute(KeyValue::new("option_keys", keys));
    }

    if let Some(duration_ms) = job.processing_duration_ms() {
        span.set_attribute(KeyValue::new("duration_ms", duration_ms));

        info!(
            job_id = %job.job_id,
            file_name = %job.file_name,
            duration_ms = duration_ms,
            status = %job.status,
            "Conversion job finished"
        );

        if duration_ms > SLOW_JOB_THRESHOLD_MS {
            warn!(
                job_id = %job.job_id,
                duration_ms = duration_ms,
                "Conversion exceeded performance threshold (5000ms)"
            );
        }
    }

    if job.status == JobStatus::Failed {
        if let Some(ref error) = job.error {
            span.set_attribute(KeyValue::new("error", error.clone()));
        }
    }

    span.end();
}

/// Comma separated hint names, values left out.
fn option_keys(options: &ConversionOptions) -> Option<String> {
    if options.is_empty() {
        return None;
    }
    let keys: Vec<&str> = options.iter().map(|(key, _)| key).collect();
    Some(keys.join(","))
}

/// Records a span summarising one batch.
pub fn record_batch_telemetry(batch_size: usize, failed: usize, elapsed: Duration) {
    let tracer = global::tracer(TRACER_NAME);
    let mut span = tracer.start("conversion_batch");

    let elapsed_ms = elapsed.as_millis() as i64;
    span.set_attribute(KeyValue::new("batch_size", batch_size as i64));
    span.set_attribute(KeyValue::new("failed", failed as i64));
    span.set_attribute(KeyValue::new("duration_ms", elapsed_ms));
    span.end();

    info!(
        batch_size = batch_size,
        failed = failed,
        duration_ms = elapsed_ms,
        "Conversion batch finished"
    );
}

/// Initializes OpenTelemetry with the OTLP exporter.
///
/// Call once at startup, from within the Tokio runtime. Reads:
/// - `OTEL_EXPORTER_OTLP_ENDPOINT` - collector endpoint (e.g. http://localhost:4317)
/// - `OTEL_SERVICE_NAME` - service name (default: media-converter)
pub fn init_telemetry(endpoint: &str) -> Result<(), Box<dyn std::error::Error>> {
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::Config;

    let service_name = std::env::var("OTEL_SERVICE_NAME")
        .unwrap_or_else(|_| TRACER_NAME.to_string());

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .with_trace_config(Config::default().with_resource(
            opentelemetry_sdk::Resource::new(vec![
                KeyValue::new("service.name", service_name),
                KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            ]),
        ))
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;

    if let Some(provider) = tracer.provider() {
        global::set_tracer_provider(provider);
    }

    info!("Telemetry initialized: endpoint={}", endpoint);
    Ok(())
}

/// Flushes pending spans before exit.
pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
}
