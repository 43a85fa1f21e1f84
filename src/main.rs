//! Media Converter Service
//!
//! HTTP backend for the web media converter. Accepts multipart uploads,
//! converts each file to the requested format and returns the results.
//!
//! ## Architecture
//!
//! - **HTTP**: Axum router (`/`, `/formats`, `/convert`, `/download`)
//! - **Handler**: per-file jobs, bounded concurrency, per-file timeout
//! - **Converters**: image crate, resvg/svg2pdf, ffmpeg child processes
//! - **Telemetry**: OpenTelemetry OTLP export
//!
//! ## Configuration
//!
//! Environment variables:
//! - `MEDIA_CONVERTER_BIND`: listen address (default: 127.0.0.1:5000)
//! - `MEDIA_CONVERTER_MAX_UPLOAD_BYTES`: request body limit (default: 50 MiB)
//! - `MEDIA_CONVERTER_JOB_TIMEOUT_SECS`: per-file time limit (default: 120)
//! - `MEDIA_CONVERTER_CONCURRENCY`: concurrent conversions per batch (default: 4)
//! - `MEDIA_CONVERTER_FFMPEG`: ffmpeg executable (default: ffmpeg)
//! - `MEDIA_CONVERTER_TEMP_DIR`: scratch directory root (default: system temp)
//! - `MEDIA_CONVERTER_LOG` / `RUST_LOG`: log filter (default: info)
//! - `MEDIA_CONVERTER_LOG_JSON`: emit JSON log lines
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP collector endpoint (export disabled when unset)

use anyhow::{Context, Result};
use media_converter::config::Config;
use media_converter::converter::default_capabilities;
use media_converter::handler::ConversionHandler;
use media_converter::server::{self, AppState};
use media_converter::telemetry;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env();

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| "info".into());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);
    if config.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    // Initialize OpenTelemetry
    match std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        Ok(endpoint) => {
            if let Err(e) = telemetry::init_telemetry(&endpoint) {
                warn!("Failed to initialize telemetry: {}", e);
            }
        }
        Err(_) => info!("OTEL_EXPORTER_OTLP_ENDPOINT not set, span export disabled"),
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Starting media converter service");
    info!(
        "Configuration: bind={}, concurrency={}, job_timeout={:?}, ffmpeg={}, temp_dir={}",
        config.bind_address,
        config.max_concurrency,
        config.job_timeout,
        config.ffmpeg_path.display(),
        config.temp_dir.display()
    );

    let handler = ConversionHandler::new(config.handler_config(), default_capabilities(&config));
    let bind_address = config.bind_address.clone();
    let state = Arc::new(AppState::new(config, handler));
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    info!(address = %bind_address, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    telemetry::shutdown_telemetry();
    info!("Media converter shutdown complete");
    Ok(())
}

/// Resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Received shutdown signal, finishing in-flight requests...");
}
