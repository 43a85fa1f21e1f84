//! Media Converter Library
//!
//! This library provides the core functionality for the batch media
//! conversion service. It exposes modules for format handling, job
//! management, conversion capabilities, the batch handler, the HTTP surface,
//! and telemetry.
//!
//! ## Module Overview
//!
//! - `config`: Environment-driven service configuration
//! - `converter`: Conversion capabilities (raster images, SVG, ffmpeg)
//! - `error`: Per-file and per-batch error types
//! - `format`: Supported format registry and file-name helpers
//! - `handler`: Batch conversion with per-file error isolation
//! - `job`: Job models and state management
//! - `server`: Axum router and request handlers
//! - `telemetry`: OpenTelemetry integration and structured logging
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use media_converter::{
//!     config::Config,
//!     converter::default_capabilities,
//!     handler::ConversionHandler,
//!     job::{ConversionOptions, UploadedFile},
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default();
//!     let handler = ConversionHandler::new(config.handler_config(), default_capabilities(&config));
//!
//!     let png = std::fs::read("photo.png").unwrap();
//!     let results = handler
//!         .submit_batch(
//!             vec![UploadedFile::new("photo.png", png)],
//!             "jpg",
//!             &ConversionOptions::new().with("quality", "85"),
//!         )
//!         .await
//!         .unwrap();
//!
//!     assert!(results[0].is_success());
//! }
//! ```

pub mod config;
pub mod converter;
pub mod error;
pub mod format;
pub mod handler;
pub mod job;
pub mod server;
pub mod telemetry;
