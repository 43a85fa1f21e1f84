//! HTTP surface: router construction and shared state.
//!
//! [`router`] assembles the application router:
//! - `GET /` health check
//! - `GET /formats` supported format listing
//! - `POST /convert` batch conversion (JSON results, base64 payloads)
//! - `POST /download` single-file conversion returned as an attachment
//!
//! Layers: open CORS for the static front end, request tracing, and a body
//! limit of `max_upload_bytes`.

mod error;
mod routes;

pub use self::error::{conversion_status, ServerError};

use crate::config::Config;
use crate::handler::ConversionHandler;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// State shared by every request.
pub struct AppState {
    pub config: Arc<Config>,
    pub handler: Arc<ConversionHandler>,
}

impl AppState {
    pub fn new(config: Config, handler: ConversionHandler) -> Self {
        Self {
            config: Arc::new(config),
            handler: Arc::new(handler),
        }
    }
}

/// Build the complete Axum [`Router`] for the application.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/", get(routes::index))
        .route("/formats", get(routes::formats))
        .route("/convert", post(routes::convert))
        .route("/download", post(routes::download))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
