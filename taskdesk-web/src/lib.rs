//! Taskdesk Web Server
//!
//! HTTP API for role-based task assignment. Sessions are JWTs carried in a
//! cookie or bearer header, users are cached in Redis or in process, and
//! every route is gated by role and permission.

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod state;

// Re-export main types
pub use config::WebConfig;
pub use server::TaskdeskServer;
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    Router,
};
use taskdesk_core::{LogFormat, LoggingConfig, TaskdeskError};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Create the main application router
pub fn create_app(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            // credentialed CORS cannot use a wildcard origin
            Ok(value) if value != "*" => Some(value),
            _ => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_credentials(true)
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE]);

    let mut app = Router::new()
        .nest("/api", routes::api_routes(state.clone()))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

    if state.config.environment.is_development() {
        app = app.layer(axum::middleware::from_fn(error::expose_error_details));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Error types for the web server
#[derive(thiserror::Error, Debug)]
pub enum WebError {
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(TaskdeskError),
}

/// Result type for web operations
pub type WebResult<T> = Result<T, WebError>;

/// Initialize logging for the web server
///
/// `format` is one of json, pretty or compact.
pub fn init_logging(level: &str, format: &str) -> WebResult<()> {
    let format: LogFormat = format.parse().map_err(WebError::Config)?;
    taskdesk_core::init_logging(&LoggingConfig::with_level(level).with_format(format))
        .map_err(|e| WebError::Config(format!("Failed to initialize logging: {}", e)))
}
