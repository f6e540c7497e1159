//! Unified error handling for the HTTP surface and startup.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::config::ConfigError;
use crate::dispatch::DispatchError;
use crate::docs::DocsError;
use crate::openai::OpenAIError;
use crate::registry::RegistryError;
use crate::tool_selection::ToolSelectionError;

/// Application-level error type.
///
/// Routing failures never reach this type; they are reported inside the
/// routing result, and documentation failures inside the answer. `AppError` covers malformed requests and failures while
/// assembling shared state.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The operation catalogue is inconsistent.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// The semantic index could not be opened or verified.
    #[error("Index error: {0}")]
    Index(#[from] ToolSelectionError),

    /// The LLM client could not be built.
    #[error("LLM client error: {0}")]
    Llm(#[from] OpenAIError),

    /// The upstream client could not be built.
    #[error("Upstream client error: {0}")]
    Upstream(#[from] DispatchError),

    /// The documentation index could not be opened.
    #[error("Documentation index error: {0}")]
    Docs(#[from] DocsError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),

    /// The feature is not configured on this server.
    #[error("{0}")]
    Unavailable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let server_error = !matches!(
            self,
            Self::NotFound(_) | Self::BadRequest(_) | Self::Unavailable(_)
        );
        if server_error {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Don't expose internal error details to clients
        let message = if server_error {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
