//! Error types for the `OpenAI` API client.

use thiserror::Error;

/// Errors that can occur when interacting with the `OpenAI` API.
#[derive(Debug, Error)]
pub enum OpenAIError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API returned an error body.
    #[error("API error ({error_type}): {message}")]
    Api {
        /// Error type from the API.
        error_type: String,
        /// Error message.
        message: String,
    },

    /// Rate limited by the API.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Authentication failed.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Failed to parse response.
    #[error("parse error: {0}")]
    Parse(String),

    /// Client could not be configured (bad base URL, header value).
    #[error("client configuration error: {0}")]
    Config(String),
}

/// Error body returned by the `OpenAI` API.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorResponse {
    /// Nested error details.
    pub error: ApiError,
}

/// Nested error details.
#[derive(Debug, serde::Deserialize)]
pub struct ApiError {
    /// Error message.
    pub message: String,
    /// Error type (absent on some compatible providers).
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
}
