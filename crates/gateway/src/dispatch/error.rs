//! Error types for argument validation and upstream calls.

use thiserror::Error;

/// Errors that can occur while executing a selected operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// An argument is unknown, missing or has the wrong type.
    #[error("invalid argument '{field}': {reason}")]
    ArgumentValidation {
        /// Parameter name.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A `{placeholder}` in the upstream path has no value.
    #[error("missing path parameter '{parameter}' for {operation}")]
    MissingPathParameter {
        /// Operation id.
        operation: String,
        /// Placeholder name.
        parameter: String,
    },

    /// The upstream API failed or returned an error document.
    #[error("upstream error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Upstream {
        /// HTTP status or the API's own error code, when known.
        status: Option<u16>,
        /// Error message.
        message: String,
    },
}

impl DispatchError {
    pub(crate) fn argument(field: &str, reason: impl Into<String>) -> Self {
        Self::ArgumentValidation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }
}
