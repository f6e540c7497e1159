//! Routing error taxonomy.

use std::time::Duration;

use market_router_core::Tier;
use thiserror::Error;

use crate::credentials::CredentialError;
use crate::dispatch::DispatchError;
use crate::tool_selection::ToolSelectionError;

/// The first failure of a routing request.
///
/// Its `Display` output becomes the `error` field of the routing result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoutingError {
    /// Embedding the query or searching the index failed.
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    /// The caller's plan name is not recognised.
    #[error("{0}")]
    InvalidPlan(String),

    /// The model did not produce a usable operation call.
    #[error("{0}")]
    Selection(String),

    /// An argument is unknown, missing or has the wrong type.
    #[error("invalid argument '{field}': {reason}")]
    ArgumentValidation {
        /// Parameter name.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A path placeholder had no value.
    #[error("missing path parameter '{parameter}' for {operation}")]
    MissingPathParameter {
        /// Operation id.
        operation: String,
        /// Placeholder name.
        parameter: String,
    },

    /// The upstream API failed.
    #[error("upstream error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Upstream {
        /// HTTP status or API error code.
        status: Option<u16>,
        /// Error message.
        message: String,
    },

    /// Credentials could not be resolved.
    #[error("{0}")]
    Credential(#[from] CredentialError),

    /// A directly invoked operation needs a higher plan.
    #[error("{operation} requires the {required} plan")]
    PlanRestricted {
        /// Operation id.
        operation: String,
        /// Lowest plan that covers it.
        required: Tier,
    },

    /// A directly invoked operation does not exist.
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    /// The request did not finish in time.
    #[error("request deadline of {}s exceeded", .0.as_secs())]
    DeadlineExceeded(Duration),
}

impl From<DispatchError> for RoutingError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::ArgumentValidation { field, reason } => {
                Self::ArgumentValidation { field, reason }
            }
            DispatchError::MissingPathParameter {
                operation,
                parameter,
            } => Self::MissingPathParameter {
                operation,
                parameter,
            },
            DispatchError::Upstream { status, message } => Self::Upstream { status, message },
        }
    }
}

impl From<ToolSelectionError> for RoutingError {
    fn from(err: ToolSelectionError) -> Self {
        if err.is_retrieval() {
            return Self::Retrieval(err.to_string());
        }
        match err {
            ToolSelectionError::InvalidPlan(e) => Self::InvalidPlan(e.to_string()),
            ToolSelectionError::Config(_) => Self::Retrieval(err.to_string()),
            other => Self::Selection(other.to_string()),
        }
    }
}
