//! Execution of a selected operation against the market-data API.
//!
//! 1. Coerce the model's arguments into the operation's parameter types
//! 2. Substitute path placeholders and collect query parameters
//! 3. Call the upstream API with the caller's market-data key
//! 4. Check the response for error documents and the expected shape
//! 5. Optionally render the payload as Markdown

mod arguments;
mod error;
mod request;
mod summarize;
mod upstream;

use std::sync::Arc;

use market_router_core::OutputFormat;
use secrecy::SecretString;
use serde_json::{Map, Value};
use tracing::{instrument, warn};

pub use arguments::{coerce_arguments, flatten_arguments};
pub use error::DispatchError;
pub use request::{UpstreamRequest, build_request};
pub use summarize::Summarizer;
pub use upstream::{HttpUpstream, UpstreamCaller};

use crate::openai::ChatModel;
use crate::registry::Operation;

/// Coerced arguments and the request built from them.
#[derive(Debug, Clone)]
pub struct PreparedCall {
    /// Arguments after coercion and defaults, without the API key.
    pub arguments: Map<String, Value>,
    /// The upstream request.
    pub request: UpstreamRequest,
}

/// Final payload and any non-fatal notes.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    /// Structured JSON or a Markdown string.
    pub payload: Value,
    /// Set when summarization failed and the structured payload was kept.
    pub warning: Option<String>,
}

/// Validates arguments, calls the upstream API and renders results.
#[derive(Clone)]
pub struct Dispatcher {
    upstream: Arc<dyn UpstreamCaller>,
    summarizer: Summarizer,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("summarizer", &self.summarizer)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a dispatcher.
    #[must_use]
    pub fn new(upstream: Arc<dyn UpstreamCaller>, chat: Arc<dyn ChatModel>) -> Self {
        Self {
            upstream,
            summarizer: Summarizer::new(chat),
        }
    }

    /// Coerce `raw` arguments and build the upstream request.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::ArgumentValidation`] or
    /// [`DispatchError::MissingPathParameter`].
    pub fn prepare(
        operation: &Operation,
        raw: Map<String, Value>,
        market_data_key: &SecretString,
    ) -> Result<PreparedCall, DispatchError> {
        let arguments = coerce_arguments(operation, flatten_arguments(operation, raw))?;
        let request = build_request(operation, arguments.clone(), market_data_key.clone())?;
        Ok(PreparedCall { arguments, request })
    }

    /// Call the upstream API and check the response.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Upstream`] for transport failures, error
    /// documents and responses that do not match the operation's output shape.
    #[instrument(skip(self, operation, request), fields(operation = %operation.id))]
    pub async fn execute(
        &self,
        operation: &Operation,
        request: &UpstreamRequest,
    ) -> Result<Value, DispatchError> {
        let payload = self.upstream.call(request).await?;
        check_error_document(&payload)?;
        operation
            .output
            .check(&payload)
            .map_err(|reason| DispatchError::upstream(None, format!("unexpected response shape: {reason}")))?;
        Ok(payload)
    }

    /// Render `payload` in the requested format.
    ///
    /// A failed summary keeps the structured payload and returns a warning.
    pub async fn render(
        &self,
        llm_key: &SecretString,
        query: &str,
        payload: Value,
        format: OutputFormat,
    ) -> Rendered {
        if format == OutputFormat::Structured {
            return Rendered {
                payload,
                warning: None,
            };
        }

        match self.summarizer.summarize(llm_key, query, &payload).await {
            Ok(markdown) => Rendered {
                payload: Value::String(markdown),
                warning: None,
            },
            Err(e) => {
                warn!(error = %e, "Summarization failed, returning structured payload");
                Rendered {
                    payload,
                    warning: Some(format!("summarization failed: {e}")),
                }
            }
        }
    }
}

/// Reject `{"status": "error", "code": N, "message": ...}` bodies.
fn check_error_document(payload: &Value) -> Result<(), DispatchError> {
    if payload.get("status").and_then(Value::as_str) != Some("error") {
        return Ok(());
    }
    let status = payload
        .get("code")
        .and_then(Value::as_u64)
        .and_then(|code| u16::try_from(code).ok());
    let message = payload
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("upstream returned an error");
    Err(DispatchError::upstream(status, message))
}
