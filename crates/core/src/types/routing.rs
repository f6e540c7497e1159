//! The routing response envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::OperationId;

/// Outcome of one routing request.
///
/// Every field is filled as far as the pipeline progressed, so a failed
/// result still shows what was retrieved and selected. Exactly one of
/// `payload` and `error` is set on a finished result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingResult {
    /// Operation ids returned by semantic search, best match first.
    #[serde(default)]
    pub top_candidates: Vec<OperationId>,

    /// Retrieved operations the caller's plan does not cover.
    #[serde(default)]
    pub premium_only_candidates: Vec<OperationId>,

    /// Operation chosen by the language model.
    pub selected_tool: Option<OperationId>,

    /// Arguments for the selected operation, after coercion when it succeeded.
    #[serde(alias = "param")]
    pub arguments: Option<Value>,

    /// Upstream response, or a Markdown string when summarization was requested.
    #[serde(alias = "response")]
    pub payload: Option<Value>,

    /// Human-readable description of the first failure.
    pub error: Option<String>,

    /// Short justification returned by the model alongside its choice.
    pub motivation: Option<String>,

    /// Non-fatal notes, e.g. a failed summarization.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl RoutingResult {
    /// A result that failed before anything ran.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Record a failure, clearing any payload.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.payload = None;
        self.error = Some(error.into());
    }

    /// Whether the request produced a payload.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.payload.is_some() && self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_failed_has_only_error() {
        let result = RoutingResult::failed("boom");
        assert_eq!(result.error.as_deref(), Some("boom"));
        assert!(result.payload.is_none());
        assert!(result.top_candidates.is_empty());
        assert!(!result.is_success());
    }

    #[test]
    fn test_fail_clears_payload() {
        let mut result = RoutingResult {
            payload: Some(json!({"price": "1.0"})),
            ..RoutingResult::default()
        };
        result.fail("late failure");
        assert!(result.payload.is_none());
        assert_eq!(result.error.as_deref(), Some("late failure"));
    }

    #[test]
    fn test_warnings_skipped_when_empty() {
        let result = RoutingResult::failed("x");
        let value = serde_json::to_value(&result).expect("serialize");
        assert!(value.get("warnings").is_none());
        assert!(value.get("payload").is_some());
    }

    #[test]
    fn test_legacy_field_aliases() {
        let result: RoutingResult = serde_json::from_value(json!({
            "top_candidates": ["GetPrice"],
            "selected_tool": "GetPrice",
            "param": {"symbol": "AAPL"},
            "response": {"price": "190.1"},
            "error": null
        }))
        .expect("deserialize");

        assert_eq!(result.arguments, Some(json!({"symbol": "AAPL"})));
        assert!(result.is_success());
        assert!(result.premium_only_candidates.is_empty());
    }
}
