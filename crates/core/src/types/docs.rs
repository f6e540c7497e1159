//! The documentation answer envelope.

use serde::{Deserialize, Serialize};

/// Outcome of one documentation question.
///
/// `top_candidates` holds the titles of the sections the answer was drawn
/// from, best match first. It stays filled when the answer itself failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocAnswer {
    /// The question as asked.
    pub query: String,

    /// Titles of the retrieved documentation sections.
    #[serde(default)]
    pub top_candidates: Vec<String>,

    /// Markdown answer.
    pub result: Option<String>,

    /// Human-readable description of the failure.
    pub error: Option<String>,
}

impl DocAnswer {
    /// An empty answer for `query`.
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// An answer that failed before any section was retrieved.
    #[must_use]
    pub fn failed(query: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(query)
        }
    }

    /// Whether a Markdown answer was produced.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.result.is_some() && self.error.is_none()
    }
}
