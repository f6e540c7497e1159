//! Error types for the documentation index and answers.

use std::time::Duration;

use thiserror::Error;

use crate::db::RepositoryError;
use crate::tool_selection::ToolSelectionError;

/// Errors raised while building, opening or querying the documentation index.
#[derive(Debug, Error)]
pub enum DocsError {
    /// The documentation page could not be downloaded.
    #[error("failed to fetch documentation: {0}")]
    Fetch(String),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The HTML could not be parsed.
    #[error("HTML parsing failed: {0}")]
    Parse(String),

    /// Embedding failed, or a check shared with the operation index did.
    #[error("{0}")]
    Retrieval(#[from] ToolSelectionError),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Repository error.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// JSON parsing failed.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// The index is unusable.
    #[error("index error: {0}")]
    Index(String),

    /// IO error (file read/write).
    #[error("IO error: {0}")]
    Io(String),

    /// Embedding or searching the question failed.
    #[error("Vector search failed: {0}")]
    Search(String),

    /// The chat model did not produce an answer.
    #[error("LLM summarization failed: {0}")]
    Summarize(String),

    /// The answer took longer than the request deadline.
    #[error("request deadline of {}s exceeded", .0.as_secs())]
    DeadlineExceeded(Duration),
}
