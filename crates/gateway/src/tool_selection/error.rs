//! Error types for retrieval, plan gating and tool selection.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::openai::OpenAIError;

/// Errors that can occur before an operation has been chosen.
#[derive(Debug, Error)]
pub enum ToolSelectionError {
    /// Failed to generate embeddings.
    #[error("embedding generation failed: {0}")]
    Embedding(String),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Repository error.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid response from API.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// The semantic index is unusable or inconsistent with the registry.
    #[error("index error: {0}")]
    Index(String),

    /// IO error (file read/write).
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration error (YAML parsing, validation).
    #[error("configuration error: {0}")]
    Config(String),

    /// The caller's subscription plan name is not recognised.
    #[error("{0}")]
    InvalidPlan(#[from] market_router_core::UnknownTier),

    /// The model did not produce a usable operation call.
    #[error("{0}")]
    Selection(String),

    /// The chat model call failed.
    #[error("LLM request failed: {0}")]
    Llm(#[from] OpenAIError),

    /// No operation is available to the caller's plan.
    #[error("no operations available for the caller's plan")]
    NoCandidates,
}

impl ToolSelectionError {
    /// Whether the error happened while embedding or searching the index.
    #[must_use]
    pub const fn is_retrieval(&self) -> bool {
        matches!(
            self,
            Self::Embedding(_)
                | Self::Database(_)
                | Self::Repository(_)
                | Self::Http(_)
                | Self::Json(_)
                | Self::InvalidResponse(_)
                | Self::Index(_)
                | Self::Io(_)
        )
    }
}
