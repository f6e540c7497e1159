//! Command implementations.

pub mod index;
pub mod migrate;
pub mod route;

use market_router::config::ConfigError;
use market_router::db::RepositoryError;
use market_router::docs::DocsError;
use market_router::error::AppError;
use market_router::registry::RegistryError;
use market_router::tool_selection::ToolSelectionError;

/// Errors surfaced by CLI commands.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("{0}")]
    Index(#[from] ToolSelectionError),

    #[error("{0}")]
    Docs(#[from] DocsError),

    #[error("{0}")]
    App(#[from] AppError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing settings or invalid input.
    #[error("{0}")]
    Usage(String),

    /// The command ran but did not fully succeed.
    #[error("{0}")]
    Failed(String),
}
