//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! mr-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `ROUTER_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! Migrations live in `crates/gateway/migrations/` and create the
//! `operation_embeddings` and `doc_sections` tables with their pgvector
//! columns.

use market_router::config::IndexSource;
use market_router::db;
use tracing::info;

use super::CliError;

/// Run the router's database migrations.
///
/// # Errors
///
/// Returns an error if no database is configured or a migration fails.
pub async fn run() -> Result<(), CliError> {
    let IndexSource::Postgres(database_url) = IndexSource::from_env()? else {
        return Err(CliError::Usage(
            "Migrations need ROUTER_DATABASE_URL or DATABASE_URL".to_string(),
        ));
    };

    info!("Connecting to database...");
    let pool = db::create_pool(&database_url).await?;

    info!("Running migrations...");
    db::run_migrations(&pool).await?;

    info!("Migrations complete!");
    Ok(())
}
