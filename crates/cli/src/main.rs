//! Market Router CLI - migrations, index builds and one-shot routing.
//!
//! # Usage
//!
//! ```bash
//! # Create the operation_embeddings and doc_sections tables
//! mr-cli migrate
//!
//! # Embed every catalogue operation into the configured index
//! mr-cli index build
//!
//! # Build a snapshot file instead
//! mr-cli index build --snapshot data/index.json
//!
//! # Build the documentation index behind /doctool
//! mr-cli index build --docs
//!
//! # Verify the index against the catalogue / show counts
//! mr-cli index check
//! mr-cli index stats
//!
//! # Route one query and print the JSON result
//! mr-cli route "Show me TSLA 1 minute candles" --plan pro
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use market_router_core::OutputFormat;

mod commands;

use commands::CliError;
use commands::index::BuildArgs;

#[derive(Parser)]
#[command(name = "mr-cli")]
#[command(author, version, about = "Market router CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Build and inspect the semantic and documentation indexes
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },
    /// Route one natural-language query
    Route {
        /// The query
        query: String,

        /// Subscription plan (basic, grow, pro, ultra, enterprise)
        #[arg(short, long)]
        plan: Option<String>,

        /// Output format (`json` or `md`)
        #[arg(short, long, default_value = "json")]
        format: OutputFormat,
    },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Embed catalogue operations and write the index
    Build {
        /// Write a JSON snapshot to this path instead of the configured index
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Only embed operations that are not indexed yet
        #[arg(long)]
        only_missing: bool,

        /// YAML file with extra phrasings per operation
        #[arg(long)]
        hints: Option<PathBuf>,

        /// Build the documentation index from the API docs page instead
        #[arg(long, conflicts_with_all = ["only_missing", "hints"])]
        docs: bool,

        /// Documentation page to download (default: the public docs)
        #[arg(long, requires = "docs", conflicts_with = "docs_file")]
        docs_url: Option<String>,

        /// Read a saved documentation page instead of downloading it
        #[arg(long, requires = "docs")]
        docs_file: Option<PathBuf>,
    },
    /// Check that the index only contains catalogue operations
    Check,
    /// Show index statistics
    Stats,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,sqlx=warn".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Index { action } => match action {
            IndexAction::Build {
                snapshot,
                only_missing,
                hints,
                docs,
                docs_url,
                docs_file,
            } => {
                commands::index::build(BuildArgs {
                    snapshot,
                    only_missing,
                    hints,
                    docs,
                    docs_url,
                    docs_file,
                })
                .await?;
            }
            IndexAction::Check => commands::index::check().await?,
            IndexAction::Stats => commands::index::stats().await?,
        },
        Commands::Route {
            query,
            plan,
            format,
        } => commands::route::run(query, plan, format).await?,
    }
    Ok(())
}
