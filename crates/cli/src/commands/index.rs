//! Semantic index commands.
//!
//! Embeds each catalogue operation and stores it in `PostgreSQL` or a JSON
//! snapshot file.
//!
//! # Usage
//!
//! ```bash
//! # Build into the configured index (database or ROUTER_INDEX_PATH)
//! mr-cli index build
//!
//! # Build a snapshot file, embedding only operations it does not have yet
//! mr-cli index build --snapshot data/index.json --only-missing
//!
//! # Enrich the embedded text with hand-written phrasings
//! mr-cli index build --hints data/hints.yaml
//!
//! # Build the documentation index from the published docs page
//! mr-cli index build --docs
//! mr-cli index build --docs --docs-file saved/docs.html --snapshot data/docs.json
//!
//! # Verify the index against the catalogue
//! mr-cli index check
//!
//! # Show counts
//! mr-cli index stats
//! ```
//!
//! # Environment Variables
//!
//! - `OPENAI_API_KEY` - required for `build`
//! - `ROUTER_EMBEDDING_MODEL`, `ROUTER_EMBEDDING_DIMENSIONS` - must match the server
//! - `ROUTER_DATABASE_URL` / `DATABASE_URL` or `ROUTER_INDEX_PATH` - index location
//! - `ROUTER_DOCS_INDEX_PATH` - documentation snapshot location (otherwise the database)

use std::path::PathBuf;

use market_router::config::{IndexSource, OpenAIConfig};
use market_router::db::{self, doc_sections, operation_embeddings};
use market_router::docs::builder::{embed_sections, snapshot as doc_snapshot, store_postgres};
use market_router::docs::{DEFAULT_DOCS_URL, DocIndex, DocSnapshot, fetch_docs, parse_sections};
use market_router::registry::OperationRegistry;
use market_router::state::{open_doc_index, open_index};
use market_router::tool_selection::seeder::{
    build_snapshot, index_documents, load_hints, seed_postgres, validate_hints,
};
use market_router::tool_selection::{
    EmbeddingClient, IndexHints, SeedOptions, SeedResult, Snapshot, verify_index,
};
use tracing::{error, info, warn};

use super::CliError;

/// Options for `index build`.
#[derive(Debug, Clone, Default)]
pub struct BuildArgs {
    /// Write a snapshot here instead of the configured index.
    pub snapshot: Option<PathBuf>,
    /// Keep existing embeddings and only embed new operations.
    pub only_missing: bool,
    /// YAML file of extra phrasings per operation.
    pub hints: Option<PathBuf>,
    /// Build the documentation index instead of the operation index.
    pub docs: bool,
    /// Documentation page to download.
    pub docs_url: Option<String>,
    /// Saved documentation page to read instead of downloading.
    pub docs_file: Option<PathBuf>,
}

/// Embed the catalogue and write the index.
///
/// # Errors
///
/// Returns an error if configuration is missing, hints are invalid, the
/// index cannot be written, or any operation failed to embed.
pub async fn build(args: BuildArgs) -> Result<(), CliError> {
    if args.docs {
        return build_docs(args).await;
    }

    let openai = OpenAIConfig::from_env()?;
    let api_key = openai
        .api_key
        .clone()
        .ok_or_else(|| CliError::Usage("OPENAI_API_KEY must be set to build the index".to_string()))?;

    let registry = OperationRegistry::builtin()?;
    let hints = match &args.hints {
        Some(path) => read_hints(path, &registry).await?,
        None => IndexHints::default(),
    };
    let documents = index_documents(&registry, &hints);
    info!(operations = documents.len(), "Prepared operation documents");

    let embedder = EmbeddingClient::new(&openai)?;
    let options = SeedOptions {
        model: openai.embedding_model.clone(),
        dimensions: openai.embedding_dimensions,
        only_missing: args.only_missing,
    };

    let target = match args.snapshot {
        Some(path) => IndexSource::Snapshot(path),
        None => IndexSource::from_env()?,
    };

    let result = match target {
        IndexSource::Snapshot(path) => {
            let previous = if args.only_missing && tokio::fs::try_exists(&path).await.unwrap_or(false) {
                Some(Snapshot::read(&path).await?)
            } else {
                None
            };
            let (snapshot, result) =
                build_snapshot(&embedder, &api_key, &documents, previous, &options).await?;
            snapshot.write(&path).await?;
            info!(
                path = %path.display(),
                records = snapshot.records.len(),
                "Snapshot written"
            );
            result
        }
        IndexSource::Postgres(database_url) => {
            let pool = db::create_pool(&database_url).await?;
            info!("Connected to database");

            let result = seed_postgres(&pool, &embedder, &api_key, &documents, &options).await?;

            let keep: Vec<String> = registry.ids().map(ToString::to_string).collect();
            let removed = operation_embeddings::delete_except(&pool, &keep).await?;
            if removed > 0 {
                info!(removed, "Removed embeddings of operations no longer in the catalogue");
            }
            result
        }
    };

    report(&result);
    if result.errors.is_empty() {
        Ok(())
    } else {
        Err(CliError::Failed(format!(
            "{} operations failed to embed",
            result.errors.len()
        )))
    }
}

/// Parse the documentation page into sections, embed them and replace the
/// documentation index.
///
/// Nothing is written unless every section embedded.
async fn build_docs(args: BuildArgs) -> Result<(), CliError> {
    let openai = OpenAIConfig::from_env()?;
    let api_key = openai.api_key.clone().ok_or_else(|| {
        CliError::Usage("OPENAI_API_KEY must be set to build the documentation index".to_string())
    })?;

    let target = match args.snapshot {
        Some(path) => IndexSource::Snapshot(path),
        None => IndexSource::docs_from_env(&IndexSource::from_env()?).ok_or_else(|| {
            CliError::Usage(
                "set ROUTER_DOCS_INDEX_PATH, use a database index, or pass --snapshot".to_string(),
            )
        })?,
    };

    let html = match &args.docs_file {
        Some(path) => {
            info!(path = %path.display(), "Reading documentation page");
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| CliError::Usage(format!("Failed to read {}: {e}", path.display())))?
        }
        None => fetch_docs(args.docs_url.as_deref().unwrap_or(DEFAULT_DOCS_URL)).await?,
    };

    let sections = parse_sections(&html)?;
    if sections.is_empty() {
        return Err(CliError::Failed(
            "no <section id=...> blocks found in the documentation page".to_string(),
        ));
    }
    info!(sections = sections.len(), "Parsed documentation sections");

    let embedder = EmbeddingClient::new(&openai)?;
    let (records, result) =
        embed_sections(&embedder, &api_key, &sections, openai.embedding_dimensions).await;
    if !result.errors.is_empty() {
        for (section, err) in &result.errors {
            error!("  - {section}: {err}");
        }
        return Err(CliError::Failed(format!(
            "{} sections failed to embed; the documentation index was left unchanged",
            result.errors.len()
        )));
    }

    match target {
        IndexSource::Snapshot(path) => {
            let snapshot = doc_snapshot(records, &openai.embedding_model, openai.embedding_dimensions);
            snapshot.write(&path).await?;
            info!(path = %path.display(), sections = snapshot.records.len(), "Documentation snapshot written");
        }
        IndexSource::Postgres(database_url) => {
            let pool = db::create_pool(&database_url).await?;
            let stored = store_postgres(&pool, records, &openai.embedding_model).await?;
            info!(sections = stored, "Documentation sections stored");
        }
    }
    Ok(())
}

async fn read_hints(path: &std::path::Path, registry: &OperationRegistry) -> Result<IndexHints, CliError> {
    info!(path = %path.display(), "Loading hints from file");
    let hints = load_hints(path).await?;

    let errors = validate_hints(&hints, registry);
    if !errors.is_empty() {
        error!("Hint validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(CliError::Usage(format!("{} validation errors found", errors.len())));
    }

    info!(operations = hints.len(), "Hints validated successfully");
    Ok(hints)
}

fn report(result: &SeedResult) {
    info!("Index build complete!");
    info!("  Operations processed: {}", result.operations_processed);
    info!("  Embedded: {}", result.embedded);
    info!("  Skipped (already indexed): {}", result.skipped);

    if !result.errors.is_empty() {
        error!("  Errors: {}", result.errors.len());
        for (operation, err) in &result.errors {
            error!("    - {operation}: {err}");
        }
    }
}

/// Verify that the index only contains catalogue operations.
///
/// # Errors
///
/// Returns an error if the index cannot be opened or names unknown operations.
pub async fn check() -> Result<(), CliError> {
    let registry = OperationRegistry::builtin()?;
    let source = IndexSource::from_env()?;
    let openai = OpenAIConfig::from_env()?;
    let index = open_index(&source, &openai).await?;

    let report = verify_index(index.as_ref(), &registry).await?;
    info!(
        indexed = report.indexed,
        operations = registry.len(),
        "Index contains only catalogue operations"
    );

    if !report.unindexed.is_empty() {
        warn!("{} operations are not indexed:", report.unindexed.len());
        for id in &report.unindexed {
            warn!("  - {id}");
        }
    }

    if let Some(docs) = IndexSource::docs_from_env(&source) {
        let index = open_doc_index(&docs, &openai).await?;
        info!(
            sections = index.section_count().await?,
            "Documentation index matches the embedding model"
        );
    }
    Ok(())
}

/// Show index statistics.
///
/// # Errors
///
/// Returns an error if the index cannot be read.
pub async fn stats() -> Result<(), CliError> {
    let source = IndexSource::from_env()?;
    let docs = IndexSource::docs_from_env(&source);

    match source {
        IndexSource::Postgres(database_url) => {
            let pool = db::create_pool(&database_url).await?;
            let total = operation_embeddings::get_total_count(&pool).await?;
            let by_model = operation_embeddings::get_model_counts(&pool).await?;

            info!("Index Statistics (PostgreSQL)");
            info!("=============================");
            info!("Total embeddings: {total}");
            info!("By model:");
            for model_count in by_model {
                info!("  {}: {}", model_count.model, model_count.count);
            }
        }
        IndexSource::Snapshot(path) => {
            let snapshot = Snapshot::read(&path).await?;

            info!("Index Statistics (snapshot {})", path.display());
            info!("=============================");
            info!("Total embeddings: {}", snapshot.records.len());
            info!("Model: {} ({} dimensions)", snapshot.model, snapshot.dimensions);
            info!("Built at: {}", snapshot.built_at.to_rfc3339());
        }
    }

    match docs {
        Some(IndexSource::Postgres(database_url)) => {
            let pool = db::create_pool(&database_url).await?;
            let total = doc_sections::get_total_count(&pool).await?;
            info!("Documentation sections: {total}");
            for model_count in doc_sections::get_model_counts(&pool).await? {
                info!("  {}: {}", model_count.model, model_count.count);
            }
        }
        Some(IndexSource::Snapshot(path)) => {
            let snapshot = DocSnapshot::read(&path).await?;
            info!(
                "Documentation sections: {} ({}, {} dimensions, built {})",
                snapshot.records.len(),
                snapshot.model,
                snapshot.dimensions,
                snapshot.built_at.to_rfc3339()
            );
        }
        None => info!("No documentation index configured"),
    }
    Ok(())
}
