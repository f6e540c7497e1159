//! Application state shared across handlers.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{ConfigError, IndexSource, OpenAIConfig, RouterConfig, RoutingSettings};
use crate::credentials::CredentialResolver;
use crate::db::{self, doc_sections, operation_embeddings};
use crate::dispatch::HttpUpstream;
use crate::docs::{DocIndex, DocSnapshotIndex, DocTool, DocsError, PgDocIndex};
use crate::error::AppError;
use crate::openai::OpenAIClient;
use crate::registry::OperationRegistry;
use crate::router::QueryRouter;
use crate::tool_selection::seeder::ensure_single_model;
use crate::tool_selection::{
    EmbeddingClient, PgVectorIndex, SemanticIndex, SnapshotIndex, ToolSelectionError, verify_index,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    router: QueryRouter,
    docs: Option<DocTool>,
    credentials: CredentialResolver,
    tool_limit: usize,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("router", &self.inner.router)
            .field("docs", &self.inner.docs)
            .field("credentials", &self.inner.credentials)
            .field("tool_limit", &self.inner.tool_limit)
            .finish()
    }
}

impl AppState {
    /// Assemble state from already-built parts.
    #[must_use]
    pub fn new(
        router: QueryRouter,
        docs: Option<DocTool>,
        credentials: CredentialResolver,
        tool_limit: usize,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                router,
                docs,
                credentials,
                tool_limit,
            }),
        }
    }

    /// Build production state from configuration.
    ///
    /// Opens the index and refuses to continue if it names operations the
    /// registry does not know. The documentation tool is enabled only when
    /// a documentation index is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if either index cannot be opened or verified, or if
    /// a client cannot be built.
    pub async fn from_config(config: &RouterConfig) -> Result<Self, AppError> {
        let router = build_router(config).await?;
        let docs = match &config.docs {
            Some(source) => Some(build_doc_tool(source, config).await?),
            None => {
                info!("No documentation index configured; /doctool is disabled");
                None
            }
        };
        let credentials = CredentialResolver::new(
            config.market_data.api_key.clone(),
            config.openai.api_key.clone(),
            config.account_service.as_ref(),
            config.routing.credential_cache_ttl,
        )
        .map_err(|e| AppError::Internal(e.to_string()))?;

        Ok(Self::new(router, docs, credentials, config.routing.tool_limit))
    }

    /// The query router.
    #[must_use]
    pub fn router(&self) -> &QueryRouter {
        &self.inner.router
    }

    /// The documentation tool, when a documentation index is configured.
    #[must_use]
    pub fn docs(&self) -> Option<&DocTool> {
        self.inner.docs.as_ref()
    }

    /// The credential resolver.
    #[must_use]
    pub fn credentials(&self) -> &CredentialResolver {
        &self.inner.credentials
    }

    /// Number of operations exposed by `GET /tools`.
    #[must_use]
    pub fn tool_limit(&self) -> usize {
        self.inner.tool_limit
    }
}

/// Open the configured semantic index.
///
/// The index must have been built with the embedding model (and, for a
/// snapshot, the vector size) that queries will use.
///
/// # Errors
///
/// Returns an error if the database is unreachable, the snapshot cannot be
/// read, or the stored embeddings come from another model.
pub async fn open_index(
    source: &IndexSource,
    openai: &OpenAIConfig,
) -> Result<Arc<dyn SemanticIndex>, ToolSelectionError> {
    match source {
        IndexSource::Postgres(url) => {
            let pool = db::create_pool(url).await?;
            info!("Database pool created");
            let stored = operation_embeddings::get_model_counts(&pool).await?;
            ensure_single_model(&stored, &openai.embedding_model)?;
            Ok(Arc::new(PgVectorIndex::new(pool)))
        }
        IndexSource::Snapshot(path) => {
            let index = SnapshotIndex::load(path).await?;
            index.ensure_built_with(&openai.embedding_model, openai.embedding_dimensions)?;
            info!(path = %path.display(), operations = index.len(), "Snapshot index loaded");
            Ok(Arc::new(index))
        }
    }
}

/// Open the configured documentation index.
///
/// Like [`open_index`], the stored embeddings must come from the query
/// embedding model.
///
/// # Errors
///
/// Returns an error if the database is unreachable, the snapshot cannot be
/// read, or the stored embeddings come from another model.
pub async fn open_doc_index(
    source: &IndexSource,
    openai: &OpenAIConfig,
) -> Result<Arc<dyn DocIndex>, DocsError> {
    match source {
        IndexSource::Postgres(url) => {
            let pool = db::create_pool(url).await?;
            let stored = doc_sections::get_model_counts(&pool).await?;
            ensure_single_model(&stored, &openai.embedding_model)?;
            let sections: i64 = stored.iter().map(|c| c.count).sum();
            if sections == 0 {
                warn!("Documentation table is empty; run `mr-cli index build --docs`");
            }
            info!(sections, "Documentation index opened");
            Ok(Arc::new(PgDocIndex::new(pool)))
        }
        IndexSource::Snapshot(path) => {
            let index = DocSnapshotIndex::load(path).await?;
            index.ensure_built_with(&openai.embedding_model, openai.embedding_dimensions)?;
            info!(path = %path.display(), sections = index.len(), "Documentation snapshot loaded");
            Ok(Arc::new(index))
        }
    }
}

async fn build_doc_tool(source: &IndexSource, config: &RouterConfig) -> Result<DocTool, AppError> {
    let index = open_doc_index(source, &config.openai).await?;
    let embedder = Arc::new(EmbeddingClient::new(&config.openai)?);
    let chat = Arc::new(OpenAIClient::new(&config.openai)?);
    Ok(DocTool::new(
        embedder,
        index,
        chat,
        config.routing.request_timeout,
    ))
}

/// The fallback operation must exist, or every candidate list would carry
/// an id the plan gate silently drops.
fn check_fallback(registry: &OperationRegistry, settings: &RoutingSettings) -> Result<(), ConfigError> {
    if registry.contains(settings.fallback_operation.as_str()) {
        return Ok(());
    }
    Err(ConfigError::InvalidEnvVar(
        "ROUTER_FALLBACK_OPERATION".to_string(),
        format!("unknown operation {}", settings.fallback_operation),
    ))
}

/// Build a [`QueryRouter`] with production collaborators.
///
/// Verifies that the index only contains registry operations; operations
/// missing from the index are logged.
///
/// # Errors
///
/// Returns an error if the catalogue is invalid, the fallback operation is
/// unknown, the index cannot be opened, was built with another embedding
/// model or names unknown operations, or a client cannot be built.
pub async fn build_router(config: &RouterConfig) -> Result<QueryRouter, AppError> {
    let registry = Arc::new(OperationRegistry::builtin()?);
    check_fallback(&registry, &config.routing)?;
    let index = open_index(&config.index, &config.openai).await?;

    let report = verify_index(index.as_ref(), &registry).await?;
    if !report.unindexed.is_empty() {
        warn!(
            count = report.unindexed.len(),
            operations = ?report.unindexed,
            "Operations missing from the index will never be retrieved"
        );
    }
    info!(
        operations = registry.len(),
        indexed = report.indexed,
        "Index verified"
    );

    let embedder = Arc::new(EmbeddingClient::new(&config.openai)?);
    let chat = Arc::new(OpenAIClient::new(&config.openai)?);
    let upstream = Arc::new(HttpUpstream::new(&config.market_data)?);

    Ok(QueryRouter::new(
        registry,
        embedder,
        index,
        chat,
        upstream,
        &config.routing,
    ))
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use chrono::Utc;
    use market_router_core::OperationId;

    use super::*;
    use crate::config::MarketDataConfig;
    use crate::docs::{DocRecord, DocSnapshot};
    use crate::tool_selection::{EmbeddingRecord, Snapshot};

    const MODEL: &str = "test-embedding";
    const DIMENSIONS: usize = 4;

    fn config(index: PathBuf, docs: Option<PathBuf>) -> RouterConfig {
        RouterConfig {
            host: [127, 0, 0, 1].into(),
            port: 0,
            index: IndexSource::Snapshot(index),
            docs: docs.map(IndexSource::Snapshot),
            market_data: MarketDataConfig {
                base_url: "http://127.0.0.1:9".to_string(),
                api_key: None,
            },
            openai: OpenAIConfig {
                api_key: None,
                base_url: "http://127.0.0.1:9".to_string(),
                chat_model: "gpt-4o-mini".to_string(),
                embedding_model: MODEL.to_string(),
                embedding_dimensions: DIMENSIONS,
            },
            routing: RoutingSettings::default(),
            account_service: None,
            log_json: false,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
            tls: None,
        }
    }

    async fn write_snapshot(path: &Path, model: &str, dimensions: usize) {
        Snapshot {
            model: model.to_string(),
            dimensions,
            built_at: Utc::now(),
            records: vec![EmbeddingRecord {
                operation_id: OperationId::from_static("GetTimeSeries"),
                vector: vec![1.0; dimensions],
                source_text: "time series".to_string(),
            }],
        }
        .write(path)
        .await
        .expect("write snapshot");
    }

    async fn write_doc_snapshot(path: &Path, model: &str, dimensions: usize) {
        DocSnapshot {
            model: model.to_string(),
            dimensions,
            built_at: Utc::now(),
            records: vec![DocRecord {
                section_id: "time-series".to_string(),
                title: "Time Series".to_string(),
                content: "Returns OHLCV bars.".to_string(),
                vector: vec![1.0; dimensions],
            }],
        }
        .write(path)
        .await
        .expect("write documentation snapshot");
    }

    #[tokio::test]
    async fn test_unknown_fallback_rejected_before_index_opens() {
        let mut config = config(PathBuf::from("/nonexistent/index.json"), None);
        config.routing.fallback_operation = OperationId::from_static("GetWeather");

        let err = build_router(&config).await.expect_err("unknown fallback");
        assert!(matches!(
            err,
            AppError::Config(ConfigError::InvalidEnvVar(ref var, ref msg))
                if var == "ROUTER_FALLBACK_OPERATION" && msg.contains("GetWeather")
        ));
    }

    #[tokio::test]
    async fn test_snapshot_of_another_size_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("index.json");
        write_snapshot(&path, MODEL, 3).await;

        let err = build_router(&config(path, None)).await.expect_err("size mismatch");
        assert!(matches!(
            err,
            AppError::Index(ToolSelectionError::Index(ref msg)) if msg.contains("3 dimensions")
        ));
    }

    #[tokio::test]
    async fn test_snapshot_of_another_model_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("index.json");
        write_snapshot(&path, "text-embedding-3-small", DIMENSIONS).await;

        let err = build_router(&config(path, None)).await.expect_err("model mismatch");
        assert!(matches!(
            err,
            AppError::Index(ToolSelectionError::Index(ref msg)) if msg.contains("text-embedding-3-small")
        ));
    }

    #[tokio::test]
    async fn test_matching_snapshot_builds_state() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("index.json");
        write_snapshot(&path, MODEL, DIMENSIONS).await;

        let state = AppState::from_config(&config(path, None)).await.expect("state");
        assert!(state.docs().is_none());
        assert_eq!(state.tool_limit(), RoutingSettings::default().tool_limit);
    }

    #[tokio::test]
    async fn test_documentation_snapshot_enables_doc_tool() {
        let dir = tempfile::tempdir().expect("temp dir");
        let index = dir.path().join("index.json");
        let docs = dir.path().join("docs.json");
        write_snapshot(&index, MODEL, DIMENSIONS).await;
        write_doc_snapshot(&docs, MODEL, DIMENSIONS).await;

        let state = AppState::from_config(&config(index, Some(docs))).await.expect("state");
        let tool = state.docs().expect("doc tool");
        assert_eq!(tool.index().section_count().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn test_documentation_snapshot_of_another_model_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let index = dir.path().join("index.json");
        let docs = dir.path().join("docs.json");
        write_snapshot(&index, MODEL, DIMENSIONS).await;
        write_doc_snapshot(&docs, "text-embedding-3-small", DIMENSIONS).await;

        let err = AppState::from_config(&config(index, Some(docs)))
            .await
            .expect_err("model mismatch");
        assert!(matches!(err, AppError::Docs(DocsError::Index(_))));
    }
}
