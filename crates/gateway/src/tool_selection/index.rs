//! Semantic index of operation embeddings.
//!
//! Two backends share the [`SemanticIndex`] trait:
//!
//! - [`PgVectorIndex`] - `operation_embeddings` table queried with pgvector
//! - [`SnapshotIndex`] - exact cosine scan over a JSON snapshot held in memory
//!
//! Both order hits by descending cosine similarity and break ties by
//! ascending operation id, so identical inputs always give identical output.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_router_core::OperationId;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, instrument};

use super::ToolSelectionError;
use crate::db::operation_embeddings;
use crate::registry::OperationRegistry;

/// One search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Matched operation.
    pub operation_id: OperationId,
    /// Cosine similarity to the query.
    pub similarity: f64,
}

/// Nearest-neighbour search over operation embeddings.
#[async_trait]
pub trait SemanticIndex: Send + Sync {
    /// The `k` operations closest to `embedding`, most similar first.
    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<SearchHit>, ToolSelectionError>;

    /// Every operation id present in the index.
    async fn operation_ids(&self) -> Result<Vec<OperationId>, ToolSelectionError>;

    /// Cheap liveness check used by the readiness endpoint.
    async fn probe(&self) -> Result<(), ToolSelectionError> {
        self.operation_ids().await.map(|_| ())
    }
}

// =============================================================================
// pgvector backend
// =============================================================================

/// Index stored in `PostgreSQL` with pgvector.
#[derive(Debug, Clone)]
pub struct PgVectorIndex {
    pool: PgPool,
}

impl PgVectorIndex {
    /// Wrap a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SemanticIndex for PgVectorIndex {
    #[instrument(skip(self, embedding), fields(k))]
    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<SearchHit>, ToolSelectionError> {
        let rows = operation_embeddings::search_similar(&self.pool, embedding, k).await?;
        Ok(rows
            .into_iter()
            .map(|r| SearchHit {
                operation_id: r.operation_id,
                similarity: r.similarity,
            })
            .collect())
    }

    async fn operation_ids(&self) -> Result<Vec<OperationId>, ToolSelectionError> {
        Ok(operation_embeddings::list_ids(&self.pool).await?)
    }

    async fn probe(&self) -> Result<(), ToolSelectionError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// =============================================================================
// Snapshot backend
// =============================================================================

/// An embedding record as stored in a snapshot file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Operation the vector belongs to.
    pub operation_id: OperationId,
    /// Embedding vector.
    pub vector: Vec<f32>,
    /// Text that was embedded.
    pub source_text: String,
}

/// On-disk snapshot format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Embedding model used for every record.
    pub model: String,
    /// Vector size shared by every record.
    pub dimensions: usize,
    /// When the snapshot was written.
    pub built_at: DateTime<Utc>,
    /// One record per operation.
    pub records: Vec<EmbeddingRecord>,
}

impl Snapshot {
    /// Read a snapshot from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn read(path: &Path) -> Result<Self, ToolSelectionError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ToolSelectionError::Io(format!("Failed to read {}: {e}", path.display()))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the snapshot as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn write(&self, path: &Path) -> Result<(), ToolSelectionError> {
        let content = serde_json::to_vec(self)?;
        tokio::fs::write(path, content).await.map_err(|e| {
            ToolSelectionError::Io(format!("Failed to write {}: {e}", path.display()))
        })
    }
}

/// In-memory index built from a [`Snapshot`].
#[derive(Debug, Clone)]
pub struct SnapshotIndex {
    model: String,
    dimensions: usize,
    entries: Vec<SnapshotEntry>,
}

#[derive(Debug, Clone)]
struct SnapshotEntry {
    operation_id: OperationId,
    vector: Vec<f32>,
    norm: f32,
}

impl SnapshotIndex {
    /// Build an index from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate ids or vectors whose size differs from
    /// the snapshot's declared dimensions.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, ToolSelectionError> {
        let mut seen = HashSet::with_capacity(snapshot.records.len());
        let mut entries = Vec::with_capacity(snapshot.records.len());

        for record in snapshot.records {
            if record.vector.len() != snapshot.dimensions {
                return Err(ToolSelectionError::Index(format!(
                    "{} has {} dimensions, expected {}",
                    record.operation_id,
                    record.vector.len(),
                    snapshot.dimensions
                )));
            }
            if !seen.insert(record.operation_id.clone()) {
                return Err(ToolSelectionError::Index(format!(
                    "duplicate record for {}",
                    record.operation_id
                )));
            }
            entries.push(SnapshotEntry {
                norm: norm(&record.vector),
                operation_id: record.operation_id,
                vector: record.vector,
            });
        }

        Ok(Self {
            model: snapshot.model,
            dimensions: snapshot.dimensions,
            entries,
        })
    }

    /// Load a snapshot file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub async fn load(path: &Path) -> Result<Self, ToolSelectionError> {
        Self::from_snapshot(Snapshot::read(path).await?)
    }

    /// Embedding model the snapshot was built with.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Vector size of every record.
    #[must_use]
    pub const fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Fail unless the snapshot was built with `model` at `dimensions`.
    ///
    /// Query vectors from another model live in a different space, so the
    /// similarities would be meaningless even at the same size.
    ///
    /// # Errors
    ///
    /// Returns [`ToolSelectionError::Index`] naming both settings.
    pub fn ensure_built_with(&self, model: &str, dimensions: usize) -> Result<(), ToolSelectionError> {
        if self.model == model && self.dimensions == dimensions {
            return Ok(());
        }
        Err(ToolSelectionError::Index(format!(
            "snapshot was built with {} ({} dimensions) but queries use {model} ({dimensions} dimensions)",
            self.model, self.dimensions
        )))
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SemanticIndex for SnapshotIndex {
    #[instrument(skip(self, embedding), fields(k, records = self.entries.len()))]
    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<SearchHit>, ToolSelectionError> {
        if embedding.len() != self.dimensions {
            return Err(ToolSelectionError::Index(format!(
                "query embedding has {} dimensions, snapshot has {}",
                embedding.len(),
                self.dimensions
            )));
        }
        let query_norm = norm(embedding);
        let mut hits: Vec<SearchHit> = self
            .entries
            .iter()
            .map(|entry| SearchHit {
                operation_id: entry.operation_id.clone(),
                similarity: cosine(embedding, query_norm, &entry.vector, entry.norm),
            })
            .collect();

        hits.sort_by(rank_order);
        hits.truncate(k);

        debug!(count = hits.len(), "Snapshot search complete");
        Ok(hits)
    }

    async fn operation_ids(&self) -> Result<Vec<OperationId>, ToolSelectionError> {
        let mut ids: Vec<OperationId> = self.entries.iter().map(|e| e.operation_id.clone()).collect();
        ids.sort();
        Ok(ids)
    }

    async fn probe(&self) -> Result<(), ToolSelectionError> {
        Ok(())
    }
}

/// Descending similarity, then ascending id. NaN sorts last.
fn rank_order(a: &SearchHit, b: &SearchHit) -> Ordering {
    match (a.similarity.is_nan(), b.similarity.is_nan()) {
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => b
            .similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal),
    }
    .then_with(|| a.operation_id.cmp(&b.operation_id))
}

pub(crate) fn norm(vector: &[f32]) -> f32 {
    vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Callers guarantee equal lengths.
pub(crate) fn cosine(a: &[f32], a_norm: f32, b: &[f32], b_norm: f32) -> f64 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    f64::from(dot / (a_norm * b_norm))
}

// =============================================================================
// Startup precondition
// =============================================================================

/// Outcome of comparing index contents with the registry.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexReport {
    /// Number of ids in the index.
    pub indexed: usize,
    /// Registry operations absent from the index.
    pub unindexed: Vec<OperationId>,
}

/// Check that every indexed id names a registry operation.
///
/// Registry operations missing from the index are returned in the report;
/// the caller decides whether to warn.
///
/// # Errors
///
/// Returns [`ToolSelectionError::Index`] listing unknown ids, or the
/// index's own error if it cannot be listed.
pub async fn verify_index(
    index: &dyn SemanticIndex,
    registry: &OperationRegistry,
) -> Result<IndexReport, ToolSelectionError> {
    let ids = index.operation_ids().await?;
    check_ids(&ids, registry)
}

fn check_ids(ids: &[OperationId], registry: &OperationRegistry) -> Result<IndexReport, ToolSelectionError> {
    let unknown: Vec<&str> = ids
        .iter()
        .filter(|id| !registry.contains(id.as_str()))
        .map(OperationId::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(ToolSelectionError::Index(format!(
            "index contains operations missing from the registry: {}",
            unknown.join(", ")
        )));
    }

    let indexed: HashSet<&OperationId> = ids.iter().collect();
    let unindexed = registry
        .ids()
        .filter(|id| !indexed.contains(id))
        .cloned()
        .collect();

    Ok(IndexReport {
        indexed: ids.len(),
        unindexed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Operation;

    fn record(id: &'static str, vector: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord {
            operation_id: OperationId::from_static(id),
            vector,
            source_text: id.to_string(),
        }
    }

    fn snapshot(records: Vec<EmbeddingRecord>) -> Snapshot {
        Snapshot {
            model: "test-model".to_string(),
            dimensions: 2,
            built_at: Utc::now(),
            records,
        }
    }

    fn ids(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.operation_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let index = SnapshotIndex::from_snapshot(snapshot(vec![
            record("GetQuote", vec![0.0, 1.0]),
            record("GetPrice", vec![1.0, 0.0]),
            record("GetEod", vec![0.7, 0.7]),
        ]))
        .expect("index");

        let hits = index.search(&[1.0, 0.1], 3).await.expect("search");
        assert_eq!(ids(&hits), vec!["GetPrice", "GetEod", "GetQuote"]);
        assert!(hits[0].similarity > hits[1].similarity);
    }

    #[tokio::test]
    async fn test_search_breaks_ties_by_id() {
        let index = SnapshotIndex::from_snapshot(snapshot(vec![
            record("GetQuote", vec![1.0, 0.0]),
            record("GetEod", vec![2.0, 0.0]),
            record("GetPrice", vec![1.0, 0.0]),
        ]))
        .expect("index");

        let first = index.search(&[1.0, 0.0], 2).await.expect("search");
        let second = index.search(&[1.0, 0.0], 2).await.expect("search");
        assert_eq!(ids(&first), vec!["GetEod", "GetPrice"]);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_zero_query_vector_scores_zero() {
        let index =
            SnapshotIndex::from_snapshot(snapshot(vec![record("GetQuote", vec![1.0, 0.0])])).expect("index");
        let hits = index.search(&[0.0, 0.0], 5).await.expect("search");
        assert_eq!(hits.len(), 1);
        assert!(hits[0].similarity.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_search_rejects_query_of_another_size() {
        let index = SnapshotIndex::from_snapshot(snapshot(vec![
            record("GetZeta", vec![1.0, 0.0]),
            record("GetAlpha", vec![0.0, 1.0]),
        ]))
        .expect("index");

        let result = index.search(&[1.0, 0.0, 0.0], 2).await;
        assert!(matches!(result, Err(ToolSelectionError::Index(ref msg)) if msg.contains("3 dimensions")));
        assert!(result.is_err_and(|e| e.is_retrieval()));
    }

    #[test]
    fn test_ensure_built_with() {
        let index =
            SnapshotIndex::from_snapshot(snapshot(vec![record("GetQuote", vec![1.0, 0.0])])).expect("index");
        assert!(index.ensure_built_with("test-model", 2).is_ok());
        assert!(matches!(
            index.ensure_built_with("other-model", 2),
            Err(ToolSelectionError::Index(_))
        ));
        assert!(matches!(
            index.ensure_built_with("test-model", 3),
            Err(ToolSelectionError::Index(_))
        ));
    }

    #[test]
    fn test_snapshot_rejects_wrong_dimensions() {
        let result = SnapshotIndex::from_snapshot(snapshot(vec![record("GetQuote", vec![1.0])]));
        assert!(matches!(result, Err(ToolSelectionError::Index(_))));
    }

    #[test]
    fn test_snapshot_rejects_duplicates() {
        let result = SnapshotIndex::from_snapshot(snapshot(vec![
            record("GetQuote", vec![1.0, 0.0]),
            record("GetQuote", vec![0.0, 1.0]),
        ]));
        assert!(matches!(result, Err(ToolSelectionError::Index(_))));
    }

    #[tokio::test]
    async fn test_snapshot_write_then_load() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("index.json");
        let original = snapshot(vec![record("GetQuote", vec![0.5, 0.5])]);
        original.write(&path).await.expect("write");

        let index = SnapshotIndex::load(&path).await.expect("load");
        assert_eq!(index.model(), "test-model");
        assert_eq!(index.dimensions(), 2);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_check_ids_rejects_unknown_operations() {
        let registry = OperationRegistry::new(vec![Operation::new("GetQuote", "quote", "Quote")])
            .expect("registry");
        let result = check_ids(&[OperationId::from_static("GetGhost")], &registry);
        assert!(matches!(result, Err(ToolSelectionError::Index(ref msg)) if msg.contains("GetGhost")));
    }

    #[test]
    fn test_check_ids_reports_unindexed() {
        let registry = OperationRegistry::new(vec![
            Operation::new("GetQuote", "quote", "Quote"),
            Operation::new("GetPrice", "price", "Price"),
        ])
        .expect("registry");
        let report = check_ids(&[OperationId::from_static("GetQuote")], &registry).expect("report");
        assert_eq!(report.indexed, 1);
        assert_eq!(report.unindexed, vec![OperationId::from_static("GetPrice")]);
    }
}
