//! Search over documentation section embeddings.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, instrument};

use super::DocsError;
use crate::db::doc_sections;
use crate::tool_selection::{cosine, norm};

/// One matching section.
#[derive(Debug, Clone, PartialEq)]
pub struct DocHit {
    /// Section id.
    pub section_id: String,
    /// Section title.
    pub title: String,
    /// Section text.
    pub content: String,
    /// Cosine similarity to the query.
    pub similarity: f64,
}

/// Nearest-neighbour search over documentation sections.
#[async_trait]
pub trait DocIndex: Send + Sync {
    /// The `k` sections closest to `embedding`, most similar first.
    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<DocHit>, DocsError>;

    /// Number of indexed sections.
    async fn section_count(&self) -> Result<usize, DocsError>;
}

/// Documentation index stored in `PostgreSQL` with pgvector.
#[derive(Debug, Clone)]
pub struct PgDocIndex {
    pool: PgPool,
}

impl PgDocIndex {
    /// Wrap a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocIndex for PgDocIndex {
    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<DocHit>, DocsError> {
        let rows = doc_sections::search_similar(&self.pool, embedding, k).await?;
        Ok(rows
            .into_iter()
            .map(|r| DocHit {
                section_id: r.section_id,
                title: r.title,
                content: r.content,
                similarity: r.similarity.unwrap_or(0.0),
            })
            .collect())
    }

    async fn section_count(&self) -> Result<usize, DocsError> {
        let count = doc_sections::get_total_count(&self.pool).await?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

/// A section and its embedding as stored in a snapshot file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocRecord {
    /// Section id.
    pub section_id: String,
    /// Section title.
    pub title: String,
    /// Section text, also the embedded text.
    pub content: String,
    /// Embedding vector.
    pub vector: Vec<f32>,
}

/// On-disk documentation snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocSnapshot {
    /// Embedding model used for every record.
    pub model: String,
    /// Vector size shared by every record.
    pub dimensions: usize,
    /// When the snapshot was written.
    pub built_at: DateTime<Utc>,
    /// Sections in page order.
    pub records: Vec<DocRecord>,
}

impl DocSnapshot {
    /// Read a snapshot from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn read(path: &Path) -> Result<Self, DocsError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DocsError::Io(format!("Failed to read {}: {e}", path.display())))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the snapshot as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn write(&self, path: &Path) -> Result<(), DocsError> {
        let content = serde_json::to_vec(self)?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| DocsError::Io(format!("Failed to write {}: {e}", path.display())))
    }
}

/// In-memory documentation index built from a [`DocSnapshot`].
#[derive(Debug, Clone)]
pub struct DocSnapshotIndex {
    model: String,
    dimensions: usize,
    entries: Vec<(DocRecord, f32)>,
}

impl DocSnapshotIndex {
    /// Build an index from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate section ids or vectors whose size
    /// differs from the snapshot's declared dimensions.
    pub fn from_snapshot(snapshot: DocSnapshot) -> Result<Self, DocsError> {
        let mut seen = HashSet::with_capacity(snapshot.records.len());
        let mut entries = Vec::with_capacity(snapshot.records.len());

        for record in snapshot.records {
            if record.vector.len() != snapshot.dimensions {
                return Err(DocsError::Index(format!(
                    "section {} has {} dimensions, expected {}",
                    record.section_id,
                    record.vector.len(),
                    snapshot.dimensions
                )));
            }
            if !seen.insert(record.section_id.clone()) {
                return Err(DocsError::Index(format!(
                    "duplicate section {}",
                    record.section_id
                )));
            }
            let record_norm = norm(&record.vector);
            entries.push((record, record_norm));
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
    pub async fn load(path: &Path) -> Result<Self, DocsError> {
        Self::from_snapshot(DocSnapshot::read(path).await?)
    }

    /// Embedding model the snapshot was built with.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Fail unless the snapshot was built with `model` at `dimensions`.
    ///
    /// # Errors
    ///
    /// Returns [`DocsError::Index`] naming both settings.
    pub fn ensure_built_with(&self, model: &str, dimensions: usize) -> Result<(), DocsError> {
        if self.model == model && self.dimensions == dimensions {
            return Ok(());
        }
        Err(DocsError::Index(format!(
            "documentation snapshot was built with {} ({} dimensions) but queries use {model} ({dimensions} dimensions)",
            self.model, self.dimensions
        )))
    }

    /// Number of sections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot has no sections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl DocIndex for DocSnapshotIndex {
    #[instrument(skip(self, embedding), fields(k, sections = self.entries.len()))]
    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<DocHit>, DocsError> {
        if embedding.len() != self.dimensions {
            return Err(DocsError::Index(format!(
                "query embedding has {} dimensions, documentation snapshot has {}",
                embedding.len(),
                self.dimensions
            )));
        }
        let query_norm = norm(embedding);
        let mut hits: Vec<DocHit> = self
            .entries
            .iter()
            .map(|(record, record_norm)| DocHit {
                section_id: record.section_id.clone(),
                title: record.title.clone(),
                content: record.content.clone(),
                similarity: cosine(embedding, query_norm, &record.vector, *record_norm),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.section_id.cmp(&b.section_id))
        });
        hits.truncate(k);

        debug!(count = hits.len(), "Documentation search complete");
        Ok(hits)
    }

    async fn section_count(&self) -> Result<usize, DocsError> {
        Ok(self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, vector: Vec<f32>) -> DocRecord {
        DocRecord {
            section_id: id.to_string(),
            title: id.to_uppercase(),
            content: format!("{id} content"),
            vector,
        }
    }

    fn snapshot(records: Vec<DocRecord>) -> DocSnapshot {
        DocSnapshot {
            model: "test-model".to_string(),
            dimensions: 2,
            built_at: Utc::now(),
            records,
        }
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity_then_id() {
        let index = DocSnapshotIndex::from_snapshot(snapshot(vec![
            record("quote", vec![0.0, 1.0]),
            record("time-series", vec![1.0, 0.0]),
            record("eod", vec![2.0, 0.0]),
            record("macd", vec![0.7, 0.7]),
        ]))
        .expect("index");

        let hits = index.search(&[1.0, 0.0], 3).await.expect("search");
        let ids: Vec<&str> = hits.iter().map(|h| h.section_id.as_str()).collect();
        assert_eq!(ids, vec!["eod", "time-series", "macd"]);
        assert_eq!(hits[0].title, "EOD");
        assert_eq!(hits[0].content, "eod content");
    }

    #[tokio::test]
    async fn test_search_rejects_query_of_another_size() {
        let index =
            DocSnapshotIndex::from_snapshot(snapshot(vec![record("quote", vec![1.0, 0.0])])).expect("index");
        let result = index.search(&[1.0, 0.0, 0.0], 5).await;
        assert!(matches!(result, Err(DocsError::Index(ref msg)) if msg.contains("3 dimensions")));
    }

    #[test]
    fn test_snapshot_validation() {
        assert!(matches!(
            DocSnapshotIndex::from_snapshot(snapshot(vec![record("quote", vec![1.0])])),
            Err(DocsError::Index(_))
        ));
        assert!(matches!(
            DocSnapshotIndex::from_snapshot(snapshot(vec![
                record("quote", vec![1.0, 0.0]),
                record("quote", vec![0.0, 1.0]),
            ])),
            Err(DocsError::Index(_))
        ));
    }

    #[tokio::test]
    async fn test_write_then_load() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("docs.json");
        snapshot(vec![record("macd", vec![0.5, 0.5])])
            .write(&path)
            .await
            .expect("write");

        let index = DocSnapshotIndex::load(&path).await.expect("load");
        assert_eq!(index.len(), 1);
        assert_eq!(index.section_count().await.expect("count"), 1);
        assert!(index.ensure_built_with("test-model", 2).is_ok());
        assert!(index.ensure_built_with("test-model", 3).is_err());
        assert!(index.ensure_built_with("other-model", 2).is_err());
    }
}
