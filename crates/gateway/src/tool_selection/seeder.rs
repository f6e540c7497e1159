//! Offline index building.
//!
//! Each registry operation is embedded from its source text (id, description
//! and parameter summary), optionally enriched with hand-written hints read
//! from YAML, and written to `PostgreSQL` or a snapshot file.
//!
//! ## Hints format
//!
//! ```yaml
//! GetTimeSeries:
//!   summary: "OHLCV bars for any symbol and interval"
//!   phrasings:
//!     - "Show me TSLA 1 minute candles"
//!     - "Daily price history of Apple"
//!
//! GetMarketMovers:
//!   phrasings:
//!     - "Top gainers today"
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::path::Path;

use chrono::Utc;
use market_router_core::OperationId;
use secrecy::SecretString;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{debug, info, instrument, warn};

use super::{Embedder, EmbeddingRecord, Snapshot, ToolSelectionError};
use crate::db::operation_embeddings::{self, ModelCount, UpsertEmbedding};
use crate::registry::OperationRegistry;

/// Maximum batch size for embedding requests.
pub const EMBEDDING_BATCH_SIZE: usize = 50;

/// Extra text for one operation.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct OperationHint {
    /// Replacement one-line summary appended to the description.
    #[serde(default)]
    pub summary: Option<String>,
    /// Example user phrasings that should map to the operation.
    #[serde(default)]
    pub phrasings: Vec<String>,
}

/// Hints keyed by operation id.
pub type IndexHints = HashMap<String, OperationHint>;

/// Text to embed for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDocument {
    /// Operation id.
    pub operation_id: OperationId,
    /// Text sent to the embedding model.
    pub source_text: String,
}

/// Embedding model settings for a build.
#[derive(Debug, Clone)]
pub struct SeedOptions {
    /// Embedding model name, stored with every record.
    pub model: String,
    /// Vector size.
    pub dimensions: usize,
    /// Skip operations that already have an embedding.
    pub only_missing: bool,
}

/// Result of an index build.
#[derive(Debug, Default)]
pub struct SeedResult {
    /// Number of operations embedded and written.
    pub embedded: u64,
    /// Number of operations skipped (already indexed).
    pub skipped: u64,
    /// Number of operations considered.
    pub operations_processed: usize,
    /// Errors encountered (`operation_id`, error message).
    pub errors: Vec<(String, String)>,
}

/// Read hints from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
#[instrument(fields(path = %path.display()))]
pub async fn load_hints(path: &Path) -> Result<IndexHints, ToolSelectionError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ToolSelectionError::Io(format!("Failed to read {}: {}", path.display(), e)))?;

    serde_yaml::from_str(&content)
        .map_err(|e| ToolSelectionError::Config(format!("Failed to parse YAML: {e}")))
}

/// Validate hints against the registry.
///
/// Returns one message per problem; an empty list means the hints are usable.
#[must_use]
pub fn validate_hints(hints: &IndexHints, registry: &OperationRegistry) -> Vec<String> {
    let mut errors = Vec::new();

    let mut names: Vec<&String> = hints.keys().collect();
    names.sort();

    for name in names {
        let Some(hint) = hints.get(name) else {
            continue;
        };

        if !registry.contains(name) {
            errors.push(format!("Unknown operation: {name}"));
        }

        if hint.summary.is_none() && hint.phrasings.is_empty() {
            errors.push(format!("No summary or phrasings provided for operation: {name}"));
        }

        for (i, phrasing) in hint.phrasings.iter().enumerate() {
            if phrasing.trim().is_empty() {
                errors.push(format!(
                    "Empty phrasing at index {i} for operation: {name}"
                ));
            }
        }
    }

    errors
}

/// Fail if any stored embedding was produced by a model other than `model`.
///
/// An empty table passes.
///
/// # Errors
///
/// Returns [`ToolSelectionError::Index`] listing the foreign models.
pub fn ensure_single_model(stored: &[ModelCount], model: &str) -> Result<(), ToolSelectionError> {
    let foreign: Vec<String> = stored
        .iter()
        .filter(|c| c.model != model && c.count > 0)
        .map(|c| format!("{} ({} rows)", c.model, c.count))
        .collect();
    if foreign.is_empty() {
        return Ok(());
    }
    Err(ToolSelectionError::Index(format!(
        "index holds embeddings from {}, not {model}",
        foreign.join(", ")
    )))
}

/// Source text for every registry operation, in catalogue order.
#[must_use]
pub fn index_documents(registry: &OperationRegistry, hints: &IndexHints) -> Vec<IndexDocument> {
    registry
        .operations()
        .iter()
        .map(|op| {
            let mut source_text = op.source_text();
            if let Some(hint) = hints.get(op.id.as_str()) {
                if let Some(summary) = &hint.summary {
                    let _ = write!(source_text, "\nSummary: {summary}");
                }
                if !hint.phrasings.is_empty() {
                    let _ = write!(source_text, "\nExamples: {}", hint.phrasings.join("; "));
                }
            }
            IndexDocument {
                operation_id: op.id.clone(),
                source_text,
            }
        })
        .collect()
}

/// Embed `documents` and upsert them into `operation_embeddings`.
///
/// Batches that fail are recorded in [`SeedResult::errors`] and the build
/// continues with the remaining batches.
///
/// With `only_missing`, existing rows are kept only if every one of them
/// was embedded with `options.model`.
///
/// # Errors
///
/// Returns an error if listing existing rows fails or, with `only_missing`,
/// if the table holds embeddings from another model.
#[instrument(skip_all, fields(documents = documents.len(), only_missing = options.only_missing))]
pub async fn seed_postgres(
    pool: &PgPool,
    embedder: &dyn Embedder,
    api_key: &SecretString,
    documents: &[IndexDocument],
    options: &SeedOptions,
) -> Result<SeedResult, ToolSelectionError> {
    let existing: HashSet<OperationId> = if options.only_missing {
        ensure_single_model(&operation_embeddings::get_model_counts(pool).await?, &options.model)?;
        operation_embeddings::list_ids(pool).await?.into_iter().collect()
    } else {
        HashSet::new()
    };

    let mut result = SeedResult {
        operations_processed: documents.len(),
        ..SeedResult::default()
    };
    let pending = partition(documents, &existing, &mut result);

    info!(pending = pending.len(), "Embedding operations");

    for chunk in pending.chunks(EMBEDDING_BATCH_SIZE) {
        let Some(vectors) = embed_chunk(embedder, api_key, chunk, &mut result).await else {
            continue;
        };

        for (doc, embedding) in chunk.iter().zip(vectors) {
            let params = UpsertEmbedding {
                operation_id: doc.operation_id.clone(),
                source_text: doc.source_text.clone(),
                embedding,
                model: options.model.clone(),
            };
            match operation_embeddings::upsert(pool, &params).await {
                Ok(()) => {
                    result.embedded += 1;
                    debug!(operation = %doc.operation_id, "Stored embedding");
                }
                Err(e) => {
                    result.errors.push((doc.operation_id.to_string(), e.to_string()));
                    warn!(operation = %doc.operation_id, error = %e, "Failed to store embedding");
                }
            }
        }
    }

    log_result(&result);
    Ok(result)
}

/// Embed `documents` into a snapshot.
///
/// With `only_missing`, records from `previous` whose operation is still in
/// `documents` are carried over and only the rest are embedded.
///
/// # Errors
///
/// Returns an error if `previous` was built with a different model or size.
#[instrument(skip_all, fields(documents = documents.len(), only_missing = options.only_missing))]
pub async fn build_snapshot(
    embedder: &dyn Embedder,
    api_key: &SecretString,
    documents: &[IndexDocument],
    previous: Option<Snapshot>,
    options: &SeedOptions,
) -> Result<(Snapshot, SeedResult), ToolSelectionError> {
    let mut records: Vec<EmbeddingRecord> = Vec::new();

    if options.only_missing
        && let Some(previous) = previous
    {
        if previous.model != options.model || previous.dimensions != options.dimensions {
            return Err(ToolSelectionError::Index(format!(
                "existing snapshot was built with {} ({} dimensions), not {} ({} dimensions)",
                previous.model, previous.dimensions, options.model, options.dimensions
            )));
        }
        let wanted: HashSet<&OperationId> = documents.iter().map(|d| &d.operation_id).collect();
        records.extend(
            previous
                .records
                .into_iter()
                .filter(|r| wanted.contains(&r.operation_id)),
        );
    }

    let existing: HashSet<OperationId> = records.iter().map(|r| r.operation_id.clone()).collect();
    let mut result = SeedResult {
        operations_processed: documents.len(),
        ..SeedResult::default()
    };
    let pending = partition(documents, &existing, &mut result);

    info!(pending = pending.len(), "Embedding operations");

    for chunk in pending.chunks(EMBEDDING_BATCH_SIZE) {
        let Some(vectors) = embed_chunk(embedder, api_key, chunk, &mut result).await else {
            continue;
        };
        for (doc, vector) in chunk.iter().zip(vectors) {
            records.push(EmbeddingRecord {
                operation_id: doc.operation_id.clone(),
                vector,
                source_text: doc.source_text.clone(),
            });
            result.embedded += 1;
        }
    }

    records.sort_by(|a, b| a.operation_id.cmp(&b.operation_id));
    log_result(&result);

    Ok((
        Snapshot {
            model: options.model.clone(),
            dimensions: options.dimensions,
            built_at: Utc::now(),
            records,
        },
        result,
    ))
}

fn partition<'a>(
    documents: &'a [IndexDocument],
    existing: &HashSet<OperationId>,
    result: &mut SeedResult,
) -> Vec<&'a IndexDocument> {
    documents
        .iter()
        .filter(|doc| {
            if existing.contains(&doc.operation_id) {
                result.skipped += 1;
                debug!(operation = %doc.operation_id, "Skipping indexed operation");
                false
            } else {
                true
            }
        })
        .collect()
}

/// Embed one batch; on failure record the error for every operation in it.
async fn embed_chunk(
    embedder: &dyn Embedder,
    api_key: &SecretString,
    chunk: &[&IndexDocument],
    result: &mut SeedResult,
) -> Option<Vec<Vec<f32>>> {
    let texts: Vec<&str> = chunk.iter().map(|d| d.source_text.as_str()).collect();
    match embedder.embed_batch(api_key, &texts).await {
        Ok(vectors) => Some(vectors),
        Err(e) => {
            warn!(error = %e, "Batch processing error");
            result.errors.extend(
                chunk
                    .iter()
                    .map(|d| (d.operation_id.to_string(), e.to_string())),
            );
            None
        }
    }
}

fn log_result(result: &SeedResult) {
    info!(
        embedded = result.embedded,
        skipped = result.skipped,
        operations = result.operations_processed,
        errors = result.errors.len(),
        "Index build complete"
    );
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::registry::Operation;

    /// Embeds each text as `[len, 1]` and counts batches.
    #[derive(Default)]
    struct LengthEmbedder {
        batches: AtomicUsize,
    }

    #[async_trait]
    #[allow(clippy::cast_precision_loss)]
    impl Embedder for LengthEmbedder {
        async fn embed_batch(
            &self,
            _api_key: &SecretString,
            texts: &[&str],
        ) -> Result<Vec<Vec<f32>>, ToolSelectionError> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    fn registry() -> OperationRegistry {
        OperationRegistry::new(vec![
            Operation::new("GetTimeSeries", "time_series", "Time series"),
            Operation::new("GetQuote", "quote", "Quote"),
        ])
        .expect("registry")
    }

    fn options(only_missing: bool) -> SeedOptions {
        SeedOptions {
            model: "test-model".to_string(),
            dimensions: 2,
            only_missing,
        }
    }

    #[test]
    fn test_parse_yaml_hints() {
        let yaml = r#"
GetTimeSeries:
  summary: "OHLCV bars"
  phrasings:
    - "Show me TSLA 1 minute candles"
    - "Daily history of Apple"

GetQuote:
  phrasings:
    - "Quote for MSFT"
"#;

        let hints: IndexHints = serde_yaml::from_str(yaml).expect("valid YAML");
        assert_eq!(hints.len(), 2);
        let series = hints.get("GetTimeSeries").expect("GetTimeSeries exists");
        assert_eq!(series.summary.as_deref(), Some("OHLCV bars"));
        assert_eq!(series.phrasings.len(), 2);
        assert!(hints.get("GetQuote").expect("GetQuote exists").summary.is_none());
    }

    #[test]
    fn test_validate_hints() {
        let mut hints = IndexHints::new();
        hints.insert("GetGhost".to_string(), OperationHint::default());
        hints.insert(
            "GetQuote".to_string(),
            OperationHint {
                summary: None,
                phrasings: vec!["  ".to_string()],
            },
        );

        let errors = validate_hints(&hints, &registry());
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("Unknown operation: GetGhost")));
        assert!(errors.iter().any(|e| e.contains("Empty phrasing at index 0")));
    }

    #[test]
    fn test_index_documents_include_hints() {
        let mut hints = IndexHints::new();
        hints.insert(
            "GetQuote".to_string(),
            OperationHint {
                summary: Some("Latest quote".to_string()),
                phrasings: vec!["Quote for MSFT".to_string(), "AAPL bid".to_string()],
            },
        );

        let documents = index_documents(&registry(), &hints);
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].operation_id, "GetTimeSeries");
        assert!(documents[1].source_text.starts_with("GetQuote: Quote"));
        assert!(documents[1].source_text.contains("Summary: Latest quote"));
        assert!(documents[1].source_text.contains("Examples: Quote for MSFT; AAPL bid"));
    }

    #[tokio::test]
    async fn test_build_snapshot_embeds_everything() {
        let embedder = LengthEmbedder::default();
        let documents = index_documents(&registry(), &IndexHints::new());

        let (snapshot, result) = build_snapshot(
            &embedder,
            &SecretString::from("sk-test"),
            &documents,
            None,
            &options(false),
        )
        .await
        .expect("snapshot");

        assert_eq!(result.embedded, 2);
        assert_eq!(result.skipped, 0);
        assert_eq!(embedder.batches.load(Ordering::SeqCst), 1);
        let ids: Vec<&str> = snapshot.records.iter().map(|r| r.operation_id.as_str()).collect();
        assert_eq!(ids, vec!["GetQuote", "GetTimeSeries"]);
    }

    #[tokio::test]
    async fn test_build_snapshot_only_missing_reuses_records() {
        let embedder = LengthEmbedder::default();
        let documents = index_documents(&registry(), &IndexHints::new());
        let previous = Snapshot {
            model: "test-model".to_string(),
            dimensions: 2,
            built_at: Utc::now(),
            records: vec![
                EmbeddingRecord {
                    operation_id: OperationId::from_static("GetQuote"),
                    vector: vec![9.0, 9.0],
                    source_text: "old".to_string(),
                },
                EmbeddingRecord {
                    operation_id: OperationId::from_static("GetRetired"),
                    vector: vec![1.0, 1.0],
                    source_text: "gone".to_string(),
                },
            ],
        };

        let (snapshot, result) = build_snapshot(
            &embedder,
            &SecretString::from("sk-test"),
            &documents,
            Some(previous),
            &options(true),
        )
        .await
        .expect("snapshot");

        assert_eq!(result.embedded, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(snapshot.records.len(), 2);
        assert_eq!(snapshot.records[0].vector, vec![9.0, 9.0]);
    }

    #[tokio::test]
    async fn test_build_snapshot_rejects_model_change() {
        let documents = index_documents(&registry(), &IndexHints::new());
        let previous = Snapshot {
            model: "other-model".to_string(),
            dimensions: 2,
            built_at: Utc::now(),
            records: Vec::new(),
        };

        let result = build_snapshot(
            &LengthEmbedder::default(),
            &SecretString::from("sk-test"),
            &documents,
            Some(previous),
            &options(true),
        )
        .await;
        assert!(matches!(result, Err(ToolSelectionError::Index(_))));
    }

    fn counts(rows: &[(&str, i64)]) -> Vec<ModelCount> {
        rows.iter()
            .map(|(model, count)| ModelCount {
                model: (*model).to_string(),
                count: *count,
            })
            .collect()
    }

    #[test]
    fn test_single_model_accepts_matching_rows() {
        assert!(ensure_single_model(&[], "test-model").is_ok());
        assert!(ensure_single_model(&counts(&[("test-model", 12)]), "test-model").is_ok());
    }

    #[test]
    fn test_single_model_rejects_mixed_rows() {
        let stored = counts(&[("old-model", 40), ("test-model", 3)]);
        let err = ensure_single_model(&stored, "test-model").expect_err("mixed models");
        assert!(matches!(err, ToolSelectionError::Index(ref msg) if msg.contains("old-model (40 rows)")));
    }

    #[test]
    fn test_seed_result_default() {
        let result = SeedResult::default();
        assert_eq!(result.embedded, 0);
        assert!(result.errors.is_empty());
    }
}
