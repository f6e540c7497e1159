//! Offline documentation index building.
//!
//! Sections are embedded from their text in batches. The result replaces
//! the previous index entirely, either as a snapshot file or as the
//! contents of the `doc_sections` table.

use chrono::Utc;
use secrecy::SecretString;
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use super::{DocRecord, DocSection, DocSnapshot, DocsError};
use crate::db::doc_sections::{self, InsertSection};
use crate::tool_selection::seeder::EMBEDDING_BATCH_SIZE;
use crate::tool_selection::{Embedder, SeedResult};

/// Embed every section.
///
/// Failed batches and vectors of the wrong size are recorded in
/// [`SeedResult::errors`] against their section id; the remaining sections
/// are still embedded.
#[instrument(skip_all, fields(sections = sections.len(), dimensions))]
pub async fn embed_sections(
    embedder: &dyn Embedder,
    api_key: &SecretString,
    sections: &[DocSection],
    dimensions: usize,
) -> (Vec<DocRecord>, SeedResult) {
    let mut records = Vec::with_capacity(sections.len());
    let mut result = SeedResult {
        operations_processed: sections.len(),
        ..SeedResult::default()
    };

    for chunk in sections.chunks(EMBEDDING_BATCH_SIZE) {
        let texts: Vec<&str> = chunk.iter().map(|s| s.content.as_str()).collect();
        let vectors = match embedder.embed_batch(api_key, &texts).await {
            Ok(vectors) => vectors,
            Err(e) => {
                warn!(error = %e, "Batch processing error");
                result
                    .errors
                    .extend(chunk.iter().map(|s| (s.section_id.clone(), e.to_string())));
                continue;
            }
        };

        for (section, vector) in chunk.iter().zip(vectors) {
            if vector.len() != dimensions {
                result.errors.push((
                    section.section_id.clone(),
                    format!("embedding has {} dimensions, expected {dimensions}", vector.len()),
                ));
                continue;
            }
            records.push(DocRecord {
                section_id: section.section_id.clone(),
                title: section.title.clone(),
                content: section.content.clone(),
                vector,
            });
            result.embedded += 1;
        }
    }

    info!(
        embedded = result.embedded,
        sections = result.operations_processed,
        errors = result.errors.len(),
        "Documentation embedding complete"
    );
    (records, result)
}

/// Wrap embedded sections in a snapshot.
#[must_use]
pub fn snapshot(records: Vec<DocRecord>, model: &str, dimensions: usize) -> DocSnapshot {
    DocSnapshot {
        model: model.to_string(),
        dimensions,
        built_at: Utc::now(),
        records,
    }
}

/// Replace the `doc_sections` table with `records`.
///
/// # Errors
///
/// Returns an error if the transaction fails; the table is then unchanged.
pub async fn store_postgres(pool: &PgPool, records: Vec<DocRecord>, model: &str) -> Result<u64, DocsError> {
    let rows: Vec<InsertSection> = records
        .into_iter()
        .map(|r| InsertSection {
            section_id: r.section_id,
            title: r.title,
            content: r.content,
            embedding: r.vector,
            model: model.to_string(),
        })
        .collect();
    Ok(doc_sections::replace_all(pool, &rows).await?)
}
