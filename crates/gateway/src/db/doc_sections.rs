//! Database operations for the `doc_sections` table.
//!
//! Rows are never updated in place: a rebuild replaces the whole table in
//! one transaction so readers see either the old or the new documentation.

use sqlx::PgPool;
use tracing::{debug, instrument};

use super::RepositoryError;
use super::operation_embeddings::{ModelCount, format_embedding};

/// A section to store.
#[derive(Debug)]
pub struct InsertSection {
    /// Section id from the documentation page.
    pub section_id: String,
    /// Section title.
    pub title: String,
    /// Section text.
    pub content: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// Embedding model name.
    pub model: String,
}

/// A section with its cosine similarity to a query.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SimilarSection {
    /// Section id.
    pub section_id: String,
    /// Section title.
    pub title: String,
    /// Section text.
    pub content: String,
    /// Cosine similarity (1 - cosine distance).
    pub similarity: Option<f64>,
}

#[derive(sqlx::FromRow)]
struct ModelCountRow {
    model: String,
    count: Option<i64>,
}

/// Replace every stored section with `sections`.
///
/// # Errors
///
/// Returns error if any statement fails; the table is then left unchanged.
#[instrument(skip_all, fields(sections = sections.len()))]
pub async fn replace_all(pool: &PgPool, sections: &[InsertSection]) -> Result<u64, RepositoryError> {
    let mut tx = pool.begin().await?;

    sqlx::query::<sqlx::Postgres>("DELETE FROM doc_sections")
        .execute(&mut *tx)
        .await?;

    let mut inserted = 0;
    for section in sections {
        sqlx::query::<sqlx::Postgres>(
            r"
            INSERT INTO doc_sections (section_id, title, content, embedding, model)
            VALUES ($1, $2, $3, $4::vector, $5)
            ",
        )
        .bind(&section.section_id)
        .bind(&section.title)
        .bind(&section.content)
        .bind(format_embedding(&section.embedding))
        .bind(&section.model)
        .execute(&mut *tx)
        .await?;
        inserted += 1;
    }

    tx.commit().await?;
    debug!(inserted, "Replaced documentation sections");
    Ok(inserted)
}

/// Nearest sections to `embedding`, most similar first.
///
/// Ties are broken by ascending section id.
///
/// # Errors
///
/// Returns error if the database query fails.
#[instrument(skip(pool, embedding), fields(dimensions = embedding.len(), limit))]
pub async fn search_similar(
    pool: &PgPool,
    embedding: &[f32],
    limit: usize,
) -> Result<Vec<SimilarSection>, RepositoryError> {
    let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);

    let rows = sqlx::query_as::<_, SimilarSection>(
        r"
        SELECT section_id, title, content,
               1 - (embedding <=> $1::vector) AS similarity
        FROM doc_sections
        ORDER BY embedding <=> $1::vector, section_id
        LIMIT $2
        ",
    )
    .bind(format_embedding(embedding))
    .bind(limit_i64)
    .fetch_all(pool)
    .await?;

    debug!(count = rows.len(), "Found similar sections");
    Ok(rows)
}

/// Count of sections per embedding model.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn get_model_counts(pool: &PgPool) -> Result<Vec<ModelCount>, RepositoryError> {
    let rows: Vec<ModelCountRow> = sqlx::query_as(
        r"
        SELECT model, COUNT(*) as count
        FROM doc_sections
        GROUP BY model
        ORDER BY model
        ",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| ModelCount {
            model: r.model,
            count: r.count.unwrap_or(0),
        })
        .collect())
}

/// Total number of stored sections.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn get_total_count(pool: &PgPool) -> Result<i64, RepositoryError> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM doc_sections")
        .fetch_one(pool)
        .await?;

    Ok(count.0)
}
