//! Database operations for the `operation_embeddings` table.
//!
//! One row per registry operation holds the embedding of its source text.
//! Similarity search uses pgvector's cosine distance operator (`<=>`).
//! `SQLx` has no built-in pgvector type, so vectors travel as text literals
//! cast with `::vector`.

use market_router_core::OperationId;
use sqlx::PgPool;
use tracing::{debug, instrument};

use super::RepositoryError;

/// Parameters for inserting or replacing an operation embedding.
#[derive(Debug)]
pub struct UpsertEmbedding {
    /// Operation the embedding belongs to.
    pub operation_id: OperationId,
    /// Text that was embedded.
    pub source_text: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// Embedding model name.
    pub model: String,
}

/// An operation with its cosine similarity to a query.
#[derive(Debug, Clone)]
pub struct SimilarOperation {
    /// Operation id.
    pub operation_id: OperationId,
    /// Cosine similarity (1 - cosine distance).
    pub similarity: f64,
}

/// Embedding count per model, for statistics.
#[derive(Debug)]
pub struct ModelCount {
    /// Embedding model name.
    pub model: String,
    /// Number of rows.
    pub count: i64,
}

#[derive(sqlx::FromRow)]
struct SimilarOperationRow {
    operation_id: String,
    similarity: Option<f64>,
}

#[derive(sqlx::FromRow)]
struct ModelCountRow {
    model: String,
    count: Option<i64>,
}

/// Insert an embedding, replacing any existing row for the same operation.
///
/// # Errors
///
/// Returns error if the database write fails.
#[instrument(skip(pool, params), fields(operation = %params.operation_id))]
pub async fn upsert(pool: &PgPool, params: &UpsertEmbedding) -> Result<(), RepositoryError> {
    let embedding_str = format_embedding(&params.embedding);

    sqlx::query::<sqlx::Postgres>(
        r"
        INSERT INTO operation_embeddings (operation_id, embedding, source_text, model)
        VALUES ($1, $2::vector, $3, $4)
        ON CONFLICT (operation_id) DO UPDATE
        SET embedding = EXCLUDED.embedding,
            source_text = EXCLUDED.source_text,
            model = EXCLUDED.model,
            updated_at = NOW()
        ",
    )
    .bind(params.operation_id.as_str())
    .bind(&embedding_str)
    .bind(&params.source_text)
    .bind(&params.model)
    .execute(pool)
    .await?;

    debug!("Upserted operation embedding");
    Ok(())
}

/// Nearest operations to `embedding`, most similar first.
///
/// Ties are broken by ascending operation id so results are deterministic.
///
/// # Errors
///
/// Returns error if the database query fails or a stored id is malformed.
#[instrument(skip(pool, embedding), fields(dimensions = embedding.len(), limit))]
pub async fn search_similar(
    pool: &PgPool,
    embedding: &[f32],
    limit: usize,
) -> Result<Vec<SimilarOperation>, RepositoryError> {
    let embedding_str = format_embedding(embedding);
    let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);

    let rows = sqlx::query_as::<_, SimilarOperationRow>(
        r"
        SELECT operation_id,
               1 - (embedding <=> $1::vector) AS similarity
        FROM operation_embeddings
        ORDER BY embedding <=> $1::vector, operation_id
        LIMIT $2
        ",
    )
    .bind(&embedding_str)
    .bind(limit_i64)
    .fetch_all(pool)
    .await?;

    let operations = rows
        .into_iter()
        .map(|r| {
            Ok(SimilarOperation {
                operation_id: parse_id(&r.operation_id)?,
                similarity: r.similarity.unwrap_or(0.0),
            })
        })
        .collect::<Result<Vec<_>, RepositoryError>>()?;

    debug!(count = operations.len(), "Found similar operations");
    Ok(operations)
}

/// All indexed operation ids, sorted.
///
/// # Errors
///
/// Returns error if the database query fails or a stored id is malformed.
pub async fn list_ids(pool: &PgPool) -> Result<Vec<OperationId>, RepositoryError> {
    let rows = sqlx::query_scalar::<_, String>(
        "SELECT operation_id FROM operation_embeddings ORDER BY operation_id",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(|id| parse_id(id)).collect()
}

/// Count of embeddings per model.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn get_model_counts(pool: &PgPool) -> Result<Vec<ModelCount>, RepositoryError> {
    let rows: Vec<ModelCountRow> = sqlx::query_as(
        r"
        SELECT model, COUNT(*) as count
        FROM operation_embeddings
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

/// Total number of stored embeddings.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn get_total_count(pool: &PgPool) -> Result<i64, RepositoryError> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM operation_embeddings")
        .fetch_one(pool)
        .await?;

    Ok(count.0)
}

/// Delete embeddings whose operation is no longer in the registry.
///
/// # Errors
///
/// Returns error if the database delete fails.
pub async fn delete_except(pool: &PgPool, keep: &[String]) -> Result<u64, RepositoryError> {
    let result = sqlx::query::<sqlx::Postgres>(
        "DELETE FROM operation_embeddings WHERE NOT (operation_id = ANY($1))",
    )
    .bind(keep)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

fn parse_id(raw: &str) -> Result<OperationId, RepositoryError> {
    raw.parse()
        .map_err(|e| RepositoryError::DataCorruption(format!("operation id '{raw}': {e}")))
}

/// Format an embedding vector for pgvector.
pub(crate) fn format_embedding(embedding: &[f32]) -> String {
    let values: Vec<String> = embedding.iter().map(ToString::to_string).collect();
    format!("[{}]", values.join(","))
}
