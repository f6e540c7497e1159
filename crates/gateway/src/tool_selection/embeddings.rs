//! `OpenAI` embedding client for semantic similarity search.
//!
//! Queries and operation descriptions are embedded with the same model
//! (`text-embedding-3-large` by default) so they can be compared with cosine
//! similarity in the semantic index.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::ToolSelectionError;
use crate::config::OpenAIConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Turns text into embedding vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed several texts in one request, preserving order.
    async fn embed_batch(
        &self,
        api_key: &SecretString,
        texts: &[&str],
    ) -> Result<Vec<Vec<f32>>, ToolSelectionError>;

    /// Embed a single text.
    async fn embed(&self, api_key: &SecretString, text: &str) -> Result<Vec<f32>, ToolSelectionError> {
        self.embed_batch(api_key, &[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ToolSelectionError::InvalidResponse("No embedding data in response".to_string())
            })
    }
}

/// Client for generating text embeddings via an `OpenAI`-compatible API.
#[derive(Clone)]
pub struct EmbeddingClient {
    client: reqwest::Client,
    embeddings_url: String,
    model: String,
    dimensions: usize,
}

impl std::fmt::Debug for EmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingClient")
            .field("embeddings_url", &self.embeddings_url)
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

impl EmbeddingClient {
    /// Create a new embedding client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &OpenAIConfig) -> Result<Self, ToolSelectionError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            embeddings_url: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            model: config.embedding_model.clone(),
            dimensions: config.embedding_dimensions,
        })
    }

    /// Embedding model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Expected vector size.
    #[must_use]
    pub const fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    /// Generate embeddings for multiple texts in a single request.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails, returns the wrong number
    /// of vectors, or returns vectors of the wrong size.
    #[instrument(skip(self, api_key, texts), fields(count = texts.len(), model = %self.model))]
    async fn embed_batch(
        &self,
        api_key: &SecretString,
        texts: &[&str],
    ) -> Result<Vec<Vec<f32>>, ToolSelectionError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.dimensions,
        };

        let response = self
            .client
            .post(&self.embeddings_url)
            .bearer_auth(api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolSelectionError::Embedding(format!(
                "OpenAI API error ({status}): {body}"
            )));
        }

        let response: EmbeddingResponse = response.json().await?;
        order_embeddings(response, texts.len(), self.dimensions)
    }
}

/// Sort response rows by `index` and check count and size.
fn order_embeddings(
    response: EmbeddingResponse,
    expected: usize,
    dimensions: usize,
) -> Result<Vec<Vec<f32>>, ToolSelectionError> {
    let mut data = response.data;
    data.sort_by_key(|d| d.index);

    if data.len() != expected {
        return Err(ToolSelectionError::InvalidResponse(format!(
            "Expected {expected} embeddings, got {}",
            data.len()
        )));
    }

    for (i, row) in data.iter().enumerate() {
        if row.embedding.len() != dimensions {
            return Err(ToolSelectionError::InvalidResponse(format!(
                "Embedding {i} has {} dimensions, expected {dimensions}",
                row.embedding.len()
            )));
        }
    }

    Ok(data.into_iter().map(|d| d.embedding).collect())
}

/// Request body for text embedding.
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    dimensions: usize,
}

/// Response from `OpenAI` embeddings API.
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

/// Single embedding data in response.
#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}
