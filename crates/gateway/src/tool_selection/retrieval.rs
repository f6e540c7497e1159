//! Query embedding and top-K candidate retrieval.

use std::sync::Arc;

use market_router_core::OperationId;
use secrecy::SecretString;
use tracing::{debug, instrument};

use super::{Embedder, SemanticIndex, ToolSelectionError};

/// Embeds a query and returns the closest operations plus the fallback.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn SemanticIndex>,
    top_k: usize,
    fallback: OperationId,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("top_k", &self.top_k)
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

impl Retriever {
    /// Create a retriever.
    #[must_use]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn SemanticIndex>,
        top_k: usize,
        fallback: OperationId,
    ) -> Self {
        Self {
            embedder,
            index,
            top_k,
            fallback,
        }
    }

    /// The index this retriever searches.
    #[must_use]
    pub fn index(&self) -> &Arc<dyn SemanticIndex> {
        &self.index
    }

    /// Candidate ids for `query`, most similar first.
    ///
    /// The fallback operation is appended when the search did not return it.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or the index search fails.
    #[instrument(skip(self, api_key, query), fields(query_len = query.len(), top_k = self.top_k))]
    pub async fn retrieve(
        &self,
        api_key: &SecretString,
        query: &str,
    ) -> Result<Vec<OperationId>, ToolSelectionError> {
        let embedding = self.embedder.embed(api_key, query).await?;
        let hits = self.index.search(&embedding, self.top_k).await?;

        if let Some(best) = hits.first() {
            debug!(operation = %best.operation_id, similarity = best.similarity, "Closest operation");
        }

        let mut candidates: Vec<OperationId> = hits.into_iter().map(|h| h.operation_id).collect();
        if !candidates.contains(&self.fallback) {
            candidates.push(self.fallback.clone());
        }
        Ok(candidates)
    }
}
