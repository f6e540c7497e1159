//! Markdown answers to documentation questions.

use std::sync::Arc;
use std::time::Duration;

use askama::Template;
use market_router_core::DocAnswer;
use secrecy::SecretString;
use tracing::{Instrument, info, info_span, instrument, warn};
use uuid::Uuid;

use super::{DocHit, DocIndex, DocsError};
use crate::openai::{ChatMessage, ChatModel, OpenAIError};
use crate::tool_selection::Embedder;

/// Sections handed to the model per question.
pub const DOC_TOP_K: usize = 15;

const SECTION_SEPARATOR: &str = "\n\n---\n\n";

/// System prompt template for documentation answers.
#[derive(Template)]
#[template(path = "prompts/doc_answer.txt")]
struct DocAnswerPrompt;

fn render_system_prompt() -> String {
    DocAnswerPrompt.render().unwrap_or_else(|_| {
        String::from("Answer the question from the documentation sections, in Markdown.")
    })
}

/// Answers questions from the closest documentation sections.
#[derive(Clone)]
pub struct DocTool {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn DocIndex>,
    chat: Arc<dyn ChatModel>,
    top_k: usize,
    timeout: Duration,
}

impl std::fmt::Debug for DocTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocTool")
            .field("top_k", &self.top_k)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl DocTool {
    /// Create a tool searching `index` with [`DOC_TOP_K`] sections per answer.
    #[must_use]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn DocIndex>,
        chat: Arc<dyn ChatModel>,
        timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            index,
            chat,
            top_k: DOC_TOP_K,
            timeout,
        }
    }

    /// Use `top_k` sections per answer.
    #[must_use]
    pub const fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// The documentation index.
    #[must_use]
    pub fn index(&self) -> &dyn DocIndex {
        self.index.as_ref()
    }

    /// Answer `query` as Markdown.
    ///
    /// Never fails: a failed search leaves `top_candidates` empty, a failed
    /// model call keeps them, and both are reported in `error`.
    pub async fn answer(&self, api_key: &SecretString, query: &str) -> DocAnswer {
        let span = info_span!("doc_answer", request_id = %Uuid::new_v4());

        async {
            let mut answer = DocAnswer::new(query);
            let outcome = tokio::time::timeout(self.timeout, self.run(api_key, &mut answer)).await;
            let error = match outcome {
                Ok(Ok(())) => {
                    info!(sections = answer.top_candidates.len(), "Documentation answer ready");
                    return answer;
                }
                Ok(Err(e)) => e,
                Err(_) => DocsError::DeadlineExceeded(self.timeout),
            };
            warn!(error = %error, "Documentation answer failed");
            answer.result = None;
            answer.error = Some(error.to_string());
            answer
        }
        .instrument(span)
        .await
    }

    async fn run(&self, api_key: &SecretString, answer: &mut DocAnswer) -> Result<(), DocsError> {
        let hits = self
            .search(api_key, &answer.query)
            .await
            .map_err(|e| DocsError::Search(e.to_string()))?;
        answer.top_candidates = hits.iter().map(|h| h.title.clone()).collect();

        let markdown = self
            .summarize(api_key, &answer.query, &hits)
            .await
            .map_err(|e| DocsError::Summarize(e.to_string()))?;
        answer.result = Some(markdown);
        Ok(())
    }

    #[instrument(skip_all, fields(k = self.top_k))]
    async fn search(&self, api_key: &SecretString, query: &str) -> Result<Vec<DocHit>, DocsError> {
        let embedding = self.embedder.embed(api_key, query).await?;
        self.index.search(&embedding, self.top_k).await
    }

    async fn summarize(
        &self,
        api_key: &SecretString,
        query: &str,
        hits: &[DocHit],
    ) -> Result<String, OpenAIError> {
        let documentation = hits
            .iter()
            .map(|h| h.content.as_str())
            .collect::<Vec<_>>()
            .join(SECTION_SEPARATOR);
        let messages = vec![
            ChatMessage::system(render_system_prompt()),
            ChatMessage::user(format!("User query:\n{query}")),
            ChatMessage::user(format!("Documentation:\n{documentation}")),
        ];

        let response = self.chat.chat(api_key, messages, None, None).await?;
        response
            .first_message()
            .and_then(ChatMessage::text)
            .map(ToString::to_string)
            .ok_or_else(|| OpenAIError::Parse("empty answer".to_string()))
    }
}
