//! Markdown rendering of an upstream payload.

use std::sync::Arc;

use askama::Template;
use secrecy::SecretString;
use serde_json::Value;
use tracing::instrument;

use crate::openai::{ChatMessage, ChatModel, OpenAIError};

/// System prompt template for payload summaries.
#[derive(Template)]
#[template(path = "prompts/summarize.txt")]
struct SummarizePrompt;

fn render_system_prompt() -> String {
    SummarizePrompt
        .render()
        .unwrap_or_else(|_| String::from("Summarize the data as a Markdown report."))
}

/// Renders JSON payloads as Markdown with a second LLM pass.
#[derive(Clone)]
pub struct Summarizer {
    chat: Arc<dyn ChatModel>,
}

impl std::fmt::Debug for Summarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Summarizer").finish_non_exhaustive()
    }
}

impl Summarizer {
    /// Create a summarizer backed by `chat`.
    #[must_use]
    pub fn new(chat: Arc<dyn ChatModel>) -> Self {
        Self { chat }
    }

    /// Render `payload` as Markdown answering `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the chat call fails or the reply has no text.
    #[instrument(skip_all, fields(query_len = query.len()))]
    pub async fn summarize(
        &self,
        api_key: &SecretString,
        query: &str,
        payload: &Value,
    ) -> Result<String, OpenAIError> {
        let messages = vec![
            ChatMessage::system(render_system_prompt()),
            ChatMessage::user(format!("User query:\n{query}")),
            ChatMessage::user(format!("Data:\n{payload}")),
        ];

        let response = self.chat.chat(api_key, messages, None, None).await?;
        response
            .first_message()
            .and_then(ChatMessage::text)
            .map(ToString::to_string)
            .ok_or_else(|| OpenAIError::Parse("empty summary".to_string()))
    }
}
