//! `OpenAI` chat completions integration.
//!
//! Used twice per routing request at most: once to force a single function
//! call over the candidate operations, and once (optionally) to render the
//! upstream JSON as a Markdown report.

mod client;
mod error;
pub mod types;

use async_trait::async_trait;
use secrecy::SecretString;

pub use client::OpenAIClient;
pub use error::{ApiError, ApiErrorResponse, OpenAIError};
pub use types::{
    ChatCompletionResponse, ChatMessage, FunctionDefinition, ToolCall, ToolChoice,
    ToolDefinition,
};

/// A chat model that supports function calling.
///
/// Implemented by [`OpenAIClient`]; tests substitute scripted fakes.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one chat completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be parsed.
    async fn chat(
        &self,
        api_key: &SecretString,
        messages: Vec<ChatMessage>,
        tools: Option<Vec<ToolDefinition>>,
        tool_choice: Option<ToolChoice>,
    ) -> Result<ChatCompletionResponse, OpenAIError>;
}
