//! LLM function selection over the allowed candidate operations.
//!
//! The model sees one function schema per allowed operation and must call
//! exactly one of them (`tool_choice = "required"`). Its plain-text preamble
//! is kept as the motivation for the choice.

use std::sync::Arc;

use askama::Template;
use market_router_core::OperationId;
use secrecy::SecretString;
use serde_json::{Map, Value};
use tracing::{info, instrument};

use super::ToolSelectionError;
use crate::dispatch::flatten_arguments;
use crate::openai::{ChatMessage, ChatModel, ToolChoice, ToolDefinition};
use crate::registry::Operation;

/// System prompt template for operation selection.
#[derive(Template)]
#[template(path = "prompts/select_operation.txt")]
struct SelectOperationPrompt {
    operation_count: usize,
}

/// Render the system prompt template.
fn render_system_prompt(operation_count: usize) -> String {
    SelectOperationPrompt { operation_count }
        .render()
        .unwrap_or_else(|_| {
            String::from("Select the most appropriate function and call it with valid parameters.")
        })
}

/// The model's choice.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Chosen operation.
    pub operation_id: OperationId,
    /// Arguments, normalized to a flat object.
    pub arguments: Map<String, Value>,
    /// The model's short justification, when it gave one.
    pub motivation: Option<String>,
}

/// Chooses one operation for a query.
#[derive(Clone)]
pub struct ToolSelector {
    chat: Arc<dyn ChatModel>,
}

impl std::fmt::Debug for ToolSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSelector").finish_non_exhaustive()
    }
}

impl ToolSelector {
    /// Create a selector backed by `chat`.
    #[must_use]
    pub fn new(chat: Arc<dyn ChatModel>) -> Self {
        Self { chat }
    }

    /// Ask the model to pick one of `allowed` for `query`.
    ///
    /// # Errors
    ///
    /// - [`ToolSelectionError::NoCandidates`] if `allowed` is empty (the model is not called)
    /// - [`ToolSelectionError::Llm`] if the chat request fails
    /// - [`ToolSelectionError::Selection`] if the reply has no tool call, names
    ///   an operation outside `allowed`, or carries arguments that are not a JSON object
    #[instrument(skip(self, api_key, query, allowed), fields(candidates = allowed.len()))]
    pub async fn choose(
        &self,
        api_key: &SecretString,
        query: &str,
        allowed: &[&Operation],
    ) -> Result<Selection, ToolSelectionError> {
        if allowed.is_empty() {
            return Err(ToolSelectionError::NoCandidates);
        }

        let tools: Vec<ToolDefinition> = allowed
            .iter()
            .map(|op| ToolDefinition::function(op.function_definition()))
            .collect();
        let messages = vec![
            ChatMessage::system(render_system_prompt(allowed.len())),
            ChatMessage::user(query),
        ];

        let response = self
            .chat
            .chat(api_key, messages, Some(tools), Some(ToolChoice::Required))
            .await?;

        let message = response.first_message().ok_or_else(|| {
            ToolSelectionError::Selection("LLM did not return valid tool call: no choices".to_string())
        })?;
        let call = message.tool_calls.first().ok_or_else(|| {
            ToolSelectionError::Selection("LLM did not return valid tool call: no tool call".to_string())
        })?;

        let name = call.function.name.as_str();
        let operation = allowed
            .iter()
            .find(|op| op.id == name)
            .ok_or_else(|| {
                ToolSelectionError::Selection(format!(
                    "LLM selected '{name}', which is not among the candidate operations"
                ))
            })?;

        let arguments = parse_arguments(&call.function.arguments)?;
        let motivation = message.text().map(ToString::to_string);

        info!(operation = %operation.id, "Operation selected");

        Ok(Selection {
            operation_id: operation.id.clone(),
            arguments: flatten_arguments(operation, arguments),
            motivation,
        })
    }
}

fn parse_arguments(raw: &str) -> Result<Map<String, Value>, ToolSelectionError> {
    let raw = if raw.trim().is_empty() { "{}" } else { raw };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ToolSelectionError::Selection(format!(
            "LLM did not return valid tool call: arguments must be a JSON object, got {other}"
        ))),
        Err(e) => Err(ToolSelectionError::Selection(format!(
            "LLM did not return valid tool call: {e}"
        ))),
    }
}
