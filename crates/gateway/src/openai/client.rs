//! `OpenAI` chat completions client.
//!
//! The API key is passed per call: each routing request brings its own
//! credentials, so the client itself holds none.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument};

use crate::config::OpenAIConfig;

use super::ChatModel;
use super::error::{ApiErrorResponse, OpenAIError};
use super::types::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ToolChoice, ToolDefinition,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// `OpenAI`-compatible chat completions client.
#[derive(Clone)]
pub struct OpenAIClient {
    inner: Arc<OpenAIClientInner>,
}

struct OpenAIClientInner {
    client: reqwest::Client,
    completions_url: String,
    model: String,
}

impl OpenAIClient {
    /// Create a new client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `OpenAIError::Config` if the HTTP client cannot be built.
    pub fn new(config: &OpenAIConfig) -> Result<Self, OpenAIError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| OpenAIError::Config(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(OpenAIClientInner {
                client,
                completions_url: format!(
                    "{}/chat/completions",
                    config.base_url.trim_end_matches('/')
                ),
                model: config.chat_model.clone(),
            }),
        })
    }

    /// Model used for completions.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.inner.model
    }

    /// Handle a completed HTTP response.
    async fn handle_response(
        response: reqwest::Response,
    ) -> Result<ChatCompletionResponse, OpenAIError> {
        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;
            serde_json::from_str(&body)
                .map_err(|e| OpenAIError::Parse(format!("Failed to parse response: {e}")))
        } else {
            Err(Self::handle_error_status(status, response).await)
        }
    }

    /// Handle an error status code.
    async fn handle_error_status(
        status: reqwest::StatusCode,
        response: reqwest::Response,
    ) -> OpenAIError {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return OpenAIError::RateLimited(retry_after);
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return OpenAIError::Unauthorized("Invalid API key".to_string());
        }

        match response.text().await {
            Ok(body) => match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api_error) => OpenAIError::Api {
                    error_type: api_error
                        .error
                        .error_type
                        .unwrap_or_else(|| "unknown".to_string()),
                    message: api_error.error.message,
                },
                Err(_) => OpenAIError::Api {
                    error_type: status.as_u16().to_string(),
                    message: body,
                },
            },
            Err(e) => OpenAIError::Http(e),
        }
    }
}

#[async_trait]
impl ChatModel for OpenAIClient {
    #[instrument(
        skip(self, api_key, messages, tools),
        fields(model = %self.inner.model, tool_count = tools.as_ref().map_or(0, Vec::len))
    )]
    async fn chat(
        &self,
        api_key: &SecretString,
        messages: Vec<ChatMessage>,
        tools: Option<Vec<ToolDefinition>>,
        tool_choice: Option<ToolChoice>,
    ) -> Result<ChatCompletionResponse, OpenAIError> {
        let request = ChatCompletionRequest {
            model: self.inner.model.clone(),
            messages,
            tools,
            tool_choice,
            temperature: 0.0,
        };

        let response = self
            .inner
            .client
            .post(&self.inner.completions_url)
            .bearer_auth(api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        let completion = Self::handle_response(response).await?;
        if let Some(usage) = &completion.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Chat completion finished"
            );
        }
        Ok(completion)
    }
}
