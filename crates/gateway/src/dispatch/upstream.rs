//! HTTP client for the market-data REST API.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{DispatchError, UpstreamRequest};
use crate::config::MarketDataConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Performs an upstream call and returns its JSON body.
#[async_trait]
pub trait UpstreamCaller: Send + Sync {
    /// Execute `request`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Upstream`] on transport failures, non-2xx
    /// statuses and unparseable bodies.
    async fn call(&self, request: &UpstreamRequest) -> Result<Value, DispatchError>;
}

/// `reqwest`-backed upstream client.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpUpstream {
    /// Create a client for the configured base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(config: &MarketDataConfig) -> Result<Self, DispatchError> {
        let base_url = Url::parse(&format!("{}/", config.base_url.trim_end_matches('/')))
            .map_err(|e| DispatchError::upstream(None, format!("invalid base URL: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| DispatchError::upstream(None, e.to_string()))?;

        Ok(Self { client, base_url })
    }

    /// Full URL for `request`, including the `apikey` parameter.
    fn url_for(&self, request: &UpstreamRequest) -> Result<Url, DispatchError> {
        let mut url = self
            .base_url
            .join(request.path.trim_start_matches('/'))
            .map_err(|e| DispatchError::upstream(None, format!("invalid path '{}': {e}", request.path)))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &request.query {
                pairs.append_pair(name, value);
            }
            pairs.append_pair("apikey", request.api_key.expose_secret());
        }
        Ok(url)
    }
}

#[async_trait]
impl UpstreamCaller for HttpUpstream {
    #[instrument(skip(self, request), fields(path = %request.path))]
    async fn call(&self, request: &UpstreamRequest) -> Result<Value, DispatchError> {
        let url = self.url_for(request)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DispatchError::upstream(None, e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DispatchError::upstream(Some(status.as_u16()), e.without_url().to_string()))?;

        if !status.is_success() {
            warn!(status = %status, "Upstream returned an error status");
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(ToString::to_string))
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            return Err(DispatchError::upstream(Some(status.as_u16()), message));
        }

        debug!(bytes = body.len(), "Upstream call succeeded");
        serde_json::from_str(&body)
            .map_err(|e| DispatchError::upstream(Some(status.as_u16()), format!("invalid JSON body: {e}")))
    }
}
