//! Per-request credential resolution.
//!
//! Each request needs a market-data key and an LLM key. They come from, in
//! order of precedence per field:
//!
//! 1. Pre-shared keys in configuration (`MARKET_DATA_API_KEY`, `OPENAI_API_KEY`)
//! 2. A bearer token exchanged with the account service, cached per token
//! 3. Header pass-through: `Authorization: <scheme> <market-data key>` and
//!    `X-OpenAPI-Key: <LLM key>`
//!
//! Documentation answers only need the LLM key; see
//! [`CredentialResolver::resolve_llm_key`].

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use moka::future::Cache;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::AccountServiceConfig;

/// Header carrying the caller's LLM key.
pub const LLM_KEY_HEADER: &str = "x-openapi-key";

const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);
const CACHE_CAPACITY: u64 = 10_000;

/// Errors that can occur while resolving credentials.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    /// The `Authorization` header is absent or not `<scheme> <token>`.
    #[error("Bad or missing authorization header")]
    BadAuthorization,

    /// A key could not be found in configuration or headers.
    #[error("{0} is not provided")]
    Missing(&'static str),

    /// The account service rejected the token or failed.
    #[error("credential exchange failed: {0}")]
    Exchange(String),
}

/// Keys used for one request.
#[derive(Clone)]
pub struct Credentials {
    /// Market-data API key.
    pub market_data: SecretString,
    /// LLM provider API key.
    pub llm: SecretString,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("market_data", &"[REDACTED]")
            .field("llm", &"[REDACTED]")
            .finish()
    }
}

/// Account service response.
#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    market_data_api_key: Option<String>,
    llm_api_key: Option<String>,
}

/// Keys returned by the account service for one token.
#[derive(Clone, Default)]
struct ExchangedKeys {
    market_data: Option<SecretString>,
    llm: Option<SecretString>,
}

/// Resolves [`Credentials`] from configuration and request headers.
#[derive(Clone)]
pub struct CredentialResolver {
    inner: Arc<CredentialResolverInner>,
}

struct CredentialResolverInner {
    market_data_key: Option<SecretString>,
    llm_key: Option<SecretString>,
    account_service: Option<AccountService>,
}

struct AccountService {
    client: reqwest::Client,
    url: String,
    cache: Cache<String, ExchangedKeys>,
}

impl std::fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("market_data_key", &self.inner.market_data_key.as_ref().map(|_| "[REDACTED]"))
            .field("llm_key", &self.inner.llm_key.as_ref().map(|_| "[REDACTED]"))
            .field(
                "account_service",
                &self.inner.account_service.as_ref().map(|s| s.url.as_str()),
            )
            .finish()
    }
}

impl CredentialResolver {
    /// Create a resolver.
    ///
    /// # Errors
    ///
    /// Returns an error if the account service HTTP client cannot be built.
    pub fn new(
        market_data_key: Option<SecretString>,
        llm_key: Option<SecretString>,
        account_service: Option<&AccountServiceConfig>,
        cache_ttl: Duration,
    ) -> Result<Self, CredentialError> {
        let account_service = account_service
            .map(|config| {
                let client = reqwest::Client::builder()
                    .timeout(EXCHANGE_TIMEOUT)
                    .build()
                    .map_err(|e| CredentialError::Exchange(e.to_string()))?;
                let cache = Cache::builder()
                    .max_capacity(CACHE_CAPACITY)
                    .time_to_live(cache_ttl)
                    .build();
                Ok::<_, CredentialError>(AccountService {
                    client,
                    url: config.url.clone(),
                    cache,
                })
            })
            .transpose()?;

        Ok(Self {
            inner: Arc::new(CredentialResolverInner {
                market_data_key,
                llm_key,
                account_service,
            }),
        })
    }

    /// A resolver using only pre-shared keys.
    #[must_use]
    pub fn with_keys(market_data_key: Option<SecretString>, llm_key: Option<SecretString>) -> Self {
        Self {
            inner: Arc::new(CredentialResolverInner {
                market_data_key,
                llm_key,
                account_service: None,
            }),
        }
    }

    /// Resolve credentials for a request.
    ///
    /// # Errors
    ///
    /// Returns an error if either key cannot be determined.
    #[instrument(skip_all)]
    pub async fn resolve(&self, headers: &HeaderMap) -> Result<Credentials, CredentialError> {
        if let (Some(market_data), Some(llm)) = (&self.inner.market_data_key, &self.inner.llm_key) {
            return Ok(Credentials {
                market_data: market_data.clone(),
                llm: llm.clone(),
            });
        }

        let (scheme, token) = parse_authorization(headers)?;
        let header_llm_key = header_llm_key(headers);

        let (market_data, llm) = match &self.inner.account_service {
            Some(service) if scheme.eq_ignore_ascii_case("bearer") => {
                let exchanged = service.exchange(&token).await?;
                (exchanged.market_data, exchanged.llm.or(header_llm_key))
            }
            _ => (Some(token), header_llm_key),
        };

        let market_data = self
            .inner
            .market_data_key
            .clone()
            .or(market_data)
            .ok_or(CredentialError::Missing("market-data API key"))?;
        let llm = self
            .inner
            .llm_key
            .clone()
            .or(llm)
            .ok_or(CredentialError::Missing("LLM API key"))?;

        Ok(Credentials { market_data, llm })
    }

    /// Resolve only the LLM key, for requests that never reach the
    /// market-data API.
    ///
    /// The `Authorization` header is optional here: a bearer token is
    /// exchanged when an account service is configured, otherwise the key
    /// comes from `X-OpenAPI-Key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails or no key can be found.
    #[instrument(skip_all)]
    pub async fn resolve_llm_key(&self, headers: &HeaderMap) -> Result<SecretString, CredentialError> {
        if let Some(llm) = &self.inner.llm_key {
            return Ok(llm.clone());
        }

        let exchanged = match (&self.inner.account_service, parse_authorization(headers)) {
            (Some(service), Ok((scheme, token))) if scheme.eq_ignore_ascii_case("bearer") => {
                service.exchange(&token).await?.llm
            }
            _ => None,
        };

        exchanged
            .or_else(|| header_llm_key(headers))
            .ok_or(CredentialError::Missing("LLM API key"))
    }
}

fn header_llm_key(headers: &HeaderMap) -> Option<SecretString> {
    headers
        .get(LLM_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| SecretString::from(v.to_string()))
}

impl AccountService {
    /// Exchange a bearer token for API keys, using the cache when possible.
    async fn exchange(&self, token: &SecretString) -> Result<ExchangedKeys, CredentialError> {
        let cache_key = hex::encode(Sha256::digest(token.expose_secret().as_bytes()));
        self.cache
            .try_get_with(cache_key, self.fetch(token))
            .await
            .map_err(|e: Arc<CredentialError>| (*e).clone())
    }

    #[instrument(skip_all, fields(url = %self.url))]
    async fn fetch(&self, token: &SecretString) -> Result<ExchangedKeys, CredentialError> {
        let response = self
            .client
            .get(&self.url)
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| CredentialError::Exchange(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Account service rejected token");
            return Err(CredentialError::Exchange(format!(
                "account service returned {status}"
            )));
        }

        let body: ExchangeResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::Exchange(e.without_url().to_string()))?;
        debug!("Exchanged bearer token");

        Ok(ExchangedKeys {
            market_data: body.market_data_api_key.map(SecretString::from),
            llm: body.llm_api_key.map(SecretString::from),
        })
    }
}

/// Split `Authorization: <scheme> <token>`.
fn parse_authorization(headers: &HeaderMap) -> Result<(String, SecretString), CredentialError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(CredentialError::BadAuthorization)?;

    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) => {
            Ok((scheme.to_string(), SecretString::from(token.to_string())))
        }
        _ => Err(CredentialError::BadAuthorization),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).expect("valid header"));
        }
        map
    }

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    #[tokio::test]
    async fn test_static_keys_need_no_headers() {
        let resolver = CredentialResolver::with_keys(Some(secret("td")), Some(secret("sk")));
        let credentials = resolver.resolve(&HeaderMap::new()).await.expect("resolved");
        assert_eq!(credentials.market_data.expose_secret(), "td");
        assert_eq!(credentials.llm.expose_secret(), "sk");
    }

    #[tokio::test]
    async fn test_header_pass_through() {
        let resolver = CredentialResolver::with_keys(None, None);
        let credentials = resolver
            .resolve(&headers(&[("authorization", "apikey td-123"), ("x-openapi-key", "sk-456")]))
            .await
            .expect("resolved");
        assert_eq!(credentials.market_data.expose_secret(), "td-123");
        assert_eq!(credentials.llm.expose_secret(), "sk-456");
    }

    #[tokio::test]
    async fn test_configured_key_overrides_header() {
        let resolver = CredentialResolver::with_keys(None, Some(secret("sk-configured")));
        let credentials = resolver
            .resolve(&headers(&[("authorization", "Bearer td-123"), ("x-openapi-key", "sk-header")]))
            .await
            .expect("resolved");
        assert_eq!(credentials.market_data.expose_secret(), "td-123");
        assert_eq!(credentials.llm.expose_secret(), "sk-configured");
    }

    #[tokio::test]
    async fn test_missing_llm_key() {
        let resolver = CredentialResolver::with_keys(None, None);
        let err = resolver
            .resolve(&headers(&[("authorization", "Bearer td-123")]))
            .await
            .expect_err("missing");
        assert_eq!(err, CredentialError::Missing("LLM API key"));
    }

    #[tokio::test]
    async fn test_malformed_authorization() {
        let resolver = CredentialResolver::with_keys(None, None);
        for value in ["td-123", "Bearer a b"] {
            let err = resolver
                .resolve(&headers(&[("authorization", value)]))
                .await
                .expect_err("malformed");
            assert_eq!(err, CredentialError::BadAuthorization);
        }
        assert_eq!(
            resolver.resolve(&HeaderMap::new()).await.expect_err("absent"),
            CredentialError::BadAuthorization
        );
    }

    #[tokio::test]
    async fn test_llm_key_without_authorization() {
        let resolver = CredentialResolver::with_keys(None, None);
        let key = resolver
            .resolve_llm_key(&headers(&[("x-openapi-key", "sk-456")]))
            .await
            .expect("resolved");
        assert_eq!(key.expose_secret(), "sk-456");

        assert_eq!(
            resolver
                .resolve_llm_key(&headers(&[("authorization", "apikey td-123")]))
                .await
                .expect_err("missing"),
            CredentialError::Missing("LLM API key")
        );
    }

    #[tokio::test]
    async fn test_llm_key_prefers_configured() {
        let resolver = CredentialResolver::with_keys(None, Some(secret("sk-configured")));
        let key = resolver
            .resolve_llm_key(&headers(&[("x-openapi-key", "sk-header")]))
            .await
            .expect("resolved");
        assert_eq!(key.expose_secret(), "sk-configured");
    }

    #[test]
    fn test_debug_redacts_keys() {
        let credentials = Credentials {
            market_data: secret("td-secret"),
            llm: secret("sk-secret"),
        };
        let debug_output = format!("{credentials:?}");
        assert!(!debug_output.contains("td-secret"));
        assert!(!debug_output.contains("sk-secret"));

        let resolver = CredentialResolver::with_keys(Some(secret("td-secret")), None);
        assert!(!format!("{resolver:?}").contains("td-secret"));
    }
}
