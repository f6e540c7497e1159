//! Router configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Index source (one required)
//! - `ROUTER_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `ROUTER_INDEX_PATH` - Path to a JSON embedding snapshot
//!
//! ## Documentation index (optional)
//! - `ROUTER_DOCS_INDEX_PATH` - Path to a JSON documentation snapshot. Without
//!   it, a `PostgreSQL` index source also serves documentation from the
//!   `doc_sections` table; a snapshot index source leaves `/doctool` disabled.
//!
//! ## Optional
//! - `ROUTER_HOST` - Bind address (default: 127.0.0.1)
//! - `ROUTER_PORT` - Listen port (default: 8000)
//! - `MARKET_DATA_BASE_URL` - Upstream API base (default: <https://api.twelvedata.com>)
//! - `MARKET_DATA_API_KEY` - Pre-shared market-data key (overrides caller headers)
//! - `OPENAI_API_KEY` - Pre-shared LLM key (overrides caller headers)
//! - `OPENAI_BASE_URL` - `OpenAI`-compatible API base (default: <https://api.openai.com/v1>)
//! - `ROUTER_LLM_MODEL` - Chat model (default: gpt-4o-mini)
//! - `ROUTER_EMBEDDING_MODEL` - Embedding model (default: text-embedding-3-large)
//! - `ROUTER_EMBEDDING_DIMENSIONS` - Embedding size (default: 3072)
//! - `ROUTER_TOP_K` - Semantic search depth (default: 30)
//! - `ROUTER_FALLBACK_OPERATION` - Always-offered operation (default: `GetTimeSeries`)
//! - `ROUTER_UNCLASSIFIED_TIER` - Tier assumed for operations without one (default: basic)
//! - `ROUTER_TOOL_LIMIT` - Operations exposed by `GET /tools` (default: 30, max 100)
//! - `ROUTER_REQUEST_TIMEOUT_SECS` - Per-request deadline (default: 60)
//! - `ROUTER_ACCOUNT_SERVICE_URL` - Bearer-token exchange endpoint
//! - `ROUTER_CREDENTIAL_CACHE_TTL_SECS` - Cache lifetime of exchanged keys (default: 60)
//! - `ROUTER_LOG_JSON` - Emit JSON logs when set
//! - `SENTRY_DSN` - Sentry error tracking DSN
//!
//! ## Optional (TLS)
//! - `ROUTER_TLS_CERT` - PEM-encoded certificate chain
//! - `ROUTER_TLS_KEY` - PEM-encoded private key

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use market_router_core::{OperationId, Tier};
use secrecy::SecretString;
use thiserror::Error;

use crate::registry::MAX_TOOL_LIMIT;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;
const DEFAULT_MARKET_DATA_BASE_URL: &str = "https://api.twelvedata.com";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-large";
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 3072;
const DEFAULT_TOP_K: usize = 30;
const DEFAULT_FALLBACK_OPERATION: &str = "GetTimeSeries";
const DEFAULT_TOOL_LIMIT: usize = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_CREDENTIAL_CACHE_TTL_SECS: u64 = 60;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "your_",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Router application configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Where operation embeddings are read from
    pub index: IndexSource,
    /// Where documentation embeddings are read from (optional)
    pub docs: Option<IndexSource>,
    /// Upstream market-data API
    pub market_data: MarketDataConfig,
    /// Embedding and chat model configuration
    pub openai: OpenAIConfig,
    /// Retrieval, gating and deadline settings
    pub routing: RoutingSettings,
    /// Bearer-token exchange service (optional)
    pub account_service: Option<AccountServiceConfig>,
    /// Emit JSON logs instead of text
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
    /// TLS configuration for HTTPS (optional)
    pub tls: Option<TlsConfig>,
}

/// Source of the semantic index.
#[derive(Clone)]
pub enum IndexSource {
    /// `PostgreSQL` with pgvector.
    Postgres(SecretString),
    /// JSON snapshot file searched in memory.
    Snapshot(PathBuf),
}

impl std::fmt::Debug for IndexSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Postgres(_) => f.debug_tuple("Postgres").field(&"[REDACTED]").finish(),
            Self::Snapshot(path) => f.debug_tuple("Snapshot").field(path).finish(),
        }
    }
}

/// Upstream market-data API configuration.
#[derive(Clone)]
pub struct MarketDataConfig {
    /// Base URL, without trailing slash
    pub base_url: String,
    /// Pre-shared API key overriding caller-supplied keys
    pub api_key: Option<SecretString>,
}

impl std::fmt::Debug for MarketDataConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketDataConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// `OpenAI` configuration for embeddings and chat completions.
#[derive(Clone)]
pub struct OpenAIConfig {
    /// Pre-shared API key overriding caller-supplied keys
    pub api_key: Option<SecretString>,
    /// API base URL, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    /// Chat model used for selection and summaries
    pub chat_model: String,
    /// Embedding model; must match the one used to build the index
    pub embedding_model: String,
    /// Expected embedding size
    pub embedding_dimensions: usize,
}

impl std::fmt::Debug for OpenAIConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("chat_model", &self.chat_model)
            .field("embedding_model", &self.embedding_model)
            .field("embedding_dimensions", &self.embedding_dimensions)
            .finish()
    }
}

/// Retrieval, plan gating and deadline settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingSettings {
    /// Number of candidates returned by semantic search
    pub top_k: usize,
    /// Operation appended to every candidate list
    pub fallback_operation: OperationId,
    /// Tier assumed for operations without one
    pub unclassified_tier: Tier,
    /// Number of operations exposed as direct tools
    pub tool_limit: usize,
    /// Deadline for one routing request
    pub request_timeout: Duration,
    /// Lifetime of cached bearer-token exchanges
    pub credential_cache_ttl: Duration,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            fallback_operation: OperationId::from_static(DEFAULT_FALLBACK_OPERATION),
            unclassified_tier: Tier::Basic,
            tool_limit: DEFAULT_TOOL_LIMIT,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            credential_cache_ttl: Duration::from_secs(DEFAULT_CREDENTIAL_CACHE_TTL_SECS),
        }
    }
}

/// Account service used to exchange a bearer token for API keys.
#[derive(Debug, Clone)]
pub struct AccountServiceConfig {
    /// Endpoint called with `Authorization: Bearer <token>`
    pub url: String,
}

/// TLS configuration for HTTPS.
#[derive(Clone)]
pub struct TlsConfig {
    /// PEM-encoded certificate chain
    pub cert_pem: String,
    /// PEM-encoded private key
    pub key_pem: SecretString,
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("cert_pem", &"[CERTIFICATE]")
            .field("key_pem", &"[REDACTED]")
            .finish()
    }
}

impl TlsConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let cert_pem = get_optional_env("ROUTER_TLS_CERT");
        let key_pem = get_optional_env("ROUTER_TLS_KEY");

        match (cert_pem, key_pem) {
            (Some(cert), Some(key)) => Ok(Some(Self {
                cert_pem: cert,
                key_pem: SecretString::from(key),
            })),
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "ROUTER_TLS_*".to_string(),
                "Both ROUTER_TLS_CERT and ROUTER_TLS_KEY must be set together".to_string(),
            )),
        }
    }
}

impl RouterConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if pre-shared keys fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env_or_default("ROUTER_HOST", "127.0.0.1")?;
        let port = parse_env_or_default("ROUTER_PORT", "8000")?;
        let index = IndexSource::from_env()?;
        let docs = IndexSource::docs_from_env(&index);
        let market_data = MarketDataConfig::from_env()?;
        let openai = OpenAIConfig::from_env()?;
        let routing = RoutingSettings::from_env()?;
        let account_service =
            get_optional_env("ROUTER_ACCOUNT_SERVICE_URL").map(|url| AccountServiceConfig { url });
        let log_json = get_optional_env("ROUTER_LOG_JSON").is_some_and(|v| v != "0" && v != "false");
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);
        let tls = TlsConfig::from_env()?;

        Ok(Self {
            host,
            port,
            index,
            docs,
            market_data,
            openai,
            routing,
            account_service,
            log_json,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
            tls,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl IndexSource {
    /// Read the index source from `ROUTER_DATABASE_URL` (or `DATABASE_URL`)
    /// or `ROUTER_INDEX_PATH`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if neither is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Some(url) = get_database_url("ROUTER_DATABASE_URL") {
            return Ok(Self::Postgres(url));
        }
        get_optional_env("ROUTER_INDEX_PATH")
            .map(|path| Self::Snapshot(PathBuf::from(path)))
            .ok_or_else(|| ConfigError::MissingEnvVar("ROUTER_DATABASE_URL or ROUTER_INDEX_PATH".to_string()))
    }

    /// Read the documentation index source from `ROUTER_DOCS_INDEX_PATH`,
    /// falling back to the operation index's database.
    #[must_use]
    pub fn docs_from_env(index: &Self) -> Option<Self> {
        docs_source(get_optional_env("ROUTER_DOCS_INDEX_PATH"), index)
    }
}

fn docs_source(path: Option<String>, index: &IndexSource) -> Option<IndexSource> {
    match (path, index) {
        (Some(path), _) => Some(IndexSource::Snapshot(PathBuf::from(path))),
        (None, IndexSource::Postgres(url)) => Some(IndexSource::Postgres(url.clone())),
        (None, IndexSource::Snapshot(_)) => None,
    }
}

impl MarketDataConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = get_env_or_default("MARKET_DATA_BASE_URL", DEFAULT_MARKET_DATA_BASE_URL);
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("MARKET_DATA_BASE_URL".to_string(), e.to_string())
        })?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: get_optional_validated_secret("MARKET_DATA_API_KEY")?,
        })
    }
}

impl OpenAIConfig {
    /// Read model settings and the optional pre-shared key.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid dimensions or an insecure key.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: get_optional_validated_secret("OPENAI_API_KEY")?,
            base_url: get_env_or_default("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
            chat_model: get_env_or_default("ROUTER_LLM_MODEL", DEFAULT_LLM_MODEL),
            embedding_model: get_env_or_default("ROUTER_EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            embedding_dimensions: parse_env_or_default(
                "ROUTER_EMBEDDING_DIMENSIONS",
                &DEFAULT_EMBEDDING_DIMENSIONS.to_string(),
            )?,
        })
    }
}

impl RoutingSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let top_k: usize = parse_env_or_default("ROUTER_TOP_K", &defaults.top_k.to_string())?;
        if top_k == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "ROUTER_TOP_K".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let tool_limit: usize =
            parse_env_or_default("ROUTER_TOOL_LIMIT", &defaults.tool_limit.to_string())?;
        if tool_limit > MAX_TOOL_LIMIT {
            return Err(ConfigError::InvalidEnvVar(
                "ROUTER_TOOL_LIMIT".to_string(),
                format!("must be at most {MAX_TOOL_LIMIT}"),
            ));
        }

        let request_timeout_secs: u64 = parse_env_or_default(
            "ROUTER_REQUEST_TIMEOUT_SECS",
            &DEFAULT_REQUEST_TIMEOUT_SECS.to_string(),
        )?;
        let cache_ttl_secs: u64 = parse_env_or_default(
            "ROUTER_CREDENTIAL_CACHE_TTL_SECS",
            &DEFAULT_CREDENTIAL_CACHE_TTL_SECS.to_string(),
        )?;

        Ok(Self {
            top_k,
            fallback_operation: parse_env_or_default(
                "ROUTER_FALLBACK_OPERATION",
                DEFAULT_FALLBACK_OPERATION,
            )?,
            unclassified_tier: parse_env_or_default("ROUTER_UNCLASSIFIED_TIER", "basic")?,
            tool_limit,
            request_timeout: Duration::from_secs(request_timeout_secs),
            credential_cache_ttl: Duration::from_secs(cache_ttl_secs),
        })
    }
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Option<SecretString> {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .map(SecretString::from)
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default`.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Is this a real API key?"
            ),
        ));
    }

    Ok(())
}

/// Load and validate an optional secret from environment.
fn get_optional_validated_secret(key: &str) -> Result<Option<SecretString>, ConfigError> {
    get_optional_env(key)
        .map(|value| {
            validate_secret_strength(&value, key)?;
            Ok(SecretString::from(value))
        })
        .transpose()
}
