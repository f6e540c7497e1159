//! Integration tests for the market router.
//!
//! Everything runs in-process: the embedding provider, the chat model and
//! the market-data API are replaced by the fakes in this crate, and the
//! real HTTP upstream client is exercised against a local axum server bound
//! to `127.0.0.1:0`. No test needs network access or a database.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p market-router-integration-tests
//! ```

#![allow(clippy::missing_panics_doc, clippy::expect_used)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use market_router::config::RoutingSettings;
use market_router::credentials::{CredentialResolver, Credentials};
use market_router::dispatch::{DispatchError, UpstreamCaller, UpstreamRequest};
use market_router::docs::{DocRecord, DocSnapshot, DocSnapshotIndex, DocTool};
use market_router::openai::{
    ChatCompletionResponse, ChatMessage, ChatModel, OpenAIError, ToolChoice, ToolDefinition,
};
use market_router::registry::OperationRegistry;
use market_router::router::{QueryRouter, RoutingRequest};
use market_router::state::AppState;
use market_router::tool_selection::{
    Embedder, EmbeddingRecord, SemanticIndex, Snapshot, SnapshotIndex, ToolSelectionError,
};
use market_router_core::{OperationId, OutputFormat};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

/// Market-data key accepted by the fake servers.
pub const MARKET_DATA_KEY: &str = "td-test-key";
/// LLM key used by tests.
pub const LLM_KEY: &str = "sk-test-key";

// =============================================================================
// Embeddings and index
// =============================================================================

/// Keyword groups, one per embedding axis, and the operation on that axis.
const AXES: &[(&str, &[&str])] = &[
    ("GetTimeSeries", &["time series", "intraday", "candles", "minute", "history"]),
    ("GetMarketMovers", &["movers", "gainers", "losers"]),
    ("GetQuote", &["quote"]),
    ("GetPriceTarget", &["price target", "analyst target"]),
    ("GetProfile", &["profile", "company", "ceo"]),
    ("GetExchangeRate", &["exchange rate", "forex", "eur/usd"]),
];

/// Embeds text by keyword: each axis scores 1.0 per matching keyword group
/// on top of a small baseline, so every vector is non-zero.
#[derive(Debug, Default)]
pub struct KeywordEmbedder {
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    /// Vector for `text`.
    #[must_use]
    pub fn vector(text: &str) -> Vec<f32> {
        let text = text.to_lowercase();
        AXES.iter()
            .map(|(_, keywords)| {
                if keywords.iter().any(|k| text.contains(k)) {
                    1.1
                } else {
                    0.1
                }
            })
            .collect()
    }

    /// Number of embedding requests served.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed_batch(
        &self,
        _api_key: &SecretString,
        texts: &[&str],
    ) -> Result<Vec<Vec<f32>>, ToolSelectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

/// An embedder whose provider is down.
#[derive(Debug, Default)]
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed_batch(
        &self,
        _api_key: &SecretString,
        _texts: &[&str],
    ) -> Result<Vec<Vec<f32>>, ToolSelectionError> {
        Err(ToolSelectionError::Embedding("provider unavailable".to_string()))
    }
}

/// A snapshot with one record per axis, each pointing along its axis.
#[must_use]
pub fn fixture_snapshot() -> Snapshot {
    let records = AXES
        .iter()
        .enumerate()
        .map(|(axis, (id, keywords))| {
            let mut vector = vec![0.0; AXES.len()];
            if let Some(slot) = vector.get_mut(axis) {
                *slot = 1.0;
            }
            EmbeddingRecord {
                operation_id: OperationId::parse(id).expect("valid id"),
                vector,
                source_text: keywords.join(", "),
            }
        })
        .collect();

    Snapshot {
        model: "keyword-test".to_string(),
        dimensions: AXES.len(),
        built_at: Utc::now(),
        records,
    }
}

/// In-memory index over [`fixture_snapshot`].
#[must_use]
pub fn fixture_index() -> SnapshotIndex {
    SnapshotIndex::from_snapshot(fixture_snapshot()).expect("fixture index")
}

/// A documentation snapshot with one section per axis, titled after the
/// axis keywords, plus the section text that was embedded.
#[must_use]
pub fn fixture_doc_snapshot() -> DocSnapshot {
    let records = AXES
        .iter()
        .map(|(id, keywords)| {
            let content = format!("{id}: {}", keywords.join(", "));
            DocRecord {
                section_id: id.to_lowercase(),
                title: (*id).trim_start_matches("Get").to_string(),
                vector: KeywordEmbedder::vector(&content),
                content,
            }
        })
        .collect();

    DocSnapshot {
        model: "keyword-test".to_string(),
        dimensions: AXES.len(),
        built_at: Utc::now(),
        records,
    }
}

/// In-memory documentation index over [`fixture_doc_snapshot`].
#[must_use]
pub fn fixture_doc_index() -> DocSnapshotIndex {
    DocSnapshotIndex::from_snapshot(fixture_doc_snapshot()).expect("fixture documentation index")
}

/// The built-in operation registry.
#[must_use]
pub fn registry() -> Arc<OperationRegistry> {
    Arc::new(OperationRegistry::builtin().expect("builtin registry"))
}

// =============================================================================
// Chat model
// =============================================================================

/// A chat model with scripted tool calls and summaries.
///
/// For a function-calling request it picks the first offered tool that has
/// scripted arguments (or the first offered tool with `{}`), unless a
/// choice is forced. Requests without tools are summaries.
#[derive(Debug, Default)]
pub struct ScriptedChat {
    arguments: HashMap<String, String>,
    forced: Option<(String, String)>,
    fail_summaries: bool,
    offered: Mutex<Vec<Vec<String>>>,
    summaries: AtomicUsize,
    summary_inputs: Mutex<Vec<String>>,
}

impl ScriptedChat {
    /// A chat model with no scripted arguments.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arguments to use when `operation` is chosen.
    #[must_use]
    pub fn with_arguments(mut self, operation: &str, arguments: Value) -> Self {
        self.arguments.insert(operation.to_string(), arguments.to_string());
        self
    }

    /// Always call `operation` with the raw `arguments` string, offered or not.
    #[must_use]
    pub fn forcing(mut self, operation: &str, arguments: &str) -> Self {
        self.forced = Some((operation.to_string(), arguments.to_string()));
        self
    }

    /// Make every summary request fail.
    #[must_use]
    pub const fn failing_summaries(mut self) -> Self {
        self.fail_summaries = true;
        self
    }

    /// Tool names offered in each function-calling request.
    pub fn offered(&self) -> Vec<Vec<String>> {
        self.offered.lock().expect("lock").clone()
    }

    /// Number of summary requests.
    pub fn summaries(&self) -> usize {
        self.summaries.load(Ordering::SeqCst)
    }

    /// The last message of each summary request.
    pub fn summary_inputs(&self) -> Vec<String> {
        self.summary_inputs.lock().expect("lock").clone()
    }

    fn choose(&self, offered: &[String]) -> (String, String) {
        if let Some(forced) = &self.forced {
            return forced.clone();
        }
        offered
            .iter()
            .find_map(|name| self.arguments.get(name).map(|args| (name.clone(), args.clone())))
            .or_else(|| offered.first().map(|name| (name.clone(), "{}".to_string())))
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn chat(
        &self,
        _api_key: &SecretString,
        messages: Vec<ChatMessage>,
        tools: Option<Vec<ToolDefinition>>,
        tool_choice: Option<ToolChoice>,
    ) -> Result<ChatCompletionResponse, OpenAIError> {
        let Some(tools) = tools else {
            self.summaries.fetch_add(1, Ordering::SeqCst);
            if self.fail_summaries {
                return Err(OpenAIError::RateLimited(20));
            }
            let data = messages.last().and_then(ChatMessage::text).unwrap_or_default();
            self.summary_inputs.lock().expect("lock").push(data.to_string());
            return Ok(completion(json!({
                "role": "assistant",
                "content": format!("## Report\n\n{} characters of data", data.len())
            })));
        };

        assert_eq!(tool_choice, Some(ToolChoice::Required), "tool call must be forced");
        let offered: Vec<String> = tools.into_iter().map(|t| t.function.name).collect();
        let (name, arguments) = self.choose(&offered);
        self.offered.lock().expect("lock").push(offered);

        Ok(completion(json!({
            "role": "assistant",
            "content": format!("{name} answers the question directly."),
            "tool_calls": [{
                "id": "call_test",
                "type": "function",
                "function": {"name": name, "arguments": arguments}
            }]
        })))
    }
}

fn completion(message: Value) -> ChatCompletionResponse {
    serde_json::from_value(json!({
        "id": "chatcmpl-test",
        "model": "gpt-4o-mini",
        "choices": [{"index": 0, "finish_reason": "stop", "message": message}]
    }))
    .expect("valid completion")
}

// =============================================================================
// Upstream
// =============================================================================

/// A request seen by [`FakeUpstream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub path: String,
    pub query: Vec<(String, String)>,
    pub api_key: String,
}

impl RecordedRequest {
    /// Value of query parameter `name`.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Canned market-data responses keyed by path.
#[derive(Debug)]
pub struct FakeUpstream {
    responses: HashMap<String, Value>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl Default for FakeUpstream {
    fn default() -> Self {
        let mut responses = HashMap::new();
        responses.insert("time_series".to_string(), time_series_body("TSLA"));
        responses.insert("market_movers/stocks".to_string(), movers_body());
        responses.insert(
            "quote".to_string(),
            json!({"symbol": "AAPL", "name": "Apple Inc", "close": "227.48", "percent_change": "0.41"}),
        );
        Self {
            responses,
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl FakeUpstream {
    /// Replace the response for `path`.
    #[must_use]
    pub fn with_response(mut self, path: &str, body: Value) -> Self {
        self.responses.insert(path.to_string(), body);
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("lock").clone()
    }
}

#[async_trait]
impl UpstreamCaller for FakeUpstream {
    async fn call(&self, request: &UpstreamRequest) -> Result<Value, DispatchError> {
        self.requests.lock().expect("lock").push(RecordedRequest {
            path: request.path.clone(),
            query: request.query.clone(),
            api_key: request.api_key.expose_secret().to_string(),
        });
        self.responses
            .get(&request.path)
            .cloned()
            .ok_or_else(|| DispatchError::Upstream {
                status: Some(404),
                message: format!("no such endpoint: {}", request.path),
            })
    }
}

/// A one-row intraday series for `symbol`.
#[must_use]
pub fn time_series_body(symbol: &str) -> Value {
    json!({
        "meta": {"symbol": symbol, "interval": "1min", "currency": "USD", "type": "Common Stock"},
        "values": [
            {"datetime": "2026-10-16 15:59:00", "open": "251.10", "high": "251.42", "low": "250.95", "close": "251.20", "volume": "120034"},
            {"datetime": "2026-10-16 15:58:00", "open": "250.80", "high": "251.15", "low": "250.70", "close": "251.08", "volume": "98512"}
        ],
        "status": "ok"
    })
}

fn movers_body() -> Value {
    json!({
        "values": [
            {"symbol": "XYZ", "name": "Example Corp", "percent_change": "12.4", "last": "18.22"}
        ],
        "status": "ok"
    })
}

// =============================================================================
// Router assembly
// =============================================================================

/// A router wired to fakes, with handles to inspect them.
pub struct Harness {
    pub router: QueryRouter,
    pub embedder: Arc<KeywordEmbedder>,
    pub chat: Arc<ScriptedChat>,
    pub upstream: Arc<FakeUpstream>,
}

impl Harness {
    /// Default settings, built-in registry, fixture index.
    #[must_use]
    pub fn new(chat: ScriptedChat) -> Self {
        Self::build(chat, FakeUpstream::default(), &RoutingSettings::default())
    }

    /// Full control over the collaborators.
    #[must_use]
    pub fn build(chat: ScriptedChat, upstream: FakeUpstream, settings: &RoutingSettings) -> Self {
        let embedder = Arc::new(KeywordEmbedder::default());
        let chat = Arc::new(chat);
        let upstream = Arc::new(upstream);
        let index: Arc<dyn SemanticIndex> = Arc::new(fixture_index());

        let router = QueryRouter::new(
            registry(),
            Arc::clone(&embedder) as Arc<dyn Embedder>,
            index,
            Arc::clone(&chat) as Arc<dyn ChatModel>,
            Arc::clone(&upstream) as Arc<dyn UpstreamCaller>,
            settings,
        );

        Self {
            router,
            embedder,
            chat,
            upstream,
        }
    }

    /// HTTP state around this router, with header pass-through credentials.
    #[must_use]
    pub fn app_state(&self, tool_limit: usize) -> AppState {
        AppState::new(
            self.router.clone(),
            None,
            CredentialResolver::with_keys(None, None),
            tool_limit,
        )
    }

    /// Like [`Harness::app_state`], with a documentation tool over
    /// [`fixture_doc_index`] sharing this harness's embedder and chat model.
    #[must_use]
    pub fn app_state_with_docs(&self, tool_limit: usize) -> AppState {
        AppState::new(
            self.router.clone(),
            Some(self.doc_tool()),
            CredentialResolver::with_keys(None, None),
            tool_limit,
        )
    }

    /// A documentation tool over [`fixture_doc_index`].
    #[must_use]
    pub fn doc_tool(&self) -> DocTool {
        DocTool::new(
            Arc::clone(&self.embedder) as Arc<dyn Embedder>,
            Arc::new(fixture_doc_index()),
            Arc::clone(&self.chat) as Arc<dyn ChatModel>,
            RoutingSettings::default().request_timeout,
        )
    }
}

/// Test credentials.
#[must_use]
pub fn credentials() -> Credentials {
    Credentials {
        market_data: SecretString::from(MARKET_DATA_KEY),
        llm: SecretString::from(LLM_KEY),
    }
}

/// A structured-output request.
#[must_use]
pub fn request(query: &str, plan: Option<&str>) -> RoutingRequest {
    RoutingRequest {
        query: query.to_string(),
        plan: plan.map(ToString::to_string),
        format: OutputFormat::Structured,
        credentials: credentials(),
    }
}

// =============================================================================
// Local market-data server
// =============================================================================

/// Start a minimal market-data API on an ephemeral port.
///
/// - `GET /time_series` echoes the symbol; rejects a wrong `apikey` with 401
/// - `GET /market_movers/{market}` returns one mover
/// - `GET /price` returns an in-band error document for `ZZZZ`
/// - `GET /quote` fails with a 500
pub async fn spawn_market_data_server() -> SocketAddr {
    let app = Router::new()
        .route("/time_series", get(time_series_handler))
        .route("/market_movers/{market}", get(movers_handler))
        .route("/price", get(price_handler))
        .route("/quote", get(quote_handler));

    serve(app).await
}

/// Serve `app` on `127.0.0.1:0` in the background.
pub async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

async fn time_series_handler(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    if params.get("apikey").map(String::as_str) != Some(MARKET_DATA_KEY) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"code": 401, "message": "invalid api key", "status": "error"})),
        );
    }
    let symbol = params.get("symbol").cloned().unwrap_or_default();
    (StatusCode::OK, Json(time_series_body(&symbol)))
}

async fn movers_handler(Path(market): Path<String>) -> Json<Value> {
    let mut body = movers_body();
    body["market"] = json!(market);
    Json(body)
}

async fn price_handler(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    if params.get("symbol").map(String::as_str) == Some("ZZZZ") {
        return Json(json!({"code": 404, "message": "symbol not found", "status": "error"}));
    }
    Json(json!({"price": "201.50"}))
}

async fn quote_handler() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "boom")
}
