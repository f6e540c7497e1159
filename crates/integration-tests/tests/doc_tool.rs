//! Documentation answers: the tool itself, `GET /doctool`, and building
//! the documentation index from an HTML page served locally.

#![allow(clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::{Html, Response};
use axum::routing::get;
use market_router::docs::builder::{embed_sections, snapshot};
use market_router::docs::{
    DocHit, DocIndex, DocSnapshotIndex, DocTool, DocsError, fetch_docs, parse_sections,
};
use market_router::openai::ChatModel;
use market_router::routes;
use market_router::tool_selection::Embedder;
use market_router_core::DocAnswer;
use market_router_integration_tests::{
    FailingEmbedder, Harness, KeywordEmbedder, LLM_KEY, ScriptedChat, fixture_doc_index, serve,
};
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;

const DOCS_PAGE: &str = r#"<!doctype html>
<html><body>
  <section id="time-series">
    <h2>Time Series</h2>
    <p>Intraday candles and daily history for any symbol.</p>
  </section>
  <section id="market-movers">
    <h2>Market Movers</h2>
    <p>Top gainers and losers of the day.</p>
  </section>
  <section id="exchange-rate">
    <h3>Exchange Rate</h3>
    <p>Real-time forex rate, e.g. EUR/USD.</p>
  </section>
</body></html>"#;

fn key() -> SecretString {
    SecretString::from(LLM_KEY)
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

/// An index that never answers in time.
struct StalledIndex;

#[async_trait]
impl DocIndex for StalledIndex {
    async fn search(&self, _embedding: &[f32], _k: usize) -> Result<Vec<DocHit>, DocsError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }

    async fn section_count(&self) -> Result<usize, DocsError> {
        Ok(0)
    }
}

#[tokio::test]
async fn test_answer_from_closest_sections() {
    let harness = Harness::new(ScriptedChat::new());
    let tool = harness.doc_tool().with_top_k(3);

    let answer = tool.answer(&key(), "how do I get intraday candles?").await;

    assert!(answer.is_success(), "{answer:?}");
    assert_eq!(answer.query, "how do I get intraday candles?");
    assert_eq!(answer.top_candidates.len(), 3);
    assert_eq!(answer.top_candidates.first().map(String::as_str), Some("TimeSeries"));
    assert!(answer.result.as_deref().is_some_and(|md| md.starts_with("## Report")));

    let inputs = harness.chat.summary_inputs();
    let documentation = inputs.first().expect("one summary request");
    assert!(documentation.starts_with("Documentation:\nGetTimeSeries: time series"));
    assert_eq!(documentation.matches("\n\n---\n\n").count(), 2);
}

#[tokio::test]
async fn test_search_failure_leaves_no_candidates() {
    let harness = Harness::new(ScriptedChat::new());
    let tool = DocTool::new(
        Arc::new(FailingEmbedder),
        Arc::new(fixture_doc_index()),
        Arc::clone(&harness.chat) as Arc<dyn ChatModel>,
        Duration::from_secs(5),
    );

    let answer = tool.answer(&key(), "what is a quote?").await;

    assert!(answer.top_candidates.is_empty());
    assert!(answer.result.is_none());
    let error = answer.error.expect("error");
    assert!(error.starts_with("Vector search failed: "), "{error}");
    assert!(error.contains("provider unavailable"), "{error}");
    assert_eq!(harness.chat.summaries(), 0);
}

#[tokio::test]
async fn test_model_failure_keeps_candidates() {
    let harness = Harness::new(ScriptedChat::new().failing_summaries());
    let answer = harness.doc_tool().answer(&key(), "company profile").await;

    assert_eq!(answer.top_candidates.first().map(String::as_str), Some("Profile"));
    assert!(answer.result.is_none());
    let error = answer.error.expect("error");
    assert!(error.starts_with("LLM summarization failed: "), "{error}");
}

#[tokio::test(start_paused = true)]
async fn test_stalled_search_hits_deadline() {
    let harness = Harness::new(ScriptedChat::new());
    let tool = DocTool::new(
        Arc::new(KeywordEmbedder::default()),
        Arc::new(StalledIndex),
        Arc::clone(&harness.chat) as Arc<dyn ChatModel>,
        Duration::from_secs(60),
    );

    let answer = tool.answer(&key(), "forex rates").await;

    assert_eq!(answer.error.as_deref(), Some("request deadline of 60s exceeded"));
    assert!(answer.top_candidates.is_empty());
}

#[tokio::test]
async fn test_doctool_route_answers() {
    let harness = Harness::new(ScriptedChat::new());
    let app = routes::app(harness.app_state_with_docs(30));

    let response = app
        .oneshot(
            Request::get("/doctool?query=top%20gainers%20today")
                .header("x-openapi-key", LLM_KEY)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let answer: DocAnswer = serde_json::from_value(body_json(response).await).expect("envelope");
    assert!(answer.is_success(), "{answer:?}");
    assert_eq!(answer.query, "top gainers today");
    assert_eq!(answer.top_candidates.first().map(String::as_str), Some("MarketMovers"));
}

#[tokio::test]
async fn test_doctool_route_missing_query() {
    let app = routes::app(Harness::new(ScriptedChat::new()).app_state_with_docs(30));

    for uri in ["/doctool", "/doctool?query=%20%20"] {
        let response = app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Missing 'query' query parameter"})
        );
    }
}

#[tokio::test]
async fn test_doctool_route_without_llm_key() {
    let harness = Harness::new(ScriptedChat::new());
    let app = routes::app(harness.app_state_with_docs(30));

    let response = app
        .oneshot(
            Request::get("/doctool?query=profile")
                .header(header::AUTHORIZATION, "apikey td-only")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let answer: DocAnswer = serde_json::from_value(body_json(response).await).expect("envelope");
    assert_eq!(answer.query, "profile");
    assert_eq!(answer.error.as_deref(), Some("LLM API key is not provided"));
    assert_eq!(harness.embedder.calls(), 0);
}

#[tokio::test]
async fn test_doctool_route_without_index() {
    let app = routes::app(Harness::new(ScriptedChat::new()).app_state(30));

    let response = app
        .oneshot(
            Request::get("/doctool?query=profile")
                .header("x-openapi-key", LLM_KEY)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body_json(response).await,
        json!({"error": "Documentation search is not configured"})
    );
}

#[tokio::test]
async fn test_build_from_served_page_then_answer() {
    let app = axum::Router::new()
        .route("/docs", get(|| async { Html(DOCS_PAGE) }))
        .route("/gone", get(|| async { StatusCode::NOT_FOUND }));
    let addr = serve(app).await;

    let err = fetch_docs(&format!("http://{addr}/gone"))
        .await
        .expect_err("missing page");
    assert!(matches!(err, DocsError::Fetch(ref msg) if msg.contains("404")));

    let html = fetch_docs(&format!("http://{addr}/docs")).await.expect("fetch");
    let sections = parse_sections(&html).expect("parse");
    assert_eq!(sections.len(), 3);

    let embedder = KeywordEmbedder::default();
    let (records, result) = embed_sections(&embedder, &key(), &sections, 6).await;
    assert!(result.errors.is_empty());
    assert_eq!(records.len(), 3);

    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("docs.json");
    snapshot(records, "keyword-test", 6).write(&path).await.expect("write");
    let index = DocSnapshotIndex::load(&path).await.expect("load");
    index.ensure_built_with("keyword-test", 6).expect("same model");

    let chat = Arc::new(ScriptedChat::new());
    let tool = DocTool::new(
        Arc::new(KeywordEmbedder::default()) as Arc<dyn Embedder>,
        Arc::new(index),
        chat,
        Duration::from_secs(5),
    )
    .with_top_k(1);

    let answer = tool.answer(&key(), "EUR/USD exchange rate").await;
    assert!(answer.is_success(), "{answer:?}");
    assert_eq!(answer.top_candidates, vec!["Exchange Rate".to_string()]);
}
