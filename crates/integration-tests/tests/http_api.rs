//! HTTP surface: `/utool`, `/tools` and health probes.

#![allow(clippy::expect_used)]

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use market_router::openai::ToolDefinition;
use market_router::routes;
use market_router_core::RoutingResult;
use market_router_integration_tests::{
    Harness, LLM_KEY, MARKET_DATA_KEY, ScriptedChat, serve, time_series_body,
};
use serde_json::{Value, json};
use tower::ServiceExt;

fn harness() -> Harness {
    Harness::new(ScriptedChat::new().with_arguments(
        "GetTimeSeries",
        json!({"symbol": "TSLA", "interval": "1min"}),
    ))
}

fn authorized(builder: axum::http::request::Builder) -> axum::http::request::Builder {
    builder
        .header(header::AUTHORIZATION, format!("apikey {MARKET_DATA_KEY}"))
        .header("x-openapi-key", LLM_KEY)
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn test_health() {
    let app = routes::app(harness().app_state(30));

    let response = app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::get("/health/ready").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_utool_get_routes_query() {
    let harness = harness();
    let app = routes::app(harness.app_state(30));

    let response = app
        .oneshot(
            authorized(Request::get("/utool?query=TSLA%201%20minute%20candles&plan=pro"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let result: RoutingResult = serde_json::from_value(body_json(response).await).expect("envelope");
    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.payload, Some(time_series_body("TSLA")));

    let requests = harness.upstream.requests();
    assert_eq!(requests.first().map(|r| r.api_key.as_str()), Some(MARKET_DATA_KEY));
}

#[tokio::test]
async fn test_utool_post_json_body() {
    let app = routes::app(harness().app_state(30));

    let response = app
        .oneshot(
            authorized(Request::post("/utool"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"query": "TSLA intraday candles", "plan": "platinum"}).to_string(),
                ))
                .expect("request"),
        )
        .await
        .expect("response");

    // Routing failures are reported in the envelope, not as HTTP errors.
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["error"], json!("unknown subscription plan 'platinum'"));
    assert_eq!(body["payload"], Value::Null);
}

#[tokio::test]
async fn test_utool_missing_query() {
    let app = routes::app(harness().app_state(30));

    let response = app
        .oneshot(
            authorized(Request::get("/utool?query=%20%20"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], json!("Missing 'query' query parameter"));
}

#[tokio::test]
async fn test_utool_unknown_format() {
    let app = routes::app(harness().app_state(30));

    let response = app
        .oneshot(
            authorized(Request::get("/utool?query=TSLA&format=xml"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_utool_without_credentials() {
    let harness = harness();
    let app = routes::app(harness.app_state(30));

    let response = app
        .oneshot(
            Request::get("/utool?query=TSLA%20candles")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let result: RoutingResult = serde_json::from_value(body_json(response).await).expect("envelope");
    let error = result.error.expect("error");
    assert!(error.to_lowercase().contains("authorization"), "{error}");
    assert_eq!(harness.embedder.calls(), 0);
}

#[tokio::test]
async fn test_utool_without_llm_key() {
    let app = routes::app(harness().app_state(30));

    let response = app
        .oneshot(
            Request::get("/utool?query=TSLA%20candles")
                .header(header::AUTHORIZATION, format!("apikey {MARKET_DATA_KEY}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], json!("LLM API key is not provided"));
}

#[tokio::test]
async fn test_list_tools_respects_limit_and_plan() {
    let app = routes::app(harness().app_state(5));

    let response = app
        .clone()
        .oneshot(Request::get("/tools").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let tools: Vec<ToolDefinition> =
        serde_json::from_value(body_json(response).await).expect("tools");
    assert_eq!(tools.len(), 5);
    assert_eq!(tools.first().map(|t| t.function.name.as_str()), Some("GetTimeSeries"));

    let response = app
        .clone()
        .oneshot(Request::get("/tools?plan=nope").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let app = routes::app(harness().app_state(100));
    let all: Vec<ToolDefinition> = serde_json::from_value(
        body_json(
            app.clone()
                .oneshot(Request::get("/tools").body(Body::empty()).expect("request"))
                .await
                .expect("response"),
        )
        .await,
    )
    .expect("tools");
    let basic: Vec<ToolDefinition> = serde_json::from_value(
        body_json(
            app.oneshot(Request::get("/tools?plan=basic").body(Body::empty()).expect("request"))
                .await
                .expect("response"),
        )
        .await,
    )
    .expect("tools");

    assert!(basic.len() < all.len());
    assert!(basic.iter().any(|t| t.function.name == "GetTimeSeries"));
    assert!(!basic.iter().any(|t| t.function.name == "GetMarketMovers"));
    assert!(all.iter().any(|t| t.function.name == "GetMarketMovers"));
}

#[tokio::test]
async fn test_call_tool_directly() {
    let harness = harness();
    let app = routes::app(harness.app_state(100));

    let response = app
        .oneshot(
            authorized(Request::post("/tools/GetTimeSeries?plan=basic"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"symbol": "TSLA", "interval": "5min"}).to_string(),
                ))
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let result: RoutingResult = serde_json::from_value(body_json(response).await).expect("envelope");
    assert!(result.is_success(), "{result:?}");
    assert!(result.motivation.is_none());
    assert_eq!(harness.embedder.calls(), 0);
    assert!(harness.chat.offered().is_empty());

    let requests = harness.upstream.requests();
    let sent = requests.first().expect("one request");
    assert_eq!(sent.param("interval"), Some("5min"));
}

#[tokio::test]
async fn test_call_tool_above_plan() {
    let harness = harness();
    let app = routes::app(harness.app_state(100));

    let response = app
        .oneshot(
            authorized(Request::post("/tools/GetMarketMovers?plan=basic"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"market": "stocks"}).to_string()))
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["error"], json!("GetMarketMovers requires the Pro plan"));
    assert_eq!(body["premium_only_candidates"], json!(["GetMarketMovers"]));
    assert!(harness.upstream.requests().is_empty());
}

#[tokio::test]
async fn test_call_tool_outside_view() {
    let app = routes::app(harness().app_state(2));

    let response = app
        .oneshot(
            authorized(Request::post("/tools/GetMarketMovers"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_served_over_tcp() {
    let harness = harness();
    let addr = serve(routes::app(harness.app_state(30))).await;

    let response = reqwest::Client::new()
        .get(format!("http://{addr}/utool?query=TSLA%20minute%20candles&format=json"))
        .header("Authorization", format!("apikey {MARKET_DATA_KEY}"))
        .header("x-openapi-key", LLM_KEY)
        .send()
        .await
        .expect("send");

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let result: RoutingResult = response.json().await.expect("envelope");
    assert_eq!(
        result.selected_tool.as_ref().map(ToString::to_string).as_deref(),
        Some("GetTimeSeries")
    );
    assert!(result.is_success());
}
