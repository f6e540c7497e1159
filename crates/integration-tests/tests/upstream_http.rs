//! The real HTTP upstream client against a local market-data server.

#![allow(clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;

use market_router::config::{MarketDataConfig, RoutingSettings};
use market_router::dispatch::{DispatchError, HttpUpstream, UpstreamCaller, UpstreamRequest};
use market_router::router::QueryRouter;
use market_router_core::OperationId;
use market_router_integration_tests::{
    KeywordEmbedder, MARKET_DATA_KEY, ScriptedChat, fixture_index, registry, request,
    spawn_market_data_server, time_series_body,
};
use secrecy::SecretString;
use serde_json::json;

fn client(addr: SocketAddr) -> HttpUpstream {
    HttpUpstream::new(&MarketDataConfig {
        base_url: format!("http://{addr}"),
        api_key: None,
    })
    .expect("client")
}

fn upstream_request(path: &str, query: &[(&str, &str)], key: &str) -> UpstreamRequest {
    UpstreamRequest {
        path: path.to_string(),
        query: query
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
        api_key: SecretString::from(key),
    }
}

#[tokio::test]
async fn test_successful_call() {
    let addr = spawn_market_data_server().await;

    let body = client(addr)
        .call(&upstream_request(
            "time_series",
            &[("symbol", "AAPL"), ("interval", "1day")],
            MARKET_DATA_KEY,
        ))
        .await
        .expect("call");

    assert_eq!(body, time_series_body("AAPL"));
}

#[tokio::test]
async fn test_path_parameters_reach_server() {
    let addr = spawn_market_data_server().await;

    let body = client(addr)
        .call(&upstream_request("market_movers/crypto", &[], MARKET_DATA_KEY))
        .await
        .expect("call");

    assert_eq!(body["market"], json!("crypto"));
}

#[tokio::test]
async fn test_error_status_uses_message_from_body() {
    let addr = spawn_market_data_server().await;

    let err = client(addr)
        .call(&upstream_request("time_series", &[("symbol", "AAPL")], "wrong-key"))
        .await
        .expect_err("unauthorized");

    assert_eq!(
        err,
        DispatchError::Upstream {
            status: Some(401),
            message: "invalid api key".to_string(),
        }
    );
}

#[tokio::test]
async fn test_error_status_without_json_body() {
    let addr = spawn_market_data_server().await;

    let err = client(addr)
        .call(&upstream_request("quote", &[("symbol", "AAPL")], MARKET_DATA_KEY))
        .await
        .expect_err("server error");

    assert_eq!(
        err,
        DispatchError::Upstream {
            status: Some(500),
            message: "Internal Server Error".to_string(),
        }
    );
}

#[tokio::test]
async fn test_connection_refused() {
    // Bind and drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let err = client(addr)
        .call(&upstream_request("price", &[("symbol", "AAPL")], MARKET_DATA_KEY))
        .await
        .expect_err("refused");

    let DispatchError::Upstream { status, message } = err else {
        panic!("expected upstream error");
    };
    assert!(status.is_none());
    assert!(!message.contains(MARKET_DATA_KEY));
}

fn router_against(addr: SocketAddr, chat: ScriptedChat) -> QueryRouter {
    QueryRouter::new(
        registry(),
        Arc::new(KeywordEmbedder::default()),
        Arc::new(fixture_index()),
        Arc::new(chat),
        Arc::new(client(addr)),
        &RoutingSettings::default(),
    )
}

#[tokio::test]
async fn test_pipeline_over_http() {
    let addr = spawn_market_data_server().await;
    let router = router_against(
        addr,
        ScriptedChat::new().with_arguments(
            "GetTimeSeries",
            json!({"symbol": "NVDA", "interval": "1h"}),
        ),
    );

    let result = router
        .route(&request("NVDA hourly candles history", Some("basic")))
        .await;

    assert!(result.error.is_none(), "{:?}", result.error);
    assert_eq!(
        result.selected_tool.as_ref().map(OperationId::as_str),
        Some("GetTimeSeries")
    );
    assert_eq!(result.payload, Some(time_series_body("NVDA")));
}

#[tokio::test]
async fn test_pipeline_rejected_key() {
    let addr = spawn_market_data_server().await;
    let router = router_against(
        addr,
        ScriptedChat::new().forcing("GetTimeSeries", r#"{"symbol": "AAPL", "interval": "1day"}"#),
    );

    let mut req = request("AAPL daily candles", None);
    req.credentials.market_data = SecretString::from("wrong-key");
    let result = router.route(&req).await;

    assert_eq!(result.error.as_deref(), Some("upstream error (401): invalid api key"));
    assert!(result.payload.is_none());
}

#[tokio::test]
async fn test_direct_call_with_in_band_error() {
    let addr = spawn_market_data_server().await;
    let router = router_against(addr, ScriptedChat::new());

    let arguments = json!({"symbol": "ZZZZ"})
        .as_object()
        .cloned()
        .expect("object");
    let result = router
        .route_direct("GetPrice", arguments, &request("price of ZZZZ", None))
        .await;

    assert_eq!(
        result.error.as_deref(),
        Some("upstream error (404): symbol not found")
    );
    assert!(result.payload.is_none());
    assert_eq!(result.selected_tool.as_ref().map(OperationId::as_str), Some("GetPrice"));
}
