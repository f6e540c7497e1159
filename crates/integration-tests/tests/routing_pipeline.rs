//! End-to-end routing through the query router with fake collaborators.

#![allow(clippy::expect_used)]

use std::collections::BTreeSet;

use market_router::config::RoutingSettings;
use market_router::registry::OperationRegistry;
use market_router_core::{OperationId, OutputFormat, Tier};
use market_router_integration_tests::{
    FakeUpstream, Harness, MARKET_DATA_KEY, ScriptedChat, request, time_series_body,
};
use serde_json::{Value, json};

fn tsla_chat() -> ScriptedChat {
    ScriptedChat::new().with_arguments(
        "GetTimeSeries",
        json!({"symbol": "TSLA", "interval": "1min", "outputsize": 5}),
    )
}

fn ids(list: &[OperationId]) -> Vec<&str> {
    list.iter().map(OperationId::as_str).collect()
}

#[tokio::test]
async fn test_intraday_candles_for_tsla() {
    let harness = Harness::new(tsla_chat());

    let result = harness
        .router
        .route(&request("Show me TSLA 1 minute candles for the last hour", Some("pro")))
        .await;

    assert!(result.error.is_none(), "unexpected error: {:?}", result.error);
    assert_eq!(result.top_candidates.first().map(OperationId::as_str), Some("GetTimeSeries"));
    assert_eq!(result.selected_tool.as_ref().map(OperationId::as_str), Some("GetTimeSeries"));
    assert_eq!(
        result.arguments,
        Some(json!({"symbol": "TSLA", "interval": "1min", "outputsize": 5}))
    );
    assert_eq!(
        result.motivation.as_deref(),
        Some("GetTimeSeries answers the question directly.")
    );
    assert_eq!(result.payload, Some(time_series_body("TSLA")));
    assert!(result.warnings.is_empty());

    let requests = harness.upstream.requests();
    assert_eq!(requests.len(), 1);
    let sent = requests.first().expect("one request");
    assert_eq!(sent.path, "time_series");
    assert_eq!(sent.param("symbol"), Some("TSLA"));
    assert_eq!(sent.param("interval"), Some("1min"));
    assert_eq!(sent.param("outputsize"), Some("5"));
    assert_eq!(sent.api_key, MARKET_DATA_KEY);
    assert!(sent.param("apikey").is_none());
}

#[tokio::test]
async fn test_market_movers_on_basic_plan_is_premium_only() {
    let harness = Harness::new(tsla_chat());

    let result = harness
        .router
        .route(&request("What are today's top market movers and gainers?", Some("basic")))
        .await;

    assert_eq!(
        result.top_candidates.first().map(OperationId::as_str),
        Some("GetMarketMovers")
    );
    assert!(ids(&result.premium_only_candidates).contains(&"GetMarketMovers"));
    assert_ne!(
        result.selected_tool.as_ref().map(OperationId::as_str),
        Some("GetMarketMovers")
    );

    let offered = harness.chat.offered();
    let offered = offered.first().expect("model was asked");
    assert!(!offered.iter().any(|name| name == "GetMarketMovers"));
    assert!(!offered.iter().any(|name| name == "GetPriceTarget"));
    assert!(!offered.iter().any(|name| name == "GetProfile"));
}

#[tokio::test]
async fn test_market_movers_on_pro_plan() {
    let chat = ScriptedChat::new().with_arguments(
        "GetMarketMovers",
        json!({"market": "stocks", "outputsize": 10}),
    );
    let harness = Harness::new(chat);

    let result = harness
        .router
        .route(&request("top market movers today", Some("pro")))
        .await;

    assert!(result.error.is_none(), "unexpected error: {:?}", result.error);
    assert_eq!(
        result.selected_tool.as_ref().map(OperationId::as_str),
        Some("GetMarketMovers")
    );
    // Default direction filled in by coercion.
    assert_eq!(
        result.arguments,
        Some(json!({"market": "stocks", "direction": "gainers", "outputsize": 10}))
    );
    let requests = harness.upstream.requests();
    let sent = requests.first().expect("one request");
    assert_eq!(sent.path, "market_movers/stocks");
    assert!(sent.param("market").is_none());
    assert_eq!(sent.param("direction"), Some("gainers"));
}

#[tokio::test]
async fn test_missing_path_parameter() {
    let chat = ScriptedChat::new().forcing("GetMarketMovers", r#"{"direction": "losers"}"#);
    let harness = Harness::new(chat);

    let result = harness
        .router
        .route(&request("biggest losers in the market movers list", Some("enterprise")))
        .await;

    assert_eq!(
        result.error.as_deref(),
        Some("missing path parameter 'market' for GetMarketMovers")
    );
    assert!(result.payload.is_none());
    assert_eq!(
        result.selected_tool.as_ref().map(OperationId::as_str),
        Some("GetMarketMovers")
    );
    assert!(harness.upstream.requests().is_empty());
}

#[tokio::test]
async fn test_invalid_plan_fails_before_any_call() {
    let harness = Harness::new(tsla_chat());

    let result = harness
        .router
        .route(&request("TSLA intraday", Some("platinum")))
        .await;

    assert_eq!(result.error.as_deref(), Some("unknown subscription plan 'platinum'"));
    assert!(result.top_candidates.is_empty());
    assert!(result.selected_tool.is_none());
    assert_eq!(harness.embedder.calls(), 0);
    assert!(harness.chat.offered().is_empty());
    assert!(harness.upstream.requests().is_empty());
}

#[tokio::test]
async fn test_no_plan_offers_everything_retrieved() {
    let harness = Harness::new(tsla_chat());

    let result = harness
        .router
        .route(&request("company profile and analyst price target", None))
        .await;

    assert!(result.premium_only_candidates.is_empty());
    let offered = harness.chat.offered();
    let offered: BTreeSet<&str> = offered
        .first()
        .expect("model was asked")
        .iter()
        .map(String::as_str)
        .collect();
    let retrieved: BTreeSet<&str> = ids(&result.top_candidates).into_iter().collect();
    assert_eq!(offered, retrieved);
}

#[tokio::test]
async fn test_fallback_is_always_a_candidate() {
    let settings = RoutingSettings {
        top_k: 1,
        ..RoutingSettings::default()
    };
    let harness = Harness::build(tsla_chat(), FakeUpstream::default(), &settings);

    for query in ["market movers", "company profile", "eur/usd exchange rate", "quote"] {
        let result = harness.router.route(&request(query, Some("ultra"))).await;
        assert_eq!(result.top_candidates.len(), 2, "query {query}");
        assert_eq!(
            result.top_candidates.last().map(OperationId::as_str),
            Some("GetTimeSeries"),
            "query {query}"
        );
    }

    let result = harness.router.route(&request("minute candles", None)).await;
    assert_eq!(ids(&result.top_candidates), vec!["GetTimeSeries"]);
}

#[tokio::test]
async fn test_selection_never_exceeds_plan() {
    let registry = OperationRegistry::builtin().expect("registry");
    let harness = Harness::new(tsla_chat());

    let queries = [
        "analyst price target for NVDA",
        "company profile of Apple",
        "market movers",
        "eur/usd exchange rate",
        "AAPL quote",
    ];
    for plan in [Tier::Basic, Tier::Grow, Tier::Pro] {
        for query in queries {
            let result = harness
                .router
                .route(&request(query, Some(&plan.to_string())))
                .await;
            if let Some(selected) = &result.selected_tool {
                let required = registry
                    .get(selected.as_str())
                    .and_then(|op| op.min_tier)
                    .unwrap_or(Tier::Basic);
                assert!(required <= plan, "{selected} selected on {plan}");
            }
            for id in &result.premium_only_candidates {
                assert!(result.top_candidates.contains(id));
            }
        }
    }
}

#[tokio::test]
async fn test_exactly_one_of_payload_or_error() {
    let harness = Harness::new(
        tsla_chat().with_arguments("GetQuote", json!({"symbol": "AAPL"})),
    );

    for (query, plan) in [
        ("TSLA minute candles", Some("basic")),
        ("AAPL quote", None),
        ("market movers", Some("basic")),
        ("price target", Some("gold")),
        ("company profile", Some("grow")),
    ] {
        let result = harness.router.route(&request(query, plan)).await;
        assert_ne!(
            result.payload.is_some(),
            result.error.is_some(),
            "query {query}: {result:?}"
        );
    }
}

#[tokio::test]
async fn test_retrieval_is_deterministic() {
    let harness = Harness::new(tsla_chat());

    let first = harness
        .router
        .route(&request("company profile and quote", Some("ultra")))
        .await;
    let second = harness
        .router
        .route(&request("company profile and quote", Some("ultra")))
        .await;

    assert_eq!(first.top_candidates, second.top_candidates);
    assert_eq!(first.premium_only_candidates, second.premium_only_candidates);
}

#[tokio::test]
async fn test_summarized_output() {
    let harness = Harness::new(tsla_chat());
    let mut req = request("TSLA 1 minute candles", Some("basic"));
    req.format = OutputFormat::Summarized;

    let result = harness.router.route(&req).await;

    let Some(Value::String(markdown)) = &result.payload else {
        panic!("expected markdown payload, got {:?}", result.payload);
    };
    assert!(markdown.starts_with("## Report"));
    assert!(result.warnings.is_empty());
    assert_eq!(harness.chat.summaries(), 1);
}

#[tokio::test]
async fn test_failed_summary_falls_back_to_json() {
    let harness = Harness::new(tsla_chat().failing_summaries());
    let mut req = request("TSLA 1 minute candles", Some("basic"));
    req.format = OutputFormat::Summarized;

    let result = harness.router.route(&req).await;

    assert!(result.error.is_none());
    assert_eq!(result.payload, Some(time_series_body("TSLA")));
    assert_eq!(result.warnings.len(), 1);
}

#[tokio::test]
async fn test_upstream_error_keeps_diagnostics() {
    let upstream = FakeUpstream::default().with_response(
        "time_series",
        json!({"code": 400, "message": "**symbol** not found: ZZZZ", "status": "error"}),
    );
    let chat = ScriptedChat::new()
        .with_arguments("GetTimeSeries", json!({"symbol": "ZZZZ", "interval": "1day"}));
    let harness = Harness::build(chat, upstream, &RoutingSettings::default());

    let result = harness
        .router
        .route(&request("ZZZZ daily candles", None))
        .await;

    let error = result.error.as_deref().expect("error");
    assert!(error.contains("symbol** not found"), "{error}");
    assert!(result.payload.is_none());
    assert_eq!(
        result.selected_tool.as_ref().map(OperationId::as_str),
        Some("GetTimeSeries")
    );
    assert!(!result.top_candidates.is_empty());
}

#[tokio::test]
async fn test_invalid_argument_is_reported() {
    let chat = ScriptedChat::new()
        .with_arguments("GetTimeSeries", json!({"symbol": "TSLA", "interval": "7min"}));
    let harness = Harness::new(chat);

    let result = harness
        .router
        .route(&request("TSLA minute candles", None))
        .await;

    let error = result.error.as_deref().expect("error");
    assert!(error.starts_with("invalid argument 'interval'"), "{error}");
    assert!(harness.upstream.requests().is_empty());
}

#[test]
fn test_function_schemas_match_parameter_lists() {
    let registry = OperationRegistry::builtin().expect("registry");

    for op in registry.operations() {
        let definition = op.function_definition();
        assert_eq!(definition.name, op.id.as_str());

        let schema = definition.parameters;
        let properties: BTreeSet<&str> = schema["properties"]
            .as_object()
            .expect("properties")
            .keys()
            .map(String::as_str)
            .collect();
        let required: BTreeSet<&str> = schema["required"]
            .as_array()
            .expect("required")
            .iter()
            .filter_map(Value::as_str)
            .collect();

        let expected_all: BTreeSet<&str> = op.params.iter().map(|p| p.name).collect();
        let expected_required: BTreeSet<&str> =
            op.params.iter().filter(|p| p.required).map(|p| p.name).collect();

        assert_eq!(properties, expected_all, "{}", op.id);
        assert_eq!(required, expected_required, "{}", op.id);
        for placeholder in op.placeholders() {
            assert!(required.contains(placeholder), "{} {placeholder}", op.id);
        }
    }
}
