//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness
//! GET  /health/ready           - Readiness (index probe)
//!
//! # Routing
//! GET  /utool?query=&format=&plan=  - Route a natural-language query
//! POST /utool                       - Same, JSON body {query, format?, plan?}
//!
//! # Documentation
//! GET  /doctool?query=              - Answer a question from the API documentation
//!
//! # Direct tools
//! GET  /tools?plan=            - Exposed operations as function schemas
//! POST /tools/{id}?plan=&format=&query=  - Call one operation with a JSON argument object
//! ```

pub mod doctool;
pub mod health;
pub mod tools;
pub mod utool;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::state::AppState;

/// All routes, without state.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/utool", get(utool::utool_get).post(utool::utool_post))
        .route("/doctool", get(doctool::doctool_get))
        .route("/tools", get(tools::list_tools))
        .route("/tools/{id}", post(tools::call_tool))
}

/// The application with request tracing and state attached.
pub fn app(state: AppState) -> Router {
    routes()
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri().path(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}
