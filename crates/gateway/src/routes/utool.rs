//! Natural-language routing endpoint.

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use market_router_core::{OutputFormat, RoutingResult};
use serde::Deserialize;

use crate::credentials::{CredentialError, Credentials};
use crate::error::AppError;
use crate::router::{RoutingError, RoutingRequest};
use crate::state::AppState;

/// Parameters of `/utool`, from the query string (GET) or JSON body (POST).
#[derive(Debug, Default, Deserialize)]
pub struct UtoolParams {
    /// Natural-language query.
    pub query: Option<String>,
    /// `json` or `md`.
    pub format: Option<String>,
    /// Caller's plan name.
    pub plan: Option<String>,
}

/// `GET /utool?query=&format=&plan=`
///
/// # Errors
///
/// Returns 400 if `query` is missing or `format` is unknown.
pub async fn utool_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<UtoolParams>,
) -> Result<Response, AppError> {
    route_query(&state, &headers, params).await
}

/// `POST /utool` with a JSON body.
///
/// # Errors
///
/// Returns 400 if `query` is missing or `format` is unknown.
pub async fn utool_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(params): Json<UtoolParams>,
) -> Result<Response, AppError> {
    route_query(&state, &headers, params).await
}

async fn route_query(
    state: &AppState,
    headers: &HeaderMap,
    params: UtoolParams,
) -> Result<Response, AppError> {
    let query = params
        .query
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing 'query' query parameter".to_string()))?;
    let format = parse_format(params.format.as_deref())?;

    let credentials = match resolve_credentials(state, headers).await {
        Ok(credentials) => credentials,
        Err(response) => return Ok(response),
    };

    let request = RoutingRequest {
        query,
        plan: non_blank(params.plan),
        format,
        credentials,
    };
    let result = state.router().route(&request).await;
    Ok(Json(result).into_response())
}

/// Parse an optional wire format name.
pub(super) fn parse_format(format: Option<&str>) -> Result<OutputFormat, AppError> {
    format
        .filter(|f| !f.trim().is_empty())
        .map(str::parse::<OutputFormat>)
        .transpose()
        .map(Option::unwrap_or_default)
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

pub(super) fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// 401 with the failure reported in the routing envelope.
fn credential_failure(err: CredentialError) -> Response {
    tracing::info!(error = %err, "Credential resolution failed");
    let result = RoutingResult::failed(RoutingError::from(err).to_string());
    (StatusCode::UNAUTHORIZED, Json(result)).into_response()
}

/// Resolve credentials or build the 401 response.
pub(super) async fn resolve_credentials(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Credentials, Response> {
    state
        .credentials()
        .resolve(headers)
        .await
        .map_err(credential_failure)
}
