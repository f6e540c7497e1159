//! Documentation question endpoint.

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use market_router_core::DocAnswer;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

/// Query string of `GET /doctool`.
#[derive(Debug, Default, Deserialize)]
pub struct DoctoolParams {
    /// Question about the API.
    pub query: Option<String>,
}

/// `GET /doctool?query=`
///
/// Credential failures are reported with 401 inside the answer envelope.
///
/// # Errors
///
/// Returns 400 if `query` is missing and 503 if no documentation index is
/// configured.
pub async fn doctool_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<DoctoolParams>,
) -> Result<Response, AppError> {
    let query = params
        .query
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing 'query' query parameter".to_string()))?;

    let Some(docs) = state.docs() else {
        return Err(AppError::Unavailable(
            "Documentation search is not configured".to_string(),
        ));
    };

    let api_key = match state.credentials().resolve_llm_key(&headers).await {
        Ok(key) => key,
        Err(err) => {
            tracing::info!(error = %err, "Credential resolution failed");
            let answer = DocAnswer::failed(query, err.to_string());
            return Ok((StatusCode::UNAUTHORIZED, Json(answer)).into_response());
        }
    };

    Ok(Json(docs.answer(&api_key, &query).await).into_response())
}
