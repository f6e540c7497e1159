//! Direct tool listing and invocation.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::utool::{non_blank, parse_format, resolve_credentials};
use crate::error::AppError;
use crate::openai::ToolDefinition;
use crate::router::RoutingRequest;
use crate::state::AppState;

/// Query parameters shared by the tools endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ToolParams {
    /// Caller's plan name.
    pub plan: Option<String>,
    /// `json` or `md`, for invocation.
    pub format: Option<String>,
    /// Context for summarization, for invocation.
    pub query: Option<String>,
}

/// `GET /tools`: the exposed operations as function schemas.
///
/// With `?plan=`, operations the plan does not cover are left out.
///
/// # Errors
///
/// Returns 400 for an unknown plan name.
pub async fn list_tools(
    State(state): State<AppState>,
    Query(params): Query<ToolParams>,
) -> Result<Json<Vec<ToolDefinition>>, AppError> {
    let router = state.router();
    let view = router.registry().view(state.tool_limit());

    let Some(plan) = non_blank(params.plan) else {
        return Ok(Json(view.tool_definitions()));
    };
    let permitted = router
        .permitted_operations(Some(&plan))
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    Ok(Json(
        view.tool_definitions()
            .into_iter()
            .filter(|tool| permitted.iter().any(|id| *id == tool.function.name.as_str()))
            .collect(),
    ))
}

/// `POST /tools/{id}`: call one operation with a JSON argument object.
///
/// # Errors
///
/// Returns 404 if the operation is not exposed, 400 for an unknown format.
pub async fn call_tool(
    State(state): State<AppState>,
    Path(operation_id): Path<String>,
    headers: HeaderMap,
    Query(params): Query<ToolParams>,
    arguments: Option<Json<Map<String, Value>>>,
) -> Result<Response, AppError> {
    let router = state.router();
    let view = router.registry().view(state.tool_limit());
    let Some(operation) = view
        .operations()
        .iter()
        .find(|op| op.id == operation_id.as_str())
    else {
        return Err(AppError::NotFound(operation_id));
    };
    let format = parse_format(params.format.as_deref())?;

    let credentials = match resolve_credentials(&state, &headers).await {
        Ok(credentials) => credentials,
        Err(response) => return Ok(response),
    };

    let request = RoutingRequest {
        query: non_blank(params.query).unwrap_or_else(|| operation.description.to_string()),
        plan: non_blank(params.plan),
        format,
        credentials,
    };
    let arguments = arguments.map(|Json(a)| a).unwrap_or_default();
    let result = router.route_direct(&operation_id, arguments, &request).await;

    Ok(Json(result).into_response())
}
