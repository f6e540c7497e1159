//! The routing pipeline.
//!
//! A query moves through these stages, stopping at the first failure:
//!
//! ```text
//! Embedding -> Retrieved -> Gated -> Selecting -> Selected -> Dispatching -> Done
//! ```
//!
//! Every stage writes what it learned into the [`RoutingResult`] before the
//! next one starts, so a failed result still shows the candidates, the
//! selected operation and its arguments.

mod error;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use market_router_core::{OperationId, OutputFormat, RoutingResult};
use serde_json::{Map, Value};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

pub use error::RoutingError;

use crate::config::RoutingSettings;
use crate::credentials::Credentials;
use crate::dispatch::{Dispatcher, UpstreamCaller};
use crate::openai::ChatModel;
use crate::registry::{Operation, OperationRegistry};
use crate::tool_selection::{Embedder, PlanGate, Retriever, SemanticIndex, ToolSelector};

/// One routing request.
#[derive(Debug, Clone)]
pub struct RoutingRequest {
    /// Natural-language query.
    pub query: String,
    /// Caller's plan name; `None` means unrestricted.
    pub plan: Option<String>,
    /// How the payload should be returned.
    pub format: OutputFormat,
    /// Keys for the market-data API and the LLM provider.
    pub credentials: Credentials,
}

/// Pipeline stage, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteStage {
    /// Embedding the query.
    Embedding,
    /// Candidates retrieved from the index.
    Retrieved,
    /// Candidates split by plan.
    Gated,
    /// Waiting for the model's choice.
    Selecting,
    /// Operation chosen.
    Selected,
    /// Calling the upstream API.
    Dispatching,
    /// Payload ready.
    Done,
    /// Stopped at the first error.
    Failed,
}

impl fmt::Display for RouteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Embedding => "embedding",
            Self::Retrieved => "retrieved",
            Self::Gated => "gated",
            Self::Selecting => "selecting",
            Self::Selected => "selected",
            Self::Dispatching => "dispatching",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

fn enter(stage: RouteStage) {
    debug!(stage = %stage, "Route stage");
}

/// Routes natural-language queries to market-data operations.
#[derive(Clone)]
pub struct QueryRouter {
    inner: Arc<QueryRouterInner>,
}

struct QueryRouterInner {
    registry: Arc<OperationRegistry>,
    retriever: Retriever,
    gate: PlanGate,
    selector: ToolSelector,
    dispatcher: Dispatcher,
    request_timeout: Duration,
}

impl fmt::Debug for QueryRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryRouter")
            .field("operations", &self.inner.registry.len())
            .field("retriever", &self.inner.retriever)
            .field("request_timeout", &self.inner.request_timeout)
            .finish_non_exhaustive()
    }
}

impl QueryRouter {
    /// Create a router from its collaborators.
    #[must_use]
    pub fn new(
        registry: Arc<OperationRegistry>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn SemanticIndex>,
        chat: Arc<dyn ChatModel>,
        upstream: Arc<dyn UpstreamCaller>,
        settings: &RoutingSettings,
    ) -> Self {
        let retriever = Retriever::new(
            embedder,
            index,
            settings.top_k,
            settings.fallback_operation.clone(),
        );
        let gate = PlanGate::new(Arc::clone(&registry), settings.unclassified_tier);

        Self {
            inner: Arc::new(QueryRouterInner {
                registry,
                retriever,
                gate,
                selector: ToolSelector::new(Arc::clone(&chat)),
                dispatcher: Dispatcher::new(upstream, chat),
                request_timeout: settings.request_timeout,
            }),
        }
    }

    /// The operation registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<OperationRegistry> {
        &self.inner.registry
    }

    /// The semantic index.
    #[must_use]
    pub fn index(&self) -> &Arc<dyn SemanticIndex> {
        self.inner.retriever.index()
    }

    /// Route a query end to end.
    ///
    /// Never fails: errors, including an expired deadline, are reported in
    /// the result's `error` field.
    pub async fn route(&self, request: &RoutingRequest) -> RoutingResult {
        let span = info_span!(
            "route",
            request_id = %Uuid::new_v4(),
            plan = request.plan.as_deref(),
            format = ?request.format,
        );

        async {
            let mut result = RoutingResult::default();
            let outcome =
                tokio::time::timeout(self.inner.request_timeout, self.run(request, &mut result))
                    .await;
            self.finish(&mut result, outcome);
            result
        }
        .instrument(span)
        .await
    }

    /// Call one operation directly, skipping retrieval and selection.
    ///
    /// The plan is still enforced. `request.query` is only used as context
    /// for summarization.
    pub async fn route_direct(
        &self,
        operation_id: &str,
        arguments: Map<String, Value>,
        request: &RoutingRequest,
    ) -> RoutingResult {
        let span = info_span!(
            "route_direct",
            request_id = %Uuid::new_v4(),
            operation = operation_id,
            plan = request.plan.as_deref(),
        );

        async {
            let mut result = RoutingResult::default();
            let outcome = tokio::time::timeout(
                self.inner.request_timeout,
                self.run_direct(operation_id, arguments, request, &mut result),
            )
            .await;
            self.finish(&mut result, outcome);
            result
        }
        .instrument(span)
        .await
    }

    fn finish(
        &self,
        result: &mut RoutingResult,
        outcome: Result<Result<(), RoutingError>, tokio::time::error::Elapsed>,
    ) {
        let error = match outcome {
            Ok(Ok(())) => {
                info!(
                    stage = %RouteStage::Done,
                    operation = ?result.selected_tool,
                    warnings = result.warnings.len(),
                    "Route finished"
                );
                return;
            }
            Ok(Err(e)) => e,
            Err(_) => RoutingError::DeadlineExceeded(self.inner.request_timeout),
        };
        warn!(stage = %RouteStage::Failed, error = %error, "Route failed");
        result.fail(error.to_string());
    }

    async fn run(
        &self,
        request: &RoutingRequest,
        result: &mut RoutingResult,
    ) -> Result<(), RoutingError> {
        let plan = PlanGate::parse_plan(request.plan.as_deref())?;

        enter(RouteStage::Embedding);
        let candidates = self
            .inner
            .retriever
            .retrieve(&request.credentials.llm, &request.query)
            .await?;
        result.top_candidates.clone_from(&candidates);

        enter(RouteStage::Retrieved);
        let outcome = self.inner.gate.split(plan, &candidates);
        result.premium_only_candidates = outcome.premium_only;

        enter(RouteStage::Gated);
        let allowed: Vec<&Operation> = outcome
            .allowed
            .iter()
            .filter_map(|id| self.inner.registry.get(id.as_str()))
            .collect();

        enter(RouteStage::Selecting);
        let selection = self
            .inner
            .selector
            .choose(&request.credentials.llm, &request.query, &allowed)
            .await?;
        result.selected_tool = Some(selection.operation_id.clone());
        result.arguments = Some(Value::Object(selection.arguments.clone()));
        result.motivation = selection.motivation;

        enter(RouteStage::Selected);
        let operation = self
            .inner
            .registry
            .get(selection.operation_id.as_str())
            .ok_or_else(|| RoutingError::UnknownOperation(selection.operation_id.to_string()))?;

        self.dispatch(operation, selection.arguments, request, result).await
    }

    async fn run_direct(
        &self,
        operation_id: &str,
        arguments: Map<String, Value>,
        request: &RoutingRequest,
        result: &mut RoutingResult,
    ) -> Result<(), RoutingError> {
        let plan = PlanGate::parse_plan(request.plan.as_deref())?;
        let operation = self
            .inner
            .registry
            .get(operation_id)
            .ok_or_else(|| RoutingError::UnknownOperation(operation_id.to_string()))?;
        result.top_candidates = vec![operation.id.clone()];

        if !self.inner.gate.permits(plan, operation_id) {
            result.premium_only_candidates = vec![operation.id.clone()];
            let required = self
                .inner
                .gate
                .required_tier(operation_id)
                .ok_or_else(|| RoutingError::UnknownOperation(operation_id.to_string()))?;
            return Err(RoutingError::PlanRestricted {
                operation: operation_id.to_string(),
                required,
            });
        }

        result.selected_tool = Some(operation.id.clone());
        result.arguments = Some(Value::Object(arguments.clone()));
        self.dispatch(operation, arguments, request, result).await
    }

    async fn dispatch(
        &self,
        operation: &Operation,
        arguments: Map<String, Value>,
        request: &RoutingRequest,
        result: &mut RoutingResult,
    ) -> Result<(), RoutingError> {
        enter(RouteStage::Dispatching);
        let prepared = Dispatcher::prepare(operation, arguments, &request.credentials.market_data)?;
        result.arguments = Some(Value::Object(prepared.arguments));

        let payload = self
            .inner
            .dispatcher
            .execute(operation, &prepared.request)
            .await?;
        let rendered = self
            .inner
            .dispatcher
            .render(&request.credentials.llm, &request.query, payload, request.format)
            .await;

        result.warnings.extend(rendered.warning);
        result.payload = Some(rendered.payload);
        Ok(())
    }

    /// Ids of the operations a plan could select, for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::InvalidPlan`] for unknown plan names.
    pub fn permitted_operations(&self, plan: Option<&str>) -> Result<Vec<OperationId>, RoutingError> {
        let plan = PlanGate::parse_plan(plan)?;
        Ok(self
            .inner
            .registry
            .ids()
            .filter(|id| self.inner.gate.permits(plan, id.as_str()))
            .cloned()
            .collect())
    }
}
