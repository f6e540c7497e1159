//! Subscription plan gating of candidate operations.

use std::sync::Arc;

use market_router_core::{OperationId, Tier};
use tracing::warn;

use super::ToolSelectionError;
use crate::registry::OperationRegistry;

/// Candidates split by what the caller's plan permits.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GateOutcome {
    /// Operations the caller may use, in input order.
    pub allowed: Vec<OperationId>,
    /// Operations that need a higher plan, in input order.
    pub premium_only: Vec<OperationId>,
}

/// Splits candidate operations by subscription tier.
#[derive(Debug, Clone)]
pub struct PlanGate {
    registry: Arc<OperationRegistry>,
    unclassified_tier: Tier,
}

impl PlanGate {
    /// Create a gate; operations without a tier are treated as `unclassified_tier`.
    #[must_use]
    pub const fn new(registry: Arc<OperationRegistry>, unclassified_tier: Tier) -> Self {
        Self {
            registry,
            unclassified_tier,
        }
    }

    /// Parse a plan name. `None` means unrestricted.
    ///
    /// # Errors
    ///
    /// Returns [`ToolSelectionError::InvalidPlan`] for unknown names.
    pub fn parse_plan(plan: Option<&str>) -> Result<Option<Tier>, ToolSelectionError> {
        plan.map(str::parse::<Tier>).transpose().map_err(Into::into)
    }

    /// Tier an operation requires.
    #[must_use]
    pub fn required_tier(&self, id: &str) -> Option<Tier> {
        self.registry
            .get(id)
            .map(|op| op.min_tier.unwrap_or(self.unclassified_tier))
    }

    /// Whether `plan` may call `id`. Unknown ids are never permitted.
    #[must_use]
    pub fn permits(&self, plan: Option<Tier>, id: &str) -> bool {
        match (plan, self.required_tier(id)) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(plan), Some(required)) => plan.covers(required),
        }
    }

    /// Split candidates into allowed and premium-only, preserving order.
    ///
    /// With no plan every known candidate is allowed. Ids unknown to the
    /// registry are dropped.
    #[must_use]
    pub fn split(&self, plan: Option<Tier>, candidates: &[OperationId]) -> GateOutcome {
        let mut outcome = GateOutcome::default();
        for id in candidates {
            let Some(required) = self.required_tier(id.as_str()) else {
                warn!(operation = %id, "Dropping candidate unknown to the registry");
                continue;
            };
            match plan {
                Some(plan) if !plan.covers(required) => outcome.premium_only.push(id.clone()),
                _ => outcome.allowed.push(id.clone()),
            }
        }
        outcome
    }
}
