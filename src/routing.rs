use tracing::debug;

use crate::classifier::{Classification, ComplexityTier};
use crate::config::{CascadeConfig, ModelSpec};
use crate::query::Query;

/// Threshold at or below which a trivial query is answered by the draft
/// model alone, with no validation pass.
const DIRECT_CHEAP_CEILING: f32 = 0.30;

/// How a query will be executed. Chosen once, before any model is called,
/// and never changed mid-flight.
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// Draft model only, accepted without validation.
    DirectCheap,
    /// Verifier model only; the cascade is skipped entirely.
    DirectExpensive,
    /// Draft first, verify on rejection.
    Cascade {
        draft: ModelSpec,
        verifier: ModelSpec,
    },
}

impl Strategy {
    pub fn kind(&self) -> &'static str {
        match self {
            Strategy::DirectCheap => "direct_cheap",
            Strategy::DirectExpensive => "direct_expensive",
            Strategy::Cascade { .. } => "cascade",
        }
    }
}

/// Pure, total strategy selection. Rules are evaluated in order; every
/// input combination yields exactly one strategy.
#[derive(Debug, Clone, Default)]
pub struct RoutingPolicy;

impl RoutingPolicy {
    pub fn new() -> Self {
        Self
    }

    pub fn select(
        &self,
        classification: &Classification,
        config: &CascadeConfig,
        query: &Query,
    ) -> Strategy {
        let strategy = self.select_inner(classification, config, query);
        debug!(
            strategy = strategy.kind(),
            tier = %classification.tier,
            force_direct = query.force_direct,
            "routing strategy selected"
        );
        strategy
    }

    fn select_inner(
        &self,
        classification: &Classification,
        config: &CascadeConfig,
        query: &Query,
    ) -> Strategy {
        // Rule 1: compliance-critical callers bypass the cascade.
        if query.force_direct {
            return Strategy::DirectExpensive;
        }

        // Rule 2: expert work, or tool work the draft model cannot do.
        if classification.tier == ComplexityTier::Expert {
            return Strategy::DirectExpensive;
        }
        if query.has_tools() && !config.draft_model().supports_tools {
            return Strategy::DirectExpensive;
        }

        // Rule 3: trivial text-only queries with a negligible bar skip
        // validation. Tool-bearing queries never take this path: tool-call
        // risk must always be checked before a draft is accepted.
        if classification.tier == ComplexityTier::Trivial
            && !query.has_tools()
            && config.effective_threshold(ComplexityTier::Trivial) <= DIRECT_CHEAP_CEILING
        {
            return Strategy::DirectCheap;
        }

        // Rule 4: the cascade proper.
        Strategy::Cascade {
            draft: config.draft_model().clone(),
            verifier: config.verifier_model().clone(),
        }
    }
}
