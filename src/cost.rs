use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::ModelSpec;
use crate::provider::TokenUsage;

/// Pure cost arithmetic over per-1K-token pricing.
#[derive(Debug, Clone, Copy, Default)]
pub struct CostAccountant;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub draft_cost: f64,
    pub verifier_cost: f64,
    pub total_cost: f64,
    /// Savings relative to sending the same token counts to the verifier
    /// alone. Zero when the verifier was the only model used.
    pub savings_percent: f64,
}

impl CostAccountant {
    pub fn new() -> Self {
        Self
    }

    pub fn cost(&self, model: &ModelSpec, usage: &TokenUsage) -> f64 {
        (usage.input_tokens as f64 / 1000.0) * model.input_cost_per_1k
            + (usage.output_tokens as f64 / 1000.0) * model.output_cost_per_1k
    }

    pub fn breakdown(
        &self,
        draft: Option<(&ModelSpec, &TokenUsage)>,
        verifier: Option<(&ModelSpec, &TokenUsage)>,
        baseline_model: &ModelSpec,
    ) -> CostBreakdown {
        let draft_cost = draft.map(|(m, u)| self.cost(m, u)).unwrap_or(0.0);
        let verifier_cost = verifier.map(|(m, u)| self.cost(m, u)).unwrap_or(0.0);
        let total_cost = draft_cost + verifier_cost;

        let combined = draft
            .map(|(_, u)| *u)
            .unwrap_or_default()
            .combined(&verifier.map(|(_, u)| *u).unwrap_or_default());
        let verifier_only = self.cost(baseline_model, &combined);

        let savings_percent = if verifier_only > 0.0 {
            1.0 - total_cost / verifier_only
        } else {
            0.0
        };

        CostBreakdown {
            draft_cost,
            verifier_cost,
            total_cost,
            savings_percent,
        }
    }
}

const MICROS_PER_DOLLAR: f64 = 1_000_000.0;

/// Running cost totals across concurrent executions. Counters are atomic
/// micro-dollar accumulators so completions from many tasks can append
/// without a lock.
#[derive(Debug, Default)]
pub struct SavingsTracker {
    spent_micros: AtomicU64,
    baseline_micros: AtomicU64,
    completed: AtomicU64,
}

impl SavingsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, total_cost: f64, savings_percent: f64) {
        let baseline = if savings_percent < 1.0 {
            total_cost / (1.0 - savings_percent)
        } else {
            total_cost
        };
        self.spent_micros
            .fetch_add(to_micros(total_cost), Ordering::Relaxed);
        self.baseline_micros
            .fetch_add(to_micros(baseline), Ordering::Relaxed);
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_cost(&self) -> f64 {
        self.spent_micros.load(Ordering::Relaxed) as f64 / MICROS_PER_DOLLAR
    }

    pub fn baseline_cost(&self) -> f64 {
        self.baseline_micros.load(Ordering::Relaxed) as f64 / MICROS_PER_DOLLAR
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn savings_percent(&self) -> f64 {
        let baseline = self.baseline_cost();
        if baseline > 0.0 {
            1.0 - self.total_cost() / baseline
        } else {
            0.0
        }
    }
}

fn to_micros(dollars: f64) -> u64 {
    (dollars * MICROS_PER_DOLLAR).round().max(0.0) as u64
}
