use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::TokenUsage;
use crate::query::ToolCall;
use crate::validation::QualityResult;

/// Final outcome of one execution. Built once at completion and handed to
/// the caller; a read-only copy goes to any billing sink.
///
/// Invariants: `total_cost == draft_cost + verifier_cost`, and
/// `verifier_cost > 0` implies `cascaded`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeResult {
    pub query_id: String,
    pub content: String,
    pub model_used: String,
    /// `None` exactly when the strategy was `DirectExpensive` and no draft
    /// was ever consulted.
    pub draft_model: Option<String>,
    pub verifier_model: Option<String>,
    pub draft_cost: f64,
    pub verifier_cost: f64,
    pub total_cost: f64,
    pub savings_percent: f64,
    pub draft_tokens: TokenUsage,
    pub verifier_tokens: TokenUsage,
    /// Whether a cascade strategy was chosen, independent of acceptance.
    pub cascaded: bool,
    pub draft_accepted: bool,
    pub draft_ms: u64,
    pub verify_ms: u64,
    pub tool_calls: Vec<ToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityResult>,
    pub completed_at: DateTime<Utc>,
}
