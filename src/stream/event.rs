use serde::Serialize;
use serde_json::Value;

use crate::classifier::{ComplexityTier, Domain};
use crate::executor::CascadeResult;

/// One event of a live execution. Produced in strict causal order:
/// `Routing` first, `DraftDecision` before `Switch`, `Switch` before any
/// verifier output, `Complete` or `Error` last.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Routing {
        query_id: String,
        strategy: &'static str,
        tier: ComplexityTier,
        domain: Domain,
    },
    Chunk {
        text: String,
    },
    ToolCallStart {
        id: String,
        name: String,
    },
    ToolCallDelta {
        id: String,
        fragment: String,
    },
    ToolCallComplete {
        id: String,
        name: String,
        arguments: Value,
    },
    DraftDecision {
        accepted: bool,
        confidence: f32,
        reason: String,
    },
    Switch {
        from: String,
        to: String,
        reason: String,
    },
    Complete {
        result: CascadeResult,
    },
    Error {
        kind: &'static str,
        message: String,
        /// True when content already streamed before the failure is only a
        /// prefix of the answer. Streamed content is never retracted.
        incomplete: bool,
    },
}
