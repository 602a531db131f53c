use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cascade requires at least two models (draft and verifier), got {0}")]
    TooFewModels(usize),

    #[error("Models must be ordered cost-ascending: '{cheaper}' is priced above '{pricier}'")]
    CostOrdering { cheaper: String, pricier: String },

    #[error("Threshold for tier '{tier}' out of range: {value}")]
    ThresholdOutOfRange { tier: String, value: f32 },

    #[error("Thresholds must be non-decreasing trivial through expert")]
    ThresholdOrdering,

    #[error("Safety floor out of range: {0}")]
    SafetyFloorOutOfRange(f32),

    #[error("max_tool_steps must be at least 1")]
    ZeroToolSteps,

    #[error("Semantic threshold out of range: {0}")]
    SemanticThresholdOutOfRange(f32),
}
