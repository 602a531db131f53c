//! Cost-aware draft/verify cascade routing for LLM backends.
//!
//! A cheap draft model answers first; a quality gate decides whether its
//! output stands or a stronger verifier model is invoked. High-risk tool
//! calls always escalate. Both a blocking [`CascadeExecutor::execute`] and
//! a live [`CascadeExecutor::stream_events`] surface are provided.

pub mod classifier;
pub mod config;
pub mod cost;
pub mod error;
pub mod executor;
pub mod provider;
pub mod query;
pub mod risk;
pub mod routing;
pub mod stream;
pub mod validation;

pub use classifier::{Classification, ComplexityClassifier, ComplexityTier, Domain};
pub use config::{CascadeConfig, ConfigError, ModelSpec, QualityTier, ThresholdTable, ValidationConfig};
pub use cost::{CostAccountant, CostBreakdown, SavingsTracker};
pub use error::CascadeError;
pub use executor::{CascadeExecutor, CascadeResult, Phase};
pub use provider::{
    MockProvider, ProviderChunk, ProviderClient, ProviderError, ProviderRequest, ProviderResponse,
    ProviderStream, TokenUsage,
};
#[cfg(feature = "openai-compatible")]
pub use provider::{OpenAICompatibleConfig, OpenAICompatibleProvider};
pub use query::{ClassificationHint, Message, Query, Role, ToolCall, ToolSchema};
pub use risk::{RiskTier, ToolRiskClassifier};
pub use routing::{RoutingPolicy, Strategy};
pub use stream::StreamEvent;
pub use validation::{EmbeddingScorer, QualityMethod, QualityResult, QualityValidator};
