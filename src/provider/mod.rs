pub mod error;
pub mod mock;
#[cfg(feature = "openai-compatible")]
pub mod openai_compatible;

pub use error::ProviderError;
pub use mock::MockProvider;
#[cfg(feature = "openai-compatible")]
pub use openai_compatible::{OpenAICompatibleConfig, OpenAICompatibleProvider};

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::config::ModelSpec;
use crate::query::{Message, Query, ToolCall, ToolSchema};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }

    pub fn combined(&self, other: &TokenUsage) -> TokenUsage {
        TokenUsage {
            input_tokens: self.input_tokens + other.input_tokens,
            output_tokens: self.output_tokens + other.output_tokens,
        }
    }
}

/// One outbound model invocation, already resolved to a concrete model.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolSchema>>,
}

impl ProviderRequest {
    pub fn from_query(query: &Query, model: &ModelSpec) -> Self {
        Self {
            model: model.name.clone(),
            messages: query.messages.clone(),
            max_tokens: query.max_tokens,
            temperature: query.temperature,
            tools: query.tools.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: TokenUsage,
    /// Per-token log-probabilities, when the provider returns them.
    pub logprobs: Option<Vec<f32>>,
}

impl ProviderResponse {
    pub fn content_only(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn with_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content,
            tool_calls,
            ..Self::default()
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_logprobs(mut self, logprobs: Vec<f32>) -> Self {
        self.logprobs = Some(logprobs);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.content.as_deref().unwrap_or("").trim().is_empty() && self.tool_calls.is_empty()
    }
}

/// One streamed fragment of a model response.
#[derive(Debug, Clone)]
pub enum ProviderChunk {
    Text(String),
    /// A fragment of a tool call, keyed by its position in the response.
    /// `id` and `name` arrive on the first fragment for that position.
    ToolCallDelta {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments: String,
    },
    Usage(TokenUsage),
}

pub type ProviderStream = Pin<Box<dyn Stream<Item = Result<ProviderChunk, ProviderError>> + Send>>;

/// An opaque model backend. Failures are reported as errors, never panics;
/// retries, if any, live behind this trait.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn call(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError>;

    async fn stream(&self, request: &ProviderRequest) -> Result<ProviderStream, ProviderError>;

    fn name(&self) -> &str;
}
