use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::pin::Pin;

use super::{
    ProviderChunk, ProviderClient, ProviderError, ProviderRequest, ProviderResponse,
    ProviderStream, TokenUsage,
};
use crate::query::{Message, ToolCall};

#[derive(Debug, Clone)]
pub struct OpenAICompatibleConfig {
    pub name: String,
    pub api_key: String,
    pub base_url: String,
    /// Ask the provider for per-token logprobs so the logprob validation
    /// method has something to work with.
    pub request_logprobs: bool,
}

impl Default for OpenAICompatibleConfig {
    fn default() -> Self {
        Self {
            name: "openai".to_string(),
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            request_logprobs: false,
        }
    }
}

/// Reference `ProviderClient` over any OpenAI-compatible chat completions
/// endpoint. Covers both blocking calls and SSE streaming.
pub struct OpenAICompatibleProvider {
    client: reqwest::Client,
    config: OpenAICompatibleConfig,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    logprobs: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<UsageBody>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    logprobs: Option<LogprobsBody>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct LogprobsBody {
    #[serde(default)]
    content: Option<Vec<TokenLogprob>>,
}

#[derive(Debug, Deserialize)]
struct TokenLogprob {
    logprob: f32,
}

#[derive(Debug, Deserialize)]
struct UsageBody {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<UsageBody>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCall {
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunction>,
}

#[derive(Debug, Deserialize, Default)]
struct StreamFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

impl OpenAICompatibleProvider {
    pub fn new(config: OpenAICompatibleConfig) -> Result<Self, ProviderError> {
        let mut builder = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .connect_timeout(std::time::Duration::from_secs(30));

        if let Ok(http_proxy) = std::env::var("HTTP_PROXY")
            && let Ok(proxy) = reqwest::Proxy::http(&http_proxy)
        {
            builder = builder.proxy(proxy);
        }
        if let Ok(https_proxy) = std::env::var("HTTPS_PROXY")
            && let Ok(proxy) = reqwest::Proxy::https(&https_proxy)
        {
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| ProviderError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn http_error(status: reqwest::StatusCode, retry_after: Option<u64>, body: String) -> ProviderError {
        match status.as_u16() {
            429 => ProviderError::RateLimited { retry_after },
            500..=599 => ProviderError::Server {
                status: status.as_u16(),
                message: body,
            },
            401 | 403 => ProviderError::Auth(body),
            code => ProviderError::InvalidResponse(format!("API error {}: {}", code, body)),
        }
    }

    fn build_request(&self, request: &ProviderRequest, stream: bool) -> ChatCompletionRequest {
        let tools: Option<Vec<Value>> = request.tools.as_ref().map(|tools| {
            tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect()
        });
        let has_tools = tools.as_ref().is_some_and(|t| !t.is_empty());

        ChatCompletionRequest {
            model: request.model.clone(),
            messages: request.messages.clone(),
            max_completion_tokens: request.max_tokens,
            temperature: request.temperature,
            tools,
            tool_choice: has_tools.then(|| "auto".to_string()),
            logprobs: self.config.request_logprobs && !stream,
            stream,
        }
    }

    async fn send(
        &self,
        request: &ProviderRequest,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        if self.config.api_key.is_empty() {
            return Err(ProviderError::Auth(format!(
                "{} API key not configured",
                self.config.name
            )));
        }

        let body = self.build_request(request, stream);
        let url = format!("{}/chat/completions", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(Self::http_error(status, retry_after, body));
        }

        Ok(response)
    }

    fn parse_response(&self, data: ChatCompletionResponse) -> Result<ProviderResponse, ProviderError> {
        let usage = data
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        let choice = data.choices.into_iter().next().ok_or_else(|| {
            ProviderError::InvalidResponse(format!("No choices from {}", self.config.name))
        })?;

        let logprobs = choice
            .logprobs
            .and_then(|l| l.content)
            .map(|tokens| tokens.into_iter().map(|t| t.logprob).collect::<Vec<_>>());

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|c| ToolCall::new(c.id, c.function.name, c.function.arguments))
            .collect::<Vec<_>>();

        if choice.message.content.is_none() && tool_calls.is_empty() {
            return Err(ProviderError::InvalidResponse(format!(
                "No content or tool calls from {}",
                self.config.name
            )));
        }

        let mut response = ProviderResponse::with_tool_calls(choice.message.content, tool_calls)
            .with_usage(usage);
        if let Some(logprobs) = logprobs {
            response = response.with_logprobs(logprobs);
        }
        Ok(response)
    }

    fn chunk_events(chunk: ChatCompletionChunk) -> Vec<ProviderChunk> {
        let mut events = Vec::new();
        for choice in chunk.choices {
            if let Some(content) = choice.delta.content
                && !content.is_empty()
            {
                events.push(ProviderChunk::Text(content));
            }
            for call in choice.delta.tool_calls.unwrap_or_default() {
                let function = call.function.unwrap_or_default();
                events.push(ProviderChunk::ToolCallDelta {
                    index: call.index,
                    id: call.id,
                    name: function.name,
                    arguments: function.arguments.unwrap_or_default(),
                });
            }
        }
        if let Some(usage) = chunk.usage {
            events.push(ProviderChunk::Usage(TokenUsage::new(
                usage.prompt_tokens,
                usage.completion_tokens,
            )));
        }
        events
    }
}

struct SseState {
    bytes: Pin<Box<dyn futures::Stream<Item = reqwest::Result<Bytes>> + Send>>,
    buffer: String,
    pending: VecDeque<Result<ProviderChunk, ProviderError>>,
    done: bool,
}

#[async_trait]
impl ProviderClient for OpenAICompatibleProvider {
    async fn call(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let response = self.send(request, false).await?;
        let data: ChatCompletionResponse = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse response: {}", e))
        })?;
        self.parse_response(data)
    }

    async fn stream(&self, request: &ProviderRequest) -> Result<ProviderStream, ProviderError> {
        let response = self.send(request, true).await?;
        let state = SseState {
            bytes: Box::pin(response.bytes_stream()),
            buffer: String::new(),
            pending: VecDeque::new(),
            done: false,
        };

        let stream = futures::stream::unfold(state, |mut state| async move {
            loop {
                if let Some(item) = state.pending.pop_front() {
                    return Some((item, state));
                }
                if state.done {
                    return None;
                }
                match state.bytes.next().await {
                    Some(Ok(bytes)) => {
                        state.buffer.push_str(&String::from_utf8_lossy(&bytes));
                        while let Some(pos) = state.buffer.find('\n') {
                            let line: String = state.buffer.drain(..=pos).collect();
                            let line = line.trim();
                            let Some(data) = line.strip_prefix("data:") else {
                                continue;
                            };
                            let data = data.trim();
                            if data == "[DONE]" {
                                state.done = true;
                                break;
                            }
                            match serde_json::from_str::<ChatCompletionChunk>(data) {
                                Ok(chunk) => state
                                    .pending
                                    .extend(Self::chunk_events(chunk).into_iter().map(Ok)),
                                Err(e) => state.pending.push_back(Err(
                                    ProviderError::InvalidResponse(format!(
                                        "Malformed stream chunk: {}",
                                        e
                                    )),
                                )),
                            }
                        }
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        state
                            .pending
                            .push_back(Err(ProviderError::Network(e.to_string())));
                    }
                    None => state.done = true,
                }
            }
        });

        Ok(Box::pin(stream))
    }

    fn name(&self) -> &str {
        &self.config.name
    }
}
