use async_trait::async_trait;
use futures::stream;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::{
    ProviderChunk, ProviderClient, ProviderError, ProviderRequest, ProviderResponse,
    ProviderStream,
};

/// One scripted reaction to a call for a given model.
#[derive(Debug, Clone)]
pub enum Script {
    Respond(ProviderResponse),
    Fail(ProviderError),
    /// Never completes; exercises caller-side timeouts.
    Hang,
}

/// A scripted provider for tests and offline embedding. Responses are
/// queued per model name and consumed in order; an un-scripted model always
/// answers with a canned acknowledgement.
#[derive(Default)]
pub struct MockProvider {
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, model: impl Into<String>, script: Script) -> Self {
        self.push(model, script);
        self
    }

    pub fn push(&self, model: impl Into<String>, script: Script) {
        self.scripts
            .lock()
            .expect("mock script lock")
            .entry(model.into())
            .or_default()
            .push_back(script);
    }

    fn next(&self, model: &str) -> Option<Script> {
        self.scripts
            .lock()
            .expect("mock script lock")
            .get_mut(model)
            .and_then(|queue| queue.pop_front())
    }

    fn chunks_for(response: &ProviderResponse) -> Vec<ProviderChunk> {
        let mut chunks = Vec::new();
        if let Some(content) = &response.content {
            // Word-at-a-time, like a real token stream.
            for word in content.split_inclusive(' ') {
                chunks.push(ProviderChunk::Text(word.to_string()));
            }
        }
        for (index, call) in response.tool_calls.iter().enumerate() {
            // Nudge the byte midpoint forward to the next char boundary so
            // multibyte arguments split without panicking.
            let mut midpoint = call.arguments.len() / 2;
            while !call.arguments.is_char_boundary(midpoint) {
                midpoint += 1;
            }
            let (head, tail) = call.arguments.split_at(midpoint);
            chunks.push(ProviderChunk::ToolCallDelta {
                index,
                id: Some(call.id.clone()),
                name: Some(call.name.clone()),
                arguments: head.to_string(),
            });
            chunks.push(ProviderChunk::ToolCallDelta {
                index,
                id: None,
                name: None,
                arguments: tail.to_string(),
            });
        }
        chunks.push(ProviderChunk::Usage(response.usage));
        chunks
    }
}

#[async_trait]
impl ProviderClient for MockProvider {
    async fn call(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        match self.next(&request.model) {
            Some(Script::Respond(response)) => Ok(response),
            Some(Script::Fail(error)) => Err(error),
            Some(Script::Hang) => {
                futures::future::pending::<()>().await;
                unreachable!()
            }
            None => Ok(ProviderResponse::content_only(format!(
                "Mock response from {}",
                request.model
            ))),
        }
    }

    async fn stream(&self, request: &ProviderRequest) -> Result<ProviderStream, ProviderError> {
        match self.next(&request.model) {
            Some(Script::Respond(response)) => {
                let chunks = Self::chunks_for(&response);
                Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
            }
            Some(Script::Fail(error)) => Err(error),
            Some(Script::Hang) => {
                futures::future::pending::<()>().await;
                unreachable!()
            }
            None => {
                let response =
                    ProviderResponse::content_only(format!("Mock response from {}", request.model));
                let chunks = Self::chunks_for(&response);
                Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
            }
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
