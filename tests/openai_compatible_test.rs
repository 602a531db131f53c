#![cfg(feature = "openai-compatible")]

use std::sync::Arc;

use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sluice::{
    CascadeConfig, CascadeExecutor, ClassificationHint, ComplexityTier, ModelSpec,
    OpenAICompatibleConfig, OpenAICompatibleProvider, ProviderChunk, ProviderClient,
    ProviderError, ProviderRequest, QualityTier, Query,
};

fn provider(server: &MockServer) -> OpenAICompatibleProvider {
    OpenAICompatibleProvider::new(OpenAICompatibleConfig {
        name: "test-openai".to_string(),
        api_key: "test-key".to_string(),
        base_url: server.uri(),
        request_logprobs: true,
    })
    .unwrap()
}

fn request(model: &str) -> ProviderRequest {
    ProviderRequest {
        model: model.to_string(),
        messages: vec![sluice::Message::user("hello")],
        max_tokens: Some(128),
        temperature: None,
        tools: None,
    }
}

#[tokio::test]
async fn call_parses_content_usage_and_logprobs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_partial_json(json!({"model": "mini", "logprobs": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {"content": "Hello there."},
                "logprobs": {"content": [{"logprob": -0.1}, {"logprob": -0.2}]}
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 5}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = provider(&server).call(&request("mini")).await.unwrap();

    assert_eq!(response.content.as_deref(), Some("Hello there."));
    assert_eq!(response.usage.input_tokens, 12);
    assert_eq!(response.usage.output_tokens, 5);
    assert_eq!(response.logprobs, Some(vec![-0.1, -0.2]));
}

#[tokio::test]
async fn call_parses_tool_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_0",
                        "type": "function",
                        "function": {"name": "search", "arguments": "{\"q\":\"rust\"}"}
                    }]
                }
            }],
            "usage": {"prompt_tokens": 20, "completion_tokens": 8}
        })))
        .mount(&server)
        .await;

    let response = provider(&server).call(&request("mini")).await.unwrap();

    assert_eq!(response.content, None);
    assert_eq!(response.tool_calls.len(), 1);
    assert_eq!(response.tool_calls[0].id, "call_0");
    assert_eq!(response.tool_calls[0].name, "search");
    assert_eq!(response.tool_calls[0].parsed, Some(json!({"q": "rust"})));
}

#[tokio::test]
async fn unauthorized_maps_to_an_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let error = provider(&server).call(&request("mini")).await.unwrap_err();
    assert!(matches!(error, ProviderError::Auth(_)));
}

#[tokio::test]
async fn server_errors_carry_the_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let error = provider(&server).call(&request("mini")).await.unwrap_err();
    assert!(matches!(error, ProviderError::Server { status: 503, .. }));
}

#[tokio::test]
async fn rate_limit_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&server)
        .await;

    let error = provider(&server).call(&request("mini")).await.unwrap_err();
    assert!(matches!(
        error,
        ProviderError::RateLimited { retry_after: Some(7) }
    ));
}

#[tokio::test]
async fn missing_api_key_fails_before_any_request() {
    let provider = OpenAICompatibleProvider::new(OpenAICompatibleConfig {
        api_key: String::new(),
        ..OpenAICompatibleConfig::default()
    })
    .unwrap();

    let error = provider.call(&request("mini")).await.unwrap_err();
    assert!(matches!(error, ProviderError::Auth(_)));
}

#[tokio::test]
async fn empty_choices_are_an_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let error = provider(&server).call(&request("mini")).await.unwrap_err();
    assert!(matches!(error, ProviderError::InvalidResponse(_)));
}

#[tokio::test]
async fn sse_stream_yields_text_tool_deltas_and_usage() {
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"lo.\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_0\",",
        "\"function\":{\"name\":\"search\",\"arguments\":\"{\\\"q\\\":\"}}]}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,",
        "\"function\":{\"arguments\":\"\\\"rust\\\"}\"}}]}}]}\n\n",
        "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":10,\"completion_tokens\":4}}\n\n",
        "data: [DONE]\n\n",
    );

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let mut stream = provider(&server).stream(&request("mini")).await.unwrap();
    let mut text = String::new();
    let mut arguments = String::new();
    let mut usage = None;
    while let Some(chunk) = stream.next().await {
        match chunk.unwrap() {
            ProviderChunk::Text(t) => text.push_str(&t),
            ProviderChunk::ToolCallDelta { arguments: a, .. } => arguments.push_str(&a),
            ProviderChunk::Usage(u) => usage = Some(u),
        }
    }

    assert_eq!(text, "Hello.");
    assert_eq!(arguments, "{\"q\":\"rust\"}");
    assert_eq!(usage.map(|u| u.total()), Some(14));
}

#[tokio::test]
async fn malformed_sse_chunk_surfaces_as_an_error_item() {
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"ok \"}}]}\n\n",
        "data: {not json}\n\n",
        "data: [DONE]\n\n",
    );

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let mut stream = provider(&server).stream(&request("mini")).await.unwrap();
    let mut saw_text = false;
    let mut saw_error = false;
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(ProviderChunk::Text(_)) => saw_text = true,
            Err(ProviderError::InvalidResponse(_)) => saw_error = true,
            _ => {}
        }
    }
    assert!(saw_text);
    assert!(saw_error);
}

#[tokio::test]
async fn executor_cascades_across_a_live_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "mini"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {
                "content": "Ownership ties each value to one owner whose scope bounds its lifetime, and borrows never outlive that owner."
            }}],
            "usage": {"prompt_tokens": 30, "completion_tokens": 22}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "flagship"})))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let config = CascadeConfig::new(vec![
        ModelSpec {
            name: "mini".to_string(),
            provider: "test-openai".to_string(),
            input_cost_per_1k: 0.0001,
            output_cost_per_1k: 0.0004,
            supports_tools: true,
            quality: QualityTier::Economy,
        },
        ModelSpec {
            name: "flagship".to_string(),
            provider: "test-openai".to_string(),
            input_cost_per_1k: 0.003,
            output_cost_per_1k: 0.012,
            supports_tools: true,
            quality: QualityTier::Premium,
        },
    ]);
    let executor =
        CascadeExecutor::new(Arc::new(config), Arc::new(provider(&server))).unwrap();

    let query = Query::user("explain rust ownership").with_hint(ClassificationHint {
        tier: ComplexityTier::Moderate,
        domain: None,
    });
    let result = executor.execute(query).await.unwrap();

    assert!(result.draft_accepted);
    assert_eq!(result.model_used, "mini");
    assert_eq!(result.verifier_cost, 0.0);
}
