use std::sync::Arc;

use serde_json::json;
use sluice::provider::mock::Script;
use sluice::{
    CascadeConfig, CascadeError, CascadeExecutor, ClassificationHint, ComplexityTier, MockProvider,
    ModelSpec, ProviderError, ProviderResponse, QualityTier, Query, RiskTier, TokenUsage, ToolCall,
    ToolSchema,
};

fn models() -> Vec<ModelSpec> {
    vec![
        ModelSpec {
            name: "mini".to_string(),
            provider: "test".to_string(),
            input_cost_per_1k: 0.0001,
            output_cost_per_1k: 0.0004,
            supports_tools: true,
            quality: QualityTier::Economy,
        },
        ModelSpec {
            name: "flagship".to_string(),
            provider: "test".to_string(),
            input_cost_per_1k: 0.003,
            output_cost_per_1k: 0.012,
            supports_tools: true,
            quality: QualityTier::Premium,
        },
    ]
}

fn config() -> CascadeConfig {
    let mut config = CascadeConfig::new(models());
    config.request_timeout_ms = 500;
    config
}

fn executor(provider: MockProvider) -> CascadeExecutor {
    CascadeExecutor::new(Arc::new(config()), Arc::new(provider)).unwrap()
}

fn moderate(query: Query) -> Query {
    query.with_hint(ClassificationHint {
        tier: ComplexityTier::Moderate,
        domain: None,
    })
}

fn good_answer() -> ProviderResponse {
    ProviderResponse::content_only(
        "The borrow checker enforces aliasing rules at compile time, so shared \
         references stay immutable while exclusive references allow mutation.",
    )
    .with_usage(TokenUsage::new(120, 80))
}

fn hedged_answer() -> ProviderResponse {
    ProviderResponse::content_only("I'm not sure. I don't know. I may be wrong.")
        .with_usage(TokenUsage::new(120, 20))
}

fn delete_tool() -> ToolSchema {
    ToolSchema {
        name: "delete_account".to_string(),
        description: "Remove a user account permanently".to_string(),
        parameters: json!({"type": "object", "properties": {"user_id": {"type": "string"}}}),
    }
}

fn search_tool() -> ToolSchema {
    ToolSchema {
        name: "search".to_string(),
        description: "Search the knowledge base".to_string(),
        parameters: json!({"type": "object", "properties": {"q": {"type": "string"}}}),
    }
}

#[tokio::test]
async fn accepted_draft_never_invokes_the_verifier() {
    let provider = MockProvider::new().script("mini", Script::Respond(good_answer()));
    let executor = executor(provider);

    let result = executor
        .execute(moderate(Query::user("explain the borrow checker")))
        .await
        .unwrap();

    assert!(result.draft_accepted);
    assert!(result.cascaded);
    assert_eq!(result.model_used, "mini");
    assert_eq!(result.verifier_cost, 0.0);
    assert_eq!(result.verifier_model, None);
    assert!((result.total_cost - (result.draft_cost + result.verifier_cost)).abs() < 1e-12);
    assert!(result.savings_percent > 0.9);
}

#[tokio::test]
async fn rejected_draft_escalates_to_the_verifier() {
    let provider = MockProvider::new()
        .script("mini", Script::Respond(hedged_answer()))
        .script(
            "flagship",
            Script::Respond(
                ProviderResponse::content_only("A precise, verified answer.")
                    .with_usage(TokenUsage::new(120, 60)),
            ),
        );
    let executor = executor(provider);

    let result = executor
        .execute(moderate(Query::user("explain the borrow checker")))
        .await
        .unwrap();

    assert!(!result.draft_accepted);
    assert!(result.cascaded);
    assert_eq!(result.model_used, "flagship");
    assert_eq!(result.content, "A precise, verified answer.");
    assert!(result.verifier_cost > 0.0);
    assert!((result.total_cost - (result.draft_cost + result.verifier_cost)).abs() < 1e-12);
    let quality = result.quality.expect("draft verdict recorded");
    assert!(!quality.passed);
}

#[tokio::test]
async fn trivial_query_is_answered_by_the_draft_alone() {
    let provider = MockProvider::new().script(
        "mini",
        Script::Respond(ProviderResponse::content_only("Hello!").with_usage(TokenUsage::new(5, 2))),
    );
    let executor = executor(provider);

    let result = executor.execute(Query::user("hi")).await.unwrap();

    assert!(result.draft_accepted);
    assert!(!result.cascaded);
    assert_eq!(result.verifier_cost, 0.0);
    assert_eq!(result.model_used, "mini");
}

#[tokio::test]
async fn force_direct_skips_the_cascade_entirely() {
    let provider = MockProvider::new().script(
        "flagship",
        Script::Respond(
            ProviderResponse::content_only("Compliance-grade answer.")
                .with_usage(TokenUsage::new(100, 50)),
        ),
    );
    let executor = executor(provider);

    let result = executor
        .execute(moderate(Query::user("explain the borrow checker")).force_direct())
        .await
        .unwrap();

    assert!(!result.cascaded);
    assert!(!result.draft_accepted);
    assert_eq!(result.draft_model, None);
    assert_eq!(result.draft_cost, 0.0);
    assert_eq!(result.model_used, "flagship");
    assert_eq!(result.savings_percent, 0.0);
}

#[tokio::test]
async fn expert_tier_routes_straight_to_the_verifier() {
    let provider = MockProvider::new().script(
        "flagship",
        Script::Respond(
            ProviderResponse::content_only("Expert answer.").with_usage(TokenUsage::new(100, 50)),
        ),
    );
    let executor = executor(provider);

    let query = Query::user("prove it").with_hint(ClassificationHint {
        tier: ComplexityTier::Expert,
        domain: None,
    });
    let result = executor.execute(query).await.unwrap();

    assert!(!result.cascaded);
    assert_eq!(result.model_used, "flagship");
    assert_eq!(result.draft_model, None);
}

#[tokio::test]
async fn high_risk_tool_call_escalates_regardless_of_draft_confidence() {
    let draft = ProviderResponse::with_tool_calls(
        Some("Deleting the account now, everything checks out perfectly fine.".to_string()),
        vec![ToolCall::new("call_d", "delete_account", r#"{"user_id":"u1"}"#)],
    )
    .with_usage(TokenUsage::new(80, 30));

    let provider = MockProvider::new()
        .script("mini", Script::Respond(draft))
        .script(
            "flagship",
            Script::Respond(
                ProviderResponse::with_tool_calls(
                    None,
                    vec![ToolCall::new("call_v", "delete_account", r#"{"user_id":"u1"}"#)],
                )
                .with_usage(TokenUsage::new(80, 25)),
            ),
        );
    let executor = executor(provider);

    let query = moderate(Query::user("delete my account").with_tools(vec![delete_tool()]));
    let result = executor.execute(query).await.unwrap();

    assert!(result.cascaded);
    assert!(!result.draft_accepted);
    assert_eq!(result.model_used, "flagship");
    assert_eq!(result.tool_calls.len(), 1);
    assert_eq!(result.tool_calls[0].id, "call_v");
    assert_eq!(result.tool_calls[0].risk, RiskTier::Critical);
}

#[tokio::test]
async fn trivial_query_with_tools_still_routes_risk_through_the_verifier() {
    let draft = ProviderResponse::with_tool_calls(
        None,
        vec![ToolCall::new("call_d", "delete_account", r#"{"user_id":"u1"}"#)],
    )
    .with_usage(TokenUsage::new(20, 10));
    let provider = MockProvider::new()
        .script("mini", Script::Respond(draft))
        .script(
            "flagship",
            Script::Respond(
                ProviderResponse::with_tool_calls(
                    None,
                    vec![ToolCall::new("call_v", "delete_account", r#"{"user_id":"u1"}"#)],
                )
                .with_usage(TokenUsage::new(20, 8)),
            ),
        );
    let executor = executor(provider);

    // "hi" classifies trivial, but the attached tools keep the query on the
    // cascade path where the critical call forces the verifier.
    let query = Query::user("hi").with_tools(vec![delete_tool()]);
    let result = executor.execute(query).await.unwrap();

    assert!(result.cascaded);
    assert!(!result.draft_accepted);
    assert_eq!(result.verifier_model.as_deref(), Some("flagship"));
    assert_eq!(result.tool_calls.len(), 1);
    assert_eq!(result.tool_calls[0].id, "call_v");
    assert_eq!(result.tool_calls[0].risk, RiskTier::Critical);
}

#[tokio::test]
async fn low_risk_tool_call_can_be_accepted_from_the_draft() {
    let draft = ProviderResponse::with_tool_calls(
        None,
        vec![ToolCall::new("call_s", "search", r#"{"q":"rust"}"#)],
    )
    .with_usage(TokenUsage::new(60, 20));
    let provider = MockProvider::new().script("mini", Script::Respond(draft));
    let executor = executor(provider);

    let query = moderate(Query::user("look up rust").with_tools(vec![search_tool()]));
    let result = executor.execute(query).await.unwrap();

    assert!(result.draft_accepted);
    assert_eq!(result.tool_calls[0].risk, RiskTier::Low);
    assert_eq!(result.verifier_cost, 0.0);
}

#[tokio::test]
async fn draft_failure_is_absorbed_by_escalating() {
    let provider = MockProvider::new()
        .script(
            "mini",
            Script::Fail(ProviderError::Server {
                status: 503,
                message: "overloaded".to_string(),
            }),
        )
        .script(
            "flagship",
            Script::Respond(
                ProviderResponse::content_only("Recovered answer.")
                    .with_usage(TokenUsage::new(100, 40)),
            ),
        );
    let executor = executor(provider);

    let result = executor
        .execute(moderate(Query::user("explain the borrow checker")))
        .await
        .unwrap();

    assert!(result.cascaded);
    assert!(!result.draft_accepted);
    assert_eq!(result.content, "Recovered answer.");
    assert_eq!(result.draft_cost, 0.0);
}

#[tokio::test]
async fn draft_timeout_is_treated_as_a_draft_failure() {
    let provider = MockProvider::new()
        .script("mini", Script::Hang)
        .script(
            "flagship",
            Script::Respond(
                ProviderResponse::content_only("Timely verified answer.")
                    .with_usage(TokenUsage::new(100, 40)),
            ),
        );
    let executor = executor(provider);

    let result = executor
        .execute(moderate(Query::user("explain the borrow checker")))
        .await
        .unwrap();

    assert!(result.cascaded);
    assert!(!result.draft_accepted);
    assert_eq!(result.content, "Timely verified answer.");
}

#[tokio::test]
async fn verifier_failure_is_fatal() {
    let provider = MockProvider::new()
        .script("mini", Script::Respond(hedged_answer()))
        .script(
            "flagship",
            Script::Fail(ProviderError::Server {
                status: 500,
                message: "boom".to_string(),
            }),
        );
    let executor = executor(provider);

    let error = executor
        .execute(moderate(Query::user("explain the borrow checker")))
        .await
        .unwrap_err();

    assert!(matches!(error, CascadeError::Verifier { .. }));
    assert_eq!(error.kind(), "verifier_error");
}

#[tokio::test]
async fn verifier_timeout_is_fatal() {
    let provider = MockProvider::new()
        .script("mini", Script::Respond(hedged_answer()))
        .script("flagship", Script::Hang);
    let executor = executor(provider);

    let error = executor
        .execute(moderate(Query::user("explain the borrow checker")))
        .await
        .unwrap_err();

    assert!(matches!(error, CascadeError::VerifierTimeout { .. }));
}

#[tokio::test]
async fn empty_query_is_rejected_up_front() {
    let executor = executor(MockProvider::new());
    let error = executor.execute(Query::new(vec![])).await.unwrap_err();
    assert!(matches!(error, CascadeError::EmptyQuery));
}

#[tokio::test]
async fn malformed_empty_draft_escalates() {
    let provider = MockProvider::new()
        .script(
            "mini",
            Script::Respond(ProviderResponse::content_only("  ").with_usage(TokenUsage::new(50, 0))),
        )
        .script(
            "flagship",
            Script::Respond(
                ProviderResponse::content_only("A real answer.")
                    .with_usage(TokenUsage::new(100, 40)),
            ),
        );
    let executor = executor(provider);

    let result = executor
        .execute(moderate(Query::user("explain the borrow checker")))
        .await
        .unwrap();

    assert!(!result.draft_accepted);
    assert_eq!(result.content, "A real answer.");
}

#[tokio::test]
async fn savings_accumulate_across_concurrent_executions() {
    let provider = MockProvider::new();
    for _ in 0..8 {
        provider.push("mini", Script::Respond(good_answer()));
    }
    let executor = executor(provider);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let executor = executor.clone();
        handles.push(tokio::spawn(async move {
            executor
                .execute(moderate(Query::user("explain the borrow checker")))
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        let result = handle.await.unwrap();
        assert!(result.draft_accepted);
    }

    assert_eq!(executor.savings().completed(), 8);
    assert!(executor.savings().total_cost() > 0.0);
    assert!(executor.savings().savings_percent() > 0.9);
}

#[tokio::test]
async fn routing_is_idempotent_for_identical_queries() {
    let provider = MockProvider::new();
    provider.push("mini", Script::Respond(good_answer()));
    provider.push("mini", Script::Respond(good_answer()));
    let executor = executor(provider);

    let query = moderate(Query::user("explain the borrow checker"));
    let first = executor.execute(query.clone()).await.unwrap();
    let second = executor.execute(query).await.unwrap();

    assert_eq!(first.cascaded, second.cascaded);
    assert_eq!(first.model_used, second.model_used);
    assert_eq!(first.draft_model, second.draft_model);
}
