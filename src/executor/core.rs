use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, warn};

use crate::classifier::{Classification, ComplexityClassifier};
use crate::config::{CascadeConfig, ModelSpec};
use crate::cost::{CostAccountant, SavingsTracker};
use crate::error::CascadeError;
use crate::executor::result::CascadeResult;
use crate::executor::state::{Phase, PhaseTracker};
use crate::provider::{ProviderClient, ProviderError, ProviderRequest, ProviderResponse, TokenUsage};
use crate::query::{Query, ToolCall};
use crate::risk::ToolRiskClassifier;
use crate::routing::{RoutingPolicy, Strategy};
use crate::validation::{EmbeddingScorer, QualityResult, QualityValidator};

/// Drives one query through route → draft → validate → (verify). Safe to
/// share across concurrent queries: all held state is read-only or atomic.
pub struct CascadeExecutor {
    pub(crate) config: Arc<CascadeConfig>,
    pub(crate) provider: Arc<dyn ProviderClient>,
    pub(crate) classifier: ComplexityClassifier,
    pub(crate) policy: RoutingPolicy,
    pub(crate) validator: Arc<QualityValidator>,
    pub(crate) risk: ToolRiskClassifier,
    pub(crate) accountant: CostAccountant,
    pub(crate) savings: Arc<SavingsTracker>,
}

impl Clone for CascadeExecutor {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            provider: self.provider.clone(),
            classifier: self.classifier.clone(),
            policy: self.policy.clone(),
            validator: self.validator.clone(),
            risk: self.risk.clone(),
            accountant: self.accountant,
            savings: self.savings.clone(),
        }
    }
}

impl CascadeExecutor {
    pub fn new(
        config: Arc<CascadeConfig>,
        provider: Arc<dyn ProviderClient>,
    ) -> Result<Self, CascadeError> {
        config.validate()?;
        let validator = Arc::new(QualityValidator::new(config.clone()));
        Ok(Self {
            config,
            provider,
            classifier: ComplexityClassifier::new(),
            policy: RoutingPolicy::new(),
            validator,
            risk: ToolRiskClassifier::new(),
            accountant: CostAccountant::new(),
            savings: Arc::new(SavingsTracker::new()),
        })
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn EmbeddingScorer>) -> Self {
        self.validator = Arc::new(QualityValidator::new(self.config.clone()).with_scorer(scorer));
        self
    }

    /// Running cost totals across every execution of this instance.
    pub fn savings(&self) -> &SavingsTracker {
        &self.savings
    }

    pub(crate) fn resolve(&self, query: &Query) -> (Classification, Strategy) {
        let classification = self.classifier.classify(query);
        let strategy = self.policy.select(&classification, &self.config, query);
        (classification, strategy)
    }

    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.request_timeout_ms)
    }

    pub(crate) async fn call_with_timeout(
        &self,
        request: &ProviderRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        match tokio::time::timeout(self.timeout(), self.provider.call(request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(format!(
                "{} did not answer within {}ms",
                request.model, self.config.request_timeout_ms
            ))),
        }
    }

    /// Annotate tool calls with risk tiers. Returns the annotated calls and
    /// whether any of them forces the verifier.
    pub(crate) fn annotate_risk(
        &self,
        calls: Vec<ToolCall>,
        query: &Query,
    ) -> (Vec<ToolCall>, bool) {
        let mut forced = false;
        let calls: Vec<ToolCall> = calls
            .into_iter()
            .map(|mut call| {
                let description = query
                    .tool_schema(&call.name)
                    .map(|schema| schema.description.as_str())
                    .unwrap_or("");
                call.risk = self.risk.classify(&call.name, description);
                if call.risk.requires_verifier() {
                    forced = true;
                }
                call
            })
            .collect();
        (calls, forced)
    }

    /// Execute a query to completion, returning the final result.
    pub async fn execute(&self, query: Query) -> Result<CascadeResult, CascadeError> {
        if query.messages.is_empty() {
            return Err(CascadeError::EmptyQuery);
        }

        let mut tracker = PhaseTracker::new(&query.id);
        let (classification, strategy) = self.resolve(&query);

        match strategy {
            Strategy::DirectCheap => self.run_direct_cheap(&query, &mut tracker).await,
            Strategy::DirectExpensive => self.run_direct_expensive(&query, &mut tracker).await,
            Strategy::Cascade { draft, verifier } => {
                self.run_cascade(&query, &classification, &draft, &verifier, &mut tracker)
                    .await
            }
        }
    }

    async fn run_direct_expensive(
        &self,
        query: &Query,
        tracker: &mut PhaseTracker,
    ) -> Result<CascadeResult, CascadeError> {
        let verifier = self.config.verifier_model().clone();
        tracker.advance(Phase::Verifying);

        let started = Instant::now();
        let request = ProviderRequest::from_query(query, &verifier);
        let response = match self.call_with_timeout(&request).await {
            Ok(response) => response,
            Err(error) => {
                tracker.advance(Phase::Error);
                return Err(self.verifier_error(&verifier, error));
            }
        };
        let verify_ms = started.elapsed().as_millis() as u64;
        tracker.advance(Phase::Complete);

        let (tool_calls, _) = self.annotate_risk(response.tool_calls.clone(), query);
        Ok(self.build_result(ResultParts {
            query_id: query.id.clone(),
            content: response.content.unwrap_or_default(),
            tool_calls,
            draft: None,
            verifier: Some(PhaseOutcome {
                model: verifier,
                usage: response.usage,
                elapsed_ms: verify_ms,
            }),
            cascaded: false,
            draft_accepted: false,
            quality: None,
        }))
    }

    async fn run_direct_cheap(
        &self,
        query: &Query,
        tracker: &mut PhaseTracker,
    ) -> Result<CascadeResult, CascadeError> {
        let draft = self.config.draft_model().clone();
        tracker.advance(Phase::Drafting);

        let started = Instant::now();
        let request = ProviderRequest::from_query(query, &draft);
        match self.call_with_timeout(&request).await {
            Ok(response) => {
                let draft_ms = started.elapsed().as_millis() as u64;
                tracker.advance(Phase::Accepted);
                tracker.advance(Phase::Complete);
                let (tool_calls, _) = self.annotate_risk(response.tool_calls.clone(), query);
                Ok(self.build_result(ResultParts {
                    query_id: query.id.clone(),
                    content: response.content.unwrap_or_default(),
                    tool_calls,
                    draft: Some(PhaseOutcome {
                        model: draft,
                        usage: response.usage,
                        elapsed_ms: draft_ms,
                    }),
                    verifier: None,
                    cascaded: false,
                    draft_accepted: true,
                    quality: None,
                }))
            }
            Err(error) => {
                // Even a trivial query falls through to the verifier rather
                // than failing outright.
                warn!(query_id = %query.id, %error, "draft failed on direct-cheap path, escalating");
                let draft_ms = started.elapsed().as_millis() as u64;
                tracker.advance(Phase::Escalating);
                self.verify(query, tracker, Some(draft), TokenUsage::default(), draft_ms, None)
                    .await
            }
        }
    }

    async fn run_cascade(
        &self,
        query: &Query,
        classification: &Classification,
        draft: &ModelSpec,
        verifier: &ModelSpec,
        tracker: &mut PhaseTracker,
    ) -> Result<CascadeResult, CascadeError> {
        debug_assert_eq!(verifier.name, self.config.verifier_model().name);
        tracker.advance(Phase::Drafting);

        let started = Instant::now();
        let request = ProviderRequest::from_query(query, draft);
        let response = match self.call_with_timeout(&request).await {
            Ok(response) => response,
            Err(error) => {
                warn!(query_id = %query.id, %error, "draft provider failed, escalating");
                let draft_ms = started.elapsed().as_millis() as u64;
                tracker.advance(Phase::Escalating);
                return self
                    .verify(query, tracker, Some(draft.clone()), TokenUsage::default(), draft_ms, None)
                    .await;
            }
        };
        let draft_ms = started.elapsed().as_millis() as u64;
        tracker.advance(Phase::Validating);

        let (tool_calls, risk_forced) = self.annotate_risk(response.tool_calls.clone(), query);
        if risk_forced {
            debug!(query_id = %query.id, "high-risk tool call, escalation forced");
            tracker.advance(Phase::Escalating);
            return self
                .verify(query, tracker, Some(draft.clone()), response.usage, draft_ms, None)
                .await;
        }

        let quality = match self.validator.validate(query, &response, classification).await {
            Ok(quality) => quality,
            Err(error) => {
                warn!(query_id = %query.id, %error, "draft candidate malformed, escalating");
                tracker.advance(Phase::Escalating);
                return self
                    .verify(query, tracker, Some(draft.clone()), response.usage, draft_ms, None)
                    .await;
            }
        };

        if quality.passed {
            tracker.advance(Phase::Accepted);
            tracker.advance(Phase::Complete);
            return Ok(self.build_result(ResultParts {
                query_id: query.id.clone(),
                content: response.content.unwrap_or_default(),
                tool_calls,
                draft: Some(PhaseOutcome {
                    model: draft.clone(),
                    usage: response.usage,
                    elapsed_ms: draft_ms,
                }),
                verifier: None,
                cascaded: true,
                draft_accepted: true,
                quality: Some(quality),
            }));
        }

        debug!(query_id = %query.id, reason = %quality.reason, "draft rejected, escalating");
        tracker.advance(Phase::Escalating);
        self.verify(
            query,
            tracker,
            Some(draft.clone()),
            response.usage,
            draft_ms,
            Some(quality),
        )
        .await
    }

    /// The single verifier call. Draft tool calls are discarded wholesale;
    /// the verifier regenerates its own. A failure here is fatal.
    async fn verify(
        &self,
        query: &Query,
        tracker: &mut PhaseTracker,
        draft_model: Option<ModelSpec>,
        draft_usage: TokenUsage,
        draft_ms: u64,
        quality: Option<QualityResult>,
    ) -> Result<CascadeResult, CascadeError> {
        let verifier = self.config.verifier_model().clone();
        tracker.advance(Phase::Verifying);

        let started = Instant::now();
        let request = ProviderRequest::from_query(query, &verifier);
        let response = match self.call_with_timeout(&request).await {
            Ok(response) => response,
            Err(error) => {
                tracker.advance(Phase::Error);
                return Err(self.verifier_error(&verifier, error));
            }
        };
        let verify_ms = started.elapsed().as_millis() as u64;
        tracker.advance(Phase::Complete);

        let (tool_calls, _) = self.annotate_risk(response.tool_calls.clone(), query);
        Ok(self.build_result(ResultParts {
            query_id: query.id.clone(),
            content: response.content.unwrap_or_default(),
            tool_calls,
            draft: draft_model.map(|model| PhaseOutcome {
                model,
                usage: draft_usage,
                elapsed_ms: draft_ms,
            }),
            verifier: Some(PhaseOutcome {
                model: verifier,
                usage: response.usage,
                elapsed_ms: verify_ms,
            }),
            cascaded: true,
            draft_accepted: false,
            quality,
        }))
    }

    pub(crate) fn verifier_error(&self, model: &ModelSpec, error: ProviderError) -> CascadeError {
        match error {
            ProviderError::Timeout(_) => CascadeError::VerifierTimeout {
                model: model.name.clone(),
                timeout_ms: self.config.request_timeout_ms,
            },
            other => CascadeError::Verifier {
                model: model.name.clone(),
                source: other,
            },
        }
    }

    pub(crate) fn build_result(&self, parts: ResultParts) -> CascadeResult {
        let breakdown = self.accountant.breakdown(
            parts.draft.as_ref().map(|p| (&p.model, &p.usage)),
            parts.verifier.as_ref().map(|p| (&p.model, &p.usage)),
            self.config.verifier_model(),
        );

        // Fire-and-forget aggregation; atomic, never blocks the caller.
        self.savings
            .record(breakdown.total_cost, breakdown.savings_percent);

        let model_used = parts
            .verifier
            .as_ref()
            .map(|p| p.model.name.clone())
            .filter(|_| !parts.draft_accepted)
            .or_else(|| parts.draft.as_ref().map(|p| p.model.name.clone()))
            .unwrap_or_default();

        CascadeResult {
            query_id: parts.query_id,
            content: parts.content,
            model_used,
            draft_model: parts.draft.as_ref().map(|p| p.model.name.clone()),
            verifier_model: parts.verifier.as_ref().map(|p| p.model.name.clone()),
            draft_cost: breakdown.draft_cost,
            verifier_cost: breakdown.verifier_cost,
            total_cost: breakdown.total_cost,
            savings_percent: breakdown.savings_percent,
            draft_tokens: parts.draft.as_ref().map(|p| p.usage).unwrap_or_default(),
            verifier_tokens: parts.verifier.as_ref().map(|p| p.usage).unwrap_or_default(),
            cascaded: parts.cascaded,
            draft_accepted: parts.draft_accepted,
            draft_ms: parts.draft.as_ref().map(|p| p.elapsed_ms).unwrap_or(0),
            verify_ms: parts.verifier.as_ref().map(|p| p.elapsed_ms).unwrap_or(0),
            tool_calls: parts.tool_calls,
            quality: parts.quality,
            completed_at: Utc::now(),
        }
    }
}

pub(crate) struct PhaseOutcome {
    pub model: ModelSpec,
    pub usage: TokenUsage,
    pub elapsed_ms: u64,
}

pub(crate) struct ResultParts {
    pub query_id: String,
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub draft: Option<PhaseOutcome>,
    pub verifier: Option<PhaseOutcome>,
    pub cascaded: bool,
    pub draft_accepted: bool,
    pub quality: Option<QualityResult>,
}
