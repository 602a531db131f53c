use futures::{Stream, StreamExt};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::ModelSpec;
use crate::error::CascadeError;
use crate::executor::core::{PhaseOutcome, ResultParts};
use crate::executor::CascadeExecutor;
use crate::provider::{ProviderChunk, ProviderError, ProviderRequest, ProviderResponse, TokenUsage};
use crate::query::{Query, ToolCall};
use crate::routing::Strategy;
use crate::stream::assembler::{AssemblerEvent, ToolCallAssembler};
use crate::stream::StreamEvent;

impl CascadeExecutor {
    /// Execute a query as a live event sequence. Events arrive in strict
    /// causal order; dropping the returned stream cancels the execution
    /// promptly without touching other in-flight queries.
    pub fn stream_events(&self, query: Query) -> impl Stream<Item = StreamEvent> + Send + 'static {
        let (tx, rx) = mpsc::unbounded_channel();
        let emitter = Emitter {
            executor: self.clone(),
            tx,
        };
        tokio::spawn(async move {
            emitter.drive(query).await;
        });
        futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
    }
}

/// Why a drain of one provider stream stopped early.
enum DrainError {
    Provider(ProviderError),
    /// The consumer dropped the event stream.
    Cancelled,
}

/// Everything one full provider stream produced.
struct DrainOutcome {
    content: String,
    usage: TokenUsage,
    tool_calls: Vec<ToolCall>,
}

struct Emitter {
    executor: CascadeExecutor,
    tx: UnboundedSender<StreamEvent>,
}

impl Emitter {
    fn send(&self, event: StreamEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    async fn drive(self, query: Query) {
        if query.messages.is_empty() {
            self.send(StreamEvent::Error {
                kind: CascadeError::EmptyQuery.kind(),
                message: CascadeError::EmptyQuery.to_string(),
                incomplete: false,
            });
            return;
        }

        let (classification, strategy) = self.executor.resolve(&query);
        if !self.send(StreamEvent::Routing {
            query_id: query.id.clone(),
            strategy: strategy.kind(),
            tier: classification.tier,
            domain: classification.domain,
        }) {
            return;
        }

        match strategy {
            Strategy::DirectExpensive => {
                let verifier = self.executor.config.verifier_model().clone();
                self.run_verifier(&query, None, None, false).await;
                debug!(query_id = %query.id, model = %verifier.name, "direct-expensive stream finished");
            }
            Strategy::DirectCheap => self.run_direct_cheap(&query).await,
            Strategy::Cascade { draft, verifier } => {
                if query.has_tools() {
                    self.run_tool_cascade(&query, &classification, &draft, &verifier)
                        .await
                } else {
                    self.run_text_cascade(&query, &classification, &draft, &verifier)
                        .await
                }
            }
        }
    }

    async fn run_direct_cheap(&self, query: &Query) {
        let draft = self.executor.config.draft_model().clone();
        let started = Instant::now();
        match self.drain(query, &draft, true, &mut Vec::new()).await {
            Ok(outcome) => {
                let draft_ms = started.elapsed().as_millis() as u64;
                let (tool_calls, _) = self.executor.annotate_risk(outcome.tool_calls, query);
                let result = self.executor.build_result(ResultParts {
                    query_id: query.id.clone(),
                    content: outcome.content,
                    tool_calls,
                    draft: Some(PhaseOutcome {
                        model: draft,
                        usage: outcome.usage,
                        elapsed_ms: draft_ms,
                    }),
                    verifier: None,
                    cascaded: false,
                    draft_accepted: true,
                    quality: None,
                });
                self.send(StreamEvent::Complete { result });
            }
            Err(DrainError::Cancelled) => {}
            Err(DrainError::Provider(error)) => {
                warn!(query_id = %query.id, error = %error, "draft failed on direct-cheap path, escalating");
                let draft_ms = started.elapsed().as_millis() as u64;
                let verifier = self.executor.config.verifier_model().clone();
                if !self.announce_escalation(&draft, &verifier, 0.0, error.user_message()) {
                    return;
                }
                self.run_verifier(
                    query,
                    Some(PhaseOutcome {
                        model: draft,
                        usage: TokenUsage::default(),
                        elapsed_ms: draft_ms,
                    }),
                    None,
                    true,
                )
                .await;
            }
        }
    }

    /// Text-only cascade: draft chunks are emitted optimistically as they
    /// arrive, the decision follows once the draft is complete.
    async fn run_text_cascade(
        &self,
        query: &Query,
        classification: &crate::classifier::Classification,
        draft: &ModelSpec,
        verifier: &ModelSpec,
    ) {
        let started = Instant::now();
        let outcome = match self.drain(query, draft, true, &mut Vec::new()).await {
            Ok(outcome) => outcome,
            Err(DrainError::Cancelled) => return,
            Err(DrainError::Provider(error)) => {
                warn!(query_id = %query.id, error = %error, "draft provider failed, escalating");
                let draft_ms = started.elapsed().as_millis() as u64;
                if !self.announce_escalation(draft, verifier, 0.0, error.user_message()) {
                    return;
                }
                self.run_verifier(
                    query,
                    Some(PhaseOutcome {
                        model: draft.clone(),
                        usage: TokenUsage::default(),
                        elapsed_ms: draft_ms,
                    }),
                    None,
                    true,
                )
                .await;
                return;
            }
        };
        let draft_ms = started.elapsed().as_millis() as u64;

        let candidate = ProviderResponse {
            content: Some(outcome.content.clone()),
            tool_calls: Vec::new(),
            usage: outcome.usage,
            logprobs: None,
        };
        let quality = match self
            .executor
            .validator
            .validate(query, &candidate, classification)
            .await
        {
            Ok(quality) => quality,
            Err(error) => {
                if !self.announce_escalation(draft, verifier, 0.0, error.to_string()) {
                    return;
                }
                self.run_verifier(
                    query,
                    Some(PhaseOutcome {
                        model: draft.clone(),
                        usage: outcome.usage,
                        elapsed_ms: draft_ms,
                    }),
                    None,
                    true,
                )
                .await;
                return;
            }
        };

        if quality.passed {
            if !self.send(StreamEvent::DraftDecision {
                accepted: true,
                confidence: quality.confidence,
                reason: quality.reason.clone(),
            }) {
                return;
            }
            let result = self.executor.build_result(ResultParts {
                query_id: query.id.clone(),
                content: outcome.content,
                tool_calls: Vec::new(),
                draft: Some(PhaseOutcome {
                    model: draft.clone(),
                    usage: outcome.usage,
                    elapsed_ms: draft_ms,
                }),
                verifier: None,
                cascaded: true,
                draft_accepted: true,
                quality: Some(quality),
            });
            self.send(StreamEvent::Complete { result });
            return;
        }

        debug!(query_id = %query.id, reason = %quality.reason, "draft rejected mid-stream, switching to {}", verifier.name);
        if !self.announce_escalation(draft, verifier, quality.confidence, quality.reason.clone()) {
            return;
        }
        self.run_verifier(
            query,
            Some(PhaseOutcome {
                model: draft.clone(),
                usage: outcome.usage,
                elapsed_ms: draft_ms,
            }),
            Some(quality),
            true,
        )
        .await;
    }

    /// Tool-enabled cascade: nothing from the draft is emitted until the
    /// decision is final. A draft tool call discarded by escalation is
    /// never visible downstream.
    async fn run_tool_cascade(
        &self,
        query: &Query,
        classification: &crate::classifier::Classification,
        draft: &ModelSpec,
        verifier: &ModelSpec,
    ) {
        let mut buffered: Vec<StreamEvent> = Vec::new();
        let started = Instant::now();
        let outcome = match self.drain(query, draft, false, &mut buffered).await {
            Ok(outcome) => outcome,
            Err(DrainError::Cancelled) => return,
            Err(DrainError::Provider(error)) => {
                warn!(query_id = %query.id, error = %error, "draft provider failed, escalating");
                let draft_ms = started.elapsed().as_millis() as u64;
                if !self.announce_escalation(draft, verifier, 0.0, error.user_message()) {
                    return;
                }
                self.run_verifier(
                    query,
                    Some(PhaseOutcome {
                        model: draft.clone(),
                        usage: TokenUsage::default(),
                        elapsed_ms: draft_ms,
                    }),
                    None,
                    true,
                )
                .await;
                return;
            }
        };
        let draft_ms = started.elapsed().as_millis() as u64;
        let draft_outcome = PhaseOutcome {
            model: draft.clone(),
            usage: outcome.usage,
            elapsed_ms: draft_ms,
        };

        let (tool_calls, risk_forced) = self.executor.annotate_risk(outcome.tool_calls, query);
        if risk_forced {
            debug!(query_id = %query.id, "high-risk tool call, escalation forced; draft buffer discarded");
            if !self.announce_escalation(
                draft,
                verifier,
                0.0,
                "high-risk tool call requires the verifier".to_string(),
            ) {
                return;
            }
            self.run_verifier(query, Some(draft_outcome), None, true).await;
            return;
        }

        let candidate = ProviderResponse {
            content: (!outcome.content.is_empty()).then(|| outcome.content.clone()),
            tool_calls: tool_calls.clone(),
            usage: outcome.usage,
            logprobs: None,
        };
        let quality = match self
            .executor
            .validator
            .validate(query, &candidate, classification)
            .await
        {
            Ok(quality) => quality,
            Err(error) => {
                if !self.announce_escalation(draft, verifier, 0.0, error.to_string()) {
                    return;
                }
                self.run_verifier(query, Some(draft_outcome), None, true).await;
                return;
            }
        };

        if !quality.passed {
            if !self.announce_escalation(draft, verifier, quality.confidence, quality.reason.clone()) {
                return;
            }
            self.run_verifier(query, Some(draft_outcome), Some(quality), true)
                .await;
            return;
        }

        // Accepted: replay the buffered draft stream as-is.
        if !self.send(StreamEvent::DraftDecision {
            accepted: true,
            confidence: quality.confidence,
            reason: quality.reason.clone(),
        }) {
            return;
        }
        for event in buffered {
            if !self.send(event) {
                return;
            }
        }
        let result = self.executor.build_result(ResultParts {
            query_id: query.id.clone(),
            content: outcome.content,
            tool_calls,
            draft: Some(draft_outcome),
            verifier: None,
            cascaded: true,
            draft_accepted: true,
            quality: Some(quality),
        });
        self.send(StreamEvent::Complete { result });
    }

    /// `DraftDecision(rejected)` followed by `Switch`, in that order.
    fn announce_escalation(
        &self,
        draft: &ModelSpec,
        verifier: &ModelSpec,
        confidence: f32,
        reason: String,
    ) -> bool {
        if !self.send(StreamEvent::DraftDecision {
            accepted: false,
            confidence,
            reason: reason.clone(),
        }) {
            return false;
        }
        self.send(StreamEvent::Switch {
            from: draft.name.clone(),
            to: verifier.name.clone(),
            reason,
        })
    }

    /// Stream the verifier live and finish the execution. The decision is
    /// already final here, so verifier output needs no buffering. A
    /// verifier failure is fatal for the query.
    async fn run_verifier(
        &self,
        query: &Query,
        draft: Option<PhaseOutcome>,
        quality: Option<crate::validation::QualityResult>,
        cascaded: bool,
    ) {
        let verifier = self.executor.config.verifier_model().clone();
        let started = Instant::now();
        match self.drain(query, &verifier, true, &mut Vec::new()).await {
            Ok(outcome) => {
                let verify_ms = started.elapsed().as_millis() as u64;
                let (tool_calls, _) = self.executor.annotate_risk(outcome.tool_calls, query);
                let result = self.executor.build_result(ResultParts {
                    query_id: query.id.clone(),
                    content: outcome.content,
                    tool_calls,
                    draft,
                    verifier: Some(PhaseOutcome {
                        model: verifier,
                        usage: outcome.usage,
                        elapsed_ms: verify_ms,
                    }),
                    cascaded,
                    draft_accepted: false,
                    quality,
                });
                self.send(StreamEvent::Complete { result });
            }
            Err(DrainError::Cancelled) => {}
            Err(DrainError::Provider(error)) => {
                let error = self.executor.verifier_error(&verifier, error);
                self.send(StreamEvent::Error {
                    kind: error.kind(),
                    message: error.to_string(),
                    incomplete: true,
                });
            }
        }
    }

    /// Consume one provider stream to completion. `live` sends events as
    /// they arrive; otherwise they accumulate in `buffer` for a later
    /// replay. Honors the configured timeout as a wall-clock deadline and
    /// stops promptly when the consumer goes away.
    async fn drain(
        &self,
        query: &Query,
        model: &ModelSpec,
        live: bool,
        buffer: &mut Vec<StreamEvent>,
    ) -> Result<DrainOutcome, DrainError> {
        let request = ProviderRequest::from_query(query, model);
        let deadline = Instant::now() + self.executor.timeout();

        let stream = tokio::time::timeout_at(deadline, self.executor.provider.stream(&request))
            .await
            .map_err(|_| {
                DrainError::Provider(ProviderError::Timeout(format!(
                    "{} did not start streaming in time",
                    model.name
                )))
            })?
            .map_err(DrainError::Provider)?;
        let mut stream = stream;

        let mut assembler = ToolCallAssembler::new(request.tools.as_deref());
        let mut outcome = DrainOutcome {
            content: String::new(),
            usage: TokenUsage::default(),
            tool_calls: Vec::new(),
        };

        loop {
            if self.tx.is_closed() {
                return Err(DrainError::Cancelled);
            }
            let chunk = match tokio::time::timeout_at(deadline, stream.next()).await {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(Some(Err(error))) => return Err(DrainError::Provider(error)),
                Ok(None) => break,
                Err(_) => {
                    return Err(DrainError::Provider(ProviderError::Timeout(format!(
                        "{} stream stalled past {}ms",
                        model.name, self.executor.config.request_timeout_ms
                    ))))
                }
            };

            match chunk {
                ProviderChunk::Text(text) => {
                    outcome.content.push_str(&text);
                    if !self.emit(live, buffer, StreamEvent::Chunk { text }) {
                        return Err(DrainError::Cancelled);
                    }
                }
                ProviderChunk::ToolCallDelta {
                    index,
                    id,
                    name,
                    arguments,
                } => {
                    for event in assembler.push(index, id, name, &arguments) {
                        let stream_event = match event {
                            AssemblerEvent::Started { id, name } => {
                                StreamEvent::ToolCallStart { id, name }
                            }
                            AssemblerEvent::Delta { id, fragment } => {
                                StreamEvent::ToolCallDelta { id, fragment }
                            }
                            AssemblerEvent::Completed(call) => {
                                let event = StreamEvent::ToolCallComplete {
                                    id: call.id.clone(),
                                    name: call.name.clone(),
                                    arguments: call.parsed.clone().unwrap_or_default(),
                                };
                                outcome.tool_calls.push(call);
                                event
                            }
                            AssemblerEvent::SchemaViolation { id, name, message } => {
                                StreamEvent::Error {
                                    kind: "tool_schema_violation",
                                    message: format!(
                                        "tool call {} ({}) violates its schema: {}",
                                        id, name, message
                                    ),
                                    incomplete: false,
                                }
                            }
                        };
                        if !self.emit(live, buffer, stream_event) {
                            return Err(DrainError::Cancelled);
                        }
                    }
                }
                ProviderChunk::Usage(usage) => outcome.usage = usage,
            }
        }

        for (id, name) in assembler.unfinished() {
            let event = StreamEvent::Error {
                kind: "tool_call_incomplete",
                message: format!("tool call {} ({}) ended with malformed JSON", id, name),
                incomplete: false,
            };
            if !self.emit(live, buffer, event) {
                return Err(DrainError::Cancelled);
            }
        }

        Ok(outcome)
    }

    fn emit(&self, live: bool, buffer: &mut Vec<StreamEvent>, event: StreamEvent) -> bool {
        if live {
            self.send(event)
        } else {
            buffer.push(event);
            true
        }
    }
}
