pub mod heuristic;
pub mod logprob;
pub mod semantic;

pub use semantic::EmbeddingScorer;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::classifier::Classification;
use crate::config::CascadeConfig;
use crate::provider::ProviderResponse;
use crate::query::Query;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityMethod {
    #[default]
    Heuristic,
    Logprob,
    Semantic,
}

impl std::fmt::Display for QualityMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityMethod::Heuristic => write!(f, "heuristic"),
            QualityMethod::Logprob => write!(f, "logprob"),
            QualityMethod::Semantic => write!(f, "semantic"),
        }
    }
}

/// Verdict on one draft attempt. Produced fresh per attempt, never reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityResult {
    pub passed: bool,
    pub confidence: f32,
    pub method: QualityMethod,
    pub reason: String,
    /// Query/response embedding similarity, semantic method only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment: Option<f32>,
}

#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("Candidate response is empty: no content and no tool calls")]
    EmptyCandidate,
}

/// Scores a candidate response against its query. The method is fixed at
/// config time; each method is a pure scoring function, with the semantic
/// one additionally consulting an external embedding scorer.
pub struct QualityValidator {
    config: Arc<CascadeConfig>,
    scorer: Option<Arc<dyn EmbeddingScorer>>,
}

impl QualityValidator {
    pub fn new(config: Arc<CascadeConfig>) -> Self {
        Self {
            config,
            scorer: None,
        }
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn EmbeddingScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    fn method(&self) -> QualityMethod {
        if self.config.validation.use_semantic {
            QualityMethod::Semantic
        } else {
            self.config.validation.method
        }
    }

    /// Validate a draft candidate. Low quality is a reject, not an error;
    /// only an empty candidate is a `ValidatorError`.
    pub async fn validate(
        &self,
        query: &Query,
        candidate: &ProviderResponse,
        classification: &Classification,
    ) -> Result<QualityResult, ValidatorError> {
        if candidate.is_empty() {
            return Err(ValidatorError::EmptyCandidate);
        }

        let threshold = self.config.effective_threshold(classification.tier);
        let content = candidate.content.as_deref().unwrap_or("");

        // A tool-call-only candidate has no prose to score; risk routing
        // already happened upstream.
        if content.trim().is_empty() {
            return Ok(QualityResult {
                passed: true,
                confidence: 1.0,
                method: self.method(),
                reason: "tool-call-only response, no text to score".to_string(),
                alignment: None,
            });
        }

        let result = match self.method() {
            QualityMethod::Heuristic => self.validate_heuristic(query, content, threshold),
            QualityMethod::Logprob => self.validate_logprob(query, candidate, content, threshold),
            QualityMethod::Semantic => {
                self.validate_semantic(query, content, threshold).await
            }
        };

        debug!(
            passed = result.passed,
            confidence = result.confidence,
            method = %result.method,
            threshold,
            "draft validated"
        );
        Ok(result)
    }

    fn validate_heuristic(&self, query: &Query, content: &str, threshold: f32) -> QualityResult {
        let (confidence, reason) = heuristic::score(&query.user_text(), content);
        QualityResult {
            passed: confidence >= threshold,
            confidence,
            method: QualityMethod::Heuristic,
            reason,
            alignment: None,
        }
    }

    fn validate_logprob(
        &self,
        query: &Query,
        candidate: &ProviderResponse,
        content: &str,
        threshold: f32,
    ) -> QualityResult {
        match candidate.logprobs.as_deref() {
            Some(logprobs) if !logprobs.is_empty() => {
                let confidence = logprob::confidence(logprobs);
                QualityResult {
                    passed: confidence >= threshold,
                    confidence,
                    method: QualityMethod::Logprob,
                    reason: format!(
                        "normalized logprob confidence {:.2} over {} tokens",
                        confidence,
                        logprobs.len()
                    ),
                    alignment: None,
                }
            }
            _ => {
                let mut result = self.validate_heuristic(query, content, threshold);
                result.reason = format!("no logprobs returned, heuristic fallback: {}", result.reason);
                result
            }
        }
    }

    async fn validate_semantic(&self, query: &Query, content: &str, threshold: f32) -> QualityResult {
        let Some(scorer) = self.scorer.as_ref() else {
            let mut result = self.validate_heuristic(query, content, threshold);
            result.reason = format!(
                "no embedding scorer configured, heuristic fallback: {}",
                result.reason
            );
            return result;
        };

        let mut result = self.validate_heuristic(query, content, threshold);
        result.method = QualityMethod::Semantic;

        match scorer.similarity(&query.user_text(), content).await {
            Ok(similarity) => {
                let semantic_threshold = self.config.validation.semantic_threshold;
                let aligned = similarity >= semantic_threshold;
                result.alignment = Some(similarity);
                // Both gates must clear: confidence and alignment.
                result.passed = result.passed && aligned;
                result.reason = format!(
                    "{}; alignment {:.2} vs semantic threshold {:.2}",
                    result.reason, similarity, semantic_threshold
                );
            }
            Err(e) => {
                // A scorer failure must not fail the draft phase outright;
                // the heuristic verdict stands.
                result.reason = format!("{}; embedding scorer unavailable: {}", result.reason, e);
            }
        }
        result
    }
}
