use tracing::debug;

use crate::classifier::{Classification, ComplexityTier, Domain};
use crate::query::Query;

const CODE_KEYWORDS: &[&str] = &[
    "code", "function", "compile", "debug", "refactor", "stack trace", "api",
    "struct ", "class ", "impl ", "fn ", "def ", "regex", "unit test", "```",
];

const MATH_KEYWORDS: &[&str] = &[
    "equation", "integral", "derivative", "theorem", "proof", "matrix",
    "probability", "calculate", "solve for", "algebra", "geometry",
];

const LEGAL_KEYWORDS: &[&str] = &[
    "contract", "liability", "statute", "clause", "plaintiff", "compliance",
    "jurisdiction", "lawsuit", "legal", "regulation",
];

const MEDICAL_KEYWORDS: &[&str] = &[
    "diagnosis", "symptom", "dosage", "prescription", "treatment", "clinical",
    "patient", "medical", "disease", "side effect",
];

const FINANCIAL_KEYWORDS: &[&str] = &[
    "portfolio", "interest rate", "amortization", "invoice", "tax",
    "investment", "revenue", "balance sheet", "dividend", "mortgage",
];

const CREATIVE_KEYWORDS: &[&str] = &[
    "poem", "story", "lyrics", "screenplay", "fiction", "character arc",
    "write a song", "novel", "haiku",
];

const REASONING_MARKERS: &[&str] = &[
    "step by step", "step-by-step", "first,", "explain why", "prove",
    "derive", "compare and contrast", "trade-off", "tradeoff", "analyze",
    "walk me through", "in detail", "comprehensive",
];

const TRIVIAL_EXACT: &[&str] = &[
    "hi", "hello", "hey", "thanks", "thank you", "bye", "ok", "okay", "yes",
    "no", "sure", "yep", "nope", "yeah",
];

/// Pure five-tier complexity and domain classification. No I/O, no state;
/// deterministic for a given query.
#[derive(Debug, Clone, Default)]
pub struct ComplexityClassifier;

impl ComplexityClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a query. Honors a caller hint verbatim; otherwise combines
    /// bounded text signals into a score and maps it to a tier. Never fails:
    /// unmatched domains fall back to `general`.
    pub fn classify(&self, query: &Query) -> Classification {
        if let Some(hint) = query.hint {
            debug!(tier = %hint.tier, "classification hint honored, classifier skipped");
            return Classification::new(hint.tier, hint.domain.unwrap_or_default(), 1.0);
        }

        let text = query.user_text();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Classification::fallback();
        }

        let lower = trimmed.to_lowercase();
        let domain = Self::detect_domain(&lower);

        let length = Self::length_signal(trimmed);
        let reasoning = Self::reasoning_signal(&lower);
        let structure = Self::structure_signal(trimmed);
        let specialization = if domain == Domain::General { 0.0 } else { 0.2 };

        let score = (length + reasoning + structure + specialization).min(1.0);

        let tier = if TRIVIAL_EXACT.iter().any(|p| lower == *p) {
            ComplexityTier::Trivial
        } else {
            Self::score_to_tier(score)
        };

        // Confidence grows with distance from the nearest tier boundary.
        let confidence = Self::boundary_confidence(score);

        debug!(%tier, %domain, score, confidence, "query classified");
        Classification::new(tier, domain, confidence)
    }

    fn detect_domain(lower: &str) -> Domain {
        let tables: &[(Domain, &[&str])] = &[
            (Domain::Code, CODE_KEYWORDS),
            (Domain::Math, MATH_KEYWORDS),
            (Domain::Legal, LEGAL_KEYWORDS),
            (Domain::Medical, MEDICAL_KEYWORDS),
            (Domain::Financial, FINANCIAL_KEYWORDS),
            (Domain::Creative, CREATIVE_KEYWORDS),
        ];

        let mut best = Domain::General;
        let mut best_hits = 0usize;
        for (domain, keywords) in tables {
            let hits = keywords.iter().filter(|k| lower.contains(*k)).count();
            if hits > best_hits {
                best_hits = hits;
                best = *domain;
            }
        }
        best
    }

    fn length_signal(text: &str) -> f32 {
        let words = text.split_whitespace().count() as f32;
        (words / 120.0).min(0.35)
    }

    fn reasoning_signal(lower: &str) -> f32 {
        let hits = REASONING_MARKERS
            .iter()
            .filter(|m| lower.contains(*m))
            .count() as f32;
        (hits * 0.15).min(0.4)
    }

    fn structure_signal(text: &str) -> f32 {
        let mut signal = 0.0;
        if text.contains("```") {
            signal += 0.2;
        }
        let lines = text.lines().count();
        if lines > 5 {
            signal += 0.1;
        }
        let sentences = text.chars().filter(|c| matches!(c, '.' | '?' | '!')).count();
        if sentences >= 3 {
            signal += 0.1;
        }
        signal
    }

    fn score_to_tier(score: f32) -> ComplexityTier {
        if score < 0.10 {
            ComplexityTier::Trivial
        } else if score < 0.30 {
            ComplexityTier::Simple
        } else if score < 0.55 {
            ComplexityTier::Moderate
        } else if score < 0.80 {
            ComplexityTier::Hard
        } else {
            ComplexityTier::Expert
        }
    }

    fn boundary_confidence(score: f32) -> f32 {
        let boundaries = [0.10, 0.30, 0.55, 0.80];
        let nearest = boundaries
            .iter()
            .map(|b| (score - b).abs())
            .fold(f32::MAX, f32::min);
        (0.5 + nearest * 2.0).min(1.0)
    }
}
