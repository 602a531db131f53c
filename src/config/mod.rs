pub mod error;

pub use error::ConfigError;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::classifier::ComplexityTier;
use crate::validation::QualityMethod;

/// Declared quality class of a model, cheapest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Economy,
    Standard,
    Premium,
}

/// Immutable descriptor of one backend model. Never mutated after
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    pub input_cost_per_1k: f64,
    pub output_cost_per_1k: f64,
    #[serde(default)]
    pub supports_tools: bool,
    pub quality: QualityTier,
}

impl ModelSpec {
    /// Blended per-1K rate used only for the cost-ascending ordering check.
    fn blended_rate(&self) -> f64 {
        self.input_cost_per_1k + self.output_cost_per_1k
    }
}

/// Confidence required to accept a draft, per complexity tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThresholdTable {
    #[serde(default = "default_trivial")]
    pub trivial: f32,
    #[serde(default = "default_simple")]
    pub simple: f32,
    #[serde(default = "default_moderate")]
    pub moderate: f32,
    #[serde(default = "default_hard")]
    pub hard: f32,
    #[serde(default = "default_expert")]
    pub expert: f32,
}

fn default_trivial() -> f32 {
    0.25
}
fn default_simple() -> f32 {
    0.40
}
fn default_moderate() -> f32 {
    0.55
}
fn default_hard() -> f32 {
    0.70
}
fn default_expert() -> f32 {
    0.80
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            trivial: default_trivial(),
            simple: default_simple(),
            moderate: default_moderate(),
            hard: default_hard(),
            expert: default_expert(),
        }
    }
}

impl ThresholdTable {
    pub fn for_tier(&self, tier: ComplexityTier) -> f32 {
        match tier {
            ComplexityTier::Trivial => self.trivial,
            ComplexityTier::Simple => self.simple,
            ComplexityTier::Moderate => self.moderate,
            ComplexityTier::Hard => self.hard,
            ComplexityTier::Expert => self.expert,
        }
    }

    fn ordered(&self) -> [(ComplexityTier, f32); 5] {
        [
            (ComplexityTier::Trivial, self.trivial),
            (ComplexityTier::Simple, self.simple),
            (ComplexityTier::Moderate, self.moderate),
            (ComplexityTier::Hard, self.hard),
            (ComplexityTier::Expert, self.expert),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default)]
    pub method: QualityMethod,
    #[serde(default = "default_semantic_threshold")]
    pub semantic_threshold: f32,
    #[serde(default)]
    pub use_semantic: bool,
}

fn default_semantic_threshold() -> f32 {
    0.60
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            method: QualityMethod::default(),
            semantic_threshold: default_semantic_threshold(),
            use_semantic: false,
        }
    }
}

/// Read-only cascade configuration, loaded once per agent instance.
/// `models` is cost-ascending: draft first, verifier last.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeConfig {
    pub models: Vec<ModelSpec>,
    #[serde(default)]
    pub thresholds: ThresholdTable,
    #[serde(default)]
    pub safety_floor: Option<f32>,
    #[serde(default = "default_max_tool_steps")]
    pub max_tool_steps: u32,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_max_tool_steps() -> u32 {
    8
}

fn default_request_timeout_ms() -> u64 {
    120_000
}

impl CascadeConfig {
    pub fn new(models: Vec<ModelSpec>) -> Self {
        Self {
            models,
            thresholds: ThresholdTable::default(),
            safety_floor: None,
            max_tool_steps: default_max_tool_steps(),
            validation: ValidationConfig::default(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse cascade config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.len() < 2 {
            return Err(ConfigError::TooFewModels(self.models.len()));
        }

        for pair in self.models.windows(2) {
            if pair[0].blended_rate() > pair[1].blended_rate() {
                return Err(ConfigError::CostOrdering {
                    cheaper: pair[0].name.clone(),
                    pricier: pair[1].name.clone(),
                });
            }
        }

        let mut previous = 0.0f32;
        for (tier, value) in self.thresholds.ordered() {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ThresholdOutOfRange {
                    tier: tier.to_string(),
                    value,
                });
            }
            if value < previous {
                return Err(ConfigError::ThresholdOrdering);
            }
            previous = value;
        }

        if let Some(floor) = self.safety_floor
            && !(0.0..=1.0).contains(&floor)
        {
            return Err(ConfigError::SafetyFloorOutOfRange(floor));
        }

        if self.max_tool_steps == 0 {
            return Err(ConfigError::ZeroToolSteps);
        }

        if !(0.0..=1.0).contains(&self.validation.semantic_threshold) {
            return Err(ConfigError::SemanticThresholdOutOfRange(
                self.validation.semantic_threshold,
            ));
        }

        Ok(())
    }

    /// Tier threshold lifted to the safety floor when one is configured.
    pub fn effective_threshold(&self, tier: ComplexityTier) -> f32 {
        let tier_threshold = self.thresholds.for_tier(tier);
        match self.safety_floor {
            Some(floor) => tier_threshold.max(floor),
            None => tier_threshold,
        }
    }

    /// The cheapest configured model, tried first under a cascade.
    pub fn draft_model(&self) -> &ModelSpec {
        &self.models[0]
    }

    /// The most expensive configured model, invoked on escalation.
    pub fn verifier_model(&self) -> &ModelSpec {
        &self.models[self.models.len() - 1]
    }
}
