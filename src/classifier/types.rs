use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityTier {
    Trivial,
    Simple,
    Moderate,
    Hard,
    Expert,
}

impl std::fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComplexityTier::Trivial => write!(f, "trivial"),
            ComplexityTier::Simple => write!(f, "simple"),
            ComplexityTier::Moderate => write!(f, "moderate"),
            ComplexityTier::Hard => write!(f, "hard"),
            ComplexityTier::Expert => write!(f, "expert"),
        }
    }
}

impl std::str::FromStr for ComplexityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trivial" => Ok(ComplexityTier::Trivial),
            "simple" => Ok(ComplexityTier::Simple),
            "moderate" => Ok(ComplexityTier::Moderate),
            "hard" => Ok(ComplexityTier::Hard),
            "expert" => Ok(ComplexityTier::Expert),
            _ => Err(format!("Unknown complexity tier: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    #[default]
    General,
    Code,
    Math,
    Legal,
    Medical,
    Financial,
    Creative,
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Domain::General => write!(f, "general"),
            Domain::Code => write!(f, "code"),
            Domain::Math => write!(f, "math"),
            Domain::Legal => write!(f, "legal"),
            Domain::Medical => write!(f, "medical"),
            Domain::Financial => write!(f, "financial"),
            Domain::Creative => write!(f, "creative"),
        }
    }
}

impl std::str::FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "general" => Ok(Domain::General),
            "code" => Ok(Domain::Code),
            "math" => Ok(Domain::Math),
            "legal" => Ok(Domain::Legal),
            "medical" => Ok(Domain::Medical),
            "financial" => Ok(Domain::Financial),
            "creative" => Ok(Domain::Creative),
            _ => Err(format!("Unknown domain: {}", s)),
        }
    }
}

/// Outcome of classifying one query. Derived once and cached for the
/// query's lifetime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Classification {
    pub tier: ComplexityTier,
    pub domain: Domain,
    pub confidence: f32,
}

impl Classification {
    pub fn new(tier: ComplexityTier, domain: Domain, confidence: f32) -> Self {
        Self {
            tier,
            domain,
            confidence,
        }
    }

    /// Fallback used when classification produces nothing usable.
    pub fn fallback() -> Self {
        Self::new(ComplexityTier::Moderate, Domain::General, 0.0)
    }
}
