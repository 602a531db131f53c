use serde::{Deserialize, Serialize};

/// Risk tier of a pending tool call. `High` and `Critical` force
/// escalation to the verifier regardless of draft confidence.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskTier::Low => write!(f, "low"),
            RiskTier::Medium => write!(f, "medium"),
            RiskTier::High => write!(f, "high"),
            RiskTier::Critical => write!(f, "critical"),
        }
    }
}

impl RiskTier {
    /// Whether a call at this tier must be handled by the verifier.
    pub fn requires_verifier(&self) -> bool {
        matches!(self, RiskTier::High | RiskTier::Critical)
    }
}

// Irreversible or money-moving operations.
const CRITICAL_FRAGMENTS: &[&str] = &[
    "delete",
    "drop_table",
    "drop table",
    "truncate",
    "wipe",
    "destroy",
    "payment",
    "charge",
    "transfer_funds",
    "transfer funds",
    "refund",
    "deploy_production",
    "deploy to production",
    "revoke",
    "terminate_account",
];

// Outward-facing or state-changing operations.
const HIGH_FRAGMENTS: &[&str] = &[
    "send_email",
    "send email",
    "send_sms",
    "publish",
    "deploy",
    "execute",
    "run_command",
    "shell",
    "purchase",
    "order",
    "write_file",
    "overwrite",
    "grant",
    "permission",
];

// Reversible mutations.
const MEDIUM_FRAGMENTS: &[&str] = &[
    "create", "update", "modify", "insert", "post", "upload", "rename", "move",
];

/// Pure lookup of a tool call's risk tier from its name and description.
/// The name is checked first, then the description; anything unmatched is
/// `Low`.
#[derive(Debug, Clone, Default)]
pub struct ToolRiskClassifier;

impl ToolRiskClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, name: &str, description: &str) -> RiskTier {
        let name = name.to_lowercase();
        let description = description.to_lowercase();

        for haystack in [&name, &description] {
            if CRITICAL_FRAGMENTS.iter().any(|f| haystack.contains(f)) {
                return RiskTier::Critical;
            }
        }
        for haystack in [&name, &description] {
            if HIGH_FRAGMENTS.iter().any(|f| haystack.contains(f)) {
                return RiskTier::High;
            }
        }
        for haystack in [&name, &description] {
            if MEDIUM_FRAGMENTS.iter().any(|f| haystack.contains(f)) {
                return RiskTier::Medium;
            }
        }
        RiskTier::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_is_critical() {
        let classifier = ToolRiskClassifier::new();
        assert_eq!(
            classifier.classify("delete_account", "Remove a user account"),
            RiskTier::Critical
        );
    }

    #[test]
    fn payment_in_description_is_critical() {
        let classifier = ToolRiskClassifier::new();
        assert_eq!(
            classifier.classify("checkout", "Collect payment from the customer"),
            RiskTier::Critical
        );
    }

    #[test]
    fn send_email_is_high() {
        let classifier = ToolRiskClassifier::new();
        assert_eq!(
            classifier.classify("send_email", "Send an email to a recipient"),
            RiskTier::High
        );
    }

    #[test]
    fn create_is_medium() {
        let classifier = ToolRiskClassifier::new();
        assert_eq!(
            classifier.classify("create_draft", "Save a draft document"),
            RiskTier::Medium
        );
    }

    #[test]
    fn lookups_default_to_low() {
        let classifier = ToolRiskClassifier::new();
        assert_eq!(
            classifier.classify("search", "Search the knowledge base"),
            RiskTier::Low
        );
        assert_eq!(classifier.classify("get_weather", ""), RiskTier::Low);
    }

    #[test]
    fn name_match_beats_description_tier() {
        let classifier = ToolRiskClassifier::new();
        // "delete" in the name is critical even with a benign description.
        assert_eq!(
            classifier.classify("delete_note", "Tidy up old notes"),
            RiskTier::Critical
        );
    }

    #[test]
    fn high_and_critical_require_verifier() {
        assert!(!RiskTier::Low.requires_verifier());
        assert!(!RiskTier::Medium.requires_verifier());
        assert!(RiskTier::High.requires_verifier());
        assert!(RiskTier::Critical.requires_verifier());
    }
}
