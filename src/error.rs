use thiserror::Error;

use crate::config::ConfigError;
use crate::provider::ProviderError;

/// Caller-visible failures. The draft phase absorbs almost everything by
/// escalating; only config problems and verifier-phase failures surface.
#[derive(Debug, Error)]
pub enum CascadeError {
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    #[error("Query has no messages")]
    EmptyQuery,

    #[error("Verifier model '{model}' failed: {source}")]
    Verifier {
        model: String,
        #[source]
        source: ProviderError,
    },

    #[error("Verifier model '{model}' timed out after {timeout_ms}ms")]
    VerifierTimeout { model: String, timeout_ms: u64 },
}

impl CascadeError {
    /// Stable machine-readable kind, mirrored in stream `Error` events.
    pub fn kind(&self) -> &'static str {
        match self {
            CascadeError::InvalidConfig(_) => "invalid_config",
            CascadeError::EmptyQuery => "empty_query",
            CascadeError::Verifier { .. } => "verifier_error",
            CascadeError::VerifierTimeout { .. } => "verifier_timeout",
        }
    }
}
