use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ProviderError {
    #[error("Rate limit exceeded{}", retry_after.map(|s| format!(", retry after {}s", s)).unwrap_or_default())]
    RateLimited { retry_after: Option<u64> },

    #[error("Server error (status {status}): {message}")]
    Server { status: u16, message: String },

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    pub fn user_message(&self) -> String {
        match self {
            ProviderError::RateLimited { retry_after: Some(s) } => {
                format!("Rate limit: please retry after {} seconds", s)
            }
            ProviderError::RateLimited { retry_after: None } => "Rate limit hit".to_string(),
            ProviderError::Server { status, message } => {
                format!("Server error ({}): {}", status, message)
            }
            ProviderError::Auth(msg) => format!("Authentication error: {}", msg),
            ProviderError::Network(msg) => format!("Network error: {}", msg),
            ProviderError::Timeout(msg) => format!("Request timeout: {}", msg),
            ProviderError::InvalidResponse(msg) => format!("Invalid response: {}", msg),
        }
    }
}
