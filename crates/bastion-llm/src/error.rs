//! Error types for bastion-llm

use thiserror::Error;

/// LLM error type
#[derive(Debug, Error)]
pub enum Error {
    /// Provider not configured
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// API error
    #[error("api error: {0}")]
    Api(String),

    /// Rate limit exceeded
    #[error("rate limit exceeded")]
    RateLimit,

    /// Invalid response
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Network error
    #[error("network error: {0}")]
    Network(String),

    /// Timeout
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// Context alone does not fit in the token budget
    #[error("context too large: {context_tokens} tokens exceeds budget of {budget}")]
    ContextTooLarge {
        /// Estimated tokens of the context strings
        context_tokens: usize,
        /// Configured budget
        budget: usize,
    },

    /// Every provider in the ranked list was tried and failed
    #[error("all providers exhausted after {} attempt(s)", attempted.len())]
    AllProvidersExhausted {
        /// Providers attempted in this invocation, in order
        attempted: Vec<String>,
    },
}

impl Error {
    /// Whether this error means no provider could serve the request
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::AllProvidersExhausted { .. })
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
