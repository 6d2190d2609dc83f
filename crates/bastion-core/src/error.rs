//! Error types for bastion-core
//!
//! Internal failures never reach the end user as-is. The facade maps every
//! error to one of the fixed messages exposed by [`UserFriendlyError`].

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Key-value store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Could not reach the backing store
    #[error("store connection failed: {0}")]
    Connection(String),

    /// A store command failed
    #[error("store command failed: {0}")]
    Command(String),

    /// Stored value could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Store was shut down
    #[error("store is closed")]
    Closed,
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        Self::Command(err.to_string())
    }
}

/// Core error types
#[derive(Debug, Error)]
pub enum Error {
    /// Store error
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Upstream layer error
    #[error("llm error: {0}")]
    Llm(#[from] bastion_llm::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration
    #[error("invalid configuration for '{field}': {message}")]
    InvalidConfig {
        /// Field name
        field: String,
        /// Error message
        message: String,
    },

    /// Request cannot be handled as given
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl Error {
    /// Whether checkpoint recovery is worth attempting for this error
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::InvalidConfig { .. } | Error::InvalidRequest(_))
    }
}

/// Fixed, user-safe wording for an error
///
/// Implementations must not interpolate any part of the error itself.
pub trait UserFriendlyError {
    /// Message shown to the end user
    fn user_message(&self) -> &'static str;

    /// Optional follow-up hint
    fn suggestion(&self) -> Option<&'static str>;
}

impl UserFriendlyError for Error {
    fn user_message(&self) -> &'static str {
        match self {
            Error::Llm(e) if e.is_exhausted() => {
                "I'm having trouble generating a response right now."
            }
            Error::Llm(bastion_llm::Error::ContextTooLarge { .. }) => {
                "That request is too large for me to handle in one go."
            }
            Error::InvalidRequest(_) => "I couldn't make sense of that request.",
            _ => "Something went wrong while handling your request.",
        }
    }

    fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::Llm(bastion_llm::Error::ContextTooLarge { .. }) => {
                Some("Try splitting it into smaller parts.")
            }
            Error::Llm(_) | Error::Store(_) | Error::Internal(_) => {
                Some("Please try again in a moment.")
            }
            Error::InvalidRequest(_) => Some("Please rephrase it and try again."),
            Error::Serialization(_) | Error::InvalidConfig { .. } => None,
        }
    }
}

/// Full user-facing text for an error: message plus suggestion
#[must_use]
pub fn user_facing_text(error: &Error) -> String {
    match error.suggestion() {
        Some(suggestion) => format!("{} {}", error.user_message(), suggestion),
        None => error.user_message().to_string(),
    }
}
