//! Orchestrator configuration

use serde::{Deserialize, Serialize};

/// Fixed texts and switches for the facade
///
/// None of these texts may carry internal detail or provider identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Reply when the input is refused
    pub blocked_message: String,
    /// Reply when a turn was recovered from a checkpoint
    pub recovery_message: String,
    /// Appended to resource content cut to fit the token budget
    pub truncation_note: String,
    /// Prefix for the system message carrying resource content
    pub resource_preamble: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            blocked_message: "I'm sorry, but I can't help with that request. \
                              Please rephrase it and try again."
                .to_string(),
            recovery_message: "I'm sorry, something went wrong while preparing that reply. \
                               I've restored our conversation to where we left off, \
                               so please try again."
                .to_string(),
            truncation_note: "[Note: the reference material was too long and has been truncated.]"
                .to_string(),
            resource_preamble: "Use the following reference material when answering:".to_string(),
        }
    }
}

impl OrchestratorConfig {
    /// Create the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the blocked-input reply
    #[must_use]
    pub fn with_blocked_message(mut self, message: impl Into<String>) -> Self {
        self.blocked_message = message.into();
        self
    }

    /// Override the recovery reply
    #[must_use]
    pub fn with_recovery_message(mut self, message: impl Into<String>) -> Self {
        self.recovery_message = message.into();
        self
    }
}
