//! Token counting and budget enforcement
//!
//! Two estimators live here on purpose:
//!
//! - [`estimate_tokens`]: a cheap `chars / 4` proxy. The budget validator and
//!   the chunker both use it, so validation and chunk sizing always agree.
//! - [`TokenCounter`]: tiktoken's `cl100k_base` encoding, used for usage
//!   accounting when a provider does not report token usage.
//!
//! # Module Structure
//!
//! - `budget`: `TokenBudgetValidator`, `BudgetCheck`, paragraph/sentence chunking

mod budget;

#[cfg(test)]
mod tests;

pub use budget::{
    chunk_text, estimate_tokens, BudgetCheck, TokenBudgetConfig, TokenBudgetValidator,
    DEFAULT_OVERLAP_RESERVE, DEFAULT_TOKEN_BUDGET,
};

use crate::message::Message;
use std::sync::LazyLock;
use tiktoken_rs::{cl100k_base, CoreBPE};

/// Global tokenizer instance (initialized once, thread-safe)
static TOKENIZER: LazyLock<CoreBPE> = LazyLock::new(|| {
    cl100k_base().expect("cl100k_base tokenizer is a compile-time constant and should never fail")
});

/// Token counter for usage accounting
///
/// Zero-sized wrapper around the global tokenizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenCounter;

impl TokenCounter {
    /// Create a new token counter
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Count tokens in a string
    #[must_use]
    pub fn count_tokens(&self, text: &str) -> usize {
        TOKENIZER.encode_with_special_tokens(text).len()
    }

    /// Count tokens in a message (includes role overhead)
    #[must_use]
    pub fn count_message_tokens(&self, message: &Message) -> usize {
        const MESSAGE_OVERHEAD: usize = 6; // role + separators
        self.count_tokens(&message.content) + MESSAGE_OVERHEAD
    }

    /// Count total tokens in a conversation
    #[must_use]
    pub fn count_conversation_tokens(&self, messages: &[Message]) -> usize {
        const CONVERSATION_OVERHEAD: usize = 3; // start/end tokens
        messages
            .iter()
            .map(|m| self.count_message_tokens(m))
            .sum::<usize>()
            + CONVERSATION_OVERHEAD
    }
}

/// Convenience function to count tokens in messages
#[must_use]
pub fn count_message_tokens(messages: &[Message]) -> usize {
    TokenCounter::new().count_conversation_tokens(messages)
}

/// Budget estimate for a whole conversation (same proxy as the validator)
#[must_use]
pub fn estimate_message_tokens(messages: &[Message]) -> usize {
    messages.iter().map(|m| estimate_tokens(&m.content)).sum()
}
