//! Anthropic Messages API provider

/// Message conversion utilities
pub mod convert;
/// Provider implementation
pub mod provider;
/// API types and configuration
pub mod types;


pub use provider::AnthropicProvider;
pub use types::{AnthropicConfig, DEFAULT_MODEL};
