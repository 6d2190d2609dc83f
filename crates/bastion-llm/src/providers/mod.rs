//! Upstream provider adapters
//!
//! Every upstream speaks through [`LlmProvider`]. The gateway holds them as
//! `Arc<dyn LlmProvider>` and never knows which wire protocol is behind one.

/// Anthropic Messages API adapter
pub mod anthropic;
/// Scripted provider for tests and local development
pub mod mock;
/// Adapter for any OpenAI-compatible chat completions endpoint
pub mod openai_compat;

pub use anthropic::{AnthropicConfig, AnthropicProvider};
pub use mock::MockProvider;
pub use openai_compat::{OpenAiCompatConfig, OpenAiCompatProvider};

use crate::completion::{CompletionRequest, CompletionResponse};
use crate::error::Result;
use crate::util::truncate_safe;
use std::sync::Arc;

/// Trait for upstream providers
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (unique within a gateway)
    fn name(&self) -> &str;

    /// Models this provider can serve
    fn available_models(&self) -> Vec<String>;

    /// Model used when the request leaves `model` empty
    fn default_model(&self) -> &str;

    /// Complete a conversation; tool calls are returned when tools are offered
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}

/// Shared provider handle
pub type SharedProvider = Arc<dyn LlmProvider>;

/// Map raw upstream error text to a short message without credentials
pub(crate) fn sanitize_api_error(provider: &str, error: &str) -> String {
    let lower = error.to_lowercase();

    if lower.contains("api key")
        || lower.contains("api-key")
        || lower.contains("apikey")
        || lower.contains("invalid key")
        || lower.contains("unauthorized")
        || lower.contains("authentication")
    {
        return format!("{provider} authentication error");
    }

    if lower.contains("rate limit") || lower.contains("quota") || lower.contains("overloaded") {
        return format!("{provider} rate limit exceeded");
    }

    if lower.contains("internal") || lower.contains("server error") {
        return format!("{provider} server error");
    }

    if error.len() > 300 {
        format!("{}...(truncated)", truncate_safe(error, 300))
    } else {
        error.to_string()
    }
}
