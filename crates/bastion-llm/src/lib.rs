//! Bastion LLM - upstream provider layer
//!
//! This crate covers everything between a conversation and the upstream
//! text-generation providers:
//! - Token: budget validation and content chunking
//! - Safety: input screening and output redaction
//! - Providers: OpenAI-compatible and Anthropic adapters, plus a scripted mock
//! - Gateway: ordered failover with health tracking and cooldown
//! - Routing: task classification and provider selection

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod completion;
pub mod error;
pub mod gateway;
pub mod message;
pub mod providers;
pub mod routing;
pub mod safety;
pub mod token;
pub mod tools;
pub mod util;

pub use completion::{CompletionRequest, CompletionResponse, TokenUsage};
pub use error::{Error, Result};
pub use gateway::{
    AttemptObserver, CallOptions, Gateway, GatewayBuilder, GatewayConfig, GatewayResponse,
    NoopObserver, ProviderDescriptor, ProviderStatus, RequestOutcome,
};
pub use message::{Message, MessageRole};
pub use providers::{
    AnthropicConfig, AnthropicProvider, LlmProvider, MockProvider, OpenAiCompatConfig,
    OpenAiCompatProvider, SharedProvider,
};
pub use routing::{
    Complexity, ModelSelection, RouterConfig, TaskAnalysis, TaskRouter, TaskType,
};
pub use safety::{InputValidation, SafetyConfig, SafetyFilter, SafetyIssue, Severity};
pub use token::{
    estimate_tokens, BudgetCheck, TokenBudgetConfig, TokenBudgetValidator, TokenCounter,
};
pub use tools::{ToolCall, ToolDefinition};
