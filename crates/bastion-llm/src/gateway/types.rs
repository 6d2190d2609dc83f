//! Gateway data types

use crate::tools::ToolCall;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Static description of a configured upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Unique provider name
    pub name: String,
    /// Model identifier sent upstream
    pub model: String,
    /// Priority rank (lower = preferred)
    #[serde(default)]
    pub priority: u32,
    /// Largest request (estimated tokens) this provider accepts
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,
    /// Cost estimate per 1K tokens
    #[serde(default)]
    pub cost_per_1k_tokens: f64,
    /// Relative quality, 1-10
    #[serde(default = "default_capability")]
    pub capability: u8,
}

fn default_max_input_tokens() -> usize {
    crate::token::DEFAULT_TOKEN_BUDGET
}

fn default_capability() -> u8 {
    5
}

impl ProviderDescriptor {
    /// Create a descriptor with defaults for everything but name and model
    #[must_use]
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            priority: 0,
            max_input_tokens: default_max_input_tokens(),
            cost_per_1k_tokens: 0.0,
            capability: default_capability(),
        }
    }

    /// Set priority
    #[must_use]
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Set max input tokens
    #[must_use]
    pub fn with_max_input_tokens(mut self, max_input_tokens: usize) -> Self {
        self.max_input_tokens = max_input_tokens;
        self
    }

    /// Set cost per 1K tokens
    #[must_use]
    pub fn with_cost_per_1k(mut self, cost: f64) -> Self {
        self.cost_per_1k_tokens = cost;
        self
    }

    /// Set capability weight (clamped to 1-10)
    #[must_use]
    pub fn with_capability(mut self, capability: u8) -> Self {
        self.capability = capability.clamp(1, 10);
        self
    }

    /// Estimated cost for `tokens`
    #[must_use]
    pub fn cost_for(&self, tokens: u64) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let tokens = tokens as f64;
        tokens / 1000.0 * self.cost_per_1k_tokens
    }
}

/// Gateway configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Seconds an unhealthy provider is skipped before re-enable
    pub cooldown_secs: u64,
    /// Upper bound for one upstream call
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 300,
            timeout_secs: 30,
        }
    }
}

impl GatewayConfig {
    /// Cooldown as a duration
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    /// Call timeout as a duration
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Per-call options
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Provider names to try first, in order; the rest follow by priority
    pub preferred_order: Vec<String>,
}

impl CallOptions {
    /// Prefer the given providers
    #[must_use]
    pub fn prefer<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            preferred_order: names.into_iter().map(Into::into).collect(),
        }
    }
}

/// Successful gateway call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayResponse {
    /// Generated text
    pub content: String,
    /// Tool calls requested by the provider
    pub tool_calls: Vec<ToolCall>,
    /// Provider that answered
    pub provider_used: String,
    /// Model that answered
    pub model: String,
    /// Tokens consumed
    pub tokens_used: u64,
    /// Estimated cost
    pub cost: f64,
    /// Wall time of the successful attempt
    pub duration_ms: u64,
}

/// Outcome of a single upstream attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestOutcome {
    /// When the attempt finished
    pub timestamp: DateTime<Utc>,
    /// Provider name
    pub provider: String,
    /// Model name
    pub model: String,
    /// Tokens consumed (0 on failure)
    pub tokens: u64,
    /// Estimated cost (0 on failure)
    pub cost: f64,
    /// Attempt wall time
    pub duration_ms: u64,
    /// Whether the attempt succeeded
    pub success: bool,
    /// Scrubbed error text on failure
    pub error: Option<String>,
}

impl RequestOutcome {
    /// Successful attempt finishing now
    #[must_use]
    pub fn success(
        provider: impl Into<String>,
        model: impl Into<String>,
        tokens: u64,
        cost: f64,
        duration_ms: u64,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            provider: provider.into(),
            model: model.into(),
            tokens,
            cost,
            duration_ms,
            success: true,
            error: None,
        }
    }

    /// Failed attempt finishing now
    #[must_use]
    pub fn failure(
        provider: impl Into<String>,
        model: impl Into<String>,
        duration_ms: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            provider: provider.into(),
            model: model.into(),
            tokens: 0,
            cost: 0.0,
            duration_ms,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Health snapshot of one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStatus {
    /// Provider configuration
    #[serde(flatten)]
    pub descriptor: ProviderDescriptor,
    /// Eligible for calls right now
    pub healthy: bool,
    /// Seconds left in the cooldown, if cooling down
    pub cooldown_remaining_secs: Option<u64>,
}
