//! Server configuration types
//!
//! One section per component; every section falls back to the component's
//! own defaults so a partial file is enough.

use bastion_core::{CacheConfig, CheckpointConfig, MetricsConfig, OrchestratorConfig};
use bastion_llm::{
    GatewayConfig, ProviderDescriptor, RouterConfig, SafetyConfig, TokenBudgetConfig,
};
use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub token_budget: TokenBudgetConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 19530,
        }
    }
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    /// Use the in-process store instead of Redis
    #[serde(default)]
    pub use_memory: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            use_memory: false,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

/// Upstream API flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Any `/chat/completions` endpoint
    OpenaiCompat,
    /// Anthropic messages API
    Anthropic,
    /// Scripted local provider answering every request
    Mock,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::OpenaiCompat => "openai_compat",
            Self::Anthropic => "anthropic",
            Self::Mock => "mock",
        };
        write!(f, "{s}")
    }
}

/// One `[[providers]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub name: String,
    pub kind: ProviderKind,
    pub model: String,
    /// Environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub max_input_tokens: Option<usize>,
    #[serde(default)]
    pub cost_per_1k_tokens: f64,
    #[serde(default)]
    pub capability: Option<u8>,
}

impl ProviderEntry {
    /// Gateway descriptor for this entry
    pub fn descriptor(&self) -> ProviderDescriptor {
        let mut descriptor = ProviderDescriptor::new(&self.name, &self.model)
            .with_priority(self.priority)
            .with_cost_per_1k(self.cost_per_1k_tokens);
        if let Some(max) = self.max_input_tokens {
            descriptor = descriptor.with_max_input_tokens(max);
        }
        if let Some(capability) = self.capability {
            descriptor = descriptor.with_capability(capability);
        }
        descriptor
    }
}
