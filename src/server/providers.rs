//! Provider registration
//!
//! Builds the gateway from `[[providers]]` entries. Entries whose API key is
//! not set in the environment are skipped with a warning.

use super::config::{AppConfig, ProviderEntry, ProviderKind};
use anyhow::{bail, Context, Result};
use bastion_llm::{
    AnthropicConfig, AnthropicProvider, AttemptObserver, Gateway, MockProvider,
    OpenAiCompatConfig, OpenAiCompatProvider, SharedProvider,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of resolving one provider entry
pub enum Resolved {
    Ready(SharedProvider),
    MissingKey(String),
}

/// Build the provider for one entry
///
/// `lookup` reads environment variables; tests pass a closure.
pub fn resolve_provider(
    entry: &ProviderEntry,
    config: &AppConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Resolved> {
    let api_key = match &entry.api_key_env {
        Some(var) => match lookup(var).filter(|k| !k.trim().is_empty()) {
            Some(key) => key,
            None => return Ok(Resolved::MissingKey(var.clone())),
        },
        None => String::new(),
    };
    let timeout = config.gateway.timeout();

    let provider: SharedProvider = match entry.kind {
        ProviderKind::OpenaiCompat => {
            let mut upstream = OpenAiCompatConfig::new(&entry.name, api_key)
                .with_model(&entry.model)
                .with_timeout(timeout);
            if let Some(url) = &entry.base_url {
                upstream = upstream.with_base_url(url);
            }
            Arc::new(
                OpenAiCompatProvider::new(upstream)
                    .with_context(|| format!("Failed to create provider {}", entry.name))?,
            )
        }
        ProviderKind::Anthropic => {
            if api_key.is_empty() {
                bail!("Provider {} requires api_key_env", entry.name);
            }
            let mut upstream = AnthropicConfig::new(api_key)
                .with_name(&entry.name)
                .with_model(&entry.model)
                .with_timeout(timeout);
            if let Some(url) = &entry.base_url {
                upstream = upstream.with_base_url(url);
            }
            Arc::new(
                AnthropicProvider::new(upstream)
                    .with_context(|| format!("Failed to create provider {}", entry.name))?,
            )
        }
        ProviderKind::Mock => Arc::new(MockProvider::new(&entry.name).with_model(&entry.model)),
    };

    Ok(Resolved::Ready(provider))
}

/// Build the gateway from configuration and the process environment
pub fn build_gateway(config: &AppConfig, observer: Arc<dyn AttemptObserver>) -> Result<Gateway> {
    build_gateway_with(config, observer, |var| std::env::var(var).ok())
}

/// Build the gateway with a custom environment lookup
pub fn build_gateway_with(
    config: &AppConfig,
    observer: Arc<dyn AttemptObserver>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Gateway> {
    let mut builder = Gateway::builder(config.gateway).observer(observer);
    let mut registered = 0usize;

    for entry in &config.providers {
        match resolve_provider(entry, config, &lookup)? {
            Resolved::Ready(provider) => {
                builder = builder.provider(entry.descriptor(), provider);
                registered += 1;
                info!(
                    provider = %entry.name,
                    kind = %entry.kind,
                    priority = entry.priority,
                    "Registered provider"
                );
            }
            Resolved::MissingKey(var) => {
                warn!(provider = %entry.name, env = %var, "Skipping provider, API key not set");
            }
        }
    }

    if registered == 0 {
        warn!("No providers registered; every turn will fail until one is configured");
    }

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bastion_llm::NoopObserver;

    fn entry(name: &str, kind: ProviderKind, key_env: Option<&str>) -> ProviderEntry {
        ProviderEntry {
            name: name.to_string(),
            kind,
            model: format!("{name}-model"),
            api_key_env: key_env.map(str::to_string),
            base_url: None,
            priority: 1,
            max_input_tokens: None,
            cost_per_1k_tokens: 0.0,
            capability: None,
        }
    }

    #[test]
    fn test_missing_key_skips_provider() {
        let config = AppConfig {
            providers: vec![
                entry("groq", ProviderKind::OpenaiCompat, Some("GROQ_KEY")),
                entry("local", ProviderKind::Mock, None),
            ],
            ..Default::default()
        };

        let gateway = build_gateway_with(&config, Arc::new(NoopObserver), |_| None).unwrap();
        assert!(!gateway.has_provider("groq"));
        assert!(gateway.has_provider("local"));
    }

    #[test]
    fn test_key_from_lookup() {
        let config = AppConfig {
            providers: vec![entry("anthropic", ProviderKind::Anthropic, Some("ANTHROPIC_KEY"))],
            ..Default::default()
        };

        let gateway = build_gateway_with(&config, Arc::new(NoopObserver), |var| {
            (var == "ANTHROPIC_KEY").then(|| "sk-ant-test-1234567890".to_string())
        })
        .unwrap();
        assert!(gateway.has_provider("anthropic"));
        assert!(gateway
            .identity_terms()
            .contains(&"anthropic-model".to_string()));
    }

    #[test]
    fn test_anthropic_requires_key_env() {
        let config = AppConfig::default();
        let result = resolve_provider(
            &entry("anthropic", ProviderKind::Anthropic, None),
            &config,
            |_| None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_blank_key_is_missing() {
        let config = AppConfig::default();
        let resolved = resolve_provider(
            &entry("openai", ProviderKind::OpenaiCompat, Some("OPENAI_KEY")),
            &config,
            |_| Some("   ".to_string()),
        )
        .unwrap();
        assert!(matches!(resolved, Resolved::MissingKey(var) if var == "OPENAI_KEY"));
    }
}
