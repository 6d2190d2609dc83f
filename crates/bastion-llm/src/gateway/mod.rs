//! Provider gateway
//!
//! Tries configured providers one at a time until one succeeds:
//!
//! - Default order is ascending priority; `CallOptions::preferred_order`
//!   moves named providers to the front.
//! - A provider that fails is marked unhealthy and skipped until its
//!   cooldown elapses, after which it is re-enabled without a health check call.
//! - Providers that cannot fit the request estimate are skipped but keep
//!   their health.
//! - Every upstream call is bounded by a timeout.
//!
//! When every candidate fails the call returns
//! [`Error::AllProvidersExhausted`](crate::Error::AllProvidersExhausted).
//!
//! # Module Structure
//!
//! - `types`: descriptors, options, responses, outcomes
//! - `health`: the owned health table
//! - `observer`: per-attempt telemetry hook

mod health;
mod observer;
mod types;

#[cfg(test)]
mod tests;

pub use health::ProviderHealth;
pub use observer::{AttemptObserver, NoopObserver};
pub use types::{
    CallOptions, GatewayConfig, GatewayResponse, ProviderDescriptor, ProviderStatus,
    RequestOutcome,
};

use crate::completion::{CompletionRequest, CompletionResponse};
use crate::error::{Error, Result};
use crate::providers::SharedProvider;
use crate::safety::SafetyFilter;
use crate::token::{estimate_message_tokens, TokenCounter};
use health::HealthTable;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

struct ProviderEntry {
    descriptor: ProviderDescriptor,
    provider: SharedProvider,
}

/// Builder for [`Gateway`]
pub struct GatewayBuilder {
    config: GatewayConfig,
    entries: Vec<ProviderEntry>,
    safety: SafetyFilter,
    observer: Arc<dyn AttemptObserver>,
}

impl GatewayBuilder {
    /// Register a provider; a later registration with the same name replaces
    /// the earlier one
    #[must_use]
    pub fn provider(mut self, descriptor: ProviderDescriptor, provider: SharedProvider) -> Self {
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|e| e.descriptor.name == descriptor.name)
        {
            warn!(provider = %descriptor.name, "Duplicate provider registration, replacing");
            *existing = ProviderEntry {
                descriptor,
                provider,
            };
        } else {
            self.entries.push(ProviderEntry {
                descriptor,
                provider,
            });
        }
        self
    }

    /// Filter used to scrub upstream error text
    #[must_use]
    pub fn safety(mut self, safety: SafetyFilter) -> Self {
        self.safety = safety;
        self
    }

    /// Receiver of per-attempt telemetry
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn AttemptObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Build the gateway
    #[must_use]
    pub fn build(mut self) -> Gateway {
        // stable: equal priorities keep registration order
        self.entries.sort_by_key(|e| e.descriptor.priority);
        let health = HealthTable::new(
            self.entries.iter().map(|e| e.descriptor.name.as_str()),
            self.config.cooldown(),
        );

        info!(
            providers = self.entries.len(),
            cooldown_secs = self.config.cooldown_secs,
            timeout_secs = self.config.timeout_secs,
            "Gateway initialized"
        );

        Gateway {
            config: self.config,
            entries: self.entries,
            health,
            safety: self.safety,
            observer: self.observer,
            counter: TokenCounter::new(),
        }
    }
}

/// Provider gateway with failover and health tracking
pub struct Gateway {
    config: GatewayConfig,
    entries: Vec<ProviderEntry>,
    health: HealthTable,
    safety: SafetyFilter,
    observer: Arc<dyn AttemptObserver>,
    counter: TokenCounter,
}

impl Gateway {
    /// Start building a gateway
    #[must_use]
    pub fn builder(config: GatewayConfig) -> GatewayBuilder {
        GatewayBuilder {
            config,
            entries: Vec::new(),
            safety: SafetyFilter::default(),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Gateway configuration
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Every configured provider, in priority order
    #[must_use]
    pub fn descriptors(&self) -> Vec<ProviderDescriptor> {
        self.entries.iter().map(|e| e.descriptor.clone()).collect()
    }

    /// Whether a provider with this name is configured
    #[must_use]
    pub fn has_provider(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.descriptor.name == name)
    }

    /// Providers currently eligible for calls, in priority order
    ///
    /// Providers whose cooldown has elapsed are re-enabled here.
    #[must_use]
    pub fn available_providers(&self) -> Vec<ProviderDescriptor> {
        self.entries
            .iter()
            .filter(|e| self.health.is_available(&e.descriptor.name))
            .map(|e| e.descriptor.clone())
            .collect()
    }

    /// Health snapshot of every provider
    #[must_use]
    pub fn provider_status(&self) -> Vec<ProviderStatus> {
        self.entries
            .iter()
            .map(|e| {
                let (healthy, remaining) = self.health.snapshot(&e.descriptor.name);
                ProviderStatus {
                    descriptor: e.descriptor.clone(),
                    healthy,
                    cooldown_remaining_secs: remaining.map(|d| d.as_secs().max(1)),
                }
            })
            .collect()
    }

    /// Provider and model names, for output redaction
    #[must_use]
    pub fn identity_terms(&self) -> Vec<String> {
        let mut terms: Vec<String> = self
            .entries
            .iter()
            .flat_map(|e| {
                let mut names = vec![e.descriptor.name.clone(), e.descriptor.model.clone()];
                names.extend(e.provider.available_models());
                names.push(e.provider.name().to_string());
                names
            })
            .collect();
        terms.sort();
        terms.dedup();
        terms
    }

    /// Candidate order for one call
    fn candidate_order(&self, options: &CallOptions) -> Vec<&ProviderEntry> {
        let mut order: Vec<&ProviderEntry> = Vec::with_capacity(self.entries.len());
        for name in &options.preferred_order {
            if let Some(entry) = self.entries.iter().find(|e| &e.descriptor.name == name) {
                if !order.iter().any(|o| o.descriptor.name == entry.descriptor.name) {
                    order.push(entry);
                }
            }
        }
        for entry in &self.entries {
            if !order.iter().any(|o| o.descriptor.name == entry.descriptor.name) {
                order.push(entry);
            }
        }
        order
    }

    /// Call providers in order until one succeeds
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllProvidersExhausted`] when every eligible provider
    /// failed or none was eligible.
    #[instrument(skip(self, request, options), fields(messages = request.messages.len()))]
    pub async fn call(
        &self,
        request: CompletionRequest,
        options: &CallOptions,
    ) -> Result<GatewayResponse> {
        let estimate = estimate_message_tokens(&request.messages);
        let mut attempted = Vec::new();

        for entry in self.candidate_order(options) {
            let descriptor = &entry.descriptor;

            if !self.health.is_available(&descriptor.name) {
                debug!(provider = %descriptor.name, "Skipping unhealthy provider");
                continue;
            }
            if descriptor.max_input_tokens < estimate {
                debug!(
                    provider = %descriptor.name,
                    estimate,
                    max_input_tokens = descriptor.max_input_tokens,
                    "Skipping provider, request too large"
                );
                continue;
            }

            attempted.push(descriptor.name.clone());
            let upstream = request.clone().with_model(descriptor.model.clone());
            let started = Instant::now();
            let result = tokio::time::timeout(self.config.timeout(), entry.provider.complete(upstream))
                .await
                .unwrap_or_else(|_| Err(Error::Timeout(self.config.timeout().as_millis() as u64)));
            let duration_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(response) => {
                    self.health.mark_success(&descriptor.name);
                    let tokens = self.tokens_used(&request, &response);
                    let cost = descriptor.cost_for(tokens);
                    let model = if response.model.is_empty() {
                        descriptor.model.clone()
                    } else {
                        response.model.clone()
                    };

                    self.observer
                        .on_attempt(&RequestOutcome::success(
                            &descriptor.name,
                            &model,
                            tokens,
                            cost,
                            duration_ms,
                        ))
                        .await;

                    info!(
                        provider = %descriptor.name,
                        attempts = attempted.len(),
                        tokens,
                        duration_ms,
                        "Gateway call succeeded"
                    );

                    return Ok(GatewayResponse {
                        content: response.content,
                        tool_calls: response.tool_calls,
                        provider_used: descriptor.name.clone(),
                        model,
                        tokens_used: tokens,
                        cost,
                        duration_ms,
                    });
                }
                Err(e) => {
                    self.health.mark_failure(&descriptor.name);
                    let error = self.safety.scrub_error(&e.to_string());
                    warn!(
                        provider = %descriptor.name,
                        duration_ms,
                        error = %error,
                        "Provider call failed, marked unhealthy"
                    );
                    self.observer
                        .on_attempt(&RequestOutcome::failure(
                            &descriptor.name,
                            &descriptor.model,
                            duration_ms,
                            error,
                        ))
                        .await;
                }
            }
        }

        warn!(attempted = ?attempted, "All providers exhausted");
        Err(Error::AllProvidersExhausted { attempted })
    }

    fn tokens_used(&self, request: &CompletionRequest, response: &CompletionResponse) -> u64 {
        match response.usage {
            Some(usage) => u64::from(usage.total_tokens),
            None => {
                let prompt = self.counter.count_conversation_tokens(&request.messages);
                let completion = self.counter.count_tokens(&response.content);
                (prompt + completion) as u64
            }
        }
    }
}
