//! Orchestrator struct and builder

use super::config::OrchestratorConfig;
use crate::cache::{CacheConfig, ResponseCache};
use crate::checkpoint::{CheckpointConfig, CheckpointManager};
use crate::error::{Error, Result};
use crate::metrics::{MetricsCollector, MetricsConfig};
use crate::store::SharedStore;
use bastion_llm::{
    Gateway, RouterConfig, SafetyConfig, SafetyFilter, TaskRouter, TokenBudgetConfig,
    TokenBudgetValidator,
};
use std::sync::Arc;
use tracing::info;

/// The orchestration facade
///
/// One instance serves every turn; turns may run concurrently.
pub struct Orchestrator {
    pub(super) store: SharedStore,
    pub(super) gateway: Arc<Gateway>,
    pub(super) router: TaskRouter,
    pub(super) input_safety: SafetyFilter,
    pub(super) output_safety: SafetyFilter,
    pub(super) budget: TokenBudgetValidator,
    pub(super) cache: ResponseCache,
    pub(super) checkpoints: CheckpointManager,
    pub(super) metrics: Arc<MetricsCollector>,
    pub(super) config: OrchestratorConfig,
}

impl Orchestrator {
    /// Start building an orchestrator
    #[must_use]
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// Provider gateway
    #[must_use]
    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    /// Metrics collector
    #[must_use]
    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// Checkpoint manager
    #[must_use]
    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    /// Response cache
    #[must_use]
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Backing store
    #[must_use]
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Facade configuration
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Close the backing store
    ///
    /// # Errors
    ///
    /// Returns error if the store fails to close cleanly
    pub async fn shutdown(&self) -> Result<()> {
        self.store.close().await?;
        info!("Orchestrator shut down");
        Ok(())
    }
}

/// Builder for [`Orchestrator`]
///
/// The store and gateway are required; everything else has defaults.
#[derive(Default)]
pub struct OrchestratorBuilder {
    store: Option<SharedStore>,
    gateway: Option<Arc<Gateway>>,
    router: Option<TaskRouter>,
    router_config: RouterConfig,
    metrics: Option<Arc<MetricsCollector>>,
    metrics_config: MetricsConfig,
    safety_config: SafetyConfig,
    token_budget: TokenBudgetConfig,
    cache_config: CacheConfig,
    checkpoint_config: CheckpointConfig,
    config: OrchestratorConfig,
}

impl OrchestratorBuilder {
    /// Key-value store shared by cache, checkpoints and metrics
    #[must_use]
    pub fn store(mut self, store: SharedStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Provider gateway
    #[must_use]
    pub fn gateway(mut self, gateway: Arc<Gateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Prebuilt router; otherwise one is built over the gateway
    #[must_use]
    pub fn router(mut self, router: TaskRouter) -> Self {
        self.router = Some(router);
        self
    }

    /// Router configuration, used when no router is given
    #[must_use]
    pub fn router_config(mut self, config: RouterConfig) -> Self {
        self.router_config = config;
        self
    }

    /// Shared metrics collector, typically also the gateway's observer
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Metrics thresholds, used when no collector is given
    #[must_use]
    pub fn metrics_config(mut self, config: MetricsConfig) -> Self {
        self.metrics_config = config;
        self
    }

    /// Safety filter configuration
    #[must_use]
    pub fn safety_config(mut self, config: SafetyConfig) -> Self {
        self.safety_config = config;
        self
    }

    /// Token budget for resource content
    #[must_use]
    pub fn token_budget(mut self, config: TokenBudgetConfig) -> Self {
        self.token_budget = config;
        self
    }

    /// Cache TTLs
    #[must_use]
    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    /// Checkpoint retention
    #[must_use]
    pub fn checkpoint_config(mut self, config: CheckpointConfig) -> Self {
        self.checkpoint_config = config;
        self
    }

    /// Facade texts
    #[must_use]
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the orchestrator
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when the store or gateway is missing
    /// or a component configuration is invalid
    pub fn build(self) -> Result<Orchestrator> {
        let store = self.store.ok_or_else(|| Error::InvalidConfig {
            field: "store".to_string(),
            message: "a key-value store is required".to_string(),
        })?;
        let gateway = self.gateway.ok_or_else(|| Error::InvalidConfig {
            field: "gateway".to_string(),
            message: "a provider gateway is required".to_string(),
        })?;
        self.checkpoint_config.validate()?;

        let router = self
            .router
            .unwrap_or_else(|| TaskRouter::new(self.router_config, gateway.clone()));
        let metrics = self.metrics.unwrap_or_else(|| {
            Arc::new(MetricsCollector::new(store.clone(), self.metrics_config))
        });

        let input_safety = SafetyFilter::new(self.safety_config.clone());
        let output_safety =
            SafetyFilter::new(self.safety_config).with_provider_terms(gateway.identity_terms());

        info!(
            providers = gateway.descriptors().len(),
            budget = self.token_budget.max_tokens,
            "Orchestrator built"
        );

        Ok(Orchestrator {
            cache: ResponseCache::new(store.clone(), self.cache_config),
            checkpoints: CheckpointManager::new(store.clone(), self.checkpoint_config),
            budget: TokenBudgetValidator::new(self.token_budget),
            store,
            gateway,
            router,
            input_safety,
            output_safety,
            metrics,
            config: self.config,
        })
    }
}
