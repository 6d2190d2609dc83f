//! Task-aware provider selection
//!
//! The router classifies a request (task type and complexity), looks up the
//! preferred provider in a configurable table and, when that provider is not
//! available, ranks the available ones by suitability. It only reads the
//! gateway's provider view; health stays owned by the gateway.
//!
//! # Module Structure
//!
//! - `types`: `TaskType`, `Complexity`, `TaskAnalysis`, `ModelSelection`
//! - `classify`: keyword classification and complexity scoring
//! - `config`: `RouterConfig` and the preference table

mod classify;
mod config;
mod types;


pub use classify::{assess_complexity, classify_task};
pub use config::{RouterConfig, TierPreference};
pub use types::{Complexity, ModelSelection, TaskAnalysis, TaskType};

use crate::gateway::{Gateway, ProviderDescriptor};
use crate::token::estimate_tokens;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

/// Confidence when the preference table matched
pub const TABLE_CONFIDENCE: f64 = 0.9;

/// Confidence for a suitability-ranked fallback
pub const RANKED_CONFIDENCE: f64 = 0.6;

/// Confidence when no available provider fits and every configured one is ranked
pub const DEGRADED_CONFIDENCE: f64 = 0.3;

const MAX_FALLBACK_OPTIONS: usize = 2;

/// How the primary provider was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Basis {
    Table,
    Ranked,
    Degraded,
}

impl Basis {
    fn confidence(self) -> f64 {
        match self {
            Self::Table => TABLE_CONFIDENCE,
            Self::Ranked => RANKED_CONFIDENCE,
            Self::Degraded => DEGRADED_CONFIDENCE,
        }
    }
}

/// Selects a provider per request
pub struct TaskRouter {
    config: RouterConfig,
    gateway: Arc<Gateway>,
}

impl TaskRouter {
    /// Create a router over the gateway's provider view
    #[must_use]
    pub fn new(config: RouterConfig, gateway: Arc<Gateway>) -> Self {
        Self { config, gateway }
    }

    /// Router configuration
    #[must_use]
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Whether a selection is confident enough to reorder the gateway
    #[must_use]
    pub fn is_confident(&self, selection: &ModelSelection) -> bool {
        selection.confidence >= self.config.min_confidence
    }

    /// Pick a provider for the request
    ///
    /// Returns `None` only when no provider is configured at all.
    #[must_use]
    pub fn select_model(
        &self,
        task: Option<&str>,
        input: &str,
        context: &[String],
    ) -> Option<ModelSelection> {
        let configured = self.gateway.descriptors();
        if configured.is_empty() {
            return None;
        }

        let task_type = classify_task(task, input);
        let (complexity_score, complexity) = assess_complexity(task_type, input, context);
        let estimated_tokens =
            estimate_tokens(input) + context.iter().map(|c| estimate_tokens(c)).sum::<usize>();

        let available: Vec<ProviderDescriptor> = self
            .gateway
            .available_providers()
            .into_iter()
            .filter(|d| d.max_input_tokens >= estimated_tokens)
            .collect();

        let preferred = self.config.preferred(task_type, complexity);
        let (candidates, basis) = if available.is_empty() {
            (configured, Basis::Degraded)
        } else if preferred.is_some_and(|p| available.iter().any(|d| d.name == p)) {
            (available, Basis::Table)
        } else {
            (available, Basis::Ranked)
        };
        let confidence = basis.confidence();

        let mut ranked = candidates;
        ranked.sort_by(|a, b| {
            suitability(b, task_type, complexity)
                .partial_cmp(&suitability(a, task_type, complexity))
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.priority.cmp(&b.priority))
                .then_with(|| a.name.cmp(&b.name))
        });

        let primary_index = match (basis, preferred) {
            (Basis::Table, Some(p)) => ranked.iter().position(|d| d.name == p).unwrap_or(0),
            _ => 0,
        };
        let primary = ranked.remove(primary_index);
        let fallback_options: Vec<String> = ranked
            .iter()
            .take(MAX_FALLBACK_OPTIONS)
            .map(|d| d.name.clone())
            .collect();

        let estimated_cost = primary.cost_for(estimated_tokens as u64);
        let rationale = match basis {
            Basis::Table => format!("preferred provider for {task_type} at {complexity} complexity"),
            Basis::Ranked => format!(
                "preferred provider {} unavailable; highest suitability for {task_type}",
                preferred.unwrap_or("none")
            ),
            Basis::Degraded => {
                "no available provider fits; ranked all configured providers".to_string()
            }
        };
        let reasoning = format!(
            "Task classified as {task_type} ({complexity} complexity, score {complexity_score}, ~{estimated_tokens} tokens); selected {} because {rationale}",
            primary.name
        );

        debug!(
            task_type = %task_type,
            complexity = %complexity,
            provider = %primary.name,
            confidence,
            fallbacks = ?fallback_options,
            "Model selected"
        );

        Some(ModelSelection {
            provider: primary.name.clone(),
            model: primary.model.clone(),
            reasoning,
            estimated_cost,
            fallback_options,
            confidence,
            analysis: TaskAnalysis {
                task_type,
                complexity,
                complexity_score,
                estimated_tokens,
                estimated_cost,
                provider: primary.name,
                rationale,
            },
        })
    }
}

/// Cheapness bonus in `[0, scale]`; free providers get the full bonus
fn cheapness(descriptor: &ProviderDescriptor, scale: f64) -> f64 {
    scale / (1.0 + descriptor.cost_per_1k_tokens * 100.0)
}

/// Suitability of a provider for a task type and complexity
#[must_use]
pub fn suitability(
    descriptor: &ProviderDescriptor,
    task_type: TaskType,
    complexity: Complexity,
) -> f64 {
    let capability = f64::from(descriptor.capability);
    let base = capability * 10.0;

    #[allow(clippy::cast_precision_loss)]
    let context_size = (descriptor.max_input_tokens as f64 / 10_000.0).min(20.0);

    let task_bonus = match task_type {
        TaskType::Search => cheapness(descriptor, 20.0),
        TaskType::Analysis | TaskType::Writing => capability * 3.0,
        TaskType::Summarization => context_size,
        TaskType::General => cheapness(descriptor, 10.0),
    };

    let complexity_bonus = match complexity {
        Complexity::Low => cheapness(descriptor, 10.0),
        Complexity::Medium => 5.0,
        Complexity::High => capability * 2.0 + context_size / 2.0,
    };

    base + task_bonus + complexity_bonus
}
