//! Router configuration and the task × complexity preference table

use super::types::{Complexity, TaskType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Preferred provider per complexity level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPreference {
    /// Provider for low complexity
    pub low: String,
    /// Provider for medium complexity
    pub medium: String,
    /// Provider for high complexity
    pub high: String,
}

impl TierPreference {
    fn new(low: &str, medium: &str, high: &str) -> Self {
        Self {
            low: low.to_string(),
            medium: medium.to_string(),
            high: high.to_string(),
        }
    }

    /// Provider for a complexity level
    #[must_use]
    pub fn for_complexity(&self, complexity: Complexity) -> &str {
        match complexity {
            Complexity::Low => &self.low,
            Complexity::Medium => &self.medium,
            Complexity::High => &self.high,
        }
    }
}

/// Router configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Minimum confidence for a selection to override gateway order
    pub min_confidence: f64,
    /// Task type → preferred provider per complexity
    pub preferences: HashMap<TaskType, TierPreference>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        let preferences = HashMap::from([
            (TaskType::Search, TierPreference::new("groq", "openai", "openai")),
            (
                TaskType::Writing,
                TierPreference::new("anthropic", "anthropic", "anthropic"),
            ),
            (
                TaskType::Analysis,
                TierPreference::new("anthropic", "anthropic", "anthropic"),
            ),
            (
                TaskType::Summarization,
                TierPreference::new("groq", "openai", "openai"),
            ),
            (TaskType::General, TierPreference::new("groq", "openai", "anthropic")),
        ]);

        Self {
            min_confidence: 0.5,
            preferences,
        }
    }
}

impl RouterConfig {
    /// Preferred provider for a task type and complexity
    #[must_use]
    pub fn preferred(&self, task_type: TaskType, complexity: Complexity) -> Option<&str> {
        self.preferences
            .get(&task_type)
            .map(|p| p.for_complexity(complexity))
    }
}
