//! Routing types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of work a request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Looking things up
    Search,
    /// Producing prose
    Writing,
    /// Reasoning over material
    Analysis,
    /// Condensing material
    Summarization,
    /// Anything else
    General,
}

impl TaskType {
    /// All task types
    pub const ALL: [TaskType; 5] = [
        Self::Search,
        Self::Writing,
        Self::Analysis,
        Self::Summarization,
        Self::General,
    ];

    /// Contribution of the task type to the complexity score
    #[must_use]
    pub fn base_weight(&self) -> u32 {
        match self {
            Self::Search => 0,
            Self::Summarization | Self::General => 1,
            Self::Writing => 2,
            Self::Analysis => 3,
        }
    }

    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Writing => "writing",
            Self::Analysis => "analysis",
            Self::Summarization => "summarization",
            Self::General => "general",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request complexity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    /// Short, simple requests
    Low,
    /// Typical requests
    Medium,
    /// Long or demanding requests
    High,
}

impl Complexity {
    /// Map a complexity score to a level
    #[must_use]
    pub fn from_score(score: u32) -> Self {
        match score {
            0..=2 => Self::Low,
            3..=4 => Self::Medium,
            _ => Self::High,
        }
    }

    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived per request, never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAnalysis {
    /// Classified task type
    pub task_type: TaskType,
    /// Assessed complexity
    pub complexity: Complexity,
    /// Raw complexity score
    pub complexity_score: u32,
    /// Estimated tokens of input plus context
    pub estimated_tokens: usize,
    /// Estimated cost with the chosen provider
    pub estimated_cost: f64,
    /// Chosen provider
    pub provider: String,
    /// Why the provider was chosen
    pub rationale: String,
}

/// Router decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSelection {
    /// Chosen provider name
    pub provider: String,
    /// Chosen provider's model
    pub model: String,
    /// Human-readable reasoning (internal, never shown to end users)
    pub reasoning: String,
    /// Estimated cost of the request
    pub estimated_cost: f64,
    /// Next providers by suitability, at most two
    pub fallback_options: Vec<String>,
    /// Confidence in the choice (0.0 - 1.0)
    pub confidence: f64,
    /// Underlying analysis
    pub analysis: TaskAnalysis,
}

impl ModelSelection {
    /// Provider order to hand to the gateway
    #[must_use]
    pub fn preferred_order(&self) -> Vec<String> {
        std::iter::once(self.provider.clone())
            .chain(self.fallback_options.iter().cloned())
            .collect()
    }
}
