//! Turn request and response types

use crate::checkpoint::RecoveredState;
use crate::error::Error;
use bastion_llm::{Message, ToolCall, ToolDefinition};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One conversational turn handed over by the workflow
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnRequest {
    /// Conversation so far, ending with the user's message
    pub messages: Vec<Message>,
    /// Thread to checkpoint under; no checkpoints without one
    #[serde(default)]
    pub thread_id: Option<String>,
    /// Provider the workflow would like to use
    #[serde(default)]
    pub model_hint: Option<String>,
    /// Fetched resource texts to ground the reply
    #[serde(default)]
    pub resources: Vec<String>,
    /// Task description, used for routing
    #[serde(default)]
    pub task: Option<String>,
    /// Tools the provider may call
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    /// Opaque workflow state for checkpointing
    #[serde(default)]
    pub state: Value,
}

impl TurnRequest {
    /// Create a request from a conversation
    #[must_use]
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// Set the thread ID
    #[must_use]
    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Set the provider hint
    #[must_use]
    pub fn with_model_hint(mut self, hint: impl Into<String>) -> Self {
        self.model_hint = Some(hint.into());
        self
    }

    /// Attach resource texts
    #[must_use]
    pub fn with_resources(mut self, resources: Vec<String>) -> Self {
        self.resources = resources;
        self
    }

    /// Set the task description
    #[must_use]
    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Offer tools
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Attach workflow state
    #[must_use]
    pub fn with_state(mut self, state: Value) -> Self {
        self.state = state;
        self
    }
}

/// What the workflow should do next
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnReply {
    /// The provider asked for tools to be run
    ToolInvocation {
        /// Requested calls
        calls: Vec<ToolCall>,
        /// Accompanying text, already filtered
        content: String,
    },
    /// Text for the user, already filtered
    Message {
        /// Message text
        content: String,
    },
}

impl TurnReply {
    /// Plain message reply
    #[must_use]
    pub fn message(content: impl Into<String>) -> Self {
        Self::Message {
            content: content.into(),
        }
    }

    /// Text carried by the reply
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::ToolInvocation { content, .. } | Self::Message { content } => content,
        }
    }

    /// Whether tools were requested
    #[must_use]
    pub fn is_tool_invocation(&self) -> bool {
        matches!(self, Self::ToolInvocation { .. })
    }
}

/// How the turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnStatus {
    /// Fresh reply from a provider
    Completed,
    /// Reply served from the cache
    Cached,
    /// Input refused by the safety filter
    Blocked,
    /// Upstream failed; state restored from a checkpoint
    Recovered,
    /// Nothing usable; generic apology
    Failed,
}

/// Usage of the upstream call that produced the reply
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnUsage {
    /// Tokens consumed
    pub tokens: u64,
    /// Estimated cost
    pub cost: f64,
    /// Upstream wall time
    pub duration_ms: u64,
}

/// Result of one turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnResponse {
    /// Reply for the workflow
    pub reply: TurnReply,
    /// Final status
    pub status: TurnStatus,
    /// Checkpoint written at the start of the turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<String>,
    /// State restored on `Recovered`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovered: Option<RecoveredState>,
    /// Upstream usage on `Completed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TurnUsage>,
    /// Whether resource content was cut to fit the token budget
    #[serde(default)]
    pub truncated: bool,
}

impl TurnResponse {
    pub(crate) fn new(reply: TurnReply, status: TurnStatus) -> Self {
        Self {
            reply,
            status,
            checkpoint_id: None,
            recovered: None,
            usage: None,
            truncated: false,
        }
    }
}

/// Result of one pipeline stage
#[derive(Debug)]
pub(crate) enum StageOutcome<T> {
    /// Stage produced its value
    Success(T),
    /// Stage failed; checkpoint recovery may help
    Recoverable(Error),
    /// Stage failed; recovery would not help
    Fatal(Error),
}

impl<T> StageOutcome<T> {
    /// Classify an error by whether recovery can help
    pub(crate) fn from_error(error: Error) -> Self {
        if error.is_recoverable() {
            Self::Recoverable(error)
        } else {
            Self::Fatal(error)
        }
    }
}
