//! Scripted provider for tests and local development
//!
//! Replies are consumed from a queue; once it is empty the fallback reply is
//! used. `failing()` builds a provider that errors on every call.

use super::LlmProvider;
use crate::completion::{CompletionRequest, CompletionResponse, TokenUsage};
use crate::error::{Error, Result};
use crate::tools::ToolCall;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// One scripted reply
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Plain text answer
    Text(String),
    /// Tool calls with optional accompanying text
    ToolCalls(Vec<ToolCall>),
    /// Upstream API error
    Fail(String),
    /// Upstream rate limit
    RateLimited,
}

/// A provider that replays scripted replies
pub struct MockProvider {
    name: String,
    model: String,
    replies: Mutex<VecDeque<MockReply>>,
    fallback: MockReply,
    delay: Option<Duration>,
    usage: Option<TokenUsage>,
    calls: AtomicUsize,
    last_request: Mutex<Option<CompletionRequest>>,
}

impl MockProvider {
    /// Create a provider answering "mock response" on every call
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            model: format!("{name}-model"),
            name,
            replies: Mutex::new(VecDeque::new()),
            fallback: MockReply::Text("mock response".to_string()),
            delay: None,
            usage: Some(TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Create a provider that fails every call
    #[must_use]
    pub fn failing(name: impl Into<String>) -> Self {
        Self::new(name).with_fallback(MockReply::Fail("upstream unavailable".to_string()))
    }

    /// Set the model reported in responses
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Reply used once the queue is empty
    #[must_use]
    pub fn with_fallback(mut self, reply: MockReply) -> Self {
        self.fallback = reply;
        self
    }

    /// Sleep before answering (uses tokio time, so paused tests can advance it)
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Usage reported in successful responses (`None` = provider omits usage)
    #[must_use]
    pub fn with_usage(mut self, usage: Option<TokenUsage>) -> Self {
        self.usage = usage;
        self
    }

    /// Queue a reply
    pub fn push_reply(&self, reply: MockReply) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
    }

    /// Number of `complete` calls made so far
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent request received
    #[must_use]
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn next_reply(&self) -> MockReply {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn available_models(&self) -> Vec<String> {
        vec![self.model.clone()]
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap_or_else(|e| e.into_inner()) = Some(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let (content, tool_calls) = match self.next_reply() {
            MockReply::Text(text) => (text, Vec::new()),
            MockReply::ToolCalls(calls) => (String::new(), calls),
            MockReply::Fail(message) => return Err(Error::Api(message)),
            MockReply::RateLimited => return Err(Error::RateLimit),
        };

        Ok(CompletionResponse {
            content,
            tool_calls,
            usage: self.usage,
            finish_reason: Some("stop".to_string()),
            model: self.model.clone(),
        })
    }
}
