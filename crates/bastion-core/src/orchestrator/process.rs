//! Turn handling
//!
//! Stage order: checkpoint, input safety, budget enforcement, cache lookup,
//! routing, gateway call, output safety, cache store. Stages report through
//! [`StageOutcome`]; a recoverable failure falls back to the latest
//! checkpoint, anything else ends the turn with a fixed apology.

use super::core::Orchestrator;
use super::types::{StageOutcome, TurnReply, TurnRequest, TurnResponse, TurnStatus, TurnUsage};
use crate::cache::{fingerprint, CacheCategory};
use crate::checkpoint::CheckpointSnapshot;
use crate::error::{user_facing_text, Error};
use bastion_llm::message::last_user_index;
use bastion_llm::{CallOptions, CompletionRequest, Message, MessageRole, SafetyFilter, ToolCall};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

/// Cached form of a plain message reply
#[derive(Debug, Serialize, Deserialize)]
struct CachedReply {
    content: String,
}

/// Resource content after budget enforcement
struct PreparedResources {
    text: Option<String>,
    truncated: bool,
    history: Vec<Message>,
}

impl Orchestrator {
    /// Run one conversational turn
    ///
    /// Never fails: every error path ends in a `Blocked`, `Recovered` or
    /// `Failed` response with fixed, user-safe text.
    #[instrument(skip(self, request), fields(
        thread_id = request.thread_id.as_deref().unwrap_or("-"),
        messages = request.messages.len()
    ))]
    pub async fn handle_turn(&self, request: TurnRequest) -> TurnResponse {
        let checkpoint_id = match &request.thread_id {
            Some(thread_id) => {
                let mut snapshot =
                    CheckpointSnapshot::new(request.state.clone(), request.messages.clone());
                snapshot.model = request.model_hint.clone();
                self.checkpoints
                    .checkpoint(thread_id, snapshot)
                    .await
                    .map(|c| c.id)
            }
            None => None,
        };

        let outcome = match self.screen_input(&request.messages) {
            StageOutcome::Success(Some(messages)) => self.run(&request, messages).await,
            StageOutcome::Success(None) => {
                let mut response = TurnResponse::new(
                    TurnReply::message(self.config.blocked_message.clone()),
                    TurnStatus::Blocked,
                );
                response.checkpoint_id = checkpoint_id;
                return response;
            }
            StageOutcome::Recoverable(e) => StageOutcome::Recoverable(e),
            StageOutcome::Fatal(e) => StageOutcome::Fatal(e),
        };

        let mut response = match outcome {
            StageOutcome::Success(response) => response,
            StageOutcome::Recoverable(error) => {
                self.recover(request.thread_id.as_deref(), error).await
            }
            StageOutcome::Fatal(error) => self.fail(&error).await,
        };
        response.checkpoint_id = checkpoint_id;
        response
    }

    /// Screen the latest user message
    ///
    /// `Success(None)` means the input is blocked.
    fn screen_input(&self, messages: &[Message]) -> StageOutcome<Option<Vec<Message>>> {
        let Some(index) = last_user_index(messages) else {
            return StageOutcome::Fatal(Error::InvalidRequest(
                "conversation has no user message".to_string(),
            ));
        };

        let validation = self.input_safety.validate_input(&messages[index].content);
        if validation.blocked {
            info!(
                issues = validation.issues.len(),
                severity = ?validation.severity,
                "Input blocked by safety filter"
            );
            return StageOutcome::Success(None);
        }
        if !validation.is_valid {
            debug!(issues = validation.issues.len(), "Input sanitized");
        }

        let mut screened = messages.to_vec();
        screened[index].content = validation.sanitized_text;
        StageOutcome::Success(Some(screened))
    }

    /// Fit resource content into the token budget alongside the history
    fn prepare_resources(
        &self,
        resources: &[String],
        messages: Vec<Message>,
    ) -> StageOutcome<PreparedResources> {
        let joined = resources
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        if joined.is_empty() {
            return StageOutcome::Success(PreparedResources {
                text: None,
                truncated: false,
                history: messages,
            });
        }

        let context: Vec<String> = messages.iter().map(|m| m.content.clone()).collect();
        let (check, history) = match self.budget.validate_and_chunk(&joined, &context) {
            Ok(check) => (check, messages),
            Err(bastion_llm::Error::ContextTooLarge { context_tokens, .. }) => {
                // Keep system instructions and the latest user message only
                let trimmed = trim_history(&messages);
                debug!(
                    context_tokens,
                    kept = trimmed.len(),
                    "History exceeds token budget, trimmed"
                );
                let context: Vec<String> = trimmed.iter().map(|m| m.content.clone()).collect();
                match self.budget.validate_and_chunk(&joined, &context) {
                    Ok(check) => (check, trimmed),
                    Err(e) => return StageOutcome::from_error(Error::Llm(e)),
                }
            }
            Err(e) => return StageOutcome::from_error(Error::Llm(e)),
        };

        if check.within_budget {
            return StageOutcome::Success(PreparedResources {
                text: Some(joined),
                truncated: false,
                history,
            });
        }

        let total = check.chunks.len();
        let Some(first) = check.chunks.into_iter().next() else {
            return StageOutcome::Success(PreparedResources {
                text: None,
                truncated: true,
                history,
            });
        };
        info!(chunks = total, "Resource content truncated to first chunk");
        StageOutcome::Success(PreparedResources {
            text: Some(format!("{}\n\n{}", first, self.config.truncation_note)),
            truncated: true,
            history,
        })
    }

    /// Budget, cache, route, call, filter, store
    async fn run(&self, request: &TurnRequest, messages: Vec<Message>) -> StageOutcome<TurnResponse> {
        let prepared = match self.prepare_resources(&request.resources, messages) {
            StageOutcome::Success(prepared) => prepared,
            StageOutcome::Recoverable(e) => return StageOutcome::Recoverable(e),
            StageOutcome::Fatal(e) => return StageOutcome::Fatal(e),
        };

        let mut messages = prepared.history;
        if let Some(text) = &prepared.text {
            let at = last_user_index(&messages).unwrap_or(messages.len());
            messages.insert(
                at,
                Message::system(format!("{}\n\n{}", self.config.resource_preamble, text)),
            );
        }

        let cache_enabled = self.cache.config().enabled;
        let key = fingerprint(&messages, request.model_hint.as_deref());
        if cache_enabled {
            if let Some(payload) = self.cache.get(&key, CacheCategory::ProviderResponse).await {
                match serde_json::from_value::<CachedReply>(payload) {
                    Ok(cached) => {
                        debug!("Serving cached reply");
                        let mut response =
                            TurnResponse::new(TurnReply::message(cached.content), TurnStatus::Cached);
                        response.truncated = prepared.truncated;
                        return StageOutcome::Success(response);
                    }
                    Err(e) => warn!(error = %e, "Ignoring malformed cache payload"),
                }
            }
        }

        let options = self.call_options(request, &messages);
        let mut completion = CompletionRequest::new(messages);
        if !request.tools.is_empty() {
            completion = completion.with_tools(request.tools.clone());
        }

        let response = match self.gateway.call(completion, &options).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Gateway call failed");
                return StageOutcome::from_error(Error::Llm(e));
            }
        };

        let content = self.output_safety.validate_output(&response.content);
        let usage = TurnUsage {
            tokens: response.tokens_used,
            cost: response.cost,
            duration_ms: response.duration_ms,
        };

        let reply = if response.tool_calls.is_empty() {
            if cache_enabled {
                let cached = CachedReply {
                    content: content.clone(),
                };
                match serde_json::to_value(cached) {
                    Ok(payload) => {
                        self.cache
                            .set(&key, payload, CacheCategory::ProviderResponse)
                            .await;
                    }
                    Err(e) => warn!(error = %e, "Failed to encode reply for cache"),
                }
            }
            TurnReply::message(content)
        } else {
            TurnReply::ToolInvocation {
                calls: screen_tool_calls(&self.output_safety, response.tool_calls),
                content,
            }
        };

        let mut turn = TurnResponse::new(reply, TurnStatus::Completed);
        turn.usage = Some(usage);
        turn.truncated = prepared.truncated;
        StageOutcome::Success(turn)
    }

    /// Provider order: a hint naming a configured provider first, then the
    /// router's choice when it is confident, then gateway priority
    fn call_options(&self, request: &TurnRequest, messages: &[Message]) -> CallOptions {
        let mut order: Vec<String> = Vec::new();

        if let Some(hint) = &request.model_hint {
            if self.gateway.has_provider(hint) {
                order.push(hint.clone());
            } else {
                debug!(hint = %hint, "Model hint does not name a configured provider");
            }
        }

        let input = last_user_index(messages)
            .map(|i| messages[i].content.as_str())
            .unwrap_or_default();
        if let Some(selection) =
            self.router
                .select_model(request.task.as_deref(), input, &request.resources)
        {
            if self.router.is_confident(&selection) {
                for name in selection.preferred_order() {
                    if !order.contains(&name) {
                        order.push(name);
                    }
                }
            } else {
                debug!(
                    confidence = selection.confidence,
                    "Routing confidence too low, keeping gateway order"
                );
            }
        }

        CallOptions::prefer(order)
    }

    /// Fall back to the latest checkpoint
    async fn recover(&self, thread_id: Option<&str>, error: Error) -> TurnResponse {
        let Some(thread_id) = thread_id else {
            return self.fail(&error).await;
        };

        match self.checkpoints.recover(thread_id, failure_summary(&error)).await {
            Ok(Some(state)) => {
                info!(
                    checkpoint_id = %state.checkpoint_id,
                    "Turn recovered from checkpoint"
                );
                let mut response = TurnResponse::new(
                    TurnReply::message(self.config.recovery_message.clone()),
                    TurnStatus::Recovered,
                );
                response.recovered = Some(state);
                response
            }
            Ok(None) => self.fail(&error).await,
            Err(recovery_error) => {
                warn!(error = %recovery_error, "Checkpoint recovery failed");
                self.fail(&error).await
            }
        }
    }

    async fn fail(&self, error: &Error) -> TurnResponse {
        warn!(error = %error, "Turn failed");
        self.metrics.record_turn_failure().await;
        TurnResponse::new(TurnReply::message(user_facing_text(error)), TurnStatus::Failed)
    }
}

/// Keep system messages and the latest user message
fn trim_history(messages: &[Message]) -> Vec<Message> {
    let last_user = last_user_index(messages);
    messages
        .iter()
        .enumerate()
        .filter(|(i, m)| m.role == MessageRole::System || Some(*i) == last_user)
        .map(|(_, m)| m.clone())
        .collect()
}

/// Failure description for the recovery note; no upstream detail
fn failure_summary(error: &Error) -> &'static str {
    match error {
        Error::Llm(e) if e.is_exhausted() => "no upstream provider could produce a reply",
        Error::Llm(bastion_llm::Error::ContextTooLarge { .. }) => {
            "the conversation exceeded the token budget"
        }
        Error::Store(_) => "the state store was unavailable",
        _ => "an internal error interrupted the turn",
    }
}

/// Run output screening over every string inside the tool call arguments
///
/// Arguments that are not valid JSON are screened as plain text.
fn screen_tool_calls(safety: &SafetyFilter, calls: Vec<ToolCall>) -> Vec<ToolCall> {
    calls
        .into_iter()
        .map(|mut call| {
            call.arguments = match serde_json::from_str::<Value>(&call.arguments) {
                Ok(mut value) => {
                    screen_value(safety, &mut value);
                    value.to_string()
                }
                Err(_) => safety.validate_output(&call.arguments),
            };
            call
        })
        .collect()
}

fn screen_value(safety: &SafetyFilter, value: &mut Value) {
    match value {
        Value::String(text) => *text = safety.validate_output(text),
        Value::Array(items) => items.iter_mut().for_each(|v| screen_value(safety, v)),
        Value::Object(map) => map.values_mut().for_each(|v| screen_value(safety, v)),
        _ => {}
    }
}
