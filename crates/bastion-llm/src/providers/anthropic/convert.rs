use super::types::{
    AnthropicContent, AnthropicMessage, AnthropicResponse, AnthropicTool, ContentBlock,
    ResponseContentBlock,
};
use crate::completion::{CompletionResponse, TokenUsage};
use crate::message::{Message, MessageRole};
use crate::tools::{ToolCall, ToolDefinition};

/// Convert messages to Anthropic format, returning the system prompt separately
pub(crate) fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<AnthropicMessage>) {
    let mut system_parts = Vec::new();
    let mut anthropic_messages = Vec::new();

    for msg in messages {
        match msg.role {
            MessageRole::System => {
                if !msg.content.is_empty() {
                    system_parts.push(msg.content.clone());
                }
            }
            MessageRole::User => anthropic_messages.push(AnthropicMessage {
                role: "user",
                content: AnthropicContent::Text(msg.content.clone()),
            }),
            MessageRole::Assistant => anthropic_messages.push(AnthropicMessage {
                role: "assistant",
                content: AnthropicContent::Text(msg.content.clone()),
            }),
            MessageRole::Tool => {
                // tool results without an id cannot be attached to a call
                if let Some(tool_call_id) = &msg.tool_call_id {
                    anthropic_messages.push(AnthropicMessage {
                        role: "user",
                        content: AnthropicContent::Blocks(vec![ContentBlock::ToolResult {
                            tool_use_id: tool_call_id.clone(),
                            content: msg.content.clone(),
                        }]),
                    });
                }
            }
        }
    }

    let system = (!system_parts.is_empty()).then(|| system_parts.join("\n\n"));
    (system, anthropic_messages)
}

/// Convert tool definition to Anthropic format
pub(crate) fn convert_tool(tool: &ToolDefinition) -> AnthropicTool {
    AnthropicTool {
        name: tool.name.clone(),
        description: tool.description.clone(),
        input_schema: tool.parameters.clone(),
    }
}

/// Collapse content blocks into text plus tool calls
pub(crate) fn convert_response(response: AnthropicResponse) -> CompletionResponse {
    let mut text = Vec::new();
    let mut tool_calls = Vec::new();

    for block in response.content {
        match block {
            ResponseContentBlock::Text { text: t } => text.push(t),
            ResponseContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                id,
                name,
                arguments: input.to_string(),
            }),
            ResponseContentBlock::Other => {}
        }
    }

    CompletionResponse {
        content: text.join(""),
        tool_calls,
        usage: Some(TokenUsage {
            prompt_tokens: response.usage.input_tokens,
            completion_tokens: response.usage.output_tokens,
            total_tokens: response.usage.input_tokens + response.usage.output_tokens,
        }),
        finish_reason: response.stop_reason,
        model: response.model,
    }
}
