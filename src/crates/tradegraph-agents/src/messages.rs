//! Channel message validation
//!
//! Chat providers reject message sequences that break the tool-calling
//! protocol: a `tool` message must answer a preceding assistant message's
//! tool call, and every requested call must be answered before the next
//! assistant turn. Channels accumulate messages from retries and partial
//! failures, so each analyst iteration repairs its channel before calling
//! the model:
//!
//! - An AI message with tool calls collects its matching tool responses;
//!   missing ids are synthesized as `"Tool execution completed"` stubs.
//! - An orphaned tool message (no preceding tool call) is rewritten into a
//!   human message carrying `"Tool result: …"`.
//!
//! The repair is idempotent: validating an already-valid sequence returns it
//! unchanged.

use tradegraph_llm::messages::{Message, MessageRole};

/// Synthesized content for tool calls that never received a response.
pub const MISSING_TOOL_STUB: &str = "Tool execution completed";

/// Repair a message sequence for tool soundness.
pub fn validate_message_sequence(messages: Vec<Message>) -> Vec<Message> {
    if messages.is_empty() {
        return messages;
    }

    let mut validated: Vec<Message> = Vec::with_capacity(messages.len());
    let mut i = 0;

    while i < messages.len() {
        let msg = &messages[i];

        if msg.is_ai() && msg.has_tool_calls() {
            validated.push(msg.clone());
            i += 1;

            let mut expected: Vec<String> = msg
                .get_tool_calls()
                .unwrap_or_default()
                .iter()
                .map(|c| c.id.clone())
                .collect();

            // Collect the run of tool responses answering this message.
            while i < messages.len() && messages[i].is_tool() {
                let tool_msg = &messages[i];
                if let Some(id) = &tool_msg.tool_call_id {
                    if let Some(pos) = expected.iter().position(|e| e == id) {
                        expected.remove(pos);
                        validated.push(tool_msg.clone());
                    } else {
                        tracing::warn!(tool_call_id = %id, "dropping tool message with unexpected id");
                    }
                }
                i += 1;
            }

            for missing in expected {
                tracing::warn!(tool_call_id = %missing, "synthesizing stub for unanswered tool call");
                validated.push(Message::tool(MISSING_TOOL_STUB, missing));
            }
            continue;
        }

        if msg.is_tool() {
            let prev_has_calls = validated
                .last()
                .map(|prev| prev.has_tool_calls() || prev.is_tool())
                .unwrap_or(false);

            if prev_has_calls {
                validated.push(msg.clone());
            } else {
                tracing::warn!("rewriting orphaned tool message into human message");
                validated.push(Message::human(format!("Tool result: {}", msg.content)));
            }
            i += 1;
            continue;
        }

        validated.push(msg.clone());
        i += 1;
    }

    validated
}

/// Deserialize a channel value into messages, tolerating missing fields.
pub fn messages_from_value(value: &serde_json::Value) -> Vec<Message> {
    match value {
        serde_json::Value::Array(_) => {
            serde_json::from_value(value.clone()).unwrap_or_default()
        }
        _ => Vec::new(),
    }
}

/// True when the channel contains at least one tool-result message.
pub fn has_tool_results(messages: &[Message]) -> bool {
    messages.iter().any(|m| m.is_tool())
}

/// Last AI message content, if any is non-empty.
pub fn last_ai_content(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == MessageRole::Ai && !m.content.is_empty())
        .map(|m| m.content.as_str())
}
