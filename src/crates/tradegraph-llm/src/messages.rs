//! Message types for agent ↔ model communication
//!
//! Messages model the conversation history inside each analyst's channel and
//! the payloads exchanged with chat providers. The shape follows the common
//! chat-completions format: human/system/ai/tool roles, with AI messages
//! optionally carrying [`ToolCall`]s and tool messages answering them by
//! `tool_call_id`.
//!
//! # Tool calling flow
//!
//! ```text
//! Human  ── "analyze AAPL" ──────────────────────────┐
//! AI     ── tool_calls: [{id: "1", name: "quote"}] ──┤  one channel,
//! Tool   ── tool_call_id: "1", content: "..." ───────┤  append-only
//! AI     ── final report text ───────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Unique id within the message; tool results answer by this id
    pub id: String,
    /// Registered tool name
    pub name: String,
    /// Arguments as a JSON object
    pub args: Value,
}

impl ToolCall {
    /// Create a new tool call.
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }
}

/// Message role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User / upstream instruction
    Human,
    /// Model output, possibly with tool calls
    Ai,
    /// System prompt
    System,
    /// Tool execution result
    Tool,
}

/// One message in a channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Role discriminator
    #[serde(rename = "type")]
    pub role: MessageRole,

    /// Message text
    pub content: String,

    /// Set on tool messages: the id of the call being answered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Set on AI messages that request tool execution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// Optional originator name (tool name on tool messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
            name: None,
        }
    }

    /// Create a human message.
    pub fn human(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Human, content)
    }

    /// Create an AI message.
    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Ai, content)
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a tool-result message answering `tool_call_id`.
    pub fn tool(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: content.into(),
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: None,
            name: None,
        }
    }

    /// Attach tool calls to an AI message.
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = Some(tool_calls);
        self
    }

    /// Attach an originator name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// True for AI messages.
    pub fn is_ai(&self) -> bool {
        self.role == MessageRole::Ai
    }

    /// True for tool messages.
    pub fn is_tool(&self) -> bool {
        self.role == MessageRole::Tool
    }

    /// True when this AI message requests at least one tool call.
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().map_or(false, |c| !c.is_empty())
    }

    /// Tool calls, if any.
    pub fn get_tool_calls(&self) -> Option<&[ToolCall]> {
        self.tool_calls.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_constructors_set_roles() {
        assert_eq!(Message::human("q").role, MessageRole::Human);
        assert_eq!(Message::ai("a").role, MessageRole::Ai);
        assert_eq!(Message::system("s").role, MessageRole::System);
        let tool = Message::tool("r", "call_1");
        assert_eq!(tool.role, MessageRole::Tool);
        assert_eq!(tool.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_tool_calls_helpers() {
        let msg = Message::ai("checking").with_tool_calls(vec![ToolCall::new(
            "1",
            "quote",
            json!({"ticker": "AAPL"}),
        )]);
        assert!(msg.has_tool_calls());
        assert_eq!(msg.get_tool_calls().unwrap()[0].name, "quote");

        let plain = Message::ai("done");
        assert!(!plain.has_tool_calls());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let msg = Message::tool("payload", "abc").with_name("quote");
        let encoded = serde_json::to_string(&msg).unwrap();
        let decoded: Message = serde_json::from_str(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_role_tag_is_type() {
        let encoded = serde_json::to_value(Message::human("hi")).unwrap();
        assert_eq!(encoded["type"], "human");
    }
}
