//! Core trait for chat-based language models
//!
//! tradegraph is an orchestration engine, not an LLM client library: the
//! engine consumes this trait and stays provider-agnostic. The workspace
//! ships two implementations — an OpenAI-compatible remote client and a
//! deterministic scripted model for offline runs — and anything else can be
//! plugged in by implementing [`ChatModel`].

use crate::error::Result;
use crate::messages::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool advertised to the model: name, description, and a JSON schema for
/// its arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Globally unique tool name
    pub name: String,
    /// What the tool does, shown to the model
    pub description: String,
    /// JSON schema for the `args` object
    pub parameters: Value,
}

/// A chat request: conversation plus generation knobs.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// Conversation history, oldest first
    pub messages: Vec<Message>,
    /// Tools the model may call this turn
    pub tools: Vec<ToolDefinition>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Completion token cap
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    /// Build a request from messages.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    /// Bind tools for this turn.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Cap the completion length.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens
    pub input_tokens: u32,
    /// Completion tokens
    pub output_tokens: u32,
}

/// A complete model response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// The assistant message (may carry tool calls)
    pub message: Message,
    /// Token usage, when the provider reports it
    pub usage: Option<Usage>,
}

/// Chat-based language model.
///
/// Implementations must be `Send + Sync`; the scheduler shares one model
/// across concurrently running nodes via `Arc<dyn ChatModel>` and assumes no
/// request affinity.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate one complete response for the request.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Provider/model label for logging.
    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_builder() {
        let request = ChatRequest::new(vec![Message::human("hi")])
            .with_temperature(0.2)
            .with_max_tokens(512)
            .with_tools(vec![ToolDefinition {
                name: "quote".into(),
                description: "fetch a quote".into(),
                parameters: json!({"type": "object"}),
            }]);

        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.max_tokens, Some(512));
        assert_eq!(request.tools[0].name, "quote");
    }
}
