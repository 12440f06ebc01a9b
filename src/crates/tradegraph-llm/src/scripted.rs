//! Deterministic scripted model
//!
//! Plays back pre-authored responses instead of calling a provider. Routing
//! is by substring match against the request's system/human text, so one
//! scripted model can serve every agent in a session: register a route per
//! agent role and queue its turns in order.
//!
//! Used by the offline mode of the server and by integration tests that
//! drive the full analysis graph without network access.

use crate::error::{LlmError, Result};
use crate::messages::Message;
use crate::traits::{ChatModel, ChatRequest, ChatResponse};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

struct Route {
    key: String,
    turns: VecDeque<Message>,
    last: Option<Message>,
}

/// Scripted chat model: substring-routed, per-route FIFO of turns.
pub struct ScriptedModel {
    routes: Mutex<Vec<Route>>,
    fallback: Message,
}

impl ScriptedModel {
    /// Create a scripted model with a fallback response for unmatched
    /// requests.
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            routes: Mutex::new(Vec::new()),
            fallback: Message::ai(fallback.into()),
        }
    }

    /// Register a route: requests whose system or human text contains `key`
    /// consume `turns` in order. When a route runs dry its last turn
    /// repeats.
    pub fn with_route(self, key: impl Into<String>, turns: Vec<Message>) -> Self {
        self.routes.lock().push(Route {
            key: key.into(),
            turns: turns.into(),
            last: None,
        });
        self
    }

    fn next_for(&self, request: &ChatRequest) -> Message {
        let haystack: String = request
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
            .to_lowercase();

        let mut routes = self.routes.lock();
        for route in routes.iter_mut() {
            if haystack.contains(&route.key.to_lowercase()) {
                if let Some(turn) = route.turns.pop_front() {
                    route.last = Some(turn.clone());
                    return turn;
                }
                if let Some(last) = &route.last {
                    return last.clone();
                }
            }
        }
        self.fallback.clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        if request.messages.is_empty() {
            return Err(LlmError::InvalidResponse(
                "scripted model received an empty request".to_string(),
            ));
        }
        Ok(ChatResponse {
            message: self.next_for(&request),
            usage: None,
        })
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::ToolCall;
    use serde_json::json;

    #[tokio::test]
    async fn test_routes_by_substring() {
        let model = ScriptedModel::new("fallback")
            .with_route("market analyst", vec![Message::ai("market turn 1")])
            .with_route("news analyst", vec![Message::ai("news turn 1")]);

        let request = ChatRequest::new(vec![
            Message::system("You are the market analyst."),
            Message::human("go"),
        ]);
        let response = model.chat(request).await.unwrap();
        assert_eq!(response.message.content, "market turn 1");
    }

    #[tokio::test]
    async fn test_turns_consume_in_order_then_repeat_last() {
        let model = ScriptedModel::new("fallback").with_route(
            "judge",
            vec![Message::ai("round 1"), Message::ai("round 2")],
        );

        let request = ChatRequest::new(vec![Message::system("debate judge"), Message::human("x")]);
        assert_eq!(
            model.chat(request.clone()).await.unwrap().message.content,
            "round 1"
        );
        assert_eq!(
            model.chat(request.clone()).await.unwrap().message.content,
            "round 2"
        );
        assert_eq!(
            model.chat(request).await.unwrap().message.content,
            "round 2"
        );
    }

    #[tokio::test]
    async fn test_unmatched_request_gets_fallback() {
        let model = ScriptedModel::new("nothing scripted");
        let request = ChatRequest::new(vec![Message::human("hello")]);
        assert_eq!(
            model.chat(request).await.unwrap().message.content,
            "nothing scripted"
        );
    }

    #[tokio::test]
    async fn test_scripted_tool_calls_pass_through() {
        let model = ScriptedModel::new("fb").with_route(
            "market",
            vec![Message::ai("").with_tool_calls(vec![ToolCall::new(
                "1",
                "quote",
                json!({"ticker": "AAPL"}),
            )])],
        );
        let request = ChatRequest::new(vec![Message::system("market"), Message::human("x")]);
        let response = model.chat(request).await.unwrap();
        assert!(response.message.has_tool_calls());
    }
}
