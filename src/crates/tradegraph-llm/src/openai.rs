//! OpenAI-compatible chat client
//!
//! Works against any endpoint implementing the chat-completions wire format
//! (OpenAI, Azure, vLLM, LM Studio, OpenRouter, ...). Tool calling uses the
//! standard `tools` / `tool_calls` fields; arguments arrive JSON-encoded in
//! a string and are parsed into a `Value` before reaching the engine.

use crate::error::{LlmError, Result};
use crate::messages::{Message, MessageRole, ToolCall};
use crate::traits::{ChatModel, ChatRequest, ChatResponse, ToolDefinition, Usage};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Configuration for a remote OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct RemoteModelConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`
    pub api_base: String,
    /// Bearer token
    pub api_key: String,
    /// Model identifier sent with each request
    pub model: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl RemoteModelConfig {
    /// Build a config, reading the API key from `env_key`.
    pub fn from_env(env_key: &str, api_base: &str, model: &str) -> Result<Self> {
        let api_key = std::env::var(env_key)
            .map_err(|_| LlmError::Configuration(format!("{env_key} is not set")))?;
        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
            timeout: Duration::from_secs(60),
        })
    }
}

/// OpenAI-compatible chat-completions client.
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    config: RemoteModelConfig,
    client: Client,
}

impl OpenAiCompatibleClient {
    /// Create a client for the given endpoint.
    pub fn new(config: RemoteModelConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn convert_message(msg: &Message) -> WireMessage {
        WireMessage {
            role: match msg.role {
                MessageRole::System => "system",
                MessageRole::Human => "user",
                MessageRole::Ai => "assistant",
                MessageRole::Tool => "tool",
            }
            .to_string(),
            content: Some(msg.content.clone()),
            tool_call_id: msg.tool_call_id.clone(),
            tool_calls: msg.tool_calls.as_ref().map(|calls| {
                calls
                    .iter()
                    .map(|c| WireToolCall {
                        id: c.id.clone(),
                        kind: "function".to_string(),
                        function: WireFunction {
                            name: c.name.clone(),
                            arguments: c.args.to_string(),
                        },
                    })
                    .collect()
            }),
        }
    }

    fn convert_tool(tool: &ToolDefinition) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters,
            }
        })
    }

    fn parse_response(&self, body: WireResponse) -> Result<ChatResponse> {
        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("response had no choices".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                let args: Value = serde_json::from_str(&tc.function.arguments)
                    .unwrap_or(Value::Object(Default::default()));
                ToolCall::new(tc.id, tc.function.name, args)
            })
            .collect::<Vec<_>>();

        let mut message = Message::ai(choice.message.content.unwrap_or_default());
        if !tool_calls.is_empty() {
            message = message.with_tool_calls(tool_calls);
        }

        Ok(ChatResponse {
            message,
            usage: body.usage.map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            }),
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatibleClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.config.api_base);

        let mut payload = serde_json::json!({
            "model": self.config.model,
            "messages": request.messages.iter().map(Self::convert_message).collect::<Vec<_>>(),
        });
        if !request.tools.is_empty() {
            payload["tools"] = Value::Array(request.tools.iter().map(Self::convert_tool).collect());
        }
        if let Some(t) = request.temperature {
            payload["temperature"] = serde_json::json!(t);
        }
        if let Some(m) = request.max_tokens {
            payload["max_tokens"] = serde_json::json!(m);
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(LlmError::RateLimit("provider returned 429".to_string()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: WireResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        self.parse_response(body)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// Wire types for the chat-completions format.

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: WireFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
