//! # tradegraph-llm — provider-agnostic chat model interface
//!
//! Message types, the [`ChatModel`] trait the engine consumes, transient
//! error classification, a retrying `safe_chat` wrapper, and two providers:
//! an OpenAI-compatible remote client and a deterministic scripted model
//! for offline runs and tests.

pub mod error;
pub mod messages;
pub mod openai;
pub mod retry;
pub mod scripted;
pub mod traits;

pub use error::{LlmError, Result};
pub use messages::{Message, MessageRole, ToolCall};
pub use openai::{OpenAiCompatibleClient, RemoteModelConfig};
pub use retry::{default_llm_retry, safe_chat};
pub use scripted::ScriptedModel;
pub use traits::{ChatModel, ChatRequest, ChatResponse, ToolDefinition, Usage};
