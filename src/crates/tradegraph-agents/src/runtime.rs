//! Shared per-session runtime handed to every node factory
//!
//! Bundles the services a kernel needs: the deep and quick models, the tool
//! invoker, toolkits, the context projector, the session config, and the
//! session deadline. Built once per session by the server and shared by
//! `Arc`.

use crate::config::AnalysisConfig;
use crate::context::ContextProjector;
use crate::invoker::ToolInvoker;
use crate::tools::{ToolContext, ToolRegistry, ToolkitSet};
use std::sync::Arc;
use std::time::Instant;
use tradegraph_core::retry::RetryPolicy;
use tradegraph_llm::traits::ChatModel;

/// Services shared by all kernels in one session.
pub struct AgentRuntime {
    /// Deep-thinking model used by analysts, researchers and judges
    pub model: Arc<dyn ChatModel>,
    /// Fast model used by the signal processor
    pub quick_model: Arc<dyn ChatModel>,
    /// Tool invoker (budget, dedup, cache, retry)
    pub invoker: Arc<ToolInvoker>,
    /// Registered tools
    pub registry: Arc<ToolRegistry>,
    /// Capability scoping per analyst
    pub toolkits: Arc<ToolkitSet>,
    /// Perspective projector for the risk debate
    pub projector: Arc<ContextProjector>,
    /// Immutable session config
    pub config: Arc<AnalysisConfig>,
    /// Session deadline, used for cooperative cancellation inside kernels
    pub deadline: Instant,
}

impl AgentRuntime {
    /// Tool context carrying the session deadline.
    pub fn tool_context(&self) -> ToolContext {
        ToolContext::with_deadline(self.deadline)
    }

    /// Retry envelope for LLM calls: 3 attempts, 1 s → 2 s → 4 s.
    pub fn llm_retry(&self) -> RetryPolicy {
        tradegraph_llm::retry::default_llm_retry()
    }

    /// Time remaining before the session deadline.
    pub fn remaining(&self) -> std::time::Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}
