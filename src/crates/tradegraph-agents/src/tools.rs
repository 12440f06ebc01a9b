//! Tool interface, registry, and capability scoping
//!
//! Tools are named async functions with a JSON-schema argument contract.
//! Each analyst is restricted to a toolkit; the news and social toolkits
//! must share no tools (social chatter leaking into the news report is a
//! contamination bug, so the boundary is enforced structurally, not by
//! prompt).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tradegraph_llm::traits::ToolDefinition;

/// Errors from tool execution.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    /// Network-class failure; eligible for retry
    #[error("transient tool failure: {0}")]
    Transient(String),

    /// Transient failures persisted through the whole retry budget
    #[error("transient-exhausted: {0}")]
    TransientExhausted(String),

    /// Upstream rejection (schema error, 4xx); never retried
    #[error("permanent tool failure: {0}")]
    Permanent(String),

    /// The per-call timeout elapsed
    #[error("tool call timed out after {0:?}")]
    Timeout(Duration),

    /// The invoker refused the call (budget or duplicate arguments)
    #[error("tool call rejected: {0}")]
    Rejected(String),

    /// No tool registered under this name
    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

impl ToolError {
    /// Whether the default retry classification treats this as transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, ToolError::Transient(_) | ToolError::Timeout(_))
    }
}

/// Session context passed into every tool call.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Session deadline for cooperative cancellation
    pub deadline: Option<Instant>,
}

impl ToolContext {
    /// Context bounded by a session deadline.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    /// Time left before the session deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

/// Tool result: a textual payload plus optional structured metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Textual payload appended to the channel as a tool message
    pub text: String,
    /// Structured metadata for consumers that want more than text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl ToolOutput {
    /// Text-only output.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            meta: None,
        }
    }
}

/// A named external function with a JSON-schema argument contract.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Globally unique name.
    fn name(&self) -> &str;

    /// Description shown to the model.
    fn description(&self) -> &str;

    /// JSON schema for the argument object.
    fn args_schema(&self) -> Value;

    /// Execute with typed arguments; `ctx` exposes the session deadline.
    async fn invoke(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError>;

    /// Retry classification hook; defaults to network/timeout classes.
    fn is_transient_error(&self, err: &ToolError) -> bool {
        err.is_transient()
    }
}

/// Registry of available tools.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; the name must be unique.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Whether a tool is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Definitions for the given tool names, for binding to a model.
    pub fn definitions(&self, names: &[String]) -> Vec<ToolDefinition> {
        names
            .iter()
            .filter_map(|n| self.tools.get(n))
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.args_schema(),
            })
            .collect()
    }
}

/// The four analyst roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalystKind {
    Market,
    Social,
    News,
    Fundamentals,
}

impl AnalystKind {
    /// All analysts in dispatch order.
    pub fn all() -> [AnalystKind; 4] {
        [
            AnalystKind::Market,
            AnalystKind::Social,
            AnalystKind::News,
            AnalystKind::Fundamentals,
        ]
    }

    /// Short name used in events and config.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalystKind::Market => "market",
            AnalystKind::Social => "social",
            AnalystKind::News => "news",
            AnalystKind::Fundamentals => "fundamentals",
        }
    }

    /// The analyst's message channel field.
    pub fn message_field(&self) -> &'static str {
        match self {
            AnalystKind::Market => crate::state::fields::MARKET_MESSAGES,
            AnalystKind::Social => crate::state::fields::SOCIAL_MESSAGES,
            AnalystKind::News => crate::state::fields::NEWS_MESSAGES,
            AnalystKind::Fundamentals => crate::state::fields::FUNDAMENTALS_MESSAGES,
        }
    }

    /// The analyst's report field.
    pub fn report_field(&self) -> &'static str {
        match self {
            AnalystKind::Market => crate::state::fields::MARKET_REPORT,
            AnalystKind::Social => crate::state::fields::SENTIMENT_REPORT,
            AnalystKind::News => crate::state::fields::NEWS_REPORT,
            AnalystKind::Fundamentals => crate::state::fields::FUNDAMENTALS_REPORT,
        }
    }

    /// Graph node name.
    pub fn node_name(&self) -> String {
        format!("{}_analyst", self.as_str())
    }
}

impl std::fmt::Display for AnalystKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-analyst allowed tool names.
#[derive(Debug, Clone, Error)]
#[error("toolkit scoping violation: {0}")]
pub struct ScopingViolation(String);

/// Capability scoping: which tools each analyst may call.
#[derive(Debug, Clone, Default)]
pub struct ToolkitSet {
    allowed: HashMap<AnalystKind, Vec<String>>,
}

impl ToolkitSet {
    /// Build a toolkit set, enforcing that news and social share no tools.
    pub fn new(allowed: HashMap<AnalystKind, Vec<String>>) -> Result<Self, ScopingViolation> {
        let empty = Vec::new();
        let news: HashSet<&String> = allowed
            .get(&AnalystKind::News)
            .unwrap_or(&empty)
            .iter()
            .collect();
        let overlap: Vec<&String> = allowed
            .get(&AnalystKind::Social)
            .unwrap_or(&empty)
            .iter()
            .filter(|t| news.contains(*t))
            .collect();

        if !overlap.is_empty() {
            return Err(ScopingViolation(format!(
                "news and social toolkits must be disjoint; shared: {:?}",
                overlap
            )));
        }

        Ok(Self { allowed })
    }

    /// Tool names the analyst may call.
    pub fn allowed(&self, kind: AnalystKind) -> &[String] {
        self.allowed
            .get(&kind)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Whether the analyst may call `tool_name`.
    pub fn permits(&self, kind: AnalystKind, tool_name: &str) -> bool {
        self.allowed(kind).iter().any(|t| t == tool_name)
    }
}

/// The standard toolkit assignment used by the analysis graph.
pub fn standard_toolkits() -> ToolkitSet {
    let mut allowed = HashMap::new();
    allowed.insert(
        AnalystKind::Market,
        vec![
            "price_history".to_string(),
            "technical_indicators".to_string(),
            "insider_transactions".to_string(),
            "company_profile".to_string(),
        ],
    );
    allowed.insert(
        AnalystKind::Social,
        vec![
            "reddit_sentiment".to_string(),
            "stocktwits_sentiment".to_string(),
            "twitter_sentiment".to_string(),
            "general_news_context".to_string(),
        ],
    );
    allowed.insert(
        AnalystKind::News,
        vec!["news_search".to_string(), "company_news_wire".to_string()],
    );
    allowed.insert(
        AnalystKind::Fundamentals,
        vec![
            "financial_statements".to_string(),
            "insider_transactions".to_string(),
            "earnings_news".to_string(),
        ],
    );

    ToolkitSet::new(allowed).expect("standard toolkits violate scoping")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "echoes its arguments"
        }

        fn args_schema(&self) -> Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }

        async fn invoke(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::text(args["text"].as_str().unwrap_or("").to_string()))
        }
    }

    #[tokio::test]
    async fn test_registry_register_and_invoke() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let tool = registry.get("echo").unwrap();
        let out = tool
            .invoke(json!({"text": "hi"}), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(out.text, "hi");
        assert!(!registry.contains("missing"));
    }

    #[test]
    fn test_definitions_filter_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let defs = registry.definitions(&["echo".to_string(), "nope".to_string()]);
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
    }

    #[test]
    fn test_standard_toolkits_news_social_disjoint() {
        let toolkits = standard_toolkits();
        let news: HashSet<_> = toolkits.allowed(AnalystKind::News).iter().collect();
        for tool in toolkits.allowed(AnalystKind::Social) {
            assert!(!news.contains(tool), "{tool} leaked into both toolkits");
        }
    }

    #[test]
    fn test_overlapping_toolkits_rejected() {
        let mut allowed = HashMap::new();
        allowed.insert(AnalystKind::News, vec!["shared_feed".to_string()]);
        allowed.insert(AnalystKind::Social, vec!["shared_feed".to_string()]);
        assert!(ToolkitSet::new(allowed).is_err());
    }

    #[test]
    fn test_permits() {
        let toolkits = standard_toolkits();
        assert!(toolkits.permits(AnalystKind::Market, "price_history"));
        assert!(!toolkits.permits(AnalystKind::Market, "reddit_sentiment"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(ToolError::Transient("net".into()).is_transient());
        assert!(ToolError::Timeout(Duration::from_secs(30)).is_transient());
        assert!(!ToolError::Permanent("schema".into()).is_transient());
        assert!(!ToolError::Rejected("budget".into()).is_transient());
    }
}
