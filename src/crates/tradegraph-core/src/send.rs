//! Dynamic task dispatch
//!
//! A [`Send`] names a target node and carries the exact state that node
//! should run with. Nodes (the dispatcher) and conditional-edge routers can
//! return sets of `Send`s to spawn a runtime-determined fan-out: one task per
//! selected analyst, each seeded with its own pre-initialized message
//! channel. Static edges cover every fixed route; `Send` exists for the
//! fan-outs whose width is only known once the session config is read.

use crate::graph::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A dynamic dispatch: run `node` with `state` as its input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Send {
    node: NodeId,
    state: Value,
}

impl Send {
    /// Create a new dispatch targeting `node` with a custom input state.
    pub fn new(node: impl Into<NodeId>, state: Value) -> Self {
        Self {
            node: node.into(),
            state,
        }
    }

    /// Target node name.
    pub fn node(&self) -> &str {
        &self.node
    }

    /// Input state for the target node.
    pub fn state(&self) -> &Value {
        &self.state
    }

    /// Consume the dispatch, yielding `(node, state)`.
    pub fn into_parts(self) -> (NodeId, Value) {
        (self.node, self.state)
    }
}

/// Result of evaluating a conditional edge's router function.
#[derive(Clone)]
pub enum ConditionalEdgeResult {
    /// Route to a single node
    Single(NodeId),
    /// Execute multiple nodes in parallel
    Multiple(Vec<NodeId>),
    /// Spawn dynamic tasks, each with its own input state
    Sends(Vec<Send>),
    /// Terminate this branch
    End,
}

impl std::fmt::Debug for ConditionalEdgeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(n) => f.debug_tuple("Single").field(n).finish(),
            Self::Multiple(ns) => f.debug_tuple("Multiple").field(ns).finish(),
            Self::Sends(sends) => f
                .debug_tuple("Sends")
                .field(&sends.iter().map(|s| s.node()).collect::<Vec<_>>())
                .finish(),
            Self::End => write!(f, "End"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_send_carries_custom_state() {
        let send = Send::new("market_analyst", json!({"market_messages": ["go"]}));
        assert_eq!(send.node(), "market_analyst");
        assert_eq!(send.state()["market_messages"], json!(["go"]));
    }

    #[test]
    fn test_send_roundtrips_through_json() {
        let send = Send::new("news_analyst", json!({"k": 1}));
        let encoded = serde_json::to_string(&send).unwrap();
        let decoded: Send = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.node(), "news_analyst");
        assert_eq!(decoded.state()["k"], json!(1));
    }
}
