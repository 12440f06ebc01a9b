//! Execution event stream payloads
//!
//! While a graph runs, the executor can publish progress events over a
//! channel: one `NodeStarted`/`NodeCompleted` pair per node activation, and a
//! terminal `Completed` carrying the final state. The HTTP layer maps these
//! onto its own SSE schema; the engine stays transport-agnostic.

use serde::Serialize;
use serde_json::Value;

/// Progress event emitted during graph execution.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
    /// A node was scheduled and its executor is about to run
    NodeStarted {
        /// Node name
        node: String,
    },

    /// A node returned and its partial update was committed
    NodeCompleted {
        /// Node name
        node: String,
        /// The partial update that was merged (empty object for dispatch-only
        /// nodes)
        update: Value,
    },

    /// The graph reached quiescence
    Completed {
        /// Final accumulated state
        state: Value,
    },
}

impl ExecutionEvent {
    /// Node name this event concerns, if any.
    pub fn node(&self) -> Option<&str> {
        match self {
            ExecutionEvent::NodeStarted { node } => Some(node),
            ExecutionEvent::NodeCompleted { node, .. } => Some(node),
            ExecutionEvent::Completed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_serialization_tags() {
        let event = ExecutionEvent::NodeCompleted {
            node: "market_analyst".to_string(),
            update: json!({"market_report": "done"}),
        };
        let encoded = serde_json::to_value(&event).unwrap();
        assert_eq!(encoded["event"], "node_completed");
        assert_eq!(encoded["node"], "market_analyst");
    }
}
