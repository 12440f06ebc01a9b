//! Error types for graph construction and execution
//!
//! All errors implement `std::error::Error` via `thiserror`. The taxonomy
//! mirrors how failures propagate through a session:
//!
//! ```text
//! GraphError
//! ├── Validation          - graph structure errors (caught at compile())
//! ├── NodeExecution       - a node's executor failed (fatal for the session)
//! ├── State               - reducer / schema errors during a commit
//! ├── GraphLimitExceeded  - node activations exceeded the recursion limit
//! ├── Timeout             - session-wide deadline fired
//! ├── Cancelled           - cooperative cancellation observed by a task
//! └── Serialization       - JSON conversion at the engine boundary
//! ```
//!
//! Failures local to one analyst or one risk perspective never surface as
//! `NodeExecution`: those kernels degrade to warning reports or cancellation
//! stubs before returning. Synthesizer nodes (research manager, trader, risk
//! judge) have no safe default, so their errors are fatal.

use thiserror::Error;

/// Errors raised while building or executing a graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Graph structure validation failed (missing node, dangling edge, ...)
    #[error("Graph validation failed: {0}")]
    Validation(String),

    /// A node's executor returned an error during execution
    #[error("Node '{node}' execution failed: {error}")]
    NodeExecution {
        /// Name of the node that failed
        node: String,
        /// Error message from node execution
        error: String,
    },

    /// Reducer or schema failure while committing a partial update
    #[error("State error: {0}")]
    State(#[from] crate::state::StateError),

    /// Node activation count exceeded the configured recursion limit
    #[error("Graph limit exceeded: {activations} node activations > limit {limit}")]
    GraphLimitExceeded {
        /// Activations observed when the limit tripped
        activations: usize,
        /// Configured limit
        limit: usize,
    },

    /// Session-wide deadline elapsed before the graph reached a terminal node
    #[error("Execution timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Execution was cancelled cooperatively
    #[error("Execution cancelled: {0}")]
    Cancelled(String),

    /// JSON (de)serialization failed at the engine boundary
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GraphError {
    /// Build a [`GraphError::NodeExecution`] from any displayable error.
    pub fn node_execution(node: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::NodeExecution {
            node: node.into(),
            error: error.to_string(),
        }
    }
}

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_execution_display() {
        let err = GraphError::node_execution("risk_judge", "model unavailable");
        assert_eq!(
            format!("{}", err),
            "Node 'risk_judge' execution failed: model unavailable"
        );
    }

    #[test]
    fn test_limit_display_carries_counts() {
        let err = GraphError::GraphLimitExceeded {
            activations: 51,
            limit: 50,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("51"));
        assert!(msg.contains("50"));
    }
}
