//! Core graph data structures
//!
//! A graph is a set of named nodes plus edges describing control flow:
//!
//! - **Direct edges** route unconditionally; a node with several outgoing
//!   direct edges fans out to all targets in parallel.
//! - **Conditional edges** evaluate a router over the committed state and
//!   return the next node(s) — this is how the debate loop decides between
//!   another round and the research manager.
//! - A node with several *incoming* direct edges is a fan-in barrier: it only
//!   becomes runnable once every predecessor branch has committed.
//!
//! Graphs are built through [`StateGraph`](crate::builder::StateGraph) and
//! turned into an executable [`CompiledGraph`](crate::executor::CompiledGraph)
//! by `compile()`, which validates the structure first.

use crate::node::NodeExecutor;
use crate::send::ConditionalEdgeResult;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Node identifier — unique name for each node in the graph.
pub type NodeId = String;

/// Virtual entry node; execution begins at its outgoing edges.
pub const START: &str = "__start__";

/// Virtual terminal node; routing to it completes the branch.
pub const END: &str = "__end__";

/// Router function for conditional edges.
pub type RouterFn = Arc<dyn Fn(&Value) -> ConditionalEdgeResult + Send + Sync>;

/// Edge between nodes: unconditional or routed at runtime.
#[derive(Clone)]
pub enum Edge {
    /// Unconditional transition to a target node
    Direct(NodeId),

    /// Dynamic routing: the router inspects committed state and picks the
    /// next node(s). `branches` lists every target the router may return,
    /// for validation.
    Conditional {
        router: RouterFn,
        branches: Vec<NodeId>,
    },
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Edge::Direct(node_id) => f.debug_tuple("Direct").field(node_id).finish(),
            Edge::Conditional { branches, .. } => f
                .debug_struct("Conditional")
                .field("router", &"<function>")
                .field("branches", branches)
                .finish(),
        }
    }
}

/// Node specification: an executor plus a display name.
#[derive(Clone)]
pub struct NodeSpec {
    /// Human-readable name, used in logs and execution events
    pub name: String,
    /// Async executor invoked with a consistent state snapshot
    pub executor: NodeExecutor,
}

impl std::fmt::Debug for NodeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeSpec")
            .field("name", &self.name)
            .field("executor", &"<function>")
            .finish()
    }
}

/// Declarative graph description: nodes, edges, entry point.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// All nodes keyed by their unique IDs
    pub nodes: HashMap<NodeId, NodeSpec>,
    /// Outgoing edges per source node
    pub edges: HashMap<NodeId, Vec<Edge>>,
    /// Entry point (defaults to [`START`])
    pub entry: NodeId,
}

impl Graph {
    /// Create an empty graph with entry at [`START`].
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            entry: START.to_string(),
        }
    }

    /// Add a node.
    pub fn add_node(&mut self, id: NodeId, spec: NodeSpec) {
        self.nodes.insert(id, spec);
    }

    /// Add a direct (unconditional) edge.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        self.edges.entry(from).or_default().push(Edge::Direct(to));
    }

    /// Add a conditional edge with a runtime router.
    pub fn add_conditional_edge(&mut self, from: NodeId, router: RouterFn, branches: Vec<NodeId>) {
        self.edges
            .entry(from)
            .or_default()
            .push(Edge::Conditional { router, branches });
    }

    /// Number of incoming direct edges per node. Nodes with in-degree > 1
    /// are fan-in barriers.
    pub fn in_degrees(&self) -> HashMap<NodeId, usize> {
        let mut degrees: HashMap<NodeId, usize> = HashMap::new();
        for edges in self.edges.values() {
            for edge in edges {
                if let Edge::Direct(to) = edge {
                    if to != END {
                        *degrees.entry(to.clone()).or_insert(0) += 1;
                    }
                }
            }
        }
        degrees
    }

    /// Structural validation: every edge endpoint must exist (or be a
    /// virtual START/END marker).
    pub fn validate(&self) -> Result<(), String> {
        if !self.nodes.contains_key(&self.entry) && self.entry != START {
            return Err(format!("Entry point {} does not exist", self.entry));
        }

        for (from, edges) in &self.edges {
            if !self.nodes.contains_key(from) && from != START {
                return Err(format!("Edge source {} does not exist", from));
            }

            for edge in edges {
                match edge {
                    Edge::Direct(to) => {
                        if !self.nodes.contains_key(to) && to != END {
                            return Err(format!("Edge target {} does not exist", to));
                        }
                    }
                    Edge::Conditional { branches, .. } => {
                        for to in branches {
                            if !self.nodes.contains_key(to) && to != END {
                                return Err(format!("Branch target {} does not exist", to));
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{executor, NodeOutput};

    fn passthrough(name: &str) -> NodeSpec {
        NodeSpec {
            name: name.to_string(),
            executor: executor(|_state| async move { Ok(NodeOutput::empty()) }),
        }
    }

    #[test]
    fn test_graph_creation() {
        let graph = Graph::new();
        assert_eq!(graph.nodes.len(), 0);
        assert_eq!(graph.entry, START);
    }

    #[test]
    fn test_validation_passes_for_linear_flow() {
        let mut graph = Graph::new();
        graph.add_node("a".to_string(), passthrough("a"));
        graph.add_edge(START.to_string(), "a".to_string());
        graph.add_edge("a".to_string(), END.to_string());
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_validation_fails_for_missing_target() {
        let mut graph = Graph::new();
        graph.add_edge(START.to_string(), "missing".to_string());
        assert!(graph.validate().is_err());
    }

    #[test]
    fn test_in_degrees_count_fan_in() {
        let mut graph = Graph::new();
        for name in ["a", "b", "join"] {
            graph.add_node(name.to_string(), passthrough(name));
        }
        graph.add_edge("a".to_string(), "join".to_string());
        graph.add_edge("b".to_string(), "join".to_string());

        let degrees = graph.in_degrees();
        assert_eq!(degrees.get("join"), Some(&2));
        assert_eq!(degrees.get("a"), None);
    }
}
