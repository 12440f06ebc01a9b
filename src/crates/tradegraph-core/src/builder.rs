//! StateGraph builder
//!
//! Fluent construction of a graph: add nodes (async closures), wire direct
//! and conditional edges, attach the state schema and execution limits, then
//! `compile()` into an executable [`CompiledGraph`]. Compilation validates
//! the structure, so dangling edges fail before any session runs.
//!
//! # Example
//!
//! ```rust,no_run
//! use tradegraph_core::builder::StateGraph;
//! use tradegraph_core::node::NodeOutput;
//! use tradegraph_core::graph::{START, END};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), tradegraph_core::error::GraphError> {
//! let mut graph = StateGraph::new();
//! graph.add_node("greet", |_state| async move {
//!     Ok(NodeOutput::Update(json!({"greeting": "hello"})))
//! });
//! graph.add_edge(START, "greet");
//! graph.add_edge("greet", END);
//!
//! let compiled = graph.compile()?;
//! let state = compiled.invoke(json!({})).await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{GraphError, Result};
use crate::executor::{CompiledGraph, ExecutionLimits};
use crate::graph::{Graph, NodeId, NodeSpec};
use crate::node::{executor, NodeExecutor, NodeOutput};
use crate::send::ConditionalEdgeResult;
use crate::state::StateSchema;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Builder for executable state graphs.
#[derive(Default)]
pub struct StateGraph {
    graph: Graph,
    schema: StateSchema,
    limits: ExecutionLimits,
}

impl StateGraph {
    /// Create an empty builder with default limits and an empty schema.
    pub fn new() -> Self {
        Self {
            graph: Graph::new(),
            schema: StateSchema::new(),
            limits: ExecutionLimits::default(),
        }
    }

    /// Attach the state schema (field reducers).
    pub fn with_schema(mut self, schema: StateSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Cap total node activations for a session.
    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.limits.recursion_limit = limit;
        self
    }

    /// Set the session-wide hard deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.limits.deadline = Some(deadline);
        self
    }

    /// Add a node from an async closure.
    pub fn add_node<F, Fut>(&mut self, id: impl Into<NodeId>, f: F) -> &mut Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<NodeOutput>> + Send + 'static,
    {
        let id = id.into();
        self.graph.add_node(
            id.clone(),
            NodeSpec {
                name: id,
                executor: executor(f),
            },
        );
        self
    }

    /// Add a node from a pre-built executor.
    pub fn add_node_executor(&mut self, id: impl Into<NodeId>, exec: NodeExecutor) -> &mut Self {
        let id = id.into();
        self.graph.add_node(
            id.clone(),
            NodeSpec {
                name: id,
                executor: exec,
            },
        );
        self
    }

    /// Add a direct edge.
    pub fn add_edge(&mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> &mut Self {
        self.graph.add_edge(from.into(), to.into());
        self
    }

    /// Add a conditional edge: `router` inspects committed state and names
    /// the next node(s); `branches` declares every target it may return.
    pub fn add_conditional_edge<F>(
        &mut self,
        from: impl Into<NodeId>,
        router: F,
        branches: Vec<NodeId>,
    ) -> &mut Self
    where
        F: Fn(&Value) -> ConditionalEdgeResult + Send + Sync + 'static,
    {
        self.graph
            .add_conditional_edge(from.into(), Arc::new(router), branches);
        self
    }

    /// Change the entry point (defaults to START).
    pub fn set_entry(&mut self, node: impl Into<NodeId>) -> &mut Self {
        self.graph.entry = node.into();
        self
    }

    /// Validate and produce an executable graph.
    pub fn compile(self) -> Result<CompiledGraph> {
        self.graph.validate().map_err(GraphError::Validation)?;
        Ok(CompiledGraph::new(self.graph, self.schema, self.limits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::START;
    use serde_json::json;

    #[test]
    fn test_compile_rejects_dangling_edge() {
        let mut graph = StateGraph::new();
        graph.add_edge(START, "nowhere");
        assert!(matches!(
            graph.compile(),
            Err(GraphError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_builder_end_to_end() {
        let mut graph = StateGraph::new();
        graph.add_node("echo", |state| async move {
            Ok(NodeOutput::Update(json!({"out": state["in"]})))
        });
        graph.add_edge(START, "echo");

        let compiled = graph.compile().unwrap();
        let state = compiled.invoke(json!({"in": 42})).await.unwrap();
        assert_eq!(state["out"], 42);
    }
}
