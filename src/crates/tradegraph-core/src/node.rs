//! Node output and executor types
//!
//! A node is a pure function from a state snapshot to either a partial state
//! update (committed through the reducer gateway) or a set of [`Send`]
//! dispatches (dynamic fan-out). Executors are async and must be `Send +
//! Sync` so the scheduler can run a whole frontier concurrently.

use crate::error::Result;
use crate::send::Send as SendTask;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// What a node produced when it returned.
#[derive(Debug, Clone)]
pub enum NodeOutput {
    /// Partial state update, merged via the per-field reducers
    Update(Value),
    /// Dynamic dispatches; each spawns the target node with custom input
    Sends(Vec<SendTask>),
}

impl NodeOutput {
    /// An empty update (the node observed state but wrote nothing).
    pub fn empty() -> Self {
        NodeOutput::Update(Value::Object(serde_json::Map::new()))
    }
}

/// Boxed future returned by node executors.
pub type NodeFuture = Pin<Box<dyn Future<Output = Result<NodeOutput>> + std::marker::Send>>;

/// Async executor: state snapshot in, [`NodeOutput`] out.
pub type NodeExecutor = Arc<dyn Fn(Value) -> NodeFuture + std::marker::Send + Sync>;

/// Wrap an async closure as a [`NodeExecutor`].
///
/// Saves callers the `Arc::new(move |state| Box::pin(async move { ... }))`
/// boilerplate at every node definition site.
pub fn executor<F, Fut>(f: F) -> NodeExecutor
where
    F: Fn(Value) -> Fut + std::marker::Send + Sync + 'static,
    Fut: Future<Output = Result<NodeOutput>> + std::marker::Send + 'static,
{
    Arc::new(move |state| Box::pin(f(state)))
}
