//! # tradegraph-core — channel-partitioned state graph engine
//!
//! The execution core behind tradegraph's multi-agent analysis sessions.
//! It knows nothing about trading: it executes a declarative graph of async
//! nodes over a JSON state record whose fields merge through registered
//! reducers.
//!
//! What the engine provides:
//!
//! - **State store with reducers** ([`state`]) — per-field merge functions
//!   make concurrent partial updates from parallel branches safe and
//!   order-independent.
//! - **Graph description and builder** ([`graph`], [`builder`]) — nodes,
//!   direct/conditional edges, fan-out and fan-in barriers.
//! - **Superstep scheduler** ([`executor`]) — runs ready nodes concurrently
//!   with consistent snapshots, honors a recursion limit and a session
//!   deadline, and streams progress events.
//! - **Dynamic dispatch** ([`send`]) — runtime fan-out via `Send` tasks with
//!   per-task input state.
//! - **Retry + cache primitives** ([`retry`], [`cache`]) — shared by the
//!   tool and LLM invokers layered on top.
//!
//! The trading domain (analyst loops, debates, risk perspectives) lives in
//! `tradegraph-agents`; HTTP/SSE lives in `tradegraph-server`.

pub mod builder;
pub mod cache;
pub mod error;
pub mod executor;
pub mod graph;
pub mod node;
pub mod retry;
pub mod send;
pub mod state;
pub mod stream;

pub use builder::StateGraph;
pub use error::{GraphError, Result};
pub use executor::{CompiledGraph, ExecutionLimits};
pub use graph::{Edge, Graph, NodeId, NodeSpec, END, START};
pub use node::{executor as node_executor, NodeExecutor, NodeOutput};
pub use retry::RetryPolicy;
pub use send::{ConditionalEdgeResult, Send};
pub use state::{Reducer, StateSchema};
pub use stream::ExecutionEvent;
