//! # tradegraph-agents — analyst, debate, and risk kernels
//!
//! The trading domain layered on the `tradegraph-core` engine:
//!
//! - [`state`] — the session state schema: message channels, assign-once
//!   report fields, and structurally merged debate records.
//! - [`tools`] / [`invoker`] — the tool boundary: capability-scoped
//!   toolkits, per-analyst budgets and dedup, caching, retries, ordered
//!   parallel dispatch.
//! - [`analysts`] / [`social`] — the four analyst loop kernels, including
//!   the hard-coded parallel social path and news-report scrubbing.
//! - [`debate`] / [`trader`] / [`risk`] — the bull/bear debate with its
//!   judge-controlled consensus loop, the trader synthesizer, and the
//!   three-perspective parallel risk debate.
//! - [`context`] — perspective-specific, token-budgeted context projection.
//! - [`signal`] — final BUY/SELL/HOLD extraction.
//! - [`graph`] — wires everything into one executable session graph.

pub mod analysts;
pub mod config;
pub mod context;
pub mod debate;
pub mod graph;
pub mod invoker;
pub mod messages;
pub mod prompts;
pub mod risk;
pub mod runtime;
pub mod signal;
pub mod social;
pub mod state;
pub mod tokens;
pub mod tools;
pub mod trader;

pub use config::AnalysisConfig;
pub use context::{ContextProjector, Perspective, ProjectionInput};
pub use graph::build_analysis_graph;
pub use invoker::ToolInvoker;
pub use runtime::AgentRuntime;
pub use signal::SignalProcessor;
pub use state::{analysis_schema, initial_state};
pub use tools::{AnalystKind, Tool, ToolContext, ToolError, ToolOutput, ToolRegistry, ToolkitSet};
