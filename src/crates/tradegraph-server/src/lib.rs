//! # tradegraph-server — HTTP/SSE analysis server
//!
//! Thin shell over the agent graph: ticker validation, per-session runtime
//! construction, SSE mapping of execution events, signal post-processing,
//! and optional result persistence.
//!
//! Endpoints:
//! - `POST /analyze` — run a session to completion, return the full
//!   [`session::AnalysisResponse`]
//! - `GET /analyze/stream?ticker=…` — `text/event-stream` of
//!   [`events::StreamEvent`]s
//! - `GET /health` — liveness

pub mod api;
pub mod events;
pub mod persist;
pub mod session;

pub use api::create_router;
pub use events::{AgentStatus, StreamEvent};
pub use session::{AnalysisResponse, SessionServices};
