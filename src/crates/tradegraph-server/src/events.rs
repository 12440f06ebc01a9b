//! SSE event schema
//!
//! Every event on `/analyze/stream` is one JSON object with a `type`
//! discriminator. Per session the contract is: at most one `report` event
//! per section, each followed by a `progress` bump; `agent_status`
//! transitions are monotone (`in_progress → completed`, or `→ error`);
//! exactly one terminal `complete` or `error` event.

use serde::Serialize;
use std::collections::HashMap;

/// Maximum characters in a `reasoning` fragment.
pub const REASONING_FRAGMENT_LIMIT: usize = 500;

/// Agent lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    InProgress,
    Completed,
    Error,
}

/// One server-sent event.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Free-form status line
    Status { message: String },

    /// Agent lifecycle transition
    AgentStatus { agent: String, status: AgentStatus },

    /// Truncated reasoning fragment from an agent
    Reasoning { agent: String, content: String },

    /// A report section became available (at most once per section)
    Report { section: String, content: String },

    /// Progress percentage as a string ("0".."100")
    Progress { content: String },

    /// Terminal success event
    Complete { message: String, signal: String },

    /// Terminal failure event
    Error { message: String },
}

impl StreamEvent {
    /// Reasoning fragment, truncated to the contract limit.
    pub fn reasoning(agent: impl Into<String>, content: &str) -> Self {
        let content: String = content.chars().take(REASONING_FRAGMENT_LIMIT).collect();
        StreamEvent::Reasoning {
            agent: agent.into(),
            content,
        }
    }

    /// Progress bump.
    pub fn progress(percent: u8) -> Self {
        StreamEvent::Progress {
            content: percent.to_string(),
        }
    }
}

/// Tracks per-agent status and suppresses non-forward transitions, keeping
/// the emitted sequence monotone even when several internal events map to
/// the same agent.
#[derive(Debug, Default)]
pub struct AgentTracker {
    statuses: HashMap<String, AgentStatus>,
}

impl AgentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transition; returns the event to emit, or `None` when the
    /// transition would repeat or move backwards.
    pub fn transition(&mut self, agent: &str, status: AgentStatus) -> Option<StreamEvent> {
        let rank = |s: AgentStatus| match s {
            AgentStatus::InProgress => 0,
            AgentStatus::Completed => 1,
            AgentStatus::Error => 1,
        };

        match self.statuses.get(agent) {
            Some(current) if rank(*current) >= rank(status) => None,
            _ => {
                self.statuses.insert(agent.to_string(), status);
                Some(StreamEvent::AgentStatus {
                    agent: agent.to_string(),
                    status,
                })
            }
        }
    }
}
