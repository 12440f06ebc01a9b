//! Session orchestration: graph wiring, SSE mapping, response assembly
//!
//! A session is one end-to-end analysis for `(ticker, trade_date)`. The
//! server builds a per-session runtime (shared tool cache, fresh ledger and
//! deadline), compiles the analysis graph, and either invokes it
//! synchronously (`run_session`) or maps its execution events onto the SSE
//! schema (`stream_session`).
//!
//! Progress mapping: each report section has a fixed percentage; a section
//! is announced at most once (the reducers guarantee at most one non-empty
//! assignment, the emitted-set guards the stream side).

use crate::events::{AgentStatus, AgentTracker, StreamEvent};
use crate::persist;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio_stream::Stream;
use tradegraph_agents::config::AnalysisConfig;
use tradegraph_agents::context::ContextProjector;
use tradegraph_agents::graph::build_analysis_graph;
use tradegraph_agents::invoker::ToolInvoker;
use tradegraph_agents::runtime::AgentRuntime;
use tradegraph_agents::signal::SignalProcessor;
use tradegraph_agents::state::{fields, get_str, initial_state};
use tradegraph_agents::tools::{standard_toolkits, ToolRegistry};
use tradegraph_core::cache::TtlCache;
use tradegraph_core::stream::ExecutionEvent;
use tradegraph_core::GraphError;
use tradegraph_llm::traits::ChatModel;

/// Completed analysis payload returned by `POST /analyze` and persisted to
/// disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub ticker: String,
    pub analysis_date: String,
    pub market_report: String,
    pub sentiment_report: String,
    pub news_report: String,
    pub fundamentals_report: String,
    pub investment_plan: String,
    pub trader_investment_plan: String,
    pub final_trade_decision: String,
    pub processed_signal: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Process-wide services shared across sessions.
pub struct SessionServices {
    pub model: Arc<dyn ChatModel>,
    pub quick_model: Arc<dyn ChatModel>,
    pub registry: Arc<ToolRegistry>,
    pub tool_cache: Arc<TtlCache<String>>,
    pub base_config: AnalysisConfig,
}

impl SessionServices {
    /// Build a fresh per-session runtime: shared cache, fresh ledger and
    /// deadline.
    pub fn runtime(&self) -> Arc<AgentRuntime> {
        let config = Arc::new(self.base_config.clone());
        let invoker = Arc::new(ToolInvoker::new(
            self.registry.clone(),
            self.tool_cache.clone(),
            config.clone(),
        ));
        Arc::new(AgentRuntime {
            model: self.model.clone(),
            quick_model: self.quick_model.clone(),
            invoker,
            registry: self.registry.clone(),
            toolkits: Arc::new(standard_toolkits()),
            projector: Arc::new(ContextProjector::new()),
            config: config.clone(),
            deadline: Instant::now() + config.execution_timeout,
        })
    }
}

/// Strip and uppercase a ticker; `None` when empty.
pub fn normalize_ticker(raw: &str) -> Option<String> {
    let ticker = raw.trim().to_uppercase();
    if ticker.is_empty() {
        None
    } else {
        Some(ticker)
    }
}

/// Today's analysis date in ISO form.
pub fn default_trade_date() -> String {
    chrono::Utc::now().date_naive().to_string()
}

/// Section → (progress %, owning agent). Order matters: it is the canonical
/// pipeline order for progress bumps.
const SECTION_PROGRESS: [(&str, u8, &str); 7] = [
    (fields::MARKET_REPORT, 25, "market"),
    (fields::SENTIMENT_REPORT, 40, "social"),
    (fields::NEWS_REPORT, 55, "news"),
    (fields::FUNDAMENTALS_REPORT, 70, "fundamentals"),
    (fields::INVESTMENT_PLAN, 85, "research_manager"),
    (fields::TRADER_INVESTMENT_PLAN, 90, "trader"),
    (fields::FINAL_TRADE_DECISION, 95, "risk_judge"),
];

/// SSE agent label for a graph node.
fn agent_for_node(node: &str) -> Option<&'static str> {
    match node {
        "market_analyst" => Some("market"),
        "social_analyst" => Some("social"),
        "news_analyst" => Some("news"),
        "fundamentals_analyst" => Some("fundamentals"),
        "bull_researcher" => Some("bull"),
        "bear_researcher" => Some("bear"),
        "debate_judge" => Some("judge"),
        "research_manager" => Some("research_manager"),
        "trader" => Some("trader"),
        "aggressive_risk" => Some("risky"),
        "conservative_risk" => Some("safe"),
        "neutral_risk" => Some("neutral"),
        "risk_judge" => Some("risk_judge"),
        _ => None,
    }
}

/// User-facing message for a fatal session error; never leaks internals
/// beyond the error display.
pub fn user_message(err: &GraphError) -> String {
    match err {
        GraphError::Timeout(_) => "timeout".to_string(),
        GraphError::GraphLimitExceeded { .. } => "graph limit exceeded".to_string(),
        other => other.to_string(),
    }
}

/// Map one committed node update onto SSE events.
fn map_update(
    update: &Value,
    tracker: &mut AgentTracker,
    emitted: &mut HashSet<&'static str>,
) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    for (section, percent, agent) in SECTION_PROGRESS {
        let content = update.get(section).and_then(Value::as_str).unwrap_or("");
        if content.is_empty() || emitted.contains(section) {
            continue;
        }
        emitted.insert(section);

        if let Some(event) = tracker.transition(agent, AgentStatus::Completed) {
            events.push(event);
        }
        events.push(StreamEvent::Report {
            section: section.to_string(),
            content: content.to_string(),
        });
        events.push(StreamEvent::progress(percent));
    }

    // Reasoning fragments from debate turns.
    if let Some(response) = update
        .get(fields::INVESTMENT_DEBATE_STATE)
        .and_then(|d| d.get("current_response"))
        .and_then(Value::as_str)
    {
        if !response.is_empty() {
            let agent = if response.starts_with("Bull") { "bull" } else { "bear" };
            events.push(StreamEvent::reasoning(agent, response));
        }
    }
    if let Some(risk) = update.get(fields::RISK_DEBATE_STATE) {
        for (field, agent) in [
            ("current_risky_response", "risky"),
            ("current_safe_response", "safe"),
            ("current_neutral_response", "neutral"),
        ] {
            if let Some(response) = risk.get(field).and_then(Value::as_str) {
                if !response.is_empty() {
                    events.push(StreamEvent::reasoning(agent, response));
                }
            }
        }
    }

    events
}

/// Build the response payload from a final state.
pub fn response_from_state(
    ticker: &str,
    date: &str,
    state: &Value,
    signal: String,
    error: Option<String>,
) -> AnalysisResponse {
    AnalysisResponse {
        ticker: ticker.to_string(),
        analysis_date: date.to_string(),
        market_report: get_str(state, fields::MARKET_REPORT).to_string(),
        sentiment_report: get_str(state, fields::SENTIMENT_REPORT).to_string(),
        news_report: get_str(state, fields::NEWS_REPORT).to_string(),
        fundamentals_report: get_str(state, fields::FUNDAMENTALS_REPORT).to_string(),
        investment_plan: get_str(state, fields::INVESTMENT_PLAN).to_string(),
        trader_investment_plan: get_str(state, fields::TRADER_INVESTMENT_PLAN).to_string(),
        final_trade_decision: get_str(state, fields::FINAL_TRADE_DECISION).to_string(),
        processed_signal: signal,
        error,
    }
}

fn error_response(ticker: &str, date: &str, message: String) -> AnalysisResponse {
    AnalysisResponse {
        ticker: ticker.to_string(),
        analysis_date: date.to_string(),
        market_report: String::new(),
        sentiment_report: String::new(),
        news_report: String::new(),
        fundamentals_report: String::new(),
        investment_plan: String::new(),
        trader_investment_plan: String::new(),
        final_trade_decision: String::new(),
        processed_signal: String::new(),
        error: Some(message),
    }
}

async fn maybe_persist(services: &SessionServices, response: &AnalysisResponse) {
    if let Some(dir) = &services.base_config.results_dir {
        if let Err(err) = persist::persist_session(dir, response).await {
            tracing::warn!(error = %err, "failed to persist session artifacts");
        }
    }
}

/// Run a session synchronously and return the completed response. Fatal
/// errors are folded into the response's `error` field.
pub async fn run_session(
    services: Arc<SessionServices>,
    ticker: String,
    date: String,
) -> AnalysisResponse {
    let session_id = uuid::Uuid::new_v4();
    tracing::info!(%session_id, %ticker, %date, "starting analysis session");

    let rt = services.runtime();
    let graph = match build_analysis_graph(rt) {
        Ok(graph) => graph,
        Err(err) => return error_response(&ticker, &date, user_message(&err)),
    };

    match graph.invoke(initial_state(&ticker, &date)).await {
        Ok(state) => {
            let decision = get_str(&state, fields::FINAL_TRADE_DECISION);
            let signal = SignalProcessor::new(services.quick_model.clone())
                .process(decision)
                .await;
            let response = response_from_state(&ticker, &date, &state, signal, None);
            maybe_persist(&services, &response).await;
            tracing::info!(%session_id, signal = %response.processed_signal, "session complete");
            response
        }
        Err(err) => {
            tracing::warn!(%session_id, error = %err, "session failed");
            error_response(&ticker, &date, user_message(&err))
        }
    }
}

/// Run a session, streaming SSE events as it progresses. The stream always
/// terminates with exactly one `complete` or `error` event.
pub fn stream_session(
    services: Arc<SessionServices>,
    ticker: String,
    date: String,
) -> impl Stream<Item = StreamEvent> {
    async_stream::stream! {
        let mut tracker = AgentTracker::new();
        let mut emitted: HashSet<&'static str> = HashSet::new();

        yield StreamEvent::Status {
            message: format!("Starting analysis for {ticker}..."),
        };
        for kind in &services.base_config.selected_analysts {
            if let Some(event) = tracker.transition(kind.as_str(), AgentStatus::InProgress) {
                yield event;
            }
        }
        yield StreamEvent::progress(5);

        let rt = services.runtime();
        let graph = match build_analysis_graph(rt) {
            Ok(graph) => graph,
            Err(err) => {
                yield StreamEvent::Error { message: user_message(&err) };
                return;
            }
        };

        let mut execution = Box::pin(graph.stream(initial_state(&ticker, &date)));
        let mut final_state: Option<Value> = None;

        while let Some(item) = execution.next().await {
            match item {
                Ok(ExecutionEvent::NodeStarted { node }) => {
                    if let Some(agent) = agent_for_node(&node) {
                        if let Some(event) = tracker.transition(agent, AgentStatus::InProgress) {
                            yield event;
                        }
                    }
                }
                Ok(ExecutionEvent::NodeCompleted { node, update }) => {
                    for event in map_update(&update, &mut tracker, &mut emitted) {
                        yield event;
                    }
                    if let Some(agent) = agent_for_node(&node) {
                        if let Some(event) = tracker.transition(agent, AgentStatus::Completed) {
                            yield event;
                        }
                    }
                }
                Ok(ExecutionEvent::Completed { state }) => {
                    final_state = Some(state);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "streamed session failed");
                    yield StreamEvent::Error { message: user_message(&err) };
                    return;
                }
            }
        }

        let Some(state) = final_state else {
            yield StreamEvent::Error {
                message: "execution ended without a terminal state".to_string(),
            };
            return;
        };

        let decision = get_str(&state, fields::FINAL_TRADE_DECISION).to_string();
        let signal = SignalProcessor::new(services.quick_model.clone())
            .process(&decision)
            .await;

        let response = response_from_state(&ticker, &date, &state, signal.clone(), None);
        maybe_persist(&services, &response).await;

        yield StreamEvent::progress(100);
        yield StreamEvent::Complete {
            message: format!("Analysis complete for {ticker}"),
            signal,
        };
    }
}
