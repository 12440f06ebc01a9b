//! Analyst loop kernel and dispatcher
//!
//! The dispatcher spawns one dynamic task per selected analyst, each seeded
//! with its own message channel. An analyst node then drives the
//! LLM ↔ tools loop to a final report:
//!
//! 1. repair the channel for tool soundness
//! 2. call the model with the analyst's toolkit bound
//! 3. tool calls? filter to the toolkit, consult the budget, execute the
//!    survivors concurrently, append results, loop — unless the budget or
//!    the channel soft bound tripped, in which case force-complete
//! 4. no tool calls? with data fetched this is the final report; without,
//!    the analyst failed and reports a warning sentinel
//!
//! The news analyst's report is scrubbed of social-media source names
//! before it is committed.

use crate::messages::{
    has_tool_results, last_ai_content, messages_from_value, validate_message_sequence,
};
use crate::prompts;
use crate::runtime::AgentRuntime;
use crate::state::fields;
use crate::tokens::enforce_report_cap;
use crate::tools::AnalystKind;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::sync::OnceLock;
use tradegraph_core::node::{NodeExecutor, NodeOutput};
use tradegraph_core::send::Send as SendTask;
use tradegraph_llm::messages::Message;
use tradegraph_llm::retry::safe_chat;
use tradegraph_llm::traits::ChatRequest;

/// Sentinel produced when an analyst finished without fetching any data.
pub fn failure_sentinel(ticker: &str) -> String {
    format!("WARNING: analysis failed for {ticker}; no data retrieved")
}

/// Dispatcher: spawn one dynamic task per selected analyst, each with its
/// channel pre-initialized.
pub fn dispatcher_node(rt: Arc<AgentRuntime>) -> NodeExecutor {
    tradegraph_core::node::executor(move |state: Value| {
        let rt = rt.clone();
        async move {
            let ticker = state[fields::TICKER].as_str().unwrap_or("").to_string();
            let trade_date = state[fields::TRADE_DATE].as_str().unwrap_or("").to_string();

            tracing::info!(
                %ticker,
                %trade_date,
                analysts = rt.config.selected_analysts.len(),
                "dispatching analysts"
            );

            let initial = Message::human(prompts::dispatch_message(&ticker, &trade_date));

            let sends = rt
                .config
                .selected_analysts
                .iter()
                .map(|kind| {
                    let mut task_state = state.clone();
                    task_state[kind.message_field()] = json!([initial.clone()]);
                    task_state[kind.report_field()] = json!("");
                    SendTask::new(kind.node_name(), task_state)
                })
                .collect();

            Ok(NodeOutput::Sends(sends))
        }
    })
}

/// Analyst loop node for one analyst kind.
///
/// The social analyst uses the hard-coded parallel path in
/// [`crate::social`] instead; wiring routes it there.
pub fn analyst_node(kind: AnalystKind, rt: Arc<AgentRuntime>) -> NodeExecutor {
    tradegraph_core::node::executor(move |state: Value| {
        let rt = rt.clone();
        async move {
            let ticker = state[fields::TICKER].as_str().unwrap_or("").to_string();
            let trade_date = state[fields::TRADE_DATE].as_str().unwrap_or("").to_string();

            let allowed: Vec<String> = rt.toolkits.allowed(kind).to_vec();
            let system = Message::system(prompts::analyst_system(
                kind,
                &ticker,
                &trade_date,
                &allowed,
                rt.config.word_limit("analyst"),
            ));
            let definitions = rt.registry.definitions(&allowed);
            let ctx = rt.tool_context();

            let mut channel = messages_from_value(&state[kind.message_field()]);
            let report;

            loop {
                channel = validate_message_sequence(channel);

                let mut convo = vec![system.clone()];
                convo.extend(channel.iter().cloned());
                let request = ChatRequest::new(convo).with_tools(definitions.clone());

                let response = match safe_chat(rt.model.as_ref(), request, &rt.llm_retry()).await {
                    Ok(r) => r,
                    Err(err) => {
                        tracing::warn!(%kind, error = %err, "analyst model call failed; degrading to warning report");
                        report = failure_sentinel(&ticker);
                        break;
                    }
                };
                let ai = response.message;

                if !ai.has_tool_calls() {
                    if has_tool_results(&channel) {
                        report = ai.content.clone();
                        channel.push(ai);
                    } else {
                        tracing::warn!(%kind, %ticker, "analyst produced no tool calls and fetched no data");
                        channel.push(ai);
                        report = failure_sentinel(&ticker);
                    }
                    break;
                }

                // Filter the requested calls: out-of-toolkit calls are
                // answered with a refusal so the channel stays sound, budget
                // rejections likewise.
                let calls = ai.get_tool_calls().unwrap_or_default().to_vec();
                let mut slots: Vec<Option<Message>> = vec![None; calls.len()];
                let mut surviving = Vec::new();

                for (i, call) in calls.iter().enumerate() {
                    if !rt.toolkits.permits(kind, &call.name) {
                        tracing::warn!(%kind, tool = %call.name, "dropping out-of-toolkit call");
                        slots[i] = Some(
                            Message::tool(
                                format!("Tool '{}' is not available to this analyst", call.name),
                                &call.id,
                            )
                            .with_name(&call.name),
                        );
                        continue;
                    }
                    let (ok, reason) = rt.invoker.can_call(kind, &call.name, &call.args);
                    if !ok {
                        let reason = reason.unwrap_or_else(|| "rejected".to_string());
                        tracing::debug!(%kind, tool = %call.name, %reason, "tool call refused");
                        slots[i] = Some(
                            Message::tool(format!("Tool call rejected: {reason}"), &call.id)
                                .with_name(&call.name),
                        );
                        continue;
                    }
                    surviving.push((i, call.clone()));
                }

                let executed = rt
                    .invoker
                    .execute_parallel(
                        kind,
                        &surviving.iter().map(|(_, c)| c.clone()).collect::<Vec<_>>(),
                        &ctx,
                    )
                    .await;
                for ((slot, _), message) in surviving.iter().zip(executed) {
                    slots[*slot] = Some(message);
                }

                channel.push(ai);
                channel.extend(slots.into_iter().flatten());

                let budget_spent =
                    rt.invoker.total_calls(kind) >= rt.config.max_total_tool_calls_per_analyst;
                let channel_full = channel.len() > rt.config.message_soft_limit;
                if budget_spent || channel_full {
                    tracing::info!(%kind, budget_spent, channel_full, "force-completing analyst loop");
                    report = last_ai_content(&channel)
                        .map(str::to_string)
                        .unwrap_or_else(|| failure_sentinel(&ticker));
                    break;
                }
            }

            let mut report = enforce_report_cap(report, kind.report_field());
            if kind == AnalystKind::News {
                report = scrub_social_sources(&report);
            }

            Ok(NodeOutput::Update(json!({
                kind.message_field(): channel,
                kind.report_field(): report,
            })))
        }
    })
}

static SOCIAL_SOURCES: OnceLock<Regex> = OnceLock::new();

/// Replace social-media source names in the news report with a redaction
/// marker. The news report must never cite social chatter as news.
pub fn scrub_social_sources(report: &str) -> String {
    let pattern = SOCIAL_SOURCES.get_or_init(|| {
        Regex::new(r"(?i)wallstreetbets|stocktwits|twitter|reddit|wsb").expect("scrub pattern")
    });
    pattern.replace_all(report, "[redacted]").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::context::ContextProjector;
    use crate::invoker::ToolInvoker;
    use crate::state::initial_state;
    use crate::tools::{standard_toolkits, Tool, ToolContext, ToolError, ToolOutput, ToolRegistry};
    use async_trait::async_trait;
    use std::time::{Duration, Instant};
    use tradegraph_core::cache::TtlCache;
    use tradegraph_llm::messages::ToolCall;
    use tradegraph_llm::scripted::ScriptedModel;
    use tradegraph_llm::traits::ChatModel;

    struct StaticTool {
        name: &'static str,
        payload: &'static str,
        fail: bool,
    }

    #[async_trait]
    impl Tool for StaticTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "test data feed"
        }

        fn args_schema(&self) -> Value {
            json!({"type": "object", "properties": {"ticker": {"type": "string"}}})
        }

        async fn invoke(&self, _args: Value, _ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
            if self.fail {
                return Err(ToolError::Permanent("upstream 404".into()));
            }
            Ok(ToolOutput::text(self.payload))
        }
    }

    fn runtime_with_model(model: Arc<dyn ChatModel>) -> Arc<AgentRuntime> {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(StaticTool {
            name: "price_history",
            payload: "close=191.2 open=189.0",
            fail: false,
        }));
        registry.register(Arc::new(StaticTool {
            name: "news_search",
            payload: "",
            fail: true,
        }));
        registry.register(Arc::new(StaticTool {
            name: "company_news_wire",
            payload: "Wire: AAPL guidance raised. Discussion trending on reddit and twitter.",
            fail: false,
        }));

        let registry = Arc::new(registry);
        let config = Arc::new(AnalysisConfig::default());
        let invoker = Arc::new(ToolInvoker::new(
            registry.clone(),
            Arc::new(TtlCache::new(64, config.tool_cache_ttl)),
            config.clone(),
        ));

        Arc::new(AgentRuntime {
            model: model.clone(),
            quick_model: model,
            invoker,
            registry,
            toolkits: Arc::new(standard_toolkits()),
            projector: Arc::new(ContextProjector::new()),
            config,
            deadline: Instant::now() + Duration::from_secs(120),
        })
    }

    fn seeded_state(kind: AnalystKind) -> Value {
        let mut state = initial_state("AAPL", "2025-01-02");
        state[kind.message_field()] = json!([Message::human("Begin analysis for AAPL")]);
        state
    }

    #[tokio::test]
    async fn test_analyst_happy_path_tool_then_report() {
        let model = Arc::new(
            ScriptedModel::new("fallback").with_route(
                "market analyst",
                vec![
                    Message::ai("").with_tool_calls(vec![ToolCall::new(
                        "c1",
                        "price_history",
                        json!({"ticker": "AAPL"}),
                    )]),
                    Message::ai("Market report: uptrend intact, close 191.2."),
                ],
            ),
        );
        let rt = runtime_with_model(model);
        let node = analyst_node(AnalystKind::Market, rt.clone());

        let out = node(seeded_state(AnalystKind::Market)).await.unwrap();
        let NodeOutput::Update(update) = out else {
            panic!("expected update")
        };

        assert_eq!(
            update[fields::MARKET_REPORT],
            "Market report: uptrend intact, close 191.2."
        );
        let channel = messages_from_value(&update[fields::MARKET_MESSAGES]);
        assert!(channel.iter().any(|m| m.is_tool()));
        assert_eq!(rt.invoker.total_calls(AnalystKind::Market), 1);
    }

    #[tokio::test]
    async fn test_analyst_without_data_reports_sentinel() {
        let model = Arc::new(
            ScriptedModel::new("fallback")
                .with_route("market analyst", vec![Message::ai("no tools needed")]),
        );
        let rt = runtime_with_model(model);
        let node = analyst_node(AnalystKind::Market, rt);

        let out = node(seeded_state(AnalystKind::Market)).await.unwrap();
        let NodeOutput::Update(update) = out else {
            panic!("expected update")
        };
        assert_eq!(
            update[fields::MARKET_REPORT].as_str().unwrap(),
            failure_sentinel("AAPL")
        );
    }

    #[tokio::test]
    async fn test_out_of_toolkit_call_is_refused_but_channel_stays_sound() {
        let model = Arc::new(
            ScriptedModel::new("fallback").with_route(
                "market analyst",
                vec![
                    Message::ai("").with_tool_calls(vec![ToolCall::new(
                        "c1",
                        "reddit_sentiment",
                        json!({}),
                    )]),
                    Message::ai("report without social data"),
                ],
            ),
        );
        let rt = runtime_with_model(model);
        let node = analyst_node(AnalystKind::Market, rt.clone());

        let out = node(seeded_state(AnalystKind::Market)).await.unwrap();
        let NodeOutput::Update(update) = out else {
            panic!("expected update")
        };
        let channel = messages_from_value(&update[fields::MARKET_MESSAGES]);
        let refusal = channel
            .iter()
            .find(|m| m.is_tool() && m.tool_call_id.as_deref() == Some("c1"))
            .unwrap();
        assert!(refusal.content.contains("not available"));
        assert_eq!(rt.invoker.total_calls(AnalystKind::Market), 0);
    }

    #[tokio::test]
    async fn test_news_fallback_after_primary_failure_and_scrubbing() {
        let model = Arc::new(
            ScriptedModel::new("fallback").with_route(
                "news analyst",
                vec![
                    Message::ai("").with_tool_calls(vec![
                        ToolCall::new("n1", "news_search", json!({"q": "AAPL"})),
                        ToolCall::new("n2", "company_news_wire", json!({"ticker": "AAPL"})),
                    ]),
                    Message::ai(
                        "News report: guidance raised per wire. Chatter on reddit and Twitter is noise.",
                    ),
                ],
            ),
        );
        let rt = runtime_with_model(model);
        let node = analyst_node(AnalystKind::News, rt.clone());

        let out = node(seeded_state(AnalystKind::News)).await.unwrap();
        let NodeOutput::Update(update) = out else {
            panic!("expected update")
        };

        let report = update[fields::NEWS_REPORT].as_str().unwrap();
        assert!(!report.is_empty());
        let lowered = report.to_lowercase();
        for banned in ["reddit", "wsb", "wallstreetbets", "stocktwits", "twitter"] {
            assert!(!lowered.contains(banned), "unscrubbed source: {banned}");
        }
        assert!(report.contains("[redacted]"));

        // One failed primary + one successful fallback, both answered.
        let channel = messages_from_value(&update[fields::NEWS_MESSAGES]);
        let tool_msgs: Vec<_> = channel.iter().filter(|m| m.is_tool()).collect();
        assert_eq!(tool_msgs.len(), 2);
        assert!(tool_msgs[0].content.contains("Tool error"));
        assert!(tool_msgs[1].content.contains("guidance raised"));
        assert!(rt.invoker.total_calls(AnalystKind::News) <= 3);
    }

    #[tokio::test]
    async fn test_budget_forces_completion() {
        // The model keeps asking for tools forever; the budget must stop it.
        let mut turns = Vec::new();
        for i in 0..6 {
            turns.push(
                Message::ai(format!("thinking step {i}")).with_tool_calls(vec![ToolCall::new(
                    format!("c{i}"),
                    "price_history",
                    json!({"step": i}),
                )]),
            );
        }
        let model = Arc::new(ScriptedModel::new("fallback").with_route("market analyst", turns));
        let rt = runtime_with_model(model);
        let node = analyst_node(AnalystKind::Market, rt.clone());

        let out = node(seeded_state(AnalystKind::Market)).await.unwrap();
        let NodeOutput::Update(update) = out else {
            panic!("expected update")
        };

        assert!(rt.invoker.total_calls(AnalystKind::Market) <= 3);
        // Force-completed with the last assistant content.
        assert!(update[fields::MARKET_REPORT]
            .as_str()
            .unwrap()
            .starts_with("thinking step"));
    }

    #[tokio::test]
    async fn test_dispatcher_spawns_selected_analysts() {
        let model = Arc::new(ScriptedModel::new("fallback"));
        let rt = runtime_with_model(model);
        let node = dispatcher_node(rt);

        let out = node(initial_state("AAPL", "2025-01-02")).await.unwrap();
        let NodeOutput::Sends(sends) = out else {
            panic!("expected sends")
        };
        assert_eq!(sends.len(), 4);

        let market = sends.iter().find(|s| s.node() == "market_analyst").unwrap();
        let channel = messages_from_value(&market.state()[fields::MARKET_MESSAGES]);
        assert_eq!(channel.len(), 1);
        assert!(channel[0].content.contains("AAPL"));
    }

    #[test]
    fn test_scrub_is_case_insensitive() {
        let scrubbed = scrub_social_sources("Seen on Reddit, WSB, StockTwits and TWITTER");
        let lowered = scrubbed.to_lowercase();
        for banned in ["reddit", "wsb", "stocktwits", "twitter"] {
            assert!(!lowered.contains(banned));
        }
    }
}
