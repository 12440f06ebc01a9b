//! Parallel risk debate: orchestrator, three debators, aggregator, judge
//!
//! The orchestrator seeds the risk record; the three perspective debators
//! run as a graph fan-out, each over its projected context slice, and write
//! disjoint `current_*` fields plus their own histories. The aggregator is
//! the fan-in barrier: it assembles the combined history in stable order
//! (risky → safe → neutral). The judge renders `final_trade_decision`.
//!
//! Cancellation contract: a debator that cannot finish before the session
//! deadline commits a deterministic stub instead of failing, so the
//! aggregator always has three inputs and the judge decides on a degraded
//! basis.

use crate::context::{Perspective, ProjectionInput};
use crate::prompts;
use crate::runtime::AgentRuntime;
use crate::state::{fields, get_record, get_str, RiskDebateState};
use crate::tokens::truncate_end;
use serde_json::{json, Value};
use std::sync::Arc;
use tradegraph_core::node::{NodeExecutor, NodeOutput};
use tradegraph_core::GraphError;
use tradegraph_llm::messages::Message;
use tradegraph_llm::retry::safe_chat;
use tradegraph_llm::traits::ChatRequest;

/// Character cap per risk response (end-truncated on overflow).
pub const RISK_RESPONSE_CHAR_CAP: usize = 2_400;

/// Deterministic stub committed by a cancelled debator.
pub fn cancellation_stub(perspective: Perspective) -> String {
    format!(
        "Analysis cancelled due to timeout - {} risk perspective unavailable",
        title(perspective)
    )
}

fn title(perspective: Perspective) -> &'static str {
    match perspective {
        Perspective::Aggressive => "Aggressive",
        Perspective::Conservative => "Conservative",
        Perspective::Neutral => "Neutral",
    }
}

fn projection_input(state: &Value) -> ProjectionInput {
    ProjectionInput {
        investment_plan: get_str(state, fields::INVESTMENT_PLAN).to_string(),
        trader_decision: get_str(state, fields::TRADER_INVESTMENT_PLAN).to_string(),
        market_report: get_str(state, fields::MARKET_REPORT).to_string(),
        sentiment_report: get_str(state, fields::SENTIMENT_REPORT).to_string(),
        news_report: get_str(state, fields::NEWS_REPORT).to_string(),
        fundamentals_report: get_str(state, fields::FUNDAMENTALS_REPORT).to_string(),
    }
}

/// Full, unprojected context fallback (smart context disabled).
fn full_context_block(input: &ProjectionInput) -> String {
    format!(
        "Investment Plan: {}\nTrader Decision: {}\nMarket Data: {}\nSentiment: {}\nNews: {}\nFundamentals: {}",
        input.investment_plan,
        input.trader_decision,
        input.market_report,
        input.sentiment_report,
        input.news_report,
        input.fundamentals_report,
    )
}

/// Orchestrator: seed the risk record before the fan-out.
pub fn risk_orchestrator_node(_rt: Arc<AgentRuntime>) -> NodeExecutor {
    tradegraph_core::node::executor(move |state: Value| async move {
        let plan_ready = !get_str(&state, fields::TRADER_INVESTMENT_PLAN).is_empty();
        tracing::info!(plan_ready, "risk debate starting");
        Ok(NodeOutput::Update(json!({
            (fields::RISK_DEBATE_STATE): {},
        })))
    })
}

/// One perspective debator.
pub fn risk_debator_node(perspective: Perspective, rt: Arc<AgentRuntime>) -> NodeExecutor {
    tradegraph_core::node::executor(move |state: Value| {
        let rt = rt.clone();
        async move {
            let input = projection_input(&state);
            let context = if rt.config.enable_smart_context {
                rt.projector.project(perspective, &input)
            } else {
                full_context_block(&input)
            };

            let request = ChatRequest::new(vec![
                Message::system(format!("You are the {} risk analyst.", perspective)),
                Message::human(prompts::risk_debator_prompt(
                    perspective,
                    &context,
                    rt.config.word_limit("risk_debator"),
                )),
            ]);

            let remaining = rt.remaining();
            let content = if remaining.is_zero() {
                tracing::warn!(%perspective, "session deadline already passed; stubbing perspective");
                cancellation_stub(perspective)
            } else {
                let outcome = tokio::time::timeout(
                    remaining,
                    safe_chat(rt.model.as_ref(), request, &rt.llm_retry()),
                )
                .await;
                match outcome {
                    Err(_) => {
                        tracing::warn!(%perspective, "risk debator cancelled at session deadline");
                        cancellation_stub(perspective)
                    }
                    Ok(Err(err)) => {
                        tracing::warn!(%perspective, error = %err, "risk debator failed; degrading");
                        format!("Error in {} analysis: {err}", perspective)
                    }
                    Ok(Ok(response)) => {
                        truncate_end(&response.message.content, RISK_RESPONSE_CHAR_CAP)
                    }
                }
            };

            let labeled = format!("{}: {content}", perspective.speaker());

            Ok(NodeOutput::Update(json!({
                (fields::RISK_DEBATE_STATE): {
                    perspective.current_field(): content,
                    perspective.history_field(): labeled,
                    "latest_speaker": perspective.speaker(),
                }
            })))
        }
    })
}

/// Aggregator: all three perspectives committed (fan-in barrier); assemble
/// the combined history in stable order.
pub fn risk_aggregator_node(_rt: Arc<AgentRuntime>) -> NodeExecutor {
    tradegraph_core::node::executor(move |state: Value| async move {
        let risk: RiskDebateState = get_record(&state, fields::RISK_DEBATE_STATE);

        let mut parts = Vec::new();
        for (response, speaker) in [
            (&risk.current_risky_response, "Risky Analyst"),
            (&risk.current_safe_response, "Safe Analyst"),
            (&risk.current_neutral_response, "Neutral Analyst"),
        ] {
            if response.is_empty() {
                // Barrier guarantees arrival; an empty field can only mean a
                // debator lost its write, which breaks the judge's contract.
                return Err(GraphError::node_execution(
                    "risk_aggregator",
                    format!("missing {speaker} response"),
                ));
            }
            parts.push(format!("{speaker}: {response}"));
        }

        Ok(NodeOutput::Update(json!({
            (fields::RISK_DEBATE_STATE): {
                "history": parts.join("\n\n"),
                "count": 1,
            }
        })))
    })
}

/// Risk judge: final trade decision over the aggregated debate. Fatal on
/// failure; there is no safe default decision.
pub fn risk_judge_node(rt: Arc<AgentRuntime>) -> NodeExecutor {
    tradegraph_core::node::executor(move |state: Value| {
        let rt = rt.clone();
        async move {
            let risk: RiskDebateState = get_record(&state, fields::RISK_DEBATE_STATE);
            let trader_plan = get_str(&state, fields::TRADER_INVESTMENT_PLAN);

            let degraded = [
                &risk.current_risky_response,
                &risk.current_safe_response,
                &risk.current_neutral_response,
            ]
            .iter()
            .any(|r| r.contains("cancelled"));

            let request = ChatRequest::new(vec![
                Message::system("You are the risk judge.".to_string()),
                Message::human(prompts::risk_judge_prompt(
                    &risk.history,
                    trader_plan,
                    degraded,
                    rt.config.word_limit("risk_judge"),
                )),
            ]);
            let response = safe_chat(rt.model.as_ref(), request, &rt.llm_retry())
                .await
                .map_err(|e| GraphError::node_execution("risk_judge", e))?;
            let decision = response.message.content;

            Ok(NodeOutput::Update(json!({
                (fields::FINAL_TRADE_DECISION): decision.clone(),
                (fields::RISK_DEBATE_STATE): {
                    "judge_decision": decision,
                },
            })))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::context::ContextProjector;
    use crate::invoker::ToolInvoker;
    use crate::state::{analysis_schema, initial_state};
    use crate::tools::{standard_toolkits, ToolRegistry};
    use std::time::{Duration, Instant};
    use tradegraph_core::cache::TtlCache;
    use tradegraph_llm::scripted::ScriptedModel;
    use tradegraph_llm::traits::ChatModel;

    fn runtime_with_deadline(
        model: Arc<dyn ChatModel>,
        deadline: Instant,
    ) -> Arc<AgentRuntime> {
        let registry = Arc::new(ToolRegistry::new());
        let config = Arc::new(AnalysisConfig::default());
        let invoker = Arc::new(ToolInvoker::new(
            registry.clone(),
            Arc::new(TtlCache::new(16, config.tool_cache_ttl)),
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
            deadline,
        })
    }

    fn runtime(model: Arc<dyn ChatModel>) -> Arc<AgentRuntime> {
        runtime_with_deadline(model, Instant::now() + Duration::from_secs(120))
    }

    fn state_with_plan() -> Value {
        let mut state = initial_state("AAPL", "2025-01-02");
        state[fields::INVESTMENT_PLAN] = json!("growth plan with risk caveats");
        state[fields::TRADER_INVESTMENT_PLAN] = json!("ACTION: BUY, size 3%");
        state[fields::MARKET_REPORT] = json!("Bullish signal on daily.\nResistance strong at 200.");
        state
    }

    #[tokio::test]
    async fn test_debator_writes_its_fields() {
        let model = Arc::new(ScriptedModel::new("ride the momentum, size up"));
        let rt = runtime(model);
        let node = risk_debator_node(Perspective::Aggressive, rt);

        let NodeOutput::Update(update) = node(state_with_plan()).await.unwrap() else {
            panic!("expected update")
        };
        let record = &update[fields::RISK_DEBATE_STATE];
        assert_eq!(record["current_risky_response"], "ride the momentum, size up");
        assert!(record["risky_history"]
            .as_str()
            .unwrap()
            .starts_with("Risky Analyst:"));
        assert_eq!(record["latest_speaker"], "Risky Analyst");
    }

    #[tokio::test]
    async fn test_expired_deadline_produces_stub() {
        let model = Arc::new(ScriptedModel::new("should never be reached"));
        // Deadline already in the past: the debator must stub out.
        let rt = runtime_with_deadline(model, Instant::now());
        let node = risk_debator_node(Perspective::Conservative, rt);

        let NodeOutput::Update(update) = node(state_with_plan()).await.unwrap() else {
            panic!("expected update")
        };
        let response = update[fields::RISK_DEBATE_STATE]["current_safe_response"]
            .as_str()
            .unwrap();
        assert!(response.contains("cancelled"));
        assert!(response.contains("Conservative"));
    }

    #[tokio::test]
    async fn test_aggregator_orders_risky_safe_neutral() {
        let model = Arc::new(ScriptedModel::new("unused"));
        let rt = runtime(model);
        let schema = analysis_schema();
        let mut state = state_with_plan();
        schema
            .apply(
                &mut state,
                &json!({(fields::RISK_DEBATE_STATE): {
                    "current_risky_response": "lever up",
                    "current_safe_response": "hedge everything",
                    "current_neutral_response": "balanced sizing",
                }}),
            )
            .unwrap();

        let node = risk_aggregator_node(rt);
        let NodeOutput::Update(update) = node(state).await.unwrap() else {
            panic!("expected update")
        };
        let history = update[fields::RISK_DEBATE_STATE]["history"]
            .as_str()
            .unwrap();
        let risky = history.find("Risky Analyst").unwrap();
        let safe = history.find("Safe Analyst").unwrap();
        let neutral = history.find("Neutral Analyst").unwrap();
        assert!(risky < safe && safe < neutral);
        assert_eq!(update[fields::RISK_DEBATE_STATE]["count"], 1);
    }

    #[tokio::test]
    async fn test_aggregator_rejects_missing_perspective() {
        let model = Arc::new(ScriptedModel::new("unused"));
        let rt = runtime(model);
        let node = risk_aggregator_node(rt);
        let err = node(state_with_plan()).await.unwrap_err();
        assert!(matches!(err, GraphError::NodeExecution { .. }));
    }

    #[tokio::test]
    async fn test_full_parallel_round_with_one_stub_then_judge() {
        let model = Arc::new(ScriptedModel::new("perspective response"));
        let rt = runtime(model);
        let schema = analysis_schema();
        let mut state = state_with_plan();

        // Two live perspectives plus one deterministic stub, merged exactly
        // as the three concurrent debators would commit them.
        for (perspective, response) in [
            (Perspective::Aggressive, "upside is large".to_string()),
            (Perspective::Conservative, cancellation_stub(Perspective::Conservative)),
            (Perspective::Neutral, "stay balanced".to_string()),
        ] {
            schema
                .apply(
                    &mut state,
                    &json!({(fields::RISK_DEBATE_STATE): {
                        perspective.current_field(): response,
                        perspective.history_field():
                            format!("{}: {response}", perspective.speaker()),
                    }}),
                )
                .unwrap();
        }

        let aggregator = risk_aggregator_node(rt.clone());
        let NodeOutput::Update(update) = aggregator(state.clone()).await.unwrap() else {
            panic!("expected update")
        };
        schema.apply(&mut state, &update).unwrap();

        let risk: RiskDebateState = get_record(&state, fields::RISK_DEBATE_STATE);
        assert_eq!(risk.history.matches("Analyst:").count(), 3);
        assert!(risk.history.contains("cancelled"));

        let judge_model = Arc::new(ScriptedModel::new(
            "HOLD - with reduced confidence given the missing conservative view",
        ));
        let judge = risk_judge_node(runtime(judge_model));
        let NodeOutput::Update(update) = judge(state).await.unwrap() else {
            panic!("expected update")
        };
        let decision = update[fields::FINAL_TRADE_DECISION].as_str().unwrap();
        assert!(decision.contains("reduced confidence"));
    }

    #[tokio::test]
    async fn test_debator_full_context_fallback() {
        let model = Arc::new(ScriptedModel::new("full context response"));
        let registry = Arc::new(ToolRegistry::new());
        let config = Arc::new(
            AnalysisConfig::builder().enable_smart_context(false).build(),
        );
        let invoker = Arc::new(ToolInvoker::new(
            registry.clone(),
            Arc::new(TtlCache::new(16, config.tool_cache_ttl)),
            config.clone(),
        ));
        let rt = Arc::new(AgentRuntime {
            model: model.clone(),
            quick_model: model,
            invoker,
            registry,
            toolkits: Arc::new(standard_toolkits()),
            projector: Arc::new(ContextProjector::new()),
            config,
            deadline: Instant::now() + Duration::from_secs(120),
        });

        let node = risk_debator_node(Perspective::Neutral, rt.clone());
        let NodeOutput::Update(update) = node(state_with_plan()).await.unwrap() else {
            panic!("expected update")
        };
        assert_eq!(
            update[fields::RISK_DEBATE_STATE]["current_neutral_response"],
            "full context response"
        );
        // The projector was bypassed entirely.
        assert_eq!(rt.projector.cache_stats().0, 0);
    }

    #[test]
    fn test_stub_wording_is_deterministic() {
        assert_eq!(
            cancellation_stub(Perspective::Aggressive),
            "Analysis cancelled due to timeout - Aggressive risk perspective unavailable"
        );
    }
}
