//! Investment debate: bull, bear, judge, research manager
//!
//! Rounds alternate bull → bear → judge. The judge renders a structured
//! verdict (`CONSENSUS REACHED`, unresolved points, next-round focus,
//! `QUALITY SCORE`); the conditional edge after the judge loops back to the
//! bull until consensus is reached or the round cap trips, then the
//! research manager synthesizes the investment plan.
//!
//! An unparseable verdict is treated as no-consensus with quality 5. When
//! `force_consensus_threshold` is configured, a round whose quality score
//! reaches the threshold concludes the debate even on a "no" verdict.

use crate::prompts;
use crate::runtime::AgentRuntime;
use crate::state::{fields, get_record, get_str, InvestDebateState, ResearchDebateState};
use regex::Regex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::sync::OnceLock;
use tradegraph_core::node::{NodeExecutor, NodeOutput};
use tradegraph_core::send::ConditionalEdgeResult;
use tradegraph_core::GraphError;
use tradegraph_llm::messages::Message;
use tradegraph_llm::retry::safe_chat;
use tradegraph_llm::traits::ChatRequest;

/// Parsed judge verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeVerdict {
    pub consensus_reached: bool,
    pub quality_score: i64,
    pub feedback: String,
}

/// Default quality score when the verdict cannot be parsed.
pub const DEFAULT_QUALITY_SCORE: i64 = 5;

/// Concatenated analyst reports with section headers.
pub fn reports_block(state: &Value) -> String {
    format!(
        "MARKET:\n{}\n\nSENTIMENT:\n{}\n\nNEWS:\n{}\n\nFUNDAMENTALS:\n{}",
        get_str(state, fields::MARKET_REPORT),
        get_str(state, fields::SENTIMENT_REPORT),
        get_str(state, fields::NEWS_REPORT),
        get_str(state, fields::FUNDAMENTALS_REPORT),
    )
}

fn researcher_node(bull: bool, rt: Arc<AgentRuntime>) -> NodeExecutor {
    tradegraph_core::node::executor(move |state: Value| {
        let rt = rt.clone();
        async move {
            let node_name = if bull { "bull_researcher" } else { "bear_researcher" };
            let debate: InvestDebateState = get_record(&state, fields::INVESTMENT_DEBATE_STATE);
            let research: ResearchDebateState =
                get_record(&state, fields::RESEARCH_DEBATE_STATE);
            let reports = reports_block(&state);

            let word_limit = rt.config.word_limit("researcher");
            let prompt = if bull {
                prompts::bull_prompt(&reports, &debate.history, &research.judge_feedback, word_limit)
            } else {
                prompts::bear_prompt(&reports, &debate.history, &research.judge_feedback, word_limit)
            };
            let role = if bull { "bull researcher" } else { "bear researcher" };
            let request = ChatRequest::new(vec![
                Message::system(format!("You are the {role} in an investment debate.")),
                Message::human(prompt),
            ]);

            let response = safe_chat(rt.model.as_ref(), request, &rt.llm_retry())
                .await
                .map_err(|e| GraphError::node_execution(node_name, e))?;

            let speaker = if bull { "Bull Analyst" } else { "Bear Analyst" };
            let argument = format!("{speaker}: {}", response.message.content);
            let history_field = if bull { "bull_history" } else { "bear_history" };

            Ok(NodeOutput::Update(json!({
                (fields::INVESTMENT_DEBATE_STATE): {
                    history_field: argument,
                    "history": argument,
                    "current_response": argument,
                    "count": debate.count + 1,
                }
            })))
        }
    })
}

/// Bull researcher node.
pub fn bull_node(rt: Arc<AgentRuntime>) -> NodeExecutor {
    researcher_node(true, rt)
}

/// Bear researcher node.
pub fn bear_node(rt: Arc<AgentRuntime>) -> NodeExecutor {
    researcher_node(false, rt)
}

/// Debate judge node: verdict, round accounting, conclusion detection.
pub fn judge_node(rt: Arc<AgentRuntime>) -> NodeExecutor {
    tradegraph_core::node::executor(move |state: Value| {
        let rt = rt.clone();
        async move {
            let debate: InvestDebateState = get_record(&state, fields::INVESTMENT_DEBATE_STATE);
            let research: ResearchDebateState =
                get_record(&state, fields::RESEARCH_DEBATE_STATE);
            let round = research.round_count + 1;

            let request = ChatRequest::new(vec![
                Message::system("You are the debate judge.".to_string()),
                Message::human(prompts::judge_prompt(
                    &debate.history,
                    round as usize,
                    rt.config.word_limit("judge"),
                )),
            ]);
            let response = safe_chat(rt.model.as_ref(), request, &rt.llm_retry())
                .await
                .map_err(|e| GraphError::node_execution("debate_judge", e))?;
            let content = response.message.content;

            let mut verdict = parse_verdict(&content);
            if !verdict.consensus_reached {
                if let Some(threshold) = rt.config.force_consensus_threshold {
                    if verdict.quality_score >= threshold as i64 {
                        tracing::info!(
                            quality = verdict.quality_score,
                            threshold,
                            "force-consensus threshold reached"
                        );
                        verdict.consensus_reached = true;
                    }
                }
            }

            let concluded = verdict.consensus_reached
                || round >= rt.config.max_debate_rounds as i64;
            tracing::info!(
                round,
                consensus = verdict.consensus_reached,
                quality = verdict.quality_score,
                concluded,
                "judge evaluated debate round"
            );

            Ok(NodeOutput::Update(json!({
                (fields::RESEARCH_DEBATE_STATE): {
                    "round_count": round,
                    "consensus_reached": verdict.consensus_reached,
                    "judge_feedback": verdict.feedback,
                    "last_quality_score": verdict.quality_score,
                },
                (fields::INVESTMENT_DEBATE_STATE): {
                    "judge_decision": if concluded { content.as_str() } else { "" },
                },
            })))
        }
    })
}

/// Router after the judge: another round, or on to the research manager.
pub fn debate_router(max_debate_rounds: usize) -> impl Fn(&Value) -> ConditionalEdgeResult {
    move |state: &Value| {
        let research: ResearchDebateState = get_record(state, fields::RESEARCH_DEBATE_STATE);
        if research.consensus_reached || research.round_count >= max_debate_rounds as i64 {
            ConditionalEdgeResult::Single("research_manager".to_string())
        } else {
            ConditionalEdgeResult::Single("bull_researcher".to_string())
        }
    }
}

/// Research manager: synthesize the investment plan. No tools, no fallback;
/// failure here is fatal for the session.
pub fn research_manager_node(rt: Arc<AgentRuntime>) -> NodeExecutor {
    tradegraph_core::node::executor(move |state: Value| {
        let rt = rt.clone();
        async move {
            let debate: InvestDebateState = get_record(&state, fields::INVESTMENT_DEBATE_STATE);
            let reports = reports_block(&state);

            let request = ChatRequest::new(vec![
                Message::system("You are the research manager.".to_string()),
                Message::human(prompts::research_manager_prompt(
                    &reports,
                    &debate.history,
                    &debate.judge_decision,
                    rt.config.word_limit("research_manager"),
                )),
            ]);
            let response = safe_chat(rt.model.as_ref(), request, &rt.llm_retry())
                .await
                .map_err(|e| GraphError::node_execution("research_manager", e))?;

            Ok(NodeOutput::Update(json!({
                (fields::INVESTMENT_PLAN): response.message.content,
            })))
        }
    })
}

static QUALITY_RE: OnceLock<Regex> = OnceLock::new();
static FOCUS_RE: OnceLock<Regex> = OnceLock::new();

/// Parse the judge's structured verdict; unparseable responses default to
/// no-consensus with quality 5.
pub fn parse_verdict(content: &str) -> JudgeVerdict {
    let lower = content.to_lowercase();
    let consensus_reached = lower.contains("consensus reached: yes");

    let quality_re = QUALITY_RE
        .get_or_init(|| Regex::new(r"(?i)quality score:\s*\[?\s*(\d+)").expect("quality regex"));
    let quality_score = quality_re
        .captures(content)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .unwrap_or(DEFAULT_QUALITY_SCORE);

    let focus_re = FOCUS_RE.get_or_init(|| {
        Regex::new(r"(?im)^next round focus:\s*(.+)$").expect("focus regex")
    });
    let feedback = focus_re
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    JudgeVerdict {
        consensus_reached,
        quality_score,
        feedback,
    }
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

    fn runtime(model: Arc<dyn ChatModel>, config: AnalysisConfig) -> Arc<AgentRuntime> {
        let registry = Arc::new(ToolRegistry::new());
        let config = Arc::new(config);
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
            deadline: Instant::now() + Duration::from_secs(120),
        })
    }

    #[test]
    fn test_parse_verdict_full_format() {
        let verdict = parse_verdict(
            "CONSENSUS REACHED: Yes\nUNRESOLVED POINTS: none\nNEXT ROUND FOCUS: n/a\nQUALITY SCORE: 8",
        );
        assert!(verdict.consensus_reached);
        assert_eq!(verdict.quality_score, 8);
        assert_eq!(verdict.feedback, "n/a");
    }

    #[test]
    fn test_parse_verdict_unparseable_defaults() {
        let verdict = parse_verdict("the arguments were interesting");
        assert!(!verdict.consensus_reached);
        assert_eq!(verdict.quality_score, DEFAULT_QUALITY_SCORE);
        assert!(verdict.feedback.is_empty());
    }

    #[test]
    fn test_parse_verdict_bracketed_score() {
        let verdict = parse_verdict("CONSENSUS REACHED: No\nQUALITY SCORE: [7]");
        assert!(!verdict.consensus_reached);
        assert_eq!(verdict.quality_score, 7);
    }

    #[tokio::test]
    async fn test_bull_then_bear_accumulate_history() {
        let model = Arc::new(
            ScriptedModel::new("fb")
                .with_route("bull researcher", vec![Message::ai("growth is intact")])
                .with_route("bear researcher", vec![Message::ai("valuation is rich")]),
        );
        let rt = runtime(model, AnalysisConfig::default());
        let schema = analysis_schema();
        let mut state = initial_state("AAPL", "2025-01-02");

        let bull = bull_node(rt.clone());
        let NodeOutput::Update(update) = bull(state.clone()).await.unwrap() else {
            panic!("expected update")
        };
        schema.apply(&mut state, &update).unwrap();

        let bear = bear_node(rt);
        let NodeOutput::Update(update) = bear(state.clone()).await.unwrap() else {
            panic!("expected update")
        };
        schema.apply(&mut state, &update).unwrap();

        let debate: InvestDebateState = get_record(&state, fields::INVESTMENT_DEBATE_STATE);
        assert!(debate.bull_history.contains("Bull Analyst: growth is intact"));
        assert!(debate.bear_history.contains("Bear Analyst: valuation is rich"));
        assert!(debate.history.contains("Bull Analyst"));
        assert!(debate.history.contains("Bear Analyst"));
        assert_eq!(debate.count, 2);
        assert!(debate.current_response.starts_with("Bear Analyst"));
    }

    #[tokio::test]
    async fn test_judge_concludes_on_consensus() {
        let model = Arc::new(ScriptedModel::new(
            "CONSENSUS REACHED: Yes\nUNRESOLVED POINTS: none\nNEXT ROUND FOCUS: done\nQUALITY SCORE: 9",
        ));
        let rt = runtime(model, AnalysisConfig::default());
        let schema = analysis_schema();
        let mut state = initial_state("AAPL", "2025-01-02");

        let judge = judge_node(rt);
        let NodeOutput::Update(update) = judge(state.clone()).await.unwrap() else {
            panic!("expected update")
        };
        schema.apply(&mut state, &update).unwrap();

        let research: ResearchDebateState = get_record(&state, fields::RESEARCH_DEBATE_STATE);
        assert!(research.consensus_reached);
        assert_eq!(research.round_count, 1);
        assert_eq!(research.last_quality_score, 9);

        let debate: InvestDebateState = get_record(&state, fields::INVESTMENT_DEBATE_STATE);
        assert!(debate.judge_decision.contains("CONSENSUS REACHED"));

        let router = debate_router(3);
        match router(&state) {
            ConditionalEdgeResult::Single(target) => assert_eq!(target, "research_manager"),
            other => panic!("unexpected route {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_judge_continues_without_consensus() {
        let model = Arc::new(ScriptedModel::new(
            "CONSENSUS REACHED: No\nUNRESOLVED POINTS: margins\nNEXT ROUND FOCUS: margin trajectory\nQUALITY SCORE: 4",
        ));
        let rt = runtime(model, AnalysisConfig::default());
        let schema = analysis_schema();
        let mut state = initial_state("AAPL", "2025-01-02");

        let judge = judge_node(rt);
        let NodeOutput::Update(update) = judge(state.clone()).await.unwrap() else {
            panic!("expected update")
        };
        schema.apply(&mut state, &update).unwrap();

        let research: ResearchDebateState = get_record(&state, fields::RESEARCH_DEBATE_STATE);
        assert!(!research.consensus_reached);
        assert_eq!(research.judge_feedback, "margin trajectory");

        // judge_decision stays empty while the debate continues
        let debate: InvestDebateState = get_record(&state, fields::INVESTMENT_DEBATE_STATE);
        assert!(debate.judge_decision.is_empty());

        let router = debate_router(3);
        match router(&state) {
            ConditionalEdgeResult::Single(target) => assert_eq!(target, "bull_researcher"),
            other => panic!("unexpected route {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_round_cap_concludes_regardless_of_consensus() {
        let model = Arc::new(ScriptedModel::new(
            "CONSENSUS REACHED: No\nQUALITY SCORE: 3",
        ));
        let config = AnalysisConfig::builder().max_debate_rounds(1).build();
        let rt = runtime(model, config);
        let schema = analysis_schema();
        let mut state = initial_state("AAPL", "2025-01-02");

        let judge = judge_node(rt);
        let NodeOutput::Update(update) = judge(state.clone()).await.unwrap() else {
            panic!("expected update")
        };
        schema.apply(&mut state, &update).unwrap();

        let research: ResearchDebateState = get_record(&state, fields::RESEARCH_DEBATE_STATE);
        assert_eq!(research.round_count, 1);

        let router = debate_router(1);
        match router(&state) {
            ConditionalEdgeResult::Single(target) => assert_eq!(target, "research_manager"),
            other => panic!("unexpected route {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_force_consensus_threshold() {
        let model = Arc::new(ScriptedModel::new(
            "CONSENSUS REACHED: No\nQUALITY SCORE: 8",
        ));
        let config = AnalysisConfig::builder()
            .force_consensus_threshold(Some(7))
            .build();
        let rt = runtime(model, config);

        let judge = judge_node(rt);
        let NodeOutput::Update(update) =
            judge(initial_state("AAPL", "2025-01-02")).await.unwrap()
        else {
            panic!("expected update")
        };
        assert_eq!(
            update[fields::RESEARCH_DEBATE_STATE]["consensus_reached"],
            true
        );
    }

    #[tokio::test]
    async fn test_research_manager_writes_plan() {
        let model = Arc::new(
            ScriptedModel::new("fb")
                .with_route("research manager", vec![Message::ai("Plan: accumulate on dips.")]),
        );
        let rt = runtime(model, AnalysisConfig::default());

        let manager = research_manager_node(rt);
        let NodeOutput::Update(update) =
            manager(initial_state("AAPL", "2025-01-02")).await.unwrap()
        else {
            panic!("expected update")
        };
        assert_eq!(update[fields::INVESTMENT_PLAN], "Plan: accumulate on dips.");
    }
}
