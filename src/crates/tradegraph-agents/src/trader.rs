//! Trader node
//!
//! Pure synthesizer: turns the investment plan plus analyst reports into an
//! executable trade plan with explicit action, entry, stop loss, take
//! profit, position size, and confidence. No tools; failure is fatal for
//! the session since there is no safe default trade.

use crate::debate::reports_block;
use crate::prompts;
use crate::runtime::AgentRuntime;
use crate::state::{fields, get_str};
use serde_json::{json, Value};
use std::sync::Arc;
use tradegraph_core::node::{NodeExecutor, NodeOutput};
use tradegraph_core::GraphError;
use tradegraph_llm::messages::Message;
use tradegraph_llm::retry::safe_chat;
use tradegraph_llm::traits::ChatRequest;

/// Trader node factory.
pub fn trader_node(rt: Arc<AgentRuntime>) -> NodeExecutor {
    tradegraph_core::node::executor(move |state: Value| {
        let rt = rt.clone();
        async move {
            let plan = get_str(&state, fields::INVESTMENT_PLAN).to_string();
            let reports = reports_block(&state);

            let request = ChatRequest::new(vec![
                Message::system("You are the trader on the desk.".to_string()),
                Message::human(prompts::trader_prompt(
                    &plan,
                    &reports,
                    rt.config.word_limit("trader"),
                )),
            ]);
            let response = safe_chat(rt.model.as_ref(), request, &rt.llm_retry())
                .await
                .map_err(|e| GraphError::node_execution("trader", e))?;

            Ok(NodeOutput::Update(json!({
                (fields::TRADER_INVESTMENT_PLAN): response.message.content,
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
    use crate::state::initial_state;
    use crate::tools::{standard_toolkits, ToolRegistry};
    use std::time::{Duration, Instant};
    use tradegraph_core::cache::TtlCache;
    use tradegraph_llm::scripted::ScriptedModel;

    #[tokio::test]
    async fn test_trader_writes_plan() {
        let model = Arc::new(ScriptedModel::new("fb").with_route(
            "trader",
            vec![Message::ai(
                "ACTION: BUY\nENTRY: 190\nSTOP LOSS: 182\nTAKE PROFIT: 205\nPOSITION SIZE: 3%\nCONFIDENCE: medium",
            )],
        ));
        let registry = Arc::new(ToolRegistry::new());
        let config = Arc::new(AnalysisConfig::default());
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

        let mut state = initial_state("AAPL", "2025-01-02");
        state[fields::INVESTMENT_PLAN] = json!("accumulate on dips");

        let node = trader_node(rt);
        let NodeOutput::Update(update) = node(state).await.unwrap() else {
            panic!("expected update")
        };
        let plan = update[fields::TRADER_INVESTMENT_PLAN].as_str().unwrap();
        assert!(plan.contains("ACTION: BUY"));
        assert!(plan.contains("STOP LOSS"));
        assert!(plan.contains("POSITION SIZE"));
    }
}
