//! Analysis graph wiring
//!
//! Assembles the full session graph:
//!
//! ```text
//! START → dispatcher ⇒ [analysts]* → bull → bear → judge ──┐
//!              (Sends)      (barrier)   ▲                  │
//!                                       └──── continue ────┤
//!                                                          ▼
//!        research_manager → trader → risk_orchestrator ⇒ 3 debators
//!                                                          │ (barrier)
//!                                    risk_aggregator → risk_judge → END
//! ```
//!
//! The dispatcher fans out dynamically (one `Send` per selected analyst);
//! the bull researcher is the fan-in barrier over however many analysts
//! were selected. Signal processing runs after the graph, in the server.

use crate::analysts::{analyst_node, dispatcher_node};
use crate::context::Perspective;
use crate::debate::{bear_node, bull_node, debate_router, judge_node, research_manager_node};
use crate::risk::{
    risk_aggregator_node, risk_debator_node, risk_judge_node, risk_orchestrator_node,
};
use crate::runtime::AgentRuntime;
use crate::social::social_analyst_node;
use crate::state::analysis_schema;
use crate::tools::AnalystKind;
use crate::trader::trader_node;
use std::sync::Arc;
use tradegraph_core::builder::StateGraph;
use tradegraph_core::executor::CompiledGraph;
use tradegraph_core::graph::{END, START};
use tradegraph_core::Result;

/// Build the executable analysis graph for one session.
pub fn build_analysis_graph(rt: Arc<AgentRuntime>) -> Result<CompiledGraph> {
    let mut graph = StateGraph::new()
        .with_schema(analysis_schema())
        .with_recursion_limit(rt.config.recursion_limit)
        .with_deadline(rt.config.execution_timeout);

    graph.add_node_executor("dispatcher", dispatcher_node(rt.clone()));
    graph.add_edge(START, "dispatcher");

    for kind in &rt.config.selected_analysts {
        let node = match kind {
            AnalystKind::Social => social_analyst_node(rt.clone()),
            other => analyst_node(*other, rt.clone()),
        };
        graph.add_node_executor(kind.node_name(), node);
        // Fan-in barrier: the debate starts once every selected analyst has
        // committed its report.
        graph.add_edge(kind.node_name(), "bull_researcher");
    }

    graph.add_node_executor("bull_researcher", bull_node(rt.clone()));
    graph.add_node_executor("bear_researcher", bear_node(rt.clone()));
    graph.add_node_executor("debate_judge", judge_node(rt.clone()));
    graph.add_edge("bull_researcher", "bear_researcher");
    graph.add_edge("bear_researcher", "debate_judge");
    graph.add_conditional_edge(
        "debate_judge",
        debate_router(rt.config.max_debate_rounds),
        vec![
            "bull_researcher".to_string(),
            "research_manager".to_string(),
        ],
    );

    graph.add_node_executor("research_manager", research_manager_node(rt.clone()));
    graph.add_node_executor("trader", trader_node(rt.clone()));
    graph.add_edge("research_manager", "trader");
    graph.add_edge("trader", "risk_orchestrator");

    graph.add_node_executor("risk_orchestrator", risk_orchestrator_node(rt.clone()));
    for perspective in Perspective::all() {
        graph.add_node_executor(
            perspective.node_name(),
            risk_debator_node(perspective, rt.clone()),
        );
        graph.add_edge("risk_orchestrator", perspective.node_name());
        graph.add_edge(perspective.node_name(), "risk_aggregator");
    }
    graph.add_node_executor("risk_aggregator", risk_aggregator_node(rt.clone()));
    graph.add_node_executor("risk_judge", risk_judge_node(rt.clone()));
    graph.add_edge("risk_aggregator", "risk_judge");
    graph.add_edge("risk_judge", END);

    graph.compile()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::context::ContextProjector;
    use crate::invoker::ToolInvoker;
    use crate::tools::{standard_toolkits, ToolRegistry};
    use std::time::{Duration, Instant};
    use tradegraph_core::cache::TtlCache;
    use tradegraph_llm::scripted::ScriptedModel;

    #[test]
    fn test_graph_compiles_with_default_config() {
        let model = Arc::new(ScriptedModel::new("x"));
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

        assert!(build_analysis_graph(rt).is_ok());
    }
}
