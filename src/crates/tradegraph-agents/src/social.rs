//! Hard-coded social analyst path
//!
//! The social analyst does not let the model pick tools: it always fetches
//! Reddit, StockTwits and Twitter concurrently (each with its own retry and
//! empty-envelope fallback inside the invoker), consolidates the structured
//! results into one availability-annotated block, and makes a single model
//! call over it. This guarantees the fan-out happens and bounds tokens no
//! matter what the model would have chosen.
//!
//! Output is middle-truncated to a fixed character budget; with fewer than
//! two live sources the report is marked low-confidence. Missing data is
//! reported as missing, never synthesized.

use crate::messages::messages_from_value;
use crate::runtime::AgentRuntime;
use crate::state::fields;
use crate::tokens::truncate_middle;
use crate::tools::AnalystKind;
use serde_json::{json, Value};
use std::sync::Arc;
use tradegraph_core::node::{NodeExecutor, NodeOutput};
use tradegraph_llm::messages::{Message, ToolCall};
use tradegraph_llm::retry::safe_chat;
use tradegraph_llm::traits::ChatRequest;

/// Character budget for the social report (middle-truncated on overflow).
pub const SOCIAL_REPORT_CHAR_BUDGET: usize = 4_000;

const SOURCES: [(&str, &str); 3] = [
    ("reddit_sentiment", "REDDIT"),
    ("stocktwits_sentiment", "STOCKTWITS"),
    ("twitter_sentiment", "TWITTER"),
];

/// Social analyst node: three fixed sources in parallel, one model call.
pub fn social_analyst_node(rt: Arc<AgentRuntime>) -> NodeExecutor {
    tradegraph_core::node::executor(move |state: Value| {
        let rt = rt.clone();
        async move {
            let ticker = state[fields::TICKER].as_str().unwrap_or("").to_string();
            let trade_date = state[fields::TRADE_DATE].as_str().unwrap_or("").to_string();
            let ctx = rt.tool_context();

            let calls: Vec<ToolCall> = SOURCES
                .iter()
                .map(|(tool, _)| {
                    ToolCall::new(
                        format!("social_{tool}"),
                        *tool,
                        json!({"ticker": ticker, "date": trade_date}),
                    )
                })
                .collect();

            let results = rt
                .invoker
                .execute_parallel(AnalystKind::Social, &calls, &ctx)
                .await;

            let mut available = 0usize;
            let mut sections = Vec::new();
            for ((_, label), message) in SOURCES.iter().zip(&results) {
                if source_has_data(&message.content) {
                    available += 1;
                }
                sections.push(format!("{label}:\n{}", message.content));
            }

            let mut block = format!(
                "SOCIAL MEDIA DATA COLLECTION - {ticker}\n{available}/3 data sources available\n\n{}",
                sections.join("\n\n")
            );
            if available == 0 {
                block.push_str(
                    "\n\nNo social data source returned data. Report the absence of \
                     sentiment data; do not fabricate figures.",
                );
            }
            tracing::info!(%ticker, available, "social sources consolidated");

            let system = Message::system(format!(
                "You are the social media analyst summarizing retail sentiment for \
                 {ticker} on {trade_date}. Base your report strictly on the collected \
                 data below; state explicitly when sources returned nothing.\nMAX WORDS: {}",
                rt.config.word_limit("analyst"),
            ));
            let request = ChatRequest::new(vec![system, Message::human(block.clone())]);

            let raw_report = match safe_chat(rt.model.as_ref(), request, &rt.llm_retry()).await {
                Ok(response) => response.message.content,
                Err(err) => {
                    tracing::warn!(error = %err, "social model call failed; degrading to warning report");
                    crate::analysts::failure_sentinel(&ticker)
                }
            };

            let mut report = truncate_middle(&raw_report, SOCIAL_REPORT_CHAR_BUDGET);
            if available < 2 {
                report = format!("LOW CONFIDENCE ({available}/3 data sources): {report}");
            }

            let mut channel = messages_from_value(&state[fields::SOCIAL_MESSAGES]);
            channel.push(Message::human(block));
            channel.push(Message::ai(report.clone()));

            Ok(NodeOutput::Update(json!({
                (fields::SOCIAL_MESSAGES): channel,
                (fields::SENTIMENT_REPORT): report,
            })))
        }
    })
}

/// Whether a source payload carries real data. Error payloads and
/// structured empty envelopes (`empty_response`/`data_available`) count as
/// unavailable.
fn source_has_data(payload: &str) -> bool {
    if payload.is_empty() || payload.starts_with("Tool error") {
        return false;
    }
    if let Ok(value) = serde_json::from_str::<Value>(payload) {
        if value["empty_response"].as_bool() == Some(true) {
            return false;
        }
        if value["data_available"].as_bool() == Some(false) {
            return false;
        }
    }
    true
}
