//! Signal processor
//!
//! Reduces the risk judge's free-text decision to one of BUY / SELL / HOLD
//! by asking a fast model, with a token-scan fallback so post-processing
//! can never fail the session. An empty decision maps to
//! `"HOLD — No signal provided"`.

use crate::prompts::SIGNAL_SYSTEM_PROMPT;
use std::sync::Arc;
use tradegraph_llm::messages::Message;
use tradegraph_llm::retry::{default_llm_retry, safe_chat};
use tradegraph_llm::traits::{ChatModel, ChatRequest};

/// Signal emitted when there is nothing to process.
pub const NO_SIGNAL: &str = "HOLD — No signal provided";

/// Extracts BUY/SELL/HOLD from a final trade decision.
pub struct SignalProcessor {
    quick_model: Arc<dyn ChatModel>,
}

impl SignalProcessor {
    /// Processor backed by a fast model.
    pub fn new(quick_model: Arc<dyn ChatModel>) -> Self {
        Self { quick_model }
    }

    /// Reduce a decision text to a signal.
    pub async fn process(&self, full_signal: &str) -> String {
        if full_signal.trim().is_empty() {
            tracing::warn!("empty decision text; defaulting signal");
            return NO_SIGNAL.to_string();
        }

        let request = ChatRequest::new(vec![
            Message::system(SIGNAL_SYSTEM_PROMPT),
            Message::human(full_signal),
        ]);

        match safe_chat(self.quick_model.as_ref(), request, &default_llm_retry()).await {
            Ok(response) => extract_signal(&response.message.content)
                .unwrap_or_else(|| fallback_scan(full_signal)),
            Err(err) => {
                tracing::warn!(error = %err, "signal model failed; falling back to token scan");
                fallback_scan(full_signal)
            }
        }
    }
}

/// First BUY/SELL/HOLD token in the text, by position.
fn extract_signal(text: &str) -> Option<String> {
    let upper = text.to_uppercase();
    ["BUY", "SELL", "HOLD"]
        .iter()
        .filter_map(|token| upper.find(token).map(|pos| (pos, *token)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, token)| token.to_string())
}

/// Scan the original decision text; HOLD when nothing explicit is found.
fn fallback_scan(decision: &str) -> String {
    extract_signal(decision).unwrap_or_else(|| "HOLD".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradegraph_llm::scripted::ScriptedModel;

    #[tokio::test]
    async fn test_empty_signal_maps_to_hold_sentinel() {
        let processor = SignalProcessor::new(Arc::new(ScriptedModel::new("BUY")));
        assert_eq!(processor.process("  ").await, NO_SIGNAL);
    }

    #[tokio::test]
    async fn test_model_answer_is_normalized() {
        let processor = SignalProcessor::new(Arc::new(ScriptedModel::new("The decision is SELL.")));
        assert_eq!(processor.process("long decision text").await, "SELL");
    }

    #[tokio::test]
    async fn test_unparseable_model_answer_falls_back_to_scan() {
        let processor = SignalProcessor::new(Arc::new(ScriptedModel::new("no idea")));
        assert_eq!(
            processor.process("Recommendation: BUY with conviction").await,
            "BUY"
        );
    }

    #[test]
    fn test_extract_signal_takes_first_by_position() {
        assert_eq!(extract_signal("We would SELL, not BUY"), Some("SELL".into()));
        assert_eq!(extract_signal("hold the line"), Some("HOLD".into()));
        assert_eq!(extract_signal("no verdict"), None);
    }

    #[test]
    fn test_fallback_scan_defaults_to_hold() {
        assert_eq!(fallback_scan("nothing actionable"), "HOLD");
    }
}
