//! Trading session state: fields, debate records, reducers
//!
//! The session state is a flat record with per-analyst message channels,
//! seven assign-once report fields, and three structured debate records.
//! Every field registers a reducer in [`analysis_schema`]; parallel writers
//! never touch the record directly.
//!
//! The debate records merge structurally: history segments append unless
//! already present, `current_*` responses take the last non-empty value,
//! counters take the max, and judge verdicts stick once written. This is
//! deterministic and commutative over the concurrent-writer pattern the
//! graph actually produces (three risk debators writing disjoint
//! `current_*` fields plus their own histories).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tradegraph_core::state::{
    AppendReducer, FirstNonEmptyReducer, PinnedReducer, Reducer, StateError, StateSchema,
};

/// State field names.
pub mod fields {
    pub const TICKER: &str = "ticker";
    pub const TRADE_DATE: &str = "trade_date";

    pub const MARKET_MESSAGES: &str = "market_messages";
    pub const SOCIAL_MESSAGES: &str = "social_messages";
    pub const NEWS_MESSAGES: &str = "news_messages";
    pub const FUNDAMENTALS_MESSAGES: &str = "fundamentals_messages";

    pub const MARKET_REPORT: &str = "market_report";
    pub const SENTIMENT_REPORT: &str = "sentiment_report";
    pub const NEWS_REPORT: &str = "news_report";
    pub const FUNDAMENTALS_REPORT: &str = "fundamentals_report";
    pub const INVESTMENT_PLAN: &str = "investment_plan";
    pub const TRADER_INVESTMENT_PLAN: &str = "trader_investment_plan";
    pub const FINAL_TRADE_DECISION: &str = "final_trade_decision";

    pub const INVESTMENT_DEBATE_STATE: &str = "investment_debate_state";
    pub const RISK_DEBATE_STATE: &str = "risk_debate_state";
    pub const RESEARCH_DEBATE_STATE: &str = "research_debate_state";
}

/// The seven assign-once report fields, in pipeline order.
pub const REPORT_FIELDS: [&str; 7] = [
    fields::MARKET_REPORT,
    fields::SENTIMENT_REPORT,
    fields::NEWS_REPORT,
    fields::FUNDAMENTALS_REPORT,
    fields::INVESTMENT_PLAN,
    fields::TRADER_INVESTMENT_PLAN,
    fields::FINAL_TRADE_DECISION,
];

/// Bull/bear investment debate record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvestDebateState {
    #[serde(default)]
    pub bull_history: String,
    #[serde(default)]
    pub bear_history: String,
    #[serde(default)]
    pub history: String,
    #[serde(default)]
    pub current_response: String,
    #[serde(default)]
    pub judge_decision: String,
    #[serde(default)]
    pub count: i64,
}

/// Round control owned by the debate judge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchDebateState {
    #[serde(default)]
    pub round_count: i64,
    #[serde(default)]
    pub consensus_reached: bool,
    #[serde(default)]
    pub judge_feedback: String,
    #[serde(default)]
    pub last_quality_score: i64,
}

/// Three-perspective risk debate record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskDebateState {
    #[serde(default)]
    pub risky_history: String,
    #[serde(default)]
    pub safe_history: String,
    #[serde(default)]
    pub neutral_history: String,
    #[serde(default)]
    pub history: String,
    #[serde(default)]
    pub latest_speaker: String,
    #[serde(default)]
    pub current_risky_response: String,
    #[serde(default)]
    pub current_safe_response: String,
    #[serde(default)]
    pub current_neutral_response: String,
    #[serde(default)]
    pub judge_decision: String,
    #[serde(default)]
    pub count: i64,
}

/// Structural merge for debate records.
///
/// Key rules, applied per field of the incoming object:
/// - `count` / `round_count`: max
/// - `*history`: append with a newline separator unless the incoming
///   segment is already a substring of the accumulated history
/// - `current_*` / `latest_speaker`: last non-empty wins
/// - `judge_decision` / `judge_feedback`: first non-empty sticks
/// - `consensus_reached`: first `true` sticks
/// - anything else: non-empty incoming value wins
#[derive(Debug, Clone)]
pub struct DebateMergeReducer;

impl Reducer for DebateMergeReducer {
    fn reduce(
        &self,
        current: &Value,
        update: &Value,
    ) -> Result<Value, StateError> {
        let mut merged = match current {
            Value::Object(map) => map.clone(),
            Value::Null => serde_json::Map::new(),
            _ => {
                return Err(StateError::ReducerError(
                    "DebateMergeReducer requires object values".to_string(),
                ))
            }
        };

        let update_obj = match update {
            Value::Object(map) => map,
            Value::Null => return Ok(Value::Object(merged)),
            _ => {
                return Err(StateError::ReducerError(
                    "DebateMergeReducer requires object updates".to_string(),
                ))
            }
        };

        for (key, incoming) in update_obj {
            let existing = merged.get(key).cloned().unwrap_or(Value::Null);

            let resolved = if key == "count" || key == "round_count" {
                let a = existing.as_i64().unwrap_or(0);
                let b = incoming.as_i64().unwrap_or(0);
                json!(a.max(b))
            } else if key == "consensus_reached" {
                json!(existing.as_bool().unwrap_or(false) || incoming.as_bool().unwrap_or(false))
            } else if key == "judge_decision" || key == "judge_feedback" {
                match existing.as_str() {
                    Some(s) if !s.is_empty() => existing,
                    _ => incoming.clone(),
                }
            } else if key.ends_with("history") {
                let accumulated = existing.as_str().unwrap_or("");
                let segment = incoming.as_str().unwrap_or("");
                if segment.is_empty() || accumulated.contains(segment) {
                    json!(accumulated)
                } else if accumulated.is_empty() {
                    json!(segment)
                } else {
                    json!(format!("{accumulated}\n{segment}"))
                }
            } else if key.starts_with("current_") || key == "latest_speaker" {
                match incoming.as_str() {
                    Some(s) if !s.is_empty() => incoming.clone(),
                    _ => existing,
                }
            } else {
                match incoming {
                    Value::String(s) if s.is_empty() => existing,
                    Value::Null => existing,
                    other => other.clone(),
                }
            };

            merged.insert(key.clone(), resolved);
        }

        Ok(Value::Object(merged))
    }

    fn name(&self) -> &str {
        "debate_merge"
    }
}

/// Build the full session schema: every field with its reducer.
pub fn analysis_schema() -> StateSchema {
    let mut schema = StateSchema::new();

    schema.add_field(fields::TICKER, Box::new(PinnedReducer));
    schema.add_field(fields::TRADE_DATE, Box::new(PinnedReducer));

    for channel in [
        fields::MARKET_MESSAGES,
        fields::SOCIAL_MESSAGES,
        fields::NEWS_MESSAGES,
        fields::FUNDAMENTALS_MESSAGES,
    ] {
        schema.add_field(channel, Box::new(AppendReducer));
    }

    for report in REPORT_FIELDS {
        schema.add_field(report, Box::new(FirstNonEmptyReducer));
    }

    schema.add_field(fields::INVESTMENT_DEBATE_STATE, Box::new(DebateMergeReducer));
    schema.add_field(fields::RISK_DEBATE_STATE, Box::new(DebateMergeReducer));
    schema.add_field(fields::RESEARCH_DEBATE_STATE, Box::new(DebateMergeReducer));

    schema
}

/// Initial state for a session on `(ticker, trade_date)`.
pub fn initial_state(ticker: &str, trade_date: &str) -> Value {
    let mut state = json!({
        (fields::TICKER): ticker,
        (fields::TRADE_DATE): trade_date,
        (fields::MARKET_MESSAGES): [],
        (fields::SOCIAL_MESSAGES): [],
        (fields::NEWS_MESSAGES): [],
        (fields::FUNDAMENTALS_MESSAGES): [],
        (fields::INVESTMENT_DEBATE_STATE): InvestDebateState::default(),
        (fields::RISK_DEBATE_STATE): RiskDebateState::default(),
        (fields::RESEARCH_DEBATE_STATE): ResearchDebateState::default(),
    });
    for report in REPORT_FIELDS {
        state[report] = json!("");
    }
    state
}

/// Read a string field, defaulting to empty.
pub fn get_str<'a>(state: &'a Value, field: &str) -> &'a str {
    state.get(field).and_then(Value::as_str).unwrap_or("")
}

/// Deserialize a debate record field, defaulting missing keys.
pub fn get_record<T: for<'de> Deserialize<'de> + Default>(state: &Value, field: &str) -> T {
    state
        .get(field)
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}
