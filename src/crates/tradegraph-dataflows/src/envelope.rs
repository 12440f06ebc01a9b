//! Structured empty envelopes
//!
//! When a source genuinely has no data, tools return an explicit empty
//! structure instead of fabricated content. Consumers treat emptiness as a
//! first-class case: the flags below are what the social consolidation and
//! the analysts check before trusting a payload.

use chrono::Utc;
use serde_json::{json, Value};

/// Generic empty envelope: `empty_response: true`, `data_available: false`,
/// a human-readable reason, zeroed counts.
pub fn empty_envelope(source: &str, ticker: &str, reason: &str) -> Value {
    json!({
        "ticker": ticker.to_uppercase(),
        "source": source,
        "sentiment": Value::Null,
        "sentiment_score": Value::Null,
        "confidence": "none",
        "empty_response": true,
        "data_available": false,
        "reason": reason,
        "timestamp": Utc::now().to_rfc3339(),
    })
}

/// Empty Reddit payload.
pub fn empty_reddit(ticker: &str, reason: &str) -> Value {
    let mut envelope = empty_envelope("reddit", ticker, reason);
    envelope["posts"] = json!(0);
    envelope["top_posts"] = json!([]);
    envelope["message"] = json!(format!("No Reddit data available for {}", ticker.to_uppercase()));
    envelope
}

/// Empty StockTwits payload.
pub fn empty_stocktwits(ticker: &str, reason: &str) -> Value {
    let mut envelope = empty_envelope("stocktwits", ticker, reason);
    envelope["mentions"] = json!(0);
    envelope["bullish_percent"] = json!(0);
    envelope["bearish_percent"] = json!(0);
    envelope["message"] = json!(format!(
        "No StockTwits data available for {}",
        ticker.to_uppercase()
    ));
    envelope
}

/// Empty Twitter payload.
pub fn empty_twitter(ticker: &str, reason: &str) -> Value {
    let mut envelope = empty_envelope("twitter", ticker, reason);
    envelope["tweet_count"] = json!(0);
    envelope["top_tweets"] = json!([]);
    envelope
}
