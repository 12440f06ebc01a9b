//! Social sentiment feeds: Reddit, StockTwits, Twitter
//!
//! Public JSON endpoints, no API keys. Every fetch degrades to a structured
//! empty envelope rather than fabricated sentiment: the social analyst's
//! consolidation counts live sources and flags low confidence itself.

use crate::envelope::{empty_reddit, empty_stocktwits, empty_twitter};
use crate::http::{feed_client, get_json, ticker_arg};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tradegraph_agents::tools::{Tool, ToolContext, ToolError, ToolOutput};

fn client() -> Result<reqwest::Client, ToolError> {
    feed_client(Duration::from_secs(15))
}

/// Reddit search across investing subreddits.
pub struct RedditSentimentTool;

#[async_trait]
impl Tool for RedditSentimentTool {
    fn name(&self) -> &str {
        "reddit_sentiment"
    }

    fn description(&self) -> &str {
        "Recent Reddit discussion volume and tone for a ticker"
    }

    fn args_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"ticker": {"type": "string"}},
            "required": ["ticker"]
        })
    }

    async fn invoke(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let ticker = ticker_arg(&args)?;
        let client = client()?;
        let url = format!(
            "https://www.reddit.com/search.json?q=%24{ticker}&sort=new&limit=25&t=week"
        );

        let body = match get_json(&client, &url).await {
            Ok(body) => body,
            Err(err) if err.is_transient() => return Err(err),
            Err(err) => {
                tracing::debug!(%ticker, error = %err, "reddit fetch failed");
                return Ok(ToolOutput::text(
                    empty_reddit(&ticker, &err.to_string()).to_string(),
                ));
            }
        };

        let posts = body["data"]["children"].as_array().cloned().unwrap_or_default();
        if posts.is_empty() {
            return Ok(ToolOutput::text(
                empty_reddit(&ticker, "no matching posts this week").to_string(),
            ));
        }

        let scores: Vec<i64> = posts
            .iter()
            .filter_map(|p| p["data"]["score"].as_i64())
            .collect();
        let comments: Vec<i64> = posts
            .iter()
            .filter_map(|p| p["data"]["num_comments"].as_i64())
            .collect();
        let titles: Vec<&str> = posts
            .iter()
            .filter_map(|p| p["data"]["title"].as_str())
            .take(5)
            .collect();

        let payload = json!({
            "ticker": ticker,
            "source": "reddit",
            "posts": posts.len(),
            "avg_score": average(&scores),
            "avg_comments": average(&comments),
            "top_posts": titles,
            "sentiment_score": title_sentiment(&titles),
            "data_available": true,
            "empty_response": false,
        });
        Ok(ToolOutput::text(payload.to_string()))
    }
}

/// StockTwits symbol stream with its built-in bullish/bearish tags.
pub struct StocktwitsSentimentTool;

#[async_trait]
impl Tool for StocktwitsSentimentTool {
    fn name(&self) -> &str {
        "stocktwits_sentiment"
    }

    fn description(&self) -> &str {
        "StockTwits message stream sentiment for a ticker"
    }

    fn args_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"ticker": {"type": "string"}},
            "required": ["ticker"]
        })
    }

    async fn invoke(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let ticker = ticker_arg(&args)?;
        let client = client()?;
        let url = format!("https://api.stocktwits.com/api/2/streams/symbol/{ticker}.json");

        let body = match get_json(&client, &url).await {
            Ok(body) => body,
            Err(err) if err.is_transient() => return Err(err),
            Err(err) => {
                tracing::debug!(%ticker, error = %err, "stocktwits fetch failed");
                return Ok(ToolOutput::text(
                    empty_stocktwits(&ticker, &err.to_string()).to_string(),
                ));
            }
        };

        let messages = body["messages"].as_array().cloned().unwrap_or_default();
        if messages.is_empty() {
            return Ok(ToolOutput::text(
                empty_stocktwits(&ticker, "no recent messages").to_string(),
            ));
        }

        let mut bullish = 0usize;
        let mut bearish = 0usize;
        for message in &messages {
            match message["entities"]["sentiment"]["basic"].as_str() {
                Some("Bullish") => bullish += 1,
                Some("Bearish") => bearish += 1,
                _ => {}
            }
        }
        let tagged = (bullish + bearish).max(1);

        let payload = json!({
            "ticker": ticker,
            "source": "stocktwits",
            "mentions": messages.len(),
            "bullish_percent": 100 * bullish / tagged,
            "bearish_percent": 100 * bearish / tagged,
            "data_available": true,
            "empty_response": false,
        });
        Ok(ToolOutput::text(payload.to_string()))
    }
}

/// Twitter via the public syndication endpoint.
pub struct TwitterSentimentTool;

#[async_trait]
impl Tool for TwitterSentimentTool {
    fn name(&self) -> &str {
        "twitter_sentiment"
    }

    fn description(&self) -> &str {
        "Recent tweet volume and tone for a ticker (syndication feed)"
    }

    fn args_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"ticker": {"type": "string"}},
            "required": ["ticker"]
        })
    }

    async fn invoke(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let ticker = ticker_arg(&args)?;
        let client = client()?;
        let url = format!(
            "https://cdn.syndication.twimg.com/timeline/search?q=%24{ticker}&lang=en"
        );

        let body = match get_json(&client, &url).await {
            Ok(body) => body,
            Err(err) if err.is_transient() => return Err(err),
            Err(err) => {
                tracing::debug!(%ticker, error = %err, "twitter fetch failed");
                return Ok(ToolOutput::text(
                    empty_twitter(&ticker, &err.to_string()).to_string(),
                ));
            }
        };

        let tweets = body["timeline"]["entries"].as_array().cloned().unwrap_or_default();
        if tweets.is_empty() {
            return Ok(ToolOutput::text(
                empty_twitter(&ticker, "no recent tweets in syndication feed").to_string(),
            ));
        }

        let texts: Vec<&str> = tweets
            .iter()
            .filter_map(|t| t["content"]["tweet"]["full_text"].as_str())
            .take(10)
            .collect();

        let payload = json!({
            "ticker": ticker,
            "source": "twitter",
            "tweet_count": tweets.len(),
            "top_tweets": texts,
            "sentiment_score": title_sentiment(&texts),
            "data_available": true,
            "empty_response": false,
        });
        Ok(ToolOutput::text(payload.to_string()))
    }
}

fn average(values: &[i64]) -> i64 {
    if values.is_empty() {
        return 0;
    }
    values.iter().sum::<i64>() / values.len() as i64
}

/// Crude lexical tone over short texts: (positive − negative) / total,
/// in [-1, 1]. Null-equivalent 0.0 when nothing matches.
fn title_sentiment(texts: &[&str]) -> f64 {
    const POSITIVE: [&str; 8] = [
        "buy", "bull", "moon", "calls", "long", "upgrade", "beat", "rally",
    ];
    const NEGATIVE: [&str; 8] = [
        "sell", "bear", "puts", "short", "downgrade", "miss", "crash", "dump",
    ];

    let mut positive = 0i64;
    let mut negative = 0i64;
    for text in texts {
        let lower = text.to_lowercase();
        positive += POSITIVE.iter().filter(|w| lower.contains(*w)).count() as i64;
        negative += NEGATIVE.iter().filter(|w| lower.contains(*w)).count() as i64;
    }
    let total = positive + negative;
    if total == 0 {
        return 0.0;
    }
    (positive - negative) as f64 / total as f64
}
