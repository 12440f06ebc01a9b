//! News tools: search primary, wire fallback
//!
//! The news analyst calls `news_search` first (Serper-style search API) and
//! falls back to `company_news_wire` (Finnhub company news) when the
//! primary fails. Articles arrive in relevance order; only the top N are
//! kept to bound tokens, and the filtered count is annotated.

use crate::envelope::empty_envelope;
use crate::http::{feed_client, get_json, ticker_arg};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tradegraph_agents::tools::{Tool, ToolContext, ToolError, ToolOutput};

fn client() -> Result<reqwest::Client, ToolError> {
    feed_client(Duration::from_secs(20))
}

/// Keep the first `max_articles` articles (already relevance-ordered) and
/// annotate the reduction.
pub fn filter_top_articles(articles: Vec<Value>, max_articles: usize) -> (Vec<Value>, usize) {
    let original = articles.len();
    let kept: Vec<Value> = articles.into_iter().take(max_articles).collect();
    if kept.len() < original {
        tracing::info!(original, kept = kept.len(), "news filtered to top articles");
    }
    (kept, original)
}

/// Render an article list into the textual payload the analyst reads.
pub fn render_articles(ticker: &str, articles: &[Value], original_count: usize) -> String {
    let lines: Vec<String> = articles
        .iter()
        .map(|a| {
            let title = a["title"].as_str().unwrap_or("(untitled)");
            let snippet = a["snippet"]
                .as_str()
                .or_else(|| a["summary"].as_str())
                .unwrap_or("");
            let source = a["source"].as_str().unwrap_or("unknown");
            format!("- {title} | {snippet} | Source: {source}")
        })
        .collect();

    format!(
        "NEWS DATA COLLECTION - {ticker}\n\
         Articles Collected: {} (filtered from {original_count})\n\n{}",
        articles.len(),
        lines.join("\n")
    )
}

/// Primary news search (Serper-style API, `SERPER_API_KEY`).
pub struct NewsSearchTool {
    max_articles: usize,
}

impl NewsSearchTool {
    pub fn new(max_articles: usize) -> Self {
        Self { max_articles }
    }
}

#[async_trait]
impl Tool for NewsSearchTool {
    fn name(&self) -> &str {
        "news_search"
    }

    fn description(&self) -> &str {
        "Search recent news coverage for a ticker (primary source)"
    }

    fn args_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "ticker": {"type": "string"},
                "query": {"type": "string", "description": "Optional extra query terms"}
            },
            "required": ["ticker"]
        })
    }

    async fn invoke(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let ticker = ticker_arg(&args)?;
        let Some(key) = std::env::var("SERPER_API_KEY").ok().filter(|k| !k.is_empty()) else {
            return Err(ToolError::Permanent(
                "SERPER_API_KEY not configured".to_string(),
            ));
        };

        let extra = args["query"].as_str().unwrap_or("stock");
        let client = client()?;
        let response = client
            .post("https://google.serper.dev/news")
            .header("X-API-KEY", key)
            .json(&json!({"q": format!("{ticker} {extra}"), "num": 30}))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    ToolError::Transient(e.to_string())
                } else {
                    ToolError::Permanent(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(ToolError::Transient(format!("news search returned {status}")));
        }
        if !status.is_success() {
            return Err(ToolError::Permanent(format!("news search returned {status}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ToolError::Permanent(format!("invalid search response: {e}")))?;
        let articles = body["news"].as_array().cloned().unwrap_or_default();
        if articles.is_empty() {
            return Ok(ToolOutput::text(
                empty_envelope("news_search", &ticker, "no articles found").to_string(),
            ));
        }

        let (kept, original) = filter_top_articles(articles, self.max_articles);
        Ok(ToolOutput::text(render_articles(&ticker, &kept, original)))
    }
}

/// Wire fallback: Finnhub company news.
pub struct CompanyNewsWireTool;

#[async_trait]
impl Tool for CompanyNewsWireTool {
    fn name(&self) -> &str {
        "company_news_wire"
    }

    fn description(&self) -> &str {
        "Company news wire (fallback news source)"
    }

    fn args_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "ticker": {"type": "string"},
                "from": {"type": "string", "description": "ISO date lower bound"},
                "to": {"type": "string", "description": "ISO date upper bound"}
            },
            "required": ["ticker"]
        })
    }

    async fn invoke(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let ticker = ticker_arg(&args)?;
        let Some(key) = std::env::var("FINNHUB_API_KEY").ok().filter(|k| !k.is_empty()) else {
            return Ok(ToolOutput::text(
                empty_envelope("company_news_wire", &ticker, "FINNHUB_API_KEY not configured")
                    .to_string(),
            ));
        };

        let today = chrono::Utc::now().date_naive();
        let default_from = (today - chrono::Duration::days(7)).to_string();
        let from = args["from"].as_str().unwrap_or(&default_from);
        let default_to = today.to_string();
        let to = args["to"].as_str().unwrap_or(&default_to);

        let client = client()?;
        let body = get_json(
            &client,
            &format!(
                "https://finnhub.io/api/v1/company-news?symbol={ticker}&from={from}&to={to}&token={key}"
            ),
        )
        .await?;

        let articles = body.as_array().cloned().unwrap_or_default();
        if articles.is_empty() {
            return Ok(ToolOutput::text(
                empty_envelope("company_news_wire", &ticker, "no wire coverage in range")
                    .to_string(),
            ));
        }

        let (kept, original) = filter_top_articles(articles, 15);
        let lines: Vec<String> = kept
            .iter()
            .map(|a| {
                format!(
                    "- {} | {} | Source: {}",
                    a["headline"].as_str().unwrap_or("(untitled)"),
                    a["summary"].as_str().unwrap_or(""),
                    a["source"].as_str().unwrap_or("wire"),
                )
            })
            .collect();

        Ok(ToolOutput::text(format!(
            "NEWS WIRE - {ticker}\nArticles Collected: {} (filtered from {original})\n\n{}",
            kept.len(),
            lines.join("\n")
        )))
    }
}

/// General news context for the social analyst (kept out of the news
/// toolkit to preserve the scoping invariant).
pub struct GeneralNewsContextTool;

#[async_trait]
impl Tool for GeneralNewsContextTool {
    fn name(&self) -> &str {
        "general_news_context"
    }

    fn description(&self) -> &str {
        "Broad market headlines for sentiment context"
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
        let Some(key) = std::env::var("FINNHUB_API_KEY").ok().filter(|k| !k.is_empty()) else {
            return Ok(ToolOutput::text(
                empty_envelope("general_news", &ticker, "FINNHUB_API_KEY not configured")
                    .to_string(),
            ));
        };

        let client = client()?;
        let body = get_json(
            &client,
            &format!("https://finnhub.io/api/v1/news?category=general&token={key}"),
        )
        .await?;

        let headlines: Vec<&str> = body
            .as_array()
            .map(|articles| {
                articles
                    .iter()
                    .filter_map(|a| a["headline"].as_str())
                    .take(10)
                    .collect()
            })
            .unwrap_or_default();

        if headlines.is_empty() {
            return Ok(ToolOutput::text(
                empty_envelope("general_news", &ticker, "no general headlines").to_string(),
            ));
        }

        Ok(ToolOutput::text(format!(
            "GENERAL MARKET HEADLINES\n- {}",
            headlines.join("\n- ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str) -> Value {
        json!({"title": title, "snippet": "body", "source": "feed"})
    }

    #[test]
    fn test_filter_top_articles_keeps_order() {
        let articles: Vec<Value> = (0..20).map(|i| article(&format!("a{i}"))).collect();
        let (kept, original) = filter_top_articles(articles, 15);
        assert_eq!(original, 20);
        assert_eq!(kept.len(), 15);
        assert_eq!(kept[0]["title"], "a0");
        assert_eq!(kept[14]["title"], "a14");
    }

    #[test]
    fn test_render_articles_annotates_counts() {
        let articles = vec![article("Guidance raised")];
        let text = render_articles("AAPL", &articles, 8);
        assert!(text.contains("NEWS DATA COLLECTION - AAPL"));
        assert!(text.contains("Articles Collected: 1 (filtered from 8)"));
        assert!(text.contains("Guidance raised"));
    }
}
