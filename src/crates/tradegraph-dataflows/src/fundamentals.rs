//! Fundamentals tools: financial metrics and earnings news
//!
//! Finnhub-style adapters for the fundamentals analyst. Insider data is
//! shared with the market toolkit via
//! [`crate::market::InsiderTransactionsTool`].

use crate::envelope::empty_envelope;
use crate::http::{feed_client, get_json, ticker_arg};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tradegraph_agents::tools::{Tool, ToolContext, ToolError, ToolOutput};

const API_BASE: &str = "https://finnhub.io/api/v1";

fn client() -> Result<reqwest::Client, ToolError> {
    feed_client(Duration::from_secs(20))
}

fn api_key() -> Option<String> {
    std::env::var("FINNHUB_API_KEY").ok().filter(|k| !k.is_empty())
}

/// Key financial metrics (growth, margins, leverage, valuation).
pub struct FinancialStatementsTool;

/// Metric keys extracted into the report, with display labels.
const METRICS: [(&str, &str); 8] = [
    ("revenueGrowthTTMYoy", "Revenue Growth (TTM YoY)"),
    ("grossMarginTTM", "Gross Margin (TTM)"),
    ("operatingMarginTTM", "Operating Margin (TTM)"),
    ("netProfitMarginTTM", "Net Margin (TTM)"),
    ("totalDebt/totalEquityQuarterly", "Debt/Equity"),
    ("currentRatioQuarterly", "Current Ratio"),
    ("peTTM", "P/E Ratio (TTM)"),
    ("pbQuarterly", "P/B Ratio"),
];

/// Render the metric block the analyst reads.
pub fn render_metrics(ticker: &str, metric: &Value) -> Option<String> {
    let mut lines = Vec::new();
    for (key, label) in METRICS {
        if let Some(value) = metric[key].as_f64() {
            lines.push(format!("{label}: {value:.2}"));
        }
    }
    if lines.is_empty() {
        return None;
    }
    Some(format!(
        "FINANCIAL METRICS - {ticker}\n{}",
        lines.join("\n")
    ))
}

#[async_trait]
impl Tool for FinancialStatementsTool {
    fn name(&self) -> &str {
        "financial_statements"
    }

    fn description(&self) -> &str {
        "Key financial metrics: growth, margins, leverage, valuation"
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
        let Some(key) = api_key() else {
            return Ok(ToolOutput::text(
                empty_envelope("finnhub", &ticker, "FINNHUB_API_KEY not configured").to_string(),
            ));
        };

        let client = client()?;
        let body = get_json(
            &client,
            &format!("{API_BASE}/stock/metric?symbol={ticker}&metric=all&token={key}"),
        )
        .await?;

        match render_metrics(&ticker, &body["metric"]) {
            Some(report) => Ok(ToolOutput {
                text: report,
                meta: Some(body["metric"].clone()),
            }),
            None => Ok(ToolOutput::text(
                empty_envelope("finnhub", &ticker, "no metric data returned").to_string(),
            )),
        }
    }
}

/// Earnings-related news for fundamental context.
pub struct EarningsNewsTool;

#[async_trait]
impl Tool for EarningsNewsTool {
    fn name(&self) -> &str {
        "earnings_news"
    }

    fn description(&self) -> &str {
        "Recent earnings-related headlines for a ticker"
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
        let Some(key) = api_key() else {
            return Ok(ToolOutput::text(
                empty_envelope("finnhub", &ticker, "FINNHUB_API_KEY not configured").to_string(),
            ));
        };

        let today = chrono::Utc::now().date_naive();
        let from = (today - chrono::Duration::days(30)).to_string();
        let client = client()?;
        let body = get_json(
            &client,
            &format!(
                "{API_BASE}/company-news?symbol={ticker}&from={from}&to={today}&token={key}"
            ),
        )
        .await?;

        let earnings: Vec<String> = body
            .as_array()
            .map(|articles| {
                articles
                    .iter()
                    .filter(|a| {
                        let headline = a["headline"].as_str().unwrap_or("").to_lowercase();
                        headline.contains("earnings")
                            || headline.contains("results")
                            || headline.contains("guidance")
                    })
                    .filter_map(|a| a["headline"].as_str().map(str::to_string))
                    .take(8)
                    .collect()
            })
            .unwrap_or_default();

        if earnings.is_empty() {
            return Ok(ToolOutput::text(
                empty_envelope("earnings_news", &ticker, "no earnings coverage in range")
                    .to_string(),
            ));
        }

        Ok(ToolOutput::text(format!(
            "EARNINGS NEWS - {ticker}\n- {}",
            earnings.join("\n- ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_metrics_selects_known_keys() {
        let metric = json!({
            "revenueGrowthTTMYoy": 22.1,
            "peTTM": 31.4,
            "unrelated": 9.9,
        });
        let report = render_metrics("AAPL", &metric).unwrap();
        assert!(report.contains("Revenue Growth (TTM YoY): 22.10"));
        assert!(report.contains("P/E Ratio (TTM): 31.40"));
        assert!(!report.contains("unrelated"));
    }

    #[test]
    fn test_render_metrics_empty_when_nothing_known() {
        assert!(render_metrics("AAPL", &json!({"x": 1.0})).is_none());
        assert!(render_metrics("AAPL", &json!({})).is_none());
    }
}
