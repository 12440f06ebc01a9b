//! Market data tools
//!
//! Finnhub-style REST adapters for the market analyst: quote + recent
//! candles, derived technical indicators, insider transactions, and the
//! company profile. Indicators are computed locally from the candle series
//! so one fetch serves both tools.

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

/// Daily price history: latest quote plus recent closes.
pub struct PriceHistoryTool;

#[async_trait]
impl Tool for PriceHistoryTool {
    fn name(&self) -> &str {
        "price_history"
    }

    fn description(&self) -> &str {
        "Latest quote and recent daily closes for a ticker"
    }

    fn args_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "ticker": {"type": "string", "description": "Equity ticker symbol"},
                "days": {"type": "integer", "description": "Lookback window in days", "default": 30}
            },
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
        let quote = get_json(
            &client,
            &format!("{API_BASE}/quote?symbol={ticker}&token={key}"),
        )
        .await?;

        let current = quote["c"].as_f64().unwrap_or(0.0);
        if current == 0.0 {
            return Ok(ToolOutput::text(
                empty_envelope("finnhub", &ticker, "no quote data returned").to_string(),
            ));
        }

        let text = format!(
            "PRICE DATA - {ticker}\n\
             Current: {current:.2}\nOpen: {:.2}\nHigh: {:.2}\nLow: {:.2}\n\
             Previous Close: {:.2}\nChange: {:.2}%",
            quote["o"].as_f64().unwrap_or(0.0),
            quote["h"].as_f64().unwrap_or(0.0),
            quote["l"].as_f64().unwrap_or(0.0),
            quote["pc"].as_f64().unwrap_or(0.0),
            quote["dp"].as_f64().unwrap_or(0.0),
        );
        Ok(ToolOutput {
            text,
            meta: Some(quote),
        })
    }
}

/// Technical indicators derived from the close series.
pub struct TechnicalIndicatorsTool;

#[async_trait]
impl Tool for TechnicalIndicatorsTool {
    fn name(&self) -> &str {
        "technical_indicators"
    }

    fn description(&self) -> &str {
        "SMA, EMA and RSI computed over recent daily closes"
    }

    fn args_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "ticker": {"type": "string"},
                "closes": {"type": "array", "items": {"type": "number"},
                           "description": "Optional close series; fetched when omitted"}
            },
            "required": ["ticker"]
        })
    }

    async fn invoke(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let ticker = ticker_arg(&args)?;

        // Caller-provided series, or a candle fetch when keys are available.
        let closes: Vec<f64> = match args.get("closes").and_then(Value::as_array) {
            Some(values) => values.iter().filter_map(Value::as_f64).collect(),
            None => {
                let Some(key) = api_key() else {
                    return Ok(ToolOutput::text(
                        empty_envelope("finnhub", &ticker, "FINNHUB_API_KEY not configured")
                            .to_string(),
                    ));
                };
                let client = client()?;
                let now = chrono::Utc::now().timestamp();
                let from = now - 60 * 86_400;
                let candles = get_json(
                    &client,
                    &format!(
                        "{API_BASE}/stock/candle?symbol={ticker}&resolution=D&from={from}&to={now}&token={key}"
                    ),
                )
                .await?;
                candles["c"]
                    .as_array()
                    .map(|a| a.iter().filter_map(Value::as_f64).collect())
                    .unwrap_or_default()
            }
        };

        if closes.len() < 15 {
            return Ok(ToolOutput::text(
                empty_envelope("finnhub", &ticker, "insufficient price history for indicators")
                    .to_string(),
            ));
        }

        let report = indicator_report(&ticker, &closes);
        Ok(ToolOutput::text(report))
    }
}

/// Format an indicator report from a close series.
pub fn indicator_report(ticker: &str, closes: &[f64]) -> String {
    let last = *closes.last().unwrap_or(&0.0);
    let sma20 = sma(closes, 20).unwrap_or(last);
    let ema12 = ema(closes, 12).unwrap_or(last);
    let rsi14 = rsi(closes, 14).unwrap_or(50.0);

    let trend = if last > sma20 {
        "above SMA-20 (bullish bias)"
    } else {
        "below SMA-20 (bearish bias)"
    };
    let momentum = if rsi14 > 70.0 {
        "overbought"
    } else if rsi14 < 30.0 {
        "oversold"
    } else {
        "neutral"
    };

    format!(
        "TECHNICAL INDICATORS - {ticker}\n\
         Close: {last:.2}\nSMA-20: {sma20:.2} ({trend})\nEMA-12: {ema12:.2}\n\
         RSI-14: {rsi14:.1} ({momentum})"
    )
}

fn sma(closes: &[f64], period: usize) -> Option<f64> {
    if closes.len() < period {
        return None;
    }
    let window = &closes[closes.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

fn ema(closes: &[f64], period: usize) -> Option<f64> {
    if closes.len() < period {
        return None;
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut value = closes[0];
    for close in &closes[1..] {
        value = alpha * close + (1.0 - alpha) * value;
    }
    Some(value)
}

fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if closes.len() <= period {
        return None;
    }
    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let recent = &deltas[deltas.len() - period..];
    let gains: f64 = recent.iter().filter(|d| **d > 0.0).sum();
    let losses: f64 = -recent.iter().filter(|d| **d < 0.0).sum::<f64>();
    if losses == 0.0 {
        return Some(100.0);
    }
    let rs = gains / losses;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Insider transactions (shared by market and fundamentals toolkits).
pub struct InsiderTransactionsTool;

#[async_trait]
impl Tool for InsiderTransactionsTool {
    fn name(&self) -> &str {
        "insider_transactions"
    }

    fn description(&self) -> &str {
        "Recent insider transactions for a ticker"
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
            &format!("{API_BASE}/stock/insider-transactions?symbol={ticker}&token={key}"),
        )
        .await?;

        let rows = body["data"].as_array().cloned().unwrap_or_default();
        if rows.is_empty() {
            return Ok(ToolOutput::text(
                empty_envelope("finnhub", &ticker, "no insider transactions reported").to_string(),
            ));
        }

        let lines: Vec<String> = rows
            .iter()
            .take(10)
            .map(|row| {
                format!(
                    "{} | {} | shares: {} | change: {}",
                    row["transactionDate"].as_str().unwrap_or("?"),
                    row["name"].as_str().unwrap_or("?"),
                    row["share"].as_i64().unwrap_or(0),
                    row["change"].as_i64().unwrap_or(0),
                )
            })
            .collect();

        Ok(ToolOutput::text(format!(
            "INSIDER TRANSACTIONS - {ticker}\n{}",
            lines.join("\n")
        )))
    }
}

/// Company profile (sector, market cap, listing data).
pub struct CompanyProfileTool;

#[async_trait]
impl Tool for CompanyProfileTool {
    fn name(&self) -> &str {
        "company_profile"
    }

    fn description(&self) -> &str {
        "Company profile: sector, market cap, exchange"
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
        let profile = get_json(
            &client,
            &format!("{API_BASE}/stock/profile2?symbol={ticker}&token={key}"),
        )
        .await?;

        if profile["name"].as_str().unwrap_or("").is_empty() {
            return Ok(ToolOutput::text(
                empty_envelope("finnhub", &ticker, "no profile data returned").to_string(),
            ));
        }

        Ok(ToolOutput::text(format!(
            "COMPANY PROFILE - {ticker}\nName: {}\nIndustry: {}\nMarket Cap: {}M\nExchange: {}",
            profile["name"].as_str().unwrap_or("?"),
            profile["finnhubIndustry"].as_str().unwrap_or("?"),
            profile["marketCapitalization"].as_f64().unwrap_or(0.0),
            profile["exchange"].as_str().unwrap_or("?"),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rising_series(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn test_sma_window() {
        let closes = rising_series(30);
        // Last 20 values are 110..=129, mean 119.5
        assert_eq!(sma(&closes, 20), Some(119.5));
        assert_eq!(sma(&closes[..5], 20), None);
    }

    #[test]
    fn test_rsi_extremes() {
        let rising = rising_series(30);
        assert_eq!(rsi(&rising, 14), Some(100.0));
        let falling: Vec<f64> = rising.iter().rev().cloned().collect();
        let value = rsi(&falling, 14).unwrap();
        assert!(value < 1.0);
    }

    #[test]
    fn test_indicator_report_bias_labels() {
        let rising = rising_series(40);
        let report = indicator_report("AAPL", &rising);
        assert!(report.contains("bullish bias"));
        assert!(report.contains("overbought"));

        let falling: Vec<f64> = rising.iter().rev().cloned().collect();
        let report = indicator_report("AAPL", &falling);
        assert!(report.contains("bearish bias"));
        assert!(report.contains("oversold"));
    }

    #[tokio::test]
    async fn test_indicators_from_provided_series() {
        let tool = TechnicalIndicatorsTool;
        let closes: Vec<f64> = rising_series(30);
        let out = tool
            .invoke(
                json!({"ticker": "aapl", "closes": closes}),
                &ToolContext::default(),
            )
            .await
            .unwrap();
        assert!(out.text.contains("TECHNICAL INDICATORS - AAPL"));
        assert!(out.text.contains("RSI-14"));
    }

    #[tokio::test]
    async fn test_short_series_yields_empty_envelope() {
        let tool = TechnicalIndicatorsTool;
        let out = tool
            .invoke(
                json!({"ticker": "AAPL", "closes": [1.0, 2.0]}),
                &ToolContext::default(),
            )
            .await
            .unwrap();
        let envelope: Value = serde_json::from_str(&out.text).unwrap();
        assert_eq!(envelope["empty_response"], true);
    }
}
