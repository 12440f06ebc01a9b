//! Result persistence
//!
//! Writes session artifacts under `<results_dir>/<ticker>/<date>/`: the
//! full response as `response.json` plus one text file per section, so the
//! outputs are greppable without parsing JSON.

use crate::session::AnalysisResponse;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Persist a completed session; returns the directory written.
pub async fn persist_session(
    results_dir: &Path,
    response: &AnalysisResponse,
) -> std::io::Result<PathBuf> {
    let target = results_dir
        .join(&response.ticker)
        .join(&response.analysis_date);
    fs::create_dir_all(&target).await?;

    let json = serde_json::to_string_pretty(response)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    fs::write(target.join("response.json"), json).await?;

    let sections: [(&str, &str); 8] = [
        ("market", &response.market_report),
        ("sentiment", &response.sentiment_report),
        ("news", &response.news_report),
        ("fundamentals", &response.fundamentals_report),
        ("investment_plan", &response.investment_plan),
        ("trader_investment_plan", &response.trader_investment_plan),
        ("final_trade_decision", &response.final_trade_decision),
        ("signal", &response.processed_signal),
    ];
    for (name, content) in sections {
        fs::write(target.join(format!("{name}.txt")), content).await?;
    }

    tracing::info!(dir = %target.display(), "session artifacts persisted");
    Ok(target)
}
