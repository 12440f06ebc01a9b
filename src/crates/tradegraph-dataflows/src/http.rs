//! Shared HTTP plumbing for feed tools
//!
//! One `reqwest::Client` per tool set, error mapping into the tool error
//! taxonomy: connection failures and timeouts are transient, 429 and 5xx
//! are transient, other non-success statuses are permanent.

use serde_json::Value;
use tradegraph_agents::tools::ToolError;

/// Build the shared HTTP client for feed tools.
pub fn feed_client(timeout: std::time::Duration) -> Result<reqwest::Client, ToolError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent("tradegraph/0.1")
        .build()
        .map_err(|e| ToolError::Permanent(format!("http client: {e}")))
}

/// GET a JSON document, mapping failures into the tool error taxonomy.
pub async fn get_json(client: &reqwest::Client, url: &str) -> Result<Value, ToolError> {
    let response = client.get(url).send().await.map_err(map_reqwest_error)?;

    let status = response.status();
    if status.as_u16() == 429 || status.is_server_error() {
        return Err(ToolError::Transient(format!("{url} returned {status}")));
    }
    if !status.is_success() {
        return Err(ToolError::Permanent(format!("{url} returned {status}")));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| ToolError::Permanent(format!("invalid JSON from {url}: {e}")))
}

fn map_reqwest_error(err: reqwest::Error) -> ToolError {
    if err.is_timeout() || err.is_connect() {
        ToolError::Transient(err.to_string())
    } else {
        ToolError::Permanent(err.to_string())
    }
}

/// Required string argument, uppercased (tickers).
pub fn ticker_arg(args: &Value) -> Result<String, ToolError> {
    let ticker = args
        .get("ticker")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or("");
    if ticker.is_empty() {
        return Err(ToolError::Permanent("missing required arg 'ticker'".into()));
    }
    Ok(ticker.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ticker_arg_uppercases() {
        assert_eq!(ticker_arg(&json!({"ticker": " aapl "})).unwrap(), "AAPL");
        assert!(ticker_arg(&json!({})).is_err());
        assert!(ticker_arg(&json!({"ticker": ""})).is_err());
    }
}
