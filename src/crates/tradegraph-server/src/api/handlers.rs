//! Request handlers: analyze, analyze/stream, health

use crate::api::error::ApiError;
use crate::api::routes::AppState;
use crate::session::{
    default_trade_date, normalize_ticker, run_session, stream_session, AnalysisResponse,
};
use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::Stream;

/// Body of `POST /analyze`.
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub ticker: String,
}

/// Query of `GET /analyze/stream`.
#[derive(Debug, Deserialize)]
pub struct StreamParams {
    pub ticker: String,
}

/// Liveness payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Handler for `GET /health`.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Handler for `POST /analyze`: run a session to completion.
pub async fn analyze(
    State(app): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let ticker = normalize_ticker(&request.ticker)
        .ok_or_else(|| ApiError::BadRequest("ticker must be a non-empty string".into()))?;
    let date = default_trade_date();

    tracing::info!(%ticker, %date, "analyze request accepted");
    let response = run_session(app.services.clone(), ticker, date).await;
    Ok(Json(response))
}

/// Handler for `GET /analyze/stream`: SSE progress stream.
pub async fn analyze_stream(
    State(app): State<AppState>,
    Query(params): Query<StreamParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let ticker = normalize_ticker(&params.ticker)
        .ok_or_else(|| ApiError::BadRequest("ticker must be a non-empty string".into()))?;
    let date = default_trade_date();

    tracing::info!(%ticker, %date, "stream request accepted");
    let events = stream_session(app.services.clone(), ticker, date).map(|event| {
        let payload = serde_json::to_string(&event)
            .unwrap_or_else(|_| r#"{"type":"error","message":"serialization failed"}"#.to_string());
        Ok(Event::default().data(payload))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_payload() {
        let Json(body) = health().await;
        assert_eq!(body.status, "ok");
    }
}
