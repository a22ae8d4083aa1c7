use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::AppState;
use liquidity_signals::{
    types::SourceHealth, FeedPayload, HiddenQeSignal, HistoryScan, ScoreMode,
    DEFAULT_HISTORY_YEARS, MAX_HISTORY_YEARS,
};

/// Query params for the dashboard feed
#[derive(Debug, serde::Deserialize)]
pub struct DataQuery {
    mode: Option<String>,
}

/// Query params for the history scan
#[derive(Debug, serde::Deserialize)]
pub struct HistoryQuery {
    years: Option<u32>,
}

/// GET /api/data - dashboard payload; unknown modes fall back to momentum
pub async fn get_data(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DataQuery>,
) -> Result<Json<FeedPayload>, (StatusCode, Json<Value>)> {
    let mode = query
        .mode
        .as_deref()
        .map(ScoreMode::parse_or_default)
        .unwrap_or_else(|| state.feed.default_mode());

    info!("Building feed ({})", mode.as_str());

    match state.feed.payload(mode).await {
        Ok(payload) => Ok(Json(payload)),
        Err(e) => {
            warn!("Feed unavailable: {}", e);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Fresh data unavailable and no fallback snapshot: {}", e),
            ))
        }
    }
}

/// GET /api/hidden-qe - latest hidden-QE classification
pub async fn get_hidden_qe(State(state): State<Arc<AppState>>) -> Json<HiddenQeSignal> {
    Json(state.feed.hidden_qe_latest().await)
}

/// GET /api/hidden-qe/history?years=N
pub async fn get_hidden_qe_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryScan>, (StatusCode, Json<Value>)> {
    let years = clamp_years(query.years);
    info!("Scanning hidden QE history over {} years", years);

    state.feed.history(years).await.map(Json).map_err(|e| {
        warn!("History scan failed: {}", e);
        error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
    })
}

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": message.into() })))
}

fn clamp_years(years: Option<u32>) -> u32 {
    years
        .unwrap_or(DEFAULT_HISTORY_YEARS)
        .clamp(1, MAX_HISTORY_YEARS)
}

/// GET /health - Service health check
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let source_health = state.feed.health_check().await;

    let all_healthy = source_health.iter().all(|h| h.is_healthy);

    Json(HealthResponse {
        status: if all_healthy { "healthy".to_string() } else { "degraded".to_string() },
        snapshot_store: state.feed.snapshot_store().to_string(),
        sources: source_health,
    })
}

#[derive(Debug, serde::Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub snapshot_store: String,
    pub sources: Vec<SourceHealth>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_years_default_and_clamp() {
        assert_eq!(clamp_years(None), 5);
        assert_eq!(clamp_years(Some(0)), 1);
        assert_eq!(clamp_years(Some(50)), 20);
        assert_eq!(clamp_years(Some(7)), 7);
    }

    #[test]
    fn test_history_errors_use_json_body() {
        let err = liquidity_signals::SignalError::SourceUnhealthy("fred: no history".to_string());
        let (status, Json(body)) = error_response(StatusCode::SERVICE_UNAVAILABLE, err.to_string());

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], err.to_string());
        assert_eq!(body.as_object().map(|o| o.len()), Some(1));
    }
}
