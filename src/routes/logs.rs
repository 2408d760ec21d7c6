use crate::error::ApiError;
use crate::models::send_log::SendAttemptRecord;
use crate::state::AppState;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const DEFAULT_LOGS_LIMIT: usize = 50;
pub const MAX_LOGS_LIMIT: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    /// `0` returns the whole log.
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsResponse {
    pub success: bool,
    pub logs: Vec<SendAttemptRecord>,
    pub daily_limit: u32,
    pub cooldown: u64,
    pub today_count: usize,
    pub total_count: usize,
}

/// GET /api/logs - most recent attempts, newest first
pub async fn list_logs(
    State(state): State<AppState>,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> Result<Json<LogsResponse>, ApiError> {
    let Query(q) = query.map_err(|e| ApiError::Validation(format!("Invalid query: {e}")))?;
    let logs = match q.limit.unwrap_or(DEFAULT_LOGS_LIMIT) {
        0 => state.store.all().await,
        n => state.store.recent(n.min(MAX_LOGS_LIMIT)).await,
    };
    let records = state.store.snapshot().await;
    let now = Utc::now();
    Ok(Json(LogsResponse {
        success: true,
        logs,
        daily_limit: state.limiter.daily_limit(),
        cooldown: state.limiter.cooldown_secs(),
        today_count: state.limiter.today_count(&records, now),
        total_count: records.len(),
    }))
}

/// GET /api/export-logs - full log as a JSON download
pub async fn export_logs(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let body = state.store.export_json().await.map_err(|e| {
        tracing::error!(error = %e, "exporting send log failed");
        ApiError::Internal
    })?;
    let filename = format!("sendmail-logs-{}.json", Utc::now().format("%Y-%m-%d"));
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    ))
}

/// DELETE /api/reset-logs
pub async fn reset_logs(State(state): State<AppState>) -> impl IntoResponse {
    if let Err(e) = state.store.reset().await {
        tracing::error!(error = %e, "failed to persist reset send log");
    }
    tracing::info!("send log reset");
    Json(json!({ "success": true, "message": "Logs reset successfully" }))
}
