use crate::models::send_log::format_timestamp;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub success: bool,
    pub app: String,
    pub version: String,
    pub daily_limit: u32,
    pub today_count: usize,
    pub remaining: usize,
    pub cooldown: u64,
    pub cooldown_remaining: u64,
    pub last_sent: Option<String>,
    pub total_logs: usize,
    pub timestamp: String,
}

/// GET /api/status - quota and cooldown as of now
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let now = Utc::now();
    let records = state.store.snapshot().await;
    let limiter = &state.limiter;
    Json(StatusResponse {
        success: true,
        app: state.info.name.clone(),
        version: state.info.version.clone(),
        daily_limit: limiter.daily_limit(),
        today_count: limiter.today_count(&records, now),
        remaining: limiter.remaining_today(&records, now),
        cooldown: limiter.cooldown_secs(),
        cooldown_remaining: limiter.cooldown_remaining(&records, now),
        last_sent: records.last().map(|r| format_timestamp(&r.timestamp())),
        total_logs: records.len(),
        timestamp: format_timestamp(&now),
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub app: String,
    pub version: String,
    pub timestamp: String,
    pub environment: String,
}

/// GET /api/test
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        app: state.info.name.clone(),
        version: state.info.version.clone(),
        timestamp: format_timestamp(&Utc::now()),
        environment: state.info.environment.clone(),
    })
}
