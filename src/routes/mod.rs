use crate::state::AppState;
use axum::extract::OriginalUri;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;

pub mod logs;
pub mod send;
pub mod status;

/// Everything under `/api`. Unknown paths get a JSON 404, never the SPA page.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(status::status))
        .route("/send-email", post(send::send_email))
        .route("/logs", get(logs::list_logs))
        .route("/export-logs", get(logs::export_logs))
        .route("/reset-logs", delete(logs::reset_logs))
        .route("/test", get(status::health))
        .fallback(api_not_found)
}

async fn api_not_found(OriginalUri(uri): OriginalUri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "message": "API endpoint not found",
            "path": uri.path_and_query().map(|p| p.as_str()).unwrap_or(uri.path()),
        })),
    )
}
