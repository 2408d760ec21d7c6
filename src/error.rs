use crate::models::send_log::SendAttemptRecord;
use crate::services::rate_limiter::RateLimitError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Every failure a request can end in. Storage errors are not here: they are
/// logged and never reach the client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    RateLimited(#[from] RateLimitError),

    #[error("Failed to send email: {detail}")]
    Dispatch {
        detail: String,
        log: Box<SendAttemptRecord>,
    },

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Dispatch { .. } | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        let body = match self {
            ApiError::Dispatch { log, .. } => json!({
                "success": false,
                "message": message,
                "log": log,
            }),
            _ => json!({ "success": false, "message": message }),
        };
        (status, Json(body)).into_response()
    }
}
