use crate::error::ApiError;
use crate::models::send_log::{AttemptOutcome, SendAttemptRecord, DEFAULT_SUBJECT};
use crate::state::AppState;
use axum::async_trait;
use axum::extract::{ConnectInfo, FromRequest, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use axum::{Form, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Deserialize)]
pub struct SendEmailRequest {
    pub to: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
}

/// Request body as JSON, or as form fields when sent
/// `application/x-www-form-urlencoded`.
pub struct EmailPayload(pub SendEmailRequest);

#[async_trait]
impl<S> FromRequest<S> for EmailPayload
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let parsed = if is_form(req.headers()) {
            Form::<SendEmailRequest>::from_request(req, state)
                .await
                .map(|Form(body)| body)
                .map_err(|e| e.to_string())
        } else {
            Json::<SendEmailRequest>::from_request(req, state)
                .await
                .map(|Json(body)| body)
                .map_err(|e| e.to_string())
        };
        parsed.map(Self).map_err(|e| {
            tracing::debug!(error = %e, "rejected send-email body");
            ApiError::Validation("Request body must be a JSON object or form fields".into())
        })
    }
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| {
            ct.to_ascii_lowercase()
                .starts_with("application/x-www-form-urlencoded")
        })
}

#[derive(Debug, Serialize)]
pub struct SendEmailResponse {
    pub success: bool,
    pub message: String,
    pub log: SendAttemptRecord,
}

/// POST /api/send-email - validate, gate, dispatch, record
pub async fn send_email(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    EmailPayload(req): EmailPayload,
) -> Result<Json<SendEmailResponse>, ApiError> {
    let to = non_empty(req.to);
    let message = non_empty(req.message);
    let (Some(to), Some(message)) = (to, message) else {
        return Err(ApiError::Validation(
            "Recipient address and message are required".into(),
        ));
    };
    if !is_valid_email(&to) {
        return Err(ApiError::Validation("Invalid recipient address format".into()));
    }

    let records = state.store.snapshot().await;
    state.limiter.check(&records, Utc::now())?;
    drop(records);

    let subject = non_empty(req.subject);
    tracing::info!(to = %to, "attempting to send email");
    let outcome = state
        .dispatcher
        .send(&to, subject.as_deref().unwrap_or(DEFAULT_SUBJECT), &message)
        .await;

    let record = SendAttemptRecord::new(
        AttemptOutcome {
            recipient: to,
            subject,
            message,
            succeeded: outcome.succeeded(),
            relay_used: outcome.relay().to_string(),
            error_detail: outcome.error_detail().to_string(),
            client_ip: client_ip(&headers, connect.as_ref()),
        },
        Utc::now(),
    );
    let (record, saved) = state.store.append(record).await;
    if let Err(e) = saved {
        tracing::error!(error = %e, "failed to persist send log");
    }

    if outcome.succeeded() {
        Ok(Json(SendEmailResponse {
            success: true,
            message: "Email sent successfully".into(),
            log: record,
        }))
    } else {
        Err(ApiError::Dispatch {
            detail: record.error_detail().to_string(),
            log: Box::new(record),
        })
    }
}

/// Whitespace-only values count as present.
fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty())
}

/// `local@domain.tld` shape: one `@`, no whitespace, a dot inside the domain.
pub fn is_valid_email(addr: &str) -> bool {
    if addr.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = addr.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// First `X-Forwarded-For` hop, else the socket peer.
fn client_ip(headers: &HeaderMap, connect: Option<&ConnectInfo<SocketAddr>>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| connect.map(|ConnectInfo(addr)| addr.ip().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        for ok in ["a@b.co", "first.last@sub.example.org", "x@y..z", "ü@ex.de"] {
            assert!(is_valid_email(ok), "{ok} should pass");
        }
        for bad in ["", "plain", "@b.co", "a@b", "a@.b", "a@b.", "a b@c.d", "a@b@c.d", "a@b .c"] {
            assert!(!is_valid_email(bad), "{bad} should fail");
        }
    }

    #[test]
    fn only_the_empty_string_is_missing() {
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some(String::new())), None);
        assert_eq!(non_empty(Some(" ".into())).as_deref(), Some(" "));
    }

    #[test]
    fn form_content_type_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_form(&headers));
        headers.insert(CONTENT_TYPE, "application/json".parse().unwrap());
        assert!(!is_form(&headers));
        headers.insert(
            CONTENT_TYPE,
            "Application/X-WWW-Form-Urlencoded; charset=UTF-8".parse().unwrap(),
        );
        assert!(is_form(&headers));
    }

    #[test]
    fn forwarded_header_wins_over_peer() {
        let mut headers = HeaderMap::new();
        let peer = ConnectInfo(SocketAddr::from(([10, 0, 0, 1], 5555)));
        assert_eq!(client_ip(&headers, Some(&peer)).as_deref(), Some("10.0.0.1"));
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers, Some(&peer)).as_deref(), Some("203.0.113.7"));
        assert_eq!(client_ip(&HeaderMap::new(), None), None);
    }
}
