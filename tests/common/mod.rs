#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use sendmail_relay::app;
use sendmail_relay::persist::SendLogStore;
use sendmail_relay::services::rate_limiter::RateLimiter;
use sendmail_relay::smtp::{Dispatcher, MailRelay, OutgoingMail, RelayError};
use sendmail_relay::state::{AppInfo, AppState};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::util::ServiceExt;

/// Relay double that records what it was asked to deliver.
pub struct FakeRelay {
    label: String,
    fail_with: Option<String>,
    pub calls: AtomicUsize,
    pub sent: Mutex<Vec<OutgoingMail>>,
}

impl FakeRelay {
    pub fn ok(label: &str) -> Arc<Self> {
        Self::build(label, None)
    }

    pub fn failing(label: &str, err: &str) -> Arc<Self> {
        Self::build(label, Some(err.to_string()))
    }

    fn build(label: &str, fail_with: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_string(),
            fail_with,
            calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailRelay for FakeRelay {
    fn label(&self) -> &str {
        &self.label
    }

    async fn send(&self, mail: &OutgoingMail) -> Result<(), RelayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.fail_with {
            Some(e) => Err(RelayError::Tls(e.clone())),
            None => {
                self.sent.lock().unwrap().push(mail.clone());
                Ok(())
            }
        }
    }
}

pub struct TestContext {
    pub temp_dir: TempDir,
    pub state: AppState,
    pub app: axum::Router,
}

pub async fn build_test_context(relays: Vec<Arc<FakeRelay>>, limiter: RateLimiter) -> TestContext {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(temp_dir.path().join("index.html"), "<html>send mail</html>").unwrap();

    let store = SendLogStore::load(temp_dir.path().join("logs.json")).await;
    let relays: Vec<Arc<dyn MailRelay>> = relays.into_iter().map(|r| r as Arc<dyn MailRelay>).collect();
    let state = AppState::new(store, limiter, Dispatcher::new(relays, None), AppInfo::default());
    let app = app::build_app(state.clone(), temp_dir.path());

    TestContext {
        temp_dir,
        state,
        app,
    }
}

pub async fn request(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    headers: &[(&str, &str)],
) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
        builder = builder.header(*k, *v);
    }
    let req_body = match body {
        Some(v) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let req = builder.body(req_body).expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    (status, headers, bytes.to_vec())
}

/// Sends `body` as-is with the given content type.
pub async fn request_raw(
    app: &axum::Router,
    method: &str,
    uri: &str,
    content_type: &str,
    body: &str,
) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", content_type)
        .body(Body::from(body.to_string()))
        .expect("request should build");
    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let (status, _, bytes) = request(app, method, uri, body, &[]).await;
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };
    (status, json)
}
