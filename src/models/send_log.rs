//! Send-attempt records kept in the JSON log file

use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize, Serializer};

pub const DEFAULT_SUBJECT: &str = "(No Subject)";
pub const PREVIEW_CHARS: usize = 100;

/// Everything the handler knows about an attempt once dispatch has finished.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub recipient: String,
    pub subject: Option<String>,
    pub message: String,
    pub succeeded: bool,
    pub relay_used: String,
    pub error_detail: String,
    pub client_ip: Option<String>,
}

/// One immutable log entry. Built through [`SendAttemptRecord::new`] or read
/// back from the log file; both paths derive `date_key` from `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredRecord")]
pub struct SendAttemptRecord {
    id: i64,
    recipient: String,
    subject: String,
    message_preview: String,
    message_full: String,
    date_key: NaiveDate,
    #[serde(serialize_with = "serialize_millis")]
    timestamp: DateTime<Utc>,
    succeeded: bool,
    relay_used: String,
    error_detail: String,
    #[serde(default)]
    client_ip: Option<String>,
}

/// On-disk shape. A stored `dateKey` is ignored and recomputed.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    id: i64,
    recipient: String,
    subject: String,
    message_preview: String,
    message_full: String,
    timestamp: DateTime<Utc>,
    succeeded: bool,
    relay_used: String,
    error_detail: String,
    #[serde(default)]
    client_ip: Option<String>,
}

impl From<StoredRecord> for SendAttemptRecord {
    fn from(raw: StoredRecord) -> Self {
        let timestamp = raw.timestamp.trunc_subsecs(3);
        Self {
            id: raw.id,
            recipient: raw.recipient,
            subject: raw.subject,
            message_preview: raw.message_preview,
            message_full: raw.message_full,
            date_key: timestamp.date_naive(),
            timestamp,
            succeeded: raw.succeeded,
            relay_used: raw.relay_used,
            error_detail: raw.error_detail,
            client_ip: raw.client_ip,
        }
    }
}

impl SendAttemptRecord {
    pub fn new(outcome: AttemptOutcome, at: DateTime<Utc>) -> Self {
        let timestamp = at.trunc_subsecs(3);
        let subject = outcome
            .subject
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SUBJECT.to_string());
        Self {
            id: timestamp.timestamp_millis(),
            recipient: outcome.recipient,
            subject,
            message_preview: preview(&outcome.message),
            message_full: outcome.message,
            date_key: timestamp.date_naive(),
            timestamp,
            succeeded: outcome.succeeded,
            relay_used: outcome.relay_used,
            error_detail: outcome.error_detail,
            client_ip: outcome.client_ip,
        }
    }

    /// Only the log store reassigns ids, to keep them strictly increasing.
    pub(crate) fn bump_id_after(&mut self, previous: i64) {
        if self.id <= previous {
            self.id = previous + 1;
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }
    pub fn recipient(&self) -> &str {
        &self.recipient
    }
    pub fn subject(&self) -> &str {
        &self.subject
    }
    pub fn message_preview(&self) -> &str {
        &self.message_preview
    }
    pub fn message_full(&self) -> &str {
        &self.message_full
    }
    pub fn date_key(&self) -> NaiveDate {
        self.date_key
    }
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
    pub fn succeeded(&self) -> bool {
        self.succeeded
    }
    pub fn relay_used(&self) -> &str {
        &self.relay_used
    }
    pub fn error_detail(&self) -> &str {
        &self.error_detail
    }
    pub fn client_ip(&self) -> Option<&str> {
        self.client_ip.as_deref()
    }
}

/// First [`PREVIEW_CHARS`] characters, with `...` appended when cut.
pub fn preview(message: &str) -> String {
    let mut chars = message.char_indices();
    match chars.nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &message[..cut]),
        None => message.to_string(),
    }
}

/// Formats like `2024-05-01T10:00:00.123Z`.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn serialize_millis<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_timestamp(ts))
}
