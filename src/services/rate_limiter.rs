use crate::models::send_log::SendAttemptRecord;
use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_DAILY_LIMIT: u32 = 15;
pub const DEFAULT_COOLDOWN_SECS: u64 = 60;
/// Longest cooldown accepted: one year.
pub const MAX_COOLDOWN_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitError {
    #[error("Daily limit of {limit} emails reached. Try again tomorrow.")]
    DailyLimit { limit: u32, count: usize },

    #[error("Please wait {remaining_secs} seconds before sending the next email")]
    Cooldown { remaining_secs: u64 },
}

/// Daily quota and cooldown gates derived from the send log.
///
/// Every attempt counts, failed ones included, and the cooldown runs from the
/// last attempt rather than the last success. Days are bucketed by UTC date.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiter {
    daily_limit: u32,
    cooldown_secs: u64,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_DAILY_LIMIT, DEFAULT_COOLDOWN_SECS)
    }
}

impl RateLimiter {
    /// `cooldown_secs` is capped at [`MAX_COOLDOWN_SECS`].
    pub fn new(daily_limit: u32, cooldown_secs: u64) -> Self {
        Self {
            daily_limit,
            cooldown_secs: cooldown_secs.min(MAX_COOLDOWN_SECS),
        }
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    pub fn cooldown_secs(&self) -> u64 {
        self.cooldown_secs
    }

    pub fn today_count(&self, records: &[SendAttemptRecord], now: DateTime<Utc>) -> usize {
        let today = now.date_naive();
        records.iter().filter(|r| r.date_key() == today).count()
    }

    pub fn remaining_today(&self, records: &[SendAttemptRecord], now: DateTime<Utc>) -> usize {
        (self.daily_limit as usize).saturating_sub(self.today_count(records, now))
    }

    pub fn is_over_daily_limit(&self, records: &[SendAttemptRecord], now: DateTime<Utc>) -> bool {
        self.today_count(records, now) >= self.daily_limit as usize
    }

    pub fn is_in_cooldown(&self, records: &[SendAttemptRecord], now: DateTime<Utc>) -> bool {
        match records.last() {
            Some(last) => now - last.timestamp() < self.cooldown(),
            None => false,
        }
    }

    /// Whole seconds left in the cooldown window, rounded up; 0 when open.
    pub fn cooldown_remaining(&self, records: &[SendAttemptRecord], now: DateTime<Utc>) -> u64 {
        let Some(last) = records.last() else {
            return 0;
        };
        let left = self.cooldown() - (now - last.timestamp());
        if left <= Duration::zero() {
            return 0;
        }
        let ms = left.num_milliseconds().max(0) as u64;
        ms.div_ceil(1000)
    }

    /// Daily limit first, then cooldown.
    pub fn check(&self, records: &[SendAttemptRecord], now: DateTime<Utc>) -> Result<(), RateLimitError> {
        let count = self.today_count(records, now);
        if count >= self.daily_limit as usize {
            tracing::info!(count, limit = self.daily_limit, "daily limit reached");
            return Err(RateLimitError::DailyLimit {
                limit: self.daily_limit,
                count,
            });
        }
        if self.is_in_cooldown(records, now) {
            let remaining_secs = self.cooldown_remaining(records, now).max(1);
            tracing::info!(remaining_secs, cooldown = self.cooldown_secs, "cooldown active");
            return Err(RateLimitError::Cooldown { remaining_secs });
        }
        Ok(())
    }

    fn cooldown(&self) -> Duration {
        // bounded by MAX_COOLDOWN_SECS, far inside TimeDelta's range
        Duration::seconds(self.cooldown_secs as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::send_log::AttemptOutcome;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, h, m, s).unwrap()
    }

    fn attempt(ts: DateTime<Utc>, succeeded: bool) -> SendAttemptRecord {
        SendAttemptRecord::new(
            AttemptOutcome {
                recipient: "rcpt@example.com".into(),
                subject: None,
                message: "hi".into(),
                succeeded,
                relay_used: "SMTP 1".into(),
                error_detail: String::new(),
                client_ip: None,
            },
            ts,
        )
    }

    #[test]
    fn empty_log_passes_both_gates() {
        let rl = RateLimiter::default();
        assert!(!rl.is_over_daily_limit(&[], at(10, 0, 0)));
        assert!(!rl.is_in_cooldown(&[], at(10, 0, 0)));
        assert_eq!(rl.cooldown_remaining(&[], at(10, 0, 0)), 0);
        assert!(rl.check(&[], at(10, 0, 0)).is_ok());
    }

    #[test]
    fn cooldown_scenario() {
        let rl = RateLimiter::new(15, 60);
        let t0 = at(10, 0, 0);
        let log = vec![attempt(t0, true)];

        assert_eq!(
            rl.check(&log, t0 + Duration::seconds(30)),
            Err(RateLimitError::Cooldown { remaining_secs: 30 })
        );
        assert!(rl.is_in_cooldown(&log, t0 + Duration::milliseconds(59_999)));
        assert!(!rl.is_in_cooldown(&log, t0 + Duration::seconds(60)));
        assert!(rl.check(&log, t0 + Duration::seconds(61)).is_ok());
    }

    #[test]
    fn failed_attempt_still_starts_cooldown() {
        let rl = RateLimiter::new(15, 60);
        let t0 = at(10, 0, 0);
        let log = vec![attempt(t0 - Duration::seconds(600), true), attempt(t0, false)];
        assert!(rl.is_in_cooldown(&log, t0 + Duration::seconds(5)));
        assert_eq!(rl.cooldown_remaining(&log, t0 + Duration::milliseconds(5_500)), 55);
    }

    #[test]
    fn daily_limit_counts_every_attempt_and_wins_over_cooldown() {
        let rl = RateLimiter::new(15, 60);
        let base = at(8, 0, 0);
        let log: Vec<_> = (0..15)
            .map(|i| attempt(base + Duration::minutes(i * 2), i % 3 != 0))
            .collect();
        let last = base + Duration::minutes(28);

        assert_eq!(rl.today_count(&log, last), 15);
        assert_eq!(rl.remaining_today(&log, last), 0);
        assert!(rl.is_over_daily_limit(&log, last));
        assert!(matches!(
            rl.check(&log, last + Duration::seconds(1)),
            Err(RateLimitError::DailyLimit { limit: 15, count: 15 })
        ));
        assert!(matches!(
            rl.check(&log, last + Duration::hours(1)),
            Err(RateLimitError::DailyLimit { .. })
        ));
    }

    #[test]
    fn other_dates_never_count() {
        let rl = RateLimiter::new(2, 60);
        let yesterday = at(23, 59, 50) - Duration::days(1);
        let log = vec![attempt(yesterday, true), attempt(yesterday, true)];
        let now = at(12, 0, 0);
        assert_eq!(rl.today_count(&log, now), 0);
        assert!(!rl.is_over_daily_limit(&log, now));
    }

    #[test]
    fn utc_midnight_splits_days() {
        let rl = RateLimiter::new(1, 0);
        let before = Utc.with_ymd_and_hms(2024, 6, 1, 23, 59, 59).unwrap();
        let log = vec![attempt(before, true)];
        assert!(rl.is_over_daily_limit(&log, before));
        assert!(!rl.is_over_daily_limit(&log, before + Duration::seconds(2)));
    }

    #[test]
    fn oversized_cooldown_is_capped() {
        let rl = RateLimiter::new(15, 10_000_000_000_000_000);
        assert_eq!(rl.cooldown_secs(), MAX_COOLDOWN_SECS);
        let t0 = at(10, 0, 0);
        let log = vec![attempt(t0, true)];
        assert!(rl.is_in_cooldown(&log, t0 + Duration::days(30)));
        assert_eq!(rl.cooldown_remaining(&log, t0), MAX_COOLDOWN_SECS);
    }
}
