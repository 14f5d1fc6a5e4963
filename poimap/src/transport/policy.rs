//! Retry, backoff and failover policy.
//!
//! The transport distinguishes three kinds of retry:
//!
//! | Response | Action | Attempt consumed |
//! |----------|--------|------------------|
//! | 429/503 + `Retry-After` | wait (capped), same mirror | no |
//! | 400, 429 w/o hint, 5xx≠504 | short pause, next mirror | no |
//! | 504 | exponential backoff, same mirror | yes |
//!
//! Only gateway timeouts consume the shared attempt budget; the other paths
//! are bounded by the mirror count and by `max_retry_after_waits`.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Default maximum attempts per fetch, shared across mirrors.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default cap on any `Retry-After` wait (15 seconds).
pub const DEFAULT_RETRY_AFTER_CAP: Duration = Duration::from_secs(15);

/// Default limit on consecutive honored `Retry-After` waits.
pub const DEFAULT_MAX_RETRY_AFTER_WAITS: u32 = 3;

/// Default pause before switching to the next mirror (200ms).
pub const DEFAULT_FAILOVER_PAUSE: Duration = Duration::from_millis(200);

/// Default initial backoff after a gateway timeout (400ms).
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(400);

/// Retry and failover parameters for one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Maximum attempts (including the first) that gateway timeouts may use.
    pub max_attempts: u32,
    /// Upper bound for a single `Retry-After` wait.
    pub retry_after_cap: Duration,
    /// How many `Retry-After` waits a single fetch honors before giving up.
    pub max_retry_after_waits: u32,
    /// Pause before failing over to the next mirror.
    pub failover_pause: Duration,
    /// Backoff after the first gateway timeout; doubles each attempt.
    pub backoff_base: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_after_cap: DEFAULT_RETRY_AFTER_CAP,
            max_retry_after_waits: DEFAULT_MAX_RETRY_AFTER_WAITS,
            failover_pause: DEFAULT_FAILOVER_PAUSE,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }
}

impl FetchPolicy {
    /// Backoff before retrying after attempt `attempt` (1-based) timed out.
    ///
    /// `backoff_base × 2^(attempt-1)`: 400ms, 800ms, 1600ms, ...
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff_base.saturating_mul(1 << exponent)
    }

    /// Capped wait derived from a `Retry-After` header value.
    ///
    /// Returns `None` when the header is absent or unparsable.
    pub fn retry_after_delay(&self, header: Option<&str>, now: DateTime<Utc>) -> Option<Duration> {
        header
            .and_then(|value| parse_retry_after(value, now))
            .map(|delay| delay.min(self.retry_after_cap))
    }
}

/// Parse a `Retry-After` value: delta-seconds or an HTTP-date.
///
/// Dates in the past yield a zero wait.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = date.with_timezone(&Utc) - now;
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}
