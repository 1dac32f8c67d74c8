//! Polling cadence, retry classification, and progress display rules.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::chain_sync_scheduler::{
    CHAIN_SYNC_INITIAL_POLL_DELAY_MS, CHAIN_SYNC_POLL_INTERVAL_MS, CHAIN_SYNC_POLL_MAX_ATTEMPTS,
    CHAIN_SYNC_POLL_MAX_INTERVAL_MS,
};

/// Displayed progress never drops below this once a job exists.
pub const PROGRESS_FLOOR: u8 = 20;

const RESULT_FETCH_BASE_BACKOFF_MS: u64 = 250;
const RESULT_FETCH_MAX_BACKOFF_MS: u64 = 4_000;

/// Retry policy classification for API failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRetryClass {
    Retryable,
    Permanent,
    ReauthRequired,
}

/// Classify HTTP status into retry behavior.
pub fn classify_http_status(status: u16) -> SyncRetryClass {
    match status {
        401 | 403 => SyncRetryClass::ReauthRequired,
        408 | 409 | 423 | 425 | 429 => SyncRetryClass::Retryable,
        500..=599 => SyncRetryClass::Retryable,
        _ => SyncRetryClass::Permanent,
    }
}

/// Spacing between consecutive status polls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed,
    Exponential { factor: f64, max_interval: Duration },
}

/// Bounds and cadence of the status polling loop.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub initial_delay: Duration,
    /// `None` polls until the job reaches a terminal state.
    pub max_attempts: Option<u32>,
    pub max_duration: Option<Duration>,
    pub backoff: Backoff,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(CHAIN_SYNC_POLL_INTERVAL_MS),
            initial_delay: Duration::from_millis(CHAIN_SYNC_INITIAL_POLL_DELAY_MS),
            max_attempts: Some(CHAIN_SYNC_POLL_MAX_ATTEMPTS),
            max_duration: None,
            backoff: Backoff::Fixed,
        }
    }
}

impl PollPolicy {
    /// Exponential backoff from the current interval, capped at `max_interval`.
    pub fn with_exponential_backoff(mut self, factor: f64, max_interval: Duration) -> Self {
        self.backoff = Backoff::Exponential {
            factor,
            max_interval,
        };
        self
    }

    /// Delay to wait after poll number `attempt` (1-based) before the next one.
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential {
                factor,
                max_interval,
            } => {
                if !(factor.is_finite() && factor > 1.0) {
                    return self.interval;
                }
                let exp = attempt.saturating_sub(1).min(16) as i32;
                let scaled = self.interval.as_secs_f64() * factor.powi(exp);
                let capped = scaled.min(max_interval.as_secs_f64()).max(0.0);
                Duration::from_secs_f64(capped).max(self.interval.min(max_interval))
            }
        }
    }

    pub fn attempts_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }

    pub fn duration_exhausted(&self, elapsed: Duration) -> bool {
        self.max_duration.is_some_and(|max| elapsed >= max)
    }
}

/// Default exponential cap when backoff is enabled without an explicit bound.
pub fn default_max_poll_interval() -> Duration {
    Duration::from_millis(CHAIN_SYNC_POLL_MAX_INTERVAL_MS)
}

/// Progress to display after a poll: never regresses and never shows less
/// than [`PROGRESS_FLOOR`].
pub fn display_progress(previous: u8, reported: u8) -> u8 {
    previous.max(reported.max(PROGRESS_FLOOR)).min(100)
}

/// Exponential backoff with jitter between result fetch attempts.
pub fn result_fetch_backoff(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(8);
    let backoff = (RESULT_FETCH_BASE_BACKOFF_MS.saturating_mul(1_u64 << exp))
        .min(RESULT_FETCH_MAX_BACKOFF_MS);
    let jitter = rand::thread_rng().gen_range(0..=(backoff / 5).max(1));
    Duration::from_millis(backoff.saturating_add(jitter))
}
