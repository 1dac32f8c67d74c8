//! Client configuration, with environment overrides.

use log::warn;
use std::str::FromStr;
use std::time::Duration;

use civic_ledger_core::sync::{
    default_max_poll_interval, PollPolicy, CHAIN_SYNC_RESULT_FETCH_ATTEMPTS,
};

const DEFAULT_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_URL: &str = "CHAIN_SYNC_API_URL";
pub const ENV_POLL_INTERVAL_MS: &str = "CHAIN_SYNC_POLL_INTERVAL_MS";
pub const ENV_POLL_MAX_ATTEMPTS: &str = "CHAIN_SYNC_POLL_MAX_ATTEMPTS";
pub const ENV_POLL_MAX_DURATION_SECS: &str = "CHAIN_SYNC_POLL_MAX_DURATION_SECS";
pub const ENV_POLL_BACKOFF_FACTOR: &str = "CHAIN_SYNC_POLL_BACKOFF_FACTOR";
pub const ENV_POLL_MAX_INTERVAL_MS: &str = "CHAIN_SYNC_POLL_MAX_INTERVAL_MS";
pub const ENV_RESULT_FETCH_ATTEMPTS: &str = "CHAIN_SYNC_RESULT_FETCH_ATTEMPTS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "CHAIN_SYNC_REQUEST_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq)]
pub struct SyncClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub poll_policy: PollPolicy,
    pub result_fetch_attempts: u32,
}

impl Default for SyncClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            poll_policy: PollPolicy::default(),
            result_fetch_attempts: CHAIN_SYNC_RESULT_FETCH_ATTEMPTS,
        }
    }
}

impl SyncClientConfig {
    /// Defaults overridden by `CHAIN_SYNC_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = non_empty(&lookup, ENV_API_URL) {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, ENV_REQUEST_TIMEOUT_SECS) {
            config.request_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, ENV_POLL_INTERVAL_MS) {
            config.poll_policy.interval = Duration::from_millis(ms);
        }
        if let Some(max) = parse_var::<u32, _>(&lookup, ENV_POLL_MAX_ATTEMPTS) {
            // 0 means unbounded
            config.poll_policy.max_attempts = (max > 0).then_some(max);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, ENV_POLL_MAX_DURATION_SECS) {
            config.poll_policy.max_duration = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(factor) = parse_var::<f64, _>(&lookup, ENV_POLL_BACKOFF_FACTOR) {
            if factor > 1.0 {
                let max_interval = parse_var::<u64, _>(&lookup, ENV_POLL_MAX_INTERVAL_MS)
                    .map(Duration::from_millis)
                    .unwrap_or_else(default_max_poll_interval);
                config.poll_policy = config
                    .poll_policy
                    .with_exponential_backoff(factor, max_interval);
            }
        }
        if let Some(attempts) = parse_var::<u32, _>(&lookup, ENV_RESULT_FETCH_ATTEMPTS) {
            config.result_fetch_attempts = attempts.max(1);
        }

        config
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = non_empty(lookup, key)?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("Ignoring invalid {}='{}': {}", key, raw, err);
            None
        }
    }
}
