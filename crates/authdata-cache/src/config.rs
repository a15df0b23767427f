//! Per-binding query configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for one query binding.
///
/// Controls how long cached data stays fresh and how failures are
/// retried. All fields have conservative defaults; use the `with_*`
/// builders to override selectively.
///
/// # Example (TOML)
///
/// ```toml
/// stale_time = "10s"
/// retry_on_error = true
/// max_retries = 3
/// retry_delay = "1s"
/// suppress_statuses = [404]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryConfig {
    /// How long a cached entry is considered fresh.
    /// Reads past this age trigger a background revalidation.
    #[serde(with = "humantime_serde")]
    pub stale_time: Duration,

    /// Retry transient failures at all.
    /// When disabled, every failure is terminal.
    pub retry_on_error: bool,

    /// Retry budget for transient failures.
    pub max_retries: u32,

    /// Base backoff delay. The n-th retry waits `retry_delay * n`
    /// (linear backoff), bounding total retry time to
    /// `retry_delay * max_retries * (max_retries + 1) / 2`.
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,

    /// Client-error statuses whose terminal failure is not surfaced to
    /// the notification sink. 404 is suppressed by default: an absent
    /// resource is an expected outcome, not a user-facing fault.
    pub suppress_statuses: Vec<u16>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_secs(10),
            retry_on_error: true,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            suppress_statuses: vec![404],
        }
    }
}

impl QueryConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the staleness window.
    #[must_use]
    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    /// Enables or disables retries entirely.
    #[must_use]
    pub fn with_retry_on_error(mut self, retry: bool) -> Self {
        self.retry_on_error = retry;
        self
    }

    /// Sets the retry budget.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the base backoff delay.
    #[must_use]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Sets the statuses whose notifications are suppressed.
    #[must_use]
    pub fn with_suppress_statuses(mut self, statuses: Vec<u16>) -> Self {
        self.suppress_statuses = statuses;
        self
    }

    /// Whether a terminal failure with this status should skip the
    /// notification sink.
    #[must_use]
    pub fn suppresses(&self, status: u16) -> bool {
        self.suppress_statuses.contains(&status)
    }
}
