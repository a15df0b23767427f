//! Retry policy for failed fetches.
//!
//! [`decide`] is a pure function from (error, retries so far, config) to
//! the next action, so the backoff rules are unit-testable without any
//! cache or timer machinery:
//!
//! - client errors (4xx) are terminal and never retried - the request is
//!   at fault, repeating it cannot succeed. Notification is skipped for
//!   statuses in [`QueryConfig::suppress_statuses`] (404 by default);
//! - retryable errors (5xx, statusless API errors, network failures) are
//!   retried with linear backoff while budget remains;
//! - an exhausted budget, disabled retries, or an unclassified error is
//!   terminal with an unconditional notification.

use std::time::Duration;

use crate::config::QueryConfig;
use crate::error::FetchError;

/// What to do after a failed fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Schedule another attempt after `delay`. `attempt` is the new
    /// retry counter value (1-based).
    Retry {
        /// The 1-based number of this retry.
        attempt: u32,
        /// Backoff before re-entering the fetch: `retry_delay * attempt`.
        delay: Duration,
    },

    /// Stop retrying. The cache is set to the explicit-null result and,
    /// when `notify` is true, the error is surfaced to the sink.
    Terminal {
        /// Whether to surface the error to the notification sink.
        notify: bool,
    },
}

/// Classifies a failed fetch and decides the next action.
///
/// `retries_so_far` is the number of retries already performed for the
/// current logical request (0 on the first failure).
#[must_use]
pub fn decide(error: &FetchError, retries_so_far: u32, config: &QueryConfig) -> RetryDecision {
    if let Some(status) = error.status()
        && (400..500).contains(&status)
    {
        return RetryDecision::Terminal {
            notify: !config.suppresses(status),
        };
    }

    if error.is_retryable() && config.retry_on_error && retries_so_far < config.max_retries {
        let attempt = retries_so_far + 1;
        return RetryDecision::Retry {
            attempt,
            delay: config.retry_delay * attempt,
        };
    }

    RetryDecision::Terminal { notify: true }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: Option<u16>) -> FetchError {
        FetchError::Api {
            status,
            message: "boom".to_string(),
        }
    }

    #[test]
    fn client_error_is_terminal_and_notified() {
        let config = QueryConfig::default();
        assert_eq!(
            decide(&api_error(Some(401)), 0, &config),
            RetryDecision::Terminal { notify: true }
        );
    }

    #[test]
    fn not_found_is_terminal_but_suppressed() {
        let config = QueryConfig::default();
        assert_eq!(
            decide(&api_error(Some(404)), 0, &config),
            RetryDecision::Terminal { notify: false }
        );
    }

    #[test]
    fn suppression_is_configurable() {
        let config = QueryConfig::default().with_suppress_statuses(vec![404, 410]);
        assert_eq!(
            decide(&api_error(Some(410)), 0, &config),
            RetryDecision::Terminal { notify: false }
        );

        let config = QueryConfig::default().with_suppress_statuses(vec![]);
        assert_eq!(
            decide(&api_error(Some(404)), 0, &config),
            RetryDecision::Terminal { notify: true }
        );
    }

    #[test]
    fn server_error_retries_with_linear_backoff() {
        let config = QueryConfig::default().with_retry_delay(Duration::from_secs(1));

        assert_eq!(
            decide(&api_error(Some(500)), 0, &config),
            RetryDecision::Retry {
                attempt: 1,
                delay: Duration::from_secs(1)
            }
        );
        assert_eq!(
            decide(&api_error(Some(500)), 1, &config),
            RetryDecision::Retry {
                attempt: 2,
                delay: Duration::from_secs(2)
            }
        );
        assert_eq!(
            decide(&api_error(Some(500)), 2, &config),
            RetryDecision::Retry {
                attempt: 3,
                delay: Duration::from_secs(3)
            }
        );
    }

    #[test]
    fn exhausted_budget_is_terminal_and_notified() {
        let config = QueryConfig::default().with_max_retries(3);
        assert_eq!(
            decide(&api_error(Some(500)), 3, &config),
            RetryDecision::Terminal { notify: true }
        );
    }

    #[test]
    fn statusless_api_error_is_retryable() {
        let config = QueryConfig::default();
        assert!(matches!(
            decide(&api_error(None), 0, &config),
            RetryDecision::Retry { attempt: 1, .. }
        ));
    }

    #[test]
    fn network_error_is_retryable() {
        let config = QueryConfig::default();
        assert!(matches!(
            decide(&FetchError::Network("refused".to_string()), 0, &config),
            RetryDecision::Retry { .. }
        ));
    }

    #[test]
    fn unclassified_error_is_always_terminal() {
        let config = QueryConfig::default();
        assert_eq!(
            decide(&FetchError::Unclassified("bug".to_string()), 0, &config),
            RetryDecision::Terminal { notify: true }
        );
    }

    #[test]
    fn disabled_retries_make_everything_terminal() {
        let config = QueryConfig::default().with_retry_on_error(false);
        assert_eq!(
            decide(&api_error(Some(500)), 0, &config),
            RetryDecision::Terminal { notify: true }
        );
    }
}
