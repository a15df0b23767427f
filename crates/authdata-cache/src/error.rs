//! Error taxonomy for query sources.
//!
//! Failures fall into three classes with different retry semantics:
//!
//! - [`FetchError::Api`] - a structured error reported by the auth API,
//!   carrying the HTTP status when the API provided one. Client errors
//!   (4xx) are terminal; everything else is retryable.
//! - [`FetchError::Network`] - the request never produced a structured
//!   response (connection refused, timeout). Retryable.
//! - [`FetchError::Unclassified`] - an unexpected failure with no
//!   structure to classify (the promise-rejection analog). Always
//!   terminal and always surfaced.

/// An error produced by a [`QuerySource`](crate::source::QuerySource) fetch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Structured error reported by the auth API.
    #[error("api error (status {status:?}): {message}")]
    Api {
        /// HTTP status code, when the API reported one.
        status: Option<u16>,
        /// Human-readable error description.
        message: String,
    },

    /// Transport-level failure; no structured response was received.
    #[error("network error: {0}")]
    Network(String),

    /// Failure that carries no structure to classify.
    #[error("unexpected error: {0}")]
    Unclassified(String),
}

impl FetchError {
    /// The HTTP status code associated with this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => *status,
            Self::Network(_) | Self::Unclassified(_) => None,
        }
    }

    /// Whether this is a client error (status in `[400, 500)`).
    ///
    /// Client errors are never retried: the request itself is at fault
    /// and repeating it cannot succeed.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self.status(), Some(s) if (400..500).contains(&s))
    }

    /// Whether this error class tolerates a retry.
    ///
    /// Server errors, statusless API errors and network failures are
    /// transient by assumption. Unclassified errors are not, to avoid
    /// retry loops on bugs.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api { .. } => !self.is_client_error(),
            Self::Network(_) => true,
            Self::Unclassified(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_error_range() {
        let err = |status| FetchError::Api {
            status,
            message: "boom".to_string(),
        };

        assert!(err(Some(400)).is_client_error());
        assert!(err(Some(404)).is_client_error());
        assert!(err(Some(499)).is_client_error());
        assert!(!err(Some(500)).is_client_error());
        assert!(!err(Some(399)).is_client_error());
        assert!(!err(None).is_client_error());
    }

    #[test]
    fn retryable_classes() {
        let api = |status| FetchError::Api {
            status,
            message: "boom".to_string(),
        };

        assert!(api(Some(500)).is_retryable());
        assert!(api(Some(503)).is_retryable());
        assert!(api(None).is_retryable());
        assert!(!api(Some(401)).is_retryable());
        assert!(FetchError::Network("refused".to_string()).is_retryable());
        assert!(!FetchError::Unclassified("bug".to_string()).is_retryable());
    }

    #[test]
    fn display_includes_message() {
        let err = FetchError::Api {
            status: Some(401),
            message: "unauthorized".to_string(),
        };
        assert!(err.to_string().contains("unauthorized"));

        let err = FetchError::Network("connection refused".to_string());
        assert_eq!(err.to_string(), "network error: connection refused");
    }
}
