//! The query source seam.
//!
//! A [`QuerySource`] produces one logical query result: `Ok(Some(value))`
//! on success, `Ok(None)` for an explicit null payload, `Err` for a
//! classified or unclassified failure. Implementations capture their own
//! parameters (URL, auth client handle, request body); the cache core
//! never sees them.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FetchError;

/// An asynchronous query against the auth backend.
#[async_trait]
pub trait QuerySource: Send + Sync {
    /// Executes the query once.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] classifying the failure; the retry policy
    /// decides what happens next.
    async fn fetch(&self) -> Result<Option<Value>, FetchError>;
}

/// Adapts an async closure into a [`QuerySource`].
///
/// The closure analog of the original query-function contract. Unlike a
/// bare closure it pairs naturally with an explicit cache key chosen by
/// the caller.
///
/// # Example
///
/// ```ignore
/// let source = FnSource::new(|| async {
///     Ok(Some(serde_json::json!({"id": "user-1"})))
/// });
/// ```
pub struct FnSource<F> {
    f: F,
}

impl<F> FnSource<F> {
    /// Wraps `f` as a query source.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> QuerySource for FnSource<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<Value>, FetchError>> + Send,
{
    async fn fetch(&self) -> Result<Option<Value>, FetchError> {
        (self.f)().await
    }
}
