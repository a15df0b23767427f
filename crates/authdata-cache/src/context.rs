//! Explicit cache context.
//!
//! The store, the in-flight registry and the notification sink travel
//! together as one context object with a controlled lifetime: one per
//! process in an application, one per test in the test suite. Nothing in
//! this crate is a global singleton.

use std::sync::Arc;

use crate::error::FetchError;
use crate::inflight::InFlightRegistry;
use crate::store::CacheStore;

/// Receives terminal query failures for user-visible surfacing.
///
/// The rendering layer (toasts, banners, logs) implements this; the core
/// only decides *whether* to call it - every terminal error reaches the
/// sink except statuses the binding's configuration suppresses.
pub trait ErrorSink: Send + Sync {
    /// Surfaces a terminal error for `key`.
    fn notify(&self, key: &str, error: &FetchError);
}

/// Default sink that logs a structured warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn notify(&self, key: &str, error: &FetchError) {
        tracing::warn!(key, %error, "query failed");
    }
}

/// Shared state for a family of query bindings.
pub struct CacheContext {
    store: CacheStore,
    inflight: InFlightRegistry,
    sink: Arc<dyn ErrorSink>,
}

impl CacheContext {
    /// Creates a context whose terminal errors are logged via `tracing`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_sink(Arc::new(TracingSink))
    }

    /// Creates a context with a custom notification sink.
    #[must_use]
    pub fn with_sink(sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            store: CacheStore::new(),
            inflight: InFlightRegistry::new(),
            sink,
        }
    }

    /// The cache store backing this context.
    #[must_use]
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub(crate) fn inflight(&self) -> &InFlightRegistry {
        &self.inflight
    }

    pub(crate) fn notify(&self, key: &str, error: &FetchError) {
        self.sink.notify(key, error);
    }
}

impl Default for CacheContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingSink {
        events: Mutex<Vec<(String, Option<u16>)>>,
    }

    impl ErrorSink for RecordingSink {
        fn notify(&self, key: &str, error: &FetchError) {
            self.events
                .lock()
                .unwrap()
                .push((key.to_string(), error.status()));
        }
    }

    #[test]
    fn contexts_are_isolated() {
        let a = CacheContext::new();
        let b = CacheContext::new();

        a.store().set("k", Some(Arc::new(serde_json::json!(1))));
        assert!(a.store().get("k").is_some());
        assert!(b.store().get("k").is_none());
    }

    #[test]
    fn notify_reaches_the_sink() {
        let sink = Arc::new(RecordingSink {
            events: Mutex::new(Vec::new()),
        });
        let ctx = CacheContext::with_sink(sink.clone());

        ctx.notify(
            "k",
            &FetchError::Api {
                status: Some(500),
                message: "boom".to_string(),
            },
        );

        let events = sink.events.lock().unwrap();
        assert_eq!(events.as_slice(), [("k".to_string(), Some(500))]);
    }
}
