//! Consumer binding: ties a query source to a cache key.
//!
//! A [`QueryBinding`] drives the revalidation state machine for one key:
//! it fetches when the entry is absent or stale, joins an already
//! in-flight fetch instead of duplicating it, applies the retry policy
//! to failures, and invalidates the entry when the authenticated
//! identity changes. Consumers read the current state via
//! [`QueryBinding::snapshot`] and react to changes via
//! [`QueryBinding::subscribe`].
//!
//! The binding is a cheap handle; clones share state. Dropping the last
//! handle aborts any scheduled retry timer (an in-flight network call is
//! left to settle naturally - only the interest in its result ends).

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::FutureExt;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::config::QueryConfig;
use crate::context::CacheContext;
use crate::error::FetchError;
use crate::identity::IdentitySignal;
use crate::inflight::{Claim, FetchOutcome};
use crate::retry::{self, RetryDecision};
use crate::source::QuerySource;
use crate::store::{CacheEntry, Subscription};

// =============================================================================
// Query Snapshot
// =============================================================================

/// The binding's current state, as exposed to the view layer.
#[derive(Debug, Clone)]
pub struct QuerySnapshot {
    /// The cached payload, if any. `None` covers both "not fetched yet"
    /// and the explicit-null result; `is_pending` and `error`
    /// disambiguate.
    pub data: Option<Arc<Value>>,

    /// The most recent fetch error, cleared on success.
    pub error: Option<FetchError>,

    /// True while the identity is still resolving, or while neither data
    /// nor an error has been recorded yet.
    pub is_pending: bool,

    /// True while a revalidation of existing data is outstanding.
    pub is_refetching: bool,
}

// =============================================================================
// Binding State
// =============================================================================

struct BindingState {
    identity_resolving: bool,
    previous_user: Option<String>,
    retry_count: u32,
    error: Option<FetchError>,
    retry_timer: Option<JoinHandle<()>>,
}

impl Default for BindingState {
    fn default() -> Self {
        Self {
            // Pending until the first identity signal arrives.
            identity_resolving: true,
            previous_user: None,
            retry_count: 0,
            error: None,
            retry_timer: None,
        }
    }
}

struct BindingInner {
    ctx: Arc<CacheContext>,
    key: String,
    source: Arc<dyn QuerySource>,
    config: QueryConfig,
    state: Mutex<BindingState>,
}

impl Drop for BindingInner {
    fn drop(&mut self) {
        if let Ok(state) = self.state.get_mut()
            && let Some(timer) = state.retry_timer.take()
        {
            timer.abort();
        }
    }
}

// =============================================================================
// Query Binding
// =============================================================================

/// Binds a [`QuerySource`] to a cache key within a [`CacheContext`].
#[derive(Clone)]
pub struct QueryBinding {
    inner: Arc<BindingInner>,
}

impl QueryBinding {
    /// Creates a binding for `key` backed by `source`.
    ///
    /// The key must uniquely identify the logical query within the
    /// context; two bindings sharing a key share cached data and
    /// coalesce their fetches.
    pub fn new(
        ctx: Arc<CacheContext>,
        key: impl Into<String>,
        source: Arc<dyn QuerySource>,
        config: QueryConfig,
    ) -> Self {
        Self {
            inner: Arc::new(BindingInner {
                ctx,
                key: key.into(),
                source,
                config,
                state: Mutex::new(BindingState::default()),
            }),
        }
    }

    /// The cache key this binding reads and writes.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// The binding's configuration.
    #[must_use]
    pub fn config(&self) -> &QueryConfig {
        &self.inner.config
    }

    /// Returns the current data, error and pending state.
    #[must_use]
    pub fn snapshot(&self) -> QuerySnapshot {
        let entry = self.inner.ctx.store().get(&self.inner.key);
        let is_refetching = entry.as_ref().is_some_and(|e| e.is_refetching);
        let data = entry.and_then(|e| e.data);

        let state = self.lock_state();
        let is_pending = state.identity_resolving || (data.is_none() && state.error.is_none());
        QuerySnapshot {
            data,
            error: state.error.clone(),
            is_pending,
            is_refetching,
        }
    }

    /// Registers `callback` for every mutation of this binding's entry.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<CacheEntry>) + Send + Sync + 'static,
    {
        self.inner.ctx.store().subscribe(&self.inner.key, callback)
    }

    /// Feeds the current identity signal into the binding.
    ///
    /// Drives the invalidation rules:
    ///
    /// - `Resolving`: stay pending, fetch nothing;
    /// - `SignedOut`: clear the entry and reset all fetch state;
    /// - `User(id)`: clear the entry if the user changed from a
    ///   previously known one, then fetch iff no entry exists or the
    ///   entry is stale.
    pub async fn observe(&self, signal: IdentitySignal) {
        match signal {
            IdentitySignal::Resolving => {
                self.lock_state().identity_resolving = true;
            }
            IdentitySignal::SignedOut => {
                let timer = {
                    let mut state = self.lock_state();
                    state.identity_resolving = false;
                    state.previous_user = None;
                    state.retry_count = 0;
                    state.error = None;
                    state.retry_timer.take()
                };
                if let Some(timer) = timer {
                    timer.abort();
                }
                tracing::debug!(key = %self.inner.key, "session lost, clearing cache entry");
                self.inner.ctx.store().set_refetching(&self.inner.key, false);
                self.inner.ctx.store().clear(&self.inner.key);
            }
            IdentitySignal::User(id) => {
                let changed = {
                    let mut state = self.lock_state();
                    state.identity_resolving = false;
                    let changed = state.previous_user.as_ref().is_some_and(|prev| *prev != id);
                    state.previous_user = Some(id);
                    changed
                };

                if changed {
                    tracing::debug!(key = %self.inner.key, "identity changed, clearing cache entry");
                    self.inner.ctx.store().clear(&self.inner.key);
                }

                let stale = self
                    .inner
                    .ctx
                    .store()
                    .get(&self.inner.key)
                    .is_none_or(|e| e.is_stale(self.inner.config.stale_time));

                if stale {
                    self.refetch().await;
                }
            }
        }
    }

    /// Fetches the query, joining an already in-flight fetch for the
    /// same key instead of issuing a duplicate.
    ///
    /// On success the cache is updated and the retry counter resets. A
    /// retryable failure schedules a timer that re-enters this method
    /// after the linear-backoff delay, leaving any stale data visible in
    /// the meantime. A terminal failure writes the explicit-null result
    /// and surfaces the error through the context's sink unless the
    /// status is suppressed.
    pub async fn refetch(&self) {
        let claim = self.inner.ctx.inflight().claim(&self.inner.key, || {
            let source = self.inner.source.clone();
            async move { source.fetch().await.map(|data| data.map(Arc::new)) }.boxed()
        });

        match claim {
            Claim::Joined(shared) => {
                tracing::trace!(key = %self.inner.key, "joining in-flight fetch");
                let outcome = shared.await;
                self.lock_state().error = outcome.err();
            }
            Claim::Owner(shared) => {
                if self.inner.ctx.store().get(&self.inner.key).is_some() {
                    self.inner.ctx.store().set_refetching(&self.inner.key, true);
                }

                // The guard clears the refetching flag and the registry
                // entry even if this future is dropped mid-await.
                let guard = SettleGuard {
                    ctx: &self.inner.ctx,
                    key: &self.inner.key,
                };
                let outcome = shared.await;
                drop(guard);

                self.settle(outcome);
            }
        }
    }

    fn settle(&self, outcome: FetchOutcome) {
        match outcome {
            Ok(data) => {
                {
                    let mut state = self.lock_state();
                    state.error = None;
                    state.retry_count = 0;
                }
                self.inner.ctx.store().set(&self.inner.key, data);
            }
            Err(error) => {
                let retries_so_far = self.lock_state().retry_count;
                match retry::decide(&error, retries_so_far, &self.inner.config) {
                    RetryDecision::Retry { attempt, delay } => {
                        tracing::debug!(
                            key = %self.inner.key,
                            attempt,
                            ?delay,
                            %error,
                            "fetch failed, scheduling retry"
                        );
                        let timer = self.schedule_retry(delay);
                        let mut state = self.lock_state();
                        state.retry_count = attempt;
                        state.error = Some(error);
                        if let Some(previous) = state.retry_timer.replace(timer) {
                            previous.abort();
                        }
                    }
                    RetryDecision::Terminal { notify } => {
                        {
                            let mut state = self.lock_state();
                            if error.is_client_error() {
                                state.retry_count = 0;
                            }
                            state.error = Some(error.clone());
                        }
                        self.inner.ctx.store().set(&self.inner.key, None);
                        if notify {
                            self.inner.ctx.notify(&self.inner.key, &error);
                        } else {
                            tracing::debug!(
                                key = %self.inner.key,
                                %error,
                                "terminal error suppressed"
                            );
                        }
                    }
                }
            }
        }
    }

    fn schedule_retry(&self, delay: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                QueryBinding { inner }.refetch().await;
            }
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, BindingState> {
        self.inner.state.lock().expect("binding state lock poisoned")
    }
}

// =============================================================================
// Settle Guard
// =============================================================================

struct SettleGuard<'a> {
    ctx: &'a CacheContext,
    key: &'a str,
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        self.ctx.store().set_refetching(self.key, false);
        self.ctx.inflight().remove(self.key);
    }
}

// =============================================================================
// Tests
// =============================================================================
