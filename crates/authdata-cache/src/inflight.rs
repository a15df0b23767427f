//! In-flight request registry.
//!
//! Prevents duplicate concurrent fetches for the same cache key: the
//! first caller registers its fetch future, every concurrent caller for
//! the same key awaits a clone of the same [`Shared`] future and settles
//! with the same outcome (including failure).
//!
//! Registration and the existence check happen atomically under one lock
//! ([`InFlightRegistry::claim`]); a check-then-register protocol split
//! across two calls would race between tasks. The owner of a claim must
//! remove the registration on a guaranteed path once the future settles,
//! success or failure, so that no key is left permanently "in flight".

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use serde_json::Value;

use crate::error::FetchError;

/// The settled result of one fetch attempt.
pub type FetchOutcome = Result<Option<Arc<Value>>, FetchError>;

/// A coalesced fetch future; cloning yields another handle to the same
/// underlying attempt.
pub type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

/// Result of [`InFlightRegistry::claim`].
pub enum Claim {
    /// This caller registered the fetch and is responsible for removing
    /// it when it settles.
    Owner(SharedFetch),
    /// Another fetch was already in flight; await it instead.
    Joined(SharedFetch),
}

/// Per-key registry of outstanding fetches.
///
/// Cheap to clone; all clones observe the same state.
#[derive(Clone, Default)]
pub struct InFlightRegistry {
    inner: Arc<Mutex<HashMap<String, SharedFetch>>>,
}

impl InFlightRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the in-flight fetch for `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<SharedFetch> {
        self.inner
            .lock()
            .expect("in-flight registry lock poisoned")
            .get(key)
            .cloned()
    }

    /// Atomically joins the existing fetch for `key` or registers the
    /// future produced by `make` as the authoritative one.
    ///
    /// `make` is only invoked when no fetch is currently registered.
    pub fn claim<F>(&self, key: &str, make: F) -> Claim
    where
        F: FnOnce() -> BoxFuture<'static, FetchOutcome>,
    {
        let mut map = self.inner.lock().expect("in-flight registry lock poisoned");
        if let Some(existing) = map.get(key) {
            return Claim::Joined(existing.clone());
        }
        let shared = make().shared();
        map.insert(key.to_string(), shared.clone());
        Claim::Owner(shared)
    }

    /// Removes the registration for `key`.
    ///
    /// Called exactly once per owned claim after the fetch settles.
    pub fn remove(&self, key: &str) {
        self.inner
            .lock()
            .expect("in-flight registry lock poisoned")
            .remove(key);
    }

    /// Returns the number of outstanding fetches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("in-flight registry lock poisoned")
            .len()
    }

    /// Returns `true` if nothing is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
