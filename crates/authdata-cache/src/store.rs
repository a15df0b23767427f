//! Process-wide cache of query results.
//!
//! The store maps string cache keys to snapshots of the last fetch
//! outcome and fans every mutation out to the key's subscribers
//! synchronously. It holds no fetch logic; revalidation and retry live
//! in [`binding`](crate::binding).
//!
//! Two states are deliberately distinct:
//!
//! - an *absent* entry: nothing is known about the key yet;
//! - an entry with `data == None`: the query settled with an explicit
//!   empty result (terminal error or a null payload).
//!
//! Subscriber callbacks run on the mutating thread. Notification copies
//! the callback list before invoking it, so a subscriber may safely
//! unsubscribe (drop its [`Subscription`]) mid-notification. A panicking
//! subscriber is a caller bug and is not guarded against.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

// =============================================================================
// Cache Entry
// =============================================================================

/// One cached query result.
///
/// `updated_at` only ever advances: entries are overwritten with a newer
/// timestamp or removed outright, never rewound.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The cached payload. `None` is the explicit-null result.
    pub data: Option<Arc<Value>>,

    /// When the entry was last written.
    pub updated_at: Instant,

    /// True while a revalidation for this key is outstanding and prior
    /// data exists. Reverts to false when the fetch settles.
    pub is_refetching: bool,
}

impl CacheEntry {
    /// Whether the entry is older than the given staleness window.
    ///
    /// The comparison is strict: an entry exactly `stale_time` old is
    /// still fresh.
    #[must_use]
    pub fn is_stale(&self, stale_time: Duration) -> bool {
        self.updated_at.elapsed() > stale_time
    }
}

// =============================================================================
// Cache Store
// =============================================================================

type SubscriberFn = Arc<dyn Fn(Option<CacheEntry>) + Send + Sync>;

#[derive(Default)]
struct StoreInner {
    entries: Mutex<HashMap<String, CacheEntry>>,
    subscribers: Mutex<HashMap<String, Vec<(u64, SubscriberFn)>>>,
    next_subscriber_id: AtomicU64,
}

/// Shared key-to-entry cache with synchronous change notification.
///
/// Cheap to clone; all clones observe the same state. Constructed once
/// per [`CacheContext`](crate::context::CacheContext) rather than as a
/// process global, so tests get isolated instances.
#[derive(Clone, Default)]
pub struct CacheStore {
    inner: Arc<StoreInner>,
}

/// Counts reported by [`CacheStore::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached entries.
    pub entries: usize,
    /// Number of live subscriptions across all keys.
    pub subscribers: usize,
}

impl CacheStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the entry for `key`, without side effects.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.inner
            .entries
            .lock()
            .expect("cache store lock poisoned")
            .get(key)
            .cloned()
    }

    /// Writes `data` for `key`, stamping it with the current time and
    /// clearing the refetching flag, then notifies subscribers.
    pub fn set(&self, key: &str, data: Option<Arc<Value>>) {
        let entry = CacheEntry {
            data,
            updated_at: Instant::now(),
            is_refetching: false,
        };
        self.inner
            .entries
            .lock()
            .expect("cache store lock poisoned")
            .insert(key.to_string(), entry.clone());
        tracing::trace!(key, "cache entry updated");
        self.notify(key, Some(entry));
    }

    /// Flips only the refetching flag and notifies subscribers.
    ///
    /// A no-op on absent keys: the flag marks revalidation of existing
    /// data, and there is nothing to mark before the first write.
    pub fn set_refetching(&self, key: &str, refetching: bool) {
        let entry = {
            let mut entries = self
                .inner
                .entries
                .lock()
                .expect("cache store lock poisoned");
            match entries.get_mut(key) {
                Some(entry) => {
                    entry.is_refetching = refetching;
                    entry.clone()
                }
                None => return,
            }
        };
        self.notify(key, Some(entry));
    }

    /// Removes the entry for `key` and notifies subscribers with the
    /// absent state.
    ///
    /// Idempotent: clearing an already-absent key still notifies.
    pub fn clear(&self, key: &str) {
        let removed = self
            .inner
            .entries
            .lock()
            .expect("cache store lock poisoned")
            .remove(key);
        if removed.is_some() {
            tracing::debug!(key, "cache entry cleared");
        }
        self.notify(key, None);
    }

    /// Removes every entry, notifying each key's subscribers.
    ///
    /// Used on process-wide sign-out, where all per-user data becomes
    /// invalid at once.
    pub fn clear_all(&self) {
        let keys: Vec<String> = {
            let mut entries = self
                .inner
                .entries
                .lock()
                .expect("cache store lock poisoned");
            entries.drain().map(|(key, _)| key).collect()
        };
        tracing::debug!(entries = keys.len(), "cache cleared");
        for key in keys {
            self.notify(&key, None);
        }
    }

    /// Registers `callback` for every mutation of `key`.
    ///
    /// The callback receives a snapshot of the new entry, or `None` when
    /// the entry was cleared. Multiple subscribers per key are supported.
    /// Dropping the returned [`Subscription`] unsubscribes.
    pub fn subscribe<F>(&self, key: &str, callback: F) -> Subscription
    where
        F: Fn(Option<CacheEntry>) + Send + Sync + 'static,
    {
        let id = self.inner.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .lock()
            .expect("cache store lock poisoned")
            .entry(key.to_string())
            .or_default()
            .push((id, Arc::new(callback)));

        Subscription {
            store: Arc::downgrade(&self.inner),
            key: key.to_string(),
            id,
        }
    }

    /// Returns entry and subscription counts.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let entries = self
            .inner
            .entries
            .lock()
            .expect("cache store lock poisoned")
            .len();
        let subscribers = self
            .inner
            .subscribers
            .lock()
            .expect("cache store lock poisoned")
            .values()
            .map(Vec::len)
            .sum();
        CacheStats {
            entries,
            subscribers,
        }
    }

    /// Returns the number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .entries
            .lock()
            .expect("cache store lock poisoned")
            .len()
    }

    /// Returns `true` if no entries are cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Copy-on-notify: the callback list is snapshotted under the lock and
    // invoked outside it, so callbacks may subscribe or unsubscribe freely.
    fn notify(&self, key: &str, entry: Option<CacheEntry>) {
        let callbacks: Vec<SubscriberFn> = {
            let subscribers = self
                .inner
                .subscribers
                .lock()
                .expect("cache store lock poisoned");
            match subscribers.get(key) {
                Some(list) => list.iter().map(|(_, cb)| cb.clone()).collect(),
                None => return,
            }
        };
        for callback in callbacks {
            callback(entry.clone());
        }
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// Handle for one registered subscriber. Unsubscribes on drop.
pub struct Subscription {
    store: Weak<StoreInner>,
    key: String,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(inner) = self.store.upgrade() else {
            return;
        };
        let mut subscribers = inner.subscribers.lock().expect("cache store lock poisoned");
        if let Some(list) = subscribers.get_mut(&self.key) {
            list.retain(|(id, _)| *id != self.id);
            if list.is_empty() {
                subscribers.remove(&self.key);
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
