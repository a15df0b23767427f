//! # authdata-cache
//!
//! Client-side cache for authenticated per-user data with coalesced
//! revalidation and bounded retry.
//!
//! This crate provides:
//! - A keyed cache store with explicit-null entries and change
//!   subscriptions
//! - An in-flight registry that coalesces concurrent fetches for the
//!   same key into one shared request
//! - A linear-backoff retry policy that distinguishes client errors,
//!   retryable failures and unclassified bugs
//! - A consumer binding that ties a query source to a cache key and
//!   reacts to identity changes
//!
//! ## Overview
//!
//! Auth-backed data (profiles, permissions, org membership) is expensive
//! to fetch and consulted from many places at once. The cache answers
//! reads instantly from the last known value, revalidates stale entries
//! in the background, and guarantees that no matter how many consumers
//! ask for the same key concurrently, at most one request is on the
//! wire.
//!
//! ## Modules
//!
//! - [`store`] - Keyed cache entries with timestamps and subscriptions
//! - [`inflight`] - Shared-future registry for request coalescing
//! - [`retry`] - Pure retry/terminal decision policy
//! - [`binding`] - The per-consumer revalidation state machine
//! - [`context`] - Store + registry + error sink with explicit lifetime
//! - [`source`] - The async query seam implementations plug into
//! - [`identity`] - The identity signal that drives invalidation
//! - [`config`] - Per-binding tuning knobs
//! - [`error`] - Fetch error classification

pub mod binding;
pub mod config;
pub mod context;
pub mod error;
pub mod identity;
pub mod inflight;
pub mod retry;
pub mod source;
pub mod store;

pub use binding::{QueryBinding, QuerySnapshot};
pub use config::QueryConfig;
pub use context::{CacheContext, ErrorSink, TracingSink};
pub use error::FetchError;
pub use identity::IdentitySignal;
pub use retry::RetryDecision;
pub use source::{FnSource, QuerySource};
pub use store::{CacheEntry, CacheStats, CacheStore, Subscription};
