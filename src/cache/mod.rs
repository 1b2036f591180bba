//! Cache backends.
//!
//! The evaluator only needs `get(key) -> value-or-absent`. Two backends
//! implement [`CacheStore`]:
//!
//! - [`cluster::RedisStore`]: the distributed cluster, built from a
//!   [`ClusterDescriptor`](crate::discovery::ClusterDescriptor) returned by
//!   discovery.
//!
//! - [`MemoryStore`]: in-process moka cache with the same TTL semantics as
//!   the cluster. Used for tests and single-node deployments.

pub mod cluster;

pub use cluster::RedisStore;

use std::time::Duration;

use async_trait::async_trait;

use crate::Result;

/// Default expiry for in-memory entries, matching the cluster's native TTL.
pub const DEFAULT_ENTRY_TTL: Duration = Duration::from_secs(5 * 60);

/// Default maximum number of entries in a [`MemoryStore`].
const DEFAULT_MEMORY_MAX: u64 = 10_000;

/// Minimal key-value read access to a cache.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    /// Fetch the raw value at `key`. `Ok(None)` when the key does not exist.
    ///
    /// Transport failures are reported as
    /// [`FreshnessError::CacheUnavailable`](crate::FreshnessError::CacheUnavailable).
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

/// Thread-safe in-memory cache store.
///
/// Bounded (moka LRU) and time-boxed: entries expire `ttl` after insertion,
/// or never when built with [`MemoryStore::unbounded_ttl()`].
pub struct MemoryStore {
    entries: moka::sync::Cache<String, Vec<u8>>,
}

impl MemoryStore {
    /// Create an empty store with the default five-minute TTL.
    pub fn new() -> Self {
        Self::with_ttl(Some(DEFAULT_ENTRY_TTL))
    }

    /// Create an empty store whose entries never expire.
    pub fn unbounded_ttl() -> Self {
        Self::with_ttl(None)
    }

    /// Create an empty store with a custom TTL (`None` = no expiry).
    pub fn with_ttl(ttl: Option<Duration>) -> Self {
        let builder = moka::sync::Cache::builder().max_capacity(DEFAULT_MEMORY_MAX);
        let entries = match ttl {
            Some(ttl) => builder.time_to_live(ttl).build(),
            None => builder.build(),
        };
        Self { entries }
    }

    /// Insert (or overwrite) the raw value at `key`.
    pub fn insert(&self, key: impl Into<String>, value: Vec<u8>) {
        self.entries.insert(key.into(), value);
    }

    /// Remove the value at `key`, if any.
    pub fn remove(&self, key: &str) {
        self.entries.invalidate(key);
    }

    /// Number of entries currently held.
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key))
    }
}
