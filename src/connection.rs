//! Cache connection lifecycle.
//!
//! [`ConnectionManager`] owns the process-wide handle to the cache and hides
//! how it is obtained. A [`Connector`] builds new handles: in production the
//! [`DiscoveryConnector`] asks the discovery endpoint for the cluster layout
//! and connects to it; tests and single-process setups use a
//! [`StaticConnector`] around an in-memory store.
//!
//! # Concurrency
//!
//! Concurrent failures may rebuild the handle concurrently. That is
//! tolerated: each rebuild produces an equivalent handle and the last write
//! wins. Readers clone the current `Arc` and release the lock before any I/O.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, RedisStore};
use crate::discovery::{self, DescriptorDecoder, DiscoveryConfig};
use crate::{FreshnessError, Result};

/// Default bound on a single cache operation.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(3);

/// Builds a fresh, usable cache handle.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connector name, for logs.
    fn name(&self) -> &str;

    /// Establish a new handle. Failures are
    /// [`FreshnessError::ConnectionSetup`].
    async fn connect(&self) -> Result<Arc<dyn CacheStore>>;
}

/// Connects to the cluster described by the discovery endpoint.
pub struct DiscoveryConnector {
    config: DiscoveryConfig,
    decoder: Arc<dyn DescriptorDecoder>,
    op_timeout: Duration,
}

impl DiscoveryConnector {
    /// Create a connector for `config`, decoding payloads with `decoder`.
    pub fn new(config: DiscoveryConfig, decoder: Arc<dyn DescriptorDecoder>) -> Self {
        Self {
            config,
            decoder,
            op_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Bound for connecting to and reading from cluster nodes.
    pub fn op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }
}

#[async_trait]
impl Connector for DiscoveryConnector {
    fn name(&self) -> &str {
        "discovery"
    }

    async fn connect(&self) -> Result<Arc<dyn CacheStore>> {
        let descriptor = discovery::fetch_descriptor(&self.config, self.decoder.as_ref()).await?;
        let store = RedisStore::connect(&descriptor, self.op_timeout).await?;
        Ok(Arc::new(store))
    }
}

/// Always hands out the same store.
pub struct StaticConnector {
    store: Arc<dyn CacheStore>,
}

impl StaticConnector {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Connector for StaticConnector {
    fn name(&self) -> &str {
        "static"
    }

    async fn connect(&self) -> Result<Arc<dyn CacheStore>> {
        Ok(Arc::clone(&self.store))
    }
}

/// Owner of the shared cache handle.
///
/// The handle is absent until the first successful [`initialize()`](Self::initialize)
/// and may be discarded and rebuilt any number of times.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    handle: RwLock<Option<Arc<dyn CacheStore>>>,
    fetch_timeout: Duration,
}

impl ConnectionManager {
    /// Create a manager with no handle yet.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            handle: RwLock::new(None),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Bound for a single [`fetch()`](Self::fetch).
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Build a new handle and replace the current one.
    ///
    /// On failure the previous handle (if any) is left in place and
    /// [`FreshnessError::ConnectionSetup`] is returned.
    pub async fn initialize(&self) -> Result<()> {
        info!(connector = self.connector.name(), "initializing cache connection");
        let store = self.connector.connect().await.map_err(|e| match e {
            FreshnessError::ConnectionSetup(_) => e,
            other => FreshnessError::ConnectionSetup(other.to_string()),
        })?;
        debug!(store = store.name(), "cache connection ready");
        *self.handle.write().await = Some(store);
        Ok(())
    }

    /// Discard the current handle. The next fetch fails until re-initialized.
    pub async fn reset(&self) {
        *self.handle.write().await = None;
    }

    /// Whether a handle is currently held.
    pub async fn is_connected(&self) -> bool {
        self.handle.read().await.is_some()
    }

    /// Fetch the raw value at `key`, `Ok(None)` when absent.
    ///
    /// Fails with [`FreshnessError::CacheUnavailable`] when no handle is held,
    /// the backend errors, or the operation exceeds the fetch timeout.
    pub async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let store = self.handle.read().await.clone().ok_or_else(|| {
            FreshnessError::CacheUnavailable("no cache connection established".to_string())
        })?;

        match tokio::time::timeout(self.fetch_timeout, store.get(key)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(FreshnessError::CacheUnavailable(msg))) => {
                Err(FreshnessError::CacheUnavailable(msg))
            }
            Ok(Err(other)) => Err(FreshnessError::CacheUnavailable(other.to_string())),
            Err(_) => {
                warn!(key, store = store.name(), "cache fetch timed out");
                Err(FreshnessError::CacheUnavailable(format!(
                    "fetch of '{key}' timed out after {}ms",
                    self.fetch_timeout.as_millis()
                )))
            }
        }
    }
}
