//! Builder for wiring an evaluator to its cache

use std::sync::Arc;
use std::time::Duration;

use crate::cache::CacheStore;
use crate::connection::{
    ConnectionManager, Connector, DEFAULT_FETCH_TIMEOUT, DiscoveryConnector, StaticConnector,
};
use crate::discovery::{DescriptorDecoder, DiscoveryConfig, PlainDecoder};
use crate::freshness::FreshnessEvaluator;
use crate::retry::RetryConfig;
use crate::{FreshnessError, Result};

/// Main entry point for creating evaluators.
pub struct Freshcache;

impl Freshcache {
    /// Create a new builder for configuring an evaluator.
    pub fn builder() -> FreshcacheBuilder {
        FreshcacheBuilder::new()
    }
}

enum Backend {
    Discovery(DiscoveryConfig),
    Store(Arc<dyn CacheStore>),
    Custom(Arc<dyn Connector>),
}

/// Builder for configuring evaluators.
///
/// Exactly one backend must be chosen: [`discovery()`](Self::discovery),
/// [`store()`](Self::store), or [`connector()`](Self::connector).
pub struct FreshcacheBuilder {
    backend: Option<Backend>,
    decoder: Arc<dyn DescriptorDecoder>,
    retry: RetryConfig,
    fetch_timeout: Duration,
}

impl FreshcacheBuilder {
    pub fn new() -> Self {
        Self {
            backend: None,
            decoder: Arc::new(PlainDecoder),
            retry: RetryConfig::default(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Read from the cluster advertised by a discovery endpoint.
    pub fn discovery(mut self, config: DiscoveryConfig) -> Self {
        self.backend = Some(Backend::Discovery(config));
        self
    }

    /// Decoder for discovery payloads (default: plain text).
    pub fn decoder(mut self, decoder: Arc<dyn DescriptorDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Read from a fixed store, e.g. a [`MemoryStore`](crate::MemoryStore).
    pub fn store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.backend = Some(Backend::Store(store));
        self
    }

    /// Build handles with a custom connector.
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.backend = Some(Backend::Custom(connector));
        self
    }

    /// Reconnect ceiling and backoff.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Bound on each cache operation (default: 3s).
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Build the evaluator. No connection is made yet; call
    /// [`ConnectionManager::initialize()`] to connect eagerly, otherwise the
    /// first evaluation connects.
    pub fn build(self) -> Result<FreshnessEvaluator> {
        let connector: Arc<dyn Connector> = match self.backend {
            Some(Backend::Discovery(config)) => Arc::new(
                DiscoveryConnector::new(config, self.decoder).op_timeout(self.fetch_timeout),
            ),
            Some(Backend::Store(store)) => Arc::new(StaticConnector::new(store)),
            Some(Backend::Custom(connector)) => connector,
            None => {
                return Err(FreshnessError::Configuration(
                    "no cache backend configured".to_string(),
                ));
            }
        };
        let connections =
            ConnectionManager::new(connector).fetch_timeout(self.fetch_timeout);
        Ok(FreshnessEvaluator::new(Arc::new(connections), self.retry))
    }
}

impl Default for FreshcacheBuilder {
    fn default() -> Self {
        Self::new()
    }
}
