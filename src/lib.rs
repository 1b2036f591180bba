//! Freshcache - cache-backed workspace freshness checks
//!
//! Tells a client session whether a project's collaborative workspace has
//! changed since that session last checked. Each project's state lives in a
//! shared cache as a [`NotificationRecord`]: a rolling log of who changed
//! what and when, plus the instant each session last checked in.
//!
//! The [`FreshnessEvaluator`] reads that record through a
//! [`ConnectionManager`], which locates the cache cluster via a discovery
//! endpoint and transparently reconnects after outages (bounded per call).
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use freshcache::{Freshcache, MemoryStore, NotificationRecord, Timestamp, UpdateEvent};
//! use freshcache::freshness::notification_key;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> freshcache::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! let record = NotificationRecord::new()
//!     .with_update(UpdateEvent::new(Timestamp::from_unix_secs(100).unwrap(), "alice"))
//!     .with_last_check("bob", Timestamp::from_unix_secs(50).unwrap());
//! store.insert(notification_key("42"), record.to_vec()?);
//!
//! let evaluator = Freshcache::builder().store(store).build()?;
//! evaluator.connections().initialize().await?;
//!
//! assert!(evaluator.refresh_my_view("42", "bob").await?);
//! # Ok(())
//! # }
//! ```

mod builder;
pub mod cache;
pub mod connection;
pub mod discovery;
pub mod error;
pub mod freshness;
pub mod retry;
#[cfg(feature = "server")]
pub mod server;
pub mod telemetry;
pub mod types;
mod version;

// Re-export main types at crate root
pub use builder::{Freshcache, FreshcacheBuilder};
pub use cache::{CacheStore, MemoryStore, RedisStore};
pub use connection::{ConnectionManager, Connector, DiscoveryConnector, StaticConnector};
pub use discovery::{
    AesDecoder, Base64Decoder, ClusterDescriptor, DecoderKind, DescriptorDecoder, DiscoveryConfig,
    PlainDecoder,
};
pub use error::{FreshnessError, Result};
pub use freshness::FreshnessEvaluator;
pub use retry::RetryConfig;
pub use types::{EventOrigin, NotificationRecord, Timestamp, UpdateEvent, UserId};
pub use version::{GIT_BRANCH, GIT_SHA, PKG_VERSION, git_dirty, version_string};
