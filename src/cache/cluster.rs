//! Redis-backed distributed cache store.
//!
//! One server address yields a single-node [`ConnectionManager`] (which
//! reconnects on its own); several yield a cluster connection. Credentials
//! from the descriptor are applied to every node.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use redis::cluster::ClusterClient;
use redis::cluster_async::ClusterConnection;
use reqwest::Url;
use tracing::info;

use super::CacheStore;
use crate::discovery::ClusterDescriptor;
use crate::{FreshnessError, Result};

#[derive(Clone)]
enum Handle {
    Single(ConnectionManager),
    Cluster(ClusterConnection),
}

/// Live handle to the cache cluster.
///
/// Cheap to clone per operation; every `get` is bounded by `op_timeout`.
pub struct RedisStore {
    handle: Handle,
    op_timeout: Duration,
    nodes: usize,
}

impl RedisStore {
    /// Connect to the nodes listed in `descriptor`.
    ///
    /// Fails with [`FreshnessError::ConnectionSetup`] if the addresses are
    /// invalid or no connection can be made within `op_timeout`.
    pub async fn connect(descriptor: &ClusterDescriptor, op_timeout: Duration) -> Result<Self> {
        let urls = descriptor
            .servers
            .iter()
            .map(|server| {
                node_url(
                    server,
                    descriptor.username.as_deref(),
                    descriptor.password.as_deref(),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let setup = |e: redis::RedisError| {
            FreshnessError::ConnectionSetup(format!("failed to connect to cache cluster: {e}"))
        };

        let handle = match urls.as_slice() {
            [single] => {
                let client = redis::Client::open(single.as_str()).map_err(setup)?;
                let manager = with_timeout(op_timeout, "connect", ConnectionManager::new(client))
                    .await
                    .map_err(as_setup)?
                    .map_err(setup)?;
                Handle::Single(manager)
            }
            _ => {
                let client = ClusterClient::new(urls.clone()).map_err(setup)?;
                let connection =
                    with_timeout(op_timeout, "connect", client.get_async_connection())
                        .await
                        .map_err(as_setup)?
                        .map_err(setup)?;
                Handle::Cluster(connection)
            }
        };

        info!(nodes = urls.len(), "connected to cache cluster");
        Ok(Self {
            handle,
            op_timeout,
            nodes: urls.len(),
        })
    }

    /// Number of nodes this handle was built for.
    pub fn nodes(&self) -> usize {
        self.nodes
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    fn name(&self) -> &str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = match self.handle.clone() {
            Handle::Single(mut conn) => {
                with_timeout(self.op_timeout, "GET", conn.get::<_, Option<Vec<u8>>>(key)).await??
            }
            Handle::Cluster(mut conn) => {
                with_timeout(self.op_timeout, "GET", conn.get::<_, Option<Vec<u8>>>(key)).await??
            }
        };
        Ok(value)
    }
}

/// Run `fut` with a deadline; expiry is a [`FreshnessError::CacheUnavailable`].
async fn with_timeout<F: std::future::Future>(
    limit: Duration,
    operation: &str,
    fut: F,
) -> Result<F::Output> {
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        FreshnessError::CacheUnavailable(format!(
            "{operation} timed out after {}ms",
            limit.as_millis()
        ))
    })
}

fn as_setup(err: FreshnessError) -> FreshnessError {
    FreshnessError::ConnectionSetup(err.to_string())
}

/// Build a `redis://` URL for one node, embedding credentials.
///
/// Bare `host:port` entries get the `redis://` scheme; entries that already
/// carry a scheme (`redis://`, `rediss://`) keep it.
fn node_url(server: &str, username: Option<&str>, password: Option<&str>) -> Result<String> {
    let raw = if server.contains("://") {
        server.to_string()
    } else {
        format!("redis://{server}")
    };
    let invalid =
        || FreshnessError::ConnectionSetup(format!("invalid cache server address '{server}'"));
    let mut url = Url::parse(&raw).map_err(|_| invalid())?;
    if url.host_str().is_none() {
        return Err(invalid());
    }
    if let Some(username) = username {
        url.set_username(username).map_err(|_| invalid())?;
    }
    if let Some(password) = password {
        url.set_password(Some(password)).map_err(|_| invalid())?;
    }
    Ok(url.to_string())
}
