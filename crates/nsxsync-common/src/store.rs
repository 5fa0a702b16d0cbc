//! The mapping store: orchestrator resource id to backend id correspondence.
//!
//! Every read re-fetches current state; no component caches mapping rows
//! across calls, so concurrent writers race at the row level and the last
//! writer wins.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::{SyncError, SyncResult};
use crate::tables::{NETWORK_MAPPINGS_TABLE, PORT_MAPPINGS_TABLE};

/// Persistent id mapping between orchestrator resources and backend objects.
///
/// A network maps to at most one active backend switch (replacement is
/// delete-then-recreate). A port maps to the switch it was placed on and
/// the lport created for it.
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Records the switch created for a network.
    async fn add_network_mapping(&self, network_id: &str, switch_id: &str) -> SyncResult<()>;

    /// Returns the backend switch ids mapped to a network.
    async fn switch_ids(&self, network_id: &str) -> SyncResult<Vec<String>>;

    /// Removes the mapping row for a network.
    async fn delete_network_mapping(&self, network_id: &str) -> SyncResult<()>;

    /// Records the switch and lport created for a port.
    async fn add_port_mapping(
        &self,
        port_id: &str,
        switch_id: &str,
        lport_id: &str,
    ) -> SyncResult<()>;

    /// Returns the (switch id, lport id) pair for a port, if mapped.
    async fn switch_and_port_id(&self, port_id: &str) -> SyncResult<Option<(String, String)>>;

    /// Removes the mapping row for a port.
    async fn delete_port_mapping(&self, port_id: &str) -> SyncResult<()>;

    /// Returns all mapped network ids (reconciliation).
    async fn mapped_network_ids(&self) -> SyncResult<Vec<String>>;

    /// Returns all mapped port ids (reconciliation).
    async fn mapped_port_ids(&self) -> SyncResult<Vec<String>>;
}

/// In-memory mapping store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    networks: HashMap<String, String>,
    ports: HashMap<String, (String, String)>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MappingStore for MemoryStore {
    async fn add_network_mapping(&self, network_id: &str, switch_id: &str) -> SyncResult<()> {
        let mut inner = self.inner.write().await;
        inner
            .networks
            .insert(network_id.to_string(), switch_id.to_string());
        Ok(())
    }

    async fn switch_ids(&self, network_id: &str) -> SyncResult<Vec<String>> {
        let inner = self.inner.read().await;
        Ok(inner.networks.get(network_id).cloned().into_iter().collect())
    }

    async fn delete_network_mapping(&self, network_id: &str) -> SyncResult<()> {
        let mut inner = self.inner.write().await;
        inner.networks.remove(network_id);
        Ok(())
    }

    async fn add_port_mapping(
        &self,
        port_id: &str,
        switch_id: &str,
        lport_id: &str,
    ) -> SyncResult<()> {
        let mut inner = self.inner.write().await;
        inner.ports.insert(
            port_id.to_string(),
            (switch_id.to_string(), lport_id.to_string()),
        );
        Ok(())
    }

    async fn switch_and_port_id(&self, port_id: &str) -> SyncResult<Option<(String, String)>> {
        let inner = self.inner.read().await;
        Ok(inner.ports.get(port_id).cloned())
    }

    async fn delete_port_mapping(&self, port_id: &str) -> SyncResult<()> {
        let mut inner = self.inner.write().await;
        inner.ports.remove(port_id);
        Ok(())
    }

    async fn mapped_network_ids(&self) -> SyncResult<Vec<String>> {
        let inner = self.inner.read().await;
        Ok(inner.networks.keys().cloned().collect())
    }

    async fn mapped_port_ids(&self) -> SyncResult<Vec<String>> {
        let inner = self.inner.read().await;
        Ok(inner.ports.keys().cloned().collect())
    }
}

/// Redis-backed mapping store.
///
/// Network mappings live in the `NSX_NETWORK_MAPPINGS` hash
/// (network id -> switch id); port mappings live in `NSX_PORT_MAPPINGS`
/// (port id -> "switch_id lport_id").
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    /// Connects to Redis at the given URL.
    pub async fn connect(url: &str) -> SyncResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| SyncError::database("connect", format!("{}: {}", url, e)))?;
        let connection = client
            .get_connection_manager()
            .await
            .map_err(|e| SyncError::database("connect", e.to_string()))?;
        info!("Connected mapping store: {}", url);
        Ok(Self { connection })
    }

    /// Wraps an existing connection manager.
    pub fn with_connection(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    fn conn(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

#[async_trait]
impl MappingStore for RedisStore {
    async fn add_network_mapping(&self, network_id: &str, switch_id: &str) -> SyncResult<()> {
        let mut conn = self.conn();
        let _: () = conn
            .hset(NETWORK_MAPPINGS_TABLE, network_id, switch_id)
            .await
            .map_err(|e| SyncError::database("hset", e.to_string()))?;
        Ok(())
    }

    async fn switch_ids(&self, network_id: &str) -> SyncResult<Vec<String>> {
        let mut conn = self.conn();
        let switch_id: Option<String> = conn
            .hget(NETWORK_MAPPINGS_TABLE, network_id)
            .await
            .map_err(|e| SyncError::database("hget", e.to_string()))?;
        Ok(switch_id.into_iter().collect())
    }

    async fn delete_network_mapping(&self, network_id: &str) -> SyncResult<()> {
        let mut conn = self.conn();
        let _: () = conn
            .hdel(NETWORK_MAPPINGS_TABLE, network_id)
            .await
            .map_err(|e| SyncError::database("hdel", e.to_string()))?;
        Ok(())
    }

    async fn add_port_mapping(
        &self,
        port_id: &str,
        switch_id: &str,
        lport_id: &str,
    ) -> SyncResult<()> {
        let mut conn = self.conn();
        let value = format!("{} {}", switch_id, lport_id);
        let _: () = conn
            .hset(PORT_MAPPINGS_TABLE, port_id, value)
            .await
            .map_err(|e| SyncError::database("hset", e.to_string()))?;
        Ok(())
    }

    async fn switch_and_port_id(&self, port_id: &str) -> SyncResult<Option<(String, String)>> {
        let mut conn = self.conn();
        let value: Option<String> = conn
            .hget(PORT_MAPPINGS_TABLE, port_id)
            .await
            .map_err(|e| SyncError::database("hget", e.to_string()))?;
        match value {
            Some(v) => {
                let (switch_id, lport_id) = v.split_once(' ').ok_or_else(|| {
                    SyncError::database("hget", format!("malformed port mapping: {}", v))
                })?;
                Ok(Some((switch_id.to_string(), lport_id.to_string())))
            }
            None => Ok(None),
        }
    }

    async fn delete_port_mapping(&self, port_id: &str) -> SyncResult<()> {
        let mut conn = self.conn();
        let _: () = conn
            .hdel(PORT_MAPPINGS_TABLE, port_id)
            .await
            .map_err(|e| SyncError::database("hdel", e.to_string()))?;
        Ok(())
    }

    async fn mapped_network_ids(&self) -> SyncResult<Vec<String>> {
        let mut conn = self.conn();
        let ids: Vec<String> = conn
            .hkeys(NETWORK_MAPPINGS_TABLE)
            .await
            .map_err(|e| SyncError::database("hkeys", e.to_string()))?;
        Ok(ids)
    }

    async fn mapped_port_ids(&self) -> SyncResult<Vec<String>> {
        let mut conn = self.conn();
        let ids: Vec<String> = conn
            .hkeys(PORT_MAPPINGS_TABLE)
            .await
            .map_err(|e| SyncError::database("hkeys", e.to_string()))?;
        Ok(ids)
    }
}
