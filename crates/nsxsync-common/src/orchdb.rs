//! Read-only access to the orchestrator's network and port tables.
//!
//! The reconciliation supervisor re-derives desired backend state from these
//! tables each pass; it never caches them.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::info;

use crate::error::{SyncError, SyncResult};
use crate::tables::{NETWORKS_TABLE, PORTS_TABLE};
use crate::types::{NetworkData, PortData};

/// The orchestrator's live resource set.
#[async_trait]
pub trait OrchestratorDb: Send + Sync {
    /// Lists all networks.
    async fn list_networks(&self) -> SyncResult<Vec<NetworkData>>;

    /// Lists all ports.
    async fn list_ports(&self) -> SyncResult<Vec<PortData>>;
}

/// Redis-backed orchestrator table reader.
pub struct RedisOrchestratorDb {
    connection: ConnectionManager,
}

impl RedisOrchestratorDb {
    /// Connects to Redis at the given URL.
    pub async fn connect(url: &str) -> SyncResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| SyncError::database("connect", format!("{}: {}", url, e)))?;
        let connection = client
            .get_connection_manager()
            .await
            .map_err(|e| SyncError::database("connect", e.to_string()))?;
        info!("Connected orchestrator db: {}", url);
        Ok(Self { connection })
    }

    /// Wraps an existing connection manager.
    pub fn with_connection(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    async fn fetch_rows<T: serde::de::DeserializeOwned>(&self, table: &str) -> SyncResult<Vec<T>> {
        let mut conn = self.connection.clone();
        let rows: Vec<String> = conn
            .hvals(table)
            .await
            .map_err(|e| SyncError::database("hvals", e.to_string()))?;
        rows.iter()
            .map(|raw| {
                serde_json::from_str(raw).map_err(|e| {
                    SyncError::database("decode", format!("{}: {}: {}", table, e, raw))
                })
            })
            .collect()
    }
}

#[async_trait]
impl OrchestratorDb for RedisOrchestratorDb {
    async fn list_networks(&self) -> SyncResult<Vec<NetworkData>> {
        self.fetch_rows(NETWORKS_TABLE).await
    }

    async fn list_ports(&self) -> SyncResult<Vec<PortData>> {
        self.fetch_rows(PORTS_TABLE).await
    }
}
