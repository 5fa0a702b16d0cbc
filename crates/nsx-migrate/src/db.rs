//! Schema database access for the migration tool.
//!
//! Tables are Redis hashes: field = row id (VNI value for the allocation
//! pool, port id for binding tables), value = JSON-serialized row. Row order
//! follows natural fetch order; the migration pairs rows in that order.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use nsxsync_common::tables::{
    LEGACY_BINDINGS_TABLE, NETWORKS_TABLE, PORTS_TABLE, PORT_BINDINGS_TABLE, SEGMENTS_TABLE,
    VNI_ALLOCATIONS_TABLE,
};
use nsxsync_common::{
    LegacyBinding, NetworkData, NetworkSegment, PortBinding, PortData, SyncError, SyncResult,
    VniAllocation,
};

/// The six tables touched by the migration. No new schema objects are
/// introduced; reads and writes go to existing tables only.
#[async_trait]
pub trait SchemaDb: Send + Sync {
    /// All orchestrator networks.
    async fn networks(&self) -> SyncResult<Vec<NetworkData>>;

    /// All orchestrator ports.
    async fn ports(&self) -> SyncResult<Vec<PortData>>;

    /// All transport segment rows.
    async fn segments(&self) -> SyncResult<Vec<NetworkSegment>>;

    /// All VNI pool entries.
    async fn vni_allocations(&self) -> SyncResult<Vec<VniAllocation>>;

    /// All legacy binding rows.
    async fn legacy_bindings(&self) -> SyncResult<Vec<LegacyBinding>>;

    /// Port ids already present in the new binding table.
    async fn binding_port_ids(&self) -> SyncResult<Vec<String>>;

    /// Inserts a segment row.
    async fn insert_segment(&self, segment: &NetworkSegment) -> SyncResult<()>;

    /// Marks the given VNIs allocated in one bulk update.
    async fn mark_vnis_allocated(&self, vnis: &[u32]) -> SyncResult<()>;

    /// Inserts a new-schema binding row.
    async fn insert_binding(&self, binding: &PortBinding) -> SyncResult<()>;

    /// Deletes a legacy binding row.
    async fn delete_legacy_binding(&self, port_id: &str) -> SyncResult<()>;
}

/// Redis-backed schema database.
pub struct RedisSchemaDb {
    connection: ConnectionManager,
}

impl RedisSchemaDb {
    /// Connects to the database at the given URL.
    pub async fn connect(url: &str) -> SyncResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| SyncError::database("connect", format!("{}: {}", url, e)))?;
        let connection = client
            .get_connection_manager()
            .await
            .map_err(|e| SyncError::database("connect", e.to_string()))?;
        info!("Connected to {}", url);
        Ok(Self { connection })
    }

    async fn fetch_rows<T: DeserializeOwned>(&self, table: &str) -> SyncResult<Vec<T>> {
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

    async fn put_row<T: Serialize>(&self, table: &str, id: &str, row: &T) -> SyncResult<()> {
        let mut conn = self.connection.clone();
        let value = serde_json::to_string(row)
            .map_err(|e| SyncError::database("encode", e.to_string()))?;
        let _: () = conn
            .hset(table, id, value)
            .await
            .map_err(|e| SyncError::database("hset", e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl SchemaDb for RedisSchemaDb {
    async fn networks(&self) -> SyncResult<Vec<NetworkData>> {
        self.fetch_rows(NETWORKS_TABLE).await
    }

    async fn ports(&self) -> SyncResult<Vec<PortData>> {
        self.fetch_rows(PORTS_TABLE).await
    }

    async fn segments(&self) -> SyncResult<Vec<NetworkSegment>> {
        self.fetch_rows(SEGMENTS_TABLE).await
    }

    async fn vni_allocations(&self) -> SyncResult<Vec<VniAllocation>> {
        self.fetch_rows(VNI_ALLOCATIONS_TABLE).await
    }

    async fn legacy_bindings(&self) -> SyncResult<Vec<LegacyBinding>> {
        self.fetch_rows(LEGACY_BINDINGS_TABLE).await
    }

    async fn binding_port_ids(&self) -> SyncResult<Vec<String>> {
        let mut conn = self.connection.clone();
        let ids: Vec<String> = conn
            .hkeys(PORT_BINDINGS_TABLE)
            .await
            .map_err(|e| SyncError::database("hkeys", e.to_string()))?;
        Ok(ids)
    }

    async fn insert_segment(&self, segment: &NetworkSegment) -> SyncResult<()> {
        self.put_row(SEGMENTS_TABLE, &segment.id, segment).await
    }

    async fn mark_vnis_allocated(&self, vnis: &[u32]) -> SyncResult<()> {
        // Rewrites only the referenced entries; re-marking an allocated VNI
        // is a no-op, which keeps this step idempotent.
        for allocation in self.vni_allocations().await? {
            if vnis.contains(&allocation.vni) && !allocation.allocated {
                let row = VniAllocation {
                    allocated: true,
                    ..allocation
                };
                self.put_row(VNI_ALLOCATIONS_TABLE, &row.vni.to_string(), &row)
                    .await?;
            }
        }
        Ok(())
    }

    async fn insert_binding(&self, binding: &PortBinding) -> SyncResult<()> {
        self.put_row(PORT_BINDINGS_TABLE, &binding.port_id, binding)
            .await
    }

    async fn delete_legacy_binding(&self, port_id: &str) -> SyncResult<()> {
        let mut conn = self.connection.clone();
        let _: () = conn
            .hdel(LEGACY_BINDINGS_TABLE, port_id)
            .await
            .map_err(|e| SyncError::database("hdel", e.to_string()))?;
        Ok(())
    }
}
