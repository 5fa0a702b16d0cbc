//! The two-phase migration engine.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::info;
use uuid::Uuid;

use nsxsync_common::{
    LegacyBinding, NetworkSegment, PortBinding, SyncError, SyncResult, BINDING_DRIVER,
    PORT_FILTER_VIF_DETAILS, VIF_TYPE_OVS, VNIC_TYPE_NORMAL,
};

use crate::db::SchemaDb;

/// Network type written for backfilled segments.
const NETWORK_TYPE_VXLAN: &str = "vxlan";

/// A write the migration intends to perform.
///
/// In dry-run mode the write is rendered instead of executed; the selection
/// logic ahead of it runs identically either way.
#[derive(Debug, Clone)]
enum PlannedWrite {
    InsertSegment(NetworkSegment),
    /// Set-based correction: mark every VNI referenced by a vxlan segment
    /// as allocated. Safe to re-run after a partial prior run.
    MarkVnisAllocated,
    InsertBinding(PortBinding),
    DeleteLegacyBinding(String),
}

impl fmt::Display for PlannedWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannedWrite::InsertSegment(s) => write!(
                f,
                "INSERT segment id={} network_id={} network_type={} segmentation_id={} is_dynamic=false",
                s.id,
                s.network_id,
                s.network_type,
                s.segmentation_id.map_or_else(|| "null".to_string(), |v| v.to_string()),
            ),
            PlannedWrite::MarkVnisAllocated => write!(
                f,
                "UPDATE vni_allocations SET allocated=true WHERE vni IN \
                 (SELECT segmentation_id FROM segments WHERE network_type='vxlan')"
            ),
            PlannedWrite::InsertBinding(b) => write!(
                f,
                "INSERT binding port_id={} host={} vif_type={} driver={} segment_id={} vnic_type={}",
                b.port_id, b.host, b.vif_type, b.driver, b.segment_id, b.vnic_type,
            ),
            PlannedWrite::DeleteLegacyBinding(port_id) => {
                write!(f, "DELETE legacy binding port_id={}", port_id)
            }
        }
    }
}

/// One-shot migration run against a schema database.
pub struct Migration<'a> {
    db: &'a dyn SchemaDb,
    dry_run: bool,
    rendered: Vec<String>,
}

impl<'a> Migration<'a> {
    /// Creates a migration over the given database.
    pub fn new(db: &'a dyn SchemaDb, dry_run: bool) -> Self {
        Self {
            db,
            dry_run,
            rendered: Vec::new(),
        }
    }

    /// Returns the writes rendered so far (dry-run mode only).
    pub fn rendered_writes(&self) -> &[String] {
        &self.rendered
    }

    /// Runs both phases. Fails before any write when the free-VNI pool is
    /// smaller than the set of networks needing a segment.
    pub async fn run(&mut self) -> SyncResult<()> {
        self.backfill_segments().await?;
        self.migrate_bindings().await
    }

    async fn apply(&mut self, write: PlannedWrite) -> SyncResult<()> {
        if self.dry_run {
            info!("dry-run: {}", write);
            self.rendered.push(write.to_string());
            return Ok(());
        }
        match write {
            PlannedWrite::InsertSegment(segment) => self.db.insert_segment(&segment).await,
            PlannedWrite::MarkVnisAllocated => {
                let vnis: Vec<u32> = self
                    .db
                    .segments()
                    .await?
                    .iter()
                    .filter(|s| s.network_type == NETWORK_TYPE_VXLAN)
                    .filter_map(|s| s.segmentation_id)
                    .collect();
                self.db.mark_vnis_allocated(&vnis).await
            }
            PlannedWrite::InsertBinding(binding) => self.db.insert_binding(&binding).await,
            PlannedWrite::DeleteLegacyBinding(port_id) => {
                self.db.delete_legacy_binding(&port_id).await
            }
        }
    }

    /// Phase A: give every segment-less network a vxlan segment with a VNI
    /// from the free pool, pairing in fetch order.
    async fn backfill_segments(&mut self) -> SyncResult<()> {
        let networks = self.db.networks().await?;
        let segments = self.db.segments().await?;

        let with_segment: HashSet<&str> =
            segments.iter().map(|s| s.network_id.as_str()).collect();
        let unassigned: Vec<_> = networks
            .iter()
            .filter(|n| !with_segment.contains(n.id.as_str()))
            .collect();

        let free_vnis: Vec<u32> = self
            .db
            .vni_allocations()
            .await?
            .into_iter()
            .filter(|v| !v.allocated)
            .map(|v| v.vni)
            .collect();

        if unassigned.len() > free_vnis.len() {
            return Err(SyncError::InsufficientVnis {
                networks: unassigned.len(),
                available: free_vnis.len(),
            });
        }

        let total = unassigned.len();
        for (index, (net, vni)) in unassigned.iter().zip(free_vnis).enumerate() {
            info!("Allocating VNI {}/{}", index + 1, total);
            self.apply(PlannedWrite::InsertSegment(NetworkSegment {
                id: Uuid::new_v4().to_string(),
                network_id: net.id.clone(),
                network_type: NETWORK_TYPE_VXLAN.to_string(),
                physical_network: None,
                segmentation_id: Some(vni),
                is_dynamic: false,
            }))
            .await?;
        }

        if total > 0 {
            info!("Updating allocated VNIs");
            self.apply(PlannedWrite::MarkVnisAllocated).await?;
        }

        Ok(())
    }

    /// Phase B: rewrite legacy binding rows against the new schema. The
    /// pending set is re-derived from current table state, so re-running
    /// after a partial failure picks up where the last run stopped.
    async fn migrate_bindings(&mut self) -> SyncResult<()> {
        let legacy = self.db.legacy_bindings().await?;
        let migrated: HashSet<String> = self.db.binding_port_ids().await?.into_iter().collect();
        let pending: Vec<LegacyBinding> = legacy
            .into_iter()
            .filter(|b| !migrated.contains(&b.port_id))
            .collect();

        // Segment cache, computed once: port id -> segment id via the
        // port's network.
        let segments = self.db.segments().await?;
        let segment_by_network: HashMap<&str, &str> = segments
            .iter()
            .map(|s| (s.network_id.as_str(), s.id.as_str()))
            .collect();
        let segment_cache: HashMap<String, String> = self
            .db
            .ports()
            .await?
            .into_iter()
            .filter_map(|p| {
                segment_by_network
                    .get(p.network_id.as_str())
                    .map(|seg| (p.id, seg.to_string()))
            })
            .collect();

        let total = pending.len();
        for (index, old) in pending.into_iter().enumerate() {
            info!("Migrating binding {}/{}", index + 1, total);

            match segment_cache.get(&old.port_id) {
                None => {
                    info!("Port {} no longer exists, skipping", old.port_id);
                }
                Some(segment_id) => {
                    self.apply(PlannedWrite::InsertBinding(PortBinding {
                        port_id: old.port_id.clone(),
                        host: old.host.clone(),
                        vif_type: VIF_TYPE_OVS.to_string(),
                        driver: BINDING_DRIVER.to_string(),
                        segment_id: segment_id.clone(),
                        vnic_type: VNIC_TYPE_NORMAL.to_string(),
                        vif_details: PORT_FILTER_VIF_DETAILS.to_string(),
                    }))
                    .await?;
                }
            }

            // The legacy row goes away whether or not the insert happened;
            // a row for a vanished port must not linger.
            self.apply(PlannedWrite::DeleteLegacyBinding(old.port_id))
                .await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::MemoryDb;
    use nsxsync_common::{NetworkData, PortData};
    use pretty_assertions::assert_eq;
    use std::collections::HashSet as StdHashSet;

    fn network(id: &str) -> NetworkData {
        NetworkData {
            id: id.to_string(),
            tenant_id: "tenant-1".to_string(),
            name: format!("name-{}", id),
            shared: false,
            admin_state_up: true,
        }
    }

    fn port(id: &str, network_id: &str) -> PortData {
        PortData {
            id: id.to_string(),
            network_id: network_id.to_string(),
            tenant_id: "tenant-1".to_string(),
            name: String::new(),
            device_id: String::new(),
            device_owner: String::new(),
            admin_state_up: true,
            mac_address: "fa:16:3e:00:00:01".to_string(),
            fixed_ips: vec![],
            security_groups: vec![],
            port_security_enabled: true,
            allowed_address_pairs: vec![],
        }
    }

    #[tokio::test]
    async fn test_backfill_three_networks_five_vnis() {
        let db = MemoryDb::new();
        for i in 1..=3 {
            db.add_network(network(&format!("net-{}", i)));
        }
        for vni in [5001, 5002, 5003, 5004, 5005] {
            db.add_vni(vni, false);
        }

        Migration::new(&db, false).run().await.unwrap();

        let segments = db.segment_rows();
        assert_eq!(segments.len(), 3);
        for segment in &segments {
            assert_eq!(segment.network_type, "vxlan");
            assert_eq!(segment.physical_network, None);
            assert!(!segment.is_dynamic);
        }

        let allocated: Vec<u32> = db
            .vni_rows()
            .into_iter()
            .filter(|v| v.allocated)
            .map(|v| v.vni)
            .collect();
        assert_eq!(allocated.len(), 3);
        let free = db.vni_rows().into_iter().filter(|v| !v.allocated).count();
        assert_eq!(free, 2);
    }

    #[tokio::test]
    async fn test_backfill_aborts_on_insufficient_vnis() {
        let db = MemoryDb::new();
        for i in 1..=5 {
            db.add_network(network(&format!("net-{}", i)));
        }
        db.add_vni(5001, false);
        db.add_vni(5002, false);

        let err = Migration::new(&db, false).run().await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::InsufficientVnis {
                networks: 5,
                available: 2,
            }
        ));

        // Zero writes
        assert_eq!(db.write_count(), 0);
        assert!(db.segment_rows().is_empty());
        assert!(db.vni_rows().iter().all(|v| !v.allocated));
    }

    #[tokio::test]
    async fn test_vni_uniqueness() {
        let db = MemoryDb::new();
        for i in 1..=4 {
            db.add_network(network(&format!("net-{}", i)));
        }
        for vni in [5001, 5002, 5003, 5004] {
            db.add_vni(vni, false);
        }

        Migration::new(&db, false).run().await.unwrap();

        let vnis: Vec<u32> = db
            .segment_rows()
            .iter()
            .filter_map(|s| s.segmentation_id)
            .collect();
        let unique: StdHashSet<u32> = vnis.iter().copied().collect();
        assert_eq!(vnis.len(), unique.len());
    }

    #[tokio::test]
    async fn test_networks_with_segments_are_skipped() {
        let db = MemoryDb::new();
        db.add_network(network("net-1"));
        db.add_network(network("net-2"));
        db.add_segment(NetworkSegment {
            id: "seg-existing".to_string(),
            network_id: "net-1".to_string(),
            network_type: "vxlan".to_string(),
            physical_network: None,
            segmentation_id: Some(4000),
            is_dynamic: false,
        });
        db.add_vni(5001, false);

        Migration::new(&db, false).run().await.unwrap();

        let segments = db.segment_rows();
        assert_eq!(segments.len(), 2);
        assert_eq!(
            segments.iter().filter(|s| s.network_id == "net-2").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_binding_migration() {
        let db = MemoryDb::new();
        db.add_network(network("net-1"));
        db.add_port(port("port-1", "net-1"));
        db.add_legacy_binding("port-1", "compute-7");
        db.add_vni(5001, false);

        Migration::new(&db, false).run().await.unwrap();

        let bindings = db.binding_rows();
        assert_eq!(bindings.len(), 1);
        let binding = &bindings[0];
        assert_eq!(binding.port_id, "port-1");
        assert_eq!(binding.host, "compute-7");
        assert_eq!(binding.vif_type, "ovs");
        assert_eq!(binding.driver, "nsxsync");
        assert_eq!(binding.vnic_type, "normal");
        assert_eq!(binding.vif_details, r#"{"port_filter": true}"#);

        // Segment id resolved through the port's network
        let segment_id = &db.segment_rows()[0].id;
        assert_eq!(&binding.segment_id, segment_id);

        // Legacy row superseded
        assert!(db.legacy_rows().is_empty());
    }

    #[tokio::test]
    async fn test_vanished_port_row_is_deleted_without_insert() {
        let db = MemoryDb::new();
        db.add_legacy_binding("port-ghost", "compute-1");

        Migration::new(&db, false).run().await.unwrap();

        assert!(db.binding_rows().is_empty());
        assert!(db.legacy_rows().is_empty());
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let db = MemoryDb::new();
        for i in 1..=2 {
            db.add_network(network(&format!("net-{}", i)));
        }
        db.add_port(port("port-1", "net-1"));
        db.add_legacy_binding("port-1", "compute-7");
        db.add_vni(5001, false);
        db.add_vni(5002, false);

        Migration::new(&db, false).run().await.unwrap();
        let writes_after_first = db.write_count();

        Migration::new(&db, false).run().await.unwrap();
        assert_eq!(db.write_count(), writes_after_first);
        assert_eq!(db.segment_rows().len(), 2);
        assert_eq!(db.binding_rows().len(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_performs_no_writes() {
        let db = MemoryDb::new();
        db.add_network(network("net-1"));
        db.add_port(port("port-1", "net-1"));
        db.add_legacy_binding("port-1", "compute-7");
        db.add_vni(5001, false);

        let mut migration = Migration::new(&db, true);
        migration.run().await.unwrap();

        assert_eq!(db.write_count(), 0);
        assert!(db.segment_rows().is_empty());
        assert_eq!(db.legacy_rows().len(), 1);

        // Rendered preview mirrors the real decisions: one segment insert,
        // the bulk VNI update, and the legacy row deletion. The binding
        // insert is absent because in dry-run the segment was never
        // written, so the port resolves no segment.
        let rendered = migration.rendered_writes();
        assert!(rendered.iter().any(|w| w.starts_with("INSERT segment")));
        assert!(rendered
            .iter()
            .any(|w| w.starts_with("UPDATE vni_allocations")));
        assert!(rendered
            .iter()
            .any(|w| w.starts_with("DELETE legacy binding port_id=port-1")));
    }

    #[tokio::test]
    async fn test_dry_run_insufficient_vnis_still_aborts() {
        let db = MemoryDb::new();
        db.add_network(network("net-1"));
        db.add_network(network("net-2"));
        db.add_vni(5001, false);

        let err = Migration::new(&db, true).run().await.unwrap_err();
        assert!(matches!(err, SyncError::InsufficientVnis { .. }));
    }
}
