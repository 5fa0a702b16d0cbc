//! SwitchSync - the resource lifecycle driver.
//!
//! Translates orchestrator network/port mutations into NSX backend calls
//! and mapping-store writes. The orchestrator invokes each hook at its
//! precommit lifecycle point, inside its own transaction boundary, so
//! cosmetic backend failures on update paths are logged and swallowed
//! rather than aborting the transaction.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use nsxsync_common::{
    LportRequest, MappingStore, NetworkData, NetworkSegment, NsxBackend, PortData, SwitchStatus,
    SyncError, SyncResult, TransportZoneConfig, PORT_FILTER_VIF_DETAILS, VIF_TYPE_OVS,
};

use crate::config::SyncConfig;
use crate::port_security::PortSecurityPolicy;

/// Attachment kind used when plugging a VIF into a logical port.
pub const VIF_ATTACHMENT: &str = "VifAttachment";

/// Port status reported for every binding.
pub const PORT_STATUS_ACTIVE: &str = "active";

/// The binding produced by [`LifecycleHooks::bind_port`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundPort {
    /// The transport segment the port was bound with.
    pub segment_id: String,
    /// Virtual interface type.
    pub vif_type: String,
    /// JSON-encoded VIF capability details.
    pub vif_details: String,
    /// Port status, unconditionally "active".
    pub status: String,
}

/// Precommit lifecycle hooks invoked by the orchestrator.
///
/// One method per lifecycle point; the orchestrator provides event data and
/// at-least-once delivery per event within a transaction.
#[async_trait]
pub trait LifecycleHooks: Send + Sync {
    /// A network is being created.
    async fn create_network(&self, net: &NetworkData) -> SyncResult<()>;

    /// A network is being updated.
    async fn update_network(
        &self,
        original: &NetworkData,
        current: &NetworkData,
    ) -> SyncResult<()>;

    /// A network is being deleted.
    async fn delete_network(&self, net: &NetworkData) -> SyncResult<()>;

    /// A port is being created.
    async fn create_port(&self, port: &PortData) -> SyncResult<()>;

    /// A port is being updated.
    async fn update_port(&self, port: &PortData) -> SyncResult<()>;

    /// A port is being deleted.
    async fn delete_port(&self, port: &PortData) -> SyncResult<()>;

    /// A port is being bound to a transport segment.
    async fn bind_port(&self, port: &PortData, segments: &[NetworkSegment])
        -> SyncResult<BoundPort>;
}

/// Keeps NSX logical switches and ports synchronized with orchestrator
/// network/port mutations.
pub struct SwitchSync {
    backend: Arc<dyn NsxBackend>,
    store: Arc<dyn MappingStore>,
    port_security: Arc<dyn PortSecurityPolicy>,
    config: SyncConfig,
}

impl SwitchSync {
    /// Creates a new driver.
    pub fn new(
        backend: Arc<dyn NsxBackend>,
        store: Arc<dyn MappingStore>,
        port_security: Arc<dyn PortSecurityPolicy>,
        config: SyncConfig,
    ) -> Self {
        Self {
            backend,
            store,
            port_security,
            config,
        }
    }

    /// Derives the transport zone bindings for a new switch.
    fn transport_zone_config(&self) -> Vec<TransportZoneConfig> {
        vec![TransportZoneConfig {
            zone_uuid: self.config.default_tz_uuid.clone(),
            transport_type: self.config.default_transport_type.clone(),
        }]
    }

    /// Selects a logical switch with spare capacity for a port, first-fit.
    async fn find_lswitch(&self, network_id: &str) -> SyncResult<SwitchStatus> {
        let switches = self.backend.get_switches(network_id).await?;
        let checked = switches.len();

        switches
            .into_iter()
            .find(|ls| ls.port_count < self.config.max_ports_per_switch)
            .ok_or_else(|| {
                debug!("No switch has available ports ({} checked)", checked);
                SyncError::NoAvailableSwitch {
                    network_id: network_id.to_string(),
                    checked,
                }
            })
    }

    /// Translates orchestrator security group ids to security profile ids.
    async fn security_profile_ids(&self, security_groups: &[String]) -> SyncResult<Vec<String>> {
        let mut profiles = Vec::with_capacity(security_groups.len());
        for sg_id in security_groups {
            profiles.push(self.backend.get_security_profile_id(sg_id).await?);
        }
        Ok(profiles)
    }

    /// Builds the full lport attribute set for a create or update call.
    async fn lport_request(&self, port: &PortData) -> SyncResult<LportRequest> {
        let port_security_enabled = self.port_security.effective_port_security(port)?;
        let security_profiles = self.security_profile_ids(&port.security_groups).await?;

        Ok(LportRequest {
            port_id: port.id.clone(),
            tenant_id: port.tenant_id.clone(),
            name: port.name.clone(),
            device_id: port.device_id.clone(),
            admin_state_up: port.admin_state_up,
            mac_address: port.mac_address.clone(),
            fixed_ips: port.fixed_ips.clone(),
            port_security_enabled,
            security_profiles,
            allowed_address_pairs: port.allowed_address_pairs.clone(),
        })
    }
}

#[async_trait]
impl LifecycleHooks for SwitchSync {
    #[instrument(skip(self, net), fields(network_id = %net.id))]
    async fn create_network(&self, net: &NetworkData) -> SyncResult<()> {
        if !net.admin_state_up {
            warn!(
                "Networks with admin_state_up=false are not supported; \
                 ignoring the setting for network {}",
                net.name
            );
        }

        let transport_zones = self.transport_zone_config();
        let switch_id = self
            .backend
            .create_lswitch(&net.id, &net.tenant_id, &net.name, &transport_zones, net.shared)
            .await?;

        // No compensation if this write fails after the backend call: the
        // orphaned switch is picked up by the next reconciliation pass.
        self.store.add_network_mapping(&net.id, &switch_id).await?;

        info!("Created lswitch {} for network {}", switch_id, net.id);
        Ok(())
    }

    #[instrument(skip(self, original, current), fields(network_id = %current.id))]
    async fn update_network(
        &self,
        original: &NetworkData,
        current: &NetworkData,
    ) -> SyncResult<()> {
        if original.name == current.name {
            return Ok(());
        }

        let switch_ids = self.store.switch_ids(&current.id).await?;
        let Some(switch_id) = switch_ids.first() else {
            warn!("Unable to find NSX mappings for network {}", original.id);
            return Ok(());
        };

        if let Err(e) = self.backend.rename_lswitch(switch_id, &current.name).await {
            warn!(
                "Logical switch rename failed on the NSX backend. \
                 network id: {}; lswitch id: {}; error: {}",
                current.id, switch_id, e
            );
        }
        Ok(())
    }

    #[instrument(skip(self, net), fields(network_id = %net.id))]
    async fn delete_network(&self, net: &NetworkData) -> SyncResult<()> {
        let switch_ids = self.store.switch_ids(&net.id).await?;

        match self.backend.delete_lswitches(&net.id, &switch_ids).await {
            Ok(()) => {
                self.store.delete_network_mapping(&net.id).await?;
            }
            Err(e) if e.is_not_found() => {
                // Already consistent; any stale mapping row is cleaned up
                // by the next reconciliation pass.
                warn!(
                    "Logical switches not found on the NSX backend: {:?}",
                    switch_ids
                );
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    #[instrument(skip(self, port), fields(port_id = %port.id))]
    async fn create_port(&self, port: &PortData) -> SyncResult<()> {
        if port.is_floating_ip() {
            debug!("Skipping floating-IP port {}", port.id);
            return Ok(());
        }

        let switch = self.find_lswitch(&port.network_id).await?;
        let request = self.lport_request(port).await?;

        let lport_id = self.backend.create_lport(&switch.uuid, &request).await?;
        self.store
            .add_port_mapping(&port.id, &switch.uuid, &lport_id)
            .await?;

        if !port.device_owner.is_empty() {
            self.backend
                .plug_vif(&switch.uuid, &lport_id, VIF_ATTACHMENT, &port.id)
                .await?;
        }

        debug!(
            "Port created on NSX backend for tenant {}: {}",
            port.tenant_id, port.id
        );
        Ok(())
    }

    #[instrument(skip(self, port), fields(port_id = %port.id))]
    async fn update_port(&self, port: &PortData) -> SyncResult<()> {
        // No mapping means nothing to update; left as a silent no-op.
        let Some((switch_id, lport_id)) = self.store.switch_and_port_id(&port.id).await? else {
            return Ok(());
        };

        let request = self.lport_request(port).await?;

        if let Err(e) = self
            .backend
            .update_lport(&switch_id, &lport_id, &request)
            .await
        {
            if !e.is_nonfatal_on_update() {
                return Err(e);
            }
            warn!(
                "Logical port update failed on the NSX backend. \
                 port id: {}; lport id: {}; error: {}",
                port.id, lport_id, e
            );
        }
        Ok(())
    }

    #[instrument(skip(self, port), fields(port_id = %port.id))]
    async fn delete_port(&self, port: &PortData) -> SyncResult<()> {
        if port.is_floating_ip() {
            debug!("Skipping floating-IP port {}", port.id);
            return Ok(());
        }

        let Some((switch_id, lport_id)) = self.store.switch_and_port_id(&port.id).await? else {
            warn!("Port {} has no NSX mapping", port.id);
            return Ok(());
        };

        match self.backend.delete_lport(&switch_id, &lport_id).await {
            Ok(()) => {
                self.store.delete_port_mapping(&port.id).await?;
                debug!(
                    "Deleted lport for port {} on network {}",
                    port.id, port.network_id
                );
            }
            Err(e) if e.is_not_found() => {
                warn!("Port {} not found in NSX", port.id);
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    #[instrument(skip(self, port, segments), fields(port_id = %port.id))]
    async fn bind_port(
        &self,
        port: &PortData,
        segments: &[NetworkSegment],
    ) -> SyncResult<BoundPort> {
        // Multi-segment networks are unsupported; only the first segment
        // is considered.
        let segment = segments.first().ok_or_else(|| {
            SyncError::internal(format!("network {} has no segments", port.network_id))
        })?;

        debug!("Bound using segment: {}", segment.id);
        Ok(BoundPort {
            segment_id: segment.id.clone(),
            vif_type: VIF_TYPE_OVS.to_string(),
            vif_details: PORT_FILTER_VIF_DETAILS.to_string(),
            status: PORT_STATUS_ACTIVE.to_string(),
        })
    }
}
