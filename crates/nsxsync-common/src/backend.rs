//! The NSX backend gateway trait.
//!
//! The backend is an opaque remote collaborator: logical switches and ports
//! are created, updated and deleted through it, and it answers capacity and
//! security-profile lookups. The wire protocol is not specified here; an
//! HTTP implementation lives in the `nsxsyncd` crate.

use async_trait::async_trait;

use crate::error::SyncResult;
use crate::types::{AddressPair, FixedIp, TransportZoneConfig};

/// A logical switch bound to a network, with its current port count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchStatus {
    /// Backend switch uuid.
    pub uuid: String,
    /// Number of logical ports currently on the switch.
    pub port_count: u32,
}

/// Attributes for creating or updating a logical port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LportRequest {
    /// Orchestrator port id.
    pub port_id: String,
    /// Owning tenant.
    pub tenant_id: String,
    /// Display name.
    pub name: String,
    /// Attached device id.
    pub device_id: String,
    /// Administrative state.
    pub admin_state_up: bool,
    /// MAC address.
    pub mac_address: String,
    /// Fixed IP assignments.
    pub fixed_ips: Vec<FixedIp>,
    /// Effective port security flag.
    pub port_security_enabled: bool,
    /// Backend security profile ids (translated from security groups).
    pub security_profiles: Vec<String>,
    /// Allowed address pairs.
    pub allowed_address_pairs: Vec<AddressPair>,
}

/// Gateway to the NSX backend.
///
/// Delete and update operations fail with [`SyncError::NotFound`] when the
/// backend object is already absent; callers on delete/rename paths treat
/// that as already-consistent.
///
/// [`SyncError::NotFound`]: crate::error::SyncError::NotFound
#[async_trait]
pub trait NsxBackend: Send + Sync {
    /// Creates a logical switch for a network. Returns the switch uuid.
    async fn create_lswitch(
        &self,
        network_id: &str,
        tenant_id: &str,
        name: &str,
        transport_zones: &[TransportZoneConfig],
        shared: bool,
    ) -> SyncResult<String>;

    /// Renames a logical switch.
    async fn rename_lswitch(&self, switch_id: &str, name: &str) -> SyncResult<()>;

    /// Deletes the given logical switches of a network.
    async fn delete_lswitches(&self, network_id: &str, switch_ids: &[String]) -> SyncResult<()>;

    /// Creates a logical port on a switch. Returns the lport uuid.
    async fn create_lport(&self, switch_id: &str, request: &LportRequest) -> SyncResult<String>;

    /// Re-issues the full attribute set for an existing logical port.
    async fn update_lport(
        &self,
        switch_id: &str,
        lport_id: &str,
        request: &LportRequest,
    ) -> SyncResult<()>;

    /// Deletes a logical port.
    async fn delete_lport(&self, switch_id: &str, lport_id: &str) -> SyncResult<()>;

    /// Attaches a VIF to a logical port, binding it to the owning device.
    async fn plug_vif(
        &self,
        switch_id: &str,
        lport_id: &str,
        attachment_kind: &str,
        device_id: &str,
    ) -> SyncResult<()>;

    /// Lists the logical switches bound to a network with their port counts.
    async fn get_switches(&self, network_id: &str) -> SyncResult<Vec<SwitchStatus>>;

    /// Translates an orchestrator security group id to a security profile id.
    async fn get_security_profile_id(&self, security_group_id: &str) -> SyncResult<String>;
}
