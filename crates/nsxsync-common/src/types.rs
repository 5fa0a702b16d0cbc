//! Orchestrator resource types and persisted row types.
//!
//! Resource types carry the attributes the lifecycle driver needs from the
//! orchestrator's precommit event payloads. Row types mirror the database
//! tables touched by the migration tool; they serialize to JSON for storage.

use serde::{Deserialize, Serialize};

/// Device owner value marking a floating-IP port.
///
/// Floating-IP ports are not backend-managed and are skipped entirely by the
/// port lifecycle operations.
pub const DEVICE_OWNER_FLOATING_IP: &str = "network:floatingip";

/// Virtual interface type reported for every binding.
pub const VIF_TYPE_OVS: &str = "ovs";

/// VNIC type written for migrated bindings.
pub const VNIC_TYPE_NORMAL: &str = "normal";

/// Driver name recorded on new-schema bindings.
pub const BINDING_DRIVER: &str = "nsxsync";

/// VIF capability details: port filtering enabled.
pub const PORT_FILTER_VIF_DETAILS: &str = r#"{"port_filter": true}"#;

/// An orchestrator network as seen at a lifecycle point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkData {
    /// Orchestrator network id.
    pub id: String,
    /// Owning tenant.
    pub tenant_id: String,
    /// Display name.
    pub name: String,
    /// Whether the network is shared across tenants.
    #[serde(default)]
    pub shared: bool,
    /// Administrative state.
    #[serde(default = "default_true")]
    pub admin_state_up: bool,
}

fn default_true() -> bool {
    true
}

/// A fixed IP assignment on a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedIp {
    /// The subnet the address belongs to.
    pub subnet_id: String,
    /// The assigned address.
    pub ip_address: String,
}

/// An allowed address pair on a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressPair {
    /// The allowed address.
    pub ip_address: String,
    /// Optional MAC override; the port MAC applies when absent.
    #[serde(default)]
    pub mac_address: Option<String>,
}

/// An orchestrator port as seen at a lifecycle point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortData {
    /// Orchestrator port id.
    pub id: String,
    /// The network the port belongs to.
    pub network_id: String,
    /// Owning tenant.
    pub tenant_id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Attached device id (instance, router, ...). Empty when unattached.
    #[serde(default)]
    pub device_id: String,
    /// Device owner tag (e.g., "compute:nova", "network:floatingip").
    #[serde(default)]
    pub device_owner: String,
    /// Administrative state.
    #[serde(default = "default_true")]
    pub admin_state_up: bool,
    /// MAC address.
    pub mac_address: String,
    /// Fixed IP assignments.
    #[serde(default)]
    pub fixed_ips: Vec<FixedIp>,
    /// Orchestrator security group ids.
    #[serde(default)]
    pub security_groups: Vec<String>,
    /// Whether port security is enabled.
    #[serde(default = "default_true")]
    pub port_security_enabled: bool,
    /// Allowed address pairs.
    #[serde(default)]
    pub allowed_address_pairs: Vec<AddressPair>,
}

impl PortData {
    /// Returns true if this port is a floating-IP port.
    pub fn is_floating_ip(&self) -> bool {
        self.device_owner == DEVICE_OWNER_FLOATING_IP
    }
}

/// Transport zone configuration for a logical switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportZoneConfig {
    /// Transport zone uuid on the backend.
    pub zone_uuid: String,
    /// Transport type (e.g., "stt", "vxlan").
    pub transport_type: String,
}

/// A transport segment row binding a network to a VNI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSegment {
    /// Segment row id.
    pub id: String,
    /// The network this segment belongs to.
    pub network_id: String,
    /// Transport type, "vxlan" for migrated segments.
    pub network_type: String,
    /// Physical network name; none for overlay segments.
    #[serde(default)]
    pub physical_network: Option<String>,
    /// The VNI; none for flat segments.
    #[serde(default)]
    pub segmentation_id: Option<u32>,
    /// Whether the segment was dynamically allocated.
    #[serde(default)]
    pub is_dynamic: bool,
}

/// A VNI pool entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VniAllocation {
    /// The VNI value.
    pub vni: u32,
    /// Whether the VNI is in use. Transitions false to true only.
    pub allocated: bool,
}

/// A legacy-schema port binding row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyBinding {
    /// The bound port id.
    pub port_id: String,
    /// The host the port is bound to.
    pub host: String,
}

/// A new-schema port binding row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    /// The bound port id.
    pub port_id: String,
    /// The host the port is bound to.
    pub host: String,
    /// Virtual interface type.
    pub vif_type: String,
    /// The driver that produced the binding.
    pub driver: String,
    /// The transport segment the binding uses.
    pub segment_id: String,
    /// VNIC type.
    pub vnic_type: String,
    /// JSON-encoded VIF capability details.
    pub vif_details: String,
}
