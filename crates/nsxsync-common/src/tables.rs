//! Table name constants for the orchestrator database.
//!
//! Tables are Redis hashes: field = row id, value = JSON-serialized row.

/// Orchestrator networks table.
pub const NETWORKS_TABLE: &str = "NETWORKS";

/// Orchestrator ports table.
pub const PORTS_TABLE: &str = "PORTS";

/// Transport segment table (new schema).
pub const SEGMENTS_TABLE: &str = "NETWORK_SEGMENTS";

/// VNI allocation pool table, keyed by VNI value.
pub const VNI_ALLOCATIONS_TABLE: &str = "VXLAN_VNI_ALLOCATIONS";

/// Legacy port binding table, keyed by port id.
pub const LEGACY_BINDINGS_TABLE: &str = "PORT_BINDING_HOSTS";

/// New-schema port binding table, keyed by port id.
pub const PORT_BINDINGS_TABLE: &str = "PORT_BINDINGS";

/// Network id to backend switch id mappings.
pub const NETWORK_MAPPINGS_TABLE: &str = "NSX_NETWORK_MAPPINGS";

/// Port id to backend switch/port id mappings.
pub const PORT_MAPPINGS_TABLE: &str = "NSX_PORT_MAPPINGS";
