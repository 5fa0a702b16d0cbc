//! Common infrastructure for the nsxsync crates.
//!
//! This crate provides the pieces shared by the lifecycle driver daemon
//! (`nsxsyncd`) and the schema migration tool (`nsx-migrate`):
//!
//! - [`error`]: the `SyncError` taxonomy and `SyncResult` alias
//! - [`types`]: orchestrator resource types and persisted row types
//! - [`tables`]: table name constants for the orchestrator database
//! - [`backend`]: the `NsxBackend` gateway trait (opaque SDN collaborator)
//! - [`store`]: the `MappingStore` trait with Redis and in-memory backends
//! - [`orchdb`]: read-only access to the orchestrator's network/port tables
//!
//! # Architecture
//!
//! The orchestrator is the source of truth for networks and ports. The
//! lifecycle driver mirrors those resources onto the NSX backend as logical
//! switches and ports, recording the correspondence in the mapping store.
//! The reconciliation supervisor later re-reads both sides to correct drift.

pub mod backend;
pub mod error;
pub mod orchdb;
pub mod store;
pub mod tables;
pub mod types;

// Re-export commonly used items at crate root
pub use backend::{LportRequest, NsxBackend, SwitchStatus};
pub use error::{SyncError, SyncResult};
pub use orchdb::{OrchestratorDb, RedisOrchestratorDb};
pub use store::{MappingStore, MemoryStore, RedisStore};
pub use types::{
    AddressPair, FixedIp, LegacyBinding, NetworkData, NetworkSegment, PortBinding, PortData,
    TransportZoneConfig, VniAllocation, BINDING_DRIVER, DEVICE_OWNER_FLOATING_IP,
    PORT_FILTER_VIF_DETAILS, VIF_TYPE_OVS, VNIC_TYPE_NORMAL,
};
