//! nsxsyncd - NSX backend synchronization for the network orchestrator.
//!
//! Keeps NSX logical switches and ports consistent with the orchestrator's
//! network/port resources:
//!
//! - [`SwitchSync`] implements the [`LifecycleHooks`] precommit interface:
//!   each orchestrator network/port mutation is translated into backend API
//!   calls and a mapping-store write.
//! - [`SyncSupervisor`] runs the recurring reconciliation pass, containing
//!   backend failures with an exponential backoff so a bad pass never
//!   terminates the process.
//!
//! The orchestrator process embeds [`SwitchSync`] and invokes the hooks
//! inside its own transaction boundary; the `nsxsyncd` binary runs only the
//! reconciliation supervisor.

pub mod api_client;
pub mod config;
pub mod port_security;
pub mod supervisor;
pub mod switch_sync;

#[cfg(test)]
pub(crate) mod testutil;

pub use api_client::NsxApiClient;
pub use config::SyncConfig;
pub use port_security::{DefaultPortSecurity, PortSecurityPolicy};
pub use supervisor::{SyncBackoff, SyncState, SyncSupervisor, MAX_SYNC_BACKOFF_SECS};
pub use switch_sync::{BoundPort, LifecycleHooks, SwitchSync};
