//! Port security policy seam.
//!
//! The capability is injected into [`SwitchSync`] at construction time so
//! the driver never reaches back into the hosting plugin for it.
//!
//! [`SwitchSync`]: crate::switch_sync::SwitchSync

use nsxsync_common::{PortData, SyncError, SyncResult};

/// Determines the effective port security flag for a port.
pub trait PortSecurityPolicy: Send + Sync {
    /// Returns the port security flag to report to the backend.
    ///
    /// Fails when the requested attribute combination is invalid.
    fn effective_port_security(&self, port: &PortData) -> SyncResult<bool>;
}

/// Default policy: honor the port's flag, but allowed address pairs require
/// port security to be enabled.
#[derive(Debug, Default)]
pub struct DefaultPortSecurity;

impl PortSecurityPolicy for DefaultPortSecurity {
    fn effective_port_security(&self, port: &PortData) -> SyncResult<bool> {
        if !port.port_security_enabled && !port.allowed_address_pairs.is_empty() {
            return Err(SyncError::AddressPairsRequirePortSecurity {
                port_id: port.id.clone(),
            });
        }
        Ok(port.port_security_enabled)
    }
}
