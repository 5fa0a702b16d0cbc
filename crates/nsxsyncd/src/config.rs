//! Daemon configuration.

use std::env;

use nsxsync_common::{SyncError, SyncResult};

/// Default transport type for new logical switches.
pub const DEFAULT_TRANSPORT_TYPE: &str = "stt";

/// Default cap on logical ports per overlay switch.
pub const DEFAULT_MAX_PORTS_PER_SWITCH: u32 = 256;

/// Default reconciliation interval in seconds.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 120;

/// Configuration for the lifecycle driver and reconciliation supervisor.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Default transport zone uuid for new switches.
    pub default_tz_uuid: String,
    /// Transport type used in transport zone bindings.
    pub default_transport_type: String,
    /// Maximum logical ports per switch; switches at or above this count
    /// are not candidates for port placement.
    pub max_ports_per_switch: u32,
    /// Seconds between reconciliation passes when healthy.
    pub sync_interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_tz_uuid: String::new(),
            default_transport_type: DEFAULT_TRANSPORT_TYPE.to_string(),
            max_ports_per_switch: DEFAULT_MAX_PORTS_PER_SWITCH,
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
        }
    }
}

impl SyncConfig {
    /// Builds configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_tz_uuid: env::var("NSX_DEFAULT_TZ_UUID").unwrap_or(defaults.default_tz_uuid),
            default_transport_type: env::var("NSX_TRANSPORT_TYPE")
                .unwrap_or(defaults.default_transport_type),
            max_ports_per_switch: env::var("NSX_MAX_PORTS_PER_SWITCH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_ports_per_switch),
            sync_interval_secs: env::var("NSX_SYNC_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.sync_interval_secs),
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.default_tz_uuid.is_empty() {
            return Err(SyncError::invalid_config(
                "default_tz_uuid",
                "a default transport zone uuid is required",
            ));
        }
        if self.max_ports_per_switch == 0 {
            return Err(SyncError::invalid_config(
                "max_ports_per_switch",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}
