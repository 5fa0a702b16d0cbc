//! Reconciliation supervisor.
//!
//! Runs a recurring pass comparing backend state to the orchestrator's
//! resource set. There are about a million ways for a pass to go wrong
//! (database connection issues, backend timeouts, transactional races);
//! instead of terminating on the first exception, the supervisor converts
//! every failure into a longer retry interval and a diagnostic record, so
//! the process auto-recovers once the database or network comes back.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use nsxsync_common::{
    MappingStore, NsxBackend, OrchestratorDb, SyncResult, TransportZoneConfig,
};

use crate::config::SyncConfig;

/// Ceiling for the failure backoff, in seconds.
pub const MAX_SYNC_BACKOFF_SECS: u64 = 64;

/// Supervisor state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Waiting for the next scheduled pass.
    Idle,
    /// A pass is in progress.
    Syncing,
    /// The last pass failed; waiting out the backoff interval.
    BackoffWait,
}

/// Owned backoff state: 1s doubling to 64s on failure, reset on success.
#[derive(Debug)]
pub struct SyncBackoff {
    current_secs: u64,
}

impl SyncBackoff {
    /// Creates the initial backoff state.
    pub fn new() -> Self {
        Self { current_secs: 1 }
    }

    /// Returns the current backoff interval in seconds.
    pub fn current_secs(&self) -> u64 {
        self.current_secs
    }

    /// Records a failure: returns the delay to wait now and doubles the
    /// stored interval, capped at [`MAX_SYNC_BACKOFF_SECS`].
    pub fn next_delay_after_failure(&mut self) -> u64 {
        let delay = self.current_secs;
        self.current_secs = (self.current_secs * 2).min(MAX_SYNC_BACKOFF_SECS);
        delay
    }

    /// Records a success.
    pub fn reset(&mut self) {
        self.current_secs = 1;
    }
}

impl Default for SyncBackoff {
    fn default() -> Self {
        Self::new()
    }
}

/// Background reconciliation loop with failure containment.
pub struct SyncSupervisor {
    backend: Arc<dyn NsxBackend>,
    store: Arc<dyn MappingStore>,
    orchestrator: Arc<dyn OrchestratorDb>,
    config: SyncConfig,
    backoff: SyncBackoff,
    state: SyncState,
}

impl SyncSupervisor {
    /// Creates a new supervisor.
    pub fn new(
        backend: Arc<dyn NsxBackend>,
        store: Arc<dyn MappingStore>,
        orchestrator: Arc<dyn OrchestratorDb>,
        config: SyncConfig,
    ) -> Self {
        Self {
            backend,
            store,
            orchestrator,
            config,
            backoff: SyncBackoff::new(),
            state: SyncState::Idle,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Returns the current backoff interval in seconds.
    pub fn backoff_secs(&self) -> u64 {
        self.backoff.current_secs()
    }

    /// Runs the supervisor forever. Never exits on error; failures only
    /// lengthen the retry cadence.
    pub async fn run(&mut self) {
        info!(
            "Reconciliation supervisor started (interval {}s)",
            self.config.sync_interval_secs
        );
        loop {
            let delay = self.synchronize().await;
            sleep(Duration::from_secs(delay)).await;
        }
    }

    /// Runs one reconciliation pass and returns the delay in seconds until
    /// the next attempt. Never returns an error.
    pub async fn synchronize(&mut self) -> u64 {
        self.state = SyncState::Syncing;
        match self.synchronize_state().await {
            Ok(()) => {
                self.backoff.reset();
                self.state = SyncState::Idle;
                self.config.sync_interval_secs
            }
            Err(e) => {
                let delay = self.backoff.next_delay_after_failure();
                error!(
                    error = %e,
                    "An error occurred while communicating with the NSX backend. \
                     Will retry synchronization in {} seconds",
                    delay
                );
                self.state = SyncState::BackoffWait;
                delay
            }
        }
    }

    /// One full diff of orchestrator state against the mapping store and
    /// backend, correcting drift in both directions.
    async fn synchronize_state(&self) -> SyncResult<()> {
        let networks = self.orchestrator.list_networks().await?;

        // Orchestrator networks without a backend switch
        for net in &networks {
            if self.store.switch_ids(&net.id).await?.is_empty() {
                warn!("Network {} has no backend switch, recreating", net.id);
                let transport_zones = vec![TransportZoneConfig {
                    zone_uuid: self.config.default_tz_uuid.clone(),
                    transport_type: self.config.default_transport_type.clone(),
                }];
                let switch_id = self
                    .backend
                    .create_lswitch(&net.id, &net.tenant_id, &net.name, &transport_zones, net.shared)
                    .await?;
                self.store.add_network_mapping(&net.id, &switch_id).await?;
            }
        }

        // Mapped networks the orchestrator no longer has
        let live_networks: HashSet<&str> = networks.iter().map(|n| n.id.as_str()).collect();
        for network_id in self.store.mapped_network_ids().await? {
            if live_networks.contains(network_id.as_str()) {
                continue;
            }
            let switch_ids = self.store.switch_ids(&network_id).await?;
            warn!(
                "Network {} is gone, deleting backend switches {:?}",
                network_id, switch_ids
            );
            match self.backend.delete_lswitches(&network_id, &switch_ids).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    debug!("Switches for network {} already absent", network_id);
                }
                Err(e) => return Err(e),
            }
            self.store.delete_network_mapping(&network_id).await?;
        }

        // Orphaned port mappings
        let live_ports: HashSet<String> = self
            .orchestrator
            .list_ports()
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();
        for port_id in self.store.mapped_port_ids().await? {
            if live_ports.contains(&port_id) {
                continue;
            }
            if let Some((switch_id, lport_id)) = self.store.switch_and_port_id(&port_id).await? {
                warn!("Port {} is gone, deleting lport {}", port_id, lport_id);
                match self.backend.delete_lport(&switch_id, &lport_id).await {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => {
                        debug!("lport for port {} already absent", port_id);
                    }
                    Err(e) => return Err(e),
                }
            }
            self.store.delete_port_mapping(&port_id).await?;
        }

        self.synchronize_routers();
        Ok(())
    }

    /// Router synchronization is disabled: router objects are not
    /// backend-managed in this deployment, and treating the backend as
    /// authoritative put every router into a spurious error state.
    fn synchronize_routers(&self) {}

    /// Individual router synchronization, likewise a no-op.
    pub fn synchronize_router(&self, _router_id: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{network, port, FakeBackend, FakeOrchestratorDb};
    use nsxsync_common::MemoryStore;

    fn supervisor(
        backend: Arc<FakeBackend>,
        store: Arc<MemoryStore>,
        orchestrator: Arc<FakeOrchestratorDb>,
    ) -> SyncSupervisor {
        let config = SyncConfig {
            default_tz_uuid: "tz-1".to_string(),
            sync_interval_secs: 30,
            ..SyncConfig::default()
        };
        SyncSupervisor::new(backend, store, orchestrator, config)
    }

    #[test]
    fn test_backoff_sequence_and_cap() {
        let mut backoff = SyncBackoff::new();
        let delays: Vec<u64> = (0..9).map(|_| backoff.next_delay_after_failure()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 64, 64, 64]);
    }

    #[test]
    fn test_backoff_reset_on_success() {
        let mut backoff = SyncBackoff::new();
        for _ in 0..5 {
            backoff.next_delay_after_failure();
        }
        backoff.reset();
        assert_eq!(backoff.next_delay_after_failure(), 1);
        assert_eq!(backoff.next_delay_after_failure(), 2);
    }

    #[tokio::test]
    async fn test_successful_pass_returns_interval() {
        let backend = Arc::new(FakeBackend::new());
        let store = Arc::new(MemoryStore::new());
        let orchestrator = Arc::new(FakeOrchestratorDb::new());
        let mut sup = supervisor(backend, store, orchestrator);

        let delay = sup.synchronize().await;
        assert_eq!(delay, 30);
        assert_eq!(sup.state(), SyncState::Idle);
        assert_eq!(sup.backoff_secs(), 1);
    }

    #[tokio::test]
    async fn test_failures_grow_backoff_then_success_resets() {
        let backend = Arc::new(FakeBackend::new());
        let store = Arc::new(MemoryStore::new());
        let orchestrator = Arc::new(FakeOrchestratorDb::new());
        orchestrator.set_fail(true);
        let mut sup = supervisor(backend, store, orchestrator.clone());

        assert_eq!(sup.synchronize().await, 1);
        assert_eq!(sup.state(), SyncState::BackoffWait);
        assert_eq!(sup.synchronize().await, 2);
        assert_eq!(sup.synchronize().await, 4);

        orchestrator.set_fail(false);
        assert_eq!(sup.synchronize().await, 30);
        assert_eq!(sup.state(), SyncState::Idle);

        orchestrator.set_fail(true);
        assert_eq!(sup.synchronize().await, 1);
    }

    #[tokio::test]
    async fn test_recreates_switch_for_unmapped_network() {
        let backend = Arc::new(FakeBackend::new());
        let store = Arc::new(MemoryStore::new());
        let orchestrator = Arc::new(FakeOrchestratorDb::new());
        orchestrator.set_networks(vec![network("net-1", "web")]);
        let mut sup = supervisor(backend.clone(), store.clone(), orchestrator);

        sup.synchronize().await;

        assert!(backend.called("create_lswitch net-1"));
        assert_eq!(store.switch_ids("net-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_deletes_switch_for_gone_network() {
        let backend = Arc::new(FakeBackend::new());
        let store = Arc::new(MemoryStore::new());
        store.add_network_mapping("net-old", "ls-9").await.unwrap();
        let orchestrator = Arc::new(FakeOrchestratorDb::new());
        let mut sup = supervisor(backend.clone(), store.clone(), orchestrator);

        sup.synchronize().await;

        assert!(backend.called("delete_lswitches net-old"));
        assert!(store.switch_ids("net-old").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deletes_orphaned_port_mapping() {
        let backend = Arc::new(FakeBackend::new());
        let store = Arc::new(MemoryStore::new());
        store
            .add_port_mapping("port-old", "ls-1", "lp-1")
            .await
            .unwrap();
        let orchestrator = Arc::new(FakeOrchestratorDb::new());
        orchestrator.set_ports(vec![port("port-live", "net-1", "")]);
        let mut sup = supervisor(backend.clone(), store.clone(), orchestrator);

        sup.synchronize().await;

        assert!(backend.called("delete_lport ls-1 lp-1"));
        assert_eq!(store.switch_and_port_id("port-old").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_consistent_state_is_untouched() {
        let backend = Arc::new(FakeBackend::new());
        let store = Arc::new(MemoryStore::new());
        store.add_network_mapping("net-1", "ls-1").await.unwrap();
        let orchestrator = Arc::new(FakeOrchestratorDb::new());
        orchestrator.set_networks(vec![network("net-1", "web")]);
        let mut sup = supervisor(backend.clone(), store, orchestrator);

        sup.synchronize().await;
        assert!(backend.calls().is_empty());
    }
}
