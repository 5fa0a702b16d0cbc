//! Shared test doubles for driver and supervisor tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use nsxsync_common::{
    LportRequest, NetworkData, NsxBackend, OrchestratorDb, PortData, SwitchStatus, SyncError,
    SyncResult, TransportZoneConfig,
};

/// Recording fake for the NSX backend.
///
/// Captures every call as a string; deletes and renames can be switched to
/// report `NotFound`, and all calls can be switched to fail outright.
pub struct FakeBackend {
    calls: Mutex<Vec<String>>,
    switches: Mutex<Vec<SwitchStatus>>,
    not_found: AtomicBool,
    fail_all: AtomicBool,
    next_id: AtomicU64,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            switches: Mutex::new(Vec::new()),
            not_found: AtomicBool::new(false),
            fail_all: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }

    /// Sets the switches returned by `get_switches`.
    pub fn set_switches(&self, switches: Vec<SwitchStatus>) {
        *self.switches.lock().unwrap() = switches;
    }

    /// Makes delete/rename operations report `NotFound`.
    pub fn set_not_found(&self, value: bool) {
        self.not_found.store(value, Ordering::SeqCst);
    }

    /// Makes every operation fail with a backend API error.
    pub fn set_fail_all(&self, value: bool) {
        self.fail_all.store(value, Ordering::SeqCst);
    }

    /// Returns all captured calls.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Returns true if a call starting with the given prefix was captured.
    pub fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }

    fn record(&self, call: String) -> SyncResult<()> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(SyncError::backend_api(call, "injected failure"));
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }

    fn fresh_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl NsxBackend for FakeBackend {
    async fn create_lswitch(
        &self,
        network_id: &str,
        _tenant_id: &str,
        name: &str,
        _transport_zones: &[TransportZoneConfig],
        _shared: bool,
    ) -> SyncResult<String> {
        self.record(format!("create_lswitch {} {}", network_id, name))?;
        Ok(self.fresh_id("ls"))
    }

    async fn rename_lswitch(&self, switch_id: &str, name: &str) -> SyncResult<()> {
        if self.not_found.load(Ordering::SeqCst) {
            return Err(SyncError::not_found(format!("lswitch {}", switch_id)));
        }
        self.record(format!("rename_lswitch {} {}", switch_id, name))
    }

    async fn delete_lswitches(&self, network_id: &str, switch_ids: &[String]) -> SyncResult<()> {
        if self.not_found.load(Ordering::SeqCst) {
            return Err(SyncError::not_found(format!("lswitches {:?}", switch_ids)));
        }
        self.record(format!("delete_lswitches {} {:?}", network_id, switch_ids))
    }

    async fn create_lport(&self, switch_id: &str, request: &LportRequest) -> SyncResult<String> {
        self.record(format!("create_lport {} {}", switch_id, request.port_id))?;
        Ok(self.fresh_id("lp"))
    }

    async fn update_lport(
        &self,
        switch_id: &str,
        lport_id: &str,
        request: &LportRequest,
    ) -> SyncResult<()> {
        if self.not_found.load(Ordering::SeqCst) {
            return Err(SyncError::not_found(format!("lport {}", lport_id)));
        }
        self.record(format!(
            "update_lport {} {} {}",
            switch_id, lport_id, request.port_id
        ))
    }

    async fn delete_lport(&self, switch_id: &str, lport_id: &str) -> SyncResult<()> {
        if self.not_found.load(Ordering::SeqCst) {
            return Err(SyncError::not_found(format!("lport {}", lport_id)));
        }
        self.record(format!("delete_lport {} {}", switch_id, lport_id))
    }

    async fn plug_vif(
        &self,
        switch_id: &str,
        lport_id: &str,
        attachment_kind: &str,
        device_id: &str,
    ) -> SyncResult<()> {
        self.record(format!(
            "plug_vif {} {} {} {}",
            switch_id, lport_id, attachment_kind, device_id
        ))
    }

    async fn get_switches(&self, network_id: &str) -> SyncResult<Vec<SwitchStatus>> {
        self.record(format!("get_switches {}", network_id))?;
        Ok(self.switches.lock().unwrap().clone())
    }

    async fn get_security_profile_id(&self, security_group_id: &str) -> SyncResult<String> {
        self.record(format!("get_security_profile_id {}", security_group_id))?;
        Ok(format!("sp-{}", security_group_id))
    }
}

/// In-memory orchestrator resource set with an injectable failure.
pub struct FakeOrchestratorDb {
    networks: Mutex<Vec<NetworkData>>,
    ports: Mutex<Vec<PortData>>,
    fail: AtomicBool,
}

impl FakeOrchestratorDb {
    pub fn new() -> Self {
        Self {
            networks: Mutex::new(Vec::new()),
            ports: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn set_networks(&self, networks: Vec<NetworkData>) {
        *self.networks.lock().unwrap() = networks;
    }

    pub fn set_ports(&self, ports: Vec<PortData>) {
        *self.ports.lock().unwrap() = ports;
    }

    /// Makes every listing fail, simulating a database outage.
    pub fn set_fail(&self, value: bool) {
        self.fail.store(value, Ordering::SeqCst);
    }
}

#[async_trait]
impl OrchestratorDb for FakeOrchestratorDb {
    async fn list_networks(&self) -> SyncResult<Vec<NetworkData>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SyncError::database("list_networks", "connection refused"));
        }
        Ok(self.networks.lock().unwrap().clone())
    }

    async fn list_ports(&self) -> SyncResult<Vec<PortData>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SyncError::database("list_ports", "connection refused"));
        }
        Ok(self.ports.lock().unwrap().clone())
    }
}

/// Builds a network fixture.
pub fn network(id: &str, name: &str) -> NetworkData {
    NetworkData {
        id: id.to_string(),
        tenant_id: "tenant-1".to_string(),
        name: name.to_string(),
        shared: false,
        admin_state_up: true,
    }
}

/// Builds a port fixture.
pub fn port(id: &str, network_id: &str, device_owner: &str) -> PortData {
    PortData {
        id: id.to_string(),
        network_id: network_id.to_string(),
        tenant_id: "tenant-1".to_string(),
        name: String::new(),
        device_id: if device_owner.is_empty() {
            String::new()
        } else {
            "device-1".to_string()
        },
        device_owner: device_owner.to_string(),
        admin_state_up: true,
        mac_address: "fa:16:3e:00:00:01".to_string(),
        fixed_ips: vec![],
        security_groups: vec![],
        port_security_enabled: true,
        allowed_address_pairs: vec![],
    }
}
