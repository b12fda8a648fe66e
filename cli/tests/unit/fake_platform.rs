//! In-memory platform used by the service tests.
//!
//! Behaves like a small Proxmox host: it refuses to delete a running VM, a
//! non-empty pool, or a zone that still has vnets, and it refuses to create a
//! vnet in a missing zone. Every mutation is appended to a call log so tests
//! can assert that a run made no changes.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::Mutex;

use labfleet_cli::application::ports::{
    CloneRequest, Credentials, PlatformGateway, ProgressReporter, Session,
};
use labfleet_cli::domain::{
    FleetSpec, GatewayError, GuestKind, InfraResource, NetworkName, NodeName, PowerAction,
    PowerState, ResourceRecord, ResourceRef, TemplateId, VmId, VmRecord,
};
use labfleet_cli::domain::resource::{NetworkRecord, PoolRecord, ZoneRecord};

pub const PASSWORD: &str = "secret";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeVm {
    pub node: String,
    pub name: String,
    pub pool: Option<String>,
    pub running: bool,
    pub paused: bool,
    pub template: bool,
    pub container: bool,
    pub bridge: Option<String>,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub pools: Vec<String>,
    pub zones: Vec<String>,
    /// vnet name → zone name
    pub vnets: BTreeMap<String, String>,
    pub vms: BTreeMap<u32, FakeVm>,
}

#[derive(Default)]
pub struct FakePlatform {
    pub state: Mutex<FakeState>,
    calls: Mutex<Vec<String>>,
    failing_calls: Mutex<Vec<String>>,
    failing_lookups: Mutex<Vec<String>>,
}

fn api_error(message: &str) -> GatewayError {
    GatewayError::Api {
        method: "POST".to_string(),
        path: "/fake".to_string(),
        status: 500,
        message: message.to_string(),
    }
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Platform holding the two lab templates used throughout the tests.
    pub fn with_lab_templates() -> Self {
        Self::new()
            .with_template(950, "kali")
            .with_template(951, "ubuntu")
    }

    pub fn with_template(self, id: u32, name: &str) -> Self {
        self.state.lock().unwrap().vms.insert(
            id,
            FakeVm {
                node: "pve".to_string(),
                name: name.to_string(),
                pool: None,
                running: false,
                paused: false,
                template: true,
                container: false,
                bridge: None,
            },
        );
        self
    }

    pub fn with_vm(self, id: u32, node: &str, pool: Option<&str>, running: bool) -> Self {
        self.state.lock().unwrap().vms.insert(
            id,
            FakeVm {
                node: node.to_string(),
                name: format!("vm-{id}"),
                pool: pool.map(str::to_string),
                running,
                paused: false,
                template: false,
                container: false,
                bridge: None,
            },
        );
        self
    }

    /// An LXC container occupying `id` on node pve.
    pub fn with_container(self, id: u32, pool: Option<&str>) -> Self {
        self.state.lock().unwrap().vms.insert(
            id,
            FakeVm {
                node: "pve".to_string(),
                name: format!("ct-{id}"),
                pool: pool.map(str::to_string),
                running: true,
                paused: false,
                template: false,
                container: true,
                bridge: None,
            },
        );
        self
    }

    pub fn with_pool(self, id: &str) -> Self {
        self.state.lock().unwrap().pools.push(id.to_string());
        self
    }

    pub fn with_zone(self, name: &str) -> Self {
        self.state.lock().unwrap().zones.push(name.to_string());
        self
    }

    pub fn with_vnet(self, name: &str, zone: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .vnets
            .insert(name.to_string(), zone.to_string());
        self
    }

    /// Make every mutation whose log entry starts with `prefix` fail.
    pub fn fail_calls(&self, prefix: &str) {
        self.failing_calls.lock().unwrap().push(prefix.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing_calls.lock().unwrap().clear();
        self.failing_lookups.lock().unwrap().clear();
    }

    /// Make lookups of `resource` fail as if the platform were unreachable.
    pub fn fail_lookup(&self, resource: &ResourceRef) {
        self.failing_lookups
            .lock()
            .unwrap()
            .push(resource.to_string());
    }

    /// Mutations performed so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    pub fn vm(&self, id: u32) -> Option<FakeVm> {
        self.state.lock().unwrap().vms.get(&id).cloned()
    }

    /// Suspend a running VM in place, as `qm suspend` would.
    pub fn pause(&self, id: u32) {
        let mut state = self.state.lock().unwrap();
        let vm = state.vms.get_mut(&id).unwrap();
        vm.running = false;
        vm.paused = true;
    }

    /// Move a VM's first NIC to another bridge behind the tool's back.
    pub fn set_bridge(&self, id: u32, bridge: Option<&str>) {
        self.state.lock().unwrap().vms.get_mut(&id).unwrap().bridge = bridge.map(str::to_string);
    }

    fn fails(&self, call: &str) -> bool {
        self.failing_calls
            .lock()
            .unwrap()
            .iter()
            .any(|p| call.starts_with(p.as_str()))
    }

    fn record(&self, call: String) -> Result<(), GatewayError> {
        if self.fails(&call) {
            return Err(api_error(&format!("injected failure: {call}")));
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl PlatformGateway for FakePlatform {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session, GatewayError> {
        if credentials.password != PASSWORD {
            return Err(GatewayError::Unauthorized {
                user: credentials.user.clone(),
            });
        }
        Ok(Session::new(
            credentials.user.clone(),
            "PVE:ticket".to_string(),
            "csrf".to_string(),
        ))
    }

    async fn lookup(
        &self,
        _session: &Session,
        resource: &ResourceRef,
    ) -> Result<Option<ResourceRecord>, GatewayError> {
        if self
            .failing_lookups
            .lock()
            .unwrap()
            .contains(&resource.to_string())
        {
            return Err(GatewayError::Unreachable("connection reset".to_string()));
        }
        let state = self.state.lock().unwrap();
        let record = match resource {
            ResourceRef::Pool { id } => state
                .pools
                .iter()
                .find(|p| p.as_str() == id.as_str())
                .map(|_| ResourceRecord::Pool(PoolRecord { id: id.clone() })),
            ResourceRef::Zone { name } => state
                .zones
                .iter()
                .find(|z| z.as_str() == name.as_str())
                .map(|_| {
                    ResourceRecord::Zone(ZoneRecord {
                        name: name.clone(),
                        zone_type: "simple".to_string(),
                    })
                }),
            ResourceRef::Network { name, .. } => state.vnets.get(name.as_str()).map(|zone| {
                ResourceRecord::Network(NetworkRecord {
                    name: name.clone(),
                    zone: zone.parse().unwrap(),
                })
            }),
            ResourceRef::Vm { id, .. } => state.vms.get(&id.get()).map(|vm| {
                ResourceRecord::Vm(VmRecord {
                    id: *id,
                    node: vm.node.parse().unwrap(),
                    name: Some(vm.name.clone()),
                    pool: vm.pool.as_ref().map(|p| p.parse().unwrap()),
                    power: if vm.running {
                        PowerState::Running
                    } else if vm.paused {
                        PowerState::Paused
                    } else {
                        PowerState::Stopped
                    },
                    template: vm.template,
                    kind: if vm.container {
                        GuestKind::Container
                    } else {
                        GuestKind::Qemu
                    },
                })
            }),
        };
        Ok(record)
    }

    async fn create(&self, _session: &Session, resource: &InfraResource) -> Result<(), GatewayError> {
        self.record(format!("create {}", resource.to_ref()))?;
        let mut state = self.state.lock().unwrap();
        match resource {
            InfraResource::Pool(id) => state.pools.push(id.to_string()),
            InfraResource::Zone(name) => state.zones.push(name.to_string()),
            InfraResource::Network { name, zone } => {
                if !state.zones.iter().any(|z| z.as_str() == zone.as_str()) {
                    return Err(api_error(&format!("zone '{zone}' does not exist")));
                }
                state.vnets.insert(name.to_string(), zone.to_string());
            }
        }
        Ok(())
    }

    async fn remove(&self, _session: &Session, resource: &ResourceRef) -> Result<(), GatewayError> {
        self.record(format!("remove {resource}"))?;
        let mut state = self.state.lock().unwrap();
        match resource {
            ResourceRef::Pool { id } => {
                if state
                    .vms
                    .values()
                    .any(|vm| vm.pool.as_deref() == Some(id.as_str()))
                {
                    return Err(api_error("pool is not empty"));
                }
                state.pools.retain(|p| p.as_str() != id.as_str());
            }
            ResourceRef::Zone { name } => {
                if state.vnets.values().any(|z| z.as_str() == name.as_str()) {
                    return Err(api_error("zone is still used by vnets"));
                }
                state.zones.retain(|z| z.as_str() != name.as_str());
            }
            ResourceRef::Network { name, .. } => {
                state.vnets.remove(name.as_str());
            }
            ResourceRef::Vm { id, .. } => {
                let Some(vm) = state.vms.get(&id.get()) else {
                    return Err(api_error("VM does not exist"));
                };
                if vm.running {
                    return Err(api_error("VM is running"));
                }
                state.vms.remove(&id.get());
            }
        }
        Ok(())
    }

    async fn clone_vm(&self, _session: &Session, request: &CloneRequest) -> Result<(), GatewayError> {
        let full = if request.full { " (full)" } else { "" };
        self.record(format!(
            "clone {} -> {}{full}",
            request.template, request.target
        ))?;
        let mut state = self.state.lock().unwrap();
        match state.vms.get(&request.template.get()) {
            Some(vm) if vm.template => {}
            _ => return Err(api_error("template does not exist")),
        }
        if state.vms.contains_key(&request.target.get()) {
            return Err(api_error("VM ID already in use"));
        }
        state.vms.insert(
            request.target.get(),
            FakeVm {
                node: request.node.to_string(),
                name: request.name.clone(),
                pool: Some(request.pool.to_string()),
                running: false,
                paused: false,
                template: false,
                container: false,
                bridge: None,
            },
        );
        Ok(())
    }

    async fn attach_network(
        &self,
        _session: &Session,
        _node: &NodeName,
        vm: VmId,
        network: &NetworkName,
    ) -> Result<(), GatewayError> {
        self.record(format!("attach VM {vm} to {network}"))?;
        let mut state = self.state.lock().unwrap();
        if !state.vnets.contains_key(network.as_str()) {
            return Err(api_error("no such vnet"));
        }
        let Some(entry) = state.vms.get_mut(&vm.get()) else {
            return Err(api_error("VM does not exist"));
        };
        entry.bridge = Some(network.to_string());
        Ok(())
    }

    async fn power(
        &self,
        _session: &Session,
        _node: &NodeName,
        vm: VmId,
        action: PowerAction,
    ) -> Result<(), GatewayError> {
        self.record(format!("{} VM {vm}", action.as_str()))?;
        let mut state = self.state.lock().unwrap();
        let Some(entry) = state.vms.get_mut(&vm.get()) else {
            return Err(api_error("VM does not exist"));
        };
        match action {
            PowerAction::Start if entry.running || entry.paused => {
                return Err(api_error("VM already running"));
            }
            PowerAction::Resume if !entry.paused => {
                return Err(api_error("VM is not paused"));
            }
            PowerAction::Start | PowerAction::Resume => entry.running = true,
            PowerAction::Stop => entry.running = false,
        }
        entry.paused = false;
        Ok(())
    }

    async fn template_name(
        &self,
        _session: &Session,
        _node: &NodeName,
        template: TemplateId,
    ) -> Result<Option<String>, GatewayError> {
        let state = self.state.lock().unwrap();
        match state.vms.get(&template.get()) {
            Some(vm) => Ok(Some(vm.name.clone()).filter(|n| !n.is_empty())),
            None => Err(api_error("template does not exist")),
        }
    }

    async fn vm_network(
        &self,
        _session: &Session,
        _node: &NodeName,
        vm: VmId,
    ) -> Result<Option<String>, GatewayError> {
        let read = format!("read network of VM {vm}");
        if self.fails(&read) {
            return Err(api_error(&format!("injected failure: {read}")));
        }
        let state = self.state.lock().unwrap();
        match state.vms.get(&vm.get()) {
            Some(entry) => Ok(entry.bridge.clone()),
            None => Err(api_error("VM does not exist")),
        }
    }
}

// ── Reporter ──────────────────────────────────────────────────────────────────

/// Progress reporter that records warnings and discards everything else.
#[derive(Default)]
pub struct RecordingReporter {
    pub warnings: Mutex<Vec<String>>,
}

impl ProgressReporter for RecordingReporter {
    fn step(&self, _message: &str) {}
    fn success(&self, _message: &str) {}
    fn warn(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }
}

// ── Fixtures ──────────────────────────────────────────────────────────────────

pub fn session() -> Session {
    Session::new(
        "root@pam".to_string(),
        "PVE:ticket".to_string(),
        "csrf".to_string(),
    )
}

pub fn vm_id(n: u32) -> VmId {
    VmId::new(n).unwrap()
}

/// The lab fleet: pool CS03, zone cszone, vnet csvnet03 on node pve.
pub fn fleet(starting_id: u32, templates: &[u32]) -> FleetSpec {
    FleetSpec {
        node: "pve".parse().unwrap(),
        pool: "CS03".parse().unwrap(),
        zone: "cszone".parse().unwrap(),
        network: "csvnet03".parse().unwrap(),
        templates: templates
            .iter()
            .map(|t| t.to_string().parse().unwrap())
            .collect(),
        starting_id: vm_id(starting_id),
    }
}

pub fn vm_ref(id: u32) -> ResourceRef {
    ResourceRef::Vm {
        id: vm_id(id),
        node: "pve".parse().unwrap(),
    }
}
