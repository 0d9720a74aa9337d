//! In-process stand-ins for the collaborators.
//!
//! [`SimCloud`] bundles a simulated resource manager, network provider,
//! VNFFG manager, config agent and external resource orchestrator around
//! one in-memory store. Every simulator answers immediately by default;
//! failures and pending allocations are scripted per VDU or VLD name.
//! Pending answers with a delay are completed the way the real systems
//! do it, by writing to the record store.
//!
//! Used by the unit tests, the conformance harnesses and `nfvo run`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use nfvo_descriptor::ScalingTrigger;
use nfvo_store::{read_as, to_record, InMemoryStore, RecordStore};
use serde_json::{json, Value};
use slog::Logger;

use crate::collaborator::{
    Collaborators, ConfigAgent, NetworkProvider, NetworkRequest, NetworkResponse, NetworkStatus,
    ResourceManager, ResourceState, RspStatus, ScalingHookRequest, VmInfo, VmInterface,
    VmRequest, VnffgManager, VnffgRequest,
};
use crate::config::{OrchestratorConfig, RoAccount, RoKind, Timeouts};
use crate::context::OrchestratorContext;
use crate::error::{OrchestratorError, RoClientError};
use crate::lock;
use crate::paths;
use crate::plugin::{RoClient, RoConnector};
use crate::vlr::VlrRecord;

/// Name of the RO account configured by [`SimCloud::test_context`].
pub const SIM_RO_ACCOUNT: &str = "sim-ro";

#[derive(Debug, Clone)]
enum Script {
    Fail(String),
    Pending(Option<Duration>),
}

// ── Resource manager ────────────────────────────────────────────────

#[derive(Default)]
struct ResourcesInner {
    vms: HashMap<String, VmInfo>,
    scripts: HashMap<String, Script>,
    created: Vec<String>,
    deleted: Vec<String>,
    history: Vec<String>,
}

/// VMs keyed by request id. Scripts match on the VDU id.
pub struct SimResources {
    store: Arc<InMemoryStore>,
    next: AtomicU32,
    inner: Arc<Mutex<ResourcesInner>>,
}

impl SimResources {
    fn new(store: Arc<InMemoryStore>) -> Self {
        SimResources {
            store,
            next: AtomicU32::new(1),
            inner: Arc::new(Mutex::new(ResourcesInner::default())),
        }
    }

    /// Answer `failed` for every VM of VDU `vdu_id`.
    pub fn fail_vdu(&self, vdu_id: &str, reason: &str) {
        lock(&self.inner)
            .scripts
            .insert(vdu_id.to_string(), Script::Fail(reason.to_string()));
    }

    /// Answer `pending` for VDU `vdu_id`. With a delay the VM turns active
    /// afterwards through a `resource-mgmt/vdu-event` record.
    pub fn pending_vdu(&self, vdu_id: &str, activate_after: Option<Duration>) {
        lock(&self.inner)
            .scripts
            .insert(vdu_id.to_string(), Script::Pending(activate_after));
    }

    /// Request ids of every VM created, in order.
    pub fn created(&self) -> Vec<String> {
        lock(&self.inner).created.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        lock(&self.inner).deleted.clone()
    }

    /// `create:<node id>` and `active:<node id>` entries, in order.
    pub fn history(&self) -> Vec<String> {
        lock(&self.inner).history.clone()
    }

    fn active_vm(&self, request: &VmRequest) -> VmInfo {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        let connection_points = request
            .connection_points
            .iter()
            .enumerate()
            .map(|(i, cp)| VmInterface {
                name: cp.name.clone(),
                virtual_link_id: Some(cp.virtual_link_id.clone()),
                ip_address: Some(
                    cp.static_ip_address
                        .clone()
                        .unwrap_or_else(|| format!("10.{}.{}.{}", 100 + i, n / 250, n % 250 + 2)),
                ),
                mac_address: Some(format!("fa:16:3e:00:{:02x}:{:02x}", n % 256, i)),
                connection_point_id: Some(format!("port-{}-{}", n, i)),
            })
            .collect();
        VmInfo {
            request_id: request.request_id.clone(),
            resource_state: ResourceState::Active,
            vm_id: Some(format!("vm-{}", n)),
            management_ip: Some(format!("192.168.{}.{}", n / 250, n % 250 + 2)),
            public_ip: None,
            connection_points,
            console_url: Some(format!("http://console.sim/vm-{}", n)),
            detail: None,
        }
    }

    /// Flip a pending VM to active after `delay` and announce it.
    fn activate_later(&self, vm: VmInfo, node_id: String, delay: Duration) {
        let inner = self.inner.clone();
        let store = self.store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut inner = lock(&inner);
                if !inner.vms.contains_key(&vm.request_id) {
                    return;
                }
                inner.vms.insert(vm.request_id.clone(), vm.clone());
                inner.history.push(format!("active:{}", node_id));
            }
            let path = paths::vdu_event(&vm.request_id);
            if let Ok(record) = to_record(&path, &vm) {
                let _ = store.update(&path, record).await;
            }
        });
    }
}

#[async_trait]
impl ResourceManager for SimResources {
    async fn create_vm(&self, request: VmRequest) -> Result<VmInfo, OrchestratorError> {
        if let Some(existing) = lock(&self.inner).vms.get(&request.request_id) {
            return Ok(existing.clone());
        }
        let active = self.active_vm(&request);
        let mut inner = lock(&self.inner);
        inner.created.push(request.request_id.clone());
        inner.history.push(format!("create:{}", request.node_id));
        let reply = match inner.scripts.get(&request.vdu_id_ref).cloned() {
            Some(Script::Fail(reason)) => VmInfo {
                resource_state: ResourceState::Failed,
                management_ip: None,
                connection_points: Vec::new(),
                console_url: None,
                detail: Some(reason),
                ..active
            },
            Some(Script::Pending(after)) => {
                if let Some(delay) = after {
                    self.activate_later(active.clone(), request.node_id.clone(), delay);
                }
                VmInfo {
                    resource_state: ResourceState::Pending,
                    management_ip: None,
                    console_url: None,
                    ..active
                }
            }
            None => {
                inner.history.push(format!("active:{}", request.node_id));
                active
            }
        };
        inner.vms.insert(request.request_id.clone(), reply.clone());
        Ok(reply)
    }

    async fn read_vm(&self, request_id: &str) -> Result<Option<VmInfo>, OrchestratorError> {
        Ok(lock(&self.inner).vms.get(request_id).cloned())
    }

    async fn delete_vm(&self, request_id: &str) -> Result<(), OrchestratorError> {
        let mut inner = lock(&self.inner);
        inner.vms.remove(request_id);
        inner.deleted.push(request_id.to_string());
        Ok(())
    }

    async fn console_url(&self, request_id: &str) -> Result<Option<String>, OrchestratorError> {
        Ok(lock(&self.inner)
            .vms
            .get(request_id)
            .filter(|vm| vm.resource_state == ResourceState::Active)
            .and_then(|vm| vm.console_url.clone()))
    }
}

// ── Network provider ────────────────────────────────────────────────

#[derive(Default)]
struct NetworksInner {
    scripts: HashMap<String, Script>,
    empty: HashSet<String>,
    created: Vec<NetworkRequest>,
    deleted: Vec<String>,
}

/// Networks keyed by VLR id. Scripts match on the VLD name.
pub struct SimNetworks {
    store: Arc<InMemoryStore>,
    next: AtomicU32,
    inner: Mutex<NetworksInner>,
}

impl SimNetworks {
    fn new(store: Arc<InMemoryStore>) -> Self {
        SimNetworks {
            store,
            next: AtomicU32::new(1),
            inner: Mutex::new(NetworksInner::default()),
        }
    }

    pub fn fail_vld(&self, vld_name: &str, reason: &str) {
        lock(&self.inner)
            .scripts
            .insert(vld_name.to_string(), Script::Fail(reason.to_string()));
    }

    /// Answer with no body for VLD `vld_name`.
    pub fn empty_response(&self, vld_name: &str) {
        lock(&self.inner).empty.insert(vld_name.to_string());
    }

    /// Answer `vl_alloc_pending` for VLD `vld_name`. With a delay the
    /// `vlr-catalog` record is moved to `running` afterwards.
    pub fn pending_vld(&self, vld_name: &str, complete_after: Option<Duration>) {
        lock(&self.inner)
            .scripts
            .insert(vld_name.to_string(), Script::Pending(complete_after));
    }

    pub fn created(&self) -> Vec<NetworkRequest> {
        lock(&self.inner).created.clone()
    }

    /// VLR ids of every network deleted, in order.
    pub fn deleted(&self) -> Vec<String> {
        lock(&self.inner).deleted.clone()
    }

    fn complete_later(&self, vlr_id: String, network_id: String, subnet: String, delay: Duration) {
        let store = self.store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let path = paths::vlr(&vlr_id);
            let Ok(Some(mut record)) = read_as::<VlrRecord>(store.as_ref(), &path).await else {
                return;
            };
            record.operational_status = "running".to_string();
            record.network_id = Some(network_id);
            record.assigned_subnet = Some(subnet);
            if let Ok(value) = to_record(&path, &record) {
                let _ = store.update(&path, value).await;
            }
        });
    }
}

#[async_trait]
impl NetworkProvider for SimNetworks {
    async fn create_network(
        &self,
        request: NetworkRequest,
    ) -> Result<Option<NetworkResponse>, OrchestratorError> {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        let network_id = format!("net-{}", n);
        let subnet = format!("10.{}.{}.0/24", n / 256, n % 256);
        let mut inner = lock(&self.inner);
        inner.created.push(request.clone());
        if inner.empty.contains(&request.vld_name) {
            return Ok(None);
        }
        let response = match inner.scripts.get(&request.vld_name).cloned() {
            Some(Script::Fail(reason)) => NetworkResponse {
                status: NetworkStatus::Failed,
                network_id: None,
                assigned_subnet: None,
                details: Some(reason),
            },
            Some(Script::Pending(after)) => {
                if let Some(delay) = after {
                    self.complete_later(request.vlr_id.clone(), network_id, subnet, delay);
                }
                NetworkResponse {
                    status: NetworkStatus::VlAllocPending,
                    network_id: None,
                    assigned_subnet: None,
                    details: None,
                }
            }
            None => NetworkResponse {
                status: NetworkStatus::Running,
                network_id: Some(network_id),
                assigned_subnet: Some(subnet),
                details: None,
            },
        };
        Ok(Some(response))
    }

    async fn delete_network(
        &self,
        vlr_id: &str,
        _network_id: Option<&str>,
    ) -> Result<(), OrchestratorError> {
        lock(&self.inner).deleted.push(vlr_id.to_string());
        Ok(())
    }
}

// ── VNFFG manager ───────────────────────────────────────────────────

#[derive(Default)]
struct VnffgInner {
    failure: Option<String>,
    next_path_id: u32,
    requests: Vec<VnffgRequest>,
    terminated: Vec<String>,
}

/// Accepts every chain and numbers its paths from 1.
#[derive(Default)]
pub struct SimVnffg {
    inner: Mutex<VnffgInner>,
}

impl SimVnffg {
    /// Refuse every create with `message`.
    pub fn fail_create(&self, message: &str) {
        lock(&self.inner).failure = Some(message.to_string());
    }

    pub fn requests(&self) -> Vec<VnffgRequest> {
        lock(&self.inner).requests.clone()
    }

    pub fn terminated(&self) -> Vec<String> {
        lock(&self.inner).terminated.clone()
    }
}

#[async_trait]
impl VnffgManager for SimVnffg {
    async fn create_vnffg(&self, request: VnffgRequest) -> Result<Vec<RspStatus>, OrchestratorError> {
        let mut inner = lock(&self.inner);
        if let Some(message) = &inner.failure {
            return Err(OrchestratorError::Resource {
                message: message.clone(),
            });
        }
        let mut statuses = Vec::new();
        for rsp in &request.rsps {
            inner.next_path_id += 1;
            statuses.push(RspStatus {
                name: rsp.name.clone(),
                path_id: Some(inner.next_path_id),
                state: ResourceState::Active,
            });
        }
        inner.requests.push(request);
        Ok(statuses)
    }

    async fn terminate_vnffg(&self, vnffgr_id: &str) -> Result<(), OrchestratorError> {
        lock(&self.inner).terminated.push(vnffgr_id.to_string());
        Ok(())
    }
}

// ── Config agent ────────────────────────────────────────────────────

#[derive(Default)]
struct AgentInner {
    failing: HashSet<&'static str>,
    runs: Vec<ScalingHookRequest>,
}

/// Records every hook run; hooks succeed unless their trigger is failed.
#[derive(Default)]
pub struct SimConfigAgent {
    inner: Mutex<AgentInner>,
}

impl SimConfigAgent {
    pub fn fail_trigger(&self, trigger: ScalingTrigger) {
        lock(&self.inner).failing.insert(trigger.as_str());
    }

    pub fn runs(&self) -> Vec<ScalingHookRequest> {
        lock(&self.inner).runs.clone()
    }

    /// `<group>/<instance>/<trigger>` for every run, in order.
    pub fn history(&self) -> Vec<String> {
        lock(&self.inner)
            .runs
            .iter()
            .map(|r| format!("{}/{}/{}", r.scaling_group, r.instance_id, r.trigger.as_str()))
            .collect()
    }
}

#[async_trait]
impl ConfigAgent for SimConfigAgent {
    async fn run_scaling_hook(
        &self,
        request: &ScalingHookRequest,
        _timeout: Duration,
    ) -> Result<bool, OrchestratorError> {
        let mut inner = lock(&self.inner);
        inner.runs.push(request.clone());
        Ok(!inner.failing.contains(request.trigger.as_str()))
    }
}

// ── External resource orchestrator ──────────────────────────────────

struct RoInstance {
    name: String,
    vnfs: Vec<String>,
    nets: usize,
    /// Polls still answered with `BUILD`.
    building: u32,
}

#[derive(Default)]
struct RoInner {
    next: u32,
    instances: BTreeMap<String, RoInstance>,
    failing: HashMap<String, String>,
    build_polls: u32,
    created: Vec<Value>,
    deleted: Vec<String>,
}

/// An RO that deploys instances instantly. VNFs are reported under the
/// names the scenario used (`<vnfd name>.<member index>`).
#[derive(Default)]
pub struct SimRo {
    inner: Mutex<RoInner>,
}

impl SimRo {
    /// Report every VM of VNF `vnf_name` as `ERROR` with `message`.
    pub fn fail_vnf(&self, vnf_name: &str, message: &str) {
        lock(&self.inner)
            .failing
            .insert(vnf_name.to_string(), message.to_string());
    }

    /// Answer the first `polls` status reads of each new instance with
    /// VMs still building.
    pub fn build_polls(&self, polls: u32) {
        lock(&self.inner).build_polls = polls;
    }

    /// Scenarios passed to `create_instance`, in order.
    pub fn created(&self) -> Vec<Value> {
        lock(&self.inner).created.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        lock(&self.inner).deleted.clone()
    }

    pub fn instance_names(&self) -> Vec<String> {
        lock(&self.inner)
            .instances
            .values()
            .map(|i| i.name.clone())
            .collect()
    }
}

#[async_trait]
impl RoClient for SimRo {
    async fn list_instances(&self) -> Result<HashMap<String, String>, RoClientError> {
        Ok(lock(&self.inner)
            .instances
            .iter()
            .map(|(uuid, i)| (i.name.clone(), uuid.clone()))
            .collect())
    }

    async fn create_instance(&self, scenario: Value) -> Result<String, RoClientError> {
        let mut inner = lock(&self.inner);
        inner.next += 1;
        let uuid = format!("ro-instance-{}", inner.next);
        let name = scenario
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let vnfs = scenario
            .get("vnfs")
            .and_then(Value::as_object)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        let nets = scenario
            .get("networks")
            .and_then(Value::as_object)
            .map_or(0, |m| m.len());
        let building = inner.build_polls;
        inner.instances.insert(
            uuid.clone(),
            RoInstance {
                name,
                vnfs,
                nets,
                building,
            },
        );
        inner.created.push(scenario);
        Ok(uuid)
    }

    async fn get_instance(&self, uuid: &str) -> Result<Value, RoClientError> {
        let mut inner = lock(&self.inner);
        let failing = inner.failing.clone();
        let instance = inner
            .instances
            .get_mut(uuid)
            .ok_or_else(|| RoClientError::UnknownInstance {
                uuid: uuid.to_string(),
            })?;
        let building = instance.building > 0;
        instance.building = instance.building.saturating_sub(1);

        let vnfs: Vec<Value> = instance
            .vnfs
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let (status, error) = match failing.get(name) {
                    Some(msg) => ("ERROR_ON_CREATE", Some(msg.clone())),
                    None if building => ("BUILD", None),
                    None => ("ACTIVE", None),
                };
                json!({
                    "vnf_name": name,
                    "ip_address": format!("172.16.{}.{}", i / 250, i % 250 + 10),
                    "vms": [{
                        "uuid": format!("{}-vm-{}", uuid, i),
                        "name": format!("{}-vm", name),
                        "status": status,
                        "error_msg": error,
                        "vim_vm_id": format!("vim-{}-{}", uuid, i),
                        "interfaces": []
                    }]
                })
            })
            .collect();
        let net_status = if building { "BUILD" } else { "ACTIVE" };
        let nets: Vec<Value> = (0..instance.nets)
            .map(|_| json!({ "status": net_status }))
            .collect();
        Ok(json!({ "vnfs": vnfs, "nets": nets }))
    }

    async fn delete_instance(&self, uuid: &str) -> Result<(), RoClientError> {
        let mut inner = lock(&self.inner);
        if inner.instances.remove(uuid).is_none() {
            return Err(RoClientError::UnknownInstance {
                uuid: uuid.to_string(),
            });
        }
        inner.deleted.push(uuid.to_string());
        Ok(())
    }
}

/// Hands out the shared [`SimRo`] for every account.
pub struct SimRoConnector {
    client: Arc<SimRo>,
}

impl RoConnector for SimRoConnector {
    fn connect(&self, _account: &RoAccount) -> Result<Arc<dyn RoClient>, OrchestratorError> {
        Ok(self.client.clone())
    }
}

// ── The cloud ───────────────────────────────────────────────────────

pub struct SimCloud {
    pub store: Arc<InMemoryStore>,
    pub resources: Arc<SimResources>,
    pub networks: Arc<SimNetworks>,
    pub vnffg: Arc<SimVnffg>,
    pub config_agent: Arc<SimConfigAgent>,
    pub ro: Arc<SimRo>,
    key_dir: PathBuf,
}

impl Default for SimCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl SimCloud {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        SimCloud {
            resources: Arc::new(SimResources::new(store.clone())),
            networks: Arc::new(SimNetworks::new(store.clone())),
            vnffg: Arc::new(SimVnffg::default()),
            config_agent: Arc::new(SimConfigAgent::default()),
            ro: Arc::new(SimRo::default()),
            key_dir: std::env::temp_dir()
                .join("nfvo-sim")
                .join(uuid::Uuid::new_v4().to_string()),
            store,
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            resources: self.resources.clone(),
            networks: self.networks.clone(),
            vnffg: self.vnffg.clone(),
            config_agent: self.config_agent.clone(),
            ro: Arc::new(SimRoConnector {
                client: self.ro.clone(),
            }),
        }
    }

    /// A context over this cloud's store and simulators.
    pub fn context(&self, config: OrchestratorConfig, log: Logger) -> Arc<OrchestratorContext> {
        OrchestratorContext::new(self.store.clone(), config, log, self.collaborators())
    }

    /// Per-cloud key directory, removed when the cloud is dropped.
    pub fn key_dir(&self) -> &std::path::Path {
        &self.key_dir
    }

    /// Millisecond polls and second-scale bounds, an account named
    /// [`SIM_RO_ACCOUNT`], and a discarding logger.
    pub fn test_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            project: "test".to_string(),
            key_dir: self.key_dir.clone(),
            timeouts: Timeouts {
                vnf_batch_secs: 5,
                vnffg_settle_secs: 0,
                vnffg_poll_ms: 10,
                dependency_poll_ms: 5,
                dependency_secs: 5,
                vl_ready_secs: 5,
                external_ro_poll_ms: 10,
                external_ro_instance_secs: 5,
                external_ro_terminate_secs: 2,
                scale_hook_secs: 5,
            },
            ro_account: vec![RoAccount {
                name: SIM_RO_ACCOUNT.to_string(),
                kind: RoKind::Openmano,
                url: "http://ro.sim".to_string(),
                tenant: "sim".to_string(),
            }],
            ..OrchestratorConfig::default()
        }
    }

    pub fn test_context(&self) -> Arc<OrchestratorContext> {
        self.context(self.test_config(), crate::logging::discard())
    }
}

impl Drop for SimCloud {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.key_dir);
    }
}
