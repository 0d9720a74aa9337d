use std::time::Duration;

use async_trait::async_trait;
use nfvo_descriptor::{IpProfileParams, NsInstanceConfig, Vnfd};
use serde_json::Value;

/// Result type for conformance test operations.
pub type ConformanceResult<T> = Result<T, ConformanceError>;

/// Errors from conformance test operations.
#[derive(Debug, Clone)]
pub struct ConformanceError {
    pub message: String,
}

impl ConformanceError {
    pub fn new(message: impl Into<String>) -> Self {
        ConformanceError {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConformanceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}
impl std::error::Error for ConformanceError {}

/// An NSR as the suite observes it.
///
/// States are the snake_case operational states (`vl_init_phase`,
/// `running`, `terminate_rcvd`, ...).
#[derive(Debug, Clone)]
pub struct NsView {
    pub state: String,
    /// Every state entered, oldest first, starting with `init`.
    pub history: Vec<String>,
    pub events: Vec<EventView>,
}

impl NsView {
    pub fn event(&self, name: &str) -> Option<&EventView> {
        self.events.iter().find(|e| e.event == name)
    }
}

#[derive(Debug, Clone)]
pub struct EventView {
    pub event: String,
    pub details: Option<String>,
}

/// A VLR: state is one of `init`, `instantiation_pending`, `active`,
/// `terminate_pending`, `terminated`, `failed`.
#[derive(Debug, Clone)]
pub struct VlView {
    pub id: String,
    pub name: String,
    pub state: String,
}

/// A VNFR: state is one of `init`, `vl_init_phase`, `vm_init_phase`,
/// `ready`, `terminate`, `vl_terminate_phase`, `vdu_terminate_phase`,
/// `terminated`, `failed`.
#[derive(Debug, Clone)]
pub struct VnfView {
    pub id: String,
    pub name: String,
    pub member_vnf_index: u32,
    pub state: String,
    pub vdurs: Vec<VduView>,
}

/// A VDUR: state is one of `init`, `instantiating`,
/// `resource_alloc_pending`, `ready`, `terminating`, `terminated`,
/// `failed`.
#[derive(Debug, Clone)]
pub struct VduView {
    pub id: String,
    pub vdu_id: String,
    pub state: String,
    pub management_ip: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmEventKind {
    /// A VM create request reached the resource manager.
    Requested,
    /// The resource manager reported the VM active.
    Active,
}

/// One entry of the resource manager's VM log. `node` is the VDUR name,
/// which contains the VDU id.
#[derive(Debug, Clone)]
pub struct VmEvent {
    pub kind: VmEventKind,
    pub node: String,
}

/// Trait that any orchestrator must implement to run the conformance
/// suite. The harness owns the orchestrator and the simulated cloud
/// behind it; the `script_*` methods shape how that cloud answers.
#[async_trait]
pub trait TestableOrchestrator: Send + Sync {
    /// Register VNF descriptors in the catalog.
    async fn load_vnfds(&self, vnfds: &[Vnfd]) -> ConformanceResult<()>;

    /// Create an NSR from an instance config. Returns the NSR id.
    async fn create_ns(&self, config: &NsInstanceConfig) -> ConformanceResult<String>;

    /// Start instantiation in the background.
    async fn instantiate_ns(&self, nsr_id: &str) -> ConformanceResult<()>;

    /// Request termination. May return before the NSR is TERMINATED.
    async fn terminate_ns(&self, nsr_id: &str) -> ConformanceResult<()>;

    /// Forget the in-memory NSR as a crash would, then create and
    /// instantiate it again from `config` in restart mode.
    async fn restart_ns(&self, config: &NsInstanceConfig) -> ConformanceResult<()>;

    /// Add an instance to a scaling group of a running NS.
    async fn scale_out(&self, nsr_id: &str, group: &str) -> ConformanceResult<u32>;

    /// The NSR, including after it terminated.
    async fn ns(&self, nsr_id: &str) -> ConformanceResult<NsView>;

    async fn vls(&self, nsr_id: &str) -> ConformanceResult<Vec<VlView>>;

    /// Constituent and scaled VNFRs of an NSR.
    async fn vnfs(&self, nsr_id: &str) -> ConformanceResult<Vec<VnfView>>;

    /// VNFRs currently known to the orchestrator, across all NSRs.
    async fn registered_vnfr_count(&self) -> usize;

    /// Fill in an IP profile the way a VL would before its network is
    /// requested. The answer carries `ip_version`, `subnet_address`,
    /// `gateway_address`, `dns_server`, `dhcp_enabled`,
    /// `dhcp_start_address`, `dhcp_count` and `dhcp_end_address`.
    async fn resolve_ip_profile(&self, params: &IpProfileParams) -> ConformanceResult<Value>;

    /// Every VM created for `vdu_id` fails with `reason`.
    fn script_vdu_failure(&self, vdu_id: &str, reason: &str);

    /// VMs for `vdu_id` are answered pending and turn active after `delay`.
    fn script_vdu_delay(&self, vdu_id: &str, delay: Duration);

    /// Networks for the VLD named `vld_name` stay pending forever.
    fn script_vl_hold(&self, vld_name: &str);

    /// The resource manager's VM log, in order.
    fn vm_events(&self) -> Vec<VmEvent>;

    /// Distinct VM create requests seen so far.
    fn vm_create_count(&self) -> usize;

    /// Network create requests seen so far.
    fn network_create_count(&self) -> usize;

    /// VLR ids whose network was released.
    fn released_networks(&self) -> Vec<String>;
}
