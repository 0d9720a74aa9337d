//! Network service records.
//!
//! The NSR is the top-level coordinator. It owns the NS-level VLRs, the
//! constituent and scaled VNFRs, the VNFFGRs and the scaling groups, and
//! folds their states into one operational status published at
//! `ns-instance-opdata/<id>`.
//!
//! Instantiation runs as a pipeline of phases (see [`Nsr::instantiate`]).
//! Every phase boundary is a checkpoint: a terminate request that arrives
//! mid-pipeline is latched and honoured at the next checkpoint by running
//! the termination pipeline instead of the next phase.

mod instantiate;
mod scale;
mod terminate;
mod update;

#[cfg(test)]
mod tests;

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};

use nfvo_descriptor::{
    apply_input_parameters, validate_nsd, IpProfileParams, NsInstanceConfig, Nsd, Vld, Vnfd,
};
use nfvo_store::{to_record, StoreError};
use serde::{Deserialize, Serialize};
use slog::{debug, info, o, warn, Logger};

use crate::cloud_init::CloudConfigAccess;
use crate::context::OrchestratorContext;
use crate::error::OrchestratorError;
use crate::events::{unix_now, EventLog, NsEvent};
use crate::lock;
use crate::paths;
use crate::plugin::{self, OrchestrationPlugin, PluginKind};
use crate::scaling::{ScalingGroup, ScalingGroupRecord};
use crate::ssh::NsKeyPair;
use crate::tasks::TaskSet;
use crate::vlr::{Vlr, VlrState};
use crate::vnffgr::{Vnffgr, VnffgrRecord};
use crate::vnfr::{Vnfr, VnfrState};

/// Datacenter used when neither the NS config nor a mapping names one.
pub const DEFAULT_DATACENTER: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NsrState {
    Init,
    VlInitPhase,
    VnfInitPhase,
    VnffgInitPhase,
    Running,
    ScalingOut,
    ScalingIn,
    Terminate,
    TerminateRcvd,
    VlTerminatePhase,
    VnfTerminatePhase,
    VnffgTerminatePhase,
    Terminated,
    Failed,
    VlInstantiate,
    VlTerminate,
}

impl NsrState {
    pub fn as_str(self) -> &'static str {
        match self {
            NsrState::Init => "init",
            NsrState::VlInitPhase => "vl_init_phase",
            NsrState::VnfInitPhase => "vnf_init_phase",
            NsrState::VnffgInitPhase => "vnffg_init_phase",
            NsrState::Running => "running",
            NsrState::ScalingOut => "scaling_out",
            NsrState::ScalingIn => "scaling_in",
            NsrState::Terminate => "terminate",
            NsrState::TerminateRcvd => "terminate_rcvd",
            NsrState::VlTerminatePhase => "vl_terminate_phase",
            NsrState::VnfTerminatePhase => "vnf_terminate_phase",
            NsrState::VnffgTerminatePhase => "vnffg_terminate_phase",
            NsrState::Terminated => "terminated",
            NsrState::Failed => "failed",
            NsrState::VlInstantiate => "vl_instantiate",
            NsrState::VlTerminate => "vl_terminate",
        }
    }

    /// On the termination path. `VlTerminate` is not: it is a dynamic VL
    /// removal on a running NS.
    pub fn is_terminating(self) -> bool {
        matches!(
            self,
            NsrState::Terminate
                | NsrState::TerminateRcvd
                | NsrState::VlTerminatePhase
                | NsrState::VnfTerminatePhase
                | NsrState::VnffgTerminatePhase
                | NsrState::Terminated
        )
    }
}

impl std::fmt::Display for NsrState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigStatus {
    Configuring,
    Configured,
    Failed,
}

/// Network and VM counts for `orchestration_progress`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub networks_total: u32,
    pub networks_active: u32,
    pub vms_total: u32,
    pub vms_active: u32,
}

// ── Published record ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressCount {
    pub total: u32,
    pub active: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrationProgress {
    pub networks: ProgressCount,
    pub vms: ProgressCount,
}

impl From<Progress> for OrchestrationProgress {
    fn from(p: Progress) -> Self {
        OrchestrationProgress {
            networks: ProgressCount {
                total: p.networks_total,
                active: p.networks_active,
            },
            vms: ProgressCount {
                total: p.vms_total,
                active: p.vms_active,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NsrVlrRef {
    pub vlr_ref: String,
    pub vld_ref: String,
    pub datacenter: String,
    pub operational_status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstituentVnfrRef {
    pub vnfr_id: String,
    pub member_vnf_index_ref: u32,
    pub datacenter: String,
}

/// The `ns-instance-opdata/<id>` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NsrOpdata {
    pub ns_instance_config_ref: String,
    pub name_ref: String,
    pub nsd_ref: String,
    pub nsd_name_ref: String,
    pub operational_status: NsrState,
    pub config_status: ConfigStatus,
    pub resource_orchestrator: PluginKind,
    pub operational_events: Vec<NsEvent>,
    pub create_time: i64,
    pub uptime: i64,
    pub orchestration_progress: OrchestrationProgress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key_generated: Option<NsKeyPair>,
    #[serde(default)]
    pub service_primitive: Vec<String>,
    #[serde(default)]
    pub vlr: Vec<NsrVlrRef>,
    #[serde(default)]
    pub constituent_vnfr_ref: Vec<ConstituentVnfrRef>,
    #[serde(default)]
    pub vnffgr: Vec<VnffgrRecord>,
    #[serde(default)]
    pub scaling_group_record: Vec<ScalingGroupRecord>,
}

// ── Record ──────────────────────────────────────────────────────────

struct NsrInner {
    state: NsrState,
    history: Vec<NsrState>,
    config_status: ConfigStatus,
    events: EventLog,
    /// Sticky once set; the pipeline consumes it at its next checkpoint.
    terminate_requested: bool,
    termination_started: bool,
    /// The instantiation pipeline is between its first and last phase.
    instantiating: bool,
    phases_started: bool,
    /// RUNNING was reached at least once.
    was_active: bool,
    vl_phase_done: bool,
    vnf_phase_done: bool,
    vlrs: Vec<Arc<Vlr>>,
    vnfrs: Vec<Arc<Vnfr>>,
    vnffgrs: Vec<Arc<Vnffgr>>,
    scaling_groups: Vec<ScalingGroup>,
    key_pair: Option<NsKeyPair>,
    ro_progress: Option<Progress>,
}

impl NsrInner {
    /// Move to `next`. Once on the termination path only termination
    /// states are accepted.
    fn enter(&mut self, next: NsrState) -> bool {
        if self.state == next || (self.state.is_terminating() && !next.is_terminating()) {
            return false;
        }
        self.state = next;
        self.history.push(next);
        true
    }

    fn group(&self, name: &str) -> Option<&ScalingGroup> {
        self.scaling_groups.iter().find(|g| g.name() == name)
    }

    fn group_mut(&mut self, name: &str) -> Option<&mut ScalingGroup> {
        self.scaling_groups.iter_mut().find(|g| g.name() == name)
    }

    fn all_vnfrs(&self) -> Vec<Arc<Vnfr>> {
        let mut all = self.vnfrs.clone();
        for group in &self.scaling_groups {
            all.extend(group.vnfrs());
        }
        all
    }
}

pub struct Nsr {
    id: String,
    name: String,
    config: NsInstanceConfig,
    nsd: Arc<Nsd>,
    ctx: Arc<OrchestratorContext>,
    plugin: Arc<dyn OrchestrationPlugin>,
    log: Logger,
    tasks: TaskSet,
    me: Weak<Nsr>,
    restart_mode: bool,
    create_time: i64,
    /// Serializes state recomputation.
    gate: tokio::sync::Mutex<()>,
    inner: Mutex<NsrInner>,
}

impl Nsr {
    /// Resolve and patch the NSD, pick the plugin, register and publish
    /// the record in INIT.
    ///
    /// Configuration errors (no NSD, a constituent VNFD missing from the
    /// catalog, a bad input parameter, an unknown RO account) are returned
    /// before anything is registered or written.
    pub async fn create(
        ctx: &Arc<OrchestratorContext>,
        config: NsInstanceConfig,
        restart_mode: bool,
    ) -> Result<Arc<Nsr>, OrchestratorError> {
        if ctx.get_nsr(&config.id).is_some() {
            return Err(OrchestratorError::internal(format!(
                "nsr {} already exists",
                config.id
            )));
        }

        let mut nsd = match (&config.nsd, &config.nsd_ref) {
            (Some(nsd), _) => nsd.clone(),
            (None, Some(nsd_ref)) => ctx
                .catalog()
                .get_nsd(nsd_ref)
                .map(|n| n.as_ref().clone())
                .ok_or_else(|| OrchestratorError::config(format!("nsd {} not found", nsd_ref)))?,
            (None, None) => {
                return Err(OrchestratorError::config(format!(
                    "ns instance {} names no nsd",
                    config.id
                )))
            }
        };
        let outcome = apply_input_parameters(&mut nsd, &config.input_parameter)?;
        for skipped in &outcome.skipped {
            warn!(ctx.log(), "ns input parameter not allowed"; "nsd" => &nsd.id, "xpath" => %skipped);
        }
        let vnfds: Vec<Vnfd> = ctx
            .catalog()
            .vnfds()
            .iter()
            .map(|v| v.as_ref().clone())
            .collect();
        validate_nsd(&nsd, &vnfds)?;

        let plugin = plugin::select(ctx, &config)?;
        let scaling_groups = nsd
            .scaling_group_descriptor
            .iter()
            .cloned()
            .map(ScalingGroup::new)
            .collect();
        let log = ctx.log().new(o!(
            "nsr_id" => config.id.clone(),
            "nsr" => config.name.clone(),
        ));

        let nsr = Arc::new_cyclic(|me| Nsr {
            id: config.id.clone(),
            name: config.name.clone(),
            nsd: Arc::new(nsd),
            config,
            ctx: ctx.clone(),
            plugin,
            log,
            tasks: TaskSet::new(),
            me: me.clone(),
            restart_mode,
            create_time: unix_now(),
            gate: tokio::sync::Mutex::new(()),
            inner: Mutex::new(NsrInner {
                state: NsrState::Init,
                history: vec![NsrState::Init],
                config_status: ConfigStatus::Configuring,
                events: EventLog::new(),
                terminate_requested: false,
                termination_started: false,
                instantiating: false,
                phases_started: false,
                was_active: false,
                vl_phase_done: false,
                vnf_phase_done: false,
                vlrs: Vec::new(),
                vnfrs: Vec::new(),
                vnffgrs: Vec::new(),
                scaling_groups,
                key_pair: None,
                ro_progress: None,
            }),
        });
        ctx.register_nsr(nsr.clone());
        info!(nsr.log, "nsr created"; "nsd" => &nsr.nsd.id, "plugin" => ?nsr.plugin.kind());
        nsr.publish_opdata().await?;
        Ok(nsr)
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &NsInstanceConfig {
        &self.config
    }

    /// The patched NSD snapshot this NSR was created from.
    pub fn nsd(&self) -> &Arc<Nsd> {
        &self.nsd
    }

    pub fn plugin_kind(&self) -> PluginKind {
        self.plugin.kind()
    }

    pub fn log(&self) -> &Logger {
        &self.log
    }

    pub fn tasks(&self) -> &TaskSet {
        &self.tasks
    }

    pub fn weak(&self) -> Weak<Nsr> {
        self.me.clone()
    }

    pub fn restart_mode(&self) -> bool {
        self.restart_mode
    }

    pub fn state(&self) -> NsrState {
        lock(&self.inner).state
    }

    /// Every state this NSR entered, in order, starting with INIT.
    pub fn state_history(&self) -> Vec<NsrState> {
        lock(&self.inner).history.clone()
    }

    pub fn config_status(&self) -> ConfigStatus {
        lock(&self.inner).config_status
    }

    pub fn events(&self) -> Vec<NsEvent> {
        lock(&self.inner).events.entries()
    }

    pub fn vlrs(&self) -> Vec<Arc<Vlr>> {
        lock(&self.inner).vlrs.clone()
    }

    /// Constituent VNFRs followed by the VNFRs of every scaling instance.
    pub fn vnfrs(&self) -> Vec<Arc<Vnfr>> {
        lock(&self.inner).all_vnfrs()
    }

    pub fn vnffgrs(&self) -> Vec<Arc<Vnffgr>> {
        lock(&self.inner).vnffgrs.clone()
    }

    pub fn scaling_group_records(&self) -> Vec<ScalingGroupRecord> {
        lock(&self.inner)
            .scaling_groups
            .iter()
            .map(|g| g.to_record())
            .collect()
    }

    pub fn ssh_public_key(&self) -> Option<String> {
        lock(&self.inner)
            .key_pair
            .as_ref()
            .map(|k| k.public_key.clone())
    }

    /// Progress as reported by an external resource orchestrator. Takes
    /// precedence over the counts derived from the records.
    pub fn set_ro_progress(&self, progress: Progress) {
        lock(&self.inner).ro_progress = Some(progress);
    }

    pub fn progress(&self) -> Progress {
        let (reported, vlrs, vnfrs) = {
            let inner = lock(&self.inner);
            (inner.ro_progress, inner.vlrs.clone(), inner.all_vnfrs())
        };
        if let Some(p) = reported {
            return p;
        }
        let vdurs: Vec<_> = vnfrs.iter().flat_map(|v| v.vdurs()).collect();
        Progress {
            networks_total: vlrs.len() as u32,
            networks_active: vlrs.iter().filter(|v| v.state() == VlrState::Active).count() as u32,
            vms_total: vdurs.len() as u32,
            vms_active: vdurs
                .iter()
                .filter(|v| v.state() == crate::vdur::VdurState::Ready)
                .count() as u32,
        }
    }

    // ── State helpers ───────────────────────────────────────────────

    /// Enter `state` unconditionally (subject to the termination guard)
    /// and tell the plugin.
    fn set_state(&self, state: NsrState) -> bool {
        let changed = lock(&self.inner).enter(state);
        if changed {
            self.announce(state);
        }
        changed
    }

    fn announce(&self, state: NsrState) {
        info!(self.log, "nsr state"; "state" => state.as_str());
        self.plugin.set_state(state);
    }

    fn record_event(&self, event: &str, description: &str, details: Option<String>) {
        lock(&self.inner).events.record(event, description, details);
    }

    /// Move to FAILED with an `ns-failed` event, unless already failed
    /// or terminating.
    async fn fail(&self, description: &str, details: Option<String>) {
        let changed = {
            let mut inner = lock(&self.inner);
            if inner.state == NsrState::Failed || inner.state.is_terminating() {
                false
            } else {
                inner.enter(NsrState::Failed);
                inner.config_status = ConfigStatus::Failed;
                inner.events.record("ns-failed", description, details.clone());
                true
            }
        };
        if changed {
            warn!(self.log, "nsr failed"; "description" => description, "details" => details);
            self.announce(NsrState::Failed);
        }
        self.publish_opdata_quietly().await;
    }

    fn terminate_latched(&self) -> bool {
        lock(&self.inner).terminate_requested
    }

    /// Recompute the NS state from its children. See [`update`].
    ///
    /// Boxed because it is reached from child notifications that may in
    /// turn be driven by this NSR.
    pub fn update_state(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(self.recompute())
    }

    // ── Placement ───────────────────────────────────────────────────

    fn primary_datacenter(&self) -> String {
        self.config
            .datacenter
            .clone()
            .unwrap_or_else(|| DEFAULT_DATACENTER.to_string())
    }

    fn vnf_datacenter(&self, member_vnf_index: u32) -> String {
        self.config
            .vnf_datacenter(member_vnf_index)
            .map(str::to_string)
            .unwrap_or_else(|| self.primary_datacenter())
    }

    /// One entry per datacenter the VLD must exist in: the datacenters of
    /// the VNFs it connects plus any explicit mapping, else the primary.
    fn vld_datacenters(&self, vld: &Vld) -> Vec<String> {
        let mut datacenters: Vec<String> = Vec::new();
        let mapped = vld
            .vnfd_connection_point_ref
            .iter()
            .map(|r| self.vnf_datacenter(r.member_vnf_index_ref))
            .chain(
                self.config
                    .vl_datacenters(&vld.id)
                    .into_iter()
                    .map(str::to_string),
            );
        for dc in mapped {
            if !datacenters.contains(&dc) {
                datacenters.push(dc);
            }
        }
        if datacenters.is_empty() {
            datacenters.push(
                vld.datacenter
                    .clone()
                    .unwrap_or_else(|| self.primary_datacenter()),
            );
        }
        datacenters
    }

    fn ip_profile_params(&self, vld: &Vld) -> Option<IpProfileParams> {
        let name = vld.ip_profile_ref.as_deref()?;
        match self.nsd.ip_profile(name) {
            Some(profile) => Some(profile.ip_profile_params.clone().unwrap_or_default()),
            None => {
                warn!(self.log, "vld references unknown ip profile"; "vld" => &vld.id, "ip_profile" => name);
                None
            }
        }
    }

    fn cloud_config_access(&self) -> CloudConfigAccess {
        CloudConfigAccess {
            key_pairs: self.config.key_pair.clone(),
            users: self.config.user.clone(),
            ns_public_key: self.ssh_public_key(),
        }
    }

    // ── Publishing ──────────────────────────────────────────────────

    pub fn to_opdata(&self) -> NsrOpdata {
        let progress = self.progress();
        let inner = lock(&self.inner);
        let vlr = if inner.vl_phase_done {
            inner
                .vlrs
                .iter()
                .map(|v| {
                    let record = v.to_record();
                    NsrVlrRef {
                        vlr_ref: record.id,
                        vld_ref: record.vld_ref,
                        datacenter: record.datacenter,
                        operational_status: record.operational_status,
                    }
                })
                .collect()
        } else {
            Vec::new()
        };
        let (constituent_vnfr_ref, vnffgr, scaling_group_record) = if inner.vnf_phase_done {
            (
                inner
                    .all_vnfrs()
                    .iter()
                    .map(|v| ConstituentVnfrRef {
                        vnfr_id: v.id().to_string(),
                        member_vnf_index_ref: v.member_vnf_index(),
                        datacenter: v.datacenter().to_string(),
                    })
                    .collect(),
                inner.vnffgrs.iter().map(|f| f.to_record()).collect(),
                inner.scaling_groups.iter().map(|g| g.to_record()).collect(),
            )
        } else {
            (Vec::new(), Vec::new(), Vec::new())
        };

        NsrOpdata {
            ns_instance_config_ref: self.id.clone(),
            name_ref: self.name.clone(),
            nsd_ref: self.nsd.id.clone(),
            nsd_name_ref: self.nsd.name.clone(),
            operational_status: inner.state,
            config_status: inner.config_status,
            resource_orchestrator: self.plugin.kind(),
            operational_events: inner.events.entries(),
            create_time: self.create_time,
            uptime: unix_now() - self.create_time,
            orchestration_progress: progress.into(),
            ssh_key_generated: inner.key_pair.clone(),
            service_primitive: self
                .nsd
                .service_primitive
                .iter()
                .map(|p| p.name.clone())
                .collect(),
            vlr,
            constituent_vnfr_ref,
            vnffgr,
            scaling_group_record,
        }
    }

    /// Write the opdata record. A TERMINATED NSR is not republished.
    pub async fn publish_opdata(&self) -> Result<(), OrchestratorError> {
        if self.state() == NsrState::Terminated {
            return Ok(());
        }
        let path = paths::ns_instance_opdata(&self.id);
        let record = to_record(&path, &self.to_opdata())?;
        self.ctx.store().update(&path, record).await?;
        Ok(())
    }

    pub async fn publish_opdata_quietly(&self) {
        if let Err(e) = self.publish_opdata().await {
            warn!(self.log, "opdata publish failed"; "error" => %e);
        }
    }

    async fn unpublish(&self) {
        match self
            .ctx
            .store()
            .delete(&paths::ns_instance_opdata(&self.id))
            .await
        {
            Ok(()) | Err(StoreError::NotFound { .. }) => {}
            Err(e) => warn!(self.log, "opdata delete failed"; "error" => %e),
        }
    }

    /// Whether every constituent VNFR has left the instantiation path.
    fn vnfrs_settled(vnfrs: &[Arc<Vnfr>]) -> bool {
        vnfrs
            .iter()
            .all(|v| matches!(v.state(), VnfrState::Ready | VnfrState::Failed))
    }

    fn debug_ignored(&self, what: &str) {
        debug!(self.log, "ignored"; "what" => what, "state" => self.state().as_str());
    }
}
