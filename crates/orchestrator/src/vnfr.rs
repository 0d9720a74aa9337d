//! VNF records.
//!
//! A VNFR owns its internal VLRs and its VDURs. Instantiation brings the
//! internal VLs up first, then starts one task per VDUR; a VDUR whose
//! cloud-init references a sibling waits for that sibling to settle. The
//! VNFR turns READY when every VDUR is READY, and FAILED as soon as any
//! of them fails. Failure is sticky.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use nfvo_descriptor::deserialize::cloud_init_vdu_refs;
use nfvo_descriptor::{apply_input_parameters, InputParameter, Vnfd, VnfdField};
use nfvo_store::{read_as, to_record, StoreError};
use serde::{Deserialize, Serialize};
use slog::{debug, info, o, warn, Logger};

use crate::cloud_init::{self, CloudConfigAccess, VdurDatastore};
use crate::context::OrchestratorContext;
use crate::error::OrchestratorError;
use crate::events::unix_now;
use crate::lock;
use crate::paths;
use crate::tasks::TaskSet;
use crate::vdur::{Vdur, VdurRecord, VdurState};
use crate::vlr::{Vlr, VlrSpec, VlrState};
use crate::wait::poll_until;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VnfrState {
    Init,
    VlInitPhase,
    VmInitPhase,
    Ready,
    Terminate,
    VlTerminatePhase,
    VduTerminatePhase,
    Terminated,
    Failed,
}

impl VnfrState {
    /// The `operational_status` published on the record.
    pub fn op_status(self) -> &'static str {
        match self {
            VnfrState::Init => "init",
            VnfrState::VlInitPhase => "vl_init_phase",
            VnfrState::VmInitPhase => "vm_init_phase",
            VnfrState::Ready => "running",
            VnfrState::Terminate => "terminate",
            VnfrState::VlTerminatePhase => "vl_terminate_phase",
            VnfrState::VduTerminatePhase => "vdu_terminate_phase",
            VnfrState::Terminated => "terminated",
            VnfrState::Failed => "failed",
        }
    }

    pub fn is_terminating(self) -> bool {
        matches!(
            self,
            VnfrState::Terminate
                | VnfrState::VlTerminatePhase
                | VnfrState::VduTerminatePhase
                | VnfrState::Terminated
        )
    }
}

// ── Published record ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MgmtInterfaceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// An external connection point of a VNFR, resolved once its VDU is up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlr_ref: Option<String>,
    pub ip_address: String,
    pub mac_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_point_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_id: Option<String>,
}

pub const UNSET_IP: &str = "0.0.0.0";
pub const UNSET_MAC: &str = "00:00:00:00:00:00";

impl CpRecord {
    fn unresolved(name: &str, vlr_ref: Option<String>) -> Self {
        CpRecord {
            name: name.to_string(),
            vlr_ref,
            ip_address: UNSET_IP.to_string(),
            mac_address: UNSET_MAC.to_string(),
            connection_point_id: None,
            vm_id: None,
        }
    }
}

/// The `vnfr-catalog/<id>` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VnfrRecord {
    pub id: String,
    pub nsr_id_ref: String,
    pub member_vnf_index_ref: u32,
    pub vnfd_ref: String,
    pub name: String,
    pub datacenter: String,
    pub operational_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operational_status_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mgmt_interface: Option<MgmtInterfaceRecord>,
    #[serde(default)]
    pub connection_point: Vec<CpRecord>,
    #[serde(default)]
    pub vdur: Vec<VdurRecord>,
    #[serde(default)]
    pub internal_vlr: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling_group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling_instance_id: Option<u32>,
    pub create_time: i64,
}

// ── Creation parameters ───────────────────────────────────────────────

/// Membership of a VNFR in a scaling-group instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalingRef {
    pub group: String,
    pub instance_id: u32,
}

/// Everything a VNFR is created from.
#[derive(Clone)]
pub struct VnfrSpec {
    pub nsr_id: String,
    pub nsr_name: String,
    pub member_vnf_index: u32,
    pub vnfd_id: String,
    pub datacenter: String,
    pub scaling: Option<ScalingRef>,
    pub input_parameters: Vec<InputParameter<VnfdField>>,
    /// External connection point name → the NS-level VLR it attaches to.
    pub cp_vlrs: HashMap<String, Arc<Vlr>>,
    pub access: CloudConfigAccess,
}

/// `<nsr>__<vnfd>__<index>`, or with the scaling group and instance
/// spliced in for scaled VNFs.
pub fn vnfr_name(nsr_name: &str, vnfd_name: &str, index: u32, scaling: Option<&ScalingRef>) -> String {
    match scaling {
        Some(s) => format!(
            "{}__{}__{}__{}__{}",
            nsr_name, s.group, s.instance_id, vnfd_name, index
        ),
        None => format!("{}__{}__{}", nsr_name, vnfd_name, index),
    }
}

/// Status of a VNF as reported by an external resource orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum ExternalVnfStatus {
    Running {
        mgmt_ip: String,
        connection_points: Vec<CpRecord>,
        vdurs: Vec<VdurRecord>,
    },
    Failed {
        reason: String,
    },
}

// ── Record ──────────────────────────────────────────────────────────

struct VnfrInner {
    state: VnfrState,
    details: Option<String>,
    failure_reported: bool,
    internal_vlrs: Vec<Arc<Vlr>>,
    vdurs: Vec<Arc<Vdur>>,
    restart_vdur_ids: HashMap<String, String>,
    external: Option<(String, Vec<CpRecord>, Vec<VdurRecord>)>,
    vnfd_released: bool,
}

pub struct Vnfr {
    id: String,
    name: String,
    spec: VnfrSpec,
    vnfd: Arc<Vnfd>,
    ctx: Arc<OrchestratorContext>,
    log: Logger,
    tasks: TaskSet,
    datastore: Arc<VdurDatastore>,
    create_time: i64,
    inner: Mutex<VnfrInner>,
}

impl Vnfr {
    /// Build the record and register it.
    ///
    /// Takes a reference on the VNFD, held until [`Vnfr::terminate`]. In
    /// restart mode a published VNFR with the same name lends its id and
    /// its VDUR ids.
    pub async fn create(
        ctx: &Arc<OrchestratorContext>,
        spec: VnfrSpec,
        restart_mode: bool,
    ) -> Result<Arc<Vnfr>, OrchestratorError> {
        let snapshot = ctx.catalog().acquire_vnfd(&spec.vnfd_id)?;
        match Self::build(ctx, spec, &snapshot, restart_mode).await {
            Ok(vnfr) => Ok(vnfr),
            Err(e) => {
                ctx.catalog().release_vnfd(&snapshot.id);
                Err(e)
            }
        }
    }

    async fn build(
        ctx: &Arc<OrchestratorContext>,
        spec: VnfrSpec,
        snapshot: &Vnfd,
        restart_mode: bool,
    ) -> Result<Arc<Vnfr>, OrchestratorError> {
        let mut vnfd = snapshot.clone();
        let outcome = apply_input_parameters(&mut vnfd, &spec.input_parameters)?;
        for skipped in &outcome.skipped {
            warn!(ctx.log(), "vnf input parameter not allowed"; "vnfd" => &vnfd.id, "xpath" => %skipped);
        }

        let name = vnfr_name(
            &spec.nsr_name,
            &vnfd.name,
            spec.member_vnf_index,
            spec.scaling.as_ref(),
        );
        let existing = if restart_mode {
            Self::find_existing(ctx, &spec.nsr_id, &name).await?
        } else {
            None
        };
        let (id, restart_vdur_ids, create_time) = match existing {
            Some(record) => {
                let ids = record
                    .vdur
                    .iter()
                    .map(|v| (v.name.clone(), v.id.clone()))
                    .collect();
                (record.id, ids, record.create_time)
            }
            None => (uuid::Uuid::new_v4().to_string(), HashMap::new(), unix_now()),
        };

        let log = ctx.log().new(o!(
            "nsr_id" => spec.nsr_id.clone(),
            "vnfr_id" => id.clone(),
            "vnfr" => name.clone(),
        ));
        let vnfr = Arc::new(Vnfr {
            id,
            name,
            spec,
            vnfd: Arc::new(vnfd),
            ctx: ctx.clone(),
            log,
            tasks: TaskSet::new(),
            datastore: Arc::new(VdurDatastore::new()),
            create_time,
            inner: Mutex::new(VnfrInner {
                state: VnfrState::Init,
                details: None,
                failure_reported: false,
                internal_vlrs: Vec::new(),
                vdurs: Vec::new(),
                restart_vdur_ids,
                external: None,
                vnfd_released: false,
            }),
        });
        ctx.register_vnfr(vnfr.clone());
        Ok(vnfr)
    }

    async fn find_existing(
        ctx: &OrchestratorContext,
        nsr_id: &str,
        name: &str,
    ) -> Result<Option<VnfrRecord>, OrchestratorError> {
        for (path, value) in ctx.store().list(paths::VNFR_CATALOG).await? {
            match serde_json::from_value::<VnfrRecord>(value) {
                Ok(record) if record.name == name && record.nsr_id_ref == nsr_id => {
                    return Ok(Some(record))
                }
                Ok(_) => {}
                Err(e) => debug!(ctx.log(), "skipping unreadable vnfr record"; "path" => path, "error" => %e),
            }
        }
        Ok(None)
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nsr_id(&self) -> &str {
        &self.spec.nsr_id
    }

    pub fn nsr_name(&self) -> &str {
        &self.spec.nsr_name
    }

    pub fn member_vnf_index(&self) -> u32 {
        self.spec.member_vnf_index
    }

    pub fn datacenter(&self) -> &str {
        &self.spec.datacenter
    }

    pub fn scaling(&self) -> Option<&ScalingRef> {
        self.spec.scaling.as_ref()
    }

    /// The VNFD snapshot with input parameters applied.
    pub fn vnfd(&self) -> Arc<Vnfd> {
        self.vnfd.clone()
    }

    pub fn log(&self) -> &Logger {
        &self.log
    }

    pub fn tasks(&self) -> &TaskSet {
        &self.tasks
    }

    pub fn datastore(&self) -> &Arc<VdurDatastore> {
        &self.datastore
    }

    pub fn state(&self) -> VnfrState {
        lock(&self.inner).state
    }

    pub fn details(&self) -> Option<String> {
        lock(&self.inner).details.clone()
    }

    pub fn vdurs(&self) -> Vec<Arc<Vdur>> {
        lock(&self.inner).vdurs.clone()
    }

    pub fn internal_vlrs(&self) -> Vec<Arc<Vlr>> {
        lock(&self.inner).internal_vlrs.clone()
    }

    pub fn internal_vlr(&self, vlr_id: &str) -> Option<Arc<Vlr>> {
        lock(&self.inner)
            .internal_vlrs
            .iter()
            .find(|v| v.id() == vlr_id)
            .cloned()
    }

    /// The NS-level VLR an external connection point is attached to.
    pub fn cp_vlr(&self, cp: &str) -> Option<Arc<Vlr>> {
        self.spec.cp_vlrs.get(cp).cloned()
    }

    /// The internal VLR carrying internal connection point `icp_id`.
    pub fn internal_vlr_for_icp(&self, icp_id: &str) -> Option<Arc<Vlr>> {
        let ivld = self
            .vnfd
            .internal_vld
            .iter()
            .find(|ivld| ivld.internal_connection_point.iter().any(|c| c.id_ref == icp_id))?;
        lock(&self.inner)
            .internal_vlrs
            .iter()
            .find(|v| v.vld_ref() == ivld.id)
            .cloned()
    }

    /// The failure detail, once, after the VNFR failed.
    pub fn take_failure_report(&self) -> Option<String> {
        let mut inner = lock(&self.inner);
        if inner.state != VnfrState::Failed || inner.failure_reported {
            return None;
        }
        inner.failure_reported = true;
        Some(
            inner
                .details
                .clone()
                .unwrap_or_else(|| format!("VNF {} failed", self.name)),
        )
    }

    /// Management address: the management VDU's, else the first READY
    /// VDU's.
    pub fn mgmt_ip(&self) -> Option<String> {
        let inner = lock(&self.inner);
        if let Some((ip, _, _)) = &inner.external {
            return Some(ip.clone());
        }
        let mgmt_vdu = self.vnfd.mgmt_vdu_id();
        inner
            .vdurs
            .iter()
            .find(|v| Some(v.vdu_id()) == mgmt_vdu)
            .and_then(|v| v.management_ip())
            .or_else(|| inner.vdurs.iter().find_map(|v| v.management_ip()))
    }

    pub fn connection_points(&self) -> Vec<CpRecord> {
        let (external, vdurs) = {
            let inner = lock(&self.inner);
            (inner.external.clone(), inner.vdurs.clone())
        };
        if let Some((_, cps, _)) = external {
            return cps;
        }
        self.vnfd
            .connection_point
            .iter()
            .map(|cpd| {
                let vlr_ref = self.spec.cp_vlrs.get(&cpd.name).map(|v| v.id().to_string());
                let mut cp = CpRecord::unresolved(&cpd.name, vlr_ref);
                for vdur in &vdurs {
                    let Some(vm) = vdur.vm_info() else { continue };
                    if vdur.state() != VdurState::Ready {
                        continue;
                    }
                    if let Some(port) = vm.connection_points.iter().find(|p| p.name == cpd.name) {
                        if let Some(ip) = &port.ip_address {
                            cp.ip_address = ip.clone();
                        }
                        if let Some(mac) = &port.mac_address {
                            cp.mac_address = mac.clone();
                        }
                        cp.connection_point_id = port.connection_point_id.clone();
                        cp.vm_id = vm.vm_id.clone();
                        break;
                    }
                }
                cp
            })
            .collect()
    }

    pub fn to_record(&self) -> VnfrRecord {
        let connection_point = self.connection_points();
        let mgmt_ip = self.mgmt_ip();
        let inner = lock(&self.inner);
        let vdur = match &inner.external {
            Some((_, _, vdurs)) => vdurs.clone(),
            None => inner.vdurs.iter().map(|v| v.to_record()).collect(),
        };
        VnfrRecord {
            id: self.id.clone(),
            nsr_id_ref: self.spec.nsr_id.clone(),
            member_vnf_index_ref: self.spec.member_vnf_index,
            vnfd_ref: self.vnfd.id.clone(),
            name: self.name.clone(),
            datacenter: self.spec.datacenter.clone(),
            operational_status: inner.state.op_status().to_string(),
            operational_status_details: inner.details.clone(),
            mgmt_interface: Some(MgmtInterfaceRecord {
                ip_address: mgmt_ip,
                port: self.vnfd.mgmt_interface.as_ref().and_then(|m| m.port),
            }),
            connection_point,
            vdur,
            internal_vlr: inner.internal_vlrs.iter().map(|v| v.id().to_string()).collect(),
            scaling_group_name: self.spec.scaling.as_ref().map(|s| s.group.clone()),
            scaling_instance_id: self.spec.scaling.as_ref().map(|s| s.instance_id),
            create_time: self.create_time,
        }
    }

    pub async fn publish(&self) -> Result<(), OrchestratorError> {
        let path = paths::vnfr(&self.id);
        let record = to_record(&path, &self.to_record())?;
        self.ctx.store().update(&path, record).await?;
        Ok(())
    }

    async fn publish_quietly(&self) {
        if let Err(e) = self.publish().await {
            warn!(self.log, "vnfr publish failed"; "error" => %e);
        }
    }

    async fn notify_nsr(&self) {
        if let Some(nsr) = self.ctx.get_nsr(&self.spec.nsr_id) {
            nsr.update_state().await;
        }
    }

    // ── Instantiation ───────────────────────────────────────────────

    /// Bring up internal VLs, then start the VDUR tasks.
    ///
    /// Returns once every VDUR has been scheduled; readiness is reported
    /// later through [`Vnfr::on_vdur_ready`].
    pub async fn instantiate(self: &Arc<Self>, restart_mode: bool) -> Result<(), OrchestratorError> {
        {
            let mut inner = lock(&self.inner);
            if inner.state != VnfrState::Init {
                debug!(self.log, "vnfr already instantiated"; "state" => ?inner.state);
                return Ok(());
            }
            inner.state = VnfrState::VlInitPhase;
        }
        info!(self.log, "instantiating vnfr"; "restart" => restart_mode);

        match self.instantiate_vls(restart_mode).await {
            Ok(()) => {}
            Err(e) => {
                self.instantiation_failed(e.to_string()).await;
                return Err(e);
            }
        }
        match self.instantiate_vdurs(restart_mode).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.instantiation_failed(e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn instantiate_vls(&self, restart_mode: bool) -> Result<(), OrchestratorError> {
        let mut created = Vec::new();
        for ivld in &self.vnfd.internal_vld {
            let profile = ivld
                .ip_profile_ref
                .as_deref()
                .and_then(|name| self.vnfd.ip_profile(name))
                .and_then(|p| p.ip_profile_params.clone());
            let spec = VlrSpec::for_internal_vld(
                &self.id,
                &self.name,
                ivld,
                &self.spec.datacenter,
                profile,
            );
            created.push(Vlr::create(&self.ctx, spec, restart_mode).await?);
        }
        lock(&self.inner).internal_vlrs = created.clone();
        self.publish().await?;

        for vlr in &created {
            vlr.instantiate(restart_mode).await?;
        }
        if created.is_empty() {
            return Ok(());
        }

        let timeouts = self.ctx.timeouts();
        poll_until(
            &format!("internal VLs of {}", self.name),
            timeouts.dependency_poll(),
            timeouts.vl_ready(),
            || {
                created.iter().all(|v| v.state() == VlrState::Active)
                    || created.iter().any(|v| v.state() == VlrState::Failed)
            },
        )
        .await?;

        if let Some(failed) = created.iter().find(|v| v.state() == VlrState::Failed) {
            return Err(OrchestratorError::VnfrInstantiationFailed {
                message: format!(
                    "internal VL {} failed: {}",
                    failed.name(),
                    failed.details().unwrap_or_default()
                ),
            });
        }
        Ok(())
    }

    async fn instantiate_vdurs(self: &Arc<Self>, restart_mode: bool) -> Result<(), OrchestratorError> {
        lock(&self.inner).state = VnfrState::VmInitPhase;

        let mut vdurs = Vec::new();
        for vdu in &self.vnfd.vdu {
            let count = vdu.count.max(1);
            for i in 0..count {
                let name = if count == 1 {
                    format!("{}__{}", self.name, vdu.id)
                } else {
                    format!("{}__{}__{}", self.name, vdu.id, i)
                };
                let id = lock(&self.inner).restart_vdur_ids.get(&name).cloned();
                let vdur = Vdur::new(&self.ctx, self, vdu, name, id);
                self.datastore.add(vdu, vdur.unique_short_name());
                vdurs.push(vdur);
            }
        }
        lock(&self.inner).vdurs = vdurs.clone();
        self.publish().await?;

        let package_dir = self.vnfd.package_dir.clone();
        let mut scripts = Vec::with_capacity(vdurs.len());
        for vdur in &vdurs {
            scripts.push(cloud_init::read_script(vdur.vdu(), package_dir.as_deref())?);
        }

        if vdurs.is_empty() {
            self.on_vdur_ready().await;
            return Ok(());
        }

        for (vdur, script) in vdurs.iter().zip(scripts) {
            let deps: Vec<Arc<Vdur>> = match &script {
                Some(text) => {
                    let refs = cloud_init_vdu_refs(text);
                    vdurs
                        .iter()
                        .filter(|d| d.vdu_id() != vdur.vdu_id() && refs.iter().any(|r| r == d.vdu_id()))
                        .cloned()
                        .collect()
                }
                None => Vec::new(),
            };
            let this = self.clone();
            let vdur = vdur.clone();
            self.tasks.spawn(format!("vdur-{}", vdur.id()), async move {
                this.run_vdur(vdur, script, deps, restart_mode).await;
            });
        }
        Ok(())
    }

    /// Wait for the VDUs this one's cloud-init reads from, render it and
    /// request the VM.
    async fn run_vdur(
        self: Arc<Self>,
        vdur: Arc<Vdur>,
        script: Option<String>,
        deps: Vec<Arc<Vdur>>,
        restart_mode: bool,
    ) {
        if !deps.is_empty() {
            debug!(self.log, "vdur waiting on dependencies";
                   "vdur" => vdur.name(), "deps" => deps.len());
            let timeouts = self.ctx.timeouts();
            let waited = poll_until(
                &format!("dependencies of {}", vdur.name()),
                timeouts.dependency_poll(),
                timeouts.dependency(),
                || deps.iter().all(|d| d.state().is_settled()),
            )
            .await;
            if let Err(e) = waited {
                vdur.fail(e.to_string()).await;
                return;
            }
            if let Some(dep) = deps.iter().find(|d| !d.satisfies_dependency()) {
                vdur.fail(format!(
                    "dependency {} of {} did not become active",
                    dep.vdu_id(),
                    vdur.vdu_id()
                ))
                .await;
                return;
            }
        }

        let rendered = match script {
            Some(text) => match cloud_init::render(&text, vdur.vdu_id(), &self.datastore) {
                Ok(out) => Some(out),
                Err(e) => {
                    vdur.fail(e.to_string()).await;
                    return;
                }
            },
            None => None,
        };
        let user_data = cloud_init::add_access(rendered, &self.spec.access);
        vdur.instantiate(&self, user_data, restart_mode).await;
    }

    /// Called by a VDUR that reached READY.
    pub async fn on_vdur_ready(&self) {
        let became_ready = {
            let mut inner = lock(&self.inner);
            if inner.state != VnfrState::VmInitPhase {
                false
            } else {
                let vdus_ready = inner.vdurs.iter().all(|v| v.state() == VdurState::Ready);
                let vls_ready = inner
                    .internal_vlrs
                    .iter()
                    .all(|v| v.state() == VlrState::Active);
                if vdus_ready && vls_ready {
                    inner.state = VnfrState::Ready;
                    true
                } else {
                    false
                }
            }
        };
        self.publish_quietly().await;
        if became_ready {
            info!(self.log, "vnfr ready"; "mgmt_ip" => self.mgmt_ip());
            self.notify_nsr().await;
        }
    }

    /// Called by a VDUR that failed.
    pub async fn on_vdur_failed(&self, vdur_name: &str, reason: &str) {
        self.instantiation_failed(format!("VDU {} failed: {}", vdur_name, reason))
            .await;
    }

    /// Mark the VNFR FAILED and tell the NSR.
    pub async fn instantiation_failed(&self, details: String) {
        {
            let mut inner = lock(&self.inner);
            if inner.state == VnfrState::Failed || inner.state.is_terminating() {
                debug!(self.log, "ignoring failure"; "state" => ?inner.state, "details" => &details);
                return;
            }
            inner.state = VnfrState::Failed;
            inner.details = Some(details.clone());
        }
        warn!(self.log, "vnfr failed"; "details" => &details);
        self.publish_quietly().await;
        self.notify_nsr().await;
    }

    /// Route a status event for one of the internal VLRs.
    pub fn vlr_event(&self, record: &crate::vlr::VlrRecord) -> Result<bool, OrchestratorError> {
        match self.internal_vlr(&record.id) {
            Some(vlr) => vlr.apply_status(record),
            None => {
                debug!(self.log, "event for unknown internal vlr"; "vlr_id" => &record.id);
                Ok(false)
            }
        }
    }

    // ── External orchestrator ───────────────────────────────────────

    /// Publish the record for a VNF an external orchestrator deploys.
    pub async fn publish_pending(&self) -> Result<(), OrchestratorError> {
        {
            let mut inner = lock(&self.inner);
            if inner.state == VnfrState::Init {
                inner.state = VnfrState::VmInitPhase;
            }
        }
        self.publish().await
    }

    /// Fold an external orchestrator's report into the record.
    pub async fn apply_external_status(&self, status: ExternalVnfStatus) {
        match status {
            ExternalVnfStatus::Failed { reason } => self.instantiation_failed(reason).await,
            ExternalVnfStatus::Running {
                mgmt_ip,
                connection_points,
                vdurs,
            } => {
                {
                    let mut inner = lock(&self.inner);
                    if inner.state == VnfrState::Failed || inner.state.is_terminating() {
                        return;
                    }
                    inner.state = VnfrState::Ready;
                    inner.external = Some((mgmt_ip, connection_points, vdurs));
                }
                info!(self.log, "vnfr running on external orchestrator");
                self.publish_quietly().await;
                self.notify_nsr().await;
            }
        }
    }

    // ── Termination ─────────────────────────────────────────────────

    /// Tear down internal VLs, then VDUs, then drop the record and the
    /// VNFD reference. Repeated calls are ignored.
    pub async fn terminate(&self) {
        self.teardown(true).await
    }

    /// Terminate a VNF whose resources an external orchestrator owns.
    pub async fn mark_terminated(&self) {
        self.teardown(false).await
    }

    async fn teardown(&self, native: bool) {
        {
            let mut inner = lock(&self.inner);
            if inner.state.is_terminating() {
                debug!(self.log, "vnfr already terminating"; "state" => ?inner.state);
                return;
            }
            inner.state = VnfrState::Terminate;
        }
        info!(self.log, "terminating vnfr");
        self.publish_quietly().await;
        self.tasks.shutdown().await;

        let (vlrs, vdurs) = {
            let mut inner = lock(&self.inner);
            inner.state = VnfrState::VlTerminatePhase;
            (inner.internal_vlrs.clone(), inner.vdurs.clone())
        };
        for vlr in &vlrs {
            if native {
                vlr.terminate().await;
            } else {
                vlr.mark_terminated().await;
            }
        }

        lock(&self.inner).state = VnfrState::VduTerminatePhase;
        if native {
            for vdur in &vdurs {
                vdur.terminate().await;
            }
        }

        let release = {
            let mut inner = lock(&self.inner);
            inner.state = VnfrState::Terminated;
            !std::mem::replace(&mut inner.vnfd_released, true)
        };
        if release {
            self.ctx.catalog().release_vnfd(&self.vnfd.id);
        }
        match self.ctx.store().delete(&paths::vnfr(&self.id)).await {
            Ok(()) | Err(StoreError::NotFound { .. }) => {}
            Err(e) => warn!(self.log, "vnfr record delete failed"; "error" => %e),
        }
        self.ctx.remove_vnfr(&self.id);
        info!(self.log, "vnfr terminated");
    }
}

/// Read a published VNFR.
pub async fn read_record(
    ctx: &OrchestratorContext,
    vnfr_id: &str,
) -> Result<Option<VnfrRecord>, OrchestratorError> {
    Ok(read_as(ctx.store(), &paths::vnfr(vnfr_id)).await?)
}
