//! VNF forwarding-graph records.
//!
//! A VNFFGR renders the chains of one VNFFGD against the NS's running
//! VNFs and hands the result to the [`VnffgManager`](crate::VnffgManager).

use std::sync::{Arc, Mutex};

use nfvo_descriptor::{SfcRole, Vnffgd};
use nfvo_store::{to_record, StoreError};
use serde::{Deserialize, Serialize};
use slog::{debug, info, o, warn, Logger};

use crate::collaborator::{
    ClassifierRequest, PortBinding, ResourceState, RspHop, RspRequest, SffRequest, VnffgRequest,
};
use crate::context::OrchestratorContext;
use crate::error::OrchestratorError;
use crate::events::unix_now;
use crate::lock;
use crate::paths;
use crate::vnfr::{Vnfr, VnfrState, UNSET_IP, UNSET_MAC};
use crate::wait::poll_until;

pub const SFF_MGMT_PORT: u16 = 5000;
pub const SFF_DATA_PLANE_PORT: u16 = 4790;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VnffgrState {
    Init,
    InstantiationPending,
    Active,
    TerminatePending,
    Terminated,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RspRecord {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ResourceState>,
    pub hops: Vec<RspHop>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierRecord {
    pub id: String,
    pub name: String,
    pub rsp_id_ref: String,
    pub vnfr_id: String,
    pub port: PortBinding,
}

/// The `vnffgr/<id>` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VnffgrRecord {
    pub id: String,
    pub nsr_id_ref: String,
    pub vnffgd_id_ref: String,
    pub vnffgd_name_ref: String,
    pub operational_status: VnffgrState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operational_status_details: Option<String>,
    #[serde(default)]
    pub rsp: Vec<RspRecord>,
    #[serde(default)]
    pub classifier: Vec<ClassifierRecord>,
    pub create_time: i64,
}

struct VnffgrInner {
    state: VnffgrState,
    details: Option<String>,
    failure_reported: bool,
    rsps: Vec<RspRecord>,
    classifiers: Vec<ClassifierRecord>,
}

pub struct Vnffgr {
    id: String,
    nsr_id: String,
    nsr_name: String,
    vnffgd: Vnffgd,
    vnfrs: Vec<Arc<Vnfr>>,
    ctx: Arc<OrchestratorContext>,
    log: Logger,
    create_time: i64,
    inner: Mutex<VnffgrInner>,
}

impl Vnffgr {
    /// `vnfrs` are the NS's constituent VNFRs; hops and classifiers are
    /// bound to them by member index, SFFs are taken from the ones with
    /// the SFF role.
    pub fn new(
        ctx: &Arc<OrchestratorContext>,
        nsr_id: &str,
        nsr_name: &str,
        vnffgd: Vnffgd,
        vnfrs: Vec<Arc<Vnfr>>,
    ) -> Arc<Vnffgr> {
        let id = uuid::Uuid::new_v4().to_string();
        let log = ctx.log().new(o!(
            "nsr_id" => nsr_id.to_string(),
            "vnffgr_id" => id.clone(),
            "vnffgd" => vnffgd.name.clone(),
        ));
        Arc::new(Vnffgr {
            id,
            nsr_id: nsr_id.to_string(),
            nsr_name: nsr_name.to_string(),
            vnffgd,
            vnfrs,
            ctx: ctx.clone(),
            log,
            create_time: unix_now(),
            inner: Mutex::new(VnffgrInner {
                state: VnffgrState::Init,
                details: None,
                failure_reported: false,
                rsps: Vec::new(),
                classifiers: Vec::new(),
            }),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.vnffgd.name
    }

    pub fn state(&self) -> VnffgrState {
        lock(&self.inner).state
    }

    pub fn details(&self) -> Option<String> {
        lock(&self.inner).details.clone()
    }

    /// The failure detail, once, after the VNFFGR failed.
    pub fn take_failure(&self) -> Option<String> {
        let mut inner = lock(&self.inner);
        if inner.state != VnffgrState::Failed || inner.failure_reported {
            return None;
        }
        inner.failure_reported = true;
        Some(inner.details.clone().unwrap_or_default())
    }

    pub fn to_record(&self) -> VnffgrRecord {
        let inner = lock(&self.inner);
        VnffgrRecord {
            id: self.id.clone(),
            nsr_id_ref: self.nsr_id.clone(),
            vnffgd_id_ref: self.vnffgd.id.clone(),
            vnffgd_name_ref: self.vnffgd.name.clone(),
            operational_status: inner.state,
            operational_status_details: inner.details.clone(),
            rsp: inner.rsps.clone(),
            classifier: inner.classifiers.clone(),
            create_time: self.create_time,
        }
    }

    async fn publish(&self) -> Result<(), OrchestratorError> {
        let path = paths::vnffgr(&self.id);
        let record = to_record(&path, &self.to_record())?;
        self.ctx.store().update(&path, record).await?;
        Ok(())
    }

    fn vnfr_for(&self, member_vnf_index: u32) -> Option<&Arc<Vnfr>> {
        self.vnfrs
            .iter()
            .find(|v| v.member_vnf_index() == member_vnf_index && v.scaling().is_none())
            .or_else(|| {
                self.vnfrs
                    .iter()
                    .find(|v| v.member_vnf_index() == member_vnf_index)
            })
    }

    fn fail(&self, details: String) {
        warn!(self.log, "vnffgr failed"; "details" => &details);
        let mut inner = lock(&self.inner);
        if matches!(inner.state, VnffgrState::Terminated | VnffgrState::Failed) {
            return;
        }
        inner.state = VnffgrState::Failed;
        inner.details = Some(details);
    }

    // ── Instantiation ───────────────────────────────────────────────

    /// Bind every chain and classifier and program the graph.
    ///
    /// Binding and collaborator failures leave the VNFFGR FAILED and still
    /// return `Ok`; only record store failures are errors.
    pub async fn instantiate(&self) -> Result<(), OrchestratorError> {
        {
            let mut inner = lock(&self.inner);
            if inner.state != VnffgrState::Init {
                debug!(self.log, "vnffgr already instantiated"; "state" => ?inner.state);
                return Ok(());
            }
            inner.state = VnffgrState::InstantiationPending;
        }
        info!(self.log, "instantiating vnffgr");
        self.publish().await?;

        let request = match self.build_request().await {
            Ok(request) => request,
            Err(e) => {
                self.fail(e.to_string());
                return self.publish().await;
            }
        };
        {
            let mut inner = lock(&self.inner);
            inner.rsps = request
                .rsps
                .iter()
                .map(|rsp| RspRecord {
                    id: rsp.id.clone(),
                    name: rsp.name.clone(),
                    path_id: None,
                    state: None,
                    hops: rsp.hops.clone(),
                })
                .collect();
            inner.classifiers = request
                .classifiers
                .iter()
                .map(|c| ClassifierRecord {
                    id: c.id.clone(),
                    name: c.name.clone(),
                    rsp_id_ref: c.rsp_id_ref.clone(),
                    vnfr_id: c.vnfr_id.clone(),
                    port: c.port.clone(),
                })
                .collect();
        }

        let created = self
            .ctx
            .collaborators()
            .vnffg
            .create_vnffg(request)
            .await;
        match created {
            Ok(statuses) => {
                let mut inner = lock(&self.inner);
                for status in statuses {
                    if let Some(rsp) = inner.rsps.iter_mut().find(|r| r.name == status.name) {
                        rsp.path_id = status.path_id;
                        rsp.state = Some(status.state);
                    }
                }
                if inner.state == VnffgrState::InstantiationPending {
                    inner.state = VnffgrState::Active;
                }
            }
            Err(e) => self.fail(format!("vnffg create failed: {}", e)),
        }
        info!(self.log, "vnffgr instantiated"; "state" => ?self.state());
        self.publish().await
    }

    async fn build_request(&self) -> Result<VnffgRequest, OrchestratorError> {
        let mut rsps = Vec::new();
        for rsp in &self.vnffgd.rsp {
            let mut refs = rsp.vnfd_connection_point_ref.clone();
            refs.sort_by_key(|r| r.order);
            let mut hops = Vec::new();
            for hop_ref in &refs {
                let vnfr = self.ready_vnfr(hop_ref.member_vnf_index_ref).await?;
                hops.push(RspHop {
                    hop_number: hop_ref.order,
                    vnfr_id: vnfr.id().to_string(),
                    vnfr_name: vnfr.name().to_string(),
                    ingress: port_binding(&vnfr, &hop_ref.vnfd_ingress_connection_point_ref),
                    egress: port_binding(&vnfr, &hop_ref.vnfd_egress_connection_point_ref),
                });
            }
            rsps.push(RspRequest {
                id: rsp.id.clone(),
                name: format!("{}.{}", self.nsr_name, rsp.name),
                hops,
            });
        }

        let mut classifiers = Vec::new();
        for classifier in &self.vnffgd.classifier {
            let rsp = rsps
                .iter()
                .find(|r| r.id == classifier.rsp_id_ref)
                .ok_or_else(|| {
                    OrchestratorError::config(format!(
                        "classifier {} references unknown rsp {}",
                        classifier.name, classifier.rsp_id_ref
                    ))
                })?;
            let rsp_name = rsp.name.clone();
            let vnfr = self.ready_vnfr(classifier.member_vnf_index_ref).await?;
            classifiers.push(ClassifierRequest {
                id: classifier.id.clone(),
                name: format!("{}.{}", self.nsr_name, classifier.name),
                rsp_id_ref: classifier.rsp_id_ref.clone(),
                rsp_name,
                vnfr_id: vnfr.id().to_string(),
                port: port_binding(&vnfr, &classifier.vnfd_connection_point_ref),
                match_attributes: classifier.match_attributes.clone(),
            });
        }

        let sffs = self
            .vnfrs
            .iter()
            .filter(|v| v.vnfd().service_function_chain == Some(SfcRole::Sff))
            .map(|v| SffRequest {
                name: v.name().to_string(),
                vnfr_id: v.id().to_string(),
                mgmt_address: v.mgmt_ip(),
                mgmt_port: SFF_MGMT_PORT,
                data_plane_ip: v
                    .connection_points()
                    .into_iter()
                    .map(|cp| cp.ip_address)
                    .find(|ip| ip != UNSET_IP),
                data_plane_port: SFF_DATA_PLANE_PORT,
            })
            .collect();

        Ok(VnffgRequest {
            vnffgr_id: self.id.clone(),
            nsr_id: self.nsr_id.clone(),
            name: format!("{}.{}", self.nsr_name, self.vnffgd.name),
            rsps,
            classifiers,
            sffs,
        })
    }

    /// Wait for the VNFR of `member_vnf_index` to be READY.
    async fn ready_vnfr(&self, member_vnf_index: u32) -> Result<Arc<Vnfr>, OrchestratorError> {
        let vnfr = self.vnfr_for(member_vnf_index).cloned().ok_or_else(|| {
            OrchestratorError::config(format!(
                "no vnfr for member index {} in {}",
                member_vnf_index, self.vnffgd.name
            ))
        })?;
        let timeouts = self.ctx.timeouts();
        poll_until(
            &format!("vnfr {} for {}", vnfr.name(), self.vnffgd.name),
            timeouts.dependency_poll(),
            timeouts.dependency(),
            || matches!(vnfr.state(), VnfrState::Ready | VnfrState::Failed),
        )
        .await?;
        if vnfr.state() == VnfrState::Failed {
            return Err(OrchestratorError::VnfrInstantiationFailed {
                message: format!("vnfr {} failed", vnfr.name()),
            });
        }
        Ok(vnfr)
    }

    // ── Termination ─────────────────────────────────────────────────

    /// Remove the graph. Only ACTIVE, INSTANTIATION_PENDING and FAILED
    /// records have anything to remove.
    pub async fn terminate(&self) {
        {
            let mut inner = lock(&self.inner);
            if !matches!(
                inner.state,
                VnffgrState::Active | VnffgrState::InstantiationPending | VnffgrState::Failed
            ) {
                debug!(self.log, "ignoring terminate"; "state" => ?inner.state);
                return;
            }
            inner.state = VnffgrState::TerminatePending;
        }
        if let Err(e) = self
            .ctx
            .collaborators()
            .vnffg
            .terminate_vnffg(&self.id)
            .await
        {
            warn!(self.log, "vnffg terminate failed"; "error" => %e);
        }
        match self.ctx.store().delete(&paths::vnffgr(&self.id)).await {
            Ok(()) | Err(StoreError::NotFound { .. }) => {}
            Err(e) => warn!(self.log, "vnffgr record delete failed"; "error" => %e),
        }
        lock(&self.inner).state = VnffgrState::Terminated;
        info!(self.log, "vnffgr terminated");
    }
}

fn port_binding(vnfr: &Vnfr, cp_name: &str) -> PortBinding {
    let mgmt_address = vnfr.mgmt_ip();
    match vnfr.connection_points().into_iter().find(|cp| cp.name == cp_name) {
        Some(cp) => PortBinding {
            connection_point: cp.name,
            ip_address: Some(cp.ip_address).filter(|ip| ip != UNSET_IP),
            mac_address: Some(cp.mac_address).filter(|mac| mac != UNSET_MAC),
            port_id: cp.connection_point_id,
            vm_id: cp.vm_id,
            mgmt_address,
        },
        None => PortBinding {
            connection_point: cp_name.to_string(),
            mgmt_address,
            ..PortBinding::default()
        },
    }
}
