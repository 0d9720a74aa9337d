//! Virtual link records.
//!
//! A VLR never polls. After the initial create call its state only moves
//! through status events routed to it by its owner (see
//! [`Vlr::apply_status`]).

use std::sync::{Arc, Mutex};

use nfvo_descriptor::{InternalVld, IpProfileParams, ProviderNetwork, Vld};
use nfvo_store::{read_as, to_record, StoreError, Transaction};
use serde::{Deserialize, Serialize};
use slog::{debug, info, o, warn, Logger};

use crate::collaborator::{NetworkRequest, NetworkStatus};
use crate::context::{OrchestratorContext, VlrOwner};
use crate::error::OrchestratorError;
use crate::events::unix_now;
use crate::ip_profile::{resolve_ip_profile, ResolvedIpProfile};
use crate::lock;
use crate::paths;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VlrState {
    Init,
    InstantiationPending,
    Active,
    TerminatePending,
    Terminated,
    Failed,
}

impl VlrState {
    /// States from which a terminate request has something to release.
    pub fn in_use(self) -> bool {
        matches!(
            self,
            VlrState::Active
                | VlrState::InstantiationPending
                | VlrState::TerminatePending
                | VlrState::Failed
        )
    }

    fn is_final(self) -> bool {
        matches!(self, VlrState::Terminated | VlrState::Failed)
    }
}

// ── Published record ────────────────────────────────────────────────

/// The `vlr-catalog/<id>` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VlrRecord {
    pub id: String,
    pub name: String,
    pub vld_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nsr_id_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vnfr_id_ref: Option<String>,
    pub datacenter: String,
    /// `vl_alloc_pending`, `running` or `failed`.
    pub operational_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operational_status_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_subnet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_profile: Option<ResolvedIpProfile>,
    #[serde(default)]
    pub virtual_connection_points: Vec<String>,
    pub create_time: i64,
}

const STATUS_PENDING: &str = "vl_alloc_pending";
const STATUS_RUNNING: &str = "running";
const STATUS_FAILED: &str = "failed";

// ── Creation parameters ───────────────────────────────────────────────

/// What a VLR is created from: one VLD placed in one datacenter.
#[derive(Debug, Clone, PartialEq)]
pub struct VlrSpec {
    pub name: String,
    pub vld_ref: String,
    pub vld_name: String,
    pub datacenter: String,
    pub vim_network_name: Option<String>,
    pub network_type: Option<String>,
    pub provider_network: Option<ProviderNetwork>,
    pub mgmt_network: bool,
    pub ip_profile: Option<IpProfileParams>,
    pub virtual_connection_points: Vec<String>,
    pub owner: VlrOwner,
}

impl VlrSpec {
    /// An NS-level VLR.
    pub fn for_vld(
        project: &str,
        nsr_id: &str,
        nsr_name: &str,
        vld: &Vld,
        datacenter: &str,
        ip_profile: Option<IpProfileParams>,
    ) -> Self {
        VlrSpec {
            name: vlr_name(project, nsr_name, vld),
            vld_ref: vld.id.clone(),
            vld_name: vld.name.clone(),
            datacenter: datacenter.to_string(),
            vim_network_name: vld.vim_network_name.clone(),
            network_type: vld.vl_type.clone(),
            provider_network: vld.provider_network.clone(),
            mgmt_network: vld.mgmt_network,
            ip_profile,
            virtual_connection_points: vld
                .virtual_connection_points
                .iter()
                .map(|v| v.name.clone())
                .collect(),
            owner: VlrOwner::Nsr(nsr_id.to_string()),
        }
    }

    /// A VNF-internal VLR.
    pub fn for_internal_vld(
        vnfr_id: &str,
        vnfr_name: &str,
        ivld: &InternalVld,
        datacenter: &str,
        ip_profile: Option<IpProfileParams>,
    ) -> Self {
        VlrSpec {
            name: format!("{}.{}", vnfr_name, ivld.name),
            vld_ref: ivld.id.clone(),
            vld_name: ivld.name.clone(),
            datacenter: datacenter.to_string(),
            vim_network_name: ivld.vim_network_name.clone(),
            network_type: ivld.vl_type.clone(),
            provider_network: None,
            mgmt_network: false,
            ip_profile,
            virtual_connection_points: Vec::new(),
            owner: VlrOwner::Vnfr(vnfr_id.to_string()),
        }
    }
}

/// Network name for an NS-level VL.
pub fn vlr_name(project: &str, nsr_name: &str, vld: &Vld) -> String {
    if let Some(name) = &vld.vim_network_name {
        return name.clone();
    }
    if vld.name == "multisite" {
        return "multisite".to_string();
    }
    format!("{}.{}.{}", project, nsr_name, vld.name)
}

// ── Record ──────────────────────────────────────────────────────────

#[derive(Debug)]
struct VlrInner {
    state: VlrState,
    network_id: Option<String>,
    assigned_subnet: Option<String>,
    ip_profile: Option<ResolvedIpProfile>,
    details: Option<String>,
    failure_reported: bool,
    create_time: i64,
}

pub struct Vlr {
    id: String,
    spec: VlrSpec,
    ctx: Arc<OrchestratorContext>,
    log: Logger,
    inner: Mutex<VlrInner>,
}

impl Vlr {
    /// Create the record object and register its owner.
    ///
    /// In restart mode a published VLR with the same name, owner and
    /// datacenter lends its id, so the network it stands for is not
    /// requested twice.
    pub async fn create(
        ctx: &Arc<OrchestratorContext>,
        spec: VlrSpec,
        restart_mode: bool,
    ) -> Result<Arc<Vlr>, OrchestratorError> {
        let existing = if restart_mode {
            Self::find_existing(ctx, &spec).await?
        } else {
            None
        };
        let id = existing.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let log = ctx.log().new(o!("vlr_id" => id.clone(), "vlr" => spec.name.clone()));
        ctx.register_vlr(&id, spec.owner.clone());
        Ok(Arc::new(Vlr {
            id,
            spec,
            ctx: ctx.clone(),
            log,
            inner: Mutex::new(VlrInner {
                state: VlrState::Init,
                network_id: None,
                assigned_subnet: None,
                ip_profile: None,
                details: None,
                failure_reported: false,
                create_time: unix_now(),
            }),
        }))
    }

    async fn find_existing(
        ctx: &OrchestratorContext,
        spec: &VlrSpec,
    ) -> Result<Option<String>, OrchestratorError> {
        let (nsr_ref, vnfr_ref) = owner_refs(&spec.owner);
        for (path, value) in ctx.store().list(paths::VLR_CATALOG).await? {
            let Ok(record) = serde_json::from_value::<VlrRecord>(value) else {
                debug!(ctx.log(), "skipping unreadable vlr record"; "path" => path);
                continue;
            };
            if record.name == spec.name
                && record.datacenter == spec.datacenter
                && record.nsr_id_ref == nsr_ref
                && record.vnfr_id_ref == vnfr_ref
            {
                return Ok(Some(record.id));
            }
        }
        Ok(None)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &VlrSpec {
        &self.spec
    }

    pub fn vld_ref(&self) -> &str {
        &self.spec.vld_ref
    }

    pub fn datacenter(&self) -> &str {
        &self.spec.datacenter
    }

    pub fn is_mgmt(&self) -> bool {
        self.spec.mgmt_network
    }

    pub fn state(&self) -> VlrState {
        lock(&self.inner).state
    }

    /// Set only once the VLR is ACTIVE.
    pub fn network_id(&self) -> Option<String> {
        lock(&self.inner).network_id.clone()
    }

    pub fn assigned_subnet(&self) -> Option<String> {
        lock(&self.inner).assigned_subnet.clone()
    }

    pub fn details(&self) -> Option<String> {
        lock(&self.inner).details.clone()
    }

    pub fn ip_profile(&self) -> Option<ResolvedIpProfile> {
        lock(&self.inner).ip_profile.clone()
    }

    /// The failure detail, the first time it is asked for after the VLR
    /// failed.
    pub fn take_failure(&self) -> Option<String> {
        let mut inner = lock(&self.inner);
        if inner.state != VlrState::Failed || inner.failure_reported {
            return None;
        }
        inner.failure_reported = true;
        Some(
            inner
                .details
                .clone()
                .unwrap_or_else(|| format!("VL {} failed", self.spec.name)),
        )
    }

    pub fn to_record(&self) -> VlrRecord {
        let inner = lock(&self.inner);
        let (nsr_id_ref, vnfr_id_ref) = owner_refs(&self.spec.owner);
        VlrRecord {
            id: self.id.clone(),
            name: self.spec.name.clone(),
            vld_ref: self.spec.vld_ref.clone(),
            nsr_id_ref,
            vnfr_id_ref,
            datacenter: self.spec.datacenter.clone(),
            operational_status: match inner.state {
                VlrState::Active => STATUS_RUNNING,
                VlrState::Failed => STATUS_FAILED,
                _ => STATUS_PENDING,
            }
            .to_string(),
            operational_status_details: inner.details.clone(),
            network_id: inner.network_id.clone(),
            assigned_subnet: inner.assigned_subnet.clone(),
            ip_profile: inner.ip_profile.clone(),
            virtual_connection_points: self.spec.virtual_connection_points.clone(),
            create_time: inner.create_time,
        }
    }

    async fn publish(&self) -> Result<(), OrchestratorError> {
        let path = paths::vlr(&self.id);
        let record = to_record(&path, &self.to_record())?;
        self.ctx.store().update(&path, record).await?;
        Ok(())
    }

    // ── Instantiation ───────────────────────────────────────────────

    /// Request the network.
    ///
    /// Collaborator failures leave the VLR FAILED and still return `Ok`;
    /// only record store failures are errors.
    pub async fn instantiate(&self, restart_mode: bool) -> Result<(), OrchestratorError> {
        {
            let mut inner = lock(&self.inner);
            if inner.state != VlrState::Init {
                debug!(self.log, "vlr already instantiated"; "state" => ?inner.state);
                return Ok(());
            }
            inner.state = VlrState::InstantiationPending;
        }

        let path = paths::vlr(&self.id);
        if restart_mode {
            if let Some(record) = read_as::<VlrRecord>(self.ctx.store(), &path).await? {
                info!(self.log, "reusing existing vlr"; "status" => &record.operational_status);
                {
                    let mut inner = lock(&self.inner);
                    inner.ip_profile = record.ip_profile.clone();
                    inner.create_time = record.create_time;
                }
                self.apply_status(&record)?;
                return Ok(());
            }
        }

        if let Some(params) = &self.spec.ip_profile {
            let resolved = resolve_ip_profile(params);
            match resolved {
                Ok(profile) => {
                    lock(&self.inner).ip_profile = Some(profile);
                }
                Err(e) => {
                    self.fail(e.to_string());
                    return self.publish().await;
                }
            }
        }

        let record = to_record(&path, &self.to_record())?;
        match self
            .ctx
            .store()
            .execute(Transaction::new().add_create(path.clone(), record))
            .await
        {
            Ok(_) => {}
            Err(StoreError::AlreadyExists { path }) => {
                return Err(OrchestratorError::internal(format!(
                    "vlr record {} already exists",
                    path
                )))
            }
            Err(e) => return Err(e.into()),
        }

        let request = NetworkRequest {
            vlr_id: self.id.clone(),
            name: self.spec.name.clone(),
            vld_name: self.spec.vld_name.clone(),
            datacenter: self.spec.datacenter.clone(),
            vim_network_name: self.spec.vim_network_name.clone(),
            network_type: self.spec.network_type.clone(),
            provider_network: self.spec.provider_network.clone(),
            ip_profile: self.ip_profile(),
            virtual_connection_points: self.spec.virtual_connection_points.clone(),
        };
        info!(self.log, "requesting network"; "datacenter" => &self.spec.datacenter);
        let response = self.ctx.collaborators().networks.create_network(request).await;

        match response {
            Ok(None) => self.fail("empty response".to_string()),
            Ok(Some(resp)) => match resp.status {
                NetworkStatus::Failed => self.fail(
                    resp.details
                        .unwrap_or_else(|| "network creation failed".to_string()),
                ),
                NetworkStatus::Running => {
                    let mut inner = lock(&self.inner);
                    if inner.state == VlrState::InstantiationPending {
                        inner.state = VlrState::Active;
                        inner.network_id = resp.network_id;
                        inner.assigned_subnet = resp.assigned_subnet;
                    }
                }
                NetworkStatus::VlAllocPending => {
                    debug!(self.log, "network allocation pending");
                    return Ok(());
                }
            },
            Err(e) => self.fail(e.to_string()),
        }
        self.publish().await
    }

    fn fail(&self, details: String) {
        warn!(self.log, "vlr failed"; "details" => &details);
        let mut inner = lock(&self.inner);
        if inner.state.is_final() {
            return;
        }
        inner.state = VlrState::Failed;
        inner.details = Some(details);
    }

    /// Fold a status event into the local state. Returns whether the
    /// state changed.
    pub fn apply_status(&self, record: &VlrRecord) -> Result<bool, OrchestratorError> {
        let target = match record.operational_status.as_str() {
            STATUS_RUNNING => VlrState::Active,
            STATUS_FAILED => VlrState::Failed,
            STATUS_PENDING => VlrState::InstantiationPending,
            other => {
                return Err(OrchestratorError::internal(format!(
                    "unknown vlr operational status '{}' for {}",
                    other, self.id
                )))
            }
        };

        let mut inner = lock(&self.inner);
        if inner.state.is_final() || inner.state == VlrState::TerminatePending {
            debug!(self.log, "ignoring status for settled vlr";
                   "state" => ?inner.state, "status" => &record.operational_status);
            return Ok(false);
        }
        if inner.state == target
            || (inner.state == VlrState::Active && target == VlrState::InstantiationPending)
        {
            return Ok(false);
        }
        inner.state = target;
        match target {
            VlrState::Active => {
                inner.network_id = record.network_id.clone();
                inner.assigned_subnet = record.assigned_subnet.clone();
            }
            VlrState::Failed => {
                inner.details = record.operational_status_details.clone();
            }
            _ => {}
        }
        info!(self.log, "vlr state changed"; "state" => ?target);
        Ok(true)
    }

    /// Mark the VL ready without a network request. Used when an external
    /// orchestrator provisions the network itself.
    pub async fn mark_active(&self) -> Result<(), OrchestratorError> {
        {
            let mut inner = lock(&self.inner);
            if inner.state.is_final() {
                return Ok(());
            }
            inner.state = VlrState::Active;
        }
        self.publish().await
    }

    // ── Termination ─────────────────────────────────────────────────

    /// Release the network and remove the record. A VLR that never got
    /// past INIT, or is already TERMINATED, is left alone.
    pub async fn terminate(&self) {
        self.teardown(true).await
    }

    /// Remove the record without a network request.
    pub async fn mark_terminated(&self) {
        self.teardown(false).await
    }

    async fn teardown(&self, release_network: bool) {
        let network_id = {
            let mut inner = lock(&self.inner);
            if !inner.state.in_use() {
                debug!(self.log, "vlr not in use, nothing to terminate"; "state" => ?inner.state);
                return;
            }
            if inner.state == VlrState::TerminatePending {
                return;
            }
            inner.state = VlrState::TerminatePending;
            inner.network_id.clone()
        };

        if release_network {
            if let Err(e) = self
                .ctx
                .collaborators()
                .networks
                .delete_network(&self.id, network_id.as_deref())
                .await
            {
                warn!(self.log, "network delete failed"; "error" => %e);
            }
        }
        match self.ctx.store().delete(&paths::vlr(&self.id)).await {
            Ok(()) | Err(StoreError::NotFound { .. }) => {}
            Err(e) => warn!(self.log, "vlr record delete failed"; "error" => %e),
        }
        self.ctx.remove_vlr(&self.id);
        lock(&self.inner).state = VlrState::Terminated;
        info!(self.log, "vlr terminated");
    }
}

fn owner_refs(owner: &VlrOwner) -> (Option<String>, Option<String>) {
    match owner {
        VlrOwner::Nsr(id) => (Some(id.clone()), None),
        VlrOwner::Vnfr(id) => (None, Some(id.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimCloud;
    use nfvo_descriptor::Vld;

    fn vld(name: &str) -> Vld {
        serde_json::from_value(serde_json::json!({ "id": format!("{}-id", name), "name": name }))
            .unwrap()
    }

    fn spec(name: &str) -> VlrSpec {
        VlrSpec::for_vld("proj", "nsr-1", "ns", &vld(name), "dc1", None)
    }

    #[test]
    fn names_follow_vld() {
        let mut v = vld("data");
        assert_eq!(vlr_name("proj", "ns", &v), "proj.ns.data");
        v.vim_network_name = Some("physnet".into());
        assert_eq!(vlr_name("proj", "ns", &v), "physnet");
        assert_eq!(vlr_name("proj", "ns", &vld("multisite")), "multisite");
    }

    #[tokio::test]
    async fn running_response_activates_and_publishes() {
        let cloud = SimCloud::new();
        let ctx = cloud.test_context();
        let vlr = Vlr::create(&ctx, spec("data"), false).await.unwrap();
        vlr.instantiate(false).await.unwrap();

        assert_eq!(vlr.state(), VlrState::Active);
        assert!(vlr.network_id().is_some());
        let record: VlrRecord = read_as(ctx.store(), &paths::vlr(vlr.id()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.operational_status, "running");
        assert_eq!(ctx.vlr_owner(vlr.id()), Some(VlrOwner::Nsr("nsr-1".into())));
    }

    #[tokio::test]
    async fn empty_response_fails_once() {
        let cloud = SimCloud::new();
        cloud.networks.empty_response("data");
        let ctx = cloud.test_context();
        let vlr = Vlr::create(&ctx, spec("data"), false).await.unwrap();
        vlr.instantiate(false).await.unwrap();

        assert_eq!(vlr.state(), VlrState::Failed);
        assert!(vlr.network_id().is_none());
        assert_eq!(vlr.take_failure().as_deref(), Some("empty response"));
        assert_eq!(vlr.take_failure(), None);
    }

    #[tokio::test]
    async fn status_events_never_move_backwards() {
        let cloud = SimCloud::new();
        cloud.networks.pending_vld("data", None);
        let ctx = cloud.test_context();
        let vlr = Vlr::create(&ctx, spec("data"), false).await.unwrap();
        vlr.instantiate(false).await.unwrap();
        assert_eq!(vlr.state(), VlrState::InstantiationPending);

        let mut record = vlr.to_record();
        record.operational_status = "running".into();
        record.network_id = Some("net-9".into());
        assert!(vlr.apply_status(&record).unwrap());
        assert_eq!(vlr.network_id().as_deref(), Some("net-9"));

        record.operational_status = "vl_alloc_pending".into();
        assert!(!vlr.apply_status(&record).unwrap());
        assert_eq!(vlr.state(), VlrState::Active);

        record.operational_status = "bogus".into();
        assert!(matches!(
            vlr.apply_status(&record),
            Err(OrchestratorError::Internal { .. })
        ));
    }

    #[tokio::test]
    async fn restart_reuses_id_without_new_network() {
        let cloud = SimCloud::new();
        let ctx = cloud.test_context();
        let first = Vlr::create(&ctx, spec("data"), false).await.unwrap();
        first.instantiate(false).await.unwrap();
        assert_eq!(cloud.networks.created().len(), 1);

        let again = Vlr::create(&ctx, spec("data"), true).await.unwrap();
        assert_eq!(again.id(), first.id());
        again.instantiate(true).await.unwrap();
        assert_eq!(again.state(), VlrState::Active);
        assert_eq!(cloud.networks.created().len(), 1);
    }

    #[tokio::test]
    async fn terminate_only_releases_used_links() {
        let cloud = SimCloud::new();
        let ctx = cloud.test_context();
        let idle = Vlr::create(&ctx, spec("idle"), false).await.unwrap();
        idle.terminate().await;
        assert_eq!(idle.state(), VlrState::Init);

        let vlr = Vlr::create(&ctx, spec("data"), false).await.unwrap();
        vlr.instantiate(false).await.unwrap();
        vlr.terminate().await;
        assert_eq!(vlr.state(), VlrState::Terminated);
        assert_eq!(cloud.networks.deleted(), vec![vlr.id().to_string()]);
        assert!(ctx.store().read(&paths::vlr(vlr.id())).await.unwrap().is_none());
        assert!(ctx.vlr_owner(vlr.id()).is_none());

        vlr.terminate().await;
        assert_eq!(cloud.networks.deleted().len(), 1);
    }
}
