//! VDU records: one VM each.

use std::sync::{Arc, Mutex, Weak};

use nfvo_descriptor::{InterfaceKind, Vdu, VmFlavor};
use nfvo_store::{Action, StoreError, Subscription};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use slog::{debug, info, o, warn, Logger};

use crate::collaborator::{ResourceState, VmConnectionPoint, VmInfo, VmRequest};
use crate::context::OrchestratorContext;
use crate::error::OrchestratorError;
use crate::lock;
use crate::paths;
use crate::vnfr::Vnfr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VdurState {
    Init,
    Instantiating,
    ResourceAllocPending,
    Ready,
    Terminating,
    Terminated,
    Failed,
}

impl VdurState {
    /// READY, FAILED or TERMINATED: nothing more will happen without a
    /// terminate request.
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            VdurState::Ready | VdurState::Failed | VdurState::Terminated
        )
    }
}

/// A VDUR as listed on its VNFR record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VdurRecord {
    pub id: String,
    pub vdu_id_ref: String,
    pub name: String,
    pub unique_short_name: String,
    pub operational_status: VdurState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_management_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavor: Option<VmFlavor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

#[derive(Debug)]
struct VdurInner {
    state: VdurState,
    was_ready: bool,
    vm: Option<VmInfo>,
    failure: Option<String>,
}

pub struct Vdur {
    id: String,
    name: String,
    unique_short_name: String,
    vdu: Vdu,
    is_mgmt: bool,
    vnfr: Weak<Vnfr>,
    ctx: Arc<OrchestratorContext>,
    log: Logger,
    inner: Mutex<VdurInner>,
}

impl Vdur {
    /// `id` is given when a restarted VNFR already published this VDUR.
    pub fn new(
        ctx: &Arc<OrchestratorContext>,
        vnfr: &Arc<Vnfr>,
        vdu: &Vdu,
        name: String,
        id: Option<String>,
    ) -> Arc<Vdur> {
        let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let log = vnfr
            .log()
            .new(o!("vdur_id" => id.clone(), "vdu" => vdu.id.clone()));
        let vdur = Arc::new(Vdur {
            unique_short_name: unique_short_name(vnfr.nsr_name(), &name, &vdu.id),
            id,
            name,
            is_mgmt: vnfr.vnfd().mgmt_vdu_id() == Some(vdu.id.as_str()),
            vdu: vdu.clone(),
            vnfr: Arc::downgrade(vnfr),
            ctx: ctx.clone(),
            log,
            inner: Mutex::new(VdurInner {
                state: VdurState::Init,
                was_ready: false,
                vm: None,
                failure: None,
            }),
        });
        ctx.register_vdur(&vdur);
        vdur
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unique_short_name(&self) -> &str {
        &self.unique_short_name
    }

    pub fn vdu_id(&self) -> &str {
        &self.vdu.id
    }

    pub fn vdu(&self) -> &Vdu {
        &self.vdu
    }

    pub fn is_mgmt(&self) -> bool {
        self.is_mgmt
    }

    pub fn state(&self) -> VdurState {
        lock(&self.inner).state
    }

    /// Whether this VDUR ever reached READY.
    pub fn was_ready(&self) -> bool {
        lock(&self.inner).was_ready
    }

    /// Whether a VDU whose cloud-init reads from this one may go ahead: it
    /// must have reached READY, and not failed since. A later terminate
    /// does not count against it.
    pub fn satisfies_dependency(&self) -> bool {
        let inner = lock(&self.inner);
        inner.was_ready && inner.state != VdurState::Failed
    }

    pub fn failure(&self) -> Option<String> {
        lock(&self.inner).failure.clone()
    }

    pub fn vm_info(&self) -> Option<VmInfo> {
        lock(&self.inner).vm.clone()
    }

    /// The address to manage the VM on, public first. Only set while
    /// READY.
    pub fn management_ip(&self) -> Option<String> {
        let inner = lock(&self.inner);
        if inner.state != VdurState::Ready {
            return None;
        }
        let vm = inner.vm.as_ref()?;
        vm.public_ip.clone().or_else(|| vm.management_ip.clone())
    }

    pub fn to_record(&self) -> VdurRecord {
        let inner = lock(&self.inner);
        let mgmt = if inner.state == VdurState::Ready {
            inner
                .vm
                .as_ref()
                .and_then(|vm| vm.public_ip.clone().or_else(|| vm.management_ip.clone()))
        } else {
            None
        };
        VdurRecord {
            id: self.id.clone(),
            vdu_id_ref: self.vdu.id.clone(),
            name: self.name.clone(),
            unique_short_name: self.unique_short_name.clone(),
            operational_status: inner.state,
            vm_management_ip: mgmt,
            vm_id: inner.vm.as_ref().and_then(|vm| vm.vm_id.clone()),
            image: self.vdu.image.clone(),
            flavor: self.vdu.vm_flavor.clone(),
            failure: inner.failure.clone(),
        }
    }

    // ── Instantiation ───────────────────────────────────────────────

    /// The VM request for this VDUR. Every bound interface needs its VL's
    /// network id.
    pub fn build_request(
        &self,
        vnfr: &Vnfr,
        cloud_init: Option<String>,
    ) -> Result<VmRequest, OrchestratorError> {
        let mut connection_points = Vec::new();
        for iface in &self.vdu.interface {
            let port = match iface.kind {
                InterfaceKind::External => {
                    let cp = iface
                        .external_connection_point_ref
                        .clone()
                        .unwrap_or_else(|| iface.name.clone());
                    let cpd = vnfr.vnfd().connection_point(&cp).cloned().ok_or_else(|| {
                        OrchestratorError::VduRecord {
                            message: format!(
                                "interface {} of {} references unknown connection point {}",
                                iface.name, self.vdu.id, cp
                            ),
                        }
                    })?;
                    let Some(vlr) = vnfr.cp_vlr(&cp) else {
                        debug!(self.log, "connection point not bound to a VL"; "cp" => &cp);
                        continue;
                    };
                    let network_id = vlr.network_id().ok_or_else(|| OrchestratorError::VduRecord {
                        message: format!(
                            "VL {} for connection point {} has no network id",
                            vlr.name(),
                            cp
                        ),
                    })?;
                    VmConnectionPoint {
                        name: cp,
                        virtual_link_id: network_id,
                        port_security_enabled: cpd.port_security_enabled,
                        static_ip_address: iface.static_ip_address.clone(),
                        port_order: iface.position,
                        vpci: iface.virtual_interface.as_ref().and_then(|v| v.vpci.clone()),
                    }
                }
                InterfaceKind::Internal => {
                    let icp_id = iface.internal_connection_point_ref.clone().ok_or_else(|| {
                        OrchestratorError::VduRecord {
                            message: format!(
                                "internal interface {} of {} has no connection point",
                                iface.name, self.vdu.id
                            ),
                        }
                    })?;
                    let icp = self.vdu.internal_connection_point(&icp_id).ok_or_else(|| {
                        OrchestratorError::VduRecord {
                            message: format!(
                                "interface {} references unknown internal connection point {}",
                                iface.name, icp_id
                            ),
                        }
                    })?;
                    let vlr = vnfr.internal_vlr_for_icp(&icp_id).ok_or_else(|| {
                        OrchestratorError::VduRecord {
                            message: format!("no internal VL for connection point {}", icp_id),
                        }
                    })?;
                    let network_id = vlr.network_id().ok_or_else(|| OrchestratorError::VduRecord {
                        message: format!(
                            "internal VL {} for connection point {} has no network id",
                            vlr.name(),
                            icp_id
                        ),
                    })?;
                    VmConnectionPoint {
                        name: icp.name.clone().unwrap_or_else(|| icp.id.clone()),
                        virtual_link_id: network_id,
                        port_security_enabled: icp.port_security_enabled,
                        static_ip_address: iface.static_ip_address.clone(),
                        port_order: iface.position,
                        vpci: iface.virtual_interface.as_ref().and_then(|v| v.vpci.clone()),
                    }
                }
            };
            connection_points.push(port);
        }

        Ok(VmRequest {
            request_id: self.id.clone(),
            name: self.unique_short_name.clone(),
            node_id: self.name.clone(),
            vdu_id_ref: self.vdu.id.clone(),
            datacenter: vnfr.datacenter().to_string(),
            image: self.vdu.image.clone(),
            image_checksum: self.vdu.image_checksum.clone(),
            flavor: self.vdu.vm_flavor.clone().unwrap_or_default(),
            volumes: self.vdu.volumes.clone(),
            allocate_public_address: self.is_mgmt,
            cloud_init,
            connection_points,
        })
    }

    /// Request the VM. Failures move the VDUR to FAILED and are reported
    /// to the owning VNFR.
    pub async fn instantiate(
        self: &Arc<Self>,
        vnfr: &Arc<Vnfr>,
        cloud_init: Option<String>,
        restart_mode: bool,
    ) {
        if let Err(e) = self.try_instantiate(vnfr, cloud_init, restart_mode).await {
            self.fail(e.to_string()).await;
        }
    }

    async fn try_instantiate(
        self: &Arc<Self>,
        vnfr: &Arc<Vnfr>,
        cloud_init: Option<String>,
        restart_mode: bool,
    ) -> Result<(), OrchestratorError> {
        {
            let mut inner = lock(&self.inner);
            if inner.state != VdurState::Init {
                debug!(self.log, "vdur already instantiated"; "state" => ?inner.state);
                return Ok(());
            }
            inner.state = VdurState::Instantiating;
        }

        let resources = self.ctx.collaborators().resources.clone();
        let events = self.ctx.store().subscribe(&paths::vdu_event(&self.id));

        if restart_mode {
            if let Some(info) = resources.read_vm(&self.id).await? {
                info!(self.log, "reusing existing vm"; "state" => ?info.resource_state);
                lock(&self.inner).state = VdurState::ResourceAllocPending;
                if !self.apply_vm_info(info).await {
                    self.watch(vnfr, events);
                }
                return Ok(());
            }
        }

        let request = self.build_request(vnfr, cloud_init)?;
        lock(&self.inner).state = VdurState::ResourceAllocPending;
        info!(self.log, "requesting vm"; "name" => &self.unique_short_name);
        let info = resources
            .create_vm(request)
            .await
            .map_err(|e| OrchestratorError::Resource {
                message: e.to_string(),
            })?;
        if !self.apply_vm_info(info).await {
            self.watch(vnfr, events);
        }
        Ok(())
    }

    /// Follow `resource-mgmt/vdu-event/<id>` until the VM settles.
    fn watch(self: &Arc<Self>, vnfr: &Vnfr, mut events: Subscription) {
        let this = self.clone();
        vnfr.tasks().spawn(format!("vdu-event-{}", self.id), async move {
            loop {
                let info = match events.recv().await {
                    Ok(event) if event.action == Action::Delete => continue,
                    Ok(event) => match serde_json::from_value::<VmInfo>(event.value) {
                        Ok(info) => Some(info),
                        Err(e) => {
                            warn!(this.log, "unreadable vdu event"; "error" => %e);
                            None
                        }
                    },
                    Err(StoreError::Lagged { skipped }) => {
                        warn!(this.log, "vdu events lagged, re-reading"; "skipped" => skipped);
                        match this.ctx.collaborators().resources.read_vm(&this.id).await {
                            Ok(info) => info,
                            Err(e) => {
                                warn!(this.log, "vm read failed"; "error" => %e);
                                None
                            }
                        }
                    }
                    Err(_) => return,
                };
                if let Some(info) = info {
                    if this.apply_vm_info(info).await {
                        return;
                    }
                }
            }
        });
    }

    /// Fold a resource manager report into the state. Returns true once
    /// the VDUR no longer waits on the VM.
    pub async fn apply_vm_info(self: &Arc<Self>, info: VmInfo) -> bool {
        let outcome = {
            let mut inner = lock(&self.inner);
            if !matches!(
                inner.state,
                VdurState::Instantiating | VdurState::ResourceAllocPending
            ) {
                debug!(self.log, "ignoring vm report"; "state" => ?inner.state);
                return true;
            }
            match info.resource_state {
                ResourceState::Pending => {
                    inner.vm = Some(info);
                    return false;
                }
                ResourceState::Active => {
                    inner.state = VdurState::Ready;
                    inner.was_ready = true;
                    inner.vm = Some(info);
                    None
                }
                ResourceState::Failed => {
                    let reason = info
                        .detail
                        .clone()
                        .unwrap_or_else(|| format!("VM for {} failed", self.vdu.id));
                    inner.state = VdurState::Failed;
                    inner.failure = Some(reason.clone());
                    inner.vm = Some(info);
                    Some(reason)
                }
            }
        };

        let Some(vnfr) = self.vnfr.upgrade() else {
            return true;
        };
        match outcome {
            None => {
                info!(self.log, "vdur ready"; "mgmt_ip" => self.management_ip());
                vnfr.datastore().set_mgmt_ip(&self.vdu.id, self.management_ip());
                vnfr.on_vdur_ready().await;
            }
            Some(reason) => {
                warn!(self.log, "vdur failed"; "reason" => &reason);
                vnfr.on_vdur_failed(&self.name, &reason).await;
            }
        }
        true
    }

    /// Move to FAILED outside of a resource manager report.
    pub async fn fail(&self, reason: String) {
        {
            let mut inner = lock(&self.inner);
            if matches!(inner.state, VdurState::Failed | VdurState::Terminated) {
                return;
            }
            inner.state = VdurState::Failed;
            inner.failure = Some(reason.clone());
        }
        warn!(self.log, "vdur failed"; "reason" => &reason);
        if let Some(vnfr) = self.vnfr.upgrade() {
            vnfr.on_vdur_failed(&self.name, &reason).await;
        }
    }

    // ── Termination ─────────────────────────────────────────────────

    /// Delete the VM. Only READY and FAILED VDURs hold one; any other state
    /// is ignored.
    pub async fn terminate(&self) {
        {
            let mut inner = lock(&self.inner);
            if !matches!(inner.state, VdurState::Ready | VdurState::Failed) {
                debug!(self.log, "ignoring terminate"; "state" => ?inner.state);
                return;
            }
            inner.state = VdurState::Terminating;
        }
        if let Err(e) = self.ctx.collaborators().resources.delete_vm(&self.id).await {
            warn!(self.log, "vm delete failed"; "error" => %e);
        }
        self.ctx.remove_vdur(&self.id);
        if let Some(vnfr) = self.vnfr.upgrade() {
            vnfr.datastore().remove(&self.vdu.id);
        }
        lock(&self.inner).state = VdurState::Terminated;
        info!(self.log, "vdur terminated");
    }

    /// The VM console, or `None` unless READY.
    pub async fn console_url(&self) -> Result<Option<String>, OrchestratorError> {
        if self.state() != VdurState::Ready {
            return Ok(None);
        }
        self.ctx.collaborators().resources.console_url(&self.id).await
    }
}

/// `<nsr tail>-<hash>-<vdu tail>`, short enough for VIM host names.
pub fn unique_short_name(nsr_name: &str, vdur_name: &str, vdu_id: &str) -> String {
    let digest = Sha256::digest(vdur_name.as_bytes());
    let hash: String = digest.iter().take(3).map(|b| format!("{:02x}", b)).collect();
    format!("{}-{}-{}", alnum_tail(nsr_name), hash, alnum_tail(vdu_id))
}

fn alnum_tail(s: &str) -> String {
    let chars: Vec<char> = s.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    chars[chars.len().saturating_sub(10)..].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_name_layout() {
        let name = unique_short_name("my_network-service.01", "ns__vnf__1__vdu", "ping-vdu");
        let parts: Vec<&str> = name.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "kservice01");
        assert_eq!(parts[1].len(), 6);
        assert!(parts[1].chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(parts[2], "pingvdu");
    }

    #[test]
    fn short_name_is_deterministic() {
        let a = unique_short_name("ns", "ns__a__1__v", "v");
        let b = unique_short_name("ns", "ns__a__1__v", "v");
        let c = unique_short_name("ns", "ns__a__2__v", "v");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn settled_states() {
        assert!(VdurState::Ready.is_settled());
        assert!(VdurState::Failed.is_settled());
        assert!(!VdurState::ResourceAllocPending.is_settled());
    }
}
