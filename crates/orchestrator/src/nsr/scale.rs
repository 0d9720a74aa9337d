//! Operations on a running NS: scaling and dynamic virtual links.

use std::sync::Arc;

use nfvo_descriptor::{ScalingTrigger, Vld};
use slog::{info, warn};

use super::{Nsr, NsrState};
use crate::error::OrchestratorError;
use crate::lock;
use crate::scaling::{InstanceConfigStatus, InstanceState};
use crate::vlr::{Vlr, VlrRecord, VlrSpec, VlrState};
use crate::vnfr::ScalingRef;

impl Nsr {
    // ── Scaling ─────────────────────────────────────────────────────

    /// Add an instance to `group` and start its VNFs. Returns the id of
    /// the new instance.
    ///
    /// Only a RUNNING NS with no scaling operation in progress can scale.
    /// The id defaults to one past the highest in use.
    pub async fn scale_out(
        self: &Arc<Self>,
        group: &str,
        instance_id: Option<u32>,
    ) -> Result<u32, OrchestratorError> {
        let id = {
            let mut inner = lock(&self.inner);
            if inner.state != NsrState::Running {
                return Err(OrchestratorError::ScalingOperation {
                    message: format!("cannot scale {} in state {}", self.name, inner.state),
                });
            }
            if inner.scaling_groups.iter().any(|g| g.is_scaling()) {
                return Err(OrchestratorError::ScalingOperation {
                    message: format!("{} already has a scaling operation in progress", self.name),
                });
            }
            let g = inner.group_mut(group).ok_or_else(|| OrchestratorError::ScalingOperation {
                message: format!("unknown scaling group {}", group),
            })?;
            let id = g.validate_scale_out(instance_id)?;
            g.add_instance(id, false);
            inner.enter(NsrState::ScalingOut);
            inner.events.record(
                "scale-out",
                &format!("Scaling out {} with instance {}", group, id),
                None,
            );
            id
        };
        self.announce(NsrState::ScalingOut);
        self.publish_opdata_quietly().await;

        self.instantiate_scaling_instance(group, id).await?;
        Ok(id)
    }

    /// Run the pre-scale-out hook, then create and start the instance's
    /// VNFRs. The instance must already be registered in its group.
    pub(super) async fn instantiate_scaling_instance(
        self: &Arc<Self>,
        group: &str,
        instance_id: u32,
    ) -> Result<(), OrchestratorError> {
        info!(self.log, "instantiating scaling instance"; "group" => group, "instance" => instance_id);
        if !self
            .run_hook(group, instance_id, ScalingTrigger::PreScaleOut)
            .await
        {
            {
                let mut inner = lock(&self.inner);
                if let Some(instance) = inner
                    .group_mut(group)
                    .and_then(|g| g.instance_mut(instance_id))
                {
                    instance.state = InstanceState::Failed;
                    instance.config_status = InstanceConfigStatus::Failed;
                }
                inner.events.record(
                    "config-failed",
                    &format!("pre-scale-out hook failed for {} instance {}", group, instance_id),
                    None,
                );
            }
            self.update_state().await;
            return Err(OrchestratorError::ScalingOperation {
                message: format!("pre-scale-out hook failed for {} instance {}", group, instance_id),
            });
        }

        let members = self
            .nsd
            .scaling_group(group)
            .map(|d| d.vnfd_member.clone())
            .unwrap_or_default();
        let mut vnfrs = Vec::new();
        for member in &members {
            for _ in 0..member.count {
                let scaling = ScalingRef {
                    group: group.to_string(),
                    instance_id,
                };
                match self.create_vnfr(member.member_vnf_index_ref, Some(scaling)).await {
                    Ok(vnfr) => vnfrs.push(vnfr),
                    Err(e) => {
                        self.abandon_instance(group, instance_id, &e).await;
                        return Err(e);
                    }
                }
            }
        }

        {
            let mut inner = lock(&self.inner);
            if let Some(instance) = inner
                .group_mut(group)
                .and_then(|g| g.instance_mut(instance_id))
            {
                instance.state = InstanceState::VnfInitPhase;
                instance.vnfrs = vnfrs.clone();
            }
        }
        self.publish_opdata_quietly().await;

        for vnfr in &vnfrs {
            if let Err(e) = self
                .plugin
                .instantiate_vnf(self, vnfr, self.restart_mode)
                .await
            {
                warn!(self.log, "scaled vnf instantiation failed"; "vnfr" => vnfr.name(), "error" => %e);
            }
        }
        self.update_state().await;
        Ok(())
    }

    async fn abandon_instance(&self, group: &str, instance_id: u32, error: &OrchestratorError) {
        {
            let mut inner = lock(&self.inner);
            if let Some(instance) = inner
                .group_mut(group)
                .and_then(|g| g.instance_mut(instance_id))
            {
                instance.state = InstanceState::Failed;
                instance.config_status = InstanceConfigStatus::Failed;
            }
            inner.events.record(
                "scale-out-failed",
                &format!("Instance {} of {} could not be created", instance_id, group),
                Some(error.to_string()),
            );
        }
        self.update_state().await;
    }

    /// Remove a non-default instance from `group`.
    ///
    /// The pre-scale-in hook runs first; its failure is logged and the
    /// removal goes ahead. The instance is dropped from the group once its
    /// VNFRs are gone and the post-scale-in hook ran.
    pub async fn scale_in(
        self: &Arc<Self>,
        group: &str,
        instance_id: u32,
    ) -> Result<(), OrchestratorError> {
        {
            let mut inner = lock(&self.inner);
            if inner.state != NsrState::Running {
                return Err(OrchestratorError::ScalingOperation {
                    message: format!("cannot scale {} in state {}", self.name, inner.state),
                });
            }
            if inner.scaling_groups.iter().any(|g| g.is_scaling()) {
                return Err(OrchestratorError::ScalingOperation {
                    message: format!("{} already has a scaling operation in progress", self.name),
                });
            }
            let g = inner.group_mut(group).ok_or_else(|| OrchestratorError::ScalingOperation {
                message: format!("unknown scaling group {}", group),
            })?;
            g.validate_scale_in(instance_id)?;
            if let Some(instance) = g.instance_mut(instance_id) {
                instance.state = InstanceState::Terminate;
            }
            inner.enter(NsrState::ScalingIn);
            inner.events.record(
                "scale-in",
                &format!("Scaling in instance {} of {}", instance_id, group),
                None,
            );
        }
        self.announce(NsrState::ScalingIn);
        self.publish_opdata_quietly().await;

        if !self
            .run_hook(group, instance_id, ScalingTrigger::PreScaleIn)
            .await
        {
            warn!(self.log, "pre-scale-in hook failed"; "group" => group, "instance" => instance_id);
        }

        let vnfrs = {
            let mut inner = lock(&self.inner);
            match inner
                .group_mut(group)
                .and_then(|g| g.instance_mut(instance_id))
            {
                Some(instance) => {
                    instance.state = InstanceState::VnfTerminatePhase;
                    instance.vnfrs.clone()
                }
                None => Vec::new(),
            }
        };
        for vnfr in &vnfrs {
            self.plugin.terminate_vnf(self, vnfr).await;
        }
        self.update_state().await;
        Ok(())
    }

    // ── Dynamic virtual links ───────────────────────────────────────

    /// Add a VL to a RUNNING NS. Returns the new VLR id.
    pub async fn create_vl_instance(self: &Arc<Self>, vld: Vld) -> Result<String, OrchestratorError> {
        {
            let mut inner = lock(&self.inner);
            if inner.state != NsrState::Running {
                return Err(OrchestratorError::NsrVlUpdate {
                    message: format!("cannot add a vl to {} in state {}", self.name, inner.state),
                });
            }
            if inner
                .vlrs
                .iter()
                .any(|v| v.vld_ref() == vld.id && v.state() != VlrState::Terminated)
            {
                return Err(OrchestratorError::NsrVlUpdate {
                    message: format!("vl {} already exists in {}", vld.id, self.name),
                });
            }
            inner.enter(NsrState::VlInstantiate);
            inner
                .events
                .record("vl-add", &format!("Adding virtual link {}", vld.name), None);
        }
        self.announce(NsrState::VlInstantiate);

        let datacenter = vld
            .datacenter
            .clone()
            .unwrap_or_else(|| self.primary_datacenter());
        let spec = VlrSpec::for_vld(
            &self.ctx.config().project,
            &self.id,
            &self.name,
            &vld,
            &datacenter,
            self.ip_profile_params(&vld),
        );
        let vlr = match Vlr::create(&self.ctx, spec, false).await {
            Ok(vlr) => vlr,
            Err(e) => {
                self.fail("Virtual link creation failed", Some(e.to_string())).await;
                return Err(e);
            }
        };
        lock(&self.inner).vlrs.push(vlr.clone());
        if let Err(e) = self.plugin.instantiate_vl(self, &vlr).await {
            warn!(self.log, "vl instantiation failed"; "vld" => &vld.id, "error" => %e);
        }
        self.update_state().await;
        Ok(vlr.id().to_string())
    }

    /// Remove the VL instantiated for `vld_id` from a RUNNING NS.
    pub async fn delete_vl_instance(self: &Arc<Self>, vld_id: &str) -> Result<(), OrchestratorError> {
        let vlr = {
            let mut inner = lock(&self.inner);
            if inner.state != NsrState::Running {
                return Err(OrchestratorError::NsrVlUpdate {
                    message: format!("cannot remove a vl from {} in state {}", self.name, inner.state),
                });
            }
            let vlr = inner
                .vlrs
                .iter()
                .find(|v| v.vld_ref() == vld_id)
                .cloned()
                .ok_or_else(|| OrchestratorError::NsrVlUpdate {
                    message: format!("vl {} not found in {}", vld_id, self.name),
                })?;
            inner.enter(NsrState::VlTerminate);
            inner
                .events
                .record("vl-remove", &format!("Removing virtual link {}", vld_id), None);
            vlr
        };
        self.announce(NsrState::VlTerminate);

        self.plugin.terminate_vl(&vlr).await;
        lock(&self.inner).vlrs.retain(|v| v.id() != vlr.id());
        self.ctx.remove_vlr(vlr.id());
        self.update_state().await;
        Ok(())
    }

    /// Apply a status update for one of this NS's VLRs. Returns whether
    /// the VLR changed; unknown ids are ignored.
    pub async fn vlr_event(&self, record: &VlrRecord) -> Result<bool, OrchestratorError> {
        let Some(vlr) = self.vlrs().into_iter().find(|v| v.id() == record.id) else {
            self.debug_ignored("event for unknown vlr");
            return Ok(false);
        };
        let changed = vlr.apply_status(record)?;
        if changed {
            self.update_state().await;
        }
        Ok(changed)
    }
}
