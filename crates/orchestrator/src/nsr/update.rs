//! Folding child states into the NS state.

use std::sync::Arc;

use nfvo_descriptor::ScalingTrigger;
use slog::{debug, info, warn};

use super::{ConfigStatus, Nsr, NsrInner, NsrState};
use crate::lock;
use crate::scaling::{self, InstanceConfigStatus, ScalingAction};
use crate::vlr::VlrState;
use crate::vnffgr::VnffgrState;
use crate::vnfr::VnfrState;

/// The state the children call for, or `None` to keep the current one.
fn next_state(inner: &NsrInner) -> Option<NsrState> {
    let current = inner.state;
    if current == NsrState::Failed {
        return None;
    }

    if inner.vlrs.iter().any(|v| v.state() == VlrState::Failed) {
        return Some(NsrState::Failed);
    }
    if inner.was_active {
        if inner
            .vlrs
            .iter()
            .any(|v| matches!(v.state(), VlrState::Init | VlrState::InstantiationPending))
        {
            return Some(NsrState::VlInstantiate);
        }
        if inner
            .vlrs
            .iter()
            .any(|v| v.state() == VlrState::TerminatePending)
        {
            return Some(NsrState::VlTerminate);
        }
    }

    let vnfrs = inner.all_vnfrs();
    let decisive = |id: &str| {
        !inner.was_active || !inner.scaling_groups.iter().any(|g| g.is_confined(id))
    };
    if vnfrs
        .iter()
        .any(|v| v.state() == VnfrState::Failed && decisive(v.id()))
    {
        let scaling = matches!(current, NsrState::ScalingOut | NsrState::ScalingIn);
        return Some(if inner.was_active && scaling {
            NsrState::Running
        } else {
            NsrState::Failed
        });
    }
    if inner
        .vnffgrs
        .iter()
        .any(|f| f.state() == VnffgrState::Failed)
    {
        return Some(NsrState::Failed);
    }

    if inner.instantiating {
        return None;
    }
    if let Some(direction) = inner.scaling_groups.iter().find_map(|g| g.direction()) {
        return Some(match direction {
            scaling::ScaleDirection::Out => NsrState::ScalingOut,
            scaling::ScaleDirection::In => NsrState::ScalingIn,
        });
    }

    let vnfrs_up = vnfrs
        .iter()
        .filter(|v| decisive(v.id()))
        .all(|v| matches!(v.state(), VnfrState::Ready | VnfrState::Terminated));
    let vnffgrs_up = inner
        .vnffgrs
        .iter()
        .all(|f| f.state() == VnffgrState::Active);
    if vnfrs_up && vnffgrs_up {
        return Some(NsrState::Running);
    }
    None
}

impl Nsr {
    pub(super) async fn recompute(&self) {
        let _gate = self.gate.lock().await;

        let (entered, actions) = {
            let mut inner = lock(&self.inner);
            if inner.terminate_requested
                || inner.state.is_terminating()
                || inner.state == NsrState::Init
            {
                return;
            }

            let mut actions = Vec::new();
            for group in inner.scaling_groups.iter_mut() {
                actions.extend(group.refresh());
            }
            for vlr in inner.vlrs.clone() {
                if let Some(details) = vlr.take_failure() {
                    inner.events.record(
                        "vl-failed",
                        &format!("Virtual link {} failed", vlr.name()),
                        Some(details),
                    );
                }
            }
            for vnfr in inner.all_vnfrs() {
                if let Some(details) = vnfr.take_failure_report() {
                    inner.events.record(
                        "vnf-failed",
                        &format!("VNF {} failed", vnfr.name()),
                        Some(details),
                    );
                }
            }
            for vnffgr in inner.vnffgrs.clone() {
                if let Some(details) = vnffgr.take_failure() {
                    inner.events.record(
                        "vnffg-failed",
                        &format!("VNFFG {} failed", vnffgr.name()),
                        Some(details),
                    );
                }
            }

            let entered = match next_state(&inner) {
                Some(next) if inner.enter(next) => Some(next),
                _ => None,
            };
            match entered {
                Some(NsrState::Running) => {
                    inner.config_status = ConfigStatus::Configured;
                    if !inner.was_active {
                        inner.was_active = true;
                        inner
                            .events
                            .record("ns-running", "Network service is running", None);
                    }
                }
                Some(NsrState::Failed) => {
                    inner.config_status = ConfigStatus::Failed;
                    inner
                        .events
                        .record("ns-failed", "Network service failed", None);
                }
                _ => {}
            }
            (entered, actions)
        };

        if let Some(state) = entered {
            self.announce(state);
        } else {
            debug!(self.log, "nsr state unchanged"; "state" => self.state().as_str());
        }
        self.publish_opdata_quietly().await;
        drop(_gate);

        for action in actions {
            self.schedule(action);
        }
    }

    /// Run the hook for a settled scaling instance in the background.
    fn schedule(&self, action: ScalingAction) {
        let Some(me) = self.me.upgrade() else {
            return;
        };
        let (group, instance_id, trigger) = match &action {
            ScalingAction::PostScaleOut { group, instance_id } => {
                (group.clone(), *instance_id, ScalingTrigger::PostScaleOut)
            }
            ScalingAction::PostScaleIn { group, instance_id } => {
                (group.clone(), *instance_id, ScalingTrigger::PostScaleIn)
            }
        };
        let name = format!("scaling-hook-{}-{}-{}", group, instance_id, trigger.as_str());
        self.tasks.spawn(name, async move {
            match trigger {
                ScalingTrigger::PostScaleOut => me.post_scale_out(&group, instance_id).await,
                _ => me.post_scale_in(&group, instance_id).await,
            }
        });
    }

    async fn post_scale_out(self: Arc<Self>, group: &str, instance_id: u32) {
        let ok = self
            .run_hook(group, instance_id, ScalingTrigger::PostScaleOut)
            .await;
        {
            let mut inner = lock(&self.inner);
            if let Some(instance) = inner
                .group_mut(group)
                .and_then(|g| g.instance_mut(instance_id))
            {
                instance.config_status = if ok {
                    InstanceConfigStatus::Configured
                } else {
                    InstanceConfigStatus::Failed
                };
            }
            if !ok {
                inner.events.record(
                    "config-failed",
                    &format!("post-scale-out hook failed for {} instance {}", group, instance_id),
                    None,
                );
            }
        }
        info!(self.log, "scale-out complete"; "group" => group, "instance" => instance_id, "configured" => ok);
        self.publish_opdata_quietly().await;
    }

    async fn post_scale_in(self: Arc<Self>, group: &str, instance_id: u32) {
        if !self
            .run_hook(group, instance_id, ScalingTrigger::PostScaleIn)
            .await
        {
            warn!(self.log, "post-scale-in hook failed"; "group" => group, "instance" => instance_id);
        }
        if let Some(g) = lock(&self.inner).group_mut(group) {
            g.remove_instance(instance_id);
        }
        info!(self.log, "scale-in complete"; "group" => group, "instance" => instance_id);
        self.update_state().await;
    }

    /// Run a scaling hook. A group without a config action for `trigger`
    /// counts as success.
    pub(super) async fn run_hook(
        &self,
        group: &str,
        instance_id: u32,
        trigger: ScalingTrigger,
    ) -> bool {
        let vnfrs = lock(&self.inner)
            .group(group)
            .and_then(|g| g.instance(instance_id))
            .map(|i| i.vnfrs.clone())
            .unwrap_or_default();
        let request = match scaling::hook_request(
            &self.nsd,
            &self.id,
            &self.name,
            group,
            instance_id,
            trigger,
            &vnfrs,
        ) {
            Ok(Some(request)) => request,
            Ok(None) => return true,
            Err(e) => {
                warn!(self.log, "scaling hook request failed"; "trigger" => trigger.as_str(), "error" => %e);
                return false;
            }
        };
        let timeout = self.ctx.timeouts().scale_hook();
        match self
            .ctx
            .collaborators()
            .config_agent
            .run_scaling_hook(&request, timeout)
            .await
        {
            Ok(ok) => ok,
            Err(e) => {
                warn!(self.log, "scaling hook failed"; "trigger" => trigger.as_str(), "error" => %e);
                false
            }
        }
    }
}
