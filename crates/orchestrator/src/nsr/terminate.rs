//! The termination pipeline.

use std::sync::Arc;

use slog::{info, warn};

use super::{Nsr, NsrState};
use crate::lock;
use crate::ssh;

impl Nsr {
    /// Tear the NS down. Repeated calls are ignored.
    ///
    /// While the instantiation pipeline is running the request is only
    /// latched (TERMINATE_RCVD); the pipeline runs the termination at its
    /// next checkpoint.
    pub async fn terminate(self: &Arc<Self>) {
        let run_now = {
            let mut inner = lock(&self.inner);
            if inner.terminate_requested {
                return;
            }
            inner.terminate_requested = true;
            inner
                .events
                .record("terminate", "Terminate request received", None);
            if inner.instantiating {
                inner.enter(NsrState::TerminateRcvd);
                false
            } else {
                inner.termination_started = true;
                true
            }
        };

        if run_now {
            self.run_termination().await;
        } else {
            info!(self.log, "terminate latched");
            self.announce(NsrState::TerminateRcvd);
            self.publish_opdata_quietly().await;
        }
    }

    /// VNFFGs, then VNFs, then VLs, then the plugin's own cleanup.
    pub(super) async fn run_termination(self: &Arc<Self>) {
        info!(self.log, "terminating nsr");
        self.set_state(NsrState::Terminate);
        self.publish_opdata_quietly().await;
        self.tasks.shutdown().await;

        let phases_started = lock(&self.inner).phases_started;
        if phases_started {
            let vnffgrs = self.vnffgrs();
            if !vnffgrs.is_empty() {
                self.enter_teardown(
                    NsrState::VnffgTerminatePhase,
                    "terminating-vnffgss",
                    "Terminating VNF forwarding graphs",
                )
                .await;
                for vnffgr in &vnffgrs {
                    vnffgr.terminate().await;
                }
            }

            self.enter_teardown(
                NsrState::VnfTerminatePhase,
                "terminating-vnfs",
                "Terminating VNFs",
            )
            .await;
            for vnfr in self.vnfrs() {
                self.plugin.terminate_vnf(self, &vnfr).await;
            }

            self.enter_teardown(
                NsrState::VlTerminatePhase,
                "terminating-vls",
                "Terminating virtual links",
            )
            .await;
            for vlr in self.vlrs() {
                self.plugin.terminate_vl(&vlr).await;
                self.ctx.remove_vlr(vlr.id());
            }

            if let Err(e) = self.plugin.terminate_ns(self).await {
                warn!(self.log, "plugin terminate failed"; "error" => %e);
            }
        }

        if let Err(e) = ssh::remove_keypair(&self.ctx.config().key_dir, &self.id) {
            warn!(self.log, "ns keypair removal failed"; "error" => %e);
        }

        {
            let mut inner = lock(&self.inner);
            inner.key_pair = None;
            inner.enter(NsrState::Terminated);
            inner
                .events
                .record("terminated", "Network service terminated", None);
        }
        self.announce(NsrState::Terminated);
        self.unpublish().await;
        self.ctx.remove_nsr(&self.id);
        info!(self.log, "nsr terminated");
    }

    async fn enter_teardown(&self, state: NsrState, event: &str, description: &str) {
        {
            let mut inner = lock(&self.inner);
            inner.enter(state);
            inner.events.record(event, description, None);
        }
        self.announce(state);
        self.publish_opdata_quietly().await;
    }
}
