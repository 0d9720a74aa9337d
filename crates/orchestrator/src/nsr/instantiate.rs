//! The instantiation pipeline.
//!
//! INIT → VL_INIT_PHASE → VNF_INIT_PHASE → (plugin deploy) →
//! [VNFFG_INIT_PHASE] → [SCALING_OUT for default instances] → RUNNING.
//! RUNNING itself is reached through [`Nsr::update_state`] once every
//! child is up.

use std::sync::Arc;

use slog::{debug, info, warn};
use tokio::time::Instant;

use super::{Nsr, NsrState};
use crate::error::OrchestratorError;
use crate::lock;
use crate::ssh;
use crate::vlr::{Vlr, VlrSpec, VlrState};
use crate::vnffgr::Vnffgr;
use crate::vnfr::{ScalingRef, Vnfr, VnfrSpec, VnfrState};
use crate::wait::poll_until;

/// Why the pipeline stopped before its last phase.
pub(super) enum Halt {
    /// A terminate request was latched.
    Terminate,
    /// The NSR already went FAILED.
    Failed,
    Error(OrchestratorError),
}

impl From<OrchestratorError> for Halt {
    fn from(e: OrchestratorError) -> Self {
        Halt::Error(e)
    }
}

impl Nsr {
    /// Run the instantiation pipeline to its end.
    ///
    /// Returns once every phase was started; the NSR turns RUNNING when
    /// its children report in. A terminate latched meanwhile runs the
    /// termination pipeline from here. Only an NSR in INIT can be
    /// instantiated.
    pub async fn instantiate(self: &Arc<Self>) -> Result<(), OrchestratorError> {
        {
            let mut inner = lock(&self.inner);
            if inner.state != NsrState::Init || inner.instantiating || inner.terminate_requested {
                return Err(OrchestratorError::NetworkServiceRecord {
                    message: format!("cannot instantiate {} in state {}", self.name, inner.state),
                });
            }
            inner.instantiating = true;
            inner.events.record("instantiating", "Instantiation request received", None);
            inner.events.record(
                "nsd-fetched",
                &format!("NSD {} fetched", self.nsd.name),
                None,
            );
        }
        info!(self.log, "instantiating nsr");
        self.publish_opdata_quietly().await;

        let result = self.run_phases().await;

        let terminate_now = {
            let mut inner = lock(&self.inner);
            inner.instantiating = false;
            if inner.terminate_requested && !inner.termination_started {
                inner.termination_started = true;
                true
            } else {
                false
            }
        };
        if terminate_now {
            info!(self.log, "terminate latched during instantiation");
            self.run_termination().await;
            return Ok(());
        }

        match result {
            Ok(()) => {
                self.update_state().await;
                Ok(())
            }
            Err(Halt::Terminate) | Err(Halt::Failed) => {
                self.publish_opdata_quietly().await;
                Ok(())
            }
            Err(Halt::Error(e)) => {
                self.fail("Instantiation failed", Some(e.to_string())).await;
                Err(e)
            }
        }
    }

    async fn run_phases(self: &Arc<Self>) -> Result<(), Halt> {
        self.checkpoint()?;
        let key_pair = ssh::generate_keypair(&self.ctx.config().key_dir, &self.id)?;
        debug!(self.log, "ns keypair generated"; "file" => %key_pair.private_key_file.display());
        lock(&self.inner).key_pair = Some(key_pair);

        self.instantiate_vls().await?;
        self.instantiate_vnfs().await?;

        // Ahead of the VNFFG phase: external-RO VNFRs only turn READY once
        // the deploy monitor sees their VMs.
        self.checkpoint()?;
        self.plugin.deploy(self).await?;

        if !self.nsd.vnffgd.is_empty() {
            self.instantiate_vnffgs().await?;
        }
        self.instantiate_default_instances().await?;
        self.checkpoint()
    }

    /// Stop if a terminate was latched or the NSR already failed.
    pub(super) fn checkpoint(&self) -> Result<(), Halt> {
        let inner = lock(&self.inner);
        if inner.terminate_requested {
            Err(Halt::Terminate)
        } else if inner.state == NsrState::Failed {
            Err(Halt::Failed)
        } else {
            Ok(())
        }
    }

    /// Checkpoint and enter the next phase under the same lock, so a
    /// terminate cannot slip in between.
    fn enter_phase(&self, state: NsrState, event: &str, description: &str) -> Result<(), Halt> {
        {
            let mut inner = lock(&self.inner);
            if inner.terminate_requested {
                return Err(Halt::Terminate);
            }
            if inner.state == NsrState::Failed {
                return Err(Halt::Failed);
            }
            inner.phases_started = true;
            inner.enter(state);
            inner.events.record(event, description, None);
        }
        self.announce(state);
        Ok(())
    }

    fn finish_phase(&self, event: &str, description: &str) {
        self.record_event(event, description, None);
    }

    // ── Virtual links ───────────────────────────────────────────────

    async fn instantiate_vls(self: &Arc<Self>) -> Result<(), Halt> {
        self.enter_phase(
            NsrState::VlInitPhase,
            "begin-external-vls-instantiation",
            "Instantiating external virtual links",
        )?;
        self.publish_opdata_quietly().await;

        let project = self.ctx.config().project.clone();
        for vld in &self.nsd.vld {
            for datacenter in self.vld_datacenters(vld) {
                self.checkpoint()?;
                let spec = VlrSpec::for_vld(
                    &project,
                    &self.id,
                    &self.name,
                    vld,
                    &datacenter,
                    self.ip_profile_params(vld),
                );
                let vlr = Vlr::create(&self.ctx, spec, self.restart_mode).await?;
                lock(&self.inner).vlrs.push(vlr.clone());
                self.plugin.instantiate_vl(self, &vlr).await?;
            }
        }

        let vlrs = self.vlrs();
        if self.plugin.waits_for_vls() {
            let timeouts = self.ctx.timeouts();
            poll_until(
                "virtual links",
                timeouts.dependency_poll(),
                timeouts.vl_ready(),
                || {
                    self.terminate_latched()
                        || vlrs.iter().any(|v| v.state() == VlrState::Failed)
                        || vlrs.iter().all(|v| v.state() == VlrState::Active)
                },
            )
            .await?;
        }
        self.checkpoint()?;
        if vlrs.iter().any(|v| v.state() == VlrState::Failed) {
            self.update_state().await;
            return Err(Halt::Failed);
        }

        lock(&self.inner).vl_phase_done = true;
        self.finish_phase(
            "end-external-vls-instantiation",
            "External virtual links instantiated",
        );
        self.publish_opdata_quietly().await;
        Ok(())
    }

    // ── VNFs ────────────────────────────────────────────────────────

    async fn instantiate_vnfs(self: &Arc<Self>) -> Result<(), Halt> {
        self.enter_phase(
            NsrState::VnfInitPhase,
            "begin-vnf-instantiation",
            "Instantiating constituent VNFs",
        )?;
        self.publish_opdata_quietly().await;

        let scaled = self.nsd.scaled_member_indexes();
        let mut created = Vec::new();
        for constituent in &self.nsd.constituent_vnfd {
            if !constituent.start_by_default || scaled.contains(&constituent.member_vnf_index) {
                debug!(self.log, "vnf not started by default";
                       "member_vnf_index" => constituent.member_vnf_index);
                continue;
            }
            self.checkpoint()?;
            let vnfr = self.create_vnfr(constituent.member_vnf_index, None).await?;
            lock(&self.inner).vnfrs.push(vnfr.clone());
            created.push(vnfr);
        }
        self.checkpoint()?;
        self.start_vnfs(created).await?;

        lock(&self.inner).vnf_phase_done = true;
        self.finish_phase("end-vnf-instantiation", "Constituent VNFs started");
        self.publish_opdata_quietly().await;
        Ok(())
    }

    /// Build one VNFR for `member_vnf_index`.
    pub(super) async fn create_vnfr(
        &self,
        member_vnf_index: u32,
        scaling: Option<ScalingRef>,
    ) -> Result<Arc<Vnfr>, OrchestratorError> {
        let constituent = self.nsd.constituent(member_vnf_index).ok_or_else(|| {
            OrchestratorError::config(format!(
                "nsd {} has no member vnf index {}",
                self.nsd.id, member_vnf_index
            ))
        })?;
        let datacenter = self.vnf_datacenter(member_vnf_index);
        let input_parameters = self
            .config
            .vnf_input_parameter
            .iter()
            .filter(|p| {
                p.member_vnf_index_ref == member_vnf_index
                    && p.vnfd_id_ref == constituent.vnfd_id_ref
            })
            .flat_map(|p| p.input_parameter.iter().cloned())
            .collect();

        let mut cp_vlrs = std::collections::HashMap::new();
        let vlrs = self.vlrs();
        for vld in &self.nsd.vld {
            let placed = vlrs
                .iter()
                .filter(|v| v.vld_ref() == vld.id)
                .find(|v| v.datacenter() == datacenter)
                .or_else(|| vlrs.iter().find(|v| v.vld_ref() == vld.id));
            let Some(vlr) = placed else {
                continue;
            };
            for cp in vld
                .vnfd_connection_point_ref
                .iter()
                .filter(|r| r.member_vnf_index_ref == member_vnf_index)
            {
                cp_vlrs.insert(cp.vnfd_connection_point_ref.clone(), vlr.clone());
            }
        }

        let spec = VnfrSpec {
            nsr_id: self.id.clone(),
            nsr_name: self.name.clone(),
            member_vnf_index,
            vnfd_id: constituent.vnfd_id_ref.clone(),
            datacenter,
            scaling,
            input_parameters,
            cp_vlrs,
            access: self.cloud_config_access(),
        };
        Vnfr::create(&self.ctx, spec, self.restart_mode).await
    }

    /// Start VNFs concurrently and wait for the batch. VNFs with a
    /// `vnf_dependency` are started in the background once the VNFs they
    /// depend on are READY.
    async fn start_vnfs(self: &Arc<Self>, vnfrs: Vec<Arc<Vnfr>>) -> Result<(), OrchestratorError> {
        let mut handles = Vec::new();
        for vnfr in &vnfrs {
            let depends_on = self.dependencies_of(vnfr, &vnfrs);
            let me = self.clone();
            let vnfr = vnfr.clone();
            if depends_on.is_empty() {
                handles.push(tokio::spawn(async move { me.start_vnf(&vnfr).await }));
            } else {
                let name = format!("vnf-dependency-{}", vnfr.id());
                self.tasks
                    .spawn(name, async move { me.start_after(vnfr, depends_on).await });
            }
        }

        let batch = self.ctx.timeouts().vnf_batch();
        let log = &self.log;
        let joined = tokio::time::timeout(batch, async {
            for handle in handles.iter_mut() {
                if let Err(e) = handle.await {
                    warn!(log, "vnf start task failed"; "error" => %e);
                }
            }
        })
        .await;
        if joined.is_err() {
            for handle in &handles {
                handle.abort();
            }
            return Err(OrchestratorError::timeout("VNF instantiation batch", batch));
        }
        Ok(())
    }

    async fn start_vnf(&self, vnfr: &Arc<Vnfr>) {
        if let Err(e) = self.plugin.instantiate_vnf(self, vnfr, self.restart_mode).await {
            warn!(self.log, "vnf instantiation failed"; "vnfr" => vnfr.name(), "error" => %e);
        }
    }

    fn dependencies_of(&self, vnfr: &Vnfr, vnfrs: &[Arc<Vnfr>]) -> Vec<Arc<Vnfr>> {
        let Some(constituent) = self.nsd.constituent(vnfr.member_vnf_index()) else {
            return Vec::new();
        };
        let vnfd_of = |v: &Vnfr| {
            self.nsd
                .constituent(v.member_vnf_index())
                .map(|c| c.vnfd_id_ref.clone())
        };
        self.nsd
            .vnf_dependency
            .iter()
            .filter(|d| d.vnf_source_ref == constituent.vnfd_id_ref)
            .flat_map(|d| {
                vnfrs
                    .iter()
                    .filter(|v| v.id() != vnfr.id())
                    .filter(|v| vnfd_of(v).as_deref() == Some(d.vnf_depends_on_ref.as_str()))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    async fn start_after(self: Arc<Self>, vnfr: Arc<Vnfr>, depends_on: Vec<Arc<Vnfr>>) {
        let timeouts = self.ctx.timeouts();
        let waited = poll_until(
            &format!("dependencies of {}", vnfr.name()),
            timeouts.dependency_poll(),
            timeouts.dependency(),
            || self.terminate_latched() || Self::vnfrs_settled(&depends_on),
        )
        .await;
        if self.terminate_latched() {
            return;
        }
        if let Err(e) = waited {
            vnfr.instantiation_failed(e.to_string()).await;
            return;
        }
        if let Some(failed) = depends_on.iter().find(|d| d.state() == VnfrState::Failed) {
            vnfr.instantiation_failed(format!("dependency {} failed", failed.name()))
                .await;
            return;
        }
        self.start_vnf(&vnfr).await;
    }

    // ── Forwarding graphs ───────────────────────────────────────────

    async fn instantiate_vnffgs(self: &Arc<Self>) -> Result<(), Halt> {
        self.enter_phase(
            NsrState::VnffgInitPhase,
            "begin-vnffg-instantiation",
            "Instantiating VNF forwarding graphs",
        )?;
        self.publish_opdata_quietly().await;

        let vnfrs = lock(&self.inner).vnfrs.clone();
        let timeouts = self.ctx.timeouts();
        poll_until(
            "constituent VNFs",
            timeouts.dependency_poll(),
            timeouts.dependency(),
            || self.terminate_latched() || Self::vnfrs_settled(&vnfrs),
        )
        .await?;
        self.checkpoint()?;
        if vnfrs.iter().any(|v| v.state() == VnfrState::Failed) {
            self.update_state().await;
            return Err(Halt::Failed);
        }

        if !self.nsd.vnffgd.is_empty() {
            self.settle(timeouts.vnffg_settle()).await;
        }
        for vnffgd in &self.nsd.vnffgd {
            self.checkpoint()?;
            let vnffgr = Vnffgr::new(&self.ctx, &self.id, &self.name, vnffgd.clone(), vnfrs.clone());
            lock(&self.inner).vnffgrs.push(vnffgr.clone());
            vnffgr.instantiate().await?;
        }
        self.update_state().await;
        self.checkpoint()?;

        self.finish_phase("end-vnffg-instantiation", "VNF forwarding graphs instantiated");
        self.publish_opdata_quietly().await;
        Ok(())
    }

    /// Fixed delay before classifier programming. Cut short only by a
    /// terminate request.
    async fn settle(&self, delay: std::time::Duration) {
        let deadline = Instant::now() + delay;
        let step = self.ctx.timeouts().vnffg_poll();
        loop {
            let now = Instant::now();
            if now >= deadline || self.terminate_latched() {
                return;
            }
            tokio::time::sleep(step.min(deadline - now)).await;
        }
    }

    // ── Default scaling instances ───────────────────────────────────

    async fn instantiate_default_instances(self: &Arc<Self>) -> Result<(), Halt> {
        let mut plan: Vec<(String, u32, bool)> = Vec::new();
        for group in &self.nsd.scaling_group_descriptor {
            for id in 1..=group.min_instance_count {
                plan.push((group.name.clone(), id, true));
            }
        }
        for configured in &self.config.scaling_group {
            for instance in &configured.instance {
                let group = &configured.scaling_group_name_ref;
                if !plan.iter().any(|(g, id, _)| g == group && *id == instance.id) {
                    plan.push((group.clone(), instance.id, false));
                }
            }
        }
        if plan.is_empty() {
            return Ok(());
        }

        self.enter_phase(
            NsrState::ScalingOut,
            "begin-scaling-group-instantiation",
            "Instantiating scaling group instances",
        )?;
        self.publish_opdata_quietly().await;

        for (group, id, is_default) in plan {
            self.checkpoint()?;
            {
                let mut inner = lock(&self.inner);
                let Some(g) = inner.group_mut(&group) else {
                    warn!(self.log, "configured instance for unknown scaling group"; "group" => &group);
                    continue;
                };
                if g.instance(id).is_some() {
                    continue;
                }
                g.add_instance(id, is_default);
            }
            if let Err(e) = self.instantiate_scaling_instance(&group, id).await {
                warn!(self.log, "scaling instance failed"; "group" => &group, "instance" => id, "error" => %e);
            }
        }

        self.finish_phase(
            "end-scaling-group-instantiation",
            "Scaling group instances started",
        );
        self.publish_opdata_quietly().await;
        Ok(())
    }
}
