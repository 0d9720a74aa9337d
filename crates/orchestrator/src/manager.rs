//! Entry points for NS and VNF lifecycle requests.
//!
//! [`NsManager`] is what an API layer talks to: it creates NSRs from
//! instance configs, starts and stops them, runs scaling and VL
//! operations, and routes record-store notifications to the records they
//! concern. [`VnfManager`] does the same for standalone VNFRs and for the
//! internal VLRs of every VNFR.

use std::sync::Arc;

use nfvo_descriptor::{NsInstanceConfig, Vld};
use nfvo_store::{read_as, to_record, Action, StoreError};
use serde_json::json;
use slog::{debug, info, o, warn, Logger};

use crate::context::{OrchestratorContext, VlrOwner};
use crate::error::OrchestratorError;
use crate::nsr::{Nsr, NsrOpdata};
use crate::paths;
use crate::vlr::VlrRecord;
use crate::vnfr::{self, Vnfr, VnfrRecord, VnfrSpec};

/// Console URL reported for a VDUR that has none.
pub const NO_CONSOLE: &str = "none";

// ── VNF manager ─────────────────────────────────────────────────────

#[derive(Clone)]
pub struct VnfManager {
    ctx: Arc<OrchestratorContext>,
    log: Logger,
}

impl VnfManager {
    pub fn new(ctx: Arc<OrchestratorContext>) -> Self {
        let log = ctx.log().new(o!("manager" => "vnf"));
        VnfManager { ctx, log }
    }

    pub async fn create_vnfr(&self, spec: VnfrSpec) -> Result<Arc<Vnfr>, OrchestratorError> {
        Vnfr::create(&self.ctx, spec, false).await
    }

    pub async fn instantiate_vnfr(&self, vnfr_id: &str) -> Result<(), OrchestratorError> {
        let vnfr = self.get_vnfr(vnfr_id)?;
        vnfr.instantiate(false).await
    }

    pub async fn terminate_vnfr(&self, vnfr_id: &str) -> Result<(), OrchestratorError> {
        let vnfr = self.get_vnfr(vnfr_id)?;
        vnfr.terminate().await;
        Ok(())
    }

    pub fn get_vnfr(&self, vnfr_id: &str) -> Result<Arc<Vnfr>, OrchestratorError> {
        self.ctx
            .get_vnfr(vnfr_id)
            .ok_or_else(|| OrchestratorError::not_found("vnfr", vnfr_id))
    }

    /// The published record of a VNFR.
    pub async fn vnfr_record(&self, vnfr_id: &str) -> Result<Option<VnfrRecord>, OrchestratorError> {
        vnfr::read_record(&self.ctx, vnfr_id).await
    }

    pub async fn list_vnfrs(&self) -> Result<Vec<VnfrRecord>, OrchestratorError> {
        let mut records = Vec::new();
        for (path, value) in self.ctx.store().list(paths::VNFR_CATALOG).await? {
            match serde_json::from_value(value) {
                Ok(record) => records.push(record),
                Err(e) => warn!(self.log, "skipping unreadable vnfr record"; "path" => path, "error" => %e),
            }
        }
        Ok(records)
    }

    /// Route a status event to the internal VLR of `vnfr_id` it concerns.
    pub fn vlr_event(&self, vnfr_id: &str, record: &VlrRecord) -> Result<bool, OrchestratorError> {
        match self.ctx.get_vnfr(vnfr_id) {
            Some(vnfr) => vnfr.vlr_event(record),
            None => {
                debug!(self.log, "vlr event for unknown vnfr"; "vnfr_id" => vnfr_id, "vlr_id" => &record.id);
                Ok(false)
            }
        }
    }
}

// ── NS manager ──────────────────────────────────────────────────────

pub struct NsManager {
    ctx: Arc<OrchestratorContext>,
    log: Logger,
    vnfm: VnfManager,
}

impl NsManager {
    pub fn new(ctx: Arc<OrchestratorContext>) -> Self {
        let log = ctx.log().new(o!("manager" => "ns"));
        NsManager {
            vnfm: VnfManager::new(ctx.clone()),
            ctx,
            log,
        }
    }

    pub fn context(&self) -> &Arc<OrchestratorContext> {
        &self.ctx
    }

    pub fn vnf_manager(&self) -> &VnfManager {
        &self.vnfm
    }

    fn get_nsr(&self, nsr_id: &str) -> Result<Arc<Nsr>, OrchestratorError> {
        self.ctx
            .get_nsr(nsr_id)
            .ok_or_else(|| OrchestratorError::not_found("nsr", nsr_id))
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Create the NSR for `config` and store the config under
    /// `ns-instance-config/<id>`.
    pub async fn create_nsr(&self, config: NsInstanceConfig) -> Result<Arc<Nsr>, OrchestratorError> {
        if self.ctx.get_nsr(&config.id).is_some() {
            return Err(OrchestratorError::config(format!(
                "ns instance {} already exists",
                config.id
            )));
        }
        let path = paths::ns_instance_config(&config.id);
        let record = to_record(&path, &config)?;
        let nsr = Nsr::create(&self.ctx, config, false).await?;
        self.ctx.store().update(&path, record).await?;
        info!(self.log, "ns instance created"; "nsr_id" => nsr.id(), "nsr" => nsr.name());
        Ok(nsr)
    }

    /// Rebuild an NSR for every stored instance config that has none and
    /// restart its instantiation. Published VLR, VNFR and VDUR ids are
    /// reused, so resources that already exist are read back rather than
    /// requested again. Returns the ids of the recovered NSRs.
    pub async fn recover(&self) -> Result<Vec<String>, OrchestratorError> {
        let mut recovered = Vec::new();
        for config in self.list_configs().await? {
            if self.ctx.get_nsr(&config.id).is_some() {
                continue;
            }
            let id = config.id.clone();
            match Nsr::create(&self.ctx, config, true).await {
                Ok(nsr) => {
                    self.instantiate_nsr(nsr.id())?;
                    info!(self.log, "ns instance recovered"; "nsr_id" => nsr.id(), "nsr" => nsr.name());
                    recovered.push(id);
                }
                Err(e) => warn!(self.log, "ns instance not recovered"; "nsr_id" => &id, "error" => %e),
            }
        }
        Ok(recovered)
    }

    /// Start the instantiation pipeline in the background.
    pub fn instantiate_nsr(&self, nsr_id: &str) -> Result<(), OrchestratorError> {
        let nsr = self.get_nsr(nsr_id)?;
        let log = self.log.clone();
        let running = nsr.clone();
        nsr.tasks().spawn("instantiate", async move {
            if let Err(e) = running.instantiate().await {
                warn!(log, "instantiation failed"; "nsr_id" => running.id(), "error" => %e);
            }
        });
        Ok(())
    }

    /// Tear down an NS and drop its instance config.
    pub async fn terminate_nsr(&self, nsr_id: &str) -> Result<(), OrchestratorError> {
        let nsr = self.get_nsr(nsr_id)?;
        nsr.terminate().await;
        match self
            .ctx
            .store()
            .delete(&paths::ns_instance_config(nsr_id))
            .await
        {
            Ok(()) | Err(StoreError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn nsr_opdata(&self, nsr_id: &str) -> Result<Option<NsrOpdata>, OrchestratorError> {
        Ok(read_as(self.ctx.store(), &paths::ns_instance_opdata(nsr_id)).await?)
    }

    pub async fn list_nsrs(&self) -> Result<Vec<NsrOpdata>, OrchestratorError> {
        let mut records = Vec::new();
        for (path, value) in self.ctx.store().list(paths::NS_INSTANCE_OPDATA).await? {
            match serde_json::from_value(value) {
                Ok(record) => records.push(record),
                Err(e) => warn!(self.log, "skipping unreadable opdata"; "path" => path, "error" => %e),
            }
        }
        Ok(records)
    }

    pub async fn list_configs(&self) -> Result<Vec<NsInstanceConfig>, OrchestratorError> {
        let mut configs = Vec::new();
        for (path, value) in self.ctx.store().list(paths::NS_INSTANCE_CONFIG).await? {
            match serde_json::from_value(value) {
                Ok(config) => configs.push(config),
                Err(e) => warn!(self.log, "skipping unreadable config"; "path" => path, "error" => %e),
            }
        }
        Ok(configs)
    }

    // ── Running NS operations ───────────────────────────────────────

    pub async fn scale_out(
        &self,
        nsr_id: &str,
        group: &str,
        instance_id: Option<u32>,
    ) -> Result<u32, OrchestratorError> {
        self.get_nsr(nsr_id)?.scale_out(group, instance_id).await
    }

    pub async fn scale_in(
        &self,
        nsr_id: &str,
        group: &str,
        instance_id: u32,
    ) -> Result<(), OrchestratorError> {
        self.get_nsr(nsr_id)?.scale_in(group, instance_id).await
    }

    pub async fn add_vl(&self, nsr_id: &str, vld: Vld) -> Result<String, OrchestratorError> {
        self.get_nsr(nsr_id)?.create_vl_instance(vld).await
    }

    pub async fn remove_vl(&self, nsr_id: &str, vld_id: &str) -> Result<(), OrchestratorError> {
        self.get_nsr(nsr_id)?.delete_vl_instance(vld_id).await
    }

    /// The console URL of a VDUR, or [`NO_CONSOLE`] when it is unknown or
    /// not READY. The answer is also published at `vdur-console/<id>`.
    pub async fn get_console(&self, vdur_id: &str) -> Result<String, OrchestratorError> {
        let url = match self.ctx.get_vdur(vdur_id) {
            Some(vdur) => vdur.console_url().await?,
            None => None,
        };
        let url = url.unwrap_or_else(|| NO_CONSOLE.to_string());
        let path = paths::vdur_console(vdur_id);
        let record = json!({ "id": vdur_id, "console_url": url });
        self.ctx.store().update(&path, record).await?;
        Ok(url)
    }

    // ── Notifications ───────────────────────────────────────────────

    /// Route a `vlr-catalog` change to the NSR or VNFR owning the VLR.
    pub async fn vlr_event(&self, record: &VlrRecord, action: Action) -> Result<bool, OrchestratorError> {
        if action == Action::Delete {
            return Ok(false);
        }
        match self.ctx.vlr_owner(&record.id) {
            Some(VlrOwner::Nsr(nsr_id)) => match self.ctx.get_nsr(&nsr_id) {
                Some(nsr) => nsr.vlr_event(record).await,
                None => Ok(false),
            },
            Some(VlrOwner::Vnfr(vnfr_id)) => self.vnfm.vlr_event(&vnfr_id, record),
            None => {
                debug!(self.log, "vlr event for unknown vlr"; "vlr_id" => &record.id);
                Ok(false)
            }
        }
    }

    /// A `vnfr-catalog` change: have the owning NSR recompute its state.
    pub async fn vnfr_event(&self, record: &VnfrRecord, action: Action) {
        if action == Action::Delete || self.ctx.get_vnfr(&record.id).is_none() {
            return;
        }
        if let Some(nsr) = self.ctx.get_nsr(&record.nsr_id_ref) {
            nsr.update_state().await;
        }
    }

    /// Follow `vlr-catalog/` and `vnfr-catalog/` until the store goes away.
    pub async fn run_dispatcher(self: Arc<Self>) -> Result<(), OrchestratorError> {
        let mut vlrs = self.ctx.store().subscribe(paths::VLR_CATALOG);
        let mut vnfrs = self.ctx.store().subscribe(paths::VNFR_CATALOG);
        info!(self.log, "dispatcher started");
        loop {
            tokio::select! {
                event = vlrs.recv() => match event {
                    Ok(event) => {
                        if event.action == Action::Delete {
                            continue;
                        }
                        match serde_json::from_value::<VlrRecord>(event.value) {
                            Ok(record) => {
                                if let Err(e) = self.vlr_event(&record, event.action).await {
                                    warn!(self.log, "vlr event rejected"; "path" => &event.path, "error" => %e);
                                }
                            }
                            Err(e) => warn!(self.log, "unreadable vlr record"; "path" => &event.path, "error" => %e),
                        }
                    }
                    Err(StoreError::Lagged { skipped }) => {
                        warn!(self.log, "vlr events lagged"; "skipped" => skipped);
                    }
                    Err(_) => return Ok(()),
                },
                event = vnfrs.recv() => match event {
                    Ok(event) => {
                        if event.action == Action::Delete {
                            continue;
                        }
                        match serde_json::from_value::<VnfrRecord>(event.value) {
                            Ok(record) => self.vnfr_event(&record, event.action).await,
                            Err(e) => warn!(self.log, "unreadable vnfr record"; "path" => &event.path, "error" => %e),
                        }
                    }
                    Err(StoreError::Lagged { skipped }) => {
                        warn!(self.log, "vnfr events lagged"; "skipped" => skipped);
                    }
                    Err(_) => return Ok(()),
                },
            }
        }
    }
}
