use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use nfvo_store::RecordStore;
use slog::Logger;

use crate::catalog::DescriptorCatalog;
use crate::collaborator::Collaborators;
use crate::config::{OrchestratorConfig, Timeouts};
use crate::lock;
use crate::nsr::Nsr;
use crate::vdur::Vdur;
use crate::vnfr::Vnfr;

/// Which record a VLR belongs to. Status events for a VLR are routed to
/// its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VlrOwner {
    Nsr(String),
    Vnfr(String),
}

/// Everything shared by the records of one orchestrator process.
///
/// Owns the id → record registries; records hold an `Arc` to the context
/// and deregister themselves when they reach TERMINATED.
pub struct OrchestratorContext {
    store: Arc<dyn RecordStore>,
    config: OrchestratorConfig,
    log: Logger,
    catalog: DescriptorCatalog,
    collaborators: Collaborators,
    nsrs: Mutex<HashMap<String, Arc<Nsr>>>,
    vnfrs: Mutex<HashMap<String, Arc<Vnfr>>>,
    vlr_owners: Mutex<HashMap<String, VlrOwner>>,
    vdurs: Mutex<HashMap<String, Weak<Vdur>>>,
}

impl OrchestratorContext {
    pub fn new(
        store: Arc<dyn RecordStore>,
        config: OrchestratorConfig,
        log: Logger,
        collaborators: Collaborators,
    ) -> Arc<Self> {
        Arc::new(OrchestratorContext {
            store,
            config,
            log,
            catalog: DescriptorCatalog::new(),
            collaborators,
            nsrs: Mutex::new(HashMap::new()),
            vnfrs: Mutex::new(HashMap::new()),
            vlr_owners: Mutex::new(HashMap::new()),
            vdurs: Mutex::new(HashMap::new()),
        })
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    pub fn store_handle(&self) -> Arc<dyn RecordStore> {
        self.store.clone()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.config.timeouts
    }

    pub fn log(&self) -> &Logger {
        &self.log
    }

    pub fn catalog(&self) -> &DescriptorCatalog {
        &self.catalog
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    // ── NSRs ────────────────────────────────────────────────────────

    pub fn register_nsr(&self, nsr: Arc<Nsr>) {
        lock(&self.nsrs).insert(nsr.id().to_string(), nsr);
    }

    pub fn get_nsr(&self, id: &str) -> Option<Arc<Nsr>> {
        lock(&self.nsrs).get(id).cloned()
    }

    pub fn remove_nsr(&self, id: &str) -> Option<Arc<Nsr>> {
        lock(&self.nsrs).remove(id)
    }

    pub fn nsrs(&self) -> Vec<Arc<Nsr>> {
        let mut all: Vec<_> = lock(&self.nsrs).values().cloned().collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        all
    }

    // ── VNFRs ───────────────────────────────────────────────────────

    pub fn register_vnfr(&self, vnfr: Arc<Vnfr>) {
        lock(&self.vnfrs).insert(vnfr.id().to_string(), vnfr);
    }

    pub fn get_vnfr(&self, id: &str) -> Option<Arc<Vnfr>> {
        lock(&self.vnfrs).get(id).cloned()
    }

    pub fn remove_vnfr(&self, id: &str) -> Option<Arc<Vnfr>> {
        lock(&self.vnfrs).remove(id)
    }

    pub fn vnfrs(&self) -> Vec<Arc<Vnfr>> {
        let mut all: Vec<_> = lock(&self.vnfrs).values().cloned().collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        all
    }

    // ── VLR ownership ───────────────────────────────────────────────

    pub fn register_vlr(&self, vlr_id: &str, owner: VlrOwner) {
        lock(&self.vlr_owners).insert(vlr_id.to_string(), owner);
    }

    pub fn vlr_owner(&self, vlr_id: &str) -> Option<VlrOwner> {
        lock(&self.vlr_owners).get(vlr_id).cloned()
    }

    pub fn remove_vlr(&self, vlr_id: &str) {
        lock(&self.vlr_owners).remove(vlr_id);
    }

    // ── VDURs ───────────────────────────────────────────────────────

    pub fn register_vdur(&self, vdur: &Arc<Vdur>) {
        lock(&self.vdurs).insert(vdur.id().to_string(), Arc::downgrade(vdur));
    }

    pub fn get_vdur(&self, id: &str) -> Option<Arc<Vdur>> {
        let mut vdurs = lock(&self.vdurs);
        match vdurs.get(id).map(Weak::upgrade) {
            Some(Some(vdur)) => Some(vdur),
            Some(None) => {
                vdurs.remove(id);
                None
            }
            None => None,
        }
    }

    pub fn remove_vdur(&self, id: &str) {
        lock(&self.vdurs).remove(id);
    }
}
