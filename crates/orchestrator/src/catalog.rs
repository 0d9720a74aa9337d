use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use nfvo_descriptor::{validate_nsd, validate_vnfd, DescriptorBundle, Nsd, Vnfd};

use crate::error::OrchestratorError;
use crate::lock;

struct VnfdEntry {
    vnfd: Arc<Vnfd>,
    ref_count: u32,
}

/// Loaded descriptors shared by every record.
///
/// VNFDs are reference counted by the VNF records using them; a VNFD
/// cannot be deleted while any record holds it.
#[derive(Default)]
pub struct DescriptorCatalog {
    nsds: Mutex<HashMap<String, Arc<Nsd>>>,
    vnfds: Mutex<HashMap<String, VnfdEntry>>,
}

impl DescriptorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_bundle(&self, bundle: &DescriptorBundle) -> Result<(), OrchestratorError> {
        for vnfd in &bundle.vnfds {
            self.add_vnfd(vnfd.clone())?;
        }
        for nsd in &bundle.nsds {
            self.add_nsd(nsd.clone())?;
        }
        Ok(())
    }

    /// Add or replace an NSD after checking it against the loaded VNFDs.
    pub fn add_nsd(&self, nsd: Nsd) -> Result<(), OrchestratorError> {
        let vnfds: Vec<Vnfd> = lock(&self.vnfds)
            .values()
            .map(|e| (*e.vnfd).clone())
            .collect();
        validate_nsd(&nsd, &vnfds)?;
        lock(&self.nsds).insert(nsd.id.clone(), Arc::new(nsd));
        Ok(())
    }

    pub fn get_nsd(&self, id: &str) -> Option<Arc<Nsd>> {
        lock(&self.nsds).get(id).cloned()
    }

    pub fn nsds(&self) -> Vec<Arc<Nsd>> {
        let mut all: Vec<_> = lock(&self.nsds).values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn delete_nsd(&self, id: &str) -> Result<(), OrchestratorError> {
        lock(&self.nsds)
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| OrchestratorError::not_found("nsd", id))
    }

    /// Add or replace a VNFD. Replacing keeps the reference count.
    pub fn add_vnfd(&self, vnfd: Vnfd) -> Result<(), OrchestratorError> {
        validate_vnfd(&vnfd)?;
        let mut vnfds = lock(&self.vnfds);
        let ref_count = vnfds.get(&vnfd.id).map_or(0, |e| e.ref_count);
        vnfds.insert(
            vnfd.id.clone(),
            VnfdEntry {
                vnfd: Arc::new(vnfd),
                ref_count,
            },
        );
        Ok(())
    }

    pub fn get_vnfd(&self, id: &str) -> Option<Arc<Vnfd>> {
        lock(&self.vnfds).get(id).map(|e| e.vnfd.clone())
    }

    pub fn vnfds(&self) -> Vec<Arc<Vnfd>> {
        let mut all: Vec<_> = lock(&self.vnfds).values().map(|e| e.vnfd.clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Take a reference on a VNFD and return its snapshot.
    pub fn acquire_vnfd(&self, id: &str) -> Result<Arc<Vnfd>, OrchestratorError> {
        let mut vnfds = lock(&self.vnfds);
        let entry = vnfds
            .get_mut(id)
            .ok_or_else(|| OrchestratorError::DependencyNotReady {
                message: format!("vnfd {} is not in the catalog", id),
            })?;
        entry.ref_count += 1;
        Ok(entry.vnfd.clone())
    }

    pub fn release_vnfd(&self, id: &str) {
        if let Some(entry) = lock(&self.vnfds).get_mut(id) {
            entry.ref_count = entry.ref_count.saturating_sub(1);
        }
    }

    pub fn ref_count(&self, id: &str) -> u32 {
        lock(&self.vnfds).get(id).map_or(0, |e| e.ref_count)
    }

    pub fn delete_vnfd(&self, id: &str) -> Result<(), OrchestratorError> {
        let mut vnfds = lock(&self.vnfds);
        match vnfds.get(id) {
            None => Err(OrchestratorError::not_found("vnfd", id)),
            Some(entry) if entry.ref_count > 0 => Err(OrchestratorError::config(format!(
                "cannot delete vnfd {}: in use by {} record(s)",
                id, entry.ref_count
            ))),
            Some(_) => {
                vnfds.remove(id);
                Ok(())
            }
        }
    }
}
