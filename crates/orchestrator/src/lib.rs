//! nfvo-orchestrator: network service and VNF lifecycle orchestration.
//!
//! Drives NS, VNF, VDU, virtual link and forwarding-graph records through
//! their state machines against a [`nfvo_store::RecordStore`] and a set of
//! [`Collaborators`]. Each NS is deployed either natively (records talk to
//! the resource manager and network provider directly) or through an
//! external resource orchestrator, selected once per NS by
//! [`plugin::select`].
//!
//! The entry points are [`NsManager`] and [`VnfManager`], both built on an
//! explicit [`OrchestratorContext`].

pub mod catalog;
pub mod cloud_init;
pub mod collaborator;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod ip_profile;
pub mod logging;
pub mod manager;
pub mod nsr;
pub mod paths;
pub mod plugin;
pub mod scaling;
pub mod sim;
pub mod ssh;
pub mod tasks;
pub mod vdur;
pub mod vlr;
pub mod vnffgr;
pub mod vnfr;
pub mod wait;

pub use catalog::DescriptorCatalog;
pub use collaborator::{
    Collaborators, ConfigAgent, NetworkProvider, ResourceManager, ScriptConfigAgent, VnffgManager,
};
pub use config::{OrchestratorConfig, RoAccount, Timeouts};
pub use context::{OrchestratorContext, VlrOwner};
pub use error::{OrchestratorError, RoClientError};
pub use events::NsEvent;
pub use manager::{NsManager, VnfManager};
pub use nsr::{ConfigStatus, Nsr, NsrOpdata, NsrState};
pub use plugin::{OrchestrationPlugin, PluginKind, RoClient, RoConnector};
pub use scaling::{InstanceState, ScalingGroupRecord};
pub use vdur::{Vdur, VdurState};
pub use vlr::{Vlr, VlrRecord, VlrState};
pub use vnffgr::{Vnffgr, VnffgrRecord, VnffgrState};
pub use vnfr::{Vnfr, VnfrRecord, VnfrState};

use std::sync::{Mutex, MutexGuard};

/// Lock a record mutex, recovering the data if a holder panicked.
///
/// Record state stays consistent across a panic because no guard is held
/// over a partial update that another thread could observe.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
