//! Resource orchestration plugins.
//!
//! Every NSR is deployed through exactly one [`OrchestrationPlugin`],
//! chosen by [`select`] when the NSR is created:
//!
//! - [`NativePlugin`] drives VLRs and VNFRs against the collaborators
//! - [`ExternalRoPlugin`] hands the whole NS to an external resource
//!   orchestrator and reconciles its status back onto the records

mod external_ro;
mod native;
#[cfg(feature = "external-ro")]
mod openmano;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use nfvo_descriptor::NsInstanceConfig;
use serde::{Deserialize, Serialize};

use crate::config::RoAccount;
use crate::context::OrchestratorContext;
use crate::error::{OrchestratorError, RoClientError};
use crate::nsr::{Nsr, NsrState};
use crate::vlr::Vlr;
use crate::vnfr::Vnfr;

pub use external_ro::ExternalRoPlugin;
pub use native::NativePlugin;
#[cfg(feature = "external-ro")]
pub use openmano::{HttpRoConnector, OpenmanoHttpClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    Native,
    ExternalRo,
}

/// How an NSR's VLs and VNFs come into existence.
#[async_trait]
pub trait OrchestrationPlugin: Send + Sync + 'static {
    fn kind(&self) -> PluginKind;

    /// Called on every state change of the owning NSR.
    fn set_state(&self, state: NsrState);

    /// Whether the NSR should wait for its VLs to turn ACTIVE before
    /// starting VNFs.
    fn waits_for_vls(&self) -> bool {
        true
    }

    /// Last step of instantiation, after every VNF was started.
    async fn deploy(&self, nsr: &Arc<Nsr>) -> Result<(), OrchestratorError>;

    async fn instantiate_vl(&self, nsr: &Nsr, vlr: &Arc<Vlr>) -> Result<(), OrchestratorError>;

    async fn instantiate_vnf(
        &self,
        nsr: &Nsr,
        vnfr: &Arc<Vnfr>,
        restart_mode: bool,
    ) -> Result<(), OrchestratorError>;

    async fn terminate_ns(&self, nsr: &Nsr) -> Result<(), OrchestratorError>;

    async fn terminate_vnf(&self, nsr: &Nsr, vnfr: &Arc<Vnfr>);

    async fn terminate_vl(&self, vlr: &Arc<Vlr>);
}

// ── External RO client ──────────────────────────────────────────────

/// The calls the external RO plugin makes on its orchestrator.
#[async_trait]
pub trait RoClient: Send + Sync + 'static {
    /// Instance name → uuid.
    async fn list_instances(&self) -> Result<HashMap<String, String>, RoClientError>;

    /// Create an instance from a scenario and return its uuid.
    async fn create_instance(&self, scenario: serde_json::Value) -> Result<String, RoClientError>;

    async fn get_instance(&self, uuid: &str) -> Result<serde_json::Value, RoClientError>;

    async fn delete_instance(&self, uuid: &str) -> Result<(), RoClientError>;
}

/// Builds a client for a configured RO account.
pub trait RoConnector: Send + Sync + 'static {
    fn connect(&self, account: &RoAccount) -> Result<Arc<dyn RoClient>, OrchestratorError>;
}

/// Connector for builds without HTTP support: every account is refused.
#[derive(Debug, Default)]
pub struct UnsupportedRoConnector;

impl RoConnector for UnsupportedRoConnector {
    fn connect(&self, account: &RoAccount) -> Result<Arc<dyn RoClient>, OrchestratorError> {
        Err(OrchestratorError::config(format!(
            "resource orchestrator {} needs the external-ro feature",
            account.name
        )))
    }
}

/// The connector a real deployment uses.
pub fn default_connector() -> Arc<dyn RoConnector> {
    #[cfg(feature = "external-ro")]
    {
        Arc::new(HttpRoConnector)
    }
    #[cfg(not(feature = "external-ro"))]
    {
        Arc::new(UnsupportedRoConnector)
    }
}

/// Pick the plugin for an NS instance. No `resource_orchestrator` selects
/// the native path; naming an account that is not configured is a
/// configuration error.
pub fn select(
    ctx: &Arc<OrchestratorContext>,
    config: &NsInstanceConfig,
) -> Result<Arc<dyn OrchestrationPlugin>, OrchestratorError> {
    let Some(name) = config.resource_orchestrator.as_deref() else {
        return Ok(Arc::new(NativePlugin::new(ctx)));
    };
    let account = ctx.config().ro_account(name).ok_or_else(|| {
        OrchestratorError::config(format!("unknown resource orchestrator account '{}'", name))
    })?;
    let client = ctx.collaborators().ro.connect(account)?;
    Ok(Arc::new(ExternalRoPlugin::new(ctx, account, client)))
}
