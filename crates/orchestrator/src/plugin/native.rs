use std::sync::Arc;

use async_trait::async_trait;
use slog::{debug, o, Logger};

use super::{OrchestrationPlugin, PluginKind};
use crate::context::OrchestratorContext;
use crate::error::OrchestratorError;
use crate::nsr::{Nsr, NsrState};
use crate::vlr::Vlr;
use crate::vnfr::Vnfr;

/// Drives VLRs and VNFRs against the collaborators directly.
pub struct NativePlugin {
    log: Logger,
}

impl NativePlugin {
    pub fn new(ctx: &OrchestratorContext) -> Self {
        NativePlugin {
            log: ctx.log().new(o!("plugin" => "native")),
        }
    }
}

#[async_trait]
impl OrchestrationPlugin for NativePlugin {
    fn kind(&self) -> PluginKind {
        PluginKind::Native
    }

    fn set_state(&self, state: NsrState) {
        debug!(self.log, "nsr state"; "state" => state.as_str());
    }

    async fn deploy(&self, _nsr: &Arc<Nsr>) -> Result<(), OrchestratorError> {
        Ok(())
    }

    async fn instantiate_vl(&self, nsr: &Nsr, vlr: &Arc<Vlr>) -> Result<(), OrchestratorError> {
        vlr.instantiate(nsr.restart_mode()).await
    }

    async fn instantiate_vnf(
        &self,
        _nsr: &Nsr,
        vnfr: &Arc<Vnfr>,
        restart_mode: bool,
    ) -> Result<(), OrchestratorError> {
        vnfr.instantiate(restart_mode).await
    }

    async fn terminate_ns(&self, _nsr: &Nsr) -> Result<(), OrchestratorError> {
        Ok(())
    }

    async fn terminate_vnf(&self, _nsr: &Nsr, vnfr: &Arc<Vnfr>) {
        vnfr.terminate().await
    }

    async fn terminate_vl(&self, vlr: &Arc<Vlr>) {
        vlr.terminate().await
    }
}
