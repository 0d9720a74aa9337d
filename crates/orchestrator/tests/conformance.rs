//! Runs the orchestrator conformance suite against the simulated cloud,
//! once with native deployment and once through the simulated external
//! resource orchestrator.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use nfvo_conformance::{
    orchestrator_conformance_tests, ConformanceError, ConformanceResult, EventView, NsView,
    TestableOrchestrator, VduView, VlView, VmEvent, VmEventKind, VnfView,
};
use nfvo_descriptor::{IpProfileParams, NsInstanceConfig, Vnfd};
use nfvo_orchestrator::ip_profile::resolve_ip_profile;
use nfvo_orchestrator::sim::{SimCloud, SIM_RO_ACCOUNT};
use nfvo_orchestrator::{NsManager, Nsr};
use serde::Serialize;
use serde_json::Value;

struct SimHarness {
    cloud: SimCloud,
    manager: Arc<NsManager>,
    resource_orchestrator: Option<String>,
    /// Kept past termination so terminated NSRs can still be inspected.
    nsrs: Mutex<HashMap<String, Arc<Nsr>>>,
    dispatcher: tokio::task::JoinHandle<()>,
}

impl SimHarness {
    fn native() -> Self {
        Self::build(None)
    }

    fn external_ro() -> Self {
        Self::build(Some(SIM_RO_ACCOUNT.to_string()))
    }

    fn build(resource_orchestrator: Option<String>) -> Self {
        let cloud = SimCloud::new();
        let manager = Arc::new(NsManager::new(cloud.test_context()));
        let running = manager.clone();
        let dispatcher = tokio::spawn(async move {
            let _ = running.run_dispatcher().await;
        });
        SimHarness {
            cloud,
            manager,
            resource_orchestrator,
            nsrs: Mutex::new(HashMap::new()),
            dispatcher,
        }
    }

    fn nsr(&self, nsr_id: &str) -> ConformanceResult<Arc<Nsr>> {
        self.nsrs
            .lock()
            .unwrap()
            .get(nsr_id)
            .cloned()
            .ok_or_else(|| ConformanceError::new(format!("unknown nsr {}", nsr_id)))
    }

    fn placed(&self, config: &NsInstanceConfig) -> NsInstanceConfig {
        let mut config = config.clone();
        config.resource_orchestrator = self.resource_orchestrator.clone();
        config
    }
}

impl Drop for SimHarness {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

fn failed(e: impl std::fmt::Display) -> ConformanceError {
    ConformanceError::new(e.to_string())
}

/// The serde name of a state enum.
fn state_name<S: Serialize>(state: S) -> String {
    match serde_json::to_value(state) {
        Ok(Value::String(name)) => name,
        other => format!("{:?}", other),
    }
}

#[async_trait]
impl TestableOrchestrator for SimHarness {
    async fn load_vnfds(&self, vnfds: &[Vnfd]) -> ConformanceResult<()> {
        let catalog = self.manager.context().catalog();
        for vnfd in vnfds {
            catalog.add_vnfd(vnfd.clone()).map_err(failed)?;
        }
        Ok(())
    }

    async fn create_ns(&self, config: &NsInstanceConfig) -> ConformanceResult<String> {
        let nsr = self
            .manager
            .create_nsr(self.placed(config))
            .await
            .map_err(failed)?;
        let id = nsr.id().to_string();
        self.nsrs.lock().unwrap().insert(id.clone(), nsr);
        Ok(id)
    }

    async fn instantiate_ns(&self, nsr_id: &str) -> ConformanceResult<()> {
        self.manager.instantiate_nsr(nsr_id).map_err(failed)
    }

    async fn terminate_ns(&self, nsr_id: &str) -> ConformanceResult<()> {
        self.manager.terminate_nsr(nsr_id).await.map_err(failed)
    }

    async fn restart_ns(&self, config: &NsInstanceConfig) -> ConformanceResult<()> {
        let ctx = self.manager.context();
        if let Some(old) = ctx.remove_nsr(&config.id) {
            old.tasks().shutdown().await;
        }
        let nsr = Nsr::create(ctx, self.placed(config), true)
            .await
            .map_err(failed)?;
        self.nsrs
            .lock()
            .unwrap()
            .insert(nsr.id().to_string(), nsr.clone());
        nsr.instantiate().await.map_err(failed)
    }

    async fn scale_out(&self, nsr_id: &str, group: &str) -> ConformanceResult<u32> {
        self.manager
            .scale_out(nsr_id, group, None)
            .await
            .map_err(failed)
    }

    async fn ns(&self, nsr_id: &str) -> ConformanceResult<NsView> {
        let nsr = self.nsr(nsr_id)?;
        Ok(NsView {
            state: nsr.state().as_str().to_string(),
            history: nsr
                .state_history()
                .into_iter()
                .map(|s| s.as_str().to_string())
                .collect(),
            events: nsr
                .events()
                .into_iter()
                .map(|e| EventView {
                    event: e.event,
                    details: e.details,
                })
                .collect(),
        })
    }

    async fn vls(&self, nsr_id: &str) -> ConformanceResult<Vec<VlView>> {
        Ok(self
            .nsr(nsr_id)?
            .vlrs()
            .iter()
            .map(|v| VlView {
                id: v.id().to_string(),
                name: v.name().to_string(),
                state: state_name(v.state()),
            })
            .collect())
    }

    async fn vnfs(&self, nsr_id: &str) -> ConformanceResult<Vec<VnfView>> {
        Ok(self
            .nsr(nsr_id)?
            .vnfrs()
            .iter()
            .map(|v| VnfView {
                id: v.id().to_string(),
                name: v.name().to_string(),
                member_vnf_index: v.member_vnf_index(),
                state: state_name(v.state()),
                vdurs: v
                    .vdurs()
                    .iter()
                    .map(|d| VduView {
                        id: d.id().to_string(),
                        vdu_id: d.vdu_id().to_string(),
                        state: state_name(d.state()),
                        management_ip: d.management_ip(),
                    })
                    .collect(),
            })
            .collect())
    }

    async fn registered_vnfr_count(&self) -> usize {
        self.manager.context().vnfrs().len()
    }

    async fn resolve_ip_profile(&self, params: &IpProfileParams) -> ConformanceResult<Value> {
        let profile = resolve_ip_profile(params).map_err(failed)?;
        serde_json::to_value(profile).map_err(failed)
    }

    fn script_vdu_failure(&self, vdu_id: &str, reason: &str) {
        self.cloud.resources.fail_vdu(vdu_id, reason);
    }

    fn script_vdu_delay(&self, vdu_id: &str, delay: Duration) {
        self.cloud.resources.pending_vdu(vdu_id, Some(delay));
    }

    fn script_vl_hold(&self, vld_name: &str) {
        self.cloud.networks.pending_vld(vld_name, None);
    }

    fn vm_events(&self) -> Vec<VmEvent> {
        self.cloud
            .resources
            .history()
            .into_iter()
            .filter_map(|entry| {
                let (kind, node) = entry.split_once(':')?;
                let kind = match kind {
                    "create" => VmEventKind::Requested,
                    "active" => VmEventKind::Active,
                    _ => return None,
                };
                Some(VmEvent {
                    kind,
                    node: node.to_string(),
                })
            })
            .collect()
    }

    fn vm_create_count(&self) -> usize {
        self.cloud.resources.created().len()
    }

    fn network_create_count(&self) -> usize {
        self.cloud.networks.created().len()
    }

    fn released_networks(&self) -> Vec<String> {
        self.cloud.networks.deleted()
    }
}

mod native {
    use super::*;

    orchestrator_conformance_tests!(SimHarness::native());
}

mod external_ro {
    use super::*;

    orchestrator_conformance_tests!(lifecycle: SimHarness::external_ro());
}
