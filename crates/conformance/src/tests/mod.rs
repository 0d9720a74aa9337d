pub mod cloud_init_ordering;
pub mod failure_propagation;
pub mod ip_profile_defaulting;
pub mod monotonic_instantiation;
pub mod scale_bounds;
pub mod scenario_single_vnf;
pub mod scenario_terminate_mid_vl;

use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::fixtures;
use crate::traits::{NsView, TestableOrchestrator};

/// How long any single wait in the suite may take.
pub const WAIT_LIMIT: Duration = Duration::from_secs(10);
const POLL: Duration = Duration::from_millis(10);

/// Turn a JSON fixture into a descriptor type.
pub fn parse<T: DeserializeOwned>(value: Value) -> Result<T, String> {
    serde_json::from_value(value).map_err(|e| format!("fixture does not parse: {}", e))
}

/// Load the VNFDs every fixture NSD refers to.
pub async fn load_catalog<O: TestableOrchestrator>(orch: &O) -> Result<(), String> {
    let vnfds = vec![
        parse(fixtures::single_vdu_vnfd())?,
        parse(fixtures::scaled_vnfd())?,
        parse(fixtures::cloud_init_vnfd())?,
    ];
    orch.load_vnfds(&vnfds)
        .await
        .map_err(|e| format!("load_vnfds failed: {}", e))
}

/// Create an NS for `nsd` under `id` and start instantiating it.
pub async fn start_ns<O: TestableOrchestrator>(
    orch: &O,
    id: &str,
    nsd: Value,
) -> Result<String, String> {
    let config = parse(fixtures::ns_config(id, nsd))?;
    let nsr_id = orch
        .create_ns(&config)
        .await
        .map_err(|e| format!("create_ns failed: {}", e))?;
    orch.instantiate_ns(&nsr_id)
        .await
        .map_err(|e| format!("instantiate_ns failed: {}", e))?;
    Ok(nsr_id)
}

/// Poll the NSR until `done` holds.
pub async fn wait_for_ns<O, F>(orch: &O, nsr_id: &str, what: &str, done: F) -> Result<NsView, String>
where
    O: TestableOrchestrator,
    F: Fn(&NsView) -> bool,
{
    let deadline = Instant::now() + WAIT_LIMIT;
    loop {
        let view = orch
            .ns(nsr_id)
            .await
            .map_err(|e| format!("ns({}) failed: {}", nsr_id, e))?;
        if done(&view) {
            return Ok(view);
        }
        if Instant::now() >= deadline {
            return Err(format!(
                "timed out waiting for {} (state {}, history {:?})",
                what, view.state, view.history
            ));
        }
        tokio::time::sleep(POLL).await;
    }
}

pub async fn wait_for_state<O: TestableOrchestrator>(
    orch: &O,
    nsr_id: &str,
    state: &str,
) -> Result<NsView, String> {
    wait_for_ns(orch, nsr_id, state, |view| view.state == state).await
}

/// Poll an arbitrary condition.
pub async fn wait_until<F, Fut>(what: &str, check: F) -> Result<(), String>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<bool, String>>,
{
    let deadline = Instant::now() + WAIT_LIMIT;
    loop {
        if check().await? {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(format!("timed out waiting for {}", what));
        }
        tokio::time::sleep(POLL).await;
    }
}
