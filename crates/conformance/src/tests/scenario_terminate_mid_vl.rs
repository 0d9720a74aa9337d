//! Terminate while one of two VLs is still pending: the NS ends
//! TERMINATED, never enters VNF_INIT_PHASE, and releases only networks it
//! created.

use std::collections::BTreeSet;

use super::{load_catalog, start_ns, wait_for_state, wait_until};
use crate::fixtures;
use crate::traits::TestableOrchestrator;

pub async fn test_terminate_mid_vl_phase<O: TestableOrchestrator>(orch: &O) -> Result<(), String> {
    load_catalog(orch).await?;
    orch.script_vl_hold("data");
    let nsr_id = start_ns(orch, "half-built", fixtures::two_vl_nsd()).await?;

    let id = nsr_id.as_str();
    wait_until("one active and one pending VL", || async move {
        let vls = orch.vls(id).await.map_err(|e| e.to_string())?;
        Ok(vls.len() == 2
            && vls.iter().any(|v| v.state == "active")
            && vls.iter().any(|v| v.state == "instantiation_pending"))
    })
    .await?;

    orch.terminate_ns(&nsr_id)
        .await
        .map_err(|e| format!("terminate_ns failed: {}", e))?;
    let view = wait_for_state(orch, &nsr_id, "terminated").await?;
    if view.history.iter().any(|s| s == "vnf_init_phase") {
        return Err(format!("NS entered vnf_init_phase: {:?}", view.history));
    }

    let created: BTreeSet<String> = orch
        .vls(&nsr_id)
        .await
        .map_err(|e| format!("vls failed: {}", e))?
        .into_iter()
        .map(|v| v.id)
        .collect();
    let released: BTreeSet<String> = orch.released_networks().into_iter().collect();
    if released != created {
        return Err(format!(
            "released {:?}, but the NS created {:?}",
            released, created
        ));
    }
    Ok(())
}
