//! One VL and one single-VDU VNF reach RUNNING.

use super::{load_catalog, start_ns, wait_for_state};
use crate::fixtures;
use crate::traits::TestableOrchestrator;

pub async fn test_single_vnf_reaches_running<O: TestableOrchestrator>(
    orch: &O,
) -> Result<(), String> {
    load_catalog(orch).await?;
    let nsr_id = start_ns(orch, "single", fixtures::single_vnf_nsd()).await?;
    wait_for_state(orch, &nsr_id, "running").await?;

    let vls = orch
        .vls(&nsr_id)
        .await
        .map_err(|e| format!("vls failed: {}", e))?;
    if vls.len() != 1 || vls[0].state != "active" {
        return Err(format!("expected one active VLR, got {:?}", vls));
    }

    let vnfs = orch
        .vnfs(&nsr_id)
        .await
        .map_err(|e| format!("vnfs failed: {}", e))?;
    if vnfs.len() != 1 || vnfs[0].state != "ready" {
        return Err(format!("expected one ready VNFR, got {:?}", vnfs));
    }
    let vdurs = &vnfs[0].vdurs;
    if vdurs.len() != 1 || vdurs[0].state != "ready" {
        return Err(format!("expected one ready VDUR, got {:?}", vdurs));
    }
    if vdurs[0].management_ip.is_none() {
        return Err(format!("VDUR {} has no IP", vdurs[0].id));
    }
    Ok(())
}
