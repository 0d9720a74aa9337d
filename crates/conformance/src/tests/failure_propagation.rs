//! Failure propagation.
//!
//! A failed VDUR fails its VNFR, which fails the NS. A failure during
//! scale-out of a NS that already ran returns the NS to RUNNING instead.

use super::{load_catalog, start_ns, wait_for_state, wait_until};
use crate::fixtures;
use crate::traits::TestableOrchestrator;

pub async fn test_failure_propagation<O: TestableOrchestrator>(orch: &O) -> Result<(), String> {
    load_catalog(orch).await?;
    orch.script_vdu_failure(fixtures::WEB_VDU, "hypervisor unreachable");
    let nsr_id = start_ns(orch, "propagate", fixtures::single_vnf_nsd()).await?;
    let view = wait_for_state(orch, &nsr_id, "failed").await?;

    if view.history.iter().any(|s| s == "running") {
        return Err(format!("failed NS passed through running: {:?}", view.history));
    }
    let vnfs = orch
        .vnfs(&nsr_id)
        .await
        .map_err(|e| format!("vnfs failed: {}", e))?;
    for vnf in &vnfs {
        if vnf.state != "failed" {
            return Err(format!("vnfr {} is {} under a failed VDU", vnf.name, vnf.state));
        }
    }
    Ok(())
}

pub async fn test_scale_out_failure_reverts_to_running<O: TestableOrchestrator>(
    orch: &O,
) -> Result<(), String> {
    load_catalog(orch).await?;
    orch.script_vdu_failure(fixtures::WORKER_VDU, "quota exceeded");
    let nsr_id = start_ns(orch, "revert", fixtures::scaled_nsd(0, 2)).await?;
    wait_for_state(orch, &nsr_id, "running").await?;

    orch.scale_out(&nsr_id, fixtures::WORKER_GROUP)
        .await
        .map_err(|e| format!("scale_out failed: {}", e))?;

    let id = nsr_id.as_str();
    wait_until("the scaled VNF to fail", || async move {
        let vnfs = orch.vnfs(id).await.map_err(|e| e.to_string())?;
        Ok(vnfs.iter().any(|v| v.state == "failed"))
    })
    .await?;
    let view = wait_for_state(orch, &nsr_id, "running").await?;

    if view.history.iter().any(|s| s == "failed") {
        return Err(format!(
            "a failed scale-out failed the whole NS: {:?}",
            view.history
        ));
    }
    if !view.history.iter().any(|s| s == "scaling_out") {
        return Err(format!("scale-out never entered scaling_out: {:?}", view.history));
    }
    Ok(())
}
