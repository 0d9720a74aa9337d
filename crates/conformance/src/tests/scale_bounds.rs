//! Scale bounds.
//!
//! A scale-out beyond `max_instance_count` is rejected before any VNFR is
//! created.

use super::{load_catalog, start_ns, wait_for_state};
use crate::fixtures;
use crate::traits::TestableOrchestrator;

pub async fn test_scale_bounds<O: TestableOrchestrator>(orch: &O) -> Result<(), String> {
    load_catalog(orch).await?;
    let nsr_id = start_ns(orch, "bounded", fixtures::scaled_nsd(0, 1)).await?;
    wait_for_state(orch, &nsr_id, "running").await?;

    orch.scale_out(&nsr_id, fixtures::WORKER_GROUP)
        .await
        .map_err(|e| format!("first scale_out failed: {}", e))?;
    wait_for_state(orch, &nsr_id, "running").await?;

    let vnfrs = orch.registered_vnfr_count().await;
    if orch.scale_out(&nsr_id, fixtures::WORKER_GROUP).await.is_ok() {
        return Err("scale-out past max_instance_count was accepted".into());
    }
    let after = orch.registered_vnfr_count().await;
    if after != vnfrs {
        return Err(format!(
            "rejected scale-out still created VNFRs ({} before, {} after)",
            vnfrs, after
        ));
    }
    let view = orch
        .ns(&nsr_id)
        .await
        .map_err(|e| format!("ns failed: {}", e))?;
    if view.state != "running" {
        return Err(format!("NS left running after a rejected scale-out: {}", view.state));
    }
    Ok(())
}
