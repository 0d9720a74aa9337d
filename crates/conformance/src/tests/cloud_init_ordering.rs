//! Cloud-init ordering between VDUs.
//!
//! A VDU whose cloud-init reads another VDU's management IP is not
//! requested before that VDU is active, and is never requested when that
//! VDU fails.

use std::time::Duration;

use super::{load_catalog, start_ns, wait_for_state};
use crate::fixtures;
use crate::traits::{TestableOrchestrator, VmEventKind};

pub async fn test_cloud_init_waits_for_referenced_vdu<O: TestableOrchestrator>(
    orch: &O,
) -> Result<(), String> {
    load_catalog(orch).await?;
    orch.script_vdu_delay(fixtures::DB_VDU, Duration::from_millis(50));
    let nsr_id = start_ns(orch, "ordered-boot", fixtures::cloud_init_nsd()).await?;
    wait_for_state(orch, &nsr_id, "running").await?;

    let events = orch.vm_events();
    let db_active = events
        .iter()
        .position(|e| e.kind == VmEventKind::Active && e.node.contains(fixtures::DB_VDU))
        .ok_or_else(|| format!("db VDU never became active: {:?}", events))?;
    let app_requested = events
        .iter()
        .position(|e| e.kind == VmEventKind::Requested && e.node.contains(fixtures::APP_VDU))
        .ok_or_else(|| format!("app VDU was never requested: {:?}", events))?;
    if app_requested < db_active {
        return Err(format!(
            "app VDU requested before the db VDU it reads was active: {:?}",
            events
        ));
    }

    let vnfs = orch
        .vnfs(&nsr_id)
        .await
        .map_err(|e| format!("vnfs failed: {}", e))?;
    let app = vnfs
        .iter()
        .flat_map(|v| v.vdurs.iter())
        .find(|d| d.vdu_id == fixtures::APP_VDU)
        .ok_or("no app VDUR")?;
    if app.state != "ready" {
        return Err(format!("app VDUR ended {}", app.state));
    }
    Ok(())
}

pub async fn test_cloud_init_aborts_on_failed_reference<O: TestableOrchestrator>(
    orch: &O,
) -> Result<(), String> {
    load_catalog(orch).await?;
    orch.script_vdu_failure(fixtures::DB_VDU, "image not found");
    let nsr_id = start_ns(orch, "broken-boot", fixtures::cloud_init_nsd()).await?;
    wait_for_state(orch, &nsr_id, "failed").await?;

    let events = orch.vm_events();
    if events
        .iter()
        .any(|e| e.kind == VmEventKind::Requested && e.node.contains(fixtures::APP_VDU))
    {
        return Err(format!(
            "app VDU was requested although the db VDU failed: {:?}",
            events
        ));
    }
    Ok(())
}
