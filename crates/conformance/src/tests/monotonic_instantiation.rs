//! Instantiation ordering.
//!
//! A successful instantiation moves through INIT, VL_INIT_PHASE and
//! VNF_INIT_PHASE, then the VNFFG phase if the NSD has forwarding graphs
//! and the scaling phase if it has default instances, and ends RUNNING.
//! No state is skipped or revisited.

use super::{load_catalog, start_ns, wait_for_state};
use crate::fixtures;
use crate::traits::TestableOrchestrator;

fn expect_history(actual: &[String], expected: &[&str]) -> Result<(), String> {
    if actual.iter().map(String::as_str).eq(expected.iter().copied()) {
        Ok(())
    } else {
        Err(format!(
            "instantiation went through {:?}, expected {:?}",
            actual, expected
        ))
    }
}

/// Phases of an NS without forwarding graphs or scaling groups.
pub async fn test_monotonic_instantiation<O: TestableOrchestrator>(orch: &O) -> Result<(), String> {
    load_catalog(orch).await?;
    let nsr_id = start_ns(orch, "ordering", fixtures::single_vnf_nsd()).await?;
    let view = wait_for_state(orch, &nsr_id, "running").await?;
    expect_history(
        &view.history,
        &["init", "vl_init_phase", "vnf_init_phase", "running"],
    )
}

/// Default scaling instances add a scaling phase before RUNNING.
pub async fn test_monotonic_instantiation_with_default_instances<O: TestableOrchestrator>(
    orch: &O,
) -> Result<(), String> {
    load_catalog(orch).await?;
    let nsr_id = start_ns(orch, "ordering-scaled", fixtures::scaled_nsd(1, 2)).await?;
    let view = wait_for_state(orch, &nsr_id, "running").await?;
    expect_history(
        &view.history,
        &["init", "vl_init_phase", "vnf_init_phase", "scaling_out", "running"],
    )
}
