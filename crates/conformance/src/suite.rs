//! The `orchestrator_conformance_tests!` macro.
//!
//! The macro generates one `#[tokio::test]` function per orchestrator
//! obligation for any type that implements `TestableOrchestrator`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use nfvo_conformance::orchestrator_conformance_tests;
//!
//! struct MyHarness { /* ... */ }
//!
//! // Implement TestableOrchestrator for MyHarness ...
//!
//! orchestrator_conformance_tests!(MyHarness::new());
//! ```
//!
//! Orchestrators that delegate resources to an external system and cannot
//! script individual VDUs or networks run the lifecycle subset instead:
//!
//! ```rust,ignore
//! orchestrator_conformance_tests!(lifecycle: MyRoHarness::new());
//! ```
//!
//! Each generated test function is named `conformance_<obligation>` and
//! can be run with `cargo test conformance_`.

/// Generate conformance tests for an orchestrator harness.
///
/// The harness expression is evaluated fresh for each test, so each test
/// gets an independent orchestrator and cloud.
#[macro_export]
macro_rules! orchestrator_conformance_tests {
    (lifecycle: $harness:expr) => {
        #[tokio::test]
        async fn conformance_monotonic_instantiation() {
            let harness = $harness;
            $crate::tests::monotonic_instantiation::test_monotonic_instantiation(&harness)
                .await
                .expect("instantiation ordering conformance failed");
        }

        #[tokio::test]
        async fn conformance_scale_bounds() {
            let harness = $harness;
            $crate::tests::scale_bounds::test_scale_bounds(&harness)
                .await
                .expect("scale bounds conformance failed");
        }

        #[tokio::test]
        async fn conformance_scale_out_at_max_rejected() {
            let harness = $harness;
            $crate::tests::scenario_scale_at_max::test_scale_out_at_max_rejected(&harness)
                .await
                .expect("scale-out at max conformance failed");
        }

        #[tokio::test]
        async fn conformance_ip_profile_defaulting() {
            let harness = $harness;
            $crate::tests::ip_profile_defaulting::test_ip_profile_defaulting(&harness)
                .await
                .expect("IP profile defaulting conformance failed");
        }
    };

    ($harness:expr) => {
        $crate::orchestrator_conformance_tests!(lifecycle: $harness);

        #[tokio::test]
        async fn conformance_monotonic_instantiation_with_default_instances() {
            let harness = $harness;
            $crate::tests::monotonic_instantiation::test_monotonic_instantiation_with_default_instances(&harness)
                .await
                .expect("instantiation ordering with default instances conformance failed");
        }

        #[tokio::test]
        async fn conformance_terminate_preempts_instantiate() {
            let harness = $harness;
            $crate::tests::terminate_preempts_instantiate::test_terminate_preempts_instantiate(&harness)
                .await
                .expect("terminate preemption conformance failed");
        }

        #[tokio::test]
        async fn conformance_failure_propagation() {
            let harness = $harness;
            $crate::tests::failure_propagation::test_failure_propagation(&harness)
                .await
                .expect("failure propagation conformance failed");
        }

        #[tokio::test]
        async fn conformance_scale_out_failure_reverts_to_running() {
            let harness = $harness;
            $crate::tests::failure_propagation::test_scale_out_failure_reverts_to_running(&harness)
                .await
                .expect("scale-out failure revert conformance failed");
        }

        #[tokio::test]
        async fn conformance_idempotent_restart() {
            let harness = $harness;
            $crate::tests::idempotent_restart::test_idempotent_restart(&harness)
                .await
                .expect("idempotent restart conformance failed");
        }

        #[tokio::test]
        async fn conformance_cloud_init_waits_for_referenced_vdu() {
            let harness = $harness;
            $crate::tests::cloud_init_ordering::test_cloud_init_waits_for_referenced_vdu(&harness)
                .await
                .expect("cloud-init ordering conformance failed");
        }

        #[tokio::test]
        async fn conformance_cloud_init_aborts_on_failed_reference() {
            let harness = $harness;
            $crate::tests::cloud_init_ordering::test_cloud_init_aborts_on_failed_reference(&harness)
                .await
                .expect("cloud-init abort conformance failed");
        }

        #[tokio::test]
        async fn conformance_single_vnf_reaches_running() {
            let harness = $harness;
            $crate::tests::scenario_single_vnf::test_single_vnf_reaches_running(&harness)
                .await
                .expect("single VNF scenario failed");
        }

        #[tokio::test]
        async fn conformance_failed_vdu_fails_ns() {
            let harness = $harness;
            $crate::tests::scenario_failed_vdu::test_failed_vdu_fails_ns(&harness)
                .await
                .expect("failed VDU scenario failed");
        }

        #[tokio::test]
        async fn conformance_terminate_mid_vl_phase() {
            let harness = $harness;
            $crate::tests::scenario_terminate_mid_vl::test_terminate_mid_vl_phase(&harness)
                .await
                .expect("terminate mid VL phase scenario failed");
        }
    };
}
