//! NFV orchestrator conformance suite.
//!
//! Provides a `TestableOrchestrator` trait and the
//! `orchestrator_conformance_tests!` macro for checking any orchestrator
//! against the NS lifecycle obligations: phase ordering, terminate
//! preemption, failure propagation, idempotent restart, IP profile
//! defaulting, cloud-init ordering and scale bounds.

pub mod fixtures;
pub mod suite;
pub mod tests;
pub mod traits;

pub use traits::*;
