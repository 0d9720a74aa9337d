//! nfvo-descriptor: typed network service and VNF descriptors.
//!
//! Provides the NSD/VNFD/NS-instance structs consumed by the record
//! managers, a single [`from_bundle`] entry point that parses and
//! cross-checks a JSON bundle, and typed input-parameter patches.

pub mod deserialize;
pub mod patch;
pub mod types;

pub use deserialize::{from_bundle, validate_nsd, validate_vnfd, DescriptorBundle, DescriptorError};
pub use patch::{
    apply_input_parameters, InputParameter, InputParameterSpec, NsdField, PatchError,
    PatchOutcome, PatchTarget, VnfdField,
};
pub use types::*;
