//! nfvo-store: the hierarchical record store behind the orchestrator.
//!
//! Defines the object-safe [`RecordStore`] trait, atomic [`Transaction`]s,
//! prefix [`Subscription`]s, an [`InMemoryStore`] backend and a
//! backend-agnostic [`conformance`] suite.

pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StoreError;
pub use memory::InMemoryStore;
pub use record::{Action, ChangeEvent, Transaction, TxnOp, TxnResponse};
pub use traits::{read_as, to_record, RecordStore, Subscription};
