//! Application state.

use std::sync::Arc;

use nfvo_orchestrator::sim::SimCloud;
use nfvo_orchestrator::NsManager;
use slog::Logger;

/// Application state shared across request handlers.
pub(crate) struct AppState {
    pub(crate) manager: Arc<NsManager>,
    /// The simulated collaborators behind `manager`.
    pub(crate) cloud: SimCloud,
    pub(crate) log: Logger,
}
