use nfvo_descriptor::{DescriptorError, PatchError};
use nfvo_store::StoreError;

/// All errors surfaced by the orchestrator core.
///
/// Collaborator failures on a single record (a VM that fails to boot, a
/// network the provider rejects) are not errors at this level: they move
/// the record to FAILED and are reported through the owning NSR's events.
/// An `OrchestratorError` means the operation itself could not proceed.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Bad descriptor, input parameter, account name or config file.
    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A referenced record exists in the model but is not usable yet.
    #[error("dependency not ready: {message}")]
    DependencyNotReady { message: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The resource manager (VM lifecycle) rejected or failed a call.
    #[error("resource manager error: {message}")]
    Resource { message: String },

    #[error("external resource orchestrator error: {0}")]
    ExternalRo(#[from] RoClientError),

    #[error("timed out after {millis}ms waiting for {what}")]
    Timeout { what: String, millis: u128 },

    #[error("VDU record error: {message}")]
    VduRecord { message: String },

    #[error("virtual link record error: {message}")]
    VirtualLinkRecord { message: String },

    #[error("VNF instantiation failed: {message}")]
    VnfrInstantiationFailed { message: String },

    #[error("network service record error: {message}")]
    NetworkServiceRecord { message: String },

    #[error("virtual link update rejected: {message}")]
    NsrVlUpdate { message: String },

    #[error("scaling operation rejected: {message}")]
    ScalingOperation { message: String },

    /// The state machine reached a configuration it should never be in.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl OrchestratorError {
    pub fn config(message: impl Into<String>) -> Self {
        OrchestratorError::Config {
            message: message.into(),
        }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        OrchestratorError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        OrchestratorError::Internal {
            message: message.into(),
        }
    }

    pub fn timeout(what: impl Into<String>, after: std::time::Duration) -> Self {
        OrchestratorError::Timeout {
            what: what.into(),
            millis: after.as_millis(),
        }
    }

    /// Rejections caused by the caller rather than by a collaborator.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            OrchestratorError::Config { .. }
                | OrchestratorError::NsrVlUpdate { .. }
                | OrchestratorError::ScalingOperation { .. }
        )
    }
}

impl From<DescriptorError> for OrchestratorError {
    fn from(e: DescriptorError) -> Self {
        OrchestratorError::config(e.to_string())
    }
}

impl From<PatchError> for OrchestratorError {
    fn from(e: PatchError) -> Self {
        OrchestratorError::config(e.to_string())
    }
}

/// Errors from an external resource orchestrator client.
#[derive(Debug, thiserror::Error)]
pub enum RoClientError {
    #[error("HTTP {status} from {url}: {message}")]
    Http {
        url: String,
        status: u16,
        message: String,
    },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("no instance with uuid {uuid}")]
    UnknownInstance { uuid: String },

    #[error("blocking task failed: {0}")]
    Join(String),
}
