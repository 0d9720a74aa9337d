use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::StoreError;
use crate::record::{ChangeEvent, Transaction, TxnResponse};

/// The hierarchical record store shared by the orchestrator managers.
///
/// Records are JSON values keyed by a `/`-separated path such as
/// `vnfr-catalog/<id>`. All writes go through [`RecordStore::execute`],
/// which applies a [`Transaction`] atomically: either every operation
/// takes effect or none does.
///
/// ## Change notification
///
/// Every committed write produces one [`ChangeEvent`] per written path, in
/// commit order. [`RecordStore::subscribe`] returns a [`Subscription`] that
/// yields the events whose path starts with the given prefix. A subscription
/// only sees events committed after it was created, so callers that need a
/// response must subscribe before issuing the request that triggers it.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static`; the store is shared as
/// `Arc<dyn RecordStore>` between record tasks and the HTTP layer.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Apply a transaction atomically and return one response per operation.
    async fn execute(&self, txn: Transaction) -> Result<Vec<TxnResponse>, StoreError>;

    /// Read the record at `path`, if any.
    async fn read(&self, path: &str) -> Result<Option<serde_json::Value>, StoreError>;

    /// All records whose path starts with `prefix`, ordered by path.
    async fn list(&self, prefix: &str) -> Result<Vec<(String, serde_json::Value)>, StoreError>;

    /// Subscribe to changes under `prefix`.
    fn subscribe(&self, prefix: &str) -> Subscription;

    // ── Single-operation shorthands ──────────────────────────────────

    async fn create(&self, path: &str, value: serde_json::Value) -> Result<(), StoreError> {
        self.execute(Transaction::new().add_create(path, value))
            .await
            .map(|_| ())
    }

    async fn update(&self, path: &str, value: serde_json::Value) -> Result<(), StoreError> {
        self.execute(Transaction::new().add_update(path, value))
            .await
            .map(|_| ())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.execute(Transaction::new().add_delete(path))
            .await
            .map(|_| ())
    }
}

/// A filtered view of the store's change stream.
pub struct Subscription {
    prefix: String,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    pub fn new(prefix: impl Into<String>, rx: broadcast::Receiver<ChangeEvent>) -> Self {
        Self {
            prefix: prefix.into(),
            rx,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Wait for the next matching event.
    ///
    /// Returns [`StoreError::Lagged`] once when events were dropped; the
    /// subscription stays usable afterwards.
    pub async fn recv(&mut self) -> Result<ChangeEvent, StoreError> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.path.starts_with(&self.prefix) => return Ok(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    return Err(StoreError::Lagged { skipped })
                }
                Err(broadcast::error::RecvError::Closed) => return Err(StoreError::Closed),
            }
        }
    }
}

// ── Typed helpers ────────────────────────────────────────────────────

/// Read the record at `path` and deserialize it.
pub async fn read_as<T: DeserializeOwned>(
    store: &dyn RecordStore,
    path: &str,
) -> Result<Option<T>, StoreError> {
    match store.read(path).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| StoreError::Serialization {
                path: path.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}

/// Serialize `value` for storage at `path`.
pub fn to_record<T: Serialize>(path: &str, value: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Serialization {
        path: path.to_string(),
        message: e.to_string(),
    })
}
