//! In-process [`RecordStore`] backend.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

use crate::error::StoreError;
use crate::record::{Action, ChangeEvent, Transaction, TxnOp, TxnResponse};
use crate::traits::{RecordStore, Subscription};

const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// A `BTreeMap`-backed store with a broadcast change stream.
///
/// Transactions are staged against a copy of the touched paths and only
/// written back if every operation succeeds. Events are broadcast while
/// the write lock is held, so subscribers observe commit order.
pub struct InMemoryStore {
    records: RwLock<BTreeMap<String, serde_json::Value>>,
    events: broadcast::Sender<ChangeEvent>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create a store whose subscribers may lag by at most `capacity` events.
    pub fn with_event_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            records: RwLock::new(BTreeMap::new()),
            events,
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn execute(&self, txn: Transaction) -> Result<Vec<TxnResponse>, StoreError> {
        let mut records = self.records.write().await;

        // Staged view: path -> Some(new value) | None (deleted)
        let mut staged: BTreeMap<String, Option<serde_json::Value>> = BTreeMap::new();
        let mut events = Vec::new();
        let mut responses = Vec::with_capacity(txn.ops().len());

        let current = |staged: &BTreeMap<String, Option<serde_json::Value>>, path: &str| {
            match staged.get(path) {
                Some(v) => v.clone(),
                None => records.get(path).cloned(),
            }
        };

        for op in txn.into_ops() {
            match op {
                TxnOp::Create { path, value } => {
                    if current(&staged, &path).is_some() {
                        return Err(StoreError::AlreadyExists { path });
                    }
                    events.push(ChangeEvent {
                        path: path.clone(),
                        action: Action::Create,
                        value: value.clone(),
                    });
                    staged.insert(path, Some(value));
                    responses.push(TxnResponse::Done);
                }
                TxnOp::Update { path, value } => {
                    let action = if current(&staged, &path).is_some() {
                        Action::Update
                    } else {
                        Action::Create
                    };
                    events.push(ChangeEvent {
                        path: path.clone(),
                        action,
                        value: value.clone(),
                    });
                    staged.insert(path, Some(value));
                    responses.push(TxnResponse::Done);
                }
                TxnOp::Delete { path } => {
                    let Some(old) = current(&staged, &path) else {
                        return Err(StoreError::NotFound { path });
                    };
                    events.push(ChangeEvent {
                        path: path.clone(),
                        action: Action::Delete,
                        value: old,
                    });
                    staged.insert(path, None);
                    responses.push(TxnResponse::Done);
                }
                TxnOp::Read { path } => {
                    responses.push(TxnResponse::Value(current(&staged, &path)));
                }
            }
        }

        for (path, value) in staged {
            match value {
                Some(v) => {
                    records.insert(path, v);
                }
                None => {
                    records.remove(&path);
                }
            }
        }
        for event in events {
            // No receivers is not an error
            let _ = self.events.send(event);
        }

        Ok(responses)
    }

    async fn read(&self, path: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.records.read().await.get(path).cloned())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, serde_json::Value)>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn subscribe(&self, prefix: &str) -> Subscription {
        Subscription::new(prefix, self.events.subscribe())
    }
}
