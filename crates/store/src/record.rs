use serde::{Deserialize, Serialize};

/// The kind of change applied to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Delete,
}

/// A committed change, delivered to subscribers whose prefix matches `path`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub path: String,
    pub action: Action,
    /// The new value. On delete, the value that was removed.
    pub value: serde_json::Value,
}

/// One step of a [`Transaction`].
#[derive(Debug, Clone, PartialEq)]
pub enum TxnOp {
    /// Insert a record; fails if the path is occupied.
    Create {
        path: String,
        value: serde_json::Value,
    },
    /// Insert or replace a record.
    Update {
        path: String,
        value: serde_json::Value,
    },
    /// Remove a record; fails if the path is empty.
    Delete { path: String },
    /// Read a record as seen at this point of the transaction.
    Read { path: String },
}

/// Per-operation result of an executed transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum TxnResponse {
    Done,
    Value(Option<serde_json::Value>),
}

/// An ordered batch of operations applied all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    ops: Vec<TxnOp>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_create(mut self, path: impl Into<String>, value: serde_json::Value) -> Self {
        self.ops.push(TxnOp::Create {
            path: path.into(),
            value,
        });
        self
    }

    pub fn add_update(mut self, path: impl Into<String>, value: serde_json::Value) -> Self {
        self.ops.push(TxnOp::Update {
            path: path.into(),
            value,
        });
        self
    }

    pub fn add_delete(mut self, path: impl Into<String>) -> Self {
        self.ops.push(TxnOp::Delete { path: path.into() });
        self
    }

    pub fn add_read(mut self, path: impl Into<String>) -> Self {
        self.ops.push(TxnOp::Read { path: path.into() });
        self
    }

    pub fn ops(&self) -> &[TxnOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<TxnOp> {
        self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
