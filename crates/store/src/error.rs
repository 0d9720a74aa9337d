/// All errors that can be returned by a RecordStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A create targeted a path that already holds a record.
    #[error("record already exists: {path}")]
    AlreadyExists { path: String },

    /// No record is stored at the path.
    #[error("record not found: {path}")]
    NotFound { path: String },

    /// A subscriber fell behind and missed events.
    #[error("subscriber lagged, {skipped} change events dropped")]
    Lagged { skipped: u64 },

    /// The store was dropped while a subscriber was waiting.
    #[error("record store closed")]
    Closed,

    /// A record could not be converted to or from its typed form.
    #[error("serialization error at {path}: {message}")]
    Serialization { path: String, message: String },

    /// A backend-specific storage error.
    #[error("store backend error: {0}")]
    Backend(String),
}
