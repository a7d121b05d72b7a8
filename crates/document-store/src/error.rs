use thiserror::Error;

use crate::EntityId;

/// Errors that can occur when interacting with the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another session committed a change to a document this session touched.
    #[error("Write conflict on {collection}/{id}: document changed since it was read")]
    WriteConflict { collection: String, id: EntityId },

    /// A document with the same ID already exists in the collection.
    #[error("Duplicate key in {collection}: {id}")]
    DuplicateKey { collection: String, id: EntityId },

    /// The session was already committed or aborted.
    #[error("Session is closed")]
    SessionClosed,

    /// An update operator could not be applied to the stored document.
    #[error("Invalid update on {path}: {reason}")]
    InvalidUpdate { path: String, reason: String },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true if retrying the whole transaction may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::WriteConflict { .. })
    }
}

/// Result type for document store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
