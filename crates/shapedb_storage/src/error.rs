//! Error types for engine operations.

use thiserror::Error;

/// Result type for engine operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors reported by a storage engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// A record with this key already exists (`add` only).
    #[error("key {key} already exists in store {store}")]
    Constraint {
        /// The store written to.
        store: String,
        /// The conflicting key.
        key: String,
    },

    /// The named store does not exist.
    #[error("store not found: {0}")]
    StoreNotFound(String),

    /// A store with this name already exists.
    #[error("store already exists: {0}")]
    StoreExists(String),

    /// The data could not be stored as given (missing or invalid key).
    #[error("data error: {0}")]
    Data(String),

    /// The requested version is lower than the stored one.
    #[error("requested version {requested} is less than stored version {stored}")]
    Version {
        /// The version asked for.
        requested: u32,
        /// The version on record.
        stored: u32,
    },

    /// Versions must be positive.
    #[error("invalid version: versions start at 1")]
    InvalidVersion,

    /// A write was attempted in a read-only transaction.
    #[error("transaction on store {0} is read-only")]
    ReadOnly(String),

    /// The operation is not valid in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The engine ran out of space.
    #[error("quota exceeded")]
    QuotaExceeded,

    /// The request was aborted before it completed.
    #[error("request aborted: {0}")]
    Aborted(String),

    /// The connection is closed.
    #[error("connection is closed")]
    Closed,
}
