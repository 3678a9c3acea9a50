//! Error types for ShapeDB core.

use shapedb_codec::ValidationError;
use shapedb_storage::{Key, StorageError};
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in ShapeDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Opening or upgrading a database failed.
    #[error("failed to open database {name}: {source}")]
    Connection {
        /// Database name.
        name: String,
        /// What the engine reported.
        #[source]
        source: StorageError,
    },

    /// The collection is not declared in the connection's schema.
    #[error("Store not found: {name}")]
    CollectionNotFound {
        /// Name of the collection.
        name: String,
    },

    /// A value did not match the collection's codec.
    #[error("validation failed in collection {collection}: {source}")]
    Validation {
        /// The collection involved.
        collection: String,
        /// Every violation found.
        #[source]
        source: ValidationError,
    },

    /// No record exists under the key.
    #[error("no record with key {key} in collection {collection}")]
    NotFound {
        /// The collection searched.
        collection: String,
        /// The key that was not found.
        key: Key,
    },

    /// The engine rejected a request.
    #[error("engine error: {0}")]
    Engine(#[from] StorageError),

    /// The connection has been closed.
    #[error("connection is closed")]
    ConnectionClosed,

    /// A typed handle was requested for a type the collection's codec does
    /// not produce.
    #[error("collection {collection} holds {actual}, not {expected}")]
    TypeMismatch {
        /// The collection involved.
        collection: String,
        /// The requested type.
        expected: &'static str,
        /// The codec's output type.
        actual: &'static str,
    },

    /// The schema definition is invalid.
    #[error("invalid schema: {message}")]
    InvalidSchema {
        /// Description of the problem.
        message: String,
    },

    /// The task running an operation panicked or was cancelled.
    #[error("operation task failed: {message}")]
    TaskFailed {
        /// Description of the failure.
        message: String,
    },
}

impl CoreError {
    /// Creates a connection error.
    pub fn connection(name: impl Into<String>, source: StorageError) -> Self {
        Self::Connection {
            name: name.into(),
            source,
        }
    }

    /// Creates a collection-not-found error.
    pub fn collection_not_found(name: impl Into<String>) -> Self {
        Self::CollectionNotFound { name: name.into() }
    }

    /// Creates a validation error.
    pub fn validation(collection: impl Into<String>, source: ValidationError) -> Self {
        Self::Validation {
            collection: collection.into(),
            source,
        }
    }

    /// Creates a not-found error.
    pub fn not_found(collection: impl Into<String>, key: Key) -> Self {
        Self::NotFound {
            collection: collection.into(),
            key,
        }
    }

    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates a task failure error.
    pub fn task_failed(message: impl Into<String>) -> Self {
        Self::TaskFailed {
            message: message.into(),
        }
    }

    /// Returns true if this is a connection error.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Returns true if this is a collection-not-found error.
    pub fn is_collection_not_found(&self) -> bool {
        matches!(self, Self::CollectionNotFound { .. })
    }

    /// Returns true if this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Returns true if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if the engine rejected the request.
    pub fn is_engine(&self) -> bool {
        matches!(self, Self::Engine(_))
    }

    /// Returns the violations, if this is a validation error.
    pub fn violations(&self) -> Option<&[shapedb_codec::Violation]> {
        match self {
            Self::Validation { source, .. } => Some(source.violations()),
            _ => None,
        }
    }
}
