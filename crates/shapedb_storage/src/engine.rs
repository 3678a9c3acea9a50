//! The engine boundary.
//!
//! A storage engine is an externally supplied, versioned key-value store with
//! named stores. Every request completes exactly once through a
//! single-shot callback; implementations may invoke it inline or later from
//! another task.

use crate::error::StorageResult;
use crate::key::Key;
use shapedb_codec::Value;
use std::sync::Arc;

/// Single-shot completion callback for an engine request.
pub type Completion<T> = Box<dyn FnOnce(StorageResult<T>) + Send + 'static>;

/// Upgrade step run by [`StorageEngine::open`] when the requested version is
/// higher than the stored one.
///
/// If the hook fails, the open fails and the database is left as it was.
pub type UpgradeHook = Box<dyn FnOnce(&mut dyn UpgradeContext) -> StorageResult<()> + Send + 'static>;

/// Transaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    /// Reads only.
    ReadOnly,
    /// Reads and writes.
    ReadWrite,
}

/// Schema access during an upgrade.
pub trait UpgradeContext {
    /// Version on record before this open (0 for a new database).
    fn old_version(&self) -> u32;

    /// Version being opened.
    fn new_version(&self) -> u32;

    /// Names of existing stores, sorted.
    fn store_names(&self) -> Vec<String>;

    /// Returns true if the store exists.
    fn has_store(&self, name: &str) -> bool;

    /// Creates a store whose records are keyed by the `key_path` field.
    ///
    /// # Errors
    ///
    /// Returns `StoreExists` if the store already exists.
    fn create_store(&mut self, name: &str, key_path: &str) -> StorageResult<()>;
}

/// A versioned key-value storage engine.
pub trait StorageEngine: Send + Sync {
    /// Opens (creating if needed) the database `name` at `version`.
    ///
    /// `upgrade` runs only when `version` exceeds the stored version. The
    /// completion receives the open connection, or the error that prevented
    /// it (`InvalidVersion`, `Version`, or whatever the hook returned).
    fn open(
        &self,
        name: &str,
        version: u32,
        upgrade: UpgradeHook,
        on_complete: Completion<Arc<dyn EngineConnection>>,
    );

    /// Deletes a database and all its stores. Deleting an unknown database
    /// succeeds.
    fn delete_database(&self, name: &str, on_complete: Completion<()>);
}

/// An open database.
pub trait EngineConnection: Send + Sync {
    /// Database name.
    fn name(&self) -> &str;

    /// Version the database was opened at.
    fn version(&self) -> u32;

    /// Names of all stores, sorted.
    fn store_names(&self) -> Vec<String>;

    /// Starts a transaction over one store.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the connection is closed and `StoreNotFound` if
    /// the store does not exist. Requests on a handle whose connection has
    /// since closed fail with `InvalidState`.
    fn transaction(&self, store: &str, mode: TransactionMode) -> StorageResult<Box<dyn StoreHandle>>;

    /// Closes the connection. Idempotent.
    fn close(&self);
}

/// A store within a transaction.
///
/// Each request takes one completion that is invoked exactly once.
pub trait StoreHandle: Send + Sync {
    /// Inserts a record; fails with `Constraint` if its key exists.
    fn add(&self, value: Value, on_complete: Completion<Key>);

    /// Inserts or replaces a record.
    fn put(&self, value: Value, on_complete: Completion<Key>);

    /// Reads the record with `key`, if any.
    fn get(&self, key: Key, on_complete: Completion<Option<Value>>);

    /// Reads every record in ascending key order.
    fn get_all(&self, on_complete: Completion<Vec<Value>>);

    /// Counts records.
    fn count(&self, on_complete: Completion<usize>);

    /// Deletes the record with `key`. Deleting an absent key succeeds.
    fn delete(&self, key: Key, on_complete: Completion<()>);

    /// Deletes every record.
    fn clear(&self, on_complete: Completion<()>);
}
