//! # ShapeDB Storage
//!
//! The storage engine boundary for ShapeDB, plus an in-memory engine.
//!
//! The engine is an externally supplied, versioned key-value store made of
//! named stores, each keyed by one field of its records. It knows nothing
//! about codecs or schemas; it stores whatever [`Value`](shapedb_codec::Value)
//! it is handed.
//!
//! ## Design Principles
//!
//! - Every request completes exactly once, through a single-shot callback
//! - Completions may arrive inline or later, from another task
//! - Versions only move forward; upgrades are all-or-nothing
//! - Engines must be `Send + Sync` for concurrent access
//!
//! ## Available Engines
//!
//! - [`InMemoryEngine`] - For testing and ephemeral storage

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod error;
mod key;
mod memory;

pub use engine::{
    Completion, EngineConnection, StorageEngine, StoreHandle, TransactionMode, UpgradeContext,
    UpgradeHook,
};
pub use error::{StorageError, StorageResult};
pub use key::Key;
pub use memory::{CompletionMode, EngineOp, InMemoryEngine};
