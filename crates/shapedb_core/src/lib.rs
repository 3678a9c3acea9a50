//! # ShapeDB Core
//!
//! Schema-managed, validated, serialized access to an embedded key-value
//! store.
//!
//! This crate provides:
//! - Versioned schemas of named collections, each keyed by a record field
//! - Opening and one-way upgrading of databases
//! - Codec validation of every value written and every value read
//! - A FIFO operation gate so engine requests never interleave
//!
//! ## Example
//!
//! ```rust
//! use shapedb_core::{ConnectionManager, InMemoryEngine, Schema, Shape, Value};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = Schema::builder(1)
//!     .collection("users", "id", Shape::record([("id", Shape::Number), ("name", Shape::Text)]))
//!     .build()?;
//! let db = ConnectionManager::new(InMemoryEngine::new()).open("db1", schema).await?;
//! let users = db.collection::<Value>("users");
//!
//! let james = Value::record([("id", Value::from(1)), ("name", Value::from("James"))]);
//! users.insert(james.clone()).await?;
//! assert_eq!(users.get(1).await?, james);
//!
//! let bad = Value::record([("id", Value::from(2))]);
//! assert!(users.insert(bad).await.unwrap_err().is_validation());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod config;
mod connection;
mod error;
mod gate;
mod request;
mod schema;
mod stats;

pub use collection::Collection;
pub use config::{Config, GateScope};
pub use connection::{Connection, ConnectionManager, UpgradeReport};
pub use error::{CoreError, CoreResult};
pub use gate::OperationGate;
pub use schema::{CollectionSpec, Schema, SchemaBuilder};
pub use stats::{ConnectionStats, StatsSnapshot};

pub use shapedb_codec::{
    decode_all, Codec, DynCodec, SerdeCodec, Shape, ValidationError, ValidationResult, Value,
    Violation,
};
pub use shapedb_storage::{
    CompletionMode, EngineOp, InMemoryEngine, Key, StorageEngine, StorageError, StorageResult,
};
