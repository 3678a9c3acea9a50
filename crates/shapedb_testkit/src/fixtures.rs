//! Test fixtures and database helpers.
//!
//! Provides a sample record type, schemas over it, and an in-memory database
//! wrapper for async tests.

use serde::{Deserialize, Serialize};
use shapedb_codec::{SerdeCodec, Shape};
use shapedb_core::{
    Collection, Config, Connection, ConnectionManager, CoreResult, GateScope, Schema,
};
use shapedb_storage::{CompletionMode, InMemoryEngine};

/// Name of the database opened by [`TestDb`].
pub const DB_NAME: &str = "db1";

/// Name of the users collection in the fixture schemas.
pub const USERS: &str = "users";

/// A sample record keyed by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Primary key.
    pub id: i64,
    /// Display name.
    pub name: String,
}

impl User {
    /// Creates a user.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Schema with a `users` collection of [`User`], keyed by `id`.
pub fn user_schema(version: u32) -> Schema {
    Schema::builder(version)
        .collection(USERS, "id", SerdeCodec::<User>::new())
        .build()
        .expect("fixture schema is valid")
}

/// The `{ id: number, name: string }` shape.
pub fn user_shape() -> Shape {
    Shape::record([("id", Shape::Number), ("name", Shape::Text)])
}

/// Schema with a `users` collection guarded by [`user_shape`].
pub fn shaped_user_schema(version: u32) -> Schema {
    Schema::builder(version)
        .collection(USERS, "id", user_shape())
        .build()
        .expect("fixture schema is valid")
}

/// An open in-memory database with its own gate.
///
/// Each `TestDb` gets a fresh engine and a per-connection gate, so tests
/// running in parallel never wait on each other.
pub struct TestDb {
    /// The engine, for inspection and failure injection.
    pub engine: InMemoryEngine,
    /// The manager that opened the connection.
    pub manager: ConnectionManager,
    /// The open connection.
    pub connection: Connection,
}

impl TestDb {
    /// Opens [`DB_NAME`] on an engine that completes requests inline.
    pub async fn open(schema: Schema) -> Self {
        Self::open_with(InMemoryEngine::new(), schema).await
    }

    /// Opens [`DB_NAME`] on an engine that completes requests from spawned
    /// tasks.
    pub async fn open_deferred(schema: Schema) -> Self {
        Self::open_with(InMemoryEngine::with_mode(CompletionMode::Deferred), schema).await
    }

    /// Opens [`DB_NAME`] on `engine`.
    pub async fn open_with(engine: InMemoryEngine, schema: Schema) -> Self {
        let manager = ConnectionManager::with_config(
            engine.clone(),
            Config::new().gate_scope(GateScope::Connection),
        );
        let connection = manager
            .open(DB_NAME, schema)
            .await
            .expect("Failed to open test database");
        Self {
            engine,
            manager,
            connection,
        }
    }

    /// The typed users collection.
    pub fn users(&self) -> Collection<User> {
        self.connection.collection(USERS)
    }

    /// Opens another connection to the same database.
    pub async fn reopen(&self, schema: Schema) -> CoreResult<Connection> {
        self.manager.open(DB_NAME, schema).await
    }
}

impl std::ops::Deref for TestDb {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        &self.connection
    }
}
