//! Typed collection implementation.

use crate::connection::Connection;
use crate::error::{CoreError, CoreResult};
use crate::request::single_shot;
use crate::schema::CollectionSpec;
use shapedb_codec::{ValidationError, Value};
use shapedb_storage::{Key, StorageError, StoreHandle, TransactionMode};
use std::any::{type_name, TypeId};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// A typed handle on one collection of an open connection.
///
/// Every operation waits for the connection's gate, then checks that the
/// connection is open and that the collection exists with a codec producing
/// `T`. Writes are encoded and validated before anything reaches the engine;
/// reads are validated after the engine returns.
///
/// # Example
///
/// ```rust
/// use serde::{Deserialize, Serialize};
/// use shapedb_core::{ConnectionManager, InMemoryEngine, Schema, SerdeCodec};
///
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let schema = Schema::builder(1)
///     .collection("users", "id", SerdeCodec::<User>::new())
///     .build()?;
/// let db = ConnectionManager::new(InMemoryEngine::new())
///     .open("db1", schema)
///     .await?;
///
/// let users = db.collection::<User>("users");
/// users.insert(User { id: 1, name: "James".into() }).await?;
/// users.put(User { id: 1, name: "Jimmy".into() }).await?;
/// assert_eq!(users.get(1).await?.name, "Jimmy");
///
/// assert!(users.remove(1).await?);
/// assert!(users.get_all().await?.is_empty());
/// # Ok(())
/// # }
/// ```
pub struct Collection<T> {
    connection: Connection,
    name: Arc<str>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            connection: self.connection.clone(),
            name: Arc::clone(&self.name),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("type", &type_name::<T>())
            .field("connection", &self.connection)
            .finish()
    }
}

impl<T: Send + 'static> Collection<T> {
    pub(crate) fn new(connection: Connection, name: &str) -> Self {
        Self {
            connection,
            name: Arc::from(name),
            _marker: PhantomData,
        }
    }

    /// Returns the collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the connection this handle is bound to.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Adds a new record, returning it as given.
    ///
    /// # Errors
    ///
    /// `Validation` if the value does not encode or has no usable primary
    /// key; `Engine` with a constraint error if the key is already taken.
    pub async fn insert(&self, value: T) -> CoreResult<T> {
        self.gated(move |c| async move { c.write(value, WriteMode::Insert).await })
            .await
    }

    /// Adds or replaces a record, returning it as given.
    ///
    /// # Errors
    ///
    /// `Validation` if the value does not encode or has no usable primary
    /// key.
    pub async fn put(&self, value: T) -> CoreResult<T> {
        self.gated(move |c| async move { c.write(value, WriteMode::Put).await })
            .await
    }

    /// Reads the record stored under `key`.
    ///
    /// # Errors
    ///
    /// `NotFound` if there is no such record; `Validation` if the stored
    /// value no longer matches the codec.
    pub async fn get(&self, key: impl Into<Key>) -> CoreResult<T> {
        let key = key.into();
        self.gated(move |c| async move {
            match c.read(&key).await? {
                Some(value) => Ok(value),
                None => Err(CoreError::not_found(c.name(), key)),
            }
        })
        .await
    }

    /// Reads the record stored under `key`, if there is one.
    ///
    /// # Errors
    ///
    /// `Validation` if the stored value no longer matches the codec.
    pub async fn get_optional(&self, key: impl Into<Key>) -> CoreResult<Option<T>> {
        let key = key.into();
        self.gated(move |c| async move { c.read(&key).await }).await
    }

    /// Reads every record, in ascending key order.
    ///
    /// # Errors
    ///
    /// `Validation` if any stored value fails to decode; the error lists
    /// every failing element by index and no partial result is returned.
    pub async fn get_all(&self) -> CoreResult<Vec<T>> {
        self.gated(|c| async move {
            let spec = c.resolve()?;
            let store = c.transaction(TransactionMode::ReadOnly)?;
            let raws = c.engine(single_shot(|done| store.get_all(done)).await)?;

            let decoded = spec
                .codec()
                .decode_all_dyn(&raws)
                .map_err(|err| c.invalid(err))?;
            let values = decoded
                .into_iter()
                .map(|boxed| c.unbox(boxed))
                .collect::<CoreResult<Vec<T>>>()?;

            c.connection.stats().record_scan();
            c.trace("get_all", None);
            Ok(values)
        })
        .await
    }

    /// Deletes the record stored under `key`. Deleting an absent key
    /// succeeds.
    ///
    /// # Errors
    ///
    /// `CollectionNotFound` if the collection is not in the schema; `Engine`
    /// if the engine fails the request.
    pub async fn remove(&self, key: impl Into<Key>) -> CoreResult<bool> {
        let key = key.into();
        self.gated(move |c| async move {
            c.resolve()?;
            let store = c.transaction(TransactionMode::ReadWrite)?;
            c.engine(single_shot(|done| store.delete(key.clone(), done)).await)?;
            c.connection.stats().record_delete();
            c.trace("remove", Some(&key));
            Ok(true)
        })
        .await
    }

    /// Deletes every record in the collection.
    ///
    /// # Errors
    ///
    /// `CollectionNotFound` if the collection is not in the schema; `Engine`
    /// if the engine fails the request.
    pub async fn clear_collection(&self) -> CoreResult<bool> {
        self.gated(|c| async move {
            c.resolve()?;
            let store = c.transaction(TransactionMode::ReadWrite)?;
            c.engine(single_shot(|done| store.clear(done)).await)?;
            c.connection.stats().record_clear();
            c.trace("clear_collection", None);
            Ok(true)
        })
        .await
    }

    /// Counts the records in the collection.
    ///
    /// # Errors
    ///
    /// `CollectionNotFound` if the collection is not in the schema; `Engine`
    /// if the engine fails the request.
    pub async fn count(&self) -> CoreResult<usize> {
        self.gated(|c| async move {
            c.resolve()?;
            let store = c.transaction(TransactionMode::ReadOnly)?;
            let count = c.engine(single_shot(|done| store.count(done)).await)?;
            c.connection.stats().record_scan();
            c.trace("count", None);
            Ok(count)
        })
        .await
    }

    /// Runs `op` on a clone of this handle under the connection's gate.
    async fn gated<R, F, Fut>(&self, op: F) -> CoreResult<R>
    where
        R: Send + 'static,
        F: FnOnce(Self) -> Fut,
        Fut: Future<Output = CoreResult<R>> + Send + 'static,
    {
        let this = self.clone();
        self.connection.gate().run_exclusive(move || op(this)).await
    }

    async fn write(&self, value: T, mode: WriteMode) -> CoreResult<T> {
        let spec = self.resolve()?;
        let raw = spec
            .codec()
            .encode_dyn(&value)
            .map_err(|err| self.invalid(err))?;
        let key = self.primary_key(spec, &raw)?;

        let store = self.transaction(TransactionMode::ReadWrite)?;
        let submitted = match mode {
            WriteMode::Insert => single_shot(|done| store.add(raw, done)).await,
            WriteMode::Put => single_shot(|done| store.put(raw, done)).await,
        };
        self.engine(submitted)?;

        self.connection.stats().record_write();
        self.trace(mode.name(), Some(&key));
        Ok(value)
    }

    async fn read(&self, key: &Key) -> CoreResult<Option<T>> {
        let spec = self.resolve()?;
        let store = self.transaction(TransactionMode::ReadOnly)?;
        let raw = self.engine(single_shot(|done| store.get(key.clone(), done)).await)?;

        let value = match raw {
            Some(raw) => {
                let boxed = spec
                    .codec()
                    .decode_dyn(&raw)
                    .map_err(|err| self.invalid(err))?;
                Some(self.unbox(boxed)?)
            }
            None => None,
        };

        self.connection.stats().record_read();
        self.trace("get", Some(key));
        Ok(value)
    }

    /// Checks the connection and finds this collection's spec.
    fn resolve(&self) -> CoreResult<&CollectionSpec> {
        self.connection.ensure_open()?;
        let spec = self
            .connection
            .schema()
            .find_collection(&self.name)
            .ok_or_else(|| CoreError::collection_not_found(self.name()))?;

        let codec = spec.codec();
        if codec.output_type() != TypeId::of::<T>() {
            return Err(CoreError::TypeMismatch {
                collection: self.name.to_string(),
                expected: type_name::<T>(),
                actual: codec.output_type_name(),
            });
        }
        Ok(spec)
    }

    fn primary_key(&self, spec: &CollectionSpec, raw: &Value) -> CoreResult<Key> {
        let field = spec.primary_key();
        match raw.get(field) {
            Some(value) => Key::from_value(value).ok_or_else(|| {
                self.invalid(ValidationError::single(
                    field,
                    "primary key (number, string, bytes or array)",
                    value.describe(),
                ))
            }),
            None => Err(self.invalid(ValidationError::single(
                field,
                "primary key",
                "undefined",
            ))),
        }
    }

    fn transaction(&self, mode: TransactionMode) -> CoreResult<Box<dyn StoreHandle>> {
        let store = self.connection.handle().transaction(&self.name, mode);
        self.engine(store)
    }

    fn unbox(&self, boxed: Box<dyn std::any::Any + Send>) -> CoreResult<T> {
        boxed.downcast::<T>().map(|value| *value).map_err(|_| {
            CoreError::TypeMismatch {
                collection: self.name.to_string(),
                expected: type_name::<T>(),
                actual: "a value of another type",
            }
        })
    }

    fn invalid(&self, err: ValidationError) -> CoreError {
        self.connection.stats().record_validation_failure();
        debug!(
            connection = %self.connection.id(),
            collection = %self.name,
            error = %err,
            "validation failed"
        );
        CoreError::validation(self.name(), err)
    }

    fn engine<R>(&self, result: Result<R, StorageError>) -> CoreResult<R> {
        result.map_err(|err| {
            self.connection.stats().record_engine_error();
            debug!(
                connection = %self.connection.id(),
                collection = %self.name,
                error = %err,
                "engine request failed"
            );
            CoreError::Engine(err)
        })
    }

    fn trace(&self, op: &'static str, key: Option<&Key>) {
        match key {
            Some(key) => debug!(
                connection = %self.connection.id(),
                collection = %self.name,
                op,
                %key,
                "operation completed"
            ),
            None => debug!(
                connection = %self.connection.id(),
                collection = %self.name,
                op,
                "operation completed"
            ),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum WriteMode {
    Insert,
    Put,
}

impl WriteMode {
    fn name(self) -> &'static str {
        match self {
            WriteMode::Insert => "insert",
            WriteMode::Put => "put",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, ConnectionManager, GateScope, Schema};
    use shapedb_codec::{SerdeCodec, Shape};
    use shapedb_storage::{EngineOp, InMemoryEngine};

    async fn open(engine: &InMemoryEngine) -> Connection {
        let schema = Schema::builder(1)
            .collection(
                "users",
                "id",
                Shape::record([("id", Shape::Number), ("name", Shape::Text)]),
            )
            .collection("tags", "name", SerdeCodec::<String>::new())
            .build()
            .unwrap();
        ConnectionManager::with_config(
            engine.clone(),
            Config::new().gate_scope(GateScope::Connection),
        )
        .open("db", schema)
        .await
        .unwrap()
    }

    fn user(id: i64, name: &str) -> Value {
        Value::record([("id", Value::from(id)), ("name", Value::from(name))])
    }

    #[tokio::test]
    async fn insert_then_get() {
        let engine = InMemoryEngine::new();
        let users = open(&engine).await.collection::<Value>("users");

        assert_eq!(users.insert(user(1, "James")).await.unwrap(), user(1, "James"));
        assert_eq!(users.get(1).await.unwrap(), user(1, "James"));
        assert_eq!(users.get_optional(2).await.unwrap(), None);
        assert!(users.get(2).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn duplicate_insert_is_engine_error() {
        let engine = InMemoryEngine::new();
        let users = open(&engine).await.collection::<Value>("users");
        users.insert(user(1, "James")).await.unwrap();

        let err = users.insert(user(1, "Other")).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Engine(StorageError::Constraint { .. })
        ));
        assert_eq!(users.get(1).await.unwrap(), user(1, "James"));
    }

    #[tokio::test]
    async fn invalid_write_never_reaches_engine() {
        let engine = InMemoryEngine::new();
        let conn = open(&engine).await;
        let users = conn.collection::<Value>("users");

        let err = users
            .insert(Value::record([("id", Value::from(1))]))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.violations().unwrap()[0].path, "name");
        assert_eq!(engine.record_count("db", "users"), Some(0));
        assert_eq!(conn.stats().snapshot().validation_failures, 1);
    }

    #[tokio::test]
    async fn unusable_primary_key_is_validation_error() {
        let engine = InMemoryEngine::new();
        let tags = open(&engine).await.collection::<String>("tags");

        // A bare string has no `name` field to key on.
        let err = tags.put("rust".to_string()).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.violations().unwrap()[0].path, "name");
        assert_eq!(err.violations().unwrap()[0].actual, "undefined");
    }

    #[tokio::test]
    async fn drifted_record_fails_read() {
        let engine = InMemoryEngine::new();
        let users = open(&engine).await.collection::<Value>("users");
        users.insert(user(1, "James")).await.unwrap();
        engine
            .insert_raw("db", "users", Value::record([("id", Value::from(2))]))
            .unwrap();

        assert!(users.get(2).await.unwrap_err().is_validation());

        let err = users.get_all().await.unwrap_err();
        assert_eq!(err.violations().unwrap()[0].path, "[1].name");
    }

    #[tokio::test]
    async fn unknown_collection() {
        let engine = InMemoryEngine::new();
        let posts = open(&engine).await.collection::<Value>("posts");

        assert!(posts.get_all().await.unwrap_err().is_collection_not_found());
        assert!(posts.insert(user(1, "x")).await.unwrap_err().is_collection_not_found());
        assert!(posts.remove(1).await.unwrap_err().is_collection_not_found());
        assert!(posts.clear_collection().await.unwrap_err().is_collection_not_found());
        assert!(posts.count().await.unwrap_err().is_collection_not_found());
    }

    #[tokio::test]
    async fn wrong_type_is_rejected() {
        let engine = InMemoryEngine::new();
        let users = open(&engine).await.collection::<String>("users");

        let err = users.get_all().await.unwrap_err();
        assert!(matches!(err, CoreError::TypeMismatch { .. }));
    }

    #[tokio::test]
    async fn remove_and_clear() {
        let engine = InMemoryEngine::new();
        let users = open(&engine).await.collection::<Value>("users");
        for id in 1..=3 {
            users.put(user(id, "x")).await.unwrap();
        }

        assert!(users.remove(2).await.unwrap());
        assert!(users.remove(42).await.unwrap());
        assert_eq!(users.count().await.unwrap(), 2);

        assert!(users.clear_collection().await.unwrap());
        assert!(users.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn closed_connection_rejects_operations() {
        let engine = InMemoryEngine::new();
        let conn = open(&engine).await;
        let users = conn.collection::<Value>("users");
        conn.close();

        assert!(matches!(
            users.count().await,
            Err(CoreError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn engine_failures_surface() {
        let engine = InMemoryEngine::new();
        let conn = open(&engine).await;
        let users = conn.collection::<Value>("users");

        engine.fail_next(EngineOp::Get, StorageError::Aborted("lost".into()));
        assert!(users.get(1).await.unwrap_err().is_engine());

        engine.fail_next(EngineOp::Transaction, StorageError::QuotaExceeded);
        assert!(users.put(user(1, "x")).await.unwrap_err().is_engine());
        assert_eq!(conn.stats().snapshot().engine_errors, 2);
    }

    #[tokio::test]
    async fn stats_count_successes() {
        let engine = InMemoryEngine::new();
        let conn = open(&engine).await;
        let users = conn.collection::<Value>("users");

        users.insert(user(1, "a")).await.unwrap();
        users.get(1).await.unwrap();
        users.get_all().await.unwrap();
        users.remove(1).await.unwrap();
        users.clear_collection().await.unwrap();

        let snap = conn.stats().snapshot();
        assert_eq!((snap.writes, snap.reads, snap.scans), (1, 1, 1));
        assert_eq!((snap.deletes, snap.clears), (1, 1));
    }

    #[tokio::test]
    async fn handle_accessors() {
        let engine = InMemoryEngine::new();
        let conn = open(&engine).await;
        let users = conn.collection::<Value>("users");
        assert_eq!(users.name(), "users");
        assert_eq!(users.connection().id(), conn.id());
        assert!(format!("{:?}", users.clone()).contains("users"));
    }
}
