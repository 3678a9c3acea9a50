//! Opening, upgrading, and closing databases.

use crate::collection::Collection;
use crate::config::{Config, GateScope};
use crate::error::{CoreError, CoreResult};
use crate::gate::OperationGate;
use crate::request::single_shot;
use crate::schema::Schema;
use crate::stats::ConnectionStats;
use parking_lot::{Mutex, RwLock};
use shapedb_storage::{EngineConnection, StorageEngine, StorageError, UpgradeHook};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What the upgrade step did while opening a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeReport {
    /// Version on record before the open (0 for a new database).
    pub old_version: u32,
    /// Version the database was upgraded to.
    pub new_version: u32,
    /// Collections created, in name order.
    pub created: Vec<String>,
}

/// Opens databases on a storage engine.
///
/// # Example
///
/// ```rust
/// use shapedb_core::{ConnectionManager, InMemoryEngine, Schema, Shape, Value};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = ConnectionManager::new(InMemoryEngine::new());
/// let schema = Schema::builder(1)
///     .collection("users", "id", Shape::record([("id", Shape::Number), ("name", Shape::Text)]))
///     .build()?;
///
/// let db = manager.open("db1", schema).await?;
/// let users = db.collection::<Value>("users");
/// users
///     .insert(Value::record([("id", Value::from(1)), ("name", Value::from("James"))]))
///     .await?;
/// assert_eq!(users.count().await?, 1);
/// db.close();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    engine: Arc<dyn StorageEngine>,
    config: Config,
    gate: Option<OperationGate>,
}

impl ConnectionManager {
    /// Creates a manager with the default configuration.
    pub fn new(engine: impl StorageEngine + 'static) -> Self {
        Self::with_config(engine, Config::default())
    }

    /// Creates a manager with the given configuration.
    pub fn with_config(engine: impl StorageEngine + 'static, config: Config) -> Self {
        Self::from_shared(Arc::new(engine), config)
    }

    /// Creates a manager over an already shared engine.
    pub fn from_shared(engine: Arc<dyn StorageEngine>, config: Config) -> Self {
        Self {
            engine,
            config,
            gate: None,
        }
    }

    /// Makes every connection opened by this manager use `gate`, regardless
    /// of the configured scope.
    #[must_use]
    pub fn with_gate(mut self, gate: OperationGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The gate the next opened connection will use.
    fn gate_for_connection(&self) -> OperationGate {
        match (&self.gate, self.config.gate_scope) {
            (Some(gate), _) => gate.clone(),
            (None, GateScope::Process) => OperationGate::process_wide(),
            (None, GateScope::Connection) => OperationGate::new(),
        }
    }

    /// Opens `name` at the schema's version.
    ///
    /// If the stored version is lower, every schema collection that does not
    /// exist yet is created; existing collections are left untouched. The
    /// connection is bound to `schema` as given.
    ///
    /// # Errors
    ///
    /// Returns `Connection` if the engine refuses the open (including a
    /// schema version lower than the stored one) or the upgrade fails, and,
    /// with [`Config::verify_collections`] set, if a schema collection does
    /// not exist after the open.
    pub async fn open(&self, name: &str, schema: impl Into<Arc<Schema>>) -> CoreResult<Connection> {
        let schema: Arc<Schema> = schema.into();
        let report = Arc::new(Mutex::new(None));
        let hook = upgrade_hook(name, Arc::clone(&schema), Arc::clone(&report));

        let handle = single_shot(|done| self.engine.open(name, schema.version(), hook, done))
            .await
            .map_err(|err| {
                warn!(database = name, version = schema.version(), error = %err, "open failed");
                CoreError::connection(name, err)
            })?;

        let present = handle.store_names();
        let missing: Vec<&str> = schema
            .collection_names()
            .into_iter()
            .filter(|c| !present.iter().any(|p| p == c))
            .collect();
        if !missing.is_empty() {
            if self.config.verify_collections {
                handle.close();
                return Err(CoreError::connection(
                    name,
                    StorageError::StoreNotFound(missing.join(", ")),
                ));
            }
            warn!(
                database = name,
                missing = ?missing,
                "schema collections are missing; bump the schema version to create them"
            );
        }

        let upgrade = report.lock().take();
        let connection = Connection {
            inner: Arc::new(ConnectionInner {
                id: Uuid::new_v4(),
                name: name.to_string(),
                handle,
                schema,
                gate: self.gate_for_connection(),
                is_open: RwLock::new(true),
                upgrade,
                stats: ConnectionStats::new(),
            }),
        };

        info!(
            database = name,
            version = connection.version(),
            connection = %connection.id(),
            "opened database"
        );
        Ok(connection)
    }

    /// Deletes `name` and everything in it.
    ///
    /// Runs under the gate connections from this manager would use.
    ///
    /// # Errors
    ///
    /// Returns `Engine` if the engine fails the request.
    pub async fn delete_database(&self, name: &str) -> CoreResult<()> {
        let engine = Arc::clone(&self.engine);
        let name = name.to_string();
        self.gate_for_connection()
            .run_exclusive(move || async move {
                single_shot(|done| engine.delete_database(&name, done)).await?;
                info!(database = %name, "deleted database");
                Ok(())
            })
            .await
    }
}

fn upgrade_hook(
    name: &str,
    schema: Arc<Schema>,
    report: Arc<Mutex<Option<UpgradeReport>>>,
) -> UpgradeHook {
    let name = name.to_string();
    Box::new(move |ctx| {
        let mut created = Vec::new();
        for (collection, spec) in schema.collections() {
            if !ctx.has_store(collection) {
                ctx.create_store(collection, spec.primary_key())?;
                created.push(collection.to_string());
            }
        }

        for existing in ctx.store_names() {
            if schema.find_collection(&existing).is_none() {
                info!(database = %name, collection = %existing, "collection not in schema, keeping it");
            }
        }

        info!(
            database = %name,
            from = ctx.old_version(),
            to = ctx.new_version(),
            created = ?created,
            "upgraded database"
        );
        *report.lock() = Some(UpgradeReport {
            old_version: ctx.old_version(),
            new_version: ctx.new_version(),
            created,
        });
        Ok(())
    })
}

/// An open database.
///
/// Cheap to clone; clones share the engine handle, the schema, and the
/// gate. The handle is released by [`close`](Self::close) or when the last
/// clone is dropped.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    id: Uuid,
    name: String,
    handle: Arc<dyn EngineConnection>,
    schema: Arc<Schema>,
    gate: OperationGate,
    is_open: RwLock<bool>,
    upgrade: Option<UpgradeReport>,
    stats: ConnectionStats,
}

impl ConnectionInner {
    fn close(&self) {
        let mut is_open = self.is_open.write();
        if !*is_open {
            return;
        }
        self.handle.close();
        *is_open = false;
        info!(database = %self.name, connection = %self.id, "closed database");
    }
}

impl Drop for ConnectionInner {
    fn drop(&mut self) {
        self.close();
    }
}

impl Connection {
    /// Identifier for log correlation.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Database name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Schema version the connection was opened with.
    pub fn version(&self) -> u32 {
        self.inner.schema.version()
    }

    /// The schema the connection is bound to.
    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    /// The gate serializing this connection's operations.
    pub fn gate(&self) -> &OperationGate {
        &self.inner.gate
    }

    /// The upgrade that ran while opening, if any.
    pub fn upgrade(&self) -> Option<&UpgradeReport> {
        self.inner.upgrade.as_ref()
    }

    /// Operation counters.
    pub fn stats(&self) -> &ConnectionStats {
        &self.inner.stats
    }

    /// Checks if the connection is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.inner.is_open.read()
    }

    /// Returns a typed handle on a collection.
    ///
    /// No lookup happens here; each operation resolves the collection and
    /// checks that its codec produces `T`.
    pub fn collection<T: Send + 'static>(&self, name: &str) -> Collection<T> {
        Collection::new(self.clone(), name)
    }

    /// Closes the connection. Closing twice is a no-op.
    ///
    /// Operations that have not yet acquired the gate fail with
    /// `ConnectionClosed`.
    pub fn close(&self) {
        self.inner.close();
    }

    pub(crate) fn ensure_open(&self) -> CoreResult<()> {
        if *self.inner.is_open.read() {
            Ok(())
        } else {
            debug!(connection = %self.inner.id, "operation on closed connection");
            Err(CoreError::ConnectionClosed)
        }
    }

    pub(crate) fn handle(&self) -> &dyn EngineConnection {
        self.inner.handle.as_ref()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("version", &self.version())
            .field("is_open", &self.is_open())
            .finish()
    }
}
