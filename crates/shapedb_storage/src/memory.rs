//! In-memory reference engine.

use crate::engine::{
    Completion, EngineConnection, StorageEngine, StoreHandle, TransactionMode, UpgradeContext,
    UpgradeHook,
};
use crate::error::{StorageError, StorageResult};
use crate::key::Key;
use parking_lot::{Mutex, RwLock};
use shapedb_codec::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// How an [`InMemoryEngine`] delivers completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionMode {
    /// The completion runs before the request method returns.
    #[default]
    Inline,
    /// The request runs later on a spawned tokio task, the way a host event
    /// loop would deliver it. Without a runtime this falls back to inline.
    Deferred,
}

/// Engine requests that can be made to fail with [`InMemoryEngine::fail_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineOp {
    /// Opening a database.
    Open,
    /// The upgrade step of an open, when one runs.
    Upgrade,
    /// Starting a transaction.
    Transaction,
    /// `add`
    Add,
    /// `put`
    Put,
    /// `get`
    Get,
    /// `get_all`
    GetAll,
    /// `count`
    Count,
    /// `delete`
    Delete,
    /// `clear`
    Clear,
    /// Deleting a database.
    DeleteDatabase,
}

#[derive(Debug, Clone, Default)]
struct MemoryStore {
    key_path: String,
    records: BTreeMap<Key, Value>,
}

#[derive(Debug, Default)]
struct MemoryDatabase {
    version: u32,
    stores: BTreeMap<String, MemoryStore>,
}

#[derive(Debug, Default)]
struct Shared {
    databases: RwLock<HashMap<String, Arc<RwLock<MemoryDatabase>>>>,
    mode: CompletionMode,
    failures: Mutex<HashMap<EngineOp, VecDeque<StorageError>>>,
}

impl Shared {
    fn take_failure(&self, op: EngineOp) -> Option<StorageError> {
        self.failures.lock().get_mut(&op).and_then(VecDeque::pop_front)
    }
}

/// Runs `work` and hands its result to `on_complete`, honoring the engine's
/// completion mode and any injected failure for `op`.
fn complete<T, F>(shared: &Arc<Shared>, op: EngineOp, on_complete: Completion<T>, work: F)
where
    T: Send + 'static,
    F: FnOnce() -> StorageResult<T> + Send + 'static,
{
    let run = {
        let shared = Arc::clone(shared);
        move || match shared.take_failure(op) {
            Some(err) => Err(err),
            None => work(),
        }
    };

    match (shared.mode, tokio::runtime::Handle::try_current()) {
        (CompletionMode::Deferred, Ok(handle)) => {
            handle.spawn(async move {
                tokio::task::yield_now().await;
                on_complete(run());
            });
        }
        _ => on_complete(run()),
    }
}

/// A storage engine that keeps every database in memory.
///
/// Databases outlive the connections opened on them, for as long as the
/// engine (or any clone of it) is alive. This makes the engine suitable for:
/// - Unit and integration tests
/// - Ephemeral databases that don't need persistence
///
/// # Example
///
/// ```rust
/// use shapedb_storage::{InMemoryEngine, StorageEngine};
/// use std::sync::mpsc;
///
/// let engine = InMemoryEngine::new();
/// let (tx, rx) = mpsc::channel();
/// engine.open(
///     "db1",
///     1,
///     Box::new(|ctx| ctx.create_store("users", "id")),
///     Box::new(move |result| tx.send(result.map(|c| c.store_names())).unwrap()),
/// );
/// assert_eq!(rx.recv().unwrap().unwrap(), vec!["users".to_string()]);
/// assert_eq!(engine.stored_version("db1"), Some(1));
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryEngine {
    shared: Arc<Shared>,
}

impl InMemoryEngine {
    /// Creates an engine that completes requests inline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine with the given completion mode.
    #[must_use]
    pub fn with_mode(mode: CompletionMode) -> Self {
        Self {
            shared: Arc::new(Shared {
                mode,
                ..Shared::default()
            }),
        }
    }

    /// Returns the completion mode.
    #[must_use]
    pub fn mode(&self) -> CompletionMode {
        self.shared.mode
    }

    /// Makes the next `op` request fail with `error`.
    ///
    /// Failures queue per operation and are consumed in order, one per
    /// request, at the moment the request executes.
    pub fn fail_next(&self, op: EngineOp, error: StorageError) {
        self.shared
            .failures
            .lock()
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Names of all databases, sorted.
    #[must_use]
    pub fn database_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.shared.databases.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Stored version of a database.
    #[must_use]
    pub fn stored_version(&self, name: &str) -> Option<u32> {
        self.database(name).map(|db| db.read().version)
    }

    /// Store names of a database, sorted.
    #[must_use]
    pub fn store_names(&self, name: &str) -> Option<Vec<String>> {
        self.database(name)
            .map(|db| db.read().stores.keys().cloned().collect())
    }

    /// Number of records in a store.
    #[must_use]
    pub fn record_count(&self, name: &str, store: &str) -> Option<usize> {
        self.database(name)
            .and_then(|db| db.read().stores.get(store).map(|s| s.records.len()))
    }

    /// Writes a record directly, bypassing every check above the engine.
    ///
    /// Useful for simulating data written by older or foreign code.
    ///
    /// # Errors
    ///
    /// Returns `StoreNotFound` if the database or store does not exist and
    /// `Data` if the record has no valid key.
    pub fn insert_raw(&self, name: &str, store: &str, value: Value) -> StorageResult<Key> {
        let db = self
            .database(name)
            .ok_or_else(|| StorageError::StoreNotFound(format!("{name}/{store}")))?;
        let mut db = db.write();
        let target = db
            .stores
            .get_mut(store)
            .ok_or_else(|| StorageError::StoreNotFound(store.to_string()))?;
        let key = extract_key(&value, &target.key_path)?;
        target.records.insert(key.clone(), value);
        Ok(key)
    }

    fn database(&self, name: &str) -> Option<Arc<RwLock<MemoryDatabase>>> {
        self.shared.databases.read().get(name).cloned()
    }
}

impl StorageEngine for InMemoryEngine {
    fn open(
        &self,
        name: &str,
        version: u32,
        upgrade: UpgradeHook,
        on_complete: Completion<Arc<dyn EngineConnection>>,
    ) {
        let shared = Arc::clone(&self.shared);
        let name = name.to_string();
        complete(&self.shared, EngineOp::Open, on_complete, move || {
            open_database(&shared, name, version, upgrade)
        });
    }

    fn delete_database(&self, name: &str, on_complete: Completion<()>) {
        let shared = Arc::clone(&self.shared);
        let name = name.to_string();
        complete(&self.shared, EngineOp::DeleteDatabase, on_complete, move || {
            if shared.databases.write().remove(&name).is_some() {
                info!(database = %name, "deleted database");
            }
            Ok(())
        });
    }
}

fn open_database(
    shared: &Arc<Shared>,
    name: String,
    version: u32,
    upgrade: UpgradeHook,
) -> StorageResult<Arc<dyn EngineConnection>> {
    if version == 0 {
        return Err(StorageError::InvalidVersion);
    }

    let mut databases = shared.databases.write();
    let existing = databases.get(&name).cloned();
    let db = existing
        .clone()
        .unwrap_or_else(|| Arc::new(RwLock::new(MemoryDatabase::default())));

    {
        let mut guard = db.write();
        let stored = guard.version;
        if version < stored {
            return Err(StorageError::Version {
                requested: version,
                stored,
            });
        }

        if version > stored {
            if let Some(err) = shared.take_failure(EngineOp::Upgrade) {
                return Err(err);
            }

            let mut ctx = Staging {
                old_version: stored,
                new_version: version,
                stores: guard.stores.clone(),
            };
            upgrade(&mut ctx)?;

            guard.stores = ctx.stores;
            guard.version = version;
            debug!(database = %name, from = stored, to = version, "upgraded database");
        }
    }

    if existing.is_none() {
        databases.insert(name.clone(), Arc::clone(&db));
    }

    Ok(Arc::new(MemoryConnection {
        name,
        version,
        db,
        shared: Arc::clone(shared),
        open: Arc::new(AtomicBool::new(true)),
    }))
}

/// Store map being rebuilt by an upgrade; committed only if the hook
/// succeeds.
struct Staging {
    old_version: u32,
    new_version: u32,
    stores: BTreeMap<String, MemoryStore>,
}

impl UpgradeContext for Staging {
    fn old_version(&self) -> u32 {
        self.old_version
    }

    fn new_version(&self) -> u32 {
        self.new_version
    }

    fn store_names(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    fn has_store(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    fn create_store(&mut self, name: &str, key_path: &str) -> StorageResult<()> {
        if self.stores.contains_key(name) {
            return Err(StorageError::StoreExists(name.to_string()));
        }
        self.stores.insert(
            name.to_string(),
            MemoryStore {
                key_path: key_path.to_string(),
                records: BTreeMap::new(),
            },
        );
        Ok(())
    }
}

struct MemoryConnection {
    name: String,
    version: u32,
    db: Arc<RwLock<MemoryDatabase>>,
    shared: Arc<Shared>,
    open: Arc<AtomicBool>,
}

impl EngineConnection for MemoryConnection {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn store_names(&self) -> Vec<String> {
        self.db.read().stores.keys().cloned().collect()
    }

    fn transaction(&self, store: &str, mode: TransactionMode) -> StorageResult<Box<dyn StoreHandle>> {
        if !self.open.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        if let Some(err) = self.shared.take_failure(EngineOp::Transaction) {
            return Err(err);
        }
        if !self.db.read().stores.contains_key(store) {
            return Err(StorageError::StoreNotFound(store.to_string()));
        }

        Ok(Box::new(MemoryStoreHandle {
            store: store.to_string(),
            mode,
            db: Arc::clone(&self.db),
            shared: Arc::clone(&self.shared),
            open: Arc::clone(&self.open),
        }))
    }

    fn close(&self) {
        self.open.store(false, Ordering::Release);
    }
}

struct MemoryStoreHandle {
    store: String,
    mode: TransactionMode,
    db: Arc<RwLock<MemoryDatabase>>,
    shared: Arc<Shared>,
    open: Arc<AtomicBool>,
}

impl MemoryStoreHandle {
    /// Requests on a handle outlive neither its connection nor its store.
    fn check_open(&self) -> StorageResult<()> {
        if self.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StorageError::InvalidState(format!(
                "transaction on {} outlived its connection",
                self.store
            )))
        }
    }

    fn read<T, F>(&self, op: EngineOp, on_complete: Completion<T>, f: F)
    where
        T: Send + 'static,
        F: FnOnce(&MemoryStore) -> StorageResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let store = self.store.clone();
        let live = self.check_open();
        complete(&self.shared, op, on_complete, move || {
            live?;
            let db = db.read();
            let target = db
                .stores
                .get(&store)
                .ok_or_else(|| StorageError::StoreNotFound(store.clone()))?;
            f(target)
        });
    }

    fn write<T, F>(&self, op: EngineOp, on_complete: Completion<T>, f: F)
    where
        T: Send + 'static,
        F: FnOnce(&str, &mut MemoryStore) -> StorageResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let store = self.store.clone();
        let mode = self.mode;
        let live = self.check_open();
        complete(&self.shared, op, on_complete, move || {
            live?;
            if mode == TransactionMode::ReadOnly {
                return Err(StorageError::ReadOnly(store));
            }
            let mut db = db.write();
            let target = db
                .stores
                .get_mut(&store)
                .ok_or_else(|| StorageError::StoreNotFound(store.clone()))?;
            f(&store, target)
        });
    }
}

fn extract_key(value: &Value, key_path: &str) -> StorageResult<Key> {
    let field = value
        .get(key_path)
        .ok_or_else(|| StorageError::Data(format!("record has no key field `{key_path}`")))?;
    Key::from_value(field).ok_or_else(|| {
        StorageError::Data(format!(
            "field `{key_path}` is not a valid key: {}",
            field.describe()
        ))
    })
}

impl StoreHandle for MemoryStoreHandle {
    fn add(&self, value: Value, on_complete: Completion<Key>) {
        self.write(EngineOp::Add, on_complete, move |name, store| {
            let key = extract_key(&value, &store.key_path)?;
            if store.records.contains_key(&key) {
                return Err(StorageError::Constraint {
                    store: name.to_string(),
                    key: key.to_string(),
                });
            }
            store.records.insert(key.clone(), value);
            Ok(key)
        });
    }

    fn put(&self, value: Value, on_complete: Completion<Key>) {
        self.write(EngineOp::Put, on_complete, move |_, store| {
            let key = extract_key(&value, &store.key_path)?;
            store.records.insert(key.clone(), value);
            Ok(key)
        });
    }

    fn get(&self, key: Key, on_complete: Completion<Option<Value>>) {
        self.read(EngineOp::Get, on_complete, move |store| {
            Ok(store.records.get(&key).cloned())
        });
    }

    fn get_all(&self, on_complete: Completion<Vec<Value>>) {
        self.read(EngineOp::GetAll, on_complete, |store| {
            Ok(store.records.values().cloned().collect())
        });
    }

    fn count(&self, on_complete: Completion<usize>) {
        self.read(EngineOp::Count, on_complete, |store| Ok(store.records.len()));
    }

    fn delete(&self, key: Key, on_complete: Completion<()>) {
        self.write(EngineOp::Delete, on_complete, move |_, store| {
            store.records.remove(&key);
            Ok(())
        });
    }

    fn clear(&self, on_complete: Completion<()>) {
        self.write(EngineOp::Clear, on_complete, |_, store| {
            store.records.clear();
            Ok(())
        });
    }
}
