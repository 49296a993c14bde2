// ============================================================================
// In-Memory Unit of Work
// ============================================================================
//
// A complete, synchronous implementation of the collaborators a persistent
// collection talks to:
//
// - `MemoryStore`                 rows per (role, owner key), persisted entities
// - `MemoryCollectionPersister`   association flags and targeted queries
// - `MemorySessionFactory`        opens sessions, resolves persisters by role
// - `MemorySession`               entry table, loads, flushes of queued writes
// - `SequenceGenerator`           surrogate ids for identifier bags
//
// Entities are `Value::List`s whose first field is the identifier; an entity
// is transient while that field is `Null` or the store has not persisted it.
//
// ============================================================================

use super::{
    CollectionEntry, CollectionPersister, IdentifierGenerator, IdentityResolver,
    ManagedCollection, Session, SessionFactory, SessionHandle, TransactionStatus,
};
use crate::collection::QueuedChange;
use crate::config::CollectionSettings;
use crate::core::{CollectionError, CollectionId, CollectionRow, Result, SessionId, Value};
use log::debug;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use tracing::{Level, event};

type RowKey = (String, Value);

// ============================================================================
// Store
// ============================================================================

/// Backing rows shared by every session of a factory.
#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<HashMap<RowKey, Vec<CollectionRow>>>,
    persisted: RwLock<HashSet<(String, Value)>>,
    load_queries: AtomicUsize,
    size_queries: AtomicUsize,
    existence_queries: AtomicUsize,
    element_queries: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the rows of the collection `role` owned by `key`.
    pub fn set_rows(&self, role: &str, key: Value, rows: Vec<CollectionRow>) -> Result<()> {
        self.rows.write()?.insert((role.to_string(), key), rows);
        Ok(())
    }

    /// Current rows, without counting a query.
    pub fn rows(&self, role: &str, key: &Value) -> Result<Vec<CollectionRow>> {
        Ok(self
            .rows
            .read()?
            .get(&(role.to_string(), key.clone()))
            .cloned()
            .unwrap_or_default())
    }

    fn load_rows(&self, role: &str, key: &Value) -> Result<Vec<CollectionRow>> {
        self.load_queries.fetch_add(1, Ordering::SeqCst);
        self.rows(role, key)
    }

    pub fn mark_persisted(&self, entity_name: &str, id: Value) -> Result<()> {
        self.persisted.write()?.insert((entity_name.to_string(), id));
        Ok(())
    }

    pub fn is_persisted(&self, entity_name: &str, id: &Value) -> Result<bool> {
        Ok(self
            .persisted
            .read()?
            .contains(&(entity_name.to_string(), id.clone())))
    }

    pub fn load_queries(&self) -> usize {
        self.load_queries.load(Ordering::SeqCst)
    }

    pub fn size_queries(&self) -> usize {
        self.size_queries.load(Ordering::SeqCst)
    }

    pub fn existence_queries(&self) -> usize {
        self.existence_queries.load(Ordering::SeqCst)
    }

    pub fn element_queries(&self) -> usize {
        self.element_queries.load(Ordering::SeqCst)
    }

    fn apply_change(
        &self,
        role: &str,
        key: &Value,
        change: &QueuedChange,
        identifier: Option<Value>,
    ) -> Result<()> {
        let mut rows = self.rows.write()?;
        let rows = rows.entry((role.to_string(), key.clone())).or_default();
        match change {
            QueuedChange::Add { index, element } => {
                if let Some(index) = index {
                    rows.retain(|row| row.index.as_ref() != Some(index));
                }
                rows.push(CollectionRow {
                    identifier,
                    index: index.clone(),
                    element: element.clone(),
                });
            }
            QueuedChange::Remove {
                index: Some(index), ..
            } => {
                rows.retain(|row| row.index.as_ref() != Some(index));
            }
            QueuedChange::Remove {
                index: None,
                element: Some(element),
            } => {
                if let Some(position) = rows.iter().position(|row| &row.element == element) {
                    rows.remove(position);
                }
            }
            QueuedChange::Remove {
                index: None,
                element: None,
            } => {}
            QueuedChange::Clear => rows.clear(),
        }
        Ok(())
    }
}

// ============================================================================
// Persister
// ============================================================================

/// Mapping of one collection role onto a `MemoryStore`.
pub struct MemoryCollectionPersister {
    role: String,
    inverse: bool,
    orphan_delete: bool,
    one_to_many: bool,
    extra_lazy: bool,
    element_entity_name: Option<String>,
    generator: Option<Arc<dyn IdentifierGenerator>>,
    store: Arc<MemoryStore>,
}

impl MemoryCollectionPersister {
    pub fn new(role: impl Into<String>, store: Arc<MemoryStore>) -> Self {
        Self {
            role: role.into(),
            inverse: false,
            orphan_delete: false,
            one_to_many: false,
            extra_lazy: false,
            element_entity_name: None,
            generator: None,
            store,
        }
    }

    pub fn inverse(mut self, inverse: bool) -> Self {
        self.inverse = inverse;
        self
    }

    pub fn orphan_delete(mut self, orphan_delete: bool) -> Self {
        self.orphan_delete = orphan_delete;
        self
    }

    pub fn one_to_many(mut self, one_to_many: bool) -> Self {
        self.one_to_many = one_to_many;
        self
    }

    pub fn extra_lazy(mut self, extra_lazy: bool) -> Self {
        self.extra_lazy = extra_lazy;
        self
    }

    pub fn element_entity(mut self, entity_name: impl Into<String>) -> Self {
        self.element_entity_name = Some(entity_name.into());
        self
    }

    pub fn identifier_generator(mut self, generator: Arc<dyn IdentifierGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn build(self) -> Arc<dyn CollectionPersister> {
        Arc::new(self)
    }
}

impl CollectionPersister for MemoryCollectionPersister {
    fn role(&self) -> &str {
        &self.role
    }

    fn is_inverse(&self) -> bool {
        self.inverse
    }

    fn has_orphan_delete(&self) -> bool {
        self.orphan_delete
    }

    fn is_one_to_many(&self) -> bool {
        self.one_to_many
    }

    fn is_extra_lazy(&self) -> bool {
        self.extra_lazy
    }

    fn element_entity_name(&self) -> Option<&str> {
        self.element_entity_name.as_deref()
    }

    fn size(&self, key: &Value, _session: &dyn Session) -> Result<usize> {
        self.store.size_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.store.rows(&self.role, key)?.len())
    }

    fn index_exists(&self, key: &Value, index: &Value, _session: &dyn Session) -> Result<bool> {
        self.store.existence_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .store
            .rows(&self.role, key)?
            .iter()
            .any(|row| row.index.as_ref() == Some(index)))
    }

    fn element_exists(
        &self,
        key: &Value,
        element: &Value,
        _session: &dyn Session,
    ) -> Result<bool> {
        self.store.existence_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .store
            .rows(&self.role, key)?
            .iter()
            .any(|row| &row.element == element))
    }

    fn element_by_index(
        &self,
        key: &Value,
        index: &Value,
        _session: &dyn Session,
    ) -> Result<Option<Value>> {
        self.store.element_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .store
            .rows(&self.role, key)?
            .into_iter()
            .find(|row| row.index.as_ref() == Some(index))
            .map(|row| row.element))
    }

    fn identifier_generator(&self) -> Option<Arc<dyn IdentifierGenerator>> {
        self.generator.clone()
    }
}

/// Hands out consecutive integer ids.
pub struct SequenceGenerator {
    next: AtomicI64,
}

impl SequenceGenerator {
    pub fn new(start: i64) -> Self {
        Self {
            next: AtomicI64::new(start),
        }
    }
}

impl IdentifierGenerator for SequenceGenerator {
    fn generate(&self, _session: &dyn Session) -> Result<Value> {
        Ok(Value::Integer(self.next.fetch_add(1, Ordering::SeqCst)))
    }
}

// ============================================================================
// Factory
// ============================================================================

pub struct MemorySessionFactory {
    store: Arc<MemoryStore>,
    settings: CollectionSettings,
    persisters: RwLock<HashMap<String, Arc<dyn CollectionPersister>>>,
    this: Weak<MemorySessionFactory>,
}

impl MemorySessionFactory {
    pub fn new(store: Arc<MemoryStore>, settings: CollectionSettings) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            store,
            settings,
            persisters: RwLock::new(HashMap::new()),
            this: this.clone(),
        })
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn settings(&self) -> &CollectionSettings {
        &self.settings
    }

    pub fn register_persister(&self, persister: Arc<dyn CollectionPersister>) -> Result<()> {
        self.persisters
            .write()?
            .insert(persister.role().to_string(), persister);
        Ok(())
    }

    pub fn open_session(&self) -> Arc<MemorySession> {
        MemorySession::create(
            Arc::clone(&self.store),
            self.settings.clone(),
            Some(self.this.clone()),
        )
    }
}

impl SessionFactory for MemorySessionFactory {
    fn open_temporary_session(&self) -> Result<SessionHandle> {
        let session: SessionHandle = self.open_session();
        Ok(session)
    }

    fn collection_persister(&self, role: &str) -> Option<Arc<dyn CollectionPersister>> {
        self.persisters.read().ok()?.get(role).cloned()
    }
}

// ============================================================================
// Session
// ============================================================================

pub struct MemorySession {
    id: SessionId,
    store: Arc<MemoryStore>,
    settings: CollectionSettings,
    factory: Option<Weak<MemorySessionFactory>>,
    this: Weak<MemorySession>,
    open: AtomicBool,
    connected: AtomicBool,
    status: Mutex<TransactionStatus>,
    entries: RwLock<HashMap<CollectionId, CollectionEntry>>,
    loads: AtomicUsize,
    flushes: AtomicUsize,
}

impl MemorySession {
    /// Standalone session; it cannot open temporary sessions.
    pub fn new(store: Arc<MemoryStore>, settings: CollectionSettings) -> Arc<Self> {
        Self::create(store, settings, None)
    }

    fn create(
        store: Arc<MemoryStore>,
        settings: CollectionSettings,
        factory: Option<Weak<MemorySessionFactory>>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            id: SessionId::new(),
            store,
            settings,
            factory,
            this: this.clone(),
            open: AtomicBool::new(true),
            connected: AtomicBool::new(true),
            status: Mutex::new(TransactionStatus::Active),
            entries: RwLock::new(HashMap::new()),
            loads: AtomicUsize::new(0),
            flushes: AtomicUsize::new(0),
        })
    }

    /// Shared handle to this session.
    pub fn handle(&self) -> Result<SessionHandle> {
        let this: Arc<MemorySession> = self.this.upgrade().ok_or_else(|| {
            CollectionError::ExecutionError(format!("session {} was dropped", self.id))
        })?;
        Ok(this)
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Track `collection` as the `persister` role of the owner `key` and
    /// attach it to this session.
    pub fn attach(
        &self,
        collection: &mut dyn ManagedCollection,
        persister: Arc<dyn CollectionPersister>,
        key: Value,
    ) -> Result<()> {
        collection.set_current_session(self.handle()?)?;
        collection.assign(persister.role().to_string(), key.clone());
        self.entries.write()?.insert(
            collection.collection_id(),
            CollectionEntry {
                persister,
                loaded_key: key,
            },
        );
        Ok(())
    }

    /// Stop tracking `collection` and detach it. `false` if it was attached elsewhere.
    pub fn evict(&self, collection: &mut dyn ManagedCollection) -> Result<bool> {
        let detached = collection.unset_session(self);
        self.entries.write()?.remove(&collection.collection_id());
        Ok(detached)
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn reconnect(&self) {
        if self.is_open() {
            self.connected.store(true, Ordering::SeqCst);
        }
    }

    pub fn set_transaction_status(&self, status: TransactionStatus) -> Result<()> {
        *self.status.lock()? = status;
        Ok(())
    }

    /// Number of collections loaded through this session.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    fn tracked_entry(&self, collection: &dyn ManagedCollection) -> Result<CollectionEntry> {
        self.collection_entry(collection.collection_id())
            .ok_or_else(|| {
                CollectionError::lazy_initialization(
                    collection.role(),
                    collection.key(),
                    "collection is not associated with this session",
                )
            })
    }
}

impl IdentityResolver for MemorySession {
    fn is_transient(&self, entity_name: &str, entity: &Value) -> Result<bool> {
        match self.identifier(entity_name, entity)? {
            Some(id) if entity.as_list().is_some() => {
                Ok(!self.store.is_persisted(entity_name, &id)?)
            }
            Some(_) => Ok(false),
            None => Ok(true),
        }
    }

    fn identifier(&self, _entity_name: &str, entity: &Value) -> Result<Option<Value>> {
        match entity {
            Value::List(fields) => Ok(fields.first().filter(|id| !id.is_null()).cloned()),
            Value::Null => Ok(None),
            other => Ok(Some(other.clone())),
        }
    }
}

impl Session for MemorySession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn is_connected(&self) -> bool {
        self.is_open() && self.connected.load(Ordering::SeqCst)
    }

    fn collection_entry(&self, collection: CollectionId) -> Option<CollectionEntry> {
        self.entries.read().ok()?.get(&collection).cloned()
    }

    fn initialize_collection(
        &self,
        collection: &mut dyn ManagedCollection,
        writing: bool,
    ) -> Result<()> {
        let entry = self.tracked_entry(collection)?;
        let rows = self
            .store
            .load_rows(entry.persister.role(), &entry.loaded_key)?;
        self.loads.fetch_add(1, Ordering::SeqCst);
        debug!(
            "Session {} loading collection {} ({} rows, writing: {})",
            self.id,
            collection.collection_id(),
            rows.len(),
            writing
        );

        collection.begin_read()?;
        collection.before_initialize(Some(rows.len()));
        for row in &rows {
            collection.read_from(row)?;
        }
        event!(Level::TRACE, rows = rows.len(), "rows read");
        collection.end_read()?;
        Ok(())
    }

    fn flush_collection(&self, collection: &mut dyn ManagedCollection) -> Result<()> {
        let entry = self.tracked_entry(collection)?;
        let role = entry.persister.role();
        let generator = entry.persister.identifier_generator();
        for change in collection.queued_changes() {
            let identifier = match (&change, &generator) {
                (QueuedChange::Add { .. }, Some(generator)) => Some(generator.generate(self)?),
                _ => None,
            };
            self.store
                .apply_change(role, &entry.loaded_key, &change, identifier)?;
        }
        self.flushes.fetch_add(1, Ordering::SeqCst);
        collection.post_action();
        Ok(())
    }

    fn register_detached_collection(
        &self,
        persister: Arc<dyn CollectionPersister>,
        collection: CollectionId,
        key: Value,
    ) -> Result<()> {
        self.entries.write()?.insert(
            collection,
            CollectionEntry {
                persister,
                loaded_key: key,
            },
        );
        Ok(())
    }

    fn settings(&self) -> &CollectionSettings {
        &self.settings
    }

    fn factory(&self) -> Option<Arc<dyn SessionFactory>> {
        let factory: Arc<MemorySessionFactory> = self.factory.as_ref()?.upgrade()?;
        Some(factory)
    }

    fn transaction_status(&self) -> TransactionStatus {
        self.status
            .lock()
            .map(|status| *status)
            .unwrap_or(TransactionStatus::NotActive)
    }

    fn close(&self) -> Result<()> {
        self.open.store(false, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        self.entries.write()?.clear();
        Ok(())
    }
}
