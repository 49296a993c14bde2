// ============================================================================
// Shared Gates
// ============================================================================
//
// Everything every container kind has in common: the read and write gates,
// extra-lazy reads, deferred-write eligibility, the load protocol, session
// attachment and the cache boundary.
//
// ============================================================================

use super::orphans::get_orphans;
use super::policy::{AssociationFlags, DeferredWrite};
use super::queue::{DelayedOperation, OperationQueue, QueuedChange};
use super::state::{CollectionLifecycle, CollectionState, InitState, OwnerRef};
use super::{CacheEntry, CollectionKind, PersistentCollection};
use crate::core::{
    CollectionElement, CollectionError, CollectionId, CollectionRow, Result, Value,
    collection_info_string,
};
use crate::session::{
    CollectionEntry, CollectionPersister, IdentityResolver, ManagedCollection, Session,
    SessionHandle,
};
use log::{debug, warn};
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{Level, event};

/// Outcome of an extra-lazy lookup by index.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum IndexedRead {
    /// The association is not extra-lazy; the collection is now loaded.
    Unknown,
    /// Answer from a targeted query; `None` if nothing is stored under the index.
    Loaded(Option<Value>),
}

impl<K: CollectionKind> PersistentCollection<K> {
    /// Uninitialized collection, optionally attached to `session`.
    pub(crate) fn uninitialized(session: Option<SessionHandle>, store: K) -> Self {
        Self {
            state: CollectionState::new(session, InitState::Uninitialized),
            queue: OperationQueue::new(),
            stored_snapshot: None,
            store,
        }
    }

    /// Initialized collection wrapping caller-provided contents.
    pub(crate) fn wrapping(session: Option<SessionHandle>, store: K) -> Self {
        let mut state = CollectionState::new(session, InitState::Initialized);
        state.directly_accessible = true;
        Self {
            state,
            queue: OperationQueue::new(),
            stored_snapshot: None,
            store,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> CollectionId {
        self.state.id
    }

    pub fn role(&self) -> Option<&str> {
        self.state.role.as_deref()
    }

    pub fn key(&self) -> Option<&Value> {
        self.state.key.as_ref()
    }

    /// Not mapped under any role yet.
    pub fn is_unreferenced(&self) -> bool {
        self.state.role.is_none()
    }

    pub fn is_dirty(&self) -> bool {
        self.state.dirty
    }

    pub fn dirty(&mut self) {
        self.state.dirty = true;
    }

    pub fn clear_dirty(&mut self) {
        self.state.dirty = false;
        self.state.element_removed = false;
    }

    pub fn is_element_removed(&self) -> bool {
        self.state.element_removed
    }

    pub fn was_initialized(&self) -> bool {
        self.state.is_initialized()
    }

    pub fn is_initializing(&self) -> bool {
        self.state.is_initializing()
    }

    pub fn is_directly_accessible(&self) -> bool {
        self.state.directly_accessible
    }

    pub fn lifecycle(&self) -> CollectionLifecycle {
        self.state.lifecycle()
    }

    pub fn cached_size(&self) -> Option<usize> {
        self.state.cached_size
    }

    pub fn session(&self) -> Option<&SessionHandle> {
        self.state.session.as_ref()
    }

    pub fn owner(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.state.owner()
    }

    pub fn set_owner<T: Any + Send + Sync>(&mut self, owner: &Arc<T>) {
        let weak: Weak<T> = Arc::downgrade(owner);
        self.state.owner = Some(weak);
    }

    pub fn has_queued_operations(&self) -> bool {
        self.queue.is_active()
    }

    pub fn queued_changes(&self) -> Vec<QueuedChange> {
        self.queue.changes()
    }

    // ========================================================================
    // Read / write gates
    // ========================================================================

    pub(crate) fn read(&mut self) -> Result<()> {
        self.initialize(false)
    }

    pub(crate) fn write(&mut self) -> Result<()> {
        self.initialize(true)?;
        self.state.dirty = true;
        Ok(())
    }

    /// Load the collection unless it already is.
    pub(crate) fn initialize(&mut self, writing: bool) -> Result<()> {
        match self.state.init {
            InitState::Initialized => return Ok(()),
            InitState::Initializing => return Err(self.state.reentrant_initialization_error()),
            InitState::Uninitialized => {}
        }
        self.with_temporary_session_if_needed(|collection, session| {
            collection.load(session, writing)
        })
    }

    fn load(&mut self, session: &SessionHandle, writing: bool) -> Result<()> {
        if !session.contains_collection(self.state.id) {
            return Err(self
                .state
                .lazy_initialization_error("collection is not associated with any session"));
        }

        let span = tracing::debug_span!(
            "collection_initialize",
            collection = %self.state.id,
            role = self.state.role.as_deref().unwrap_or("<unreferenced>"),
            writing
        );
        let _guard = span.enter();

        match session.initialize_collection(self, writing) {
            Ok(()) if self.state.is_initialized() => {
                event!(Level::DEBUG, size = self.store.len(), "collection initialized");
                Ok(())
            }
            Ok(()) => {
                self.abort_load();
                Err(CollectionError::ExecutionError(format!(
                    "unit of work returned without loading collection {}",
                    self.state.info()
                )))
            }
            Err(err) => {
                if !self.state.is_initialized() {
                    self.abort_load();
                }
                event!(Level::DEBUG, error = %err, "collection load failed");
                Err(err)
            }
        }
    }

    /// Back to uninitialized with an empty store, ready for another attempt.
    fn abort_load(&mut self) {
        self.state.init = InitState::Uninitialized;
        self.store.discard();
    }

    /// Run `work` against a usable session, borrowing a temporary one from the
    /// recorded factory when the collection's own session cannot be used.
    fn with_temporary_session_if_needed<T>(
        &mut self,
        work: impl FnOnce(&mut Self, &SessionHandle) -> Result<T>,
    ) -> Result<T> {
        let usable = self
            .state
            .session
            .as_ref()
            .filter(|session| session.is_open() && session.is_connected())
            .cloned();
        if let Some(session) = usable {
            return work(self, &session);
        }

        let reason = match &self.state.session {
            None => "could not initialize proxy - no Session",
            Some(session) if !session.is_open() => {
                "could not initialize proxy - the owning Session was closed"
            }
            Some(_) => "could not initialize proxy - the owning Session is disconnected",
        };
        let temporary = self.open_temporary_session(reason)?;

        let original = self.state.session.replace(Arc::clone(&temporary));
        self.state.is_temp_session = true;
        let result = work(self, &temporary);
        self.state.is_temp_session = false;
        self.state.session = original;

        if let Err(err) = temporary.close() {
            warn!(
                "Unable to close temporary session used to load lazy collection {}: {}",
                self.state.info(),
                err
            );
        }
        result
    }

    fn open_temporary_session(&self, reason: &str) -> Result<SessionHandle> {
        let Some(factory) = self.state.temporary_session_factory.clone() else {
            return Err(self.state.lazy_initialization_error(reason));
        };
        let (Some(role), Some(key)) = (self.state.role.as_deref(), self.state.key.clone()) else {
            return Err(self.state.lazy_initialization_error(reason));
        };
        let persister = factory.collection_persister(role).ok_or_else(|| {
            self.state.lazy_initialization_error(&format!(
                "no collection persister registered for role {}",
                role
            ))
        })?;

        let session = factory.open_temporary_session()?;
        debug!(
            "Loading collection {} through temporary session {}",
            self.state.info(),
            session.id()
        );
        session.register_detached_collection(persister, self.state.id, key)?;
        Ok(session)
    }

    pub fn force_initialization(&mut self) -> Result<()> {
        match self.state.init {
            InitState::Initialized => Ok(()),
            InitState::Initializing => Err(CollectionError::ReentrantInitialization(format!(
                "force initialize loading collection {}",
                self.state.info()
            ))),
            InitState::Uninitialized => {
                let session_usable = self
                    .state
                    .session
                    .as_ref()
                    .is_some_and(|session| session.is_open() && session.is_connected());
                if !session_usable && self.state.temporary_session_factory.is_none() {
                    return Err(self.state.not_connected_error());
                }
                self.initialize(false)
            }
        }
    }

    // ========================================================================
    // Extra-lazy reads
    // ========================================================================

    /// Tracked entry of this collection in `session`.
    fn entry_in(&self, session: &SessionHandle) -> Result<CollectionEntry> {
        session
            .collection_entry(self.state.id)
            .ok_or_else(|| self.state.not_connected_error())
    }

    fn flush_queued(&mut self, session: &SessionHandle) -> Result<()> {
        if self.queue.is_active() {
            session.flush_collection(self)?;
        }
        Ok(())
    }

    /// `true` when `cached_size` answers the size without a load.
    pub(crate) fn read_size(&mut self) -> Result<bool> {
        match self.state.init {
            InitState::Initialized => return Ok(false),
            InitState::Initializing => return Err(self.state.reentrant_initialization_error()),
            InitState::Uninitialized => {}
        }
        if self.state.cached_size.is_some() && !self.queue.is_active() {
            return Ok(true);
        }
        self.with_temporary_session_if_needed(|collection, session| {
            let entry = collection.entry_in(session)?;
            if !entry.persister.is_extra_lazy() {
                collection.read()?;
                return Ok(false);
            }
            collection.flush_queued(session)?;
            let size = entry.persister.size(&entry.loaded_key, session.as_ref())?;
            collection.state.cached_size = Some(size);
            Ok(true)
        })
    }

    /// Size through the read gate, or from a size-only query when extra-lazy.
    pub(crate) fn size_via_read(&mut self) -> Result<usize> {
        if self.read_size()? {
            if let Some(size) = self.state.cached_size {
                return Ok(size);
            }
        }
        Ok(self.store.len())
    }

    /// `Some` answer from a targeted query, `None` once the collection is loaded.
    pub(crate) fn read_element_existence(&mut self, element: &Value) -> Result<Option<bool>> {
        match self.state.init {
            InitState::Initialized => return Ok(None),
            InitState::Initializing => return Err(self.state.reentrant_initialization_error()),
            InitState::Uninitialized => {}
        }
        self.with_temporary_session_if_needed(|collection, session| {
            let entry = collection.entry_in(session)?;
            if !entry.persister.is_extra_lazy() {
                collection.read()?;
                return Ok(None);
            }
            collection.flush_queued(session)?;
            let exists =
                entry
                    .persister
                    .element_exists(&entry.loaded_key, element, session.as_ref())?;
            Ok(Some(exists))
        })
    }

    pub(crate) fn read_index_existence(&mut self, index: &Value) -> Result<Option<bool>> {
        match self.state.init {
            InitState::Initialized => return Ok(None),
            InitState::Initializing => return Err(self.state.reentrant_initialization_error()),
            InitState::Uninitialized => {}
        }
        self.with_temporary_session_if_needed(|collection, session| {
            let entry = collection.entry_in(session)?;
            if !entry.persister.is_extra_lazy() {
                collection.read()?;
                return Ok(None);
            }
            collection.flush_queued(session)?;
            let exists = entry
                .persister
                .index_exists(&entry.loaded_key, index, session.as_ref())?;
            Ok(Some(exists))
        })
    }

    pub(crate) fn read_element_by_index(&mut self, index: &Value) -> Result<IndexedRead> {
        match self.state.init {
            InitState::Initialized => return Ok(IndexedRead::Unknown),
            InitState::Initializing => return Err(self.state.reentrant_initialization_error()),
            InitState::Uninitialized => {}
        }
        self.with_temporary_session_if_needed(|collection, session| {
            let entry = collection.entry_in(session)?;
            if !entry.persister.is_extra_lazy() {
                collection.read()?;
                return Ok(IndexedRead::Unknown);
            }
            collection.flush_queued(session)?;
            let element =
                entry
                    .persister
                    .element_by_index(&entry.loaded_key, index, session.as_ref())?;
            Ok(IndexedRead::Loaded(element))
        })
    }

    /// The session this collection is tracked by, for the direct queries.
    fn tracking_session(&self) -> Result<(SessionHandle, CollectionEntry)> {
        let session = self
            .state
            .session
            .clone()
            .ok_or_else(|| self.state.not_connected_error())?;
        let entry = self.entry_in(&session)?;
        Ok((session, entry))
    }

    /// Size from a size-only query, cached until the next flush.
    pub fn extra_lazy_size(&mut self) -> Result<usize> {
        if let Some(size) = self.state.cached_size {
            return Ok(size);
        }
        let (session, entry) = self.tracking_session()?;
        self.flush_queued(&session)?;
        let size = entry.persister.size(&entry.loaded_key, session.as_ref())?;
        self.state.cached_size = Some(size);
        Ok(size)
    }

    pub fn element_exists(&mut self, element: &Value) -> Result<bool> {
        let (session, entry) = self.tracking_session()?;
        self.flush_queued(&session)?;
        entry
            .persister
            .element_exists(&entry.loaded_key, element, session.as_ref())
    }

    pub fn element_by_index(&mut self, index: &Value) -> Result<Option<Value>> {
        let (session, entry) = self.tracking_session()?;
        self.flush_queued(&session)?;
        entry
            .persister
            .element_by_index(&entry.loaded_key, index, session.as_ref())
    }

    // ========================================================================
    // Deferred writes
    // ========================================================================

    fn deferred_write_allowed(&self, write: DeferredWrite) -> bool {
        if !self.state.is_uninit_connected() {
            return false;
        }
        self.state
            .session
            .as_ref()
            .and_then(|session| session.collection_entry(self.state.id))
            .is_some_and(|entry| AssociationFlags::of(entry.persister.as_ref()).allows(write))
    }

    pub(crate) fn is_operation_queue_enabled(&self) -> bool {
        self.deferred_write_allowed(DeferredWrite::Add)
    }

    pub(crate) fn is_put_queue_enabled(&self) -> bool {
        self.deferred_write_allowed(DeferredWrite::Put)
    }

    pub(crate) fn is_clear_queue_enabled(&self) -> bool {
        self.deferred_write_allowed(DeferredWrite::Clear)
    }

    pub(crate) fn queue_operation(&mut self, operation: K::Operation) {
        debug_assert!(!self.state.is_initialized());
        let capacity = self.state.settings().operation_queue_capacity;
        self.queue.push(operation, capacity);
        // the cached state of the collection is stale from here on
        self.state.dirty = true;
    }

    /// Elements added by queued operations, oldest first.
    pub fn queued_additions(&self) -> impl Iterator<Item = &K::Element> {
        self.queue.added_instances()
    }

    /// Elements displaced by queued operations that no queued addition re-adds.
    pub fn queued_orphans(&self, entity_name: &str) -> Result<Vec<K::Element>> {
        if !self.queue.is_active() {
            return Ok(Vec::new());
        }
        let session = self
            .state
            .session
            .as_ref()
            .ok_or_else(|| self.state.not_connected_error())?;
        let additions: Vec<K::Element> = self.queue.added_instances().cloned().collect();
        let removals: Vec<K::Element> = self.queue.orphans().cloned().collect();
        get_orphans(removals, &additions, entity_name, session.as_ref())
    }

    /// Swap queued added values for their merged copies.
    pub fn replace_queued_operation_values(
        &mut self,
        copy_cache: &HashMap<Value, Value>,
    ) -> Result<()> {
        for operation in self.queue.iter_mut() {
            if let Some(added) = operation.added_instance_mut() {
                if let Some(replacement) = copy_cache.get(&added.to_value()) {
                    *added = K::Element::from_value(replacement)?;
                }
            }
        }
        Ok(())
    }

    pub fn clear_operation_queue(&mut self) {
        self.queue.clear();
    }

    // ========================================================================
    // Load protocol
    // ========================================================================

    pub fn begin_read(&mut self) -> Result<()> {
        match self.state.init {
            InitState::Uninitialized => {
                self.state.init = InitState::Initializing;
                Ok(())
            }
            InitState::Initializing => Err(self.state.reentrant_initialization_error()),
            InitState::Initialized => Err(CollectionError::ExecutionError(format!(
                "collection {} is already initialized",
                self.state.info()
            ))),
        }
    }

    pub fn before_initialize(&mut self, anticipated_size: Option<usize>) {
        self.store.before_initialize(anticipated_size);
    }

    pub fn read_from(&mut self, row: &CollectionRow) -> Result<()> {
        if !self.state.is_initializing() {
            return Err(CollectionError::ExecutionError(format!(
                "row delivered to collection {} outside of a load",
                self.state.info()
            )));
        }
        self.store.read_row(row)
    }

    pub fn end_read(&mut self) -> Result<bool> {
        if !self.state.is_initializing() {
            return Err(CollectionError::ExecutionError(format!(
                "collection {} finished a load it never began",
                self.state.info()
            )));
        }
        Ok(self.after_initialize())
    }

    /// Mark initialized and replay queued operations. `false` when any were
    /// replayed, so the loaded state must not be cached.
    fn after_initialize(&mut self) -> bool {
        self.state.set_initialized();
        if !self.queue.is_active() {
            return true;
        }
        let operations = self.queue.drain();
        event!(
            Level::DEBUG,
            count = operations.len(),
            "applying queued operations"
        );
        for operation in operations {
            self.store.apply(operation);
        }
        self.state.cached_size = None;
        false
    }

    /// Reset after a successful synchronization.
    pub fn post_action(&mut self) {
        self.queue.clear();
        self.state.cached_size = None;
        self.clear_dirty();
    }

    pub fn pre_insert(
        &mut self,
        persister: &dyn CollectionPersister,
        session: &dyn Session,
    ) -> Result<()> {
        let generator = persister.identifier_generator();
        self.store.pre_insert(generator.as_deref(), session)
    }

    // ========================================================================
    // Session attachment
    // ========================================================================

    /// Attach to `session`. `Ok(false)` if already attached to it.
    pub fn set_current_session(&mut self, session: SessionHandle) -> Result<bool> {
        if let Some(current) = &self.state.session {
            if current.id() == session.id() {
                return Ok(false);
            }
            let message = self.unexpected_session_state_message(session.as_ref());
            if self.state.is_connected_to_session() {
                return Err(CollectionError::DualAssociation(message));
            }
            warn!(
                "Collection was associated with a session that is no longer usable: {}",
                message
            );
        }
        if self.queue.is_active() {
            warn!(
                "Queued operation(s) on collection {} will be executed when it is initialized",
                self.state.info()
            );
        }
        self.state.session = Some(session);
        Ok(true)
    }

    /// Detach from `current`. `false` if the collection is attached elsewhere.
    pub fn unset_session(&mut self, current: &dyn Session) -> bool {
        self.prepare_for_possible_loading_outside_transaction();
        let Some(attached) = self.state.session.clone() else {
            return false;
        };
        if attached.id() != current.id() {
            warn!(
                "Cannot unset session: {}",
                self.unexpected_session_state_message(current)
            );
            return false;
        }
        if self.state.is_temp_session {
            return true;
        }

        if self.queue.is_active() {
            let status = attached.transaction_status();
            if status.is_rollback() {
                debug!(
                    "Discarding queued operation(s) of collection {} after transaction {}",
                    self.state.info(),
                    status
                );
            } else {
                warn!(
                    "Queued operation(s) of collection {} lost on detach (transaction {})",
                    self.state.info(),
                    status
                );
            }
        }
        self.state.session = None;
        true
    }

    fn prepare_for_possible_loading_outside_transaction(&mut self) {
        if self.state.temporary_session_factory.is_some() {
            return;
        }
        if let Some(session) = &self.state.session {
            if session.settings().initialize_lazy_state_outside_transactions {
                self.state.temporary_session_factory = session.factory();
            }
        }
    }

    fn unexpected_session_state_message(&self, session: &dyn Session) -> String {
        let mut message = String::from("Collection : ");
        if self.state.role.is_some() {
            message.push_str(&self.state.info());
        } else {
            match session.collection_entry(self.state.id) {
                Some(entry) => message.push_str(&collection_info_string(
                    Some(entry.persister.role()),
                    Some(&entry.loaded_key),
                )),
                None => message.push_str("<unknown>"),
            }
        }
        if self.state.settings().include_contents_in_diagnostics {
            message.push_str("\nCollection contents: [");
            if self.state.is_initialized() {
                message.push_str(&format!("{:?}", self.store));
            } else {
                message.push_str("<uninitialized>");
            }
            message.push(']');
        }
        message
    }

    // ========================================================================
    // Snapshots & orphans
    // ========================================================================

    /// Deep copy of the current contents.
    pub fn snapshot(&self) -> K::Snapshot {
        self.store.snapshot()
    }

    /// Record the baseline taken at the last synchronization point.
    pub fn set_snapshot(
        &mut self,
        key: Value,
        role: impl Into<String>,
        snapshot: Option<K::Snapshot>,
    ) {
        self.state.key = Some(key);
        self.state.role = Some(role.into());
        self.stored_snapshot = snapshot;
    }

    pub fn stored_snapshot(&self) -> Option<&K::Snapshot> {
        self.stored_snapshot.as_ref()
    }

    /// Whether the contents still match the stored baseline.
    pub fn equals_snapshot(&self) -> bool {
        match &self.stored_snapshot {
            Some(snapshot) => self.store.equals_snapshot(snapshot),
            None => self.store.is_empty(),
        }
    }

    pub fn is_snapshot_empty(&self) -> bool {
        self.stored_snapshot
            .as_ref()
            .is_none_or(|snapshot| self.store.is_snapshot_empty(snapshot))
    }

    /// Rows of the stored baseline that no longer exist.
    pub fn deletes(&self) -> Vec<Value> {
        self.stored_snapshot
            .as_ref()
            .map(|snapshot| self.store.deletes(snapshot))
            .unwrap_or_default()
    }

    /// Elements of `snapshot` no longer in the collection, resolved through
    /// the attached session.
    pub fn orphans(&self, snapshot: &K::Snapshot, entity_name: &str) -> Result<Vec<K::Element>> {
        let session = self
            .state
            .session
            .as_ref()
            .ok_or_else(|| self.state.not_connected_error())?;
        self.orphans_with(snapshot, entity_name, session.as_ref())
    }

    pub fn orphans_with<R>(
        &self,
        snapshot: &K::Snapshot,
        entity_name: &str,
        resolver: &R,
    ) -> Result<Vec<K::Element>>
    where
        R: IdentityResolver + ?Sized,
    {
        let old = self.store.snapshot_elements(snapshot);
        let current = self.store.elements();
        get_orphans(old, &current, entity_name, resolver)
    }

    /// Index of the entry at `position`, for kinds that have one.
    pub fn entry_index(&self, position: usize) -> Result<Value> {
        self.store.entry_index(position).ok_or_else(|| {
            CollectionError::UnsupportedOperation(format!(
                "{} entries have no index: {}",
                self.store.kind_name(),
                self.state.info()
            ))
        })
    }

    // ========================================================================
    // Cache boundary
    // ========================================================================

    pub fn disassemble(&self) -> CacheEntry {
        CacheEntry::new(self.state.role.clone(), self.store.disassemble())
    }

    /// Rebuild the contents from a cache entry. Same return as `end_read`.
    pub fn initialize_from_cache(
        &mut self,
        entry: &CacheEntry,
        owner: Option<OwnerRef>,
    ) -> Result<bool> {
        if let (Some(expected), Some(cached)) = (self.state.role.as_deref(), entry.role()) {
            if expected != cached {
                return Err(CollectionError::TypeMismatch(format!(
                    "cache entry of role {} cannot initialize collection {}",
                    cached,
                    self.state.info()
                )));
            }
        }
        self.begin_read()?;
        self.store.before_initialize(Some(entry.values().len()));
        if let Err(err) = self.store.assemble(entry.values()) {
            self.abort_load();
            return Err(err);
        }
        if owner.is_some() {
            self.state.owner = owner;
        }
        Ok(self.after_initialize())
    }
}

impl<K: CollectionKind> ManagedCollection for PersistentCollection<K> {
    fn collection_id(&self) -> CollectionId {
        self.state.id
    }

    fn role(&self) -> Option<&str> {
        self.state.role.as_deref()
    }

    fn key(&self) -> Option<&Value> {
        self.state.key.as_ref()
    }

    fn assign(&mut self, role: String, key: Value) {
        self.state.role = Some(role);
        self.state.key = Some(key);
    }

    fn set_current_session(&mut self, session: SessionHandle) -> Result<bool> {
        PersistentCollection::set_current_session(self, session)
    }

    fn unset_session(&mut self, session: &dyn Session) -> bool {
        PersistentCollection::unset_session(self, session)
    }

    fn was_initialized(&self) -> bool {
        self.state.is_initialized()
    }

    fn is_initializing(&self) -> bool {
        self.state.is_initializing()
    }

    fn is_dirty(&self) -> bool {
        self.state.dirty
    }

    fn has_queued_operations(&self) -> bool {
        self.queue.is_active()
    }

    fn queued_changes(&self) -> Vec<QueuedChange> {
        self.queue.changes()
    }

    fn begin_read(&mut self) -> Result<()> {
        PersistentCollection::begin_read(self)
    }

    fn before_initialize(&mut self, anticipated_size: Option<usize>) {
        self.store.before_initialize(anticipated_size);
    }

    fn read_from(&mut self, row: &CollectionRow) -> Result<()> {
        PersistentCollection::read_from(self, row)
    }

    fn end_read(&mut self) -> Result<bool> {
        PersistentCollection::end_read(self)
    }

    fn force_initialization(&mut self) -> Result<()> {
        PersistentCollection::force_initialization(self)
    }

    fn pre_insert(
        &mut self,
        persister: &dyn CollectionPersister,
        session: &dyn Session,
    ) -> Result<()> {
        PersistentCollection::pre_insert(self, persister, session)
    }

    fn post_action(&mut self) {
        PersistentCollection::post_action(self)
    }
}
