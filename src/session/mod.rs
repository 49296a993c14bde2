// ============================================================================
// Unit-of-Work Boundary
// ============================================================================
//
// Contracts consumed by persistent collections (session, association metadata,
// identity resolution, id generation) and the contract a collection exposes
// back to the unit of work while it is being loaded or flushed.
//
// ============================================================================

pub mod memory;

use crate::collection::QueuedChange;
use crate::config::CollectionSettings;
use crate::core::{CollectionId, CollectionRow, Result, SessionId, Value};
use std::fmt;
use std::sync::Arc;

/// Shared handle to a unit of work.
pub type SessionHandle = Arc<dyn Session>;

/// Answers "is this entity transient" and "what is its persistent identifier".
pub trait IdentityResolver {
    fn is_transient(&self, entity_name: &str, entity: &Value) -> Result<bool>;

    /// Identifier of a non-transient entity; `None` while it is unsaved.
    fn identifier(&self, entity_name: &str, entity: &Value) -> Result<Option<Value>>;

    /// Entities in the middle of being saved are never matched by identifier.
    fn is_saving(&self, _entity_name: &str, _entity: &Value) -> bool {
        false
    }
}

/// Generates surrogate ids for identifier-bag rows.
pub trait IdentifierGenerator: Send + Sync {
    fn generate(&self, session: &dyn Session) -> Result<Value>;
}

/// Association metadata and targeted (extra-lazy) queries for one mapped collection.
pub trait CollectionPersister: Send + Sync {
    fn role(&self) -> &str;

    /// Non-owning side of a bidirectional association.
    fn is_inverse(&self) -> bool;

    fn has_orphan_delete(&self) -> bool;

    fn is_one_to_many(&self) -> bool;

    fn is_extra_lazy(&self) -> bool;

    /// Entity name of the elements, for entity associations.
    fn element_entity_name(&self) -> Option<&str> {
        None
    }

    fn size(&self, key: &Value, session: &dyn Session) -> Result<usize>;

    fn index_exists(&self, key: &Value, index: &Value, session: &dyn Session) -> Result<bool>;

    fn element_exists(&self, key: &Value, element: &Value, session: &dyn Session)
    -> Result<bool>;

    /// Element stored under `index`, `None` if there is none.
    fn element_by_index(
        &self,
        key: &Value,
        index: &Value,
        session: &dyn Session,
    ) -> Result<Option<Value>>;

    fn identifier_generator(&self) -> Option<Arc<dyn IdentifierGenerator>> {
        None
    }
}

/// The unit of work's bookkeeping for one attached collection.
#[derive(Clone)]
pub struct CollectionEntry {
    pub persister: Arc<dyn CollectionPersister>,
    pub loaded_key: Value,
}

impl fmt::Debug for CollectionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionEntry")
            .field("role", &self.persister.role())
            .field("loaded_key", &self.loaded_key)
            .finish()
    }
}

/// Outcome of the transaction a session is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    NotActive,
    Active,
    Committed,
    RolledBack,
    MarkedRollback,
    FailedCommit,
    FailedRollback,
    RollingBack,
}

impl TransactionStatus {
    /// Whether the transaction ended (or is ending) through a rollback.
    pub fn is_rollback(&self) -> bool {
        matches!(
            self,
            TransactionStatus::RolledBack
                | TransactionStatus::MarkedRollback
                | TransactionStatus::FailedCommit
                | TransactionStatus::FailedRollback
                | TransactionStatus::RollingBack
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionStatus::NotActive => "NOT_ACTIVE",
            TransactionStatus::Active => "ACTIVE",
            TransactionStatus::Committed => "COMMITTED",
            TransactionStatus::RolledBack => "ROLLED_BACK",
            TransactionStatus::MarkedRollback => "MARKED_ROLLBACK",
            TransactionStatus::FailedCommit => "FAILED_COMMIT",
            TransactionStatus::FailedRollback => "FAILED_ROLLBACK",
            TransactionStatus::RollingBack => "ROLLING_BACK",
        };
        write!(f, "{}", name)
    }
}

/// A unit of work. Collections only ever reach it through an explicit handle.
pub trait Session: IdentityResolver + Send + Sync {
    fn id(&self) -> SessionId;

    fn is_open(&self) -> bool;

    fn is_connected(&self) -> bool;

    /// Entry for a collection tracked by this session's persistence context.
    fn collection_entry(&self, collection: CollectionId) -> Option<CollectionEntry>;

    fn contains_collection(&self, collection: CollectionId) -> bool {
        self.collection_entry(collection).is_some()
    }

    /// Load the collection: `begin_read`, one `read_from` per row, `end_read`.
    fn initialize_collection(
        &self,
        collection: &mut dyn ManagedCollection,
        writing: bool,
    ) -> Result<()>;

    /// Write the collection's queued operations and reset it with `post_action`.
    fn flush_collection(&self, collection: &mut dyn ManagedCollection) -> Result<()>;

    /// Track a detached, uninitialized collection so a temporary session can load it.
    fn register_detached_collection(
        &self,
        persister: Arc<dyn CollectionPersister>,
        collection: CollectionId,
        key: Value,
    ) -> Result<()>;

    fn settings(&self) -> &CollectionSettings;

    /// Factory this session came from, if it can open temporary sessions.
    fn factory(&self) -> Option<Arc<dyn SessionFactory>> {
        None
    }

    fn transaction_status(&self) -> TransactionStatus {
        TransactionStatus::Active
    }

    fn close(&self) -> Result<()>;
}

/// Opens sessions; used to load detached collections outside their session.
pub trait SessionFactory: Send + Sync {
    /// A read-only session with manual flushing.
    fn open_temporary_session(&self) -> Result<SessionHandle>;

    fn collection_persister(&self, role: &str) -> Option<Arc<dyn CollectionPersister>>;
}

/// What a unit of work sees of a persistent collection.
pub trait ManagedCollection {
    fn collection_id(&self) -> CollectionId;

    fn role(&self) -> Option<&str>;

    fn key(&self) -> Option<&Value>;

    /// Record the owner key and role the collection is mapped under.
    fn assign(&mut self, role: String, key: Value);

    fn set_current_session(&mut self, session: SessionHandle) -> Result<bool>;

    fn unset_session(&mut self, session: &dyn Session) -> bool;

    fn was_initialized(&self) -> bool;

    fn is_initializing(&self) -> bool;

    fn is_dirty(&self) -> bool;

    fn has_queued_operations(&self) -> bool;

    /// The queued operations, oldest first.
    fn queued_changes(&self) -> Vec<QueuedChange>;

    fn begin_read(&mut self) -> Result<()>;

    fn before_initialize(&mut self, anticipated_size: Option<usize>);

    fn read_from(&mut self, row: &CollectionRow) -> Result<()>;

    /// Finish the load. `false` when queued operations were applied and the
    /// loaded state must not be cached.
    fn end_read(&mut self) -> Result<bool>;

    fn force_initialization(&mut self) -> Result<()>;

    /// Generate identifiers for rows that are about to be inserted.
    fn pre_insert(&mut self, persister: &dyn CollectionPersister, session: &dyn Session)
    -> Result<()>;

    /// Reset after a successful synchronization.
    fn post_action(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_status_rollback_classification() {
        assert!(TransactionStatus::RolledBack.is_rollback());
        assert!(TransactionStatus::MarkedRollback.is_rollback());
        assert!(!TransactionStatus::Active.is_rollback());
        assert!(!TransactionStatus::Committed.is_rollback());
        assert_eq!(TransactionStatus::RollingBack.to_string(), "ROLLING_BACK");
    }
}
