// ============================================================================
// RustMemDB Persistent Collections
// ============================================================================
//
// Lazy-loading, change-tracking collection proxies for an entity persistence
// layer. A persistent collection stands in for an entity's collection-valued
// property: it loads its contents from the owning unit of work on first use,
// records whether it was modified, can defer writes on the non-owning side of
// an association, and reports orphans and deleted rows at flush time.
//
// ============================================================================

pub mod collection;
pub mod config;
pub mod core;
pub mod session;

// Re-export main types for convenience
pub use collection::{
    CacheEntry, CollectionKind, CollectionLifecycle, PersistentBag, PersistentCollection,
    PersistentIdBag, PersistentMap, PersistentSet, PersistentSortedSet, QueuedChange,
    get_orphans, natural_order, value_order,
};
pub use config::CollectionSettings;
pub use core::{CollectionElement, CollectionError, CollectionId, CollectionRow, Result, Value};

// Re-export the unit-of-work boundary
pub use session::{
    CollectionEntry, CollectionPersister, IdentifierGenerator, IdentityResolver,
    ManagedCollection, Session, SessionFactory, SessionHandle, TransactionStatus,
    memory::{
        MemoryCollectionPersister, MemorySession, MemorySessionFactory, MemoryStore,
        SequenceGenerator,
    },
};

/// Commonly used items.
///
/// # Examples
///
/// ```
/// use rustmemodb_collections::prelude::*;
/// use std::sync::Arc;
///
/// # fn main() -> Result<()> {
/// let store = Arc::new(MemoryStore::new());
/// store.set_rows(
///     "Order.tags",
///     Value::Integer(1),
///     vec![CollectionRow::element("red"), CollectionRow::element("blue")],
/// )?;
///
/// let session = MemorySession::new(Arc::clone(&store), CollectionSettings::default());
/// let persister = MemoryCollectionPersister::new("Order.tags", Arc::clone(&store)).build();
///
/// let mut tags: PersistentBag<String> = PersistentBag::new(None);
/// session.attach(&mut tags, persister, Value::Integer(1))?;
/// assert!(!tags.was_initialized());
///
/// assert_eq!(tags.len()?, 2);
/// assert!(tags.was_initialized());
/// assert!(!tags.is_dirty());
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::collection::{
        CacheEntry, PersistentBag, PersistentIdBag, PersistentMap, PersistentSet,
        PersistentSortedSet, natural_order,
    };
    pub use crate::config::CollectionSettings;
    pub use crate::core::{CollectionError, CollectionRow, Result, Value};
    pub use crate::session::memory::{
        MemoryCollectionPersister, MemorySession, MemorySessionFactory, MemoryStore,
        SequenceGenerator,
    };
    pub use crate::session::{ManagedCollection, Session, SessionFactory};
}
