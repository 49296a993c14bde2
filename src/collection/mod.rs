// ============================================================================
// Persistent Collections
// ============================================================================
//
// A persistent collection is one shared state holder (`CollectionState`)
// composed with exactly one backing store per container kind:
//
// - `BagStore`        duplicates allowed, no positional identity
// - `IdBagStore`      bag with a surrogate id per position
// - `SetStore`        hash set
// - `SortedSetStore`  comparator-ordered set
// - `MapStore`        hash map
//
// Every read goes through the read gate (load if needed), every mutation
// through the write gate (load if needed, then mark dirty).
//
// ============================================================================

mod bag;
mod cache;
mod id_bag;
mod map;
pub mod orphans;
mod persistent;
pub mod policy;
pub mod queue;
mod set;
mod sorted_set;
pub mod state;
pub mod views;

pub use bag::{BagStore, PersistentBag};
pub use cache::CacheEntry;
pub use id_bag::{IdBagSnapshot, IdBagStore, PersistentIdBag};
pub use map::{MapStore, PersistentMap};
pub use orphans::{get_orphans, identity_remove};
pub use policy::{AssociationFlags, DeferredWrite};
pub use queue::{DelayedOperation, ElementOperation, MapOperation, OperationQueue, QueuedChange};
pub use set::{PersistentSet, SetStore};
pub use sorted_set::{
    Comparator, PersistentSortedSet, SortedSetSnapshot, SortedSetStore, SortedSubSet,
    natural_order, value_order,
};
pub use state::{CollectionLifecycle, CollectionState, InitState, OwnerRef};
pub use views::{ListAccess, ListCursor, MapCursor, SetAccess, SetCursor};

use crate::core::{CollectionElement, CollectionRow, Result, Value};
use crate::session::{IdentifierGenerator, Session};
use std::fmt;

/// Backing store of one container kind.
///
/// Implementations hold the real container and know how to fill it from
/// rows, replay queued operations, snapshot and diff it, and flatten it for
/// the cache. They never touch the shared state; the gates do that.
pub trait CollectionKind: fmt::Debug + Send + Sync + 'static {
    /// Unit of orphan tracking: the element, or the value for maps.
    type Element: CollectionElement;
    type Operation: DelayedOperation<Element = Self::Element>;
    type Snapshot: Clone + fmt::Debug + Send + Sync;

    fn kind_name(&self) -> &'static str;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reset the container before rows (or a cache entry) are read into it.
    fn before_initialize(&mut self, anticipated_size: Option<usize>);

    fn read_row(&mut self, row: &CollectionRow) -> Result<()>;

    /// Drop whatever a failed load left behind.
    fn discard(&mut self);

    fn apply(&mut self, operation: Self::Operation);

    fn elements(&self) -> Vec<Self::Element>;

    /// Deep copy of the current contents.
    fn snapshot(&self) -> Self::Snapshot;

    fn equals_snapshot(&self, snapshot: &Self::Snapshot) -> bool;

    fn is_snapshot_empty(&self, snapshot: &Self::Snapshot) -> bool;

    fn snapshot_elements(&self, snapshot: &Self::Snapshot) -> Vec<Self::Element>;

    /// Rows present in the snapshot that must be deleted.
    fn deletes(&self, snapshot: &Self::Snapshot) -> Vec<Value>;

    fn disassemble(&self) -> Vec<Value>;

    fn assemble(&mut self, cached: &[Value]) -> Result<()>;

    /// Index of the entry at `position`; `None` for kinds without indexes.
    fn entry_index(&self, _position: usize) -> Option<Value> {
        None
    }

    fn pre_insert(
        &mut self,
        _generator: Option<&dyn IdentifierGenerator>,
        _session: &dyn Session,
    ) -> Result<()> {
        Ok(())
    }
}

/// A lazily loaded, change-tracking collection of kind `K`.
#[derive(Debug)]
pub struct PersistentCollection<K: CollectionKind> {
    state: CollectionState,
    queue: OperationQueue<K::Operation>,
    stored_snapshot: Option<K::Snapshot>,
    store: K,
}
