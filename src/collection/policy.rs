use crate::session::CollectionPersister;

/// Association shape relevant to deferring writes on an uninitialized collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AssociationFlags {
    pub inverse: bool,
    pub orphan_delete: bool,
    pub one_to_many: bool,
}

/// Kind of write that may be queued instead of forcing a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredWrite {
    Add,
    Put,
    Clear,
}

impl AssociationFlags {
    pub fn of(persister: &dyn CollectionPersister) -> Self {
        Self {
            inverse: persister.is_inverse(),
            orphan_delete: persister.has_orphan_delete(),
            one_to_many: persister.is_one_to_many(),
        }
    }

    /// Additions never need the prior contents.
    pub fn allows_queued_add(&self) -> bool {
        self.inverse
    }

    /// Map puts and removals can skip precise orphan tracking unless
    /// orphan-delete applies to a many-to-many map.
    pub fn allows_queued_put(&self) -> bool {
        self.inverse && (self.one_to_many || !self.orphan_delete)
    }

    /// Clearing with orphan-delete must know which elements to delete.
    pub fn allows_queued_clear(&self) -> bool {
        self.inverse && !self.orphan_delete
    }

    pub fn allows(&self, write: DeferredWrite) -> bool {
        match write {
            DeferredWrite::Add => self.allows_queued_add(),
            DeferredWrite::Put => self.allows_queued_put(),
            DeferredWrite::Clear => self.allows_queued_clear(),
        }
    }
}
