use super::queue::ElementOperation;
use super::views::{SetAccess, SetCursor};
use super::{CollectionKind, PersistentCollection};
use crate::core::{CollectionElement, CollectionRow, Result, Value};
use crate::session::SessionHandle;
use std::collections::HashSet;
use std::hash::Hash;

/// Unordered collection without duplicates.
pub type PersistentSet<E> = PersistentCollection<SetStore<E>>;

#[derive(Debug, Clone)]
pub struct SetStore<E: Hash + Eq> {
    elements: HashSet<E>,
}

impl<E: Hash + Eq> SetStore<E> {
    pub fn new() -> Self {
        Self {
            elements: HashSet::new(),
        }
    }
}

impl<E: Hash + Eq> Default for SetStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: CollectionElement + Hash + Eq> CollectionKind for SetStore<E> {
    type Element = E;
    type Operation = ElementOperation<E>;
    type Snapshot = im::HashSet<E>;

    fn kind_name(&self) -> &'static str {
        "Set"
    }

    fn len(&self) -> usize {
        self.elements.len()
    }

    fn before_initialize(&mut self, anticipated_size: Option<usize>) {
        self.elements = HashSet::with_capacity(anticipated_size.unwrap_or(0));
    }

    fn read_row(&mut self, row: &CollectionRow) -> Result<()> {
        self.elements.insert(E::from_value(&row.element)?);
        Ok(())
    }

    fn discard(&mut self) {
        self.elements.clear();
    }

    fn apply(&mut self, operation: ElementOperation<E>) {
        match operation {
            ElementOperation::Add(element) => {
                self.elements.insert(element);
            }
            ElementOperation::Remove(element) => {
                self.elements.remove(&element);
            }
            ElementOperation::Clear => self.elements.clear(),
        }
    }

    fn elements(&self) -> Vec<E> {
        self.elements.iter().cloned().collect()
    }

    fn snapshot(&self) -> im::HashSet<E> {
        self.elements.iter().cloned().collect()
    }

    fn equals_snapshot(&self, snapshot: &im::HashSet<E>) -> bool {
        snapshot.len() == self.elements.len()
            && self.elements.iter().all(|element| {
                snapshot
                    .iter()
                    .find(|old| *old == element)
                    .is_some_and(|old| old.is_same(element))
            })
    }

    fn is_snapshot_empty(&self, snapshot: &im::HashSet<E>) -> bool {
        snapshot.is_empty()
    }

    fn snapshot_elements(&self, snapshot: &im::HashSet<E>) -> Vec<E> {
        snapshot.iter().cloned().collect()
    }

    fn deletes(&self, snapshot: &im::HashSet<E>) -> Vec<Value> {
        snapshot
            .iter()
            .filter(|old| {
                self.elements
                    .get(*old)
                    .is_none_or(|current| !old.is_same(current))
            })
            .map(CollectionElement::to_value)
            .collect()
    }

    fn disassemble(&self) -> Vec<Value> {
        self.elements.iter().map(CollectionElement::to_value).collect()
    }

    fn assemble(&mut self, cached: &[Value]) -> Result<()> {
        for value in cached {
            self.elements.insert(E::from_value(value)?);
        }
        Ok(())
    }
}

impl<E: CollectionElement + Hash + Eq> SetAccess for SetStore<E> {
    fn set_remove(&mut self, element: &E) -> bool {
        self.elements.remove(element)
    }
}

impl<E: CollectionElement + Hash + Eq> PersistentSet<E> {
    pub fn new(session: Option<SessionHandle>) -> Self {
        Self::uninitialized(session, SetStore::new())
    }

    pub fn detached() -> Self {
        Self::uninitialized(None, SetStore::new())
    }

    pub fn wrap(session: Option<SessionHandle>, elements: HashSet<E>) -> Self {
        Self::wrapping(session, SetStore { elements })
    }

    pub fn len(&mut self) -> Result<usize> {
        self.size_via_read()
    }

    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn contains(&mut self, element: &E) -> Result<bool> {
        if let Some(exists) = self.read_element_existence(&element.to_value())? {
            return Ok(exists);
        }
        Ok(self.store.elements.contains(element))
    }

    pub fn to_vec(&mut self) -> Result<Vec<E>> {
        self.read()?;
        Ok(self.store.elements())
    }

    pub fn iter(&mut self) -> Result<std::collections::hash_set::Iter<'_, E>> {
        self.read()?;
        Ok(self.store.elements.iter())
    }

    pub fn cursor(&mut self) -> Result<SetCursor<'_, SetStore<E>>> {
        self.read()?;
        Ok(SetCursor::new(self))
    }

    /// `true` if `element` was not present. On the inverse side the insert
    /// is queued once a targeted query shows the element is missing.
    pub fn insert(&mut self, element: E) -> Result<bool> {
        let exists = if self.is_operation_queue_enabled() {
            self.read_element_existence(&element.to_value())?
        } else {
            None
        };
        match exists {
            Some(true) => Ok(false),
            Some(false) => {
                self.queue_operation(ElementOperation::Add(element));
                Ok(true)
            }
            None => {
                self.initialize(true)?;
                let added = self.store.elements.insert(element);
                if added {
                    self.state.dirty = true;
                }
                Ok(added)
            }
        }
    }

    pub fn remove(&mut self, element: &E) -> Result<bool> {
        let exists = if self.is_put_queue_enabled() {
            self.read_element_existence(&element.to_value())?
        } else {
            None
        };
        match exists {
            Some(true) => {
                self.state.element_removed = true;
                self.queue_operation(ElementOperation::Remove(element.clone()));
                Ok(true)
            }
            Some(false) => Ok(false),
            None => {
                self.initialize(true)?;
                let removed = self.store.elements.remove(element);
                if removed {
                    self.state.element_removed = true;
                    self.state.dirty = true;
                }
                Ok(removed)
            }
        }
    }

    pub fn extend(&mut self, elements: impl IntoIterator<Item = E>) -> Result<bool> {
        let elements: Vec<E> = elements.into_iter().collect();
        if elements.is_empty() {
            return Ok(false);
        }
        self.initialize(true)?;
        let mut changed = false;
        for element in elements {
            changed |= self.store.elements.insert(element);
        }
        if changed {
            self.state.dirty = true;
        }
        Ok(changed)
    }

    pub fn retain(&mut self, keep: impl FnMut(&E) -> bool) -> Result<bool> {
        self.initialize(true)?;
        let before = self.store.elements.len();
        self.store.elements.retain(keep);
        let changed = self.store.elements.len() != before;
        if changed {
            self.state.element_removed = true;
            self.state.dirty = true;
        }
        Ok(changed)
    }

    pub fn clear(&mut self) -> Result<()> {
        if self.is_clear_queue_enabled() {
            self.queue_operation(ElementOperation::Clear);
            return Ok(());
        }
        self.initialize(true)?;
        if !self.store.elements.is_empty() {
            self.store.elements.clear();
            self.state.dirty = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_set_is_initialized_and_clean() {
        let mut set = PersistentSet::wrap(None, HashSet::from([1i64, 2, 3]));
        assert!(set.was_initialized());
        assert!(set.is_directly_accessible());
        assert!(!set.is_dirty());
        assert!(set.contains(&2).unwrap());
        assert_eq!(set.len().unwrap(), 3);
        assert!(!set.is_dirty());
    }

    #[test]
    fn test_insert_and_remove_mark_dirty_only_on_change() {
        let mut set = PersistentSet::wrap(None, HashSet::from([1i64]));
        assert!(!set.insert(1).unwrap());
        assert!(!set.is_dirty());
        assert!(set.insert(2).unwrap());
        assert!(set.is_dirty());

        set.post_action();
        assert!(!set.remove(&7).unwrap());
        assert!(!set.is_dirty());
        assert!(set.remove(&1).unwrap());
        assert!(set.is_element_removed());
    }

    #[test]
    fn test_snapshot_diff() {
        let mut set = PersistentSet::wrap(None, HashSet::from([1i64, 2, 3]));
        let snapshot = set.snapshot();
        set.set_snapshot(Value::Integer(1), "Owner.numbers", Some(snapshot));
        assert!(set.equals_snapshot());

        set.remove(&2).unwrap();
        set.insert(4).unwrap();
        assert!(!set.equals_snapshot());
        assert_eq!(set.deletes(), vec![Value::Integer(2)]);
    }

    #[test]
    fn test_cursor_removal_goes_through_write_gate() {
        let mut set = PersistentSet::wrap(None, HashSet::from([5i64]));
        let mut cursor = set.cursor().unwrap();
        assert_eq!(cursor.next(), Some(5));
        assert!(cursor.remove().unwrap());
        assert!(cursor.remove().is_err());
        drop(cursor);
        assert!(set.is_dirty());
        assert!(set.is_empty().unwrap());
    }
}
