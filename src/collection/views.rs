// ============================================================================
// Mutation-Intercepting Views
// ============================================================================
//
// Cursors handed out by the container adapters. Reading through a cursor is
// free once the collection is loaded; every mutating call passes the owning
// collection's write gate before it touches the backing store.
//
// ============================================================================

use super::map::MapStore;
use super::{CollectionKind, PersistentCollection};
use crate::core::{CollectionElement, CollectionError, Result};
use std::hash::Hash;

/// Positional access to list-shaped stores.
pub trait ListAccess: CollectionKind {
    fn list_len(&self) -> usize;

    fn list_get(&self, index: usize) -> Option<&Self::Element>;

    /// `index` must be at most `list_len()`.
    fn list_insert(&mut self, index: usize, element: Self::Element);

    /// `index` must be below `list_len()`.
    fn list_remove(&mut self, index: usize) -> Self::Element;

    /// `index` must be below `list_len()`.
    fn list_set(&mut self, index: usize, element: Self::Element) -> Self::Element;
}

/// Removal from set-shaped stores.
pub trait SetAccess: CollectionKind {
    fn set_remove(&mut self, element: &Self::Element) -> bool;
}

fn no_current_element() -> CollectionError {
    CollectionError::UnsupportedOperation(
        "cursor has no current element; call next() or previous() first".to_string(),
    )
}

/// Bidirectional cursor over a bag or identifier bag.
pub struct ListCursor<'a, K: ListAccess> {
    collection: &'a mut PersistentCollection<K>,
    next_index: usize,
    last_returned: Option<usize>,
}

impl<'a, K: ListAccess> ListCursor<'a, K> {
    /// The collection must already have passed its read gate.
    pub(crate) fn new(collection: &'a mut PersistentCollection<K>, start: usize) -> Self {
        let start = start.min(collection.store.list_len());
        Self {
            collection,
            next_index: start,
            last_returned: None,
        }
    }

    pub fn has_next(&self) -> bool {
        self.next_index < self.collection.store.list_len()
    }

    pub fn has_previous(&self) -> bool {
        self.next_index > 0
    }

    pub fn next_index(&self) -> usize {
        self.next_index
    }

    pub fn previous(&mut self) -> Option<K::Element> {
        if self.next_index == 0 {
            return None;
        }
        self.next_index -= 1;
        self.last_returned = Some(self.next_index);
        self.collection.store.list_get(self.next_index).cloned()
    }

    /// Remove the element last returned by `next` or `previous`.
    pub fn remove(&mut self) -> Result<K::Element> {
        let index = self.last_returned.ok_or_else(no_current_element)?;
        self.collection.write()?;
        let removed = self.collection.store.list_remove(index);
        if index < self.next_index {
            self.next_index -= 1;
        }
        self.last_returned = None;
        Ok(removed)
    }

    /// Replace the element last returned by `next` or `previous`.
    pub fn set(&mut self, element: K::Element) -> Result<K::Element> {
        let index = self.last_returned.ok_or_else(no_current_element)?;
        self.collection.write()?;
        Ok(self.collection.store.list_set(index, element))
    }

    /// Insert before the element `next` would return.
    pub fn add(&mut self, element: K::Element) -> Result<()> {
        self.collection.write()?;
        self.collection.store.list_insert(self.next_index, element);
        self.next_index += 1;
        self.last_returned = None;
        Ok(())
    }
}

impl<K: ListAccess> Iterator for ListCursor<'_, K> {
    type Item = K::Element;

    fn next(&mut self) -> Option<K::Element> {
        let element = self.collection.store.list_get(self.next_index).cloned()?;
        self.last_returned = Some(self.next_index);
        self.next_index += 1;
        Some(element)
    }
}

/// Cursor over a set; iterates the elements present when it was created.
pub struct SetCursor<'a, K: SetAccess> {
    collection: &'a mut PersistentCollection<K>,
    pending: std::vec::IntoIter<K::Element>,
    current: Option<K::Element>,
}

impl<'a, K: SetAccess> SetCursor<'a, K> {
    pub(crate) fn new(collection: &'a mut PersistentCollection<K>) -> Self {
        let pending = collection.store.elements().into_iter();
        Self {
            collection,
            pending,
            current: None,
        }
    }

    /// Remove the element last returned by `next`.
    pub fn remove(&mut self) -> Result<bool> {
        let element = self.current.take().ok_or_else(no_current_element)?;
        self.collection.write()?;
        Ok(self.collection.store.set_remove(&element))
    }
}

impl<K: SetAccess> Iterator for SetCursor<'_, K> {
    type Item = K::Element;

    fn next(&mut self) -> Option<K::Element> {
        let element = self.pending.next()?;
        self.current = Some(element.clone());
        Some(element)
    }
}

/// Cursor over the entries of a map.
pub struct MapCursor<'a, K, V>
where
    K: CollectionElement + Hash + Eq,
    V: CollectionElement,
{
    collection: &'a mut PersistentCollection<MapStore<K, V>>,
    pending: std::vec::IntoIter<(K, V)>,
    current: Option<K>,
}

impl<'a, K, V> MapCursor<'a, K, V>
where
    K: CollectionElement + Hash + Eq,
    V: CollectionElement,
{
    pub(crate) fn new(collection: &'a mut PersistentCollection<MapStore<K, V>>) -> Self {
        let pending: Vec<(K, V)> = collection
            .store
            .entries
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Self {
            collection,
            pending: pending.into_iter(),
            current: None,
        }
    }

    /// Remove the entry last returned by `next`.
    pub fn remove(&mut self) -> Result<Option<V>> {
        let key = self.current.take().ok_or_else(no_current_element)?;
        self.collection.write()?;
        Ok(self.collection.store.entries.remove(&key))
    }

    /// Replace the value of the entry last returned by `next`.
    pub fn set_value(&mut self, value: V) -> Result<Option<V>> {
        let key = self.current.clone().ok_or_else(no_current_element)?;
        self.collection.write()?;
        Ok(self.collection.store.entries.insert(key, value))
    }
}

impl<K, V> Iterator for MapCursor<'_, K, V>
where
    K: CollectionElement + Hash + Eq,
    V: CollectionElement,
{
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        let (key, value) = self.pending.next()?;
        self.current = Some(key.clone());
        Some((key, value))
    }
}
