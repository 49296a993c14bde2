use super::queue::ElementOperation;
use super::views::{ListAccess, ListCursor};
use super::{CollectionKind, PersistentCollection};
use crate::core::{CollectionElement, CollectionError, CollectionRow, Result, Value};
use crate::session::SessionHandle;

/// Unordered collection with duplicates and no positional identity.
pub type PersistentBag<E> = PersistentCollection<BagStore<E>>;

#[derive(Debug, Clone)]
pub struct BagStore<E> {
    elements: Vec<E>,
}

impl<E> BagStore<E> {
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
        }
    }
}

impl<E> Default for BagStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

fn count_same<E: CollectionElement>(element: &E, among: impl Iterator<Item = E>) -> usize {
    among.filter(|candidate| element.is_same(candidate)).count()
}

impl<E: CollectionElement> CollectionKind for BagStore<E> {
    type Element = E;
    type Operation = ElementOperation<E>;
    type Snapshot = im::Vector<E>;

    fn kind_name(&self) -> &'static str {
        "Bag"
    }

    fn len(&self) -> usize {
        self.elements.len()
    }

    fn before_initialize(&mut self, anticipated_size: Option<usize>) {
        self.elements = Vec::with_capacity(anticipated_size.unwrap_or(0));
    }

    fn read_row(&mut self, row: &CollectionRow) -> Result<()> {
        self.elements.push(E::from_value(&row.element)?);
        Ok(())
    }

    fn discard(&mut self) {
        self.elements.clear();
    }

    fn apply(&mut self, operation: ElementOperation<E>) {
        match operation {
            ElementOperation::Add(element) => self.elements.push(element),
            ElementOperation::Remove(element) => {
                if let Some(position) = self.elements.iter().position(|e| *e == element) {
                    self.elements.remove(position);
                }
            }
            ElementOperation::Clear => self.elements.clear(),
        }
    }

    fn elements(&self) -> Vec<E> {
        self.elements.clone()
    }

    fn snapshot(&self) -> im::Vector<E> {
        self.elements.iter().cloned().collect()
    }

    /// Same elements with the same multiplicities, in any order.
    fn equals_snapshot(&self, snapshot: &im::Vector<E>) -> bool {
        if self.elements.len() != snapshot.len() {
            return false;
        }
        self.elements.iter().all(|element| {
            count_same(element, self.elements.iter().cloned())
                == count_same(element, snapshot.iter().cloned())
        })
    }

    fn is_snapshot_empty(&self, snapshot: &im::Vector<E>) -> bool {
        snapshot.is_empty()
    }

    fn snapshot_elements(&self, snapshot: &im::Vector<E>) -> Vec<E> {
        snapshot.iter().cloned().collect()
    }

    fn deletes(&self, snapshot: &im::Vector<E>) -> Vec<Value> {
        let mut deletes = Vec::new();
        for (i, old) in snapshot.iter().enumerate() {
            // fast path when the element did not move
            let unmoved = self.elements.get(i).is_some_and(|e| old.is_same(e));
            if !unmoved && !self.elements.iter().any(|e| old.is_same(e)) {
                deletes.push(old.to_value());
            }
        }
        deletes
    }

    fn disassemble(&self) -> Vec<Value> {
        self.elements.iter().map(CollectionElement::to_value).collect()
    }

    fn assemble(&mut self, cached: &[Value]) -> Result<()> {
        for value in cached {
            self.elements.push(E::from_value(value)?);
        }
        Ok(())
    }
}

impl<E: CollectionElement> ListAccess for BagStore<E> {
    fn list_len(&self) -> usize {
        self.elements.len()
    }

    fn list_get(&self, index: usize) -> Option<&E> {
        self.elements.get(index)
    }

    fn list_insert(&mut self, index: usize, element: E) {
        self.elements.insert(index, element);
    }

    fn list_remove(&mut self, index: usize) -> E {
        self.elements.remove(index)
    }

    fn list_set(&mut self, index: usize, element: E) -> E {
        std::mem::replace(&mut self.elements[index], element)
    }
}

pub(crate) fn out_of_bounds(index: usize, len: usize) -> CollectionError {
    CollectionError::IndexOutOfBounds(format!("index {} for size {}", index, len))
}

impl<E: CollectionElement> PersistentBag<E> {
    /// Uninitialized bag, loaded from `session` on first access.
    pub fn new(session: Option<SessionHandle>) -> Self {
        Self::uninitialized(session, BagStore::new())
    }

    /// Uninitialized bag with no session.
    pub fn detached() -> Self {
        Self::uninitialized(None, BagStore::new())
    }

    /// Initialized bag holding `elements`.
    pub fn wrap(session: Option<SessionHandle>, elements: Vec<E>) -> Self {
        Self::wrapping(session, BagStore { elements })
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

    pub fn get(&mut self, index: usize) -> Result<Option<E>> {
        self.read()?;
        Ok(self.store.elements.get(index).cloned())
    }

    /// Number of elements equal to `element`.
    pub fn occurrences(&mut self, element: &E) -> Result<usize> {
        self.read()?;
        Ok(self.store.elements.iter().filter(|e| *e == element).count())
    }

    pub fn to_vec(&mut self) -> Result<Vec<E>> {
        self.read()?;
        Ok(self.store.elements.clone())
    }

    pub fn iter(&mut self) -> Result<std::slice::Iter<'_, E>> {
        self.read()?;
        Ok(self.store.elements.iter())
    }

    pub fn cursor(&mut self) -> Result<ListCursor<'_, BagStore<E>>> {
        self.read()?;
        Ok(ListCursor::new(self, 0))
    }

    /// Append `element`; queued instead of loading on the inverse side.
    pub fn push(&mut self, element: E) -> Result<()> {
        if self.is_operation_queue_enabled() {
            self.queue_operation(ElementOperation::Add(element));
        } else {
            self.write()?;
            self.store.elements.push(element);
        }
        Ok(())
    }

    /// `true` if any element was added.
    pub fn extend(&mut self, elements: impl IntoIterator<Item = E>) -> Result<bool> {
        let elements: Vec<E> = elements.into_iter().collect();
        if elements.is_empty() {
            return Ok(false);
        }
        if self.is_operation_queue_enabled() {
            for element in elements {
                self.queue_operation(ElementOperation::Add(element));
            }
        } else {
            self.write()?;
            self.store.elements.extend(elements);
        }
        Ok(true)
    }

    pub fn insert(&mut self, index: usize, element: E) -> Result<()> {
        self.write()?;
        let len = self.store.elements.len();
        if index > len {
            return Err(out_of_bounds(index, len));
        }
        self.store.elements.insert(index, element);
        Ok(())
    }

    /// Remove one occurrence of `element`.
    pub fn remove(&mut self, element: &E) -> Result<bool> {
        self.initialize(true)?;
        match self.store.elements.iter().position(|e| e == element) {
            Some(position) => {
                self.store.elements.remove(position);
                self.state.element_removed = true;
                self.state.dirty = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn remove_at(&mut self, index: usize) -> Result<E> {
        self.write()?;
        let len = self.store.elements.len();
        if index >= len {
            return Err(out_of_bounds(index, len));
        }
        self.state.element_removed = true;
        Ok(self.store.elements.remove(index))
    }

    pub fn set(&mut self, index: usize, element: E) -> Result<E> {
        self.write()?;
        let len = self.store.elements.len();
        let slot = self
            .store
            .elements
            .get_mut(index)
            .ok_or_else(|| out_of_bounds(index, len))?;
        Ok(std::mem::replace(slot, element))
    }

    /// Keep only the elements matching `keep`; `true` if any were removed.
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
