// ============================================================================
// Identifier Bag
// ============================================================================
//
// A bag whose every position carries a surrogate row id. Ids follow their
// element through structural changes:
//
// remove(i): the removed id is parked at the vacated last slot, so a later
//            append reuses it as an UPDATE instead of DELETE + INSERT.
// insert(i): ids at and after `i` shift up one slot; slot `i` gets no id
//            and is assigned one by `pre_insert` at flush time.
//
// Occupied slots never share an id.
//
// ============================================================================

use super::bag::out_of_bounds;
use super::queue::ElementOperation;
use super::views::{ListAccess, ListCursor};
use super::{CollectionKind, PersistentCollection};
use crate::core::{CollectionElement, CollectionError, CollectionRow, Result, Value};
use crate::session::{IdentifierGenerator, Session, SessionHandle};
use std::collections::{HashMap, HashSet};

/// Bag with a surrogate id per row.
pub type PersistentIdBag<E> = PersistentCollection<IdBagStore<E>>;

/// Baseline of an identifier bag: row id to element.
pub type IdBagSnapshot<E> = im::HashMap<Value, E>;

#[derive(Debug, Clone)]
pub struct IdBagStore<E> {
    values: Vec<E>,
    identifiers: HashMap<usize, Value>,
}

impl<E> IdBagStore<E> {
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            identifiers: HashMap::new(),
        }
    }
}

impl<E> Default for IdBagStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: CollectionElement> IdBagStore<E> {
    pub fn identifier(&self, index: usize) -> Option<&Value> {
        self.identifiers.get(&index)
    }

    /// Binds `identifier` to the next slot while loading.
    fn claim(&mut self, identifier: Value) -> Result<()> {
        if self.identifiers.values().any(|id| *id == identifier) {
            return Err(CollectionError::TypeMismatch(format!(
                "identifier bag row id {} appears twice",
                identifier
            )));
        }
        self.identifiers.insert(self.values.len(), identifier);
        Ok(())
    }

    fn insert_at(&mut self, index: usize, element: E) {
        for i in (index..self.values.len()).rev() {
            match self.identifiers.remove(&i) {
                Some(id) => {
                    self.identifiers.insert(i + 1, id);
                }
                None => {
                    self.identifiers.remove(&(i + 1));
                }
            }
        }
        self.identifiers.remove(&index);
        self.values.insert(index, element);
    }

    fn remove_at(&mut self, index: usize) -> E {
        let last = self.values.len() - 1;
        let removed_id = self.identifiers.remove(&index);
        for i in index..last {
            if let Some(id) = self.identifiers.remove(&(i + 1)) {
                self.identifiers.insert(i, id);
            }
        }
        if let Some(id) = removed_id {
            self.identifiers.insert(last, id);
        }
        self.values.remove(index)
    }

    fn remove_element(&mut self, element: &E) -> bool {
        match self.values.iter().position(|e| e == element) {
            Some(index) => {
                self.remove_at(index);
                true
            }
            None => false,
        }
    }

    fn clear(&mut self) {
        self.values.clear();
        self.identifiers.clear();
    }
}

impl<E: CollectionElement> CollectionKind for IdBagStore<E> {
    type Element = E;
    type Operation = ElementOperation<E>;
    type Snapshot = IdBagSnapshot<E>;

    fn kind_name(&self) -> &'static str {
        "IdentifierBag"
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn before_initialize(&mut self, anticipated_size: Option<usize>) {
        let capacity = anticipated_size.unwrap_or(0);
        self.values = Vec::with_capacity(capacity);
        self.identifiers = HashMap::with_capacity(capacity);
    }

    fn read_row(&mut self, row: &CollectionRow) -> Result<()> {
        let identifier = row.identifier.clone().ok_or_else(|| {
            CollectionError::TypeMismatch("identifier bag row without a row id".to_string())
        })?;
        let element = E::from_value(&row.element)?;
        self.claim(identifier)?;
        self.values.push(element);
        Ok(())
    }

    fn discard(&mut self) {
        self.clear();
    }

    fn apply(&mut self, operation: ElementOperation<E>) {
        match operation {
            ElementOperation::Add(element) => self.values.push(element),
            ElementOperation::Remove(element) => {
                self.remove_element(&element);
            }
            ElementOperation::Clear => self.clear(),
        }
    }

    fn elements(&self) -> Vec<E> {
        self.values.clone()
    }

    fn snapshot(&self) -> IdBagSnapshot<E> {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(i, element)| {
                self.identifiers
                    .get(&i)
                    .map(|id| (id.clone(), element.clone()))
            })
            .collect()
    }

    fn equals_snapshot(&self, snapshot: &IdBagSnapshot<E>) -> bool {
        if snapshot.len() != self.values.len() {
            return false;
        }
        self.values.iter().enumerate().all(|(i, element)| {
            self.identifiers
                .get(&i)
                .and_then(|id| snapshot.get(id))
                .is_some_and(|old| old.is_same(element))
        })
    }

    fn is_snapshot_empty(&self, snapshot: &IdBagSnapshot<E>) -> bool {
        snapshot.is_empty()
    }

    fn snapshot_elements(&self, snapshot: &IdBagSnapshot<E>) -> Vec<E> {
        snapshot.values().cloned().collect()
    }

    /// Row ids of the baseline no occupied slot carries any more.
    fn deletes(&self, snapshot: &IdBagSnapshot<E>) -> Vec<Value> {
        let live: HashSet<&Value> = (0..self.values.len())
            .filter_map(|i| self.identifiers.get(&i))
            .collect();
        snapshot
            .keys()
            .filter(|id| !live.contains(id))
            .cloned()
            .collect()
    }

    /// `[id0, elem0, id1, elem1, ...]`; a slot without an id is `Null`.
    fn disassemble(&self) -> Vec<Value> {
        let mut flat = Vec::with_capacity(self.values.len() * 2);
        for (i, element) in self.values.iter().enumerate() {
            flat.push(self.identifiers.get(&i).cloned().unwrap_or(Value::Null));
            flat.push(element.to_value());
        }
        flat
    }

    fn assemble(&mut self, cached: &[Value]) -> Result<()> {
        if cached.len() % 2 != 0 {
            return Err(CollectionError::TypeMismatch(format!(
                "identifier bag cache entry has odd length {}",
                cached.len()
            )));
        }
        for pair in cached.chunks_exact(2) {
            let element = E::from_value(&pair[1])?;
            if !pair[0].is_null() {
                self.claim(pair[0].clone())?;
            }
            self.values.push(element);
        }
        Ok(())
    }

    fn pre_insert(
        &mut self,
        generator: Option<&dyn IdentifierGenerator>,
        session: &dyn Session,
    ) -> Result<()> {
        for i in 0..self.values.len() {
            if self.identifiers.contains_key(&i) {
                continue;
            }
            let generator = generator.ok_or_else(|| {
                CollectionError::ExecutionError(
                    "identifier bag has rows to insert but no identifier generator".to_string(),
                )
            })?;
            let id = generator.generate(session)?;
            self.identifiers.insert(i, id);
        }
        Ok(())
    }
}

impl<E: CollectionElement> ListAccess for IdBagStore<E> {
    fn list_len(&self) -> usize {
        self.values.len()
    }

    fn list_get(&self, index: usize) -> Option<&E> {
        self.values.get(index)
    }

    fn list_insert(&mut self, index: usize, element: E) {
        self.insert_at(index, element);
    }

    fn list_remove(&mut self, index: usize) -> E {
        self.remove_at(index)
    }

    fn list_set(&mut self, index: usize, element: E) -> E {
        std::mem::replace(&mut self.values[index], element)
    }
}

impl<E: CollectionElement> PersistentIdBag<E> {
    pub fn new(session: Option<SessionHandle>) -> Self {
        Self::uninitialized(session, IdBagStore::new())
    }

    pub fn detached() -> Self {
        Self::uninitialized(None, IdBagStore::new())
    }

    /// Initialized bag; every row waits for an id from `pre_insert`.
    pub fn wrap(session: Option<SessionHandle>, elements: Vec<E>) -> Self {
        Self::wrapping(
            session,
            IdBagStore {
                values: elements,
                identifiers: HashMap::new(),
            },
        )
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
        Ok(self.store.values.contains(element))
    }

    pub fn get(&mut self, index: usize) -> Result<Option<E>> {
        self.read()?;
        Ok(self.store.values.get(index).cloned())
    }

    pub fn to_vec(&mut self) -> Result<Vec<E>> {
        self.read()?;
        Ok(self.store.values.clone())
    }

    pub fn iter(&mut self) -> Result<std::slice::Iter<'_, E>> {
        self.read()?;
        Ok(self.store.values.iter())
    }

    pub fn cursor(&mut self) -> Result<ListCursor<'_, IdBagStore<E>>> {
        self.read()?;
        Ok(ListCursor::new(self, 0))
    }

    pub fn push(&mut self, element: E) -> Result<()> {
        if self.is_operation_queue_enabled() {
            self.queue_operation(ElementOperation::Add(element));
        } else {
            self.write()?;
            self.store.values.push(element);
        }
        Ok(())
    }

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
            self.store.values.extend(elements);
        }
        Ok(true)
    }

    pub fn insert(&mut self, index: usize, element: E) -> Result<()> {
        self.write()?;
        let len = self.store.values.len();
        if index > len {
            return Err(out_of_bounds(index, len));
        }
        self.store.insert_at(index, element);
        Ok(())
    }

    pub fn remove(&mut self, element: &E) -> Result<bool> {
        self.initialize(true)?;
        let removed = self.store.remove_element(element);
        if removed {
            self.state.element_removed = true;
            self.state.dirty = true;
        }
        Ok(removed)
    }

    pub fn remove_at(&mut self, index: usize) -> Result<E> {
        self.write()?;
        let len = self.store.values.len();
        if index >= len {
            return Err(out_of_bounds(index, len));
        }
        self.state.element_removed = true;
        Ok(self.store.remove_at(index))
    }

    /// Replace the element at `index`, keeping its row id.
    pub fn set(&mut self, index: usize, element: E) -> Result<E> {
        self.write()?;
        let len = self.store.values.len();
        if index >= len {
            return Err(out_of_bounds(index, len));
        }
        Ok(self.store.list_set(index, element))
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&E) -> bool) -> Result<bool> {
        self.initialize(true)?;
        let mut changed = false;
        for i in (0..self.store.values.len()).rev() {
            if !keep(&self.store.values[i]) {
                self.store.remove_at(i);
                changed = true;
            }
        }
        if changed {
            self.state.element_removed = true;
            self.state.dirty = true;
        }
        Ok(changed)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.initialize(true)?;
        if !self.store.values.is_empty() || !self.store.identifiers.is_empty() {
            self.store.clear();
            self.state.dirty = true;
        }
        Ok(())
    }

    // ========================================================================
    // Flush support
    // ========================================================================

    /// Row id of the element at `index`; `None` until `pre_insert` runs.
    pub fn identifier(&self, index: usize) -> Option<&Value> {
        self.store.identifier(index)
    }

    /// The row at `index` is not in the stored baseline.
    pub fn needs_inserting(&self, index: usize) -> bool {
        if index >= self.store.values.len() {
            return false;
        }
        match self.store.identifiers.get(&index) {
            None => true,
            Some(id) => self
                .stored_snapshot
                .as_ref()
                .is_none_or(|snapshot| !snapshot.contains_key(id)),
        }
    }

    /// The row at `index` is in the stored baseline with a different element.
    pub fn needs_updating(&self, index: usize) -> bool {
        let Some(element) = self.store.values.get(index) else {
            return false;
        };
        let Some(id) = self.store.identifiers.get(&index) else {
            return false;
        };
        self.stored_snapshot
            .as_ref()
            .and_then(|snapshot| snapshot.get(id))
            .is_some_and(|old| !old.is_same(element))
    }
}
