// ============================================================================
// Sorted Set
// ============================================================================
//
// Set ordered by a caller-supplied comparator. The comparator travels with
// every snapshot so a baseline can be searched in the same order.
//
// Range views (`head_set`, `tail_set`, `sub_set`) borrow the parent
// collection and route every mutation through its write gate; views of views
// narrow the range.
//
// ============================================================================

use super::queue::ElementOperation;
use super::views::{SetAccess, SetCursor};
use super::{CollectionKind, PersistentCollection};
use crate::core::{CollectionElement, CollectionError, CollectionRow, Result, Value};
use crate::session::SessionHandle;
use std::cmp::Ordering;
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

/// Total order over the elements of a sorted set.
pub type Comparator<E> = Arc<dyn Fn(&E, &E) -> Ordering + Send + Sync>;

/// Set ordered by a comparator.
pub type PersistentSortedSet<E> = PersistentCollection<SortedSetStore<E>>;

/// Comparator using the element's `Ord` implementation.
pub fn natural_order<E: Ord + 'static>() -> Comparator<E> {
    Arc::new(|a: &E, b: &E| a.cmp(b))
}

/// Comparator over `Value`s; values of different types order by type name.
pub fn value_order() -> Comparator<Value> {
    Arc::new(|a: &Value, b: &Value| {
        a.compare(b)
            .unwrap_or_else(|_| a.type_name().cmp(b.type_name()))
    })
}

pub struct SortedSetStore<E> {
    elements: Vec<E>,
    comparator: Comparator<E>,
}

impl<E> SortedSetStore<E> {
    pub fn new(comparator: Comparator<E>) -> Self {
        Self {
            elements: Vec::new(),
            comparator,
        }
    }

    pub fn comparator(&self) -> &Comparator<E> {
        &self.comparator
    }

    fn position(&self, element: &E) -> std::result::Result<usize, usize> {
        self.elements
            .binary_search_by(|probe| (self.comparator)(probe, element))
    }

    fn insert(&mut self, element: E) -> bool {
        match self.position(&element) {
            Ok(_) => false,
            Err(at) => {
                self.elements.insert(at, element);
                true
            }
        }
    }

    fn remove(&mut self, element: &E) -> bool {
        match self.position(element) {
            Ok(at) => {
                self.elements.remove(at);
                true
            }
            Err(_) => false,
        }
    }

    fn contains(&self, element: &E) -> bool {
        self.position(element).is_ok()
    }
}

impl<E: fmt::Debug> fmt::Debug for SortedSetStore<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortedSetStore")
            .field("elements", &self.elements)
            .finish_non_exhaustive()
    }
}

/// Baseline of a sorted set; keeps the comparator it was taken with.
#[derive(Clone)]
pub struct SortedSetSnapshot<E: Clone> {
    elements: im::Vector<E>,
    comparator: Comparator<E>,
}

impl<E: Clone> SortedSetSnapshot<E> {
    pub fn comparator(&self) -> &Comparator<E> {
        &self.comparator
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn contains(&self, element: &E) -> bool {
        self.elements
            .binary_search_by(|probe| (self.comparator)(probe, element))
            .is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.elements.iter()
    }
}

impl<E: Clone + fmt::Debug> fmt::Debug for SortedSetSnapshot<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortedSetSnapshot")
            .field("elements", &self.elements)
            .finish_non_exhaustive()
    }
}

impl<E: CollectionElement> CollectionKind for SortedSetStore<E> {
    type Element = E;
    type Operation = ElementOperation<E>;
    type Snapshot = SortedSetSnapshot<E>;

    fn kind_name(&self) -> &'static str {
        "SortedSet"
    }

    fn len(&self) -> usize {
        self.elements.len()
    }

    fn before_initialize(&mut self, anticipated_size: Option<usize>) {
        self.elements = Vec::with_capacity(anticipated_size.unwrap_or(0));
    }

    fn read_row(&mut self, row: &CollectionRow) -> Result<()> {
        self.insert(E::from_value(&row.element)?);
        Ok(())
    }

    fn discard(&mut self) {
        self.elements.clear();
    }

    fn apply(&mut self, operation: ElementOperation<E>) {
        match operation {
            ElementOperation::Add(element) => {
                self.insert(element);
            }
            ElementOperation::Remove(element) => {
                self.remove(&element);
            }
            ElementOperation::Clear => self.elements.clear(),
        }
    }

    fn elements(&self) -> Vec<E> {
        self.elements.clone()
    }

    fn snapshot(&self) -> SortedSetSnapshot<E> {
        SortedSetSnapshot {
            elements: self.elements.iter().cloned().collect(),
            comparator: Arc::clone(&self.comparator),
        }
    }

    fn equals_snapshot(&self, snapshot: &SortedSetSnapshot<E>) -> bool {
        snapshot.len() == self.elements.len()
            && self
                .elements
                .iter()
                .zip(snapshot.iter())
                .all(|(current, old)| {
                    (self.comparator)(current, old) == Ordering::Equal && old.is_same(current)
                })
    }

    fn is_snapshot_empty(&self, snapshot: &SortedSetSnapshot<E>) -> bool {
        snapshot.is_empty()
    }

    fn snapshot_elements(&self, snapshot: &SortedSetSnapshot<E>) -> Vec<E> {
        snapshot.iter().cloned().collect()
    }

    fn deletes(&self, snapshot: &SortedSetSnapshot<E>) -> Vec<Value> {
        snapshot
            .iter()
            .filter(|old| match self.position(old) {
                Ok(at) => !old.is_same(&self.elements[at]),
                Err(_) => true,
            })
            .map(CollectionElement::to_value)
            .collect()
    }

    fn disassemble(&self) -> Vec<Value> {
        self.elements.iter().map(CollectionElement::to_value).collect()
    }

    fn assemble(&mut self, cached: &[Value]) -> Result<()> {
        for value in cached {
            self.insert(E::from_value(value)?);
        }
        Ok(())
    }
}

impl<E: CollectionElement> SetAccess for SortedSetStore<E> {
    fn set_remove(&mut self, element: &E) -> bool {
        self.remove(element)
    }
}

impl<E: CollectionElement> PersistentSortedSet<E> {
    pub fn new(session: Option<SessionHandle>, comparator: Comparator<E>) -> Self {
        Self::uninitialized(session, SortedSetStore::new(comparator))
    }

    pub fn detached(comparator: Comparator<E>) -> Self {
        Self::uninitialized(None, SortedSetStore::new(comparator))
    }

    pub fn wrap(
        session: Option<SessionHandle>,
        comparator: Comparator<E>,
        elements: impl IntoIterator<Item = E>,
    ) -> Self {
        let mut store = SortedSetStore::new(comparator);
        for element in elements {
            store.insert(element);
        }
        Self::wrapping(session, store)
    }

    pub fn comparator(&self) -> &Comparator<E> {
        self.store.comparator()
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
        Ok(self.store.contains(element))
    }

    /// Elements in comparator order.
    pub fn to_vec(&mut self) -> Result<Vec<E>> {
        self.read()?;
        Ok(self.store.elements.clone())
    }

    pub fn iter(&mut self) -> Result<std::slice::Iter<'_, E>> {
        self.read()?;
        Ok(self.store.elements.iter())
    }

    pub fn cursor(&mut self) -> Result<SetCursor<'_, SortedSetStore<E>>> {
        self.read()?;
        Ok(SetCursor::new(self))
    }

    pub fn first(&mut self) -> Result<Option<E>> {
        self.read()?;
        Ok(self.store.elements.first().cloned())
    }

    pub fn last(&mut self) -> Result<Option<E>> {
        self.read()?;
        Ok(self.store.elements.last().cloned())
    }

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
                let added = self.store.insert(element);
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
                let removed = self.store.remove(element);
                if removed {
                    self.state.element_removed = true;
                    self.state.dirty = true;
                }
                Ok(removed)
            }
        }
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

    /// Elements strictly below `to`.
    pub fn head_set(&mut self, to: E) -> Result<SortedSubSet<'_, E>> {
        self.range_view(Bound::Unbounded, Bound::Excluded(to))
    }

    /// Elements at or above `from`.
    pub fn tail_set(&mut self, from: E) -> Result<SortedSubSet<'_, E>> {
        self.range_view(Bound::Included(from), Bound::Unbounded)
    }

    /// Elements in `[from, to)`.
    pub fn sub_set(&mut self, from: E, to: E) -> Result<SortedSubSet<'_, E>> {
        if (self.store.comparator)(&from, &to) == Ordering::Greater {
            return Err(CollectionError::UnsupportedOperation(
                "sub_set lower bound is above its upper bound".to_string(),
            ));
        }
        self.range_view(Bound::Included(from), Bound::Excluded(to))
    }

    /// Creating a view only reads; its own mutators pass the write gate.
    fn range_view(&mut self, lower: Bound<E>, upper: Bound<E>) -> Result<SortedSubSet<'_, E>> {
        self.read()?;
        Ok(SortedSubSet {
            collection: self,
            lower,
            upper,
        })
    }
}

// ============================================================================
// Range views
// ============================================================================

/// Write-through view of a range of a sorted set.
pub struct SortedSubSet<'a, E: CollectionElement> {
    collection: &'a mut PersistentSortedSet<E>,
    lower: Bound<E>,
    upper: Bound<E>,
}

impl<E: CollectionElement> SortedSubSet<'_, E> {
    fn compare(&self, a: &E, b: &E) -> Ordering {
        (self.collection.store.comparator)(a, b)
    }

    fn above_lower(&self, element: &E) -> bool {
        match &self.lower {
            Bound::Included(lower) => self.compare(element, lower) != Ordering::Less,
            Bound::Excluded(lower) => self.compare(element, lower) == Ordering::Greater,
            Bound::Unbounded => true,
        }
    }

    fn below_upper(&self, element: &E) -> bool {
        match &self.upper {
            Bound::Included(upper) => self.compare(element, upper) != Ordering::Greater,
            Bound::Excluded(upper) => self.compare(element, upper) == Ordering::Less,
            Bound::Unbounded => true,
        }
    }

    pub fn in_range(&self, element: &E) -> bool {
        self.above_lower(element) && self.below_upper(element)
    }

    /// A bound for a nested view must not widen this one.
    fn admits_bound(&self, bound: &E) -> bool {
        let lower_ok = match &self.lower {
            Bound::Included(lower) | Bound::Excluded(lower) => {
                self.compare(bound, lower) != Ordering::Less
            }
            Bound::Unbounded => true,
        };
        let upper_ok = match &self.upper {
            Bound::Included(upper) | Bound::Excluded(upper) => {
                self.compare(bound, upper) != Ordering::Greater
            }
            Bound::Unbounded => true,
        };
        lower_ok && upper_ok
    }

    fn span(&self) -> std::ops::Range<usize> {
        let elements = &self.collection.store.elements;
        let start = elements.partition_point(|e| !self.above_lower(e));
        let end = elements.partition_point(|e| self.below_upper(e));
        start..end.max(start)
    }

    fn out_of_range() -> CollectionError {
        CollectionError::UnsupportedOperation("element out of the view's range".to_string())
    }

    pub fn len(&self) -> usize {
        self.span().len()
    }

    pub fn is_empty(&self) -> bool {
        self.span().is_empty()
    }

    pub fn contains(&self, element: &E) -> bool {
        self.in_range(element) && self.collection.store.contains(element)
    }

    pub fn to_vec(&self) -> Vec<E> {
        self.collection.store.elements[self.span()].to_vec()
    }

    pub fn first(&self) -> Option<E> {
        let span = self.span();
        self.collection.store.elements[span].first().cloned()
    }

    pub fn last(&self) -> Option<E> {
        let span = self.span();
        self.collection.store.elements[span].last().cloned()
    }

    pub fn insert(&mut self, element: E) -> Result<bool> {
        if !self.in_range(&element) {
            return Err(Self::out_of_range());
        }
        self.collection.write()?;
        Ok(self.collection.store.insert(element))
    }

    /// `false` for elements outside the range.
    pub fn remove(&mut self, element: &E) -> Result<bool> {
        if !self.in_range(element) {
            return Ok(false);
        }
        self.collection.write()?;
        let removed = self.collection.store.remove(element);
        if removed {
            self.collection.state.element_removed = true;
        }
        Ok(removed)
    }

    /// Remove every element in the range.
    pub fn clear(&mut self) -> Result<()> {
        self.collection.write()?;
        let span = self.span();
        if !span.is_empty() {
            self.collection.store.elements.drain(span);
            self.collection.state.element_removed = true;
        }
        Ok(())
    }

    pub fn head_set(&mut self, to: E) -> Result<SortedSubSet<'_, E>> {
        if !self.admits_bound(&to) {
            return Err(Self::out_of_range());
        }
        let lower = self.lower.clone();
        Ok(SortedSubSet {
            collection: &mut *self.collection,
            lower,
            upper: Bound::Excluded(to),
        })
    }

    pub fn tail_set(&mut self, from: E) -> Result<SortedSubSet<'_, E>> {
        if !self.admits_bound(&from) {
            return Err(Self::out_of_range());
        }
        let upper = self.upper.clone();
        Ok(SortedSubSet {
            collection: &mut *self.collection,
            lower: Bound::Included(from),
            upper,
        })
    }

    pub fn sub_set(&mut self, from: E, to: E) -> Result<SortedSubSet<'_, E>> {
        if !self.admits_bound(&from) || !self.admits_bound(&to) {
            return Err(Self::out_of_range());
        }
        if self.compare(&from, &to) == Ordering::Greater {
            return Err(CollectionError::UnsupportedOperation(
                "sub_set lower bound is above its upper bound".to_string(),
            ));
        }
        Ok(SortedSubSet {
            collection: &mut *self.collection,
            lower: Bound::Included(from),
            upper: Bound::Excluded(to),
        })
    }
}
