// ============================================================================
// Deferred Operation Queue
// ============================================================================
//
// Command Pattern log of writes made against an uninitialized inverse
// collection. The queue exists only until the collection is loaded; the load
// finalization replays every operation once, in order, against the freshly
// loaded backing store.
//
// ============================================================================

use crate::core::{CollectionElement, Value};
use std::fmt;

/// One queued write.
pub trait DelayedOperation: fmt::Debug + Send + Sync + 'static {
    type Element: CollectionElement;

    /// Element this operation adds, if any.
    fn added_instance(&self) -> Option<&Self::Element>;

    fn added_instance_mut(&mut self) -> Option<&mut Self::Element>;

    /// Element this operation displaces, if any.
    fn orphan(&self) -> Option<&Self::Element>;

    /// Value-level description handed to the unit of work on flush.
    fn describe(&self) -> QueuedChange;
}

/// Engine-agnostic form of a queued operation.
#[derive(Debug, Clone, PartialEq)]
pub enum QueuedChange {
    /// Add an element (under `index` for keyed collections)
    Add { index: Option<Value>, element: Value },

    /// Remove an element (by `index` for keyed collections)
    Remove {
        index: Option<Value>,
        element: Option<Value>,
    },

    /// Remove every element
    Clear,
}

impl QueuedChange {
    pub fn is_clear(&self) -> bool {
        matches!(self, QueuedChange::Clear)
    }
}

/// Queued write against a bag or set.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementOperation<E> {
    Add(E),
    Remove(E),
    Clear,
}

impl<E: CollectionElement> DelayedOperation for ElementOperation<E> {
    type Element = E;

    fn added_instance(&self) -> Option<&E> {
        match self {
            ElementOperation::Add(element) => Some(element),
            _ => None,
        }
    }

    fn added_instance_mut(&mut self) -> Option<&mut E> {
        match self {
            ElementOperation::Add(element) => Some(element),
            _ => None,
        }
    }

    fn orphan(&self) -> Option<&E> {
        match self {
            ElementOperation::Remove(element) => Some(element),
            _ => None,
        }
    }

    fn describe(&self) -> QueuedChange {
        match self {
            ElementOperation::Add(element) => QueuedChange::Add {
                index: None,
                element: element.to_value(),
            },
            ElementOperation::Remove(element) => QueuedChange::Remove {
                index: None,
                element: Some(element.to_value()),
            },
            ElementOperation::Clear => QueuedChange::Clear,
        }
    }
}

/// Queued write against a map.
#[derive(Debug, Clone, PartialEq)]
pub enum MapOperation<K, V> {
    Put { key: K, value: V, old: Option<V> },
    Remove { key: K, old: Option<V> },
    Clear,
}

impl<K: CollectionElement, V: CollectionElement> DelayedOperation for MapOperation<K, V> {
    type Element = V;

    fn added_instance(&self) -> Option<&V> {
        match self {
            MapOperation::Put { value, .. } => Some(value),
            _ => None,
        }
    }

    fn added_instance_mut(&mut self) -> Option<&mut V> {
        match self {
            MapOperation::Put { value, .. } => Some(value),
            _ => None,
        }
    }

    fn orphan(&self) -> Option<&V> {
        match self {
            MapOperation::Put { old, .. } | MapOperation::Remove { old, .. } => old.as_ref(),
            MapOperation::Clear => None,
        }
    }

    fn describe(&self) -> QueuedChange {
        match self {
            MapOperation::Put { key, value, .. } => QueuedChange::Add {
                index: Some(key.to_value()),
                element: value.to_value(),
            },
            MapOperation::Remove { key, old } => QueuedChange::Remove {
                index: Some(key.to_value()),
                element: old.as_ref().map(CollectionElement::to_value),
            },
            MapOperation::Clear => QueuedChange::Clear,
        }
    }
}

/// Ordered log of deferred operations; absent until the first one is queued.
#[derive(Debug)]
pub struct OperationQueue<Op> {
    operations: Option<Vec<Op>>,
}

impl<Op: DelayedOperation> OperationQueue<Op> {
    pub fn new() -> Self {
        Self { operations: None }
    }

    pub fn push(&mut self, operation: Op, capacity: usize) {
        self.operations
            .get_or_insert_with(|| Vec::with_capacity(capacity))
            .push(operation);
    }

    pub fn is_active(&self) -> bool {
        self.operations.is_some()
    }

    pub fn len(&self) -> usize {
        self.operations.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Op> {
        self.operations.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Op> {
        self.operations.iter_mut().flatten()
    }

    /// Removes and returns every operation, oldest first, discarding the queue.
    pub fn drain(&mut self) -> Vec<Op> {
        self.operations.take().unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.operations = None;
    }

    pub fn added_instances(&self) -> impl Iterator<Item = &Op::Element> {
        self.iter().filter_map(DelayedOperation::added_instance)
    }

    pub fn orphans(&self) -> impl Iterator<Item = &Op::Element> {
        self.iter().filter_map(DelayedOperation::orphan)
    }

    pub fn changes(&self) -> Vec<QueuedChange> {
        self.iter().map(DelayedOperation::describe).collect()
    }
}

impl<Op: DelayedOperation> Default for OperationQueue<Op> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_is_fifo_and_drains_once() {
        let mut queue = OperationQueue::new();
        assert!(!queue.is_active());

        queue.push(ElementOperation::Add(1i64), 10);
        queue.push(ElementOperation::Remove(2i64), 10);
        queue.push(ElementOperation::Add(3i64), 10);
        assert!(queue.is_active());
        assert_eq!(queue.len(), 3);

        let added: Vec<i64> = queue.added_instances().copied().collect();
        assert_eq!(added, vec![1, 3]);
        let orphans: Vec<i64> = queue.orphans().copied().collect();
        assert_eq!(orphans, vec![2]);

        let drained = queue.drain();
        assert_eq!(
            drained,
            vec![
                ElementOperation::Add(1),
                ElementOperation::Remove(2),
                ElementOperation::Add(3)
            ]
        );
        assert!(!queue.is_active());
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_map_operation_describes_key_and_orphan() {
        let put = MapOperation::Put {
            key: "a".to_string(),
            value: 2i64,
            old: Some(1i64),
        };
        assert_eq!(put.added_instance(), Some(&2));
        assert_eq!(put.orphan(), Some(&1));
        assert_eq!(
            put.describe(),
            QueuedChange::Add {
                index: Some(Value::from("a")),
                element: Value::Integer(2)
            }
        );

        let remove: MapOperation<String, i64> = MapOperation::Remove {
            key: "a".to_string(),
            old: None,
        };
        assert_eq!(remove.added_instance(), None);
        assert!(MapOperation::<String, i64>::Clear.describe().is_clear());
    }
}
