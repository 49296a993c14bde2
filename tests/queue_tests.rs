/// Deferred write tests
///
/// Operations queued on the inverse side of an association, extra-lazy
/// size and existence queries, and replay of the queue on load.
/// Run with: cargo test --test queue_tests

use rustmemodb_collections::prelude::*;
use rustmemodb_collections::{CollectionPersister, QueuedChange};
use std::collections::HashMap;
use std::sync::Arc;

struct Fixture {
    store: Arc<MemoryStore>,
    session: Arc<MemorySession>,
}

impl Fixture {
    fn new(role: &str, rows: Vec<CollectionRow>) -> Self {
        let store = Arc::new(MemoryStore::new());
        store.set_rows(role, Value::Integer(1), rows).unwrap();
        let session = MemorySession::new(Arc::clone(&store), CollectionSettings::default());
        Self { store, session }
    }

    fn persister(&self, role: &str) -> MemoryCollectionPersister {
        MemoryCollectionPersister::new(role, Arc::clone(&self.store))
    }

    fn attach(&self, collection: &mut dyn ManagedCollection, persister: Arc<dyn CollectionPersister>) {
        self.session
            .attach(collection, persister, Value::Integer(1))
            .unwrap();
    }
}

fn elements(values: &[i64]) -> Vec<CollectionRow> {
    values.iter().map(|v| CollectionRow::element(*v)).collect()
}

#[test]
fn test_inverse_bag_queues_additions_until_load() {
    let fx = Fixture::new("Parent.children", elements(&[1, 2, 3, 4, 5]));
    let mut bag: PersistentBag<i64> = PersistentBag::new(None);
    fx.attach(&mut bag, fx.persister("Parent.children").inverse(true).build());

    bag.push(6).unwrap();
    bag.push(7).unwrap();
    bag.push(8).unwrap();
    assert!(!bag.was_initialized());
    assert!(bag.has_queued_operations());
    assert!(bag.is_dirty());
    assert_eq!(bag.queued_additions().copied().collect::<Vec<_>>(), vec![6, 7, 8]);
    assert_eq!(fx.store.load_queries(), 0);

    assert_eq!(bag.len().unwrap(), 8);
    assert!(bag.was_initialized());
    assert!(bag.is_dirty());
    assert!(!bag.has_queued_operations());
    assert_eq!(bag.to_vec().unwrap(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
}

#[test]
fn test_owning_side_never_queues() {
    let fx = Fixture::new("Parent.children", elements(&[1]));
    let mut bag: PersistentBag<i64> = PersistentBag::new(None);
    fx.attach(&mut bag, fx.persister("Parent.children").build());

    bag.push(2).unwrap();
    assert!(bag.was_initialized());
    assert!(!bag.has_queued_operations());
    assert_eq!(fx.store.load_queries(), 1);
}

#[test]
fn test_extra_lazy_emptiness_check_does_not_load() {
    let fx = Fixture::new("Parent.children", elements(&[1, 2, 3]));
    let mut bag: PersistentBag<i64> = PersistentBag::new(None);
    fx.attach(
        &mut bag,
        fx.persister("Parent.children").inverse(true).extra_lazy(true).build(),
    );

    assert!(!bag.is_empty().unwrap());
    assert!(!bag.was_initialized());
    assert_eq!(fx.store.size_queries(), 1);
    assert_eq!(bag.cached_size(), Some(3));

    // answered from the cached size
    assert_eq!(bag.len().unwrap(), 3);
    assert_eq!(fx.store.size_queries(), 1);
    assert_eq!(fx.store.load_queries(), 0);
}

#[test]
fn test_size_query_flushes_queued_operations_first() {
    let fx = Fixture::new("Parent.children", elements(&[1, 2, 3]));
    let mut bag: PersistentBag<i64> = PersistentBag::new(None);
    fx.attach(
        &mut bag,
        fx.persister("Parent.children").inverse(true).extra_lazy(true).build(),
    );

    bag.push(4).unwrap();
    assert_eq!(
        bag.queued_changes(),
        vec![QueuedChange::Add {
            index: None,
            element: Value::Integer(4),
        }]
    );

    assert_eq!(bag.len().unwrap(), 4);
    assert_eq!(fx.session.flush_count(), 1);
    assert!(!bag.has_queued_operations());
    assert!(!bag.was_initialized());
    assert_eq!(
        fx.store
            .rows("Parent.children", &Value::Integer(1))
            .unwrap()
            .len(),
        4
    );
}

#[test]
fn test_extra_lazy_set_checks_existence_before_queueing() {
    let fx = Fixture::new("Group.members", elements(&[1, 2]));
    let mut set: PersistentSet<i64> = PersistentSet::new(None);
    fx.attach(
        &mut set,
        fx.persister("Group.members").inverse(true).extra_lazy(true).build(),
    );

    assert!(!set.insert(2).unwrap());
    assert!(!set.has_queued_operations());
    assert!(set.insert(3).unwrap());
    assert!(set.has_queued_operations());
    assert!(set.remove(&1).unwrap());
    assert!(set.is_element_removed());
    assert!(!set.was_initialized());
    assert_eq!(fx.store.load_queries(), 0);

    let mut members = set.to_vec().unwrap();
    members.sort();
    assert_eq!(members, vec![2, 3]);
    assert!(set.is_dirty());
}

#[test]
fn test_extra_lazy_map_put_is_queued() {
    let fx = Fixture::new(
        "Menu.prices",
        vec![
            CollectionRow::indexed("tea", 3i64),
            CollectionRow::indexed("coffee", 4i64),
        ],
    );
    let mut prices: PersistentMap<String, i64> = PersistentMap::new(None);
    fx.attach(
        &mut prices,
        fx.persister("Menu.prices")
            .inverse(true)
            .one_to_many(true)
            .extra_lazy(true)
            .build(),
    );

    assert_eq!(prices.insert("tea".to_string(), 5).unwrap(), Some(3));
    assert!(prices.has_queued_operations());
    assert!(!prices.was_initialized());
    assert_eq!(fx.store.element_queries(), 1);

    // the targeted read flushes the put before querying
    assert_eq!(prices.get(&"tea".to_string()).unwrap(), Some(5));
    assert!(prices.contains_key(&"coffee".to_string()).unwrap());
    assert!(!prices.was_initialized());
}

#[test]
fn test_clear_is_not_queued_with_orphan_delete() {
    let fx = Fixture::new("Parent.children", elements(&[1, 2]));
    let mut bag: PersistentBag<i64> = PersistentBag::new(None);
    fx.attach(
        &mut bag,
        fx.persister("Parent.children")
            .inverse(true)
            .orphan_delete(true)
            .build(),
    );

    bag.clear().unwrap();
    assert!(bag.was_initialized());
    assert!(bag.is_empty().unwrap());
    assert!(bag.is_dirty());
}

#[test]
fn test_queued_clear_is_replayed_on_load() {
    let fx = Fixture::new("Parent.children", elements(&[1, 2]));
    let mut bag: PersistentBag<i64> = PersistentBag::new(None);
    fx.attach(&mut bag, fx.persister("Parent.children").inverse(true).build());

    bag.clear().unwrap();
    bag.push(9).unwrap();
    assert!(!bag.was_initialized());
    assert_eq!(bag.queued_changes().len(), 2);

    assert_eq!(bag.to_vec().unwrap(), vec![9]);
}

#[test]
fn test_identifier_bag_never_queues_clear() {
    let fx = Fixture::new(
        "Order.notes",
        vec![CollectionRow::identified(10i64, "a"), CollectionRow::identified(11i64, "b")],
    );
    let mut notes: PersistentIdBag<String> = PersistentIdBag::new(None);
    fx.attach(&mut notes, fx.persister("Order.notes").inverse(true).build());

    notes.clear().unwrap();
    assert!(notes.was_initialized());
    assert!(notes.is_empty().unwrap());
}

#[test]
fn test_queued_orphans_resolve_by_identity() {
    let child = |id: Value, name: &str| Value::List(vec![id, Value::from(name)]);
    let old = child(Value::Integer(1), "old");

    let fx = Fixture::new("Parent.byName", vec![CollectionRow::indexed("a", old.clone())]);
    fx.store.mark_persisted("Child", Value::Integer(1)).unwrap();
    let mut children: PersistentMap<String, Value> = PersistentMap::new(None);
    fx.attach(
        &mut children,
        fx.persister("Parent.byName")
            .inverse(true)
            .one_to_many(true)
            .extra_lazy(true)
            .element_entity("Child")
            .build(),
    );

    let replacement = child(Value::Null, "new");
    assert_eq!(
        children.insert("a".to_string(), replacement.clone()).unwrap(),
        Some(old.clone())
    );
    assert_eq!(children.queued_orphans("Child").unwrap(), vec![old]);

    // a merge gives the unsaved child its identifier
    let merged = child(Value::Integer(2), "new");
    children
        .replace_queued_operation_values(&HashMap::from([(replacement, merged.clone())]))
        .unwrap();
    assert_eq!(children.queued_additions().cloned().collect::<Vec<_>>(), vec![merged]);

    children.clear_operation_queue();
    assert!(!children.has_queued_operations());
}
