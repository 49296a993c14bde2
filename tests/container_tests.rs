/// Container tests
///
/// Cache disassembly, cursors, sorted views, entry indexes and orphan
/// detection against a live session.
/// Run with: cargo test --test container_tests

use rustmemodb_collections::prelude::*;
use rustmemodb_collections::value_order;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[test]
fn test_bag_survives_the_cache() {
    let mut bag = PersistentBag::wrap(None, vec![3i64, 1, 3]);
    bag.set_snapshot(Value::Integer(1), "Order.lines", None);
    let bytes = bag.disassemble().to_bytes().unwrap();

    let entry = CacheEntry::from_bytes(&bytes).unwrap();
    assert_eq!(entry.role(), Some("Order.lines"));
    let mut restored: PersistentBag<i64> = PersistentBag::detached();
    assert!(restored.initialize_from_cache(&entry, None).unwrap());
    assert!(restored.was_initialized());
    assert!(!restored.is_dirty());
    assert_eq!(restored.to_vec().unwrap(), vec![3, 1, 3]);

    // a loaded collection cannot be loaded again
    assert!(restored.initialize_from_cache(&entry, None).is_err());
}

#[test]
fn test_cache_entry_of_another_role_is_rejected() {
    let entry = PersistentSet::wrap(None, HashSet::from([1i64])).disassemble();
    let entry = CacheEntry::new(Some("Group.members".to_string()), entry.values().to_vec());

    let mut target: PersistentSet<i64> = PersistentSet::detached();
    target.set_snapshot(Value::Integer(1), "Group.admins", None);
    let err = target.initialize_from_cache(&entry, None).unwrap_err();
    assert!(matches!(err, CollectionError::TypeMismatch(_)));
    assert!(!target.was_initialized());
}

#[test]
fn test_identifier_bag_cache_keeps_row_ids() {
    let entry = CacheEntry::new(
        None,
        vec![
            Value::Integer(10),
            Value::from("a"),
            Value::Integer(11),
            Value::from("b"),
        ],
    );
    let mut notes: PersistentIdBag<String> = PersistentIdBag::detached();
    notes.initialize_from_cache(&entry, None).unwrap();
    assert_eq!(notes.identifier(1), Some(&Value::Integer(11)));
    assert_eq!(notes.disassemble().values(), entry.values());

    let broken = CacheEntry::new(None, vec![Value::Integer(10)]);
    let mut notes: PersistentIdBag<String> = PersistentIdBag::detached();
    assert!(notes.initialize_from_cache(&broken, None).is_err());
    assert!(!notes.was_initialized());
}

#[test]
fn test_sorted_set_assembles_in_comparator_order() {
    let entry = CacheEntry::new(
        None,
        vec![Value::Integer(3), Value::Integer(1), Value::Integer(2)],
    );
    let mut numbers = PersistentSortedSet::detached(natural_order::<i64>());
    numbers.initialize_from_cache(&entry, None).unwrap();
    assert_eq!(numbers.to_vec().unwrap(), vec![1, 2, 3]);
    assert_eq!(numbers.first().unwrap(), Some(1));
    assert_eq!(numbers.last().unwrap(), Some(3));
}

#[test]
fn test_set_survives_the_cache() {
    let mut tags = PersistentSet::wrap(None, HashSet::from(["red".to_string(), "blue".to_string()]));
    tags.set_snapshot(Value::Integer(1), "Post.tags", None);
    let entry = CacheEntry::from_bytes(&tags.disassemble().to_bytes().unwrap()).unwrap();

    let mut restored: PersistentSet<String> = PersistentSet::detached();
    assert!(restored.initialize_from_cache(&entry, None).unwrap());
    assert!(!restored.is_dirty());
    let mut values = restored.to_vec().unwrap();
    values.sort();
    assert_eq!(values, vec!["blue".to_string(), "red".to_string()]);
}

#[test]
fn test_map_survives_the_cache() {
    let mut prices = PersistentMap::wrap(
        None,
        HashMap::from([("tea".to_string(), 3i64), ("coffee".to_string(), 4)]),
    );
    prices.set_snapshot(Value::Integer(1), "Menu.prices", None);
    let entry = CacheEntry::from_bytes(&prices.disassemble().to_bytes().unwrap()).unwrap();

    let mut restored: PersistentMap<String, i64> = PersistentMap::detached();
    assert!(restored.initialize_from_cache(&entry, None).unwrap());
    assert!(!restored.is_dirty());
    assert_eq!(restored.get(&"tea".to_string()).unwrap(), Some(3));
    assert_eq!(restored.get(&"coffee".to_string()).unwrap(), Some(4));

    // a key without its value
    let broken = CacheEntry::new(None, vec![Value::from("tea")]);
    let mut target: PersistentMap<String, i64> = PersistentMap::detached();
    assert!(matches!(
        target.initialize_from_cache(&broken, None).unwrap_err(),
        CollectionError::TypeMismatch(_)
    ));
    assert!(!target.was_initialized());
}

#[test]
fn test_identifier_bag_cache_rejects_repeated_row_ids() {
    let entry = CacheEntry::new(
        None,
        vec![
            Value::Integer(10),
            Value::from("a"),
            Value::Integer(10),
            Value::from("b"),
        ],
    );
    let mut notes: PersistentIdBag<String> = PersistentIdBag::detached();
    assert!(matches!(
        notes.initialize_from_cache(&entry, None).unwrap_err(),
        CollectionError::TypeMismatch(_)
    ));
    assert!(!notes.was_initialized());
}

#[test]
fn test_cache_owner_is_recorded() {
    let owner: Arc<dyn std::any::Any + Send + Sync> = Arc::new(42u32);
    let entry = CacheEntry::new(None, vec![Value::from("x")]);
    let mut set: PersistentSet<String> = PersistentSet::detached();
    set.initialize_from_cache(&entry, Some(Arc::downgrade(&owner)))
        .unwrap();
    assert!(set.owner().is_some());
}

// ============================================================================
// Cursors and views
// ============================================================================

#[test]
fn test_list_cursor_edits_pass_the_write_gate() {
    let mut bag = PersistentBag::wrap(None, vec![1i64, 2, 3]);
    {
        let mut cursor = bag.cursor().unwrap();
        assert!(cursor.remove().is_err());
        assert_eq!(cursor.next(), Some(1));
        assert_eq!(cursor.next(), Some(2));
        assert_eq!(cursor.remove().unwrap(), 2);
        cursor.add(5).unwrap();
        assert_eq!(cursor.next(), Some(3));
        assert_eq!(cursor.set(4).unwrap(), 3);
        assert!(!cursor.has_next());
        assert_eq!(cursor.previous(), Some(4));
    }
    assert!(bag.is_dirty());
    assert_eq!(bag.to_vec().unwrap(), vec![1, 5, 4]);
}

#[test]
fn test_reading_through_a_cursor_is_clean() {
    let mut bag = PersistentBag::wrap(None, vec![1i64, 2]);
    let seen: Vec<i64> = bag.cursor().unwrap().collect();
    assert_eq!(seen, vec![1, 2]);
    assert!(!bag.is_dirty());
}

#[test]
fn test_identifier_bag_cursor_keeps_ids_aligned() {
    let entry = CacheEntry::new(
        None,
        vec![
            Value::Integer(10),
            Value::from("a"),
            Value::Integer(11),
            Value::from("b"),
            Value::Integer(12),
            Value::from("c"),
        ],
    );
    let mut notes: PersistentIdBag<String> = PersistentIdBag::detached();
    notes.initialize_from_cache(&entry, None).unwrap();
    {
        let mut cursor = notes.cursor().unwrap();
        cursor.next();
        assert_eq!(cursor.remove().unwrap(), "a");
    }
    assert_eq!(notes.identifier(0), Some(&Value::Integer(11)));
    assert_eq!(notes.identifier(1), Some(&Value::Integer(12)));
}

#[test]
fn test_sorted_subset_range_rules() {
    let mut numbers =
        PersistentSortedSet::wrap(None, natural_order::<i64>(), vec![1, 3, 5, 7, 9]);
    {
        let mut middle = numbers.sub_set(3, 8).unwrap();
        assert_eq!(middle.to_vec(), vec![3, 5, 7]);
        assert!(matches!(
            middle.insert(8).unwrap_err(),
            CollectionError::UnsupportedOperation(_)
        ));
        assert!(!middle.remove(&9).unwrap());
        assert!(middle.insert(4).unwrap());
        assert!(middle.remove(&7).unwrap());
    }
    assert!(numbers.is_dirty());
    assert_eq!(numbers.to_vec().unwrap(), vec![1, 3, 4, 5, 9]);

    {
        let mut tail = numbers.tail_set(4).unwrap();
        tail.clear().unwrap();
    }
    assert_eq!(numbers.to_vec().unwrap(), vec![1, 3]);
}

#[test]
fn test_value_order_groups_incomparable_types() {
    let mut values = PersistentSortedSet::wrap(
        None,
        value_order(),
        vec![Value::from("b"), Value::Integer(3), Value::from("a"), Value::Integer(2)],
    );
    assert_eq!(
        values.to_vec().unwrap(),
        vec![Value::Integer(2), Value::Integer(3), Value::from("a"), Value::from("b")]
    );
}

#[test]
fn test_entry_index_only_for_keyed_collections() {
    let map = PersistentMap::wrap(None, HashMap::from([("tea".to_string(), 3i64)]));
    assert_eq!(map.entry_index(0).unwrap(), Value::from("tea"));

    let bag = PersistentBag::wrap(None, vec![1i64]);
    assert!(matches!(
        bag.entry_index(0).unwrap_err(),
        CollectionError::UnsupportedOperation(_)
    ));
}

// ============================================================================
// Orphans
// ============================================================================

fn child(id: i64, name: &str) -> Value {
    Value::List(vec![Value::Integer(id), Value::from(name)])
}

#[test]
fn test_orphans_against_session_identity() {
    let store = Arc::new(MemoryStore::new());
    for id in [1, 2, 3] {
        store.mark_persisted("Child", Value::Integer(id)).unwrap();
    }
    let session = MemorySession::new(Arc::clone(&store), CollectionSettings::default());

    let mut children = PersistentBag::wrap(
        Some(session.handle().unwrap()),
        vec![child(1, "a"), child(2, "b"), child(3, "c")],
    );
    let snapshot = children.snapshot();
    children.set_snapshot(Value::Integer(1), "Parent.children", Some(snapshot.clone()));

    children.remove(&child(2, "b")).unwrap();
    // same identity, new state: not an orphan
    children.set(0, child(1, "renamed")).unwrap();
    children
        .push(Value::List(vec![Value::Null, Value::from("new")]))
        .unwrap();

    assert_eq!(children.orphans(&snapshot, "Child").unwrap(), vec![child(2, "b")]);
    assert!(!children.equals_snapshot());
    assert!(!children.is_snapshot_empty());
}

#[test]
fn test_everything_is_orphaned_by_clear() {
    let store = Arc::new(MemoryStore::new());
    let session = MemorySession::new(store, CollectionSettings::default());
    let mut children = PersistentSet::wrap(
        Some(session.handle().unwrap()),
        HashSet::from([child(1, "a"), child(2, "b")]),
    );
    let snapshot = children.snapshot();
    children.clear().unwrap();

    let mut orphans = children.orphans(&snapshot, "Child").unwrap();
    orphans.sort_by(|a, b| a.compare(b).unwrap());
    assert_eq!(orphans, vec![child(1, "a"), child(2, "b")]);
}
