/// Property tests
///
/// Orphan detection, identifier-bag row ids and dirty tracking checked
/// against simple models.
/// Run with: cargo test --test property_tests

use proptest::collection::vec;
use proptest::prelude::*;
use rustmemodb_collections::prelude::*;
use rustmemodb_collections::get_orphans;
use std::collections::HashSet;
use std::sync::Arc;
use test_strategy::{Arbitrary, proptest};

fn child(id: i64) -> Value {
    Value::List(vec![Value::Integer(id), Value::from("child")])
}

fn resolver(persisted: impl IntoIterator<Item = i64>) -> Arc<MemorySession> {
    let store = Arc::new(MemoryStore::new());
    for id in persisted {
        store.mark_persisted("Child", Value::Integer(id)).unwrap();
    }
    MemorySession::new(store, CollectionSettings::default())
}

#[proptest(cases = 64)]
fn test_orphans_are_old_ids_missing_from_current(
    #[strategy(vec(0i64..12, 0..10))] old: Vec<i64>,
    #[strategy(vec(0i64..12, 0..10))] current: Vec<i64>,
    #[strategy(vec(100i64..110, 0..4))] unsaved: Vec<i64>,
) {
    let session = resolver(0..12);
    let mut current_values: Vec<Value> = current.iter().copied().map(child).collect();
    // unsaved elements never shield an old row
    current_values.extend(unsaved.iter().copied().map(child));

    let orphans = get_orphans(
        old.iter().copied().map(child).collect(),
        &current_values,
        "Child",
        session.as_ref(),
    )
    .unwrap();

    let surviving: HashSet<i64> = current.iter().copied().collect();
    let expected: Vec<Value> = old
        .iter()
        .copied()
        .filter(|id| !surviving.contains(id))
        .map(child)
        .collect();
    prop_assert_eq!(orphans, expected);
}

#[derive(Debug, Clone, Arbitrary)]
enum RowOp {
    Push,
    Insert(usize),
    Remove(usize),
}

fn loaded_id_bag(size: usize) -> PersistentIdBag<i64> {
    let mut flat = Vec::with_capacity(size * 2);
    for i in 0..size as i64 {
        flat.push(Value::Integer(1000 + i));
        flat.push(Value::Integer(i));
    }
    let mut bag = PersistentIdBag::detached();
    bag.initialize_from_cache(&CacheEntry::new(None, flat), None)
        .unwrap();
    bag
}

#[proptest(cases = 128)]
fn test_identifier_bag_row_ids_stay_unique(
    #[strategy(1usize..8)] size: usize,
    #[strategy(vec(any::<RowOp>(), 0..24))] ops: Vec<RowOp>,
) {
    let mut bag = loaded_id_bag(size);
    let snapshot = bag.snapshot();
    bag.set_snapshot(Value::Integer(1), "Order.notes", Some(snapshot));
    let original: HashSet<Value> = (0..size as i64).map(|i| Value::Integer(1000 + i)).collect();

    for op in ops {
        let len = bag.len().unwrap();
        match op {
            RowOp::Push => bag.push(-1).unwrap(),
            RowOp::Insert(at) => bag.insert(at % (len + 1), -1).unwrap(),
            RowOp::Remove(at) if len > 0 => {
                bag.remove_at(at % len).unwrap();
            }
            RowOp::Remove(_) => {}
        }
    }

    let len = bag.len().unwrap();
    let live: Vec<Value> = (0..len).filter_map(|i| bag.identifier(i).cloned()).collect();
    let live_set: HashSet<Value> = live.iter().cloned().collect();
    prop_assert_eq!(live.len(), live_set.len());
    prop_assert!(live_set.is_subset(&original));

    let deletes: HashSet<Value> = bag.deletes().into_iter().collect();
    let expected: HashSet<Value> = original.difference(&live_set).cloned().collect();
    prop_assert_eq!(deletes, expected);
}

#[derive(Debug, Clone, Arbitrary)]
enum BagOp {
    Read,
    Push(i64),
    Set(usize, i64),
    RemoveAt(usize),
}

#[proptest(cases = 128)]
fn test_bag_matches_vec_model(
    #[strategy(vec(any::<i64>(), 0..6))] initial: Vec<i64>,
    #[strategy(vec(any::<BagOp>(), 0..20))] ops: Vec<BagOp>,
) {
    let mut bag = PersistentBag::wrap(None, initial.clone());
    let mut model = initial;
    let mut mutated = false;

    for op in ops {
        match op {
            BagOp::Read => {
                prop_assert_eq!(bag.len().unwrap(), model.len());
            }
            BagOp::Push(value) => {
                bag.push(value).unwrap();
                model.push(value);
                mutated = true;
            }
            BagOp::Set(at, value) if !model.is_empty() => {
                let at = at % model.len();
                prop_assert_eq!(bag.set(at, value).unwrap(), model[at]);
                model[at] = value;
                mutated = true;
            }
            BagOp::RemoveAt(at) if !model.is_empty() => {
                let at = at % model.len();
                prop_assert_eq!(bag.remove_at(at).unwrap(), model.remove(at));
                mutated = true;
            }
            BagOp::Set(..) | BagOp::RemoveAt(_) => {}
        }
        // reads never clear the flag, writes always set it
        prop_assert_eq!(bag.is_dirty(), mutated);
    }
    prop_assert_eq!(bag.to_vec().unwrap(), model);
}
