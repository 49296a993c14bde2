use super::persistent::IndexedRead;
use super::queue::MapOperation;
use super::views::MapCursor;
use super::{CollectionKind, PersistentCollection};
use crate::core::{CollectionElement, CollectionError, CollectionRow, Result, Value};
use crate::session::SessionHandle;
use std::collections::HashMap;
use std::hash::Hash;

/// Keyed collection.
pub type PersistentMap<K, V> = PersistentCollection<MapStore<K, V>>;

#[derive(Debug, Clone)]
pub struct MapStore<K: Hash + Eq, V> {
    pub(super) entries: HashMap<K, V>,
}

impl<K: Hash + Eq, V> MapStore<K, V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Hash + Eq, V> Default for MapStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> CollectionKind for MapStore<K, V>
where
    K: CollectionElement + Hash + Eq,
    V: CollectionElement,
{
    type Element = V;
    type Operation = MapOperation<K, V>;
    type Snapshot = im::HashMap<K, V>;

    fn kind_name(&self) -> &'static str {
        "Map"
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn before_initialize(&mut self, anticipated_size: Option<usize>) {
        self.entries = HashMap::with_capacity(anticipated_size.unwrap_or(0));
    }

    fn read_row(&mut self, row: &CollectionRow) -> Result<()> {
        let index = row.index.as_ref().ok_or_else(|| {
            CollectionError::TypeMismatch("map row without an index".to_string())
        })?;
        self.entries
            .insert(K::from_value(index)?, V::from_value(&row.element)?);
        Ok(())
    }

    fn discard(&mut self) {
        self.entries.clear();
    }

    fn apply(&mut self, operation: MapOperation<K, V>) {
        match operation {
            MapOperation::Put { key, value, .. } => {
                self.entries.insert(key, value);
            }
            MapOperation::Remove { key, .. } => {
                self.entries.remove(&key);
            }
            MapOperation::Clear => self.entries.clear(),
        }
    }

    fn elements(&self) -> Vec<V> {
        self.entries.values().cloned().collect()
    }

    fn snapshot(&self) -> im::HashMap<K, V> {
        self.entries
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    fn equals_snapshot(&self, snapshot: &im::HashMap<K, V>) -> bool {
        snapshot.len() == self.entries.len()
            && self.entries.iter().all(|(key, value)| {
                snapshot
                    .get(key)
                    .is_some_and(|old| old.is_same(value))
            })
    }

    fn is_snapshot_empty(&self, snapshot: &im::HashMap<K, V>) -> bool {
        snapshot.is_empty()
    }

    fn snapshot_elements(&self, snapshot: &im::HashMap<K, V>) -> Vec<V> {
        snapshot.values().cloned().collect()
    }

    /// Keys of the baseline that are gone.
    fn deletes(&self, snapshot: &im::HashMap<K, V>) -> Vec<Value> {
        snapshot
            .keys()
            .filter(|key| !self.entries.contains_key(*key))
            .map(CollectionElement::to_value)
            .collect()
    }

    /// `[key0, value0, key1, value1, ...]`
    fn disassemble(&self) -> Vec<Value> {
        let mut flat = Vec::with_capacity(self.entries.len() * 2);
        for (key, value) in &self.entries {
            flat.push(key.to_value());
            flat.push(value.to_value());
        }
        flat
    }

    fn assemble(&mut self, cached: &[Value]) -> Result<()> {
        if cached.len() % 2 != 0 {
            return Err(CollectionError::TypeMismatch(format!(
                "map cache entry has odd length {}",
                cached.len()
            )));
        }
        for pair in cached.chunks_exact(2) {
            self.entries
                .insert(K::from_value(&pair[0])?, V::from_value(&pair[1])?);
        }
        Ok(())
    }

    fn entry_index(&self, position: usize) -> Option<Value> {
        self.entries.keys().nth(position).map(CollectionElement::to_value)
    }
}

impl<K, V> PersistentMap<K, V>
where
    K: CollectionElement + Hash + Eq,
    V: CollectionElement,
{
    pub fn new(session: Option<SessionHandle>) -> Self {
        Self::uninitialized(session, MapStore::new())
    }

    pub fn detached() -> Self {
        Self::uninitialized(None, MapStore::new())
    }

    pub fn wrap(session: Option<SessionHandle>, entries: HashMap<K, V>) -> Self {
        Self::wrapping(session, MapStore { entries })
    }

    pub fn len(&mut self) -> Result<usize> {
        self.size_via_read()
    }

    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn contains_key(&mut self, key: &K) -> Result<bool> {
        if let Some(exists) = self.read_index_existence(&key.to_value())? {
            return Ok(exists);
        }
        Ok(self.store.entries.contains_key(key))
    }

    pub fn contains_value(&mut self, value: &V) -> Result<bool> {
        if let Some(exists) = self.read_element_existence(&value.to_value())? {
            return Ok(exists);
        }
        Ok(self.store.entries.values().any(|v| v == value))
    }

    pub fn get(&mut self, key: &K) -> Result<Option<V>> {
        match self.read_element_by_index(&key.to_value())? {
            IndexedRead::Loaded(value) => value.as_ref().map(V::from_value).transpose(),
            IndexedRead::Unknown => Ok(self.store.entries.get(key).cloned()),
        }
    }

    pub fn keys(&mut self) -> Result<Vec<K>> {
        self.read()?;
        Ok(self.store.entries.keys().cloned().collect())
    }

    pub fn values(&mut self) -> Result<Vec<V>> {
        self.read()?;
        Ok(self.store.elements())
    }

    pub fn iter(&mut self) -> Result<std::collections::hash_map::Iter<'_, K, V>> {
        self.read()?;
        Ok(self.store.entries.iter())
    }

    pub fn cursor(&mut self) -> Result<MapCursor<'_, K, V>> {
        self.read()?;
        Ok(MapCursor::new(self))
    }

    /// Previous value under `key`. Queued without a load on the inverse side
    /// when the previous value can be fetched by a targeted query.
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>> {
        if self.is_put_queue_enabled() {
            if let IndexedRead::Loaded(old) = self.read_element_by_index(&key.to_value())? {
                let old = old.as_ref().map(V::from_value).transpose()?;
                self.queue_operation(MapOperation::Put {
                    key,
                    value,
                    old: old.clone(),
                });
                return Ok(old);
            }
        }
        self.initialize(true)?;
        let old = self.store.entries.insert(key, value.clone());
        if old.as_ref().is_none_or(|old| !old.is_same(&value)) {
            self.state.dirty = true;
        }
        Ok(old)
    }

    pub fn remove(&mut self, key: &K) -> Result<Option<V>> {
        if self.is_put_queue_enabled() {
            if let IndexedRead::Loaded(old) = self.read_element_by_index(&key.to_value())? {
                let old = old.as_ref().map(V::from_value).transpose()?;
                self.state.element_removed = true;
                self.queue_operation(MapOperation::Remove {
                    key: key.clone(),
                    old: old.clone(),
                });
                return Ok(old);
            }
        }
        self.initialize(true)?;
        let old = self.store.entries.remove(key);
        if old.is_some() {
            self.state.element_removed = true;
            self.state.dirty = true;
        }
        Ok(old)
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = (K, V)>) -> Result<()> {
        let entries: Vec<(K, V)> = entries.into_iter().collect();
        if entries.is_empty() {
            return Ok(());
        }
        self.write()?;
        self.store.entries.extend(entries);
        Ok(())
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&K, &V) -> bool) -> Result<bool> {
        self.initialize(true)?;
        let before = self.store.entries.len();
        self.store.entries.retain(|key, value| keep(key, value));
        let changed = self.store.entries.len() != before;
        if changed {
            self.state.element_removed = true;
            self.state.dirty = true;
        }
        Ok(changed)
    }

    pub fn clear(&mut self) -> Result<()> {
        if self.is_clear_queue_enabled() {
            self.queue_operation(MapOperation::Clear);
            return Ok(());
        }
        self.initialize(true)?;
        if !self.store.entries.is_empty() {
            self.store.entries.clear();
            self.state.dirty = true;
        }
        Ok(())
    }
}
