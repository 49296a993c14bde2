use super::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Global collection ID counter
static NEXT_COLLECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one collection reference.
///
/// The unit of work keys its table of attached collections by this id, so the
/// collection itself never needs to be owned (or pinned) by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionId(pub u64);

impl CollectionId {
    /// Generate a new unique collection ID
    pub fn new() -> Self {
        CollectionId(NEXT_COLLECTION_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for CollectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "coll_{}", self.0)
    }
}

/// Identity of one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        SessionId(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session_{}", self.0)
    }
}

/// One materialized row of a collection as handed over by the unit of work.
///
/// `identifier` is the surrogate id of identifier bags, `index` the map key
/// (or list position); plain bags and sets only carry the element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRow {
    pub identifier: Option<Value>,
    pub index: Option<Value>,
    pub element: Value,
}

impl CollectionRow {
    pub fn element(element: impl Into<Value>) -> Self {
        Self {
            identifier: None,
            index: None,
            element: element.into(),
        }
    }

    pub fn indexed(index: impl Into<Value>, element: impl Into<Value>) -> Self {
        Self {
            identifier: None,
            index: Some(index.into()),
            element: element.into(),
        }
    }

    pub fn identified(identifier: impl Into<Value>, element: impl Into<Value>) -> Self {
        Self {
            identifier: Some(identifier.into()),
            index: None,
            element: element.into(),
        }
    }
}

/// Renders `[role#key]` for log and error messages.
pub fn collection_info_string(role: Option<&str>, key: Option<&Value>) -> String {
    match (role, key) {
        (Some(role), Some(key)) => format!("[{}#{}]", role, key),
        (Some(role), None) => format!("[{}#<unknown>]", role),
        (None, _) => "[<unreferenced>]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_ids_are_unique() {
        let a = CollectionId::new();
        let b = CollectionId::new();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn test_collection_info_string() {
        let key = Value::Integer(3);
        assert_eq!(
            collection_info_string(Some("Order.lines"), Some(&key)),
            "[Order.lines#3]"
        );
        assert_eq!(collection_info_string(None, None), "[<unreferenced>]");
    }
}
