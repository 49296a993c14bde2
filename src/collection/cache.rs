use crate::core::{Result, Value};
use serde::{Deserialize, Serialize};

/// Disassembled form of a collection, as stored in a second-level cache.
///
/// `values` holds the kind-specific flat layout: `[id0, elem0, ...]` for
/// identifier bags, `[key0, value0, ...]` for maps, the elements otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    role: Option<String>,
    values: Vec<Value>,
}

impl CacheEntry {
    pub fn new(role: Option<String>, values: Vec<Value>) -> Self {
        Self { role, values }
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// MessagePack encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_pack_encoding() {
        let entry = CacheEntry::new(
            Some("Order.lines".to_string()),
            vec![Value::Integer(10), Value::from("a"), Value::Null],
        );
        let bytes = entry.to_bytes().unwrap();
        assert_eq!(CacheEntry::from_bytes(&bytes).unwrap(), entry);
        assert!(CacheEntry::from_bytes(&[0xc1]).is_err());
    }
}
