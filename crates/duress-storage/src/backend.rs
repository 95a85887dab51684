//! Tier backend capability interface
//!
//! A tier is a flat key-value table. Writes are durable when the call
//! returns and each key is updated atomically; readers never observe a
//! partially written value.

use crate::value::{StoredValue, Value};
use crate::Result;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// One row of a tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Persisted key
    pub key: String,
    /// Stored value
    pub value: StoredValue,
}

/// Storage backend for one trust tier
pub trait TierBackend: Send + Sync {
    /// Read the raw value stored under `key`
    fn get_raw(&self, key: &str) -> Result<Option<StoredValue>>;

    /// Write `value` under `key`, replacing any previous value
    fn set_raw(&self, key: &str, value: &Value) -> Result<()>;

    /// Write several keys in one atomic step
    fn set_many(&self, entries: &[(String, Value)]) -> Result<()> {
        for (key, value) in entries {
            self.set_raw(key, value)?;
        }
        Ok(())
    }

    /// List every row, ordered by key
    fn enumerate(&self) -> Result<Vec<Entry>>;
}

/// In-memory tier for tests and hosts without persistent storage
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<String, StoredValue>>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend pre-populated with values
    pub fn with_values<I, K>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let backend = Self::new();
        {
            let mut entries = backend.entries.write();
            for (key, value) in values {
                entries.insert(key.into(), StoredValue::Known(value));
            }
        }
        backend
    }

    /// Insert a raw stored value, including unrecognized ones
    pub fn insert_stored(&self, key: impl Into<String>, value: StoredValue) {
        self.entries.write().insert(key.into(), value);
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the tier holds no rows
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl TierBackend for MemoryBackend {
    fn get_raw(&self, key: &str) -> Result<Option<StoredValue>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: &Value) -> Result<()> {
        self.entries
            .write()
            .insert(key.to_string(), StoredValue::Known(value.clone()));
        Ok(())
    }

    fn set_many(&self, batch: &[(String, Value)]) -> Result<()> {
        let mut entries = self.entries.write();
        for (key, value) in batch {
            entries.insert(key.clone(), StoredValue::Known(value.clone()));
        }
        Ok(())
    }

    fn enumerate(&self) -> Result<Vec<Entry>> {
        Ok(self
            .entries
            .read()
            .iter()
            .map(|(key, value)| Entry {
                key: key.clone(),
                value: value.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let backend = MemoryBackend::new();
        assert!(backend.get_raw("enabled").unwrap().is_none());

        backend.set_raw("enabled", &Value::Bool(true)).unwrap();
        assert_eq!(
            backend.get_raw("enabled").unwrap(),
            Some(StoredValue::Known(Value::Bool(true)))
        );
    }

    #[test]
    fn test_overwrite_changes_type() {
        let backend = MemoryBackend::new();
        backend.set_raw("k", &Value::Int(1)).unwrap();
        backend.set_raw("k", &Value::Str("1".into())).unwrap();

        assert_eq!(
            backend.get_raw("k").unwrap().and_then(StoredValue::into_known),
            Some(Value::Str("1".into()))
        );
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn test_enumerate_is_ordered() {
        let backend = MemoryBackend::with_values([
            ("zeta", Value::Int(1)),
            ("alpha", Value::Bool(false)),
        ]);
        backend.insert_stored("mid", StoredValue::Unrecognized { kind: "float".into() });

        let keys: Vec<String> = backend
            .enumerate()
            .unwrap()
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_set_many() {
        let backend = MemoryBackend::new();
        backend
            .set_many(&[
                ("a".to_string(), Value::Bool(true)),
                ("b".to_string(), Value::Str("x".into())),
            ])
            .unwrap();
        assert_eq!(backend.len(), 2);
    }
}
