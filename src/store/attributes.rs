//! The entity-attribute-value side of records.
//!
//! The engine only ever reads from it through [`AttributeStore`]; writes are
//! made by record entry and by callers populating fixtures.

use super::types::{RawValue, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Uniform "get attribute value by slug from a record" interface.
pub trait AttributeStore {
    fn get(&self, record: RecordId, slug: &str) -> Option<RawValue>;
}

/// In-memory attribute store keyed by record then slug.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EavStore {
    values: HashMap<RecordId, BTreeMap<String, RawValue>>,
}

impl EavStore {
    pub fn new() -> Self { Self::default() }

    pub fn set(&mut self, record: RecordId, slug: impl Into<String>, value: impl Into<RawValue>) {
        self.values.entry(record).or_default().insert(slug.into(), value.into());
    }

    pub fn remove(&mut self, record: RecordId, slug: &str) -> Option<RawValue> {
        self.values.get_mut(&record)?.remove(slug)
    }
}

impl AttributeStore for EavStore {
    fn get(&self, record: RecordId, slug: &str) -> Option<RawValue> {
        self.values.get(&record)?.get(slug).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_attribute_is_absent() {
        let mut eav = EavStore::new();
        let r = RecordId(0);
        eav.set(r, "height", 10);
        assert_eq!(eav.get(r, "height"), Some(RawValue::Int(10)));
        assert_eq!(eav.get(r, "width"), None);
        assert_eq!(eav.get(RecordId(7), "height"), None);
    }

    #[test]
    fn test_set_overwrites_and_remove() {
        let mut eav = EavStore::new();
        let r = RecordId(1);
        eav.set(r, "height", 10);
        eav.set(r, "height", 12.5);
        assert_eq!(eav.get(r, "height"), Some(RawValue::Float(12.5)));
        assert_eq!(eav.remove(r, "height"), Some(RawValue::Float(12.5)));
        assert_eq!(eav.get(r, "height"), None);
    }
}
