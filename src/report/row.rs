//! An ordered slug -> value mapping: one line of a data matrix.
use crate::store::RawValue;
use serde::ser::{Serialize, SerializeMap, Serializer};

#[derive(Debug, Clone, PartialEq)]
pub struct Row<V = RawValue> {
    cells: Vec<(String, V)>,
}

impl<V> Default for Row<V> {
    fn default() -> Self { Self { cells: Vec::new() } }
}

impl<V> Row<V> {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.cells.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Replaces the value in place when the key exists, appends otherwise.
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.cells.iter_mut().find(|(k, _)| *k == key) {
            Some(cell) => cell.1 = value,
            None => self.cells.push((key, value)),
        }
    }

    /// Appends without looking for an existing key.
    pub fn push(&mut self, key: impl Into<String>, value: V) {
        self.cells.push((key.into(), value));
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.cells.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize { self.cells.len() }

    pub fn is_empty(&self) -> bool { self.cells.is_empty() }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for Row<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

impl<V> IntoIterator for Row<V> {
    type Item = (String, V);
    type IntoIter = std::vec::IntoIter<(String, V)>;

    fn into_iter(self) -> Self::IntoIter { self.cells.into_iter() }
}

// Serialized as a JSON object, keeping column order.
impl<V: Serialize> Serialize for Row<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (k, v) in &self.cells {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
