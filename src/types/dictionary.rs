//! Insertion-ordered dictionary with string keys.

use std::collections::HashMap;
use std::fmt;

use super::Value;

/// A property list dictionary.
///
/// Iteration follows insertion order so that re-encoding a decoded document is
/// stable. Equality ignores order: two dictionaries are equal when they hold
/// the same keys mapped to equal values.
#[derive(Clone, Default)]
pub struct Dictionary {
    entries: Vec<(String, Value)>,
    index: HashMap<String, usize>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Inserts a key/value pair, returning the previous value for the key.
    ///
    /// Replacing an existing key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.index.get(&key) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        match self.index.get(key) {
            Some(&i) => Some(&mut self.entries[i].1),
            None => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Removes a key, preserving the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let i = self.index.remove(key)?;
        let (_, value) = self.entries.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, &Value)> {
        self.entries.iter().map(entry_ref)
    }

    pub fn keys(&self) -> impl ExactSizeIterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl ExactSizeIterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }
}

impl PartialEq for Dictionary {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|ov| ov == v))
    }
}

impl fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut dict = Self::with_capacity(iter.size_hint().0);
        for (k, v) in iter {
            dict.insert(k, v);
        }
        dict
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Dictionary {
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl IntoIterator for Dictionary {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Dictionary {
    type Item = (&'a str, &'a Value);
    type IntoIter = std::iter::Map<
        std::slice::Iter<'a, (String, Value)>,
        fn(&'a (String, Value)) -> (&'a str, &'a Value),
    >;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter().map(entry_ref as fn(&'a (String, Value)) -> (&'a str, &'a Value))
    }
}

fn entry_ref((key, value): &(String, Value)) -> (&str, &Value) {
    (key.as_str(), value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_insertion_order() {
        let dict = Dictionary::from([("b", 1), ("a", 2), ("c", 3)]);
        let keys: Vec<_> = dict.keys().collect();
        assert_eq!(keys, ["b", "a", "c"]);
    }

    #[test]
    fn replace_keeps_position() {
        let mut dict = Dictionary::from([("x", 1), ("y", 2)]);
        assert_eq!(dict.insert("x", 10), Some(Value::Integer(1)));
        let entries: Vec<_> = dict.iter().map(|(k, v)| (k, v.clone())).collect();
        assert_eq!(
            entries,
            [("x", Value::Integer(10)), ("y", Value::Integer(2))]
        );
    }

    #[test]
    fn remove_reindexes() {
        let mut dict = Dictionary::from([("a", 1), ("b", 2), ("c", 3)]);
        assert_eq!(dict.remove("a"), Some(Value::Integer(1)));
        assert_eq!(dict.get("c"), Some(&Value::Integer(3)));
        assert_eq!(dict.keys().collect::<Vec<_>>(), ["b", "c"]);
        assert_eq!(dict.remove("a"), None);
    }

    #[test]
    fn equality_ignores_order() {
        let a = Dictionary::from([("one", 1), ("two", 2)]);
        let b = Dictionary::from([("two", 2), ("one", 1)]);
        assert_eq!(a, b);

        let c = Dictionary::from([("one", 1), ("two", 3)]);
        assert_ne!(a, c);
    }
}
