//! Flattened, uniqued object table built by the binary writer.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::error::PlistResult;
use crate::types::Value;

/// One entry of the object table. Containers hold indices into the table.
#[derive(Debug, Clone, PartialEq)]
pub enum Object<'a> {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    /// Seconds since the property list epoch.
    Date(f64),
    Data(&'a [u8]),
    String(&'a str),
    Uid(u64),
    Array(Vec<usize>),
    Dictionary { keys: Vec<usize>, values: Vec<usize> },
}

/// A uniquing key: either a value from the tree or a dictionary key string.
///
/// Equality is strict structural identity: reals compare by bit pattern and
/// dictionaries compare in order, so a uniqued object re-encodes exactly
/// like every value it stands for.
#[derive(Clone, Copy)]
enum Key<'a> {
    Value(&'a Value),
    Str(&'a str),
}

impl Key<'_> {
    fn as_str(&self) -> Option<&str> {
        match self {
            Key::Str(s) => Some(s),
            Key::Value(Value::String(s)) => Some(s),
            Key::Value(_) => None,
        }
    }
}

impl PartialEq for Key<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self.as_str(), other.as_str()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => match (self, other) {
                (Key::Value(a), Key::Value(b)) => identical(a, b),
                _ => false,
            },
            _ => false,
        }
    }
}

impl Eq for Key<'_> {}

impl Hash for Key<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Key::Str(s) => hash_str(s, state),
            Key::Value(v) => hash_value(v, state),
        }
    }
}

fn hash_str<H: Hasher>(s: &str, state: &mut H) {
    6u8.hash(state);
    s.hash(state);
}

fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    match value {
        Value::Null => 0u8.hash(state),
        Value::Boolean(b) => {
            1u8.hash(state);
            b.hash(state);
        }
        Value::Integer(i) => {
            2u8.hash(state);
            i.hash(state);
        }
        Value::Real(r) => {
            3u8.hash(state);
            r.to_bits().hash(state);
        }
        Value::Date(d) => {
            4u8.hash(state);
            d.unix_seconds().to_bits().hash(state);
        }
        Value::Data(d) => {
            5u8.hash(state);
            d.hash(state);
        }
        Value::String(s) => hash_str(s, state),
        Value::Uid(u) => {
            7u8.hash(state);
            u.hash(state);
        }
        Value::Array(items) => {
            8u8.hash(state);
            items.len().hash(state);
            for item in items {
                hash_value(item, state);
            }
        }
        Value::Dictionary(dict) => {
            9u8.hash(state);
            dict.len().hash(state);
            for (k, v) in dict {
                k.hash(state);
                hash_value(v, state);
            }
        }
    }
}

fn identical(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Real(x), Value::Real(y)) => x.to_bits() == y.to_bits(),
        (Value::Date(x), Value::Date(y)) => {
            x.unix_seconds().to_bits() == y.unix_seconds().to_bits()
        }
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| identical(x, y))
        }
        (Value::Dictionary(xs), Value::Dictionary(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys)
                    .all(|((xk, xv), (yk, yv))| xk == yk && identical(xv, yv))
        }
        (Value::Array(_) | Value::Dictionary(_), _) | (_, Value::Array(_) | Value::Dictionary(_)) => {
            false
        }
        _ => a == b,
    }
}

/// The deduplicated object table for one encode call.
#[derive(Debug)]
pub struct ObjectTable<'a> {
    objects: Vec<Object<'a>>,
}

impl<'a> ObjectTable<'a> {
    /// Flattens `root` in pre-order: a container takes its index before its
    /// children, and a dictionary registers all of its keys before its values.
    /// The root is always object 0.
    pub fn build(root: &'a Value, max_depth: usize) -> PlistResult<Self> {
        root.check_depth(max_depth)?;
        let mut builder = Builder {
            objects: Vec::new(),
            uniques: HashMap::new(),
        };
        builder.register(Key::Value(root));
        Ok(Self {
            objects: builder.objects,
        })
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn objects(&self) -> &[Object<'a>] {
        &self.objects
    }
}

struct Builder<'a> {
    objects: Vec<Object<'a>>,
    uniques: HashMap<Key<'a>, usize>,
}

impl<'a> Builder<'a> {
    fn register(&mut self, key: Key<'a>) -> usize {
        if let Some(&index) = self.uniques.get(&key) {
            return index;
        }
        let index = self.objects.len();
        self.objects.push(Object::Null);
        self.uniques.insert(key, index);

        let object = match key {
            Key::Str(s) => Object::String(s),
            Key::Value(value) => self.flatten(value),
        };
        self.objects[index] = object;
        index
    }

    fn flatten(&mut self, value: &'a Value) -> Object<'a> {
        match value {
            Value::Null => Object::Null,
            Value::Boolean(b) => Object::Boolean(*b),
            Value::Integer(i) => Object::Integer(*i),
            Value::Real(r) => Object::Real(*r),
            Value::Date(d) => Object::Date(d.apple_timestamp()),
            Value::Data(d) => Object::Data(d),
            Value::String(s) => Object::String(s),
            Value::Uid(u) => Object::Uid(u.0),
            Value::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| self.register(Key::Value(item)))
                    .collect(),
            ),
            Value::Dictionary(dict) => {
                let keys = dict.keys().map(|k| self.register(Key::Str(k))).collect();
                let values = dict.values().map(|v| self.register(Key::Value(v))).collect();
                Object::Dictionary { keys, values }
            }
        }
    }
}
