//! Property list value types.

use std::fmt;

use chrono::{DateTime, Utc};

use super::Dictionary;
use crate::date::Date;
use crate::error::{PlistError, PlistResult};

/// A value in a property list.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Date(Date),
    Data(Vec<u8>),
    String(String),
    Array(Vec<Value>),
    Dictionary(Dictionary),
    /// Keyed-archiver object reference. Never resolved by this crate.
    Uid(Uid),
}

/// An opaque keyed-archiver reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uid(pub u64);

impl Uid {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl Value {
    /// Human-readable name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Date(_) => "date",
            Self::Data(_) => "data",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Dictionary(_) => "dictionary",
            Self::Uid(_) => "uid",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// True for arrays and dictionaries.
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Array(_) | Self::Dictionary(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Self::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<Date> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&[u8]> {
        match self {
            Self::Data(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dictionary(&self) -> Option<&Dictionary> {
        match self {
            Self::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_uid(&self) -> Option<Uid> {
        match self {
            Self::Uid(u) => Some(*u),
            _ => None,
        }
    }

    /// Looks up `key` if this is a dictionary.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_dictionary().and_then(|d| d.get(key))
    }

    /// Returns element `i` if this is an array.
    pub fn index(&self, i: usize) -> Option<&Value> {
        self.as_array().and_then(|items| items.get(i))
    }

    /// Visits this value and everything reachable from it in pre-order.
    ///
    /// The callback receives each node and its depth, the receiver being at
    /// depth 0. Dictionary keys are not visited as separate nodes.
    pub fn walk<F: FnMut(&Value, usize)>(&self, f: &mut F) {
        self.walk_at(0, f);
    }

    /// Fails with `NestingTooDeep` when any container lies deeper than
    /// `limit`. Iterative, so arbitrarily deep caller-built trees are safe.
    pub(crate) fn check_depth(&self, limit: usize) -> PlistResult<()> {
        let mut stack = vec![(self, 0usize)];
        while let Some((value, depth)) = stack.pop() {
            if depth > limit {
                return Err(PlistError::NestingTooDeep { limit });
            }
            match value {
                Self::Array(items) => stack.extend(items.iter().map(|v| (v, depth + 1))),
                Self::Dictionary(dict) => stack.extend(dict.values().map(|v| (v, depth + 1))),
                _ => {}
            }
        }
        Ok(())
    }

    fn walk_at<F: FnMut(&Value, usize)>(&self, depth: usize, f: &mut F) {
        f(self, depth);
        match self {
            Self::Array(items) => {
                for item in items {
                    item.walk_at(depth + 1, f);
                }
            }
            Self::Dictionary(dict) => {
                for value in dict.values() {
                    value.walk_at(depth + 1, f);
                }
            }
            _ => {}
        }
    }
}

// -- Convenience conversions --

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Real(f)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Self::Real(f64::from(f))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Data(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::Array(v)
    }
}

impl From<Dictionary> for Value {
    fn from(d: Dictionary) -> Self {
        Self::Dictionary(d)
    }
}

impl From<Date> for Value {
    fn from(d: Date) -> Self {
        Self::Date(d)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::Date(Date::from(dt))
    }
}

impl From<Uid> for Value {
    fn from(u: Uid) -> Self {
        Self::Uid(u)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Date(d) => write!(f, "{d}"),
            Self::Data(b) => write!(f, "<{} bytes>", b.len()),
            Self::String(s) => write!(f, "\"{s}\""),
            Self::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Dictionary(dict) => {
                write!(f, "{{")?;
                for (i, (k, v)) in dict.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Self::Uid(u) => write!(f, "uid({})", u.0),
        }
    }
}
