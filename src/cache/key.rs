//! Key Composition Module
//!
//! Builds canonical composite keys from a base key, a namespace and a set of
//! named options. Options are kept sorted by name, so the order in which a
//! caller supplies them never changes the key.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Namespace used when none is given.
pub const DEFAULT_NAMESPACE: &str = "default";

// == Key Value ==
/// A hashable, totally ordered value usable as a base key or option value.
///
/// Floats compare with [`f64::total_cmp`], so `NaN` is a valid key and
/// `0.0` and `-0.0` are distinct. Values of different variants never compare
/// equal, so `Int(1)` and `Float(1.0)` address different entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum KeyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<KeyValue>),
    /// An already composed key, used for round-trip addressing.
    Composite(Box<CompositeKey>),
}

impl KeyValue {
    /// Builds an opaque byte-string value.
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        KeyValue::Bytes(bytes.into())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            KeyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            KeyValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a float, widening integers.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            KeyValue::Float(f) => Some(*f),
            KeyValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            KeyValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_composite(&self) -> Option<&CompositeKey> {
        match self {
            KeyValue::Composite(key) => Some(key),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            KeyValue::Bool(_) => 0,
            KeyValue::Int(_) => 1,
            KeyValue::Float(_) => 2,
            KeyValue::Str(_) => 3,
            KeyValue::Bytes(_) => 4,
            KeyValue::List(_) => 5,
            KeyValue::Composite(_) => 6,
        }
    }
}

impl Ord for KeyValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (KeyValue::Bool(a), KeyValue::Bool(b)) => a.cmp(b),
            (KeyValue::Int(a), KeyValue::Int(b)) => a.cmp(b),
            (KeyValue::Float(a), KeyValue::Float(b)) => a.total_cmp(b),
            (KeyValue::Str(a), KeyValue::Str(b)) => a.cmp(b),
            (KeyValue::Bytes(a), KeyValue::Bytes(b)) => a.cmp(b),
            (KeyValue::List(a), KeyValue::List(b)) => a.cmp(b),
            (KeyValue::Composite(a), KeyValue::Composite(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for KeyValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for KeyValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyValue {}

impl Hash for KeyValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            KeyValue::Bool(b) => b.hash(state),
            KeyValue::Int(i) => i.hash(state),
            // total_cmp equality is bitwise equality
            KeyValue::Float(f) => f.to_bits().hash(state),
            KeyValue::Str(s) => s.hash(state),
            KeyValue::Bytes(b) => b.hash(state),
            KeyValue::List(items) => items.hash(state),
            KeyValue::Composite(key) => key.hash(state),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Bool(b) => write!(f, "{b}"),
            KeyValue::Int(i) => write!(f, "{i}"),
            KeyValue::Float(x) => write!(f, "{x:?}"),
            KeyValue::Str(s) => write!(f, "{s:?}"),
            KeyValue::Bytes(bytes) => {
                write!(f, "0x")?;
                for byte in bytes {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            KeyValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            KeyValue::Composite(key) => write!(f, "{key}"),
        }
    }
}

impl From<bool> for KeyValue {
    fn from(value: bool) -> Self {
        KeyValue::Bool(value)
    }
}

impl From<i32> for KeyValue {
    fn from(value: i32) -> Self {
        KeyValue::Int(i64::from(value))
    }
}

impl From<i64> for KeyValue {
    fn from(value: i64) -> Self {
        KeyValue::Int(value)
    }
}

impl From<u32> for KeyValue {
    fn from(value: u32) -> Self {
        KeyValue::Int(i64::from(value))
    }
}

impl From<f64> for KeyValue {
    fn from(value: f64) -> Self {
        KeyValue::Float(value)
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        KeyValue::Str(value.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(value: String) -> Self {
        KeyValue::Str(value)
    }
}

impl From<&String> for KeyValue {
    fn from(value: &String) -> Self {
        KeyValue::Str(value.clone())
    }
}

impl From<Vec<KeyValue>> for KeyValue {
    fn from(value: Vec<KeyValue>) -> Self {
        KeyValue::List(value)
    }
}

impl From<CompositeKey> for KeyValue {
    fn from(value: CompositeKey) -> Self {
        KeyValue::Composite(Box::new(value))
    }
}

impl From<&CompositeKey> for KeyValue {
    fn from(value: &CompositeKey) -> Self {
        KeyValue::Composite(Box::new(value.clone()))
    }
}

// == Options ==
/// Named options accompanying a base key, plus an optional namespace.
///
/// Options are held sorted by name. The namespace is kept apart from the
/// options so it never reaches a value producer as an argument.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Opts {
    namespace: Option<String>,
    values: BTreeMap<String, KeyValue>,
}

impl Opts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an option, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<KeyValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Sets the namespace, builder style.
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Inserts an option, returning the previous value under that name.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<KeyValue>,
    ) -> Option<KeyValue> {
        self.values.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&KeyValue> {
        self.values.get(name)
    }

    /// Returns the named option or fails with [`CacheError::InvalidArguments`].
    pub fn require(&self, name: &str) -> Result<&KeyValue> {
        self.values
            .get(name)
            .ok_or_else(|| CacheError::InvalidArguments(format!("missing option '{name}'")))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// The effective namespace.
    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }

    /// Iterates options in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &KeyValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when there are no options and no explicit namespace.
    pub fn is_empty(&self) -> bool {
        self.namespace.is_none() && self.values.is_empty()
    }

    /// Copy of these options with the namespace stripped.
    pub fn without_namespace(&self) -> Opts {
        Opts {
            namespace: None,
            values: self.values.clone(),
        }
    }
}

// == Composite Key ==
/// Canonical identifier of a cache entry.
///
/// Two composite keys are equal iff namespace, base key and the sorted
/// options are equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CompositeKey {
    namespace: String,
    base_key: KeyValue,
    opts: Vec<(String, KeyValue)>,
}

impl CompositeKey {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn base_key(&self) -> &KeyValue {
        &self.base_key
    }

    /// Options sorted by name.
    pub fn opts(&self) -> &[(String, KeyValue)] {
        &self.opts
    }

    pub fn opt(&self, name: &str) -> Option<&KeyValue> {
        self.opts
            .binary_search_by(|(candidate, _)| candidate.as_str().cmp(name))
            .ok()
            .map(|index| &self.opts[index].1)
    }

    /// Rebuilds the options (namespace included) this key was composed from,
    /// minus any excluded ones.
    pub fn to_opts(&self) -> Opts {
        Opts {
            namespace: Some(self.namespace.clone()),
            values: self.opts.iter().cloned().collect(),
        }
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.base_key)?;
        if !self.opts.is_empty() {
            write!(f, "(")?;
            for (i, (name, value)) in self.opts.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{name}={value}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

// == Key Composer ==
/// Composes [`CompositeKey`]s, dropping options that must not fragment the
/// key space.
#[derive(Debug, Clone, Default)]
pub struct KeyComposer {
    excluded: BTreeSet<String>,
}

impl KeyComposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Composer that leaves the named options out of every key.
    pub fn excluding<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn excluded(&self) -> &BTreeSet<String> {
        &self.excluded
    }

    // == Compose ==
    /// Builds the composite key for `base_key` and `opts`.
    ///
    /// Composing an already composed key with empty options returns it
    /// unchanged.
    pub fn compose(&self, base_key: &KeyValue, opts: &Opts) -> CompositeKey {
        if let KeyValue::Composite(key) = base_key {
            if opts.is_empty() {
                return (**key).clone();
            }
        }

        CompositeKey {
            namespace: opts.namespace().to_string(),
            base_key: base_key.clone(),
            opts: opts
                .values
                .iter()
                .filter(|(name, _)| !self.excluded.contains(*name))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        }
    }
}

/// Composes a key with no excluded options.
pub fn compose(base_key: impl Into<KeyValue>, opts: &Opts) -> CompositeKey {
    KeyComposer::new().compose(&base_key.into(), opts)
}
