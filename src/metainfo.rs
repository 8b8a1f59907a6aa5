//! Tagged scalar key/value sets attached to the engine, fields, and savepoints.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::{Result, SerError};

/// A single metainfo value. Replaces the boost::any the reference
/// implementation carries with a closed, explicitly matched tag set.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Double(f64),
    String(String),
}

impl MetaValue {
    /// Rank used for cross-type comparisons: bool < int < float < double < string.
    fn type_rank(&self) -> u8 {
        match self {
            MetaValue::Bool(_) => 0,
            MetaValue::Int(_) => 1,
            MetaValue::Float(_) => 2,
            MetaValue::Double(_) => 3,
            MetaValue::String(_) => 4,
        }
    }

    /// Type code as returned by `MetainfoSet::types`: -1 bool, -2 int, -3
    /// float, -4 double, non-negative = string length.
    fn type_code(&self) -> i64 {
        match self {
            MetaValue::Bool(_) => -1,
            MetaValue::Int(_) => -2,
            MetaValue::Float(_) => -3,
            MetaValue::Double(_) => -4,
            MetaValue::String(s) => s.len() as i64,
        }
    }

    fn compare(&self, other: &MetaValue) -> Ordering {
        match (self, other) {
            (MetaValue::Bool(a), MetaValue::Bool(b)) => a.cmp(b),
            (MetaValue::Int(a), MetaValue::Int(b)) => a.cmp(b),
            (MetaValue::Float(a), MetaValue::Float(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (MetaValue::Double(a), MetaValue::Double(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (MetaValue::String(a), MetaValue::String(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }

    fn display(&self) -> String {
        match self {
            MetaValue::Bool(b) => b.to_string(),
            MetaValue::Int(i) => i.to_string(),
            MetaValue::Float(f) => f.to_string(),
            MetaValue::Double(d) => d.to_string(),
            MetaValue::String(s) => s.clone(),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            MetaValue::Bool(b) => Value::Bool(*b),
            MetaValue::Int(i) => Value::from(*i),
            MetaValue::Float(f) => Value::from(*f as f64),
            MetaValue::Double(d) => Value::from(*d),
            MetaValue::String(s) => Value::String(s.clone()),
        }
    }
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self {
        MetaValue::Bool(v)
    }
}
impl From<i32> for MetaValue {
    fn from(v: i32) -> Self {
        MetaValue::Int(v)
    }
}
impl From<f32> for MetaValue {
    fn from(v: f32) -> Self {
        MetaValue::Float(v)
    }
}
impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        MetaValue::Double(v)
    }
}
impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        MetaValue::String(v)
    }
}
impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        MetaValue::String(v.to_string())
    }
}

/// Backs `MetainfoSet::extract<T>`: each supported scalar type knows how to
/// pull itself out of a `MetaValue`, returning `None` on a tag mismatch
/// rather than coercing (coercion is the `as_*` accessors' job).
pub trait MetaExtract: Sized {
    fn from_value(value: &MetaValue) -> Option<Self>;
}

impl MetaExtract for bool {
    fn from_value(value: &MetaValue) -> Option<Self> {
        match value {
            MetaValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl MetaExtract for i32 {
    fn from_value(value: &MetaValue) -> Option<Self> {
        match value {
            MetaValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl MetaExtract for f32 {
    fn from_value(value: &MetaValue) -> Option<Self> {
        match value {
            MetaValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl MetaExtract for f64 {
    fn from_value(value: &MetaValue) -> Option<Self> {
        match value {
            MetaValue::Double(d) => Some(*d),
            _ => None,
        }
    }
}

impl MetaExtract for String {
    fn from_value(value: &MetaValue) -> Option<Self> {
        match value {
            MetaValue::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

/// An ordered key/value set of [`MetaValue`]s. Iteration order is the keys'
/// natural string order, which the JSON view and the `Ord` impl both depend
/// on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetainfoSet {
    data: BTreeMap<String, MetaValue>,
}

impl MetainfoSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Inserts a new key. Fails if the key already exists.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Result<()> {
        let key = key.into();
        if self.data.contains_key(&key) {
            return Err(SerError::DuplicateKey(key));
        }
        self.data.insert(key, value.into());
        Ok(())
    }

    /// Inserts or overwrites a node parsed from JSON, used while importing
    /// an index file. Numbers without a fractional part become `Int`, the
    /// rest become `Double`, matching `MetainfoSet::AddNode`.
    pub fn add_from_json(&mut self, key: &str, value: &Value) -> Result<()> {
        let parsed = match value {
            Value::Bool(b) => MetaValue::Bool(*b),
            Value::String(s) => MetaValue::String(s.clone()),
            Value::Number(n) => {
                let f = n.as_f64().ok_or_else(|| SerError::ParseError(key.to_string()))?;
                if f.fract() == 0.0 && f.is_finite() && (i32::MIN as f64..=i32::MAX as f64).contains(&f) {
                    MetaValue::Int(f as i32)
                } else {
                    MetaValue::Double(f)
                }
            }
            _ => return Err(SerError::ParseError(key.to_string())),
        };
        self.data.insert(key.to_string(), parsed);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<&MetaValue> {
        self.data.get(key).ok_or_else(|| SerError::MissingKey(key.to_string()))
    }

    /// Non-coercing typed retrieval, mirroring the reference's
    /// `MetainfoSet::ExtractValue<T>`. Fails with `TypeMismatch` if the
    /// stored tag does not match `T`, or `MissingKey` if `key` is absent.
    /// Unlike the `as_*` accessors, this never converts between tags.
    pub fn extract<T: MetaExtract>(&self, key: &str) -> Result<T> {
        let value = self.get(key)?;
        T::from_value(value).ok_or_else(|| SerError::TypeMismatch { key: key.to_string() })
    }

    pub fn keys(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }

    pub fn types(&self) -> Vec<i64> {
        self.data.values().map(MetaValue::type_code).collect()
    }

    pub fn as_bool(&self, key: &str) -> Result<bool> {
        Ok(match self.get(key)? {
            MetaValue::Bool(b) => *b,
            MetaValue::Int(i) => *i != 0,
            MetaValue::Float(f) => *f != 0.0,
            MetaValue::Double(d) => *d != 0.0,
            MetaValue::String(s) => s.parse().map_err(|_| SerError::ParseError(key.to_string()))?,
        })
    }

    pub fn as_int(&self, key: &str) -> Result<i32> {
        Ok(match self.get(key)? {
            MetaValue::Bool(b) => *b as i32,
            MetaValue::Int(i) => *i,
            MetaValue::Float(f) => {
                if f.fract() == 0.0 {
                    *f as i32
                } else {
                    return Err(SerError::NotExact(key.to_string()));
                }
            }
            MetaValue::Double(d) => {
                if d.fract() == 0.0 {
                    *d as i32
                } else {
                    return Err(SerError::NotExact(key.to_string()));
                }
            }
            MetaValue::String(s) => s.parse().map_err(|_| SerError::ParseError(key.to_string()))?,
        })
    }

    pub fn as_float(&self, key: &str) -> Result<f32> {
        Ok(match self.get(key)? {
            MetaValue::Bool(b) => *b as i32 as f32,
            MetaValue::Int(i) => *i as f32,
            MetaValue::Float(f) => *f,
            MetaValue::Double(d) => *d as f32,
            MetaValue::String(s) => s.parse().map_err(|_| SerError::ParseError(key.to_string()))?,
        })
    }

    pub fn as_double(&self, key: &str) -> Result<f64> {
        Ok(match self.get(key)? {
            MetaValue::Bool(b) => *b as i32 as f64,
            MetaValue::Int(i) => *i as f64,
            MetaValue::Float(f) => *f as f64,
            MetaValue::Double(d) => *d,
            MetaValue::String(s) => s.parse().map_err(|_| SerError::ParseError(key.to_string()))?,
        })
    }

    pub fn as_string(&self, key: &str) -> Result<String> {
        Ok(self.get(key)?.display())
    }

    /// Human-readable `[ key=value key=value ]` form used in diagnostics.
    pub fn to_display_string(&self) -> String {
        let mut out = String::from("[ ");
        for (k, v) in &self.data {
            out.push_str(k);
            out.push('=');
            if let MetaValue::String(s) = v {
                out.push('"');
                out.push_str(s);
                out.push('"');
            } else {
                out.push_str(&v.display());
            }
            out.push(' ');
        }
        out.push(']');
        out
    }

    /// Emits one JSON key/value pair per entry into the given map.
    pub fn write_into(&self, map: &mut Map<String, Value>) {
        for (k, v) in &self.data {
            map.insert(k.clone(), v.to_json());
        }
    }

    /// Reads every non-reserved (not `__`-prefixed) key from the map into
    /// this set, clearing it first.
    pub fn read_from(&mut self, map: &Map<String, Value>) -> Result<()> {
        self.clear();
        for (k, v) in map {
            if k.starts_with("__") {
                continue;
            }
            self.add_from_json(k, v)?;
        }
        Ok(())
    }
}

impl PartialOrd for MetainfoSet {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for MetainfoSet {}

impl Ord for MetainfoSet {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.data.len() != other.data.len() {
            return self.data.len().cmp(&other.data.len());
        }
        for (a, b) in self.data.iter().zip(other.data.iter()) {
            if a.0 != b.0 {
                return a.0.cmp(b.0);
            }
            let c = a.1.compare(b.1);
            if c != Ordering::Equal {
                return c;
            }
        }
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_key_rejected() {
        let mut m = MetainfoSet::new();
        m.add("a", 1i32).unwrap();
        assert!(matches!(m.add("a", 2i32), Err(SerError::DuplicateKey(_))));
    }

    #[test]
    fn coercion_bool_from_int() {
        let mut m = MetainfoSet::new();
        m.add("a", 3i32).unwrap();
        assert!(m.as_bool("a").unwrap());
    }

    #[test]
    fn coercion_int_from_inexact_float_fails() {
        let mut m = MetainfoSet::new();
        m.add("a", 3.5f64).unwrap();
        assert!(matches!(m.as_int("a"), Err(SerError::NotExact(_))));
    }

    #[test]
    fn ordering_ladder_cross_type() {
        let mut a = MetainfoSet::new();
        a.add("k", true).unwrap();
        let mut b = MetainfoSet::new();
        b.add("k", 1i32).unwrap();
        assert!(a < b);
    }

    #[test]
    fn ordering_by_size_first() {
        let mut a = MetainfoSet::new();
        a.add("k", 1i32).unwrap();
        let mut b = MetainfoSet::new();
        b.add("k", 1i32).unwrap();
        b.add("j", 2i32).unwrap();
        assert!(a < b);
    }

    #[test]
    fn extract_matching_tag_succeeds() {
        let mut m = MetainfoSet::new();
        m.add("a", 3i32).unwrap();
        assert_eq!(m.extract::<i32>("a").unwrap(), 3);
    }

    #[test]
    fn extract_mismatched_tag_fails() {
        let mut m = MetainfoSet::new();
        m.add("a", 3i32).unwrap();
        assert!(matches!(m.extract::<f64>("a"), Err(SerError::TypeMismatch { .. })));
        // Unlike as_bool, extract never coerces int -> bool either.
        assert!(matches!(m.extract::<bool>("a"), Err(SerError::TypeMismatch { .. })));
    }

    #[test]
    fn extract_missing_key_fails() {
        let m = MetainfoSet::new();
        assert!(matches!(m.extract::<i32>("missing"), Err(SerError::MissingKey(_))));
    }

    #[test]
    fn keys_are_sorted() {
        let mut m = MetainfoSet::new();
        m.add("z", 1i32).unwrap();
        m.add("a", 2i32).unwrap();
        assert_eq!(m.keys(), vec!["a".to_string(), "z".to_string()]);
    }
}
