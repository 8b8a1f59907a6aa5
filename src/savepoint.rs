//! Savepoints: named, metainfo-tagged index keys into the offset table.

use std::cmp::Ordering;
use std::fmt;

use serde_json::{Map, Value};

use crate::error::{Result, SerError};
use crate::metainfo::MetainfoSet;

/// A labeled point in a simulation run, identified by a name plus an
/// attached metainfo set (e.g. a time step number).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Savepoint {
    pub name: String,
    pub metainfo: MetainfoSet,
}

impl Savepoint {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), metainfo: MetainfoSet::new() }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<crate::metainfo::MetaValue>) -> Self {
        self.metainfo.add(key, value).expect("builder usage adds distinct keys");
        self
    }

    pub fn to_json(&self, id: Option<usize>) -> Value {
        let mut map = Map::new();
        map.insert("__name".into(), Value::String(self.name.clone()));
        if let Some(id) = id {
            map.insert("__id".into(), Value::from(id as u64));
        }
        self.metainfo.write_into(&mut map);
        Value::Object(map)
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| SerError::MalformedIndex("savepoint is not an object".into()))?;
        let name = map
            .get("__name")
            .and_then(Value::as_str)
            .ok_or_else(|| SerError::MalformedIndex("savepoint node does not have a name".into()))?
            .to_string();
        let mut metainfo = MetainfoSet::new();
        metainfo.read_from(map)?;
        Ok(Self { name, metainfo })
    }
}

impl fmt::Display for Savepoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.metainfo.to_display_string())
    }
}

impl PartialOrd for Savepoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Name first, then metainfo. The distilled metainfo-only ordering
/// description is really the metainfo's own `Ord`; following it alone would
/// make two differently-named savepoints with equal metainfo compare equal
/// under `Ord` while `PartialEq` says they differ, which would corrupt the
/// `BTreeMap<Savepoint, _>` index. See DESIGN.md.
impl Ord for Savepoint {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.name.cmp(&other.name) {
            Ordering::Equal => self.metainfo.cmp(&other.metainfo),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_structural() {
        let a = Savepoint::new("t").with_meta("step", 1i32);
        let b = Savepoint::new("t").with_meta("step", 1i32);
        assert_eq!(a, b);
    }

    #[test]
    fn ordering_is_name_first() {
        let a = Savepoint::new("a").with_meta("step", 99i32);
        let b = Savepoint::new("b").with_meta("step", 0i32);
        assert!(a < b);
    }

    #[test]
    fn json_round_trip() {
        let sp = Savepoint::new("t").with_meta("step", 3i32);
        let json = sp.to_json(Some(2));
        let back = Savepoint::from_json(&json).unwrap();
        assert_eq!(sp, back);
    }

    #[test]
    fn display_matches_name_then_metainfo() {
        let sp = Savepoint::new("t").with_meta("step", 3i32);
        assert_eq!(sp.to_string(), "t[ step=3 ]");
    }
}
