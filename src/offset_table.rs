//! The offset table: the savepoint-indexed record of where field content lives.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde_json::{Map, Value};

use crate::error::{Result, SerError};
use crate::savepoint::Savepoint;

#[derive(Debug, Clone, Default)]
struct OffsetTableEntry {
    fields: BTreeMap<String, (u64, String)>,
}

/// Savepoints in insertion order, each paired with its recorded fields.
/// Mirrors the reference's `std::vector<OffsetTableEntry>` plus a
/// `std::map<Savepoint, int>` index.
#[derive(Debug, Clone, Default)]
pub struct OffsetTable {
    savepoints: Vec<Savepoint>,
    entries: Vec<OffsetTableEntry>,
    index: BTreeMap<Savepoint, usize>,
}

impl OffsetTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.savepoints.clear();
        self.entries.clear();
        self.index.clear();
    }

    pub fn savepoint_id(&self, savepoint: &Savepoint) -> Option<usize> {
        self.index.get(savepoint).copied()
    }

    pub fn savepoints(&self) -> &[Savepoint] {
        &self.savepoints
    }

    /// Appends a new savepoint. If `requested_id` is given, it must equal
    /// the position the savepoint would be assigned.
    pub fn add_savepoint(&mut self, savepoint: Savepoint, requested_id: Option<usize>) -> Result<usize> {
        if self.index.contains_key(&savepoint) {
            return Err(SerError::DuplicateSavepoint(savepoint.to_string()));
        }
        let assigned = self.entries.len();
        if let Some(requested) = requested_id {
            if requested != assigned {
                return Err(SerError::IdMismatch { requested: requested as i64, assigned });
            }
        }
        self.index.insert(savepoint.clone(), assigned);
        self.savepoints.push(savepoint);
        self.entries.push(OffsetTableEntry::default());
        Ok(assigned)
    }

    /// Creates or overwrites the record for `field` at the given savepoint id.
    pub fn add_record(&mut self, savepoint_id: usize, field: &str, offset: u64, checksum: &str) -> Result<()> {
        let entry = self
            .entries
            .get_mut(savepoint_id)
            .ok_or_else(|| SerError::UnknownSavepoint(format!("id {savepoint_id}")))?;
        entry.fields.insert(field.to_string(), (offset, checksum.to_string()));
        Ok(())
    }

    /// Returns the offset for `field` at `savepoint_id`, or `None` if the
    /// field was never serialized at that savepoint.
    pub fn offset(&self, savepoint_id: usize, field: &str) -> Result<Option<u64>> {
        let entry = self
            .entries
            .get(savepoint_id)
            .ok_or_else(|| SerError::UnknownSavepoint(format!("id {savepoint_id}")))?;
        Ok(entry.fields.get(field).map(|(offset, _)| *offset))
    }

    /// Reverse-chronological dedup probe: the offset of the most recently
    /// recorded instance of `field` whose checksum equals `checksum`.
    pub fn already_serialized(&self, field: &str, checksum: &str) -> Option<u64> {
        for entry in self.entries.iter().rev() {
            if let Some((offset, sum)) = entry.fields.get(field) {
                if sum == checksum {
                    return Some(*offset);
                }
            }
        }
        None
    }

    pub fn fields_at(&self, savepoint: &Savepoint) -> Vec<String> {
        match self.savepoint_id(savepoint) {
            Some(id) => self.entries[id].fields.keys().cloned().collect(),
            None => Vec::new(),
        }
    }

    pub fn to_json(&self) -> Value {
        let mut array = Vec::with_capacity(self.savepoints.len());
        for (id, savepoint) in self.savepoints.iter().enumerate() {
            let mut node = savepoint
                .to_json(Some(id))
                .as_object()
                .cloned()
                .unwrap_or_default();
            let mut offsets = Map::new();
            for (name, (offset, checksum)) in &self.entries[id].fields {
                offsets.insert(
                    name.clone(),
                    Value::Array(vec![Value::from(*offset), Value::String(checksum.clone())]),
                );
            }
            node.insert("__offsets".into(), Value::Object(offsets));
            array.push(Value::Object(node));
        }
        Value::Array(array)
    }

    pub fn from_json(&mut self, value: &Value) -> Result<()> {
        self.clear();
        let array = value
            .as_array()
            .ok_or_else(|| SerError::MalformedIndex("OffsetTable is not an array".into()))?;

        for node in array {
            let mut map = node
                .as_object()
                .cloned()
                .ok_or_else(|| SerError::MalformedIndex("offset table entry is not an object".into()))?;

            let id = map
                .remove("__id")
                .and_then(|v| v.as_u64())
                .ok_or_else(|| SerError::MalformedIndex("offset table entry missing __id".into()))?
                as usize;

            // Writers of this crate use "__offsets"; the reference implementation's
            // reader historically looked for "Offsets". Accept either.
            let offsets = map
                .remove("__offsets")
                .or_else(|| map.remove("Offsets"))
                .ok_or_else(|| SerError::MalformedIndex("offset table entry missing offsets".into()))?;
            let offsets = offsets
                .as_object()
                .cloned()
                .ok_or_else(|| SerError::MalformedIndex("offsets node is not an object".into()))?;

            let savepoint = Savepoint::from_json(&Value::Object(map))?;
            self.add_savepoint(savepoint, Some(id))?;

            for (field_name, pair) in offsets {
                let pair = pair
                    .as_array()
                    .ok_or_else(|| SerError::MalformedIndex("offset record is not an array".into()))?;
                let offset = pair
                    .first()
                    .and_then(Value::as_u64)
                    .ok_or_else(|| SerError::MalformedIndex("offset record missing offset".into()))?;
                let checksum = pair
                    .get(1)
                    .and_then(Value::as_str)
                    .ok_or_else(|| SerError::MalformedIndex("offset record missing checksum".into()))?;
                self.add_record(id, &field_name, offset, checksum)?;
            }
        }

        Ok(())
    }
}

impl std::fmt::Display for OffsetTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "OffsetTable {{")?;
        for (id, savepoint) in self.savepoints.iter().enumerate() {
            let mut line = format!("  {}: {}  ( ", id, savepoint);
            for (name, (offset, _)) in &self.entries[id].fields {
                let _ = write!(line, "{}:{} ", name, offset);
            }
            line.push(')');
            writeln!(f, "{}", line)?;
        }
        write!(f, "}}")
    }
}
