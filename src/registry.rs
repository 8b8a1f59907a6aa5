//! The field registry: the schema of known fields, keyed by name.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::error::{Result, SerError};
use crate::field::FieldDescriptor;

/// Known fields, in natural name order (mirrors the reference's
/// `std::map<std::string, DataFieldInfo>`).
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    fields: BTreeMap<String, FieldDescriptor>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn register(&mut self, descriptor: FieldDescriptor) -> Result<()> {
        if self.fields.contains_key(&descriptor.name) {
            return Err(SerError::AlreadyRegistered(descriptor.name));
        }
        self.fields.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    /// Overwrites an already-registered field's descriptor in place. Used to
    /// attach field-scoped metainfo after registration; shape conflicts are
    /// still the caller's responsibility to have ruled out beforehand.
    pub fn replace(&mut self, descriptor: FieldDescriptor) -> Result<()> {
        if !self.fields.contains_key(&descriptor.name) {
            return Err(SerError::UnknownField(descriptor.name));
        }
        self.fields.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    pub fn find(&self, name: &str) -> Result<&FieldDescriptor> {
        self.fields.get(name).ok_or_else(|| SerError::UnknownField(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.values()
    }

    pub fn names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    pub fn to_json(&self) -> Value {
        let array: Vec<Value> = self
            .fields
            .values()
            .enumerate()
            .map(|(id, descriptor)| descriptor.to_json(Some(id)))
            .collect();
        Value::Array(array)
    }

    pub fn from_json(&mut self, value: &Value) -> Result<()> {
        self.clear();
        let array = value
            .as_array()
            .ok_or_else(|| SerError::MalformedIndex("FieldsTable is not an array".into()))?;
        for node in array {
            let descriptor = FieldDescriptor::from_json(node)?;
            self.register(descriptor)?;
        }
        Ok(())
    }
}

impl fmt::Display for FieldRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "FieldsTable [")?;
        for descriptor in self.fields.values() {
            writeln!(f, "    {}", descriptor)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::DimSpec;

    fn field(name: &str) -> FieldDescriptor {
        let absent = DimSpec::new(1, 0, 0);
        FieldDescriptor::new(name, "int", 4, DimSpec::new(2, 0, 0), absent, absent, absent)
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut r = FieldRegistry::new();
        r.register(field("a")).unwrap();
        assert!(matches!(r.register(field("a")), Err(SerError::AlreadyRegistered(_))));
    }

    #[test]
    fn unknown_field_lookup_fails() {
        let r = FieldRegistry::new();
        assert!(matches!(r.find("missing"), Err(SerError::UnknownField(_))));
    }

    #[test]
    fn json_round_trip_assigns_sequential_ids() {
        let mut r = FieldRegistry::new();
        r.register(field("a")).unwrap();
        r.register(field("b")).unwrap();
        let json = r.to_json();
        let mut r2 = FieldRegistry::new();
        r2.from_json(&json).unwrap();
        assert_eq!(r2.names(), vec!["a".to_string(), "b".to_string()]);
    }
}
