//! Object-node records produced by the default tree factory

use crate::value::Value;

/// A named record with ordered fields.
///
/// The default construction strategy materializes one of these per declared
/// node; collection-valued fields hold `Value::List` or `Value::Map`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectNode {
    /// Node name from the declaration
    pub name: String,

    /// Ordered field entries; first occurrence of a name is authoritative
    pub fields: Vec<(String, Value)>,
}

impl ObjectNode {
    /// Create an empty record.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Mutable field lookup.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields
            .iter_mut()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Insert or replace a field, keeping its original position on replace.
    pub fn set(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        let name = name.into();
        if let Some(slot) = self.fields.iter_mut().find(|(k, _)| *k == name) {
            slot.1 = value;
        } else {
            self.fields.push((name, value));
        }
        self
    }

    /// Check for a field without borrowing its value.
    pub fn has(&self, name: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == name)
    }

    /// Wrap into a `Value`.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(Box::new(self))
    }
}
