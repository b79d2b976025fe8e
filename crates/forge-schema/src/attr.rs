//! Attribute values on schema nodes and declarations
//!
//! Attribute values are tagged: a plain literal, a direct schema reference,
//! a factory object, a check predicate, or a typed callback. Which variants
//! an attribute accepts depends on its name and is enforced by the
//! meta-schema; interpretation is an explicit match at the point of use.

use crate::callback::{BuiltinFactory, Callback, NodeFactory};
use crate::check::Check;
use crate::tree::SchemaId;
use forge_tree::Value;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// Handle to a registered schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaRef(SchemaId);

impl SchemaRef {
    /// Wrap an arena id.
    pub fn new(id: SchemaId) -> Self {
        Self(id)
    }

    /// The underlying arena id.
    pub fn id(self) -> SchemaId {
        self.0
    }
}

/// One attribute value.
#[derive(Clone)]
pub enum AttrValue {
    /// Literal data; strings double as named references where the
    /// attribute calls for one
    Value(Value),

    /// Direct reference to a registered schema
    Schema(SchemaRef),

    /// Constructor-capable factory object
    Factory(Arc<dyn NodeFactory>),

    /// Built-in construction strategy marker
    Builtin(BuiltinFactory),

    /// Check predicate forms
    Check(Check),

    /// Typed callback (default producer, setter, accessor, adder, ...)
    Fn(Callback),
}

impl AttrValue {
    /// Borrow the literal value, if this is one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            AttrValue::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow the literal string, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    /// Short description of the variant for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            AttrValue::Value(v) => format!("{} value", v.kind().name()),
            AttrValue::Schema(_) => "schema reference".to_string(),
            AttrValue::Factory(_) => "factory".to_string(),
            AttrValue::Builtin(b) => format!("builtin {b:?} factory"),
            AttrValue::Check(_) => "check".to_string(),
            AttrValue::Fn(cb) => format!("{} function", cb.describe()),
        }
    }
}

impl fmt::Debug for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Value(v) => write!(f, "Value({v:?})"),
            AttrValue::Schema(r) => write!(f, "Schema({r:?})"),
            AttrValue::Factory(_) => write!(f, "Factory(..)"),
            AttrValue::Builtin(b) => write!(f, "Builtin({b:?})"),
            AttrValue::Check(c) => write!(f, "Check({c:?})"),
            AttrValue::Fn(cb) => write!(f, "Fn({})", cb.describe()),
        }
    }
}

impl From<Value> for AttrValue {
    fn from(v: Value) -> Self {
        AttrValue::Value(v)
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Value(Value::from(s))
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        AttrValue::Value(Value::Int(i))
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Value(Value::Bool(b))
    }
}

impl From<SchemaRef> for AttrValue {
    fn from(r: SchemaRef) -> Self {
        AttrValue::Schema(r)
    }
}

impl From<BuiltinFactory> for AttrValue {
    fn from(b: BuiltinFactory) -> Self {
        AttrValue::Builtin(b)
    }
}

impl From<Check> for AttrValue {
    fn from(c: Check) -> Self {
        AttrValue::Check(c)
    }
}

impl From<Callback> for AttrValue {
    fn from(cb: Callback) -> Self {
        AttrValue::Fn(cb)
    }
}

impl From<Arc<dyn NodeFactory>> for AttrValue {
    fn from(fac: Arc<dyn NodeFactory>) -> Self {
        AttrValue::Factory(fac)
    }
}

// Files carry literal data only; callables are registered programmatically.
impl<'de> Deserialize<'de> for AttrValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(AttrValue::Value(Value::deserialize(deserializer)?))
    }
}

/// Insertion-ordered attribute map.
#[derive(Debug, Clone, Default)]
pub struct Attrs(Vec<(String, AttrValue)>);

impl Attrs {
    /// Create an empty map.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no attributes are present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Look up an attribute by name.
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Check for an attribute without borrowing it.
    pub fn has(&self, name: &str) -> bool {
        self.0.iter().any(|(k, _)| k == name)
    }

    /// Insert or replace an attribute, keeping its position on replace.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| *k == name) {
            slot.1 = value;
        } else {
            self.0.push((name, value));
        }
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Union with `overlay` winning on name collisions.
    #[must_use]
    pub fn overlaid_with(&self, overlay: &Attrs) -> Attrs {
        let mut merged = self.clone();
        for (name, value) in &overlay.0 {
            merged.insert(name.clone(), value.clone());
        }
        merged
    }
}

struct AttrsVisitor;

impl<'de> Visitor<'de> for AttrsVisitor {
    type Value = Attrs;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of attribute names to values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Attrs, A::Error> {
        let mut attrs = Attrs::new();
        while let Some((name, value)) = map.next_entry::<String, AttrValue>()? {
            attrs.insert(name, value);
        }
        Ok(attrs)
    }
}

impl<'de> Deserialize<'de> for Attrs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(AttrsVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_overlay() {
        let base = Attrs::new().with("a", 1i64).with("b", "x");
        let overlay = Attrs::new().with("b", "y").with("c", true);
        let merged = base.overlaid_with(&overlay);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged.get("a").and_then(AttrValue::as_value), Some(&Value::Int(1)));
        assert_eq!(merged.get("b").and_then(|v| v.as_str()), Some("y"));
        assert_eq!(
            merged.get("c").and_then(AttrValue::as_value),
            Some(&Value::Bool(true))
        );
        // base entry keeps its position on override
        let names: Vec<&str> = merged.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_deserialize_from_yaml() {
        let attrs: Attrs = serde_yaml::from_str("req: true\nmin: 2\n").unwrap();
        assert_eq!(
            attrs.get("req").and_then(AttrValue::as_value),
            Some(&Value::Bool(true))
        );
        assert_eq!(
            attrs.get("min").and_then(AttrValue::as_value),
            Some(&Value::Int(2))
        );
    }
}
