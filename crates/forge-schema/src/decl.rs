//! Declaration stream model
//!
//! A `Decl` is one node of the declaration stream: a name, attributes in
//! written order, an optional value, and child declarations. Schema
//! definitions and object builds both consume this shape.

use crate::attr::{AttrValue, Attrs};
use crate::{Error, Result};
use forge_tree::Value;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// One declared node.
#[derive(Debug, Clone, Deserialize)]
pub struct Decl {
    /// Declared node name
    pub name: String,

    /// Declared attributes
    #[serde(default)]
    pub attrs: Attrs,

    /// Declaration value, when one was supplied
    #[serde(default)]
    pub value: Option<Value>,

    /// Child declarations, in written order
    #[serde(default)]
    pub children: Vec<Decl>,
}

impl Decl {
    /// Start a declaration with the given name.
    pub fn node(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Attrs::new(),
            value: None,
            children: Vec::new(),
        }
    }

    /// Add an attribute.
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Set the declaration value.
    #[must_use]
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Append a child declaration.
    #[must_use]
    pub fn child(mut self, child: Decl) -> Self {
        self.children.push(child);
        self
    }

    /// Parse a single declaration from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Decl> {
        serde_yaml::from_str(yaml).map_err(|e| Error::Parse(format!("YAML parse error: {}", e)))
    }

    /// Parse a single declaration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Decl> {
        serde_json::from_str(json).map_err(|e| Error::Parse(format!("JSON parse error: {}", e)))
    }

    /// Parse a list of declarations from a YAML string.
    pub fn many_from_yaml_str(yaml: &str) -> Result<Vec<Decl>> {
        serde_yaml::from_str(yaml).map_err(|e| Error::Parse(format!("YAML parse error: {}", e)))
    }

    /// Parse a list of declarations from a JSON string.
    pub fn many_from_json_str(json: &str) -> Result<Vec<Decl>> {
        serde_json::from_str(json).map_err(|e| Error::Parse(format!("JSON parse error: {}", e)))
    }

    /// Load a single declaration from a YAML or JSON file.
    pub fn from_file(path: &Path) -> Result<Decl> {
        debug!("Loading declaration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;

        if is_yaml(path) {
            Self::from_yaml_str(&content)
        } else {
            Self::from_json_str(&content)
        }
    }

    /// Load a list of declarations from a YAML or JSON file.
    pub fn many_from_file(path: &Path) -> Result<Vec<Decl>> {
        debug!("Loading declarations from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;

        if is_yaml(path) {
            Self::many_from_yaml_str(&content)
        } else {
            Self::many_from_json_str(&content)
        }
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_api() {
        let decl = Decl::node("invoice")
            .attr("date", "2024-01-15")
            .child(Decl::node("items").child(Decl::node("item").attr("qty", 1)));

        assert_eq!(decl.name, "invoice");
        assert!(decl.attrs.has("date"));
        assert_eq!(decl.children.len(), 1);
        assert_eq!(decl.children[0].children[0].name, "item");
    }

    #[test]
    fn test_from_yaml_str() {
        let yaml = r#"
name: invoice
attrs:
  date: 2024-01-15
children:
  - name: items
    children:
      - name: item
        attrs:
          qty: 1
"#;
        let decl = Decl::from_yaml_str(yaml).unwrap();
        assert_eq!(decl.name, "invoice");
        assert_eq!(
            decl.attrs.get("date").and_then(AttrValue::as_str),
            Some("2024-01-15")
        );
        assert_eq!(decl.children[0].children[0].name, "item");
        assert!(decl.children[0].children[0].attrs.has("qty"));
    }

    #[test]
    fn test_from_json_str_with_value() {
        let json = r#"{"name": "qty", "value": 5}"#;
        let decl = Decl::from_json_str(json).unwrap();
        assert_eq!(decl.name, "qty");
        assert_eq!(decl.value, Some(Value::Int(5)));
        assert!(decl.children.is_empty());
    }

    #[test]
    fn test_many_from_yaml_str() {
        let yaml = r#"
- name: first
- name: second
  attrs:
    x: 1
"#;
        let decls = Decl::many_from_yaml_str(yaml).unwrap();
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].name, "first");
        assert!(decls[1].attrs.has("x"));
    }

    #[test]
    fn test_from_yaml_str_invalid() {
        let result = Decl::from_yaml_str("name: [");
        assert!(result.is_err());
        match result.unwrap_err() {
            Error::Parse(_) => (),
            e => panic!("Expected Parse error, got {:?}", e),
        }
    }
}
