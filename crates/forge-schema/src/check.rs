//! Check predicate forms for `check` attributes
//!
//! A check either matches a built value (predicate function, regex pattern,
//! kind, membership, equality) or constrains the shape of an attribute value
//! itself; the latter is how the meta-schema validates schema definitions.

use crate::attr::AttrValue;
use crate::{Error, Result};
use forge_tree::{Value, ValueKind};
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Predicate over a built value.
pub type PredicateFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Declared check semantics.
#[derive(Clone)]
pub enum Check {
    /// User predicate function
    Predicate(PredicateFn),

    /// Regex match against a string value
    Pattern(Regex),

    /// Value classification match (`Int` also satisfies `Float`)
    Kind(ValueKind),

    /// Membership in a literal list
    OneOf(Vec<Value>),

    /// Equality with a literal
    Equals(Value),

    /// Allowed attribute-value shapes
    Shape(Vec<AttrShape>),
}

/// Shape classification of an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrShape {
    Null,
    Bool,
    Int,
    Float,
    Str,
    List,
    Map,
    Object,
    Fn,
    Factory,
    Schema,
    Check,
}

impl AttrShape {
    /// Classify an attribute value.
    pub fn of(attr: &AttrValue) -> Self {
        match attr {
            AttrValue::Value(v) => match v.kind() {
                ValueKind::Null => AttrShape::Null,
                ValueKind::Bool => AttrShape::Bool,
                ValueKind::Int => AttrShape::Int,
                ValueKind::Float => AttrShape::Float,
                ValueKind::Str => AttrShape::Str,
                ValueKind::List => AttrShape::List,
                ValueKind::Map => AttrShape::Map,
                ValueKind::Object => AttrShape::Object,
            },
            AttrValue::Schema(_) => AttrShape::Schema,
            AttrValue::Factory(_) | AttrValue::Builtin(_) => AttrShape::Factory,
            AttrValue::Check(_) => AttrShape::Check,
            AttrValue::Fn(_) => AttrShape::Fn,
        }
    }
}

impl Check {
    /// Wrap a predicate closure.
    pub fn predicate(f: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Check::Predicate(Arc::new(f))
    }

    /// Compile a regex pattern check.
    pub fn pattern(pattern: &str) -> Result<Self> {
        let re = Regex::new(pattern)
            .map_err(|e| Error::Definition(format!("invalid check pattern '{pattern}': {e}")))?;
        Ok(Check::Pattern(re))
    }

    /// Evaluate against a built value.
    pub fn test_value(&self, value: &Value) -> bool {
        match self {
            Check::Predicate(f) => f(value),
            Check::Pattern(re) => value.as_str().is_some_and(|s| re.is_match(s)),
            Check::Kind(kind) => {
                value.kind() == *kind
                    || (*kind == ValueKind::Float && value.kind() == ValueKind::Int)
            }
            Check::OneOf(options) => options.contains(value),
            Check::Equals(expected) => value == expected,
            Check::Shape(shapes) => shapes.contains(&AttrShape::of(&AttrValue::Value(value.clone()))),
        }
    }

    /// Evaluate against an attribute value; non-literal attributes satisfy
    /// only shape checks.
    pub fn test_attr(&self, attr: &AttrValue) -> bool {
        match self {
            Check::Shape(shapes) => shapes.contains(&AttrShape::of(attr)),
            _ => match attr {
                AttrValue::Value(v) => self.test_value(v),
                _ => false,
            },
        }
    }

    /// Normalize a literal check declaration from a file form.
    ///
    /// Maps with a single reserved key select the form: `{pattern: ".."}`,
    /// `{type: "int"}`, `{one_of: [..]}`, `{eq: ..}`. Any other literal is an
    /// equality check.
    pub fn parse(value: &Value) -> Result<Self> {
        if let Value::Map(entries) = value {
            if entries.len() == 1 {
                let (key, inner) = &entries[0];
                match key.as_str() {
                    "pattern" => {
                        let pattern = inner.as_str().ok_or_else(|| {
                            Error::Definition("check pattern must be a string".to_string())
                        })?;
                        return Check::pattern(pattern);
                    }
                    "type" => {
                        let name = inner.as_str().ok_or_else(|| {
                            Error::Definition("check type must be a kind name".to_string())
                        })?;
                        let kind = ValueKind::parse(name).ok_or_else(|| {
                            Error::Definition(format!("unknown check type '{name}'"))
                        })?;
                        return Ok(Check::Kind(kind));
                    }
                    "one_of" => {
                        if let Value::List(options) = inner {
                            return Ok(Check::OneOf(options.clone()));
                        }
                        return Err(Error::Definition(
                            "check one_of must be a list".to_string(),
                        ));
                    }
                    "eq" => return Ok(Check::Equals(inner.clone())),
                    _ => {}
                }
            }
        }
        Ok(Check::Equals(value.clone()))
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::Predicate(_) => write!(f, "Predicate(..)"),
            Check::Pattern(re) => write!(f, "Pattern({:?})", re.as_str()),
            Check::Kind(kind) => write!(f, "Kind({})", kind.name()),
            Check::OneOf(options) => write!(f, "OneOf({options:?})"),
            Check::Equals(v) => write!(f, "Equals({v:?})"),
            Check::Shape(shapes) => write!(f, "Shape({shapes:?})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_check() {
        let check = Check::pattern("^[A-Z]{3}$").unwrap();
        assert!(check.test_value(&Value::Str("EUR".into())));
        assert!(!check.test_value(&Value::Str("euro".into())));
        assert!(!check.test_value(&Value::Int(3)));
    }

    #[test]
    fn test_kind_check_accepts_int_for_float() {
        let check = Check::Kind(ValueKind::Float);
        assert!(check.test_value(&Value::Int(2)));
        assert!(check.test_value(&Value::Float(2.5)));
        assert!(!check.test_value(&Value::Str("2".into())));
    }

    #[test]
    fn test_one_of_and_equality() {
        let one_of = Check::OneOf(vec![Value::Str("a".into()), Value::Str("b".into())]);
        assert!(one_of.test_value(&Value::Str("a".into())));
        assert!(!one_of.test_value(&Value::Str("c".into())));

        let eq = Check::Equals(Value::Int(5));
        assert!(eq.test_value(&Value::Int(5)));
        assert!(!eq.test_value(&Value::Int(6)));
    }

    #[test]
    fn test_shape_check_on_attrs() {
        let check = Check::Shape(vec![AttrShape::Str, AttrShape::Fn]);
        assert!(check.test_attr(&AttrValue::Value(Value::Str("name".into()))));
        assert!(!check.test_attr(&AttrValue::Value(Value::Int(1))));
    }

    #[test]
    fn test_parse_file_forms() {
        let pattern = Check::parse(&Value::Map(vec![(
            "pattern".to_string(),
            Value::Str("^x".to_string()),
        )]))
        .unwrap();
        assert!(matches!(pattern, Check::Pattern(_)));

        let kind = Check::parse(&Value::Map(vec![(
            "type".to_string(),
            Value::Str("int".to_string()),
        )]))
        .unwrap();
        assert!(kind.test_value(&Value::Int(3)));

        let eq = Check::parse(&Value::Int(7)).unwrap();
        assert!(eq.test_value(&Value::Int(7)));

        assert!(Check::parse(&Value::Map(vec![(
            "pattern".to_string(),
            Value::Str("[".to_string()),
        )]))
        .is_err());
    }
}
