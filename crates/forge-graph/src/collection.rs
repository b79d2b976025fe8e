//! Collection binding semantics
//!
//! A collection binding names where added children land on the parent
//! object and how: a materialized list or map field, a named field, a live
//! accessor, or a registered adder. Cardinality checks and defaults read
//! the same attributes when the owning node completes.

use crate::{Error, Result};
use forge_schema::{AttrValue, Attrs, Callback, CallbackError};
use forge_tree::Value;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Make sure the backing collection exists on the parent.
///
/// Field-backed collections materialize an empty list, or an empty map for
/// keyed bindings, so an untouched collection reads as size zero. Bindings
/// with an `add` mutator manage their own storage and are left alone.
pub(crate) fn ensure_container(
    attrs: &Attrs,
    name: &str,
    path: &str,
    parent: &mut Value,
) -> Result<()> {
    if attrs.has("add") {
        return Ok(());
    }
    resolve_slot(attrs, name, path, parent).map(|_| ())
}

/// Attach one built child to the parent's collection.
pub(crate) fn add_child(
    attrs: &Attrs,
    name: &str,
    path: &str,
    parent: &mut Value,
    child: Value,
    callbacks: &HashMap<String, Callback>,
) -> Result<()> {
    if let Some(add) = attrs.get("add") {
        return add_via_callback(attrs, path, parent, child, add, callbacks);
    }

    let slot = resolve_slot(attrs, name, path, parent)?;
    if let Value::List(items) = &mut *slot {
        items.push(child);
        trace!("Added child to collection at {}", path);
        return Ok(());
    }
    if matches!(&*slot, Value::Map(_)) {
        let key = extract_key(attrs, path, &child)?;
        let rendered = render_key(path, &key)?;
        slot.insert(rendered, child);
        trace!("Added keyed child to collection at {}", path);
        return Ok(());
    }
    Err(violation(
        path,
        format!("collection holds a {}, not a list or map", slot.kind().name()),
    ))
}

fn add_via_callback(
    attrs: &Attrs,
    path: &str,
    parent: &mut Value,
    child: Value,
    add: &AttrValue,
    callbacks: &HashMap<String, Callback>,
) -> Result<()> {
    let callback = match add {
        AttrValue::Fn(cb) => cb,
        AttrValue::Value(Value::Str(name)) => callbacks
            .get(name)
            .ok_or_else(|| violation(path, format!("adder '{name}' is not registered")))?,
        other => {
            return Err(violation(
                path,
                format!(
                    "'add' attribute must be an adder function or registered name, got {}",
                    other.describe()
                ),
            ));
        }
    };

    match (callback, attrs.has("key")) {
        (Callback::Add(f), false) => {
            f(parent, child).map_err(|e| callback_failed(path, "adder failed", e))
        }
        (Callback::AddKeyed(f), true) => {
            let key = extract_key(attrs, path, &child)?;
            f(parent, key, child).map_err(|e| callback_failed(path, "adder failed", e))
        }
        (Callback::Add(_), true) => {
            Err(violation(path, "a keyed collection requires a keyed adder"))
        }
        (Callback::AddKeyed(_), false) => {
            Err(violation(path, "a keyed adder requires a key attribute"))
        }
        (other, _) => Err(violation(
            path,
            format!("registered callback is a {}, not an adder", other.describe()),
        )),
    }
}

/// Locate the live collection value for a binding.
fn resolve_slot<'a>(
    attrs: &Attrs,
    name: &str,
    path: &str,
    parent: &'a mut Value,
) -> Result<&'a mut Value> {
    match attrs.get("collection") {
        None => field_slot(attrs, name, path, parent),
        Some(AttrValue::Value(Value::Str(field))) => field_slot(attrs, field, path, parent),
        Some(AttrValue::Fn(Callback::Accessor(accessor))) => match accessor(parent) {
            Ok(Some(slot)) => Ok(slot),
            Ok(None) => Err(violation(path, "collection accessor yielded no collection")),
            Err(e) => Err(callback_failed(path, "collection accessor failed", e)),
        },
        Some(other) => Err(violation(
            path,
            format!(
                "'collection' attribute must be a field name or accessor function, got {}",
                other.describe()
            ),
        )),
    }
}

fn field_slot<'a>(
    attrs: &Attrs,
    field: &str,
    path: &str,
    parent: &'a mut Value,
) -> Result<&'a mut Value> {
    let kind = parent.kind();
    if parent.get(field).is_none() {
        let fresh = if attrs.has("key") {
            Value::Map(Vec::new())
        } else {
            Value::List(Vec::new())
        };
        if !parent.insert(field, fresh) {
            return Err(violation(
                path,
                format!("cannot hold a collection on a {} value", kind.name()),
            ));
        }
    }
    parent.get_mut(field).ok_or_else(|| {
        violation(
            path,
            format!("cannot hold a collection on a {} value", kind.name()),
        )
    })
}

/// Compute the key for one added child.
fn extract_key(attrs: &Attrs, path: &str, child: &Value) -> Result<Value> {
    match attrs.get("key") {
        Some(AttrValue::Fn(Callback::Key(f))) => {
            f(child).map_err(|e| callback_failed(path, "key extractor failed", e))
        }
        Some(AttrValue::Value(Value::Str(prop))) => child.get(prop).cloned().ok_or_else(|| {
            violation(
                path,
                format!("key property '{prop}' is missing on the added node"),
            )
        }),
        Some(other) => Err(violation(
            path,
            format!(
                "'key' attribute must be a property name or key function, got {}",
                other.describe()
            ),
        )),
        None => Err(violation(path, "map collection requires a key attribute")),
    }
}

fn render_key(path: &str, key: &Value) -> Result<String> {
    match key {
        Value::Str(s) => Ok(s.clone()),
        Value::Int(i) => Ok(i.to_string()),
        other => Err(violation(
            path,
            format!("key value of kind {} is not supported", other.kind().name()),
        )),
    }
}

/// Current size of the collection, when one can be determined.
///
/// A `size` attribute wins: a function is asked directly, a property name
/// is read off the parent. Without one, the backing list or map is counted;
/// adder-managed storage reports no size.
pub(crate) fn size(
    attrs: &Attrs,
    name: &str,
    path: &str,
    parent: &mut Value,
) -> Result<Option<usize>> {
    match attrs.get("size") {
        Some(AttrValue::Fn(Callback::Size(f))) => {
            f(&*parent).map_err(|e| callback_failed(path, "size extractor failed", e))
        }
        Some(AttrValue::Value(Value::Str(prop))) => size_from_property(path, parent, prop),
        Some(other) => Err(violation(
            path,
            format!(
                "'size' attribute must be a property name or size function, got {}",
                other.describe()
            ),
        )),
        None => {
            if attrs.has("add") {
                return Ok(None);
            }
            let slot = resolve_slot(attrs, name, path, parent)?;
            match &*slot {
                Value::List(items) => Ok(Some(items.len())),
                Value::Map(entries) => Ok(Some(entries.len())),
                other => Err(violation(
                    path,
                    format!("collection holds a {}, not a list or map", other.kind().name()),
                )),
            }
        }
    }
}

fn size_from_property(path: &str, parent: &Value, prop: &str) -> Result<Option<usize>> {
    match parent.get(prop) {
        None => Ok(None),
        Some(Value::Int(n)) => usize::try_from(*n).map(Some).map_err(|_| {
            violation(
                path,
                format!("size property '{prop}' must be a non-negative integer"),
            )
        }),
        Some(other) => Err(violation(
            path,
            format!(
                "size property '{prop}' holds a {}, not an integer",
                other.kind().name()
            ),
        )),
    }
}

/// Apply the binding's default when the collection completed empty.
pub(crate) fn check_def(
    attrs: &Attrs,
    name: &str,
    path: &str,
    parent: &mut Value,
    callbacks: &HashMap<String, Callback>,
) -> Result<()> {
    let Some(def) = attrs.get("def") else {
        return Ok(());
    };
    if size(attrs, name, path, parent)? != Some(0) {
        return Ok(());
    }

    let produced = match def {
        AttrValue::Fn(Callback::Default(f)) => {
            f().map_err(|e| callback_failed(path, "default producer failed", e))?
        }
        AttrValue::Value(v) => v.clone(),
        other => {
            return Err(violation(
                path,
                format!(
                    "'def' attribute must be data or a producer function, got {}",
                    other.describe()
                ),
            ));
        }
    };

    debug!("Applying collection default at {}", path);
    match produced {
        Value::Null => Err(violation(path, "null is not a valid default for a collection")),
        Value::List(items) => {
            for item in items {
                add_child(attrs, name, path, parent, item, callbacks)?;
            }
            Ok(())
        }
        single => add_child(attrs, name, path, parent, single, callbacks),
    }
}

/// Enforce the binding's `min`/`max` cardinality bounds.
pub(crate) fn check_size(attrs: &Attrs, name: &str, path: &str, parent: &mut Value) -> Result<()> {
    let min = attrs
        .get("min")
        .and_then(AttrValue::as_value)
        .and_then(Value::as_int);
    let max = attrs
        .get("max")
        .and_then(AttrValue::as_value)
        .and_then(Value::as_int);
    if min.is_none() && max.is_none() {
        return Ok(());
    }

    let Some(current) = size(attrs, name, path, parent)? else {
        return Ok(());
    };
    let current = i64::try_from(current).unwrap_or(i64::MAX);

    if let Some(min) = min {
        if min > 0 && current < min {
            return Err(violation(
                path,
                format!("min check failed: size {current} is below the minimum of {min}"),
            ));
        }
    }
    if let Some(max) = max {
        if current > max {
            return Err(violation(
                path,
                format!("max check failed: size {current} exceeds the maximum of {max}"),
            ));
        }
    }
    Ok(())
}

fn violation(path: &str, reason: impl Into<String>) -> Error {
    Error::Collection {
        path: path.to_string(),
        reason: reason.into(),
        source: None,
    }
}

fn callback_failed(path: &str, reason: &str, source: CallbackError) -> Error {
    Error::Collection {
        path: path.to_string(),
        reason: reason.to_string(),
        source: Some(source),
    }
}
