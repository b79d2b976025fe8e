//! Schema inheritance
//!
//! A schema extends another through its `schema` attribute, either a
//! registered name or a direct handle. Member lookup walks the chain;
//! merged views collapse a chain's property or collection members into
//! one ordered list, supers first, later links winning per attribute.

use crate::attr::{AttrValue, Attrs};
use crate::registry::SchemaRegistry;
use crate::tree::SchemaId;
use crate::{Error, Result};
use forge_tree::Value;
use std::sync::Arc;
use tracing::trace;

/// Which member container a merged view covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    /// `properties` members
    Properties,

    /// `collections` members
    Collections,
}

impl ViewKind {
    /// Name of the container child holding the members.
    pub fn container_name(self) -> &'static str {
        match self {
            ViewKind::Properties => "properties",
            ViewKind::Collections => "collections",
        }
    }
}

/// One merged member: its name plus attributes unioned across the chain.
#[derive(Debug, Clone)]
pub struct MergedEntry {
    /// Member name
    pub name: String,

    /// Merged attributes, later chain links winning per attribute
    pub attrs: Attrs,
}

/// Ordered members of one container, merged across the chain.
///
/// An overriding member drops the inherited position and appends at the
/// end, so iteration order reflects the most recent declaration.
#[derive(Debug, Clone, Default)]
pub struct MergedView {
    /// Merged members in effective order
    pub entries: Vec<MergedEntry>,
}

impl MergedView {
    /// Find a member by name.
    pub fn find(&self, name: &str) -> Option<&MergedEntry> {
        self.entries.iter().find(|e| e.name == name)
    }
}

/// Resolve a schema reference attribute to an id.
pub fn resolve_ref(registry: &SchemaRegistry, attr: &AttrValue) -> Result<SchemaId> {
    match attr {
        AttrValue::Schema(r) => Ok(r.id()),
        AttrValue::Value(Value::Str(name)) => registry
            .get(name)
            .ok_or_else(|| Error::NotFound(name.clone())),
        other => Err(Error::Definition(format!(
            "schema reference must be a name or schema handle, got {}",
            other.describe()
        ))),
    }
}

/// The super-schema named by a node's `schema` attribute, if any.
pub fn super_schema(registry: &SchemaRegistry, id: SchemaId) -> Result<Option<SchemaId>> {
    match registry.node(id).attrs().get("schema") {
        None => Ok(None),
        Some(attr) => resolve_ref(registry, attr).map(Some),
    }
}

/// Find a named member in one of a schema's containers, searching the
/// super chain when the schema itself has no match.
pub fn find_schema(
    registry: &SchemaRegistry,
    start: SchemaId,
    container: &str,
    name: &str,
) -> Result<Option<SchemaId>> {
    let mut visited = Vec::new();
    let mut cur = Some(start);
    while let Some(id) = cur {
        if visited.contains(&id) {
            return Ok(None);
        }
        visited.push(id);

        if let Some(c) = registry.arena().first_child(id, container) {
            if let Some(found) = registry.arena().first_child(c, name) {
                return Ok(Some(found));
            }
        }
        cur = super_schema(registry, id)?;
    }
    Ok(None)
}

/// Search every collection of a schema for a member with the given name.
///
/// Members of the schema's own collections take priority; each collection's
/// own super chain is searched next, then the schema's super chain.
pub fn find_collection_schema(
    registry: &SchemaRegistry,
    start: SchemaId,
    name: &str,
) -> Result<Option<SchemaId>> {
    let mut visited = Vec::new();
    find_collection_inner(registry, start, name, &mut visited)
}

fn find_collection_inner(
    registry: &SchemaRegistry,
    schema: SchemaId,
    name: &str,
    visited: &mut Vec<SchemaId>,
) -> Result<Option<SchemaId>> {
    if visited.contains(&schema) {
        return Ok(None);
    }
    visited.push(schema);

    if let Some(container) = registry.arena().first_child(schema, "collections") {
        for member in registry.node(container).children() {
            let collection = *member;
            if let Some(found) = registry.arena().first_child(collection, name) {
                return Ok(Some(found));
            }
            if let Some(attr) = registry.node(collection).attrs().get("schema") {
                let extend = resolve_ref(registry, attr)?;
                if let Some(found) = find_collection_inner(registry, extend, name, visited)? {
                    return Ok(Some(found));
                }
            }
        }
    }

    match super_schema(registry, schema)? {
        Some(sup) => find_collection_inner(registry, sup, name, visited),
        None => Ok(None),
    }
}

/// Look up an attribute on a schema, falling back to its super chain.
pub fn find_schema_attribute<'a>(
    registry: &'a SchemaRegistry,
    start: SchemaId,
    name: &str,
) -> Result<Option<&'a AttrValue>> {
    let mut visited = Vec::new();
    let mut cur = Some(start);
    while let Some(id) = cur {
        if visited.contains(&id) {
            return Ok(None);
        }
        visited.push(id);

        if let Some(attr) = registry.node(id).attrs().get(name) {
            return Ok(Some(attr));
        }
        cur = super_schema(registry, id)?;
    }
    Ok(None)
}

/// Merged members of a schema's container, memoized by schema identity.
///
/// A schema that reaches itself through its super chain merges against an
/// empty base, so a self-extending schema sees its own members only.
pub fn merged_view(
    registry: &SchemaRegistry,
    id: SchemaId,
    kind: ViewKind,
) -> Result<Arc<MergedView>> {
    if let Some(view) = registry.merged_cached((id, kind)) {
        return Ok(view);
    }

    let mut visiting = Vec::new();
    let view = Arc::new(merged_view_inner(registry, id, kind, &mut visiting)?);
    registry.merged_store((id, kind), Arc::clone(&view));
    Ok(view)
}

fn merged_view_inner(
    registry: &SchemaRegistry,
    id: SchemaId,
    kind: ViewKind,
    visiting: &mut Vec<SchemaId>,
) -> Result<MergedView> {
    if visiting.contains(&id) {
        return Ok(MergedView::default());
    }
    visiting.push(id);

    let mut entries = match super_schema(registry, id)? {
        Some(sup) => match registry.merged_cached((sup, kind)) {
            Some(view) => view.entries.clone(),
            None => merged_view_inner(registry, sup, kind, visiting)?.entries,
        },
        None => Vec::new(),
    };

    if let Some(container) = registry.arena().first_child(id, kind.container_name()) {
        for member in registry.node(container).children() {
            let node = registry.node(*member);
            overlay(&mut entries, node.name(), node.attrs());
        }
    }

    visiting.pop();
    trace!(
        "Merged {} view of {}: {} entries",
        kind.container_name(),
        registry.arena().fqn(id),
        entries.len()
    );
    Ok(MergedView { entries })
}

fn overlay(entries: &mut Vec<MergedEntry>, name: &str, attrs: &Attrs) {
    match entries.iter().position(|e| e.name == name) {
        Some(pos) => {
            let old = entries.remove(pos);
            entries.push(MergedEntry {
                name: old.name,
                attrs: old.attrs.overlaid_with(attrs),
            });
        }
        None => entries.push(MergedEntry {
            name: name.to_string(),
            attrs: attrs.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{NodeKind, SchemaDraft};

    fn draft_with_members(
        name: &str,
        container: &str,
        members: Vec<SchemaDraft>,
    ) -> SchemaDraft {
        let mut schema = SchemaDraft::new(name, NodeKind::Node);
        let mut holder = SchemaDraft::new(container, NodeKind::Node);
        holder.children = members;
        schema.children.push(holder);
        schema
    }

    fn member(name: &str, attrs: Attrs) -> SchemaDraft {
        let mut m = SchemaDraft::new(name, NodeKind::Node);
        m.attrs = attrs;
        m
    }

    fn create_test_registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();

        let base = draft_with_members(
            "base",
            "properties",
            vec![
                member("a", Attrs::new().with("def", 1)),
                member("b", Attrs::new()),
            ],
        );
        let base_id = registry.intern(base);
        registry.register("base", base_id);

        let mut sub = draft_with_members(
            "sub",
            "properties",
            vec![
                member("b", Attrs::new().with("req", true)),
                member("c", Attrs::new()),
            ],
        );
        sub.attrs = Attrs::new().with("schema", "base");
        let sub_id = registry.intern(sub);
        registry.register("sub", sub_id);

        registry
    }

    #[test]
    fn test_merged_properties_inherit_and_override() {
        let registry = create_test_registry();
        let sub = registry.get("sub").unwrap();

        let view = merged_view(&registry, sub, ViewKind::Properties).unwrap();
        let names: Vec<&str> = view.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        let b = view.find("b").unwrap();
        assert!(b.attrs.has("req"));

        let a = view.find("a").unwrap();
        assert!(a.attrs.has("def"));
    }

    #[test]
    fn test_merged_view_is_memoized() {
        let registry = create_test_registry();
        let sub = registry.get("sub").unwrap();

        let first = merged_view(&registry, sub, ViewKind::Properties).unwrap();
        let second = merged_view(&registry, sub, ViewKind::Properties).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_override_merges_attributes() {
        let mut registry = SchemaRegistry::new();

        let base = draft_with_members(
            "base",
            "properties",
            vec![member("p", Attrs::new().with("def", 1).with("min", 0))],
        );
        let base_id = registry.intern(base);
        registry.register("base", base_id);

        let mut sub = draft_with_members(
            "sub",
            "properties",
            vec![member("p", Attrs::new().with("def", 2))],
        );
        sub.attrs = Attrs::new().with("schema", "base");
        let sub_id = registry.intern(sub);

        let view = merged_view(&registry, sub_id, ViewKind::Properties).unwrap();
        let p = view.find("p").unwrap();
        assert_eq!(p.attrs.get("def").and_then(AttrValue::as_value), Some(&Value::Int(2)));
        assert_eq!(p.attrs.get("min").and_then(AttrValue::as_value), Some(&Value::Int(0)));
    }

    #[test]
    fn test_self_extension_yields_own_members() {
        let mut registry = SchemaRegistry::new();

        let mut schema = draft_with_members(
            "loop",
            "properties",
            vec![member("x", Attrs::new())],
        );
        schema.attrs = Attrs::new().with("schema", "loop");
        let id = registry.intern(schema);
        registry.register("loop", id);

        let view = merged_view(&registry, id, ViewKind::Properties).unwrap();
        assert_eq!(view.entries.len(), 1);
        assert_eq!(view.entries[0].name, "x");
    }

    #[test]
    fn test_find_schema_walks_chain() {
        let mut registry = SchemaRegistry::new();

        let base = draft_with_members(
            "base",
            "collections",
            vec![member("items", Attrs::new())],
        );
        let base_id = registry.intern(base);
        registry.register("base", base_id);

        let mut sub = SchemaDraft::new("sub", NodeKind::Node);
        sub.attrs = Attrs::new().with("schema", "base");
        let sub_id = registry.intern(sub);

        let found = find_schema(&registry, sub_id, "collections", "items").unwrap();
        assert!(found.is_some());
        assert_eq!(registry.node(found.unwrap()).name(), "items");

        let missing = find_schema(&registry, sub_id, "collections", "other").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_find_collection_schema_searches_members() {
        let mut registry = SchemaRegistry::new();

        let mut items = SchemaDraft::new("items", NodeKind::Collection);
        items.children.push(SchemaDraft::new("item", NodeKind::Node));
        let base = draft_with_members("base", "collections", vec![items]);
        let base_id = registry.intern(base);
        registry.register("base", base_id);

        let mut sub = SchemaDraft::new("sub", NodeKind::Node);
        sub.attrs = Attrs::new().with("schema", "base");
        let sub_id = registry.intern(sub);

        let found = find_collection_schema(&registry, sub_id, "item").unwrap();
        assert!(found.is_some());
        assert_eq!(registry.node(found.unwrap()).name(), "item");
    }

    #[test]
    fn test_find_schema_attribute_falls_back() {
        let mut registry = SchemaRegistry::new();

        let mut base = SchemaDraft::new("base", NodeKind::Node);
        base.attrs = Attrs::new().with("factory", "widget");
        let base_id = registry.intern(base);
        registry.register("base", base_id);

        let mut sub = SchemaDraft::new("sub", NodeKind::Node);
        sub.attrs = Attrs::new().with("schema", "base");
        let sub_id = registry.intern(sub);

        let attr = find_schema_attribute(&registry, sub_id, "factory").unwrap();
        assert_eq!(attr.and_then(AttrValue::as_str), Some("widget"));
        assert!(find_schema_attribute(&registry, sub_id, "check")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_resolve_ref_unknown_name_fails() {
        let registry = SchemaRegistry::new();
        let attr = AttrValue::from("missing");
        let result = resolve_ref(&registry, &attr);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
