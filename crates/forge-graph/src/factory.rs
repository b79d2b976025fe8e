//! Construction strategy resolution
//!
//! Each schema node may name its construction strategy through a `factory`
//! attribute: a factory object, a function, a built-in marker, or the name
//! of a registered factory. Resolution walks the super chain and is
//! memoized per schema node.

use crate::builder::Built;
use crate::{Error, Result};
use dashmap::DashMap;
use forge_schema::inheritance::find_schema_attribute;
use forge_schema::{
    AttrValue, BuiltinFactory, Callback, Decl, FactoryArgs, NodeFactory, NodeKind, SchemaDraft,
    SchemaId, SchemaRegistry,
};
use forge_tree::{ObjectNode, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A construction strategy ready to run.
#[derive(Clone)]
pub(crate) enum ResolvedFactory {
    Builtin(BuiltinFactory),
    User(Arc<dyn NodeFactory>),
}

/// Per-schema factory resolutions, invalidated on redefinition.
pub(crate) type FactoryMemo = DashMap<SchemaId, Option<ResolvedFactory>>;

/// Resolve the construction strategy for a schema node, if it names one.
pub(crate) fn factory_for(
    registry: &SchemaRegistry,
    callbacks: &HashMap<String, Callback>,
    memo: &FactoryMemo,
    schema: SchemaId,
) -> Result<Option<ResolvedFactory>> {
    if let Some(hit) = memo.get(&schema) {
        return Ok(hit.value().clone());
    }

    let resolved = match find_schema_attribute(registry, schema, "factory")? {
        None => None,
        Some(AttrValue::Factory(f)) => Some(ResolvedFactory::User(Arc::clone(f))),
        Some(AttrValue::Fn(Callback::Factory(f))) => Some(ResolvedFactory::User(Arc::clone(f))),
        Some(AttrValue::Builtin(b)) => Some(ResolvedFactory::Builtin(*b)),
        Some(AttrValue::Value(Value::Str(name))) => match callbacks.get(name) {
            Some(Callback::Factory(f)) => Some(ResolvedFactory::User(Arc::clone(f))),
            Some(other) => {
                return Err(Error::Factory {
                    path: registry.arena().fqn(schema),
                    reason: format!(
                        "registered callback '{name}' is a {}, not a factory",
                        other.describe()
                    ),
                    source: None,
                });
            }
            None => {
                return Err(Error::Factory {
                    path: registry.arena().fqn(schema),
                    reason: format!("factory '{name}' is not registered"),
                    source: None,
                });
            }
        },
        Some(other) => {
            return Err(Error::Factory {
                path: registry.arena().fqn(schema),
                reason: format!(
                    "'factory' attribute must be a factory, function, or registered name, got {}",
                    other.describe()
                ),
                source: None,
            });
        }
    };

    memo.insert(schema, resolved.clone());
    Ok(resolved)
}

/// Run a construction strategy for one declaration.
pub(crate) fn instantiate(factory: &ResolvedFactory, decl: &Decl, path: &str) -> Result<Built> {
    match factory {
        ResolvedFactory::Builtin(BuiltinFactory::Tree) => {
            if decl.children.is_empty() {
                if let Some(value) = &decl.value {
                    return Ok(Built::Value(value.clone()));
                }
            } else if decl.value.is_some() {
                debug!("Ignoring declaration value on branch node {}", path);
            }
            Ok(Built::Value(ObjectNode::new(decl.name.as_str()).into_value()))
        }
        ResolvedFactory::Builtin(BuiltinFactory::Map) => {
            if decl.value.is_some() {
                debug!("Ignoring declaration value on map node {}", path);
            }
            Ok(Built::Value(Value::Map(Vec::new())))
        }
        ResolvedFactory::Builtin(BuiltinFactory::SchemaNode) => Ok(Built::Draft(
            SchemaDraft::new(decl.name.as_str(), NodeKind::Node),
        )),
        ResolvedFactory::Builtin(BuiltinFactory::CollectionNode) => Ok(Built::Draft(
            SchemaDraft::new(decl.name.as_str(), NodeKind::Collection),
        )),
        ResolvedFactory::User(factory) => {
            let value = factory
                .create(FactoryArgs {
                    name: &decl.name,
                    value: decl.value.as_ref(),
                    attrs: &decl.attrs,
                })
                .map_err(|e| Error::Factory {
                    path: path.to_string(),
                    reason: "construction strategy failed".to_string(),
                    source: Some(e),
                })?;
            Ok(Built::Value(value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_schema::{factory_fn, Attrs};

    fn create_test_registry(attrs: Attrs) -> (SchemaRegistry, SchemaId) {
        let mut registry = SchemaRegistry::new();
        let mut draft = SchemaDraft::new("widget", NodeKind::Node);
        draft.attrs = attrs;
        let id = registry.intern(draft);
        registry.register("widget", id);
        (registry, id)
    }

    #[test]
    fn test_no_attribute_resolves_none() {
        let (registry, id) = create_test_registry(Attrs::new());
        let memo = FactoryMemo::new();

        let resolved = factory_for(&registry, &HashMap::new(), &memo, id).unwrap();
        assert!(resolved.is_none());
    }

    #[test]
    fn test_builtin_attribute() {
        let (registry, id) =
            create_test_registry(Attrs::new().with("factory", BuiltinFactory::Map));
        let memo = FactoryMemo::new();

        let resolved = factory_for(&registry, &HashMap::new(), &memo, id).unwrap();
        assert!(matches!(
            resolved,
            Some(ResolvedFactory::Builtin(BuiltinFactory::Map))
        ));
    }

    #[test]
    fn test_named_factory_resolution() {
        let (registry, id) = create_test_registry(Attrs::new().with("factory", "widget_maker"));
        let memo = FactoryMemo::new();
        let mut callbacks = HashMap::new();
        callbacks.insert(
            "widget_maker".to_string(),
            Callback::Factory(factory_fn(|args| Ok(Value::from(args.name)))),
        );

        let resolved = factory_for(&registry, &callbacks, &memo, id)
            .unwrap()
            .unwrap();
        let built = instantiate(&resolved, &Decl::node("gear"), "widget").unwrap();
        match built {
            Built::Value(v) => assert_eq!(v, Value::Str("gear".to_string())),
            Built::Draft(_) => panic!("expected a value"),
        }
    }

    #[test]
    fn test_named_factory_unregistered_fails() {
        let (registry, id) = create_test_registry(Attrs::new().with("factory", "missing"));
        let memo = FactoryMemo::new();

        let result = factory_for(&registry, &HashMap::new(), &memo, id);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("factory 'missing' is not registered"));
        assert!(memo.is_empty());
    }

    #[test]
    fn test_named_callback_wrong_kind_fails() {
        let (registry, id) = create_test_registry(Attrs::new().with("factory", "adder"));
        let memo = FactoryMemo::new();
        let mut callbacks = HashMap::new();
        callbacks.insert(
            "adder".to_string(),
            Callback::add(|_parent: &mut Value, _child| Ok(())),
        );

        let result = factory_for(&registry, &callbacks, &memo, id);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("is a add, not a factory"));
    }

    #[test]
    fn test_factory_inherited_through_chain() {
        let (mut registry, _) =
            create_test_registry(Attrs::new().with("factory", BuiltinFactory::Map));
        let mut sub = SchemaDraft::new("sub", NodeKind::Node);
        sub.attrs = Attrs::new().with("schema", "widget");
        let sub_id = registry.intern(sub);
        let memo = FactoryMemo::new();

        let resolved = factory_for(&registry, &HashMap::new(), &memo, sub_id).unwrap();
        assert!(matches!(
            resolved,
            Some(ResolvedFactory::Builtin(BuiltinFactory::Map))
        ));
    }

    #[test]
    fn test_memo_caches_resolution() {
        let (registry, id) =
            create_test_registry(Attrs::new().with("factory", BuiltinFactory::Tree));
        let memo = FactoryMemo::new();

        factory_for(&registry, &HashMap::new(), &memo, id).unwrap();
        assert_eq!(memo.len(), 1);
        factory_for(&registry, &HashMap::new(), &memo, id).unwrap();
        assert_eq!(memo.len(), 1);
    }

    #[test]
    fn test_tree_leaf_takes_declared_value() {
        let factory = ResolvedFactory::Builtin(BuiltinFactory::Tree);
        let decl = Decl::node("qty").value(5i64);

        let built = instantiate(&factory, &decl, "invoice.qty").unwrap();
        match built {
            Built::Value(v) => assert_eq!(v, Value::Int(5)),
            Built::Draft(_) => panic!("expected a value"),
        }
    }

    #[test]
    fn test_tree_branch_builds_object() {
        let factory = ResolvedFactory::Builtin(BuiltinFactory::Tree);
        let decl = Decl::node("invoice")
            .value(5i64)
            .child(Decl::node("lines"));

        let built = instantiate(&factory, &decl, "invoice").unwrap();
        match built {
            Built::Value(Value::Object(node)) => assert_eq!(node.name, "invoice"),
            other => panic!("expected an object, got {:?}", other),
        }
    }

    #[test]
    fn test_map_factory_ignores_value() {
        let factory = ResolvedFactory::Builtin(BuiltinFactory::Map);
        let decl = Decl::node("bag").value("ignored");

        let built = instantiate(&factory, &decl, "bag").unwrap();
        match built {
            Built::Value(v) => assert_eq!(v, Value::Map(Vec::new())),
            Built::Draft(_) => panic!("expected a value"),
        }
    }

    #[test]
    fn test_schema_node_drafts() {
        let node = instantiate(
            &ResolvedFactory::Builtin(BuiltinFactory::SchemaNode),
            &Decl::node("invoice"),
            "invoice",
        )
        .unwrap();
        match node {
            Built::Draft(draft) => {
                assert_eq!(draft.name, "invoice");
                assert_eq!(draft.kind, NodeKind::Node);
            }
            Built::Value(_) => panic!("expected a draft"),
        }

        let binding = instantiate(
            &ResolvedFactory::Builtin(BuiltinFactory::CollectionNode),
            &Decl::node("items"),
            "invoice.items",
        )
        .unwrap();
        match binding {
            Built::Draft(draft) => assert_eq!(draft.kind, NodeKind::Collection),
            Built::Value(_) => panic!("expected a draft"),
        }
    }

    #[test]
    fn test_user_factory_error_is_wrapped() {
        let factory = ResolvedFactory::User(factory_fn(|_args| Err("boom".into())));

        let result = instantiate(&factory, &Decl::node("widget"), "widget");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Construction failed at widget"));
        assert!(err.to_string().contains("construction strategy failed"));
    }
}
