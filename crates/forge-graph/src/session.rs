//! Build sessions
//!
//! [`Forge`] ties the pieces together: the schema registry, the named
//! callback table, and the cached factory resolutions. A session runs in
//! two phases. Schemas are defined first, validated against the built-in
//! meta-schema and registered by name. Declarations are then built against
//! the registered schemas into value graphs. Defining takes `&mut self`;
//! building takes `&self`, so builds can run concurrently once the
//! definitions settle.

use crate::builder::{Built, GraphBuilder, Mode};
use crate::factory::FactoryMemo;
use crate::{Error, Result};
use forge_schema::{factory_fn, Callback, Decl, NodeFactory, SchemaRef, SchemaRegistry};
use forge_tree::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A schema-driven construction session.
pub struct Forge {
    registry: SchemaRegistry,
    callbacks: HashMap<String, Callback>,
    factories: FactoryMemo,
    default_factory: Option<Arc<dyn NodeFactory>>,
}

impl Forge {
    /// Create a session with only the meta-schema installed.
    pub fn new() -> Self {
        Forge {
            registry: SchemaRegistry::new(),
            callbacks: HashMap::new(),
            factories: FactoryMemo::new(),
            default_factory: None,
        }
    }

    /// Use `factory` for nodes whose schema chain names no strategy.
    #[must_use]
    pub fn with_default_factory(mut self, factory: Arc<dyn NodeFactory>) -> Self {
        self.default_factory = Some(factory);
        self
    }

    /// Define one schema and register it under its declared name.
    ///
    /// The definition runs through the ordinary engine against the
    /// meta-schema, so unknown attributes and ill-shaped attribute values
    /// are reported the same way build violations are. Redefining a name
    /// replaces the prior schema; later builds see the replacement.
    ///
    /// # Errors
    ///
    /// Returns an error when the definition violates the meta-schema.
    pub fn define(&mut self, decl: &Decl) -> Result<SchemaRef> {
        debug!("Defining schema: {}", decl.name);
        let built = GraphBuilder::new(
            &self.registry,
            &self.callbacks,
            &self.factories,
            None,
            Mode::Define,
        )
        .build(decl)?;
        let draft = match built {
            Built::Draft(draft) => draft,
            Built::Value(_) => {
                return Err(forge_schema::Error::Definition(
                    "definition did not produce a schema".to_owned(),
                )
                .into());
            }
        };
        let id = self.registry.intern(draft);
        if self.registry.register(decl.name.clone(), id).is_some() {
            debug!("Replacing schema definition: {}", decl.name);
            self.factories.clear();
        }
        Ok(SchemaRef::new(id))
    }

    /// Define several schemas in order.
    ///
    /// # Errors
    ///
    /// Returns the first definition error encountered.
    pub fn define_all(&mut self, decls: &[Decl]) -> Result<Vec<SchemaRef>> {
        decls.iter().map(|decl| self.define(decl)).collect()
    }

    /// Build one declaration into a value graph.
    ///
    /// The declaration name selects the schema: an exact registered name
    /// wins, then a schema registered under the wildcard name.
    ///
    /// # Errors
    ///
    /// Returns an error when no schema matches the declaration name or the
    /// declaration violates the schema that matched.
    pub fn build(&self, decl: &Decl) -> Result<Value> {
        let built = GraphBuilder::new(
            &self.registry,
            &self.callbacks,
            &self.factories,
            self.default_factory.as_ref(),
            Mode::Build,
        )
        .build(decl)?;
        match built {
            Built::Value(value) => Ok(value),
            Built::Draft(_) => Err(Error::Factory {
                path: decl.name.clone(),
                reason: "construction produced a schema draft, not a value".into(),
                source: None,
            }),
        }
    }

    /// Build several declarations against the same registry.
    ///
    /// # Errors
    ///
    /// Returns the first build error encountered.
    pub fn build_all(&self, decls: &[Decl]) -> Result<Vec<Value>> {
        decls.iter().map(|decl| self.build(decl)).collect()
    }

    /// Register a construction strategy under a name.
    ///
    /// Schemas select it through a string-valued `factory` attribute.
    pub fn register_factory(&mut self, name: impl Into<String>, factory: Arc<dyn NodeFactory>) {
        let name = name.into();
        debug!("Registering factory: {}", name);
        self.callbacks.insert(name, Callback::Factory(factory));
        self.factories.clear();
    }

    /// Register a callback under a name.
    ///
    /// Schemas select it through the string form of the function-valued
    /// attributes (`add`, `size`, `key`, `collection`).
    pub fn register_callback(&mut self, name: impl Into<String>, callback: Callback) {
        let name = name.into();
        debug!("Registering {} callback: {}", callback.describe(), name);
        self.callbacks.insert(name, callback);
        self.factories.clear();
    }

    /// Register an existing schema under an additional name.
    pub fn alias(&mut self, name: impl Into<String>, schema: SchemaRef) {
        let name = name.into();
        debug!("Aliasing schema: {}", name);
        if self.registry.register(name, schema.id()).is_some() {
            self.factories.clear();
        }
    }

    /// Copy a registered schema tree and register the copy under a new
    /// name. The copy shares nothing with the source, so either side can
    /// be redefined or edited without affecting the other.
    ///
    /// # Errors
    ///
    /// Returns an error when the source name is not registered.
    pub fn deep_copy(&mut self, source: &str, name: impl Into<String>) -> Result<SchemaRef> {
        let id = self
            .registry
            .get(source)
            .ok_or_else(|| Error::SchemaNotFound {
                name: source.to_owned(),
            })?;
        let copy = self.registry.deep_copy(id);
        if self.registry.register(name, copy).is_some() {
            self.factories.clear();
        }
        Ok(SchemaRef::new(copy))
    }

    /// Move a registered schema under a new parent schema, making it
    /// resolvable as a member of the parent.
    ///
    /// # Errors
    ///
    /// Returns an error when either name is not registered.
    pub fn reparent(&mut self, child: &str, new_parent: &str) -> Result<()> {
        let child_id = self.registry.get(child).ok_or_else(|| Error::SchemaNotFound {
            name: child.to_owned(),
        })?;
        let parent_id = self
            .registry
            .get(new_parent)
            .ok_or_else(|| Error::SchemaNotFound {
                name: new_parent.to_owned(),
            })?;
        self.registry.reparent(child_id, parent_id);
        Ok(())
    }

    /// Handle of a registered schema.
    pub fn schema(&self, name: &str) -> Option<SchemaRef> {
        self.registry.get(name).map(SchemaRef::new)
    }

    /// Registered schema names, sorted.
    pub fn schema_names(&self) -> Vec<&str> {
        self.registry.names()
    }
}

impl Default for Forge {
    fn default() -> Self {
        Forge::new()
    }
}

/// A construction strategy producing plain maps instead of object nodes.
///
/// Useful for configuration-style builds where the result should
/// serialize as nested maps. Declaration values pass through unchanged,
/// so leaf nodes keep their literal values.
pub fn map_factory() -> Arc<dyn NodeFactory> {
    factory_fn(|args| {
        Ok(match args.value {
            Some(value) => value.clone(),
            None => Value::Map(Vec::new()),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema_with_total(default_total: i64) -> Decl {
        Decl::node("invoice").child(
            Decl::node("properties").child(Decl::node("total").attr("def", default_total)),
        )
    }

    #[test]
    fn test_define_then_build() {
        let mut forge = Forge::new();
        let handle = forge.define(&schema_with_total(0)).unwrap();
        assert_eq!(forge.schema("invoice").map(SchemaRef::id), Some(handle.id()));

        let built = forge.build(&Decl::node("invoice")).unwrap();
        assert_eq!(built.get("total").and_then(Value::as_int), Some(0));
    }

    #[test]
    fn test_redefinition_replaces_schema() {
        let mut forge = Forge::new();
        forge.define(&schema_with_total(1)).unwrap();
        let first = forge.build(&Decl::node("invoice")).unwrap();
        assert_eq!(first.get("total").and_then(Value::as_int), Some(1));

        forge.define(&schema_with_total(2)).unwrap();
        let second = forge.build(&Decl::node("invoice")).unwrap();
        assert_eq!(second.get("total").and_then(Value::as_int), Some(2));
    }

    #[test]
    fn test_define_rejects_unknown_attribute() {
        let mut forge = Forge::new();
        let result = forge.define(&Decl::node("invoice").attr("bogus", 1));
        assert!(matches!(result, Err(Error::Property { .. })));
    }

    #[test]
    fn test_build_unknown_schema_fails() {
        let forge = Forge::new();
        let result = forge.build(&Decl::node("ghost"));
        assert!(matches!(result, Err(Error::SchemaNotFound { .. })));
    }

    #[test]
    fn test_alias_builds_under_both_names() {
        let mut forge = Forge::new();
        let invoice = forge.define(&schema_with_total(7)).unwrap();
        forge.alias("bill", invoice);

        let built = forge.build(&Decl::node("bill")).unwrap();
        assert_eq!(built.get("total").and_then(Value::as_int), Some(7));
    }

    #[test]
    fn test_define_all_and_schema_names() {
        let mut forge = Forge::new();
        let decls = vec![Decl::node("zebra"), Decl::node("apple")];
        let handles = forge.define_all(&decls).unwrap();
        assert_eq!(handles.len(), 2);
        assert_eq!(forge.schema_names(), vec!["apple", "zebra"]);
    }

    #[test]
    fn test_build_all() {
        let mut forge = Forge::new();
        forge.define(&schema_with_total(3)).unwrap();
        let built = forge
            .build_all(&[Decl::node("invoice"), Decl::node("invoice")])
            .unwrap();
        assert_eq!(built.len(), 2);
    }

    #[test]
    fn test_registered_factory_resolves_by_name() {
        let mut forge = Forge::new();
        forge
            .define(&Decl::node("gadget").attr("factory", "gadgetize"))
            .unwrap();
        forge.register_factory(
            "gadgetize",
            factory_fn(|args| Ok(Value::Str(format!("made {}", args.name)))),
        );

        let built = forge.build(&Decl::node("gadget")).unwrap();
        assert_eq!(built.as_str(), Some("made gadget"));
    }

    #[test]
    fn test_registered_adder_replaces_container() {
        let mut forge = Forge::new();
        forge.register_callback(
            "tally",
            Callback::add(|parent: &mut Value, _child: Value| {
                let next = parent.get("count").and_then(Value::as_int).unwrap_or(0) + 1;
                parent.insert("count", Value::Int(next));
                Ok(())
            }),
        );
        forge
            .define(
                &Decl::node("order").child(
                    Decl::node("collections").child(
                        Decl::node("items")
                            .attr("add", "tally")
                            .child(Decl::node("item")),
                    ),
                ),
            )
            .unwrap();

        let decl = Decl::node("order").child(
            Decl::node("items")
                .child(Decl::node("item"))
                .child(Decl::node("item")),
        );
        let built = forge.build(&decl).unwrap();
        assert_eq!(built.get("count").and_then(Value::as_int), Some(2));
        assert!(built.get("items").is_none());
    }

    #[test]
    fn test_default_factory_override_builds_maps() {
        let mut forge = Forge::new().with_default_factory(map_factory());
        forge
            .define(
                &Decl::node("config").child(
                    Decl::node("properties")
                        .child(Decl::node("host").attr("def", "localhost"))
                        .child(Decl::node("port")),
                ),
            )
            .unwrap();

        let built = forge
            .build(&Decl::node("config").child(Decl::node("port").value(9090)))
            .unwrap();
        assert!(matches!(built, Value::Map(_)));
        assert_eq!(built.get("host").and_then(Value::as_str), Some("localhost"));
        assert_eq!(built.get("port").and_then(Value::as_int), Some(9090));
    }

    #[test]
    fn test_deep_copy_is_independent() {
        let mut forge = Forge::new();
        forge.define(&schema_with_total(5)).unwrap();
        forge.deep_copy("invoice", "receipt").unwrap();
        forge.define(&schema_with_total(6)).unwrap();

        let receipt = forge.build(&Decl::node("receipt")).unwrap();
        assert_eq!(receipt.get("total").and_then(Value::as_int), Some(5));
        let invoice = forge.build(&Decl::node("invoice")).unwrap();
        assert_eq!(invoice.get("total").and_then(Value::as_int), Some(6));
    }

    #[test]
    fn test_deep_copy_unknown_source_fails() {
        let mut forge = Forge::new();
        let result = forge.deep_copy("ghost", "copy");
        assert!(matches!(result, Err(Error::SchemaNotFound { .. })));
    }

    #[test]
    fn test_reparent_moves_schema() {
        let mut forge = Forge::new();
        forge.define(&Decl::node("base")).unwrap();
        forge.define(&Decl::node("extra")).unwrap();
        assert!(forge
            .build(&Decl::node("base").child(Decl::node("extra")))
            .is_err());

        forge.reparent("extra", "base").unwrap();
        let built = forge
            .build(&Decl::node("base").child(Decl::node("extra")))
            .unwrap();
        assert!(built.get("extra").is_some());
    }
}
