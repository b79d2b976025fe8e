//! Declaration walking
//!
//! The builder resolves each declaration to a schema, constructs a product
//! through the schema's strategy, applies declaration attributes as
//! properties, and enforces the schema's constraints when the node
//! completes. Build mode produces object graphs against registered
//! schemas; define mode runs the same walk against the meta-schema and
//! produces schema drafts.

use crate::collection;
use crate::factory::{self, FactoryMemo, ResolvedFactory};
use crate::{Error, Result};
use forge_schema::inheritance::{find_collection_schema, find_schema, merged_view};
use forge_schema::{
    AttrValue, Attrs, BuiltinFactory, Callback, Check, Decl, MergedEntry, NodeFactory,
    SchemaDraft, SchemaId, SchemaRegistry, ViewKind, WILDCARD,
};
use forge_tree::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::mem;
use std::sync::Arc;
use tracing::{debug, trace};

/// Operating phase of a builder pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Construct object graphs against registered schemas.
    Build,

    /// Construct schema drafts against the meta-schema.
    Define,
}

/// Product of one builder pass.
#[derive(Debug)]
pub enum Built {
    /// A constructed object graph.
    Value(Value),

    /// A schema draft awaiting interning.
    Draft(SchemaDraft),
}

/// How a child declaration matched its schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Via {
    Property,
    Collection,
    Member,
    Child,
}

/// In-flight node: the schema it builds against, the properties still
/// unset, and the product under construction.
struct Frame {
    schema: SchemaId,
    pending: Vec<MergedEntry>,
    product: Built,
}

/// Walks declarations against a schema registry.
pub struct GraphBuilder<'a> {
    registry: &'a SchemaRegistry,
    callbacks: &'a HashMap<String, Callback>,
    factories: &'a FactoryMemo,
    default_override: Option<&'a Arc<dyn NodeFactory>>,
    mode: Mode,
}

impl<'a> GraphBuilder<'a> {
    pub(crate) fn new(
        registry: &'a SchemaRegistry,
        callbacks: &'a HashMap<String, Callback>,
        factories: &'a FactoryMemo,
        default_override: Option<&'a Arc<dyn NodeFactory>>,
        mode: Mode,
    ) -> Self {
        GraphBuilder {
            registry,
            callbacks,
            factories,
            default_override,
            mode,
        }
    }

    /// Build one declaration into a product.
    ///
    /// # Errors
    ///
    /// Returns an error when no schema matches the declaration name or when
    /// the declaration violates the schema that matched.
    pub fn build(&self, decl: &Decl) -> Result<Built> {
        let schema = self.resolve_root(&decl.name)?;
        if self.registry.node(schema).is_collection() {
            return Err(Error::Collection {
                path: self.registry.arena().fqn(schema),
                reason: "a collection binding cannot be built as a root".into(),
                source: None,
            });
        }
        self.construct(schema, decl, false)
    }

    fn resolve_root(&self, name: &str) -> Result<SchemaId> {
        match self.mode {
            Mode::Build => self
                .registry
                .get(name)
                .or_else(|| self.registry.get(WILDCARD))
                .ok_or_else(|| Error::SchemaNotFound {
                    name: name.to_owned(),
                }),
            Mode::Define => Ok(self.registry.meta_root()),
        }
    }

    fn construct(&self, schema: SchemaId, decl: &Decl, prefer_value: bool) -> Result<Built> {
        let path = self.registry.arena().fqn(schema);
        debug!("Building node {} against {}", decl.name, path);

        let strategy =
            match factory::factory_for(self.registry, self.callbacks, self.factories, schema)? {
                Some(found) => found,
                None => self.default_factory(prefer_value),
            };
        let product = factory::instantiate(&strategy, decl, &path)?;

        let pending = merged_view(self.registry, schema, ViewKind::Properties)?
            .entries
            .clone();
        let mut frame = Frame {
            schema,
            pending,
            product,
        };

        for (name, value) in decl.attrs.iter() {
            self.set_property(&mut frame, name, value.clone())?;
        }
        for child in &decl.children {
            self.build_child(&mut frame, child)?;
        }
        self.complete(&mut frame)?;
        Ok(frame.product)
    }

    /// Strategy used when neither the schema nor its supers name one.
    fn default_factory(&self, prefer_value: bool) -> ResolvedFactory {
        match self.mode {
            Mode::Build => match self.default_override {
                Some(factory) => ResolvedFactory::User(Arc::clone(factory)),
                None => ResolvedFactory::Builtin(BuiltinFactory::Tree),
            },
            Mode::Define => {
                if prefer_value {
                    ResolvedFactory::Builtin(BuiltinFactory::Tree)
                } else {
                    ResolvedFactory::Builtin(BuiltinFactory::SchemaNode)
                }
            }
        }
    }

    /// Match a child declaration to a schema, exact names before
    /// wildcards, properties before collections before members.
    fn resolve_child(&self, current: SchemaId, name: &str) -> Result<(SchemaId, Via)> {
        if let Some(found) = find_schema(self.registry, current, "properties", name)? {
            return Ok((found, Via::Property));
        }
        if let Some(found) = find_schema(self.registry, current, "collections", name)? {
            return Ok((found, Via::Collection));
        }
        // Direct children hold members only on a collection binding; on a
        // node schema they are the structural containers.
        if self.registry.node(current).is_collection() {
            if let Some(found) = self.registry.arena().first_child(current, name) {
                return Ok((found, Via::Member));
            }
        }
        if let Some(found) = find_collection_schema(self.registry, current, name)? {
            return Ok((found, Via::Member));
        }
        if let Some(found) = find_schema(self.registry, current, "properties", WILDCARD)? {
            return Ok((found, Via::Property));
        }
        if let Some(found) = find_schema(self.registry, current, "collections", WILDCARD)? {
            return Ok((found, Via::Collection));
        }
        if let Some(found) = self.registry.arena().first_child(current, WILDCARD) {
            return Ok((found, Via::Child));
        }
        Err(Error::SchemaNotFound {
            name: self.registry.arena().fqn_member(current, name),
        })
    }

    fn build_child(&self, parent: &mut Frame, decl: &Decl) -> Result<()> {
        let (schema, via) = self.resolve_child(parent.schema, &decl.name)?;
        let node = self.registry.node(schema);
        let schema_name = node.name();
        trace!(
            "Resolved child {} to {} via {:?}",
            decl.name,
            self.registry.arena().fqn(schema),
            via
        );

        if node.is_collection() {
            self.build_scope(schema, decl, parent)?;
            parent.pending.retain(|e| e.name != schema_name);
            return Ok(());
        }

        let product = self.construct(schema, decl, via == Via::Property)?;
        if via == Via::Property {
            match product {
                Built::Value(value) => {
                    self.set_property(parent, &decl.name, AttrValue::Value(value))?;
                }
                Built::Draft(_) => {
                    return Err(self.property_error(
                        parent.schema,
                        &decl.name,
                        "a schema draft cannot be a property value",
                    ));
                }
            }
        } else {
            // A member whose schema sits under a collection binding joins
            // that collection even outside an explicit scope.
            let binding = node
                .parent()
                .filter(|id| self.registry.node(*id).is_collection());
            match binding {
                Some(collection) => {
                    let path = self.registry.arena().fqn(collection);
                    let member = match product {
                        Built::Value(value) => value,
                        Built::Draft(_) => {
                            return Err(Error::Collection {
                                path,
                                reason: "a schema draft cannot join a collection".into(),
                                source: None,
                            });
                        }
                    };
                    let binding_node = self.registry.node(collection);
                    let target = product_value(&mut parent.product, &path)?;
                    collection::add_child(
                        binding_node.attrs(),
                        binding_node.name(),
                        &path,
                        target,
                        member,
                        self.callbacks,
                    )?;
                }
                None => self.plain_attach(parent, &decl.name, product)?,
            }
        }
        parent.pending.retain(|e| e.name != schema_name);
        Ok(())
    }

    /// Walk the children of a collection declaration, adding each member
    /// to the parent product's collection. The scope itself builds no
    /// node of its own.
    fn build_scope(&self, binding: SchemaId, decl: &Decl, parent: &mut Frame) -> Result<()> {
        let binding_node = self.registry.node(binding);
        let path = self.registry.arena().fqn(binding);
        debug!("Opening collection scope at {}", path);

        if decl.value.is_some() {
            return Err(Error::Collection {
                path,
                reason: "collections may not be declared with a value; use a property instead"
                    .into(),
                source: None,
            });
        }
        if !decl.attrs.is_empty() {
            debug!("Ignoring attributes on collection scope {}", path);
        }

        let target = product_value(&mut parent.product, &path)?;
        collection::ensure_container(binding_node.attrs(), binding_node.name(), &path, target)?;

        for child in &decl.children {
            let (schema, via) = self.resolve_child(binding, &child.name)?;
            if via == Via::Property {
                return Err(Error::Collection {
                    path: self.registry.arena().fqn_member(binding, &child.name),
                    reason: format!(
                        "'{}' resolves to a property; collection scopes hold members",
                        child.name
                    ),
                    source: None,
                });
            }
            if self.registry.node(schema).is_collection() {
                self.build_scope(schema, child, parent)?;
                continue;
            }
            let member = match self.construct(schema, child, false)? {
                Built::Value(value) => value,
                Built::Draft(_) => {
                    return Err(Error::Collection {
                        path: self.registry.arena().fqn(schema),
                        reason: "a schema draft cannot join a collection".into(),
                        source: None,
                    });
                }
            };
            let target = product_value(&mut parent.product, &path)?;
            collection::add_child(
                binding_node.attrs(),
                binding_node.name(),
                &path,
                target,
                member,
                self.callbacks,
            )?;
        }
        Ok(())
    }

    /// Validate one property value against its schema and store it on the
    /// product. An exact merged entry governs when present, otherwise the
    /// schema's wildcard property.
    fn set_property(&self, frame: &mut Frame, name: &str, value: AttrValue) -> Result<()> {
        frame.pending.retain(|e| e.name != name);

        let view = merged_view(self.registry, frame.schema, ViewKind::Properties)?;
        let entry_attrs = match view.find(name) {
            Some(entry) => &entry.attrs,
            None => match find_schema(self.registry, frame.schema, "properties", WILDCARD)? {
                Some(fallback) => self.registry.node(fallback).attrs(),
                None => return Err(self.property_error(frame.schema, name, "property unknown")),
            },
        };
        trace!("Setting property {}", name);

        if !matches!(value, AttrValue::Value(Value::Null)) {
            self.check_bounds(frame.schema, name, entry_attrs, &value)?;
            self.check_value(frame.schema, name, entry_attrs, &value)?;
        }

        let target_name = match entry_attrs.get("property") {
            Some(AttrValue::Fn(Callback::Setter(setter))) => {
                let Built::Value(target) = &mut frame.product else {
                    return Err(self.property_error(
                        frame.schema,
                        name,
                        "a setter function needs an object product",
                    ));
                };
                let input = match value {
                    AttrValue::Value(v) => v,
                    other => {
                        return Err(self.property_error(
                            frame.schema,
                            name,
                            format!("setter input must be data, got {}", other.describe()),
                        ));
                    }
                };
                return setter(target, input).map_err(|e| Error::Property {
                    path: self.registry.arena().fqn_member(frame.schema, name),
                    reason: "setter failed".into(),
                    source: Some(e),
                });
            }
            Some(AttrValue::Value(Value::Str(renamed))) => renamed.clone(),
            None => name.to_owned(),
            Some(_) => {
                return Err(self.property_error(
                    frame.schema,
                    name,
                    "'property' attribute must be a field name or setter function",
                ));
            }
        };

        match &mut frame.product {
            Built::Draft(draft) => {
                // Check attributes become matchers as they land on a draft,
                // so build passes do not re-parse them per value.
                let stored = if target_name == "check" {
                    match value {
                        AttrValue::Value(raw) => AttrValue::Check(Check::parse(&raw)?),
                        other => other,
                    }
                } else {
                    value
                };
                draft.attrs.insert(target_name, stored);
            }
            Built::Value(target) => match value {
                AttrValue::Value(v) => {
                    if !target.insert(target_name, v) {
                        let kind = target.kind().name();
                        return Err(self.property_error(
                            frame.schema,
                            name,
                            format!("cannot set a property on a {kind} value"),
                        ));
                    }
                }
                other => {
                    return Err(self.property_error(
                        frame.schema,
                        name,
                        format!("property value must be data, got {}", other.describe()),
                    ));
                }
            },
        }
        Ok(())
    }

    fn check_bounds(
        &self,
        schema: SchemaId,
        name: &str,
        attrs: &Attrs,
        value: &AttrValue,
    ) -> Result<()> {
        let min = attrs.get("min").and_then(AttrValue::as_value);
        let max = attrs.get("max").and_then(AttrValue::as_value);
        if min.is_none() && max.is_none() {
            return Ok(());
        }

        let projection = value
            .as_value()
            .and_then(magnitude)
            .ok_or_else(|| self.property_error(schema, name, "value is not comparable"))?;

        if let Some(bound) = min {
            if !matches!(
                bound.compare(&projection),
                Some(Ordering::Less | Ordering::Equal)
            ) {
                return Err(self.property_error(schema, name, "min check failed"));
            }
        }
        if let Some(bound) = max {
            if !matches!(
                bound.compare(&projection),
                Some(Ordering::Greater | Ordering::Equal)
            ) {
                return Err(self.property_error(schema, name, "max check failed"));
            }
        }
        Ok(())
    }

    fn check_value(
        &self,
        schema: SchemaId,
        name: &str,
        attrs: &Attrs,
        value: &AttrValue,
    ) -> Result<()> {
        let Some(check_attr) = attrs.get("check") else {
            return Ok(());
        };
        let pass = match check_attr {
            AttrValue::Check(check) => check.test_attr(value),
            AttrValue::Value(raw) => Check::parse(raw)?.test_attr(value),
            other => {
                return Err(self.property_error(
                    schema,
                    name,
                    format!("check attribute is a {}, not a check", other.describe()),
                ));
            }
        };
        if pass {
            Ok(())
        } else {
            Err(self.property_error(schema, name, "value invalid"))
        }
    }

    /// Close out a frame: apply defaults, report missing required
    /// properties, then run collection and node checks.
    fn complete(&self, frame: &mut Frame) -> Result<()> {
        let pending = mem::take(&mut frame.pending);
        for entry in pending {
            if entry.name == WILDCARD {
                continue;
            }
            if let Some(def) = entry.attrs.get("def") {
                let value = match def {
                    AttrValue::Fn(Callback::Default(producer)) => {
                        let produced = producer().map_err(|e| Error::Property {
                            path: self.registry.arena().fqn_member(frame.schema, &entry.name),
                            reason: "default producer failed".into(),
                            source: Some(e),
                        })?;
                        AttrValue::Value(produced)
                    }
                    other => other.clone(),
                };
                debug!("Applying default for property {}", entry.name);
                self.set_property(frame, &entry.name, value)?;
            } else if matches!(
                entry.attrs.get("req").and_then(AttrValue::as_value),
                Some(Value::Bool(true))
            ) {
                return Err(self.property_error(frame.schema, &entry.name, "property required"));
            }
        }

        if let Built::Value(target) = &mut frame.product {
            let collections = merged_view(self.registry, frame.schema, ViewKind::Collections)?;
            for entry in &collections.entries {
                let path = self.registry.arena().fqn_member(frame.schema, &entry.name);
                collection::check_def(&entry.attrs, &entry.name, &path, target, self.callbacks)?;
                collection::check_size(&entry.attrs, &entry.name, &path, target)?;
            }
        }

        if let Some(check_attr) = self.registry.node(frame.schema).attrs().get("check") {
            if let Built::Value(target) = &frame.product {
                if !target.is_null() {
                    let pass = match check_attr {
                        AttrValue::Check(check) => check.test_value(target),
                        AttrValue::Value(raw) => Check::parse(raw)?.test_value(target),
                        other => {
                            return Err(Error::Node {
                                path: self.registry.arena().fqn(frame.schema),
                                reason: format!(
                                    "check attribute is a {}, not a check",
                                    other.describe()
                                ),
                            });
                        }
                    };
                    if !pass {
                        return Err(Error::Node {
                            path: self.registry.arena().fqn(frame.schema),
                            reason: "check failed".into(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Attach a child product to its parent outside any collection.
    fn plain_attach(&self, parent: &mut Frame, name: &str, child: Built) -> Result<()> {
        match (&mut parent.product, child) {
            (Built::Draft(draft), Built::Draft(member)) => {
                draft.children.push(member);
                Ok(())
            }
            (Built::Value(target), Built::Value(value)) => {
                if target.insert(name, value) {
                    Ok(())
                } else {
                    Err(Error::Node {
                        path: self.registry.arena().fqn_member(parent.schema, name),
                        reason: format!("cannot attach child to {} value", target.kind().name()),
                    })
                }
            }
            (Built::Draft(_), Built::Value(_)) => Err(Error::Node {
                path: self.registry.arena().fqn_member(parent.schema, name),
                reason: "cannot attach a value to a schema definition".into(),
            }),
            (Built::Value(_), Built::Draft(_)) => Err(Error::Node {
                path: self.registry.arena().fqn_member(parent.schema, name),
                reason: "a schema draft cannot attach to an object".into(),
            }),
        }
    }

    fn property_error(&self, schema: SchemaId, member: &str, reason: impl Into<String>) -> Error {
        Error::Property {
            path: self.registry.arena().fqn_member(schema, member),
            reason: reason.into(),
            source: None,
        }
    }
}

fn product_value<'f>(product: &'f mut Built, path: &str) -> Result<&'f mut Value> {
    match product {
        Built::Value(value) => Ok(value),
        Built::Draft(_) => Err(Error::Collection {
            path: path.to_owned(),
            reason: "collection members need an object parent".into(),
            source: None,
        }),
    }
}

/// Project a value onto the axis min and max bounds compare against.
/// Strings compare by character count, lists and maps by element count,
/// numbers by themselves.
fn magnitude(value: &Value) -> Option<Value> {
    let count = |n: usize| Value::Int(i64::try_from(n).unwrap_or(i64::MAX));
    match value {
        Value::Str(s) => Some(count(s.chars().count())),
        Value::List(items) => Some(count(items.len())),
        Value::Map(entries) => Some(count(entries.len())),
        Value::Int(_) | Value::Float(_) => Some(value.clone()),
        _ => None,
    }
}
