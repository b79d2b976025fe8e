//! User-supplied callbacks and construction strategies
//!
//! Every extension point takes a fixed, typed signature; attribute values
//! carry these behind `Arc` handles so schemas stay cheaply cloneable.

use crate::attr::Attrs;
use forge_tree::Value;
use std::sync::Arc;

/// Error type surfaced by user callbacks.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias for user callbacks.
pub type CbResult<T> = std::result::Result<T, CallbackError>;

/// Default-value producer for `def` attributes.
pub type DefFn = Arc<dyn Fn() -> CbResult<Value> + Send + Sync>;

/// Custom property setter for `property` attributes.
pub type SetterFn = Arc<dyn Fn(&mut Value, Value) -> CbResult<()> + Send + Sync>;

/// Live-collection accessor for `collection` attributes.
pub type AccessorFn =
    Arc<dyn for<'a> Fn(&'a mut Value) -> CbResult<Option<&'a mut Value>> + Send + Sync>;

/// Key extractor for `key` attributes; receives the child.
pub type KeyFn = Arc<dyn Fn(&Value) -> CbResult<Value> + Send + Sync>;

/// Size extractor for `size` attributes; receives the parent.
pub type SizeFn = Arc<dyn Fn(&Value) -> CbResult<Option<usize>> + Send + Sync>;

/// Mutator for keyless `add` attributes; receives `(parent, child)`.
pub type AddFn = Arc<dyn Fn(&mut Value, Value) -> CbResult<()> + Send + Sync>;

/// Mutator for keyed `add` attributes; receives `(parent, key, child)`.
pub type AddKeyedFn = Arc<dyn Fn(&mut Value, Value, Value) -> CbResult<()> + Send + Sync>;

/// A registered or attribute-borne callback.
#[derive(Clone)]
pub enum Callback {
    /// `def` default producer
    Default(DefFn),

    /// `property` setter
    Setter(SetterFn),

    /// `collection` accessor
    Accessor(AccessorFn),

    /// `key` extractor
    Key(KeyFn),

    /// `size` extractor
    Size(SizeFn),

    /// keyless `add` mutator
    Add(AddFn),

    /// keyed `add` mutator
    AddKeyed(AddKeyedFn),

    /// named construction function
    Factory(Arc<dyn NodeFactory>),
}

impl Callback {
    /// Wrap a default producer.
    pub fn default_fn(f: impl Fn() -> CbResult<Value> + Send + Sync + 'static) -> Self {
        Callback::Default(Arc::new(f))
    }

    /// Wrap a property setter.
    pub fn setter(f: impl Fn(&mut Value, Value) -> CbResult<()> + Send + Sync + 'static) -> Self {
        Callback::Setter(Arc::new(f))
    }

    /// Wrap a collection accessor.
    pub fn accessor(
        f: impl for<'a> Fn(&'a mut Value) -> CbResult<Option<&'a mut Value>> + Send + Sync + 'static,
    ) -> Self {
        Callback::Accessor(Arc::new(f))
    }

    /// Wrap a key extractor.
    pub fn key(f: impl Fn(&Value) -> CbResult<Value> + Send + Sync + 'static) -> Self {
        Callback::Key(Arc::new(f))
    }

    /// Wrap a size extractor.
    pub fn size(f: impl Fn(&Value) -> CbResult<Option<usize>> + Send + Sync + 'static) -> Self {
        Callback::Size(Arc::new(f))
    }

    /// Wrap a keyless adder.
    pub fn add(f: impl Fn(&mut Value, Value) -> CbResult<()> + Send + Sync + 'static) -> Self {
        Callback::Add(Arc::new(f))
    }

    /// Wrap a keyed adder.
    pub fn add_keyed(
        f: impl Fn(&mut Value, Value, Value) -> CbResult<()> + Send + Sync + 'static,
    ) -> Self {
        Callback::AddKeyed(Arc::new(f))
    }

    /// Variant name for diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            Callback::Default(_) => "default",
            Callback::Setter(_) => "setter",
            Callback::Accessor(_) => "accessor",
            Callback::Key(_) => "key",
            Callback::Size(_) => "size",
            Callback::Add(_) => "add",
            Callback::AddKeyed(_) => "keyed add",
            Callback::Factory(_) => "factory",
        }
    }
}

/// Arguments handed to a construction strategy.
///
/// Carries the declared name, the declaration's value (if any), and its
/// attributes, so one signature covers every construction shape.
#[derive(Debug, Clone, Copy)]
pub struct FactoryArgs<'a> {
    /// Declared node name
    pub name: &'a str,

    /// Declaration value, when one was supplied
    pub value: Option<&'a Value>,

    /// Declared attributes
    pub attrs: &'a Attrs,
}

/// A construction strategy producing the object for one declared node.
pub trait NodeFactory: Send + Sync {
    /// Build the target object for a declaration.
    fn create(&self, args: FactoryArgs<'_>) -> CbResult<Value>;
}

/// Adapter turning a closure into a [`NodeFactory`].
pub struct ClosureFactory<F>(F);

impl<F> ClosureFactory<F>
where
    F: Fn(FactoryArgs<'_>) -> CbResult<Value> + Send + Sync,
{
    /// Wrap a construction closure.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> NodeFactory for ClosureFactory<F>
where
    F: Fn(FactoryArgs<'_>) -> CbResult<Value> + Send + Sync,
{
    fn create(&self, args: FactoryArgs<'_>) -> CbResult<Value> {
        (self.0)(args)
    }
}

/// Convenience wrapper producing a shared factory handle from a closure.
pub fn factory_fn(
    f: impl Fn(FactoryArgs<'_>) -> CbResult<Value> + Send + Sync + 'static,
) -> Arc<dyn NodeFactory> {
    Arc::new(ClosureFactory::new(f))
}

/// Built-in construction strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinFactory {
    /// Materialize an attributed object node (default build strategy)
    Tree,

    /// Materialize a plain nested map
    Map,

    /// Produce a schema-node draft (definition mode)
    SchemaNode,

    /// Produce a collection-binding draft (definition mode)
    CollectionNode,
}
