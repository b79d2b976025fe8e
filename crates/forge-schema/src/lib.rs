//! # forge-schema
//!
//! Schema model for declarative object-graph construction: the schema
//! arena and registry, attribute and check values, callback signatures,
//! inheritance with merged member views, the declaration stream type,
//! and the built-in meta-schema that schema definitions are validated
//! against.

pub mod attr;
pub mod callback;
pub mod check;
pub mod decl;
pub mod inheritance;
pub mod meta;
pub mod registry;
pub mod tree;

pub use attr::{AttrValue, Attrs, SchemaRef};
pub use callback::{
    factory_fn, BuiltinFactory, Callback, CallbackError, CbResult, ClosureFactory, FactoryArgs,
    NodeFactory,
};
pub use check::{AttrShape, Check};
pub use decl::Decl;
pub use inheritance::{MergedEntry, MergedView, ViewKind};
pub use registry::SchemaRegistry;
pub use tree::{NodeKind, SchemaArena, SchemaDraft, SchemaId, SchemaNode, WILDCARD};

use thiserror::Error;

/// Errors that can occur when working with schemas
#[derive(Error, Debug)]
pub enum Error {
    #[error("Schema not found: {0}")]
    NotFound(String),

    #[error("Invalid schema definition: {0}")]
    Definition(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, Error>;
