#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # forge-tree
//!
//! Dynamic value model for built object graphs.
//!
//! Graph construction produces `Value` trees: scalars, ordered lists, keyed
//! maps, and named `ObjectNode` records with ordered fields. Values serialize
//! to plain JSON/YAML (object nodes flatten to their field maps), so built
//! graphs can be emitted directly or converted into typed structs downstream.

/// Named object-node product type with ordered fields.
pub mod node;
/// Dynamic value enum, comparisons, and serde support.
pub mod value;

/// Attributed record produced by the default tree factory.
pub use node::ObjectNode;
/// Value primitives for graph content.
pub use value::{Value, ValueKind};
