#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # forge-graph
//!
//! Schema-driven object-graph construction engine.
//!
//! This crate walks declaration streams against registered schemas,
//! producing object graphs in build mode and schema trees in define mode,
//! with property and collection constraints enforced along the way.
//!
//! ## Example Usage
//!
//! ```rust
//! use forge_graph::Forge;
//! use forge_schema::Decl;
//! use forge_tree::Value;
//!
//! let mut forge = Forge::new();
//!
//! // Define a schema with one defaulted property
//! forge
//!     .define(
//!         &Decl::from_yaml_str(
//!             "
//! name: invoice
//! children:
//!   - name: properties
//!     children:
//!       - name: total
//!         attrs:
//!           def: 0
//! ",
//!         )
//!         .unwrap(),
//!     )
//!     .unwrap();
//!
//! // Build an object graph against it
//! let invoice = forge.build(&Decl::node("invoice").attr("total", 25)).unwrap();
//! assert_eq!(invoice.get("total"), Some(&Value::Int(25)));
//! ```

pub mod builder;
mod collection;
mod factory;
pub mod session;

// Re-export main types
pub use builder::{Built, GraphBuilder, Mode};
pub use session::{map_factory, Forge};

use forge_schema::CallbackError;
use thiserror::Error;

/// Errors raised while walking a declaration stream.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Schema not found: {name}")]
    SchemaNotFound { name: String },

    #[error("Property violation at {path}: {reason}")]
    Property {
        path: String,
        reason: String,
        #[source]
        source: Option<CallbackError>,
    },

    #[error("Collection violation at {path}: {reason}")]
    Collection {
        path: String,
        reason: String,
        #[source]
        source: Option<CallbackError>,
    },

    #[error("Node violation at {path}: {reason}")]
    Node { path: String, reason: String },

    #[error("Construction failed at {path}: {reason}")]
    Factory {
        path: String,
        reason: String,
        #[source]
        source: Option<CallbackError>,
    },

    #[error(transparent)]
    Schema(#[from] forge_schema::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
