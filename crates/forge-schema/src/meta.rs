//! Built-in meta-schema
//!
//! Describes what a valid schema definition looks like. Schema definitions
//! run through the ordinary engine against this schema with draft
//! factories, so definitions get the same attribute validation as builds.

use crate::attr::{Attrs, SchemaRef};
use crate::callback::BuiltinFactory;
use crate::check::{AttrShape, Check};
use crate::tree::{NodeKind, SchemaArena, SchemaId, WILDCARD};

fn shape(shapes: &[AttrShape]) -> Check {
    Check::Shape(shapes.to_vec())
}

/// Install the meta-schema into an arena, returning its root.
///
/// The root matches any name and produces schema-node drafts. Collection
/// definitions accept the binding attributes (`collection`, `size`, `key`,
/// `add`, `min`, `max`, `def`); property definitions accept `property`,
/// `req`, `def`, `min`, `max`; both element forms extend the root so
/// definitions nest to any depth.
pub fn install_meta_schema(arena: &mut SchemaArena) -> SchemaId {
    let root = arena.add(
        None,
        WILDCARD,
        NodeKind::Node,
        Attrs::new().with("factory", BuiltinFactory::SchemaNode),
    );

    let props = arena.add(
        Some(root),
        "properties",
        NodeKind::Node,
        Attrs::new().with("factory", BuiltinFactory::SchemaNode),
    );
    arena.add(Some(props), "check", NodeKind::Node, Attrs::new());
    arena.add(
        Some(props),
        "schema",
        NodeKind::Node,
        Attrs::new().with("check", shape(&[AttrShape::Str, AttrShape::Schema])),
    );
    arena.add(
        Some(props),
        "factory",
        NodeKind::Node,
        Attrs::new().with(
            "check",
            shape(&[AttrShape::Str, AttrShape::Factory, AttrShape::Fn]),
        ),
    );

    let cols = arena.add(Some(root), "collections", NodeKind::Node, Attrs::new());

    // collections { ... } blocks and the bindings declared inside them
    let col_container = arena.add(
        Some(cols),
        "collections",
        NodeKind::Node,
        Attrs::new().with("factory", BuiltinFactory::SchemaNode),
    );
    let col_binding = arena.add(
        Some(col_container),
        WILDCARD,
        NodeKind::Node,
        Attrs::new().with("factory", BuiltinFactory::CollectionNode),
    );
    let col_props = arena.add(Some(col_binding), "properties", NodeKind::Node, Attrs::new());
    for name in ["collection", "size", "add", "key"] {
        arena.add(
            Some(col_props),
            name,
            NodeKind::Node,
            Attrs::new().with("check", shape(&[AttrShape::Str, AttrShape::Fn])),
        );
    }
    for name in ["min", "max"] {
        arena.add(
            Some(col_props),
            name,
            NodeKind::Node,
            Attrs::new().with("check", shape(&[AttrShape::Int])),
        );
    }
    // a collection default may be any value
    arena.add(Some(col_props), "def", NodeKind::Node, Attrs::new());

    // collection members may have any name and are full schemas themselves
    arena.add(
        Some(col_binding),
        WILDCARD,
        NodeKind::Node,
        Attrs::new().with("schema", SchemaRef::new(root)),
    );

    // properties { ... } blocks
    let prop_container = arena.add(
        Some(cols),
        "properties",
        NodeKind::Node,
        Attrs::new().with("factory", BuiltinFactory::SchemaNode),
    );
    let prop_element = arena.add(
        Some(prop_container),
        WILDCARD,
        NodeKind::Node,
        Attrs::new().with("schema", SchemaRef::new(root)),
    );
    let prop_props = arena.add(Some(prop_element), "properties", NodeKind::Node, Attrs::new());
    arena.add(
        Some(prop_props),
        "property",
        NodeKind::Node,
        Attrs::new().with("check", shape(&[AttrShape::Str, AttrShape::Fn])),
    );
    arena.add(
        Some(prop_props),
        "req",
        NodeKind::Node,
        Attrs::new().with("check", shape(&[AttrShape::Bool])),
    );
    for name in ["def", "min", "max"] {
        arena.add(Some(prop_props), name, NodeKind::Node, Attrs::new());
    }

    root
}
