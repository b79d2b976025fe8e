//! Arena-backed schema tree
//!
//! Schema nodes live in an append-only arena and reference each other by
//! `SchemaId`, so back-references and cross-references never form ownership
//! cycles. Child order is insertion order and is significant: the first
//! same-named child wins lookups.

use crate::attr::Attrs;

/// Name of the catch-all schema position.
pub const WILDCARD: &str = "%";

/// Container names skipped when rendering qualified paths.
const PATH_SKIPPED: [&str; 4] = [
    "properties",
    "collections",
    "mergedProperties",
    "mergedCollections",
];

/// Index of a schema node within its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaId(usize);

impl SchemaId {
    /// Raw arena index, for diagnostics.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Role of a schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Ordinary schema position (node, property, or container)
    Node,

    /// Collection binding: children attach into a parent collection
    Collection,
}

/// One node of a schema tree.
#[derive(Debug, Clone)]
pub struct SchemaNode {
    name: String,
    kind: NodeKind,
    attrs: Attrs,
    parent: Option<SchemaId>,
    children: Vec<SchemaId>,
}

impl SchemaNode {
    /// Node name; not necessarily unique among siblings.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Node role.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Attribute map.
    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    /// Structural parent, if any.
    pub fn parent(&self) -> Option<SchemaId> {
        self.parent
    }

    /// Ordered child ids.
    pub fn children(&self) -> &[SchemaId] {
        &self.children
    }

    /// True for collection bindings.
    pub fn is_collection(&self) -> bool {
        self.kind == NodeKind::Collection
    }
}

/// An owned schema subtree produced during definition, before interning.
#[derive(Debug, Clone)]
pub struct SchemaDraft {
    pub name: String,
    pub kind: NodeKind,
    pub attrs: Attrs,
    pub children: Vec<SchemaDraft>,
}

impl SchemaDraft {
    /// Start an empty draft node.
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            attrs: Attrs::new(),
            children: Vec::new(),
        }
    }
}

/// Append-only storage for schema nodes.
#[derive(Debug, Default)]
pub struct SchemaArena {
    nodes: Vec<SchemaNode>,
}

impl SchemaArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Number of nodes allocated.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when no nodes have been allocated.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocate a node, appending it to `parent`'s children when given.
    pub fn add(
        &mut self,
        parent: Option<SchemaId>,
        name: impl Into<String>,
        kind: NodeKind,
        attrs: Attrs,
    ) -> SchemaId {
        let id = SchemaId(self.nodes.len());
        self.nodes.push(SchemaNode {
            name: name.into(),
            kind,
            attrs,
            parent,
            children: Vec::new(),
        });
        if let Some(pid) = parent {
            self.nodes[pid.0].children.push(id);
        }
        id
    }

    /// Borrow a node.
    pub fn node(&self, id: SchemaId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    /// First child with the given name, in insertion order.
    pub fn first_child(&self, id: SchemaId, name: &str) -> Option<SchemaId> {
        self.nodes[id.0]
            .children
            .iter()
            .copied()
            .find(|cid| self.nodes[cid.0].name == name)
    }

    /// Move `child` under `new_parent`, removing it from its former parent.
    pub fn reparent(&mut self, child: SchemaId, new_parent: SchemaId) {
        if let Some(old) = self.nodes[child.0].parent {
            self.nodes[old.0].children.retain(|cid| *cid != child);
        }
        self.nodes[child.0].parent = Some(new_parent);
        self.nodes[new_parent.0].children.push(child);
    }

    /// Recursively clone a subtree into fresh, parentless nodes.
    ///
    /// Attribute values are cloned as values; callable and schema handles
    /// inside them stay shared with the original.
    pub fn deep_copy(&mut self, id: SchemaId) -> SchemaId {
        self.deep_copy_under(id, None)
    }

    fn deep_copy_under(&mut self, id: SchemaId, parent: Option<SchemaId>) -> SchemaId {
        let (name, kind, attrs, children) = {
            let node = &self.nodes[id.0];
            (
                node.name.clone(),
                node.kind,
                node.attrs.clone(),
                node.children.clone(),
            )
        };
        let copy = self.add(parent, name, kind, attrs);
        for child in children {
            self.deep_copy_under(child, Some(copy));
        }
        copy
    }

    /// Intern an owned draft subtree, returning the id of its root.
    pub fn intern(&mut self, draft: SchemaDraft) -> SchemaId {
        self.intern_under(draft, None)
    }

    fn intern_under(&mut self, draft: SchemaDraft, parent: Option<SchemaId>) -> SchemaId {
        let id = self.add(parent, draft.name, draft.kind, draft.attrs);
        for child in draft.children {
            self.intern_under(child, Some(id));
        }
        id
    }

    /// Dot-joined path from the tree root to this node.
    ///
    /// Structural containers and merged-view nodes are skipped so paths read
    /// `invoice.items.item` however the node was reached.
    pub fn fqn(&self, id: SchemaId) -> String {
        let mut segments = vec![self.nodes[id.0].name.as_str()];
        let mut cur = self.nodes[id.0].parent;
        while let Some(pid) = cur {
            let node = &self.nodes[pid.0];
            if !PATH_SKIPPED.contains(&node.name.as_str()) {
                segments.push(node.name.as_str());
            }
            cur = node.parent;
        }
        segments.reverse();
        segments.join(".")
    }

    /// Qualified path for a member of this node, e.g. a merged property.
    pub fn fqn_member(&self, id: SchemaId, member: &str) -> String {
        let mut path = self.fqn(id);
        path.push('.');
        path.push_str(member);
        path
    }
}
