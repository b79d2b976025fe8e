//! Schema registry
//!
//! Session-scoped store for schema trees: the arena, the name index used
//! for root resolution, and the memoized merged views. The meta-schema is
//! installed on construction and lives outside the name index.

use crate::inheritance::{MergedView, ViewKind};
use crate::meta::install_meta_schema;
use crate::tree::{SchemaArena, SchemaDraft, SchemaId, SchemaNode};
use crate::{Error, Result};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Registry of named schema roots backed by one arena.
pub struct SchemaRegistry {
    arena: SchemaArena,
    by_name: HashMap<String, SchemaId>,
    merged: DashMap<(SchemaId, ViewKind), Arc<MergedView>>,
    meta_root: SchemaId,
}

impl SchemaRegistry {
    /// Create a registry with the meta-schema installed.
    pub fn new() -> Self {
        let mut arena = SchemaArena::new();
        let meta_root = install_meta_schema(&mut arena);
        Self {
            arena,
            by_name: HashMap::new(),
            merged: DashMap::new(),
            meta_root,
        }
    }

    /// Root of the meta-schema describing valid schema definitions.
    pub fn meta_root(&self) -> SchemaId {
        self.meta_root
    }

    /// Borrow the arena.
    pub fn arena(&self) -> &SchemaArena {
        &self.arena
    }

    /// Borrow a node.
    pub fn node(&self, id: SchemaId) -> &SchemaNode {
        self.arena.node(id)
    }

    /// Register a schema root under a name.
    ///
    /// Replacing an existing name invalidates the merged-view memos.
    /// Returns the id the name previously mapped to, if any.
    pub fn register(&mut self, name: impl Into<String>, id: SchemaId) -> Option<SchemaId> {
        let name = name.into();
        debug!("Registering schema: {}", name);
        let replaced = self.by_name.insert(name, id);
        if replaced.is_some() {
            self.merged.clear();
        }
        replaced
    }

    /// Intern an owned draft subtree into the arena.
    pub fn intern(&mut self, draft: SchemaDraft) -> SchemaId {
        self.arena.intern(draft)
    }

    /// Look up a registered schema root.
    pub fn get(&self, name: &str) -> Option<SchemaId> {
        self.by_name.get(name).copied()
    }

    /// True when a name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Register an additional name for an already-registered schema.
    pub fn alias(&mut self, alias: impl Into<String>, existing: &str) -> Result<SchemaId> {
        let id = self
            .get(existing)
            .ok_or_else(|| Error::NotFound(existing.to_string()))?;
        self.register(alias, id);
        Ok(id)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Deep-copy a schema subtree; the copy starts parentless.
    pub fn deep_copy(&mut self, id: SchemaId) -> SchemaId {
        self.arena.deep_copy(id)
    }

    /// Move a schema node under a new parent.
    ///
    /// Structural edits invalidate the merged-view memos.
    pub fn reparent(&mut self, child: SchemaId, new_parent: SchemaId) {
        self.merged.clear();
        self.arena.reparent(child, new_parent);
    }

    pub(crate) fn merged_cached(&self, key: (SchemaId, ViewKind)) -> Option<Arc<MergedView>> {
        self.merged.get(&key).map(|v| Arc::clone(&v))
    }

    pub(crate) fn merged_store(&self, key: (SchemaId, ViewKind), view: Arc<MergedView>) {
        self.merged.insert(key, view);
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}
