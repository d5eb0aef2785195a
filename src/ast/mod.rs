//! AST graph: a parser's nested tree document held as a property graph
//!
//! Every object carrying a `nodeType` becomes a node; every nested sub-node
//! becomes a containment edge labelled with the parent's `field` and, for
//! array slots, the child's `index`. That edge metadata is all that is
//! needed to rebuild the exact document again.

pub mod store;
pub mod node;
pub mod layout;
pub mod converter;
pub mod reconstruct;
pub mod query;
pub mod mutation;

pub use store::{EdgeKey, PropertyMap, PropertyStore};
pub use node::{Edge, Node};
pub use layout::NodeLayout;
pub use reconstruct::ReconstructOptions;
pub use query::Traversal;
pub use mutation::{Modifier, PropertyTarget};

use serde_json::Value;
use std::collections::HashMap;

use crate::config::AstConfig;
use crate::utils::{Error, Result};

// ==================== AST Graph ====================

/// Top-level shape of the ingested document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentShape {
    /// A single node object
    Object,
    /// A list of top-level nodes
    #[default]
    List,
}

/// One graph instance. Owns its store outright; nothing is shared
/// between instances.
#[derive(Debug, Clone)]
pub struct Ast {
    store: PropertyStore,

    config: AstConfig,

    /// Ingested shape of each node; absent for nodes made by mutation
    layouts: HashMap<String, NodeLayout>,

    shape: DocumentShape,
}

impl Default for Ast {
    fn default() -> Self {
        Self::with_config(AstConfig::default())
    }
}

impl Ast {
    /// Create an empty graph with the default config
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: AstConfig) -> Self {
        Self {
            store: PropertyStore::new(),
            config,
            layouts: HashMap::new(),
            shape: DocumentShape::List,
        }
    }

    /// Ingest a nested tree document with the default config.
    /// Returns the graph and the ids of the document's top-level nodes.
    pub fn ingest(document: &Value) -> Result<(Ast, Vec<String>)> {
        Self::ingest_with_config(document, AstConfig::default())
    }

    pub fn ingest_with_config(document: &Value, config: AstConfig) -> Result<(Ast, Vec<String>)> {
        let mut ast = Ast::with_config(config);
        let roots = converter::TreeConverter::new(&mut ast, None).convert(document)?;
        if document.is_object() {
            ast.shape = DocumentShape::Object;
        }
        Ok((ast, roots))
    }

    pub fn config(&self) -> &AstConfig {
        &self.config
    }

    /// Read-only access to the substrate
    pub fn store(&self) -> &PropertyStore {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut PropertyStore {
        &mut self.store
    }

    /// Whether reconstruction yields a bare object or a list
    pub fn document_shape(&self) -> DocumentShape {
        self.shape
    }

    pub fn layout(&self, id: &str) -> Option<&NodeLayout> {
        self.layouts.get(id)
    }

    pub(crate) fn set_layout(&mut self, id: &str, layout: NodeLayout) {
        self.layouts.insert(id.to_string(), layout);
    }

    pub(crate) fn layout_mut(&mut self, id: &str) -> &mut NodeLayout {
        self.layouts.entry(id.to_string()).or_default()
    }

    pub(crate) fn forget_layout(&mut self, id: &str) {
        self.layouts.remove(id);
    }

    /// Whether property `key` of node `id` belongs under `attributes`
    pub fn is_attribute(&self, id: &str, key: &str) -> bool {
        let defaults = &self.config.attribute_keys;
        match self.layouts.get(id) {
            Some(layout) => layout.nests(key, defaults),
            None => defaults.iter().any(|d| d == key),
        }
    }

    /// Property names of `id` that reconstruction nests under `attributes`
    pub fn attribute_keys(&self, id: &str) -> Result<Vec<&str>> {
        let node = self.node(id)?;
        Ok(node
            .properties()
            .keys()
            .map(String::as_str)
            .filter(|key| self.is_attribute(id, key))
            .collect())
    }

    /// Edit the graph through the invariant-checking mutation API
    pub fn modifier(&mut self) -> Modifier<'_> {
        Modifier::new(self)
    }

    pub fn node_count(&self) -> usize {
        self.store.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.store.edge_count()
    }

    /// Move every node and edge of `other` into this graph. Fails before
    /// touching anything if an id is already taken.
    pub(crate) fn absorb(&mut self, other: Ast) -> Result<()> {
        if let Some(taken) = other.store.node_ids().find(|id| self.store.contains_node(id)) {
            return Err(Error::DuplicateId(taken.to_string()));
        }
        self.layouts.extend(other.layouts);
        let other_store = other.store;
        for id in other_store.node_ids() {
            self.store.add_node(id);
            if let Some(props) = other_store.node_properties(id) {
                if let Some(dest) = self.store.node_properties_mut(id) {
                    *dest = props.clone();
                }
            }
        }
        for key in other_store.edge_keys() {
            self.store.add_edge(key.clone());
            if let Some(props) = other_store.edge_properties(key) {
                if let Some(dest) = self.store.edge_properties_mut(key) {
                    *dest = props.clone();
                }
            }
        }
        Ok(())
    }
}
