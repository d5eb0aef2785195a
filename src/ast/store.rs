//! Property Store: the node/edge substrate under the AST graph
//!
//! Holds node existence, one property map per node and one property map per
//! edge. Edges are identified by their `(source, target, kind)` triple. The
//! store knows nothing about fields, indices or node types; the layers above
//! it give those properties meaning.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Properties of a node or an edge
pub type PropertyMap = BTreeMap<String, Value>;

/// Identity of an edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    pub source: String,
    pub target: String,
    pub kind: String,
}

impl EdgeKey {
    pub fn new(source: &str, target: &str, kind: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            kind: kind.to_string(),
        }
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.source, self.target, self.kind)
    }
}

// ==================== Property Store ====================

#[derive(Debug, Clone, Default)]
pub struct PropertyStore {
    /// Node id → properties
    nodes: HashMap<String, PropertyMap>,

    /// Node ids in insertion order (iteration order of the store)
    node_order: Vec<String>,

    /// Edge triple → properties
    edges: HashMap<EdgeKey, PropertyMap>,

    /// Edge triples in insertion order
    edge_order: Vec<EdgeKey>,

    /// Index: source node → edges from it, in insertion order
    edges_from_index: HashMap<String, Vec<EdgeKey>>,

    /// Index: target node → edges to it, in insertion order
    edges_to_index: HashMap<String, Vec<EdgeKey>>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    // === Nodes ===

    /// Add an empty node. Returns false if the id is taken.
    pub fn add_node(&mut self, id: &str) -> bool {
        if self.nodes.contains_key(id) {
            return false;
        }
        self.nodes.insert(id.to_string(), PropertyMap::new());
        self.node_order.push(id.to_string());
        true
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Remove a node together with every edge touching it
    pub fn remove_node(&mut self, id: &str) -> Option<PropertyMap> {
        let props = self.nodes.remove(id)?;
        self.node_order.retain(|n| n != id);

        let mut incident: Vec<EdgeKey> = self.edges_from(id).to_vec();
        incident.extend(self.edges_to(id).iter().cloned());
        for key in incident {
            self.remove_edge(&key);
        }
        self.edges_from_index.remove(id);
        self.edges_to_index.remove(id);
        Some(props)
    }

    pub fn node_properties(&self, id: &str) -> Option<&PropertyMap> {
        self.nodes.get(id)
    }

    pub fn node_properties_mut(&mut self, id: &str) -> Option<&mut PropertyMap> {
        self.nodes.get_mut(id)
    }

    /// Stored id and properties, borrowed together
    pub fn node_entry(&self, id: &str) -> Option<(&str, &PropertyMap)> {
        self.nodes.get_key_value(id).map(|(k, v)| (k.as_str(), v))
    }

    /// Node ids in insertion order
    pub fn node_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.node_order.iter().map(String::as_str)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // === Edges ===

    /// Add an edge with no properties. Returns false if either endpoint is
    /// missing or the triple already exists.
    pub fn add_edge(&mut self, key: EdgeKey) -> bool {
        if !self.contains_node(&key.source)
            || !self.contains_node(&key.target)
            || self.edges.contains_key(&key)
        {
            return false;
        }
        self.edges_from_index
            .entry(key.source.clone())
            .or_default()
            .push(key.clone());
        self.edges_to_index
            .entry(key.target.clone())
            .or_default()
            .push(key.clone());
        self.edge_order.push(key.clone());
        self.edges.insert(key, PropertyMap::new());
        true
    }

    pub fn contains_edge(&self, key: &EdgeKey) -> bool {
        self.edges.contains_key(key)
    }

    pub fn remove_edge(&mut self, key: &EdgeKey) -> Option<PropertyMap> {
        let props = self.edges.remove(key)?;
        self.edge_order.retain(|k| k != key);
        if let Some(out) = self.edges_from_index.get_mut(&key.source) {
            out.retain(|k| k != key);
        }
        if let Some(inc) = self.edges_to_index.get_mut(&key.target) {
            inc.retain(|k| k != key);
        }
        Some(props)
    }

    pub fn edge_properties(&self, key: &EdgeKey) -> Option<&PropertyMap> {
        self.edges.get(key)
    }

    pub fn edge_properties_mut(&mut self, key: &EdgeKey) -> Option<&mut PropertyMap> {
        self.edges.get_mut(key)
    }

    pub fn edge_entry(&self, key: &EdgeKey) -> Option<(&EdgeKey, &PropertyMap)> {
        self.edges.get_key_value(key)
    }

    /// Edges leaving `id`, in insertion order
    pub fn edges_from(&self, id: &str) -> &[EdgeKey] {
        self.edges_from_index
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Edges entering `id`, in insertion order
    pub fn edges_to(&self, id: &str) -> &[EdgeKey] {
        self.edges_to_index
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// All edge triples in insertion order
    pub fn edge_keys(&self) -> impl Iterator<Item = &EdgeKey> + '_ {
        self.edge_order.iter()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
