//! Mutation API
//!
//! The only sanctioned way to edit an AST graph after ingestion. Every
//! operation validates first and then applies, so a failed call leaves
//! the graph exactly as it was. Index renumbering keeps each array
//! slot's indices gap-free; recorded `null` items of a list keep their
//! place relative to the nodes around them.

use log::debug;
use serde_json::Value;
use std::collections::HashSet;

use super::layout::NodeLayout;
use super::node::{Edge, Node, FIELD, INDEX, NODE_TYPE};
use super::store::{EdgeKey, PropertyMap};
use super::Ast;
use crate::config::CascadePolicy;
use crate::utils::{Error, Result};

/// A node or an edge whose properties are being set
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyTarget {
    Node(String),
    Edge(EdgeKey),
}

impl From<&str> for PropertyTarget {
    fn from(id: &str) -> Self {
        Self::Node(id.to_string())
    }
}

impl From<&String> for PropertyTarget {
    fn from(id: &String) -> Self {
        Self::Node(id.clone())
    }
}

impl From<EdgeKey> for PropertyTarget {
    fn from(key: EdgeKey) -> Self {
        Self::Edge(key)
    }
}

impl From<&EdgeKey> for PropertyTarget {
    fn from(key: &EdgeKey) -> Self {
        Self::Edge(key.clone())
    }
}

/// Mutable handle over an [`Ast`]. Changes are visible to queries as soon
/// as each call returns.
pub struct Modifier<'a> {
    ast: &'a mut Ast,
}

impl<'a> Modifier<'a> {
    pub(crate) fn new(ast: &'a mut Ast) -> Self {
        Self { ast }
    }

    pub fn ast(&self) -> &Ast {
        &*self.ast
    }

    // ==================== Node Operations ====================

    /// Create a node. `node_type` overrides any `nodeType` in `properties`.
    pub fn add_node(&mut self, id: &str, node_type: &str, properties: PropertyMap) -> Result<Node<'_>> {
        if self.ast.contains_node(id) {
            return Err(Error::DuplicateId(id.to_string()));
        }
        let mut props = properties;
        props.insert(NODE_TYPE.to_string(), Value::String(node_type.to_string()));

        let store = self.ast.store_mut();
        store.add_node(id);
        if let Some(dest) = store.node_properties_mut(id) {
            *dest = props;
        }
        debug!("added node {} ({})", id, node_type);
        self.ast.node(id)
    }

    /// Remove a node. Without `cascade` the node must have no edges.
    /// With it, touching edges go too (renumbering the old parent's array
    /// slot) and the configured [`CascadePolicy`] decides whether
    /// exclusively-owned descendants are removed or left as roots.
    /// Returns the removed ids.
    pub fn remove_node(&mut self, id: &str, cascade: bool) -> Result<Vec<String>> {
        if !self.ast.contains_node(id) {
            return Err(Error::NodeNotFound(id.to_string()));
        }
        let store = self.ast.store();
        let touching = store.edges_from(id).len() + store.edges_to(id).len();
        if !cascade && touching > 0 {
            return Err(Error::DanglingEdge {
                node: id.to_string(),
                edges: touching,
            });
        }

        let doomed = match self.ast.config().cascade_policy {
            CascadePolicy::Orphan => vec![id.to_string()],
            CascadePolicy::ExclusiveDescendants => self.exclusive_subtree(id),
        };
        let members: HashSet<&str> = doomed.iter().map(String::as_str).collect();

        for node in &doomed {
            let incoming: Vec<EdgeKey> = self.ast.store().edges_to(node).to_vec();
            for key in incoming {
                if !members.contains(key.source.as_str()) {
                    self.detach(&key);
                }
            }
        }
        for node in &doomed {
            self.ast.store_mut().remove_node(node);
            self.ast.forget_layout(node);
        }
        debug!("removed {} node(s) starting at {}", doomed.len(), id);
        Ok(doomed)
    }

    /// `id` plus every descendant whose parents all lie inside the set
    fn exclusive_subtree(&self, id: &str) -> Vec<String> {
        let store = self.ast.store();
        let kind = self.ast.config().containment_kind.as_str();
        let mut doomed = vec![id.to_string()];
        let mut members: HashSet<String> = doomed.iter().cloned().collect();

        let mut changed = true;
        while changed {
            changed = false;
            let mut i = 0;
            while i < doomed.len() {
                for key in store.edges_from(&doomed[i]) {
                    if key.kind != kind || members.contains(&key.target) {
                        continue;
                    }
                    let exclusive = store
                        .edges_to(&key.target)
                        .iter()
                        .filter(|p| p.kind == kind)
                        .all(|p| members.contains(&p.source));
                    if exclusive {
                        members.insert(key.target.clone());
                        doomed.push(key.target.clone());
                        changed = true;
                    }
                }
                i += 1;
            }
        }
        doomed
    }

    // ==================== Edge Operations ====================

    /// Create an edge filling `field` of `source`. With an `index`, the
    /// edge is inserted into the array slot and later siblings shift up.
    pub fn add_edge(
        &mut self,
        source: &str,
        target: &str,
        kind: &str,
        field: &str,
        index: Option<usize>,
    ) -> Result<Edge<'_>> {
        if !self.ast.contains_node(source) {
            return Err(Error::NodeNotFound(source.to_string()));
        }
        if !self.ast.contains_node(target) {
            return Err(Error::NodeNotFound(target.to_string()));
        }
        let key = EdgeKey::new(source, target, kind);
        if self.ast.store().contains_edge(&key) {
            return Err(Error::DuplicateEdge {
                source_id: source.to_string(),
                target_id: target.to_string(),
                kind: kind.to_string(),
            });
        }

        // Number of null items in a marker property the new child replaces
        let cleared_nulls = match self.ast.store().node_properties(source).and_then(|p| p.get(field)) {
            None => None,
            Some(Value::Null) => Some(0),
            Some(Value::Array(items)) if items.is_empty() => Some(0),
            Some(Value::Array(items)) if index.is_some() && items.iter().all(Value::is_null) => {
                Some(items.len())
            }
            Some(_) => {
                return Err(Error::structure(format!(
                    "{}.{} already holds a property value",
                    source, field
                )))
            }
        };

        let siblings = self.siblings(source, kind, field);
        match index {
            Some(i) => {
                if siblings.iter().any(|(_, idx)| idx.is_none()) {
                    return Err(Error::structure(format!(
                        "{}.{} is a single slot, not an array",
                        source, field
                    )));
                }
                if i > siblings.len() {
                    return Err(Error::IndexOutOfRange {
                        field: field.to_string(),
                        index: i,
                        len: siblings.len(),
                    });
                }
                if let Some(nulls) = cleared_nulls {
                    self.ast.layout_mut(source).set_holes(field, (0..nulls).collect());
                }
                if let Some(layout) = self.ast.layout(source) {
                    let position = layout.position(field, i);
                    self.ast.layout_mut(source).open_gap(field, position);
                }
                for (sibling, idx) in &siblings {
                    if let Some(j) = idx {
                        if *j >= i {
                            self.set_index(sibling, j + 1);
                        }
                    }
                }
            }
            None => {
                if !siblings.is_empty() {
                    return Err(Error::structure(format!(
                        "{}.{} already holds a child",
                        source, field
                    )));
                }
            }
        }

        let store = self.ast.store_mut();
        store.add_edge(key.clone());
        if let Some(props) = store.edge_properties_mut(&key) {
            props.insert(FIELD.to_string(), Value::String(field.to_string()));
            if let Some(i) = index {
                props.insert(INDEX.to_string(), Value::from(i));
            }
        }
        if cleared_nulls.is_some() {
            if let Some(props) = store.node_properties_mut(source) {
                props.remove(field);
            }
        }
        debug!("added edge {}", key);
        self.ast.edge(source, target, kind)
    }

    /// Remove an edge; later siblings in its array slot shift down
    pub fn remove_edge(&mut self, source: &str, target: &str, kind: &str) -> Result<()> {
        let key = EdgeKey::new(source, target, kind);
        if !self.ast.store().contains_edge(&key) {
            return Err(Error::edge_not_found(source, target, kind));
        }
        self.detach(&key);
        debug!("removed edge {}", key);
        Ok(())
    }

    /// Remove an existing edge and close the gap it leaves
    fn detach(&mut self, key: &EdgeKey) {
        let props = match self.ast.store_mut().remove_edge(key) {
            Some(props) => props,
            None => return,
        };
        let field = match props.get(FIELD).and_then(Value::as_str) {
            Some(field) => field,
            None => return,
        };
        let removed = match props.get(INDEX).and_then(Value::as_u64) {
            Some(i) => i as usize,
            None => return,
        };

        if let Some(layout) = self.ast.layout(&key.source) {
            let position = layout.position(field, removed);
            self.ast.layout_mut(&key.source).close_gap(field, position);
        }

        let siblings = self.siblings(&key.source, &key.kind, field);
        for (sibling, idx) in &siblings {
            if let Some(j) = idx {
                if *j > removed {
                    self.set_index(sibling, j - 1);
                }
            }
        }
        if siblings.is_empty() {
            // Keep the slot an array on reconstruction; leftover nulls
            // become a plain all-null list property
            let nulls = match self.ast.layout(&key.source) {
                Some(_) => self.ast.layout_mut(&key.source).take_holes(field).len(),
                None => 0,
            };
            if let Some(props) = self.ast.store_mut().node_properties_mut(&key.source) {
                props.insert(field.to_string(), Value::Array(vec![Value::Null; nulls]));
            }
        }
    }

    /// Edges from `source` of `kind` filling `field`, with their indices
    fn siblings(&self, source: &str, kind: &str, field: &str) -> Vec<(EdgeKey, Option<usize>)> {
        let store = self.ast.store();
        store
            .edges_from(source)
            .iter()
            .filter(|k| k.kind == kind)
            .filter_map(|k| {
                let props = store.edge_properties(k)?;
                if props.get(FIELD).and_then(Value::as_str) != Some(field) {
                    return None;
                }
                let index = props.get(INDEX).and_then(Value::as_u64).map(|i| i as usize);
                Some((k.clone(), index))
            })
            .collect()
    }

    fn set_index(&mut self, key: &EdgeKey, index: usize) {
        if let Some(props) = self.ast.store_mut().edge_properties_mut(key) {
            props.insert(INDEX.to_string(), Value::from(index));
        }
    }

    // ==================== Property Operations ====================

    /// Overwrite one property. Values are not checked against any schema.
    pub fn set_property(&mut self, target: impl Into<PropertyTarget>, key: &str, value: Value) -> Result<()> {
        let mut props = PropertyMap::new();
        props.insert(key.to_string(), value);
        self.set_properties(target, props)
    }

    /// Set a property that reconstruction nests under `attributes`
    pub fn set_attribute(&mut self, id: &str, key: &str, value: Value) -> Result<()> {
        self.set_property(id, key, value)?;
        if self.ast.layout(id).is_none() {
            let mut layout = NodeLayout::new();
            for default in &self.ast.config().attribute_keys {
                layout.record_attribute(default);
            }
            self.ast.set_layout(id, layout);
        }
        self.ast.layout_mut(id).record_attribute(key);
        Ok(())
    }

    /// Overwrite several properties at once
    pub fn set_properties(&mut self, target: impl Into<PropertyTarget>, properties: PropertyMap) -> Result<()> {
        let dest = match target.into() {
            PropertyTarget::Node(id) => self
                .ast
                .store_mut()
                .node_properties_mut(&id)
                .ok_or(Error::NodeNotFound(id))?,
            PropertyTarget::Edge(key) => {
                let missing = Error::edge_not_found(&key.source, &key.target, &key.kind);
                self.ast
                    .store_mut()
                    .edge_properties_mut(&key)
                    .ok_or(missing)?
            }
        };
        dest.extend(properties);
        Ok(())
    }
}
