//! Graph to nested document reconstruction
//!
//! The inverse of the converter. Properties the node's layout marks as
//! attributes go back under `attributes`; containment edges are grouped by
//! `field` (first seen first) and emitted as a single object or as a list
//! ordered by `index`, with recorded `null` items restored in place.
//! Output objects are key-sorted, so rebuilding an unmodified graph is
//! byte-stable.

use log::debug;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};

use super::node::{Edge, INDEX, NODE_TYPE};
use super::{Ast, DocumentShape};
use crate::config::AstConfig;
use crate::utils::{Error, Result};

/// Filters applied while rebuilding
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconstructOptions {
    /// Edge kinds that are not followed
    pub exclude_kinds: BTreeSet<String>,
    /// Node types that are transparent: replaced by their own children
    pub exclude_node_types: BTreeSet<String>,
}

impl ReconstructOptions {
    /// Skip the organizer's project and file nodes
    pub fn excluding_synthetic(config: &AstConfig) -> Self {
        Self {
            exclude_kinds: BTreeSet::new(),
            exclude_node_types: config.synthetic_node_types().into_iter().collect(),
        }
    }
}

/// Children of one field, in output order
enum Slot<'a> {
    Single(&'a str),
    List(Vec<&'a str>),
}

impl Ast {
    /// Rebuild the given roots into a nested document. A graph ingested
    /// from a single object gives that object back; otherwise, and
    /// whenever the roots rebuild to anything but one item, a list.
    pub fn reconstruct<S: AsRef<str>>(&self, roots: &[S], options: &ReconstructOptions) -> Result<Value> {
        let mut path = HashSet::new();
        let mut out = Vec::new();
        for root in roots {
            out.extend(self.expand(root.as_ref(), options, &mut path)?);
        }
        debug!("reconstructed {} root(s) into {} item(s)", roots.len(), out.len());
        if self.document_shape() == DocumentShape::Object && out.len() == 1 {
            return Ok(out.remove(0));
        }
        Ok(Value::Array(out))
    }

    /// Rebuild one node as a nested object, synthetic or not
    pub fn reconstruct_node(&self, id: &str) -> Result<Value> {
        self.build(id, &ReconstructOptions::default(), &mut HashSet::new())
    }

    /// Ids of nodes with no incoming containment edge, in insertion order
    pub fn root_ids(&self) -> Vec<&str> {
        let kind = &self.config().containment_kind;
        self.store()
            .node_ids()
            .filter(|id| !self.store().edges_to(id).iter().any(|k| &k.kind == kind))
            .collect()
    }

    /// Rebuild the whole graph, looking through project and file nodes
    pub fn to_document(&self) -> Result<Value> {
        let options = ReconstructOptions::excluding_synthetic(self.config());
        self.reconstruct(&self.root_ids(), &options)
    }

    /// The whole graph as a JSON string for the external printer
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_document()?)?)
    }

    /// A node's rebuilt form(s): itself, or its children if transparent
    fn expand(&self, id: &str, options: &ReconstructOptions, path: &mut HashSet<String>) -> Result<Vec<Value>> {
        let node = self.node(id)?;
        let transparent = node
            .node_type()
            .map(|t| options.exclude_node_types.contains(t))
            .unwrap_or(false);
        if !transparent {
            return Ok(vec![self.build(id, options, path)?]);
        }

        enter(path, id)?;
        let mut out = Vec::new();
        for (_, slot) in self.slots(id, options)? {
            let children = match slot {
                Slot::Single(child) => vec![child],
                Slot::List(children) => children,
            };
            for child in children {
                out.extend(self.expand(child, options, path)?);
            }
        }
        path.remove(id);
        Ok(out)
    }

    fn build(&self, id: &str, options: &ReconstructOptions, path: &mut HashSet<String>) -> Result<Value> {
        let node = self.node(id)?;
        enter(path, id)?;

        let mut obj = Map::new();
        let mut attributes = Map::new();
        for (key, value) in node.properties() {
            if key == NODE_TYPE {
                if !value.is_string() {
                    return Err(Error::structure(format!("{} has a non-string nodeType", id)));
                }
                obj.insert(key.clone(), value.clone());
            } else if self.is_attribute(id, key) {
                attributes.insert(key.clone(), value.clone());
            } else {
                obj.insert(key.clone(), value.clone());
            }
        }
        if !obj.contains_key(NODE_TYPE) {
            return Err(Error::structure(format!("{} has no nodeType", id)));
        }

        for (field, slot) in self.slots(id, options)? {
            let value = match slot {
                Slot::Single(child) => {
                    let mut rebuilt = self.expand(child, options, path)?;
                    match rebuilt.len() {
                        0 => continue,
                        1 => rebuilt.remove(0),
                        n => {
                            return Err(Error::structure(format!(
                                "{}.{} is a single slot but expands to {} nodes",
                                id, field, n
                            )))
                        }
                    }
                }
                Slot::List(children) => {
                    let holes = self.layout(id).and_then(|l| l.holes(field));
                    let total = children.len() + holes.map_or(0, |h| h.len());
                    if let Some(last) = holes.and_then(|h| h.iter().next_back()) {
                        if *last >= total {
                            return Err(Error::structure(format!(
                                "{}.{} has a null item at {} past the list end",
                                id, field, last
                            )));
                        }
                    }
                    let mut nodes = children.into_iter();
                    let mut items = Vec::with_capacity(total);
                    for position in 0..total {
                        if holes.map_or(false, |h| h.contains(&position)) {
                            items.push(Value::Null);
                        } else if let Some(child) = nodes.next() {
                            items.extend(self.expand(child, options, path)?);
                        }
                    }
                    Value::Array(items)
                }
            };
            match obj.get(field) {
                None => {}
                Some(Value::Array(existing)) if existing.is_empty() => {}
                Some(Value::Null) => {}
                Some(_) => {
                    return Err(Error::structure(format!(
                        "{}.{} is both a property and a sub-node slot",
                        id, field
                    )))
                }
            }
            obj.insert(field.to_string(), value);
        }

        if !attributes.is_empty() {
            obj.insert("attributes".to_string(), Value::Object(attributes));
        }
        path.remove(id);
        Ok(Value::Object(obj))
    }

    /// Outgoing containment edges of `id`, grouped by field
    fn slots(&self, id: &str, options: &ReconstructOptions) -> Result<Vec<(&str, Slot<'_>)>> {
        let kind = self.config().containment_kind.as_str();
        let mut groups: Vec<(&str, Vec<Edge<'_>>)> = Vec::new();
        for edge in self.out_edges(id)? {
            if edge.kind() != kind || options.exclude_kinds.contains(edge.kind()) {
                continue;
            }
            let field = edge.field().ok_or_else(|| {
                Error::structure(format!("containment edge {} has no field", edge.key()))
            })?;
            match edge.get(INDEX) {
                None | Some(Value::Null) => {}
                Some(v) if v.as_u64().is_some() => {}
                Some(_) => {
                    return Err(Error::structure(format!(
                        "containment edge {} has a non-integer index",
                        edge.key()
                    )))
                }
            }
            match groups.iter_mut().find(|(f, _)| *f == field) {
                Some((_, edges)) => edges.push(edge),
                None => groups.push((field, vec![edge])),
            }
        }

        let mut slots = Vec::with_capacity(groups.len());
        for (field, mut edges) in groups {
            let indexed = edges.iter().filter(|e| e.index().is_some()).count();
            if indexed == 0 {
                if edges.len() > 1 {
                    return Err(Error::structure(format!(
                        "{}.{} has {} unindexed children",
                        id,
                        field,
                        edges.len()
                    )));
                }
                slots.push((field, Slot::Single(edges[0].target())));
                continue;
            }
            if indexed != edges.len() {
                return Err(Error::structure(format!(
                    "{}.{} mixes indexed and unindexed children",
                    id, field
                )));
            }
            edges.sort_by_key(|e| e.index());
            if let Some(pair) = edges.windows(2).find(|w| w[0].index() == w[1].index()) {
                return Err(Error::structure(format!(
                    "{}.{} has two children at index {}",
                    id,
                    field,
                    pair[0].index().unwrap_or_default()
                )));
            }
            slots.push((field, Slot::List(edges.iter().map(|e| e.target()).collect())));
        }
        Ok(slots)
    }
}

fn enter(path: &mut HashSet<String>, id: &str) -> Result<()> {
    if !path.insert(id.to_string()) {
        return Err(Error::structure(format!("containment cycle through {}", id)));
    }
    Ok(())
}
