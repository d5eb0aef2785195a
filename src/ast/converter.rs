//! Nested document to graph converter
//!
//! Walks the document depth-first. Each object with a `nodeType` gets the
//! next id in pre-order, its scalar fields become properties, its
//! `attributes` object is flattened onto the same property map, and each
//! object or list-of-objects field becomes containment edges. `null` items
//! in a node list get no edge; their positions go into the node's layout.

use log::debug;
use serde_json::{Map, Value};

use super::node::{FIELD, INDEX, NODE_TYPE};
use super::layout::NodeLayout;
use super::store::EdgeKey;
use super::Ast;
use crate::config::NullPolicy;
use crate::utils::{Error, Result};

const ATTRIBUTES: &str = "attributes";

/// Sub-node slot found while scanning an object's fields
enum ChildSlot<'d> {
    Single(&'d Map<String, Value>),
    List(&'d [Value]),
}

/// Converter from nested documents to graph content
pub struct TreeConverter<'a> {
    ast: &'a mut Ast,
    /// Id namespace; `None` yields `node_<n>`, `Some(p)` yields `<p>_<n>`
    prefix: Option<String>,
    next_id: usize,
    edges_created: usize,
}

impl<'a> TreeConverter<'a> {
    pub fn new(ast: &'a mut Ast, prefix: Option<String>) -> Self {
        Self {
            ast,
            prefix,
            next_id: 1,
            edges_created: 0,
        }
    }

    /// Convert a document (one node or a list of top-level nodes).
    /// Returns the top-level node ids in document order.
    pub fn convert(mut self, document: &Value) -> Result<Vec<String>> {
        let roots = match document {
            Value::Object(obj) => vec![self.convert_node(obj)?],
            Value::Array(items) => {
                let mut roots = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let obj = as_node_object(item).ok_or_else(|| {
                        Error::structure(format!("top-level item {} is not a node object", i))
                    })?;
                    roots.push(self.convert_node(obj)?);
                }
                roots
            }
            other => {
                return Err(Error::structure(format!(
                    "document must be a node or a list of nodes, got {}",
                    json_kind(other)
                )))
            }
        };
        debug!(
            "ingested {} root(s), {} node(s), {} edge(s)",
            roots.len(),
            self.next_id - 1,
            self.edges_created
        );
        Ok(roots)
    }

    fn allocate_id(&mut self) -> String {
        let n = self.next_id;
        self.next_id += 1;
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix, n),
            None => format!("node_{}", n),
        }
    }

    /// Convert one node object and everything below it
    fn convert_node(&mut self, obj: &Map<String, Value>) -> Result<String> {
        let node_type = match obj.get(NODE_TYPE) {
            Some(Value::String(t)) => t.clone(),
            Some(other) => {
                return Err(Error::structure(format!(
                    "nodeType must be a string, got {}",
                    json_kind(other)
                )))
            }
            None => return Err(Error::structure("object is missing nodeType")),
        };

        let id = self.allocate_id();
        if !self.ast.store_mut().add_node(&id) {
            return Err(Error::DuplicateId(id));
        }

        let preserve_nulls = self.ast.config().null_policy == NullPolicy::Preserve;
        let mut props = super::PropertyMap::new();
        let mut layout = NodeLayout::new();
        props.insert(NODE_TYPE.to_string(), Value::String(node_type.clone()));
        let mut children: Vec<(&str, ChildSlot<'_>)> = Vec::new();

        for (key, value) in obj {
            if key == NODE_TYPE {
                continue;
            }
            if key == ATTRIBUTES {
                match value {
                    Value::Object(attrs) => {
                        for (attr, attr_value) in attrs {
                            if obj.contains_key(attr) {
                                return Err(Error::structure(format!(
                                    "{} attribute '{}' collides with a field of the same name",
                                    node_type, attr
                                )));
                            }
                            if attr_value.is_null() && !preserve_nulls {
                                continue;
                            }
                            layout.record_attribute(attr);
                            props.insert(attr.clone(), attr_value.clone());
                        }
                    }
                    Value::Null => {}
                    other => {
                        return Err(Error::structure(format!(
                            "{}.attributes must be an object, got {}",
                            node_type,
                            json_kind(other)
                        )))
                    }
                }
                continue;
            }

            match value {
                Value::Null => {
                    if preserve_nulls {
                        layout.record_field(key);
                        props.insert(key.clone(), Value::Null);
                    }
                }
                Value::Bool(_) | Value::Number(_) | Value::String(_) => {
                    layout.record_field(key);
                    props.insert(key.clone(), value.clone());
                }
                Value::Object(child) => {
                    if !child.contains_key(NODE_TYPE) {
                        return Err(Error::structure(format!(
                            "{}.{} is an object without nodeType",
                            node_type, key
                        )));
                    }
                    children.push((key.as_str(), ChildSlot::Single(child)));
                }
                Value::Array(items) => {
                    if items.is_empty() || items.iter().all(is_scalar) {
                        // Scalar lists, and the empty list marker
                        layout.record_field(key);
                        props.insert(key.clone(), value.clone());
                    } else if items.iter().all(|item| item.is_null() || as_node_object(item).is_some()) {
                        children.push((key.as_str(), ChildSlot::List(items)));
                    } else {
                        return Err(Error::structure(format!(
                            "{}.{} mixes nodes with other values",
                            node_type, key
                        )));
                    }
                }
            }
        }

        if let Some(dest) = self.ast.store_mut().node_properties_mut(&id) {
            *dest = props;
        }

        for (field, slot) in children {
            match slot {
                ChildSlot::Single(child) => {
                    let child_id = self.convert_node(child)?;
                    self.link(&id, &child_id, field, None)?;
                }
                ChildSlot::List(items) => {
                    let mut index = 0;
                    for (position, item) in items.iter().enumerate() {
                        match as_node_object(item) {
                            Some(child) => {
                                let child_id = self.convert_node(child)?;
                                self.link(&id, &child_id, field, Some(index))?;
                                index += 1;
                            }
                            None => layout.record_hole(field, position),
                        }
                    }
                }
            }
        }

        self.ast.set_layout(&id, layout);
        Ok(id)
    }

    fn link(&mut self, parent: &str, child: &str, field: &str, index: Option<usize>) -> Result<()> {
        let kind = self.ast.config().containment_kind.clone();
        let key = EdgeKey::new(parent, child, &kind);
        let store = self.ast.store_mut();
        if !store.add_edge(key.clone()) {
            return Err(Error::DuplicateEdge {
                source_id: parent.to_string(),
                target_id: child.to_string(),
                kind,
            });
        }
        if let Some(props) = store.edge_properties_mut(&key) {
            props.insert(FIELD.to_string(), Value::String(field.to_string()));
            if let Some(i) = index {
                props.insert(INDEX.to_string(), Value::from(i));
            }
        }
        self.edges_created += 1;
        Ok(())
    }
}

fn as_node_object(value: &Value) -> Option<&Map<String, Value>> {
    value.as_object().filter(|obj| obj.contains_key(NODE_TYPE))
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
