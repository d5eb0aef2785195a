//! Borrowed views over stored nodes and edges
//!
//! Node types are plain data: a `Node` never knows what its `nodeType`
//! means, it only exposes the property map with a few typed accessors for
//! the position metadata every parser attaches.

use serde_json::Value;

use super::store::{EdgeKey, PropertyMap};
use crate::config::SYNTHETIC_LINE;

pub const NODE_TYPE: &str = "nodeType";
pub const FIELD: &str = "field";
pub const INDEX: &str = "index";

// ==================== Node ====================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node<'a> {
    id: &'a str,
    props: &'a PropertyMap,
}

impl<'a> Node<'a> {
    pub(crate) fn new(id: &'a str, props: &'a PropertyMap) -> Self {
        Self { id, props }
    }

    pub fn id(&self) -> &'a str {
        self.id
    }

    /// The `nodeType` discriminator, e.g. `Stmt_Function`
    pub fn node_type(&self) -> Option<&'a str> {
        self.props.get(NODE_TYPE).and_then(Value::as_str)
    }

    pub fn is_type(&self, node_type: &str) -> bool {
        self.node_type() == Some(node_type)
    }

    /// All properties, flattened attributes included
    pub fn properties(&self) -> &'a PropertyMap {
        self.props
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.props.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.props.contains_key(key)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.contains(name)
    }

    pub fn get_attribute(&self, name: &str) -> Option<&'a Value> {
        self.get(name)
    }

    fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn start_line(&self) -> Option<i64> {
        self.get_i64("startLine")
    }

    pub fn end_line(&self) -> Option<i64> {
        self.get_i64("endLine")
    }

    pub fn start_file_pos(&self) -> Option<i64> {
        self.get_i64("startFilePos")
    }

    pub fn end_file_pos(&self) -> Option<i64> {
        self.get_i64("endFilePos")
    }

    pub fn start_token_pos(&self) -> Option<i64> {
        self.get_i64("startTokenPos")
    }

    pub fn end_token_pos(&self) -> Option<i64> {
        self.get_i64("endTokenPos")
    }

    pub fn comments(&self) -> Option<&'a Vec<Value>> {
        self.get("comments").and_then(Value::as_array)
    }

    /// Organizer-made nodes carry out-of-band line numbers
    pub fn is_synthetic(&self) -> bool {
        self.start_line() == Some(SYNTHETIC_LINE) && self.end_line() == Some(SYNTHETIC_LINE)
    }
}

// ==================== Edge ====================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge<'a> {
    key: &'a EdgeKey,
    props: &'a PropertyMap,
}

impl<'a> Edge<'a> {
    pub(crate) fn new(key: &'a EdgeKey, props: &'a PropertyMap) -> Self {
        Self { key, props }
    }

    pub fn key(&self) -> &'a EdgeKey {
        self.key
    }

    pub fn source(&self) -> &'a str {
        &self.key.source
    }

    pub fn target(&self) -> &'a str {
        &self.key.target
    }

    pub fn kind(&self) -> &'a str {
        &self.key.kind
    }

    /// Sub-node slot of the parent this edge fills
    pub fn field(&self) -> Option<&'a str> {
        self.props.get(FIELD).and_then(Value::as_str)
    }

    /// Position within an array slot; `None` for a single slot
    pub fn index(&self) -> Option<usize> {
        self.props
            .get(INDEX)
            .and_then(Value::as_u64)
            .map(|i| i as usize)
    }

    pub fn properties(&self) -> &'a PropertyMap {
        self.props
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.props.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.props.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(pairs: &[(&str, Value)]) -> PropertyMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_node_accessors() {
        let p = props(&[
            ("nodeType", json!("Stmt_Echo")),
            ("startLine", json!(3)),
            ("endLine", json!(4)),
            ("startFilePos", json!(10)),
            ("comments", json!([{"nodeType": "Comment", "text": "// hi"}])),
        ]);
        let node = Node::new("node_1", &p);
        assert_eq!(node.id(), "node_1");
        assert_eq!(node.node_type(), Some("Stmt_Echo"));
        assert!(node.is_type("Stmt_Echo"));
        assert_eq!(node.start_line(), Some(3));
        assert_eq!(node.end_line(), Some(4));
        assert_eq!(node.start_file_pos(), Some(10));
        assert_eq!(node.end_file_pos(), None);
        assert_eq!(node.comments().map(Vec::len), Some(1));
        assert!(node.has_attribute("startLine"));
        assert!(!node.is_synthetic());
    }

    #[test]
    fn test_synthetic_marker() {
        let p = props(&[
            ("nodeType", json!("File")),
            ("startLine", json!(-1)),
            ("endLine", json!(-1)),
        ]);
        assert!(Node::new("abc", &p).is_synthetic());
    }

    #[test]
    fn test_edge_field_and_index() {
        let key = EdgeKey::new("a", "b", "PARENT_OF");
        let p = props(&[("field", json!("stmts")), ("index", json!(2))]);
        let edge = Edge::new(&key, &p);
        assert_eq!(edge.source(), "a");
        assert_eq!(edge.target(), "b");
        assert_eq!(edge.kind(), "PARENT_OF");
        assert_eq!(edge.field(), Some("stmts"));
        assert_eq!(edge.index(), Some(2));

        let single = props(&[("field", json!("name"))]);
        assert_eq!(Edge::new(&key, &single).index(), None);
    }
}
