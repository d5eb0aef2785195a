//! Query API: lookups and traversals over the AST graph
//!
//! Every sequence is a lazy iterator borrowing the graph; calling the
//! method again starts a fresh pass. Structural traversals follow only
//! containment edges. Optional predicates are plain `Iterator::filter`
//! calls on the returned sequence.

use std::collections::{HashSet, VecDeque};

use super::node::{Edge, Node, FIELD};
use super::store::EdgeKey;
use super::Ast;
use crate::utils::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Down,
    Up,
}

/// Breadth-first walk over ancestors or descendants. Never yields a node
/// twice and never yields its start node.
pub struct Traversal<'a> {
    ast: &'a Ast,
    direction: Direction,
    queue: VecDeque<&'a str>,
    visited: HashSet<&'a str>,
}

impl<'a> Traversal<'a> {
    fn new(ast: &'a Ast, start: &'a str, direction: Direction) -> Self {
        let mut walk = Self {
            ast,
            direction,
            queue: VecDeque::new(),
            visited: HashSet::new(),
        };
        walk.visited.insert(start);
        walk.enqueue_neighbours(start);
        walk
    }

    fn enqueue_neighbours(&mut self, id: &'a str) {
        let ast = self.ast;
        for next in ast.neighbours(id, self.direction) {
            if self.visited.insert(next) {
                self.queue.push_back(next);
            }
        }
    }
}

impl<'a> Iterator for Traversal<'a> {
    type Item = Node<'a>;

    fn next(&mut self) -> Option<Node<'a>> {
        while let Some(id) = self.queue.pop_front() {
            self.enqueue_neighbours(id);
            let ast = self.ast;
            if let Some((id, props)) = ast.store().node_entry(id) {
                return Some(Node::new(id, props));
            }
        }
        None
    }
}

/// Query API implementation for Ast
impl Ast {
    // === Point Lookups ===

    /// Get a node by id
    pub fn node(&self, id: &str) -> Result<Node<'_>> {
        self.store()
            .node_entry(id)
            .map(|(id, props)| Node::new(id, props))
            .ok_or_else(|| Error::NodeNotFound(id.to_string()))
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.store().contains_node(id)
    }

    /// Get an edge by its triple
    pub fn edge(&self, source: &str, target: &str, kind: &str) -> Result<Edge<'_>> {
        self.store()
            .edge_entry(&EdgeKey::new(source, target, kind))
            .map(|(key, props)| Edge::new(key, props))
            .ok_or_else(|| Error::edge_not_found(source, target, kind))
    }

    // === Node Scans ===

    /// Every node, in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = Node<'_>> + '_ {
        self.store()
            .node_ids()
            .filter_map(move |id| self.store().node_entry(id))
            .map(|(id, props)| Node::new(id, props))
    }

    /// Every node matching `predicate`, in insertion order
    pub fn nodes_where<'a, F>(&'a self, predicate: F) -> impl Iterator<Item = Node<'a>> + 'a
    where
        F: Fn(&Node<'a>) -> bool + 'a,
    {
        self.nodes().filter(move |n| predicate(n))
    }

    /// First node matching `predicate`
    pub fn first_node<'a, F>(&'a self, predicate: F) -> Result<Node<'a>>
    where
        F: Fn(&Node<'a>) -> bool + 'a,
    {
        self.nodes_where(predicate).next().ok_or(Error::NoMatch)
    }

    /// Every node whose `nodeType` equals `node_type`
    pub fn nodes_of_type<'a>(&'a self, node_type: &'a str) -> impl Iterator<Item = Node<'a>> + 'a {
        self.nodes().filter(move |n| n.is_type(node_type))
    }

    // === Structural Traversal ===

    /// Structural children in edge insertion order (not index order)
    pub fn successors<'a>(&'a self, id: &str) -> Result<impl Iterator<Item = Node<'a>> + 'a> {
        let id = self.node(id)?.id();
        Ok(self
            .neighbours(id, Direction::Down)
            .filter_map(move |n| self.node(n).ok()))
    }

    /// Structural parents; one for a well-formed tree, none for a root
    pub fn predecessors<'a>(&'a self, id: &str) -> Result<impl Iterator<Item = Node<'a>> + 'a> {
        let id = self.node(id)?.id();
        Ok(self
            .neighbours(id, Direction::Up)
            .filter_map(move |n| self.node(n).ok()))
    }

    /// Breadth-first closure over predecessors
    pub fn ancestors<'a>(&'a self, id: &str) -> Result<Traversal<'a>> {
        let id = self.node(id)?.id();
        Ok(Traversal::new(self, id, Direction::Up))
    }

    /// Breadth-first closure over successors
    pub fn descendants<'a>(&'a self, id: &str) -> Result<Traversal<'a>> {
        let id = self.node(id)?.id();
        Ok(Traversal::new(self, id, Direction::Down))
    }

    fn neighbours<'a>(&'a self, id: &'a str, direction: Direction) -> impl Iterator<Item = &'a str> + 'a {
        let kind = self.config().containment_kind.as_str();
        let (edges, down) = match direction {
            Direction::Down => (self.store().edges_from(id), true),
            Direction::Up => (self.store().edges_to(id), false),
        };
        edges.iter().filter(move |k| k.kind == kind).map(move |k| {
            if down {
                k.target.as_str()
            } else {
                k.source.as_str()
            }
        })
    }

    // === Edge Queries ===

    /// Every edge, in insertion order
    pub fn edges(&self) -> impl Iterator<Item = Edge<'_>> + '_ {
        self.store()
            .edge_keys()
            .filter_map(move |k| self.store().edge_entry(k))
            .map(|(key, props)| Edge::new(key, props))
    }

    /// Edges of any kind leaving `id`
    pub fn out_edges<'a>(&'a self, id: &str) -> Result<impl Iterator<Item = Edge<'a>> + 'a> {
        let id = self.node(id)?.id();
        Ok(self
            .store()
            .edges_from(id)
            .iter()
            .filter_map(move |k| self.store().edge_entry(k))
            .map(|(key, props)| Edge::new(key, props)))
    }

    /// Edges of any kind entering `id`
    pub fn in_edges<'a>(&'a self, id: &str) -> Result<impl Iterator<Item = Edge<'a>> + 'a> {
        let id = self.node(id)?.id();
        Ok(self
            .store()
            .edges_to(id)
            .iter()
            .filter_map(move |k| self.store().edge_entry(k))
            .map(|(key, props)| Edge::new(key, props)))
    }

    /// Containment edges of one field, sorted by index
    pub fn field_edges<'a>(&'a self, id: &str, field: &str) -> Result<Vec<Edge<'a>>> {
        let kind = self.config().containment_kind.as_str();
        let mut edges: Vec<Edge<'a>> = self
            .out_edges(id)?
            .filter(|e| e.kind() == kind && e.field() == Some(field))
            .collect();
        edges.sort_by_key(|e| e.index());
        Ok(edges)
    }

    /// The containment edge pointing at `id`, if any
    pub fn parent_edge<'a>(&'a self, id: &str) -> Result<Option<Edge<'a>>> {
        let kind = self.config().containment_kind.as_str();
        Ok(self.in_edges(id)?.find(|e| e.kind() == kind && e.contains(FIELD)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Ast {
        let doc = json!({
            "nodeType": "Stmt_Function",
            "name": {"nodeType": "Identifier", "name": "main"},
            "stmts": [
                {"nodeType": "Stmt_Echo", "exprs": [{"nodeType": "Scalar_String", "value": "a"}]},
                {"nodeType": "Stmt_Echo", "exprs": [{"nodeType": "Scalar_String", "value": "b"}]},
                {"nodeType": "Stmt_Return"}
            ]
        });
        Ast::ingest(&doc).unwrap().0
    }

    #[test]
    fn test_get_node_missing_is_error() {
        let ast = sample();
        assert_eq!(ast.node("missing").unwrap_err(), Error::NodeNotFound("missing".to_string()));
        assert!(matches!(
            ast.edge("node_1", "missing", "PARENT_OF"),
            Err(Error::EdgeNotFound { .. })
        ));
    }

    #[test]
    fn test_nodes_with_predicate() {
        let ast = sample();
        assert_eq!(ast.nodes().count(), 7);
        let echos: Vec<_> = ast.nodes_where(|n| n.is_type("Stmt_Echo")).map(|n| n.id()).collect();
        assert_eq!(echos, vec!["node_3", "node_5"]);
        assert_eq!(ast.nodes_of_type("Scalar_String").count(), 2);
    }

    #[test]
    fn test_nodes_is_restartable() {
        let ast = sample();
        let first: Vec<_> = ast.nodes().map(|n| n.id()).collect();
        let second: Vec<_> = ast.nodes().map(|n| n.id()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_first_node() {
        let ast = sample();
        let ret = ast.first_node(|n| n.is_type("Stmt_Return")).unwrap();
        assert_eq!(ret.id(), "node_7");
        assert_eq!(ast.first_node(|n| n.is_type("Stmt_Class")).unwrap_err(), Error::NoMatch);
    }

    #[test]
    fn test_successors_and_predecessors() {
        let ast = sample();
        let children: Vec<_> = ast.successors("node_1").unwrap().map(|n| n.id()).collect();
        assert_eq!(children, vec!["node_2", "node_3", "node_5", "node_7"]);
        let parents: Vec<_> = ast.predecessors("node_4").unwrap().map(|n| n.id()).collect();
        assert_eq!(parents, vec!["node_3"]);
        assert_eq!(ast.predecessors("node_1").unwrap().count(), 0);
        assert!(ast.successors("missing").is_err());
    }

    #[test]
    fn test_ancestors_and_descendants() {
        let ast = sample();
        let up: Vec<_> = ast.ancestors("node_6").unwrap().map(|n| n.id()).collect();
        assert_eq!(up, vec!["node_5", "node_1"]);
        let down: Vec<_> = ast
            .descendants("node_1")
            .unwrap()
            .filter(|n| n.is_type("Scalar_String"))
            .map(|n| n.id())
            .collect();
        assert_eq!(down, vec!["node_4", "node_6"]);
        assert_eq!(ast.descendants("node_1").unwrap().count(), 6);
    }

    #[test]
    fn test_traversal_survives_cycles() {
        let mut ast = sample();
        ast.modifier()
            .add_edge("node_7", "node_1", "PARENT_OF", "loop", None)
            .unwrap();
        assert_eq!(ast.descendants("node_1").unwrap().count(), 6);
        assert_eq!(ast.ancestors("node_1").unwrap().count(), 1);
    }

    #[test]
    fn test_field_edges_sorted_by_index() {
        let ast = sample();
        let stmts: Vec<_> = ast
            .field_edges("node_1", "stmts")
            .unwrap()
            .iter()
            .map(|e| (e.target(), e.index()))
            .collect();
        assert_eq!(
            stmts,
            vec![("node_3", Some(0)), ("node_5", Some(1)), ("node_7", Some(2))]
        );
        let parent = ast.parent_edge("node_2").unwrap().unwrap();
        assert_eq!(parent.field(), Some("name"));
        assert!(ast.parent_edge("node_1").unwrap().is_none());
    }

    #[test]
    fn test_referential_integrity() {
        let ast = sample();
        for edge in ast.edges() {
            assert!(ast.node(edge.source()).is_ok());
            assert!(ast.node(edge.target()).is_ok());
        }
    }
}
