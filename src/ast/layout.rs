//! Per-node shape facts that are not properties
//!
//! Ingestion flattens a node's `attributes` object onto its property map
//! and drops `null` items from node lists. A `NodeLayout` remembers what
//! was flattened and where the nulls were, so reconstruction can put both
//! back. Nodes created through the mutation API have no layout.

use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeLayout {
    /// Keys that came from the `attributes` object
    attributes: BTreeSet<String>,

    /// Keys that came as top-level scalar fields
    fields: BTreeSet<String>,

    /// Per list field, positions of `null` items in the full list
    holes: BTreeMap<String, BTreeSet<usize>>,
}

impl NodeLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_attribute(&mut self, key: &str) {
        self.fields.remove(key);
        self.attributes.insert(key.to_string());
    }

    pub(crate) fn record_field(&mut self, key: &str) {
        self.attributes.remove(key);
        self.fields.insert(key.to_string());
    }

    pub(crate) fn record_hole(&mut self, field: &str, position: usize) {
        self.holes.entry(field.to_string()).or_default().insert(position);
    }

    /// Whether `key` goes under `attributes`. Keys the node never had
    /// follow `defaults`.
    pub fn nests(&self, key: &str, defaults: &[String]) -> bool {
        if self.attributes.contains(key) {
            return true;
        }
        !self.fields.contains(key) && defaults.iter().any(|d| d == key)
    }

    pub fn attribute_keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.attributes.iter().map(String::as_str)
    }

    /// Null positions of one list field
    pub fn holes(&self, field: &str) -> Option<&BTreeSet<usize>> {
        self.holes.get(field).filter(|h| !h.is_empty())
    }

    /// Full list position of the `index`-th node item of `field`
    pub(crate) fn position(&self, field: &str, index: usize) -> usize {
        let holes = match self.holes(field) {
            Some(holes) => holes,
            None => return index,
        };
        let mut seen = 0;
        let mut position = 0;
        loop {
            if !holes.contains(&position) {
                if seen == index {
                    return position;
                }
                seen += 1;
            }
            position += 1;
        }
    }

    /// An item was inserted at `position`: later nulls move up
    pub(crate) fn open_gap(&mut self, field: &str, position: usize) {
        if let Some(holes) = self.holes.get_mut(field) {
            *holes = holes
                .iter()
                .map(|&h| if h >= position { h + 1 } else { h })
                .collect();
        }
    }

    /// The item at `position` was removed: later nulls move down
    pub(crate) fn close_gap(&mut self, field: &str, position: usize) {
        if let Some(holes) = self.holes.get_mut(field) {
            *holes = holes
                .iter()
                .map(|&h| if h > position { h - 1 } else { h })
                .collect();
        }
    }

    pub(crate) fn take_holes(&mut self, field: &str) -> BTreeSet<usize> {
        self.holes.remove(field).unwrap_or_default()
    }

    pub(crate) fn set_holes(&mut self, field: &str, holes: BTreeSet<usize>) {
        if holes.is_empty() {
            self.holes.remove(field);
        } else {
            self.holes.insert(field.to_string(), holes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Vec<String> {
        vec!["startLine".to_string(), "kind".to_string()]
    }

    #[test]
    fn test_nests_recorded_attributes_only() {
        let mut layout = NodeLayout::new();
        layout.record_attribute("rawValue");
        layout.record_field("kind");
        assert!(layout.nests("rawValue", &defaults()));
        assert!(!layout.nests("kind", &defaults()));
        // Never seen on this node: falls back to the defaults
        assert!(layout.nests("startLine", &defaults()));
        assert!(!layout.nests("name", &defaults()));
    }

    #[test]
    fn test_position_skips_holes() {
        let mut layout = NodeLayout::new();
        layout.record_hole("items", 0);
        layout.record_hole("items", 2);
        // [null, A, null, B]
        assert_eq!(layout.position("items", 0), 1);
        assert_eq!(layout.position("items", 1), 3);
        assert_eq!(layout.position("items", 2), 4);
        assert_eq!(layout.position("other", 2), 2);
    }

    #[test]
    fn test_gaps_shift_holes() {
        let mut layout = NodeLayout::new();
        layout.record_hole("items", 0);
        layout.record_hole("items", 2);
        layout.open_gap("items", 1);
        assert_eq!(layout.holes("items").unwrap().iter().copied().collect::<Vec<_>>(), vec![0, 3]);
        layout.close_gap("items", 1);
        assert_eq!(layout.holes("items").unwrap().iter().copied().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(layout.take_holes("items").len(), 2);
        assert!(layout.holes("items").is_none());
    }
}
