//! Document arena
//!
//! Nodes live in a flat `Vec` owned by the [`Document`] and are referenced by
//! [`NodeId`] indices. Removing a node detaches its subtree; the slots are not
//! reused, so an id handed out by a document never starts pointing at a
//! different node.

use std::collections::{BTreeMap, HashMap};

use super::path::{Match, Matches, QueryEngine};
use crate::{Error, Result};

/// Stable identifier of a node inside its owning [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone)]
struct NodeData {
    label: String,
    attributes: BTreeMap<String, String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A tree of labeled, attributed nodes with path-expression query access.
///
/// The document owns a single [`QueryEngine`] that compiles and caches path
/// expressions; every query against any node of the document goes through it.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
    engine: QueryEngine,
}

impl Document {
    /// Create a document holding only an empty root node
    pub fn new(root_label: impl Into<String>) -> Self {
        let root = NodeData {
            label: root_label.into(),
            attributes: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            engine: QueryEngine::default(),
        }
    }

    /// The root node
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn label(&self, node: NodeId) -> &str {
        &self.nodes[node.0].label
    }

    pub fn attribute(&self, node: NodeId, key: &str) -> Option<&str> {
        self.nodes[node.0].attributes.get(key).map(String::as_str)
    }

    pub fn attributes(&self, node: NodeId) -> &BTreeMap<String, String> {
        &self.nodes[node.0].attributes
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    /// Whether the node is still reachable from the root
    pub fn is_attached(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            if current == self.root {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Pre-order iterator over the strict descendants of `node`
    pub fn descendants(&self, node: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.children(node).to_vec();
        stack.reverse();
        Descendants { doc: self, stack }
    }

    /// Number of attached nodes, root included
    pub fn len(&self) -> usize {
        1 + self.descendants(self.root).count()
    }

    pub fn is_empty(&self) -> bool {
        self.children(self.root).is_empty()
    }

    /// Number of arena slots, detached nodes included
    pub fn slot_count(&self) -> usize {
        self.nodes.len()
    }

    /// Copy of the attached tree in a fresh arena; ids of `self` are not valid in it
    pub fn compacted(&self) -> Document {
        let mut doc = Document::new(self.label(self.root));
        let root = doc.root();
        for (key, value) in self.attributes(self.root) {
            doc.set_attribute(root, key.clone(), value.clone());
        }

        let mut pending: Vec<(NodeId, NodeId)> =
            self.children(self.root).iter().rev().map(|child| (*child, root)).collect();
        while let Some((original, parent)) = pending.pop() {
            let id = doc.add_child(parent, self.label(original), self.attributes(original).clone());
            pending.extend(self.children(original).iter().rev().map(|child| (*child, id)));
        }
        doc
    }

    // ========== Mutation ==========

    /// Append a new child node under `parent`
    pub fn add_child<I, K, V>(&mut self, parent: NodeId, label: impl Into<String>, attributes: I) -> NodeId
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            label: label.into(),
            attributes: attributes
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Append a child node without attributes
    pub fn add_element(&mut self, parent: NodeId, label: impl Into<String>) -> NodeId {
        self.add_child(parent, label, std::iter::empty::<(String, String)>())
    }

    pub fn set_attribute(&mut self, node: NodeId, key: impl Into<String>, value: impl Into<String>) {
        self.nodes[node.0].attributes.insert(key.into(), value.into());
    }

    pub fn remove_attribute(&mut self, node: NodeId, key: &str) -> Option<String> {
        self.nodes[node.0].attributes.remove(key)
    }

    /// Detach `node` (and its subtree) from its parent. The root cannot be removed.
    pub fn remove_node(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|child| *child != node);
        }
    }

    /// Detach every child of `node`, keeping the node itself
    pub fn clear_children(&mut self, node: NodeId) {
        let children = std::mem::take(&mut self.nodes[node.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
        }
    }

    /// Copy the subtree rooted at `source` and append the copy under `new_parent`
    pub fn deep_copy(&mut self, source: NodeId, new_parent: NodeId) -> NodeId {
        // Child lists are snapshotted up front so copying into the source's own subtree terminates
        let snapshot: HashMap<NodeId, Vec<NodeId>> = std::iter::once(source)
            .chain(self.descendants(source))
            .map(|node| (node, self.children(node).to_vec()))
            .collect();

        let copied_root = self.copy_node(source, new_parent);
        let mut pending = vec![(source, copied_root)];
        while let Some((original, copy)) = pending.pop() {
            for child in snapshot.get(&original).into_iter().flatten() {
                let child_copy = self.copy_node(*child, copy);
                pending.push((*child, child_copy));
            }
        }
        copied_root
    }

    fn copy_node(&mut self, original: NodeId, parent: NodeId) -> NodeId {
        let label = self.nodes[original.0].label.clone();
        let attributes = self.nodes[original.0].attributes.clone();
        self.add_child(parent, label, attributes)
    }

    // ========== Queries ==========

    /// Evaluate a path expression against the root node
    pub fn query(&self, expr: &str) -> Result<Matches> {
        self.query_from(self.root, expr)
    }

    /// Evaluate a path expression with `context` as the context node
    pub fn query_from(&self, context: NodeId, expr: &str) -> Result<Matches> {
        self.engine.evaluate(self, context, expr)
    }

    /// String value of a single match
    pub fn string_value(&self, m: &Match) -> String {
        match m {
            Match::Node(_) => String::new(),
            Match::Attribute { node, name } => self.attribute(*node, name).unwrap_or_default().to_string(),
        }
    }

    /// First match's string value; `default` when nothing matched.
    ///
    /// Without a default, an empty result is [`Error::NotFound`].
    pub fn query_first(&self, expr: &str, default: Option<&str>) -> Result<String> {
        match (self.try_first_string(expr)?, default) {
            (Some(value), _) => Ok(value),
            (None, Some(default)) => Ok(default.to_string()),
            (None, None) => Err(Error::NotFound(expr.to_string())),
        }
    }

    /// First match's string value, failing with [`Error::NotFound`] on no match
    pub fn first_string(&self, expr: &str) -> Result<String> {
        self.query_first(expr, None)
    }

    /// First match's string value, `None` when nothing matched
    pub fn try_first_string(&self, expr: &str) -> Result<Option<String>> {
        let matches = self.query(expr)?;
        Ok(matches.first().map(|m| self.string_value(m)))
    }

    /// String values of all matches, in document order
    pub fn strings(&self, expr: &str) -> Result<Vec<String>> {
        let matches = self.query(expr)?;
        Ok(matches.iter().map(|m| self.string_value(m)).collect())
    }

    pub fn first_node(&self, expr: &str) -> Result<NodeId> {
        self.try_first_node(expr)?
            .ok_or_else(|| Error::NotFound(expr.to_string()))
    }

    pub fn try_first_node(&self, expr: &str) -> Result<Option<NodeId>> {
        Ok(self.query(expr)?.nodes().next())
    }

    pub fn exists(&self, expr: &str) -> Result<bool> {
        Ok(!self.query(expr)?.is_empty())
    }
}

/// Pre-order walk over a subtree, see [`Document::descendants`]
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let node = self.stack.pop()?;
        self.stack.extend(self.doc.children(node).iter().rev().copied());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_add_and_remove_children() {
        let mut doc = Document::new("files");
        let root = doc.root();
        let a = doc.add_child(root, "file", attrs(&[("path", "a.php")]));
        let b = doc.add_child(root, "file", attrs(&[("path", "b.php")]));

        assert_eq!(doc.children(root), &[a, b]);
        assert_eq!(doc.attribute(a, "path"), Some("a.php"));
        assert_eq!(doc.parent(b), Some(root));

        doc.remove_node(a);
        assert_eq!(doc.children(root), &[b]);
        assert!(!doc.is_attached(a));
        assert!(doc.is_attached(b));
    }

    #[test]
    fn test_remove_root_is_noop() {
        let mut doc = Document::new("files");
        let root = doc.root();
        doc.add_child(root, "file", attrs(&[]));
        doc.remove_node(root);
        assert!(doc.is_attached(root));
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn test_clear_children_detaches_subtree() {
        let mut doc = Document::new("files");
        let root = doc.root();
        let file = doc.add_child(root, "file", attrs(&[]));
        let class = doc.add_child(file, "class", attrs(&[("name", "C")]));
        doc.add_child(class, "method", attrs(&[("name", "m")]));

        doc.clear_children(file);
        assert!(doc.children(file).is_empty());
        assert!(!doc.is_attached(class));
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn test_deep_copy_preserves_order_and_attributes() {
        let mut doc = Document::new("files");
        let root = doc.root();
        let source = doc.add_child(root, "method", attrs(&[("name", "m"), ("visibility", "public")]));
        doc.add_child(source, "param", attrs(&[("name", "a")]));
        doc.add_child(source, "param", attrs(&[("name", "b")]));
        let target = doc.add_child(root, "class", attrs(&[("name", "C")]));

        let copy = doc.deep_copy(source, target);
        assert_ne!(copy, source);
        assert_eq!(doc.parent(copy), Some(target));
        assert_eq!(doc.attribute(copy, "visibility"), Some("public"));

        let names: Vec<_> = doc
            .children(copy)
            .iter()
            .map(|c| doc.attribute(*c, "name").unwrap())
            .collect();
        assert_eq!(names, vec!["a", "b"]);

        // Mutating the copy leaves the original alone
        doc.set_attribute(copy, "fromTrait", "T");
        assert_eq!(doc.attribute(source, "fromTrait"), None);
    }

    #[test]
    fn test_compacted_drops_detached_slots() {
        let mut doc = Document::new("files");
        let root = doc.root();
        doc.set_attribute(root, "version", "1");
        for i in 0..100 {
            let path = format!("{}.php", i);
            let file = doc.add_child(root, "file", attrs(&[("path", path.as_str())]));
            doc.remove_node(file);
        }
        let kept = doc.add_child(root, "file", attrs(&[("path", "kept.php")]));
        doc.add_child(kept, "class", attrs(&[("name", "A")]));
        doc.add_child(kept, "class", attrs(&[("name", "B")]));

        let compact = doc.compacted();
        assert_eq!(compact.slot_count(), 4);
        assert_eq!(compact.len(), doc.len());
        assert_eq!(compact.first_string("/files/@version").unwrap(), "1");
        assert_eq!(compact.strings("/files/file/class/@name").unwrap(), vec!["A", "B"]);
    }

    #[test]
    fn test_descendants_preorder() {
        let mut doc = Document::new("r");
        let root = doc.root();
        let a = doc.add_child(root, "a", attrs(&[]));
        let a1 = doc.add_child(a, "a1", attrs(&[]));
        let b = doc.add_child(root, "b", attrs(&[]));

        let order: Vec<_> = doc.descendants(root).collect();
        assert_eq!(order, vec![a, a1, b]);
    }

    #[test]
    fn test_query_first_default_and_not_found() {
        let mut doc = Document::new("files");
        let root = doc.root();
        doc.add_child(root, "file", attrs(&[("path", ""), ("hash", "abc")]));

        // Found empty string is distinct from a default
        assert_eq!(doc.try_first_string("/files/file/@path").unwrap(), Some(String::new()));
        assert_eq!(doc.query_first("/files/file/@path", Some("-")).unwrap(), "");

        assert_eq!(doc.query_first("/files/file/@mtime", Some("-")).unwrap(), "-");
        assert_eq!(doc.try_first_string("/files/file/@mtime").unwrap(), None);
        assert!(matches!(
            doc.query_first("/files/file/@mtime", None),
            Err(Error::NotFound(_))
        ));
    }
}
