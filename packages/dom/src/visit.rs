use crate::tree::{DocTree, NodeId, NodeKind};
use std::collections::BTreeMap;

/// Visitor pattern for walking a [`DocTree`] immutably
///
/// The default implementations walk the entire subtree.
/// Override specific visit_* methods to act on nodes of one kind.
pub trait Visitor: Sized {
    fn visit_node(&mut self, tree: &DocTree, id: NodeId) {
        walk_node(self, tree, id);
    }

    fn visit_element(
        &mut self,
        tree: &DocTree,
        id: NodeId,
        _tag: &str,
        _attributes: &BTreeMap<String, String>,
    ) {
        walk_children(self, tree, id);
    }

    fn visit_text(&mut self, _tree: &DocTree, _id: NodeId, _content: &str) {
        // Leaf node, no children to walk
    }

    fn visit_comment(&mut self, _tree: &DocTree, _id: NodeId, _content: &str) {
        // Leaf node, no children to walk
    }
}

pub fn walk_node<V: Visitor>(visitor: &mut V, tree: &DocTree, id: NodeId) {
    match tree.kind(id) {
        Some(NodeKind::Document) => walk_children(visitor, tree, id),
        Some(NodeKind::Element { tag, attributes }) => {
            visitor.visit_element(tree, id, tag, attributes)
        }
        Some(NodeKind::Text { content }) => visitor.visit_text(tree, id, content),
        Some(NodeKind::Comment { content }) => visitor.visit_comment(tree, id, content),
        None => {}
    }
}

pub fn walk_children<V: Visitor>(visitor: &mut V, tree: &DocTree, id: NodeId) {
    for child in tree.children(id) {
        visitor.visit_node(tree, *child);
    }
}

/// Collects, in document order, every element carrying an attribute
#[derive(Debug)]
pub struct AttributeCollector<'a> {
    name: &'a str,
    pub found: Vec<NodeId>,
}

impl<'a> AttributeCollector<'a> {
    pub fn new(name: &'a str) -> Self {
        Self {
            name,
            found: Vec::new(),
        }
    }

    pub fn collect(name: &'a str, tree: &DocTree, scope: NodeId) -> Vec<NodeId> {
        let mut collector = Self::new(name);
        collector.visit_node(tree, scope);
        collector.found
    }
}

impl Visitor for AttributeCollector<'_> {
    fn visit_element(
        &mut self,
        tree: &DocTree,
        id: NodeId,
        _tag: &str,
        attributes: &BTreeMap<String, String>,
    ) {
        if attributes.contains_key(self.name) {
            self.found.push(id);
        }
        walk_children(self, tree, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_in_document_order() {
        let mut tree = DocTree::new();
        let outer = tree.create_element("div");
        tree.set_attr(outer, "data-editable", "a").unwrap();
        let inner = tree.create_element("span");
        tree.set_attr(inner, "data-editable", "b").unwrap();
        let plain = tree.create_element("p");
        tree.append_child(tree.root(), outer).unwrap();
        tree.append_child(outer, inner).unwrap();
        tree.append_child(tree.root(), plain).unwrap();

        let found = AttributeCollector::collect("data-editable", &tree, tree.root());

        assert_eq!(found, vec![outer, inner]);
    }
}
