//! Arena-backed document tree.

use crate::error::{DomError, DomResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Index of a node in its [`DocTree`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeKind {
    Document,
    Element {
        tag: String,
        attributes: BTreeMap<String, String>,
    },
    Text {
        content: String,
    },
    Comment {
        content: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Click,
    DoubleClick,
    Input,
    KeyDown,
    DragStart,
    Drop,
}

/// An event registration. `action` names what the host adapter dispatches
/// when the event fires on this node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Listener {
    pub event: EventKind,
    pub action: String,
}

impl Listener {
    pub fn new(event: EventKind, action: impl Into<String>) -> Self {
        Self {
            event,
            action: action.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    listeners: Vec<Listener>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            listeners: Vec::new(),
        }
    }
}

/// Elements that never get a layout box
const NON_RENDERED: &[&str] = &["head", "script", "style", "template", "meta", "link"];

#[derive(Debug, Clone)]
pub struct DocTree {
    nodes: Vec<Node>,
    root: NodeId,
    focused: Option<NodeId>,
}

impl DocTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeKind::Document)],
            root: NodeId(0),
            focused: None,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes ever allocated, attached or not
    pub fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> DomResult<&Node> {
        self.nodes.get(id.0).ok_or(DomError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> DomResult<&mut Node> {
        self.nodes.get_mut(id.0).ok_or(DomError::UnknownNode(id))
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id.0).map(|n| &n.kind)
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node::new(kind));
        NodeId(self.nodes.len() - 1)
    }

    pub fn create_element(&mut self, tag: impl Into<String>) -> NodeId {
        self.push(NodeKind::Element {
            tag: tag.into(),
            attributes: BTreeMap::new(),
        })
    }

    pub fn create_text(&mut self, content: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text {
            content: content.into(),
        })
    }

    pub fn create_comment(&mut self, content: impl Into<String>) -> NodeId {
        self.push(NodeKind::Comment {
            content: content.into(),
        })
    }

    // Navigation

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|child| self.is_element(*child))
            .collect()
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        self.children(parent).get(index + 1).copied()
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        index.checked_sub(1).map(|i| self.children(parent)[i])
    }

    /// Ancestors, nearest first, excluding `id` itself
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut ancestors = Vec::new();
        let mut current = self.parent(id);
        while let Some(node) = current {
            ancestors.push(node);
            current = self.parent(node);
        }
        ancestors
    }

    /// True if `node` is `scope` or one of its descendants
    pub fn is_within(&self, scope: NodeId, node: NodeId) -> bool {
        node == scope || self.ancestors(node).contains(&scope)
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        self.is_within(self.root, id)
    }

    /// Preorder traversal of `scope`, including `scope`
    pub fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![scope];
        while let Some(id) = stack.pop() {
            if !self.contains(id) {
                continue;
            }
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Nearest ancestor-or-self matching `predicate`
    pub fn closest(&self, id: NodeId, predicate: impl Fn(&DocTree, NodeId) -> bool) -> Option<NodeId> {
        let mut current = Some(id).filter(|id| self.contains(*id));
        while let Some(node) = current {
            if predicate(self, node) {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    pub fn closest_with_attr(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.closest(id, |tree, node| tree.attr(node, name).is_some())
    }

    pub fn find_all(&self, scope: NodeId, predicate: impl Fn(&DocTree, NodeId) -> bool) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|id| predicate(self, *id))
            .collect()
    }

    pub fn find_by_attr(&self, scope: NodeId, name: &str, value: &str) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|id| self.attr(*id, name) == Some(value))
    }

    // Structure

    fn check_insert(&self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.node(child)?;
        match self.node(parent)?.kind {
            NodeKind::Document | NodeKind::Element { .. } => {}
            _ => {
                return Err(DomError::Hierarchy(format!(
                    "{:?} cannot have children",
                    parent
                )))
            }
        }
        if child == self.root {
            return Err(DomError::Hierarchy("the document root cannot be moved".into()));
        }
        if self.is_within(child, parent) {
            return Err(DomError::Hierarchy(format!(
                "inserting {:?} under {:?} would create a cycle",
                child, parent
            )));
        }
        Ok(())
    }

    /// Remove a node (and its subtree) from its parent. The subtree stays in the
    /// arena and can be re-inserted.
    pub fn detach(&mut self, id: NodeId) -> DomResult<()> {
        let parent = self.node(id)?.parent;
        if let Some(parent) = parent {
            self.node_mut(parent)?.children.retain(|c| *c != id);
        }
        self.node_mut(id)?.parent = None;
        if let Some(focused) = self.focused {
            if self.is_within(id, focused) {
                self.focused = None;
            }
        }
        Ok(())
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> DomResult<()> {
        self.check_insert(parent, child)?;
        self.detach(child)?;
        let children = &mut self.node_mut(parent)?.children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        let len = self.children(parent).len();
        self.insert_child(parent, len, child)
    }

    pub fn insert_before(&mut self, sibling: NodeId, new: NodeId) -> DomResult<()> {
        let parent = self
            .parent(sibling)
            .ok_or_else(|| DomError::Hierarchy(format!("{:?} has no parent", sibling)))?;
        self.check_insert(parent, new)?;
        self.detach(new)?;
        let index = self
            .index_in_parent(sibling)
            .ok_or(DomError::UnknownNode(sibling))?;
        self.insert_child(parent, index, new)
    }

    pub fn insert_after(&mut self, sibling: NodeId, new: NodeId) -> DomResult<()> {
        let parent = self
            .parent(sibling)
            .ok_or_else(|| DomError::Hierarchy(format!("{:?} has no parent", sibling)))?;
        self.check_insert(parent, new)?;
        self.detach(new)?;
        let index = self
            .index_in_parent(sibling)
            .ok_or(DomError::UnknownNode(sibling))?;
        self.insert_child(parent, index + 1, new)
    }

    /// Put `new` where `old` is and detach `old`
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> DomResult<()> {
        self.insert_before(old, new)?;
        self.detach(old)
    }

    /// Detach every child of `id`
    pub fn clear_children(&mut self, id: NodeId) -> DomResult<()> {
        for child in self.children(id).to_vec() {
            self.detach(child)?;
        }
        Ok(())
    }

    // Elements

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.kind(id), Some(NodeKind::Element { .. }))
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            Some(NodeKind::Element { tag, .. }) => Some(tag),
            _ => None,
        }
    }

    pub fn attributes(&self, id: NodeId) -> Option<&BTreeMap<String, String>> {
        match self.kind(id) {
            Some(NodeKind::Element { attributes, .. }) => Some(attributes),
            _ => None,
        }
    }

    fn attributes_mut(&mut self, id: NodeId) -> DomResult<&mut BTreeMap<String, String>> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Element { attributes, .. } => Ok(attributes),
            _ => Err(DomError::NotAnElement(id)),
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)?.get(name).map(String::as_str)
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn set_attr(&mut self, id: NodeId, name: impl Into<String>, value: impl Into<String>) -> DomResult<()> {
        self.attributes_mut(id)?.insert(name.into(), value.into());
        Ok(())
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> DomResult<Option<String>> {
        Ok(self.attributes_mut(id)?.remove(name))
    }

    pub fn classes(&self, id: NodeId) -> Vec<&str> {
        self.attr(id, "class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.classes(id).contains(&class)
    }

    /// Returns false if the class was already present
    pub fn add_class(&mut self, id: NodeId, class: &str) -> DomResult<bool> {
        if self.has_class(id, class) {
            return Ok(false);
        }
        let mut classes: Vec<String> = self.classes(id).into_iter().map(str::to_string).collect();
        classes.push(class.to_string());
        self.set_attr(id, "class", classes.join(" "))?;
        Ok(true)
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) -> DomResult<bool> {
        if !self.has_class(id, class) {
            return Ok(false);
        }
        let remaining: Vec<String> = self
            .classes(id)
            .into_iter()
            .filter(|c| *c != class)
            .map(str::to_string)
            .collect();
        if remaining.is_empty() {
            self.remove_attr(id, "class")?;
        } else {
            self.set_attr(id, "class", remaining.join(" "))?;
        }
        Ok(true)
    }

    // Text

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .into_iter()
            .filter_map(|node| match self.kind(node) {
                Some(NodeKind::Text { content }) => Some(content.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replace the children of an element with a single text node
    pub fn set_text(&mut self, id: NodeId, content: impl Into<String>) -> DomResult<()> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Text { content: existing } | NodeKind::Comment { content: existing } => {
                *existing = content.into();
                Ok(())
            }
            NodeKind::Element { .. } => {
                self.clear_children(id)?;
                let text = self.create_text(content);
                self.append_child(id, text)
            }
            NodeKind::Document => Err(DomError::NotAnElement(id)),
        }
    }

    pub fn comment(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            Some(NodeKind::Comment { content }) => Some(content),
            _ => None,
        }
    }

    // Listeners

    /// Register a listener. Returns false if an identical one is already present.
    pub fn add_listener(&mut self, id: NodeId, listener: Listener) -> DomResult<bool> {
        let node = self.node_mut(id)?;
        if node.listeners.contains(&listener) {
            return Ok(false);
        }
        node.listeners.push(listener);
        Ok(true)
    }

    pub fn listeners(&self, id: NodeId) -> &[Listener] {
        self.nodes
            .get(id.0)
            .map(|n| n.listeners.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_listener(&self, id: NodeId, event: EventKind, action: &str) -> bool {
        self.listeners(id)
            .iter()
            .any(|l| l.event == event && l.action == action)
    }

    // Focus and visibility

    pub fn focus(&mut self, id: NodeId) -> DomResult<()> {
        if !self.is_element(id) {
            return Err(DomError::NotAnElement(id));
        }
        self.focused = Some(id);
        Ok(())
    }

    pub fn blur(&mut self) {
        self.focused = None;
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    fn explicitly_hidden(&self, id: NodeId) -> bool {
        if self.has_attr(id, "hidden") {
            return true;
        }
        if self.tag(id).is_some_and(|tag| NON_RENDERED.contains(&tag)) {
            return true;
        }
        self.attr(id, "style").is_some_and(|style| {
            let compact: String = style.chars().filter(|c| !c.is_whitespace()).collect();
            compact.contains("display:none")
        })
    }

    /// An element is visible when it is attached, would get a layout box, and
    /// neither it nor an ancestor is hidden.
    pub fn is_visible(&self, id: NodeId) -> bool {
        if !self.is_element(id) || !self.is_attached(id) {
            return false;
        }
        std::iter::once(id)
            .chain(self.ancestors(id))
            .filter(|node| self.is_element(*node))
            .all(|node| !self.explicitly_hidden(node))
    }
}

impl Default for DocTree {
    fn default() -> Self {
        Self::new()
    }
}
