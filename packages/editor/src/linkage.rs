//! Structural discovery in the live tree.
//!
//! Component roots carry the reference attribute, editable nodes carry the
//! editable attribute. A component list is either an editable element whose
//! children are the list items, or a run of siblings between a pair of marker
//! comments (lists in regions that render nothing visible, such as `<head>`).

use crate::config::EditorConfig;
use crate::errors::{EditorError, EditorResult};
use folio_dom::{DocTree, DomResult, NodeId};
use folio_model::Reference;

/// Where the items of one component list live in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListRegion {
    Element(NodeId),
    Markers {
        parent: NodeId,
        start: NodeId,
        end: NodeId,
    },
}

impl ListRegion {
    /// Node the region's children hang from
    pub fn container(&self) -> NodeId {
        match *self {
            ListRegion::Element(el) => el,
            ListRegion::Markers { parent, .. } => parent,
        }
    }

    /// Editable element of the region, if it has one
    pub fn editable(&self) -> Option<NodeId> {
        match *self {
            ListRegion::Element(el) => Some(el),
            ListRegion::Markers { .. } => None,
        }
    }

    /// Component roots in the region, in document order
    pub fn items(&self, tree: &DocTree, config: &EditorConfig) -> Vec<NodeId> {
        self.nodes(tree)
            .into_iter()
            .filter(|n| tree.has_attr(*n, &config.reference_attribute))
            .collect()
    }

    fn nodes(&self, tree: &DocTree) -> Vec<NodeId> {
        match *self {
            ListRegion::Element(el) => tree.children(el).to_vec(),
            ListRegion::Markers { parent, start, end } => {
                let children = tree.children(parent);
                let from = children.iter().position(|c| *c == start);
                let to = children.iter().position(|c| *c == end);
                match (from, to) {
                    (Some(from), Some(to)) if from < to => children[from + 1..to].to_vec(),
                    _ => Vec::new(),
                }
            }
        }
    }

    pub fn contains(&self, tree: &DocTree, node: NodeId) -> bool {
        self.nodes(tree).contains(&node)
    }

    /// Insert `nodes` as a contiguous run right after `prev`, or at the end
    pub fn insert(&self, tree: &mut DocTree, prev: Option<NodeId>, nodes: &[NodeId]) -> DomResult<()> {
        let mut anchor = prev;
        for node in nodes {
            match (anchor, *self) {
                (Some(prev), _) => tree.insert_after(prev, *node)?,
                (None, ListRegion::Element(el)) => tree.append_child(el, *node)?,
                (None, ListRegion::Markers { end, .. }) => tree.insert_before(end, *node)?,
            }
            anchor = Some(*node);
        }
        Ok(())
    }
}

/// A component root as found in the tree, with the list or property it sits in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeLinkage {
    pub parent: Reference,
    pub parent_el: NodeId,
    pub field: String,
    pub region: ListRegion,
}

/// Closest component root at or above `node`
pub fn owning_component(tree: &DocTree, node: NodeId, config: &EditorConfig) -> Option<(NodeId, Reference)> {
    let el = tree.closest_with_attr(node, &config.reference_attribute)?;
    let reference = Reference::parse(tree.attr(el, &config.reference_attribute)?).ok()?;
    Some((el, reference))
}

/// Reference carried by a component root
pub fn reference_of(tree: &DocTree, el: NodeId, config: &EditorConfig) -> EditorResult<Reference> {
    let raw = tree.attr(el, &config.reference_attribute).ok_or_else(|| {
        EditorError::usage(format!("node {:?} is not a component root", el))
    })?;
    Ok(Reference::parse(raw)?)
}

/// Field path of an editable node
pub fn path_of<'a>(tree: &'a DocTree, node: NodeId, config: &EditorConfig) -> Option<&'a str> {
    tree.attr(node, &config.editable_attribute)
        .filter(|path| !path.is_empty())
}

/// Resolve the list or property a component root lives in
pub fn parent_linkage(tree: &DocTree, component: NodeId, config: &EditorConfig) -> EditorResult<TreeLinkage> {
    let parent_node = tree
        .parent(component)
        .ok_or_else(|| EditorError::usage(format!("component {:?} is detached", component)))?;

    let region = match enclosing_markers(tree, component, config) {
        Some((field, region)) => Some((field, region)),
        None => path_of(tree, parent_node, config)
            .map(|field| (field.to_string(), ListRegion::Element(parent_node))),
    };
    let (field, region) = region.ok_or_else(|| {
        EditorError::usage(format!("component {:?} is not inside a list or property", component))
    })?;

    let (parent_el, parent) = owning_component(tree, region.container(), config)
        .filter(|(el, _)| *el != component)
        .ok_or_else(|| EditorError::usage(format!("list {:?} has no owning component or page", field)))?;

    Ok(TreeLinkage {
        parent,
        parent_el,
        field,
        region,
    })
}

/// Marker pair whose run of siblings holds `node`
fn enclosing_markers(tree: &DocTree, node: NodeId, config: &EditorConfig) -> Option<(String, ListRegion)> {
    let parent = tree.parent(node)?;
    let prefix = format!("{}-start ", config.list_marker);
    let mut cursor = tree.previous_sibling(node);

    while let Some(sibling) = cursor {
        if let Some(comment) = tree.comment(sibling) {
            if let Some(field) = comment.strip_prefix(&prefix) {
                let end = find_end_marker(tree, node, &config.end_marker(field))?;
                return Some((
                    field.to_string(),
                    ListRegion::Markers {
                        parent,
                        start: sibling,
                        end,
                    },
                ));
            }
            if comment.starts_with(&format!("{}-end ", config.list_marker)) {
                return None;
            }
        }
        cursor = tree.previous_sibling(sibling);
    }
    None
}

fn find_end_marker(tree: &DocTree, from: NodeId, marker: &str) -> Option<NodeId> {
    let mut cursor = tree.next_sibling(from);
    while let Some(sibling) = cursor {
        if tree.comment(sibling) == Some(marker) {
            return Some(sibling);
        }
        cursor = tree.next_sibling(sibling);
    }
    None
}

/// Find the region of list `field` belonging to the component (or page) root `owner`
pub fn find_list(tree: &DocTree, owner: NodeId, field: &str, config: &EditorConfig) -> Option<ListRegion> {
    let owned = |node: NodeId| {
        owning_component(tree, tree.parent(node).unwrap_or(node), config).map(|(el, _)| el) == Some(owner)
    };

    let element = tree.find_all(owner, |t, n| {
        n != owner && t.attr(n, &config.editable_attribute) == Some(field)
    });
    if let Some(el) = element.into_iter().find(|n| owned(*n)) {
        return Some(ListRegion::Element(el));
    }

    let start_marker = config.start_marker(field);
    let end_marker = config.end_marker(field);
    let start = tree
        .find_all(owner, |t, n| t.comment(n) == Some(start_marker.as_str()))
        .into_iter()
        .find(|n| owned(*n))?;
    let parent = tree.parent(start)?;
    let end = find_end_marker(tree, start, &end_marker)?;
    Some(ListRegion::Markers { parent, start, end })
}

/// Editable nodes inside `scope` that belong to the component rooted at `scope`
/// (nested components own their own editables)
pub fn own_editables(tree: &DocTree, scope: NodeId, config: &EditorConfig) -> Vec<NodeId> {
    tree.find_all(scope, |t, n| {
        t.has_attr(n, &config.editable_attribute)
            && t.closest_with_attr(n, &config.reference_attribute) == Some(scope)
    })
}
