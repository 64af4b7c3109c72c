//! # Post-Effect System
//!
//! Structural changes to a list trigger follow-up work in the live tree.
//!
//! ## Design
//!
//! After the mutation engine adds to or removes from a list, the list's
//! empty-state placeholder may be stale:
//! - Adding the first child → the placeholder must go
//! - Removing the last child → the placeholder decorator must run again
//!
//! Effects only look at the change and the tree; they return actions and the
//! caller applies them. Re-decorating is async (it reads through the cache),
//! which is why it is an action rather than something an effect does itself.

use crate::config::EditorConfig;
use crate::linkage::ListRegion;
use folio_dom::{DocTree, DomResult, NodeId};
use tracing::debug;

/// What happened to a list in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralChange {
    Added { region: ListRegion },
    Removed { region: ListRegion },
}

impl StructuralChange {
    pub fn region(&self) -> ListRegion {
        match *self {
            StructuralChange::Added { region } | StructuralChange::Removed { region } => region,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostAction {
    /// Remove placeholder nodes directly under this element
    ClearPlaceholders(NodeId),
    /// Forget and re-run the decorator pipeline on this editable node
    Redecorate(NodeId),
}

/// Post-effect that can be triggered by a structural change
pub trait PostEffect: std::fmt::Debug {
    fn analyze(&self, change: &StructuralChange, tree: &DocTree, config: &EditorConfig) -> Vec<PostAction>;
}

/// Clear the empty-state placeholder once a list gains a child
#[derive(Debug)]
pub struct ClearEmptyPlaceholder;

impl PostEffect for ClearEmptyPlaceholder {
    fn analyze(&self, change: &StructuralChange, tree: &DocTree, config: &EditorConfig) -> Vec<PostAction> {
        match change {
            StructuralChange::Added { region } => region
                .editable()
                .filter(|el| !placeholders(tree, *el, config).is_empty())
                .map(PostAction::ClearPlaceholders)
                .into_iter()
                .collect(),
            StructuralChange::Removed { .. } => vec![],
        }
    }
}

/// Put the placeholder back once a list loses its last child
#[derive(Debug)]
pub struct RestoreEmptyPlaceholder;

impl PostEffect for RestoreEmptyPlaceholder {
    fn analyze(&self, change: &StructuralChange, tree: &DocTree, config: &EditorConfig) -> Vec<PostAction> {
        match change {
            StructuralChange::Removed { region } if region.items(tree, config).is_empty() => {
                region.editable().map(PostAction::Redecorate).into_iter().collect()
            }
            _ => vec![],
        }
    }
}

/// Post-effect engine that runs all registered effects
#[derive(Debug)]
pub struct PostEffectEngine {
    effects: Vec<Box<dyn PostEffect>>,
}

impl PostEffectEngine {
    /// Create engine with default effects
    pub fn new() -> Self {
        Self {
            effects: vec![Box::new(ClearEmptyPlaceholder), Box::new(RestoreEmptyPlaceholder)],
        }
    }

    pub fn analyze(&self, change: &StructuralChange, tree: &DocTree, config: &EditorConfig) -> Vec<PostAction> {
        let mut actions = Vec::new();
        for effect in &self.effects {
            actions.extend(effect.analyze(change, tree, config));
        }
        debug!(?change, count = actions.len(), "Post-effects analyzed");
        actions
    }
}

impl Default for PostEffectEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Placeholder nodes directly under `el`
pub fn placeholders(tree: &DocTree, el: NodeId, config: &EditorConfig) -> Vec<NodeId> {
    tree.children(el)
        .iter()
        .copied()
        .filter(|c| tree.has_attr(*c, &config.placeholder_attribute))
        .collect()
}

/// Detach every placeholder directly under `el`, returning how many went
pub fn clear_placeholders(tree: &mut DocTree, el: NodeId, config: &EditorConfig) -> DomResult<usize> {
    let found = placeholders(tree, el, config);
    for node in &found {
        tree.detach(*node)?;
    }
    Ok(found.len())
}
