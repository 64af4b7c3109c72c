//! Component selection and keyboard navigation.

use crate::config::EditorConfig;
use crate::errors::EditorResult;
use crate::linkage::reference_of;
use folio_dom::{DocTree, NodeId};
use folio_model::Reference;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selected {
    pub el: NodeId,
    pub reference: Reference,
}

/// Where a click landed, for placing the caret in the opened form
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FocusOptions {
    /// Horizontal offset of the click inside the clicked node
    pub click_x: Option<f64>,
    /// Rendered width of the clicked node
    pub width: Option<f64>,
}

impl FocusOptions {
    pub fn at(click_x: f64, width: f64) -> Self {
        Self {
            click_x: Some(click_x),
            width: Some(width),
        }
    }

    /// Character offset in `text` proportional to where the click landed
    pub fn caret(&self, text: &str) -> Option<usize> {
        let (x, width) = (self.click_x?, self.width?);
        if width <= 0.0 {
            return None;
        }
        let ratio = (x / width).clamp(0.0, 1.0);
        let len = text.chars().count();
        Some(((len as f64) * ratio).round() as usize)
    }
}

/// At most one selected component
#[derive(Debug, Default)]
pub struct Selection {
    current: Option<Selected>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<&Selected> {
        self.current.as_ref()
    }

    /// Select the component rooted at `el`, deselecting any previous one
    pub fn select(&mut self, tree: &mut DocTree, el: NodeId, config: &EditorConfig) -> EditorResult<Reference> {
        let reference = reference_of(tree, el, config)?;
        self.deselect(tree, config)?;
        tree.add_class(el, &config.selected_class)?;
        debug!(reference = %reference, "Selected component");
        self.current = Some(Selected {
            el,
            reference: reference.clone(),
        });
        Ok(reference)
    }

    pub fn deselect(&mut self, tree: &mut DocTree, config: &EditorConfig) -> EditorResult<Option<Reference>> {
        let Some(previous) = self.current.take() else {
            return Ok(None);
        };
        if tree.contains(previous.el) {
            tree.remove_class(previous.el, &config.selected_class)?;
        }
        Ok(Some(previous.reference))
    }

    /// Point the selection at a new root after its subtree was replaced
    pub fn retarget(&mut self, tree: &mut DocTree, el: NodeId, config: &EditorConfig) -> EditorResult<()> {
        if let Some(selected) = &mut self.current {
            selected.el = el;
            tree.add_class(el, &config.selected_class)?;
        }
        Ok(())
    }

    /// Select the next visible top-level component, or the first when nothing
    /// is selected. Stays put at the end.
    pub fn select_next(&mut self, tree: &mut DocTree, config: &EditorConfig) -> EditorResult<Option<Reference>> {
        self.step(tree, config, Step::Next)
    }

    /// Select the previous visible top-level component, or the last when
    /// nothing is selected. Stays put at the start.
    pub fn select_prev(&mut self, tree: &mut DocTree, config: &EditorConfig) -> EditorResult<Option<Reference>> {
        self.step(tree, config, Step::Prev)
    }

    fn step(&mut self, tree: &mut DocTree, config: &EditorConfig, step: Step) -> EditorResult<Option<Reference>> {
        // visibility changes between calls, so the list is never cached
        let candidates = visible_components(tree, config);
        let current = self
            .current
            .as_ref()
            .and_then(|s| candidates.iter().position(|c| *c == s.el));
        let index = match (current, step) {
            (None, Step::Next) => Some(0),
            (None, Step::Prev) => candidates.len().checked_sub(1),
            (Some(i), Step::Next) => Some((i + 1).min(candidates.len() - 1)),
            (Some(i), Step::Prev) => Some(i.saturating_sub(1)),
        };
        match index.and_then(|i| candidates.get(i).copied()) {
            Some(el) if Some(el) != self.current.as_ref().map(|s| s.el) => {
                self.select(tree, el, config).map(Some)
            }
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Next,
    Prev,
}

/// Visible components that are not nested in another component, in
/// document order. Components directly in a page count as top level.
pub fn visible_components(tree: &DocTree, config: &EditorConfig) -> Vec<NodeId> {
    let attr = config.reference_attribute.as_str();
    let is_page = |t: &DocTree, n: NodeId| {
        t.attr(n, attr)
            .and_then(|raw| Reference::parse(raw).ok())
            .is_some_and(|r| r.is_page())
    };
    tree.find_all(tree.root(), |t, n| {
        if !t.has_attr(n, attr) || is_page(t, n) || !t.is_visible(n) {
            return false;
        }
        let outer = t.parent(n).and_then(|p| t.closest_with_attr(p, attr));
        outer.map_or(true, |o| is_page(t, o))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <body data-uri="example.com/_pages/home">
          <div data-uri="example.com/_components/article/instances/a1">
            <p data-uri="example.com/_components/paragraph/instances/p1"></p>
          </div>
          <div data-uri="example.com/_components/ad/instances/hidden" style="display: none"></div>
          <div data-uri="example.com/_components/footer/instances/f1"></div>
        </body>
    "#;

    fn find(tree: &DocTree, id: &str) -> NodeId {
        tree.find_all(tree.root(), |t, n| t.attr(n, "data-uri").is_some_and(|r| r.ends_with(id)))[0]
    }

    #[test]
    fn test_visible_top_level_components() {
        let tree = DocTree::from_markup(PAGE).unwrap();
        let config = EditorConfig::default();

        let found = visible_components(&tree, &config);

        assert_eq!(found, vec![find(&tree, "/a1"), find(&tree, "/f1")]);
    }

    #[test]
    fn test_select_replaces_previous_selection() {
        let mut tree = DocTree::from_markup(PAGE).unwrap();
        let config = EditorConfig::default();
        let mut selection = Selection::new();
        let (a1, f1) = (find(&tree, "/a1"), find(&tree, "/f1"));

        selection.select(&mut tree, a1, &config).unwrap();
        selection.select(&mut tree, f1, &config).unwrap();

        assert!(!tree.has_class(a1, "selected"));
        assert!(tree.has_class(f1, "selected"));
        assert_eq!(selection.selected().unwrap().el, f1);
    }

    #[test]
    fn test_navigation_skips_hidden_and_nested() {
        let mut tree = DocTree::from_markup(PAGE).unwrap();
        let config = EditorConfig::default();
        let mut selection = Selection::new();

        let first = selection.select_next(&mut tree, &config).unwrap().unwrap();
        assert!(first.as_str().ends_with("/a1"));
        let second = selection.select_next(&mut tree, &config).unwrap().unwrap();
        assert!(second.as_str().ends_with("/f1"));
        assert_eq!(selection.select_next(&mut tree, &config).unwrap(), None);

        let back = selection.select_prev(&mut tree, &config).unwrap().unwrap();
        assert!(back.as_str().ends_with("/a1"));
    }

    #[test]
    fn test_caret_follows_click_offset() {
        let options = FocusOptions::at(50.0, 100.0);
        assert_eq!(options.caret("abcdef"), Some(3));
        assert_eq!(FocusOptions::at(500.0, 100.0).caret("abc"), Some(3));
        assert_eq!(FocusOptions::default().caret("abc"), None);
    }
}
