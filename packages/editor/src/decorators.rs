//! Built-in decorators.

use crate::config::EditorConfig;
use crate::errors::EditorResult;
use crate::pipeline::{Decorator, DecoratorContext};
use crate::post_effects::placeholders;
use folio_dom::{DocTree, EventKind, Listener, NodeId};
use folio_model::DisplayMode;

pub const FOCUS_ACTION: &str = "focus";
pub const SELECT_ACTION: &str = "select";
pub const DRAG_ACTION: &str = "drag";
pub const REORDER_ACTION: &str = "reorder";

/// Inserts the empty-state placeholder for fields and groups that declare one
pub struct PlaceholderDecorator {
    config: EditorConfig,
}

impl PlaceholderDecorator {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl Decorator for PlaceholderDecorator {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    fn when(&self, tree: &DocTree, node: NodeId, ctx: &DecoratorContext) -> bool {
        let rule = match ctx.slice().and_then(|s| s.placeholder()) {
            Some(rule) => rule,
            None => return false,
        };
        (rule.permanent || ctx.is_empty()) && placeholders(tree, node, &self.config).is_empty()
    }

    fn handle(&self, tree: &mut DocTree, node: NodeId, ctx: &DecoratorContext) -> EditorResult<()> {
        let Some(slice) = ctx.slice() else {
            return Ok(());
        };
        let label = slice.label();
        let rule = slice.placeholder().cloned().unwrap_or_default();

        let placeholder = tree.create_element("span");
        tree.set_attr(placeholder, self.config.placeholder_attribute.as_str(), label.as_str())?;
        if let Some(height) = &rule.height {
            tree.set_attr(placeholder, "style", format!("min-height: {}", height))?;
        }
        if rule.permanent {
            tree.add_class(placeholder, "permanent")?;
        }
        tree.set_text(placeholder, rule.text.unwrap_or(label))?;
        tree.append_child(node, placeholder)?;
        Ok(())
    }
}

/// Clicking a field opens its form
pub struct FocusDecorator;

impl Decorator for FocusDecorator {
    fn name(&self) -> &'static str {
        "focus"
    }

    fn when(&self, _tree: &DocTree, _node: NodeId, ctx: &DecoratorContext) -> bool {
        match ctx.slice() {
            Some(slice) => slice.display() != DisplayMode::Meta && !ctx.is_list(),
            None => false,
        }
    }

    fn handle(&self, tree: &mut DocTree, node: NodeId, _ctx: &DecoratorContext) -> EditorResult<()> {
        tree.add_listener(node, Listener::new(EventKind::Click, FOCUS_ACTION))?;
        Ok(())
    }
}

/// Clicking anywhere in a component selects it
pub struct SelectDecorator {
    reference_attribute: String,
}

impl SelectDecorator {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            reference_attribute: config.reference_attribute.clone(),
        }
    }
}

impl Decorator for SelectDecorator {
    fn name(&self) -> &'static str {
        "select"
    }

    fn when(&self, _tree: &DocTree, _node: NodeId, ctx: &DecoratorContext) -> bool {
        !ctx.reference.is_page()
    }

    fn handle(&self, tree: &mut DocTree, node: NodeId, _ctx: &DecoratorContext) -> EditorResult<()> {
        if let Some(root) = tree.closest_with_attr(node, &self.reference_attribute) {
            tree.add_listener(root, Listener::new(EventKind::Click, SELECT_ACTION))?;
        }
        Ok(())
    }
}

/// Component lists accept drag and drop reordering
pub struct SortableDecorator;

impl Decorator for SortableDecorator {
    fn name(&self) -> &'static str {
        "sortable"
    }

    fn when(&self, _tree: &DocTree, _node: NodeId, ctx: &DecoratorContext) -> bool {
        ctx.is_list()
    }

    fn handle(&self, tree: &mut DocTree, node: NodeId, _ctx: &DecoratorContext) -> EditorResult<()> {
        tree.add_class(node, "sortable")?;
        tree.add_listener(node, Listener::new(EventKind::DragStart, DRAG_ACTION))?;
        tree.add_listener(node, Listener::new(EventKind::Drop, REORDER_ACTION))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_model::{ComponentData, Reference, Schema};
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn context(schema: Value, data: Value, path: &str) -> DecoratorContext {
        let reference = Reference::instance("example.com", "article", "a1");
        let schema = Arc::new(Schema::from_value(&schema).unwrap());
        DecoratorContext {
            data: ComponentData::compose(reference.clone(), &data, &schema).unwrap(),
            reference,
            path: path.to_string(),
            schema,
        }
    }

    fn node() -> (DocTree, NodeId) {
        let mut tree = DocTree::new();
        let el = tree.create_element("div");
        tree.append_child(tree.root(), el).unwrap();
        (tree, el)
    }

    #[test]
    fn test_placeholder_uses_rule_text_and_height() {
        let ctx = context(
            json!({ "content": { "_componentList": true, "_placeholder": { "text": "Add", "height": "80px" } } }),
            json!({ "content": [] }),
            "content",
        );
        let (mut tree, el) = node();
        let decorator = PlaceholderDecorator::new(&EditorConfig::default());

        assert!(decorator.when(&tree, el, &ctx));
        decorator.handle(&mut tree, el, &ctx).unwrap();

        let placeholder = tree.children(el)[0];
        assert_eq!(tree.attr(placeholder, "data-placeholder"), Some("Content"));
        assert_eq!(tree.attr(placeholder, "style"), Some("min-height: 80px"));
        assert_eq!(tree.text_content(placeholder), "Add");
        assert!(!decorator.when(&tree, el, &ctx));
    }

    #[test]
    fn test_placeholder_skips_filled_fields_unless_permanent() {
        let (tree, el) = node();
        let decorator = PlaceholderDecorator::new(&EditorConfig::default());

        let filled = context(
            json!({ "title": { "_has": "text", "_placeholder": true } }),
            json!({ "title": "Hello" }),
            "title",
        );
        assert!(!decorator.when(&tree, el, &filled));

        let permanent = context(
            json!({ "title": { "_has": "text", "_placeholder": { "permanent": true } } }),
            json!({ "title": "Hello" }),
            "title",
        );
        assert!(decorator.when(&tree, el, &permanent));
    }

    #[test]
    fn test_group_placeholder_checks_every_field() {
        let (tree, el) = node();
        let decorator = PlaceholderDecorator::new(&EditorConfig::default());
        let schema = json!({
            "title": { "_has": "text" },
            "byline": { "_has": "text" },
            "_groups": { "head": { "fields": ["title", "byline"], "_placeholder": true } }
        });

        let half = context(schema.clone(), json!({ "title": "", "byline": "Ann" }), "head");
        assert!(!decorator.when(&tree, el, &half));

        let empty = context(schema, json!({ "title": "", "byline": "" }), "head");
        assert!(decorator.when(&tree, el, &empty));
    }

    #[test]
    fn test_meta_fields_are_not_focusable() {
        let (tree, el) = node();
        let ctx = context(
            json!({ "slug": { "_has": "text", "_display": "meta" } }),
            json!({ "slug": "a" }),
            "slug",
        );
        assert!(!FocusDecorator.when(&tree, el, &ctx));
    }

    #[test]
    fn test_sortable_marks_lists() {
        let ctx = context(
            json!({ "content": { "_componentList": true } }),
            json!({ "content": [] }),
            "content",
        );
        let (mut tree, el) = node();

        assert!(SortableDecorator.when(&tree, el, &ctx));
        SortableDecorator.handle(&mut tree, el, &ctx).unwrap();

        assert!(tree.has_class(el, "sortable"));
        assert!(tree.has_listener(el, EventKind::Drop, REORDER_ACTION));
    }
}
