//! Field behaviors: how one schema field becomes part of a form.
//!
//! A field's `_has` chain is resolved into typed [`BehaviorKind`]s and run in
//! order against a [`FieldContext`]. Each behavior adds to the context: input
//! nodes (binders), converters from input text to data (formatters) and
//! constraints checked on unfocus and before saving (validators).

use crate::errors::{EditorError, EditorResult, ValidationIssue};
use folio_dom::{DocTree, NodeId};
use folio_model::{BehaviorSpec, ComponentData, FieldSchema};
use regex::Regex;
use serde_json::{Number, Value};
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Clone)]
pub enum BehaviorKind {
    Text,
    Textarea,
    Checkbox,
    Select { options: Vec<String> },
    Number,
    Required,
    SoftMaxlength(usize),
    Pattern(Regex),
    Label,
    Description(String),
    /// Declared in a schema but not known here; logged and dropped
    Unknown(String),
}

impl BehaviorKind {
    pub fn name(&self) -> &str {
        match self {
            BehaviorKind::Text => "text",
            BehaviorKind::Textarea => "textarea",
            BehaviorKind::Checkbox => "checkbox",
            BehaviorKind::Select { .. } => "select",
            BehaviorKind::Number => "number",
            BehaviorKind::Required => "required",
            BehaviorKind::SoftMaxlength(_) => "soft-maxlength",
            BehaviorKind::Pattern(_) => "pattern",
            BehaviorKind::Label => "label",
            BehaviorKind::Description(_) => "description",
            BehaviorKind::Unknown(name) => name,
        }
    }

    fn apply(&self, tree: &mut DocTree, ctx: &mut FieldContext) -> EditorResult<()> {
        match self {
            BehaviorKind::Text => {
                let input = ctx.input(tree, "text")?;
                tree.set_attr(input, "value", display_value(&ctx.bindings.value))?;
                ctx.binders.push(Binder::Input(input));
                ctx.formatters.push(Formatter::Trim);
            }
            BehaviorKind::Textarea => {
                let textarea = tree.create_element("textarea");
                tree.set_attr(textarea, "name", ctx.name.as_str())?;
                tree.set_text(textarea, display_value(&ctx.bindings.value))?;
                tree.append_child(ctx.el, textarea)?;
                ctx.binders.push(Binder::Textarea(textarea));
                ctx.formatters.push(Formatter::Trim);
            }
            BehaviorKind::Checkbox => {
                let input = ctx.input(tree, "checkbox")?;
                if is_truthy(&ctx.bindings.value) {
                    tree.set_attr(input, "checked", "")?;
                }
                ctx.binders.push(Binder::Checkbox(input));
                ctx.formatters.push(Formatter::Boolean);
            }
            BehaviorKind::Select { options } => {
                let current = display_value(&ctx.bindings.value);
                let select = tree.create_element("select");
                tree.set_attr(select, "name", ctx.name.as_str())?;
                tree.set_attr(select, "value", current.as_str())?;
                for option in options {
                    let node = tree.create_element("option");
                    tree.set_attr(node, "value", option.as_str())?;
                    if *option == current {
                        tree.set_attr(node, "selected", "")?;
                    }
                    tree.set_text(node, option.as_str())?;
                    tree.append_child(select, node)?;
                }
                tree.append_child(ctx.el, select)?;
                ctx.binders.push(Binder::Select(select));
            }
            BehaviorKind::Number => {
                match ctx.binders.last() {
                    Some(Binder::Input(input)) => tree.set_attr(*input, "type", "number")?,
                    _ => {
                        let input = ctx.input(tree, "number")?;
                        tree.set_attr(input, "value", display_value(&ctx.bindings.value))?;
                        ctx.binders.push(Binder::Input(input));
                    }
                }
                ctx.formatters.push(Formatter::Number);
            }
            BehaviorKind::Required => {
                if let Some(input) = ctx.primary_input() {
                    tree.set_attr(input, "required", "")?;
                }
                ctx.validators.push(Validator::Required);
            }
            BehaviorKind::SoftMaxlength(max) => {
                if let Some(input) = ctx.primary_input() {
                    tree.set_attr(input, "data-maxlength", max.to_string())?;
                }
                ctx.validators.push(Validator::SoftMaxlength(*max));
            }
            BehaviorKind::Pattern(pattern) => {
                if let Some(input) = ctx.primary_input() {
                    tree.set_attr(input, "pattern", pattern.as_str())?;
                }
                ctx.validators.push(Validator::Pattern(pattern.clone()));
            }
            BehaviorKind::Label => {
                let label = tree.create_element("label");
                tree.set_text(label, ctx.bindings.label.as_str())?;
                tree.insert_child(ctx.el, 0, label)?;
            }
            BehaviorKind::Description(text) => {
                let description = tree.create_element("p");
                tree.set_attr(description, "class", "description")?;
                tree.set_text(description, text.as_str())?;
                tree.append_child(ctx.el, description)?;
            }
            BehaviorKind::Unknown(_) => {}
        }
        Ok(())
    }
}

/// Input node that receives the field value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binder {
    Input(NodeId),
    Textarea(NodeId),
    Checkbox(NodeId),
    Select(NodeId),
}

impl Binder {
    pub fn node(&self) -> NodeId {
        match *self {
            Binder::Input(n) | Binder::Textarea(n) | Binder::Checkbox(n) | Binder::Select(n) => n,
        }
    }

    fn read(&self, tree: &DocTree) -> Value {
        match *self {
            Binder::Input(n) | Binder::Select(n) => {
                Value::String(tree.attr(n, "value").unwrap_or_default().to_string())
            }
            Binder::Textarea(n) => Value::String(tree.text_content(n)),
            Binder::Checkbox(n) => Value::Bool(tree.has_attr(n, "checked")),
        }
    }
}

/// Converts bound input into the stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formatter {
    Trim,
    Number,
    Boolean,
}

impl Formatter {
    pub fn apply(&self, value: Value) -> Value {
        match (self, value) {
            (Formatter::Trim, Value::String(s)) => Value::String(s.trim().to_string()),
            (Formatter::Number, Value::String(s)) => {
                let s = s.trim();
                if s.is_empty() {
                    Value::Null
                } else if let Ok(int) = s.parse::<i64>() {
                    Value::Number(int.into())
                } else {
                    s.parse::<f64>()
                        .ok()
                        .and_then(Number::from_f64)
                        .map(Value::Number)
                        .unwrap_or_else(|| Value::String(s.to_string()))
                }
            }
            (Formatter::Boolean, Value::String(s)) => {
                Value::Bool(matches!(s.trim(), "true" | "on" | "1"))
            }
            (_, value) => value,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Validator {
    Required,
    Pattern(Regex),
    /// Over-long values are reported but never block
    SoftMaxlength(usize),
}

#[derive(Debug, Clone)]
pub struct Bindings {
    pub value: Value,
    pub label: String,
}

/// Form surface for one field, built up by its behavior chain
#[derive(Debug, Clone)]
pub struct FieldContext {
    pub name: String,
    pub el: NodeId,
    pub bindings: Bindings,
    pub binders: Vec<Binder>,
    pub formatters: Vec<Formatter>,
    pub validators: Vec<Validator>,
}

impl FieldContext {
    fn input(&self, tree: &mut DocTree, kind: &str) -> EditorResult<NodeId> {
        let input = tree.create_element("input");
        tree.set_attr(input, "type", kind)?;
        tree.set_attr(input, "name", self.name.as_str())?;
        tree.append_child(self.el, input)?;
        Ok(input)
    }

    pub fn primary_input(&self) -> Option<NodeId> {
        self.binders.first().map(Binder::node)
    }

    /// Current value as it would be saved
    pub fn read(&self, tree: &DocTree) -> Value {
        let raw = match self.binders.first() {
            Some(binder) => binder.read(tree),
            None => self.bindings.value.clone(),
        };
        self.formatters.iter().fold(raw, |value, f| f.apply(value))
    }

    pub fn validate(&self, tree: &DocTree) -> Vec<ValidationIssue> {
        let value = self.read(tree);
        let mut issues = Vec::new();
        for validator in &self.validators {
            match validator {
                Validator::Required if is_empty_value(&value) => {
                    issues.push(ValidationIssue::new(
                        &self.name,
                        format!("{} is required", self.bindings.label),
                    ));
                }
                Validator::Pattern(pattern) => {
                    if let Some(text) = value.as_str().filter(|t| !t.is_empty()) {
                        if !pattern.is_match(text) {
                            issues.push(ValidationIssue::new(
                                &self.name,
                                format!("{} does not match the expected format", self.bindings.label),
                            ));
                        }
                    }
                }
                Validator::SoftMaxlength(max) => {
                    let len = value.as_str().map_or(0, |t| t.chars().count());
                    if len > *max {
                        warn!(field = %self.name, len, max, "Value exceeds soft max length");
                    }
                }
                Validator::Required => {}
            }
        }
        issues
    }
}

/// Resolves behavior declarations and builds form fields from them
#[derive(Debug, Clone)]
pub struct BehaviorRegistry {
    /// Host-specific behavior names mapped onto built-in ones
    aliases: HashMap<String, String>,
}

impl Default for BehaviorRegistry {
    fn default() -> Self {
        let mut registry = Self {
            aliases: HashMap::new(),
        };
        registry
            .alias("wysiwyg", "textarea")
            .alias("segmented-button", "select")
            .alias("checkbox-group", "checkbox");
        registry
    }
}

impl BehaviorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alias(&mut self, name: impl Into<String>, builtin: impl Into<String>) -> &mut Self {
        self.aliases.insert(name.into(), builtin.into());
        self
    }

    /// Resolve one declaration. `{fn: ..., required: true}` adds a trailing
    /// required behavior. Malformed arguments are a usage error.
    pub fn resolve(&self, spec: &BehaviorSpec) -> EditorResult<Vec<BehaviorKind>> {
        let name = self
            .aliases
            .get(&spec.name)
            .map(String::as_str)
            .unwrap_or(&spec.name);
        let kind = match name {
            "text" => BehaviorKind::Text,
            "textarea" => BehaviorKind::Textarea,
            "checkbox" => BehaviorKind::Checkbox,
            "number" => BehaviorKind::Number,
            "required" => BehaviorKind::Required,
            "label" => BehaviorKind::Label,
            "select" => {
                let options = spec
                    .arg("options")
                    .and_then(Value::as_array)
                    .ok_or_else(|| malformed(spec, "needs an options array"))?
                    .iter()
                    .map(|option| match option {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                BehaviorKind::Select { options }
            }
            "soft-maxlength" => {
                let max = spec
                    .arg("value")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| malformed(spec, "needs a numeric value"))?;
                BehaviorKind::SoftMaxlength(max as usize)
            }
            "pattern" => {
                let pattern = spec
                    .arg("value")
                    .and_then(Value::as_str)
                    .ok_or_else(|| malformed(spec, "needs a value"))?;
                let regex = Regex::new(&format!("^(?:{})$", pattern))
                    .map_err(|e| malformed(spec, &e.to_string()))?;
                BehaviorKind::Pattern(regex)
            }
            "description" => {
                let text = spec
                    .arg("value")
                    .and_then(Value::as_str)
                    .ok_or_else(|| malformed(spec, "needs a value"))?;
                BehaviorKind::Description(text.to_string())
            }
            other => BehaviorKind::Unknown(other.to_string()),
        };

        let mut kinds = vec![kind];
        if spec.arg("required") == Some(&Value::Bool(true)) && name != "required" {
            kinds.push(BehaviorKind::Required);
        }
        Ok(kinds)
    }

    /// Resolved chain for a field with unknown behaviors dropped
    pub fn chain(&self, field: &FieldSchema) -> EditorResult<Vec<BehaviorKind>> {
        let mut chain = Vec::new();
        for spec in &field.behaviors {
            for kind in self.resolve(spec)? {
                if let BehaviorKind::Unknown(name) = &kind {
                    warn!(behavior = %name, field = %field.name, "Unknown field behavior, skipping");
                    continue;
                }
                chain.push(kind);
            }
        }
        Ok(chain)
    }

    /// Whether [`build`](Self::build) would produce a surface for `field`
    pub fn is_editable(&self, field: &FieldSchema) -> EditorResult<bool> {
        Ok(field.container.is_none() && !self.chain(field)?.is_empty())
    }

    /// Build the form surface for `field` inside `form`. Returns `None` when
    /// the field has nothing editable.
    pub fn build(
        &self,
        tree: &mut DocTree,
        form: NodeId,
        field: &FieldSchema,
        value: Value,
    ) -> EditorResult<Option<FieldContext>> {
        if field.container.is_some() {
            return Ok(None);
        }
        let chain = self.chain(field)?;
        if chain.is_empty() {
            return Ok(None);
        }

        let el = tree.create_element("div");
        tree.set_attr(el, "data-field", field.name.as_str())?;
        tree.append_child(form, el)?;
        let mut ctx = FieldContext {
            name: field.name.clone(),
            el,
            bindings: Bindings {
                value,
                label: field.display_label(),
            },
            binders: Vec::new(),
            formatters: Vec::new(),
            validators: Vec::new(),
        };
        for kind in &chain {
            kind.apply(tree, &mut ctx)?;
        }
        Ok(Some(ctx))
    }
}

fn malformed(spec: &BehaviorSpec, message: &str) -> EditorError {
    EditorError::usage(format!("behavior {:?} {}", spec.name, message))
}

/// Whether a field's declarations make it required
pub fn is_required(field: &FieldSchema) -> bool {
    field
        .behaviors
        .iter()
        .any(|b| b.name == "required" || b.arg("required") == Some(&Value::Bool(true)))
}

/// Required fields among `names` that are empty in `data`
pub fn required_issues(data: &ComponentData, names: &[String]) -> Vec<ValidationIssue> {
    names
        .iter()
        .filter_map(|name| {
            let field = data.field(name)?;
            let schema = field.schema.as_ref().filter(|s| is_required(s))?;
            is_empty_value(&field.value.to_raw())
                .then(|| ValidationIssue::new(name, format!("{} is required", schema.display_label())))
        })
        .collect()
}

pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(object) => object.is_empty(),
        _ => false,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.as_str(), "true" | "on" | "1"),
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(raw: Value) -> FieldSchema {
        let schema = folio_model::Schema::from_value(&json!({ "f": raw })).unwrap();
        schema.field("f").unwrap().clone()
    }

    fn build(raw: Value, value: Value) -> (DocTree, FieldContext) {
        let mut tree = DocTree::new();
        let form = tree.create_element("form");
        tree.append_child(tree.root(), form).unwrap();
        let ctx = BehaviorRegistry::new()
            .build(&mut tree, form, &field(raw), value)
            .unwrap()
            .unwrap();
        (tree, ctx)
    }

    #[test]
    fn test_shorthand_and_object_forms_resolve() {
        let registry = BehaviorRegistry::new();
        let kinds = registry
            .chain(&field(json!({ "_has": ["label", { "fn": "text", "required": true }] })))
            .unwrap();
        let names: Vec<_> = kinds.iter().map(BehaviorKind::name).collect();
        assert_eq!(names, vec!["label", "text", "required"]);
    }

    #[test]
    fn test_unknown_behaviors_are_dropped() {
        let registry = BehaviorRegistry::new();
        let kinds = registry
            .chain(&field(json!({ "_has": ["magic-widget", "text"] })))
            .unwrap();
        assert_eq!(kinds.len(), 1);
        assert_eq!(kinds[0].name(), "text");
    }

    #[test]
    fn test_aliases_map_to_builtins() {
        let registry = BehaviorRegistry::new();
        let kinds = registry.chain(&field(json!({ "_has": "wysiwyg" }))).unwrap();
        assert_eq!(kinds[0].name(), "textarea");
    }

    #[test]
    fn test_malformed_arguments_are_usage_errors() {
        let registry = BehaviorRegistry::new();
        let err = registry
            .chain(&field(json!({ "_has": { "fn": "pattern", "value": "(" } })))
            .unwrap_err();
        assert!(matches!(err, EditorError::Usage(_)));
    }

    #[test]
    fn test_text_field_reads_trimmed_value() {
        let (mut tree, ctx) = build(json!({ "_has": "text" }), json!("Hello"));
        let input = ctx.primary_input().unwrap();
        assert_eq!(tree.attr(input, "value"), Some("Hello"));

        tree.set_attr(input, "value", "  Changed  ").unwrap();
        assert_eq!(ctx.read(&tree), json!("Changed"));
    }

    #[test]
    fn test_number_and_checkbox_formatters() {
        let (mut tree, ctx) = build(json!({ "_has": ["text", "number"] }), json!(3));
        tree.set_attr(ctx.primary_input().unwrap(), "value", "42").unwrap();
        assert_eq!(ctx.read(&tree), json!(42));

        let (mut tree, ctx) = build(json!({ "_has": "checkbox" }), json!(true));
        assert_eq!(ctx.read(&tree), json!(true));
        tree.remove_attr(ctx.primary_input().unwrap(), "checked").unwrap();
        assert_eq!(ctx.read(&tree), json!(false));
    }

    #[test]
    fn test_required_and_pattern_validation() {
        let (mut tree, ctx) = build(
            json!({ "_has": ["text", "required", { "fn": "pattern", "value": "[a-z]+" }] }),
            json!(""),
        );
        let input = ctx.primary_input().unwrap();
        assert!(tree.has_attr(input, "required"));
        assert_eq!(ctx.validate(&tree).len(), 1);

        tree.set_attr(input, "value", "ABC").unwrap();
        assert_eq!(ctx.validate(&tree)[0].message, "F does not match the expected format");

        tree.set_attr(input, "value", "abc").unwrap();
        assert!(ctx.validate(&tree).is_empty());
    }

    #[test]
    fn test_select_marks_current_option() {
        let (tree, ctx) = build(
            json!({ "_has": { "fn": "select", "options": ["left", "right"] } }),
            json!("right"),
        );
        let select = ctx.primary_input().unwrap();
        let options = tree.element_children(select);
        assert!(!tree.has_attr(options[0], "selected"));
        assert!(tree.has_attr(options[1], "selected"));
        assert_eq!(ctx.read(&tree), json!("right"));
    }

    #[test]
    fn test_container_fields_have_no_form_surface() {
        let mut tree = DocTree::new();
        let form = tree.create_element("form");
        let built = BehaviorRegistry::new()
            .build(&mut tree, form, &field(json!({ "_componentList": true })), json!([]))
            .unwrap();
        assert!(built.is_none());
    }
}
