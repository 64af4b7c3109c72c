//! # Edit Session Management
//!
//! At most one form is open at a time. An [`EditSession`] holds the open
//! form: what it edits, a snapshot of the data it was opened with, and the
//! field surfaces built by the behavior registry.
//!
//! Closing diffs the form against the snapshot. Nothing changed means no
//! network call. A failed save keeps the form in the tree so the edits are
//! not lost; the caller retries or cancels.

use crate::behaviors::{BehaviorRegistry, FieldContext};
use crate::config::EditorConfig;
use crate::errors::{EditorError, EditorResult, ValidationIssue};
use crate::mutations::MutationEngine;
use chrono::{DateTime, Utc};
use folio_dom::{DocTree, NodeId};
use folio_model::{ComponentData, DisplayMode, Reference};
use folio_store::DataCache;
use serde_json::{Map, Value};
use tracing::{debug, error, info};

pub const FORM_FOR_ATTRIBUTE: &str = "data-form-for";
pub const FORM_PATH_ATTRIBUTE: &str = "data-form-path";
const INVALID_ATTRIBUTE: &str = "data-invalid";

/// One open form
#[derive(Debug, Clone)]
pub struct EditSession {
    pub reference: Reference,
    pub path: String,
    /// Data as it was when the form opened
    pub snapshot: ComponentData,
    pub fields: Vec<FieldContext>,
    pub form: NodeId,
    /// Element the form was opened for
    pub target: NodeId,
    pub display: DisplayMode,
    /// Character offset for the caret in the first input
    pub caret: Option<usize>,
    pub opened_at: DateTime<Utc>,
}

impl EditSession {
    /// Fields whose form value differs from the snapshot
    pub fn changes(&self, tree: &DocTree) -> Map<String, Value> {
        let mut changed = Map::new();
        for field in &self.fields {
            let current = field.read(tree);
            let original = self.snapshot.value(&field.name).unwrap_or(Value::Null);
            if normalize(&current) != normalize(&original) {
                changed.insert(field.name.clone(), current);
            }
        }
        changed
    }

    pub fn validate(&self, tree: &DocTree) -> Vec<ValidationIssue> {
        self.fields.iter().flat_map(|f| f.validate(tree)).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CloseOutcome {
    NotOpen,
    /// Nothing changed; the form was discarded without a save
    Unchanged { reference: Reference },
    Saved { reference: Reference, data: ComponentData },
}

/// The single-form slot
pub struct Forms {
    behaviors: BehaviorRegistry,
    config: EditorConfig,
    current: Option<EditSession>,
}

impl Forms {
    pub fn new(behaviors: BehaviorRegistry, config: EditorConfig) -> Self {
        Self {
            behaviors,
            config,
            current: None,
        }
    }

    pub fn current(&self) -> Option<&EditSession> {
        self.current.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    pub fn behaviors(&self) -> &BehaviorRegistry {
        &self.behaviors
    }

    /// Open a form for `reference`/`path` next to `target` (inline) or at the
    /// end of the document (modal). An empty path opens the settings form.
    ///
    /// Returns false without doing anything when a form is already open, an
    /// inline form already sits in `target`, or the path has no editable fields.
    pub async fn open(
        &mut self,
        tree: &mut DocTree,
        cache: &DataCache,
        target: NodeId,
        reference: &Reference,
        path: &str,
        caret: Option<usize>,
    ) -> EditorResult<bool> {
        if !tree.is_element(target) {
            return Err(EditorError::usage(format!("cannot open a form on {:?}", target)));
        }
        if reference.is_page() {
            return Err(EditorError::usage(format!("{} is a page and has no form", reference)));
        }
        if let Some(open) = &self.current {
            debug!(open = %open.reference, requested = %reference, "A form is already open");
            return Ok(false);
        }
        if !tree.find_all(target, |t, n| t.has_attr(n, FORM_FOR_ATTRIBUTE)).is_empty() {
            debug!(reference = %reference, "Inline form already open in target");
            return Ok(false);
        }

        let (data, schema) = tokio::try_join!(cache.get_data(reference), cache.get_schema(reference))?;
        let (display, field_schemas) = if path.is_empty() {
            (DisplayMode::Modal, schema.settings_fields())
        } else {
            let display = schema.slice(path).map(|s| s.display()).unwrap_or_default();
            (display, schema.fields_for(path))
        };

        let mut editable = false;
        for field in &field_schemas {
            editable |= self.behaviors.is_editable(field)?;
        }
        if !editable {
            debug!(reference = %reference, path = %path, "No editable fields, not opening a form");
            return Ok(false);
        }

        let form = tree.create_element("form");
        tree.set_attr(form, FORM_FOR_ATTRIBUTE, reference.as_str())?;
        tree.set_attr(form, FORM_PATH_ATTRIBUTE, path)?;
        tree.set_attr(form, "class", format!("editor-form {}", display_class(display)))?;

        let mut fields = Vec::new();
        for field in field_schemas {
            let value = data.value(&field.name).unwrap_or(Value::Null);
            if let Some(ctx) = self.behaviors.build(tree, form, field, value)? {
                fields.push(ctx);
            }
        }

        match display {
            DisplayMode::Inline => {
                tree.insert_after(target, form)?;
                tree.set_attr(target, "hidden", "")?;
            }
            DisplayMode::Modal | DisplayMode::Meta => {
                let host = document_element(tree).unwrap_or_else(|| tree.root());
                tree.append_child(host, form)?;
            }
        }
        if let Some(doc) = document_element(tree) {
            tree.set_attr(doc, self.config.editing_attribute.as_str(), "true")?;
        }
        if let Some(input) = fields.first().and_then(FieldContext::primary_input) {
            tree.focus(input)?;
        }

        let mode = display;
        info!(reference = %reference, path = %path, mode = ?mode, fields = fields.len(), "Opened form");
        self.current = Some(EditSession {
            reference: reference.clone(),
            path: path.to_string(),
            snapshot: data,
            fields,
            form,
            target,
            display,
            caret,
            opened_at: Utc::now(),
        });
        Ok(true)
    }

    /// Validation issues of the open form, marking offending fields
    pub fn validate(&self, tree: &mut DocTree) -> EditorResult<Vec<ValidationIssue>> {
        let Some(session) = &self.current else {
            return Ok(Vec::new());
        };
        let issues = session.validate(tree);
        for field in &session.fields {
            if issues.iter().any(|i| i.field == field.name) {
                tree.set_attr(field.el, INVALID_ATTRIBUTE, "")?;
            } else {
                tree.remove_attr(field.el, INVALID_ATTRIBUTE)?;
            }
        }
        Ok(issues)
    }

    /// Close the open form, saving changed fields.
    ///
    /// Invalid fields or a failed save leave the form open and return the error.
    pub async fn close(&mut self, tree: &mut DocTree, mutations: &MutationEngine) -> EditorResult<CloseOutcome> {
        let issues = self.validate(tree)?;
        let Some(session) = &self.current else {
            return Ok(CloseOutcome::NotOpen);
        };
        if !issues.is_empty() {
            return Err(EditorError::Validation(issues));
        }

        let reference = session.reference.clone();
        let changes = session.changes(tree);
        if changes.is_empty() {
            debug!(reference = %reference, "Form unchanged, discarding");
            self.teardown(tree)?;
            return Ok(CloseOutcome::Unchanged { reference });
        }

        let fields: Vec<String> = changes.keys().cloned().collect();
        match mutations.save_component(&reference, changes).await {
            Ok(data) => {
                info!(reference = %reference, ?fields, "Saved form");
                self.teardown(tree)?;
                Ok(CloseOutcome::Saved { reference, data })
            }
            Err(e) => {
                error!(reference = %reference, error = %e, "Saving form failed, keeping it open");
                Err(e)
            }
        }
    }

    /// Discard the open form without saving. Returns the reference it was for.
    pub fn cancel(&mut self, tree: &mut DocTree) -> EditorResult<Option<Reference>> {
        let reference = self.current.as_ref().map(|s| s.reference.clone());
        if reference.is_some() {
            info!(reference = ?reference, "Cancelled form");
            self.teardown(tree)?;
        }
        Ok(reference)
    }

    fn teardown(&mut self, tree: &mut DocTree) -> EditorResult<()> {
        let Some(session) = self.current.take() else {
            return Ok(());
        };
        tree.detach(session.form)?;
        if session.display == DisplayMode::Inline && tree.contains(session.target) {
            tree.remove_attr(session.target, "hidden")?;
        }
        if let Some(doc) = document_element(tree) {
            tree.remove_attr(doc, &self.config.editing_attribute)?;
        }
        tree.blur();
        Ok(())
    }
}

fn display_class(display: DisplayMode) -> &'static str {
    match display {
        DisplayMode::Inline => "inline",
        DisplayMode::Modal => "modal",
        DisplayMode::Meta => "meta",
    }
}

/// Outermost element of the document
pub fn document_element(tree: &DocTree) -> Option<NodeId> {
    tree.element_children(tree.root()).into_iter().next()
}

/// Comparable form of a value: `_` keys stripped, whitespace collapsed and
/// null treated as the empty string
fn normalize(value: &Value) -> Value {
    match value {
        Value::Null => Value::String(String::new()),
        Value::String(s) => Value::String(s.split_whitespace().collect::<Vec<_>>().join(" ")),
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        Value::Object(object) => Value::Object(
            object
                .iter()
                .filter(|(key, _)| !key.starts_with('_'))
                .map(|(key, value)| (key.clone(), normalize(value)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_ignores_whitespace_and_metadata() {
        assert_eq!(normalize(&json!("  a \n b ")), normalize(&json!("a b")));
        assert_eq!(normalize(&Value::Null), normalize(&json!("")));
        assert_eq!(
            normalize(&json!({ "_ref": "x", "text": "a  b" })),
            normalize(&json!({ "text": "a b" }))
        );
        assert_ne!(normalize(&json!("a")), normalize(&json!("b")));
    }

    #[test]
    fn test_document_element_is_first_element() {
        let tree = DocTree::from_markup("<!-- c --><html><body></body></html>").unwrap();
        let doc = document_element(&tree).unwrap();
        assert_eq!(tree.tag(doc), Some("html"));
    }
}
