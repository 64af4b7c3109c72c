//! # Editor
//!
//! Owns the live tree and wires the pieces together:
//!
//! ```text
//! UiEvent ─▶ dispatch ─▶ select / focus / unfocus ─▶ Forms ─▶ MutationEngine ─▶ SaveQueue
//!                                                      │                           │
//!                                                      ▼                           ▼
//!                                         reconcile + Pipeline ◀── markup ── DataCache
//! ```
//!
//! Every public operation returns its error. [`Editor::dispatch`] is the
//! catch-all boundary for UI events: failures land in the status indicator and
//! on the event channel instead of propagating.

use crate::behaviors::BehaviorRegistry;
use crate::config::EditorConfig;
use crate::decorators::{FOCUS_ACTION, SELECT_ACTION};
use crate::errors::{EditorError, EditorResult, ValidationIssue};
use crate::linkage::{find_list, own_editables, owning_component, parent_linkage, path_of, reference_of, ListRegion};
use crate::mutations::{FieldTarget, MutationEngine};
use crate::pipeline::{Pipeline, PipelineRegistry};
use crate::post_effects::{clear_placeholders, PostAction, PostEffectEngine, StructuralChange};
use crate::reconciler::{fetch_and_reconcile, fragment_root};
use crate::selection::{FocusOptions, Selection};
use crate::session::{CloseOutcome, Forms};
use chrono::{DateTime, Utc};
use folio_dom::{DocTree, EventKind, NodeId};
use folio_model::Reference;
use folio_store::{DataCache, QueueStatus, RemoteStore, SaveQueue};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Enter,
    ArrowUp,
    ArrowDown,
}

/// Interaction delivered by the host adapter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UiEvent {
    Click { target: NodeId, options: FocusOptions },
    KeyDown(Key),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    Selected(Reference),
    Deselected(Reference),
    FormOpened { reference: Reference, path: String },
    FormClosed { reference: Reference, saved: bool },
    Reconciled(Reference),
    Error(String),
}

/// What the progress and error affordances show
#[derive(Debug, Clone, PartialEq)]
pub struct StatusIndicator {
    pub progress: QueueStatus,
    pub error: Option<String>,
    pub error_at: Option<DateTime<Utc>>,
    pub validation: Vec<ValidationIssue>,
}

impl Default for StatusIndicator {
    fn default() -> Self {
        Self {
            progress: QueueStatus::Idle,
            error: None,
            error_at: None,
            validation: Vec::new(),
        }
    }
}

impl StatusIndicator {
    fn record(&mut self, err: &EditorError) {
        self.error = Some(err.to_string());
        self.error_at = Some(Utc::now());
        self.validation = err.issues().to_vec();
    }
}

pub struct Editor {
    config: EditorConfig,
    tree: DocTree,
    cache: Arc<DataCache>,
    mutations: MutationEngine,
    pipeline: Pipeline,
    post_effects: PostEffectEngine,
    forms: Forms,
    selection: Selection,
    status: StatusIndicator,
    events: broadcast::Sender<EditorEvent>,
}

impl Editor {
    /// Editor with the built-in decorators and behaviors
    pub fn new(store: Arc<dyn RemoteStore>, config: EditorConfig) -> Self {
        let pipeline = PipelineRegistry::with_defaults(&config);
        Self::with_registries(store, config, pipeline, BehaviorRegistry::default())
    }

    pub fn with_registries(
        store: Arc<dyn RemoteStore>,
        config: EditorConfig,
        pipeline: PipelineRegistry,
        behaviors: BehaviorRegistry,
    ) -> Self {
        let cache = Arc::new(DataCache::new(store));
        let queue = Arc::new(SaveQueue::new());
        let mutations = MutationEngine::new(cache.clone(), queue, config.site.clone());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            forms: Forms::new(behaviors, config.clone()),
            tree: DocTree::new(),
            cache,
            mutations,
            pipeline: Pipeline::new(pipeline),
            post_effects: PostEffectEngine::new(),
            selection: Selection::new(),
            status: StatusIndicator::default(),
            events,
            config,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn tree(&self) -> &DocTree {
        &self.tree
    }

    /// Direct access for host adapters that mirror input into the tree
    pub fn tree_mut(&mut self) -> &mut DocTree {
        &mut self.tree
    }

    pub fn cache(&self) -> &Arc<DataCache> {
        &self.cache
    }

    pub fn queue(&self) -> &Arc<SaveQueue> {
        self.mutations.queue()
    }

    pub fn mutations(&self) -> &MutationEngine {
        &self.mutations
    }

    pub fn forms(&self) -> &Forms {
        &self.forms
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Status with the current queue progress
    pub fn status(&self) -> StatusIndicator {
        StatusIndicator {
            progress: self.queue().status(),
            ..self.status.clone()
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EditorEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: EditorEvent) {
        // no receivers is fine
        let _ = self.events.send(event);
    }

    /// Replace the document with `markup` and decorate all of it. Returns the
    /// number of decorated nodes.
    pub async fn load(&mut self, markup: &str) -> EditorResult<usize> {
        let tree = DocTree::from_markup(markup)?;
        self.forms.cancel(&mut self.tree)?;
        self.selection.deselect(&mut self.tree, &self.config)?;
        self.tree = tree;
        self.pipeline.reset();

        let root = self.tree.root();
        let count = self
            .pipeline
            .decorate_subtree(&mut self.tree, root, &self.cache, &self.config)
            .await?;
        info!(decorated = count, "Loaded document");
        Ok(count)
    }

    /// Root of `reference`, or the editable for `path` inside it
    pub fn locate(&self, reference: &Reference, path: &str) -> Option<NodeId> {
        let root = self.tree.find_by_attr(
            self.tree.root(),
            &self.config.reference_attribute,
            reference.as_str(),
        )?;
        if path.is_empty() {
            return Some(root);
        }
        own_editables(&self.tree, root, &self.config)
            .into_iter()
            .find(|n| path_of(&self.tree, *n, &self.config) == Some(path))
    }

    // Selection and forms

    /// Select the component rooted at `el`. An open form is closed first.
    pub async fn select(&mut self, el: NodeId) -> EditorResult<Reference> {
        reference_of(&self.tree, el, &self.config)?;
        if self.forms.is_open() {
            self.unfocus().await?;
        }
        let reference = self.selection.select(&mut self.tree, el, &self.config)?;
        self.emit(EditorEvent::Selected(reference.clone()));
        Ok(reference)
    }

    /// Close any open form, select the owner of `node` and open a form for
    /// its field. Returns whether a form was opened.
    pub async fn focus(&mut self, node: NodeId, options: FocusOptions) -> EditorResult<bool> {
        let (_, reference) = owning_component(&self.tree, node, &self.config)
            .ok_or_else(|| EditorError::usage(format!("cannot focus {:?}: no owning component", node)))?;
        let path = path_of(&self.tree, node, &self.config)
            .ok_or_else(|| EditorError::usage(format!("cannot focus {:?}: no field path", node)))?
            .to_string();

        self.unfocus().await?;

        // closing may have re-rendered the component
        let node = if self.tree.is_attached(node) {
            node
        } else {
            self.locate(&reference, &path).ok_or_else(|| {
                EditorError::usage(format!("{} {} is no longer rendered", reference, path))
            })?
        };
        let (component, _) = owning_component(&self.tree, node, &self.config)
            .ok_or_else(|| EditorError::usage(format!("cannot focus {:?}: no owning component", node)))?;
        self.selection.select(&mut self.tree, component, &self.config)?;
        self.emit(EditorEvent::Selected(reference.clone()));

        let caret = options.caret(&self.tree.text_content(node));
        self.open_at(node, &reference, &path, caret).await
    }

    /// Open a form for `reference`/`path` without touching the selection
    pub async fn open(&mut self, reference: &Reference, path: &str) -> EditorResult<bool> {
        let target = self
            .locate(reference, path)
            .or_else(|| self.locate(reference, ""))
            .ok_or_else(|| EditorError::usage(format!("{} is not rendered", reference)))?;
        self.open_at(target, reference, path, None).await
    }

    async fn open_at(
        &mut self,
        target: NodeId,
        reference: &Reference,
        path: &str,
        caret: Option<usize>,
    ) -> EditorResult<bool> {
        let opened = self
            .forms
            .open(&mut self.tree, &self.cache, target, reference, path, caret)
            .await?;
        if opened {
            self.emit(EditorEvent::FormOpened {
                reference: reference.clone(),
                path: path.to_string(),
            });
        }
        Ok(opened)
    }

    /// Validate and close the open form, then clear the selection. Invalid
    /// fields keep the form open.
    pub async fn unfocus(&mut self) -> EditorResult<()> {
        if self.forms.is_open() {
            let issues = self.forms.validate(&mut self.tree)?;
            if !issues.is_empty() {
                return Err(EditorError::Validation(issues));
            }
            self.close().await?;
        }
        if let Some(previous) = self.selection.deselect(&mut self.tree, &self.config)? {
            self.emit(EditorEvent::Deselected(previous));
        }
        Ok(())
    }

    /// Close the open form, saving and re-rendering if anything changed
    pub async fn close(&mut self) -> EditorResult<CloseOutcome> {
        let outcome = self.forms.close(&mut self.tree, &self.mutations).await?;
        match &outcome {
            CloseOutcome::Saved { reference, .. } => {
                self.emit(EditorEvent::FormClosed {
                    reference: reference.clone(),
                    saved: true,
                });
                self.rerender(reference).await?;
            }
            CloseOutcome::Unchanged { reference } => {
                self.emit(EditorEvent::FormClosed {
                    reference: reference.clone(),
                    saved: false,
                });
            }
            CloseOutcome::NotOpen => {}
        }
        Ok(outcome)
    }

    /// Discard the open form
    pub fn cancel(&mut self) -> EditorResult<()> {
        if let Some(reference) = self.forms.cancel(&mut self.tree)? {
            self.emit(EditorEvent::FormClosed {
                reference,
                saved: false,
            });
        }
        Ok(())
    }

    pub async fn select_next(&mut self) -> EditorResult<Option<Reference>> {
        self.unfocus_form().await?;
        let selected = self.selection.select_next(&mut self.tree, &self.config)?;
        if let Some(reference) = &selected {
            self.emit(EditorEvent::Selected(reference.clone()));
        }
        Ok(selected)
    }

    pub async fn select_prev(&mut self) -> EditorResult<Option<Reference>> {
        self.unfocus_form().await?;
        let selected = self.selection.select_prev(&mut self.tree, &self.config)?;
        if let Some(reference) = &selected {
            self.emit(EditorEvent::Selected(reference.clone()));
        }
        Ok(selected)
    }

    /// Close the open form, keeping the selection
    async fn unfocus_form(&mut self) -> EditorResult<()> {
        if self.forms.is_open() {
            let issues = self.forms.validate(&mut self.tree)?;
            if !issues.is_empty() {
                return Err(EditorError::Validation(issues));
            }
            self.close().await?;
        }
        Ok(())
    }

    /// Fetch fresh markup for `reference` and swap it in
    pub async fn rerender(&mut self, reference: &Reference) -> EditorResult<Vec<NodeId>> {
        let roots = fetch_and_reconcile(
            &mut self.tree,
            &self.cache,
            &mut self.pipeline,
            reference,
            &self.config,
        )
        .await?;
        let reselect = self
            .selection
            .selected()
            .is_some_and(|s| s.reference == *reference);
        if let (true, Some(root)) = (reselect, roots.first()) {
            self.selection.retarget(&mut self.tree, *root, &self.config)?;
        }
        self.emit(EditorEvent::Reconciled(reference.clone()));
        Ok(roots)
    }

    // Structural edits

    /// Create a `name` component and add it to `target` after `prev`
    pub async fn add_component(
        &mut self,
        name: &str,
        target: &FieldTarget,
        prev: Option<&Reference>,
    ) -> EditorResult<Reference> {
        let created = self.mutations.create_component(name, None).await?;
        self.insert_components(std::slice::from_ref(&created.reference), target, prev)
            .await?;
        Ok(created.reference)
    }

    /// Add existing components to `target` as one run and render them in place
    pub async fn insert_components(
        &mut self,
        references: &[Reference],
        target: &FieldTarget,
        prev: Option<&Reference>,
    ) -> EditorResult<Vec<NodeId>> {
        let markup = self
            .mutations
            .add_multiple_to_parent_list(references, target, prev)
            .await?;
        let Some(region) = self.region_for(target) else {
            debug!(parent = %target.parent, field = %target.field, "Target list is not rendered");
            return Ok(Vec::new());
        };

        let anchor = prev.and_then(|prev| {
            region
                .items(&self.tree, &self.config)
                .into_iter()
                .find(|n| self.tree.attr(*n, &self.config.reference_attribute) == Some(prev.as_str()))
        });
        let mut nodes = Vec::with_capacity(references.len());
        for (reference, markup) in references.iter().zip(&markup) {
            nodes.push(fragment_root(&mut self.tree, reference, markup, &self.config)?);
        }
        region.insert(&mut self.tree, anchor, &nodes)?;

        self.apply_post_effects(StructuralChange::Added { region }).await?;
        for node in &nodes {
            self.pipeline
                .decorate_subtree(&mut self.tree, *node, &self.cache, &self.config)
                .await?;
        }
        Ok(nodes)
    }

    /// Remove the component rooted at `el` from the list it is in
    pub async fn remove_component(&mut self, el: NodeId) -> EditorResult<Reference> {
        let reference = reference_of(&self.tree, el, &self.config)?;
        let linkage = parent_linkage(&self.tree, el, &self.config)?;
        let target = FieldTarget::new(linkage.parent.clone(), linkage.field.clone());

        self.release(el)?;
        self.mutations
            .remove_from_parent_list(&mut self.tree, &reference, &target, el)
            .await?;
        self.pipeline.forget_subtree(&self.tree, el);
        self.apply_post_effects(StructuralChange::Removed {
            region: linkage.region,
        })
        .await?;
        Ok(reference)
    }

    /// Move the component rooted at `el` after `prev` (or to the end) of its list
    pub async fn move_component(&mut self, el: NodeId, prev: Option<NodeId>) -> EditorResult<()> {
        let reference = reference_of(&self.tree, el, &self.config)?;
        let linkage = parent_linkage(&self.tree, el, &self.config)?;
        let prev_reference = prev
            .map(|p| reference_of(&self.tree, p, &self.config))
            .transpose()?;
        let target = FieldTarget::new(linkage.parent.clone(), linkage.field.clone());

        self.mutations
            .move_in_parent_list(&reference, &target, prev_reference.as_ref())
            .await?;
        if prev != Some(el) {
            self.tree.detach(el)?;
            linkage.region.insert(&mut self.tree, prev, &[el])?;
        }
        Ok(())
    }

    /// Replace the component rooted at `el` (a property child) with a new `name` component
    pub async fn replace_component(&mut self, el: NodeId, name: &str) -> EditorResult<Reference> {
        let linkage = parent_linkage(&self.tree, el, &self.config)?;
        let target = FieldTarget::new(linkage.parent.clone(), linkage.field.clone());

        let created = self.mutations.create_component(name, None).await?;
        let (previous, markup) = self
            .mutations
            .replace_property(&created.reference, &target)
            .await?;
        info!(previous = ?previous, reference = %created.reference, "Replaced component");

        self.release(el)?;
        let root = fragment_root(&mut self.tree, &created.reference, &markup, &self.config)?;
        self.tree.replace(el, root)?;
        self.pipeline.forget_subtree(&self.tree, el);
        self.pipeline
            .decorate_subtree(&mut self.tree, root, &self.cache, &self.config)
            .await?;
        Ok(created.reference)
    }

    /// Drop the selection and any open form that live inside `el`
    fn release(&mut self, el: NodeId) -> EditorResult<()> {
        let selected = self
            .selection
            .selected()
            .is_some_and(|s| self.tree.is_within(el, s.el));
        if selected {
            if let Some(previous) = self.selection.deselect(&mut self.tree, &self.config)? {
                self.emit(EditorEvent::Deselected(previous));
            }
        }
        let editing = self
            .forms
            .current()
            .is_some_and(|s| self.tree.is_within(el, s.target));
        if editing {
            self.cancel()?;
        }
        Ok(())
    }

    fn region_for(&self, target: &FieldTarget) -> Option<ListRegion> {
        let owner = self.tree.find_by_attr(
            self.tree.root(),
            &self.config.reference_attribute,
            target.parent.as_str(),
        )?;
        find_list(&self.tree, owner, &target.field, &self.config)
    }

    async fn apply_post_effects(&mut self, change: StructuralChange) -> EditorResult<()> {
        for action in self.post_effects.analyze(&change, &self.tree, &self.config) {
            match action {
                PostAction::ClearPlaceholders(el) => {
                    clear_placeholders(&mut self.tree, el, &self.config)?;
                }
                PostAction::Redecorate(el) => {
                    self.pipeline.forget(el);
                    self.pipeline
                        .decorate(&mut self.tree, el, &self.cache, &self.config)
                        .await?;
                }
            }
        }
        Ok(())
    }

    // Event dispatch

    /// Route a UI event. Errors never escape: they are logged, recorded in the
    /// status indicator and published as [`EditorEvent::Error`].
    pub async fn dispatch(&mut self, event: UiEvent) {
        let result = match event {
            UiEvent::Click { target, options } => self.click(target, options).await,
            UiEvent::KeyDown(key) => self.key_down(key).await,
        };
        match result {
            Ok(()) => self.status.validation.clear(),
            Err(e) => {
                error!(event = ?event, error = %e, "Editor action failed");
                self.status.record(&e);
                self.emit(EditorEvent::Error(e.to_string()));
            }
        }
    }

    async fn click(&mut self, target: NodeId, options: FocusOptions) -> EditorResult<()> {
        if !self.tree.contains(target) {
            return Err(EditorError::usage(format!("click on unknown node {:?}", target)));
        }
        if let Some(session) = self.forms.current() {
            if self.tree.is_within(session.form, target) {
                return Ok(());
            }
        }

        let path: Vec<NodeId> = std::iter::once(target)
            .chain(self.tree.ancestors(target))
            .collect();
        for node in path {
            if self.tree.has_listener(node, EventKind::Click, FOCUS_ACTION) {
                self.focus(node, options).await?;
                return Ok(());
            }
            if self.tree.has_listener(node, EventKind::Click, SELECT_ACTION) {
                self.select(node).await?;
                return Ok(());
            }
        }
        self.unfocus().await
    }

    async fn key_down(&mut self, key: Key) -> EditorResult<()> {
        match key {
            Key::Escape => self.unfocus().await,
            Key::Enter => {
                if self.forms.is_open() {
                    return Ok(());
                }
                let Some(selected) = self.selection.selected().cloned() else {
                    return Ok(());
                };
                self.open_at(selected.el, &selected.reference, "", None).await?;
                Ok(())
            }
            Key::ArrowDown if !self.forms.is_open() => self.select_next().await.map(|_| ()),
            Key::ArrowUp if !self.forms.is_open() => self.select_prev().await.map(|_| ()),
            Key::ArrowDown | Key::ArrowUp => Ok(()),
        }
    }
}
