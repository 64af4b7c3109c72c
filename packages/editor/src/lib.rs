//! # Folio Editor
//!
//! In-page editing engine for server-rendered content.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ dom: markup → DocTree arena                 │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: selection, forms, mutations         │
//! │  - Decorate editable nodes (pipeline)       │
//! │  - One form at a time (session)             │
//! │  - List/property edits (mutations)          │
//! │  - Swap in fresh markup (reconciler)        │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ store: DataCache + SaveQueue → RemoteStore  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **The store is the source of truth**: the live tree is re-rendered from
//!    server markup after every save
//! 2. **One writer at a time**: every write goes through the save queue, in
//!    the order it was issued
//! 3. **Conservative caching**: any successful write clears the whole cache
//! 4. **One edit surface**: at most one form and one selection exist
//!
//! ## Usage
//!
//! ```rust,ignore
//! use folio_editor::{Editor, EditorConfig, UiEvent};
//! use folio_store::MemoryStore;
//!
//! let config = EditorConfig::load(".")?;
//! folio_editor::logging::init(&config.log_filter);
//!
//! let mut editor = Editor::new(Arc::new(MemoryStore::new()), config);
//! editor.load(&page_markup).await?;
//!
//! // a click on an editable field opens its form
//! editor.dispatch(UiEvent::Click { target, options: FocusOptions::default() }).await;
//! ```

pub mod behaviors;
pub mod config;
mod decorators;
mod editor;
mod errors;
pub mod linkage;
pub mod logging;
mod mutations;
mod pipeline;
mod post_effects;
mod reconciler;
mod selection;
mod session;

pub use behaviors::{BehaviorKind, BehaviorRegistry, FieldContext};
pub use config::EditorConfig;
pub use decorators::{
    FocusDecorator, PlaceholderDecorator, SelectDecorator, SortableDecorator, FOCUS_ACTION,
    REORDER_ACTION, SELECT_ACTION,
};
pub use editor::{Editor, EditorEvent, Key, StatusIndicator, UiEvent};
pub use errors::{EditorError, EditorResult, ValidationIssue};
pub use linkage::{ListRegion, TreeLinkage};
pub use mutations::{FieldTarget, MutationEngine, MutationError};
pub use pipeline::{Decorator, DecoratorContext, Pipeline, PipelineRegistry};
pub use post_effects::{PostAction, PostEffect, PostEffectEngine, StructuralChange};
pub use reconciler::{fetch_and_reconcile, reconcile};
pub use selection::{visible_components, FocusOptions, Selected, Selection};
pub use session::{CloseOutcome, EditSession, Forms};
