//! # Folio Model
//!
//! Data shapes shared by every layer of the editing engine:
//!
//! - [`Reference`]: opaque address of one component, page or URI entry
//! - [`Schema`]: field, group and behavior declarations for a component type
//! - [`ComponentData`]: field values with their schema fragments attached
//! - [`ParentLinkage`]: where a child reference lives inside its parent
//!
//! Nothing in here performs I/O. Values are plain data and cheap to clone, which
//! is what the copy-on-write contract of the cache relies on.

pub mod data;
pub mod error;
pub mod linkage;
pub mod reference;
pub mod schema;

pub use data::{stub, stub_reference, ComponentData, Field, FieldValue, PageData};
pub use error::{ModelError, ModelResult};
pub use linkage::{ParentContainer, ParentLinkage};
pub use reference::{Reference, ReferenceKind};
pub use schema::{
    BehaviorSpec, ContainerSpec, DisplayMode, FieldSchema, GroupSchema, PlaceholderRule, Schema,
    SchemaSlice,
};
