//! # Structural Mutations
//!
//! Reference-addressed operations on component lists and properties.
//!
//! ## Semantics
//!
//! ### Insert
//! - A batch lands as one contiguous run right after `prev`, or at the end
//! - One save per call, however many references are inserted
//!
//! ### Remove
//! - Removes the first stub equal to the reference
//! - The live node is detached before the save and put back if the save fails
//!
//! ### Replace
//! - Property fields only; the previous child is returned to the caller
//!
//! Every write runs inside the save queue and reads the parent's data from
//! inside its queue slot, so it sees the result of the writes before it.
//! Nothing is retried.

use crate::behaviors::required_issues;
use crate::errors::{EditorError, EditorResult};
use folio_dom::{DocTree, NodeId};
use folio_model::{
    stub, stub_reference, ComponentData, ContainerSpec, ParentContainer, ParentLinkage, Reference,
    Schema,
};
use folio_store::{DataCache, SaveQueue};
use futures::future::{try_join_all, LocalBoxFuture};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

const SAVE: &str = "save";
const REMOVE: &str = "remove";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MutationError {
    #[error("{reference} is not in {parent}.{field}")]
    NotInParent {
        reference: String,
        parent: String,
        field: String,
    },

    #[error("Previous reference {0} is not in the list")]
    PreviousNotFound(String),

    #[error("{parent}.{field} is not a component list")]
    NotAList { parent: String, field: String },

    #[error("{parent}.{field} is not a component property")]
    NotAProperty { parent: String, field: String },

    #[error("{parent}.{field} does not accept {component}")]
    NotAccepted {
        parent: String,
        field: String,
        component: String,
    },

    #[error("{0} is not a component reference")]
    NotAComponent(String),
}

/// A list or property field of a parent component or page
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldTarget {
    pub parent: Reference,
    pub field: String,
}

impl FieldTarget {
    pub fn new(parent: Reference, field: impl Into<String>) -> Self {
        Self {
            parent,
            field: field.into(),
        }
    }
}

/// Insert `items` after `prev` (or at the end) as one contiguous run
pub fn splice_after(
    list: &mut Vec<Reference>,
    items: Vec<Reference>,
    prev: Option<&Reference>,
) -> Result<(), MutationError> {
    let at = match prev {
        Some(prev) => {
            list.iter()
                .position(|r| r == prev)
                .ok_or_else(|| MutationError::PreviousNotFound(prev.to_string()))?
                + 1
        }
        None => list.len(),
    };
    list.splice(at..at, items);
    Ok(())
}

/// Remove the first occurrence of `reference`, returning its index
pub fn remove_first(list: &mut Vec<Reference>, reference: &Reference) -> Option<usize> {
    let index = list.iter().position(|r| r == reference)?;
    list.remove(index);
    Some(index)
}

pub struct MutationEngine {
    cache: Arc<DataCache>,
    queue: Arc<SaveQueue>,
    site: String,
}

impl MutationEngine {
    pub fn new(cache: Arc<DataCache>, queue: Arc<SaveQueue>, site: impl Into<String>) -> Self {
        Self {
            cache,
            queue,
            site: site.into(),
        }
    }

    pub fn cache(&self) -> &Arc<DataCache> {
        &self.cache
    }

    pub fn queue(&self) -> &Arc<SaveQueue> {
        &self.queue
    }

    /// Classify the target field once: page area, component list or component property
    pub async fn resolve(&self, target: &FieldTarget) -> EditorResult<ParentLinkage> {
        if target.parent.is_page() {
            return Ok(ParentLinkage::resolve(target.parent.clone(), &target.field, None)?);
        }
        let schema = self.cache.get_schema(&target.parent).await?;
        Ok(ParentLinkage::resolve(
            target.parent.clone(),
            &target.field,
            Some(&schema),
        )?)
    }

    /// Resolve the target and check that it accepts every component in `references`
    async fn resolve_for(&self, target: &FieldTarget, references: &[Reference]) -> EditorResult<ParentLinkage> {
        let linkage = self.resolve(target).await?;
        if linkage.container == ParentContainer::PageList {
            return Ok(linkage);
        }
        let schema = self.cache.get_schema(&target.parent).await?;
        let container = schema.field(&target.field).and_then(|f| f.container.as_ref());
        for reference in references {
            let name = reference
                .component_name()
                .ok_or_else(|| MutationError::NotAComponent(reference.to_string()))?;
            if !container.map_or(true, |c| c.accepts(name)) {
                return Err(MutationError::NotAccepted {
                    parent: target.parent.to_string(),
                    field: target.field.clone(),
                    component: name.to_string(),
                }
                .into());
            }
        }
        Ok(linkage)
    }

    /// Create an instance of `name` from `data` or from the type's default
    /// data. Type-default children in container fields are instantiated first,
    /// in parallel, and the new instance references replace them.
    pub fn create_component<'a>(
        &'a self,
        name: &'a str,
        data: Option<Value>,
    ) -> LocalBoxFuture<'a, EditorResult<ComponentData>> {
        async move {
            let default_ref = Reference::component(&self.site, name);
            let schema = self.cache.get_schema(&default_ref).await?;
            let mut raw = match data {
                Some(data) => data,
                None => self.cache.get_data_only(&default_ref).await?,
            };
            if let Value::Object(object) = &mut raw {
                object.remove("_ref");
            }

            self.instantiate_children(&mut raw, &schema).await?;

            let collection = default_ref
                .instances_collection()
                .ok_or_else(|| MutationError::NotAComponent(default_ref.to_string()))?;
            let (reference, created) = self.cache.create(&collection, &raw).await?;
            info!(component = %name, reference = %reference, "Created component");

            Ok(ComponentData::compose(reference, &created, &schema)?)
        }
        .boxed_local()
    }

    async fn instantiate_children(&self, raw: &mut Value, schema: &Schema) -> EditorResult<()> {
        // (field, index in list, type-default child)
        let mut defaults: Vec<(String, Option<usize>, Reference)> = Vec::new();
        for field in schema.fields.values() {
            let value = match raw.get(&field.name) {
                Some(value) => value,
                None => continue,
            };
            match field.container {
                Some(ContainerSpec::List { .. }) => {
                    for (index, item) in value.as_array().into_iter().flatten().enumerate() {
                        if let Some(child) = stub_reference(item).filter(Reference::is_default_component) {
                            defaults.push((field.name.clone(), Some(index), child));
                        }
                    }
                }
                Some(ContainerSpec::Property { .. }) => {
                    if let Some(child) = stub_reference(value).filter(Reference::is_default_component) {
                        defaults.push((field.name.clone(), None, child));
                    }
                }
                None => {}
            }
        }
        if defaults.is_empty() {
            return Ok(());
        }

        let created = try_join_all(defaults.iter().map(|(_, _, child)| {
            let name = child.component_name().unwrap_or_default();
            self.create_component(name, None)
        }))
        .await?;

        for ((field, index, _), child) in defaults.iter().zip(created) {
            let slot = match index {
                Some(index) => raw.get_mut(field).and_then(|list| list.get_mut(*index)),
                None => raw.get_mut(field),
            };
            if let Some(slot) = slot {
                *slot = stub(&child.reference);
            }
        }
        Ok(())
    }

    /// Add `reference` to a list and return its rendered markup
    pub async fn add_to_parent_list(
        &self,
        reference: &Reference,
        target: &FieldTarget,
        prev: Option<&Reference>,
    ) -> EditorResult<String> {
        let mut markup = self
            .add_multiple_to_parent_list(std::slice::from_ref(reference), target, prev)
            .await?;
        Ok(markup.remove(0))
    }

    /// Add a batch as one contiguous run in a single save. Returns the markup
    /// of each reference, in order.
    pub async fn add_multiple_to_parent_list(
        &self,
        references: &[Reference],
        target: &FieldTarget,
        prev: Option<&Reference>,
    ) -> EditorResult<Vec<String>> {
        if references.is_empty() {
            return Ok(Vec::new());
        }
        let linkage = self.resolve_for(target, references).await?;
        info!(
            parent = %target.parent,
            field = %target.field,
            count = references.len(),
            "Adding to parent list"
        );

        let save = self.queue.add(Some(SAVE), || {
            self.update_list(&linkage, |list| splice_after(list, references.to_vec(), prev))
        });
        let markup = try_join_all(references.iter().map(|r| async move {
            self.cache.get_html(r, true).await.map_err(EditorError::from)
        }));
        // the save runs to completion even when a markup fetch fails
        let (saved, markup) = tokio::join!(save, markup);
        saved?;
        markup
    }

    /// Remove `reference` from a list and detach its node `el` from the tree
    pub async fn remove_from_parent_list(
        &self,
        tree: &mut DocTree,
        reference: &Reference,
        target: &FieldTarget,
        el: NodeId,
    ) -> EditorResult<()> {
        let linkage = self.resolve(target).await?;
        info!(parent = %target.parent, field = %target.field, reference = %reference, "Removing from parent list");

        let position = tree.parent(el).zip(tree.index_in_parent(el));
        tree.detach(el)?;

        let saved = self
            .queue
            .add(Some(SAVE), || {
                self.update_list(&linkage, |list| {
                    remove_first(list, reference).map(|_| ()).ok_or_else(|| {
                        MutationError::NotInParent {
                            reference: reference.to_string(),
                            parent: target.parent.to_string(),
                            field: target.field.clone(),
                        }
                    })
                })
            })
            .await;

        if let Err(e) = saved {
            warn!(reference = %reference, error = %e, "Removal failed, restoring node");
            if let Some((parent, index)) = position {
                tree.insert_child(parent, index, el)?;
            }
            return Err(e);
        }
        Ok(())
    }

    /// Move `reference` right after `prev` (or to the end) of the same list, in one save
    pub async fn move_in_parent_list(
        &self,
        reference: &Reference,
        target: &FieldTarget,
        prev: Option<&Reference>,
    ) -> EditorResult<()> {
        if prev == Some(reference) {
            return Ok(());
        }
        let linkage = self.resolve(target).await?;
        info!(parent = %target.parent, field = %target.field, reference = %reference, "Moving within parent list");

        self.queue
            .add(Some(SAVE), || {
                self.update_list(&linkage, |list| {
                    remove_first(list, reference).ok_or_else(|| MutationError::NotInParent {
                        reference: reference.to_string(),
                        parent: target.parent.to_string(),
                        field: target.field.clone(),
                    })?;
                    splice_after(list, vec![reference.clone()], prev)
                })
            })
            .await
    }

    /// Put `reference` in a property field, returning the previous child and
    /// the new child's markup
    pub async fn replace_property(
        &self,
        reference: &Reference,
        target: &FieldTarget,
    ) -> EditorResult<(Option<Reference>, String)> {
        let linkage = self.resolve_for(target, std::slice::from_ref(reference)).await?;
        if linkage.container != ParentContainer::ComponentProperty {
            return Err(MutationError::NotAProperty {
                parent: target.parent.to_string(),
                field: target.field.clone(),
            }
            .into());
        }
        info!(parent = %target.parent, field = %target.field, reference = %reference, "Replacing property");

        let save = self.queue.add(Some(SAVE), || async {
            let mut data = self.cache.get_data(&target.parent).await?;
            let previous = data.property(&target.field).cloned();
            data.set_value(&target.field, stub(reference))?;
            self.cache.save(&data).await?;
            Ok::<_, EditorError>(previous)
        });
        let markup = async {
            self.cache
                .get_html(reference, true)
                .await
                .map_err(EditorError::from)
        };
        let (previous, markup) = tokio::join!(save, markup);
        Ok((previous?, markup?))
    }

    /// Merge `partial` into a component's data and save it. Required fields
    /// are checked here, right before the write.
    pub async fn save_component(
        &self,
        reference: &Reference,
        partial: Map<String, Value>,
    ) -> EditorResult<ComponentData> {
        self.queue
            .add(Some(SAVE), || async {
                let mut data = self.cache.get_data(reference).await?;
                let names: Vec<String> = partial.keys().cloned().collect();
                for (name, value) in partial {
                    data.set_value(&name, value)?;
                }
                let issues = required_issues(&data, &names);
                if !issues.is_empty() {
                    return Err(EditorError::Validation(issues));
                }
                self.cache.save(&data).await?;
                info!(reference = %reference, "Saved component");
                Ok::<_, EditorError>(data)
            })
            .await
    }

    /// Whether a published version exists. A 404 means no; other failures propagate.
    pub async fn is_published(&self, page: &Reference) -> EditorResult<bool> {
        match self
            .cache
            .get_data_only(&page.with_version("published"))
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether a scheduled version exists. Any failure counts as not scheduled.
    pub async fn is_scheduled(&self, page: &Reference) -> bool {
        match self
            .cache
            .get_data_only(&page.with_version("scheduled"))
            .await
        {
            Ok(_) => true,
            Err(e) => {
                if !e.is_not_found() {
                    warn!(page = %page, error = %e, "Schedule probe failed, assuming not scheduled");
                }
                false
            }
        }
    }

    /// Delete a URI entry
    pub async fn remove_uri(&self, uri: &Reference) -> EditorResult<()> {
        info!(uri = %uri, "Removing uri");
        self.queue
            .add(Some(REMOVE), || async {
                self.cache.remove(uri).await.map_err(EditorError::from)
            })
            .await
    }

    /// Read the list behind `linkage`, apply `edit` and save the parent
    async fn update_list<F>(&self, linkage: &ParentLinkage, edit: F) -> EditorResult<()>
    where
        F: FnOnce(&mut Vec<Reference>) -> Result<(), MutationError>,
    {
        match linkage.container {
            ParentContainer::ComponentList => {
                let mut data = self.cache.get_data(&linkage.parent).await?;
                let list = data.list_mut(&linkage.field).ok_or_else(|| MutationError::NotAList {
                    parent: linkage.parent.to_string(),
                    field: linkage.field.clone(),
                })?;
                edit(list)?;
                self.cache.save(&data).await?;
            }
            ParentContainer::PageList => {
                let mut page = self.cache.get_page(&linkage.parent).await?;
                edit(page.area_mut(&linkage.field))?;
                self.cache.save_page(&page).await?;
            }
            ParentContainer::ComponentProperty => {
                return Err(MutationError::NotAList {
                    parent: linkage.parent.to_string(),
                    field: linkage.field.clone(),
                }
                .into())
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(ids: &[&str]) -> Vec<Reference> {
        ids.iter()
            .map(|id| Reference::instance("example.com", "paragraph", id))
            .collect()
    }

    #[test]
    fn test_splice_after_previous() {
        let mut list = refs(&["x", "y"]);
        let x = list[0].clone();
        splice_after(&mut list, refs(&["z"]), Some(&x)).unwrap();
        assert_eq!(list, refs(&["x", "z", "y"]));
    }

    #[test]
    fn test_splice_batch_at_end() {
        let mut list = refs(&["x"]);
        splice_after(&mut list, refs(&["a", "b"]), None).unwrap();
        assert_eq!(list, refs(&["x", "a", "b"]));
    }

    #[test]
    fn test_splice_unknown_previous_fails() {
        let mut list = refs(&["x"]);
        let missing = refs(&["q"]).remove(0);
        assert_eq!(
            splice_after(&mut list, refs(&["a"]), Some(&missing)),
            Err(MutationError::PreviousNotFound(missing.to_string()))
        );
        assert_eq!(list, refs(&["x"]));
    }

    #[test]
    fn test_remove_first_occurrence() {
        let mut list = refs(&["x", "y", "z"]);
        assert_eq!(remove_first(&mut list, &refs(&["y"])[0]), Some(1));
        assert_eq!(list, refs(&["x", "z"]));
        assert_eq!(remove_first(&mut list, &refs(&["y"])[0]), None);
    }
}
