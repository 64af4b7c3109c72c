use crate::error::{ModelError, ModelResult};
use crate::reference::Reference;
use crate::schema::{ContainerSpec, Schema};
use serde::{Deserialize, Serialize};

/// Structural shape of the parent field a child lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParentContainer {
    /// Component field holding ordered `{_ref}` stubs
    ComponentList,
    /// Component field holding a single `{_ref}` stub
    ComponentProperty,
    /// Page area holding ordered raw reference strings
    PageList,
}

/// Where a component reference lives. Computed on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentLinkage {
    pub parent: Reference,
    pub field: String,
    pub container: ParentContainer,
}

impl ParentLinkage {
    /// Classify `parent.field` once. Pages need no schema; components must
    /// declare the field as a list or property container.
    pub fn resolve(parent: Reference, field: &str, schema: Option<&Schema>) -> ModelResult<Self> {
        let container = if parent.is_page() {
            ParentContainer::PageList
        } else {
            match schema.and_then(|s| s.field(field)).and_then(|f| f.container.as_ref()) {
                Some(ContainerSpec::List { .. }) => ParentContainer::ComponentList,
                Some(ContainerSpec::Property { .. }) => ParentContainer::ComponentProperty,
                None => {
                    return Err(ModelError::NotAContainer {
                        reference: parent.to_string(),
                        field: field.to_string(),
                    })
                }
            }
        };

        Ok(Self {
            parent,
            field: field.to_string(),
            container,
        })
    }

    pub fn is_list(&self) -> bool {
        matches!(
            self.container,
            ParentContainer::ComponentList | ParentContainer::PageList
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_parent_is_page_list() {
        let linkage = ParentLinkage::resolve(Reference::page("example.com", "home"), "main", None).unwrap();
        assert_eq!(linkage.container, ParentContainer::PageList);
        assert!(linkage.is_list());
    }

    #[test]
    fn test_component_parent_uses_schema() {
        let schema = Schema::from_value(&json!({
            "content": { "_componentList": true },
            "lead": { "_component": true },
            "title": { "_has": "text" }
        }))
        .unwrap();
        let parent = Reference::instance("example.com", "article", "a1");

        let list = ParentLinkage::resolve(parent.clone(), "content", Some(&schema)).unwrap();
        assert_eq!(list.container, ParentContainer::ComponentList);

        let property = ParentLinkage::resolve(parent.clone(), "lead", Some(&schema)).unwrap();
        assert_eq!(property.container, ParentContainer::ComponentProperty);
        assert!(!property.is_list());

        assert!(ParentLinkage::resolve(parent, "title", Some(&schema)).is_err());
    }
}
