//! Component and page data.
//!
//! On the wire a component is a JSON object whose container fields hold
//! `{"_ref": "..."}` stubs. [`ComponentData`] is the composed form: every field
//! carries its schema fragment and container fields are typed, so callers never
//! have to guess whether an array holds child components or plain values.

use crate::error::{ModelError, ModelResult};
use crate::reference::Reference;
use crate::schema::{ContainerSpec, FieldSchema, Schema};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

const REF_KEY: &str = "_ref";

/// `{"_ref": reference}`
pub fn stub(reference: &Reference) -> Value {
    json!({ REF_KEY: reference.as_str() })
}

/// Reference held by a `{"_ref": ...}` stub
pub fn stub_reference(value: &Value) -> Option<Reference> {
    value
        .get(REF_KEY)
        .and_then(Value::as_str)
        .and_then(|raw| Reference::parse(raw).ok())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum FieldValue {
    Scalar(Value),
    ComponentList(Vec<Reference>),
    ComponentProperty(Option<Reference>),
    /// Plain object or array that is not a component container
    Nested(Value),
}

impl FieldValue {
    fn compose(reference: &Reference, name: &str, raw: &Value, schema: Option<&FieldSchema>) -> ModelResult<Self> {
        match schema.and_then(|s| s.container.as_ref()) {
            Some(ContainerSpec::List { .. }) => {
                let items = match raw {
                    Value::Null => return Ok(FieldValue::ComponentList(Vec::new())),
                    Value::Array(items) => items,
                    _ => {
                        return Err(ModelError::invalid_data(
                            reference.as_str(),
                            format!("component list {:?} is not an array", name),
                        ))
                    }
                };
                let refs = items
                    .iter()
                    .map(|item| {
                        stub_reference(item).ok_or_else(|| {
                            ModelError::invalid_data(
                                reference.as_str(),
                                format!("component list {:?} holds a non-stub entry", name),
                            )
                        })
                    })
                    .collect::<ModelResult<Vec<_>>>()?;
                Ok(FieldValue::ComponentList(refs))
            }
            Some(ContainerSpec::Property { .. }) => match raw {
                Value::Null => Ok(FieldValue::ComponentProperty(None)),
                other => stub_reference(other)
                    .map(|r| FieldValue::ComponentProperty(Some(r)))
                    .ok_or_else(|| {
                        ModelError::invalid_data(
                            reference.as_str(),
                            format!("component property {:?} is not a stub", name),
                        )
                    }),
            },
            None => match raw {
                Value::Object(_) | Value::Array(_) => Ok(FieldValue::Nested(raw.clone())),
                scalar => Ok(FieldValue::Scalar(scalar.clone())),
            },
        }
    }

    fn empty(schema: &FieldSchema) -> Self {
        match schema.container {
            Some(ContainerSpec::List { .. }) => FieldValue::ComponentList(Vec::new()),
            Some(ContainerSpec::Property { .. }) => FieldValue::ComponentProperty(None),
            None => FieldValue::Scalar(Value::Null),
        }
    }

    pub fn to_raw(&self) -> Value {
        match self {
            FieldValue::Scalar(value) | FieldValue::Nested(value) => value.clone(),
            FieldValue::ComponentList(refs) => Value::Array(refs.iter().map(stub).collect()),
            FieldValue::ComponentProperty(Some(r)) => stub(r),
            FieldValue::ComponentProperty(None) => Value::Null,
        }
    }
}

/// A field value together with the schema fragment that describes it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub value: FieldValue,
    pub schema: Option<FieldSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentData {
    pub reference: Reference,
    pub fields: BTreeMap<String, Field>,
}

impl ComponentData {
    /// Merge raw store data with its schema. Schema fields missing from the data
    /// are filled with empty values so forms can bind every declared field.
    pub fn compose(reference: Reference, raw: &Value, schema: &Schema) -> ModelResult<Self> {
        let object = match raw {
            Value::Object(object) => object.clone(),
            Value::Null => Map::new(),
            _ => {
                return Err(ModelError::invalid_data(
                    reference.as_str(),
                    "component data must be an object",
                ))
            }
        };
        let mut fields = BTreeMap::new();

        for (name, value) in &object {
            if name.starts_with('_') {
                continue;
            }
            let field_schema = schema.field(name);
            fields.insert(
                name.clone(),
                Field {
                    value: FieldValue::compose(&reference, name, value, field_schema)?,
                    schema: field_schema.cloned(),
                },
            );
        }

        for (name, field_schema) in &schema.fields {
            fields.entry(name.clone()).or_insert_with(|| Field {
                value: FieldValue::empty(field_schema),
                schema: Some(field_schema.clone()),
            });
        }

        Ok(Self { reference, fields })
    }

    /// Wire form: plain values plus `{_ref}` stubs, suitable for a PUT body
    pub fn to_raw(&self) -> Value {
        let mut object = Map::new();
        for (name, field) in &self.fields {
            object.insert(name.clone(), field.value.to_raw());
        }
        Value::Object(object)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn value(&self, name: &str) -> Option<Value> {
        self.fields.get(name).map(|f| f.value.to_raw())
    }

    /// Replace a field from its raw value, keeping the field's container typing
    pub fn set_value(&mut self, name: &str, raw: Value) -> ModelResult<()> {
        let schema = self.fields.get(name).and_then(|f| f.schema.clone());
        let value = FieldValue::compose(&self.reference, name, &raw, schema.as_ref())?;
        self.fields.insert(name.to_string(), Field { value, schema });
        Ok(())
    }

    pub fn list(&self, name: &str) -> Option<&[Reference]> {
        match self.fields.get(name).map(|f| &f.value) {
            Some(FieldValue::ComponentList(refs)) => Some(refs),
            _ => None,
        }
    }

    pub fn list_mut(&mut self, name: &str) -> Option<&mut Vec<Reference>> {
        match self.fields.get_mut(name).map(|f| &mut f.value) {
            Some(FieldValue::ComponentList(refs)) => Some(refs),
            _ => None,
        }
    }

    pub fn property(&self, name: &str) -> Option<&Reference> {
        match self.fields.get(name).map(|f| &f.value) {
            Some(FieldValue::ComponentProperty(r)) => r.as_ref(),
            _ => None,
        }
    }

    /// Every child referenced through list or property fields, in field order
    pub fn child_references(&self) -> Vec<Reference> {
        let mut children = Vec::new();
        for field in self.fields.values() {
            match &field.value {
                FieldValue::ComponentList(refs) => children.extend(refs.iter().cloned()),
                FieldValue::ComponentProperty(Some(r)) => children.push(r.clone()),
                _ => {}
            }
        }
        children
    }
}

/// Page data: areas hold raw reference strings, not `{_ref}` stubs
#[derive(Debug, Clone, PartialEq)]
pub struct PageData {
    pub reference: Reference,
    pub areas: BTreeMap<String, Vec<Reference>>,
    pub other: Map<String, Value>,
}

impl PageData {
    pub fn from_value(reference: Reference, raw: &Value) -> ModelResult<Self> {
        let object = raw.as_object().ok_or_else(|| {
            ModelError::invalid_data(reference.as_str(), "page data must be an object")
        })?;
        let mut areas = BTreeMap::new();
        let mut other = Map::new();

        for (key, value) in object {
            let refs = value.as_array().and_then(|items| {
                items
                    .iter()
                    .map(|item| item.as_str().and_then(|s| Reference::parse(s).ok()))
                    .collect::<Option<Vec<_>>>()
            });
            match refs {
                Some(refs) if !key.starts_with('_') => {
                    areas.insert(key.clone(), refs);
                }
                _ => {
                    other.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(Self {
            reference,
            areas,
            other,
        })
    }

    pub fn area(&self, name: &str) -> Option<&[Reference]> {
        self.areas.get(name).map(Vec::as_slice)
    }

    pub fn area_mut(&mut self, name: &str) -> &mut Vec<Reference> {
        self.areas.entry(name.to_string()).or_default()
    }

    pub fn to_raw(&self) -> Value {
        let mut object = self.other.clone();
        for (name, refs) in &self.areas {
            object.insert(
                name.clone(),
                Value::Array(refs.iter().map(|r| Value::String(r.to_string())).collect()),
            );
        }
        Value::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::from_value(&json!({
            "title": { "_has": "text" },
            "content": { "_componentList": true },
            "lead": { "_component": true },
            "tags": { "_has": "text" }
        }))
        .unwrap()
    }

    fn reference() -> Reference {
        Reference::instance("example.com", "article", "a1")
    }

    #[test]
    fn test_compose_types_container_fields() {
        let raw = json!({
            "_ref": "example.com/_components/article/instances/a1",
            "title": "Hello",
            "content": [
                { "_ref": "example.com/_components/paragraph/instances/p1" },
                { "_ref": "example.com/_components/paragraph/instances/p2" }
            ],
            "lead": { "_ref": "example.com/_components/image/instances/i1" },
            "tags": ["a", "b"]
        });

        let data = ComponentData::compose(reference(), &raw, &schema()).unwrap();

        assert_eq!(data.list("content").unwrap().len(), 2);
        assert_eq!(
            data.property("lead").unwrap().as_str(),
            "example.com/_components/image/instances/i1"
        );
        assert_eq!(data.field("title").unwrap().value, FieldValue::Scalar(json!("Hello")));
        assert!(matches!(data.field("tags").unwrap().value, FieldValue::Nested(_)));
        assert!(data.field("title").unwrap().schema.is_some());
        assert!(!data.fields.contains_key("_ref"));
    }

    #[test]
    fn test_compose_fills_missing_schema_fields() {
        let data = ComponentData::compose(reference(), &json!({}), &schema()).unwrap();

        assert_eq!(data.list("content"), Some(&[][..]));
        assert_eq!(data.property("lead"), None);
        assert_eq!(data.value("title"), Some(Value::Null));
    }

    #[test]
    fn test_compose_rejects_non_stub_list_entries() {
        let raw = json!({ "content": ["example.com/_components/paragraph/instances/p1"] });
        assert!(ComponentData::compose(reference(), &raw, &schema()).is_err());
    }

    #[test]
    fn test_to_raw_restores_stubs() {
        let raw = json!({
            "title": "Hello",
            "content": [{ "_ref": "example.com/_components/paragraph/instances/p1" }],
            "lead": null,
            "tags": null
        });
        let data = ComponentData::compose(reference(), &raw, &schema()).unwrap();

        assert_eq!(data.to_raw(), raw);
    }

    #[test]
    fn test_page_areas_hold_plain_strings() {
        let raw = json!({
            "main": ["example.com/_components/article/instances/a1"],
            "layout": "example.com/_components/layout/instances/l1",
            "url": "http://example.com/"
        });
        let mut page = PageData::from_value(Reference::page("example.com", "home"), &raw).unwrap();

        assert_eq!(page.area("main").unwrap().len(), 1);
        page.area_mut("main").push(Reference::instance("example.com", "article", "a2"));

        let back = page.to_raw();
        assert_eq!(back["main"].as_array().unwrap().len(), 2);
        assert_eq!(back["layout"], raw["layout"]);
    }
}
