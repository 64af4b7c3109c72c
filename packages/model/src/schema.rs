//! Component schemas.
//!
//! Schemas arrive as JSON where keys starting with `_` are declarations and
//! every other key is a field:
//!
//! ```json
//! {
//!   "_description": "An article",
//!   "title": { "_has": ["label", { "fn": "text", "required": true }], "_display": "inline" },
//!   "content": { "_componentList": { "include": ["paragraph"] }, "_placeholder": { "text": "Body" } },
//!   "lead": { "_component": true },
//!   "_groups": { "settings": { "fields": ["title"], "_display": "modal" } }
//! }
//! ```
//!
//! A parsed [`Schema`] is immutable; the cache hands out shared copies.

use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// How the edit surface for a field or group is presented
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Modal,
    Inline,
    Meta,
}

impl DisplayMode {
    fn parse(raw: &str) -> ModelResult<Self> {
        match raw {
            "modal" | "overlay" => Ok(DisplayMode::Modal),
            "inline" => Ok(DisplayMode::Inline),
            "meta" | "settings" => Ok(DisplayMode::Meta),
            other => Err(ModelError::invalid_schema(format!(
                "unknown display mode {:?}",
                other
            ))),
        }
    }
}

/// One declared behavior, before it is resolved against a behavior registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorSpec {
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl BehaviorSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Map::new(),
        }
    }

    /// Expand a `_has` declaration: a bare name, `{fn, ...args}`, or an array of either
    pub fn expand(raw: &Value) -> ModelResult<Vec<BehaviorSpec>> {
        match raw {
            Value::String(name) => Ok(vec![BehaviorSpec::named(name.clone())]),
            Value::Object(object) => {
                let name = object
                    .get("fn")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ModelError::invalid_schema("behavior object without \"fn\""))?;
                let args = object
                    .iter()
                    .filter(|(key, _)| key.as_str() != "fn")
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                Ok(vec![BehaviorSpec {
                    name: name.to_string(),
                    args,
                }])
            }
            Value::Array(items) => {
                let mut specs = Vec::with_capacity(items.len());
                for item in items {
                    if item.is_array() {
                        return Err(ModelError::invalid_schema("nested behavior arrays"));
                    }
                    specs.extend(Self::expand(item)?);
                }
                Ok(specs)
            }
            other => Err(ModelError::invalid_schema(format!(
                "malformed behavior declaration {}",
                other
            ))),
        }
    }

    pub fn arg(&self, key: &str) -> Option<&Value> {
        self.args.get(key)
    }
}

/// Rules for the empty-state placeholder of a field or group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceholderRule {
    pub text: Option<String>,
    pub height: Option<String>,
    /// Show only while this field is empty (defaults to the field itself)
    pub if_empty: Option<String>,
    /// Shown even when the content is present
    #[serde(default)]
    pub permanent: bool,
}

impl PlaceholderRule {
    fn parse(raw: &Value) -> ModelResult<Self> {
        match raw {
            Value::Bool(true) => Ok(Self::default()),
            Value::String(text) => Ok(Self {
                text: Some(text.clone()),
                ..Self::default()
            }),
            Value::Object(_) => serde_json::from_value(raw.clone())
                .map_err(|e| ModelError::invalid_schema(format!("placeholder: {}", e))),
            other => Err(ModelError::invalid_schema(format!(
                "malformed placeholder {}",
                other
            ))),
        }
    }
}

/// Which child components a container field accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ContainerSpec {
    /// Ordered sequence of `{_ref}` stubs
    List {
        include: Vec<String>,
        exclude: Vec<String>,
    },
    /// Exactly one replaceable `{_ref}` stub
    Property { include: Vec<String> },
}

impl ContainerSpec {
    fn names(raw: &Value, key: &str) -> Vec<String> {
        raw.get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether a component type may be placed in this container
    pub fn accepts(&self, component_name: &str) -> bool {
        match self {
            ContainerSpec::List { include, exclude } => {
                (include.is_empty() || include.iter().any(|n| n == component_name))
                    && !exclude.iter().any(|n| n == component_name)
            }
            ContainerSpec::Property { include } => {
                include.is_empty() || include.iter().any(|n| n == component_name)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub behaviors: Vec<BehaviorSpec>,
    pub container: Option<ContainerSpec>,
    pub display: DisplayMode,
    pub placeholder: Option<PlaceholderRule>,
    pub label: Option<String>,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behaviors: Vec::new(),
            container: None,
            display: DisplayMode::default(),
            placeholder: None,
            label: None,
        }
    }

    fn parse(name: &str, raw: &Value) -> ModelResult<Self> {
        let object = raw.as_object().ok_or_else(|| {
            ModelError::invalid_schema(format!("field {:?} must be an object", name))
        })?;
        let mut field = FieldSchema::new(name);

        if let Some(has) = object.get("_has") {
            field.behaviors = BehaviorSpec::expand(has)?;
        }
        if let Some(list) = object.get("_componentList") {
            field.container = Some(ContainerSpec::List {
                include: ContainerSpec::names(list, "include"),
                exclude: ContainerSpec::names(list, "exclude"),
            });
        } else if let Some(property) = object.get("_component") {
            field.container = Some(ContainerSpec::Property {
                include: ContainerSpec::names(property, "include"),
            });
        }
        if let Some(display) = object.get("_display").and_then(Value::as_str) {
            field.display = DisplayMode::parse(display)?;
        }
        if let Some(placeholder) = object.get("_placeholder") {
            field.placeholder = Some(PlaceholderRule::parse(placeholder)?);
        }
        field.label = object
            .get("_label")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(field)
    }

    pub fn is_component_list(&self) -> bool {
        matches!(self.container, Some(ContainerSpec::List { .. }))
    }

    pub fn is_component_property(&self) -> bool {
        matches!(self.container, Some(ContainerSpec::Property { .. }))
    }

    pub fn behavior(&self, name: &str) -> Option<&BehaviorSpec> {
        self.behaviors.iter().find(|b| b.name == name)
    }

    /// Label override, falling back to a humanized field name
    pub fn display_label(&self) -> String {
        self.label.clone().unwrap_or_else(|| humanize(&self.name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSchema {
    pub name: String,
    pub fields: Vec<String>,
    pub display: DisplayMode,
    pub placeholder: Option<PlaceholderRule>,
    pub label: Option<String>,
}

impl GroupSchema {
    fn parse(name: &str, raw: &Value) -> ModelResult<Self> {
        let fields = raw
            .get("fields")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ModelError::invalid_schema(format!("group {:?} needs a fields array", name))
            })?
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        let display = match raw.get("_display").and_then(Value::as_str) {
            Some(display) => DisplayMode::parse(display)?,
            None => DisplayMode::default(),
        };
        let placeholder = match raw.get("_placeholder") {
            Some(placeholder) => Some(PlaceholderRule::parse(placeholder)?),
            None => None,
        };

        Ok(Self {
            name: name.to_string(),
            fields,
            display,
            placeholder,
            label: raw.get("_label").and_then(Value::as_str).map(str::to_string),
        })
    }
}

/// A field or a group: the unit a form or decorator operates on
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SchemaSlice<'a> {
    Field(&'a FieldSchema),
    Group(&'a GroupSchema),
}

impl<'a> SchemaSlice<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            SchemaSlice::Field(field) => &field.name,
            SchemaSlice::Group(group) => &group.name,
        }
    }

    pub fn display(&self) -> DisplayMode {
        match self {
            SchemaSlice::Field(field) => field.display,
            SchemaSlice::Group(group) => group.display,
        }
    }

    pub fn placeholder(&self) -> Option<&'a PlaceholderRule> {
        match self {
            SchemaSlice::Field(field) => field.placeholder.as_ref(),
            SchemaSlice::Group(group) => group.placeholder.as_ref(),
        }
    }

    pub fn label(&self) -> String {
        match self {
            SchemaSlice::Field(field) => field.display_label(),
            SchemaSlice::Group(group) => group.label.clone().unwrap_or_else(|| humanize(&group.name)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub description: Option<String>,
    pub fields: BTreeMap<String, FieldSchema>,
    pub groups: BTreeMap<String, GroupSchema>,
}

impl Schema {
    pub fn from_value(raw: &Value) -> ModelResult<Self> {
        let object = raw
            .as_object()
            .ok_or_else(|| ModelError::invalid_schema("schema must be an object"))?;
        let mut schema = Schema::default();

        for (key, value) in object {
            match key.as_str() {
                "_description" => {
                    schema.description = value.as_str().map(str::to_string);
                }
                "_groups" => {
                    let groups = value
                        .as_object()
                        .ok_or_else(|| ModelError::invalid_schema("_groups must be an object"))?;
                    for (name, group) in groups {
                        schema
                            .groups
                            .insert(name.clone(), GroupSchema::parse(name, group)?);
                    }
                }
                key if key.starts_with('_') => {}
                name => {
                    schema
                        .fields
                        .insert(name.to_string(), FieldSchema::parse(name, value)?);
                }
            }
        }

        for group in schema.groups.values() {
            if let Some(missing) = group.fields.iter().find(|f| !schema.fields.contains_key(*f)) {
                return Err(ModelError::invalid_schema(format!(
                    "group {:?} names unknown field {:?}",
                    group.name, missing
                )));
            }
        }

        Ok(schema)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.get(name)
    }

    pub fn group(&self, name: &str) -> Option<&GroupSchema> {
        self.groups.get(name)
    }

    /// Resolve a path to a field or group (fields win on a name clash)
    pub fn slice(&self, path: &str) -> Option<SchemaSlice<'_>> {
        self.field(path)
            .map(SchemaSlice::Field)
            .or_else(|| self.group(path).map(SchemaSlice::Group))
    }

    /// Fields covered by a path, in the order a form shows them
    pub fn fields_for(&self, path: &str) -> Vec<&FieldSchema> {
        match self.slice(path) {
            Some(SchemaSlice::Field(field)) => vec![field],
            Some(SchemaSlice::Group(group)) => group
                .fields
                .iter()
                .filter_map(|name| self.field(name))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Fields editable through a whole-component (settings) form: the
    /// `settings` group if declared, otherwise every non-container field
    pub fn settings_fields(&self) -> Vec<&FieldSchema> {
        if self.groups.contains_key("settings") {
            return self.fields_for("settings");
        }
        self.fields
            .values()
            .filter(|field| field.container.is_none() && !field.behaviors.is_empty())
            .collect()
    }

    pub fn list_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.values().filter(|f| f.is_component_list())
    }
}

fn humanize(name: &str) -> String {
    let spaced = name.replace(['_', '-'], " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
