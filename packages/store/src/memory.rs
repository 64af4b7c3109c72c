//! In-memory content service.
//!
//! Holds component data keyed by reference and schemas keyed by component
//! name, renders markup the way the real service tags it (`data-uri` on
//! component roots, `data-editable` on fields) and records every call so tests
//! can count round trips. Failures and latency can be injected per target.

use crate::remote::{RemoteStore, StoreCall};
use async_trait::async_trait;
use folio_common::{StoreError, StoreResult};
use folio_dom::{to_markup, DocTree, NodeId};
use folio_model::{stub_reference, Reference};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const REFERENCE_ATTRIBUTE: &str = "data-uri";
const EDITABLE_ATTRIBUTE: &str = "data-editable";
const MAX_RENDER_DEPTH: usize = 32;

#[derive(Default)]
struct MemoryState {
    data: HashMap<String, Value>,
    schemas: HashMap<String, Value>,
    html: HashMap<String, String>,
    failures: HashMap<String, StoreError>,
    latency: HashMap<String, Duration>,
    calls: Vec<StoreCall>,
    next_id: u64,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, reference: &Reference, data: Value) {
        self.state().data.insert(reference.to_string(), data);
    }

    pub fn insert_schema(&self, component_name: &str, schema: Value) {
        self.state()
            .schemas
            .insert(component_name.to_string(), schema);
    }

    /// Serve fixed markup for a reference instead of rendering its data
    pub fn set_html(&self, reference: &Reference, markup: impl Into<String>) {
        self.state()
            .html
            .insert(reference.to_string(), markup.into());
    }

    /// Make every request against `target` (a reference or POST collection) fail
    pub fn fail(&self, target: &str, error: StoreError) {
        self.state().failures.insert(target.to_string(), error);
    }

    pub fn heal(&self, target: &str) {
        self.state().failures.remove(target);
    }

    pub fn set_latency(&self, target: &str, latency: Duration) {
        self.state().latency.insert(target.to_string(), latency);
    }

    /// Current stored value, bypassing the call log
    pub fn data(&self, reference: &Reference) -> Option<Value> {
        self.state().data.get(reference.as_str()).cloned()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state().calls.clone()
    }

    pub fn count(&self, predicate: impl Fn(&StoreCall) -> bool) -> usize {
        self.state().calls.iter().filter(|c| predicate(c)).count()
    }

    pub fn writes(&self) -> usize {
        self.count(StoreCall::is_write)
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Log the call, wait out any configured latency, then apply injected failures
    async fn begin(&self, call: StoreCall) -> StoreResult<()> {
        let target = call.target().to_string();
        let latency = {
            let mut state = self.state();
            state.calls.push(call);
            state.latency.get(&target).copied()
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match self.state().failures.get(&target) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn get_data(&self, reference: &Reference) -> StoreResult<Value> {
        self.begin(StoreCall::GetData(reference.to_string())).await?;
        self.data(reference)
            .ok_or_else(|| StoreError::not_found(reference.as_str()))
    }

    async fn get_schema(&self, reference: &Reference) -> StoreResult<Value> {
        self.begin(StoreCall::GetSchema(reference.to_string())).await?;
        let name = reference
            .component_name()
            .ok_or_else(|| StoreError::not_found(reference.as_str()))?;
        self.state()
            .schemas
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("{}/schema", reference)))
    }

    async fn get_html(&self, reference: &Reference, edit: bool) -> StoreResult<String> {
        self.begin(StoreCall::GetHtml(reference.html_path(edit)))
            .await?;
        let state = self.state();
        if let Some(markup) = state.html.get(reference.as_str()) {
            return Ok(markup.clone());
        }
        let mut tree = DocTree::new();
        let node = render(&state, &mut tree, reference, 0)?;
        Ok(to_markup(&tree, node))
    }

    async fn put(&self, reference: &Reference, data: &Value) -> StoreResult<Value> {
        self.begin(StoreCall::Put(reference.to_string())).await?;
        self.state()
            .data
            .insert(reference.to_string(), data.clone());
        Ok(with_ref(data.clone(), reference))
    }

    async fn post(&self, collection: &str, data: &Value) -> StoreResult<Value> {
        self.begin(StoreCall::Post(collection.to_string())).await?;
        let mut state = self.state();
        state.next_id += 1;
        let reference = Reference::parse(format!("{}/new{}", collection, state.next_id))
            .map_err(|e| StoreError::decode(collection, e))?;
        state.data.insert(reference.to_string(), data.clone());
        Ok(with_ref(data.clone(), &reference))
    }

    async fn delete(&self, reference: &Reference) -> StoreResult<()> {
        self.begin(StoreCall::Delete(reference.to_string())).await?;
        self.state()
            .data
            .remove(reference.as_str())
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(reference.as_str()))
    }
}

fn with_ref(mut data: Value, reference: &Reference) -> Value {
    if let Value::Object(object) = &mut data {
        object.insert("_ref".to_string(), Value::String(reference.to_string()));
    }
    data
}

fn render(
    state: &MemoryState,
    tree: &mut DocTree,
    reference: &Reference,
    depth: usize,
) -> StoreResult<NodeId> {
    if depth > MAX_RENDER_DEPTH {
        return Err(StoreError::server(
            reference.as_str(),
            500,
            "render depth exceeded",
        ));
    }
    let data = state
        .data
        .get(reference.as_str())
        .ok_or_else(|| StoreError::not_found(reference.as_str()))?;
    let object = data
        .as_object()
        .ok_or_else(|| StoreError::decode(reference.as_str(), "data is not an object"))?;

    let root = tree.create_element("div");
    set_attr(tree, root, REFERENCE_ATTRIBUTE, reference.as_str())?;

    for (name, value) in object.iter().filter(|(name, _)| !name.starts_with('_')) {
        let children = child_references(reference, value);
        let field = match (value, children) {
            (_, Some(children)) => {
                let field = tree.create_element("div");
                for child in children {
                    let node = render(state, tree, &child, depth + 1)?;
                    append(tree, field, node)?;
                }
                field
            }
            (Value::Object(_) | Value::Array(_), None) => continue,
            (scalar, None) => {
                let field = tree.create_element("span");
                let text = match scalar {
                    Value::String(text) => text.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                if !text.is_empty() {
                    let text = tree.create_text(text);
                    append(tree, field, text)?;
                }
                field
            }
        };
        set_attr(tree, field, EDITABLE_ATTRIBUTE, name)?;
        append(tree, root, field)?;
    }

    Ok(root)
}

/// Child references held by a field: `{_ref}` stubs for components, plain
/// reference strings for page areas
fn child_references(owner: &Reference, value: &Value) -> Option<Vec<Reference>> {
    match value {
        Value::Object(_) => stub_reference(value).map(|r| vec![r]),
        Value::Array(items) if items.is_empty() => Some(Vec::new()),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                if owner.is_page() {
                    item.as_str().and_then(|raw| Reference::parse(raw).ok())
                } else {
                    stub_reference(item)
                }
            })
            .collect(),
        _ => None,
    }
}

fn set_attr(tree: &mut DocTree, node: NodeId, name: &str, value: &str) -> StoreResult<()> {
    tree.set_attr(node, name, value)
        .map_err(|e| StoreError::server(value, 500, e.to_string()))
}

fn append(tree: &mut DocTree, parent: NodeId, child: NodeId) -> StoreResult<()> {
    tree.append_child(parent, child)
        .map_err(|e| StoreError::server("", 500, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn article() -> Reference {
        Reference::instance("example.com", "article", "a1")
    }

    fn paragraph(id: &str) -> Reference {
        Reference::instance("example.com", "paragraph", id)
    }

    #[tokio::test]
    async fn test_missing_data_is_not_found() {
        let store = MemoryStore::new();
        let err = store.get_data(&article()).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.calls(), vec![StoreCall::GetData(article().to_string())]);
    }

    #[tokio::test]
    async fn test_post_assigns_reference() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let collection = article()
            .instances_collection()
            .ok_or_else(|| anyhow::anyhow!("article has no instances collection"))?;

        let created = store.post(&collection, &json!({ "title": "x" })).await?;
        let raw = created["_ref"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("created resource has no _ref"))?;
        let reference = Reference::parse(raw)?;

        assert!(reference.is_instance());
        assert_eq!(reference.component_name(), Some("article"));
        assert_eq!(store.data(&reference), Some(json!({ "title": "x" })));
        Ok(())
    }

    #[tokio::test]
    async fn test_injected_failure_applies_until_healed() {
        let store = MemoryStore::new();
        store.insert(&article(), json!({}));
        store.fail(article().as_str(), StoreError::server(article().as_str(), 503, "down"));

        assert!(store.put(&article(), &json!({})).await.unwrap_err().is_transient());

        store.heal(article().as_str());
        assert!(store.put(&article(), &json!({})).await.is_ok());
        assert_eq!(store.writes(), 2);
    }

    #[tokio::test]
    async fn test_renders_lists_recursively() {
        let store = MemoryStore::new();
        store.insert(
            &article(),
            json!({
                "title": "Hello",
                "content": [{ "_ref": paragraph("p1").as_str() }]
            }),
        );
        store.insert(&paragraph("p1"), json!({ "text": "Body" }));

        let markup = store.get_html(&article(), true).await.unwrap();

        assert_eq!(
            markup,
            format!(
                "<div data-uri=\"{}\"><div data-editable=\"content\"><div data-uri=\"{}\"><span data-editable=\"text\">Body</span></div></div><span data-editable=\"title\">Hello</span></div>",
                article(),
                paragraph("p1")
            )
        );
        assert_eq!(
            store.calls(),
            vec![StoreCall::GetHtml(article().html_path(true))]
        );
    }

    #[tokio::test]
    async fn test_renders_page_areas() {
        let store = MemoryStore::new();
        let page = Reference::page("example.com", "home");
        store.insert(&page, json!({ "main": [article().as_str()] }));
        store.insert(&article(), json!({ "title": "Hi" }));

        let markup = store.get_html(&page, false).await.unwrap();

        assert!(markup.contains(&format!("data-uri=\"{}\"", article())));
        assert!(markup.contains("data-editable=\"main\""));
    }
}
