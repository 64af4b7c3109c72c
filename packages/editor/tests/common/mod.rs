//! Shared fixture: one page holding two articles, backed by a MemoryStore.

#![allow(dead_code)]

use folio_dom::{DocTree, NodeId};
use folio_editor::{Editor, EditorConfig};
use folio_model::Reference;
use folio_store::{MemoryStore, RemoteStore};
use serde_json::{json, Value};
use std::sync::Arc;

pub const SITE: &str = "example.com";

pub fn home() -> Reference {
    Reference::page(SITE, "home")
}

pub fn article(id: &str) -> Reference {
    Reference::instance(SITE, "article", id)
}

pub fn paragraph(id: &str) -> Reference {
    Reference::instance(SITE, "paragraph", id)
}

pub fn image(id: &str) -> Reference {
    Reference::instance(SITE, "image", id)
}

pub fn stub(reference: &Reference) -> Value {
    json!({ "_ref": reference.as_str() })
}

/// Store with schemas, type defaults and:
///
/// - page `home` with `main: [a1, a2]`
/// - `a1` with `content: [x, y]` and `lead: i1`
/// - `a2` with an empty `content`
pub fn store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());

    store.insert_schema(
        "article",
        json!({
            "title": {
                "_has": ["label", { "fn": "text", "required": true }],
                "_placeholder": "Title"
            },
            "teaser": { "_has": "textarea", "_display": "inline" },
            "content": {
                "_componentList": { "include": ["paragraph", "image"] },
                "_placeholder": { "text": "Add content" }
            },
            "lead": { "_component": true },
            "_groups": { "settings": { "fields": ["title", "teaser"] } }
        }),
    );
    store.insert_schema("paragraph", json!({ "text": { "_has": "text" } }));
    store.insert_schema("image", json!({ "url": { "_has": "text" } }));

    store.insert(
        &Reference::component(SITE, "article"),
        json!({
            "title": "",
            "teaser": "",
            "content": [
                { "_ref": "example.com/_components/paragraph" },
                { "_ref": "example.com/_components/paragraph" }
            ],
            "lead": null
        }),
    );
    store.insert(&Reference::component(SITE, "paragraph"), json!({ "text": "" }));
    store.insert(&Reference::component(SITE, "image"), json!({ "url": "" }));

    store.insert(
        &home(),
        json!({ "main": [article("a1").as_str(), article("a2").as_str()] }),
    );
    store.insert(
        &article("a1"),
        json!({
            "title": "Hello",
            "teaser": "Short",
            "content": [stub(&paragraph("x")), stub(&paragraph("y"))],
            "lead": stub(&image("i1"))
        }),
    );
    store.insert(
        &article("a2"),
        json!({ "title": "Second", "teaser": "", "content": [], "lead": null }),
    );
    for id in ["x", "y", "z", "w"] {
        store.insert(&paragraph(id), json!({ "text": id.to_uppercase() }));
    }
    store.insert(&image("i1"), json!({ "url": "a.png" }));
    store.insert(&image("i2"), json!({ "url": "b.png" }));

    store
}

pub fn config() -> EditorConfig {
    EditorConfig {
        site: SITE.to_string(),
        ..EditorConfig::default()
    }
}

/// Rendered page markup, as the host would serve it
pub async fn page_markup(store: &MemoryStore) -> String {
    store.get_html(&home(), true).await.unwrap()
}

/// Editor with the page loaded and decorated; the call log starts empty
pub async fn editor() -> (Arc<MemoryStore>, Editor) {
    folio_editor::logging::init("warn");
    let store = store();
    let markup = page_markup(&store).await;
    let mut editor = Editor::new(store.clone(), config());
    editor.load(&markup).await.unwrap();
    store.clear_calls();
    (store, editor)
}

pub fn node(tree: &DocTree, reference: &Reference) -> NodeId {
    tree.find_by_attr(tree.root(), "data-uri", reference.as_str())
        .unwrap_or_else(|| panic!("{} is not rendered", reference))
}

/// Editable `path` owned by the component `reference`
pub fn field(tree: &DocTree, reference: &Reference, path: &str) -> NodeId {
    let root = node(tree, reference);
    tree.find_all(root, |t, n| {
        t.attr(n, "data-editable") == Some(path)
            && t.closest_with_attr(n, "data-uri") == Some(root)
    })[0]
}

/// References of the component roots directly under `el`, in order
pub fn rendered_children(tree: &DocTree, el: NodeId) -> Vec<String> {
    tree.children(el)
        .iter()
        .filter_map(|n| tree.attr(*n, "data-uri"))
        .map(str::to_string)
        .collect()
}

/// `_ref`s of a stored component list
pub fn stored_list(store: &MemoryStore, reference: &Reference, field: &str) -> Vec<String> {
    store.data(reference).unwrap()[field]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["_ref"].as_str().unwrap().to_string())
        .collect()
}
