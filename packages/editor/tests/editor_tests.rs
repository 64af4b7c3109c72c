//! Integration tests for structural edits on a loaded page

mod common;

use common::{article, field, image, node, paragraph, rendered_children, stored_list, SITE};
use folio_common::StoreError;
use folio_dom::{DocTree, EventKind, NodeId};
use folio_editor::{Editor, EditorConfig, EditorEvent, FieldTarget, FOCUS_ACTION, REORDER_ACTION};
use folio_model::Reference;

fn placeholders(tree: &DocTree, el: NodeId) -> usize {
    tree.children(el)
        .iter()
        .filter(|n| tree.has_attr(**n, "data-placeholder"))
        .count()
}

fn refs(references: &[Reference]) -> Vec<String> {
    references.iter().map(Reference::to_string).collect()
}

#[tokio::test]
async fn test_load_decorates_every_editable() {
    let store = common::store();
    let markup = common::page_markup(&store).await;
    let mut editor = Editor::new(store, common::config());

    let decorated = editor.load(&markup).await.unwrap();

    // main, four article fields twice, x, y and i1
    assert_eq!(decorated, 12);
    let tree = editor.tree();
    let title = field(tree, &article("a1"), "title");
    assert!(tree.has_listener(title, EventKind::Click, FOCUS_ACTION));
    let content = field(tree, &article("a1"), "content");
    assert!(tree.has_listener(content, EventKind::Drop, REORDER_ACTION));
    assert!(!tree.has_listener(content, EventKind::Click, FOCUS_ACTION));
    let empty = field(tree, &article("a2"), "content");
    assert_eq!(placeholders(tree, empty), 1);
    assert_eq!(tree.text_content(empty), "Add content");
}

#[tokio::test]
async fn test_locate_finds_roots_and_fields() {
    let (_, editor) = common::editor().await;

    let root = editor.locate(&article("a1"), "").unwrap();
    assert_eq!(root, node(editor.tree(), &article("a1")));
    let title = editor.locate(&article("a1"), "title").unwrap();
    assert_eq!(title, field(editor.tree(), &article("a1"), "title"));
    // nested components own their editables
    assert!(editor.locate(&article("a1"), "text").is_none());
    assert!(editor.locate(&article("zz"), "").is_none());
}

#[tokio::test]
async fn test_add_component_renders_in_place() {
    let (store, mut editor) = common::editor().await;
    let target = FieldTarget::new(article("a1"), "content");

    let created = editor
        .add_component("paragraph", &target, Some(&paragraph("x")))
        .await
        .unwrap();

    let expected = refs(&[paragraph("x"), created.clone(), paragraph("y")]);
    assert_eq!(stored_list(&store, &article("a1"), "content"), expected);
    let content = field(editor.tree(), &article("a1"), "content");
    assert_eq!(rendered_children(editor.tree(), content), expected);

    let text = field(editor.tree(), &created, "text");
    assert!(editor
        .tree()
        .has_listener(text, EventKind::Click, FOCUS_ACTION));
}

#[tokio::test]
async fn test_placeholder_follows_list_emptiness() {
    let (_, mut editor) = common::editor().await;
    let target = FieldTarget::new(article("a2"), "content");
    let content = field(editor.tree(), &article("a2"), "content");
    assert_eq!(placeholders(editor.tree(), content), 1);

    let created = editor.add_component("image", &target, None).await.unwrap();

    assert_eq!(placeholders(editor.tree(), content), 0);
    assert_eq!(
        rendered_children(editor.tree(), content),
        refs(&[created.clone()])
    );

    let el = node(editor.tree(), &created);
    editor.remove_component(el).await.unwrap();

    assert!(rendered_children(editor.tree(), content).is_empty());
    assert_eq!(placeholders(editor.tree(), content), 1);
}

#[tokio::test]
async fn test_insert_existing_components_as_a_run() {
    let (store, mut editor) = common::editor().await;
    let target = FieldTarget::new(article("a1"), "content");

    let nodes = editor
        .insert_components(&[paragraph("z"), paragraph("w")], &target, None)
        .await
        .unwrap();

    assert_eq!(nodes.len(), 2);
    let expected = refs(&[paragraph("x"), paragraph("y"), paragraph("z"), paragraph("w")]);
    assert_eq!(stored_list(&store, &article("a1"), "content"), expected);
    let content = field(editor.tree(), &article("a1"), "content");
    assert_eq!(rendered_children(editor.tree(), content), expected);
}

#[tokio::test]
async fn test_remove_component_clears_selection() {
    let (store, mut editor) = common::editor().await;
    let x = node(editor.tree(), &paragraph("x"));
    editor.select(x).await.unwrap();
    let mut events = editor.subscribe();

    let removed = editor.remove_component(x).await.unwrap();

    assert_eq!(removed, paragraph("x"));
    assert!(editor.selection().selected().is_none());
    assert!(!editor.tree().is_attached(x));
    assert_eq!(
        stored_list(&store, &article("a1"), "content"),
        refs(&[paragraph("y")])
    );
    assert_eq!(
        events.try_recv().unwrap(),
        EditorEvent::Deselected(paragraph("x"))
    );
}

#[tokio::test]
async fn test_failed_remove_keeps_node_in_place() {
    let (store, mut editor) = common::editor().await;
    let x = node(editor.tree(), &paragraph("x"));
    let a1 = article("a1");
    store.fail(a1.as_str(), StoreError::server(a1.as_str(), 500, "boom"));

    assert!(editor.remove_component(x).await.is_err());

    let content = field(editor.tree(), &a1, "content");
    assert_eq!(
        rendered_children(editor.tree(), content),
        refs(&[paragraph("x"), paragraph("y")])
    );
}

#[tokio::test]
async fn test_move_component_after_sibling() {
    let (store, mut editor) = common::editor().await;
    let x = node(editor.tree(), &paragraph("x"));
    let y = node(editor.tree(), &paragraph("y"));

    editor.move_component(x, Some(y)).await.unwrap();

    let expected = refs(&[paragraph("y"), paragraph("x")]);
    assert_eq!(stored_list(&store, &article("a1"), "content"), expected);
    let content = field(editor.tree(), &article("a1"), "content");
    assert_eq!(rendered_children(editor.tree(), content), expected);
}

#[tokio::test]
async fn test_move_page_area_item() {
    let (store, mut editor) = common::editor().await;
    let a1 = node(editor.tree(), &article("a1"));

    editor.move_component(a1, None).await.unwrap();

    let main = store.data(&common::home()).unwrap()["main"].clone();
    assert_eq!(
        main,
        serde_json::json!([article("a2").as_str(), article("a1").as_str()])
    );
    let area = field(editor.tree(), &common::home(), "main");
    assert_eq!(
        rendered_children(editor.tree(), area),
        refs(&[article("a2"), article("a1")])
    );
}

#[tokio::test]
async fn test_replace_component_swaps_property_child() {
    let (store, mut editor) = common::editor().await;
    let i1 = node(editor.tree(), &image("i1"));

    let created = editor.replace_component(i1, "image").await.unwrap();

    assert_eq!(created.component_name(), Some("image"));
    assert_eq!(
        store.data(&article("a1")).unwrap()["lead"]["_ref"],
        created.as_str()
    );
    assert!(!editor.tree().is_attached(i1));
    let lead = field(editor.tree(), &article("a1"), "lead");
    assert_eq!(
        rendered_children(editor.tree(), lead),
        refs(&[created.clone()])
    );
    assert!(editor.tree().is_attached(field(editor.tree(), &created, "url")));
}

#[tokio::test]
async fn test_rerender_keeps_selection_on_new_root() {
    let (store, mut editor) = common::editor().await;
    let a1 = node(editor.tree(), &article("a1"));
    editor.select(a1).await.unwrap();
    store.insert(
        &article("a1"),
        serde_json::json!({ "title": "Fresh", "teaser": "", "content": [], "lead": null }),
    );

    let roots = editor.rerender(&article("a1")).await.unwrap();

    assert_eq!(roots.len(), 1);
    assert!(!editor.tree().is_attached(a1));
    let selected = editor.selection().selected().unwrap();
    assert_eq!(selected.el, roots[0]);
    assert!(editor.tree().has_class(roots[0], "selected"));
    let title = field(editor.tree(), &article("a1"), "title");
    assert_eq!(editor.tree().text_content(title), "Fresh");
}

#[tokio::test]
async fn test_replaced_nodes_leave_the_pipeline() {
    let (_, mut editor) = common::editor().await;
    let before = editor.pipeline().decorated_len();
    let old_title = field(editor.tree(), &article("a1"), "title");
    assert!(editor.pipeline().is_decorated(old_title, "focus"));

    editor.rerender(&article("a1")).await.unwrap();
    editor.rerender(&article("a1")).await.unwrap();

    assert_eq!(editor.pipeline().decorated_len(), before);
    assert!(!editor.pipeline().is_decorated(old_title, "focus"));

    let i1 = node(editor.tree(), &image("i1"));
    let old_url = field(editor.tree(), &image("i1"), "url");
    editor.replace_component(i1, "image").await.unwrap();

    assert!(!editor.pipeline().is_decorated(old_url, "focus"));
    assert_eq!(editor.pipeline().decorated_len(), before);
}

#[tokio::test]
async fn test_config_site_prefixes_created_references() {
    let store = common::store();
    let markup = common::page_markup(&store).await;
    let config = EditorConfig {
        site: SITE.to_string(),
        ..EditorConfig::default()
    };
    let mut editor = Editor::new(store, config);
    editor.load(&markup).await.unwrap();

    let created = editor
        .mutations()
        .create_component("paragraph", None)
        .await
        .unwrap();

    assert_eq!(created.reference.site(), SITE);
}
