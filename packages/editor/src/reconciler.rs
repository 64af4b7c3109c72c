//! Render reconciler: swaps server-rendered markup into the live tree.

use crate::config::EditorConfig;
use crate::errors::{EditorError, EditorResult};
use crate::pipeline::Pipeline;
use folio_dom::{parse_fragment, DocTree, NodeId};
use folio_model::Reference;
use folio_store::DataCache;
use tracing::{debug, info};

/// Replace every live root of `reference` with a fresh copy of the
/// fragment's root element. Returns the new roots in document order.
pub fn reconcile(
    tree: &mut DocTree,
    reference: &Reference,
    markup: &str,
    config: &EditorConfig,
) -> EditorResult<Vec<NodeId>> {
    let live = rendered_roots(tree, reference, config);
    if live.is_empty() {
        debug!(reference = %reference, "Nothing rendered for reference, skipping reconcile");
        return Ok(Vec::new());
    }

    let mut roots = Vec::with_capacity(live.len());
    for old in live {
        let new = fragment_root(tree, reference, markup, config)?;
        tree.replace(old, new)?;
        roots.push(new);
    }
    info!(reference = %reference, count = roots.len(), "Reconciled rendered markup");
    Ok(roots)
}

/// Live roots rendered for `reference`, in document order
pub fn rendered_roots(tree: &DocTree, reference: &Reference, config: &EditorConfig) -> Vec<NodeId> {
    let attr = config.reference_attribute.as_str();
    tree.find_all(tree.root(), |t, n| t.attr(n, attr) == Some(reference.as_str()))
}

/// Parse `markup` and return its root element, tagged with `reference`
pub fn fragment_root(
    tree: &mut DocTree,
    reference: &Reference,
    markup: &str,
    config: &EditorConfig,
) -> EditorResult<NodeId> {
    let root = parse_fragment(tree, markup)?
        .into_iter()
        .find(|n| tree.is_element(*n))
        .ok_or_else(|| EditorError::usage(format!("markup for {} has no root element", reference)))?;
    if tree.attr(root, &config.reference_attribute).is_none() {
        tree.set_attr(root, config.reference_attribute.as_str(), reference.as_str())?;
    }
    Ok(root)
}

/// Fetch edit-mode markup for `reference`, swap it in and decorate the new subtrees
pub async fn fetch_and_reconcile(
    tree: &mut DocTree,
    cache: &DataCache,
    pipeline: &mut Pipeline,
    reference: &Reference,
    config: &EditorConfig,
) -> EditorResult<Vec<NodeId>> {
    let markup = cache.get_html(reference, true).await?;
    let replaced = rendered_roots(tree, reference, config);
    let roots = reconcile(tree, reference, &markup, config)?;
    for old in replaced {
        pipeline.forget_subtree(tree, old);
    }
    for root in &roots {
        pipeline.decorate_subtree(tree, *root, cache, config).await?;
    }
    Ok(roots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_dom::to_markup;

    const PAGE: &str = r#"
        <body data-uri="example.com/_pages/home">
          <div data-editable="main">
            <div data-uri="example.com/_components/article/instances/a1"><h1 data-editable="title">Old</h1></div>
            <div data-uri="example.com/_components/footer/instances/f1"></div>
          </div>
        </body>
    "#;

    #[test]
    fn test_replaces_in_place() {
        let mut tree = DocTree::from_markup(PAGE).unwrap();
        let config = EditorConfig::default();
        let article = Reference::instance("example.com", "article", "a1");
        let list = tree.find_by_attr(tree.root(), "data-editable", "main").unwrap();

        let roots = reconcile(
            &mut tree,
            &article,
            r#"<div data-uri="example.com/_components/article/instances/a1"><h1 data-editable="title">New</h1></div>"#,
            &config,
        )
        .unwrap();

        assert_eq!(roots.len(), 1);
        assert_eq!(tree.element_children(list)[0], roots[0]);
        assert_eq!(tree.text_content(roots[0]), "New");
        assert!(to_markup(&tree, list).contains("footer"));
    }

    #[test]
    fn test_unrendered_reference_is_skipped() {
        let mut tree = DocTree::from_markup(PAGE).unwrap();
        let config = EditorConfig::default();
        let missing = Reference::instance("example.com", "article", "zz");

        assert!(reconcile(&mut tree, &missing, "<div></div>", &config).unwrap().is_empty());
    }

    #[test]
    fn test_fragment_without_element_is_usage_error() {
        let mut tree = DocTree::from_markup(PAGE).unwrap();
        let config = EditorConfig::default();
        let article = Reference::instance("example.com", "article", "a1");

        let err = reconcile(&mut tree, &article, "just text", &config).unwrap_err();
        assert!(matches!(err, EditorError::Usage(_)));
    }
}
