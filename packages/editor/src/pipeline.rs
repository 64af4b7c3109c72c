//! # Decorator Pipeline
//!
//! Progressively adds editing affordances to rendered editable nodes.
//!
//! For every editable node the pipeline:
//! 1. Resolves the owning reference and field path from the tree
//! 2. Reads data and schema through the cache
//! 3. Runs every registered decorator whose predicate matches, in
//!    registration order
//!
//! A decorator runs at most once per node. Re-decorating a node after a
//! structural change requires [`Pipeline::forget`] first. Replaced subtrees
//! get fresh node ids, so they are decorated again naturally.

use crate::config::EditorConfig;
use crate::decorators::{FocusDecorator, PlaceholderDecorator, SelectDecorator, SortableDecorator};
use crate::errors::{EditorError, EditorResult};
use crate::linkage::{owning_component, path_of};
use folio_dom::{AttributeCollector, DocTree, NodeId};
use folio_model::{ComponentData, FieldValue, Reference, Schema, SchemaSlice};
use folio_store::DataCache;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything a decorator knows about the node it decorates
#[derive(Debug, Clone)]
pub struct DecoratorContext {
    pub reference: Reference,
    pub path: String,
    pub data: ComponentData,
    pub schema: Arc<Schema>,
}

impl DecoratorContext {
    /// Read data and schema for `reference`. Pages have no schema and get an
    /// empty one.
    pub async fn load(cache: &DataCache, reference: Reference, path: String) -> EditorResult<Self> {
        let (data, schema) = if reference.is_page() {
            let raw = cache.get_data_only(&reference).await?;
            let schema = Arc::new(Schema::default());
            (ComponentData::compose(reference.clone(), &raw, &schema)?, schema)
        } else {
            tokio::try_join!(cache.get_data(&reference), cache.get_schema(&reference))?
        };
        Ok(Self {
            reference,
            path,
            data,
            schema,
        })
    }

    /// The field or group this node edits
    pub fn slice(&self) -> Option<SchemaSlice<'_>> {
        self.schema.slice(&self.path)
    }

    pub fn value(&self) -> Option<Value> {
        self.data.value(&self.path)
    }

    /// Whether the node holds a component list (page areas included)
    pub fn is_list(&self) -> bool {
        match self.data.field(&self.path).map(|f| &f.value) {
            Some(FieldValue::ComponentList(_)) => true,
            Some(FieldValue::Nested(Value::Array(_))) => self.reference.is_page(),
            _ => false,
        }
    }

    /// Whether the slice counts as empty for its placeholder. A group is
    /// empty when all of its fields are; `ifEmpty` points the check at
    /// another field.
    pub fn is_empty(&self) -> bool {
        let target = self
            .slice()
            .and_then(|s| s.placeholder())
            .and_then(|p| p.if_empty.as_deref());
        if let Some(field) = target {
            return self.field_is_empty(field);
        }
        match self.slice() {
            Some(SchemaSlice::Group(group)) => group.fields.iter().all(|f| self.field_is_empty(f)),
            _ => self.field_is_empty(&self.path),
        }
    }

    fn field_is_empty(&self, name: &str) -> bool {
        self.data
            .value(name)
            .map_or(true, |v| crate::behaviors::is_empty_value(&v))
    }
}

/// A predicate/handler pair that augments an editable node
pub trait Decorator {
    fn name(&self) -> &'static str;

    fn when(&self, tree: &DocTree, node: NodeId, ctx: &DecoratorContext) -> bool;

    fn handle(&self, tree: &mut DocTree, node: NodeId, ctx: &DecoratorContext) -> EditorResult<()>;
}

/// Ordered decorator list, built once at startup
#[derive(Default)]
pub struct PipelineRegistry {
    decorators: Vec<Box<dyn Decorator>>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in decorators: placeholder, focus, select, sortable
    pub fn with_defaults(config: &EditorConfig) -> Self {
        let mut registry = Self::new();
        registry
            .register(PlaceholderDecorator::new(config))
            .register(FocusDecorator)
            .register(SelectDecorator::new(config))
            .register(SortableDecorator);
        registry
    }

    pub fn register(&mut self, decorator: impl Decorator + 'static) -> &mut Self {
        self.decorators.push(Box::new(decorator));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.decorators.iter().map(|d| d.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.decorators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decorators.is_empty()
    }
}

pub struct Pipeline {
    registry: PipelineRegistry,
    /// (node, decorator) pairs that already ran
    decorated: HashSet<(NodeId, &'static str)>,
}

impl Pipeline {
    pub fn new(registry: PipelineRegistry) -> Self {
        Self {
            registry,
            decorated: HashSet::new(),
        }
    }

    pub fn registry(&self) -> &PipelineRegistry {
        &self.registry
    }

    /// Decorate one editable node, returning the decorators that ran.
    ///
    /// A missing node, reference or path is a usage error raised before any
    /// data is read. A failing decorator is logged and the rest still run.
    pub async fn decorate(
        &mut self,
        tree: &mut DocTree,
        node: NodeId,
        cache: &DataCache,
        config: &EditorConfig,
    ) -> EditorResult<Vec<&'static str>> {
        if !tree.is_element(node) {
            return Err(EditorError::usage(format!("cannot decorate {:?}: not an element", node)));
        }
        let path = path_of(tree, node, config)
            .ok_or_else(|| EditorError::usage(format!("cannot decorate {:?}: no field path", node)))?
            .to_string();
        let (_, reference) = owning_component(tree, node, config).ok_or_else(|| {
            EditorError::usage(format!("cannot decorate {:?}: no owning reference", node))
        })?;

        let ctx = DecoratorContext::load(cache, reference, path).await?;

        let mut applied = Vec::new();
        for decorator in &self.registry.decorators {
            let key = (node, decorator.name());
            if self.decorated.contains(&key) || !decorator.when(tree, node, &ctx) {
                continue;
            }
            match decorator.handle(tree, node, &ctx) {
                Ok(()) => {
                    self.decorated.insert(key);
                    applied.push(decorator.name());
                }
                Err(e) => {
                    warn!(decorator = decorator.name(), reference = %ctx.reference, path = %ctx.path, error = %e, "Decorator failed");
                }
            }
        }
        debug!(reference = %ctx.reference, path = %ctx.path, ?applied, "Decorated node");
        Ok(applied)
    }

    /// Decorate every editable node at or under `scope`. Nodes that cannot be
    /// decorated are logged and skipped; returns how many were decorated.
    pub async fn decorate_subtree(
        &mut self,
        tree: &mut DocTree,
        scope: NodeId,
        cache: &DataCache,
        config: &EditorConfig,
    ) -> EditorResult<usize> {
        let editables = AttributeCollector::collect(&config.editable_attribute, tree, scope);
        let mut count = 0;
        for node in editables {
            match self.decorate(tree, node, cache, config).await {
                Ok(_) => count += 1,
                Err(e) => warn!(node = ?node, error = %e, "Skipping undecoratable node"),
            }
        }
        Ok(count)
    }

    /// Allow every decorator to run on `node` again
    pub fn forget(&mut self, node: NodeId) {
        self.decorated.retain(|(n, _)| *n != node);
    }

    /// Forget every node at or under `scope`, once it has left the document
    pub fn forget_subtree(&mut self, tree: &DocTree, scope: NodeId) {
        let gone: HashSet<NodeId> = tree.descendants(scope).into_iter().collect();
        self.decorated.retain(|(n, _)| !gone.contains(n));
    }

    /// How many (node, decorator) pairs are recorded
    pub fn decorated_len(&self) -> usize {
        self.decorated.len()
    }

    /// Forget everything, for a freshly loaded document
    pub fn reset(&mut self) {
        self.decorated.clear();
    }

    pub fn is_decorated(&self, node: NodeId, decorator: &str) -> bool {
        self.decorated.iter().any(|(n, d)| *n == node && *d == decorator)
    }
}
