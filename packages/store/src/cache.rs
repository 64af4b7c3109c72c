//! Read-through data cache.
//!
//! Component data is fetched together with its schema and composed before it
//! is stored, so an entry is either absent or complete. Readers get clones and
//! may mutate them freely. Every successful write through the cache clears
//! everything: the cache does not know which other entries embed the one that
//! changed.

use crate::remote::RemoteStore;
use folio_common::{StoreError, StoreResult};
use folio_model::{ComponentData, PageData, Reference, Schema};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

#[derive(Default)]
struct CacheState {
    components: HashMap<Reference, ComponentData>,
    /// Schemas are per component type
    schemas: HashMap<String, Arc<Schema>>,
    data_only: HashMap<Reference, Value>,
    /// Bumped on every clear; fetches started under an older generation are
    /// not stored
    generation: u64,
}

pub struct DataCache {
    store: Arc<dyn RemoteStore>,
    state: Mutex<CacheState>,
}

impl DataCache {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Composed data for a component, fetching data and schema concurrently on a miss
    pub async fn get_data(&self, reference: &Reference) -> StoreResult<ComponentData> {
        let generation = {
            let state = self.state();
            if let Some(data) = state.components.get(reference) {
                return Ok(data.clone());
            }
            state.generation
        };

        debug!(reference = %reference, "Cache miss, fetching data and schema");
        let (raw, raw_schema) = tokio::try_join!(
            self.store.get_data(reference),
            self.store.get_schema(reference)
        )?;
        let schema = Arc::new(parse_schema(reference, &raw_schema)?);
        let data = ComponentData::compose(reference.clone(), &raw, &schema)
            .map_err(|e| StoreError::decode(reference.as_str(), e))?;

        let mut state = self.state();
        if state.generation == generation {
            if let Some(name) = reference.component_name() {
                state.schemas.insert(name.to_string(), schema);
            }
            state.components.insert(reference.clone(), data.clone());
        }
        Ok(data)
    }

    pub async fn get_schema(&self, reference: &Reference) -> StoreResult<Arc<Schema>> {
        let name = reference
            .component_name()
            .ok_or_else(|| StoreError::decode(reference.as_str(), "not a component reference"))?
            .to_string();
        let generation = {
            let state = self.state();
            if let Some(schema) = state.schemas.get(&name) {
                return Ok(schema.clone());
            }
            state.generation
        };

        debug!(reference = %reference, "Cache miss, fetching schema");
        let raw = self.store.get_schema(reference).await?;
        let schema = Arc::new(parse_schema(reference, &raw)?);

        let mut state = self.state();
        if state.generation == generation {
            state.schemas.insert(name, schema.clone());
        }
        Ok(schema)
    }

    /// Raw data without a schema, for pages and other schema-less resources
    pub async fn get_data_only(&self, reference: &Reference) -> StoreResult<Value> {
        let generation = {
            let state = self.state();
            if let Some(data) = state.data_only.get(reference) {
                return Ok(data.clone());
            }
            state.generation
        };

        debug!(reference = %reference, "Cache miss, fetching data only");
        let raw = self.store.get_data(reference).await?;

        let mut state = self.state();
        if state.generation == generation {
            state.data_only.insert(reference.clone(), raw.clone());
        }
        Ok(raw)
    }

    pub async fn get_page(&self, reference: &Reference) -> StoreResult<PageData> {
        let raw = self.get_data_only(reference).await?;
        PageData::from_value(reference.clone(), &raw)
            .map_err(|e| StoreError::decode(reference.as_str(), e))
    }

    /// Rendered markup is never cached
    pub async fn get_html(&self, reference: &Reference, edit: bool) -> StoreResult<String> {
        self.store.get_html(reference, edit).await
    }

    pub async fn save(&self, data: &ComponentData) -> StoreResult<Value> {
        self.put(&data.reference, &data.to_raw()).await
    }

    pub async fn save_page(&self, page: &PageData) -> StoreResult<Value> {
        self.put(&page.reference, &page.to_raw()).await
    }

    /// PUT raw data
    pub async fn put(&self, reference: &Reference, raw: &Value) -> StoreResult<Value> {
        let saved = self.store.put(reference, raw).await?;
        self.clear_after_write(reference.as_str());
        Ok(saved)
    }

    /// POST a new resource, returning the created reference and data
    pub async fn create(&self, collection: &str, raw: &Value) -> StoreResult<(Reference, Value)> {
        let created = self.store.post(collection, raw).await?;
        let reference = created
            .get("_ref")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::decode(collection, "created resource has no _ref"))
            .and_then(|raw| Reference::parse(raw).map_err(|e| StoreError::decode(collection, e)))?;
        self.clear_after_write(collection);
        Ok((reference, created))
    }

    pub async fn remove(&self, reference: &Reference) -> StoreResult<()> {
        self.store.delete(reference).await?;
        self.clear_after_write(reference.as_str());
        Ok(())
    }

    fn clear_after_write(&self, target: &str) {
        info!(target = %target, "Write succeeded, clearing data cache");
        self.clear();
    }

    pub fn clear(&self) {
        let mut state = self.state();
        state.components.clear();
        state.schemas.clear();
        state.data_only.clear();
        state.generation += 1;
    }

    pub fn is_cached(&self, reference: &Reference) -> bool {
        let state = self.state();
        state.components.contains_key(reference) || state.data_only.contains_key(reference)
    }
}

fn parse_schema(reference: &Reference, raw: &Value) -> StoreResult<Schema> {
    Schema::from_value(raw).map_err(|e| StoreError::decode(reference.as_str(), e))
}
