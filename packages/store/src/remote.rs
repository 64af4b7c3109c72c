use async_trait::async_trait;
use folio_common::StoreResult;
use folio_model::Reference;
use serde_json::Value;

/// The content service as seen by the editor.
///
/// Every method maps onto one request against the service:
///
/// | method       | request                      |
/// |--------------|------------------------------|
/// | `get_data`   | `GET <ref>`                  |
/// | `get_schema` | `GET <ref>/schema`           |
/// | `get_html`   | `GET <ref>.html[?edit=true]` |
/// | `put`        | `PUT <ref>`                  |
/// | `post`       | `POST <collection>`          |
/// | `delete`     | `DELETE <ref>`               |
///
/// A 404 must come back as [`folio_common::StoreError::NotFound`]; callers rely
/// on it to tell "absent" apart from a transient failure.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn get_data(&self, reference: &Reference) -> StoreResult<Value>;

    async fn get_schema(&self, reference: &Reference) -> StoreResult<Value>;

    async fn get_html(&self, reference: &Reference, edit: bool) -> StoreResult<String>;

    /// Persist `data`, returning what the service saved
    async fn put(&self, reference: &Reference, data: &Value) -> StoreResult<Value>;

    /// Create a resource in `collection`, returning it with its new `_ref`
    async fn post(&self, collection: &str, data: &Value) -> StoreResult<Value>;

    async fn delete(&self, reference: &Reference) -> StoreResult<()>;
}

/// One request issued against a store, recorded by test doubles
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    GetData(String),
    GetSchema(String),
    GetHtml(String),
    Put(String),
    Post(String),
    Delete(String),
}

impl StoreCall {
    pub fn target(&self) -> &str {
        match self {
            StoreCall::GetData(target)
            | StoreCall::GetSchema(target)
            | StoreCall::GetHtml(target)
            | StoreCall::Put(target)
            | StoreCall::Post(target)
            | StoreCall::Delete(target) => target,
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(
            self,
            StoreCall::Put(_) | StoreCall::Post(_) | StoreCall::Delete(_)
        )
    }
}
