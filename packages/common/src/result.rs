use crate::error::StoreError;

/// Result of any call that crosses the remote store boundary
pub type StoreResult<T> = Result<T, StoreError>;
