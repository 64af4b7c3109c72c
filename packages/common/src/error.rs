use thiserror::Error;

/// Failure reported by the remote content store.
///
/// `NotFound` is kept apart from the other variants: callers routinely turn it
/// into "absent" (a `false` probe, an empty default) while everything else is
/// surfaced to the operator as a transient failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Not found: {reference}")]
    NotFound { reference: String },

    #[error("Server error {status} for {reference}: {message}")]
    Server {
        reference: String,
        status: u16,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid payload for {reference}: {message}")]
    Decode { reference: String, message: String },
}

impl StoreError {
    pub fn not_found(reference: impl Into<String>) -> Self {
        StoreError::NotFound {
            reference: reference.into(),
        }
    }

    pub fn server(reference: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        StoreError::Server {
            reference: reference.into(),
            status,
            message: message.into(),
        }
    }

    pub fn decode(reference: impl Into<String>, err: impl std::fmt::Display) -> Self {
        StoreError::Decode {
            reference: reference.into(),
            message: err.to_string(),
        }
    }

    /// Map an HTTP status to the matching variant (`404` becomes `NotFound`)
    pub fn from_status(reference: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        let reference = reference.into();
        if status == 404 {
            StoreError::NotFound { reference }
        } else {
            StoreError::Server {
                reference,
                status,
                message: message.into(),
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Everything except `NotFound` is treated as transient: reported, never retried
    pub fn is_transient(&self) -> bool {
        !self.is_not_found()
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Decode {
            reference: String::new(),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_404_maps_to_not_found() {
        let err = StoreError::from_status("site/_pages/home", 404, "missing");
        assert!(err.is_not_found());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_other_statuses_are_transient() {
        let err = StoreError::from_status("site/_pages/home", 503, "unavailable");
        assert!(err.is_transient());
        assert_eq!(
            err.to_string(),
            "Server error 503 for site/_pages/home: unavailable"
        );
    }
}
