//! Error types for the editor

use crate::mutations::MutationError;
use folio_common::StoreError;
use folio_dom::DomError;
use folio_model::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type EditorResult<T> = Result<T, EditorError>;

#[derive(Error, Debug, Clone)]
pub enum EditorError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Document error: {0}")]
    Dom(#[from] DomError),

    #[error("Mutation error: {0}")]
    Mutation(#[from] MutationError),

    /// The caller broke an API contract (missing node, reference or path)
    #[error("Invalid use: {0}")]
    Usage(String),

    #[error("Validation failed: {}", summarize(.0))]
    Validation(Vec<ValidationIssue>),
}

impl EditorError {
    pub fn usage(message: impl Into<String>) -> Self {
        EditorError::Usage(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, EditorError::Store(e) if e.is_not_found())
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            EditorError::Validation(issues) => issues,
            _ => &[],
        }
    }
}

/// One field that failed local validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn summarize(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
