use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid reference: {0:?}")]
    InvalidReference(String),

    #[error("Invalid schema: {message}")]
    InvalidSchema { message: String },

    #[error("Invalid data for {reference}: {message}")]
    InvalidData { reference: String, message: String },

    #[error("Field {field} of {reference} is not a component container")]
    NotAContainer { reference: String, field: String },
}

impl ModelError {
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            message: message.into(),
        }
    }

    pub fn invalid_data(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidData {
            reference: reference.into(),
            message: message.into(),
        }
    }
}
