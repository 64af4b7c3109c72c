use crate::tree::NodeId;
use thiserror::Error;

pub type DomResult<T> = Result<T, DomError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomError {
    #[error("Unknown node: {0:?}")]
    UnknownNode(NodeId),

    #[error("Node {0:?} is not an element")]
    NotAnElement(NodeId),

    #[error("Invalid hierarchy: {0}")]
    Hierarchy(String),

    #[error("Markup error: {0}")]
    Markup(#[from] MarkupError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarkupError {
    #[error("Unterminated comment at {pos}")]
    UnterminatedComment { pos: usize },

    #[error("Malformed tag at {pos}: {message}")]
    MalformedTag { pos: usize, message: String },
}
