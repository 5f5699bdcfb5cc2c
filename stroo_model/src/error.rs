use std::fmt::Display;

use thiserror::Error;

use crate::TagError;

/// Errors building the model of a unit.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A syntactic or resolved shape the model has no representation for.
    #[error("{shape} found on {decl:?} (not implemented)")]
    NotImplemented { shape: String, decl: String },
    #[error("error parsing tags : {source} of field named {field:?} input = {input}")]
    Tag {
        source: TagError,
        field: String,
        input: String,
    },
    #[error("unit {0} has no syntax to build a model from")]
    NoSyntax(String),
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

impl ModelError {
    /// An unsupported `shape` on declaration `decl`.
    pub fn not_implemented(shape: impl Display, decl: &str) -> Self {
        Self::NotImplemented {
            shape: shape.to_string(),
            decl: decl.to_string(),
        }
    }

    /// A malformed tag on `field`.
    pub fn tag(source: TagError, field: &str, input: &str) -> Self {
        Self::Tag {
            source,
            field: field.to_string(),
            input: input.to_string(),
        }
    }
}
