//! Errors raised while loading or querying the program model

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid type `{0}`")]
    InvalidType(String),

    #[error("invalid variable `{0}`, expected `name:type`")]
    InvalidVar(String),

    #[error("invalid binary operator `{0}`")]
    InvalidOperator(String),

    #[error("invalid method signature `{0}`, expected `<Class: subsignature>`")]
    InvalidSignature(String),

    #[error("class `{0}` is declared more than once")]
    DuplicateClass(String),

    #[error("class `{class}` declares `{subsignature}` more than once")]
    DuplicateMethod { class: String, subsignature: String },

    #[error("class `{class}` refers to unknown {relation} `{target}`")]
    UnknownSupertype {
        class: String,
        relation: &'static str,
        target: String,
    },

    #[error("class `{0}` is its own supertype")]
    CyclicHierarchy(String),

    #[error("method `{0}` not found")]
    MethodNotFound(String),

    #[error("method `{0}` has no body")]
    MissingBody(String),

    #[error("statement {index} of `{method}` jumps to {target}, but the body has {len} statements")]
    JumpOutOfBounds {
        method: String,
        index: usize,
        target: usize,
        len: usize,
    },
}
