//! Error types for the required-input analysis.
//!
//! Missing inputs are *findings* and never travel through these types.
//! Everything here aborts the analysis pass.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to compile a requiredness expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    /// The expression text was blank.
    #[error("expression is empty")]
    Empty,

    /// A character no token starts with.
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    /// A token in a position the grammar does not allow.
    #[error("unexpected `{found}` at offset {offset}")]
    UnexpectedToken { found: String, offset: usize },

    /// Input ended while the grammar still expected something.
    #[error("unexpected end of expression, expected {expected}")]
    UnexpectedEnd { expected: &'static str },

    /// Identifier that is not one of the sibling inputs.
    #[error("`{name}` is not an input of this component")]
    UnknownName { name: String },
}

/// Fatal errors raised while running an analysis.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// A requiredness annotation could not be compiled.
    #[error(
        "invalid requiredness expression `{expression}` on input `{input}` of component <{component}>: {source}"
    )]
    InvalidRequirement {
        component: String,
        input: String,
        expression: String,
        #[source]
        source: ExpressionError,
    },

    /// Unrecognised or malformed options.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error while reading the analysed tree.
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AnalysisError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an IO error bound to a path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
