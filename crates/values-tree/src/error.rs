//! Errors raised while building configuration trees.

/// Errors from parsing YAML into a tree or parsing a value path.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unsupported YAML tag: {0}")]
    UnsupportedTag(String),

    #[error("mapping keys must be strings, found {0}")]
    NonStringKey(String),

    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
}
