//! Values layers
//!
//! A values tree is composed from ordered layers, lowest precedence first:
//! 1. Chart defaults
//! 2. Values files (`-f values.yaml`)
//! 3. Inline fragments
//! 4. `--set` / `--set-string` expressions
//!
//! Each layer records where it came from so a composed tree can be traced
//! back to its sources.

mod set;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::debug;
use values_tree::{compose_layers, from_yaml_str, ConfigTree, TreeError};

pub use set::{parse_set, SetMode};

/// Where a layer came from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "origin", rename_all = "lowercase")]
pub enum LayerOrigin {
    Defaults,
    File {
        path: String,
        /// SHA-256 digest of raw file bytes
        digest: String,
    },
    Inline {
        name: String,
    },
    Set {
        expression: String,
    },
}

impl fmt::Display for LayerOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerOrigin::Defaults => write!(f, "defaults"),
            LayerOrigin::File { path, .. } => write!(f, "file {}", path),
            LayerOrigin::Inline { name } => write!(f, "inline {}", name),
            LayerOrigin::Set { expression } => write!(f, "set {}", expression),
        }
    }
}

/// One values fragment with its provenance
#[derive(Debug, Clone, PartialEq)]
pub struct ValuesLayer {
    pub origin: LayerOrigin,
    pub tree: ConfigTree,
}

impl ValuesLayer {
    /// Chart defaults layer
    pub fn defaults(tree: ConfigTree) -> Self {
        Self {
            origin: LayerOrigin::Defaults,
            tree,
        }
    }

    /// Load a YAML values file, recording the digest of its raw bytes
    pub fn from_file(path: &Path) -> Result<Self, LayerError> {
        let bytes = fs::read(path).map_err(|source| LayerError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let contents = String::from_utf8(bytes).map_err(|_| LayerError::Encoding {
            path: path.display().to_string(),
        })?;

        let origin = LayerOrigin::File {
            path: path.display().to_string(),
            digest,
        };
        let tree = parse_values(&contents, &origin)?;
        debug!(%origin, "loaded values layer");

        Ok(Self { origin, tree })
    }

    /// Inline YAML fragment
    pub fn inline(name: &str, yaml: &str) -> Result<Self, LayerError> {
        let origin = LayerOrigin::Inline {
            name: name.to_string(),
        };
        let tree = parse_values(yaml, &origin)?;
        Ok(Self { origin, tree })
    }

    /// `--set path=value`, with typed values
    pub fn from_set(expression: &str) -> Result<Self, LayerError> {
        Self::from_expression(expression, SetMode::Typed)
    }

    /// `--set-string path=value`, value kept as a string
    pub fn from_set_string(expression: &str) -> Result<Self, LayerError> {
        Self::from_expression(expression, SetMode::String)
    }

    fn from_expression(expression: &str, mode: SetMode) -> Result<Self, LayerError> {
        Ok(Self {
            origin: LayerOrigin::Set {
                expression: expression.to_string(),
            },
            tree: parse_set(expression, mode)?,
        })
    }
}

/// Values documents must be mappings; an empty document is the empty mapping.
fn parse_values(yaml: &str, origin: &LayerOrigin) -> Result<ConfigTree, LayerError> {
    let tree = from_yaml_str(yaml).map_err(|source| LayerError::Parse {
        origin: origin.to_string(),
        source,
    })?;

    match tree {
        ConfigTree::Mapping(_) => Ok(tree),
        _ if tree.is_null() => Ok(ConfigTree::empty_mapping()),
        _ => Err(LayerError::NotAMapping {
            origin: origin.to_string(),
        }),
    }
}

/// Ordered layers, first is base, last has highest precedence
#[derive(Debug, Clone, Default)]
pub struct LayerStack {
    layers: Vec<ValuesLayer>,
}

impl LayerStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer above all existing layers
    pub fn push(&mut self, layer: ValuesLayer) -> &mut Self {
        self.layers.push(layer);
        self
    }

    /// Builder form of [`LayerStack::push`]
    pub fn with(mut self, layer: ValuesLayer) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &[ValuesLayer] {
        &self.layers
    }

    /// Contributing sources in precedence order
    pub fn sources(&self) -> Vec<&LayerOrigin> {
        self.layers.iter().map(|layer| &layer.origin).collect()
    }

    /// Deep merge all layers left to right
    pub fn compose(&self) -> ConfigTree {
        debug!(layers = self.layers.len(), "composing values");
        compose_layers(self.layers.iter().map(|layer| layer.tree.clone()))
    }
}

/// Values layer errors
#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid UTF-8")]
    Encoding { path: String },

    #[error("failed to parse {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: TreeError,
    },

    #[error("{origin} is not a mapping")]
    NotAMapping { origin: String },

    #[error("invalid set expression '{expression}': {reason}")]
    InvalidSet { expression: String, reason: String },
}
