//! YAML text in and out.

use serde::Deserialize;

use crate::error::TreeError;
use crate::tree::ConfigTree;

/// Parse a single YAML document.
///
/// An empty document parses to null.
pub fn from_yaml_str(text: &str) -> Result<ConfigTree, TreeError> {
    let value: serde_yaml::Value = serde_yaml::from_str(text)?;
    ConfigTree::try_from(value)
}

/// Parse a `---` separated stream into one tree per document.
pub fn from_yaml_documents(text: &str) -> Result<Vec<ConfigTree>, TreeError> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = serde_yaml::Value::deserialize(document)?;
        documents.push(ConfigTree::try_from(value)?);
    }
    Ok(documents)
}

/// Serialize a tree as YAML, keeping mapping order.
pub fn to_yaml_string(tree: &ConfigTree) -> Result<String, TreeError> {
    Ok(serde_yaml::to_string(tree)?)
}
