//! Built-in defaults (layer 1)
//!
//! Hardcoded defaults for all configuration values.

use serde::{Deserialize, Serialize};
use values_tree::ConfigTree;

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// helm executable (default: "helm")
    pub helm_bin: String,

    /// Chart directory (default: ".")
    pub chart_dir: String,

    /// Release name (default: "test")
    pub release: String,

    /// Namespace (default: "default")
    pub namespace: String,

    /// Render timeout in seconds (default: 120)
    pub timeout_seconds: u64,

    /// Values path of the chart whose labels are resolved (default: "gitlab.spamcheck")
    pub chart_path: String,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            helm_bin: "helm".to_string(),
            chart_dir: ".".to_string(),
            release: "test".to_string(),
            namespace: "default".to_string(),
            timeout_seconds: 120,
            chart_path: "gitlab.spamcheck".to_string(),
        }
    }
}

impl BuiltinDefaults {
    /// Convert to a tree for merging
    pub fn to_tree(&self) -> ConfigTree {
        ConfigTree::from(serde_json::json!({
            "helm_bin": self.helm_bin,
            "chart_dir": self.chart_dir,
            "release": self.release,
            "namespace": self.namespace,
            "timeout_seconds": self.timeout_seconds,
            "extra_args": [],
            "labels": {
                "chart_path": self.chart_path
            }
        }))
    }
}
