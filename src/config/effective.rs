//! Effective configuration with full provenance
//!
//! The effective config captures the merged tool configuration plus
//! information about where each layer came from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::debug;
use values_tree::{compose_layers, ConfigTree};

use super::defaults::BuiltinDefaults;
use crate::labels::LabelResolver;
use crate::render::HelmSettings;

/// Schema version for effective config output
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "chart-values/effective_config@1";

/// Helm rejects release names longer than this
const MAX_RELEASE_NAME_LEN: usize = 53;

/// Origin of a configuration source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    Host,
    Repo,
    Cli,
}

/// A contributing config source with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    /// Origin of this source
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl ConfigSource {
    /// Source with no backing file
    fn inline(origin: ConfigOrigin) -> Self {
        Self {
            origin,
            path: None,
            digest: None,
        }
    }
}

/// Effective configuration with full provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    /// Schema version
    pub schema_version: u32,

    /// Schema identifier
    pub schema_id: String,

    /// When this config was computed
    pub created_at: DateTime<Utc>,

    /// The merged configuration
    pub config: ConfigTree,

    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,
}

impl EffectiveConfig {
    /// Build effective config from layers.
    ///
    /// Config files that do not exist are skipped.
    pub fn build(
        host_config_path: Option<&Path>,
        repo_config_path: Option<&Path>,
        cli_overrides: Option<ConfigTree>,
    ) -> Result<Self, ConfigError> {
        let mut layers = vec![BuiltinDefaults::default().to_tree()];
        let mut sources = vec![ConfigSource::inline(ConfigOrigin::Builtin)];

        let files = [
            (ConfigOrigin::Host, host_config_path),
            (ConfigOrigin::Repo, repo_config_path),
        ];
        for (origin, path) in files {
            let Some(path) = path.filter(|p| p.exists()) else {
                continue;
            };
            let (tree, digest) = Self::load_toml_file(path)?;
            debug!(?origin, path = %path.display(), "loaded config file");
            layers.push(tree);
            sources.push(ConfigSource {
                origin,
                path: Some(path.to_string_lossy().to_string()),
                digest: Some(digest),
            });
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource::inline(ConfigOrigin::Cli));
        }

        let config = compose_layers(layers);
        Self::validate_config(&config)?;
        debug!(sources = sources.len(), "built effective config");

        Ok(Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            config,
            sources,
        })
    }

    /// Load and parse a TOML file, returning the tree and digest
    fn load_toml_file(path: &Path) -> Result<(ConfigTree, String), ConfigError> {
        let bytes = fs::read(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let contents = String::from_utf8(bytes)
            .map_err(|e| ConfigError::ParseError(format!("Invalid UTF-8: {}", e)))?;

        let toml_value: toml::Value = toml::from_str(&contents).map_err(|e| {
            ConfigError::ParseError(format!("TOML parse error in {}: {}", path.display(), e))
        })?;

        Ok((Self::toml_to_tree(toml_value), digest))
    }

    /// Convert a TOML value to a config tree
    fn toml_to_tree(toml: toml::Value) -> ConfigTree {
        match toml {
            toml::Value::String(s) => ConfigTree::from(s),
            toml::Value::Integer(i) => ConfigTree::from(i),
            toml::Value::Float(f) => ConfigTree::from(f),
            toml::Value::Boolean(b) => ConfigTree::from(b),
            toml::Value::Datetime(dt) => ConfigTree::from(dt.to_string()),
            toml::Value::Array(arr) => {
                ConfigTree::Sequence(arr.into_iter().map(Self::toml_to_tree).collect())
            }
            toml::Value::Table(table) => ConfigTree::Mapping(
                table
                    .into_iter()
                    .map(|(k, v)| (k, Self::toml_to_tree(v)))
                    .collect(),
            ),
        }
    }

    /// Validate configuration values
    fn validate_config(config: &ConfigTree) -> Result<(), ConfigError> {
        // timeout_seconds must be in (0, 3600]
        match config.get("timeout_seconds").map(|v| v.as_u64()) {
            Some(Some(timeout)) if timeout > 0 && timeout <= 3600 => {}
            _ => {
                return Err(ConfigError::ValidationError(
                    "timeout_seconds must be an integer in (0, 3600]".to_string(),
                ));
            }
        }

        // release must be a non-empty name helm accepts
        match config.get("release").and_then(|v| v.as_str()) {
            Some(release) if !release.is_empty() && release.len() <= MAX_RELEASE_NAME_LEN => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "release must be a non-empty string of at most {} characters",
                    MAX_RELEASE_NAME_LEN
                )));
            }
        }

        if config
            .get("helm_bin")
            .and_then(|v| v.as_str())
            .map_or(true, str::is_empty)
        {
            return Err(ConfigError::ValidationError(
                "helm_bin must be a non-empty string".to_string(),
            ));
        }

        Ok(())
    }

    /// Settings for the helm renderer
    pub fn helm_settings(&self) -> Result<HelmSettings, ConfigError> {
        serde_json::from_value(serde_json::Value::from(&self.config))
            .map_err(|e| ConfigError::ValidationError(format!("invalid helm settings: {}", e)))
    }

    /// Label resolver for the configured chart path
    pub fn label_resolver(&self) -> Result<LabelResolver, ConfigError> {
        let chart_path = self.get_str("labels.chart_path").ok_or_else(|| {
            ConfigError::ValidationError("labels.chart_path must be a string".to_string())
        })?;
        LabelResolver::with_chart_path(chart_path)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Get a config value by path (dot-separated)
    pub fn get(&self, path: &str) -> Option<&ConfigTree> {
        let parts: Vec<&str> = path.split('.').collect();
        self.config.dig(&parts)
    }

    /// Get a config value as u64
    pub fn get_u64(&self, path: &str) -> Option<u64> {
        self.get(path).and_then(|v| v.as_u64())
    }

    /// Get a config value as string
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|v| v.as_str())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn cli(json: serde_json::Value) -> Option<ConfigTree> {
        Some(ConfigTree::from(json))
    }

    #[test]
    fn test_build_with_defaults_only() {
        let config = EffectiveConfig::build(None, None, None).unwrap();

        assert_eq!(config.schema_version, SCHEMA_VERSION);
        assert_eq!(config.get_u64("timeout_seconds"), Some(120));
        assert_eq!(config.get_str("labels.chart_path"), Some("gitlab.spamcheck"));
    }

    #[test]
    fn test_build_with_cli_override() {
        let config =
            EffectiveConfig::build(None, None, cli(serde_json::json!({"release": "review"})))
                .unwrap();

        assert_eq!(config.get_str("release"), Some("review"));
        assert_eq!(config.get_str("namespace"), Some("default"));
    }

    #[test]
    fn test_validation_timeout() {
        let result =
            EffectiveConfig::build(None, None, cli(serde_json::json!({"timeout_seconds": 0})));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("timeout_seconds"));
    }

    #[test]
    fn test_validation_release_length() {
        let long = "r".repeat(54);
        let result = EffectiveConfig::build(None, None, cli(serde_json::json!({"release": long})));
        assert!(result.unwrap_err().to_string().contains("release"));
    }

    #[test]
    fn test_load_toml_layers() {
        let mut host = NamedTempFile::new().unwrap();
        writeln!(host, "helm_bin = \"/usr/local/bin/helm\"").unwrap();
        writeln!(host, "timeout_seconds = 300").unwrap();

        let mut repo = NamedTempFile::new().unwrap();
        writeln!(repo, "chart_dir = \"charts/gitlab\"").unwrap();
        writeln!(repo, "timeout_seconds = 60").unwrap();
        writeln!(repo, "[labels]").unwrap();
        writeln!(repo, "chart_path = \"gitlab.webservice\"").unwrap();

        let config = EffectiveConfig::build(Some(host.path()), Some(repo.path()), None).unwrap();

        assert_eq!(config.get_str("helm_bin"), Some("/usr/local/bin/helm"));
        assert_eq!(config.get_str("chart_dir"), Some("charts/gitlab"));
        // repo wins over host
        assert_eq!(config.get_u64("timeout_seconds"), Some(60));
        assert_eq!(config.get_str("labels.chart_path"), Some("gitlab.webservice"));
        assert_eq!(config.sources.len(), 3);
        assert_eq!(config.sources[1].origin, ConfigOrigin::Host);
        assert_eq!(config.sources[2].origin, ConfigOrigin::Repo);
        assert_eq!(config.sources[2].digest.as_ref().map(|d| d.len()), Some(64));
    }

    #[test]
    fn test_missing_files_are_skipped() {
        let config = EffectiveConfig::build(
            Some(Path::new("/nonexistent/config.toml")),
            Some(Path::new("/nonexistent/.chart-values.toml")),
            None,
        )
        .unwrap();

        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].origin, ConfigOrigin::Builtin);
    }

    #[test]
    fn test_invalid_toml() {
        let mut repo = NamedTempFile::new().unwrap();
        writeln!(repo, "release = ").unwrap();

        let result = EffectiveConfig::build(None, Some(repo.path()), None);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_helm_settings() {
        let config = EffectiveConfig::build(
            None,
            None,
            cli(serde_json::json!({"extra_args": ["--kube-version", "1.29"]})),
        )
        .unwrap();
        let settings = config.helm_settings().unwrap();

        assert_eq!(settings.helm_bin, "helm");
        assert_eq!(settings.release, "test");
        assert_eq!(settings.timeout_seconds, 120);
        assert_eq!(settings.extra_args, vec!["--kube-version", "1.29"]);
    }

    #[test]
    fn test_label_resolver() {
        let config = EffectiveConfig::build(None, None, None).unwrap();
        let resolver = config.label_resolver().unwrap();
        assert_eq!(resolver.chart_path(), &["gitlab".to_string(), "spamcheck".to_string()]);
    }

    #[test]
    fn test_to_json_includes_provenance() {
        let mut repo = NamedTempFile::new().unwrap();
        writeln!(repo, "namespace = \"gitlab\"").unwrap();

        let config = EffectiveConfig::build(None, Some(repo.path()), None).unwrap();
        let json: serde_json::Value = serde_json::from_str(&config.to_json().unwrap()).unwrap();

        assert_eq!(json["schema_id"], SCHEMA_ID);
        assert_eq!(json["config"]["namespace"], "gitlab");
        assert_eq!(json["sources"][0]["origin"], "builtin");
        assert!(json["sources"][0].get("path").is_none());
        assert_eq!(json["sources"][1]["origin"], "repo");
    }
}
