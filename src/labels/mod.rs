//! Label resolution
//!
//! Labels stamped on a rendered resource come from several values blocks,
//! merged in increasing precedence:
//! 1. Global common labels (`global.common.labels`)
//! 2. Chart common labels (`<chart>.common.labels`)
//! 3. Resource-type labels, global block first then the chart block
//!    (`global.pod.labels`, `<chart>.podLabels` for pod templates;
//!    `global.service.labels`, `<chart>.serviceLabels` for Services)
//!
//! The chart path defaults to `gitlab.<chart>`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::trace;
use values_tree::{compose_layers, format_path, parse_path, ConfigTree, PathSegment};

/// Resolved labels, sorted by key
pub type Labels = BTreeMap<String, String>;

/// Which metadata block the labels are for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LabelScope {
    /// Resource metadata of everything except Services
    Common,
    /// Pod template metadata
    Pod,
    /// Service metadata
    Service,
}

impl LabelScope {
    /// Scope of a resource's own `metadata.labels`
    pub fn for_kind(kind: &str) -> Self {
        match kind {
            "Service" => LabelScope::Service,
            "Pod" => LabelScope::Pod,
            _ => LabelScope::Common,
        }
    }
}

impl fmt::Display for LabelScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelScope::Common => write!(f, "common"),
            LabelScope::Pod => write!(f, "pod"),
            LabelScope::Service => write!(f, "service"),
        }
    }
}

impl FromStr for LabelScope {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "common" => Ok(LabelScope::Common),
            "pod" => Ok(LabelScope::Pod),
            "service" => Ok(LabelScope::Service),
            other => Err(LabelError::UnknownScope(other.to_string())),
        }
    }
}

/// Resolves labels for one chart from a composed values tree
#[derive(Debug, Clone)]
pub struct LabelResolver {
    chart_path: Vec<String>,
}

impl LabelResolver {
    /// Resolver for `gitlab.<chart>`
    pub fn for_chart(chart: &str) -> Self {
        Self {
            chart_path: vec!["gitlab".to_string(), chart.to_string()],
        }
    }

    /// Resolver for an explicit dotted chart values path
    pub fn with_chart_path(chart_path: &str) -> Result<Self, LabelError> {
        let segments = parse_path(chart_path)
            .map_err(|e| LabelError::InvalidChartPath(e.to_string()))?;

        let chart_path = segments
            .into_iter()
            .map(|segment| match segment {
                PathSegment::Key(key) => Ok(key),
                PathSegment::Index(_) => Err(LabelError::InvalidChartPath(format!(
                    "{}: indices are not allowed",
                    chart_path
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { chart_path })
    }

    pub fn chart_path(&self) -> &[String] {
        &self.chart_path
    }

    /// Values paths of the label blocks for `scope`, lowest precedence first
    pub fn layer_paths(&self, scope: LabelScope) -> Vec<Vec<String>> {
        let global = |rest: &[&str]| -> Vec<String> {
            std::iter::once("global")
                .chain(rest.iter().copied())
                .map(str::to_string)
                .collect()
        };
        let chart = |rest: &[&str]| -> Vec<String> {
            self.chart_path
                .iter()
                .cloned()
                .chain(rest.iter().map(|s| s.to_string()))
                .collect()
        };

        let mut paths = vec![global(&["common", "labels"]), chart(&["common", "labels"])];
        match scope {
            LabelScope::Common => {}
            LabelScope::Pod => {
                paths.push(global(&["pod", "labels"]));
                paths.push(chart(&["podLabels"]));
            }
            LabelScope::Service => {
                paths.push(global(&["service", "labels"]));
                paths.push(chart(&["serviceLabels"]));
            }
        }
        paths
    }

    /// Merge the label blocks for `scope` and render values as strings.
    ///
    /// Missing or empty blocks are skipped. A null label value removes the
    /// label.
    pub fn resolve(&self, values: &ConfigTree, scope: LabelScope) -> Result<Labels, LabelError> {
        let mut blocks = Vec::new();

        for path in self.layer_paths(scope) {
            let layer = display_path(&path);
            let block = match values.dig(path.as_slice()) {
                None => continue,
                Some(block) if block.is_null() => continue,
                Some(block) => block,
            };

            let entries = block
                .as_mapping()
                .ok_or_else(|| LabelError::NotAMapping { layer: layer.clone() })?;

            if let Some((key, _)) = entries.iter().find(|(_, v)| v.as_scalar().is_none()) {
                return Err(LabelError::NonScalar {
                    layer,
                    key: key.clone(),
                });
            }

            trace!(%layer, labels = entries.len(), "label layer");
            blocks.push(block.clone());
        }

        let merged = compose_layers(blocks);
        Ok(labels_from_tree(&merged))
    }
}

/// Render a mapping of scalar label values as strings, dropping nulls and
/// anything that is not a scalar.
pub fn labels_from_tree(tree: &ConfigTree) -> Labels {
    tree.as_mapping()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|(key, value)| {
                    value
                        .as_scalar()
                        .and_then(|scalar| scalar.to_text())
                        .map(|text| (key.clone(), text))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn display_path(path: &[String]) -> String {
    let segments: Vec<PathSegment> = path.iter().cloned().map(PathSegment::Key).collect();
    format_path(&segments)
}

/// Label resolution errors
#[derive(Debug, thiserror::Error)]
pub enum LabelError {
    #[error("unknown label scope '{0}' (expected common, pod or service)")]
    UnknownScope(String),

    #[error("invalid chart path: {0}")]
    InvalidChartPath(String),

    #[error("label block {layer} is not a mapping")]
    NotAMapping { layer: String },

    #[error("label {key} in {layer} is not a scalar")]
    NonScalar { layer: String, key: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use values_tree::from_yaml_str;

    fn values(yaml: &str) -> ConfigTree {
        from_yaml_str(yaml).unwrap()
    }

    #[test]
    fn test_scope_for_kind() {
        assert_eq!(LabelScope::for_kind("Service"), LabelScope::Service);
        assert_eq!(LabelScope::for_kind("Deployment"), LabelScope::Common);
        assert_eq!(LabelScope::for_kind("ConfigMap"), LabelScope::Common);
        assert_eq!(LabelScope::for_kind("NetworkPolicy"), LabelScope::Common);
    }

    #[test]
    fn test_scope_from_str() {
        assert_eq!("pod".parse::<LabelScope>().unwrap(), LabelScope::Pod);
        assert!(matches!(
            "ingress".parse::<LabelScope>(),
            Err(LabelError::UnknownScope(_))
        ));
    }

    #[test]
    fn test_scope_value_names() {
        use clap::ValueEnum;

        let names: Vec<String> = LabelScope::value_variants()
            .iter()
            .filter_map(|scope| scope.to_possible_value())
            .map(|value| value.get_name().to_string())
            .collect();
        assert_eq!(names, vec!["common", "pod", "service"]);
        assert_eq!(
            <LabelScope as ValueEnum>::from_str("service", false).unwrap(),
            LabelScope::Service
        );
    }

    #[test]
    fn test_layer_paths_order() {
        let resolver = LabelResolver::for_chart("spamcheck");
        let paths: Vec<String> = resolver
            .layer_paths(LabelScope::Service)
            .iter()
            .map(|p| p.join("."))
            .collect();

        assert_eq!(
            paths,
            vec![
                "global.common.labels",
                "gitlab.spamcheck.common.labels",
                "global.service.labels",
                "gitlab.spamcheck.serviceLabels",
            ]
        );
    }

    #[test]
    fn test_chart_labels_override_global() {
        let v = values(
            r#"
global:
  common:
    labels:
      global: global
      foo: global
gitlab:
  spamcheck:
    common:
      labels:
        global: spamcheck
        spamcheck: spamcheck
"#,
        );
        let labels = LabelResolver::for_chart("spamcheck")
            .resolve(&v, LabelScope::Common)
            .unwrap();

        assert_eq!(labels.get("global").map(String::as_str), Some("spamcheck"));
        assert_eq!(labels.get("foo").map(String::as_str), Some("global"));
        assert_eq!(labels.get("spamcheck").map(String::as_str), Some("spamcheck"));
    }

    #[test]
    fn test_non_string_values_rendered() {
        let v = values("gitlab:\n  spamcheck:\n    podLabels:\n      pod: true\n      tier: 2\n");
        let labels = LabelResolver::for_chart("spamcheck")
            .resolve(&v, LabelScope::Pod)
            .unwrap();

        assert_eq!(labels.get("pod").map(String::as_str), Some("true"));
        assert_eq!(labels.get("tier").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_null_removes_label() {
        let v = values(
            "global:\n  common:\n    labels:\n      team: a\n      foo: b\ngitlab:\n  spamcheck:\n    common:\n      labels:\n        foo: null\n",
        );
        let labels = LabelResolver::for_chart("spamcheck")
            .resolve(&v, LabelScope::Common)
            .unwrap();

        assert_eq!(labels.get("team").map(String::as_str), Some("a"));
        assert!(!labels.contains_key("foo"));
    }

    #[test]
    fn test_missing_blocks_yield_no_labels() {
        let labels = LabelResolver::for_chart("spamcheck")
            .resolve(&values("global: {spamcheck: {enabled: true}}"), LabelScope::Pod)
            .unwrap();
        assert!(labels.is_empty());
    }

    #[test]
    fn test_block_must_be_mapping() {
        let err = LabelResolver::for_chart("spamcheck")
            .resolve(&values("global: {common: {labels: [a, b]}}"), LabelScope::Common)
            .unwrap_err();
        assert!(matches!(err, LabelError::NotAMapping { ref layer } if layer == "global.common.labels"));
    }

    #[test]
    fn test_label_value_must_be_scalar() {
        let err = LabelResolver::for_chart("spamcheck")
            .resolve(
                &values("gitlab: {spamcheck: {serviceLabels: {nested: {a: b}}}}"),
                LabelScope::Service,
            )
            .unwrap_err();
        assert!(matches!(err, LabelError::NonScalar { ref key, .. } if key == "nested"));
    }

    #[test]
    fn test_custom_chart_path() {
        let resolver = LabelResolver::with_chart_path("spamcheck").unwrap();
        let v = values("spamcheck: {common: {labels: {tier: backend}}}");

        let labels = resolver.resolve(&v, LabelScope::Common).unwrap();
        assert_eq!(labels.get("tier").map(String::as_str), Some("backend"));

        assert!(LabelResolver::with_chart_path("charts[0]").is_err());
    }
}
