//! The configuration tree value type.

use indexmap::IndexMap;
use serde::de::{Deserialize, Deserializer, Error as _};
use serde::ser::{Serialize, Serializer};
use serde_yaml::Number;

use crate::error::TreeError;
use crate::merge::deep_merge;
use crate::path::PathSegment;

/// String-keyed mapping. Keeps insertion order; equality ignores it.
pub type Mapping = IndexMap<String, ConfigTree>;

/// A leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl Scalar {
    /// Text form of the scalar, as it would be written in YAML.
    ///
    /// Returns `None` for null.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Scalar::Null => None,
            Scalar::Bool(b) => Some(b.to_string()),
            Scalar::Number(n) => Some(n.to_string()),
            Scalar::String(s) => Some(s.clone()),
        }
    }
}

/// Recursive configuration value: scalar, sequence or mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigTree {
    Scalar(Scalar),
    Sequence(Vec<ConfigTree>),
    Mapping(Mapping),
}

impl Default for ConfigTree {
    /// The empty mapping, identity element for layering.
    fn default() -> Self {
        ConfigTree::Mapping(Mapping::new())
    }
}

impl ConfigTree {
    /// The null scalar.
    pub fn null() -> Self {
        ConfigTree::Scalar(Scalar::Null)
    }

    /// An empty mapping.
    pub fn empty_mapping() -> Self {
        ConfigTree::Mapping(Mapping::new())
    }

    /// Deep merge `overlay` onto `self`, returning a new tree.
    ///
    /// Neither operand is modified, so calls chain left to right:
    /// `defaults.merge(&flags).merge(&overrides)`.
    pub fn merge(&self, overlay: &ConfigTree) -> ConfigTree {
        deep_merge(self, overlay)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConfigTree::Scalar(Scalar::Null))
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self, ConfigTree::Mapping(_))
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            ConfigTree::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[ConfigTree]> {
        match self {
            ConfigTree::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            ConfigTree::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigTree::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigTree::Scalar(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigTree::Scalar(Scalar::Number(n)) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ConfigTree::Scalar(Scalar::Number(n)) => n.as_u64(),
            _ => None,
        }
    }

    /// Look up a key in a mapping.
    pub fn get(&self, key: &str) -> Option<&ConfigTree> {
        self.as_mapping().and_then(|map| map.get(key))
    }

    /// Walk a path of string segments.
    ///
    /// Segments select mapping keys; on a sequence a canonical decimal
    /// segment (`0`, `12`, never `01` or `+1`) selects that element.
    /// Returns `None` as soon as any segment is absent.
    pub fn dig<S: AsRef<str>>(&self, path: &[S]) -> Option<&ConfigTree> {
        path.iter().try_fold(self, |node, segment| {
            let segment = segment.as_ref();
            match node {
                ConfigTree::Mapping(map) => map.get(segment),
                ConfigTree::Sequence(items) => sequence_index(segment).and_then(|i| items.get(i)),
                ConfigTree::Scalar(_) => None,
            }
        })
    }

    /// Walk a parsed path. Keys only match mappings and indices only match
    /// sequences.
    pub fn get_path(&self, path: &[PathSegment]) -> Option<&ConfigTree> {
        path.iter().try_fold(self, |node, segment| match (node, segment) {
            (ConfigTree::Mapping(map), PathSegment::Key(key)) => map.get(key),
            (ConfigTree::Sequence(items), PathSegment::Index(i)) => items.get(*i),
            _ => None,
        })
    }

    /// Build the smallest tree that holds `leaf` at `path`.
    ///
    /// Index segments create sequences padded with nulls up to the index,
    /// so callers taking paths from user input must bound the indices.
    pub fn from_path(path: &[PathSegment], leaf: ConfigTree) -> ConfigTree {
        path.iter().rev().fold(leaf, |child, segment| match segment {
            PathSegment::Key(key) => {
                let mut map = Mapping::with_capacity(1);
                map.insert(key.clone(), child);
                ConfigTree::Mapping(map)
            }
            PathSegment::Index(index) => {
                let mut items = vec![ConfigTree::null(); *index];
                items.push(child);
                ConfigTree::Sequence(items)
            }
        })
    }
}

fn sequence_index(segment: &str) -> Option<usize> {
    let canonical = !segment.is_empty()
        && segment.bytes().all(|b| b.is_ascii_digit())
        && (segment == "0" || !segment.starts_with('0'));
    if canonical {
        segment.parse().ok()
    } else {
        None
    }
}

impl From<Scalar> for ConfigTree {
    fn from(scalar: Scalar) -> Self {
        ConfigTree::Scalar(scalar)
    }
}

impl From<&str> for ConfigTree {
    fn from(s: &str) -> Self {
        ConfigTree::Scalar(Scalar::String(s.to_string()))
    }
}

impl From<String> for ConfigTree {
    fn from(s: String) -> Self {
        ConfigTree::Scalar(Scalar::String(s))
    }
}

impl From<bool> for ConfigTree {
    fn from(b: bool) -> Self {
        ConfigTree::Scalar(Scalar::Bool(b))
    }
}

impl From<i64> for ConfigTree {
    fn from(n: i64) -> Self {
        ConfigTree::Scalar(Scalar::Number(Number::from(n)))
    }
}

impl From<u64> for ConfigTree {
    fn from(n: u64) -> Self {
        ConfigTree::Scalar(Scalar::Number(Number::from(n)))
    }
}

impl From<f64> for ConfigTree {
    fn from(n: f64) -> Self {
        ConfigTree::Scalar(Scalar::Number(Number::from(n)))
    }
}

impl From<Vec<ConfigTree>> for ConfigTree {
    fn from(items: Vec<ConfigTree>) -> Self {
        ConfigTree::Sequence(items)
    }
}

impl From<Mapping> for ConfigTree {
    fn from(map: Mapping) -> Self {
        ConfigTree::Mapping(map)
    }
}

impl TryFrom<serde_yaml::Value> for ConfigTree {
    type Error = TreeError;

    /// Convert a parsed YAML value, applying `<<` merge keys first.
    fn try_from(mut value: serde_yaml::Value) -> Result<Self, Self::Error> {
        value.apply_merge()?;
        convert_yaml(value)
    }
}

fn convert_yaml(value: serde_yaml::Value) -> Result<ConfigTree, TreeError> {
    use serde_yaml::Value;

    Ok(match value {
        Value::Null => ConfigTree::null(),
        Value::Bool(b) => ConfigTree::from(b),
        Value::Number(n) => ConfigTree::Scalar(Scalar::Number(n)),
        Value::String(s) => ConfigTree::from(s),
        Value::Sequence(items) => ConfigTree::Sequence(
            items
                .into_iter()
                .map(convert_yaml)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Mapping(entries) => {
            let mut map = Mapping::with_capacity(entries.len());
            for (key, value) in entries {
                let key = match key {
                    Value::String(s) => s,
                    other => return Err(TreeError::NonStringKey(describe_key(&other))),
                };
                map.insert(key, convert_yaml(value)?);
            }
            ConfigTree::Mapping(map)
        }
        Value::Tagged(tagged) => return Err(TreeError::UnsupportedTag(tagged.tag.to_string())),
    })
}

fn describe_key(key: &serde_yaml::Value) -> String {
    serde_yaml::to_string(key)
        .map(|s| s.trim_end().to_string())
        .unwrap_or_else(|_| format!("{:?}", key))
}

impl From<serde_json::Value> for ConfigTree {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => ConfigTree::null(),
            Value::Bool(b) => ConfigTree::from(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ConfigTree::from(i)
                } else if let Some(u) = n.as_u64() {
                    ConfigTree::from(u)
                } else {
                    ConfigTree::from(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => ConfigTree::from(s),
            Value::Array(items) => {
                ConfigTree::Sequence(items.into_iter().map(ConfigTree::from).collect())
            }
            Value::Object(entries) => ConfigTree::Mapping(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, ConfigTree::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&ConfigTree> for serde_json::Value {
    fn from(tree: &ConfigTree) -> Self {
        use serde_json::Value;

        match tree {
            ConfigTree::Scalar(Scalar::Null) => Value::Null,
            ConfigTree::Scalar(Scalar::Bool(b)) => Value::Bool(*b),
            ConfigTree::Scalar(Scalar::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    Value::Number(i.into())
                } else if let Some(u) = n.as_u64() {
                    Value::Number(u.into())
                } else {
                    n.as_f64()
                        .and_then(serde_json::Number::from_f64)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                }
            }
            ConfigTree::Scalar(Scalar::String(s)) => Value::String(s.clone()),
            ConfigTree::Sequence(items) => Value::Array(items.iter().map(Value::from).collect()),
            ConfigTree::Mapping(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_unit(),
            Scalar::Bool(b) => serializer.serialize_bool(*b),
            Scalar::Number(n) => n.serialize(serializer),
            Scalar::String(s) => serializer.serialize_str(s),
        }
    }
}

impl Serialize for ConfigTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ConfigTree::Scalar(scalar) => scalar.serialize(serializer),
            ConfigTree::Sequence(items) => serializer.collect_seq(items),
            ConfigTree::Mapping(map) => serializer.collect_map(map),
        }
    }
}

impl<'de> Deserialize<'de> for ConfigTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        ConfigTree::try_from(value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::from_yaml_str;

    fn tree(yaml: &str) -> ConfigTree {
        from_yaml_str(yaml).unwrap()
    }

    #[test]
    fn test_dig_mapping_and_sequence() {
        let t = tree("secret:\n  name: shared\n  items:\n    - key: shared_secret\n");

        assert_eq!(t.dig(&["secret", "name"]).and_then(|v| v.as_str()), Some("shared"));
        assert_eq!(
            t.dig(&["secret", "items", "0", "key"]).and_then(|v| v.as_str()),
            Some("shared_secret")
        );
    }

    #[test]
    fn test_dig_requires_canonical_index() {
        let t = tree("items: [a, b]\n");

        assert_eq!(t.dig(&["items", "1"]).and_then(|v| v.as_str()), Some("b"));
        assert_eq!(t.dig(&["items", "0"]).and_then(|v| v.as_str()), Some("a"));
        assert!(t.dig(&["items", "01"]).is_none());
        assert!(t.dig(&["items", "+1"]).is_none());
        assert!(t.dig(&["items", ""]).is_none());
        assert!(t.dig(&["items", "2"]).is_none());
    }

    #[test]
    fn test_dig_absent_segment_is_none() {
        let t = tree("metadata:\n  labels:\n    app: spamcheck\n");

        assert!(t.dig(&["metadata", "annotations"]).is_none());
        assert!(t.dig(&["metadata", "labels", "app", "deeper"]).is_none());
        assert!(t.dig(&["spec", "template"]).is_none());
    }

    #[test]
    fn test_dig_empty_path_is_root() {
        let t = tree("a: 1\n");
        let empty: [&str; 0] = [];
        assert_eq!(t.dig(&empty), Some(&t));
    }

    #[test]
    fn test_from_path_builds_nested_mapping() {
        let path = vec![
            PathSegment::Key("global".to_string()),
            PathSegment::Key("spamcheck".to_string()),
            PathSegment::Key("enabled".to_string()),
        ];
        let t = ConfigTree::from_path(&path, ConfigTree::from(true));

        assert_eq!(t, tree("global:\n  spamcheck:\n    enabled: true\n"));
    }

    #[test]
    fn test_from_path_pads_sequence() {
        let path = vec![PathSegment::Key("hosts".to_string()), PathSegment::Index(2)];
        let t = ConfigTree::from_path(&path, ConfigTree::from("c"));

        let hosts = t.get("hosts").and_then(|v| v.as_sequence()).unwrap();
        assert_eq!(hosts.len(), 3);
        assert!(hosts[0].is_null());
        assert!(hosts[1].is_null());
        assert_eq!(hosts[2].as_str(), Some("c"));
    }

    #[test]
    fn test_mapping_equality_ignores_order() {
        assert_eq!(tree("a: 1\nb: 2\n"), tree("b: 2\na: 1\n"));
    }

    #[test]
    fn test_non_string_key_rejected() {
        let err = from_yaml_str("1: one\n").unwrap_err();
        assert!(matches!(err, TreeError::NonStringKey(_)));
    }

    #[test]
    fn test_custom_tag_rejected() {
        let err = from_yaml_str("value: !secret abc\n").unwrap_err();
        assert!(matches!(err, TreeError::UnsupportedTag(_)));
    }

    #[test]
    fn test_merge_keys_applied() {
        let t = tree("base: &base\n  a: 1\nderived:\n  <<: *base\n  b: 2\n");

        assert_eq!(t.dig(&["derived", "a"]).and_then(|v| v.as_i64()), Some(1));
        assert_eq!(t.dig(&["derived", "b"]).and_then(|v| v.as_i64()), Some(2));
        assert!(t.dig(&["derived", "<<"]).is_none());
    }

    #[test]
    fn test_json_round_trip_keeps_types() {
        let json = serde_json::json!({
            "enabled": true,
            "replicas": 2,
            "ratio": 0.5,
            "hosts": ["a", "b"],
            "empty": null
        });
        let t = ConfigTree::from(json.clone());

        assert_eq!(t.get("replicas").and_then(|v| v.as_i64()), Some(2));
        assert_eq!(serde_json::Value::from(&t), json);
    }

    #[test]
    fn test_scalar_text() {
        assert_eq!(Scalar::Bool(true).to_text(), Some("true".to_string()));
        assert_eq!(Scalar::Number(Number::from(42)).to_text(), Some("42".to_string()));
        assert_eq!(Scalar::Null.to_text(), None);
    }
}
