//! Rendered manifests addressed by `Kind/Name`.

use indexmap::IndexMap;
use std::collections::BTreeMap;
use tracing::{debug, warn};
use values_tree::{from_yaml_documents, ConfigTree, TreeError};

use crate::labels::{labels_from_tree, Labels};

/// One rendered resource
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
    pub body: ConfigTree,
}

impl Manifest {
    /// Build from a rendered document; `None` when `kind` or
    /// `metadata.name` is missing.
    pub fn from_document(body: ConfigTree) -> Option<Self> {
        let kind = body.get("kind")?.as_str()?.to_string();
        let name = body.dig(&["metadata", "name"])?.as_str()?.to_string();
        let namespace = body
            .dig(&["metadata", "namespace"])
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Some(Self {
            kind,
            name,
            namespace,
            body,
        })
    }

    /// `Kind/Name`
    pub fn key(&self) -> String {
        format!("{}/{}", self.kind, self.name)
    }
}

/// A secret referenced from a projected volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretMount {
    /// `secret.name`
    pub name: String,
    /// `secret.items[0].key`
    pub key: Option<String>,
}

/// Manifests from one render, in stream order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestSet {
    manifests: IndexMap<String, Manifest>,
}

impl ManifestSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a multi-document YAML stream.
    ///
    /// Empty documents are skipped, as are documents without a kind or a
    /// name. A later document with the same key replaces an earlier one.
    pub fn parse(stream: &str) -> Result<Self, TreeError> {
        let mut set = Self::new();
        for document in from_yaml_documents(stream)? {
            if document.is_null() {
                continue;
            }
            match Manifest::from_document(document) {
                Some(manifest) => set.insert(manifest),
                None => debug!("skipping rendered document without kind or metadata.name"),
            }
        }
        Ok(set)
    }

    /// Add a manifest, replacing any manifest with the same key
    pub fn insert(&mut self, manifest: Manifest) {
        let key = manifest.key();
        if self.manifests.contains_key(&key) {
            warn!(%key, "duplicate rendered resource, keeping the last one");
        }
        self.manifests.insert(key, manifest);
    }

    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.manifests.contains_key(key)
    }

    /// Keys in stream order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.manifests.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Manifest> {
        self.manifests.values()
    }

    pub fn get(&self, key: &str) -> Option<&Manifest> {
        self.manifests.get(key)
    }

    /// All manifests of one kind, as `Kind/Name` -> body
    pub fn resources_by_kind(&self, kind: &str) -> BTreeMap<&str, &ConfigTree> {
        self.manifests
            .iter()
            .filter(|(_, manifest)| manifest.kind == kind)
            .map(|(key, manifest)| (key.as_str(), &manifest.body))
            .collect()
    }

    /// Nested field of one manifest; `None` if the manifest or any path
    /// segment is absent.
    pub fn dig<S: AsRef<str>>(&self, key: &str, path: &[S]) -> Option<&ConfigTree> {
        self.get(key)?.body.dig(path)
    }

    /// `metadata.labels` of one manifest
    pub fn labels(&self, key: &str) -> Option<Labels> {
        self.dig(key, &["metadata", "labels"]).map(labels_from_tree)
    }

    /// `spec.template.metadata.labels` of a workload
    pub fn pod_labels(&self, key: &str) -> Option<Labels> {
        self.dig(key, &["spec", "template", "metadata", "labels"])
            .map(labels_from_tree)
    }

    /// `projected.sources` of the named pod volume; empty when the
    /// workload, the volume or the projection is missing.
    pub fn projected_volume_sources(&self, key: &str, volume: &str) -> &[ConfigTree] {
        self.dig(key, &["spec", "template", "spec", "volumes"])
            .and_then(|volumes| volumes.as_sequence())
            .and_then(|volumes| {
                volumes
                    .iter()
                    .find(|v| v.get("name").and_then(|n| n.as_str()) == Some(volume))
            })
            .and_then(|v| v.dig(&["projected", "sources"]))
            .and_then(|sources| sources.as_sequence())
            .unwrap_or(&[])
    }

    /// Secrets projected into the named pod volume
    pub fn secret_mounts(&self, key: &str, volume: &str) -> Vec<SecretMount> {
        self.projected_volume_sources(key, volume)
            .iter()
            .filter_map(|source| {
                let name = source.dig(&["secret", "name"])?.as_str()?.to_string();
                let key = source
                    .dig(&["secret", "items", "0", "key"])
                    .and_then(|k| k.as_str())
                    .map(str::to_string);
                Some(SecretMount { name, key })
            })
            .collect()
    }
}
