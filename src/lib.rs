//! chart-values - layered Helm chart values
//!
//! Composes chart values from ordered layers with a right-biased deep
//! merge, resolves the labels a chart stamps on its resources, and renders
//! the chart through `helm template` into manifests that can be queried by
//! `Kind/Name`.

pub mod config;
pub mod labels;
pub mod layers;
pub mod logging;
pub mod render;

pub use config::{EffectiveConfig, REPO_CONFIG_FILE};
pub use labels::{LabelError, LabelResolver, LabelScope, Labels};
pub use layers::{LayerError, LayerOrigin, LayerStack, ValuesLayer};
pub use render::{
    HelmRenderer, HelmSettings, Manifest, ManifestSet, RenderError, Renderer, SecretMount,
    TemplateResult,
};
pub use values_tree::{
    compose_layers, deep_merge, from_yaml_str, to_yaml_string, ConfigTree, Mapping, Scalar,
    TreeError,
};
