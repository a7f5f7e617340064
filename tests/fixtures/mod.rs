//! Test fixtures for the spamcheck values scenarios
//!
//! - `values/`: values fragments layered by the scenarios
//! - `rendered/`: captured `helm template` output for the label scenario

#![allow(dead_code)]

use chart_values::{ConfigTree, TemplateResult, ValuesLayer};
use std::fs;
use std::path::{Path, PathBuf};

/// Release name used when the fixtures were rendered
pub const RELEASE: &str = "test";

/// Resource kinds the spamcheck chart must produce when enabled
pub const REQUIRED_KINDS: &[&str] = &[
    "Deployment",
    "ConfigMap",
    "Ingress",
    "Service",
    "HorizontalPodAutoscaler",
    "PodDisruptionBudget",
];

pub fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Path to a values fragment
pub fn values_path(name: &str) -> PathBuf {
    fixtures_dir().join("values").join(format!("{}.yaml", name))
}

/// Load a values fragment as a layer
pub fn layer(name: &str) -> ValuesLayer {
    ValuesLayer::from_file(&values_path(name))
        .unwrap_or_else(|e| panic!("Failed to load values fixture {}: {}", name, e))
}

/// Load a values fragment as a bare tree
pub fn values(name: &str) -> ConfigTree {
    layer(name).tree
}

/// Captured render output, wrapped as a successful render
pub fn rendered(name: &str) -> TemplateResult {
    let path = fixtures_dir().join("rendered").join(format!("{}.yaml", name));
    let stdout = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
    TemplateResult::from_output(0, &stdout, "").expect("Failed to parse rendered fixture")
}

/// Captured stderr of a failed render
pub fn failed_render(exit_code: i32) -> TemplateResult {
    let stderr = fs::read_to_string(fixtures_dir().join("rendered/failed_render.txt"))
        .expect("Failed to read failed render fixture");
    TemplateResult::from_output(exit_code, "", stderr).expect("Failed to build failed render")
}

/// Resource key for a spamcheck resource of `kind`
pub fn spamcheck_key(kind: &str) -> String {
    format!("{}/{}-spamcheck", kind, RELEASE)
}
