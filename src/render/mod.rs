//! Template rendering
//!
//! Rendering is delegated to an external templating tool behind the
//! [`Renderer`] trait. A render either produces a [`TemplateResult`] (which
//! may still carry a non-zero exit code) or fails to run at all with a
//! [`RenderError`].

mod helm;
mod manifest;

pub use helm::{HelmRenderer, HelmSettings};
pub use manifest::{Manifest, ManifestSet, SecretMount};

use values_tree::{ConfigTree, TreeError};

/// Renders a composed values tree into manifests
pub trait Renderer {
    fn render(&self, values: &ConfigTree) -> Result<TemplateResult, RenderError>;
}

/// Outcome of one render
///
/// Callers check [`TemplateResult::exit_code`] before trusting the
/// manifests: a failed render carries no manifests.
#[derive(Debug, Clone)]
pub struct TemplateResult {
    exit_code: i32,
    stderr: String,
    manifests: ManifestSet,
}

impl TemplateResult {
    /// Build from captured process output.
    ///
    /// Stdout is only parsed when `exit_code` is zero.
    pub fn from_output(
        exit_code: i32,
        stdout: &str,
        stderr: impl Into<String>,
    ) -> Result<Self, RenderError> {
        let manifests = if exit_code == 0 {
            ManifestSet::parse(stdout).map_err(RenderError::InvalidOutput)?
        } else {
            ManifestSet::new()
        };

        Ok(Self {
            exit_code,
            stderr: stderr.into(),
            manifests,
        })
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn manifests(&self) -> &ManifestSet {
        &self.manifests
    }

    pub fn into_manifests(self) -> ManifestSet {
        self.manifests
    }
}

/// Rendering errors
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error while rendering: {0}")]
    Io(#[from] std::io::Error),

    #[error("render timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("failed to serialize values: {0}")]
    Values(#[source] TreeError),

    #[error("renderer produced invalid output: {0}")]
    InvalidOutput(#[source] TreeError),

    #[error("renderer pipe thread panicked")]
    PipeThreadPanicked,
}
