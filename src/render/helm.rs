//! `helm template` renderer
//!
//! Runs `<helm_bin> template <release> <chart_dir> --namespace <ns> --values -`
//! with the composed values on stdin. Stdin is fed and stdout and stderr
//! are drained on their own threads; the child is polled until it exits or
//! the timeout elapses, at which point it is killed.

use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use values_tree::{to_yaml_string, ConfigTree};

use super::{RenderError, Renderer, TemplateResult};

/// Poll interval while waiting for the child
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Exit code reported when the child was killed by a signal
const SIGNAL_EXIT_CODE: i32 = -1;

/// How to invoke helm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelmSettings {
    /// helm executable (default: "helm")
    pub helm_bin: String,

    /// Chart directory (default: ".")
    pub chart_dir: PathBuf,

    /// Release name (default: "test")
    pub release: String,

    /// Namespace (default: "default")
    pub namespace: String,

    /// Wall-clock limit for one render (default: 120)
    pub timeout_seconds: u64,

    /// Appended after the standard arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

/// Renderer backed by the helm CLI
#[derive(Debug, Clone)]
pub struct HelmRenderer {
    settings: HelmSettings,
}

impl HelmRenderer {
    pub fn new(settings: HelmSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &HelmSettings {
        &self.settings
    }

    /// Arguments passed after the helm executable
    pub fn arguments(&self) -> Vec<String> {
        let mut args = vec![
            "template".to_string(),
            self.settings.release.clone(),
            self.settings.chart_dir.display().to_string(),
            "--namespace".to_string(),
            self.settings.namespace.clone(),
            "--values".to_string(),
            "-".to_string(),
        ];
        args.extend(self.settings.extra_args.iter().cloned());
        args
    }
}

impl Renderer for HelmRenderer {
    fn render(&self, values: &ConfigTree) -> Result<TemplateResult, RenderError> {
        let values_yaml = to_yaml_string(values).map_err(RenderError::Values)?;
        let program = self.settings.helm_bin.clone();
        let args = self.arguments();

        info!(%program, ?args, "rendering chart");

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RenderError::Spawn {
                program: program.clone(),
                source,
            })?;

        let stdin_handle = spawn_writer(child.stdin.take(), values_yaml.into_bytes());
        let stdout_handle = spawn_reader(child.stdout.take());
        let stderr_handle = spawn_reader(child.stderr.take());

        let timeout = Duration::from_secs(self.settings.timeout_seconds);
        let started = Instant::now();
        let status = loop {
            match child.try_wait()? {
                Some(status) => break status,
                None if started.elapsed() >= timeout => {
                    warn!(
                        seconds = self.settings.timeout_seconds,
                        "render timed out, killing renderer"
                    );
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(RenderError::Timeout {
                        seconds: self.settings.timeout_seconds,
                    });
                }
                None => thread::sleep(POLL_INTERVAL),
            }
        };

        join_writer(stdin_handle)?;
        let stdout = join_reader(stdout_handle)?;
        let stderr = join_reader(stderr_handle)?;

        let exit_code = status.code().unwrap_or(SIGNAL_EXIT_CODE);
        info!(
            exit_code,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "renderer finished"
        );
        if exit_code != 0 {
            debug!(stderr = %stderr.trim_end(), "renderer failed");
        }

        TemplateResult::from_output(exit_code, &stdout, stderr)
    }
}

/// Feed the values on a thread so a child that never reads stdin cannot
/// hold the caller past the deadline.
fn spawn_writer<W>(pipe: Option<W>, input: Vec<u8>) -> JoinHandle<io::Result<()>>
where
    W: Write + Send + 'static,
{
    thread::spawn(move || {
        let Some(mut pipe) = pipe else {
            return Ok(());
        };
        match pipe.write_all(&input) {
            Ok(()) => Ok(()),
            // The child exited without reading; its exit code says why
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                debug!("renderer closed stdin early");
                Ok(())
            }
            Err(e) => Err(e),
        }
    })
}

fn join_writer(handle: JoinHandle<io::Result<()>>) -> Result<(), RenderError> {
    handle.join().map_err(|_| RenderError::PipeThreadPanicked)??;
    Ok(())
}

fn spawn_reader<R>(pipe: Option<R>) -> JoinHandle<io::Result<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn join_reader(handle: JoinHandle<io::Result<Vec<u8>>>) -> Result<String, RenderError> {
    let bytes = handle.join().map_err(|_| RenderError::PipeThreadPanicked)??;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(helm_bin: &str) -> HelmSettings {
        HelmSettings {
            helm_bin: helm_bin.to_string(),
            chart_dir: PathBuf::from("."),
            release: "test".to_string(),
            namespace: "default".to_string(),
            timeout_seconds: 30,
            extra_args: vec!["--set".to_string(), "certmanager-issuer.email=test@example.com".to_string()],
        }
    }

    #[test]
    fn test_arguments() {
        let renderer = HelmRenderer::new(settings("helm"));

        assert_eq!(
            renderer.arguments(),
            vec![
                "template",
                "test",
                ".",
                "--namespace",
                "default",
                "--values",
                "-",
                "--set",
                "certmanager-issuer.email=test@example.com",
            ]
        );
    }

    #[test]
    fn test_missing_binary_is_spawn_error() {
        let renderer = HelmRenderer::new(settings("/nonexistent/bin/helm"));
        let err = renderer.render(&ConfigTree::empty_mapping()).unwrap_err();

        assert!(matches!(err, RenderError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_captured() {
        // cat rejects the helm flags and exits non-zero
        let renderer = HelmRenderer::new(settings("cat"));
        let result = renderer.render(&ConfigTree::empty_mapping()).unwrap();

        assert_ne!(result.exit_code(), 0);
        assert!(!result.stderr().is_empty());
        assert!(result.manifests().is_empty());
    }

    /// Stand-in helm that never reads stdin and never exits on its own
    #[cfg(unix)]
    fn stalled_helm(dir: &std::path::Path) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("helm");
        std::fs::write(&path, "#!/bin/sh\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    #[cfg(unix)]
    #[test]
    fn test_stalled_child_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings(&stalled_helm(dir.path()));
        settings.timeout_seconds = 1;

        let started = Instant::now();
        let err = HelmRenderer::new(settings)
            .render(&ConfigTree::empty_mapping())
            .unwrap_err();

        assert!(matches!(err, RenderError::Timeout { seconds: 1 }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_covers_unread_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings(&stalled_helm(dir.path()));
        settings.timeout_seconds = 1;

        // Well past the pipe buffer, so writing blocks until the child dies
        let mut values = crate::Mapping::new();
        values.insert("blob".to_string(), ConfigTree::from("x".repeat(1024 * 1024)));

        let started = Instant::now();
        let err = HelmRenderer::new(settings)
            .render(&ConfigTree::Mapping(values))
            .unwrap_err();

        assert!(matches!(err, RenderError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
