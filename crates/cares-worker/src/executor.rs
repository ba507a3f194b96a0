//! Container runtime adapter.
//!
//! Execution is a black box to the rest of the worker: give it an image
//! reference, get back combined output and a verdict. The production
//! adapter shells out to a container engine; tests substitute their own
//! implementation of the trait.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, WorkerError};

/// Outcome of one container run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    /// Combined stdout and stderr.
    pub output: String,
    /// Whether the container exited successfully.
    pub success: bool,
    /// Failure detail; empty on success.
    pub error: String,
}

impl RunOutput {
    /// Creates a successful run output.
    #[must_use]
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: true,
            error: String::new(),
        }
    }

    /// Creates a failed run output, keeping captured output.
    #[must_use]
    pub fn failed(output: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: false,
            error: error.into(),
        }
    }
}

/// Runs container images and captures their output.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Runs the image to completion and returns its combined output.
    ///
    /// A container that starts but exits non-zero is a successful call
    /// with `success = false`; `Err` means the runtime itself could not
    /// be driven.
    async fn run(&self, image: &str) -> Result<RunOutput>;
}

/// Container runtime that shells out to a local engine
/// (`docker run --rm <image>` by default).
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    binary: String,
}

impl DockerRuntime {
    /// Creates a runtime using the `docker` binary.
    #[must_use]
    pub fn new() -> Self {
        Self::with_binary("docker")
    }

    /// Creates a runtime using a custom engine binary (e.g. `podman`).
    #[must_use]
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn run(&self, image: &str) -> Result<RunOutput> {
        if image.is_empty() {
            return Err(WorkerError::Runtime("empty image reference".to_owned()));
        }

        debug!(binary = %self.binary, image = %image, "running container");

        let result = Command::new(&self.binary)
            .arg("run")
            .arg("--rm")
            .arg(image)
            .output()
            .await
            .map_err(|e| WorkerError::Runtime(format!("failed to spawn {}: {e}", self.binary)))?;

        let mut output = String::from_utf8_lossy(&result.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&result.stderr));

        if result.status.success() {
            Ok(RunOutput::ok(output))
        } else {
            Ok(RunOutput::failed(
                output,
                format!("container exited with {}", result.status),
            ))
        }
    }
}
