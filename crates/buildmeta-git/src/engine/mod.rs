//! Execution engine boundary.
//!
//! An [`Engine`] builds sandbox images, resolves repositories to trees and
//! runs commands inside sandboxes. The crate never does any of this itself;
//! it only composes requests. [`DockerEngine`] is the bundled implementation.

mod docker;

pub use docker::DockerEngine;

use crate::credentials::CredentialSocket;
use crate::error::{Error, Result, Stage};
use crate::sandbox::Sandbox;
use crate::tree::GitTree;
use crate::trust::TrustStore;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Recipe for a sandbox image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSpec {
    /// Base image reference.
    pub base_image: String,
    /// Commands run in order on top of the base image.
    pub setup: Vec<Vec<String>>,
}

/// Reference to an image built by an engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef(String);

impl ImageRef {
    /// Creates an image reference.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Returns the reference string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Request to resolve a repository and ref to a tree.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    /// Repository URL.
    pub repo: &'a str,
    /// Branch, tag or commit id.
    pub reference: &'a str,
    /// Keep the `.git` directory in the resulting tree.
    pub keep_git_dir: bool,
    /// Host keys to verify the remote against. `None` leaves SSH unpinned.
    pub known_hosts: Option<&'a TrustStore>,
    /// Agent socket used for SSH authentication.
    pub auth_socket: Option<&'a CredentialSocket>,
}

/// Captured result of a command run inside a sandbox.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl ExecOutput {
    /// Returns true if the command exited with status zero.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Container engine capabilities consumed by this crate.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Builds (or reuses) an image from a recipe.
    ///
    /// Failures are reported as [`Error::Environment`].
    async fn build_image(&self, spec: &ImageSpec) -> Result<ImageRef>;

    /// Resolves a repository and ref to a tree pinned at one commit.
    ///
    /// Failures are reported as [`Error::Fetch`]. No partial tree is
    /// returned on error.
    async fn fetch_tree(&self, request: &FetchRequest<'_>) -> Result<GitTree>;

    /// Runs `argv` inside the sandbox and captures its output.
    ///
    /// A non-zero exit is not an error at this level; it is reported in the
    /// returned [`ExecOutput`]. Exceeding `timeout` is [`Error::Execution`].
    async fn exec(
        &self,
        sandbox: &Sandbox,
        argv: &[String],
        timeout: Duration,
    ) -> Result<ExecOutput>;
}

/// Runs `fut` unless the caller cancels first.
pub(crate) async fn until_cancelled<T, F>(
    stage: Stage,
    cancel: &CancellationToken,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::warn!(%stage, "cancelled");
            Err(Error::Cancelled { stage })
        }
        result = fut => result,
    }
}
