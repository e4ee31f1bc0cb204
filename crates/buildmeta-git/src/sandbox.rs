//! Sandbox construction and credential projection.

use crate::config::SandboxConfig;
use crate::credentials::{CredentialSocket, SSH_AUTH_SOCK};
use crate::engine::{until_cancelled, Engine, ImageRef, ImageSpec};
use crate::error::{Result, Stage};
use crate::tree::GitTree;
use crate::trust::TrustStore;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Mode of the `known_hosts` file: owner read/write only.
pub const KNOWN_HOSTS_MODE: u32 = 0o600;

/// A host unix socket exposed inside the sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketMount {
    /// Socket path on the host.
    pub host_path: PathBuf,
    /// Socket path inside the sandbox.
    pub sandbox_path: String,
}

/// A file created inside the sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxFile {
    /// Absolute path inside the sandbox.
    pub path: String,
    /// File contents.
    pub contents: String,
    /// Unix permission bits.
    pub mode: u32,
}

/// A host directory mounted into the sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryMount {
    /// Directory on the host.
    pub host_path: PathBuf,
    /// Mount point inside the sandbox.
    pub sandbox_path: String,
}

/// Declarative description of an isolated execution environment.
///
/// A sandbox is owned by the invocation that built it and is discarded
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sandbox {
    image: ImageRef,
    sockets: Vec<SocketMount>,
    env: BTreeMap<String, String>,
    files: Vec<SandboxFile>,
    mounts: Vec<DirectoryMount>,
    workdir: Option<String>,
}

impl Sandbox {
    /// Creates an empty sandbox on top of a built image.
    pub fn new(image: ImageRef) -> Self {
        Self {
            image,
            sockets: Vec::new(),
            env: BTreeMap::new(),
            files: Vec::new(),
            mounts: Vec::new(),
            workdir: None,
        }
    }

    /// Exposes a host unix socket at `sandbox_path`.
    pub fn with_unix_socket(mut self, sandbox_path: impl Into<String>, host_path: &Path) -> Self {
        self.sockets.push(SocketMount {
            host_path: host_path.to_path_buf(),
            sandbox_path: sandbox_path.into(),
        });
        self
    }

    /// Sets an environment variable.
    pub fn with_env_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    /// Creates a file with the given contents and permissions.
    pub fn with_new_file(
        mut self,
        path: impl Into<String>,
        contents: impl Into<String>,
        mode: u32,
    ) -> Self {
        self.files.push(SandboxFile {
            path: path.into(),
            contents: contents.into(),
            mode,
        });
        self
    }

    /// Mounts a fetched tree at `sandbox_path`.
    ///
    /// The tree must outlive every command run in this sandbox.
    pub fn with_mounted_tree(mut self, sandbox_path: impl Into<String>, tree: &GitTree) -> Self {
        self.mounts.push(DirectoryMount {
            host_path: tree.path().to_path_buf(),
            sandbox_path: sandbox_path.into(),
        });
        self
    }

    /// Sets the working directory for commands.
    pub fn with_workdir(mut self, workdir: impl Into<String>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    /// Returns the image the sandbox runs.
    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    /// Returns the forwarded sockets.
    pub fn sockets(&self) -> &[SocketMount] {
        &self.sockets
    }

    /// Returns the environment variables.
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Returns the files created in the sandbox.
    pub fn files(&self) -> &[SandboxFile] {
        &self.files
    }

    /// Returns a created file by sandbox path.
    pub fn file(&self, path: &str) -> Option<&SandboxFile> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Returns the mounted directories.
    pub fn mounts(&self) -> &[DirectoryMount] {
        &self.mounts
    }

    /// Returns the working directory.
    pub fn workdir(&self) -> Option<&str> {
        self.workdir.as_deref()
    }
}

/// Builds sandboxes with git and an SSH client installed.
pub struct SandboxFactory {
    engine: Arc<dyn Engine>,
    config: SandboxConfig,
    trust: TrustStore,
    socket: Option<CredentialSocket>,
}

impl SandboxFactory {
    /// Creates a factory.
    ///
    /// When `socket` is set, every sandbox gets the socket, `SSH_AUTH_SOCK`
    /// and a `known_hosts` file built from `trust`.
    pub fn new(
        engine: Arc<dyn Engine>,
        trust: TrustStore,
        socket: Option<CredentialSocket>,
    ) -> Self {
        Self {
            engine,
            config: SandboxConfig::default(),
            trust,
            socket,
        }
    }

    /// Replaces the sandbox configuration.
    pub fn with_config(mut self, config: SandboxConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the sandbox configuration.
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Builds a fresh sandbox.
    pub async fn build_container(&self, cancel: &CancellationToken) -> Result<Sandbox> {
        let spec = ImageSpec {
            base_image: self.config.base_image.clone(),
            setup: vec![self.config.install_command()],
        };

        info!(base_image = %spec.base_image, "building sandbox image");
        let image = until_cancelled(Stage::Sandboxing, cancel, self.engine.build_image(&spec))
            .await?;
        debug!(%image, "sandbox image ready");

        Ok(self.project_credentials(Sandbox::new(image)))
    }

    fn project_credentials(&self, sandbox: Sandbox) -> Sandbox {
        let Some(socket) = &self.socket else {
            debug!("no SSH agent configured, building sandbox without credentials");
            return sandbox;
        };

        let path = socket.env_value();
        debug!(socket = %path, "projecting SSH agent into sandbox");
        sandbox
            .with_unix_socket(path.clone(), socket.path())
            .with_env_variable(SSH_AUTH_SOCK, path)
            .with_new_file(
                self.config.known_hosts_path.clone(),
                self.trust.contents(),
                KNOWN_HOSTS_MODE,
            )
    }
}
