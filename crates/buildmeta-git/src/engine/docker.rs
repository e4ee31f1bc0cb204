//! Docker-backed engine.
//!
//! Images are built and commands run with the `docker` CLI. Trees are
//! fetched with the host `git` CLI into temporary directories which are then
//! bind-mounted into containers.

use super::{Engine, ExecOutput, FetchRequest, ImageRef, ImageSpec};
use crate::credentials::SSH_AUTH_SOCK;
use crate::error::{Error, Result};
use crate::sandbox::Sandbox;
use crate::tree::GitTree;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Repository name used for built sandbox images.
const IMAGE_REPOSITORY: &str = "buildmeta-sandbox";

/// Engine driving the local Docker daemon.
#[derive(Debug, Clone)]
pub struct DockerEngine {
    docker: PathBuf,
    git: PathBuf,
}

impl Default for DockerEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerEngine {
    /// Creates an engine using `docker` and `git` from `PATH`.
    pub fn new() -> Self {
        Self {
            docker: PathBuf::from("docker"),
            git: PathBuf::from("git"),
        }
    }

    /// Overrides the `docker` binary.
    pub fn with_docker(mut self, docker: impl Into<PathBuf>) -> Self {
        self.docker = docker.into();
        self
    }

    /// Overrides the `git` binary.
    pub fn with_git(mut self, git: impl Into<PathBuf>) -> Self {
        self.git = git.into();
        self
    }

    async fn git(
        &self,
        args: &[&str],
        cwd: &Path,
        env: &[(&str, String)],
    ) -> std::io::Result<Output> {
        debug!(?args, "running git");
        Command::new(&self.git)
            .args(args)
            .current_dir(cwd)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env_remove(SSH_AUTH_SOCK)
            .envs(env.iter().map(|(k, v)| (*k, v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
    }

    async fn resolve_commit(
        &self,
        dir: &Path,
        reference: &str,
    ) -> std::io::Result<Option<String>> {
        let candidates = [
            format!("{reference}^{{commit}}"),
            format!("refs/remotes/origin/{reference}^{{commit}}"),
            format!("refs/tags/{reference}^{{commit}}"),
        ];
        for candidate in &candidates {
            let output = self
                .git(&["rev-parse", "--verify", "--quiet", candidate.as_str()], dir, &[])
                .await?;
            if output.status.success() {
                let commit = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !commit.is_empty() {
                    return Ok(Some(commit));
                }
            }
        }
        Ok(None)
    }
}

/// Renders an image recipe as a Dockerfile.
fn dockerfile(spec: &ImageSpec) -> String {
    let mut out = format!("FROM {}\n", spec.base_image);
    for step in &spec.setup {
        // JSON array form runs without a shell.
        let argv = serde_json::to_string(step).unwrap_or_default();
        out.push_str(&format!("RUN {argv}\n"));
    }
    out
}

/// Content-addressed tag for an image recipe.
fn image_tag(recipe: &str) -> String {
    let digest = hex::encode(Sha256::digest(recipe.as_bytes()));
    format!("{IMAGE_REPOSITORY}:{}", &digest[..16])
}

/// Builds `GIT_SSH_COMMAND` for a host fetch.
///
/// ssh never prompts. With `known_hosts` only those keys are accepted, and
/// without an agent no identity is offered.
fn ssh_command(known_hosts: Option<&Path>, authenticated: bool) -> String {
    let mut cmd = String::from("ssh -o BatchMode=yes");
    if let Some(path) = known_hosts {
        cmd.push_str(" -o StrictHostKeyChecking=yes -o GlobalKnownHostsFile=/dev/null");
        cmd.push_str(&format!(" -o UserKnownHostsFile={}", path.display()));
    }
    if !authenticated {
        cmd.push_str(" -o IdentitiesOnly=yes -o IdentityFile=none -o IdentityAgent=none");
    }
    cmd
}

/// Writes `contents` to `path` with `mode` permissions.
fn write_with_mode(path: &Path, contents: &str, mode: u32) -> std::io::Result<()> {
    std::fs::write(path, contents)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Builds the `docker run` argument list for a sandbox.
fn run_args(sandbox: &Sandbox, name: &str, staging: &Path) -> std::io::Result<Vec<String>> {
    let mut args = vec![
        "run".to_string(),
        "--rm".to_string(),
        "--name".to_string(),
        name.to_string(),
    ];

    for socket in sandbox.sockets() {
        args.push("--volume".to_string());
        args.push(format!(
            "{}:{}",
            socket.host_path.display(),
            socket.sandbox_path
        ));
    }
    for (i, file) in sandbox.files().iter().enumerate() {
        let host = staging.join(format!("file-{i}"));
        write_with_mode(&host, &file.contents, file.mode)?;
        args.push("--volume".to_string());
        args.push(format!("{}:{}:ro", host.display(), file.path));
    }
    for mount in sandbox.mounts() {
        args.push("--volume".to_string());
        args.push(format!("{}:{}", mount.host_path.display(), mount.sandbox_path));
    }
    for (key, value) in sandbox.env() {
        args.push("--env".to_string());
        args.push(format!("{key}={value}"));
    }
    if let Some(workdir) = sandbox.workdir() {
        args.push("--workdir".to_string());
        args.push(workdir.to_string());
    }
    args.push(sandbox.image().as_str().to_string());
    Ok(args)
}

/// Force-removes a named container unless disarmed.
///
/// Dropping the `docker run` client does not stop the container, so an
/// aborted exec cleans up here.
struct ContainerGuard<'a> {
    docker: &'a Path,
    name: String,
    armed: bool,
}

impl Drop for ContainerGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let spawned = std::process::Command::new(self.docker)
            .args(["rm", "--force", self.name.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            // Drop cannot await, so the child is reaped on its own thread.
            Ok(mut child) => {
                std::thread::spawn(move || child.wait());
            }
            Err(e) => warn!(container = %self.name, "failed to remove container: {}", e),
        }
    }
}

#[async_trait]
impl Engine for DockerEngine {
    async fn build_image(&self, spec: &ImageSpec) -> Result<ImageRef> {
        let recipe = dockerfile(spec);
        let tag = image_tag(&recipe);
        debug!(%tag, "building image");

        let mut child = Command::new(&self.docker)
            .args(["build", "--quiet", "--tag", tag.as_str(), "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Environment(format!("failed to run docker: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(recipe.as_bytes())
                .await
                .map_err(|e| Error::Environment(format!("failed to send Dockerfile: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::Environment(e.to_string()))?;
        if !output.status.success() {
            return Err(Error::Environment(format!(
                "image build failed: {}",
                lossy(&output.stderr).trim()
            )));
        }

        Ok(ImageRef::new(tag))
    }

    async fn fetch_tree(&self, request: &FetchRequest<'_>) -> Result<GitTree> {
        let fail = |message: String| Error::fetch(request.repo, request.reference, message);

        let dir = TempDir::new()
            .map_err(|e| fail(format!("failed to create checkout directory: {e}")))?;
        let mut env = Vec::new();
        if let Some(socket) = request.auth_socket {
            env.push((SSH_AUTH_SOCK, socket.env_value()));
        }

        // Kept alive until the clone finishes.
        let mut ssh_dir = None;
        let mut known_hosts = None;
        if let Some(trust) = request.known_hosts {
            let tmp = TempDir::new()
                .map_err(|e| fail(format!("failed to create ssh directory: {e}")))?;
            let path = tmp.path().join("known_hosts");
            write_with_mode(&path, trust.contents(), crate::sandbox::KNOWN_HOSTS_MODE)
                .map_err(|e| fail(format!("failed to write known_hosts: {e}")))?;
            known_hosts = Some(path);
            ssh_dir = Some(tmp);
        }
        env.push((
            "GIT_SSH_COMMAND",
            ssh_command(known_hosts.as_deref(), request.auth_socket.is_some()),
        ));

        let target = dir.path().to_string_lossy().into_owned();
        let output = self
            .git(
                &["clone", "--quiet", "--no-checkout", "--", request.repo, target.as_str()],
                dir.path(),
                &env,
            )
            .await
            .map_err(|e| fail(format!("failed to run git: {e}")))?;
        if !output.status.success() {
            return Err(fail(lossy(&output.stderr).trim().to_string()));
        }
        drop(ssh_dir);

        let commit = self
            .resolve_commit(dir.path(), request.reference)
            .await
            .map_err(|e| fail(format!("failed to run git: {e}")))?
            .ok_or_else(|| fail("unknown ref".to_string()))?;

        let output = self
            .git(
                &[
                    "-c",
                    "advice.detachedHead=false",
                    "checkout",
                    "--quiet",
                    "--detach",
                    commit.as_str(),
                ],
                dir.path(),
                &[],
            )
            .await
            .map_err(|e| fail(format!("failed to run git: {e}")))?;
        if !output.status.success() {
            return Err(fail(lossy(&output.stderr).trim().to_string()));
        }

        if !request.keep_git_dir {
            std::fs::remove_dir_all(dir.path().join(".git"))
                .map_err(|e| fail(format!("failed to remove .git: {e}")))?;
        }

        Ok(GitTree::new(dir, commit))
    }

    async fn exec(
        &self,
        sandbox: &Sandbox,
        argv: &[String],
        timeout: Duration,
    ) -> Result<ExecOutput> {
        let staging = TempDir::new()?;
        let name = format!("buildmeta-{}", uuid::Uuid::new_v4());
        let mut args = run_args(sandbox, &name, staging.path())?;
        args.extend(argv.iter().cloned());
        debug!(container = %name, ?argv, "running in sandbox");

        let child = Command::new(&self.docker)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Environment(format!("failed to run docker: {e}")))?;
        let mut guard = ContainerGuard {
            docker: &self.docker,
            name,
            armed: true,
        };

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(Error::Execution {
                    exit_code: None,
                    stderr: format!("timed out after {}s", timeout.as_secs()),
                })
            }
        };
        guard.armed = false;

        Ok(ExecOutput {
            exit_code: output.status.code(),
            stdout: lossy(&output.stdout),
            stderr: lossy(&output.stderr),
        })
    }
}
