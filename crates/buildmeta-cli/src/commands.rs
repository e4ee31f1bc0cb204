//! CLI command implementations.

use anyhow::{Context, Result};
use buildmeta_git::{
    CommitTimeResolver, CredentialSocket, DockerEngine, ResolverConfig, SandboxConfig, TrustStore,
};
use buildmeta_types::ArtifactSpec;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Overrides for the `commit-time` command.
#[derive(Debug, Default)]
pub struct CommitTimeOptions {
    pub base_image: Option<String>,
    pub timeout: Option<u64>,
    pub forward_agent: bool,
}

impl CommitTimeOptions {
    fn sandbox_config(&self) -> SandboxConfig {
        let mut config = SandboxConfig::default();
        if let Some(image) = &self.base_image {
            config.base_image.clone_from(image);
        }
        config
    }

    fn resolver_config(&self) -> ResolverConfig {
        let mut config = ResolverConfig::default();
        if let Some(secs) = self.timeout {
            config.exec_timeout_secs = secs;
        }
        config
    }
}

/// Resolve and print the commit time of a ref.
pub async fn commit_time(repo: &str, reference: &str, options: CommitTimeOptions) -> Result<()> {
    let socket = if options.forward_agent {
        CredentialSocket::from_env()
    } else {
        None
    };
    tracing::info!(
        repo = %repo,
        reference = %reference,
        agent = socket.is_some(),
        "Resolving commit time"
    );

    let engine = Arc::new(DockerEngine::new());
    let resolver = CommitTimeResolver::new(engine, TrustStore::github(), socket)
        .with_sandbox_config(options.sandbox_config())
        .with_config(options.resolver_config());

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let time = resolver
        .commit_time(repo, reference, &cancel)
        .await
        .with_context(|| format!("resolving commit time of {repo} at {reference}"))?;

    println!("{}", time.format("%Y-%m-%dT%H:%M:%SZ"));
    Ok(())
}

/// Print the OS family of an artifact spec file.
pub fn os(path: &str) -> Result<()> {
    let os = read_spec(Path::new(path))?.os();
    println!("{os}");
    Ok(())
}

fn read_spec(path: &Path) -> Result<ArtifactSpec> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}
