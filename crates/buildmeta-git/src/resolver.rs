//! Commit-time resolution.
//!
//! The committer date is read by running git inside a sandbox seeded with
//! the fetched tree, so repository content never runs with the caller's
//! privileges. The command prints the date as RFC 3339 in UTC and the same
//! format is parsed back.

use crate::config::{ResolverConfig, SandboxConfig};
use crate::credentials::CredentialSocket;
use crate::engine::{until_cancelled, Engine};
use crate::error::{Error, Result, Stage};
use crate::sandbox::SandboxFactory;
use crate::tree::GitTreeFetcher;
use crate::trust::TrustStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Prints the committer date of `HEAD` as `YYYY-MM-DDTHH:MM:SSZ`.
///
/// `safe.directory` is needed because the mounted tree is owned by a
/// different uid than the sandbox user.
pub const COMMIT_TIME_SCRIPT: &str = "TZ=UTC0 git -c safe.directory='*' show -s \
     --date=format-local:%Y-%m-%dT%H:%M:%SZ --format=%cd HEAD";

/// Parses command output as an RFC 3339 timestamp normalized to UTC.
pub fn parse_commit_time(output: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(output.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|source| Error::Format {
            output: output.to_string(),
            source,
        })
}

/// Resolves the commit time of a repository ref.
///
/// Each call gets its own tree and sandbox; concurrent calls share nothing
/// but the engine and the trust store.
pub struct CommitTimeResolver {
    engine: Arc<dyn Engine>,
    fetcher: GitTreeFetcher,
    factory: SandboxFactory,
    config: ResolverConfig,
}

impl CommitTimeResolver {
    /// Creates a resolver with default sandbox and resolver configuration.
    pub fn new(
        engine: Arc<dyn Engine>,
        trust: TrustStore,
        socket: Option<CredentialSocket>,
    ) -> Self {
        Self {
            fetcher: GitTreeFetcher::new(engine.clone(), trust.clone(), socket.clone()),
            factory: SandboxFactory::new(engine.clone(), trust, socket),
            engine,
            config: ResolverConfig::default(),
        }
    }

    /// Creates a resolver pinned to GitHub that forwards `SSH_AUTH_SOCK`
    /// when it is set.
    pub fn from_env(engine: Arc<dyn Engine>) -> Self {
        Self::new(engine, TrustStore::github(), CredentialSocket::from_env())
    }

    /// Replaces the sandbox configuration.
    pub fn with_sandbox_config(mut self, config: SandboxConfig) -> Self {
        self.factory = self.factory.with_config(config);
        self
    }

    /// Replaces the resolver configuration.
    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the committer date of `reference` in `repo`.
    pub async fn commit_time(
        &self,
        repo: &str,
        reference: &str,
        cancel: &CancellationToken,
    ) -> Result<DateTime<Utc>> {
        let tree = self.fetcher.fetch(repo, reference, cancel).await?;

        let sandbox = self.factory.build_container(cancel).await?;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled {
                stage: Stage::Mounting,
            });
        }
        let sandbox = sandbox
            .with_mounted_tree(self.config.workdir.clone(), &tree)
            .with_workdir(self.config.workdir.clone());

        let argv = vec![
            "/bin/sh".to_string(),
            "-ec".to_string(),
            COMMIT_TIME_SCRIPT.to_string(),
        ];
        debug!(commit = %tree.commit(), "reading committer date");
        let output = until_cancelled(
            Stage::Executing,
            cancel,
            self.engine.exec(&sandbox, &argv, self.config.exec_timeout()),
        )
        .await?;

        if !output.success() {
            return Err(Error::Execution {
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        if output.stdout.trim().is_empty() {
            return Err(Error::Execution {
                exit_code: output.exit_code,
                stderr: "command produced no output".to_string(),
            });
        }

        let time = parse_commit_time(&output.stdout)?;
        info!(
            repo = %repo,
            reference = %reference,
            commit = %tree.commit(),
            time = %time.to_rfc3339(),
            "resolved commit time"
        );
        Ok(time)
    }
}
