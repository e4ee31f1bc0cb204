//! Ref-pinned repository trees.

use crate::credentials::CredentialSocket;
use crate::engine::{until_cancelled, Engine, FetchRequest};
use crate::error::{Error, Result, Stage};
use crate::trust::TrustStore;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// A fetched tree checked out at a single commit, with `.git` preserved.
///
/// The tree lives in a temporary directory that is removed on drop.
pub struct GitTree {
    dir: TempDir,
    commit: String,
}

impl GitTree {
    /// Wraps a checked-out directory.
    pub fn new(dir: TempDir, commit: impl Into<String>) -> Self {
        Self {
            dir,
            commit: commit.into(),
        }
    }

    /// Returns the tree's location on the host.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Returns the commit id the tree is pinned at.
    pub fn commit(&self) -> &str {
        &self.commit
    }
}

impl fmt::Debug for GitTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitTree")
            .field("path", &self.dir.path())
            .field("commit", &self.commit)
            .finish()
    }
}

/// Fetches repository trees through an [`Engine`].
pub struct GitTreeFetcher {
    engine: Arc<dyn Engine>,
    trust: TrustStore,
    socket: Option<CredentialSocket>,
}

impl GitTreeFetcher {
    /// Creates a fetcher.
    ///
    /// With a socket, fetches authenticate through the agent and verify the
    /// remote against `trust`. Without one they are anonymous and unpinned,
    /// which only works for public repositories.
    pub fn new(
        engine: Arc<dyn Engine>,
        trust: TrustStore,
        socket: Option<CredentialSocket>,
    ) -> Self {
        Self {
            engine,
            trust,
            socket,
        }
    }

    /// Fetches `repo` and pins it at `reference`.
    pub async fn fetch(
        &self,
        repo: &str,
        reference: &str,
        cancel: &CancellationToken,
    ) -> Result<GitTree> {
        if reference.is_empty() || reference.starts_with('-') {
            return Err(Error::fetch(repo, reference, "invalid ref"));
        }

        let request = FetchRequest {
            repo,
            reference,
            keep_git_dir: true,
            known_hosts: self.socket.as_ref().map(|_| &self.trust),
            auth_socket: self.socket.as_ref(),
        };

        info!(
            repo = %repo,
            reference = %reference,
            authenticated = self.socket.is_some(),
            "fetching tree"
        );
        let tree = until_cancelled(Stage::Fetching, cancel, self.engine.fetch_tree(&request))
            .await?;
        info!(repo = %repo, reference = %reference, commit = %tree.commit(), "fetched tree");

        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ExecOutput, ImageRef, ImageSpec};
    use crate::sandbox::Sandbox;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Seen {
        keep_git_dir: bool,
        known_hosts: Option<TrustStore>,
        auth_socket: Option<CredentialSocket>,
    }

    #[derive(Default)]
    struct RecordingEngine {
        seen: Mutex<Vec<Seen>>,
    }

    #[async_trait]
    impl Engine for RecordingEngine {
        async fn build_image(&self, _: &ImageSpec) -> Result<ImageRef> {
            Ok(ImageRef::new("unused"))
        }

        async fn fetch_tree(&self, request: &FetchRequest<'_>) -> Result<GitTree> {
            self.seen.lock().push(Seen {
                keep_git_dir: request.keep_git_dir,
                known_hosts: request.known_hosts.cloned(),
                auth_socket: request.auth_socket.cloned(),
            });
            if request.reference == "does-not-exist" {
                return Err(Error::fetch(request.repo, request.reference, "unknown ref"));
            }
            Ok(GitTree::new(TempDir::new()?, "abc123"))
        }

        async fn exec(&self, _: &Sandbox, _: &[String], _: Duration) -> Result<ExecOutput> {
            unreachable!("exec is not used by fetcher tests")
        }
    }

    #[tokio::test]
    async fn test_anonymous_fetch_is_unpinned() {
        let engine = Arc::new(RecordingEngine::default());
        let fetcher = GitTreeFetcher::new(engine.clone(), TrustStore::github(), None);

        let tree = fetcher
            .fetch("https://example.com/org/repo.git", "main", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(tree.commit(), "abc123");
        assert!(tree.path().is_dir());

        let seen = engine.seen.lock();
        assert_eq!(
            seen[0],
            Seen {
                keep_git_dir: true,
                known_hosts: None,
                auth_socket: None,
            }
        );
    }

    #[tokio::test]
    async fn test_authenticated_fetch_is_pinned() {
        let engine = Arc::new(RecordingEngine::default());
        let socket = CredentialSocket::new("/tmp/agent.sock");
        let fetcher =
            GitTreeFetcher::new(engine.clone(), TrustStore::github(), Some(socket.clone()));

        fetcher
            .fetch("git@github.com:org/repo.git", "v1.0.0", &CancellationToken::new())
            .await
            .unwrap();

        let seen = engine.seen.lock();
        assert_eq!(seen[0].known_hosts, Some(TrustStore::github()));
        assert_eq!(seen[0].auth_socket, Some(socket));
    }

    #[tokio::test]
    async fn test_unknown_ref() {
        let engine = Arc::new(RecordingEngine::default());
        let fetcher = GitTreeFetcher::new(engine, TrustStore::github(), None);

        let err = fetcher
            .fetch(
                "https://example.com/org/repo.git",
                "does-not-exist",
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fetch { .. }));
    }

    #[tokio::test]
    async fn test_option_like_ref_is_rejected() {
        let engine = Arc::new(RecordingEngine::default());
        let fetcher = GitTreeFetcher::new(engine.clone(), TrustStore::github(), None);

        let err = fetcher
            .fetch("https://example.com/org/repo.git", "--upload-pack=x", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fetch { .. }));
        assert!(engine.seen.lock().is_empty());
    }
}
