//! # Buildmeta Git
//!
//! Sandboxed git retrieval and commit-time resolution for reproducible
//! package builds.
//!
//! Given a repository URL and a ref, the resolver fetches the tree (full
//! history, pinned at one commit), builds a minimal sandbox with git and an
//! SSH client, mounts the tree into it and reads the committer date there.
//! When an SSH agent is available it is forwarded into the sandbox together
//! with a pinned `known_hosts` file.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use buildmeta_git::{CommitTimeResolver, DockerEngine};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> buildmeta_git::Result<()> {
//! let resolver = CommitTimeResolver::from_env(Arc::new(DockerEngine::new()));
//! let time = resolver
//!     .commit_time(
//!         "https://github.com/tailscale/tailscale.git",
//!         "v1.60.0",
//!         &CancellationToken::new(),
//!     )
//!     .await?;
//! println!("{}", time.to_rfc3339());
//! # Ok(())
//! # }
//! ```
//!
//! ## Pipeline
//!
//! ```text
//! fetch tree ──► build sandbox ──► mount at /build/src ──► git show ──► parse
//!  (Fetch)        (Environment)                           (Execution)  (Format)
//! ```
//!
//! Every stage can be aborted through the caller's [`CancellationToken`].
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod config;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod resolver;
pub mod sandbox;
pub mod tree;
pub mod trust;

// Re-export main types
pub use config::{ResolverConfig, SandboxConfig};
pub use credentials::{CredentialSocket, SSH_AUTH_SOCK};
pub use engine::{DockerEngine, Engine, ExecOutput, FetchRequest, ImageRef, ImageSpec};
pub use error::{Error, Result, Stage};
pub use resolver::{parse_commit_time, CommitTimeResolver, COMMIT_TIME_SCRIPT};
pub use sandbox::{DirectoryMount, Sandbox, SandboxFactory, SandboxFile, SocketMount};
pub use tree::{GitTree, GitTreeFetcher};
pub use trust::{KnownHost, TrustStore, GITHUB_KNOWN_HOSTS};

/// Version of the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
