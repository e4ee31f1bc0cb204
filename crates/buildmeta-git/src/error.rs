//! Error types for commit-time resolution.

use std::fmt;
use thiserror::Error;

/// Stage of the commit-time pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Fetching the repository tree.
    Fetching,
    /// Building the sandbox container.
    Sandboxing,
    /// Mounting the tree into the sandbox.
    Mounting,
    /// Running the extraction command.
    Executing,
    /// Parsing the command output.
    Parsing,
}

impl Stage {
    /// Returns the stage name used in logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Sandboxing => "sandboxing",
            Self::Mounting => "mounting",
            Self::Executing => "executing",
            Self::Parsing => "parsing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while fetching trees and resolving commit times.
#[derive(Debug, Error)]
pub enum Error {
    /// The sandbox image could not be built or its tools installed.
    #[error("environment error: {0}")]
    Environment(String),

    /// The repository or ref could not be fetched.
    #[error("fetch of {repo} at {reference} failed: {message}")]
    Fetch {
        /// Repository URL.
        repo: String,
        /// Requested ref.
        reference: String,
        /// Underlying cause.
        message: String,
    },

    /// The command inside the sandbox failed.
    #[error("command failed (exit code {}): {stderr}", exit_code_label(.exit_code))]
    Execution {
        /// Exit code, if the process exited normally.
        exit_code: Option<i32>,
        /// Captured standard error, or a description of the failure.
        stderr: String,
    },

    /// The command output was not a valid RFC 3339 timestamp.
    #[error("unexpected timestamp format {output:?}: {source}")]
    Format {
        /// Raw captured output.
        output: String,
        /// Parser error.
        #[source]
        source: chrono::ParseError,
    },

    /// The caller cancelled the operation.
    #[error("cancelled while {stage}")]
    Cancelled {
        /// Stage that was running when cancellation was observed.
        stage: Stage,
    },

    /// Local I/O error while staging sandbox inputs.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_code_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

/// Result type for commit-time operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the pipeline stage this error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Environment(_) => Stage::Sandboxing,
            Self::Fetch { .. } => Stage::Fetching,
            Self::Execution { .. } | Self::Io(_) => Stage::Executing,
            Self::Format { .. } => Stage::Parsing,
            Self::Cancelled { stage } => *stage,
        }
    }

    pub(crate) fn fetch(
        repo: impl Into<String>,
        reference: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Fetch {
            repo: repo.into(),
            reference: reference.into(),
            message: message.into(),
        }
    }
}
