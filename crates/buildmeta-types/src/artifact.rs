//! Artifact identity types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Distro value that selects the Windows packaging path.
const WINDOWS_DISTRO: &str = "windows";

/// Operating-system family of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    /// Linux distributions.
    Linux,
    /// Windows.
    Windows,
}

impl Os {
    /// Returns the lowercase name used by packaging logic.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Windows => "windows",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a single build artifact.
///
/// The tuple `(package, distro, arch, repo, commit)` is expected to identify
/// one build input. Callers are responsible for keeping it unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactSpec {
    /// Package name.
    pub package: String,
    /// Target distribution (`debian`, `alpine`, `windows`, ...).
    pub distro: String,
    /// Target architecture.
    pub arch: String,
    /// Source repository URL.
    pub repo: String,
    /// Source commit.
    pub commit: String,
    /// Release tag.
    pub tag: String,
    /// Package revision.
    pub revision: String,
}

impl ArtifactSpec {
    /// Returns the operating-system family for this artifact.
    ///
    /// Only the exact distro `windows` maps to [`Os::Windows`]; everything
    /// else, including an empty distro, is Linux.
    pub fn os(&self) -> Os {
        if self.distro == WINDOWS_DISTRO {
            Os::Windows
        } else {
            Os::Linux
        }
    }

    /// Returns true if this artifact targets Windows.
    pub fn is_windows(&self) -> bool {
        self.os() == Os::Windows
    }
}
