//! Forwarded SSH agent socket.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variable naming the SSH agent socket.
pub const SSH_AUTH_SOCK: &str = "SSH_AUTH_SOCK";

/// Path to a host SSH agent socket that is forwarded into sandboxes.
///
/// The socket is only referenced, never opened or closed, by this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSocket {
    path: PathBuf,
}

impl CredentialSocket {
    /// Creates a credential socket from a path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Reads `SSH_AUTH_SOCK` from the process environment.
    ///
    /// Returns `None` when the variable is unset or empty.
    pub fn from_env() -> Option<Self> {
        Self::from_env_value(std::env::var_os(SSH_AUTH_SOCK))
    }

    fn from_env_value(value: Option<OsString>) -> Option<Self> {
        match value {
            Some(path) if !path.is_empty() => {
                tracing::debug!(path = ?path, "forwarding SSH agent socket");
                Some(Self::new(path))
            }
            _ => None,
        }
    }

    /// Returns the socket path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path as the string exported inside the sandbox.
    pub fn env_value(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_or_empty() {
        assert_eq!(CredentialSocket::from_env_value(None), None);
        assert_eq!(CredentialSocket::from_env_value(Some(OsString::new())), None);
    }

    #[test]
    fn test_set() {
        let socket =
            CredentialSocket::from_env_value(Some(OsString::from("/tmp/ssh-XXXX/agent.42")))
                .unwrap();
        assert_eq!(socket.path(), Path::new("/tmp/ssh-XXXX/agent.42"));
        assert_eq!(socket.env_value(), "/tmp/ssh-XXXX/agent.42");
    }
}
