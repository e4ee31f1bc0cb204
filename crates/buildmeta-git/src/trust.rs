//! Pinned SSH host keys.

use std::borrow::Cow;

/// Published GitHub host keys.
///
/// Rotating GitHub's host keys requires updating this block.
pub const GITHUB_KNOWN_HOSTS: &str = "\
github.com ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl
github.com ecdsa-sha2-nistp256 AAAAE2VjZHNhLXNoYTItbmlzdHAyNTYAAAAIbmlzdHAyNTYAAABBBEmKSENjQEezOmxkZMy7opKgwFB9nkt5YRrYMjNuG5N87uRgg6CLrbo5wAdT/y6v0mKV0U2w0WZ2YB/++Tpockg=
github.com ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABgQCj7ndNxQowgcQnjshcLrqPEiiphnt+VTTvDP6mHBL9j1aNUkY4Ue1gvwnGLVlOhGeYrnZaMgRK6+PKCUXaDbC7qtbW8gIkhL7aGCsOr/C56SJMy/BCZfxd1nWzAOxSDPgVsmerOBYfNqltV9/hWCqBywINIR+5dIg6JTJ72pcEpEjcYgXkE2YEFXV1JHnsKgbLWNlhScqb2UmyRkQyytRLtL+38TGxkxCflmO+5Z8CSSNY7GidjMIZ7Q4zMjA2n1nGrlTDkzwDCsw+wqFPGQA179cnfGWOWRVruj16z6XyvxvjJwbz0wQZ75XK5tKSb7FNyeIEs4TT4jk+S4dhPeAUC5y+bDYirYgM4GC7uEnztnZyaVWQ7B381AK4Qdrwt51ZqExKbQpTUNn+EjqoTwvqNj4kqx5QUCI0ThS/YkOxJCXmPUWZbhjpCg56i+2aB6CmK2JGhn57K5mj0MNdBXA4/WnwH6XoPWJzK5Nyu2zB3nAZp+S5hpQs+p1vN1/wsjk=
";

/// A single `known_hosts` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownHost<'a> {
    /// Host pattern.
    pub host: &'a str,
    /// Key type, e.g. `ssh-ed25519`.
    pub key_type: &'a str,
    /// Base64 encoded public key.
    pub key: &'a str,
}

/// A fixed set of trusted host keys, in `known_hosts` format.
///
/// The store is handed explicitly to the sandbox factory and the tree
/// fetcher. There is no trust-on-first-use: hosts not listed here fail
/// verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustStore {
    contents: Cow<'static, str>,
}

impl TrustStore {
    /// Creates a trust store from `known_hosts` text.
    pub fn new(contents: impl Into<Cow<'static, str>>) -> Self {
        Self {
            contents: contents.into(),
        }
    }

    /// Returns the store pinned to GitHub's published keys.
    pub const fn github() -> Self {
        Self {
            contents: Cow::Borrowed(GITHUB_KNOWN_HOSTS),
        }
    }

    /// Returns the raw `known_hosts` text.
    pub fn contents(&self) -> &str {
        &self.contents
    }

    /// Parses the entries, skipping blank lines, comments and malformed lines.
    pub fn entries(&self) -> impl Iterator<Item = KnownHost<'_>> {
        self.contents.lines().filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let mut parts = line.split_whitespace();
            Some(KnownHost {
                host: parts.next()?,
                key_type: parts.next()?,
                key: parts.next()?,
            })
        })
    }
}

impl Default for TrustStore {
    fn default() -> Self {
        Self::github()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_github_key_types() {
        let store = TrustStore::github();
        let types: Vec<_> = store.entries().map(|e| e.key_type).collect();
        assert_eq!(types, vec!["ssh-ed25519", "ecdsa-sha2-nistp256", "ssh-rsa"]);
        assert!(store.entries().all(|e| e.host == "github.com"));
    }

    #[test]
    fn test_custom_store() {
        let store = TrustStore::new(
            "\n# comment\ngit.example.com ssh-ed25519 AAAAkey\nbroken-line\n".to_string(),
        );
        let entries: Vec<_> = store.entries().collect();
        assert_eq!(
            entries,
            vec![KnownHost {
                host: "git.example.com",
                key_type: "ssh-ed25519",
                key: "AAAAkey",
            }]
        );
    }

    #[test]
    fn test_default_is_github() {
        assert_eq!(TrustStore::default(), TrustStore::github());
        assert!(TrustStore::default().contents().ends_with('\n'));
    }
}
