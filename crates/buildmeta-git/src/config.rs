//! Sandbox and resolver configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the sandbox image.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Pinned base image.
    pub base_image: String,
    /// Packages installed on top of the base image.
    pub packages: Vec<String>,
    /// Location of the `known_hosts` file inside the sandbox.
    pub known_hosts_path: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            base_image: "alpine:3.20".to_string(),
            packages: vec!["git".to_string(), "openssh-client".to_string()],
            known_hosts_path: "/root/.ssh/known_hosts".to_string(),
        }
    }
}

impl SandboxConfig {
    /// Returns the package manager invocation that installs the tools.
    pub fn install_command(&self) -> Vec<String> {
        let mut cmd = vec![
            "apk".to_string(),
            "add".to_string(),
            "--no-cache".to_string(),
        ];
        cmd.extend(self.packages.iter().cloned());
        cmd
    }
}

/// Configuration for commit-time resolution.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Directory the tree is mounted at inside the sandbox.
    pub workdir: String,
    /// Timeout for the extraction command, in seconds.
    pub exec_timeout_secs: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            workdir: "/build/src".to_string(),
            exec_timeout_secs: 5 * 60,
        }
    }
}

impl ResolverConfig {
    /// Returns the extraction command timeout.
    pub fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SandboxConfig::default();
        assert_eq!(
            config.install_command(),
            vec!["apk", "add", "--no-cache", "git", "openssh-client"]
        );
        assert_eq!(ResolverConfig::default().exec_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_partial_deserialize() {
        let config: SandboxConfig =
            serde_json::from_str(r#"{"base_image": "alpine:3.19"}"#).unwrap();
        assert_eq!(config.base_image, "alpine:3.19");
        assert_eq!(config.known_hosts_path, "/root/.ssh/known_hosts");

        let config: ResolverConfig =
            serde_json::from_str(r#"{"exec_timeout_secs": 10}"#).unwrap();
        assert_eq!(config.workdir, "/build/src");
        assert_eq!(config.exec_timeout_secs, 10);
    }
}
