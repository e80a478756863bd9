//! Build information
//!
//! Values are fixed at compile time. Release pipelines set
//! `WOLFBROWSE_GIT_COMMIT`, `WOLFBROWSE_BUILD_TIME` and `WOLFBROWSE_RUSTC`;
//! local builds leave them unset.

use serde::{Deserialize, Serialize};

const UNKNOWN: &str = "unknown";

/// Version and provenance of the running binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub version: String,
    pub git_commit: String,
    pub build_time: String,
    pub rustc: String,
}

impl BuildInfo {
    /// Build info of this binary
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            git_commit: option_env!("WOLFBROWSE_GIT_COMMIT").unwrap_or(UNKNOWN).to_string(),
            build_time: option_env!("WOLFBROWSE_BUILD_TIME").unwrap_or(UNKNOWN).to_string(),
            rustc: option_env!("WOLFBROWSE_RUSTC").unwrap_or(UNKNOWN).to_string(),
        }
    }

    /// A release build carries both a commit and a build time
    pub fn is_release(&self) -> bool {
        self.git_commit != UNKNOWN && self.build_time != UNKNOWN
    }

    /// Human-readable version: `1.2.3` for releases, `dev-<commit>` otherwise
    pub fn version_string(&self) -> String {
        if self.is_release() {
            return self.version.clone();
        }
        if self.git_commit == UNKNOWN {
            return format!("dev-{}", self.version);
        }
        let short: String = self.git_commit.chars().take(8).collect();
        format!("dev-{}", short)
    }
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "wolfbrowse {} (commit {}, built {}, {})",
            self.version_string(),
            self.git_commit,
            self.build_time,
            self.rustc
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(commit: &str, built: &str) -> BuildInfo {
        BuildInfo {
            version: "1.4.0".into(),
            git_commit: commit.into(),
            build_time: built.into(),
            rustc: "rustc 1.80.0".into(),
        }
    }

    #[test]
    fn test_current_uses_package_version() {
        assert_eq!(BuildInfo::current().version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_release_build() {
        let release = info("0123456789abcdef", "2024-05-01T10:00:00Z");
        assert!(release.is_release());
        assert_eq!(release.version_string(), "1.4.0");
    }

    #[test]
    fn test_dev_builds() {
        assert_eq!(info("0123456789abcdef", UNKNOWN).version_string(), "dev-01234567");
        assert_eq!(info(UNKNOWN, UNKNOWN).version_string(), "dev-1.4.0");
        assert!(!info(UNKNOWN, UNKNOWN).is_release());
    }

    #[test]
    fn test_serializes_all_fields() {
        let json = serde_json::to_value(info("abc", "now")).unwrap();
        assert_eq!(json["git_commit"], "abc");
        assert_eq!(json["rustc"], "rustc 1.80.0");
    }
}
