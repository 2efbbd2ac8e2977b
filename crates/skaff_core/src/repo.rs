//! Repository fetching for the `clone` action.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};

/// Collaborator that materializes a remote repository snapshot.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RepoFetcher: Send + Sync {
    /// Fetch `repository` (an `org/repo` identifier) into `dest`.
    async fn fetch(&self, repository: &str, dest: &Path) -> EngineResult<()>;
}

/// Fetches repository snapshots with the system `git`.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    base_url: String,
}

impl Default for GitFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl GitFetcher {
    pub fn new() -> Self {
        Self {
            base_url: "https://github.com".to_string(),
        }
    }

    /// Use a different hosting base URL (e.g. a mirror).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Check if git is available on the system.
    pub fn is_git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl RepoFetcher for GitFetcher {
    async fn fetch(&self, repository: &str, dest: &Path) -> EngineResult<()> {
        let url = format!("{}/{}.git", self.base_url, repository);
        info!("Fetching {} into {}", url, dest.display());

        let output = Command::new("git")
            .args(["clone", "--depth", "1", &url])
            .arg(dest)
            .output()
            .await
            .map_err(|e| EngineError::Fetch {
                repository: repository.to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(EngineError::Fetch {
                repository: repository.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        // the snapshot is a template, not a checkout
        let git_dir = dest.join(".git");
        if git_dir.exists() {
            std::fs::remove_dir_all(&git_dir)?;
            debug!("Removed {}", git_dir.display());
        }

        Ok(())
    }
}
