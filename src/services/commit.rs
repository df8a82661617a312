//! Commit message drafting from the staged diff

use std::path::PathBuf;

use async_trait::async_trait;

use crate::config::CommitConfig;
use crate::{Error, Result};

/// Message used when no diff can be read
pub const FALLBACK_MESSAGE: &str = "Update files";

/// Source of a staged diff
#[async_trait]
pub trait DiffSource: Send + Sync {
    /// The staged changes as a unified diff
    ///
    /// # Errors
    ///
    /// Returns error if the diff cannot be read or nothing is staged
    async fn staged_diff(&self) -> Result<String>;
}

/// Reads staged changes from a git working tree
#[derive(Debug, Clone)]
pub struct GitRepository {
    dir: PathBuf,
}

impl GitRepository {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn from_config(config: &CommitConfig) -> Self {
        Self::new(config.repo_dir.clone())
    }
}

#[async_trait]
impl DiffSource for GitRepository {
    async fn staged_diff(&self) -> Result<String> {
        let output = tokio::process::Command::new("git")
            .arg("diff")
            .arg("--staged")
            .current_dir(&self.dir)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Service(format!("git diff failed: {}", stderr.trim())));
        }

        let diff = String::from_utf8_lossy(&output.stdout).into_owned();
        if diff.trim().is_empty() {
            return Err(Error::Service("no staged changes".to_string()));
        }

        tracing::debug!(dir = %self.dir.display(), bytes = diff.len(), "read staged diff");
        Ok(diff)
    }
}

/// Pick a commit message for a diff by keyword and line balance
#[must_use]
pub fn draft_message(diff: &str) -> &'static str {
    let additions = diff.lines().filter(|l| l.starts_with('+')).count();
    let deletions = diff.lines().filter(|l| l.starts_with('-')).count();

    if diff.contains("import") {
        "Add new component imports"
    } else if diff.contains("function") || diff.contains("const") {
        "Implement new functionality"
    } else if diff.contains("fix") || diff.contains("bug") {
        "Fix bug"
    } else if additions > deletions {
        "Add new features"
    } else if deletions > additions {
        "Remove unused code"
    } else {
        "Update implementation"
    }
}

/// Draft a message for the staged changes, falling back to a generic one
pub async fn draft_commit(source: &dyn DiffSource) -> String {
    match source.staged_diff().await {
        Ok(diff) => draft_message(&diff).to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to draft commit");
            FALLBACK_MESSAGE.to_string()
        }
    }
}

/// Spoken confirmation of a drafted commit
#[must_use]
pub fn commit_summary(message: &str) -> String {
    format!("Commit ready: {message}. Ready to push?")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_messages() {
        assert_eq!(
            draft_message("+import { Model } from './model';"),
            "Add new component imports"
        );
        assert_eq!(draft_message("+const x = 1;"), "Implement new functionality");
        assert_eq!(draft_message("-a typo fix"), "Fix bug");
    }

    #[test]
    fn line_balance_messages() {
        assert_eq!(draft_message("+a\n+b\n-c"), "Add new features");
        assert_eq!(draft_message("+a\n-b\n-c"), "Remove unused code");
        assert_eq!(draft_message("+a\n-b"), "Update implementation");
    }

    #[test]
    fn summary_text() {
        assert_eq!(
            commit_summary("Fix bug"),
            "Commit ready: Fix bug. Ready to push?"
        );
    }

    #[tokio::test]
    async fn missing_repository_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let repo = GitRepository::new(dir.path().join("missing"));
        assert_eq!(draft_commit(&repo).await, FALLBACK_MESSAGE);
    }
}
