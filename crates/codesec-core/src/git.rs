//! Git operations for the auto-fix branch lifecycle.
//!
//! Shells out to the `git` binary; every failure carries the operation
//! name and the captured stderr so the CI log pinpoints what broke.

use crate::error::{CodesecError, Result};
use std::path::PathBuf;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct Git {
    work_dir: PathBuf,
}

impl Git {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self { work_dir: work_dir.into() }
    }

    async fn run(&self, op: &str, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.work_dir)
            .output()
            .await
            .map_err(|e| CodesecError::git(op, format!("failed to spawn git: {}", e)))?;
        if !output.status.success() {
            return Err(CodesecError::git(
                op,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Set the bot identity used for fix commits.
    pub async fn configure_identity(&self, name: &str, email: &str) -> Result<()> {
        self.run("config", &["config", "user.name", name]).await?;
        self.run("config", &["config", "user.email", email]).await?;
        Ok(())
    }

    /// Create or reset a branch at the current HEAD and switch to it.
    ///
    /// Prior local state for that branch name is discarded, never reused:
    /// the fix branch is regenerated from scratch on every run.
    pub async fn checkout_fresh_branch(&self, branch: &str) -> Result<()> {
        self.run("checkout", &["checkout", "-B", branch]).await?;
        Ok(())
    }

    /// Switch back to an existing branch.
    pub async fn checkout(&self, branch: &str) -> Result<()> {
        self.run("checkout", &["checkout", branch]).await?;
        Ok(())
    }

    /// Stage exactly the given files.
    pub async fn add(&self, files: &[String]) -> Result<()> {
        for file in files {
            self.run("add", &["add", file]).await?;
        }
        Ok(())
    }

    pub async fn commit(&self, message: &str) -> Result<()> {
        self.run("commit", &["commit", "-m", message]).await?;
        Ok(())
    }

    /// Force-push the branch; the remote fix branch is always overwritten.
    pub async fn push_force(&self, branch: &str) -> Result<()> {
        self.run("push", &["push", "origin", branch, "--force"]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    async fn init_repo() -> (tempfile::TempDir, Git) {
        let dir = tempfile::tempdir().unwrap();
        let git = Git::new(dir.path());
        git.run("init", &["init", "-b", "main"]).await.unwrap();
        git.configure_identity("CodeSec Bot", "codesec-eng@lacework.com")
            .await
            .unwrap();
        fs::write(dir.path().join("README.md"), "hello\n").unwrap();
        git.add(&["README.md".to_string()]).await.unwrap();
        git.commit("initial").await.unwrap();
        (dir, git)
    }

    #[tokio::test]
    async fn test_fresh_branch_resets_existing_state() {
        let (dir, git) = init_repo().await;

        git.checkout_fresh_branch("codesec/sca/main/bump_foo").await.unwrap();
        fs::write(dir.path().join("stale.txt"), "stale\n").unwrap();
        git.add(&["stale.txt".to_string()]).await.unwrap();
        git.commit("stale commit").await.unwrap();

        // Re-running from main recreates the branch at main's HEAD.
        git.checkout("main").await.unwrap();
        git.checkout_fresh_branch("codesec/sca/main/bump_foo").await.unwrap();
        let log = git.run("log", &["log", "--oneline"]).await.unwrap();
        assert!(!log.contains("stale commit"));

        let head = git
            .run("rev-parse", &["rev-parse", "--abbrev-ref", "HEAD"])
            .await
            .unwrap();
        assert_eq!(head.trim(), "codesec/sca/main/bump_foo");
    }

    #[tokio::test]
    async fn test_commit_failure_carries_operation() {
        let (_dir, git) = init_repo().await;
        // Nothing staged: commit fails.
        let err = git.commit("empty").await.unwrap_err();
        match err {
            CodesecError::GitOperation { op, .. } => assert_eq!(op, "commit"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
