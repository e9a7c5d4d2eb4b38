//! Thin git adapter over the command engine.

use std::path::Path;

use crate::domain::Result;
use crate::exec::{execute, CommandSpec};

async fn git(dir: &Path, args: &[&str]) -> Result<String> {
    let spec = CommandSpec::new("git", args.iter().map(|arg| arg.to_string())).cwd(dir);
    let display = spec.display();
    execute(spec).await.require_success(&display)
}

/// Whether the worktree has no staged or unstaged changes.
pub async fn worktree_clean(dir: &Path) -> Result<bool> {
    let output = git(dir, &["status", "--porcelain"]).await?;
    Ok(output.trim().is_empty())
}

/// Create and switch to a new branch off the given base.
pub async fn create_branch(dir: &Path, name: &str, base: &str) -> Result<()> {
    git(dir, &["checkout", "-b", name, base]).await?;
    Ok(())
}

/// Stage everything and commit with the given message.
pub async fn commit_all(dir: &Path, message: &str) -> Result<()> {
    git(dir, &["add", "-A"]).await?;
    git(dir, &["commit", "-m", message]).await?;
    Ok(())
}

/// Push the branch and set its upstream.
pub async fn push_branch(dir: &Path, branch: &str) -> Result<()> {
    git(dir, &["push", "-u", "origin", branch]).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn run_git(dir: &Path, args: &[&str]) {
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .expect("git runs");
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn make_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        run_git(dir.path(), &["init", "-b", "main"]);
        run_git(dir.path(), &["config", "user.name", "test-user"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["commit", "--allow-empty", "-m", "initial"]);
        dir
    }

    #[tokio::test]
    async fn test_clean_worktree_detected() {
        let repo = make_repo();
        assert!(worktree_clean(repo.path()).await.expect("status runs"));
    }

    #[tokio::test]
    async fn test_dirty_worktree_detected() {
        let repo = make_repo();
        std::fs::write(repo.path().join("scratch.txt"), "dirty").expect("write file");
        assert!(!worktree_clean(repo.path()).await.expect("status runs"));
    }

    #[tokio::test]
    async fn test_branch_and_commit_roundtrip() {
        let repo = make_repo();
        create_branch(repo.path(), "dep-update/ash-3.15.0", "main")
            .await
            .expect("branch created");
        std::fs::write(repo.path().join("mix.lock"), "%{}").expect("write file");
        commit_all(repo.path(), "Update ash from 3.14.0 to 3.15.0")
            .await
            .expect("commit succeeds");
        assert!(worktree_clean(repo.path()).await.expect("status runs"));
    }
}
