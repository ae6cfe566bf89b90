//! git CLI ラッパー
//!
//! `tokio::process` で `git` コマンドを実行します。
//! future が drop されると子プロセスも終了します。

use crate::error::{Result, SourceError};
use crate::vcs::{RepoHandle, Vcs};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// `git` コマンドによる [`Vcs`] 実装
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// git コマンドを実行して標準出力を返す
    async fn run_command(&self, cwd: Option<&Path>, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::debug!("Executing \"{} {}\" in {:?}", self.program, args.join(" "), cwd);

        let output = cmd.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::CommandFailed {
                command: args.first().copied().unwrap_or_default().to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// クローン直後の ref の候補名（具体的なものから順に）
///
/// `git clone` 直後のブランチはリモート追跡 ref にしかないため、
/// `refs/heads/<b>` や短い名前は `origin` 配下も探します。
pub(crate) fn ref_candidates(git_ref: &str) -> Vec<String> {
    if let Some(branch) = git_ref.strip_prefix("refs/heads/") {
        vec![format!("refs/remotes/origin/{}", branch), git_ref.to_string()]
    } else if git_ref.starts_with("refs/") {
        vec![git_ref.to_string()]
    } else {
        vec![format!("refs/remotes/origin/{}", git_ref), git_ref.to_string()]
    }
}

#[async_trait]
impl Vcs for GitCli {
    async fn clone_repo(&self, url: &str, git_ref: &str, dest: &Path) -> Result<RepoHandle> {
        tracing::debug!(url, git_ref, dest = %dest.display(), "Cloning");

        let dest_str = dest.to_string_lossy();
        self.run_command(None, &["clone", "--quiet", "--no-checkout", url, &dest_str])
            .await?;

        let repo = RepoHandle {
            path: dest.to_path_buf(),
            url: url.to_string(),
        };
        self.checkout(&repo, git_ref).await?;
        Ok(repo)
    }

    async fn checkout(&self, repo: &RepoHandle, git_ref: &str) -> Result<()> {
        tracing::debug!("Checkout ref:{} in {}", git_ref, repo.path.display());

        let commit = self.resolve_ref(repo, git_ref).await?;
        self.run_command(
            Some(&repo.path),
            &["checkout", "--quiet", "--force", "--detach", &commit],
        )
        .await?;
        Ok(())
    }

    async fn pull(&self, origin: &str, repo: &RepoHandle, git_ref: &str) -> Result<()> {
        tracing::debug!("Pull ref:{} in {}", git_ref, repo.path.display());

        self.run_command(Some(&repo.path), &["fetch", "--quiet", "--tags", origin, git_ref])
            .await?;
        self.run_command(
            Some(&repo.path),
            &["checkout", "--quiet", "--force", "--detach", "FETCH_HEAD"],
        )
        .await?;
        Ok(())
    }

    async fn head(&self, repo: &RepoHandle) -> Result<String> {
        self.run_command(Some(&repo.path), &["rev-parse", "HEAD"]).await
    }

    async fn has_ref(&self, repo: &RepoHandle, git_ref: &str) -> Result<bool> {
        match self.resolve_ref(repo, git_ref).await {
            Ok(_) => Ok(true),
            Err(SourceError::RefNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn resolve_ref(&self, repo: &RepoHandle, git_ref: &str) -> Result<String> {
        for candidate in ref_candidates(git_ref) {
            let spec = format!("{}^{{commit}}", candidate);
            match self
                .run_command(Some(&repo.path), &["rev-parse", "--verify", "--quiet", &spec])
                .await
            {
                Ok(commit) if !commit.is_empty() => return Ok(commit),
                Ok(_) | Err(SourceError::CommandFailed { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(SourceError::RefNotFound(git_ref.to_string()))
    }
}
