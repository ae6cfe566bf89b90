//! バージョン管理の抽象化

use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// `url` からクローンしたローカルの作業ツリー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoHandle {
    pub path: PathBuf,
    pub url: String,
}

/// リゾルバーがバージョン管理システムに求める操作
///
/// 作業ツリーをその場で書き換えるため、呼び出し側がリポジトリごとに排他します。
#[async_trait]
pub trait Vcs: Send + Sync {
    /// `url` を `dest` にクローンして `git_ref` をチェックアウト
    async fn clone_repo(&self, url: &str, git_ref: &str, dest: &Path) -> Result<RepoHandle>;

    /// `git_ref` をチェックアウト（ローカルにない ref は `RefNotFound`）
    async fn checkout(&self, repo: &RepoHandle, git_ref: &str) -> Result<()>;

    /// `origin` から `git_ref` を取得してチェックアウト
    async fn pull(&self, origin: &str, repo: &RepoHandle, git_ref: &str) -> Result<()>;

    /// チェックアウト中のコミットID
    async fn head(&self, repo: &RepoHandle) -> Result<String>;

    async fn has_ref(&self, repo: &RepoHandle, git_ref: &str) -> Result<bool>;

    /// `git_ref` が指すコミットID
    async fn resolve_ref(&self, repo: &RepoHandle, git_ref: &str) -> Result<String>;
}
