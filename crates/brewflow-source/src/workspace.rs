//! 作業ツリーのディレクトリ
//!
//! ワークスペースは実行終了時に削除される一時ディレクトリに置かれます。
//! 固定のリポジトリフォルダーが設定されている場合は `<repos_folder>/<image><random6>` に置かれ、削除されません。

use crate::error::Result;
use crate::vcs::RepoHandle;
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SUFFIX_LEN: usize = 6;

#[derive(Debug)]
enum Root {
    Temporary(TempDir),
    Fixed(PathBuf),
}

impl Root {
    fn path(&self) -> &Path {
        match self {
            Root::Temporary(dir) => dir.path(),
            Root::Fixed(path) => path,
        }
    }
}

/// クローン完了前のディレクトリ
///
/// drop されるとディレクトリを削除します（固定フォルダー内でも同じ）。
/// 失敗やキャンセルで途中までのツリーは残りません。
#[derive(Debug)]
pub(crate) struct Staging {
    root: Option<Root>,
}

impl Staging {
    pub(crate) fn allocate(repos_folder: Option<&Path>, image: &str) -> Result<Self> {
        let root = match repos_folder {
            Some(folder) => Root::Fixed(reserve_fixed_dir(folder, image)?),
            None => Root::Temporary(
                tempfile::Builder::new()
                    .prefix(&format!("brewflow-{}-", image))
                    .tempdir()?,
            ),
        };
        Ok(Self { root: Some(root) })
    }

    pub(crate) fn path(&self) -> &Path {
        self.root
            .as_ref()
            .map(Root::path)
            .unwrap_or_else(|| Path::new(""))
    }

    pub(crate) fn into_workspace(mut self, repo: RepoHandle) -> Option<Workspace> {
        self.root.take().map(|root| Workspace { root, repo })
    }
}

impl Drop for Staging {
    fn drop(&mut self) {
        if let Some(Root::Fixed(path)) = self.root.take() {
            if let Err(e) = std::fs::remove_dir_all(&path) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial clone");
            }
        }
    }
}

fn reserve_fixed_dir(folder: &Path, image: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(folder)?;
    loop {
        let path = folder.join(format!("{}{}", image, random_suffix()));
        match std::fs::create_dir(&path) {
            Ok(()) => return Ok(path),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect()
}

/// 1つのソース URL に対応するクローン済み作業ツリー
#[derive(Debug)]
pub struct Workspace {
    root: Root,
    repo: RepoHandle,
}

impl Workspace {
    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn repo(&self) -> &RepoHandle {
        &self.repo
    }

    pub fn url(&self) -> &str {
        &self.repo.url
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self.root, Root::Temporary(_))
    }

    /// 一時ワークスペースを削除（固定フォルダーのものは残す）
    pub fn release(self) -> Result<()> {
        match self.root {
            Root::Temporary(dir) => {
                tracing::debug!(path = %dir.path().display(), "Removing workspace");
                dir.close()?;
            }
            Root::Fixed(path) => {
                tracing::debug!(path = %path.display(), "Keeping workspace");
            }
        }
        Ok(())
    }
}
