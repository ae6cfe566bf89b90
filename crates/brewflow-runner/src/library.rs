//! 定義ライブラリへのアクセス
//!
//! ライブラリは `library/<image>` の定義ファイルを持つディレクトリです。
//! ローカルパスか、実行中だけクローンされる git リポジトリを指定できます。

use crate::error::{Result, RunError};
use brewflow_config::LibraryConfig;
use brewflow_core::MAINTAINERS_FILE;
use brewflow_source::Vcs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const LIBRARY_DIR: &str = "library";

const REMOTE_PREFIXES: [&str; 5] = ["https://", "http://", "git://", "ssh://", "git@"];

/// `repository` がクローンの必要なリモートかどうか
pub fn is_remote(repository: &str) -> bool {
    REMOTE_PREFIXES.iter().any(|p| repository.starts_with(p))
}

/// `library/<name>` の1ファイル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionFile {
    pub name: String,
    pub path: PathBuf,
}

impl DefinitionFile {
    pub async fn read(&self) -> std::io::Result<String> {
        tokio::fs::read_to_string(&self.path).await
    }
}

/// 開いたライブラリ（クローンしたものは drop 時に削除）
#[derive(Debug)]
pub struct Library {
    root: PathBuf,
    _checkout: Option<TempDir>,
}

impl Library {
    #[tracing::instrument(skip(config, vcs), fields(repository = %config.repository))]
    pub async fn open(config: &LibraryConfig, vcs: &dyn Vcs) -> Result<Self> {
        let library = if is_remote(&config.repository) {
            let checkout = tempfile::Builder::new()
                .prefix("brewflow-library-")
                .tempdir()?;
            let git_ref = format!("refs/heads/{}", config.branch);
            tracing::info!("Cloning library {} (ref: {})", config.repository, git_ref);
            vcs.clone_repo(&config.repository, &git_ref, checkout.path())
                .await
                .map_err(|e| RunError::LibraryFetch(format!("{}: {}", config.repository, e)))?;
            Self {
                root: checkout.path().to_path_buf(),
                _checkout: Some(checkout),
            }
        } else {
            let root = PathBuf::from(&config.repository);
            if !root.is_dir() {
                return Err(RunError::LibraryFetch(format!(
                    "{} is not a directory",
                    root.display()
                )));
            }
            tracing::info!("Reading library from {}", root.display());
            Self {
                root,
                _checkout: None,
            }
        };

        if !library.definition_dir().is_dir() {
            return Err(RunError::LibraryFetch(format!(
                "{} does not contain a {}/ folder",
                library.root.display(),
                LIBRARY_DIR
            )));
        }
        Ok(library)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn definition_dir(&self) -> PathBuf {
        self.root.join(LIBRARY_DIR)
    }

    /// 名前順の定義ファイル
    ///
    /// `MAINTAINERS` と隠しファイルは除外します。`targets` を指定した場合はそのイメージだけを返します。
    pub async fn definition_files(&self, targets: Option<&[String]>) -> Result<Vec<DefinitionFile>> {
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(self.definition_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name == MAINTAINERS_FILE || name.starts_with('.') {
                continue;
            }
            if targets.is_some_and(|t| !t.iter().any(|target| target == &name)) {
                continue;
            }
            files.push(DefinitionFile {
                name,
                path: entry.path(),
            });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));

        if let Some(targets) = targets {
            for target in targets {
                if !files.iter().any(|f| &f.name == target) {
                    tracing::warn!(image = %target, "Target has no definition file");
                }
            }
        }

        tracing::debug!("Found {} definition files", files.len());
        Ok(files)
    }
}
