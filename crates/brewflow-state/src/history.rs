//! ビルド履歴
//!
//! これまでにビルドした Version の JSON リストです。実行前に読み込んでキャッシュを初期化し、
//! 実行後に書き戻します。直前のファイルは `<file>.backup` として残します。

use crate::error::{Result, StateError};
use brewflow_core::{CachedBuild, ROOT_DIR, Version};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub url: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    #[serde(default = "root_dir")]
    pub subdirectory: String,
    pub artifact_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<String>,
}

fn root_dir() -> String {
    ROOT_DIR.to_string()
}

impl From<CachedBuild> for HistoryRecord {
    fn from(build: CachedBuild) -> Self {
        Self {
            url: build.version.source_url,
            git_ref: build.version.git_ref,
            subdirectory: build.version.subdirectory,
            artifact_id: build.artifact_id,
            commit_id: build.commit_id,
        }
    }
}

impl From<HistoryRecord> for CachedBuild {
    fn from(record: HistoryRecord) -> Self {
        Self {
            version: Version::new(record.url, record.git_ref, Some(&record.subdirectory)),
            artifact_id: record.artifact_id,
            commit_id: record.commit_id,
        }
    }
}

pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".backup");
        PathBuf::from(name)
    }

    /// 全レコードを読み込む（ファイルがなければ空）
    pub async fn load(&self) -> Result<Vec<HistoryRecord>> {
        if !self.path.exists() {
            tracing::debug!("History file not found, starting empty");
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path).await?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let records: Vec<HistoryRecord> = serde_json::from_str(&content).map_err(|e| {
            StateError::History(format!("{}: {}", self.path.display(), e))
        })?;

        tracing::debug!("Loaded {} history records", records.len());
        Ok(records)
    }

    pub async fn save(&self, records: &[HistoryRecord]) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }

        if self.path.exists() {
            let backup = self.backup_path();
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&self.path, &backup).await?;
            tracing::debug!("Created history backup");
        }

        let content = serde_json::to_string_pretty(records)?;
        fs::write(&self.path, content).await?;

        tracing::debug!("Saved {} history records", records.len());
        Ok(())
    }
}
