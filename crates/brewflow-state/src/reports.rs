//! 実行レポートの保存
//!
//! 完了した実行ごとに `<dir>/<report id>.json` を書き出します。
//! レポートIDは時刻順に並ぶため、最大のIDが最新です。

use crate::error::{Result, StateError};
use brewflow_core::{DEFAULT_TAG, ReportItem, RunReport};
use std::path::{Path, PathBuf};
use tokio::fs;

const REPORT_EXT: &str = "json";

pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn report_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", id, REPORT_EXT))
    }

    pub async fn save(&self, report: &RunReport) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.report_path(&report.id);
        fs::write(&path, serde_json::to_string_pretty(report)?).await?;
        tracing::debug!(path = %path.display(), "Saved run report");
        Ok(path)
    }

    /// レポートID（古い順）
    pub async fn list(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == REPORT_EXT) {
                if let Some(stem) = path.file_stem() {
                    ids.push(stem.to_string_lossy().to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub async fn get(&self, id: &str) -> Result<RunReport> {
        let path = self.report_path(id);
        if !path.exists() {
            return Err(StateError::ReportNotFound(id.to_string()));
        }
        let content = fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    pub async fn latest(&self) -> Result<Option<RunReport>> {
        match self.list().await?.last() {
            Some(id) => Ok(Some(self.get(id).await?)),
            None => Ok(None),
        }
    }

    /// `repo_name:tag` の最新の成功ビルド（タグ省略時は `latest`）
    pub async fn latest_successful(
        &self,
        repo_name: &str,
        tag: Option<&str>,
    ) -> Result<Option<(RunReport, ReportItem)>> {
        let tag = tag.unwrap_or(DEFAULT_TAG);
        for id in self.list().await?.iter().rev() {
            let report = self.get(id).await?;
            if let Some(item) = report.successful_item(repo_name, tag).cloned() {
                return Ok(Some((report, item)));
            }
        }
        Ok(None)
    }
}
