//! 多重起動防止のロック
//!
//! ロックは排他的に作成されるファイルで、存在する間は他の実行を開始できません。
//! ガードを drop するとファイルは削除されます。

use crate::error::{Result, StateError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub holder: String,
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
}

impl LockInfo {
    fn current() -> Self {
        Self {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        }
    }
}

/// 実行ロックのガード
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    released: bool,
}

impl RunLock {
    /// `path` のロックを取得
    ///
    /// ファイルが存在する間は [`StateError::Locked`] になります。
    /// `stale_after` を指定すると、それより古いロックは削除して引き継ぎます。
    pub async fn acquire(path: impl AsRef<Path>, stale_after: Option<Duration>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }

        match Self::create(&path).await {
            Ok(lock) => Ok(lock),
            Err(StateError::Io(e)) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let info = Self::read_info(&path).await;
                let stale = match (&info, stale_after) {
                    (Some(info), Some(limit)) => Utc::now()
                        .signed_duration_since(info.acquired_at)
                        .to_std()
                        .is_ok_and(|age| age >= limit),
                    _ => false,
                };

                if !stale {
                    let (holder, since) = info
                        .map(|i| (format!("{} (pid {})", i.holder, i.pid), i.acquired_at))
                        .unwrap_or_else(|| ("unknown".to_string(), Utc::now()));
                    return Err(StateError::Locked { holder, since });
                }

                tracing::warn!(path = %path.display(), "Removing stale lock");
                fs::remove_file(&path).await?;
                Self::create(&path).await
            }
            Err(e) => Err(e),
        }
    }

    async fn create(path: &Path) -> Result<Self> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await?;
        let content = serde_json::to_string_pretty(&LockInfo::current())?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;

        tracing::debug!(path = %path.display(), "Acquired run lock");
        Ok(Self {
            path: path.to_path_buf(),
            released: false,
        })
    }

    /// 既存のロックファイルの保持者情報
    pub async fn read_info(path: &Path) -> Option<LockInfo> {
        let content = fs::read_to_string(path).await.ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.path.exists() {
                fs::remove_file(&self.path).await?;
                tracing::debug!("Released run lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if !self.released && self.path.exists() {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
