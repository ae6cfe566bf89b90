//! 設定ファイルのモデル
//!
//! すべての項目にデフォルト値があるため、空のファイルや設定ファイルなしでも動作します。

use crate::error::{ConfigError, Result};
use brewflow_core::{Grammar, KeyStrategy, PushPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_LIBRARY_REPOSITORY: &str = "https://github.com/docker-library/official-images";
pub const DEFAULT_LIBRARY_BRANCH: &str = "master";
pub const DEFAULT_NAMESPACE: &str = "library";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrewConfig {
    pub library: LibraryConfig,
    pub namespaces: Vec<String>,
    /// ビルド後に push するか
    pub push: bool,
    /// push 先のレジストリ（`host[:port]`）
    pub registry: Option<String>,
    /// 対象イメージ名（未指定なら library/ のすべて）
    pub targets: Option<Vec<String>>,
    /// ワークスペースを残す固定ディレクトリ
    pub repos_folder: Option<PathBuf>,
    /// ビルド履歴ファイル（未指定なら永続化しない）
    pub history: Option<PathBuf>,
    /// 状態ディレクトリ（レポート・ロック）
    pub state_dir: Option<PathBuf>,
    pub continue_on_error: bool,
    pub push_policy: PushPolicy,
    pub max_parallel: usize,
    /// ビルド前に公式イメージを pull してキャッシュを温める
    pub prefill: bool,
    pub grammar: Grammar,
    pub cache_key: KeyStrategy,
    pub retry: RetrySettings,
    pub schedule: ScheduleConfig,
}

impl Default for BrewConfig {
    fn default() -> Self {
        Self {
            library: LibraryConfig::default(),
            namespaces: vec![DEFAULT_NAMESPACE.to_string()],
            push: false,
            registry: None,
            targets: None,
            repos_folder: None,
            history: None,
            state_dir: None,
            continue_on_error: true,
            push_policy: PushPolicy::default(),
            max_parallel: 4,
            prefill: true,
            grammar: Grammar::default(),
            cache_key: KeyStrategy::default(),
            retry: RetrySettings::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// ローカルパスまたは git URL
    pub repository: String,
    pub branch: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            repository: DEFAULT_LIBRARY_REPOSITORY.to_string(),
            branch: DEFAULT_LIBRARY_BRANCH.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_secs: u64,
    pub max_delay_secs: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay_secs: 1,
            max_delay_secs: 30,
            backoff_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub period_secs: u64,
    /// 未指定なら `<state_dir>/brewflow.lock`
    pub lock_file: Option<PathBuf>,
    /// これより古いロックは放棄されたものとして奪う
    pub stale_after_secs: Option<u64>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            period_secs: 600,
            lock_file: None,
            stale_after_secs: None,
        }
    }
}

impl ScheduleConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }

    pub fn stale_after(&self) -> Option<Duration> {
        self.stale_after_secs.map(Duration::from_secs)
    }
}

impl BrewConfig {
    /// YAML 文字列から読み込む
    pub fn from_yaml(content: &str, path: &Path) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.namespaces.is_empty() {
            return Err(invalid("namespaces", "少なくとも1つ必要です"));
        }
        if self.max_parallel == 0 {
            return Err(invalid("max_parallel", "1 以上を指定してください"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "1 以上を指定してください"));
        }
        if self.schedule.period_secs == 0 {
            return Err(invalid("schedule.period_secs", "1 以上を指定してください"));
        }
        if self.library.repository.trim().is_empty() {
            return Err(invalid("library.repository", "空にはできません"));
        }
        Ok(())
    }

    /// 状態ディレクトリ（未指定ならデータディレクトリ配下）
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|dir| dir.join("brewflow"))
                .unwrap_or_else(|| PathBuf::from(".brewflow"))
        })
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.state_dir().join("reports")
    }

    pub fn lock_file(&self) -> PathBuf {
        self.schedule
            .lock_file
            .clone()
            .unwrap_or_else(|| self.state_dir().join("brewflow.lock"))
    }

    /// `a,b , c` 形式のターゲット指定を設定する
    pub fn set_targets(&mut self, list: &str) {
        let targets: Vec<String> = list
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect();
        self.targets = if targets.is_empty() {
            None
        } else {
            Some(targets)
        };
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}
