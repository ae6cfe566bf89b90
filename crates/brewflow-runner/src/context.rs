//! 1回の実行内でビルドタスク間に共有される状態

use brewflow_build::{Builder, RetryConfig};
use brewflow_config::{BrewConfig, RetrySettings};
use brewflow_core::{FailureKind, Summary, VersionCache};
use brewflow_source::{Vcs, WorkspaceResolver};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;

/// 設定ファイルのプッシュ再試行設定を変換
pub fn retry_config(settings: &RetrySettings) -> RetryConfig {
    RetryConfig {
        max_attempts: settings.max_attempts,
        initial_delay: Duration::from_secs(settings.initial_delay_secs),
        max_delay: Duration::from_secs(settings.max_delay_secs),
        backoff_multiplier: settings.backoff_multiplier,
    }
}

pub struct RunContext {
    pub config: Arc<BrewConfig>,
    pub cache: VersionCache,
    pub resolver: WorkspaceResolver,
    pub builder: Arc<dyn Builder>,
    pub cancel: CancellationToken,
    pub limit: Arc<Semaphore>,
    summary: Mutex<Summary>,
    push_halted: AtomicBool,
}

impl RunContext {
    pub fn new(
        config: Arc<BrewConfig>,
        vcs: Arc<dyn Vcs>,
        builder: Arc<dyn Builder>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            cache: VersionCache::new(config.cache_key),
            resolver: WorkspaceResolver::new(vcs, config.repos_folder.clone()),
            limit: Arc::new(Semaphore::new(config.max_parallel.max(1))),
            builder,
            cancel,
            summary: Mutex::new(Summary::new()),
            push_halted: AtomicBool::new(false),
            config,
        }
    }

    pub async fn record_success(
        &self,
        image: &str,
        line: usize,
        raw: &str,
        artifact_id: &str,
        commit_id: Option<String>,
    ) {
        self.summary
            .lock()
            .await
            .record_success(image, line, raw, artifact_id, commit_id);
    }

    /// 失敗した行を記録（continue_on_error が無効なら実行を止める）
    pub async fn record_failure(
        &self,
        image: &str,
        line: usize,
        raw: &str,
        kind: FailureKind,
        error: impl fmt::Display,
    ) {
        tracing::error!(image, line, kind = %kind, "{}", error);
        self.summary
            .lock()
            .await
            .record_failure(image, line, raw, kind, error);

        if kind != FailureKind::Cancelled
            && !self.config.continue_on_error
            && !self.cancel.is_cancelled()
        {
            tracing::warn!("continue_on_error is off, cancelling the run");
            self.cancel.cancel();
        }
    }

    pub fn push_halted(&self) -> bool {
        self.push_halted.load(Ordering::SeqCst)
    }

    /// 以降のプッシュを見送るよう切り替える
    pub fn halt_pushes(&self) {
        if !self.push_halted.swap(true, Ordering::SeqCst) {
            tracing::warn!("Push failed, skipping remaining pushes");
        }
    }

    pub async fn take_summary(&self) -> Summary {
        std::mem::take(&mut *self.summary.lock().await)
    }
}
