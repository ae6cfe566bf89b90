//! 定期実行
//!
//! スケジューラーは動作中ずっと実行ロックを保持し、起動直後と以降の周期ごとにビルドします。
//! 実行中に過ぎた周期はまとめて実行せず読み飛ばします。

use crate::error::Result;
use crate::orchestrator::Orchestrator;
use brewflow_config::BrewConfig;
use brewflow_core::RunSummary;
use brewflow_state::{ReportStore, RunLock};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub struct Scheduler {
    orchestrator: Orchestrator,
    reports: ReportStore,
    lock_path: PathBuf,
    period: Duration,
    stale_after: Option<Duration>,
}

impl Scheduler {
    pub fn new(
        orchestrator: Orchestrator,
        reports: ReportStore,
        lock_path: PathBuf,
        period: Duration,
    ) -> Self {
        Self {
            orchestrator,
            reports,
            lock_path,
            period,
            stale_after: None,
        }
    }

    /// `config` のロックファイル・周期・レポートディレクトリを使う
    pub fn from_config(orchestrator: Orchestrator, config: &BrewConfig) -> Self {
        Self {
            reports: ReportStore::new(config.reports_dir()),
            lock_path: config.lock_file(),
            period: config.schedule.period(),
            stale_after: config.schedule.stale_after(),
            orchestrator,
        }
    }

    /// 1回実行してレポートを保存
    pub async fn run_once(&self, cancel: CancellationToken) -> Result<RunSummary> {
        let summary = self.orchestrator.run_with(cancel).await?;
        let path = self.reports.save(&summary.report).await?;
        tracing::info!(
            report = %summary.report.id,
            path = %path.display(),
            success = summary.success,
            "Saved run report"
        );
        Ok(summary)
    }

    /// `cancel` されるまで実行し、完了した回数を返す
    ///
    /// 別のインスタンスがロックを持っていればロックエラーになります。
    /// 実行全体が失敗した場合はログに残し、次の周期で再実行します。
    pub async fn run(&self, cancel: CancellationToken) -> Result<usize> {
        let lock = RunLock::acquire(&self.lock_path, self.stale_after).await?;
        tracing::info!(
            lock = %lock.path().display(),
            period_secs = self.period.as_secs(),
            "Periodic builds started"
        );

        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut runs = 0;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            match self.run_once(cancel.child_token()).await {
                Ok(summary) => {
                    runs += 1;
                    tracing::info!(run = runs, success = summary.success, "Periodic run finished");
                }
                Err(e) => tracing::error!(error = %e, "Periodic run failed"),
            }
        }

        lock.release().await?;
        tracing::info!("Periodic builds stopped after {} runs", runs);
        Ok(runs)
    }
}
