pub mod build;
pub mod periodic;
pub mod status;
pub mod success;

use brewflow_build::{BuildError, DockerDaemon, LocalBuilder};
use brewflow_config::BrewConfig;
use brewflow_runner::{Orchestrator, retry_config};
use brewflow_source::GitCli;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// ローカルの Docker と git を使うオーケストレーターを作成
pub fn create_orchestrator(config: BrewConfig) -> Result<Orchestrator, BuildError> {
    let daemon = DockerDaemon::connect()?;
    let builder = LocalBuilder::new(Arc::new(daemon), retry_config(&config.retry))?;
    Ok(Orchestrator::new(
        config,
        Arc::new(GitCli::default()),
        Arc::new(builder),
    ))
}

/// Ctrl-C でキャンセルされるトークン
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping...");
            token.cancel();
        }
    });
    cancel
}
