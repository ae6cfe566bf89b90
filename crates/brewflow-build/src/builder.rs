use crate::daemon::ContainerDaemon;
use crate::error::{BuildError, Result};
use crate::log::LogParser;
use std::path::Path;
use std::sync::Arc;

/// ビルド結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    pub artifact_id: String,
    pub logs: Vec<String>,
}

/// コンテキストディレクトリからイメージをビルドする
pub struct ImageBuilder {
    daemon: Arc<dyn ContainerDaemon>,
    parser: LogParser,
}

impl ImageBuilder {
    pub fn new(daemon: Arc<dyn ContainerDaemon>) -> Result<Self> {
        Ok(Self {
            daemon,
            parser: LogParser::new()?,
        })
    }

    /// イメージをビルド
    ///
    /// ログからイメージIDが得られなければ `BuildFailed` を返し、ログはエラーに保持されます。
    #[tracing::instrument(skip(self), fields(context = %context_dir.display()))]
    pub async fn build(&self, context_dir: &Path) -> Result<BuildOutput> {
        tracing::info!("Building using dockerfile...");

        let records = self.daemon.build(context_dir).await?;
        let log = self.parser.parse(&records);

        match log.artifact_id().map(str::to_string) {
            Some(artifact_id) => {
                tracing::info!(artifact_id = %artifact_id, "Build succeeded");
                Ok(BuildOutput {
                    artifact_id,
                    logs: log.into_lines(),
                })
            }
            None => {
                let message = log
                    .errors
                    .last()
                    .cloned()
                    .unwrap_or_else(|| "no image id in build output".to_string());
                tracing::warn!(error = %message, "Build failed");
                Err(BuildError::BuildFailed {
                    message,
                    logs: log.into_lines(),
                })
            }
        }
    }
}
