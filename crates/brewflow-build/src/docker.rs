//! bollard による [`ContainerDaemon`] 実装

use crate::auth::RegistryAuth;
use crate::context::ContextBuilder;
use crate::daemon::ContainerDaemon;
use crate::error::{BuildError, Result};
use crate::log::LogRecord;
use async_trait::async_trait;
use bollard::Docker;
use bollard::models::BuildInfo;
use bytes::Bytes;
use futures_util::stream::{Stream, StreamExt};
use http_body_util::{Either, Full};
use std::path::Path;

pub struct DockerDaemon {
    docker: Docker,
    auth: RegistryAuth,
}

impl DockerDaemon {
    pub fn new(docker: Docker) -> Self {
        Self {
            docker,
            auth: RegistryAuth::new(),
        }
    }

    /// ローカルのデフォルト設定で接続
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| BuildError::DaemonUnreachable(e.to_string()))?;
        Ok(Self::new(docker))
    }
}

/// ビルドの出力ストリームをログレコードに変換
///
/// bollard はデーモンのエラーメッセージをストリームのエラーとして返すため、
/// その時点までのレコードを残したままエラーレコードとして記録します。
async fn collect_build_records<S>(stream: &mut S) -> Vec<LogRecord>
where
    S: Stream<Item = std::result::Result<BuildInfo, bollard::errors::Error>> + Unpin,
{
    let mut records = Vec::new();
    while let Some(msg) = stream.next().await {
        let output = match msg {
            Ok(output) => output,
            Err(bollard::errors::Error::DockerStreamError { error }) => {
                tracing::debug!(error = %error, "Build reported an error");
                records.push(LogRecord::Error(error));
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Build output stream broke off");
                records.push(LogRecord::Error(e.to_string()));
                break;
            }
        };

        if let Some(stream) = output.stream {
            tracing::debug!("{}", stream.trim_end());
            records.push(LogRecord::Stream(stream));
        }
        if let Some(error) = output.error {
            records.push(LogRecord::Error(error));
        } else if let Some(message) = output.error_detail.and_then(|d| d.message) {
            records.push(LogRecord::Error(message));
        }
        if let Some(id) = output.aux.and_then(|aux| aux.id) {
            records.push(LogRecord::ImageId(id));
        }
    }
    records
}

#[async_trait]
impl ContainerDaemon for DockerDaemon {
    async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .map_err(|e| BuildError::DaemonUnreachable(e.to_string()))?;
        Ok(())
    }

    async fn build(&self, context_dir: &Path) -> Result<Vec<LogRecord>> {
        let context_data = ContextBuilder::create_context(context_dir)?;

        #[allow(deprecated)]
        let options = bollard::image::BuildImageOptions::<String> {
            dockerfile: "Dockerfile".to_string(),
            rm: true,
            forcerm: true,
            ..Default::default()
        };

        let body = Full::new(Bytes::from(context_data));
        #[allow(deprecated)]
        let mut stream = self
            .docker
            .build_image(options, None, Some(Either::Left(body)));

        Ok(collect_build_records(&mut stream).await)
    }

    async fn tag(&self, artifact_id: &str, repository: &str, tag: &str) -> Result<()> {
        #[allow(deprecated)]
        let options = bollard::image::TagImageOptions {
            repo: repository,
            tag,
        };

        #[allow(deprecated)]
        let result = self.docker.tag_image(artifact_id, Some(options)).await;

        result.map_err(|e| BuildError::TagFailed {
            reference: format!("{}:{}", repository, tag),
            message: e.to_string(),
        })
    }

    async fn push(&self, repository: &str, tag: &str) -> Result<String> {
        let reference = format!("{}:{}", repository, tag);
        let credentials = self.auth.credentials_for(&reference)?;

        #[allow(deprecated)]
        let options = bollard::image::PushImageOptions::<String> {
            tag: tag.to_string(),
        };

        #[allow(deprecated)]
        let mut stream = self.docker.push_image(repository, Some(options), credentials);

        let mut log = String::new();
        while let Some(result) = stream.next().await {
            let info = result?;
            let line = match (info.error, info.status) {
                (Some(error), _) => serde_json::json!({ "error": error }),
                (None, Some(status)) => serde_json::json!({ "status": status }),
                (None, None) => continue,
            };
            log.push_str(&line.to_string());
            log.push('\n');
        }

        Ok(log)
    }

    async fn pull(&self, image: &str) -> Result<()> {
        let (name, tag) = image.split_once(':').unwrap_or((image, "latest"));
        let credentials = self.auth.credentials_for(image)?;

        #[allow(deprecated)]
        let options = bollard::image::CreateImageOptions {
            from_image: name,
            tag,
            ..Default::default()
        };

        #[allow(deprecated)]
        let mut stream = self.docker.create_image(Some(options), None, credentials);

        while let Some(info) = stream.next().await {
            if let Some(status) = info?.status {
                tracing::trace!("{}", status);
            }
        }
        Ok(())
    }
}
