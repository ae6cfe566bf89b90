//! ビルド能力の抽象化
//!
//! オーケストレーターはこのトレイト越しにビルド・タグ付け・プッシュを行います。

use crate::builder::{BuildOutput, ImageBuilder};
use crate::daemon::ContainerDaemon;
use crate::error::Result;
use crate::pusher::{ImagePusher, ImageReference, RetryConfig};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

#[async_trait]
pub trait Builder: Send + Sync {
    /// デーモンに到達できるか
    async fn ping(&self) -> Result<()>;

    /// キャッシュを温めるため公式イメージを取得する（失敗は無視される）
    async fn prefill(&self, image: &str);

    async fn build(&self, context_dir: &Path) -> Result<BuildOutput>;

    async fn tag(
        &self,
        artifact_id: &str,
        image: &str,
        tag: &str,
        namespaces: &[String],
    ) -> Result<Vec<ImageReference>>;

    async fn push(
        &self,
        artifact_id: &str,
        reference: &ImageReference,
        registry: Option<&str>,
    ) -> Result<String>;
}

/// ローカルのデーモンを使う [`Builder`]
pub struct LocalBuilder {
    daemon: Arc<dyn ContainerDaemon>,
    builder: ImageBuilder,
    pusher: ImagePusher,
}

impl LocalBuilder {
    pub fn new(daemon: Arc<dyn ContainerDaemon>, retry: RetryConfig) -> Result<Self> {
        Ok(Self {
            builder: ImageBuilder::new(daemon.clone())?,
            pusher: ImagePusher::new(daemon.clone(), retry),
            daemon,
        })
    }
}

#[async_trait]
impl Builder for LocalBuilder {
    async fn ping(&self) -> Result<()> {
        self.daemon.ping().await
    }

    async fn prefill(&self, image: &str) {
        tracing::debug!("Pulling {} from official repository (cache fill)", image);
        if let Err(e) = self.daemon.pull(image).await {
            tracing::debug!(image, error = %e, "Prefill skipped");
        }
    }

    async fn build(&self, context_dir: &Path) -> Result<BuildOutput> {
        self.builder.build(context_dir).await
    }

    async fn tag(
        &self,
        artifact_id: &str,
        image: &str,
        tag: &str,
        namespaces: &[String],
    ) -> Result<Vec<ImageReference>> {
        self.pusher.tag(artifact_id, image, tag, namespaces).await
    }

    async fn push(
        &self,
        artifact_id: &str,
        reference: &ImageReference,
        registry: Option<&str>,
    ) -> Result<String> {
        self.pusher.push(artifact_id, reference, registry).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuildError;
    use crate::log::LogRecord;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Offline {
        pulls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ContainerDaemon for Offline {
        async fn ping(&self) -> Result<()> {
            Err(BuildError::DaemonUnreachable("connection refused".to_string()))
        }
        async fn build(&self, _context_dir: &Path) -> Result<Vec<LogRecord>> {
            Ok(vec![LogRecord::Stream("Successfully built abc\n".to_string())])
        }
        async fn tag(&self, _artifact_id: &str, _repository: &str, _tag: &str) -> Result<()> {
            Ok(())
        }
        async fn push(&self, _repository: &str, _tag: &str) -> Result<String> {
            Ok(String::new())
        }
        async fn pull(&self, image: &str) -> Result<()> {
            self.pulls.lock().unwrap().push(image.to_string());
            Err(BuildError::Context("not found".to_string()))
        }
    }

    #[tokio::test]
    async fn test_prefill_ignores_failures() {
        let daemon = Arc::new(Offline::default());
        let builder = LocalBuilder::new(daemon.clone(), RetryConfig::immediate(1)).unwrap();

        builder.prefill("redis").await;
        assert_eq!(*daemon.pulls.lock().unwrap(), vec!["redis"]);
    }

    #[tokio::test]
    async fn test_ping_error_is_reported() {
        let builder = LocalBuilder::new(Arc::new(Offline::default()), RetryConfig::default()).unwrap();
        assert!(matches!(
            builder.ping().await,
            Err(BuildError::DaemonUnreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_build_delegates_to_executor() {
        let builder = LocalBuilder::new(Arc::new(Offline::default()), RetryConfig::default()).unwrap();
        let output = builder.build(Path::new("/tmp")).await.unwrap();
        assert_eq!(output.artifact_id, "abc");
    }
}
