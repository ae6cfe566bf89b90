//! タグ付けとプッシュ
//!
//! ビルドしたイメージに `namespace/image:tag` を付け、必要ならレジストリにプッシュします。
//! プッシュは回数上限つきで再試行されます。

use crate::daemon::ContainerDaemon;
use crate::error::{BuildError, Result};
use brewflow_core::DEFAULT_TAG;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// プッシュログ中のエラーの目印
const PUSH_ERROR_MARKER: &str = "\"error\":\"";

/// `namespace/image:tag`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    pub namespace: String,
    pub image: String,
    pub tag: String,
}

impl ImageReference {
    pub fn new(namespace: &str, image: &str, tag: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            image: image.to_string(),
            tag: if tag.is_empty() { DEFAULT_TAG } else { tag }.to_string(),
        }
    }

    /// タグを除いたリポジトリ名
    pub fn repository(&self) -> String {
        format!("{}/{}", self.namespace, self.image)
    }

    /// レジストリを前置したリポジトリ名
    pub fn repository_in(&self, registry: &str) -> String {
        format!("{}/{}", registry.trim_end_matches('/'), self.repository())
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.namespace, self.image, self.tag)
    }
}

/// プッシュの再試行設定
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// 試行回数（初回を含む）
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// 待ち時間なしで `max_attempts` 回試行する
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// `attempt` 回目（1始まり）の失敗後に待つ時間
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self
            .backoff_multiplier
            .powi(attempt.saturating_sub(1) as i32);
        self.initial_delay.mul_f64(factor).min(self.max_delay)
    }
}

pub struct ImagePusher {
    daemon: Arc<dyn ContainerDaemon>,
    retry: RetryConfig,
}

impl ImagePusher {
    pub fn new(daemon: Arc<dyn ContainerDaemon>, retry: RetryConfig) -> Self {
        Self { daemon, retry }
    }

    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// 全ての namespace に同じタグを付ける
    ///
    /// 既に同じ参照が付いていても上書きされるだけなので、何度呼んでも結果は同じです。
    pub async fn tag(
        &self,
        artifact_id: &str,
        image: &str,
        tag: &str,
        namespaces: &[String],
    ) -> Result<Vec<ImageReference>> {
        let tag = if tag.is_empty() { DEFAULT_TAG } else { tag };
        validate_tag(tag)?;

        let mut references = Vec::with_capacity(namespaces.len());
        for namespace in namespaces {
            let reference = ImageReference::new(namespace, image, tag);
            tracing::info!("Committing to {}", reference);
            self.daemon
                .tag(artifact_id, &reference.repository(), &reference.tag)
                .await
                .map_err(|e| tag_failed(&reference.to_string(), e))?;
            references.push(reference);
        }
        Ok(references)
    }

    /// 参照をプッシュ
    ///
    /// レジストリ指定時は `registry/namespace/image:tag` を追加で付けてからそちらをプッシュします。
    /// 転送エラー、またはログに `"error":"` を含む応答は失敗した試行として数えます。
    pub async fn push(
        &self,
        artifact_id: &str,
        reference: &ImageReference,
        registry: Option<&str>,
    ) -> Result<String> {
        let repository = match registry {
            Some(registry) => {
                let repository = reference.repository_in(registry);
                tracing::info!("Also tagging {}:{}", repository, reference.tag);
                self.daemon
                    .tag(artifact_id, &repository, &reference.tag)
                    .await
                    .map_err(|e| tag_failed(&format!("{}:{}", repository, reference.tag), e))?;
                repository
            }
            None => reference.repository(),
        };
        let target = format!("{}:{}", repository, reference.tag);

        tracing::info!(
            "Pushing result to registry {}",
            registry.unwrap_or("default")
        );

        let max_attempts = self.retry.max_attempts.max(1);
        let mut cause = String::new();
        for attempt in 1..=max_attempts {
            match self.daemon.push(&repository, &reference.tag).await {
                Ok(log) if log.contains(PUSH_ERROR_MARKER) => {
                    cause = format!("Error while pushing: {}", log.trim());
                }
                Ok(_) => {
                    tracing::info!(reference = %target, attempt, "Pushed");
                    return Ok(target);
                }
                Err(e) => cause = e.to_string(),
            }

            tracing::warn!(reference = %target, attempt, max_attempts, "Push attempt failed: {}", cause);
            if attempt < max_attempts {
                let delay = self.retry.delay_after(attempt);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Err(BuildError::PushFailed {
            reference: target,
            attempts: max_attempts,
            cause,
        })
    }
}

fn tag_failed(reference: &str, error: BuildError) -> BuildError {
    match error {
        BuildError::TagFailed { .. } => error,
        other => BuildError::TagFailed {
            reference: reference.to_string(),
            message: other.to_string(),
        },
    }
}

/// Docker タグの制約
///
/// - 128文字以下
/// - 英数字、ピリオド、ハイフン、アンダースコアのみ
/// - 先頭はピリオドまたはハイフンではない
pub fn validate_tag(tag: &str) -> Result<()> {
    let invalid = |reason: String| Err(BuildError::InvalidTag { tag: reason });

    if tag.len() > 128 {
        return invalid(format!("Tag too long ({} characters, max 128)", tag.len()));
    }
    if tag.starts_with('.') || tag.starts_with('-') {
        return invalid(tag.to_string());
    }
    if let Some(c) = tag
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '.' | '-' | '_'))
    {
        return invalid(format!("Invalid character '{}' in tag: {}", c, tag));
    }
    Ok(())
}
