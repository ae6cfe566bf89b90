//! コンテナデーモンとのやり取り

use crate::error::Result;
use crate::log::LogRecord;
use async_trait::async_trait;
use std::path::Path;

/// ビルドパイプラインがデーモンに求める操作
#[async_trait]
pub trait ContainerDaemon: Send + Sync {
    async fn ping(&self) -> Result<()>;

    /// コンテキストディレクトリをビルドし、デーモンが出力したログレコードを返す
    ///
    /// デーモン内で失敗したビルドもここまでのレコードを返します。
    /// エラーになるのはビルドコンテキストを作れなかった場合だけです。
    async fn build(&self, context_dir: &Path) -> Result<Vec<LogRecord>>;

    async fn tag(&self, artifact_id: &str, repository: &str, tag: &str) -> Result<()>;

    /// `repository:tag` をプッシュし、1行1オブジェクトの JSON ログを返す
    async fn push(&self, repository: &str, tag: &str) -> Result<String>;

    async fn pull(&self, image: &str) -> Result<()>;
}
