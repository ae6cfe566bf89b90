//! brewflow の Docker イメージビルド
//!
//! ビルドコンテキストの作成、デーモンでのビルドとログ解析、
//! namespace ごとのタグ付け、再試行つきのプッシュを提供します。

pub mod auth;
pub mod builder;
pub mod context;
pub mod daemon;
pub mod docker;
pub mod error;
pub mod local;
pub mod log;
pub mod pusher;

pub use auth::RegistryAuth;
pub use builder::{BuildOutput, ImageBuilder};
pub use context::ContextBuilder;
pub use daemon::ContainerDaemon;
pub use docker::DockerDaemon;
pub use error::{BuildError, Result};
pub use local::{Builder, LocalBuilder};
pub use log::{BuildLog, LogParser, LogRecord};
pub use pusher::{ImagePusher, ImageReference, RetryConfig, validate_tag};
