use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Could not reach the docker daemon: {0}")]
    DaemonUnreachable(String),

    #[error("Docker connection error: {0}")]
    DockerConnection(#[from] bollard::errors::Error),

    #[error("Build failed: {message}")]
    BuildFailed { message: String, logs: Vec<String> },

    #[error("Tagging {reference} failed: {message}")]
    TagFailed { reference: String, message: String },

    #[error("Push of {reference} failed after {attempts} attempts: {cause}")]
    PushFailed {
        reference: String,
        attempts: u32,
        cause: String,
    },

    #[error("Invalid tag: {tag}")]
    InvalidTag { tag: String },

    #[error("Registry authentication failed for {registry}: {message}")]
    AuthFailed { registry: String, message: String },

    #[error("Build context error: {0}")]
    Context(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// ビルドログ（失敗時のみ）
    pub fn logs(&self) -> &[String] {
        match self {
            BuildError::BuildFailed { logs, .. } => logs,
            _ => &[],
        }
    }

    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            BuildError::DaemonUnreachable(cause) => {
                format!(
                    "Dockerデーモンに接続できません: {}\n\
                     \n\
                     解決方法:\n\
                     1. Dockerが起動しているか確認してください\n\
                     2. Docker の UNIX ソケットへのアクセス権を確認してください",
                    cause
                )
            }
            BuildError::BuildFailed { message, logs } => {
                let tail: Vec<&str> = logs.iter().rev().take(10).rev().map(String::as_str).collect();
                format!(
                    "ビルドに失敗しました: {}\n\
                     \n\
                     ログ末尾:\n{}",
                    message,
                    tail.join("\n")
                )
            }
            BuildError::PushFailed { reference, .. } => {
                format!(
                    "{} のプッシュに失敗しました\n\
                     \n\
                     docker login でレジストリの認証情報を確認してください。",
                    reference
                )
            }
            _ => format!("{}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;
