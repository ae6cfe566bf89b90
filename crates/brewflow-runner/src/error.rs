use brewflow_build::BuildError;
use brewflow_core::FailureKind;
use brewflow_source::SourceError;
use brewflow_state::StateError;
use thiserror::Error;

/// 実行全体を中断するエラー
///
/// いずれも行の処理が始まる前に発生し、サマリーは作られません。
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Could not fetch the library: {0}")]
    LibraryFetch(String),

    #[error("Could not reach the docker daemon: {0}")]
    DaemonUnreachable(String),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunError {
    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            RunError::LibraryFetch(cause) => format!(
                "ライブラリを取得できません: {}\n\
                 \n\
                 library.repository が library/ フォルダを含むパスまたは git URL か確認してください。",
                cause
            ),
            RunError::DaemonUnreachable(cause) => {
                BuildError::DaemonUnreachable(cause.clone()).user_message()
            }
            RunError::State(StateError::Locked { holder, since }) => format!(
                "既に実行中です（{} が {} から保持）",
                holder,
                since.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RunError>;

/// 1つの定義行を失敗させるエラー
#[derive(Error, Debug)]
pub enum LineError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("Push skipped after an earlier push failure")]
    PushHalted,

    #[error("Run cancelled")]
    Cancelled,
}

impl LineError {
    /// サマリーに記録する失敗の種類
    pub fn kind(&self) -> FailureKind {
        match self {
            LineError::Source(SourceError::DescriptorMissing { .. })
            | LineError::Source(SourceError::InvalidSubdirectory(_)) => {
                FailureKind::BuildDescriptorMissing
            }
            LineError::Source(_) => FailureKind::SourceFetch,
            LineError::Build(BuildError::TagFailed { .. })
            | LineError::Build(BuildError::InvalidTag { .. }) => FailureKind::TagFailed,
            LineError::Build(BuildError::PushFailed { .. }) => FailureKind::PushFailed,
            LineError::Build(_) => FailureKind::BuildFailed,
            LineError::PushHalted => FailureKind::PushHalted,
            LineError::Cancelled => FailureKind::Cancelled,
        }
    }
}
