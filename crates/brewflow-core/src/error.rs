use thiserror::Error;

/// 定義行のパースエラー
///
/// 行単位のエラーであり、ファイル全体の処理は継続されます。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("不正な定義行 (line {line}): {reason}\n行: {raw}")]
    MalformedDefinition {
        line: usize,
        raw: String,
        reason: String,
    },
}

impl DefinitionError {
    pub fn malformed(line: usize, raw: &str, reason: impl Into<String>) -> Self {
        DefinitionError::MalformedDefinition {
            line,
            raw: raw.trim_end().to_string(),
            reason: reason.into(),
        }
    }

    /// エラーが発生した行番号
    pub fn line(&self) -> usize {
        match self {
            DefinitionError::MalformedDefinition { line, .. } => *line,
        }
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("ファイル読み込みエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSONエラー: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
