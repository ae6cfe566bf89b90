use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("設定ディレクトリが見つかりません")]
    ConfigDirNotFound,

    #[error(
        "設定ファイルが見つかりません: {0}\n\
        BREWFLOW_CONFIG 環境変数には存在するファイルを指定してください"
    )]
    ConfigFileNotFound(PathBuf),

    #[error("設定ファイルの解析に失敗しました: {path}\n{source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("設定値が不正です: {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
