//! 状態ストアのエラー型

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("Already locked by {holder} since {since}")]
    Locked { holder: String, since: DateTime<Utc> },

    #[error("Report not found: {0}")]
    ReportNotFound(String),

    #[error("History file error: {0}")]
    History(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StateError>;
