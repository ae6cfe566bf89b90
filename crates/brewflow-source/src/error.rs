//! ソース解決のエラー型

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Ref not found: {0}")]
    RefNotFound(String),

    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Could not fetch {url} at {git_ref}: {cause}")]
    FetchFailed {
        url: String,
        git_ref: String,
        cause: String,
    },

    #[error("Dockerfile not found in {}", path.display())]
    DescriptorMissing { path: PathBuf },

    #[error("Subdirectory leaves the repository: {0}")]
    InvalidSubdirectory(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SourceError>;
