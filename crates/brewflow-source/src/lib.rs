//! brewflow の git ワークスペース
//!
//! [`brewflow_core::Version`] の ref に合わせた作業ツリーを用意します。
//! 同じ実行内ではクローンを定義行の間で使い回します。

pub mod error;
pub mod git;
pub mod resolver;
pub mod vcs;
pub mod workspace;

pub use error::{Result, SourceError};
pub use git::GitCli;
pub use resolver::{RefAttempt, ResolvedSource, WorkspaceLease, WorkspaceResolver};
pub use vcs::{RepoHandle, Vcs};
pub use workspace::Workspace;
