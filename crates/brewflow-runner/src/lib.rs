//! brewflow の実行ドライバー
//!
//! 定義ライブラリを開き、各 Version を解決・ビルド・タグ付け・プッシュまで進めます。
//! 定期実行のスケジューラーもここにあります。

pub mod context;
pub mod error;
pub mod library;
pub mod orchestrator;
pub mod scheduler;

pub use context::{RunContext, retry_config};
pub use error::{LineError, Result, RunError};
pub use library::{DefinitionFile, LIBRARY_DIR, Library, is_remote};
pub use orchestrator::Orchestrator;
pub use scheduler::Scheduler;
