//! brewflow の永続状態
//!
//! - 実行をまたいでキャッシュを初期化するビルド履歴
//! - 実行レポートとその検索
//! - 定期実行の重複を防ぐロックファイル

pub mod error;
pub mod history;
pub mod lock;
pub mod reports;

pub use error::{Result, StateError};
pub use history::{HistoryRecord, HistoryStore};
pub use lock::{LockInfo, RunLock};
pub use reports::ReportStore;
