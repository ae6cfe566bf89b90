//! brewflow コア
//!
//! イメージ定義ファイル（`library/<name>`）のパース、ビルド済みバージョンのキャッシュ、
//! 実行結果の集計（サマリー）を提供します。
//! git や Docker には依存せず、オーケストレーション側から利用されます。

pub mod cache;
pub mod error;
pub mod model;
pub mod parser;
pub mod summary;

pub use cache::{CacheKey, CachedBuild, KeyStrategy, VersionCache};
pub use error::{CoreError, DefinitionError, Result};
pub use model::*;
pub use parser::{Grammar, parse_line};
pub use summary::{
    FailureKind, LineOutcome, ReportItem, RunReport, RunSummary, Summary, SummaryEntry,
    describe_line,
};
