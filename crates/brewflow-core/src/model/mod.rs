//! モデル定義
//!
//! brewflowで使用されるデータモデルを定義します。

mod definition;
mod image;
mod policy;
mod version;

// Re-exports
pub use definition::*;
pub use image::*;
pub use policy::*;
pub use version::*;

/// タグ未指定時に使われるタグ
pub const DEFAULT_TAG: &str = "latest";

/// ライブラリ内でイメージ定義として扱わないファイル名
pub const MAINTAINERS_FILE: &str = "MAINTAINERS";
