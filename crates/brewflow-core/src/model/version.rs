//! ビルド単位（Version）

use serde::{Deserialize, Serialize};
use std::fmt;

/// ビルドコンテキストのデフォルト（リポジトリのルート）
pub const ROOT_DIR: &str = ".";

/// 1回のビルドを表す `(source_url, ref, subdirectory)` の組
///
/// 3つの値が完全に一致する定義行は、タグが異なっていても同じビルドを指します。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version {
    pub source_url: String,
    /// ブランチ名・タグ名・コミットIDのいずれか（解決はワークスペース側で行う）
    #[serde(rename = "ref")]
    pub git_ref: String,
    #[serde(default = "default_subdirectory")]
    pub subdirectory: String,
}

fn default_subdirectory() -> String {
    ROOT_DIR.to_string()
}

impl Version {
    pub fn new(
        source_url: impl Into<String>,
        git_ref: impl Into<String>,
        subdirectory: Option<&str>,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            git_ref: git_ref.into(),
            subdirectory: subdirectory
                .filter(|s| !s.is_empty())
                .unwrap_or(ROOT_DIR)
                .to_string(),
        }
    }

    /// サブディレクトリがルートかどうか
    pub fn is_root(&self) -> bool {
        self.subdirectory == ROOT_DIR
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "{}@{}", self.source_url, self.git_ref)
        } else {
            write!(f, "{}@{} {}", self.source_url, self.git_ref, self.subdirectory)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_defaults_to_root() {
        let version = Version::new("https://github.com/x/y", "master", None);
        assert_eq!(version.subdirectory, ROOT_DIR);
        assert!(version.is_root());

        let version = Version::new("https://github.com/x/y", "master", Some(""));
        assert!(version.is_root());
    }

    #[test]
    fn test_version_display() {
        let root = Version::new("https://github.com/x/y", "master", None);
        assert_eq!(root.to_string(), "https://github.com/x/y@master");

        let sub = Version::new("https://github.com/x/y", "v2", Some("2.0/alpine"));
        assert_eq!(sub.to_string(), "https://github.com/x/y@v2 2.0/alpine");
    }

    #[test]
    fn test_version_serializes_ref_field() {
        let version = Version::new("https://github.com/x/y", "v2", Some("2.0"));
        let json = serde_json::to_string(&version).unwrap();
        assert!(json.contains(r#""ref":"v2""#));

        let back: Version =
            serde_json::from_str(r#"{"source_url":"https://github.com/x/y","ref":"v2"}"#).unwrap();
        assert!(back.is_root());
    }
}
