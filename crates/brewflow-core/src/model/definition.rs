//! 定義行

use super::DEFAULT_TAG;
use super::version::Version;

/// レガシー構文の3番目のトークンが指す参照の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    /// 省略時（`refs/heads/master`）
    Default,
    /// `B:` → `refs/heads/`
    Branch,
    /// `T:` → `refs/tags/`
    Tag,
    /// `C:` → コミットIDをそのまま使う
    Commit,
}

/// パース済みの定義行
///
/// 2種類の構文はパース時に一度だけ判別され、以降は同じ型として扱われます。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionLine {
    /// `tag: url@ref [subdirectory]`
    Colon { tag: String, version: Version },
    /// `[tag] url [B:branch|T:tag|C:commit]`
    Legacy {
        tag: Option<String>,
        version: Version,
        kind: RefKind,
    },
}

impl DefinitionLine {
    /// 適用するタグ（空または未指定なら `latest`）
    pub fn tag(&self) -> &str {
        let tag = match self {
            DefinitionLine::Colon { tag, .. } => Some(tag.as_str()),
            DefinitionLine::Legacy { tag, .. } => tag.as_deref(),
        };
        match tag {
            Some(t) if !t.is_empty() => t,
            _ => DEFAULT_TAG,
        }
    }

    pub fn version(&self) -> &Version {
        match self {
            DefinitionLine::Colon { version, .. } | DefinitionLine::Legacy { version, .. } => {
                version
            }
        }
    }
}

/// 定義ファイル内の1行（行番号と生のテキスト）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// 1始まりの行番号
    pub number: usize,
    pub raw: String,
    /// この行が寄与するタグ
    pub tag: String,
}
