//! 定義ファイルパーサー
//!
//! `library/<name>` の各行を [`DefinitionLine`] に変換します。
//! 構文ごとの処理はモジュールに分離されています。

mod colon;
mod legacy;


use crate::error::DefinitionError;
use crate::model::{DefinitionLine, ImageDefinition};
use serde::{Deserialize, Serialize};

/// 定義行の構文
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grammar {
    /// `tag: url@ref [subdirectory]`（デフォルト）
    #[default]
    Colon,
    /// `[tag] url [B:branch|T:tag|C:commit]`
    Legacy,
    /// 行ごとに判別
    Auto,
}

impl Grammar {
    /// 文字列からパース
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "colon" => Some(Grammar::Colon),
            "legacy" => Some(Grammar::Legacy),
            "auto" => Some(Grammar::Auto),
            _ => None,
        }
    }
}

/// 1行をパース
///
/// 空行とコメント行（最初の非空白文字が `#`）は `Ok(None)` を返します。
pub fn parse_line(
    number: usize,
    raw: &str,
    grammar: Grammar,
) -> Result<Option<DefinitionLine>, DefinitionError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let grammar = match grammar {
        Grammar::Auto if colon::looks_like_colon(trimmed) => Grammar::Colon,
        Grammar::Auto => Grammar::Legacy,
        other => other,
    };

    let line = match grammar {
        Grammar::Colon | Grammar::Auto => colon::parse(number, trimmed)?,
        Grammar::Legacy => legacy::parse(number, trimmed)?,
    };
    Ok(Some(line))
}

/// 定義ファイルの内容全体をパース
///
/// 不正な行は [`ImageDefinition::malformed`] に記録され、残りの行の処理は継続します。
pub fn parse_definition(name: &str, content: &str, grammar: Grammar) -> ImageDefinition {
    let mut definition = ImageDefinition::new(name);

    for (idx, raw) in content.lines().enumerate() {
        let number = idx + 1;
        match parse_line(number, raw, grammar) {
            Ok(Some(line)) => {
                tracing::debug!(image = name, line = number, "{} ---> {}", name, raw.trim());
                definition.push_line(number, raw, line);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(image = name, line = number, error = %e, "Invalid line");
                definition.push_malformed(e);
            }
        }
    }

    definition
}
