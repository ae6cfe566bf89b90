//! `tag: url@ref [subdirectory]` 構文

use crate::error::DefinitionError;
use crate::model::{DefinitionLine, Version};

pub(super) fn parse(number: usize, raw: &str) -> Result<DefinitionLine, DefinitionError> {
    let malformed = |reason: &str| DefinitionError::malformed(number, raw, reason);

    // 最初の ':' でタグと残りを分離（URL側の ':' はそのまま残る）
    let (tag, rest) = raw
        .split_once(':')
        .ok_or_else(|| malformed("タグ区切りの ':' がありません"))?;

    let tag = tag.trim();
    if tag.chars().any(char::is_whitespace) {
        return Err(malformed("タグに空白を含めることはできません"));
    }

    let tokens: Vec<&str> = rest.split_whitespace().collect();
    let (source, subdirectory) = match tokens.as_slice() {
        [] => return Err(malformed("ソースが空です")),
        [source] => (*source, None),
        [source, dir] => (*source, Some(*dir)),
        _ => return Err(malformed("ソースとサブディレクトリ以外のトークンがあります")),
    };

    let (url, git_ref) = source
        .rsplit_once('@')
        .ok_or_else(|| malformed("ソースに '@' がありません"))?;

    if url.is_empty() {
        return Err(malformed("URLが空です"));
    }
    if git_ref.is_empty() {
        return Err(malformed("refが空です"));
    }
    // git の ref 名に ':' は使えないため、ここに現れる ':' は区切りの誤り
    if git_ref.contains(':') || subdirectory.is_some_and(|d| d.contains(':')) {
        return Err(malformed("タグ区切り以外の位置に ':' があります"));
    }

    Ok(DefinitionLine::Colon {
        tag: tag.to_string(),
        version: Version::new(url, git_ref, subdirectory),
    })
}

/// `Grammar::Auto` でこの構文として扱うかどうか
///
/// 最初の ':' より前がタグとして有効な文字だけで構成され、
/// かつ `git://` のようなURLスキームの一部でない場合にこの構文とみなす。
pub(super) fn looks_like_colon(raw: &str) -> bool {
    match raw.split_once(':') {
        Some((tag, rest)) => {
            let tag = tag.trim();
            tag.chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
                && !rest.starts_with("//")
        }
        None => false,
    }
}
