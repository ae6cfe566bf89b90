//! `[tag] url [B:branch|T:tag|C:commit]` 構文

use crate::error::DefinitionError;
use crate::model::{DefinitionLine, RefKind, Version};

const DEFAULT_REF: &str = "refs/heads/master";

pub(super) fn parse(number: usize, raw: &str) -> Result<DefinitionLine, DefinitionError> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();

    let (tag, url, kind, git_ref) = match tokens.as_slice() {
        [url] => (None, *url, RefKind::Default, DEFAULT_REF.to_string()),
        [tag, url] => (Some(*tag), *url, RefKind::Default, DEFAULT_REF.to_string()),
        [tag, url, reference] => {
            let (kind, git_ref) = parse_reference(reference)
                .ok_or_else(|| DefinitionError::malformed(number, raw, "不明な参照の接頭辞です"))?;
            (Some(*tag), *url, kind, git_ref)
        }
        _ => {
            return Err(DefinitionError::malformed(
                number,
                raw,
                "トークンは3つまでです",
            ));
        }
    };

    Ok(DefinitionLine::Legacy {
        tag: tag.map(str::to_string),
        version: Version::new(url, git_ref, None),
        kind,
    })
}

/// `B:` / `T:` / `C:` の接頭辞を ref に変換
fn parse_reference(token: &str) -> Option<(RefKind, String)> {
    let (kind, name) = if let Some(name) = token.strip_prefix("B:") {
        (RefKind::Branch, format!("refs/heads/{}", name))
    } else if let Some(name) = token.strip_prefix("T:") {
        (RefKind::Tag, format!("refs/tags/{}", name))
    } else if let Some(name) = token.strip_prefix("C:") {
        (RefKind::Commit, name.to_string())
    } else {
        return None;
    };

    let bare = token.get(2..).unwrap_or_default();
    if bare.is_empty() {
        return None;
    }
    Some((kind, name))
}
