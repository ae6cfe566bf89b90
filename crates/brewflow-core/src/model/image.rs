//! イメージ定義（定義ファイル1つ分）

use super::definition::{DefinitionLine, SourceLine};
use super::version::Version;
use crate::error::DefinitionError;
use crate::parser::Grammar;
use std::collections::HashMap;

/// 1つの Version とそれに割り当てられたタグ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEntry {
    pub version: Version,
    /// 重複のないタグ（行の出現順）
    pub tags: Vec<String>,
    /// この Version を参照した全ての行
    pub lines: Vec<SourceLine>,
}

/// イメージ定義
///
/// `library/<name>` の1ファイルから実行ごとに組み立てられ、永続化はされません。
#[derive(Debug, Clone, Default)]
pub struct ImageDefinition {
    pub name: String,
    entries: Vec<VersionEntry>,
    index: HashMap<Version, usize>,
    malformed: Vec<DefinitionError>,
}

impl ImageDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// パース済みの行を追加
    ///
    /// 同じ Version を参照する行はひとつのエントリにまとめられます。
    pub fn push_line(&mut self, number: usize, raw: &str, line: DefinitionLine) {
        let tag = line.tag().to_string();
        let source = SourceLine {
            number,
            raw: raw.trim_end().to_string(),
            tag: tag.clone(),
        };

        match self.index.get(line.version()) {
            Some(&idx) => {
                let entry = &mut self.entries[idx];
                if !entry.tags.contains(&tag) {
                    entry.tags.push(tag);
                }
                entry.lines.push(source);
            }
            None => {
                let version = line.version().clone();
                self.index.insert(version.clone(), self.entries.len());
                self.entries.push(VersionEntry {
                    version,
                    tags: vec![tag],
                    lines: vec![source],
                });
            }
        }
    }

    /// 定義ファイルの内容から組み立てる
    pub fn parse(name: &str, content: &str, grammar: Grammar) -> Self {
        crate::parser::parse_definition(name, content, grammar)
    }

    pub fn push_malformed(&mut self, error: DefinitionError) {
        self.malformed.push(error);
    }

    /// Version のエントリ（最初に現れた順）
    pub fn versions(&self) -> &[VersionEntry] {
        &self.entries
    }

    pub fn into_versions(self) -> Vec<VersionEntry> {
        self.entries
    }

    pub fn tags_for(&self, version: &Version) -> Option<&[String]> {
        self.index
            .get(version)
            .map(|&idx| self.entries[idx].tags.as_slice())
    }

    /// パースに失敗した行
    pub fn malformed(&self) -> &[DefinitionError] {
        &self.malformed
    }

    /// 有効な行と不正な行を合わせた行数
    pub fn line_count(&self) -> usize {
        self.entries.iter().map(|e| e.lines.len()).sum::<usize>() + self.malformed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn colon(tag: &str, url: &str, git_ref: &str) -> DefinitionLine {
        DefinitionLine::Colon {
            tag: tag.to_string(),
            version: Version::new(url, git_ref, None),
        }
    }

    #[test]
    fn test_lines_collapse_onto_version() {
        let mut def = ImageDefinition::new("redis");
        def.push_line(1, "latest: github.com/x/y@master", colon("latest", "github.com/x/y", "master"));
        def.push_line(2, "v2: github.com/x/y@master", colon("v2", "github.com/x/y", "master"));
        def.push_line(3, "old: github.com/x/y@v1", colon("old", "github.com/x/y", "v1"));

        assert_eq!(def.versions().len(), 2);
        let first = &def.versions()[0];
        assert_eq!(first.tags, vec!["latest", "v2"]);
        assert_eq!(first.lines.len(), 2);
        assert_eq!(def.line_count(), 3);
    }

    #[test]
    fn test_duplicate_tags_are_not_repeated() {
        let mut def = ImageDefinition::new("redis");
        def.push_line(1, "latest: a@master", colon("latest", "a", "master"));
        def.push_line(2, "latest: a@master", colon("latest", "a", "master"));

        let version = Version::new("a", "master", None);
        assert_eq!(def.tags_for(&version).unwrap(), ["latest".to_string()]);
        // 両方の行は結果報告のために保持される
        assert_eq!(def.versions()[0].lines.len(), 2);
    }
}
