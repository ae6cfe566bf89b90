//! 実行結果の集計
//!
//! 定義行ごとの成功・失敗を記録し、実行全体の成否と終了コード、
//! 人間向けのレポートと永続化用の [`RunReport`] を生成します。
//!
//! 集計側はオーケストレーターの内部型に依存しません。
//! タグとソース記述子は生の行テキストから [`describe_line`] で復元します。

use crate::model::DEFAULT_TAG;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const SEPARATOR_WIDTH: usize = 61;

/// レガシー構文で ref が省略されたときのソース記述子の接尾辞
const DEFAULT_SOURCE_REF: &str = "B:master";

/// 行単位の失敗の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    MalformedDefinition,
    SourceFetch,
    BuildDescriptorMissing,
    BuildFailed,
    TagFailed,
    PushFailed,
    PushHalted,
    Cancelled,
    Other,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::MalformedDefinition => "MalformedDefinition",
            FailureKind::SourceFetch => "SourceFetchError",
            FailureKind::BuildDescriptorMissing => "BuildDescriptorMissing",
            FailureKind::BuildFailed => "BuildFailed",
            FailureKind::TagFailed => "TagFailed",
            FailureKind::PushFailed => "PushFailed",
            FailureKind::PushHalted => "PushHalted",
            FailureKind::Cancelled => "Cancelled",
            FailureKind::Other => "Error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Success {
        artifact_id: String,
        commit_id: Option<String>,
    },
    Failure {
        kind: FailureKind,
        error: String,
    },
}

impl LineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LineOutcome::Success { .. })
    }
}

/// 1行分の記録
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryEntry {
    pub line: usize,
    pub raw: String,
    pub tag: String,
    pub source: String,
    pub outcome: LineOutcome,
}

/// 実行中に結果を蓄積する集計器
#[derive(Debug, Clone, Default)]
pub struct Summary {
    images: BTreeMap<String, BTreeMap<usize, SummaryEntry>>,
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(
        &mut self,
        image: &str,
        line: usize,
        raw: &str,
        artifact_id: impl Into<String>,
        commit_id: Option<String>,
    ) {
        self.insert(
            image,
            line,
            raw,
            LineOutcome::Success {
                artifact_id: artifact_id.into(),
                commit_id,
            },
        );
    }

    pub fn record_failure(
        &mut self,
        image: &str,
        line: usize,
        raw: &str,
        kind: FailureKind,
        error: impl fmt::Display,
    ) {
        tracing::debug!(image, line, kind = %kind, "Recording failure");
        self.insert(
            image,
            line,
            raw,
            LineOutcome::Failure {
                kind,
                error: error.to_string(),
            },
        );
    }

    fn insert(&mut self, image: &str, line: usize, raw: &str, outcome: LineOutcome) {
        let lines = self.images.entry(image.to_string()).or_default();

        // 一度失敗した行は成功で上書きしない
        let keeps_failure = lines
            .get(&line)
            .is_some_and(|existing| !existing.outcome.is_success());
        if keeps_failure && outcome.is_success() {
            return;
        }

        let (tag, source) = describe_line(raw);
        lines.insert(
            line,
            SummaryEntry {
                line,
                raw: raw.trim_end().to_string(),
                tag,
                source,
                outcome,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.images.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn success(&self) -> bool {
        self.images
            .values()
            .flat_map(BTreeMap::values)
            .all(|e| e.outcome.is_success())
    }

    pub fn finalize(self) -> RunSummary {
        self.finalize_at(Utc::now())
    }

    pub fn finalize_at(self, build_date: DateTime<Utc>) -> RunSummary {
        let success = self.success();
        let entries: BTreeMap<String, Vec<SummaryEntry>> = self
            .images
            .into_iter()
            .map(|(image, lines)| (image, lines.into_values().collect()))
            .collect();

        let items = entries
            .iter()
            .flat_map(|(image, lines)| lines.iter().map(move |e| ReportItem::new(image, e)))
            .collect();

        RunSummary {
            success,
            report: RunReport {
                id: report_id(&build_date),
                success,
                build_date,
                items,
            },
            entries,
        }
    }
}

/// 確定した実行結果
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub success: bool,
    pub report: RunReport,
    entries: BTreeMap<String, Vec<SummaryEntry>>,
}

impl RunSummary {
    /// 1行でも失敗していれば 1
    pub fn exit_code(&self) -> i32 {
        if self.success { 0 } else { 1 }
    }

    /// イメージ名順、行番号順のエントリ
    pub fn items(&self) -> impl Iterator<Item = (&str, &SummaryEntry)> {
        self.entries
            .iter()
            .flat_map(|(image, lines)| lines.iter().map(move |e| (image.as_str(), e)))
    }

    pub fn images(&self) -> impl Iterator<Item = (&str, &[SummaryEntry])> {
        self.entries
            .iter()
            .map(|(image, lines)| (image.as_str(), lines.as_slice()))
    }

    pub fn failures(&self) -> usize {
        self.items().filter(|(_, e)| !e.outcome.is_success()).count()
    }

    /// 人間向けのレポート
    pub fn render(&self) -> String {
        let separator = format!("{}\n", "-".repeat(SEPARATOR_WIDTH));
        let mut out = String::from("BREW BUILD SUMMARY\n");
        out.push_str(&separator);
        out.push_str(&format!("OVERALL SUCCESS: {}\n", self.success));
        out.push_str(&separator);

        for (image, lines) in &self.entries {
            out.push_str(image);
            out.push('\n');
            out.push_str(&separator);
            for entry in lines {
                let (marker, detail) = match &entry.outcome {
                    LineOutcome::Success { artifact_id, .. } => ("OK", artifact_id.clone()),
                    LineOutcome::Failure { kind, error } => ("KO", format!("{}: {}", kind, error)),
                };
                out.push_str(&format!("{:>2} | {} | {:50}\n", entry.line, marker, detail));
            }
            out.push_str(&separator);
        }
        out
    }
}

/// 永続化・外部公開用の実行レポート
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub id: String,
    pub success: bool,
    pub build_date: DateTime<Utc>,
    pub items: Vec<ReportItem>,
}

impl RunReport {
    /// 指定したリポジトリ・タグで成功した項目
    pub fn successful_item(&self, repo_name: &str, tag: &str) -> Option<&ReportItem> {
        self.items
            .iter()
            .find(|item| item.repo_name == repo_name && item.tag == tag && item.exception.is_none())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportItem {
    pub repo_name: String,
    pub exception: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    pub commit_id: Option<String>,
    pub image_id: Option<String>,
    pub source_desc: String,
    pub tag: String,
    pub line: usize,
}

impl ReportItem {
    fn new(image: &str, entry: &SummaryEntry) -> Self {
        let (exception, kind, commit_id, image_id) = match &entry.outcome {
            LineOutcome::Success {
                artifact_id,
                commit_id,
            } => (None, None, commit_id.clone(), Some(artifact_id.clone())),
            LineOutcome::Failure { kind, error } => {
                (Some(error.clone()), Some(*kind), None, None)
            }
        };
        Self {
            repo_name: image.to_string(),
            exception,
            kind,
            commit_id,
            image_id,
            source_desc: entry.source.clone(),
            tag: entry.tag.clone(),
            line: entry.line,
        }
    }
}

fn report_id(build_date: &DateTime<Utc>) -> String {
    build_date.format("%Y%m%dT%H%M%S%3fZ").to_string()
}

/// 生の行テキストから `(tag, source_descriptor)` を復元する
///
/// パーサーとは独立した簡易的な解釈で、不正な行にも何らかの値を返します。
pub fn describe_line(raw: &str) -> (String, String) {
    let trimmed = raw.trim();

    if let Some((tag, rest)) = trimmed.split_once(':') {
        let tag = tag.trim();
        if !tag.chars().any(char::is_whitespace) && !rest.starts_with("//") {
            let source = rest.split_whitespace().collect::<Vec<_>>().join(" ");
            return (tag_or_default(tag), source);
        }
    }

    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    match tokens.as_slice() {
        [url] => (
            DEFAULT_TAG.to_string(),
            format!("{}@{}", url, DEFAULT_SOURCE_REF),
        ),
        [tag, url] => (tag.to_string(), format!("{}@{}", url, DEFAULT_SOURCE_REF)),
        [tag, url, reference] => (tag.to_string(), format!("{}@{}", url, reference)),
        _ => (DEFAULT_TAG.to_string(), trimmed.to_string()),
    }
}

fn tag_or_default(tag: &str) -> String {
    if tag.is_empty() {
        DEFAULT_TAG.to_string()
    } else {
        tag.to_string()
    }
}
