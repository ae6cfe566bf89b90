//! ビルドログの解析
//!
//! デーモンが返すログレコードから成果物のイメージIDを取り出します。
//! 成功判定は `Successfully built <hex>` 行で行い、デーモンの補助的なイメージIDは
//! その行が見つからない場合にだけ使います。

use crate::error::{BuildError, Result};
use regex::Regex;
use serde_json::Value;

/// デーモンから受け取ったビルドログの1レコード
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// 構造化された `stream` 断片
    Stream(String),
    /// 未解析の行（`{"stream": "..."}` が連結されていることがある）
    Raw(String),
    /// デーモンのエラーレコード
    Error(String),
    /// デーモンが報告したイメージID（`aux.ID`）
    ImageId(String),
}

/// 解析済みのビルドログ
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildLog {
    pub lines: Vec<String>,
    pub errors: Vec<String>,
    built_id: Option<String>,
    aux_id: Option<String>,
}

impl BuildLog {
    /// 成果物のイメージID
    pub fn artifact_id(&self) -> Option<&str> {
        self.built_id.as_deref().or(self.aux_id.as_deref())
    }

    pub fn into_lines(self) -> Vec<String> {
        let mut lines = self.lines;
        lines.extend(self.errors);
        lines
    }
}

pub struct LogParser {
    success: Regex,
    stream_object: Regex,
}

impl LogParser {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| BuildError::Context(format!("正規表現のコンパイルエラー: {}", e)))
        };
        Ok(Self {
            success: compile(r"^Successfully built ([a-f0-9]+)\s*$")?,
            stream_object: compile(r#"\{\s*"stream"\s*:\s*"(?:[^"\\]|\\.)*"\s*\}"#)?,
        })
    }

    pub fn parse(&self, records: &[LogRecord]) -> BuildLog {
        let mut log = BuildLog::default();
        // 断片は行の途中で切れていることがあるため連結してから行に分ける
        let mut text = String::new();

        for record in records {
            match record {
                LogRecord::Stream(fragment) => text.push_str(fragment),
                LogRecord::Raw(raw) => self.parse_raw(raw, &mut text, &mut log),
                LogRecord::Error(message) => log.errors.push(message.clone()),
                LogRecord::ImageId(id) => log.aux_id = Some(id.clone()),
            }
        }

        for line in text.lines() {
            if let Some(caps) = self.success.captures(line) {
                log.built_id = Some(caps[1].to_string());
            }
            log.lines.push(line.to_string());
        }

        log
    }

    fn parse_raw(&self, raw: &str, text: &mut String, log: &mut BuildLog) {
        if let Ok(value) = serde_json::from_str::<Value>(raw) {
            apply_value(&value, text, log);
            return;
        }

        // 複数のオブジェクトが連結された行から stream 部分だけを取り出す
        let mut matched = false;
        for m in self.stream_object.find_iter(raw) {
            if let Ok(value) = serde_json::from_str::<Value>(m.as_str()) {
                apply_value(&value, text, log);
                matched = true;
            }
        }

        if !matched {
            text.push_str(raw);
            if !raw.ends_with('\n') {
                text.push('\n');
            }
        }
    }
}

fn apply_value(value: &Value, text: &mut String, log: &mut BuildLog) {
    if let Some(stream) = value.get("stream").and_then(Value::as_str) {
        text.push_str(stream);
    }
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        log.errors.push(error.to_string());
    }
    if let Some(id) = value
        .get("aux")
        .and_then(|aux| aux.get("ID"))
        .and_then(Value::as_str)
    {
        log.aux_id = Some(id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> LogParser {
        LogParser::new().unwrap()
    }

    #[test]
    fn test_successfully_built_line() {
        let records = vec![
            LogRecord::Stream("Step 1/2 : FROM alpine\n".to_string()),
            LogRecord::Stream(" ---> a1b2c3\n".to_string()),
            LogRecord::Stream("Successfully built 4f5e6d7c8b9a\n".to_string()),
        ];
        let log = parser().parse(&records);
        assert_eq!(log.artifact_id(), Some("4f5e6d7c8b9a"));
        assert_eq!(log.lines.len(), 3);
    }

    #[test]
    fn test_fragments_split_mid_line() {
        let records = vec![
            LogRecord::Stream("Successfully bu".to_string()),
            LogRecord::Stream("ilt deadbeef\n".to_string()),
        ];
        assert_eq!(parser().parse(&records).artifact_id(), Some("deadbeef"));
    }

    #[test]
    fn test_concatenated_raw_objects() {
        let raw = r#"{"stream":"Step 1/1 : FROM scratch\n"}{"stream":"Successfully built 0123abcd\n"}"#;
        let log = parser().parse(&[LogRecord::Raw(raw.to_string())]);
        assert_eq!(log.artifact_id(), Some("0123abcd"));
        assert_eq!(log.lines[0], "Step 1/1 : FROM scratch");
    }

    #[test]
    fn test_single_raw_object() {
        let raw = r#"{"stream": "Successfully built abc123\n"}"#;
        let log = parser().parse(&[LogRecord::Raw(raw.to_string())]);
        assert_eq!(log.artifact_id(), Some("abc123"));
    }

    #[test]
    fn test_aux_id_used_only_without_success_line() {
        let aux_only = vec![
            LogRecord::Stream("Step 1/1 : FROM scratch\n".to_string()),
            LogRecord::ImageId("sha256:feed".to_string()),
        ];
        assert_eq!(parser().parse(&aux_only).artifact_id(), Some("sha256:feed"));

        let both = vec![
            LogRecord::ImageId("sha256:feed".to_string()),
            LogRecord::Stream("Successfully built beef\n".to_string()),
        ];
        assert_eq!(parser().parse(&both).artifact_id(), Some("beef"));
    }

    #[test]
    fn test_no_artifact_keeps_errors() {
        let records = vec![
            LogRecord::Stream("Step 1/2 : RUN false\n".to_string()),
            LogRecord::Error("The command '/bin/sh -c false' returned a non-zero code: 1".to_string()),
        ];
        let log = parser().parse(&records);
        assert_eq!(log.artifact_id(), None);
        let lines = log.into_lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("non-zero code"));
    }

    #[test]
    fn test_success_text_must_be_hex() {
        let records = vec![LogRecord::Stream("Successfully built my-image\n".to_string())];
        assert_eq!(parser().parse(&records).artifact_id(), None);
    }

    #[test]
    fn test_plain_raw_line_is_kept() {
        let log = parser().parse(&[LogRecord::Raw("not json at all".to_string())]);
        assert_eq!(log.lines, vec!["not json at all"]);
        assert_eq!(log.artifact_id(), None);
    }
}
