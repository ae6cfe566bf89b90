//! 実行ポリシー

use serde::{Deserialize, Serialize};

/// push 失敗時の振る舞い
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushPolicy {
    /// 失敗した行だけを失敗として記録し、以降の push も続ける
    #[default]
    Continue,
    /// 最初の失敗以降、この実行での push をすべて見送る
    Halt,
}

impl PushPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "continue" => Some(PushPolicy::Continue),
            "halt" => Some(PushPolicy::Halt),
            _ => None,
        }
    }
}
