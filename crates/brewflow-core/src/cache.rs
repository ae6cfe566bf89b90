//! ビルド済みバージョンのキャッシュ
//!
//! 1回の実行中に同じ Version を二度ビルドしないためのマップです。
//! 前回までの履歴から初期化することもできます。

use crate::model::Version;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// キャッシュキーの生成方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStrategy {
    /// Version そのものをキーにする（正準）
    #[default]
    Version,
    /// `sha256(url, ref, subdirectory)` をキーにする
    ///
    /// 衝突確率は誕生日限界に従う。正しさはこのキーの一意性に依存しない前提で使うこと。
    Digest,
}

impl KeyStrategy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "version" => Some(KeyStrategy::Version),
            "digest" => Some(KeyStrategy::Digest),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Version(Version),
    Digest(String),
}

impl CacheKey {
    pub fn new(version: &Version, strategy: KeyStrategy) -> Self {
        match strategy {
            KeyStrategy::Version => CacheKey::Version(version.clone()),
            KeyStrategy::Digest => CacheKey::Digest(digest(version)),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Version(v) => write!(f, "{}", v),
            CacheKey::Digest(d) => write!(f, "{}", d),
        }
    }
}

/// Version のダイジェスト（16進小文字）
pub fn digest(version: &Version) -> String {
    let mut hasher = Sha256::new();
    // 区切りに NUL を挟み、連結による曖昧さを避ける
    hasher.update(version.source_url.as_bytes());
    hasher.update([0u8]);
    hasher.update(version.git_ref.as_bytes());
    hasher.update([0u8]);
    hasher.update(version.subdirectory.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// キャッシュされたビルド結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedBuild {
    pub version: Version,
    pub artifact_id: String,
    pub commit_id: Option<String>,
}

/// 実行スコープで共有されるバージョンキャッシュ
///
/// クローンしても同じマップを参照します。
#[derive(Debug, Clone, Default)]
pub struct VersionCache {
    strategy: KeyStrategy,
    entries: Arc<RwLock<HashMap<CacheKey, CachedBuild>>>,
}

impl VersionCache {
    pub fn new(strategy: KeyStrategy) -> Self {
        Self {
            strategy,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn strategy(&self) -> KeyStrategy {
        self.strategy
    }

    pub fn key(&self, version: &Version) -> CacheKey {
        CacheKey::new(version, self.strategy)
    }

    pub async fn lookup(&self, version: &Version) -> Option<CachedBuild> {
        let key = self.key(version);
        self.entries.read().await.get(&key).cloned()
    }

    pub async fn record(
        &self,
        version: &Version,
        artifact_id: impl Into<String>,
        commit_id: Option<String>,
    ) {
        let key = self.key(version);
        tracing::info!(key = %key, "Registering as processed");
        self.entries.write().await.insert(
            key,
            CachedBuild {
                version: version.clone(),
                artifact_id: artifact_id.into(),
                commit_id,
            },
        );
    }

    /// 永続化された履歴でキャッシュを初期化
    pub async fn seed(&self, builds: impl IntoIterator<Item = CachedBuild>) {
        let mut entries = self.entries.write().await;
        for build in builds {
            entries.insert(CacheKey::new(&build.version, self.strategy), build);
        }
        tracing::debug!("Seeded version cache with {} entries", entries.len());
    }

    /// 現在のエントリ（Version 順）
    pub async fn snapshot(&self) -> Vec<CachedBuild> {
        let mut builds: Vec<CachedBuild> = self.entries.read().await.values().cloned().collect();
        builds.sort_by(|a, b| a.version.cmp(&b.version));
        builds
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(git_ref: &str) -> Version {
        Version::new("https://github.com/x/y", git_ref, None)
    }

    #[test]
    fn test_key_strategy_from_str() {
        assert_eq!(KeyStrategy::parse("Digest"), Some(KeyStrategy::Digest));
        assert_eq!(KeyStrategy::parse("version"), Some(KeyStrategy::Version));
        assert_eq!(KeyStrategy::parse("sha1"), None);
    }

    #[tokio::test]
    async fn test_empty_cache_misses() {
        let cache = VersionCache::new(KeyStrategy::Version);
        assert!(cache.is_empty().await);
        assert!(cache.lookup(&version("master")).await.is_none());
    }

    #[tokio::test]
    async fn test_record_then_lookup() {
        let cache = VersionCache::new(KeyStrategy::Version);
        cache
            .record(&version("master"), "abc123", Some("c0ffee".to_string()))
            .await;

        let hit = cache.lookup(&version("master")).await.unwrap();
        assert_eq!(hit.artifact_id, "abc123");
        assert_eq!(hit.commit_id.as_deref(), Some("c0ffee"));
        assert!(cache.lookup(&version("v2")).await.is_none());
    }

    #[tokio::test]
    async fn test_subdirectory_is_part_of_key() {
        let cache = VersionCache::new(KeyStrategy::Digest);
        cache.record(&version("master"), "root", None).await;

        let sub = Version::new("https://github.com/x/y", "master", Some("alpine"));
        assert!(cache.lookup(&sub).await.is_none());
        assert_eq!(cache.lookup(&version("master")).await.unwrap().artifact_id, "root");
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let cache = VersionCache::new(KeyStrategy::Version);
        let other = cache.clone();
        other.record(&version("master"), "abc", None).await;
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_seed_and_snapshot() {
        let cache = VersionCache::new(KeyStrategy::Digest);
        cache
            .seed(vec![
                CachedBuild {
                    version: version("v2"),
                    artifact_id: "b".to_string(),
                    commit_id: None,
                },
                CachedBuild {
                    version: version("v1"),
                    artifact_id: "a".to_string(),
                    commit_id: None,
                },
            ])
            .await;

        assert_eq!(cache.lookup(&version("v1")).await.unwrap().artifact_id, "a");
        let snapshot = cache.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].version.git_ref, "v1");
    }

    #[test]
    fn test_digest_is_stable_and_separated() {
        let a = Version::new("ab", "c", None);
        let b = Version::new("a", "bc", None);
        assert_eq!(digest(&a), digest(&a.clone()));
        assert_ne!(digest(&a), digest(&b));
        assert_eq!(digest(&a).len(), 64);
    }
}
