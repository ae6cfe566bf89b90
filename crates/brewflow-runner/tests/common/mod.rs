//! オーケストレーションのテストで共有するフェイク

#![allow(dead_code)]

use async_trait::async_trait;
use brewflow_build::{BuildError, ContainerDaemon, LocalBuilder, LogRecord, RetryConfig};
use brewflow_config::BrewConfig;
use brewflow_runner::{LIBRARY_DIR, Orchestrator};
use brewflow_source::{RepoHandle, SourceError, Vcs};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use tempfile::TempDir;

pub const REDIS_URL: &str = "https://github.com/x/redis";
pub const NGINX_URL: &str = "https://github.com/x/nginx";

/// URL ごとのリモートリポジトリ（ref 名 → コミット）
#[derive(Default)]
pub struct FakeVcs {
    remotes: HashMap<String, HashMap<String, String>>,
    current: Mutex<HashMap<PathBuf, String>>,
    pub clones: Mutex<Vec<String>>,
}

impl FakeVcs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_remote(mut self, url: &str, refs: &[(&str, &str)]) -> Self {
        let refs = refs
            .iter()
            .map(|(r, c)| (r.to_string(), c.to_string()))
            .collect();
        self.remotes.insert(url.to_string(), refs);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn clone_count(&self) -> usize {
        self.clones.lock().unwrap().len()
    }

    fn commit_of(&self, url: &str, git_ref: &str) -> brewflow_source::Result<String> {
        let refs = self
            .remotes
            .get(url)
            .ok_or_else(|| SourceError::RefNotFound(format!("{} (unknown remote)", url)))?;
        let short = git_ref.strip_prefix("refs/heads/").unwrap_or(git_ref);
        refs.get(git_ref)
            .or_else(|| refs.get(short))
            .cloned()
            .ok_or_else(|| SourceError::RefNotFound(git_ref.to_string()))
    }

    fn move_to(&self, repo: &RepoHandle, git_ref: &str) -> brewflow_source::Result<()> {
        let commit = self.commit_of(&repo.url, git_ref)?;
        self.current
            .lock()
            .unwrap()
            .insert(repo.path.clone(), commit);
        Ok(())
    }
}

#[async_trait]
impl Vcs for FakeVcs {
    async fn clone_repo(
        &self,
        url: &str,
        git_ref: &str,
        dest: &Path,
    ) -> brewflow_source::Result<RepoHandle> {
        self.clones
            .lock()
            .unwrap()
            .push(format!("{}@{}", url, git_ref));
        self.commit_of(url, git_ref)?;

        std::fs::write(dest.join("Dockerfile"), "FROM scratch\n")?;
        std::fs::create_dir_all(dest.join("alpine"))?;
        std::fs::write(dest.join("alpine/Dockerfile"), "FROM alpine\n")?;
        let repo = RepoHandle {
            path: dest.to_path_buf(),
            url: url.to_string(),
        };
        self.move_to(&repo, git_ref)?;
        Ok(repo)
    }

    async fn checkout(&self, repo: &RepoHandle, git_ref: &str) -> brewflow_source::Result<()> {
        self.move_to(repo, git_ref)
    }

    async fn pull(
        &self,
        _origin: &str,
        repo: &RepoHandle,
        git_ref: &str,
    ) -> brewflow_source::Result<()> {
        self.move_to(repo, git_ref)
    }

    async fn head(&self, repo: &RepoHandle) -> brewflow_source::Result<String> {
        Ok(self
            .current
            .lock()
            .unwrap()
            .get(&repo.path)
            .cloned()
            .unwrap_or_default())
    }

    async fn has_ref(&self, repo: &RepoHandle, git_ref: &str) -> brewflow_source::Result<bool> {
        Ok(self.commit_of(&repo.url, git_ref).is_ok())
    }

    async fn resolve_ref(&self, repo: &RepoHandle, git_ref: &str) -> brewflow_source::Result<String> {
        self.commit_of(&repo.url, git_ref)
    }
}

/// 即座にビルドし、プッシュを拒否させることもできるデーモン
#[derive(Default)]
pub struct FakeDaemon {
    pub unreachable: bool,
    /// エラーを返すプッシュ試行の残り回数
    pub failing_pushes: Mutex<u32>,
    pub builds: Mutex<Vec<PathBuf>>,
    pub tags: Mutex<Vec<(String, String)>>,
    pub pushes: Mutex<Vec<String>>,
    pub pulls: Mutex<Vec<String>>,
}

impl FakeDaemon {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_pushes(count: u32) -> Arc<Self> {
        Arc::new(Self {
            failing_pushes: Mutex::new(count),
            ..Default::default()
        })
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            unreachable: true,
            ..Default::default()
        })
    }

    pub fn build_count(&self) -> usize {
        self.builds.lock().unwrap().len()
    }

    /// これまでに付けた `repository:tag`
    pub fn tagged(&self) -> Vec<String> {
        self.tags
            .lock()
            .unwrap()
            .iter()
            .map(|(_, reference)| reference.clone())
            .collect()
    }

    pub fn push_count(&self) -> usize {
        self.pushes.lock().unwrap().len()
    }
}

#[async_trait]
impl ContainerDaemon for FakeDaemon {
    async fn ping(&self) -> brewflow_build::Result<()> {
        if self.unreachable {
            return Err(BuildError::DaemonUnreachable("connection refused".to_string()));
        }
        Ok(())
    }

    async fn build(&self, context_dir: &Path) -> brewflow_build::Result<Vec<LogRecord>> {
        let mut builds = self.builds.lock().unwrap();
        builds.push(context_dir.to_path_buf());
        let id = format!("feed{:08x}", builds.len());
        Ok(vec![
            LogRecord::Stream("Step 1/1 : FROM scratch\n".to_string()),
            LogRecord::Stream(format!("Successfully built {}\n", id)),
        ])
    }

    async fn tag(&self, artifact_id: &str, repository: &str, tag: &str) -> brewflow_build::Result<()> {
        self.tags
            .lock()
            .unwrap()
            .push((artifact_id.to_string(), format!("{}:{}", repository, tag)));
        Ok(())
    }

    async fn push(&self, repository: &str, tag: &str) -> brewflow_build::Result<String> {
        self.pushes
            .lock()
            .unwrap()
            .push(format!("{}:{}", repository, tag));
        let mut failing = self.failing_pushes.lock().unwrap();
        if *failing > 0 {
            *failing -= 1;
            return Ok(r#"{"error":"denied: requested access to the resource is denied"}"#.to_string());
        }
        Ok(r#"{"status":"Pushed"}"#.to_string())
    }

    async fn pull(&self, image: &str) -> brewflow_build::Result<()> {
        self.pulls.lock().unwrap().push(image.to_string());
        Ok(())
    }
}

/// 指定した `library/<name>` ファイルを持つローカルライブラリ
pub fn library(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path().join(LIBRARY_DIR);
    std::fs::create_dir_all(&dir).unwrap();
    for (name, content) in files {
        std::fs::write(dir.join(name), content).unwrap();
    }
    temp_dir
}

pub fn config_for(library: &TempDir) -> BrewConfig {
    let mut config = BrewConfig::default();
    config.library.repository = library.path().display().to_string();
    config.prefill = false;
    config.state_dir = Some(library.path().join("state"));
    config
}

pub fn orchestrator(config: BrewConfig, vcs: Arc<FakeVcs>, daemon: Arc<FakeDaemon>) -> Orchestrator {
    let builder = LocalBuilder::new(daemon, RetryConfig::immediate(4)).unwrap();
    Orchestrator::new(config, vcs, Arc::new(builder))
}

pub fn redis_remote() -> Arc<FakeVcs> {
    FakeVcs::new()
        .with_remote(REDIS_URL, &[("master", "c0ffee01"), ("v2", "c0ffee02")])
        .with_remote(NGINX_URL, &[("master", "beef0001"), ("refs/tags/1.25", "beef0125")])
        .shared()
}
