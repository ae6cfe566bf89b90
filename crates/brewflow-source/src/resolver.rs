//! ワークスペースの解決
//!
//! [`Version`] が指定する ref の作業ツリーを用意します。ソース URL は1回の実行で1度だけクローンし、
//! 同じ URL の以降の Version はそのクローン内でチェックアウトまたは pull します。
//! 書かれたままの ref で取得できない場合は `refs/tags/<ref>` で同じ手順を繰り返します。

use crate::error::{Result, SourceError};
use crate::vcs::Vcs;
use crate::workspace::{Staging, Workspace};
use brewflow_core::Version;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// コンテキストディレクトリに必須のビルド定義ファイル
pub const BUILD_DESCRIPTOR: &str = "Dockerfile";

/// 要求された ref の試し方
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefAttempt {
    /// 定義に書かれたままの ref（ブランチ・コミット・完全な ref）
    Branch(String),
    /// `refs/tags/<ref>`
    Tag(String),
}

impl RefAttempt {
    /// 試行順の一覧（`refs/` で始まる ref はタグで再試行しない）
    pub fn plan(git_ref: &str) -> Vec<RefAttempt> {
        let mut attempts = vec![RefAttempt::Branch(git_ref.to_string())];
        if !git_ref.starts_with("refs/") {
            attempts.push(RefAttempt::Tag(format!("refs/tags/{}", git_ref)));
        }
        attempts
    }

    pub fn git_ref(&self) -> &str {
        match self {
            RefAttempt::Branch(r) | RefAttempt::Tag(r) => r,
        }
    }
}

/// ビルド可能な状態の作業ツリー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub context_dir: PathBuf,
    pub commit_id: String,
    /// この解決でクローンしたかどうか
    pub fresh_clone: bool,
    pub resolved_ref: String,
}

/// ソース URL 1つ分のワークスペースへの排他アクセス
///
/// Version の解決からビルドまで保持され、同じ URL の Version 同士が作業ツリーを動かし合うことはありません。
pub struct WorkspaceLease {
    url: String,
    slot: OwnedMutexGuard<Option<Workspace>>,
}

impl WorkspaceLease {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn workspace(&self) -> Option<&Workspace> {
        self.slot.as_ref()
    }
}

type Slot = Arc<Mutex<Option<Workspace>>>;

pub struct WorkspaceResolver {
    vcs: Arc<dyn Vcs>,
    repos_folder: Option<PathBuf>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl WorkspaceResolver {
    pub fn new(vcs: Arc<dyn Vcs>, repos_folder: Option<PathBuf>) -> Self {
        Self {
            vcs,
            repos_folder,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// `url` のワークスペースの排他アクセスを待つ
    pub async fn lease(&self, url: &str) -> WorkspaceLease {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(url.to_string()).or_default().clone()
        };
        WorkspaceLease {
            url: url.to_string(),
            slot: slot.lock_owned().await,
        }
    }

    /// リース中のワークスペースを `version` に合わせ、ビルドコンテキストを返す
    #[tracing::instrument(skip(self, lease, version), fields(url = %version.source_url, git_ref = %version.git_ref))]
    pub async fn resolve(
        &self,
        lease: &mut WorkspaceLease,
        version: &Version,
        image: &str,
    ) -> Result<ResolvedSource> {
        let mut last_error = None;

        for attempt in RefAttempt::plan(&version.git_ref) {
            match self.try_attempt(lease, version, image, &attempt).await {
                Ok(fresh_clone) => {
                    let workspace = lease
                        .slot
                        .as_ref()
                        .ok_or_else(|| SourceError::RefNotFound(version.git_ref.clone()))?;
                    let commit_id = self.vcs.head(workspace.repo()).await?;
                    let context_dir = context_dir(workspace.path(), &version.subdirectory)?;

                    tracing::info!(commit = %commit_id, git_ref = attempt.git_ref(), "Source resolved");
                    return Ok(ResolvedSource {
                        context_dir,
                        commit_id,
                        fresh_clone,
                        resolved_ref: attempt.git_ref().to_string(),
                    });
                }
                Err(e) => {
                    tracing::warn!(git_ref = attempt.git_ref(), error = %e, "Ref attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(SourceError::FetchFailed {
            url: version.source_url.clone(),
            git_ref: version.git_ref.clone(),
            cause: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempt made".to_string()),
        })
    }

    /// 新たにクローンした場合は true
    async fn try_attempt(
        &self,
        lease: &mut WorkspaceLease,
        version: &Version,
        image: &str,
        attempt: &RefAttempt,
    ) -> Result<bool> {
        let git_ref = attempt.git_ref();

        if let Some(workspace) = lease.slot.as_ref() {
            let repo = workspace.repo();
            let known = match self.vcs.has_ref(repo, git_ref).await {
                Ok(known) => known,
                Err(e) => {
                    tracing::debug!(git_ref, error = %e, "Ref lookup failed");
                    false
                }
            };

            if known {
                match self.vcs.checkout(repo, git_ref).await {
                    Ok(()) => return Ok(false),
                    Err(e) => tracing::debug!(git_ref, error = %e, "Checkout failed, pulling"),
                }
            } else {
                tracing::debug!(git_ref, "Ref not in workspace, pulling");
            }
            self.vcs.pull(&version.source_url, repo, git_ref).await?;
            return Ok(false);
        }

        tracing::info!("Cloning {} (ref: {})", version.source_url, git_ref);
        let staging = Staging::allocate(self.repos_folder.as_deref(), image)?;
        let repo = self
            .vcs
            .clone_repo(&version.source_url, git_ref, staging.path())
            .await?;
        *lease.slot = staging.into_workspace(repo);
        Ok(true)
    }

    /// 実行中の一時ワークスペースをすべて削除
    ///
    /// 解放したワークスペースの数を返します。
    pub async fn release_all(&self) -> usize {
        let slots: Vec<Slot> = self.slots.lock().await.drain().map(|(_, s)| s).collect();
        let mut released = 0;
        for slot in slots {
            if let Some(workspace) = slot.lock().await.take() {
                let url = workspace.url().to_string();
                match workspace.release() {
                    Ok(()) => released += 1,
                    Err(e) => tracing::warn!(url = %url, error = %e, "Failed to release workspace"),
                }
            }
        }
        released
    }
}

/// `root` 内のビルドコンテキスト（ツリー外を指さず、Dockerfile を含むこと）
fn context_dir(root: &Path, subdirectory: &str) -> Result<PathBuf> {
    let relative = Path::new(subdirectory);
    let escapes = relative
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes {
        return Err(SourceError::InvalidSubdirectory(subdirectory.to_string()));
    }

    let dir = root.join(relative);
    if !dir.join(BUILD_DESCRIPTOR).is_file() {
        return Err(SourceError::DescriptorMissing { path: dir });
    }
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcs::RepoHandle;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    /// ref 名ごとのブランチとタグ
    struct FakeVcs {
        refs: HashMap<String, String>,
        /// pull でのみ取得できる ref
        upstream: HashMap<String, String>,
        calls: StdMutex<Vec<String>>,
        current: StdMutex<HashMap<PathBuf, String>>,
    }

    impl FakeVcs {
        fn new(refs: &[(&str, &str)]) -> Arc<Self> {
            Self::with_upstream(refs, &[])
        }

        fn with_upstream(refs: &[(&str, &str)], upstream: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                refs: to_map(refs),
                upstream: to_map(upstream),
                calls: StdMutex::new(Vec::new()),
                current: StdMutex::new(HashMap::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn set_current(&self, repo: &RepoHandle, git_ref: &str) -> Result<()> {
            let commit = self
                .refs
                .get(git_ref)
                .or_else(|| self.upstream.get(git_ref))
                .ok_or_else(|| SourceError::RefNotFound(git_ref.to_string()))?;
            self.current
                .lock()
                .unwrap()
                .insert(repo.path.clone(), commit.clone());
            Ok(())
        }
    }

    #[async_trait]
    impl Vcs for FakeVcs {
        async fn clone_repo(&self, url: &str, git_ref: &str, dest: &Path) -> Result<RepoHandle> {
            self.calls.lock().unwrap().push(format!("clone {}", git_ref));
            std::fs::write(dest.join("Dockerfile"), "FROM scratch\n")?;
            std::fs::create_dir_all(dest.join("alpine"))?;
            std::fs::write(dest.join("alpine/Dockerfile"), "FROM alpine\n")?;
            std::fs::create_dir_all(dest.join("docs"))?;
            let repo = RepoHandle {
                path: dest.to_path_buf(),
                url: url.to_string(),
            };
            self.set_current(&repo, git_ref)?;
            Ok(repo)
        }

        async fn checkout(&self, repo: &RepoHandle, git_ref: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("checkout {}", git_ref));
            if !self.refs.contains_key(git_ref) {
                return Err(SourceError::RefNotFound(git_ref.to_string()));
            }
            self.set_current(repo, git_ref)
        }

        async fn pull(&self, _origin: &str, repo: &RepoHandle, git_ref: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("pull {}", git_ref));
            self.set_current(repo, git_ref)
        }

        async fn head(&self, repo: &RepoHandle) -> Result<String> {
            Ok(self
                .current
                .lock()
                .unwrap()
                .get(&repo.path)
                .cloned()
                .unwrap_or_default())
        }

        async fn has_ref(&self, _repo: &RepoHandle, git_ref: &str) -> Result<bool> {
            Ok(self.refs.contains_key(git_ref))
        }

        async fn resolve_ref(&self, _repo: &RepoHandle, git_ref: &str) -> Result<String> {
            self.refs
                .get(git_ref)
                .cloned()
                .ok_or_else(|| SourceError::RefNotFound(git_ref.to_string()))
        }
    }

    fn to_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(r, c)| (r.to_string(), c.to_string()))
            .collect()
    }

    const URL: &str = "https://github.com/x/y";

    #[test]
    fn test_plan_adds_tag_fallback() {
        assert_eq!(
            RefAttempt::plan("v1"),
            vec![
                RefAttempt::Branch("v1".to_string()),
                RefAttempt::Tag("refs/tags/v1".to_string())
            ]
        );
        assert_eq!(
            RefAttempt::plan("refs/heads/master"),
            vec![RefAttempt::Branch("refs/heads/master".to_string())]
        );
    }

    #[tokio::test]
    async fn test_fresh_clone() {
        let vcs = FakeVcs::new(&[("master", "c1")]);
        let resolver = WorkspaceResolver::new(vcs.clone(), None);
        let mut lease = resolver.lease(URL).await;

        let source = resolver
            .resolve(&mut lease, &Version::new(URL, "master", None), "redis")
            .await
            .unwrap();

        assert!(source.fresh_clone);
        assert_eq!(source.commit_id, "c1");
        assert_eq!(source.resolved_ref, "master");
        assert!(source.context_dir.join("Dockerfile").is_file());
        assert_eq!(vcs.calls(), vec!["clone master"]);
    }

    #[tokio::test]
    async fn test_clone_falls_back_to_tag() {
        let vcs = FakeVcs::new(&[("refs/tags/v1", "t1")]);
        let resolver = WorkspaceResolver::new(vcs.clone(), None);
        let mut lease = resolver.lease(URL).await;

        let source = resolver
            .resolve(&mut lease, &Version::new(URL, "v1", None), "redis")
            .await
            .unwrap();

        assert_eq!(source.commit_id, "t1");
        assert_eq!(source.resolved_ref, "refs/tags/v1");
        assert_eq!(vcs.calls(), vec!["clone v1", "clone refs/tags/v1"]);
    }

    #[tokio::test]
    async fn test_missing_ref_fails_without_leftovers() {
        let folder = tempfile::tempdir().unwrap();
        let vcs = FakeVcs::new(&[("master", "c1")]);
        let resolver = WorkspaceResolver::new(vcs.clone(), Some(folder.path().to_path_buf()));
        let mut lease = resolver.lease(URL).await;

        let err = resolver
            .resolve(&mut lease, &Version::new(URL, "nope", None), "redis")
            .await
            .unwrap_err();

        assert!(matches!(err, SourceError::FetchFailed { .. }));
        assert!(lease.workspace().is_none());
        assert_eq!(std::fs::read_dir(folder.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_existing_workspace_checkout_pull_and_tag() {
        let vcs = FakeVcs::new(&[("master", "c1"), ("dev", "c2"), ("refs/tags/v3", "t3")]);
        let resolver = WorkspaceResolver::new(vcs.clone(), None);
        let mut lease = resolver.lease(URL).await;

        resolver
            .resolve(&mut lease, &Version::new(URL, "master", None), "redis")
            .await
            .unwrap();
        let dev = resolver
            .resolve(&mut lease, &Version::new(URL, "dev", None), "redis")
            .await
            .unwrap();
        assert!(!dev.fresh_clone);
        assert_eq!(dev.commit_id, "c2");

        let tag = resolver
            .resolve(&mut lease, &Version::new(URL, "v3", None), "redis")
            .await
            .unwrap();
        assert_eq!(tag.commit_id, "t3");

        assert_eq!(
            vcs.calls(),
            vec![
                "clone master",
                "checkout dev",
                "pull v3",
                "checkout refs/tags/v3",
            ]
        );
    }

    #[tokio::test]
    async fn test_ref_missing_from_workspace_is_pulled() {
        let vcs = FakeVcs::with_upstream(&[("master", "c1")], &[("release", "c9")]);
        let resolver = WorkspaceResolver::new(vcs.clone(), None);
        let mut lease = resolver.lease(URL).await;

        resolver
            .resolve(&mut lease, &Version::new(URL, "master", None), "redis")
            .await
            .unwrap();
        let release = resolver
            .resolve(&mut lease, &Version::new(URL, "release", None), "redis")
            .await
            .unwrap();

        assert!(!release.fresh_clone);
        assert_eq!(release.commit_id, "c9");
        assert_eq!(vcs.calls(), vec!["clone master", "pull release"]);
    }

    #[tokio::test]
    async fn test_qualified_ref_has_no_tag_fallback() {
        let vcs = FakeVcs::new(&[("refs/tags/refs/heads/gone", "x")]);
        let resolver = WorkspaceResolver::new(vcs.clone(), None);
        let mut lease = resolver.lease(URL).await;

        let err = resolver
            .resolve(&mut lease, &Version::new(URL, "refs/heads/gone", None), "redis")
            .await
            .unwrap_err();

        assert!(matches!(err, SourceError::FetchFailed { .. }));
        assert_eq!(vcs.calls(), vec!["clone refs/heads/gone"]);
    }

    #[tokio::test]
    async fn test_subdirectory_context() {
        let vcs = FakeVcs::new(&[("master", "c1")]);
        let resolver = WorkspaceResolver::new(vcs.clone(), None);
        let mut lease = resolver.lease(URL).await;

        let source = resolver
            .resolve(&mut lease, &Version::new(URL, "master", Some("alpine")), "redis")
            .await
            .unwrap();
        assert!(source.context_dir.ends_with("alpine"));

        let err = resolver
            .resolve(&mut lease, &Version::new(URL, "master", Some("docs")), "redis")
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::DescriptorMissing { .. }));

        let err = resolver
            .resolve(&mut lease, &Version::new(URL, "master", Some("../other")), "redis")
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::InvalidSubdirectory(_)));
    }

    #[tokio::test]
    async fn test_release_all_removes_temporary_workspaces() {
        let vcs = FakeVcs::new(&[("master", "c1")]);
        let resolver = WorkspaceResolver::new(vcs.clone(), None);

        let path = {
            let mut lease = resolver.lease(URL).await;
            resolver
                .resolve(&mut lease, &Version::new(URL, "master", None), "redis")
                .await
                .unwrap();
            lease.workspace().unwrap().path().to_path_buf()
        };
        assert!(path.exists());

        assert_eq!(resolver.release_all().await, 1);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_release_all_keeps_fixed_workspaces() {
        let folder = tempfile::tempdir().unwrap();
        let vcs = FakeVcs::new(&[("master", "c1")]);
        let resolver = WorkspaceResolver::new(vcs.clone(), Some(folder.path().to_path_buf()));

        {
            let mut lease = resolver.lease(URL).await;
            resolver
                .resolve(&mut lease, &Version::new(URL, "master", None), "redis")
                .await
                .unwrap();
        }

        assert_eq!(resolver.release_all().await, 1);
        assert_eq!(std::fs::read_dir(folder.path()).unwrap().count(), 1);
    }
}
