//! ビルドのオーケストレーション
//!
//! 1回の実行でライブラリの定義ファイルをすべて処理し、Version ごとに1度だけビルドして
//! 全 namespace にタグ付けし、設定があればプッシュします。
//! Version は `max_parallel` まで並行に処理され、同じソース URL の Version は
//! ワークスペースのリースで順番待ちになります。

use crate::context::RunContext;
use crate::error::{LineError, Result, RunError};
use crate::library::Library;
use brewflow_build::{Builder, ImageReference};
use brewflow_config::BrewConfig;
use brewflow_core::parser::parse_definition;
use brewflow_core::{
    CachedBuild, DefinitionError, FailureKind, RunSummary, SourceLine, Version, VersionEntry,
};
use brewflow_source::Vcs;
use brewflow_state::{HistoryRecord, HistoryStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub struct Orchestrator {
    config: Arc<BrewConfig>,
    vcs: Arc<dyn Vcs>,
    builder: Arc<dyn Builder>,
}

impl Orchestrator {
    pub fn new(config: BrewConfig, vcs: Arc<dyn Vcs>, builder: Arc<dyn Builder>) -> Self {
        Self {
            config: Arc::new(config),
            vcs,
            builder,
        }
    }

    pub fn config(&self) -> &BrewConfig {
        &self.config
    }

    pub async fn run(&self) -> Result<RunSummary> {
        self.run_with(CancellationToken::new()).await
    }

    /// ライブラリ全体を1回ビルド
    ///
    /// エラーを返すのは、どの行も処理できない致命的な場合だけです。
    /// `cancel` がキャンセルされると処理中の作業を止め、該当行は `Cancelled` になります。
    #[tracing::instrument(skip_all, fields(library = %self.config.library.repository))]
    pub async fn run_with(&self, cancel: CancellationToken) -> Result<RunSummary> {
        self.builder
            .ping()
            .await
            .map_err(|e| RunError::DaemonUnreachable(e.to_string()))?;

        let library = Library::open(&self.config.library, self.vcs.as_ref()).await?;
        let files = library
            .definition_files(self.config.targets.as_deref())
            .await?;

        let ctx = Arc::new(RunContext::new(
            self.config.clone(),
            self.vcs.clone(),
            self.builder.clone(),
            cancel,
        ));

        let history = self.config.history.as_ref().map(HistoryStore::new);
        if let Some(store) = &history {
            let records = store.load().await?;
            ctx.cache
                .seed(records.into_iter().map(CachedBuild::from))
                .await;
        }

        let mut tasks = JoinSet::new();
        let mut pending: HashMap<tokio::task::Id, (String, Vec<SourceLine>)> = HashMap::new();

        for file in files {
            let content = match file.read().await {
                Ok(content) => content,
                Err(e) => {
                    ctx.record_failure(&file.name, 0, "", FailureKind::Other, e)
                        .await;
                    continue;
                }
            };

            tracing::info!("Processing {}", file.name);
            let definition = parse_definition(&file.name, &content, self.config.grammar);
            for error in definition.malformed() {
                let DefinitionError::MalformedDefinition { line, raw, .. } = error;
                ctx.record_failure(
                    &file.name,
                    *line,
                    raw,
                    FailureKind::MalformedDefinition,
                    error,
                )
                .await;
            }

            if definition.versions().is_empty() {
                continue;
            }
            if self.config.prefill && !ctx.cancel.is_cancelled() {
                self.builder.prefill(&file.name).await;
            }

            for entry in definition.into_versions() {
                let lines = entry.lines.clone();
                let handle = tasks.spawn(process_version(ctx.clone(), file.name.clone(), entry));
                pending.insert(handle.id(), (file.name.clone(), lines));
            }
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, ())) => {
                    pending.remove(&id);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Build task aborted");
                    if let Some((image, lines)) = pending.remove(&e.id()) {
                        for line in lines {
                            ctx.record_failure(&image, line.number, &line.raw, FailureKind::Other, &e)
                                .await;
                        }
                    }
                }
            }
        }

        let released = ctx.resolver.release_all().await;
        tracing::debug!("Released {} workspaces", released);

        if let Some(store) = &history {
            let records: Vec<HistoryRecord> = ctx
                .cache
                .snapshot()
                .await
                .into_iter()
                .map(HistoryRecord::from)
                .collect();
            if let Err(e) = store.save(&records).await {
                tracing::warn!(path = %store.path().display(), error = %e, "Failed to save build history");
            }
        }
        drop(library);

        let summary = ctx.take_summary().await.finalize();
        tracing::info!(
            success = summary.success,
            failures = summary.failures(),
            "Run finished"
        );
        Ok(summary)
    }
}

/// 1つの Version をビルド・タグ付け・プッシュし、全行の結果を記録
async fn process_version(ctx: Arc<RunContext>, image: String, entry: VersionEntry) {
    let VersionEntry {
        version,
        tags,
        lines,
    } = entry;

    // 全タグの配信が終わるまで保持する
    let permit = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => None,
        permit = ctx.limit.clone().acquire_owned() => permit.ok(),
    };
    let outcome = match &permit {
        Some(_) => obtain_build(&ctx, &image, &version).await,
        None => Err(LineError::Cancelled),
    };

    let build = match outcome {
        Ok(build) => build,
        Err(e) => {
            let kind = e.kind();
            for line in &lines {
                ctx.record_failure(&image, line.number, &line.raw, kind, &e)
                    .await;
            }
            return;
        }
    };

    let mut outcomes: HashMap<String, std::result::Result<(), LineError>> = HashMap::new();
    for tag in &tags {
        let outcome = deliver(&ctx, &image, tag, &build).await;
        outcomes.insert(tag.clone(), outcome);
    }

    for line in &lines {
        match outcomes.get(&line.tag) {
            Some(Err(e)) => {
                ctx.record_failure(&image, line.number, &line.raw, e.kind(), e)
                    .await
            }
            _ => {
                ctx.record_success(
                    &image,
                    line.number,
                    &line.raw,
                    &build.artifact_id,
                    build.commit_id.clone(),
                )
                .await
            }
        }
    }
}

/// `version` のビルド結果（未ビルドならここでビルド）
///
/// キャッシュ確認から解決・ビルドまでリースを保持するため、同じ Version が2回ビルドされることはありません。
async fn obtain_build(
    ctx: &RunContext,
    image: &str,
    version: &Version,
) -> std::result::Result<CachedBuild, LineError> {
    let mut lease = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => return Err(LineError::Cancelled),
        lease = ctx.resolver.lease(&version.source_url) => lease,
    };

    if let Some(hit) = ctx.cache.lookup(version).await {
        tracing::info!(image, artifact_id = %hit.artifact_id, "Image already built, skipping");
        return Ok(hit);
    }

    let work = async {
        let source = ctx.resolver.resolve(&mut lease, version, image).await?;
        let output = ctx.builder.build(&source.context_dir).await?;
        Ok::<_, LineError>((source, output))
    };
    let (source, output) = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => return Err(LineError::Cancelled),
        result = work => result?,
    };

    ctx.cache
        .record(version, &output.artifact_id, Some(source.commit_id.clone()))
        .await;
    Ok(CachedBuild {
        version: version.clone(),
        artifact_id: output.artifact_id,
        commit_id: Some(source.commit_id),
    })
}

/// 全 namespace で `tag` を付け、設定されていればプッシュする
async fn deliver(
    ctx: &RunContext,
    image: &str,
    tag: &str,
    build: &CachedBuild,
) -> std::result::Result<(), LineError> {
    let config = &ctx.config;
    let references = ctx
        .builder
        .tag(&build.artifact_id, image, tag, &config.namespaces)
        .await?;

    if !config.push {
        return Ok(());
    }

    // 失敗しても残りの namespace は push する。halt 時とキャンセル時だけ打ち切る
    let mut first_error = None;
    for reference in &references {
        if let Err(e) = push_reference(ctx, build, reference).await {
            let stop = ctx.push_halted() || ctx.cancel.is_cancelled();
            if first_error.is_none() {
                first_error = Some(e);
            }
            if stop {
                break;
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

async fn push_reference(
    ctx: &RunContext,
    build: &CachedBuild,
    reference: &ImageReference,
) -> std::result::Result<(), LineError> {
    if ctx.cancel.is_cancelled() {
        return Err(LineError::Cancelled);
    }
    if ctx.push_halted() {
        return Err(LineError::PushHalted);
    }

    let registry = ctx.config.registry.as_deref();
    match ctx.builder.push(&build.artifact_id, reference, registry).await {
        Ok(target) => {
            tracing::debug!(target = %target, "Push complete");
            Ok(())
        }
        Err(e) => {
            if ctx.config.push_policy == brewflow_core::PushPolicy::Halt {
                ctx.halt_pushes();
            }
            Err(e.into())
        }
    }
}
