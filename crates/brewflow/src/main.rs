mod commands;
mod output;

use brewflow_config::BrewConfig;
use brewflow_core::{Grammar, KeyStrategy, PushPolicy};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "brewflow")]
#[command(about = "定義ライブラリからコンテナイメージをビルド・タグ付け・公開する", long_about = None)]
struct Cli {
    /// 設定ファイル（省略時は ./brewflow.yaml などを検索）
    #[arg(short, long, global = true, env = "BREWFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// 状態ディレクトリ（レポート・ロックファイル）
    #[arg(long, global = true, env = "BREWFLOW_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// デバッグログを出力
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// ライブラリを1回ビルド
    Build(RunArgs),
    /// ロックを取得して定期的にビルド
    Periodic {
        #[command(flatten)]
        run: RunArgs,
        /// 実行間隔（秒）
        #[arg(long)]
        period: Option<u64>,
        /// ロックファイル
        #[arg(long)]
        lock_file: Option<PathBuf>,
    },
    /// 実行レポートを表示（ID 省略時は最新）
    Status {
        /// レポートID
        id: Option<String>,
    },
    /// 最後に成功したビルドを表示
    Success {
        /// イメージ名
        repo: String,
        /// タグ
        #[arg(short, long, default_value = "latest")]
        tag: String,
    },
    /// バージョン情報を表示
    Version,
}

/// 設定ファイルを上書きするビルドオプション
#[derive(Args, Debug, Default)]
struct RunArgs {
    /// ライブラリ（ローカルパスまたは git URL）
    #[arg(short = 'r', long)]
    repository: Option<String>,
    /// ライブラリのブランチ
    #[arg(short, long)]
    branch: Option<String>,
    /// 名前空間（複数指定可）
    #[arg(short, long = "namespace")]
    namespaces: Vec<String>,
    /// ビルド後にプッシュする
    #[arg(short, long)]
    push: bool,
    /// プッシュ先のレジストリ
    #[arg(long)]
    registry: Option<String>,
    /// 対象イメージ（カンマ区切り）
    #[arg(short, long)]
    targets: Option<String>,
    /// ワークスペースを残すディレクトリ
    #[arg(long)]
    repos_folder: Option<PathBuf>,
    /// ビルド履歴ファイル
    #[arg(long)]
    history: Option<PathBuf>,
    /// 公式イメージの事前 pull を行わない
    #[arg(long)]
    no_prefill: bool,
    /// 最初の失敗で実行を中止する
    #[arg(long)]
    stop_on_error: bool,
    /// プッシュ失敗時の振る舞い (continue, halt)
    #[arg(long)]
    push_policy: Option<String>,
    /// 定義行の構文 (colon, legacy, auto)
    #[arg(long)]
    grammar: Option<String>,
    /// キャッシュキー (version, digest)
    #[arg(long)]
    cache_key: Option<String>,
    /// 同時に処理するバージョン数
    #[arg(short = 'j', long)]
    parallel: Option<usize>,
}

impl RunArgs {
    fn apply(&self, config: &mut BrewConfig) -> anyhow::Result<()> {
        if let Some(repository) = &self.repository {
            config.library.repository = repository.clone();
        }
        if let Some(branch) = &self.branch {
            config.library.branch = branch.clone();
        }
        if !self.namespaces.is_empty() {
            config.namespaces = self.namespaces.clone();
        }
        if self.push {
            config.push = true;
        }
        if self.registry.is_some() {
            config.registry = self.registry.clone();
        }
        if let Some(targets) = &self.targets {
            config.set_targets(targets);
        }
        if self.repos_folder.is_some() {
            config.repos_folder = self.repos_folder.clone();
        }
        if self.history.is_some() {
            config.history = self.history.clone();
        }
        if self.no_prefill {
            config.prefill = false;
        }
        if self.stop_on_error {
            config.continue_on_error = false;
        }
        if let Some(policy) = &self.push_policy {
            config.push_policy = PushPolicy::parse(policy)
                .ok_or_else(|| anyhow::anyhow!("不明なプッシュポリシー: {}", policy))?;
        }
        if let Some(grammar) = &self.grammar {
            config.grammar = Grammar::parse(grammar)
                .ok_or_else(|| anyhow::anyhow!("不明な構文: {}", grammar))?;
        }
        if let Some(key) = &self.cache_key {
            config.cache_key = KeyStrategy::parse(key)
                .ok_or_else(|| anyhow::anyhow!("不明なキャッシュキー: {}", key))?;
        }
        if let Some(parallel) = self.parallel {
            config.max_parallel = parallel;
        }
        config.validate()?;
        Ok(())
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    // Versionコマンドは設定ファイル不要
    if matches!(cli.command, Commands::Version) {
        println!("brewflow {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut config = brewflow_config::load_or_default(cli.config.as_deref())?;
    if cli.state_dir.is_some() {
        config.state_dir = cli.state_dir.clone();
    }

    // コマンドディスパッチ
    let code = match cli.command {
        Commands::Build(args) => {
            args.apply(&mut config)?;
            commands::build::handle(config).await?
        }
        Commands::Periodic {
            run,
            period,
            lock_file,
        } => {
            run.apply(&mut config)?;
            if let Some(period) = period {
                config.schedule.period_secs = period;
            }
            if lock_file.is_some() {
                config.schedule.lock_file = lock_file;
            }
            config.validate()?;
            commands::periodic::handle(config).await?
        }
        Commands::Status { id } => commands::status::handle(&config, id.as_deref()).await?,
        Commands::Success { repo, tag } => {
            commands::success::handle(&config, &repo, &tag).await?
        }
        Commands::Version => 0,
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
