use crate::output;
use brewflow_config::BrewConfig;
use brewflow_state::ReportStore;
use colored::Colorize;

pub async fn handle(config: &BrewConfig, repo: &str, tag: &str) -> anyhow::Result<i32> {
    let store = ReportStore::new(config.reports_dir());

    match store.latest_successful(repo, Some(tag)).await? {
        Some((report, item)) => {
            println!("{}:{}", repo.cyan().bold(), tag);
            println!("  image:  {}", item.image_id.as_deref().unwrap_or("-"));
            println!("  commit: {}", item.commit_id.as_deref().unwrap_or("-"));
            println!("  source: {}", item.source_desc);
            println!(
                "  built:  {} ({})",
                report.build_date.format("%Y-%m-%d %H:%M:%S UTC"),
                report.id.dimmed()
            );
            Ok(0)
        }
        None => {
            output::print_error(&format!("{}:{} の成功したビルドはありません", repo, tag));
            Ok(1)
        }
    }
}
