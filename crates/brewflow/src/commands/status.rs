use crate::output;
use brewflow_config::BrewConfig;
use brewflow_state::{ReportStore, StateError};
use colored::Colorize;

pub async fn handle(config: &BrewConfig, id: Option<&str>) -> anyhow::Result<i32> {
    let store = ReportStore::new(config.reports_dir());

    let report = match id {
        Some(id) => match store.get(id).await {
            Ok(report) => report,
            Err(StateError::ReportNotFound(id)) => {
                output::print_error(&format!("レポートが見つかりません: {}", id));
                return Ok(1);
            }
            Err(e) => return Err(e.into()),
        },
        None => match store.latest().await? {
            Some(report) => report,
            None => {
                println!("{}", "まだ実行レポートがありません".dimmed());
                return Ok(0);
            }
        },
    };

    output::print_report(&report);
    Ok(0)
}
