use crate::output;
use brewflow_config::BrewConfig;
use brewflow_state::ReportStore;

pub async fn handle(config: BrewConfig) -> anyhow::Result<i32> {
    let reports = ReportStore::new(config.reports_dir());
    let orchestrator = match super::create_orchestrator(config) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            output::print_error(&e.user_message());
            return Ok(1);
        }
    };

    let summary = match orchestrator.run_with(super::cancel_on_ctrl_c()).await {
        Ok(summary) => summary,
        Err(e) => {
            output::print_error(&e.user_message());
            return Ok(1);
        }
    };

    if let Err(e) = reports.save(&summary.report).await {
        tracing::warn!(error = %e, "Failed to save run report");
    }

    output::print_summary(&summary);
    Ok(summary.exit_code())
}
