use crate::output;
use brewflow_config::BrewConfig;
use brewflow_runner::{RunError, Scheduler};
use brewflow_state::StateError;
use colored::Colorize;

pub async fn handle(config: BrewConfig) -> anyhow::Result<i32> {
    println!(
        "{} {} 秒ごとにビルドします（Ctrl-C で停止）",
        "▶".green(),
        config.schedule.period_secs
    );

    let orchestrator = match super::create_orchestrator(config.clone()) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            output::print_error(&e.user_message());
            return Ok(1);
        }
    };

    let scheduler = Scheduler::from_config(orchestrator, &config);
    match scheduler.run(super::cancel_on_ctrl_c()).await {
        Ok(runs) => {
            println!("{} {} 回実行しました", "✓".green(), runs);
            Ok(0)
        }
        Err(e @ RunError::State(StateError::Locked { .. })) => {
            println!("{}", e.user_message().yellow());
            Ok(0)
        }
        Err(e) => {
            output::print_error(&e.user_message());
            Ok(1)
        }
    }
}
