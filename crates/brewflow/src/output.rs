//! 端末向けの表示

use brewflow_core::{RunReport, RunSummary};
use colored::Colorize;

const SEPARATOR_WIDTH: usize = 61;
const SUMMARY_TITLE: &str = "BREW BUILD SUMMARY";
const OK_MARKER: &str = " | OK | ";
const KO_MARKER: &str = " | KO | ";

fn separator() -> String {
    "-".repeat(SEPARATOR_WIDTH).dimmed().to_string()
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "Error:".red().bold(), message);
}

/// 実行サマリーをイメージごとに表示
pub fn print_summary(summary: &RunSummary) {
    println!();
    for line in summary.render().lines() {
        println!("{}", paint_summary_line(line));
    }

    if summary.failures() > 0 {
        println!("{} 行が失敗しました", summary.failures().to_string().red());
    }
}

/// `RunSummary::render` の1行に色を付ける
fn paint_summary_line(line: &str) -> String {
    if line.starts_with('-') {
        return line.dimmed().to_string();
    }
    if line == SUMMARY_TITLE {
        return line.bold().to_string();
    }
    if let Some(value) = line.strip_prefix("OVERALL SUCCESS: ") {
        return format!("OVERALL SUCCESS: {}", overall(value == "true"));
    }
    if line.contains(OK_MARKER) {
        return line.replacen(OK_MARKER, &format!(" | {} | ", "OK".green()), 1);
    }
    if line.contains(KO_MARKER) {
        return line.replacen(KO_MARKER, &format!(" | {} | ", "KO".red()), 1);
    }
    // イメージ名の見出し
    line.cyan().bold().to_string()
}

/// 保存された実行レポートを表示
pub fn print_report(report: &RunReport) {
    println!(
        "{} {}",
        "Report".bold(),
        report.id.dimmed()
    );
    println!(
        "  日時:   {}",
        report.build_date.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("  結果:   {}", overall(report.success));
    println!("{}", separator());

    for item in &report.items {
        let marker = if item.exception.is_none() {
            "OK".green()
        } else {
            "KO".red()
        };
        let detail = match (&item.exception, &item.image_id) {
            (Some(error), _) => match item.kind {
                Some(kind) => format!("{}: {}", kind, error),
                None => error.clone(),
            },
            (None, Some(image_id)) => image_id.clone(),
            (None, None) => String::new(),
        };
        println!(
            "{:<16} {:>3} | {} | {}:{} {}",
            item.repo_name,
            item.line,
            marker,
            item.repo_name,
            item.tag,
            detail.dimmed()
        );
    }
}

fn overall(success: bool) -> colored::ColoredString {
    if success {
        "true".green().bold()
    } else {
        "false".red().bold()
    }
}
