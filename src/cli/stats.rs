use std::path::Path;

use anyhow::Result;
use chrono::{NaiveDate, Utc};

use crate::daemon::storage::{ledger::UsageLedger, ledger_storage::LedgerStorage, query};

/// Prints per-day usage totals for the trailing window, oldest day first.
pub async fn process_stats_command(data_dir: &Path, days: u32) -> Result<()> {
    let ledger = load_ledger(data_dir).await?;
    let recent = query::recent_usage(&ledger, days, Utc::now().date_naive());

    if recent.total_daily_usage.is_empty() {
        println!("No usage recorded in the last {days} days");
        return Ok(());
    }

    let mut window_total = 0.;
    for (date, seconds) in &recent.total_daily_usage {
        window_total += seconds;
        println!("{date}\t{}", format_seconds(*seconds));
    }
    println!();
    println!("Total\t{}", format_seconds(window_total));
    Ok(())
}

/// Prints the applications with the highest usage in the window, one line per
/// application with its share of the window total.
pub async fn process_top_command(data_dir: &Path, limit: usize, days: u32) -> Result<()> {
    let ledger = load_ledger(data_dir).await?;
    let lines = top_lines(&ledger, limit, days, Utc::now().date_naive());

    if lines.is_empty() {
        println!("No usage recorded in the last {days} days");
        return Ok(());
    }
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

/// Shares are computed against the whole window, not the displayed subset,
/// so truncating the list never inflates the percentages.
fn top_lines(ledger: &UsageLedger, limit: usize, days: u32, today: NaiveDate) -> Vec<String> {
    let recent = query::recent_usage(ledger, days, today);
    let window_total: f64 = recent.app_usage.values().map(|v| v.total_time).sum();

    query::top_apps(ledger, Some(limit), days, today)
        .into_iter()
        .map(|(app_name, usage)| {
            format!(
                "{}%\t{}\t{}",
                (usage.total_time / window_total * 100.) as i32,
                format_seconds(usage.total_time),
                app_name
            )
        })
        .collect()
}

/// The daemon owns the authoritative file; the cli only ever takes a shared
/// read of whatever was flushed last.
async fn load_ledger(data_dir: &Path) -> Result<UsageLedger> {
    LedgerStorage::new(data_dir.to_owned())?.load().await
}

fn format_seconds(seconds: f64) -> String {
    let seconds = seconds.round() as i64;
    let hours = seconds / 3600;
    let minutes = seconds / 60 % 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}h{minutes}m{secs}s")
    } else if minutes > 0 {
        format!("{minutes}m{secs}s")
    } else {
        format!("{secs}s")
    }
}
