//! Read-only aggregation over the ledger. This is the sole surface display
//! code consumes; it never mutates and is safe to run concurrently with a
//! sampler cycle as long as the caller holds a read lock.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::utils::time::{date_to_bucket_key, trailing_days};

use super::ledger::UsageLedger;

/// Windowed per-application aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct AppUsage {
    /// CPU seconds inside the queried window.
    pub total_time: f64,
    /// Every date of the window, zero-filled where the app was idle.
    pub daily_breakdown: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default)]
pub struct RecentUsage {
    /// Per-date sums across all applications, ascending by date.
    pub total_daily_usage: BTreeMap<String, f64>,
    pub app_usage: HashMap<String, AppUsage>,
}

/// Aggregates usage over the trailing `days` calendar days ending at `today`.
/// Applications with zero usage in the window are excluded entirely.
pub fn recent_usage(ledger: &UsageLedger, days: u32, today: NaiveDate) -> RecentUsage {
    let window = trailing_days(today, days)
        .map(date_to_bucket_key)
        .collect::<Vec<_>>();

    let mut result = RecentUsage::default();
    for (app_name, record) in ledger.iter() {
        let windowed_total: f64 = window
            .iter()
            .filter_map(|date| record.daily_breakdown.get(date))
            .sum();
        if windowed_total <= 0. {
            continue;
        }

        let mut daily_breakdown = BTreeMap::new();
        for date in &window {
            let seconds = record.daily_breakdown.get(date).copied().unwrap_or(0.);
            daily_breakdown.insert(date.clone(), seconds);
            *result.total_daily_usage.entry(date.clone()).or_insert(0.) += seconds;
        }

        result.app_usage.insert(
            app_name.clone(),
            AppUsage {
                total_time: windowed_total,
                daily_breakdown,
            },
        );
    }

    result
}

/// Applications of the window sorted by descending usage, truncated to
/// `limit` when one is given. Name breaks ties to keep the order stable.
pub fn top_apps(
    ledger: &UsageLedger,
    limit: Option<usize>,
    days: u32,
    today: NaiveDate,
) -> Vec<(String, AppUsage)> {
    let mut apps = recent_usage(ledger, days, today)
        .app_usage
        .into_iter()
        .collect::<Vec<_>>();

    apps.sort_by(|a, b| {
        b.1.total_time
            .partial_cmp(&a.1.total_time)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    if let Some(limit) = limit {
        apps.truncate(limit);
    }
    apps
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, Utc};

    use crate::daemon::storage::ledger::UsageLedger;

    use super::{recent_usage, top_apps};

    const TODAY: NaiveDate = match NaiveDate::from_ymd_opt(2026, 3, 10) {
        Some(v) => v,
        None => panic!("valid date"),
    };

    fn ledger_with_today_usage() -> UsageLedger {
        let mut ledger = UsageLedger::new();
        ledger.apply_increment("A", 300., TODAY, Utc::now());
        ledger.apply_increment("B", 900., TODAY, Utc::now());
        ledger.apply_increment("C", 150., TODAY, Utc::now());
        // D exists in the ledger but has no usage inside the window.
        ledger.apply_increment("D", 42., TODAY - Duration::days(30), Utc::now());
        ledger
    }

    #[test]
    fn top_apps_orders_by_usage_and_drops_idle_apps() {
        let ledger = ledger_with_today_usage();
        let top = top_apps(&ledger, Some(3), 1, TODAY);

        let names = top.iter().map(|v| v.0.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["B", "A", "C"]);
    }

    #[test]
    fn top_apps_without_limit_returns_everything() {
        let ledger = ledger_with_today_usage();
        assert_eq!(top_apps(&ledger, None, 1, TODAY).len(), 3);
        assert_eq!(top_apps(&ledger, Some(100), 1, TODAY).len(), 3);
    }

    #[test]
    fn recent_usage_excludes_apps_outside_window() {
        let ledger = ledger_with_today_usage();
        let recent = recent_usage(&ledger, 7, TODAY);

        assert!(recent.app_usage.contains_key("A"));
        assert!(!recent.app_usage.contains_key("D"));
    }

    #[test]
    fn window_includes_today_and_full_trailing_range() {
        let mut ledger = UsageLedger::new();
        ledger.apply_increment("App", 10., TODAY, Utc::now());
        ledger.apply_increment("App", 20., TODAY - Duration::days(6), Utc::now());
        ledger.apply_increment("App", 40., TODAY - Duration::days(7), Utc::now());

        let recent = recent_usage(&ledger, 7, TODAY);
        assert_eq!(recent.app_usage["App"].total_time, 30.);
    }

    #[test]
    fn daily_totals_reconcile_with_app_breakdowns() {
        let mut ledger = UsageLedger::new();
        ledger.apply_increment("A", 10., TODAY, Utc::now());
        ledger.apply_increment("A", 5., TODAY - Duration::days(1), Utc::now());
        ledger.apply_increment("B", 2.5, TODAY, Utc::now());
        ledger.apply_increment("C", 7., TODAY - Duration::days(2), Utc::now());

        let recent = recent_usage(&ledger, 7, TODAY);

        let per_date_sum: f64 = recent.total_daily_usage.values().sum();
        let per_app_sum: f64 = recent
            .app_usage
            .values()
            .flat_map(|v| v.daily_breakdown.values())
            .sum();
        assert!((per_date_sum - per_app_sum).abs() < 1e-9);
        assert!((per_date_sum - 24.5).abs() < 1e-9);
    }

    #[test]
    fn total_daily_usage_is_sorted_ascending() {
        let ledger = ledger_with_today_usage();
        let recent = recent_usage(&ledger, 7, TODAY);

        let dates = recent.total_daily_usage.keys().collect::<Vec<_>>();
        let mut sorted = dates.clone();
        sorted.sort();
        assert_eq!(dates, sorted);
    }
}
