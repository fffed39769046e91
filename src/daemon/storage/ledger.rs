use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::time::date_to_bucket_key;

use super::entities::UsageRecord;

/// The durable usage-by-application aggregate store. Keyed by resolved
/// application display name. Entries are created on first observed usage and
/// never deleted by the tracker itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageLedger {
    entries: HashMap<String, UsageRecord>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits `seconds` of CPU time to `app_name`, updating the lifetime
    /// total and the day bucket together. Non-positive increments are
    /// discarded, which keeps totals monotone across counter anomalies.
    pub fn apply_increment(
        &mut self,
        app_name: &str,
        seconds: f64,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) {
        if seconds <= 0. {
            return;
        }

        let record = self.entries.entry(app_name.to_string()).or_default();
        record.total_time += seconds;
        *record
            .daily_breakdown
            .entry(date_to_bucket_key(date))
            .or_insert(0.) += seconds;
        // Stored with second precision, truncated up front so a reloaded
        // ledger compares equal to the one that was saved.
        record.last_updated = now.trunc_subsecs(0);
    }

    pub fn get(&self, app_name: &str) -> Option<&UsageRecord> {
        self.entries.get(app_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &UsageRecord)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::UsageLedger;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn increment_updates_total_and_bucket_together() {
        let mut ledger = UsageLedger::new();
        ledger.apply_increment("App", 2.5, day(1), Utc::now());
        ledger.apply_increment("App", 1.5, day(1), Utc::now());
        ledger.apply_increment("App", 3., day(2), Utc::now());

        let record = ledger.get("App").unwrap();
        assert_eq!(record.total_time, 7.);
        assert_eq!(record.daily_breakdown["2026-03-01"], 4.);
        assert_eq!(record.daily_breakdown["2026-03-02"], 3.);
    }

    #[test]
    fn total_reconciles_with_bucket_sum() {
        let mut ledger = UsageLedger::new();
        for (seconds, d) in [(1.25, 1), (0.5, 1), (2., 2), (0.25, 3)] {
            ledger.apply_increment("App", seconds, day(d), Utc::now());
        }

        let record = ledger.get("App").unwrap();
        let bucket_sum: f64 = record.daily_breakdown.values().sum();
        assert!((record.total_time - bucket_sum).abs() < 1e-9);
    }

    #[test]
    fn non_positive_increments_are_discarded() {
        let mut ledger = UsageLedger::new();
        ledger.apply_increment("App", 5., day(1), Utc::now());
        ledger.apply_increment("App", -3., day(1), Utc::now());
        ledger.apply_increment("App", 0., day(1), Utc::now());

        let record = ledger.get("App").unwrap();
        assert_eq!(record.total_time, 5.);
        assert_eq!(record.daily_breakdown["2026-03-01"], 5.);
    }

    #[test]
    fn negative_increment_never_creates_an_entry() {
        let mut ledger = UsageLedger::new();
        ledger.apply_increment("App", -1., day(1), Utc::now());
        assert!(ledger.is_empty());
    }

    #[test]
    fn total_is_non_decreasing_across_polls() {
        let mut ledger = UsageLedger::new();
        let mut previous_total = 0.;
        for seconds in [1., 0., -2., 3., -0.5, 0.25] {
            ledger.apply_increment("App", seconds, day(1), Utc::now());
            let total = ledger.get("App").map(|v| v.total_time).unwrap_or(0.);
            assert!(total >= previous_total);
            previous_total = total;
        }
    }

    #[test]
    fn serialization_round_trip_is_identity() {
        let mut ledger = UsageLedger::new();
        ledger.apply_increment("App", 2.5, day(1), Utc::now());
        ledger.apply_increment("Other", 1., day(2), Utc::now());

        let json = serde_json::to_string(&ledger).unwrap();
        assert_eq!(serde_json::from_str::<UsageLedger>(&json).unwrap(), ledger);
    }

    #[test]
    fn ledger_with_legacy_records_deserializes() {
        let ledger = serde_json::from_str::<UsageLedger>(
            r#"{"Old App": {}, "New App": {"total_time": 10.0, "daily_breakdown": {"2026-03-01": 10.0}, "last_updated": 1772323200}}"#,
        )
        .unwrap();

        assert_eq!(ledger.get("Old App").unwrap().total_time, 0.);
        assert_eq!(ledger.get("New App").unwrap().total_time, 10.);
    }
}
