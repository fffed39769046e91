use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::process_api::ProcessSample;

/// Durable per-application usage aggregate. Records written by older versions
/// may miss fields, every one of them defaults instead of failing the whole
/// ledger load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Lifetime CPU seconds, non-decreasing for as long as the record lives.
    #[serde(default)]
    pub total_time: f64,
    /// CPU seconds per `YYYY-MM-DD` bucket key.
    #[serde(default)]
    pub daily_breakdown: BTreeMap<String, f64>,
    #[serde(default = "unix_epoch", with = "chrono::serde::ts_seconds")]
    pub last_updated: DateTime<Utc>,
}

impl Default for UsageRecord {
    fn default() -> Self {
        Self {
            total_time: 0.,
            daily_breakdown: BTreeMap::new(),
            last_updated: unix_epoch(),
        }
    }
}

fn unix_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// Diagnostic image of one tracked process instance. The whole set is
/// rewritten each poll cycle; it is not needed for correctness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedProcessEntity {
    pub pid: u32,
    pub start_time: u64,
    pub name: Arc<str>,
    pub cpu_user_seconds: f64,
    pub cpu_system_seconds: f64,
}

impl From<&ProcessSample> for TrackedProcessEntity {
    fn from(sample: &ProcessSample) -> Self {
        Self {
            pid: sample.identity.pid,
            start_time: sample.identity.start_time,
            name: sample.name.clone(),
            cpu_user_seconds: sample.cpu_user_seconds,
            cpu_system_seconds: sample.cpu_system_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::UsageRecord;

    #[test]
    fn legacy_record_without_fields_defaults() {
        let record = serde_json::from_str::<UsageRecord>("{}").unwrap();
        assert_eq!(record, UsageRecord::default());
    }

    #[test]
    fn partial_record_keeps_present_fields() {
        let record =
            serde_json::from_str::<UsageRecord>(r#"{"total_time": 12.5}"#).unwrap();
        assert_eq!(record.total_time, 12.5);
        assert!(record.daily_breakdown.is_empty());
    }
}
