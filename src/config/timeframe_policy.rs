use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::helpers::{deserialize_duration_from_seconds, serialize_duration_to_seconds};

/// The wall-clock period used for alert counting. When the period key
/// computed from the current time changes, the per-key alert counter resets.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    /// One calendar day (UTC).
    #[default]
    Day,
    /// One calendar hour (UTC).
    Hour,
}

impl PeriodKind {
    /// Computes the counting-period key for the given instant.
    pub fn key_for(&self, at: DateTime<Utc>) -> String {
        match self {
            PeriodKind::Day => at.format("%Y-%m-%d").to_string(),
            PeriodKind::Hour => at.format("%Y-%m-%dT%H").to_string(),
        }
    }
}

/// Per-timeframe alerting policy. A timeframe with no policy entry in the
/// configuration is a fatal startup error.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TimeframePolicy {
    /// Minimum relative volume change (percent) for a candidate to fire.
    pub threshold_pct: f64,

    /// Minimum wall-clock gap between two admissions for the same
    /// (symbol, timeframe) key.
    #[serde(
        rename = "cooldown_secs",
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds"
    )]
    pub cooldown: Duration,

    /// Maximum admissions allowed within one counting period.
    pub max_per_period: u32,

    /// The counting period for `max_per_period`.
    #[serde(default)]
    pub period: PeriodKind,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_period_keys() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 23, 55, 0).unwrap();
        assert_eq!(PeriodKind::Day.key_for(at), "2024-03-09");
        assert_eq!(PeriodKind::Hour.key_for(at), "2024-03-09T23");

        let next = Utc.with_ymd_and_hms(2024, 3, 10, 0, 1, 0).unwrap();
        assert_ne!(PeriodKind::Day.key_for(at), PeriodKind::Day.key_for(next));
    }

    #[test]
    fn test_policy_deserialization() {
        let yaml_as_json = r#"{
            "threshold_pct": 30.0,
            "cooldown_secs": 10800,
            "max_per_period": 3
        }"#;
        let policy: TimeframePolicy = serde_json::from_str(yaml_as_json).unwrap();
        assert_eq!(policy.threshold_pct, 30.0);
        assert_eq!(policy.cooldown, Duration::from_secs(10800));
        assert_eq!(policy.max_per_period, 3);
        assert_eq!(policy.period, PeriodKind::Day);
    }
}
