//! Durable per-key admission state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Admission state for one (symbol, timeframe) key.
///
/// Every field carries a serde default so records written by older versions
/// load with the missing fields zeroed instead of being discarded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdmissionState {
    /// Admissions counted since the last period reset.
    #[serde(default)]
    pub alerts_sent_in_period: u32,

    /// The counting period the counter belongs to. A mismatch with the
    /// current period key resets the counter.
    #[serde(default)]
    pub period_key: String,

    /// Open time of the most recently admitted period. Never cleared by a
    /// period reset; duplicate suppression spans the boundary.
    #[serde(default)]
    pub last_admitted_open_time: Option<i64>,

    /// Wall-clock time of the most recent admission. Never cleared by a
    /// period reset; cooldowns span the boundary.
    #[serde(default)]
    pub last_admission_time: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_compatible_load() {
        // A record persisted by an older version that only knew the counter.
        let legacy = r#"{"alerts_sent_in_period": 2}"#;
        let state: AdmissionState = serde_json::from_str(legacy).unwrap();
        assert_eq!(state.alerts_sent_in_period, 2);
        assert_eq!(state.period_key, "");
        assert!(state.last_admitted_open_time.is_none());
        assert!(state.last_admission_time.is_none());
    }

    #[test]
    fn test_round_trip() {
        let state = AdmissionState {
            alerts_sent_in_period: 1,
            period_key: "2024-03-09".into(),
            last_admitted_open_time: Some(1_700_000_000_000),
            last_admission_time: Some(Utc::now()),
        };
        let json = serde_json::to_string(&state).unwrap();
        let loaded: AdmissionState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, loaded);
    }
}
