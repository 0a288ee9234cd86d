//! Candidate events produced by the volume detector.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Timeframe;

/// A threshold-crossing volume change for one (symbol, timeframe) pair.
///
/// Transient: produced once per poll per pair, resolved by the admission
/// controller and then discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeSpike {
    /// The monitored trading pair.
    pub symbol: String,
    /// The measurement window the spike was observed on.
    pub timeframe: Timeframe,
    /// Open time of the measured period (ms since epoch). A given
    /// (symbol, timeframe, open_time) triple is alerted at most once.
    pub open_time: i64,
    /// Relative volume change, percent, current period vs previous.
    pub change_pct: f64,
    /// Quote volume of the current period.
    pub current_volume: f64,
    /// Quote volume of the previous period.
    pub previous_volume: f64,
    /// Latest price, for display only.
    pub last_price: f64,
    /// Wall-clock time this candidate was generated.
    pub observed_at: DateTime<Utc>,
}

impl VolumeSpike {
    /// The admission key shared by all candidates for this pair.
    pub fn admission_key(&self) -> String {
        format!("{}:{}", self.symbol, self.timeframe)
    }
}
