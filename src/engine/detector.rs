//! Pure volume-change detection between consecutive periods.

use chrono::{DateTime, Utc};

use crate::models::{Candle, Timeframe, VolumeSpike};

/// Calculates the percentage change in volume between two periods.
pub fn volume_change_pct(current: f64, previous: f64) -> f64 {
    ((current - previous) / previous) * 100.0
}

/// Compares the current period against the previous one and produces a
/// candidate when the change meets the threshold.
///
/// Only increases fire: a drop in volume is not a trading signal here, so
/// negative changes are skipped regardless of magnitude. A previous volume
/// of zero produces no candidate.
pub fn detect(
    symbol: &str,
    timeframe: Timeframe,
    threshold_pct: f64,
    current: &Candle,
    previous: &Candle,
    observed_at: DateTime<Utc>,
) -> Option<VolumeSpike> {
    if previous.volume == 0.0 {
        tracing::debug!(symbol, %timeframe, "Previous volume is 0, skipping.");
        return None;
    }

    let change_pct = volume_change_pct(current.volume, previous.volume);
    if change_pct < threshold_pct {
        return None;
    }

    Some(VolumeSpike {
        symbol: symbol.to_string(),
        timeframe,
        open_time: current.open_time,
        change_pct: (change_pct * 100.0).round() / 100.0,
        current_volume: current.volume,
        previous_volume: previous.volume,
        last_price: current.close,
        observed_at,
    })
}
