//! End-to-end admission flows over a real SQLite-backed repository.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{TimeZone, Utc};
use volwatch::{
    config::{PeriodKind, TimeframePolicy},
    engine::{AdmissionController, Decision, RejectReason},
    models::{AdmissionState, Timeframe, VolumeSpike},
    persistence::sqlite::SqliteStateRepository,
};

async fn repo() -> Arc<SqliteStateRepository> {
    let repo = SqliteStateRepository::new("sqlite::memory:").await.unwrap();
    repo.run_migrations().await.unwrap();
    Arc::new(repo)
}

fn policies(cooldown_secs: u64, max_per_period: u32) -> Arc<HashMap<Timeframe, TimeframePolicy>> {
    let mut map = HashMap::new();
    map.insert(
        Timeframe::H1,
        TimeframePolicy {
            threshold_pct: 30.0,
            cooldown: Duration::from_secs(cooldown_secs),
            max_per_period,
            period: PeriodKind::Day,
        },
    );
    Arc::new(map)
}

fn candidate(symbol: &str, open_time: i64, observed_at: chrono::DateTime<Utc>) -> VolumeSpike {
    VolumeSpike {
        symbol: symbol.to_string(),
        timeframe: Timeframe::H1,
        open_time,
        change_pct: 45.0,
        current_volume: 145.0,
        previous_volume: 100.0,
        last_price: 65_000.0,
        observed_at,
    }
}

#[tokio::test]
async fn repeated_observations_of_one_period_fire_once() {
    let repo = repo().await;
    let controller = AdmissionController::new(Arc::clone(&repo), policies(0, 10));
    let t0 = Utc.with_ymd_and_hms(2026, 8, 30, 10, 0, 0).unwrap();

    // The poller sees the same hot candle on several consecutive cycles.
    let first = controller.decide(&candidate("BTCUSDT", 100, t0)).await.unwrap();
    assert_eq!(first, Decision::Admit);

    for cycle in 1..5 {
        let later = t0 + chrono::Duration::minutes(5 * cycle);
        let decision = controller.decide(&candidate("BTCUSDT", 100, later)).await.unwrap();
        assert_eq!(decision, Decision::Reject(RejectReason::DuplicatePeriod));
    }
}

#[tokio::test]
async fn cooldown_then_cap_across_periods() {
    let repo = repo().await;
    // 1 hour cooldown, 2 admissions per day.
    let controller = AdmissionController::new(Arc::clone(&repo), policies(3600, 2));
    let t0 = Utc.with_ymd_and_hms(2026, 8, 30, 10, 0, 0).unwrap();

    assert_eq!(controller.decide(&candidate("BTCUSDT", 1, t0)).await.unwrap(), Decision::Admit);

    // A new period arrives 30 minutes later: cooldown blocks it.
    let inside = t0 + chrono::Duration::minutes(30);
    assert_eq!(
        controller.decide(&candidate("BTCUSDT", 2, inside)).await.unwrap(),
        Decision::Reject(RejectReason::CooldownActive)
    );

    // After the cooldown it is admitted, exhausting the daily cap.
    let after = t0 + chrono::Duration::hours(2);
    assert_eq!(controller.decide(&candidate("BTCUSDT", 2, after)).await.unwrap(), Decision::Admit);

    let third = t0 + chrono::Duration::hours(4);
    assert_eq!(
        controller.decide(&candidate("BTCUSDT", 3, third)).await.unwrap(),
        Decision::Reject(RejectReason::PeriodCapReached)
    );

    // Next day the counter resets and admissions resume.
    let next_day = t0 + chrono::Duration::hours(26);
    assert_eq!(
        controller.decide(&candidate("BTCUSDT", 4, next_day)).await.unwrap(),
        Decision::Admit
    );
}

#[tokio::test]
async fn duplicate_then_cooldown_then_fresh_admission() {
    let repo = repo().await;
    // 3 hour cooldown, 3 admissions per day.
    let controller = AdmissionController::new(Arc::clone(&repo), policies(10800, 3));
    let t0 = Utc.with_ymd_and_hms(2026, 8, 30, 10, 0, 0).unwrap();

    assert_eq!(controller.decide(&candidate("BTCUSDT", 1, t0)).await.unwrap(), Decision::Admit);

    // Same period seen again ten minutes later.
    assert_eq!(
        controller
            .decide(&candidate("BTCUSDT", 1, t0 + chrono::Duration::minutes(10)))
            .await
            .unwrap(),
        Decision::Reject(RejectReason::DuplicatePeriod)
    );

    // A new period twenty minutes in is still inside the cooldown.
    assert_eq!(
        controller
            .decide(&candidate("BTCUSDT", 2, t0 + chrono::Duration::minutes(20)))
            .await
            .unwrap(),
        Decision::Reject(RejectReason::CooldownActive)
    );

    // Past the cooldown, a fresh period is admitted.
    assert_eq!(
        controller
            .decide(&candidate("BTCUSDT", 3, t0 + chrono::Duration::minutes(181)))
            .await
            .unwrap(),
        Decision::Admit
    );
}

#[tokio::test]
async fn period_cap_resets_at_rollover() {
    let repo = repo().await;
    // No cooldown, a single admission per day.
    let controller = AdmissionController::new(Arc::clone(&repo), policies(0, 1));
    let late = Utc.with_ymd_and_hms(2026, 8, 30, 23, 50, 0).unwrap();

    assert_eq!(controller.decide(&candidate("BTCUSDT", 1, late)).await.unwrap(), Decision::Admit);
    assert_eq!(
        controller
            .decide(&candidate("BTCUSDT", 2, late + chrono::Duration::minutes(5)))
            .await
            .unwrap(),
        Decision::Reject(RejectReason::PeriodCapReached)
    );

    // The next day the counter is back to zero.
    assert_eq!(
        controller
            .decide(&candidate("BTCUSDT", 3, late + chrono::Duration::minutes(11)))
            .await
            .unwrap(),
        Decision::Admit
    );
}

#[tokio::test]
async fn cooldown_survives_period_rollover() {
    let repo = repo().await;
    // 3 hour cooldown, generous cap.
    let controller = AdmissionController::new(Arc::clone(&repo), policies(10800, 10));
    let late = Utc.with_ymd_and_hms(2026, 8, 30, 23, 50, 0).unwrap();

    assert_eq!(controller.decide(&candidate("BTCUSDT", 1, late)).await.unwrap(), Decision::Admit);

    // Day boundary resets the counter but not the cooldown memory.
    let after_midnight = late + chrono::Duration::minutes(40);
    assert_eq!(
        controller.decide(&candidate("BTCUSDT", 2, after_midnight)).await.unwrap(),
        Decision::Reject(RejectReason::CooldownActive)
    );
}

#[tokio::test]
async fn keys_are_independent() {
    let repo = repo().await;
    let controller = AdmissionController::new(Arc::clone(&repo), policies(3600, 1));
    let t0 = Utc.with_ymd_and_hms(2026, 8, 30, 10, 0, 0).unwrap();

    assert_eq!(controller.decide(&candidate("BTCUSDT", 1, t0)).await.unwrap(), Decision::Admit);
    // A different symbol is not affected by BTCUSDT's cooldown or cap.
    assert_eq!(controller.decide(&candidate("ETHUSDT", 1, t0)).await.unwrap(), Decision::Admit);
}

#[tokio::test]
async fn state_survives_controller_restart() {
    let repo = repo().await;
    let t0 = Utc.with_ymd_and_hms(2026, 8, 30, 10, 0, 0).unwrap();

    {
        let controller = AdmissionController::new(Arc::clone(&repo), policies(3600, 3));
        assert_eq!(
            controller.decide(&candidate("BTCUSDT", 7, t0)).await.unwrap(),
            Decision::Admit
        );
    }

    // A fresh controller over the same store must not re-admit the same
    // period, and must still honor the running cooldown.
    let controller = AdmissionController::new(Arc::clone(&repo), policies(3600, 3));
    assert_eq!(
        controller
            .decide(&candidate("BTCUSDT", 7, t0 + chrono::Duration::minutes(5)))
            .await
            .unwrap(),
        Decision::Reject(RejectReason::DuplicatePeriod)
    );
    assert_eq!(
        controller
            .decide(&candidate("BTCUSDT", 8, t0 + chrono::Duration::minutes(10)))
            .await
            .unwrap(),
        Decision::Reject(RejectReason::CooldownActive)
    );
}

#[tokio::test]
async fn admitted_state_is_visible_by_prefix_scan() {
    use volwatch::{engine::ADMISSION_STATE_PREFIX, persistence::traits::KeyValueStore};

    let repo = repo().await;
    let controller = AdmissionController::new(Arc::clone(&repo), policies(0, 3));
    let t0 = Utc.with_ymd_and_hms(2026, 8, 30, 10, 0, 0).unwrap();

    controller.decide(&candidate("BTCUSDT", 1, t0)).await.unwrap();
    controller.decide(&candidate("ETHUSDT", 1, t0)).await.unwrap();

    let states = repo
        .get_all_json_states_by_prefix::<AdmissionState>(ADMISSION_STATE_PREFIX)
        .await
        .unwrap();
    assert_eq!(states.len(), 2);
    let mut keys: Vec<_> = states.iter().map(|(k, _)| k.as_str()).collect();
    keys.sort();
    assert_eq!(keys, vec!["admission_state:BTCUSDT:1h", "admission_state:ETHUSDT:1h"]);
    for (_, state) in &states {
        assert_eq!(state.alerts_sent_in_period, 1);
        assert_eq!(state.period_key, "2026-08-30");
    }
}
