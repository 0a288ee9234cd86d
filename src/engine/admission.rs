//! Admission control for alert candidates.
//!
//! The controller is the single decision point between the detector and the
//! delivery queue. For each candidate it applies, in order: period reset,
//! exact-duplicate suppression, per-key cooldown, and the per-period cap.
//! State is persisted before an admission is signaled, so a crash between
//! decision and delivery can only lose a notification, never duplicate one.

use std::{collections::HashMap, fmt, sync::Arc};

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::{
    config::TimeframePolicy,
    models::{AdmissionState, Timeframe, VolumeSpike},
    persistence::{error::PersistenceError, traits::KeyValueStore},
};

/// Key prefix for admission state records in the key-value store.
pub const ADMISSION_STATE_PREFIX: &str = "admission_state:";

/// The outcome of evaluating one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The candidate may proceed toward delivery.
    Admit,
    /// The candidate is suppressed. Not an error: rejections are expected
    /// control flow, distinguished by reason for observability.
    Reject(RejectReason),
}

/// Why a candidate was suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The same measurement period was already admitted for this key.
    DuplicatePeriod,
    /// The per-key cooldown since the last admission has not elapsed.
    CooldownActive,
    /// The per-period admission cap for this key is exhausted.
    PeriodCapReached,
}

impl RejectReason {
    /// Stable reason code for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::DuplicatePeriod => "duplicate-period",
            RejectReason::CooldownActive => "cooldown-active",
            RejectReason::PeriodCapReached => "period-cap-reached",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while deciding on a candidate.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// No policy is configured for the candidate's timeframe. Configuration
    /// is validated at startup, so hitting this indicates a wiring bug.
    #[error("No policy configured for timeframe {0}")]
    MissingPolicy(Timeframe),

    /// The state store failed. On the admit path this aborts forwarding:
    /// an admission whose state could not be durably recorded must not
    /// reach the delivery queue.
    #[error("State repository error: {0}")]
    StateRepository(#[from] PersistenceError),
}

/// The admission controller. Safe to call concurrently across keys;
/// decisions for the same key are serialized through a per-key lock.
pub struct AdmissionController<T: KeyValueStore> {
    /// The state repository holding per-key admission state.
    state_repository: Arc<T>,

    /// Per-timeframe policies, validated at startup.
    policies: Arc<HashMap<Timeframe, TimeframePolicy>>,

    /// Per-key locks guarding the read-decide-write sequence.
    key_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<T: KeyValueStore> AdmissionController<T> {
    /// Creates a new controller over the given store and policy table.
    pub fn new(
        state_repository: Arc<T>,
        policies: Arc<HashMap<Timeframe, TimeframePolicy>>,
    ) -> Self {
        Self { state_repository, policies, key_locks: DashMap::new() }
    }

    /// Gets or creates the lock for a specific admission key.
    fn get_key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        self.key_locks.entry(key.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Evaluates one candidate and durably records any state change before
    /// returning. Exactly one write happens when the state changed (an
    /// admission, or a period reset even if the candidate is then
    /// rejected); a plain rejection writes nothing.
    pub async fn decide(&self, candidate: &VolumeSpike) -> Result<Decision, AdmissionError> {
        let policy = self
            .policies
            .get(&candidate.timeframe)
            .ok_or(AdmissionError::MissingPolicy(candidate.timeframe))?;

        let state_key = format!("{}{}", ADMISSION_STATE_PREFIX, candidate.admission_key());
        let lock = self.get_key_lock(&state_key);
        let _guard = lock.lock().await;

        let mut state = self
            .state_repository
            .get_json_state::<AdmissionState>(&state_key)
            .await?
            .unwrap_or_default();
        let mut dirty = false;

        // Period reset runs before the pipeline: a pure function of the
        // candidate's wall-clock time and the timeframe policy. Only the
        // counter and period key reset; duplicate and cooldown memory
        // survive the boundary.
        let current_period = policy.period.key_for(candidate.observed_at);
        if state.period_key != current_period {
            state.alerts_sent_in_period = 0;
            state.period_key = current_period;
            dirty = true;
        }

        let decision = if state.last_admitted_open_time == Some(candidate.open_time) {
            Decision::Reject(RejectReason::DuplicatePeriod)
        } else if self.cooldown_active(&state, candidate, policy) {
            Decision::Reject(RejectReason::CooldownActive)
        } else if state.alerts_sent_in_period >= policy.max_per_period {
            Decision::Reject(RejectReason::PeriodCapReached)
        } else {
            state.last_admitted_open_time = Some(candidate.open_time);
            state.last_admission_time = Some(candidate.observed_at);
            state.alerts_sent_in_period += 1;
            dirty = true;
            Decision::Admit
        };

        if dirty {
            // Persisted before the caller sees the decision: a failure here
            // turns an admission into an error, never into a duplicate.
            self.state_repository.set_json_state(&state_key, &state).await?;
        }

        match &decision {
            Decision::Admit => {
                tracing::info!(
                    key = %candidate.admission_key(),
                    open_time = candidate.open_time,
                    count = state.alerts_sent_in_period,
                    max = policy.max_per_period,
                    "Candidate admitted."
                );
            }
            Decision::Reject(reason) => {
                tracing::debug!(
                    key = %candidate.admission_key(),
                    open_time = candidate.open_time,
                    reason = %reason,
                    "Candidate rejected."
                );
            }
        }

        Ok(decision)
    }

    fn cooldown_active(
        &self,
        state: &AdmissionState,
        candidate: &VolumeSpike,
        policy: &TimeframePolicy,
    ) -> bool {
        match state.last_admission_time {
            Some(last) => {
                let elapsed = (candidate.observed_at - last).num_seconds();
                elapsed < policy.cooldown.as_secs() as i64
            }
            None => false,
        }
    }
}
