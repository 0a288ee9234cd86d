//! Detection and admission-control engine.

pub mod admission;
pub mod detector;
pub mod poller;

pub use admission::{
    AdmissionController, AdmissionError, Decision, RejectReason, ADMISSION_STATE_PREFIX,
};
pub use poller::VolumeMonitor;
