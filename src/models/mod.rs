//! Data model types shared across the service.

mod admission_state;
mod candle;
mod outbound_alert;
mod timeframe;
mod volume_spike;

pub use admission_state::AdmissionState;
pub use candle::Candle;
pub use outbound_alert::OutboundAlert;
pub use timeframe::Timeframe;
pub use volume_spike::VolumeSpike;
