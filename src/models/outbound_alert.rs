//! Fully rendered notifications queued for delivery.

use super::Timeframe;

/// A delivery-queue entry: rendered text plus identifying labels for logging.
/// Transient; abandoned on shutdown since it represents a not-yet-delivered
/// notification, not committed state.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundAlert {
    /// Symbol the alert concerns, for diagnostics.
    pub symbol: String,
    /// Timeframe the alert concerns, for diagnostics.
    pub timeframe: Timeframe,
    /// Rendered message body (HTML).
    pub text: String,
}
