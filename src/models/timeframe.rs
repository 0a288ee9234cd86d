//! The measurement windows monitored by the service.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A monitored timeframe. Together with a symbol it forms the admission key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    /// Hour-over-hour volume comparison.
    #[serde(rename = "1h")]
    H1,
    /// Rolling 24h-over-24h volume comparison.
    #[serde(rename = "24h")]
    H24,
}

impl Timeframe {
    /// Canonical label, used in admission keys and alert text.
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::H1 => "1h",
            Timeframe::H24 => "24h",
        }
    }

    /// The exchange kline interval backing this timeframe. The 24h window is
    /// served by daily candles.
    pub fn source_interval(&self) -> &'static str {
        match self {
            Timeframe::H1 => "1h",
            Timeframe::H24 => "1d",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_labels() {
        assert_eq!(serde_json::to_string(&Timeframe::H1).unwrap(), r#""1h""#);
        assert_eq!(serde_json::to_string(&Timeframe::H24).unwrap(), r#""24h""#);
        let tf: Timeframe = serde_json::from_str(r#""24h""#).unwrap();
        assert_eq!(tf, Timeframe::H24);
    }

    #[test]
    fn test_source_interval() {
        assert_eq!(Timeframe::H1.source_interval(), "1h");
        assert_eq!(Timeframe::H24.source_interval(), "1d");
    }
}
