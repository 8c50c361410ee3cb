//! OHLCV candle representation.

use crate::domain::time_series::Timestamp;

/// One period of market activity for a single instrument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub timestamp: Timestamp,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl Candle {
    /// Prices are finite and `low <= open, close <= high`.
    pub fn is_consistent(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        prices.iter().all(|p| p.is_finite())
            && self.low <= self.open.min(self.close)
            && self.high >= self.open.max(self.close)
    }
}
