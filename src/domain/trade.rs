//! Trades submitted to the ledger.

use crate::domain::instrument::InstrumentId;
use crate::domain::inventory::is_negligible;
use crate::domain::time_series::Timestamp;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => f.write_str("BUY"),
            Side::Sell => f.write_str("SELL"),
        }
    }
}

/// Externally visible trade state. A trade with part of its quantity still
/// unmatched reports `Open`; see [`Trade::is_partially_closed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeStatus {
    Open,
    Closed,
}

/// Index of a trade in the ledger's trade book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TradeId(pub usize);

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub side: Side,
    pub instrument: InstrumentId,
    pub quantity: f64,
    /// Total consideration for the whole quantity.
    pub price: f64,
    pub timestamp: Timestamp,
    pub(crate) status: TradeStatus,
    pub(crate) remaining: f64,
    pub(crate) profit_and_loss: f64,
}

impl Trade {
    pub fn new(
        side: Side,
        instrument: InstrumentId,
        quantity: f64,
        price: f64,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            side,
            instrument,
            quantity,
            price,
            timestamp,
            status: TradeStatus::Open,
            remaining: quantity,
            profit_and_loss: 0.0,
        }
    }

    pub fn buy(instrument: InstrumentId, quantity: f64, price: f64, timestamp: Timestamp) -> Self {
        Self::new(Side::Buy, instrument, quantity, price, timestamp)
    }

    pub fn sell(instrument: InstrumentId, quantity: f64, price: f64, timestamp: Timestamp) -> Self {
        Self::new(Side::Sell, instrument, quantity, price, timestamp)
    }

    pub fn unit_price(&self) -> f64 {
        self.price / self.quantity
    }

    pub fn status(&self) -> TradeStatus {
        self.status
    }

    /// Quantity of this trade's own lot not yet offset by later trades.
    pub fn remaining_quantity(&self) -> f64 {
        self.remaining
    }

    pub fn is_partially_closed(&self) -> bool {
        self.remaining > 0.0 && self.remaining < self.quantity
    }

    /// Realized P&L accrued by this trade when it offset earlier lots.
    pub fn profit_and_loss(&self) -> f64 {
        self.profit_and_loss
    }

    /// Signed quantity: positive for buys, negative for sells.
    pub fn signed_quantity(&self) -> f64 {
        match self.side {
            Side::Buy => self.quantity,
            Side::Sell => -self.quantity,
        }
    }

    /// Leftovers negligible against the previous remainder close the trade,
    /// mirroring how the inventory drops the matching lot.
    pub(crate) fn set_remaining(&mut self, remaining: f64) {
        if is_negligible(remaining, self.remaining) {
            self.remaining = 0.0;
            self.status = TradeStatus::Closed;
        } else {
            self.remaining = remaining;
        }
    }
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}@{:.4}",
            self.side,
            self.quantity,
            self.instrument,
            self.unit_price()
        )
    }
}
