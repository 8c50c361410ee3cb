//! Orders placed by strategies and the lifecycle events they produce.

use crate::domain::candle::Candle;
use crate::domain::error::LedgerError;
use crate::domain::instrument::InstrumentId;
use crate::domain::trade::{Side, TradeId};
use std::fmt;

/// Assigned by the executor on submission; zero until then.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "O{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderKind {
    /// Fills at the next candle open.
    Market,
    /// Fills at the limit price or better once the candle reaches it.
    Limit(f64),
    /// Becomes a market order once the candle trades through the stop.
    Stop(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: OrderId,
    pub strategy_id: String,
    pub instrument: InstrumentId,
    pub side: Side,
    pub quantity: f64,
    pub kind: OrderKind,
}

impl Order {
    pub fn new(
        strategy_id: &str,
        instrument: InstrumentId,
        side: Side,
        quantity: f64,
        kind: OrderKind,
    ) -> Self {
        Order {
            id: OrderId::default(),
            strategy_id: strategy_id.to_string(),
            instrument,
            side,
            quantity,
            kind,
        }
    }

    /// Unit fill price against `candle`, before costs. `None` when the
    /// order's trigger is not reached.
    ///
    /// A candle that gaps through the trigger fills at the open.
    pub fn fill_price(&self, candle: &Candle) -> Option<f64> {
        match (self.kind, self.side) {
            (OrderKind::Market, _) => Some(candle.open),
            (OrderKind::Limit(p), Side::Buy) => (candle.low <= p).then(|| p.min(candle.open)),
            (OrderKind::Limit(p), Side::Sell) => (candle.high >= p).then(|| p.max(candle.open)),
            (OrderKind::Stop(p), Side::Buy) => (candle.high >= p).then(|| p.max(candle.open)),
            (OrderKind::Stop(p), Side::Sell) => (candle.low <= p).then(|| p.min(candle.open)),
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.id, self.side, self.quantity, self.instrument
        )?;
        match self.kind {
            OrderKind::Market => Ok(()),
            OrderKind::Limit(p) => write!(f, " LMT {p:.4}"),
            OrderKind::Stop(p) => write!(f, " STP {p:.4}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderEvent {
    Filled { order: Order, trade: TradeId },
    Rejected { order: Order, reason: LedgerError },
    Expired(Order),
}

impl OrderEvent {
    pub fn order(&self) -> &Order {
        match self {
            OrderEvent::Filled { order, .. }
            | OrderEvent::Rejected { order, .. }
            | OrderEvent::Expired(order) => order,
        }
    }

    pub fn strategy_id(&self) -> &str {
        &self.order().strategy_id
    }
}
