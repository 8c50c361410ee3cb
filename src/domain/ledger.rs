//! Portfolio ledger: cash, FIFO lot matching, positions and the equity curve.
//!
//! Every trade is matched against the opposite-direction lots of its
//! instrument, oldest lot first. Realized P&L is booked on the offsetting
//! trade; the offset lots' originating trades close when their remaining
//! quantity reaches zero. A BUY is rejected when cash would go negative; a
//! SELL always credits cash.

use crate::domain::candle::Candle;
use crate::domain::error::LedgerError;
use crate::domain::instrument::InstrumentId;
use crate::domain::inventory::{is_negligible, Inventory, Lot, MovementType};
use crate::domain::time_series::Timestamp;
use crate::domain::trade::{Side, Trade, TradeId, TradeStatus};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::trace;

/// How instruments held but absent from a mark-to-market slice are valued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValuationPolicy {
    /// Only instruments priced in the current slice contribute.
    #[default]
    SliceOnly,
    /// Missing instruments are valued at their last seen close.
    CarryForward,
}

impl FromStr for ValuationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "slice" | "slice_only" => Ok(ValuationPolicy::SliceOnly),
            "carry" | "carry_forward" => Ok(ValuationPolicy::CarryForward),
            other => Err(format!("unknown valuation policy '{other}'")),
        }
    }
}

impl fmt::Display for ValuationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValuationPolicy::SliceOnly => f.write_str("slice_only"),
            ValuationPolicy::CarryForward => f.write_str("carry_forward"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: Timestamp,
    pub equity: f64,
}

/// Journal entry: a lot opened by a trade, or closed (partly) by one.
#[derive(Debug, Clone, PartialEq)]
pub struct Movement {
    pub movement: MovementType,
    pub instrument: InstrumentId,
    /// Trade that caused this movement.
    pub trade_id: TradeId,
    /// Trade whose lot was opened or offset.
    pub lot_trade_id: TradeId,
    pub quantity: f64,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone)]
pub struct Ledger {
    currency: String,
    cash: f64,
    deposits: f64,
    trades: Vec<Trade>,
    inventories: HashMap<InstrumentId, Inventory>,
    positions: HashMap<InstrumentId, f64>,
    movements: Vec<Movement>,
    equity_curve: Vec<EquityPoint>,
    valuation: ValuationPolicy,
    last_prices: HashMap<InstrumentId, f64>,
}

impl Ledger {
    pub fn new(currency: &str) -> Self {
        Self::with_valuation(currency, ValuationPolicy::default())
    }

    pub fn with_valuation(currency: &str, valuation: ValuationPolicy) -> Self {
        Ledger {
            currency: currency.to_string(),
            cash: 0.0,
            deposits: 0.0,
            trades: Vec::new(),
            inventories: HashMap::new(),
            positions: HashMap::new(),
            movements: Vec::new(),
            equity_curve: Vec::new(),
            valuation,
            last_prices: HashMap::new(),
        }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn valuation(&self) -> ValuationPolicy {
        self.valuation
    }

    /// Unchecked: any sign is accepted.
    pub fn add_cash(&mut self, amount: f64) {
        self.cash += amount;
        self.deposits += amount;
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    /// Net cash contributed through [`Ledger::add_cash`].
    pub fn deposits(&self) -> f64 {
        self.deposits
    }

    /// Net quantity held: positive long, negative short, zero flat.
    pub fn position(&self, instrument: &InstrumentId) -> f64 {
        self.positions.get(instrument).copied().unwrap_or(0.0)
    }

    pub fn trade(&self, id: TradeId) -> Option<&Trade> {
        self.trades.get(id.0)
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn closed_trades(&self) -> impl Iterator<Item = &Trade> {
        self.trades
            .iter()
            .filter(|t| t.status() == TradeStatus::Closed)
    }

    pub fn inventory(&self, instrument: &InstrumentId) -> Option<&Inventory> {
        self.inventories.get(instrument)
    }

    pub fn movements(&self) -> &[Movement] {
        &self.movements
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn realized_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.profit_and_loss()).sum()
    }

    /// Book a trade. On error nothing changes.
    pub fn add_transaction(&mut self, mut trade: Trade) -> Result<TradeId, LedgerError> {
        if !(trade.quantity > 0.0 && trade.price > 0.0)
            || !trade.quantity.is_finite()
            || !trade.price.is_finite()
        {
            return Err(LedgerError::InvalidTrade {
                instrument: trade.instrument.clone(),
                quantity: trade.quantity,
                price: trade.price,
            });
        }

        if trade.side == Side::Buy && self.cash < trade.price {
            return Err(LedgerError::InsufficientCash {
                instrument: trade.instrument.clone(),
                required: trade.price,
                available: self.cash,
            });
        }

        let id = TradeId(self.trades.len());
        let unit_price = trade.unit_price();
        let (opposing, entry) = match trade.side {
            Side::Buy => (MovementType::ShortEntry, MovementType::LongEntry),
            Side::Sell => (MovementType::LongEntry, MovementType::ShortEntry),
        };

        let inventory = self.inventories.entry(trade.instrument.clone()).or_default();
        let (matches, unmatched) = inventory.close_fifo(opposing, trade.quantity);

        let mut pnl = 0.0;
        for m in &matches {
            pnl += match trade.side {
                Side::Buy => m.quantity * (m.entry_unit_price - unit_price),
                Side::Sell => m.quantity * (unit_price - m.entry_unit_price),
            };
            if let Some(origin) = self.trades.get_mut(m.trade_id.0) {
                origin.set_remaining(m.remaining_after);
            }
            trace!(
                trade = %id,
                lot = %m.trade_id,
                quantity = m.quantity,
                remaining = m.remaining_after,
                "matched lot"
            );
            self.movements.push(Movement {
                movement: opposing.exit_of(),
                instrument: trade.instrument.clone(),
                trade_id: id,
                lot_trade_id: m.trade_id,
                quantity: m.quantity,
                timestamp: trade.timestamp,
            });
        }

        if unmatched > 0.0 {
            inventory.open(Lot {
                trade_id: id,
                movement: entry,
                unit_price,
                remaining: unmatched,
            });
            self.movements.push(Movement {
                movement: entry,
                instrument: trade.instrument.clone(),
                trade_id: id,
                lot_trade_id: id,
                quantity: unmatched,
                timestamp: trade.timestamp,
            });
        }

        match trade.side {
            Side::Buy => self.cash -= trade.price,
            Side::Sell => self.cash += trade.price,
        }

        let position = self.positions.entry(trade.instrument.clone()).or_insert(0.0);
        *position += trade.signed_quantity();
        if is_negligible(position.abs(), trade.quantity) {
            *position = 0.0;
        }

        trade.profit_and_loss = pnl;
        trade.set_remaining(unmatched);
        self.trades.push(trade);

        Ok(id)
    }

    /// Revalue the book against one calendar step's prices and append the
    /// result to the equity curve.
    pub fn mark_to_market(
        &mut self,
        timestamp: Timestamp,
        slice: &BTreeMap<InstrumentId, Candle>,
    ) -> f64 {
        for (instrument, candle) in slice {
            self.last_prices.insert(instrument.clone(), candle.close);
        }

        let holdings: f64 = self
            .positions
            .iter()
            .filter_map(|(instrument, &qty)| {
                let price = match self.valuation {
                    ValuationPolicy::SliceOnly => slice.get(instrument).map(|c| c.close),
                    ValuationPolicy::CarryForward => self.last_prices.get(instrument).copied(),
                }?;
                Some(qty * price)
            })
            .sum();

        let equity = self.cash + holdings;
        self.equity_curve.push(EquityPoint { timestamp, equity });
        equity
    }
}
