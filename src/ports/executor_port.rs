//! Order execution port trait.
//!
//! The executor holds no reference to the ledger; the runner lends it for the
//! duration of each event hook.

use crate::domain::candle::Candle;
use crate::domain::error::LottraderError;
use crate::domain::instrument::InstrumentId;
use crate::domain::ledger::Ledger;
use crate::domain::order::{Order, OrderEvent, OrderId};
use std::collections::BTreeSet;

pub trait OrderExecutor {
    fn register_strategy(&mut self, strategy_id: &str, interest_set: &BTreeSet<InstrumentId>);

    fn submit(&mut self, order: Order) -> Result<OrderId, LottraderError>;

    /// Start-of-period fills.
    fn on_open(
        &mut self,
        instrument: &InstrumentId,
        candle: &Candle,
        ledger: &mut Ledger,
    ) -> Vec<OrderEvent>;

    /// Intra-period fills and expiries.
    fn on_candle(
        &mut self,
        instrument: &InstrumentId,
        candle: &Candle,
        ledger: &mut Ledger,
    ) -> Vec<OrderEvent>;

    /// Orders still working, oldest first.
    fn pending_orders(&self) -> Vec<&Order>;
}
