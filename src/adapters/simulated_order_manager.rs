//! Simulated order execution against replayed candles.
//!
//! Market orders fill at the next candle open. Limit and stop orders are
//! checked against each completed candle and expire after `order_ttl`
//! candles without a fill (0 keeps them working). Slippage moves the fill
//! price against the order; commission is added to a buy's total price and
//! deducted from a sell's proceeds.

use crate::domain::candle::Candle;
use crate::domain::error::LottraderError;
use crate::domain::execution::{fill_cost, ExecutionConfig};
use crate::domain::instrument::InstrumentId;
use crate::domain::ledger::Ledger;
use crate::domain::order::{Order, OrderEvent, OrderId, OrderKind};
use crate::domain::trade::Trade;
use crate::ports::executor_port::OrderExecutor;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

#[derive(Debug)]
struct WorkingOrder {
    order: Order,
    age: usize,
}

#[derive(Debug, Default)]
pub struct SimulatedOrderManager {
    config: ExecutionConfig,
    strategies: HashMap<String, BTreeSet<InstrumentId>>,
    working: Vec<WorkingOrder>,
    next_id: u64,
}

impl SimulatedOrderManager {
    pub fn new(config: ExecutionConfig) -> Self {
        SimulatedOrderManager {
            config,
            ..Self::default()
        }
    }

    fn fill(&self, order: Order, unit_price: f64, candle: &Candle, ledger: &mut Ledger) -> OrderEvent {
        let cost = fill_cost(unit_price, order.side, order.quantity, &self.config);
        let trade = Trade::new(
            order.side,
            order.instrument.clone(),
            order.quantity,
            cost.total,
            candle.timestamp,
        );
        match ledger.add_transaction(trade) {
            Ok(trade) => {
                debug!(
                    order = %order,
                    trade = %trade,
                    unit_price = cost.unit_price,
                    commission = cost.commission,
                    "Order filled"
                );
                OrderEvent::Filled { order, trade }
            }
            Err(reason) => {
                warn!(order = %order, %reason, "Order rejected");
                OrderEvent::Rejected { order, reason }
            }
        }
    }

    /// Remove and return the working orders on `instrument` that `select` accepts.
    fn take_orders(
        &mut self,
        instrument: &InstrumentId,
        select: impl Fn(&Order) -> bool,
    ) -> Vec<WorkingOrder> {
        let (taken, kept) = std::mem::take(&mut self.working)
            .into_iter()
            .partition(|w| w.order.instrument == *instrument && select(&w.order));
        self.working = kept;
        taken
    }
}

impl OrderExecutor for SimulatedOrderManager {
    fn register_strategy(&mut self, strategy_id: &str, interest_set: &BTreeSet<InstrumentId>) {
        self.strategies
            .insert(strategy_id.to_string(), interest_set.clone());
    }

    fn submit(&mut self, mut order: Order) -> Result<OrderId, LottraderError> {
        let Some(interest_set) = self.strategies.get(&order.strategy_id) else {
            return Err(LottraderError::UnknownStrategy {
                strategy_id: order.strategy_id,
            });
        };
        if !interest_set.contains(&order.instrument) {
            return Err(LottraderError::Strategy {
                reason: format!("order on {} outside its market", order.instrument),
                strategy_id: order.strategy_id,
            });
        }
        self.next_id += 1;
        order.id = OrderId(self.next_id);
        debug!(order = %order, strategy = %order.strategy_id, "Order submitted");
        let id = order.id;
        self.working.push(WorkingOrder { order, age: 0 });
        Ok(id)
    }

    fn on_open(
        &mut self,
        instrument: &InstrumentId,
        candle: &Candle,
        ledger: &mut Ledger,
    ) -> Vec<OrderEvent> {
        self.take_orders(instrument, |o| matches!(o.kind, OrderKind::Market))
            .into_iter()
            .map(|w| self.fill(w.order, candle.open, candle, ledger))
            .collect()
    }

    fn on_candle(
        &mut self,
        instrument: &InstrumentId,
        candle: &Candle,
        ledger: &mut Ledger,
    ) -> Vec<OrderEvent> {
        let mut events = Vec::new();
        for mut w in self.take_orders(instrument, |o| !matches!(o.kind, OrderKind::Market)) {
            if let Some(price) = w.order.fill_price(candle) {
                events.push(self.fill(w.order, price, candle, ledger));
                continue;
            }
            w.age += 1;
            if self.config.order_ttl > 0 && w.age >= self.config.order_ttl {
                debug!(order = %w.order, age = w.age, "Order expired");
                events.push(OrderEvent::Expired(w.order));
            } else {
                self.working.push(w);
            }
        }
        events
    }

    fn pending_orders(&self) -> Vec<&Order> {
        self.working.iter().map(|w| &w.order).collect()
    }
}
