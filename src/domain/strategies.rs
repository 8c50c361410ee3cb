//! Built-in strategies.

use crate::domain::candle::Candle;
use crate::domain::error::LottraderError;
use crate::domain::instrument::InstrumentId;
use crate::domain::order::{Order, OrderEvent, OrderKind};
use crate::domain::strategy::{Strategy, StrategyContext, StrategyParams, StrategyRegistry};
use crate::domain::time_series::Timestamp;
use crate::domain::trade::Side;
use std::collections::BTreeSet;
use tracing::debug;

pub fn register_builtins(registry: &mut StrategyRegistry) {
    registry.register(
        "buy_and_hold",
        "Buy once on the first candle and hold to the end",
        BuyAndHold::boxed,
    );
    registry.register(
        "sma_cross",
        "Long when the fast SMA crosses above the slow SMA, flat on the cross below",
        SmaCross::boxed,
    );
}

/// Whole units affordable with `fraction` of `cash` at `price`.
fn units_for(cash: f64, fraction: f64, price: f64) -> f64 {
    if price <= 0.0 || cash <= 0.0 {
        return 0.0;
    }
    (cash * fraction / price).floor()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

pub struct BuyAndHold {
    id: String,
    instrument: InstrumentId,
    market: BTreeSet<InstrumentId>,
    position_size: f64,
    ordered: bool,
    now: Option<Timestamp>,
}

impl BuyAndHold {
    pub fn new(id: String, instrument: InstrumentId, params: &StrategyParams) -> Self {
        BuyAndHold {
            id,
            market: BTreeSet::from([instrument.clone()]),
            instrument,
            position_size: params.position_size,
            ordered: false,
            now: None,
        }
    }

    fn boxed(
        id: String,
        instrument: InstrumentId,
        params: &StrategyParams,
    ) -> Result<Box<dyn Strategy>, LottraderError> {
        Ok(Box::new(Self::new(id, instrument, params)))
    }
}

impl Strategy for BuyAndHold {
    fn id(&self) -> &str {
        &self.id
    }

    fn interest_set(&self) -> &BTreeSet<InstrumentId> {
        &self.market
    }

    fn on_open(
        &mut self,
        _instrument: &InstrumentId,
        _candle: &Candle,
        _ctx: &mut StrategyContext<'_>,
    ) -> Result<(), LottraderError> {
        Ok(())
    }

    fn on_candle(
        &mut self,
        instrument: &InstrumentId,
        candle: &Candle,
        ctx: &mut StrategyContext<'_>,
    ) -> Result<(), LottraderError> {
        if self.ordered || ctx.position(instrument) != 0.0 {
            return Ok(());
        }
        let quantity = units_for(ctx.ledger().cash(), self.position_size, candle.close);
        if quantity < 1.0 {
            return Ok(());
        }
        debug!(strategy = %self.id, at = ?self.now, quantity, "Entering position");
        ctx.submit(Order::new(
            &self.id,
            self.instrument.clone(),
            Side::Buy,
            quantity,
            OrderKind::Market,
        ));
        self.ordered = true;
        Ok(())
    }

    fn set_clock(&mut self, now: Timestamp) {
        self.now = Some(now);
    }

    fn on_order_event(&mut self, event: &OrderEvent) {
        if !matches!(event, OrderEvent::Filled { .. }) {
            self.ordered = false;
        }
    }
}

pub struct SmaCross {
    id: String,
    instrument: InstrumentId,
    market: BTreeSet<InstrumentId>,
    position_size: f64,
    fast_period: usize,
    slow_period: usize,
    prev_spread: Option<f64>,
    pending: bool,
    now: Option<Timestamp>,
}

impl SmaCross {
    pub fn new(
        id: String,
        instrument: InstrumentId,
        params: &StrategyParams,
    ) -> Result<Self, LottraderError> {
        if params.fast_period == 0 || params.fast_period >= params.slow_period {
            return Err(LottraderError::Strategy {
                strategy_id: id,
                reason: format!(
                    "fast_period ({}) must be positive and below slow_period ({})",
                    params.fast_period, params.slow_period
                ),
            });
        }
        Ok(SmaCross {
            id,
            market: BTreeSet::from([instrument.clone()]),
            instrument,
            position_size: params.position_size,
            fast_period: params.fast_period,
            slow_period: params.slow_period,
            prev_spread: None,
            pending: false,
            now: None,
        })
    }

    fn boxed(
        id: String,
        instrument: InstrumentId,
        params: &StrategyParams,
    ) -> Result<Box<dyn Strategy>, LottraderError> {
        Ok(Box::new(Self::new(id, instrument, params)?))
    }
}

impl Strategy for SmaCross {
    fn id(&self) -> &str {
        &self.id
    }

    fn interest_set(&self) -> &BTreeSet<InstrumentId> {
        &self.market
    }

    fn on_open(
        &mut self,
        _instrument: &InstrumentId,
        _candle: &Candle,
        _ctx: &mut StrategyContext<'_>,
    ) -> Result<(), LottraderError> {
        Ok(())
    }

    fn on_candle(
        &mut self,
        instrument: &InstrumentId,
        candle: &Candle,
        ctx: &mut StrategyContext<'_>,
    ) -> Result<(), LottraderError> {
        let Some(closes) = ctx.series().last_closes(self.slow_period) else {
            return Ok(());
        };
        let fast = mean(&closes[closes.len() - self.fast_period..]);
        let slow = mean(&closes);
        let spread = fast - slow;

        let prev = self.prev_spread.replace(spread);
        let Some(prev) = prev else {
            return Ok(());
        };
        if self.pending {
            return Ok(());
        }

        let position = ctx.position(instrument);
        if prev <= 0.0 && spread > 0.0 && position <= 0.0 {
            let quantity = units_for(ctx.ledger().cash(), self.position_size, candle.close);
            if quantity >= 1.0 {
                debug!(strategy = %self.id, at = ?self.now, fast, slow, "Golden cross");
                ctx.submit(Order::new(
                    &self.id,
                    self.instrument.clone(),
                    Side::Buy,
                    quantity,
                    OrderKind::Market,
                ));
                self.pending = true;
            }
        } else if prev >= 0.0 && spread < 0.0 && position > 0.0 {
            debug!(strategy = %self.id, at = ?self.now, fast, slow, "Death cross");
            ctx.submit(Order::new(
                &self.id,
                self.instrument.clone(),
                Side::Sell,
                position,
                OrderKind::Market,
            ));
            self.pending = true;
        }
        Ok(())
    }

    fn set_clock(&mut self, now: Timestamp) {
        self.now = Some(now);
    }

    fn on_order_event(&mut self, _event: &OrderEvent) {
        self.pending = false;
    }
}
