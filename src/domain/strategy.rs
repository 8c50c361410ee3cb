//! Strategy contract and the registry that resolves strategy keys.
//!
//! Strategies are mono-instrument: a registry key fans out into one instance
//! per configured instrument, each with the id `key:CODE`.

use crate::domain::candle::Candle;
use crate::domain::error::LottraderError;
use crate::domain::instrument::InstrumentId;
use crate::domain::ledger::Ledger;
use crate::domain::order::{Order, OrderEvent};
use crate::domain::time_series::{TimeSeries, Timestamp};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// What a strategy sees during a callback: the growing series of the
/// instrument being dispatched, the ledger, and an outbox for new orders.
pub struct StrategyContext<'a> {
    series: &'a TimeSeries,
    ledger: &'a Ledger,
    outbox: &'a mut Vec<Order>,
}

impl<'a> StrategyContext<'a> {
    pub fn new(series: &'a TimeSeries, ledger: &'a Ledger, outbox: &'a mut Vec<Order>) -> Self {
        StrategyContext {
            series,
            ledger,
            outbox,
        }
    }

    pub fn series(&self) -> &TimeSeries {
        self.series
    }

    pub fn ledger(&self) -> &Ledger {
        self.ledger
    }

    pub fn position(&self, instrument: &InstrumentId) -> f64 {
        self.ledger.position(instrument)
    }

    /// Queue an order; the runner hands it to the executor after the callback.
    pub fn submit(&mut self, order: Order) {
        self.outbox.push(order);
    }
}

pub trait Strategy {
    fn id(&self) -> &str;

    fn interest_set(&self) -> &BTreeSet<InstrumentId>;

    fn init(&mut self) -> Result<(), LottraderError> {
        Ok(())
    }

    fn on_open(
        &mut self,
        instrument: &InstrumentId,
        candle: &Candle,
        ctx: &mut StrategyContext<'_>,
    ) -> Result<(), LottraderError>;

    fn on_candle(
        &mut self,
        instrument: &InstrumentId,
        candle: &Candle,
        ctx: &mut StrategyContext<'_>,
    ) -> Result<(), LottraderError>;

    fn set_clock(&mut self, now: Timestamp);

    fn on_order_event(&mut self, _event: &OrderEvent) {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyParams {
    /// Fraction of available cash committed per entry.
    pub position_size: f64,
    pub fast_period: usize,
    pub slow_period: usize,
}

impl Default for StrategyParams {
    fn default() -> Self {
        StrategyParams {
            position_size: 0.25,
            fast_period: 10,
            slow_period: 30,
        }
    }
}

/// Builds the instance `id` bound to `instrument`.
pub type StrategyFactory =
    Box<dyn Fn(String, InstrumentId, &StrategyParams) -> Result<Box<dyn Strategy>, LottraderError>>;

struct RegistryEntry {
    description: &'static str,
    factory: StrategyFactory,
}

#[derive(Default)]
pub struct StrategyRegistry {
    entries: BTreeMap<String, RegistryEntry>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in strategies.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::domain::strategies::register_builtins(&mut registry);
        registry
    }

    pub fn register<F>(&mut self, key: &str, description: &'static str, factory: F)
    where
        F: Fn(String, InstrumentId, &StrategyParams) -> Result<Box<dyn Strategy>, LottraderError>
            + 'static,
    {
        self.entries.insert(
            key.to_string(),
            RegistryEntry {
                description,
                factory: Box::new(factory),
            },
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// `(key, description)` pairs in key order.
    pub fn describe(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(k, e)| (k.as_str(), e.description))
    }

    /// Instantiate every strategy named by `selector` (comma separated keys)
    /// once per instrument. Unknown keys are skipped; an empty result is an
    /// error.
    pub fn resolve(
        &self,
        selector: &str,
        instruments: &[InstrumentId],
        params: &StrategyParams,
    ) -> Result<Vec<Box<dyn Strategy>>, LottraderError> {
        let mut strategies: Vec<Box<dyn Strategy>> = Vec::new();
        let mut seen = BTreeSet::new();

        for key in selector.split(',').map(str::trim).filter(|k| !k.is_empty()) {
            let Some(entry) = self.entries.get(key) else {
                warn!(key, "Unknown strategy key");
                continue;
            };
            for instrument in instruments {
                let id = format!("{key}:{}", instrument.code);
                if !seen.insert(id.clone()) {
                    continue;
                }
                strategies.push((entry.factory)(id, instrument.clone(), params)?);
            }
        }

        if strategies.is_empty() {
            return Err(LottraderError::NoStrategyResolved {
                selector: selector.to_string(),
            });
        }
        Ok(strategies)
    }
}
