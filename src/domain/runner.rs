//! Simulation loop.
//!
//! The runner owns the ledger, the strategy instances and the growing
//! per-instrument series. Each calendar step pulls the market slice of
//! candles falling inside the step and, per instrument in the slice:
//!
//! 1. appends the candle to the instrument's series,
//! 2. sends `on_open` to interested strategies,
//! 3. sends `on_open` then `on_candle` to the order executor,
//! 4. updates every strategy's clock and sends `on_candle` to the interested ones.
//!
//! The ledger is marked to market once the whole slice has been dispatched.

use crate::domain::calendar::{Precision, TradingCalendar};
use crate::domain::candle::Candle;
use crate::domain::error::LottraderError;
use crate::domain::instrument::InstrumentId;
use crate::domain::ledger::{EquityPoint, Ledger, ValuationPolicy};
use crate::domain::order::{Order, OrderEvent};
use crate::domain::statistics::PortfolioStatistics;
use crate::domain::strategy::{Strategy, StrategyContext, StrategyParams, StrategyRegistry};
use crate::domain::time_series::{TimeSeries, Timestamp};
use crate::domain::trade::Trade;
use crate::ports::executor_port::OrderExecutor;
use crate::ports::market_port::MarketDataSource;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    pub entry: Timestamp,
    pub exit: Timestamp,
    pub currency: String,
    pub precision: Precision,
    /// Comma separated registry keys.
    pub strategy: String,
    pub instruments: Vec<InstrumentId>,
    pub initial_cash: f64,
    pub valuation: ValuationPolicy,
    pub params: StrategyParams,
    pub risk_free_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Uninitialized,
    Ready,
    Running,
    Complete,
}

#[derive(Debug, Clone)]
pub struct SummaryReport {
    pub start: Timestamp,
    pub end: Timestamp,
    pub steps: usize,
    /// Candles dispatched across all steps.
    pub candles: usize,
    pub currency: String,
    pub statistics: PortfolioStatistics,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
}

pub struct Runner {
    config: RunnerConfig,
    market: Box<dyn MarketDataSource>,
    executor: Box<dyn OrderExecutor>,
    registry: StrategyRegistry,
    ledger: Ledger,
    strategies: Vec<Box<dyn Strategy>>,
    series: HashMap<InstrumentId, TimeSeries>,
    state: RunnerState,
}

impl Runner {
    pub fn new(
        config: RunnerConfig,
        market: Box<dyn MarketDataSource>,
        executor: Box<dyn OrderExecutor>,
        registry: StrategyRegistry,
    ) -> Self {
        let ledger = Ledger::with_valuation(&config.currency, config.valuation);
        Runner {
            config,
            market,
            executor,
            registry,
            ledger,
            strategies: Vec::new(),
            series: HashMap::new(),
            state: RunnerState::Uninitialized,
        }
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn strategy_ids(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.id()).collect()
    }

    /// Series grown so far for `instrument`.
    pub fn series(&self, instrument: &InstrumentId) -> Option<&TimeSeries> {
        self.series.get(instrument)
    }

    /// Resolve strategies, load their markets and register them with the
    /// executor. Idempotent once `Ready`.
    pub fn initialize(&mut self) -> Result<(), LottraderError> {
        match self.state {
            RunnerState::Uninitialized => {}
            RunnerState::Ready => return Ok(()),
            RunnerState::Running | RunnerState::Complete => {
                return Err(LottraderError::RunAlreadyComplete);
            }
        }

        let strategies = self
            .registry
            .resolve(
                &self.config.strategy,
                &self.config.instruments,
                &self.config.params,
            )
            .inspect_err(|e| error!(error = %e, "No strategy to run"))?;

        for strategy in &strategies {
            for instrument in strategy.interest_set() {
                if self.series.contains_key(instrument) {
                    continue;
                }
                let history =
                    self.market
                        .load_history(instrument, self.config.entry, self.config.exit)?;
                if history.is_empty() {
                    warn!(
                        instrument = %instrument,
                        entry = %self.config.entry,
                        exit = %self.config.exit,
                        "No candles inside the simulation window"
                    );
                } else {
                    debug!(
                        instrument = %instrument,
                        candles = history.len(),
                        "History available in window"
                    );
                }
                self.series
                    .insert(instrument.clone(), TimeSeries::new(instrument.clone()));
            }
            self.executor
                .register_strategy(strategy.id(), strategy.interest_set());
        }

        self.ledger.add_cash(self.config.initial_cash);
        self.strategies = strategies;
        self.state = RunnerState::Ready;

        info!(
            strategies = self.strategies.len(),
            instruments = self.series.len(),
            cash = self.config.initial_cash,
            currency = %self.config.currency,
            "Runner initialized"
        );
        Ok(())
    }

    /// Clip the requested window to the loaded data. Bounds are compared at
    /// step granularity so a date-only entry or exit covers candles stamped
    /// later that day.
    fn resolve_calendar(&self) -> Result<TradingCalendar, LottraderError> {
        let (first, last) = self.market.bounds().ok_or_else(|| LottraderError::Data {
            reason: "no market data loaded".to_string(),
        })?;
        let (entry, exit) = (self.config.entry, self.config.exit);
        let precision = self.config.precision;

        if precision.floor(first) > exit || last < precision.floor(entry) {
            return Err(LottraderError::ScheduleMismatch {
                entry,
                exit,
                first,
                last,
            });
        }

        let start = entry.max(first);
        let end = exit.min(last);
        if start != entry || end != exit {
            debug!(%start, %end, "Simulation window clipped to market data");
        }
        Ok(TradingCalendar::new(start, end, self.config.precision))
    }

    pub fn run(&mut self) -> Result<SummaryReport, LottraderError> {
        match self.state {
            RunnerState::Uninitialized => self.initialize()?,
            RunnerState::Ready => {}
            RunnerState::Running | RunnerState::Complete => {
                return Err(LottraderError::RunAlreadyComplete);
            }
        }

        let calendar = self.resolve_calendar()?;
        for strategy in &mut self.strategies {
            strategy.init()?;
        }

        self.state = RunnerState::Running;
        info!(
            start = %calendar.start_day(),
            end = %calendar.end_day(),
            precision = %calendar.precision(),
            "Starting backtest"
        );

        let precision = calendar.precision();
        let mut steps = 0;
        let mut candles = 0;
        for timestamp in &calendar {
            let slice = self
                .market
                .market_slice(timestamp, precision.step_end(timestamp));
            for (instrument, candle) in &slice {
                self.dispatch(timestamp, instrument, candle)?;
            }
            self.ledger.mark_to_market(timestamp, &slice);
            candles += slice.len();
            steps += 1;
        }

        self.state = RunnerState::Complete;
        if candles == 0 {
            warn!(
                steps,
                precision = %precision,
                "No candles matched any calendar step"
            );
        }

        let statistics = PortfolioStatistics::compute(&self.ledger, self.config.risk_free_rate);
        info!(
            steps,
            candles,
            initial_wealth = statistics.initial_wealth,
            final_wealth = statistics.final_wealth,
            annualized_return = statistics.annualized_return,
            realized_pnl = statistics.realized_pnl,
            max_drawdown = statistics.draw_down.biggest_draw_down,
            winning_trades = statistics.winning_trades,
            losing_trades = statistics.losing_trades,
            "Backtest complete"
        );

        Ok(SummaryReport {
            start: calendar.start_day(),
            end: calendar.end_day(),
            steps,
            candles,
            currency: self.ledger.currency().to_string(),
            statistics,
            equity_curve: self.ledger.equity_curve().to_vec(),
            trades: self.ledger.trades().to_vec(),
        })
    }

    fn dispatch(
        &mut self,
        timestamp: Timestamp,
        instrument: &InstrumentId,
        candle: &Candle,
    ) -> Result<(), LottraderError> {
        let Runner {
            strategies,
            series,
            ledger,
            executor,
            ..
        } = self;

        let series = series
            .entry(instrument.clone())
            .or_insert_with(|| TimeSeries::new(instrument.clone()));
        series.append(*candle)?;

        let mut outbox = Vec::new();
        for strategy in strategies.iter_mut() {
            if strategy.interest_set().contains(instrument) {
                let mut ctx = StrategyContext::new(series, ledger, &mut outbox);
                strategy.on_open(instrument, candle, &mut ctx)?;
            }
        }
        submit_all(executor.as_mut(), &mut outbox)?;

        let events = executor.on_open(instrument, candle, ledger);
        deliver(strategies, &events);
        let events = executor.on_candle(instrument, candle, ledger);
        deliver(strategies, &events);

        for strategy in strategies.iter_mut() {
            strategy.set_clock(timestamp);
            if strategy.interest_set().contains(instrument) {
                let mut ctx = StrategyContext::new(series, ledger, &mut outbox);
                strategy.on_candle(instrument, candle, &mut ctx)?;
            }
        }
        submit_all(executor.as_mut(), &mut outbox)?;

        Ok(())
    }
}

fn submit_all(executor: &mut dyn OrderExecutor, outbox: &mut Vec<Order>) -> Result<(), LottraderError> {
    for order in outbox.drain(..) {
        executor.submit(order)?;
    }
    Ok(())
}

fn deliver(strategies: &mut [Box<dyn Strategy>], events: &[OrderEvent]) {
    for event in events {
        for strategy in strategies
            .iter_mut()
            .filter(|s| s.id() == event.strategy_id())
        {
            strategy.on_order_event(event);
        }
    }
}
