//! End-to-end runs through the runner with in-memory market data.

mod common;

use approx::assert_relative_eq;
use common::*;
use lottrader::adapters::simulated_order_manager::SimulatedOrderManager;
use lottrader::domain::calendar::Precision;
use lottrader::domain::candle::Candle;
use lottrader::domain::error::LottraderError;
use lottrader::domain::instrument::InstrumentId;
use lottrader::domain::ledger::ValuationPolicy;
use lottrader::domain::market::MarketManager;
use lottrader::domain::order::{Order, OrderEvent, OrderKind};
use lottrader::domain::runner::{Runner, RunnerConfig, RunnerState};
use lottrader::domain::strategy::{Strategy, StrategyContext, StrategyParams, StrategyRegistry};
use lottrader::domain::time_series::Timestamp;
use lottrader::domain::trade::{Side, TradeStatus};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

type Log = Rc<RefCell<Vec<String>>>;

/// Records every callback it receives into a shared log.
struct Recorder {
    id: String,
    market: BTreeSet<InstrumentId>,
    log: Log,
    first_order: Option<Order>,
    fail_on_candle: bool,
}

impl Recorder {
    fn record(&self, entry: String) {
        self.log.borrow_mut().push(format!("{} {entry}", self.id));
    }
}

impl Strategy for Recorder {
    fn id(&self) -> &str {
        &self.id
    }

    fn interest_set(&self) -> &BTreeSet<InstrumentId> {
        &self.market
    }

    fn init(&mut self) -> Result<(), LottraderError> {
        self.record("init".into());
        Ok(())
    }

    fn on_open(
        &mut self,
        _instrument: &InstrumentId,
        candle: &Candle,
        ctx: &mut StrategyContext<'_>,
    ) -> Result<(), LottraderError> {
        self.record(format!(
            "open {} len={}",
            candle.timestamp.date(),
            ctx.series().len()
        ));
        if let Some(order) = self.first_order.take() {
            ctx.submit(order);
        }
        Ok(())
    }

    fn on_candle(
        &mut self,
        _instrument: &InstrumentId,
        candle: &Candle,
        ctx: &mut StrategyContext<'_>,
    ) -> Result<(), LottraderError> {
        self.record(format!(
            "candle {} len={}",
            candle.timestamp.date(),
            ctx.series().len()
        ));
        if self.fail_on_candle {
            return Err(LottraderError::Strategy {
                strategy_id: self.id.clone(),
                reason: "boom".into(),
            });
        }
        Ok(())
    }

    fn set_clock(&mut self, now: Timestamp) {
        self.record(format!("clock {}", now.date()));
    }

    fn on_order_event(&mut self, event: &OrderEvent) {
        let kind = match event {
            OrderEvent::Filled { .. } => "filled",
            OrderEvent::Rejected { .. } => "rejected",
            OrderEvent::Expired(_) => "expired",
        };
        self.record(kind.to_string());
    }
}

fn recorder_registry(log: &Log, order_quantity: Option<f64>, fail_on_candle: bool) -> StrategyRegistry {
    let log = Rc::clone(log);
    let mut registry = StrategyRegistry::new();
    registry.register(
        "rec",
        "records callbacks",
        move |id: String, instrument: InstrumentId, _: &StrategyParams| {
            let first_order = order_quantity
                .map(|q| Order::new(&id, instrument.clone(), Side::Buy, q, OrderKind::Market));
            Ok(Box::new(Recorder {
                id,
                market: BTreeSet::from([instrument]),
                log: Rc::clone(&log),
                first_order,
                fail_on_candle,
            }) as Box<dyn Strategy>)
        },
    );
    registry
}

fn config(strategy: &str, instruments: Vec<InstrumentId>, entry: &str, exit: &str) -> RunnerConfig {
    RunnerConfig {
        entry: ts(entry),
        exit: ts(exit),
        currency: "USD".to_string(),
        precision: Precision::Daily,
        strategy: strategy.to_string(),
        instruments,
        initial_cash: 1000.0,
        valuation: ValuationPolicy::SliceOnly,
        params: StrategyParams::default(),
        risk_free_rate: 0.0,
    }
}

fn runner(config: RunnerConfig, data: MockDataPort, registry: StrategyRegistry) -> Runner {
    Runner::new(
        config,
        Box::new(MarketManager::new(Box::new(data))),
        Box::new(SimulatedOrderManager::default()),
        registry,
    )
}

fn entries(log: &Log, id: &str) -> Vec<String> {
    let prefix = format!("{id} ");
    log.borrow()
        .iter()
        .filter_map(|e| e.strip_prefix(&prefix).map(str::to_string))
        .collect()
}

mod dispatch {
    use super::*;

    #[test]
    fn callbacks_follow_step_order() {
        let log = Log::default();
        let data = MockDataPort::new().with_candles(
            ibm(),
            vec![flat_candle("2024-01-02", 100.0), flat_candle("2024-01-03", 101.0)],
        );
        let mut runner = runner(
            config("rec", vec![ibm()], "2024-01-02", "2024-01-03"),
            data,
            recorder_registry(&log, Some(1.0), false),
        );

        runner.run().unwrap();

        assert_eq!(
            entries(&log, "rec:IBM"),
            vec![
                "init",
                "open 2024-01-02 len=1",
                "filled",
                "clock 2024-01-02",
                "candle 2024-01-02 len=1",
                "open 2024-01-03 len=2",
                "clock 2024-01-03",
                "candle 2024-01-03 len=2",
            ]
        );
        let trade = &runner.ledger().trades()[0];
        assert_relative_eq!(trade.price, 100.0);
        assert_eq!(trade.timestamp, ts("2024-01-02"));
    }

    #[test]
    fn clock_reaches_strategies_without_a_candle() {
        let log = Log::default();
        let data = MockDataPort::new()
            .with_candles(ibm(), vec![flat_candle("2024-01-02", 100.0)])
            .with_candles(goog(), vec![flat_candle("2024-01-03", 50.0)]);
        let mut runner = runner(
            config("rec", vec![ibm(), goog()], "2024-01-02", "2024-01-03"),
            data,
            recorder_registry(&log, None, false),
        );

        runner.run().unwrap();

        assert_eq!(
            entries(&log, "rec:GOOG"),
            vec![
                "init",
                "clock 2024-01-02",
                "open 2024-01-03 len=1",
                "clock 2024-01-03",
                "candle 2024-01-03 len=1",
            ]
        );
        assert_eq!(runner.series(&ibm()).unwrap().len(), 1);
        assert_eq!(runner.series(&goog()).unwrap().len(), 1);
    }

    #[test]
    fn rejected_orders_are_reported_and_run_continues() {
        let log = Log::default();
        let data = MockDataPort::new().with_candles(
            ibm(),
            vec![flat_candle("2024-01-02", 100.0), flat_candle("2024-01-03", 100.0)],
        );
        let mut runner = runner(
            config("rec", vec![ibm()], "2024-01-02", "2024-01-03"),
            data,
            recorder_registry(&log, Some(50.0), false),
        );

        let report = runner.run().unwrap();

        assert!(entries(&log, "rec:IBM").contains(&"rejected".to_string()));
        assert!(report.trades.is_empty());
        assert_relative_eq!(runner.ledger().cash(), 1000.0);
        assert_eq!(runner.state(), RunnerState::Complete);
    }

    #[test]
    fn strategy_error_aborts_the_run() {
        let log = Log::default();
        let data = MockDataPort::new().with_candles(
            ibm(),
            vec![flat_candle("2024-01-02", 100.0), flat_candle("2024-01-03", 100.0)],
        );
        let mut runner = runner(
            config("rec", vec![ibm()], "2024-01-02", "2024-01-03"),
            data,
            recorder_registry(&log, None, true),
        );

        let err = runner.run().unwrap_err();
        assert!(matches!(err, LottraderError::Strategy { .. }));
        assert!(runner.ledger().equity_curve().is_empty());
        assert!(matches!(
            runner.run().unwrap_err(),
            LottraderError::RunAlreadyComplete
        ));
    }
}

mod schedule {
    use super::*;

    #[test]
    fn disjoint_window_is_a_schedule_mismatch() {
        let log = Log::default();
        let data = MockDataPort::new().with_candles(
            ibm(),
            vec![flat_candle("2024-01-02", 100.0), flat_candle("2024-01-03", 100.0)],
        );
        let mut runner = runner(
            config("rec", vec![ibm()], "2023-01-02", "2023-06-30"),
            data,
            recorder_registry(&log, None, false),
        );

        let err = runner.run().unwrap_err();

        assert!(matches!(err, LottraderError::ScheduleMismatch { .. }));
        assert_eq!(err.exit_status(), 5);
        assert!(entries(&log, "rec:IBM").is_empty());
        assert!(runner.ledger().equity_curve().is_empty());
        assert_ne!(runner.state(), RunnerState::Running);
    }

    #[test]
    fn window_is_clipped_to_available_data() {
        let log = Log::default();
        let data = MockDataPort::new().with_candles(
            ibm(),
            weekday_candles("2024-01-02", &[100.0, 101.0, 102.0, 103.0]),
        );
        let mut runner = runner(
            config("rec", vec![ibm()], "2023-12-01", "2024-12-31"),
            data,
            recorder_registry(&log, None, false),
        );

        let report = runner.run().unwrap();

        assert_eq!(report.start, ts("2024-01-02"));
        assert_eq!(report.end, ts("2024-01-05"));
        assert_eq!(report.steps, 4);
        assert_eq!(report.equity_curve.len(), 4);
    }

    #[test]
    fn equity_is_marked_on_steps_without_candles() {
        let log = Log::default();
        let data = MockDataPort::new().with_candles(
            ibm(),
            vec![flat_candle("2024-01-02", 100.0), flat_candle("2024-01-05", 100.0)],
        );
        let mut runner = runner(
            config("rec", vec![ibm()], "2024-01-02", "2024-01-05"),
            data,
            recorder_registry(&log, None, false),
        );

        let report = runner.run().unwrap();

        assert_eq!(report.steps, 4);
        assert_eq!(report.equity_curve.len(), report.steps);
        let stamps: Vec<Timestamp> = report.equity_curve.iter().map(|p| p.timestamp).collect();
        assert_eq!(
            stamps,
            vec![
                ts("2024-01-02"),
                ts("2024-01-03"),
                ts("2024-01-04"),
                ts("2024-01-05")
            ]
        );
        assert_eq!(report.candles, 2);
    }

    #[test]
    fn daily_steps_match_candles_stamped_at_the_close() {
        let log = Log::default();
        let at_close: Vec<Candle> = weekday_candles("2024-01-02", &[100.0, 101.0, 102.0, 103.0])
            .into_iter()
            .map(|c| Candle {
                timestamp: c.timestamp + chrono::Duration::hours(16),
                ..c
            })
            .collect();
        let data = MockDataPort::new().with_candles(ibm(), at_close);
        let mut runner = runner(
            config("rec", vec![ibm()], "2024-01-03", "2024-01-05"),
            data,
            recorder_registry(&log, Some(1.0), false),
        );

        let report = runner.run().unwrap();

        assert_eq!(report.steps, 3);
        assert_eq!(report.candles, 3);
        let candles: Vec<String> = entries(&log, "rec:IBM")
            .into_iter()
            .filter(|e| e.starts_with("candle"))
            .collect();
        assert_eq!(
            candles,
            vec![
                "candle 2024-01-03 len=1",
                "candle 2024-01-04 len=2",
                "candle 2024-01-05 len=3"
            ]
        );
        // Bought at the 2024-01-03 open of 101, marked at the 2024-01-05 close.
        assert_eq!(report.trades.len(), 1);
        assert_relative_eq!(report.statistics.final_wealth, 1002.0);
    }
}

mod lifecycle {
    use super::*;

    #[test]
    fn unresolved_selector_never_runs() {
        let log = Log::default();
        let data = MockDataPort::new().with_candles(ibm(), vec![flat_candle("2024-01-02", 100.0)]);
        let mut runner = runner(
            config("nope", vec![ibm()], "2024-01-02", "2024-01-02"),
            data,
            recorder_registry(&log, None, false),
        );

        let err = runner.run().unwrap_err();

        assert!(matches!(err, LottraderError::NoStrategyResolved { .. }));
        assert_eq!(err.exit_status(), 4);
        assert_eq!(runner.state(), RunnerState::Uninitialized);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn instrument_with_no_candles_in_window_still_initializes() {
        let log = Log::default();
        let data = MockDataPort::new()
            .with_candles(ibm(), vec![flat_candle("2024-01-02", 100.0)])
            .with_candles(goog(), vec![flat_candle("2023-06-01", 50.0)]);
        let mut runner = runner(
            config("rec", vec![ibm(), goog()], "2024-01-02", "2024-01-02"),
            data,
            recorder_registry(&log, None, false),
        );

        runner.initialize().unwrap();
        let report = runner.run().unwrap();

        assert_eq!(report.candles, 1);
        assert!(runner.series(&goog()).unwrap().is_empty());
        assert_eq!(runner.series(&ibm()).unwrap().len(), 1);
    }

    #[test]
    fn missing_market_data_fails_initialization() {
        let log = Log::default();
        let data = MockDataPort::new().with_error(ibm(), "provider offline");
        let mut runner = runner(
            config("rec", vec![ibm()], "2024-01-02", "2024-01-05"),
            data,
            recorder_registry(&log, None, false),
        );

        let err = runner.initialize().unwrap_err();
        assert!(matches!(err, LottraderError::MarketDataUnavailable { .. }));
        assert_eq!(runner.state(), RunnerState::Uninitialized);
    }

    #[test]
    fn initialize_is_idempotent_and_funds_once() {
        let log = Log::default();
        let data = MockDataPort::new().with_candles(ibm(), vec![flat_candle("2024-01-02", 100.0)]);
        let mut runner = runner(
            config("rec", vec![ibm()], "2024-01-02", "2024-01-02"),
            data,
            recorder_registry(&log, None, false),
        );

        runner.initialize().unwrap();
        runner.initialize().unwrap();

        assert_eq!(runner.state(), RunnerState::Ready);
        assert_eq!(runner.strategy_ids(), vec!["rec:IBM"]);
        assert_relative_eq!(runner.ledger().cash(), 1000.0);
    }

    #[test]
    fn completed_run_cannot_run_again() {
        let log = Log::default();
        let data = MockDataPort::new().with_candles(ibm(), vec![flat_candle("2024-01-02", 100.0)]);
        let mut runner = runner(
            config("rec", vec![ibm()], "2024-01-02", "2024-01-02"),
            data,
            recorder_registry(&log, None, false),
        );

        runner.run().unwrap();
        assert_eq!(runner.state(), RunnerState::Complete);

        assert!(matches!(
            runner.run().unwrap_err(),
            LottraderError::RunAlreadyComplete
        ));
        assert!(matches!(
            runner.initialize().unwrap_err(),
            LottraderError::RunAlreadyComplete
        ));
    }
}

mod builtins {
    use super::*;

    #[test]
    fn buy_and_hold_enters_on_next_open_and_rides() {
        let data = MockDataPort::new().with_candles(
            ibm(),
            weekday_candles("2024-01-02", &[100.0, 102.0, 104.0, 106.0, 108.0]),
        );
        let mut cfg = config("buy_and_hold", vec![ibm()], "2024-01-02", "2024-01-08");
        cfg.initial_cash = 10_000.0;
        let mut runner = runner(cfg, data, StrategyRegistry::with_builtins());

        let report = runner.run().unwrap();

        // 25% of 10000 at close 100, filled at the next open of 102.
        assert_eq!(report.trades.len(), 1);
        let trade = &report.trades[0];
        assert_eq!(trade.side, Side::Buy);
        assert_relative_eq!(trade.quantity, 25.0);
        assert_relative_eq!(trade.price, 2550.0);
        assert_eq!(trade.status(), TradeStatus::Open);

        let equity: Vec<f64> = report.equity_curve.iter().map(|p| p.equity).collect();
        assert_eq!(equity.len(), 5);
        assert_relative_eq!(equity[0], 10_000.0);
        assert_relative_eq!(equity[1], 10_000.0);
        assert_relative_eq!(equity[4], 7450.0 + 25.0 * 108.0);

        let stats = &report.statistics;
        assert_relative_eq!(stats.initial_wealth, 10_000.0);
        assert_relative_eq!(stats.final_wealth, 10_150.0);
        assert_relative_eq!(stats.total_return, 0.015, epsilon = 1e-12);
        assert_eq!(stats.winning_trades + stats.losing_trades, 0);
        assert_eq!(report.currency, "USD");
    }

    #[test]
    fn strategy_set_runs_every_key_per_instrument() {
        let data = MockDataPort::new()
            .with_candles(ibm(), weekday_candles("2024-01-02", &[100.0, 101.0]))
            .with_candles(goog(), weekday_candles("2024-01-02", &[50.0, 51.0]));
        let mut cfg = config(
            "buy_and_hold,sma_cross",
            vec![ibm(), goog()],
            "2024-01-02",
            "2024-01-03",
        );
        cfg.initial_cash = 10_000.0;
        let mut runner = runner(cfg, data, StrategyRegistry::with_builtins());

        runner.initialize().unwrap();
        assert_eq!(
            runner.strategy_ids(),
            vec![
                "buy_and_hold:IBM",
                "buy_and_hold:GOOG",
                "sma_cross:IBM",
                "sma_cross:GOOG"
            ]
        );

        let report = runner.run().unwrap();
        assert_eq!(report.trades.len(), 2);
        assert!(runner.ledger().position(&ibm()) > 0.0);
        assert!(runner.ledger().position(&goog()) > 0.0);
    }
}
