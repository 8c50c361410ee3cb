//! Execution cost model: slippage and commission folded into a fill's total price.

use super::trade::Side;

/// Cost model and order lifetime for simulated fills.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
    /// Candles a limit or stop order may stay unfilled; 0 = good till cancelled.
    pub order_ttl: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            commission_per_trade: 0.0,
            commission_pct: 0.0,
            slippage_pct: 0.0,
            order_ttl: 0,
        }
    }
}

/// Calculate commission: flat_fee + (trade_value * pct / 100).
pub fn calculate_commission(trade_value: f64, config: &ExecutionConfig) -> f64 {
    config.commission_per_trade + (trade_value * config.commission_pct / 100.0)
}

/// Buy: market_price * (1 + slippage_pct / 100)
/// Sell: market_price * (1 - slippage_pct / 100)
pub fn apply_slippage(market_price: f64, side: Side, slippage_pct: f64) -> f64 {
    match side {
        Side::Buy => market_price * (1.0 + slippage_pct / 100.0),
        Side::Sell => market_price * (1.0 - slippage_pct / 100.0),
    }
}

/// Costs of filling `quantity` at `market_price`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillCost {
    pub unit_price: f64,
    pub commission: f64,
    /// Amount paid on a buy, received on a sell.
    pub total: f64,
}

pub fn fill_cost(market_price: f64, side: Side, quantity: f64, config: &ExecutionConfig) -> FillCost {
    let unit_price = apply_slippage(market_price, side, config.slippage_pct);
    let value = unit_price * quantity;
    let commission = calculate_commission(value, config);
    let total = match side {
        Side::Buy => value + commission,
        Side::Sell => value - commission,
    };
    FillCost {
        unit_price,
        commission,
        total,
    }
}
