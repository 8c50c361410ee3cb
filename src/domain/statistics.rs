//! Summary statistics of a finished run.

use super::drawdown::{compute_drawdown, DrawDown};
use super::ledger::{EquityPoint, Ledger};
use super::trade::Trade;

const SECONDS_PER_YEAR: f64 = 365.25 * 24.0 * 3600.0;

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioStatistics {
    pub initial_wealth: f64,
    pub final_wealth: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    pub realized_pnl: f64,
    pub draw_down: DrawDown,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub breakeven_trades: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub average_winning_trade: f64,
    pub average_losing_trade: f64,
    pub largest_winning_trade: f64,
    pub largest_losing_trade: f64,
}

impl PortfolioStatistics {
    /// `risk_free_rate` is annual; it is scaled to the curve's step length.
    pub fn compute(ledger: &Ledger, risk_free_rate: f64) -> Self {
        let equity_curve = ledger.equity_curve();
        let initial_wealth = ledger.deposits();

        let final_wealth = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or_else(|| ledger.cash());

        let total_return = if initial_wealth > 0.0 {
            (final_wealth - initial_wealth) / initial_wealth
        } else {
            0.0
        };

        let years = elapsed_years(equity_curve);
        let annualized_return = if years > 0.0 && total_return.is_finite() && total_return > -1.0
        {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let values: Vec<f64> = equity_curve.iter().map(|p| p.equity).collect();
        let draw_down = compute_drawdown(&values);

        let steps_per_year = if years > 0.0 {
            (equity_curve.len().saturating_sub(1)) as f64 / years
        } else {
            0.0
        };
        let (sharpe_ratio, sortino_ratio) =
            compute_risk_adjusted(&values, risk_free_rate, steps_per_year);

        let trades = TradeTally::from_trades(ledger.closed_trades());

        PortfolioStatistics {
            initial_wealth,
            final_wealth,
            total_return,
            annualized_return,
            realized_pnl: ledger.realized_pnl(),
            draw_down,
            sharpe_ratio,
            sortino_ratio,
            winning_trades: trades.won,
            losing_trades: trades.lost,
            breakeven_trades: trades.breakeven,
            win_rate: trades.win_rate(),
            profit_factor: trades.profit_factor(),
            average_winning_trade: trades.average_win(),
            average_losing_trade: trades.average_loss(),
            largest_winning_trade: trades.largest_win,
            largest_losing_trade: trades.largest_loss,
        }
    }
}

#[derive(Debug, Default)]
struct TradeTally {
    won: usize,
    lost: usize,
    breakeven: usize,
    total_wins: f64,
    total_losses: f64,
    largest_win: f64,
    largest_loss: f64,
}

impl TradeTally {
    fn from_trades<'a>(trades: impl Iterator<Item = &'a Trade>) -> Self {
        let mut tally = TradeTally::default();
        for trade in trades {
            let pnl = trade.profit_and_loss();
            if pnl > 0.0 {
                tally.won += 1;
                tally.total_wins += pnl;
                tally.largest_win = tally.largest_win.max(pnl);
            } else if pnl < 0.0 {
                tally.lost += 1;
                tally.total_losses += pnl.abs();
                tally.largest_loss = tally.largest_loss.max(pnl.abs());
            } else {
                tally.breakeven += 1;
            }
        }
        tally
    }

    /// Wins over decided trades; breakeven closes (entry lots) are excluded.
    fn win_rate(&self) -> f64 {
        let decided = self.won + self.lost;
        if decided > 0 {
            self.won as f64 / decided as f64
        } else {
            0.0
        }
    }

    fn profit_factor(&self) -> f64 {
        if self.total_losses > 0.0 {
            self.total_wins / self.total_losses
        } else if self.total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    }

    fn average_win(&self) -> f64 {
        if self.won > 0 {
            self.total_wins / self.won as f64
        } else {
            0.0
        }
    }

    fn average_loss(&self) -> f64 {
        if self.lost > 0 {
            self.total_losses / self.lost as f64
        } else {
            0.0
        }
    }
}

fn elapsed_years(equity_curve: &[EquityPoint]) -> f64 {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(first), Some(last)) => {
            (last.timestamp - first.timestamp).num_seconds() as f64 / SECONDS_PER_YEAR
        }
        _ => 0.0,
    }
}

fn compute_risk_adjusted(values: &[f64], risk_free_rate: f64, steps_per_year: f64) -> (f64, f64) {
    if values.len() < 2 || steps_per_year <= 0.0 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = values
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect();

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;
    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    let step_rf = risk_free_rate / steps_per_year;
    let excess_return = mean - step_rf;
    let scale = steps_per_year.sqrt();

    let sharpe = if stddev > 0.0 {
        excess_return / stddev * scale
    } else {
        0.0
    };

    let downside: f64 = returns
        .iter()
        .filter(|&&r| r < step_rf)
        .map(|&r| (r - step_rf).powi(2))
        .sum::<f64>()
        / n;
    let downside_stddev = downside.sqrt();

    let sortino = if downside_stddev > 0.0 {
        excess_return / downside_stddev * scale
    } else {
        0.0
    };

    (sharpe, sortino)
}
