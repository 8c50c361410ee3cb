//! Configuration validation.
//!
//! Validates all config fields before a backtest runs, and provides the
//! parsers the CLI uses to turn validated values into domain types.

use crate::domain::calendar::Precision;
use crate::domain::error::LottraderError;
use crate::domain::instrument::InstrumentId;
use crate::domain::ledger::ValuationPolicy;
use crate::domain::time_series::{parse_timestamp, Timestamp};
use crate::ports::config_port::ConfigPort;
use std::collections::HashSet;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), LottraderError> {
    validate_initial_cash(config)?;
    validate_risk_free_rate(config)?;
    validate_dates(config)?;
    validate_enum::<Precision>(config, "precision")?;
    validate_enum::<ValuationPolicy>(config, "valuation")?;
    validate_codes(config)?;
    Ok(())
}

pub fn validate_execution_config(config: &dyn ConfigPort) -> Result<(), LottraderError> {
    for key in ["commission_per_trade", "commission_pct", "slippage_pct"] {
        if config.get_double("execution", key, 0.0) < 0.0 {
            return Err(invalid("execution", key, format!("{key} must be non-negative")));
        }
    }
    if config.get_int("execution", "order_ttl", 0) < 0 {
        return Err(invalid(
            "execution",
            "order_ttl",
            "order_ttl must be non-negative".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), LottraderError> {
    let position_size = config.get_double("strategy", "position_size", 0.25);
    if position_size <= 0.0 || position_size > 1.0 {
        return Err(invalid(
            "strategy",
            "position_size",
            "position_size must be between 0 and 1".to_string(),
        ));
    }

    let fast = config.get_int("strategy", "fast_period", 10);
    let slow = config.get_int("strategy", "slow_period", 30);
    if fast < 1 {
        return Err(invalid(
            "strategy",
            "fast_period",
            "fast_period must be at least 1".to_string(),
        ));
    }
    if slow <= fast {
        return Err(invalid(
            "strategy",
            "slow_period",
            "slow_period must be greater than fast_period".to_string(),
        ));
    }
    Ok(())
}

fn invalid(section: &str, key: &str, reason: String) -> LottraderError {
    LottraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    }
}

fn validate_initial_cash(config: &dyn ConfigPort) -> Result<(), LottraderError> {
    let value = config.get_double("backtest", "initial_cash", 0.0);
    if value <= 0.0 {
        return Err(invalid(
            "backtest",
            "initial_cash",
            "initial_cash must be positive".to_string(),
        ));
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), LottraderError> {
    let value = config.get_double("backtest", "risk_free_rate", 0.0);
    if !(0.0..1.0).contains(&value) {
        return Err(invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1".to_string(),
        ));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), LottraderError> {
    let entry = config_timestamp(config, "entry_date")?;
    let exit = config_timestamp(config, "exit_date")?;

    if exit < entry {
        return Err(invalid(
            "backtest",
            "exit_date",
            "exit_date must not be before entry_date".to_string(),
        ));
    }
    Ok(())
}

fn validate_enum<T>(config: &dyn ConfigPort, key: &str) -> Result<(), LottraderError>
where
    T: std::str::FromStr<Err = String>,
{
    match config.get_string("backtest", key) {
        Some(value) => value
            .parse::<T>()
            .map(|_| ())
            .map_err(|reason| invalid("backtest", key, reason)),
        None => Ok(()),
    }
}

fn validate_codes(config: &dyn ConfigPort) -> Result<(), LottraderError> {
    config_instruments(config).map(|_| ())
}

/// Required `[backtest]` timestamp.
pub fn config_timestamp(config: &dyn ConfigPort, key: &str) -> Result<Timestamp, LottraderError> {
    let value = config.require_string("backtest", key)?;
    parse_timestamp(&value).ok_or_else(|| {
        invalid(
            "backtest",
            key,
            format!("invalid {key} format, expected YYYY-MM-DD"),
        )
    })
}

/// Comma separated codes, upper-cased; empty tokens and duplicates are errors.
pub fn parse_codes(input: &str) -> Result<Vec<String>, String> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err("empty token in code list".to_string());
        }
        let code = trimmed.to_uppercase();
        if !seen.insert(code.clone()) {
            return Err(format!("duplicate code: {code}"));
        }
        codes.push(code);
    }

    Ok(codes)
}

/// The configured universe: `codes` (or `code`) on `exchange`.
pub fn config_instruments(config: &dyn ConfigPort) -> Result<Vec<InstrumentId>, LottraderError> {
    let exchange = config.require_string("backtest", "exchange")?;
    let codes = config
        .get_string("backtest", "codes")
        .filter(|c| !c.trim().is_empty())
        .or_else(|| config.get_string("backtest", "code"))
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| LottraderError::ConfigMissing {
            section: "backtest".to_string(),
            key: "codes".to_string(),
        })?;

    let codes = parse_codes(&codes).map_err(|reason| invalid("backtest", "codes", reason))?;
    Ok(codes
        .iter()
        .map(|code| InstrumentId::new(code, &exchange))
        .collect())
}
