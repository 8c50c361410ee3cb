//! Core domain types and logic.

pub mod instrument;
pub mod candle;
pub mod time_series;
pub mod calendar;
pub mod trade;
pub mod inventory;
pub mod ledger;
pub mod drawdown;
pub mod statistics;
pub mod order;
pub mod execution;
pub mod strategy;
pub mod strategies;
pub mod market;
pub mod runner;
pub mod config_validation;
pub mod error;
