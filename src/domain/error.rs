//! Domain error types.

use crate::domain::instrument::InstrumentId;
use crate::domain::time_series::Timestamp;

/// Rejection of a single transaction. The ledger is left untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("invalid trade on {instrument}: quantity {quantity}, price {price}")]
    InvalidTrade {
        instrument: InstrumentId,
        quantity: f64,
        price: f64,
    },

    #[error("insufficient cash for {instrument}: need {required:.2}, have {available:.2}")]
    InsufficientCash {
        instrument: InstrumentId,
        required: f64,
        available: f64,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SeriesError {
    #[error("out of order candle for {instrument}: {timestamp} is not after {last}")]
    OutOfOrder {
        instrument: InstrumentId,
        timestamp: Timestamp,
        last: Timestamp,
    },
}

/// Top-level error type for lottrader.
#[derive(Debug, thiserror::Error)]
pub enum LottraderError {
    #[error("simulation window {entry} to {exit} does not intersect market data {first} to {last}")]
    ScheduleMismatch {
        entry: Timestamp,
        exit: Timestamp,
        first: Timestamp,
        last: Timestamp,
    },

    #[error("no market data available for {instrument}: {reason}")]
    MarketDataUnavailable {
        instrument: InstrumentId,
        reason: String,
    },

    #[error("no strategy resolved for selector '{selector}'")]
    NoStrategyResolved { selector: String },

    #[error("strategy {strategy_id}: {reason}")]
    Strategy { strategy_id: String, reason: String },

    #[error("order submitted by unregistered strategy '{strategy_id}'")]
    UnknownStrategy { strategy_id: String },

    #[error("run already complete")]
    RunAlreadyComplete,

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Series(#[from] SeriesError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LottraderError {
    /// Process exit status for this error category.
    pub fn exit_status(&self) -> u8 {
        match self {
            LottraderError::Io(_) | LottraderError::RunAlreadyComplete => 1,
            LottraderError::ConfigParse { .. }
            | LottraderError::ConfigMissing { .. }
            | LottraderError::ConfigInvalid { .. } => 2,
            LottraderError::Data { .. }
            | LottraderError::MarketDataUnavailable { .. }
            | LottraderError::Series(_) => 3,
            LottraderError::NoStrategyResolved { .. }
            | LottraderError::Strategy { .. }
            | LottraderError::UnknownStrategy { .. }
            | LottraderError::Ledger(_) => 4,
            LottraderError::ScheduleMismatch { .. } => 5,
        }
    }
}

impl From<&LottraderError> for std::process::ExitCode {
    fn from(err: &LottraderError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
