//! Raw market data access port trait.

use crate::domain::candle::Candle;
use crate::domain::error::LottraderError;
use crate::domain::instrument::InstrumentId;
use crate::domain::time_series::Timestamp;

pub trait DataPort {
    /// Candles with `from <= timestamp <= to`, oldest first.
    fn fetch_candles(
        &self,
        instrument: &InstrumentId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<Candle>, LottraderError>;

    fn list_symbols(&self, exchange: &str) -> Result<Vec<String>, LottraderError>;

    /// First timestamp, last timestamp and candle count, or `None` when the
    /// instrument has no rows.
    fn data_range(
        &self,
        instrument: &InstrumentId,
    ) -> Result<Option<(Timestamp, Timestamp, usize)>, LottraderError>;
}
