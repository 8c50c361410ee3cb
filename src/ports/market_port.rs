//! Historical market source consumed by the runner.

use crate::domain::candle::Candle;
use crate::domain::error::LottraderError;
use crate::domain::instrument::InstrumentId;
use crate::domain::time_series::{TimeSeries, Timestamp};
use std::collections::BTreeMap;

pub trait MarketDataSource {
    /// Load an instrument's history and return the part inside `[from, to]`.
    /// The full available history stays loaded for slicing and bounds.
    fn load_history(
        &mut self,
        instrument: &InstrumentId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<TimeSeries, LottraderError>;

    /// For every loaded instrument, its earliest candle with
    /// `from <= timestamp < until`.
    fn market_slice(&self, from: Timestamp, until: Timestamp) -> BTreeMap<InstrumentId, Candle>;

    /// Earliest first and latest last timestamp across loaded instruments.
    fn bounds(&self) -> Option<(Timestamp, Timestamp)>;
}
