//! Market manager: loaded instrument histories served as timestamp slices.

use crate::domain::candle::Candle;
use crate::domain::error::LottraderError;
use crate::domain::instrument::InstrumentId;
use crate::domain::time_series::{TimeSeries, Timestamp};
use crate::ports::data_port::DataPort;
use crate::ports::market_port::MarketDataSource;
use std::collections::BTreeMap;
use tracing::debug;

pub struct MarketManager {
    data: Box<dyn DataPort>,
    history: BTreeMap<InstrumentId, TimeSeries>,
}

impl MarketManager {
    pub fn new(data: Box<dyn DataPort>) -> Self {
        MarketManager {
            data,
            history: BTreeMap::new(),
        }
    }

    fn fetch_full_history(&self, instrument: &InstrumentId) -> Result<TimeSeries, LottraderError> {
        let candles = self
            .data
            .fetch_candles(instrument, Timestamp::MIN, Timestamp::MAX)?;
        if candles.is_empty() {
            return Err(LottraderError::MarketDataUnavailable {
                instrument: instrument.clone(),
                reason: "no candles".to_string(),
            });
        }
        Ok(TimeSeries::from_candles(instrument.clone(), candles))
    }
}

impl MarketDataSource for MarketManager {
    fn load_history(
        &mut self,
        instrument: &InstrumentId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<TimeSeries, LottraderError> {
        if !self.history.contains_key(instrument) {
            let series = self.fetch_full_history(instrument)?;
            debug!(
                instrument = %instrument,
                candles = series.len(),
                "Loaded market history"
            );
            self.history.insert(instrument.clone(), series);
        }

        let window = self
            .history
            .get(instrument)
            .map(|s| s.window(from, to).to_vec())
            .unwrap_or_default();
        Ok(TimeSeries::from_candles(instrument.clone(), window))
    }

    fn market_slice(&self, from: Timestamp, until: Timestamp) -> BTreeMap<InstrumentId, Candle> {
        self.history
            .iter()
            .filter_map(|(instrument, series)| {
                series.first_in(from, until).map(|c| (instrument.clone(), *c))
            })
            .collect()
    }

    fn bounds(&self) -> Option<(Timestamp, Timestamp)> {
        let first = self.history.values().filter_map(|s| s.first_timestamp()).min()?;
        let last = self.history.values().filter_map(|s| s.last_timestamp()).max()?;
        Some((first, last))
    }
}
