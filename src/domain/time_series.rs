//! Append-only, timestamp-keyed candle series per instrument.

use crate::domain::candle::Candle;
use crate::domain::error::SeriesError;
use crate::domain::instrument::InstrumentId;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;

pub type Timestamp = NaiveDateTime;

/// `%Y-%m-%d` (stamped at midnight) or `%Y-%m-%d %H:%M:%S`.
pub fn parse_timestamp(s: &str) -> Option<Timestamp> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[derive(Debug, Clone)]
pub struct TimeSeries {
    pub instrument: InstrumentId,
    candles: Vec<Candle>,
    index: HashMap<Timestamp, usize>,
}

impl TimeSeries {
    pub fn new(instrument: InstrumentId) -> Self {
        Self {
            instrument,
            candles: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Build a series from candles in any order. Duplicate timestamps keep the
    /// first occurrence.
    pub fn from_candles(instrument: InstrumentId, mut candles: Vec<Candle>) -> Self {
        candles.sort_by_key(|c| c.timestamp);
        candles.dedup_by_key(|c| c.timestamp);
        let index = candles
            .iter()
            .enumerate()
            .map(|(i, c)| (c.timestamp, i))
            .collect();
        Self {
            instrument,
            candles,
            index,
        }
    }

    /// Timestamps must be strictly increasing.
    pub fn append(&mut self, candle: Candle) -> Result<(), SeriesError> {
        if let Some(last) = self.last_timestamp() {
            if candle.timestamp <= last {
                return Err(SeriesError::OutOfOrder {
                    instrument: self.instrument.clone(),
                    timestamp: candle.timestamp,
                    last,
                });
            }
        }
        self.index.insert(candle.timestamp, self.candles.len());
        self.candles.push(candle);
        Ok(())
    }

    pub fn get(&self, timestamp: Timestamp) -> Option<&Candle> {
        self.index.get(&timestamp).map(|&i| &self.candles[i])
    }

    pub fn first_timestamp(&self) -> Option<Timestamp> {
        self.candles.first().map(|c| c.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.candles.last().map(|c| c.timestamp)
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    /// The most recent `n` closes, oldest first. `None` until `n` candles exist.
    pub fn last_closes(&self, n: usize) -> Option<Vec<f64>> {
        if n == 0 || self.candles.len() < n {
            return None;
        }
        Some(
            self.candles[self.candles.len() - n..]
                .iter()
                .map(|c| c.close)
                .collect(),
        )
    }

    /// Earliest candle with `from <= timestamp < until`.
    pub fn first_in(&self, from: Timestamp, until: Timestamp) -> Option<&Candle> {
        let i = self.candles.partition_point(|c| c.timestamp < from);
        self.candles.get(i).filter(|c| c.timestamp < until)
    }

    /// Candles with `from <= timestamp <= to`.
    pub fn window(&self, from: Timestamp, to: Timestamp) -> &[Candle] {
        let start = self.candles.partition_point(|c| c.timestamp < from);
        let end = self.candles.partition_point(|c| c.timestamp <= to);
        if start >= end {
            &[]
        } else {
            &self.candles[start..end]
        }
    }
}
