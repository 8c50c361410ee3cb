//! CSV file data adapter.
//!
//! One file per instrument, `<CODE>_<EXCHANGE>.csv`, with the header
//! `date,open,high,low,close,volume`.

use crate::domain::candle::Candle;
use crate::domain::error::LottraderError;
use crate::domain::instrument::InstrumentId;
use crate::domain::time_series::{parse_timestamp, Timestamp};
use crate::ports::data_port::DataPort;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, instrument: &InstrumentId) -> PathBuf {
        self.base_path
            .join(format!("{}_{}.csv", instrument.code, instrument.exchange))
    }

    fn read_all(&self, instrument: &InstrumentId) -> Result<Vec<Candle>, LottraderError> {
        let path = self.csv_path(instrument);
        let content =
            fs::read_to_string(&path).map_err(|e| LottraderError::MarketDataUnavailable {
                instrument: instrument.clone(),
                reason: format!("failed to read {}: {}", path.display(), e),
            })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut candles = Vec::new();

        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| LottraderError::Data {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;
            let row = line + 2;

            let date_str = record.get(0).ok_or_else(|| LottraderError::Data {
                reason: format!("{}:{row}: missing date column", path.display()),
            })?;
            let timestamp = parse_timestamp(date_str).ok_or_else(|| LottraderError::Data {
                reason: format!("{}:{row}: invalid date '{date_str}'", path.display()),
            })?;

            let candle = Candle {
                timestamp,
                open: parse_field(&record, 1, "open")?,
                high: parse_field(&record, 2, "high")?,
                low: parse_field(&record, 3, "low")?,
                close: parse_field(&record, 4, "close")?,
                volume: parse_field(&record, 5, "volume")?,
            };
            if !candle.is_consistent() {
                return Err(LottraderError::Data {
                    reason: format!("{}:{row}: inconsistent OHLC values", path.display()),
                });
            }
            candles.push(candle);
        }

        candles.sort_by_key(|c| c.timestamp);
        Ok(candles)
    }
}

fn parse_field<T>(record: &csv::StringRecord, index: usize, name: &str) -> Result<T, LottraderError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    record
        .get(index)
        .ok_or_else(|| LottraderError::Data {
            reason: format!("missing {name} column"),
        })?
        .trim()
        .parse()
        .map_err(|e| LottraderError::Data {
            reason: format!("invalid {name} value: {e}"),
        })
}

impl DataPort for CsvAdapter {
    fn fetch_candles(
        &self,
        instrument: &InstrumentId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<Candle>, LottraderError> {
        Ok(self
            .read_all(instrument)?
            .into_iter()
            .filter(|c| c.timestamp >= from && c.timestamp <= to)
            .collect())
    }

    fn list_symbols(&self, exchange: &str) -> Result<Vec<String>, LottraderError> {
        let entries = fs::read_dir(&self.base_path)?;

        let suffix = format!("_{}.csv", exchange.to_uppercase());
        let mut symbols = Vec::new();

        for entry in entries {
            let name = entry?.file_name();
            let name_str = name.to_string_lossy();

            if let Some(code) = name_str.strip_suffix(&suffix) {
                symbols.push(code.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn data_range(
        &self,
        instrument: &InstrumentId,
    ) -> Result<Option<(Timestamp, Timestamp, usize)>, LottraderError> {
        let candles = self.read_all(instrument)?;
        Ok(match (candles.first(), candles.last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp, candles.len())),
            _ => None,
        })
    }
}
