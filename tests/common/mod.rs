#![allow(dead_code)]

use chrono::NaiveDate;
use lottrader::domain::candle::Candle;
use lottrader::domain::error::LottraderError;
use lottrader::domain::instrument::InstrumentId;
use lottrader::domain::time_series::Timestamp;
use lottrader::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<InstrumentId, Vec<Candle>>,
    pub errors: HashMap<InstrumentId, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_candles(mut self, instrument: InstrumentId, candles: Vec<Candle>) -> Self {
        self.data.insert(instrument, candles);
        self
    }

    pub fn with_error(mut self, instrument: InstrumentId, reason: &str) -> Self {
        self.errors.insert(instrument, reason.to_string());
        self
    }

    fn check(&self, instrument: &InstrumentId) -> Result<(), LottraderError> {
        match self.errors.get(instrument) {
            Some(reason) => Err(LottraderError::MarketDataUnavailable {
                instrument: instrument.clone(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl DataPort for MockDataPort {
    fn fetch_candles(
        &self,
        instrument: &InstrumentId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<Candle>, LottraderError> {
        self.check(instrument)?;
        Ok(self
            .data
            .get(instrument)
            .map(|candles| {
                candles
                    .iter()
                    .filter(|c| c.timestamp >= from && c.timestamp <= to)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_symbols(&self, exchange: &str) -> Result<Vec<String>, LottraderError> {
        let mut codes: Vec<String> = self
            .data
            .keys()
            .filter(|i| i.exchange == exchange)
            .map(|i| i.code.clone())
            .collect();
        codes.sort();
        Ok(codes)
    }

    fn data_range(
        &self,
        instrument: &InstrumentId,
    ) -> Result<Option<(Timestamp, Timestamp, usize)>, LottraderError> {
        self.check(instrument)?;
        match self.data.get(instrument) {
            Some(candles) if !candles.is_empty() => {
                let first = candles.iter().map(|c| c.timestamp).min().unwrap();
                let last = candles.iter().map(|c| c.timestamp).max().unwrap();
                Ok(Some((first, last, candles.len())))
            }
            _ => Ok(None),
        }
    }
}

pub fn ts(date: &str) -> Timestamp {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn ibm() -> InstrumentId {
    InstrumentId::new("IBM", "NYSE")
}

pub fn goog() -> InstrumentId {
    InstrumentId::new("GOOG", "NYSE")
}

pub fn make_candle(date: &str, open: f64, high: f64, low: f64, close: f64) -> Candle {
    Candle {
        timestamp: ts(date),
        open,
        high,
        low,
        close,
        volume: 1000,
    }
}

/// Open and close at `price`, with a one unit range either side.
pub fn flat_candle(date: &str, price: f64) -> Candle {
    make_candle(date, price, price + 1.0, price - 1.0, price)
}

/// One candle per weekday from `start`, closing at each of `closes` in turn.
pub fn weekday_candles(start: &str, closes: &[f64]) -> Vec<Candle> {
    use chrono::Datelike;

    let mut day = ts(start);
    let mut candles = Vec::with_capacity(closes.len());
    for &close in closes {
        while matches!(day.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun) {
            day += chrono::Duration::days(1);
        }
        candles.push(Candle {
            timestamp: day,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000,
        });
        day += chrono::Duration::days(1);
    }
    candles
}

pub fn csv_rows(candles: &[Candle]) -> String {
    let mut out = String::from("date,open,high,low,close,volume\n");
    for c in candles {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            if c.timestamp.time() == chrono::NaiveTime::MIN {
                c.timestamp.format("%Y-%m-%d").to_string()
            } else {
                c.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
            },
            c.open,
            c.high,
            c.low,
            c.close,
            c.volume
        ));
    }
    out
}
