//! Trading calendar: a lazy, restartable sequence of trading timestamps.
//!
//! Weekends are skipped; no holiday table is applied. Each step covers the
//! half-open interval `[t, t + step)`, so daily steps start at midnight and
//! match candles stamped at any time of that day.

use crate::domain::time_series::Timestamp;
use chrono::{Datelike, Duration, DurationRound, Weekday};
use std::fmt;
use std::str::FromStr;

/// Sampling step of the simulation calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Daily,
    Hourly,
    Minute,
}

impl Precision {
    pub fn step(&self) -> Duration {
        match self {
            Precision::Daily => Duration::days(1),
            Precision::Hourly => Duration::hours(1),
            Precision::Minute => Duration::minutes(1),
        }
    }

    /// Start of the step containing `ts`.
    pub fn floor(&self, ts: Timestamp) -> Timestamp {
        ts.duration_trunc(self.step()).unwrap_or(ts)
    }

    /// Exclusive end of the step starting at `ts`.
    pub fn step_end(&self, ts: Timestamp) -> Timestamp {
        ts.checked_add_signed(self.step()).unwrap_or(Timestamp::MAX)
    }
}

impl FromStr for Precision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "day" | "1d" => Ok(Precision::Daily),
            "hourly" | "hour" | "1h" => Ok(Precision::Hourly),
            "minute" | "1m" => Ok(Precision::Minute),
            other => Err(format!("unknown precision '{other}'")),
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Precision::Daily => "daily",
            Precision::Hourly => "hourly",
            Precision::Minute => "minute",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct TradingCalendar {
    start: Timestamp,
    end: Timestamp,
    precision: Precision,
}

impl TradingCalendar {
    /// `start` is aligned down to the step containing it.
    pub fn new(start: Timestamp, end: Timestamp, precision: Precision) -> Self {
        Self {
            start: precision.floor(start),
            end,
            precision,
        }
    }

    pub fn start_day(&self) -> Timestamp {
        self.start
    }

    pub fn end_day(&self) -> Timestamp {
        self.end
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn iter(&self) -> CalendarIter {
        CalendarIter {
            next: Some(self.start),
            end: self.end,
            step: self.precision.step(),
        }
    }
}

impl<'a> IntoIterator for &'a TradingCalendar {
    type Item = Timestamp;
    type IntoIter = CalendarIter;

    fn into_iter(self) -> CalendarIter {
        self.iter()
    }
}

pub struct CalendarIter {
    next: Option<Timestamp>,
    end: Timestamp,
    step: Duration,
}

fn is_trading_day(ts: &Timestamp) -> bool {
    !matches!(ts.weekday(), Weekday::Sat | Weekday::Sun)
}

impl Iterator for CalendarIter {
    type Item = Timestamp;

    fn next(&mut self) -> Option<Timestamp> {
        loop {
            let current = self.next?;
            if current > self.end {
                self.next = None;
                return None;
            }
            self.next = current.checked_add_signed(self.step);
            if is_trading_day(&current) {
                return Some(current);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn daily_skips_weekends() {
        // 2024-01-05 is a Friday
        let cal = TradingCalendar::new(day(2024, 1, 5), day(2024, 1, 9), Precision::Daily);
        let days: Vec<_> = cal.iter().collect();
        assert_eq!(days, vec![day(2024, 1, 5), day(2024, 1, 8), day(2024, 1, 9)]);
    }

    #[test]
    fn calendar_is_restartable() {
        let cal = TradingCalendar::new(day(2024, 1, 1), day(2024, 1, 3), Precision::Daily);
        let first: Vec<_> = cal.iter().collect();
        let second: Vec<_> = (&cal).into_iter().collect();
        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
    }

    #[test]
    fn end_bound_is_inclusive() {
        let cal = TradingCalendar::new(day(2024, 1, 2), day(2024, 1, 2), Precision::Daily);
        assert_eq!(cal.iter().count(), 1);
    }

    #[test]
    fn start_after_end_is_empty() {
        let cal = TradingCalendar::new(day(2024, 1, 3), day(2024, 1, 2), Precision::Daily);
        assert_eq!(cal.iter().count(), 0);
    }

    #[test]
    fn weekend_only_window_is_empty() {
        let cal = TradingCalendar::new(day(2024, 1, 6), day(2024, 1, 7), Precision::Daily);
        assert_eq!(cal.iter().count(), 0);
    }

    #[test]
    fn hourly_steps_within_a_day() {
        let start = day(2024, 1, 2);
        let end = start + Duration::hours(3);
        let cal = TradingCalendar::new(start, end, Precision::Hourly);
        assert_eq!(cal.iter().count(), 4);
    }

    #[test]
    fn daily_start_is_aligned_to_midnight() {
        let start = day(2024, 1, 3) + Duration::hours(16);
        let cal = TradingCalendar::new(start, day(2024, 1, 5), Precision::Daily);
        let days: Vec<_> = cal.iter().collect();
        assert_eq!(days, vec![day(2024, 1, 3), day(2024, 1, 4), day(2024, 1, 5)]);
    }

    #[test]
    fn floor_and_step_end_bracket_the_timestamp() {
        let ts = day(2024, 1, 2) + Duration::minutes(90) + Duration::seconds(7);
        assert_eq!(Precision::Daily.floor(ts), day(2024, 1, 2));
        assert_eq!(Precision::Hourly.floor(ts), day(2024, 1, 2) + Duration::hours(1));
        assert_eq!(
            Precision::Minute.floor(ts),
            day(2024, 1, 2) + Duration::minutes(90)
        );
        assert_eq!(Precision::Daily.step_end(day(2024, 1, 2)), day(2024, 1, 3));
    }

    #[test]
    fn precision_parses() {
        assert_eq!("Daily".parse::<Precision>(), Ok(Precision::Daily));
        assert_eq!("1h".parse::<Precision>(), Ok(Precision::Hourly));
        assert_eq!("minute".parse::<Precision>(), Ok(Precision::Minute));
        assert!("weekly".parse::<Precision>().is_err());
    }
}
