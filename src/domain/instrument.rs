//! Instrument identity.

use std::fmt;

/// A tradable instrument, keyed by code and listing exchange.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrumentId {
    pub code: String,
    pub exchange: String,
}

impl InstrumentId {
    pub fn new(code: &str, exchange: &str) -> Self {
        Self {
            code: code.trim().to_uppercase(),
            exchange: exchange.trim().to_uppercase(),
        }
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.code, self.exchange)
    }
}
