use crate::error::CoreError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Contract constants for instruments that move in discrete ticks
/// (futures such as ES or GC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentSpec {
    /// Currency value of one tick per contract.
    pub tick_value: Decimal,
    /// Minimum price increment.
    pub tick_size: Decimal,
}

impl InstrumentSpec {
    pub fn new(tick_value: Decimal, tick_size: Decimal) -> Self {
        Self {
            tick_value,
            tick_size,
        }
    }

    fn validate(&self, ticker: &str) -> Result<(), CoreError> {
        if self.tick_size <= Decimal::ZERO {
            return Err(CoreError::InvalidInstrument(
                ticker.to_string(),
                format!("tick_size must be positive, got {}", self.tick_size),
            ));
        }
        if self.tick_value <= Decimal::ZERO {
            return Err(CoreError::InvalidInstrument(
                ticker.to_string(),
                format!("tick_value must be positive, got {}", self.tick_value),
            ));
        }
        Ok(())
    }
}

/// Read-only lookup of instrument specs keyed by ticker.
///
/// Tickers are stored and looked up in upper case. Every spec in the table
/// has a positive tick size and tick value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstrumentTable {
    specs: HashMap<String, InstrumentSpec>,
}

impl InstrumentTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from `(ticker, spec)` pairs, rejecting non-positive
    /// tick sizes or tick values.
    pub fn from_specs<I, S>(specs: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = (S, InstrumentSpec)>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        for (ticker, spec) in specs {
            table.insert(ticker.as_ref(), spec)?;
        }
        Ok(table)
    }

    pub fn insert(&mut self, ticker: &str, spec: InstrumentSpec) -> Result<(), CoreError> {
        spec.validate(ticker)?;
        self.specs.insert(normalize(ticker), spec);
        Ok(())
    }

    pub fn get(&self, ticker: &str) -> Option<&InstrumentSpec> {
        self.specs.get(&normalize(ticker))
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

fn normalize(ticker: &str) -> String {
    ticker.trim().to_ascii_uppercase()
}
