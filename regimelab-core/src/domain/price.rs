//! PricePoint — the fundamental market data unit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily close for a single instrument.
///
/// Sequences of price points are chronological with no duplicate dates.
/// Calendar gaps (weekends, holidays, halts) are tolerated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }

    /// Returns true if the close is usable for return computation:
    /// finite and strictly positive.
    pub fn is_sane(&self) -> bool {
        self.close.is_finite() && self.close > 0.0
    }
}
