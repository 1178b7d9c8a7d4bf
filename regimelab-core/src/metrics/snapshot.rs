//! MetricsSnapshot — the Measure stage's artifact.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::ArtifactId;
use crate::fingerprint::ContentHasher;

/// A moving average together with the period it was computed over.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmaReading {
    pub period: usize,
    /// `None` until `period` points of history exist.
    pub value: Option<f64>,
}

/// Derived technical metrics at a single index of a price series.
///
/// Write-once: fields are private and there are no mutating methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    id: ArtifactId,
    as_of_date: NaiveDate,
    as_of_index: usize,
    price: f64,
    sma_short: SmaReading,
    sma_long: SmaReading,
    volatility_annualized: Option<f64>,
    daily_return: f64,
}

impl MetricsSnapshot {
    pub fn new(
        as_of_date: NaiveDate,
        as_of_index: usize,
        price: f64,
        sma_short: SmaReading,
        sma_long: SmaReading,
        volatility_annualized: Option<f64>,
        daily_return: f64,
    ) -> Self {
        let mut snapshot = Self {
            id: ArtifactId::from_hex(String::new()),
            as_of_date,
            as_of_index,
            price,
            sma_short,
            sma_long,
            volatility_annualized,
            daily_return,
        };
        snapshot.id = snapshot.content_id();
        snapshot
    }

    fn content_id(&self) -> ArtifactId {
        let mut h = ContentHasher::new("metrics");
        h.date(self.as_of_date)
            .count(self.as_of_index as u64)
            .number(self.price)
            .count(self.sma_short.period as u64)
            .maybe_number(self.sma_short.value)
            .count(self.sma_long.period as u64)
            .maybe_number(self.sma_long.value)
            .maybe_number(self.volatility_annualized)
            .number(self.daily_return);
        h.finish()
    }

    /// True when the stored id matches the content (i.e. nothing was altered
    /// after construction, e.g. through deserialization of edited JSON).
    pub fn verify_identity(&self) -> bool {
        self.id == self.content_id()
    }

    pub fn id(&self) -> &ArtifactId {
        &self.id
    }

    pub fn as_of_date(&self) -> NaiveDate {
        self.as_of_date
    }

    pub fn as_of_index(&self) -> usize {
        self.as_of_index
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn sma_short(&self) -> Option<f64> {
        self.sma_short.value
    }

    pub fn sma_long(&self) -> Option<f64> {
        self.sma_long.value
    }

    pub fn sma_short_reading(&self) -> SmaReading {
        self.sma_short
    }

    pub fn sma_long_reading(&self) -> SmaReading {
        self.sma_long
    }

    pub fn volatility_annualized(&self) -> Option<f64> {
        self.volatility_annualized
    }

    pub fn daily_return(&self) -> f64 {
        self.daily_return
    }

    /// Both moving averages are available.
    pub fn has_trend_inputs(&self) -> bool {
        self.sma_short.value.is_some() && self.sma_long.value.is_some()
    }
}
