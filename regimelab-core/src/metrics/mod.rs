//! Metrics Engine — SMA-short, SMA-long, annualized volatility and daily
//! return at a given index of a daily price series.
//!
//! Pure functions over an in-memory series: no I/O, no hidden state, no
//! rounding. Rounding for display is a caller concern.

pub mod rolling;
pub mod snapshot;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::PricePoint;
use crate::error::ErrorKind;

pub use snapshot::{MetricsSnapshot, SmaReading};

/// Trading days per year used to annualize daily volatility.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Metrics engine parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    /// Short moving-average period (default 50).
    pub sma_short: usize,
    /// Long moving-average period (default 200).
    pub sma_long: usize,
    /// Number of trailing daily returns in the volatility window (default 20).
    pub trailing_window_days: usize,
    /// Minimum returns required before volatility is reported (default 20).
    pub min_volatility_returns: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            sma_short: 50,
            sma_long: 200,
            trailing_window_days: 20,
            min_volatility_returns: 20,
        }
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.sma_short == 0 {
            return Err("sma_short must be >= 1".into());
        }
        if self.sma_long <= self.sma_short {
            return Err(format!(
                "sma_long ({}) must be greater than sma_short ({})",
                self.sma_long, self.sma_short
            ));
        }
        if self.trailing_window_days < 2 {
            return Err("trailing_window_days must be >= 2".into());
        }
        if self.min_volatility_returns < 2
            || self.min_volatility_returns > self.trailing_window_days
        {
            return Err(format!(
                "min_volatility_returns ({}) must be within [2, trailing_window_days ({})]",
                self.min_volatility_returns, self.trailing_window_days
            ));
        }
        Ok(())
    }
}

/// Errors from the metrics engine. All are structural: they describe bad
/// input, never a transient condition.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricsError {
    #[error("invalid price at index {index}: close {close} must be finite and strictly positive")]
    InvalidPrice { index: usize, close: f64 },

    #[error("insufficient history: daily return at index {index} needs a prior close")]
    InsufficientHistory { index: usize },

    #[error("as_of_index {index} is out of range for a series of {len} points")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("dates must be strictly increasing: {date} at index {index} does not follow {previous}")]
    NonChronological {
        index: usize,
        date: NaiveDate,
        previous: NaiveDate,
    },

    #[error("invalid metrics config: {0}")]
    InvalidConfig(String),
}

impl MetricsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MetricsError::InvalidPrice { .. } => ErrorKind::InvalidPrice,
            MetricsError::InsufficientHistory { .. } => ErrorKind::InsufficientHistory,
            MetricsError::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
            MetricsError::NonChronological { .. } => ErrorKind::NonChronological,
            MetricsError::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }
}

/// Check every point of the series: closes finite and strictly positive,
/// dates strictly increasing. The first offending index is reported.
pub fn validate_series(prices: &[PricePoint]) -> Result<(), MetricsError> {
    for (index, point) in prices.iter().enumerate() {
        if !point.is_sane() {
            return Err(MetricsError::InvalidPrice {
                index,
                close: point.close,
            });
        }
        if index > 0 {
            let previous = prices[index - 1].date;
            if point.date <= previous {
                return Err(MetricsError::NonChronological {
                    index,
                    date: point.date,
                    previous,
                });
            }
        }
    }
    Ok(())
}

/// Compute the metrics snapshot at `as_of_index`.
///
/// The whole series is validated first, so a bad close anywhere in the
/// input fails the call and no snapshot is produced.
pub fn compute_metrics(
    prices: &[PricePoint],
    as_of_index: usize,
    config: &MetricsConfig,
) -> Result<MetricsSnapshot, MetricsError> {
    config.validate().map_err(MetricsError::InvalidConfig)?;
    validate_series(prices)?;
    snapshot_at(prices, as_of_index, config)
}

/// Snapshots for every index that has a daily return (1..len).
pub fn metrics_series(
    prices: &[PricePoint],
    config: &MetricsConfig,
) -> Result<Vec<MetricsSnapshot>, MetricsError> {
    config.validate().map_err(MetricsError::InvalidConfig)?;
    validate_series(prices)?;
    (1..prices.len())
        .map(|i| snapshot_at(prices, i, config))
        .collect()
}

fn snapshot_at(
    prices: &[PricePoint],
    as_of_index: usize,
    config: &MetricsConfig,
) -> Result<MetricsSnapshot, MetricsError> {
    if as_of_index >= prices.len() {
        return Err(MetricsError::IndexOutOfRange {
            index: as_of_index,
            len: prices.len(),
        });
    }
    if as_of_index == 0 {
        return Err(MetricsError::InsufficientHistory { index: 0 });
    }

    let point = prices[as_of_index];
    let daily_return = rolling::simple_return(prices[as_of_index - 1].close, point.close);

    let sma_short = SmaReading {
        period: config.sma_short,
        value: rolling::trailing_mean(prices, as_of_index, config.sma_short),
    };
    let sma_long = SmaReading {
        period: config.sma_long,
        value: rolling::trailing_mean(prices, as_of_index, config.sma_long),
    };

    let returns = rolling::trailing_returns(prices, as_of_index, config.trailing_window_days);
    let volatility_annualized = if returns.len() >= config.min_volatility_returns {
        rolling::sample_std(&returns).map(|sd| sd * TRADING_DAYS_PER_YEAR.sqrt())
    } else {
        None
    };

    Ok(MetricsSnapshot::new(
        point.date,
        as_of_index,
        point.close,
        sma_short,
        sma_long,
        volatility_annualized,
        daily_return,
    ))
}

/// Create a price series from closes for testing, one calendar day apart.
#[cfg(test)]
pub fn make_prices(closes: &[f64]) -> Vec<PricePoint> {
    let base_date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PricePoint::new(base_date + chrono::Duration::days(i as i64), close))
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for metrics tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
