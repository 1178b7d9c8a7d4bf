//! Regime history — one classification per index of a price series, with
//! golden/death cross annotations.
//!
//! A cross is descriptive only: it marks the snapshot where SMA-short moved
//! to the other side of SMA-long, never a regime of its own.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{classify, ClassifierConfig, ClassifyError};
use crate::domain::{PricePoint, Regime};
use crate::error::ErrorKind;
use crate::metrics::{metrics_series, MetricsConfig, MetricsError, MetricsSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaCross {
    /// SMA-short crossed above SMA-long.
    Golden,
    /// SMA-short crossed below SMA-long.
    Death,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimePoint {
    pub date: NaiveDate,
    pub index: usize,
    pub regime: Regime,
    pub cross: Option<MaCross>,
}

/// Errors from building a regime history.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HistoryError {
    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error(transparent)]
    Classify(#[from] ClassifyError),
}

impl HistoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HistoryError::Metrics(e) => e.kind(),
            HistoryError::Classify(e) => e.kind(),
        }
    }
}

/// Side of SMA-long that SMA-short sits on; `None` while either is missing
/// or the two are equal.
fn side(snapshot: &MetricsSnapshot) -> Option<MaCross> {
    let spread = snapshot.sma_short()? - snapshot.sma_long()?;
    if spread > 0.0 {
        Some(MaCross::Golden)
    } else if spread < 0.0 {
        Some(MaCross::Death)
    } else {
        None
    }
}

/// Classify every index from 1 onward.
///
/// A cross is reported when SMA-short settles on the other side of SMA-long
/// from where it last was. Touching SMA-long and returning is not a cross.
pub fn regime_series(
    prices: &[PricePoint],
    metrics_config: &MetricsConfig,
    classifier_config: &ClassifierConfig,
) -> Result<Vec<RegimePoint>, HistoryError> {
    classifier_config
        .validate()
        .map_err(ClassifyError::InvalidConfig)?;
    let snapshots = metrics_series(prices, metrics_config)?;

    let mut points = Vec::with_capacity(snapshots.len());
    let mut last_side = None;
    for snapshot in &snapshots {
        let regime = classify(snapshot, classifier_config)?;
        let current = side(snapshot);
        let cross = match (last_side, current) {
            (Some(before), Some(now)) if before != now => Some(now),
            _ => None,
        };
        if current.is_some() {
            last_side = current;
        }
        points.push(RegimePoint {
            date: snapshot.as_of_date(),
            index: snapshot.as_of_index(),
            regime,
            cross,
        });
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::make_prices;

    fn small_metrics() -> MetricsConfig {
        MetricsConfig {
            sma_short: 2,
            sma_long: 4,
            trailing_window_days: 3,
            min_volatility_returns: 2,
        }
    }

    fn calm() -> ClassifierConfig {
        ClassifierConfig {
            high_vol_threshold: 50.0,
            medium_vol_threshold: None,
        }
    }

    #[test]
    fn one_point_per_index_after_first() {
        let prices = make_prices(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let series = regime_series(&prices, &small_metrics(), &calm()).unwrap();
        assert_eq!(series.len(), 4);
        assert_eq!(series[0].index, 1);
        assert_eq!(series.last().unwrap().regime, Regime::Bull);
    }

    #[test]
    fn golden_then_death_cross() {
        // falling, then rising (golden), then falling again (death)
        let closes = [20.0, 18.0, 16.0, 14.0, 16.0, 19.0, 22.0, 18.0, 14.0, 10.0];
        let prices = make_prices(&closes);
        let series = regime_series(&prices, &small_metrics(), &calm()).unwrap();
        let crosses: Vec<MaCross> = series.iter().filter_map(|p| p.cross).collect();
        assert_eq!(crosses, vec![MaCross::Golden, MaCross::Death]);
    }

    #[test]
    fn invalid_prices_fail_the_whole_series() {
        let prices = make_prices(&[10.0, -1.0, 12.0]);
        assert!(regime_series(&prices, &small_metrics(), &calm()).is_err());
    }

    #[test]
    fn touching_the_long_average_is_not_a_cross() {
        // With SMA-1 against SMA-2 the spread is half the daily change.
        let closes = [10.0, 10.0, 12.0, 10.0, 8.0, 12.0, 12.0];
        let prices = make_prices(&closes);
        let config = MetricsConfig {
            sma_short: 1,
            sma_long: 2,
            trailing_window_days: 3,
            min_volatility_returns: 2,
        };
        let series = regime_series(&prices, &config, &calm()).unwrap();
        let crosses: Vec<(usize, MaCross)> = series
            .iter()
            .filter_map(|p| p.cross.map(|c| (p.index, c)))
            .collect();
        // spreads by index: 1:0, 2:+1, 3:-1, 4:-1, 5:+2, 6:0
        assert_eq!(
            crosses,
            vec![(3, MaCross::Death), (5, MaCross::Golden)]
        );
    }

    #[test]
    fn flat_spread_between_same_sides_reports_nothing() {
        let closes = [10.0, 11.0, 11.0, 12.0];
        let prices = make_prices(&closes);
        let config = MetricsConfig {
            sma_short: 1,
            sma_long: 2,
            trailing_window_days: 3,
            min_volatility_returns: 2,
        };
        // spreads by index: 1:+0.5, 2:0, 3:+0.5
        let series = regime_series(&prices, &config, &calm()).unwrap();
        assert!(series.iter().all(|p| p.cross.is_none()));
    }

    #[test]
    fn invalid_classifier_config_is_a_classify_error() {
        let prices = make_prices(&[10.0, 11.0, 12.0]);
        let bad = ClassifierConfig {
            high_vol_threshold: -1.0,
            medium_vol_threshold: None,
        };
        let err = regime_series(&prices, &small_metrics(), &bad).unwrap_err();
        assert!(matches!(err, HistoryError::Classify(ClassifyError::InvalidConfig(_))));
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn invalid_prices_report_their_kind() {
        let prices = make_prices(&[10.0, -1.0, 12.0]);
        let err = regime_series(&prices, &small_metrics(), &calm()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPrice);
    }
}
