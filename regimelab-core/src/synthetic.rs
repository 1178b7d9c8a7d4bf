//! Deterministic synthetic price series for tests, benchmarks and the
//! CLI's `--synthetic` mode.
//!
//! Synthetic data is clearly fake. Callers that surface results built on it
//! must tag them as synthetic.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::PricePoint;

/// Shape of a drifting series: linear path from `start_price` to
/// `end_price` with bounded multiplicative noise on every point.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSpec {
    pub start_date: NaiveDate,
    /// Number of points to produce.
    pub days: usize,
    pub start_price: f64,
    pub end_price: f64,
    /// Noise half-width as a fraction, e.g. 0.005 for ±0.5%.
    pub noise_pct: f64,
    pub seed: u64,
    /// Only emit Monday–Friday dates.
    pub skip_weekends: bool,
}

impl Default for SeriesSpec {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap_or_default(),
            days: 260,
            start_price: 100.0,
            end_price: 150.0,
            noise_pct: 0.005,
            seed: 42,
            skip_weekends: true,
        }
    }
}

/// Stable 64-bit seed derived from a label such as a ticker symbol.
pub fn seed_for(label: &str) -> u64 {
    let hash = blake3::hash(label.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

fn next_date(date: NaiveDate, skip_weekends: bool) -> NaiveDate {
    let mut next = date + Duration::days(1);
    while skip_weekends && matches!(next.weekday(), Weekday::Sat | Weekday::Sun) {
        next += Duration::days(1);
    }
    next
}

fn first_date(date: NaiveDate, skip_weekends: bool) -> NaiveDate {
    if skip_weekends && matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        next_date(date, true)
    } else {
        date
    }
}

/// Linear drift with multiplicative noise `close = base * (1 + u)`,
/// `u ~ U[-noise_pct, noise_pct]`.
pub fn trending_series(spec: &SeriesSpec) -> Vec<PricePoint> {
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let noise = spec.noise_pct.abs();
    let steps = spec.days.saturating_sub(1).max(1) as f64;

    let mut out = Vec::with_capacity(spec.days);
    let mut date = first_date(spec.start_date, spec.skip_weekends);
    for i in 0..spec.days {
        let base = spec.start_price + (spec.end_price - spec.start_price) * (i as f64 / steps);
        let u = if noise > 0.0 {
            rng.gen_range(-noise..=noise)
        } else {
            0.0
        };
        out.push(PricePoint::new(date, base * (1.0 + u)));
        date = next_date(date, spec.skip_weekends);
    }
    out
}

/// Weekday random walk from 100.0 between two dates, seeded from `label`.
pub fn random_walk(label: &str, start: NaiveDate, end: NaiveDate) -> Vec<PricePoint> {
    let mut rng = StdRng::seed_from_u64(seed_for(label));
    let mut out = Vec::new();
    let mut price = 100.0_f64;
    let mut date = first_date(start, true);
    while date <= end {
        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        price *= 1.0 + daily_return;
        out.push(PricePoint::new(date, price));
        date = next_date(date, true);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trending_series_is_deterministic() {
        let spec = SeriesSpec::default();
        assert_eq!(trending_series(&spec), trending_series(&spec));
        let other = SeriesSpec {
            seed: 7,
            ..SeriesSpec::default()
        };
        assert_ne!(trending_series(&spec), trending_series(&other));
    }

    #[test]
    fn trending_series_stays_within_noise_band() {
        let spec = SeriesSpec::default();
        let series = trending_series(&spec);
        assert_eq!(series.len(), 260);
        for (i, p) in series.iter().enumerate() {
            let base = 100.0 + 50.0 * (i as f64 / 259.0);
            assert!((p.close / base - 1.0).abs() <= 0.005 + 1e-12);
            assert!(p.is_sane());
        }
    }

    #[test]
    fn weekends_are_skipped_and_dates_increase() {
        let series = trending_series(&SeriesSpec::default());
        for w in series.windows(2) {
            assert!(w[1].date > w[0].date);
        }
        assert!(series
            .iter()
            .all(|p| !matches!(p.date.weekday(), Weekday::Sat | Weekday::Sun)));
    }

    #[test]
    fn zero_noise_is_exactly_linear() {
        let spec = SeriesSpec {
            days: 3,
            noise_pct: 0.0,
            skip_weekends: false,
            ..SeriesSpec::default()
        };
        let closes: Vec<f64> = trending_series(&spec).iter().map(|p| p.close).collect();
        assert_eq!(closes, vec![100.0, 125.0, 150.0]);
    }

    #[test]
    fn random_walk_depends_on_label() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let spy = random_walk("SPY", start, end);
        assert_eq!(spy, random_walk("SPY", start, end));
        assert_ne!(spy, random_walk("QQQ", start, end));
        assert!(!spy.is_empty());
    }
}
