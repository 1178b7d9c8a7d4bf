//! Trailing-window primitives over a price series.
//!
//! All windows end at `end` inclusive. Callers guarantee `end < prices.len()`
//! and that every close has passed series validation.

use crate::domain::PricePoint;

/// Simple return from `prev` to `cur`.
pub fn simple_return(prev: f64, cur: f64) -> f64 {
    (cur - prev) / prev
}

/// Arithmetic mean of the `n` closes ending at `end`.
///
/// `None` when fewer than `n` points are available.
pub fn trailing_mean(prices: &[PricePoint], end: usize, n: usize) -> Option<f64> {
    if n == 0 || end + 1 < n {
        return None;
    }
    let window = &prices[end + 1 - n..=end];
    Some(window.iter().map(|p| p.close).sum::<f64>() / n as f64)
}

/// Up to `window` daily returns ending at `end`. Index 0 has no return, so
/// early in the series fewer than `window` values come back.
pub fn trailing_returns(prices: &[PricePoint], end: usize, window: usize) -> Vec<f64> {
    if window == 0 || end == 0 {
        return Vec::new();
    }
    let first = end.saturating_sub(window - 1).max(1);
    (first..=end)
        .map(|i| simple_return(prices[i - 1].close, prices[i].close))
        .collect()
}

/// Sample standard deviation (N−1 denominator). `None` for fewer than 2 values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    Some(var.sqrt())
}
