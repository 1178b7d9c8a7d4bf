//! Price loading for the runner.
//!
//! Reads daily closes from CSV (Yahoo Finance export format or a plain
//! `date,close` file) and implements the fallback policy:
//! 1. If a CSV path is given → load it
//! 2. If no CSV and `--synthetic` → generate a synthetic series (tagged)
//! 3. Otherwise → fail with a clear error
//!
//! Synthetic data is a developer-only debug mode; results built on it are
//! tagged so they are never mistaken for real analysis.

use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

use regimelab_core::domain::{DatasetHash, PricePoint};
use regimelab_core::synthetic::random_walk;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed price CSV at record {record}: {message}")]
    Malformed { record: u64, message: String },

    #[error("price file {0} contains no rows")]
    Empty(String),

    #[error("no price file given (use --synthetic for synthetic data)")]
    NoSource,
}

/// Where a series came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Csv(PathBuf),
    Synthetic,
}

/// Options controlling how prices are loaded.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Label used in reports and to seed synthetic data.
    pub symbol: String,
    /// Generate a synthetic series when no CSV is given.
    pub synthetic: bool,
    /// Synthetic series start date (inclusive).
    pub start: NaiveDate,
    /// Synthetic series end date (inclusive).
    pub end: NaiveDate,
}

impl LoadOptions {
    /// Options for roughly one year of synthetic history ending at `end`,
    /// matching the one-year lookback used for live analysis.
    pub fn synthetic_year(symbol: &str, end: NaiveDate) -> Self {
        Self {
            symbol: symbol.to_string(),
            synthetic: true,
            start: end - chrono::Duration::days(365),
            end,
        }
    }
}

/// A loaded series with provenance.
#[derive(Debug, Clone)]
pub struct LoadedPrices {
    pub symbol: String,
    pub prices: Vec<PricePoint>,
    /// BLAKE3 over every date and close.
    pub dataset_hash: DatasetHash,
    pub source: PriceSource,
}

impl LoadedPrices {
    fn new(symbol: String, prices: Vec<PricePoint>, source: PriceSource) -> Self {
        let dataset_hash = DatasetHash::from_prices(&prices);
        Self {
            symbol,
            prices,
            dataset_hash,
            source,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.source == PriceSource::Synthetic
    }
}

/// One CSV row. Extra columns (Open, High, Adj Close, ...) are ignored.
#[derive(Debug, Deserialize)]
struct PriceRow {
    #[serde(alias = "Date", alias = "DATE", alias = "timestamp")]
    date: String,
    #[serde(alias = "Close", alias = "CLOSE")]
    close: String,
}

/// Accepts `YYYY-MM-DD` and the date part of an ISO-8601 timestamp.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Parse a price CSV from any reader.
///
/// Dates are parsed and closes converted, but ordering and positivity are
/// left to the metrics engine so that a bad close surfaces as a failed run
/// naming the offending index.
pub fn read_prices<R: Read>(reader: R) -> Result<Vec<PricePoint>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut prices = Vec::new();
    for (i, row) in rdr.deserialize::<PriceRow>().enumerate() {
        let record = i as u64 + 1;
        let row = row.map_err(|e| LoadError::Malformed {
            record,
            message: e.to_string(),
        })?;
        let date = parse_date(&row.date).ok_or_else(|| LoadError::Malformed {
            record,
            message: format!("unparseable date '{}'", row.date),
        })?;
        // Yahoo exports write "null" for missing closes; NaN keeps the row
        // so the engine reports it by index.
        let close = match row.close.as_str() {
            "" | "null" | "NaN" => f64::NAN,
            text => text.parse::<f64>().map_err(|_| LoadError::Malformed {
                record,
                message: format!("unparseable close '{text}'"),
            })?,
        };
        prices.push(PricePoint::new(date, close));
    }
    Ok(prices)
}

/// Load a price CSV from disk.
pub fn load_prices_csv(path: &Path) -> Result<LoadedPrices, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let prices = read_prices(file)?;
    if prices.is_empty() {
        return Err(LoadError::Empty(path.display().to_string()));
    }
    let symbol = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "prices".to_string());
    Ok(LoadedPrices::new(
        symbol,
        prices,
        PriceSource::Csv(path.to_path_buf()),
    ))
}

/// Load prices from `path`, or fall back to synthetic data when allowed.
pub fn load_prices(path: Option<&Path>, opts: &LoadOptions) -> Result<LoadedPrices, LoadError> {
    if let Some(path) = path {
        let mut loaded = load_prices_csv(path)?;
        if !opts.symbol.is_empty() {
            loaded.symbol = opts.symbol.clone();
        }
        return Ok(loaded);
    }

    if opts.synthetic {
        warn!(
            "generating synthetic data for {}; results will be tagged as synthetic",
            opts.symbol
        );
        let prices = random_walk(&opts.symbol, opts.start, opts.end);
        if prices.is_empty() {
            return Err(LoadError::Empty(format!("synthetic:{}", opts.symbol)));
        }
        return Ok(LoadedPrices::new(
            opts.symbol.clone(),
            prices,
            PriceSource::Synthetic,
        ));
    }

    Err(LoadError::NoSource)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const YAHOO: &str = "\
Date,Open,High,Low,Close,Adj Close,Volume
2024-01-02,100.0,101.0,99.0,100.5,100.5,1000
2024-01-03,100.5,102.0,100.0,101.25,101.25,1100
2024-01-04,101.25,101.5,99.5,99.75,99.75,900
";

    fn year_opts(symbol: &str) -> LoadOptions {
        LoadOptions::synthetic_year(symbol, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap())
    }

    #[test]
    fn reads_yahoo_export() {
        let prices = read_prices(YAHOO.as_bytes()).unwrap();
        assert_eq!(prices.len(), 3);
        assert_eq!(prices[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(prices[1].close, 101.25);
    }

    #[test]
    fn reads_lowercase_two_column_file() {
        let prices = read_prices("date,close\n2024-03-01,50\n2024-03-04,51.5\n".as_bytes()).unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[1].close, 51.5);
    }

    #[test]
    fn accepts_timestamp_dates() {
        let prices =
            read_prices("Date,Close\n2024-03-01 00:00:00-05:00,50\n".as_bytes()).unwrap();
        assert_eq!(prices[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn null_close_is_kept_as_nan() {
        let prices = read_prices("Date,Close\n2024-03-01,null\n".as_bytes()).unwrap();
        assert!(prices[0].close.is_nan());
    }

    #[test]
    fn bad_rows_name_the_record() {
        let err = read_prices("Date,Close\n2024-03-01,50\nnot-a-date,51\n".as_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::Malformed { record: 2, .. }));
        let err = read_prices("Date,Close\n2024-03-01,fifty\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("fifty"));
    }

    #[test]
    fn load_from_file_hashes_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SPY.csv");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(YAHOO.as_bytes())
            .unwrap();

        let loaded = load_prices_csv(&path).unwrap();
        assert_eq!(loaded.symbol, "SPY");
        assert_eq!(loaded.source, PriceSource::Csv(path.clone()));
        assert_eq!(loaded.dataset_hash, DatasetHash::from_prices(&loaded.prices));
        assert!(!loaded.is_synthetic());
    }

    #[test]
    fn empty_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "Date,Close\n").unwrap();
        assert!(matches!(load_prices_csv(&path), Err(LoadError::Empty(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_prices_csv(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn no_source_without_synthetic() {
        let opts = LoadOptions {
            synthetic: false,
            ..year_opts("SPY")
        };
        assert!(matches!(load_prices(None, &opts), Err(LoadError::NoSource)));
    }

    #[test]
    fn synthetic_fallback_produces_tagged_data() {
        let loaded = load_prices(None, &year_opts("FAKE")).unwrap();
        assert!(loaded.is_synthetic());
        assert_eq!(loaded.symbol, "FAKE");
        assert!(loaded.prices.len() > 250);
    }

    #[test]
    fn synthetic_data_is_deterministic_per_symbol() {
        let a = load_prices(None, &year_opts("SPY")).unwrap();
        let b = load_prices(None, &year_opts("SPY")).unwrap();
        let c = load_prices(None, &year_opts("QQQ")).unwrap();
        assert_eq!(a.dataset_hash, b.dataset_hash);
        assert_ne!(a.dataset_hash, c.dataset_hash);
    }
}
