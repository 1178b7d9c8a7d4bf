//! Run orchestration — resolves the as-of point, runs the machine and
//! wraps the report with its provenance.
//!
//! Two entry points:
//! - `analyze()`: one series, one as-of point. Used by `regimelab analyze`.
//! - `run_batch()`: independent requests in parallel on rayon, results in
//!   request order. Used by `regimelab batch`.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use regimelab_core::domain::{DatasetHash, PricePoint};
use regimelab_core::reflexion::{ReflexionMachine, RunReport};

use crate::data_loader::LoadedPrices;

/// Errors resolving what to run. Failures inside a run are not errors here:
/// they come back as a `Failed` report.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunError {
    #[error("series is empty")]
    EmptySeries,
    #[error("index {index} is outside the series (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("no price on or before {0}")]
    DateBeforeSeries(NaiveDate),
}

/// Current schema version for persisted analysis records.
pub const SCHEMA_VERSION: u32 = 1;

/// Which point of the series to analyze.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsOf {
    /// The last point.
    Latest,
    Index(usize),
    /// The last point on or before this date.
    Date(NaiveDate),
}

/// Resolve an as-of selector to an index into `prices`.
///
/// A date falling between observations (weekend, holiday) resolves to the
/// most recent earlier observation.
pub fn resolve_as_of(prices: &[PricePoint], as_of: AsOf) -> Result<usize, RunError> {
    if prices.is_empty() {
        return Err(RunError::EmptySeries);
    }
    match as_of {
        AsOf::Latest => Ok(prices.len() - 1),
        AsOf::Index(index) if index < prices.len() => Ok(index),
        AsOf::Index(index) => Err(RunError::IndexOutOfRange {
            index,
            len: prices.len(),
        }),
        AsOf::Date(date) => prices
            .iter()
            .rposition(|p| p.date <= date)
            .ok_or(RunError::DateBeforeSeries(date)),
    }
}

/// One unit of batch work.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub label: String,
    pub prices: Vec<PricePoint>,
    pub as_of_index: usize,
    pub synthetic: bool,
}

impl RunRequest {
    pub fn from_loaded(loaded: LoadedPrices, as_of: AsOf) -> Result<Self, RunError> {
        let as_of_index = resolve_as_of(&loaded.prices, as_of)?;
        let synthetic = loaded.is_synthetic();
        Ok(Self {
            label: loaded.symbol,
            prices: loaded.prices,
            as_of_index,
            synthetic,
        })
    }
}

/// A run report plus the provenance needed to reproduce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub label: String,
    pub dataset_hash: DatasetHash,
    pub price_count: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub as_of_index: usize,
    pub collaborator: String,
    pub has_synthetic: bool,
    pub report: RunReport,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

fn run_one(machine: &ReflexionMachine, request: &RunRequest) -> AnalysisRecord {
    let report = machine.run(&request.prices, request.as_of_index);
    AnalysisRecord {
        schema_version: SCHEMA_VERSION,
        label: request.label.clone(),
        dataset_hash: DatasetHash::from_prices(&request.prices),
        price_count: request.prices.len(),
        first_date: request.prices.first().map(|p| p.date),
        last_date: request.prices.last().map(|p| p.date),
        as_of_index: request.as_of_index,
        collaborator: machine.collaborator_name().to_string(),
        has_synthetic: request.synthetic,
        report,
    }
}

/// Analyze a loaded series at one point.
pub fn analyze(
    machine: &ReflexionMachine,
    loaded: &LoadedPrices,
    as_of: AsOf,
) -> Result<AnalysisRecord, RunError> {
    let as_of_index = resolve_as_of(&loaded.prices, as_of)?;
    let request = RunRequest {
        label: loaded.symbol.clone(),
        prices: loaded.prices.clone(),
        as_of_index,
        synthetic: loaded.is_synthetic(),
    };
    Ok(run_one(machine, &request))
}

/// Run independent requests concurrently. Each run owns its artifacts; the
/// machine and its collaborator are shared read-only.
pub fn run_batch(machine: &ReflexionMachine, requests: &[RunRequest]) -> Vec<AnalysisRecord> {
    requests
        .par_iter()
        .map(|request| run_one(machine, request))
        .collect()
}
