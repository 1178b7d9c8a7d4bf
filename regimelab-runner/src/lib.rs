//! RegimeLab Runner — configuration, price loading, hosted collaborators,
//! batch runs and report export.
//!
//! This crate builds on `regimelab-core` to provide:
//! - TOML pipeline configuration with validation and fingerprinting
//! - CSV price loading with synthetic fallback
//! - Chat-completions reasoning collaborator
//! - Single and parallel batch analysis
//! - JSON / CSV / Markdown export

pub mod config;
pub mod data_loader;
pub mod export;
pub mod inference;
pub mod runner;

pub use config::{CollaboratorConfig, CollaboratorKind, ConfigError, InferenceConfig, PipelineConfig};
pub use data_loader::{load_prices, load_prices_csv, read_prices, LoadError, LoadOptions, LoadedPrices, PriceSource};
pub use export::{export_history_csv, export_json, export_report, import_json, load_report, render_summary};
pub use inference::InferenceReasoner;
pub use runner::{analyze, resolve_as_of, run_batch, AnalysisRecord, AsOf, RunError, RunRequest, SCHEMA_VERSION};
