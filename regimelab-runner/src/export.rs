//! Reporting and export — JSON, CSV, and Markdown artifact generation.
//!
//! Provides three export formats:
//! - **JSON**: full round-trip serialization of an `AnalysisRecord` with
//!   schema versioning
//! - **CSV**: regime history for external analysis tools
//! - **Markdown**: the human-readable run summary shown by the CLI
//!
//! All persisted records include a `schema_version` field. Unknown versions
//! are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use regimelab_core::classifier::RegimePoint;
use regimelab_core::reflexion::{DecisionTrail, RunOutcome};

use crate::runner::{AnalysisRecord, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize an `AnalysisRecord` to pretty JSON.
pub fn export_json(record: &AnalysisRecord) -> Result<String> {
    serde_json::to_string_pretty(record).context("failed to serialize AnalysisRecord to JSON")
}

/// Deserialize an `AnalysisRecord` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<AnalysisRecord> {
    let record: AnalysisRecord =
        serde_json::from_str(json).context("failed to deserialize AnalysisRecord from JSON")?;
    if record.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            record.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(record)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export a regime history as CSV.
///
/// Columns: date, index, regime, cross
pub fn export_history_csv(points: &[RegimePoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "index", "regime", "cross"])?;
    for p in points {
        let cross = match p.cross {
            Some(c) => format!("{c:?}").to_lowercase(),
            None => String::new(),
        };
        wtr.write_record([
            &p.date.to_string(),
            &p.index.to_string(),
            p.regime.label(),
            &cross,
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save a run's artifacts.
///
/// Creates `<output_dir>/<label>_<run id prefix>/` containing:
/// - `report.json` — the full `AnalysisRecord`
/// - `summary.md` — the Markdown summary
///
/// The directory name is derived from the run id, so re-running the same
/// analysis overwrites the same bundle. Returns the bundle path.
pub fn export_report(record: &AnalysisRecord, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!("{}_{}", sanitize(&record.label), record.report.run_id.short());
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let json = export_json(record)?;
    std::fs::write(run_dir.join("report.json"), &json)
        .with_context(|| format!("failed to write {}", run_dir.join("report.json").display()))?;
    std::fs::write(run_dir.join("summary.md"), render_summary(record))?;

    Ok(run_dir)
}

/// Load an `AnalysisRecord` from a bundle's report.json.
pub fn load_report(dir: &Path) -> Result<AnalysisRecord> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

fn sanitize(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "run".into()
    } else {
        cleaned
    }
}

// ─── Markdown summary ───────────────────────────────────────────────

fn opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))
}

fn opt_pct(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}%", v * 100.0))
}

/// Render the Markdown summary for a single analysis.
pub fn render_summary(record: &AnalysisRecord) -> String {
    let mut md = String::with_capacity(2048);

    md.push_str(&format!("# Regime Analysis: {}\n\n", record.label));

    // Metadata
    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Run | {} |\n", record.report.run_id.short()));
    if let (Some(first), Some(last)) = (record.first_date, record.last_date) {
        md.push_str(&format!("| Period | {first} to {last} |\n"));
    }
    md.push_str(&format!("| Prices | {} |\n", record.price_count));
    md.push_str(&format!("| As-of Index | {} |\n", record.as_of_index));
    md.push_str(&format!("| Collaborator | {} |\n", record.collaborator));
    md.push_str(&format!("| Dataset Hash | {} |\n", record.dataset_hash));
    if record.has_synthetic {
        md.push_str("| Data | **SYNTHETIC** |\n");
    }
    md.push('\n');

    match &record.report.outcome {
        RunOutcome::Completed(trail) => render_trail(&mut md, trail),
        RunOutcome::Failed(failed) => {
            md.push_str("## Run Failed\n\n");
            md.push_str("| Field | Value |\n");
            md.push_str("| --- | --- |\n");
            md.push_str(&format!("| Stage | {} |\n", failed.failed_stage));
            md.push_str(&format!("| Error | {} |\n", failed.error_kind));
            md.push_str(&format!("| Message | {} |\n", failed.message));
            md.push('\n');
        }
    }

    md
}

fn render_trail(md: &mut String, trail: &DecisionTrail) {
    let m = &trail.metrics;
    let short = m.sma_short_reading();
    let long = m.sma_long_reading();

    // Technical Snapshot
    md.push_str("## Technical Snapshot\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| As Of | {} |\n", m.as_of_date()));
    md.push_str(&format!("| Price | {:.2} |\n", m.price()));
    md.push_str(&format!("| SMA-{} | {} |\n", short.period, opt(short.value)));
    md.push_str(&format!("| SMA-{} | {} |\n", long.period, opt(long.value)));
    md.push_str(&format!(
        "| Volatility (ann.) | {} |\n",
        opt_pct(m.volatility_annualized())
    ));
    md.push_str(&format!(
        "| Daily Return | {:.2}% |\n",
        m.daily_return() * 100.0
    ));
    md.push('\n');

    // Regime
    let a = &trail.assessment;
    md.push_str("## Regime\n\n");
    md.push_str(&format!(
        "**{}** (rule: {:?}, volatility band: {})\n\n",
        a.regime(),
        a.matched_rule(),
        a.volatility_band()
    ));

    // Strategy
    let p = &trail.proposal;
    md.push_str("## Strategy Proposal\n\n");
    md.push_str(&format!(
        "**{}** at {:.0}% sizing\n\n",
        p.action(),
        p.position_sizing_hint() * 100.0
    ));
    if !p.rationale().is_empty() {
        md.push_str(&format!("{}\n\n", p.rationale()));
    }

    // Critique
    let c = &trail.critique;
    md.push_str("## Risk Critique\n\n");
    md.push_str(&format!("Severity: **{}**\n\n", c.severity()));
    if c.concerns().is_empty() {
        md.push_str("No concerns raised.\n\n");
    } else {
        for concern in c.concerns() {
            md.push_str(&format!("- {concern}\n"));
        }
        md.push('\n');
    }

    // Decision
    let d = &trail.decision;
    md.push_str("## Final Decision\n\n");
    md.push_str(&format!(
        "**{}** at {:.0}% of capital{}\n\n",
        d.final_action(),
        d.position_size() * 100.0,
        if d.overridden() { " (overridden)" } else { "" }
    ));
    for adjustment in d.adjustments() {
        md.push_str(&format!("- {adjustment}\n"));
    }
    if !d.adjustments().is_empty() {
        md.push('\n');
    }
}
