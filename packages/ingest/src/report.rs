//! Plain-text run reports printed by the CLI.

use std::fmt::Write as _;

use tollway_fare_models::{DocumentSummary, ReconcileSummary};

use crate::{IngestError, LoadOutcome, StoreStats};

const RULE_WIDTH: usize = 60;

fn rule(out: &mut String) {
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));
}

/// Renders the summary of a completed load (or dry run).
#[must_use]
pub fn render_load(outcome: &LoadOutcome) -> String {
    let mut out = String::new();
    let summary = &outcome.summary;

    match &outcome.store {
        Some(path) => {
            let _ = writeln!(out, "Loaded tolls into {}", path.display());
        }
        None => {
            let _ = writeln!(out, "Dry run: nothing was written");
        }
    }
    let _ = writeln!(out, "  fares:  {}", outcome.inputs.fares.display());
    let _ = writeln!(out, "  georef: {}", outcome.inputs.georef.display());
    let _ = writeln!(out);
    render_highways(&mut out, summary);

    if !summary.warnings.is_empty() {
        let _ = writeln!(out, "Warnings ({}):", summary.warnings.len());
        for warning in &summary.warnings {
            let _ = writeln!(out, "  - {warning}");
        }
    }

    out
}

/// Per-highway table, totals and skipped count.
fn render_highways(out: &mut String, summary: &ReconcileSummary) {
    let _ = writeln!(out, "{:<40} {:>8} {:>10}", "HIGHWAY", "POINTS", "CHARGES");
    rule(out);
    for highway in &summary.highways {
        let _ = writeln!(
            out,
            "{:<40} {:>8} {:>10}",
            highway.name, highway.toll_points, highway.toll_charges
        );
    }
    rule(out);
    let _ = writeln!(
        out,
        "{:<40} {:>8} {:>10}",
        format!("TOTAL ({} highways)", summary.highways.len()),
        summary.toll_points,
        summary.toll_charges
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Skipped records: {}", summary.skipped_records);
}

/// Renders a failed load. A rolled-back load also lists what had been
/// reconciled before the failure.
#[must_use]
pub fn render_failure(err: &IngestError) -> String {
    match err {
        IngestError::RolledBack { summary, .. } => {
            let mut out = String::new();
            if !summary.highways.is_empty() {
                render_highways(&mut out, summary);
                let _ = writeln!(out);
            }
            let _ = writeln!(
                out,
                "Load FAILED and was rolled back; the store is unchanged.\n  cause: {err}"
            );
            out
        }
        IngestError::Db(_) => format!("Load FAILED.\n  cause: {err}\n"),
        IngestError::InputMissing { .. } | IngestError::Json { .. } | IngestError::Io(_) => {
            format!("Load FAILED before the store was opened; nothing was written.\n  cause: {err}\n")
        }
    }
}

/// Renders the structural summary of a fare table.
#[must_use]
pub fn render_document_summary(path: &std::path::Path, summary: &DocumentSummary) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Fare table: {}", path.display());
    let _ = writeln!(out);
    let _ = writeln!(out, "{:<40} {:>6} {:>8}  SHAPES", "HIGHWAY", "YEAR", "POINTS");
    rule(&mut out);
    for highway in &summary.highways {
        let year = highway
            .tariff_year
            .map_or_else(|| "-".to_string(), |y| y.to_string());
        let shapes = highway
            .axis_shapes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(
            out,
            "{:<40} {:>6} {:>8}  {shapes}",
            highway.name, year, highway.toll_points
        );
    }
    rule(&mut out);
    let _ = writeln!(
        out,
        "{} highways, {} toll points, {} malformed highway entries",
        summary.highways.len(),
        summary.total_toll_points(),
        summary.malformed_highways
    );
    let _ = writeln!(out, "Tariff types: {}", summary.tariff_types.join(", "));

    out
}

/// Renders store counts and last-load metadata.
#[must_use]
pub fn render_stats(stats: &StoreStats) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Toll store: {}", stats.path.display());
    let _ = writeln!(out, "  highways:     {}", stats.counts.highways);
    let _ = writeln!(out, "  toll points:  {}", stats.counts.toll_points);
    let _ = writeln!(out, "  toll charges: {}", stats.counts.toll_charges);

    if stats.metadata.is_empty() {
        let _ = writeln!(out, "No committed load recorded.");
    } else {
        let _ = writeln!(out);
        for (key, value) in &stats.metadata {
            let _ = writeln!(out, "  {key:<18} {value}");
        }
    }

    out
}
