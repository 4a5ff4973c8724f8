//! Reporting and export: DataFrame, JSON, CSV and Markdown.
//!
//! Everything here renders to in-memory values (a Polars `DataFrame` or a
//! `String`); callers decide whether and where to write them.
//!
//! JSON reports carry a `schema_version`. Newer versions are rejected on load.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use polars::prelude::*;

use liqlens_core::align::AlignedPanel;
use liqlens_core::backtest::{BacktestResult, Direction, Outcome};
use liqlens_core::correlation::Correlation;

use crate::session::{BacktestReport, SCHEMA_VERSION};

// ─── Panel ──────────────────────────────────────────────────────────

/// Convert a panel to a Polars DataFrame: a `date` column plus one nullable
/// `f64` column per series.
pub fn panel_to_dataframe(panel: &AlignedPanel) -> Result<DataFrame> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).context("epoch date")?;
    let days: Vec<i32> = panel
        .dates()
        .iter()
        .map(|d| (*d - epoch).num_days() as i32)
        .collect();

    let mut columns = Vec::with_capacity(panel.names().len() + 1);
    columns.push(
        Column::new("date".into(), days)
            .cast(&DataType::Date)
            .context("date cast")?,
    );
    for name in panel.names() {
        let values: Vec<Option<f64>> = panel.column(name).unwrap_or_default().to_vec();
        columns.push(Column::new(name.as_str().into(), values));
    }

    DataFrame::new(columns).context("dataframe creation")
}

/// Export a panel as CSV. Undefined slots are empty fields.
pub fn export_panel_csv(panel: &AlignedPanel) -> Result<String> {
    let mut df = panel_to_dataframe(panel)?;
    let mut buf: Vec<u8> = Vec::new();
    CsvWriter::new(&mut buf)
        .include_header(true)
        .finish(&mut df)
        .context("failed to write panel CSV")?;
    String::from_utf8(buf).context("CSV output is not valid UTF-8")
}

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_json(report: &BacktestReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize BacktestReport to JSON")
}

/// Deserialize a report, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestReport> {
    let report: BacktestReport =
        serde_json::from_str(json).context("failed to deserialize BacktestReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV ────────────────────────────────────────────────────────────

/// Export per-event records.
///
/// Columns: index, date, driver_change, status, exit_date, forward_return
pub fn export_events_csv(result: &BacktestResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "index",
        "date",
        "driver_change",
        "status",
        "exit_date",
        "forward_return",
    ])?;

    for e in &result.events {
        let (status, exit_date, fwd) = match e.outcome {
            Outcome::Resolved {
                exit_date,
                forward_return,
            } => (
                "resolved",
                exit_date.to_string(),
                format!("{:.6}", forward_return),
            ),
            Outcome::Pending => ("pending", String::new(), String::new()),
            Outcome::Unpriced => ("unpriced", String::new(), String::new()),
        };
        let index = e.index.to_string();
        let date = e.date.to_string();
        let change = format!("{:.6}", e.driver_change);
        wtr.write_record([
            index.as_str(),
            date.as_str(),
            change.as_str(),
            status,
            exit_date.as_str(),
            fwd.as_str(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn export_correlations_csv(table: &[Correlation]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["series", "correlation", "pairs"])?;
    for c in table {
        wtr.write_record([&c.name, &format!("{:.6}", c.coefficient), &c.pairs.to_string()])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Markdown ───────────────────────────────────────────────────────

fn pct(v: f64) -> String {
    format!("{:+.2}%", v * 100.0)
}

/// Markdown report for one backtest.
pub fn generate_report(report: &BacktestReport) -> String {
    let r = &report.result;
    let p = &r.params;
    let mut md = String::with_capacity(2048);

    md.push_str("# Event Study Report\n\n");

    let direction = match p.direction {
        Direction::Up => "rises",
        Direction::Down => "falls",
    };
    md.push_str(&format!(
        "When **{}** {} by at least {:.2}% over {} trading days, what does **{}** do over the next {} trading days?\n\n",
        r.driver,
        direction,
        p.threshold * 100.0,
        p.lookback,
        r.target,
        p.horizon
    ));

    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Period | {} to {} |\n", report.start, report.end));
    match r.eligible_range {
        Some((first, last)) => md.push_str(&format!("| Eligible | {first} to {last} |\n")),
        None => md.push_str("| Eligible | none (history shorter than lookback) |\n"),
    }
    md.push_str(&format!("| Cluster Policy | {:?} |\n", p.cluster));
    md.push_str(&format!("| Dataset Hash | {} |\n", report.dataset_hash));
    md.push_str(&format!("| Digest | {} |\n", report.digest));
    if report.has_synthetic {
        md.push_str("| Data | **SYNTHETIC** |\n");
    }
    md.push('\n');

    md.push_str("## Events\n\n");
    md.push_str("| Count | Value |\n");
    md.push_str("| --- | ---: |\n");
    md.push_str(&format!("| Events | {} |\n", r.event_count));
    md.push_str(&format!("| Resolved | {} |\n", r.resolved_count));
    md.push_str(&format!("| Pending | {} |\n", r.pending_count));
    md.push_str(&format!("| Unpriced | {} |\n", r.unpriced_count));
    md.push('\n');

    md.push_str("## Forward Returns\n\n");
    match &r.stats {
        None if r.event_count == 0 => md.push_str("No qualifying events.\n\n"),
        None => md.push_str("No event has a resolved forward return yet.\n\n"),
        Some(s) => {
            md.push_str("| Metric | Value |\n");
            md.push_str("| --- | ---: |\n");
            md.push_str(&format!("| Mean | {} |\n", pct(s.mean)));
            md.push_str(&format!("| Median | {} |\n", pct(s.median)));
            md.push_str(&format!("| Min | {} |\n", pct(s.min)));
            md.push_str(&format!("| Max | {} |\n", pct(s.max)));
            md.push_str(&format!("| Std Dev | {:.2}% |\n", s.std_dev * 100.0));
            md.push_str(&format!(
                "| Decline Probability | {:.1}% ({}/{}) |\n",
                s.decline_probability * 100.0,
                s.declines,
                s.count
            ));
            match s.win_loss_ratio {
                Some(w) => md.push_str(&format!("| Win/Loss Ratio | {w:.2} |\n")),
                None => md.push_str("| Win/Loss Ratio | n/a (no declines) |\n"),
            }
            md.push('\n');
        }
    }

    md
}
