//! Output formatting for CLI

use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use warehouse_reconcile::validation::DataProfile;
use warehouse_reconcile::{Batch, PipelineReport, ValidationResult, Violation};

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Print a serializable value as pretty JSON
pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

pub fn print_validation(result: &ValidationResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(result),
        OutputFormat::Text => {
            print!("{}", format_validation(result));
            Ok(())
        }
    }
}

pub fn print_report(report: &PipelineReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Text => {
            print!("{}", format_report(report));
            Ok(())
        }
    }
}

/// Write a batch as a JSON array
pub fn write_batch(batch: &Batch, path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(batch)?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

fn format_violation(violation: &Violation) -> String {
    let marker = if violation.is_error() { "✗" } else { "⚠" };
    let mut line = format!("  {} {}: {}\n", marker, violation.rule_id, violation.message);
    if !violation.rows.is_empty() {
        let rows: Vec<String> = violation.rows.iter().take(10).map(ToString::to_string).collect();
        let more = violation.rows.len().saturating_sub(rows.len());
        line.push_str(&format!("      {}", rows.join(", ")));
        if more > 0 {
            line.push_str(&format!(" and {} more", more));
        }
        line.push('\n');
    }
    line
}

pub fn format_validation(result: &ValidationResult) -> String {
    let mut output = format!(
        "{}: {} ({} row(s), {} error(s), {} warning(s))\n",
        result.entity,
        result.status.to_string().to_uppercase(),
        result.row_count,
        result.errors().count(),
        result.warnings().count()
    );
    for violation in &result.violations {
        output.push_str(&format_violation(violation));
    }
    if !result.rejected_rows.is_empty() {
        output.push_str(&format!("  {} row(s) filtered out\n", result.rejected_rows.len()));
    }
    output.push_str(&format_profile(&result.profile));
    output
}

fn format_profile(profile: &DataProfile) -> String {
    let mut output = format!(
        "  Profile: {} column(s), {} duplicate row(s)\n",
        profile.column_count, profile.duplicate_rows
    );
    for (column, percent) in &profile.null_percentages {
        if *percent > 0.0 {
            output.push_str(&format!("    {}: {:.2}% null\n", column, percent));
        }
    }
    output
}

pub fn format_report(report: &PipelineReport) -> String {
    let mut output = format!("Run {} ({} ms)\n", report.run_id, report.duration_ms);
    for entity in &report.entities {
        let status = entity
            .status
            .map_or_else(|| "unvalidated".to_string(), |s| s.to_string());
        output.push_str(&format!(
            "  {} → {}: {} extracted, {} loaded, {} rejected, {} warning(s) [{}]\n",
            entity.entity,
            entity.table,
            entity.extracted,
            entity.loaded,
            entity.rejected,
            entity.warnings,
            status
        ));
    }
    output.push_str(&format!(
        "✅ {} record(s) loaded into {} table(s)\n",
        report.loaded(),
        report.entities.len()
    ));
    output
}
