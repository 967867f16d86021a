//! Export functionality for run reports.
//!
//! Supports JSON (the full report) and CSV (one row per stage).

use super::PipelineReport;
use std::io::Write;
use std::path::Path;

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    /// Pick a format from the file extension, JSON unless it ends in `.csv`
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => ExportFormat::Csv,
            _ => ExportFormat::Json,
        }
    }
}

/// Export the full report as pretty-printed JSON
pub fn export_json<W: Write>(report: &PipelineReport, mut writer: W) -> std::io::Result<()> {
    serde_json::to_writer_pretty(&mut writer, report)?;
    writeln!(writer)
}

/// Export stage rows to CSV
///
/// CSV columns: Stage, Kind, Count In, Count Out, Dropped, Duration (ms)
pub fn export_csv<W: Write>(report: &PipelineReport, mut writer: W) -> std::io::Result<()> {
    writeln!(writer, "Stage,Kind,Count In,Count Out,Dropped,Duration (ms)")?;

    for stage in &report.stages {
        writeln!(
            writer,
            "{},{},{},{},{},{}",
            csv_field(&stage.stage_name),
            stage.kind,
            stage.count_in,
            stage.count_out,
            stage.dropped(),
            stage.duration_ms
        )?;
    }

    Ok(())
}

/// Quote a field if it contains a separator, quote or newline
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Export a report to a file
pub fn export_to_file(
    report: &PipelineReport,
    path: &Path,
    format: ExportFormat,
) -> std::io::Result<()> {
    let file = std::fs::File::create(path)?;
    let writer = std::io::BufWriter::new(file);

    match format {
        ExportFormat::Json => export_json(report, writer),
        ExportFormat::Csv => export_csv(report, writer),
    }
}
