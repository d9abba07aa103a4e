//! Tabular rendering of extraction results.

use std::fs;
use std::path::Path;

use tabled::builder::Builder;
use tabled::settings::Style;
use tracing::info;

use crate::analyzer::extract::ReferenceRecord;
use crate::error::Result;

/// Column headers of every tabular rendering.
pub const COLUMNS: [&str; 3] = ["Table Name", "Schema Name", "File Name"];

/// Export file written when the caller gives no path.
pub const DEFAULT_EXPORT_FILE: &str = "tables_and_schemas.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON array of objects
    Json,
    /// CSV with a header row
    Csv,
    /// Pretty-printed table
    Table,
}

pub fn render(records: &[ReferenceRecord], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(records)?),
        OutputFormat::Csv => render_csv(records),
        OutputFormat::Table => Ok(render_table(records)),
    }
}

/// Write the rendering of `records` to `path`, replacing any existing file.
pub fn export_to_path(records: &[ReferenceRecord], path: &Path, format: OutputFormat) -> Result<()> {
    fs::write(path, render(records, format)?)?;
    info!(file = %path.display(), rows = records.len(), "results exported");
    Ok(())
}

fn row(record: &ReferenceRecord) -> [&str; 3] {
    [
        record.table_name.as_str(),
        record.schema_name.as_str(),
        record.source_tag.as_str(),
    ]
}

/// The header is written even when there are no records.
fn render_csv(records: &[ReferenceRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(COLUMNS)?;
    for record in records {
        wtr.write_record(row(record))?;
    }

    let data = wtr.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

fn render_table(records: &[ReferenceRecord]) -> String {
    if records.is_empty() {
        return "(0 rows)".to_string();
    }

    let mut builder = Builder::default();
    builder.push_record(COLUMNS.iter().map(|c| c.to_string()));
    for record in records {
        builder.push_record(row(record).iter().map(|v| v.to_string()));
    }

    let mut table = builder.build();
    table.with(Style::rounded());
    format!("{table}\n({} rows)", records.len())
}
