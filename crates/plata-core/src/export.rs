//! Shared entry export helpers for API/CLI parity.

use crate::error::{Error, Result};
use crate::models::Entry;
use serde::{Deserialize, Serialize};

/// Export output format shared by all clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

/// Fixed CSV column order, shared with the spreadsheet side.
pub const CSV_COLUMNS: [&str; 12] = [
    "id",
    "type",
    "amount",
    "principal",
    "date",
    "dueDate",
    "note",
    "who",
    "category",
    "account",
    "tags",
    "updatedAt",
];

/// Render entries as pretty-printed JSON in wire shape.
pub fn render_json_export(entries: &[Entry]) -> Result<String> {
    Ok(serde_json::to_string_pretty(entries)?)
}

/// Render entries as CSV with the fixed column order.
pub fn render_csv_export(entries: &[Entry]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_COLUMNS)?;

    for entry in entries {
        writer.write_record([
            entry.id.as_str(),
            entry.kind.as_str().to_string(),
            entry.amount.to_string(),
            entry.principal.map(|p| p.to_string()).unwrap_or_default(),
            entry.date.to_string(),
            entry.due_date.map(|d| d.to_string()).unwrap_or_default(),
            entry.note.clone(),
            entry.who.clone(),
            entry.category.clone(),
            entry.account.clone(),
            entry.tags.clone(),
            entry.updated_at.to_string(),
        ])?;
    }

    let data = writer
        .into_inner()
        .map_err(|e| Error::InvalidInput(e.to_string()))?;
    String::from_utf8(data).map_err(|e| Error::InvalidInput(e.to_string()))
}

/// Render entries based on selected export format.
pub fn render_entries_export(entries: &[Entry], format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => render_json_export(entries),
        ExportFormat::Csv => render_csv_export(entries),
    }
}

/// Build a deterministic default file name for export flows.
#[must_use]
pub fn suggested_export_file_name(format: ExportFormat, timestamp_ms: i64) -> String {
    format!("plata-export-{timestamp_ms}.{}", format.extension())
}
