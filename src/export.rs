use anyhow::{anyhow, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::coerce::display_string;
use crate::data::{CellValue, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(anyhow!("Unknown export format '{}' (expected csv or json)", other)),
        }
    }
}

fn csv_field(value: Option<&CellValue>) -> String {
    match value {
        None | Some(CellValue::Null) => String::new(),
        Some(v) => display_string(v),
    }
}

/// Render records as CSV. The header is the first record's keys; every row
/// follows that key order. Quoting is RFC 4180.
pub fn to_csv(records: &[Row]) -> Result<Option<String>> {
    let Some(first) = records.first() else {
        return Ok(None);
    };
    let headers: Vec<&str> = first.keys().collect();

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(&headers).context("Failed to write CSV header")?;
    for record in records {
        writer
            .write_record(headers.iter().map(|h| csv_field(record.get(h))))
            .context("Failed to write CSV record")?;
    }

    let bytes = writer.into_inner().map_err(|e| anyhow!("Failed to flush CSV: {}", e))?;
    String::from_utf8(bytes).map(Some).context("CSV output is not valid UTF-8")
}

/// Pretty-printed JSON array, one object per record.
pub fn to_json(records: &[Row]) -> Result<Option<String>> {
    if records.is_empty() {
        return Ok(None);
    }
    serde_json::to_string_pretty(records)
        .map(Some)
        .context("Failed to serialize records as JSON")
}

pub fn format_records(records: &[Row], format: ExportFormat) -> Result<Option<String>> {
    match format {
        ExportFormat::Csv => to_csv(records),
        ExportFormat::Json => to_json(records),
    }
}

/// Write `records` to `path` (the format's extension is added when missing).
/// Nothing is written for an empty record set.
pub fn export_records(records: &[Row], format: ExportFormat, path: &Path) -> Result<Option<PathBuf>> {
    let Some(payload) = format_records(records, format)? else {
        info!("nothing to export");
        return Ok(None);
    };

    let mut target = path.to_path_buf();
    let has_extension = target
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(format.extension()));
    if !has_extension {
        let mut name = target.as_os_str().to_os_string();
        name.push(".");
        name.push(format.extension());
        target = PathBuf::from(name);
    }

    fs::write(&target, payload).with_context(|| format!("Failed to write {}", target.display()))?;
    info!("exported {} records to {}", records.len(), target.display());
    Ok(Some(target))
}
