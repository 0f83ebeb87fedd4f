use log::{info, warn};
use std::borrow::Cow;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::csv_reader;
use crate::data::Table;
use crate::xlsx_reader;

/// Why an input file could not become a usable table.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Spreadsheet read error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("Unsupported file type '{0}' (expected csv, txt, xlsx, xls or json)")]
    UnsupportedFormat(String),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("The file contains no columns or no data rows")]
    EmptyTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Delimited,
    Workbook,
    Json,
}

impl SourceKind {
    pub fn from_path(path: &Path) -> Result<Self, DecodeError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" | "txt" => Ok(SourceKind::Delimited),
            "xlsx" | "xls" | "xlsm" | "ods" => Ok(SourceKind::Workbook),
            "json" => Ok(SourceKind::Json),
            _ => Err(DecodeError::UnsupportedFormat(ext)),
        }
    }
}

fn non_empty(table: Table) -> Result<Table, DecodeError> {
    if table.is_empty() {
        return Err(DecodeError::EmptyTable);
    }
    Ok(table)
}

pub fn parse_json_table(text: &str) -> Result<Table, DecodeError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    Table::from_json(&value).map_err(|e| DecodeError::InvalidFormat(e.to_string()))
}

pub fn parse_delimited_table(text: &str) -> Result<Table, DecodeError> {
    csv_reader::parse_csv(text).map_err(|e| match e.downcast::<csv::Error>() {
        Ok(csv_err) => DecodeError::Csv(csv_err),
        Err(other) => DecodeError::InvalidFormat(format!("{:#}", other)),
    })
}

/// Text of a delimited file. Bytes that are not UTF-8 (Latin-1 exports,
/// for instance) become U+FFFD instead of failing the whole file.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let text = String::from_utf8_lossy(bytes);
    if let Cow::Owned(_) = text {
        warn!("input is not valid UTF-8; invalid bytes were replaced");
    }
    text
}

/// Decode a file into a non-empty table, choosing the decoder by extension.
pub fn load_table(path: &Path) -> Result<Table, DecodeError> {
    let kind = SourceKind::from_path(path)?;
    let table = match kind {
        SourceKind::Delimited => parse_delimited_table(&decode_text(&fs::read(path)?))?,
        SourceKind::Workbook => xlsx_reader::load_workbook(path)?,
        SourceKind::Json => parse_json_table(&fs::read_to_string(path)?)?,
    };
    let table = non_empty(table)?;
    info!(
        "loaded {} ({:?}): {} rows, {} columns",
        path.display(),
        kind,
        table.rows.len(),
        table.headers.len()
    );
    Ok(table)
}

/// `-` reads CSV from stdin, anything else goes through [`load_table`].
pub fn load_source(source: &str) -> Result<Table, DecodeError> {
    if source == "-" {
        let table = csv_reader::read_csv_from_stdin()
            .map_err(|e| DecodeError::InvalidFormat(format!("{:#}", e)))?;
        return non_empty(table);
    }
    load_table(Path::new(source))
}
