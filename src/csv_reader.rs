// Delimited-text decoding

use anyhow::{Context, Result};
use log::debug;
use std::io::{self, Read};

use crate::coerce::parse_decimal;
use crate::data::{CellValue, Row, Table};
use crate::loader::decode_text;

const CANDIDATE_DELIMITERS: [u8; 4] = [b',', b'\t', b';', b'|'];
const DELIMITER_SAMPLE_RECORDS: usize = 10;

/// Read delimited text from stdin and decode it.
pub fn read_csv_from_stdin() -> Result<Table> {
    let mut bytes = Vec::new();
    io::stdin()
        .read_to_end(&mut bytes)
        .context("Failed to read CSV from stdin")?;
    parse_csv(&decode_text(&bytes)).context("Failed to parse CSV from stdin")
}

/// Pick the delimiter that splits the leading records into the most
/// columns with a consistent width. Falls back to a comma.
pub fn infer_delimiter(text: &str) -> u8 {
    let mut best = (b',', 1usize);

    for &delimiter in &CANDIDATE_DELIMITERS {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let widths: Vec<usize> = reader
            .records()
            .take(DELIMITER_SAMPLE_RECORDS)
            .filter_map(|r| r.ok())
            .map(|r| r.len())
            .collect();

        let Some(&width) = widths.first() else { continue };
        if width > best.1 && widths.iter().all(|&w| w == width) {
            best = (delimiter, width);
        }
    }

    best.0
}

/// Infer the type of a raw field: empty is null, `true`/`false` are
/// booleans, plain decimals are numbers, the rest stays text.
pub fn infer_cell(raw: &str) -> CellValue {
    if raw.is_empty() {
        return CellValue::Null;
    }
    if raw.eq_ignore_ascii_case("true") {
        return CellValue::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return CellValue::Bool(false);
    }
    match parse_decimal(raw) {
        Some(n) => CellValue::Number(n),
        None => CellValue::Text(raw.to_string()),
    }
}

/// Decode delimited text with a header row.
pub fn parse_csv(text: &str) -> Result<Table> {
    let delimiter = infer_delimiter(text);
    debug!("inferred delimiter {:?}", delimiter as char);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read CSV header row")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Malformed CSV record {}", line + 1))?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(h, raw)| (h.clone(), infer_cell(raw)))
            .collect();
        rows.push(row);
    }

    // A header-only "file" produced by an empty input
    let headers = if headers.iter().all(|h| h.is_empty()) { Vec::new() } else { headers };

    Ok(Table::new(headers, rows))
}
