// Spreadsheet decoding (first sheet only)

use calamine::{open_workbook_auto, Data, Range, Reader};
use log::debug;
use std::path::Path;

use crate::coerce::display_string;
use crate::data::{CellValue, Row, Table};
use crate::loader::DecodeError;

pub fn load_workbook(path: &Path) -> Result<Table, DecodeError> {
    let mut workbook = open_workbook_auto(path)?;

    let sheet_name = workbook.sheet_names().first().cloned().unwrap_or_default();
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| DecodeError::InvalidFormat("Workbook contains no sheets".to_string()))??;

    debug!("reading sheet '{}' ({:?})", sheet_name, range.get_size());
    Ok(range_to_table(&range))
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::text(""),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(format!("{:?}", e)),
    }
}

/// Header names for the first row; blanks become `__EMPTY`, `__EMPTY_1`, ...
fn header_names(cells: &[Data]) -> Vec<String> {
    let mut blanks = 0;
    cells
        .iter()
        .map(|cell| {
            let name = match cell {
                Data::Empty => String::new(),
                other => display_string(&cell_value(other)).trim().to_string(),
            };
            if !name.is_empty() {
                return name;
            }
            let name = if blanks == 0 {
                "__EMPTY".to_string()
            } else {
                format!("__EMPTY_{}", blanks)
            };
            blanks += 1;
            name
        })
        .collect()
}

/// First row is the header row; empty cells become empty strings and fully
/// blank rows are dropped.
pub fn range_to_table(range: &Range<Data>) -> Table {
    let mut rows_iter = range.rows();
    let Some(header_cells) = rows_iter.next() else {
        return Table::default();
    };
    let headers = header_names(header_cells);

    let rows = rows_iter
        .filter(|cells| cells.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|cells| {
            headers
                .iter()
                .enumerate()
                .map(|(i, h)| (h.clone(), cells.get(i).map(cell_value).unwrap_or_else(|| CellValue::text(""))))
                .collect::<Row>()
        })
        .collect();

    Table::new(headers, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_range() -> Range<Data> {
        let mut range = Range::new((0, 0), (3, 2));
        range.set_value((0, 0), Data::String("region".to_string()));
        range.set_value((0, 2), Data::String("amount".to_string()));
        range.set_value((1, 0), Data::String("N".to_string()));
        range.set_value((1, 1), Data::Bool(true));
        range.set_value((1, 2), Data::Float(12.5));
        range.set_value((3, 0), Data::String("S".to_string()));
        range.set_value((3, 2), Data::Int(4));
        range
    }

    #[test]
    fn test_range_to_table() {
        let table = range_to_table(&sample_range());
        assert_eq!(table.headers, vec!["region", "__EMPTY", "amount"]);
        // row 2 is blank and dropped
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].get("amount"), Some(&CellValue::Number(12.5)));
        assert_eq!(table.rows[0].get("__EMPTY"), Some(&CellValue::Bool(true)));
        assert_eq!(table.rows[1].get("__EMPTY"), Some(&CellValue::text("")));
        assert_eq!(table.rows[1].get("amount"), Some(&CellValue::Number(4.0)));
    }

    #[test]
    fn test_header_names_numbering() {
        let names = header_names(&[Data::Empty, Data::String("a".to_string()), Data::Empty, Data::Float(3.0)]);
        assert_eq!(names, vec!["__EMPTY", "a", "__EMPTY_1", "3"]);
    }

    #[test]
    fn test_empty_range() {
        let range: Range<Data> = Range::empty();
        assert!(range_to_table(&range).is_empty());
    }
}
