// Numeric coercion rules for heterogeneous cells

use crate::data::{CellValue, Table};
use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while1},
    character::complete::{char, digit0, digit1, hex_digit1, oct_digit1, one_of},
    combinator::{all_consuming, map, map_res, opt, recognize},
    sequence::{pair, preceded, tuple},
    IResult,
};

/// Number of leading rows inspected when classifying a column.
pub const CLASSIFY_SAMPLE_ROWS: usize = 10;

/// Share of sampled non-empty values that must coerce for a numeric column.
pub const NUMERIC_THRESHOLD: f64 = 0.7;

/// Decimal literal: `[+-]? (digits [. digits?] | . digits) ([eE] [+-]? digits)?`
fn decimal_literal(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        opt(one_of("+-")),
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)
}

fn radix_literal(input: &str) -> IResult<&str, u64> {
    alt((
        map_res(preceded(tag_no_case("0x"), hex_digit1), |d: &str| u64::from_str_radix(d, 16)),
        map_res(preceded(tag_no_case("0o"), oct_digit1), |d: &str| u64::from_str_radix(d, 8)),
        map_res(
            preceded(tag_no_case("0b"), take_while1(|c: char| c == '0' || c == '1')),
            |d: &str| u64::from_str_radix(d, 2),
        ),
    ))(input)
}

fn number_literal(input: &str) -> IResult<&str, f64> {
    alt((
        map(radix_literal, |n| n as f64),
        map_res(decimal_literal, str::parse::<f64>),
    ))(input)
}

/// Parse the text of a cell as a number.
///
/// Surrounding whitespace is ignored; blank text, `NaN` and values that
/// overflow to infinity are not numbers.
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    match all_consuming(number_literal)(trimmed) {
        Ok((_, n)) if n.is_finite() => Some(n),
        _ => None,
    }
}

/// Stricter form used by the CSV decoder: plain decimals only.
pub fn parse_decimal(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    match all_consuming(decimal_literal)(trimmed) {
        Ok((_, literal)) => literal.parse::<f64>().ok().filter(|n| n.is_finite()),
        Err(_) => None,
    }
}

/// A cell is missing when the key is absent or holds null.
pub fn is_missing(value: Option<&CellValue>) -> bool {
    matches!(value, None | Some(CellValue::Null))
}

/// Missing, or text with nothing but whitespace.
pub fn is_blank(value: Option<&CellValue>) -> bool {
    match value {
        None | Some(CellValue::Null) => true,
        Some(CellValue::Text(s)) => s.trim().is_empty(),
        _ => false,
    }
}

/// Coerce a cell to a finite number. Booleans count as 1 and 0.
pub fn to_number(value: &CellValue) -> Option<f64> {
    match value {
        CellValue::Null => None,
        CellValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        CellValue::Number(n) => n.is_finite().then_some(*n),
        CellValue::Text(s) => parse_number(s),
    }
}

/// Look up and coerce in one step; missing cells yield `None`.
pub fn cell_number(value: Option<&CellValue>) -> Option<f64> {
    value.and_then(to_number)
}

/// The display string of a cell, used as the grouping key.
pub fn display_string(value: &CellValue) -> String {
    match value {
        CellValue::Null => "null".to_string(),
        CellValue::Bool(b) => b.to_string(),
        CellValue::Number(n) => format_number(*n),
        CellValue::Text(s) => s.clone(),
    }
}

/// Shortest round-trip rendering; integral values carry no fraction.
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        // also folds -0
        "0".to_string()
    } else if n.is_nan() {
        "NaN".to_string()
    } else {
        n.to_string()
    }
}

/// Column-level numeric classification.
///
/// Samples the first [`CLASSIFY_SAMPLE_ROWS`] rows, ignores blank cells, and
/// accepts the column when at least [`NUMERIC_THRESHOLD`] of the remainder
/// coerce. A column with no non-blank sample is not numeric.
pub fn is_numeric_column(table: &Table, column: &str) -> bool {
    let sampled: Vec<&CellValue> = table
        .rows
        .iter()
        .take(CLASSIFY_SAMPLE_ROWS)
        .filter_map(|row| row.get(column))
        .filter(|v| !is_blank(Some(*v)))
        .collect();

    if sampled.is_empty() {
        return false;
    }

    let numeric = sampled.iter().filter(|v| to_number(v).is_some()).count();
    numeric as f64 / sampled.len() as f64 >= NUMERIC_THRESHOLD
}

pub fn is_categorical_column(table: &Table, column: &str) -> bool {
    !is_numeric_column(table, column)
}

pub fn numeric_columns(table: &Table) -> Vec<&str> {
    table
        .headers
        .iter()
        .filter(|h| is_numeric_column(table, h))
        .map(String::as_str)
        .collect()
}

pub fn categorical_columns(table: &Table) -> Vec<&str> {
    table
        .headers
        .iter()
        .filter(|h| is_categorical_column(table, h))
        .map(String::as_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Row;

    #[test]
    fn test_parse_number_decimal_forms() {
        assert_eq!(parse_number("42"), Some(42.0));
        assert_eq!(parse_number("  -3.5 "), Some(-3.5));
        assert_eq!(parse_number("+7"), Some(7.0));
        assert_eq!(parse_number(".5"), Some(0.5));
        assert_eq!(parse_number("5."), Some(5.0));
        assert_eq!(parse_number("1e3"), Some(1000.0));
        assert_eq!(parse_number("2.5E-1"), Some(0.25));
    }

    #[test]
    fn test_parse_number_radix_forms() {
        assert_eq!(parse_number("0x1F"), Some(31.0));
        assert_eq!(parse_number("0o17"), Some(15.0));
        assert_eq!(parse_number("0b101"), Some(5.0));
    }

    #[test]
    fn test_parse_number_rejects() {
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("   "), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("12abc"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("1e400"), None);
        assert_eq!(parse_number("1,000"), None);
        assert_eq!(parse_number("-0x10"), None);
    }

    #[test]
    fn test_parse_decimal_is_strict() {
        assert_eq!(parse_decimal("12.5"), Some(12.5));
        assert_eq!(parse_decimal("0x10"), None);
        assert_eq!(parse_decimal(""), None);
    }

    #[test]
    fn test_to_number() {
        assert_eq!(to_number(&CellValue::Number(3.0)), Some(3.0));
        assert_eq!(to_number(&CellValue::Number(f64::NAN)), None);
        assert_eq!(to_number(&CellValue::Bool(true)), Some(1.0));
        assert_eq!(to_number(&CellValue::Bool(false)), Some(0.0));
        assert_eq!(to_number(&CellValue::Null), None);
        assert_eq!(to_number(&CellValue::text(" 8 ")), Some(8.0));
    }

    #[test]
    fn test_missing_and_blank() {
        assert!(is_missing(None));
        assert!(is_missing(Some(&CellValue::Null)));
        assert!(!is_missing(Some(&CellValue::text(""))));
        assert!(is_blank(Some(&CellValue::text("  "))));
        assert!(!is_blank(Some(&CellValue::Number(0.0))));
    }

    #[test]
    fn test_display_string() {
        assert_eq!(display_string(&CellValue::Number(10.0)), "10");
        assert_eq!(display_string(&CellValue::Number(1.5)), "1.5");
        assert_eq!(display_string(&CellValue::Number(-0.0)), "0");
        assert_eq!(display_string(&CellValue::Bool(true)), "true");
        assert_eq!(display_string(&CellValue::text("A")), "A");
    }

    fn column_table(values: Vec<CellValue>) -> Table {
        let rows = values.into_iter().map(|v| Row::new().with("col", v)).collect();
        Table::new(vec!["col".to_string()], rows)
    }

    #[test]
    fn test_numeric_column_ignores_blanks() {
        let mut values: Vec<CellValue> = (1..=8).map(|n| CellValue::Number(n as f64)).collect();
        values.push(CellValue::text(""));
        values.push(CellValue::Null);
        let table = column_table(values);
        assert!(is_numeric_column(&table, "col"));
    }

    #[test]
    fn test_numeric_column_below_threshold() {
        let mut values: Vec<CellValue> = (1..=6).map(|n| CellValue::text(n.to_string())).collect();
        values.extend(["a", "b", "c", "d"].iter().map(|s| CellValue::text(*s)));
        let table = column_table(values);
        assert!(!is_numeric_column(&table, "col"));
        assert!(is_categorical_column(&table, "col"));
    }

    #[test]
    fn test_numeric_column_samples_first_rows_only() {
        let mut values: Vec<CellValue> = (0..10).map(|n| CellValue::Number(n as f64)).collect();
        values.extend((0..20).map(|_| CellValue::text("x")));
        let table = column_table(values);
        assert!(is_numeric_column(&table, "col"));
    }

    #[test]
    fn test_empty_or_unknown_column_is_categorical() {
        let table = column_table(vec![CellValue::Null, CellValue::text("")]);
        assert!(!is_numeric_column(&table, "col"));
        assert!(!is_numeric_column(&table, "nope"));
    }

    #[test]
    fn test_column_lists() {
        let table = Table::new(
            vec!["city".to_string(), "sales".to_string()],
            vec![
                Row::new().with("city", "A").with("sales", 1.0),
                Row::new().with("city", "B").with("sales", "2"),
            ],
        );
        assert_eq!(numeric_columns(&table), vec!["sales"]);
        assert_eq!(categorical_columns(&table), vec!["city"]);
    }
}
