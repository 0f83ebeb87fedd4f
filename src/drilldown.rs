use anyhow::{anyhow, Result};
use log::debug;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use crate::aggregate::Aggregation;
use crate::coerce::cell_number;
use crate::data::{CellValue, Row};

pub const DEFAULT_TOP_N: usize = 10;

/// Name of the derived field attached to projected rows.
pub const NUMERIC_VALUE_FIELD: &str = "numericValue";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
    /// Keep the order rows were grouped in.
    #[default]
    #[serde(rename = "none")]
    Original,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
            SortOrder::Original => "none",
        })
    }
}

impl FromStr for SortOrder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Ascending),
            "desc" | "descending" => Ok(SortOrder::Descending),
            "none" | "" => Ok(SortOrder::Original),
            other => Err(anyhow!("Unknown sort order '{}' (expected asc, desc or none)", other)),
        }
    }
}

/// Presentation controls for the detail view of one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrillDownConfig {
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default = "default_top_n", deserialize_with = "deserialize_top_n")]
    pub top_n: NonZeroUsize,
    #[serde(default)]
    pub show_filters: bool,
}

impl Default for DrillDownConfig {
    fn default() -> Self {
        Self {
            sort_order: SortOrder::default(),
            top_n: default_top_n(),
            show_filters: false,
        }
    }
}

fn default_top_n() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_TOP_N).unwrap_or(NonZeroUsize::MIN)
}

/// Parse user input for `topN`; anything that is not a positive integer
/// falls back to [`DEFAULT_TOP_N`].
pub fn parse_top_n(raw: &str) -> NonZeroUsize {
    raw.trim()
        .parse::<usize>()
        .ok()
        .and_then(NonZeroUsize::new)
        .unwrap_or_else(default_top_n)
}

fn deserialize_top_n<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<NonZeroUsize, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .and_then(|n| NonZeroUsize::new(n as usize))
            .unwrap_or_else(default_top_n),
        serde_json::Value::String(s) => parse_top_n(&s),
        _ => default_top_n(),
    })
}

/// A member row projected with its coerced y-value.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailRow {
    pub row: Row,
    /// Coerced y-value, or 0 when the cell does not coerce.
    pub numeric_value: f64,
}

impl DetailRow {
    /// The row including the derived field, for display.
    pub fn to_display_row(&self) -> Row {
        let mut row = self.row.clone();
        row.insert(NUMERIC_VALUE_FIELD, CellValue::Number(self.numeric_value));
        row
    }
}

/// Detail rows behind `category`, sorted and truncated per `config`.
///
/// Unknown categories give an empty result. Group statistics are never
/// touched, and the aggregation method has no influence on the output.
pub fn drill_down(aggregation: &Aggregation, category: &str, config: &DrillDownConfig) -> Vec<DetailRow> {
    let Some(group) = aggregation.group(category) else {
        return Vec::new();
    };

    let y_axis = aggregation.y_axis();
    let mut detail: Vec<DetailRow> = group
        .records
        .iter()
        .map(|row| DetailRow {
            numeric_value: cell_number(row.get(y_axis)).unwrap_or(0.0),
            row: row.clone(),
        })
        .collect();

    // sort_by is stable: ties keep record order
    match config.sort_order {
        SortOrder::Ascending => detail.sort_by(|a, b| a.numeric_value.total_cmp(&b.numeric_value)),
        SortOrder::Descending => detail.sort_by(|a, b| b.numeric_value.total_cmp(&a.numeric_value)),
        SortOrder::Original => {}
    }

    detail.truncate(config.top_n.get());
    detail
}

/// The currently drilled-into category, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    selected: Option<String>,
}

impl Selection {
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    /// Select `category`, or collapse if it is already selected.
    ///
    /// Categories without a backing group are not selectable and leave the
    /// selection untouched. Returns whether anything changed.
    pub fn toggle(&mut self, aggregation: &Aggregation, category: &str) -> bool {
        let selectable = aggregation
            .group(category)
            .is_some_and(|g| !g.records.is_empty());
        if !selectable {
            debug!("category '{}' has no records; selection unchanged", category);
            return false;
        }

        if self.selected.as_deref() == Some(category) {
            debug!("collapsed drill-down for '{}'", category);
            self.selected = None;
        } else {
            debug!("drill-down selected '{}'", category);
            self.selected = Some(category.to_string());
        }
        true
    }
}
