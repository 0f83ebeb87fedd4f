use anyhow::{anyhow, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::coerce::{cell_number, display_string, is_missing};
use crate::data::{Row, Table};

/// Which per-group statistic is exposed as the group's headline value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMethod {
    #[default]
    #[serde(alias = "avg", alias = "mean")]
    Average,
    Sum,
    Count,
    Min,
    Max,
}

impl AggregationMethod {
    pub const ALL: [AggregationMethod; 5] = [
        AggregationMethod::Average,
        AggregationMethod::Sum,
        AggregationMethod::Count,
        AggregationMethod::Min,
        AggregationMethod::Max,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationMethod::Average => "average",
            AggregationMethod::Sum => "sum",
            AggregationMethod::Count => "count",
            AggregationMethod::Min => "min",
            AggregationMethod::Max => "max",
        }
    }
}

impl fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregationMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "average" | "avg" | "mean" => Ok(AggregationMethod::Average),
            "sum" | "total" => Ok(AggregationMethod::Sum),
            "count" => Ok(AggregationMethod::Count),
            "min" => Ok(AggregationMethod::Min),
            "max" => Ok(AggregationMethod::Max),
            other => Err(anyhow!(
                "Unknown aggregation method '{}' (expected average, sum, count, min or max)",
                other
            )),
        }
    }
}

/// Round half toward positive infinity to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor + 0.5).floor() / factor
}

/// Statistics and member rows for one distinct category.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub category: String,
    pub sum: f64,
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub records: Vec<Row>,
}

impl Group {
    fn new(category: String, y: f64, row: Row) -> Self {
        Self {
            category,
            sum: y,
            count: 1,
            min: y,
            max: y,
            records: vec![row],
        }
    }

    fn push(&mut self, y: f64, row: Row) {
        self.sum += y;
        self.count += 1;
        self.min = self.min.min(y);
        self.max = self.max.max(y);
        self.records.push(row);
    }

    /// Unrounded arithmetic mean.
    pub fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }

    /// The headline value under `method`. Average is rounded to 2 decimals.
    pub fn value(&self, method: AggregationMethod) -> f64 {
        select_value(self, method)
    }
}

/// Project a group onto the statistic named by `method`.
pub fn select_value(group: &Group, method: AggregationMethod) -> f64 {
    match method {
        AggregationMethod::Average => round_to(group.mean(), 2),
        AggregationMethod::Sum => group.sum,
        AggregationMethod::Count => group.count as f64,
        AggregationMethod::Min => group.min,
        AggregationMethod::Max => group.max,
    }
}

/// A row whose x and y cells are both numeric.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
    pub row: Row,
}

/// Output of one aggregation pass.
#[derive(Debug, Clone)]
pub struct Aggregation {
    x_axis: String,
    y_axis: String,
    method: AggregationMethod,
    groups: Vec<Group>,
    index: HashMap<String, usize>,
    scatter_points: Vec<ScatterPoint>,
    skipped: usize,
}

impl Aggregation {
    pub fn x_axis(&self) -> &str {
        &self.x_axis
    }

    pub fn y_axis(&self) -> &str {
        &self.y_axis
    }

    pub fn method(&self) -> AggregationMethod {
        self.method
    }

    /// Groups in first-seen category order.
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn scatter_points(&self) -> &[ScatterPoint] {
        &self.scatter_points
    }

    pub fn group(&self, category: &str) -> Option<&Group> {
        self.index.get(category).map(|&i| &self.groups[i])
    }

    /// Rows that contributed to neither groups nor scatter points.
    pub fn skipped_rows(&self) -> usize {
        self.skipped
    }

    /// True when no row qualified: the "no valid data" state.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.scatter_points.is_empty()
    }

    /// Switch the exposed statistic. Rows are not rescanned.
    pub fn set_method(&mut self, method: AggregationMethod) {
        if self.method != method {
            debug!("aggregation method {} -> {}", self.method, method);
        }
        self.method = method;
    }

    pub fn with_method(mut self, method: AggregationMethod) -> Self {
        self.set_method(method);
        self
    }

    /// `(category, value)` pairs under the current method.
    pub fn values(&self) -> Vec<(&str, f64)> {
        self.groups
            .iter()
            .map(|g| (g.category.as_str(), g.value(self.method)))
            .collect()
    }

    /// Flat summary records: `category, count, total, min, max, average`.
    pub fn summary_rows(&self) -> Vec<Row> {
        self.groups
            .iter()
            .map(|g| {
                Row::new()
                    .with("category", g.category.as_str())
                    .with("count", g.count as f64)
                    .with("total", g.sum)
                    .with("min", g.min)
                    .with("max", g.max)
                    .with("average", round_to(g.mean(), 2))
            })
            .collect()
    }
}

/// Group `rows` by the display string of `x_axis`, tracking sum/count/min/max
/// of the numeric `y_axis` in a single pass. Rows whose x is missing or blank,
/// or whose y is missing or non-numeric, are skipped.
pub fn aggregate(rows: &[Row], x_axis: &str, y_axis: &str, method: AggregationMethod) -> Aggregation {
    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut scatter_points = Vec::new();
    let mut skipped = 0;

    for row in rows {
        let x_raw = row.get(x_axis);
        let y_raw = row.get(y_axis);

        let (Some(x_cell), Some(y_val)) = (x_raw, cell_number(y_raw)) else {
            skipped += 1;
            continue;
        };
        if is_missing(x_raw) {
            skipped += 1;
            continue;
        }
        let key = display_string(x_cell);
        if key.is_empty() {
            skipped += 1;
            continue;
        }

        if let Some(x_num) = cell_number(x_raw) {
            scatter_points.push(ScatterPoint {
                x: x_num,
                y: y_val,
                row: row.clone(),
            });
        }

        match index.get(&key) {
            Some(&i) => groups[i].push(y_val, row.clone()),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(Group::new(key, y_val, row.clone()));
            }
        }
    }

    debug!(
        "aggregated {} rows by '{}'/'{}': {} groups, {} scatter points, {} skipped",
        rows.len(),
        x_axis,
        y_axis,
        groups.len(),
        scatter_points.len(),
        skipped
    );

    Aggregation {
        x_axis: x_axis.to_string(),
        y_axis: y_axis.to_string(),
        method,
        groups,
        index,
        scatter_points,
        skipped,
    }
}

pub fn aggregate_table(table: &Table, x_axis: &str, y_axis: &str, method: AggregationMethod) -> Aggregation {
    aggregate(&table.rows, x_axis, y_axis, method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CellValue;

    fn city_rows() -> Vec<Row> {
        vec![
            Row::new().with("city", "A").with("sales", 10.0),
            Row::new().with("city", "B").with("sales", 20.0),
            Row::new().with("city", "A").with("sales", 30.0),
        ]
    }

    #[test]
    fn test_average_scenario() {
        let agg = aggregate(&city_rows(), "city", "sales", AggregationMethod::Average);
        assert_eq!(agg.groups().len(), 2);

        let a = agg.group("A").unwrap();
        assert_eq!((a.sum, a.count, a.min, a.max), (40.0, 2, 10.0, 30.0));
        assert_eq!(a.value(agg.method()), 20.0);

        let b = agg.group("B").unwrap();
        assert_eq!((b.sum, b.count, b.min, b.max), (20.0, 1, 20.0, 20.0));
        assert_eq!(b.value(agg.method()), 20.0);

        assert!(agg.scatter_points().is_empty());
    }

    #[test]
    fn test_count_scenario() {
        let agg = aggregate(&city_rows(), "city", "sales", AggregationMethod::Count);
        assert_eq!(agg.values(), vec![("A", 2.0), ("B", 1.0)]);
    }

    #[test]
    fn test_first_seen_order() {
        let rows = vec![
            Row::new().with("k", "z").with("v", 1.0),
            Row::new().with("k", "a").with("v", 1.0),
            Row::new().with("k", "m").with("v", 1.0),
            Row::new().with("k", "a").with("v", 1.0),
        ];
        let agg = aggregate(&rows, "k", "v", AggregationMethod::Sum);
        let keys: Vec<&str> = agg.groups().iter().map(|g| g.category.as_str()).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_skips_invalid_rows() {
        let rows = vec![
            Row::new().with("city", "A").with("sales", 10.0),
            Row::new().with("city", "A").with("sales", "abc"),
            Row::new().with("city", "").with("sales", 5.0),
            Row::new().with("city", CellValue::Null).with("sales", 5.0),
            Row::new().with("sales", 5.0),
            Row::new().with("city", "B"),
            Row::new().with("city", "B").with("sales", CellValue::Null),
            // numeric x with a bad or missing y feeds neither output
            Row::new().with("city", 3.0).with("sales", "abc"),
            Row::new().with("city", "4").with("sales", "  "),
            Row::new().with("city", 5.0),
        ];
        let agg = aggregate(&rows, "city", "sales", AggregationMethod::Sum);
        assert!(agg.scatter_points().is_empty());
        assert!(agg.group("3").is_none() && agg.group("4").is_none() && agg.group("5").is_none());
        assert_eq!(agg.groups().len(), 1);
        let a = agg.group("A").unwrap();
        assert_eq!(a.count, 1);
        assert_eq!(a.sum, 10.0);
        assert_eq!(a.records.len(), 1);
        assert_eq!(agg.skipped_rows(), 9);
    }

    #[test]
    fn test_empty_input_is_no_data() {
        let agg = aggregate(&[], "city", "sales", AggregationMethod::Average);
        assert!(agg.groups().is_empty());
        assert!(agg.scatter_points().is_empty());
        assert!(agg.is_empty());
    }

    #[test]
    fn test_scatter_points_from_numeric_x() {
        let rows = vec![
            Row::new().with("h", 1.5).with("w", 10.0),
            Row::new().with("h", "2").with("w", "20"),
            Row::new().with("h", "tall").with("w", 30.0),
        ];
        let agg = aggregate(&rows, "h", "w", AggregationMethod::Sum);
        assert_eq!(agg.scatter_points().len(), 2);
        assert_eq!(agg.scatter_points()[1].x, 2.0);
        assert_eq!(agg.scatter_points()[1].y, 20.0);
        assert_eq!(agg.scatter_points()[1].row, rows[1]);
        // every qualifying row still lands in a group
        assert_eq!(agg.groups().len(), 3);
    }

    #[test]
    fn test_numeric_categories_use_display_string() {
        let rows = vec![
            Row::new().with("year", 2020.0).with("v", 1.0),
            Row::new().with("year", "2020").with("v", 2.0),
            Row::new().with("year", true).with("v", 3.0),
        ];
        let agg = aggregate(&rows, "year", "v", AggregationMethod::Sum);
        assert_eq!(agg.group("2020").unwrap().sum, 3.0);
        assert_eq!(agg.group("true").unwrap().sum, 3.0);
    }

    #[test]
    fn test_switching_method_keeps_statistics() {
        let mut agg = aggregate(&city_rows(), "city", "sales", AggregationMethod::Average);
        let before = agg.groups().to_vec();

        for method in AggregationMethod::ALL {
            agg.set_method(method);
            assert_eq!(agg.groups(), before.as_slice());
            for g in agg.groups() {
                let expected = match method {
                    AggregationMethod::Average => round_to(g.sum / g.count as f64, 2),
                    AggregationMethod::Sum => g.sum,
                    AggregationMethod::Count => g.count as f64,
                    AggregationMethod::Min => g.min,
                    AggregationMethod::Max => g.max,
                };
                assert_eq!(g.value(agg.method()), expected);
            }
        }
    }

    #[test]
    fn test_aggregate_is_deterministic() {
        let rows: Vec<Row> = (0..50)
            .map(|i| Row::new().with("k", format!("c{}", i % 7)).with("v", i as f64))
            .collect();
        let first = aggregate(&rows, "k", "v", AggregationMethod::Max);
        let second = aggregate(&rows, "k", "v", AggregationMethod::Max);
        assert_eq!(first.groups(), second.groups());
        assert_eq!(first.scatter_points(), second.scatter_points());
    }

    #[test]
    fn test_statistics_match_members() {
        let rows: Vec<Row> = [3.0, -1.5, 8.25, 0.0, 4.0]
            .iter()
            .map(|v| Row::new().with("k", "g").with("v", *v))
            .collect();
        let agg = aggregate(&rows, "k", "v", AggregationMethod::Average);
        let g = agg.group("g").unwrap();
        assert_eq!(g.sum, 13.75);
        assert_eq!(g.count, 5);
        assert_eq!(g.min, -1.5);
        assert_eq!(g.max, 8.25);
        assert_eq!(g.value(AggregationMethod::Average), 2.75);
    }

    #[test]
    fn test_average_rounds_to_two_places() {
        let rows = vec![
            Row::new().with("k", "g").with("v", 1.0),
            Row::new().with("k", "g").with("v", 1.0),
            Row::new().with("k", "g").with("v", 2.0),
        ];
        let agg = aggregate(&rows, "k", "v", AggregationMethod::Average);
        assert_eq!(agg.values(), vec![("g", 1.33)]);
    }

    #[test]
    fn test_summary_rows() {
        let agg = aggregate(&city_rows(), "city", "sales", AggregationMethod::Sum);
        let summary = agg.summary_rows();
        assert_eq!(summary.len(), 2);
        assert_eq!(
            summary[0].keys().collect::<Vec<_>>(),
            vec!["category", "count", "total", "min", "max", "average"]
        );
        assert_eq!(summary[0].get("total"), Some(&CellValue::Number(40.0)));
        assert_eq!(summary[0].get("average"), Some(&CellValue::Number(20.0)));
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!("avg".parse::<AggregationMethod>().unwrap(), AggregationMethod::Average);
        assert_eq!("MAX".parse::<AggregationMethod>().unwrap(), AggregationMethod::Max);
        assert!("median".parse::<AggregationMethod>().is_err());
    }
}
