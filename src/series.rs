// Chart series adapter: aggregation output -> per-chart-type series

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::aggregate::{Aggregation, ScatterPoint};
use crate::coerce::is_numeric_column;
use crate::data::Table;

/// Pie charts show at most this many groups (in emission order).
pub const PIE_SERIES_CAP: usize = 10;
/// Radar charts show at most this many groups.
pub const RADAR_SERIES_CAP: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    #[default]
    Bar,
    Line,
    Area,
    Pie,
    Scatter,
    Radar,
}

impl ChartType {
    pub const ALL: [ChartType; 6] = [
        ChartType::Bar,
        ChartType::Line,
        ChartType::Area,
        ChartType::Pie,
        ChartType::Scatter,
        ChartType::Radar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Bar => "bar",
            ChartType::Line => "line",
            ChartType::Area => "area",
            ChartType::Pie => "pie",
            ChartType::Scatter => "scatter",
            ChartType::Radar => "radar",
        }
    }

    /// Everything except scatter plots one value per category.
    pub fn is_categorical(&self) -> bool {
        !matches!(self, ChartType::Scatter)
    }

    pub fn series_cap(&self) -> Option<usize> {
        match self {
            ChartType::Pie => Some(PIE_SERIES_CAP),
            ChartType::Radar => Some(RADAR_SERIES_CAP),
            _ => None,
        }
    }

    pub fn requires_numeric_y(&self) -> bool {
        matches!(self, ChartType::Scatter | ChartType::Radar)
    }

    pub fn requires_numeric_x(&self) -> bool {
        matches!(self, ChartType::Scatter)
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        ChartType::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow!("Unknown chart type '{}' (expected bar, line, area, pie, scatter or radar)", s))
    }
}

/// One labelled value of a categorical series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryPoint {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartSeries<'a> {
    Categorical(Vec<CategoryPoint>),
    /// Raw points, each carrying its originating row for tooltips.
    Scatter(&'a [ScatterPoint]),
}

impl ChartSeries<'_> {
    pub fn len(&self) -> usize {
        match self {
            ChartSeries::Categorical(points) => points.len(),
            ChartSeries::Scatter(points) => points.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shape the aggregation for `chart`. Groups past the pie/radar cap are
/// dropped, not merged.
pub fn build_series(aggregation: &Aggregation, chart: ChartType) -> ChartSeries<'_> {
    if !chart.is_categorical() {
        return ChartSeries::Scatter(aggregation.scatter_points());
    }

    let method = aggregation.method();
    let cap = chart.series_cap().unwrap_or(usize::MAX);
    ChartSeries::Categorical(
        aggregation
            .groups()
            .iter()
            .take(cap)
            .map(|g| CategoryPoint {
                name: g.category.clone(),
                value: g.value(method),
            })
            .collect(),
    )
}

/// Whether `chart` is offered for the chosen axis columns.
pub fn is_chart_available(chart: ChartType, table: &Table, x_axis: &str, y_axis: &str) -> bool {
    (!chart.requires_numeric_y() || is_numeric_column(table, y_axis))
        && (!chart.requires_numeric_x() || is_numeric_column(table, x_axis))
}

pub fn available_chart_types(table: &Table, x_axis: &str, y_axis: &str) -> Vec<ChartType> {
    ChartType::ALL
        .into_iter()
        .filter(|c| is_chart_available(*c, table, x_axis, y_axis))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, AggregationMethod};
    use crate::data::Row;

    fn many_groups(n: usize) -> Aggregation {
        let rows: Vec<Row> = (0..n)
            .map(|i| Row::new().with("k", format!("g{}", i)).with("v", i as f64))
            .collect();
        aggregate(&rows, "k", "v", AggregationMethod::Sum)
    }

    #[test]
    fn test_categorical_series_follows_groups() {
        let agg = many_groups(12);
        let ChartSeries::Categorical(points) = build_series(&agg, ChartType::Bar) else {
            panic!("expected categorical series");
        };
        assert_eq!(points.len(), 12);
        assert_eq!(points[3], CategoryPoint { name: "g3".to_string(), value: 3.0 });
    }

    #[test]
    fn test_pie_and_radar_caps() {
        let agg = many_groups(12);
        assert_eq!(build_series(&agg, ChartType::Pie).len(), PIE_SERIES_CAP);
        assert_eq!(build_series(&agg, ChartType::Radar).len(), RADAR_SERIES_CAP);
        assert_eq!(build_series(&agg, ChartType::Line).len(), 12);

        let ChartSeries::Categorical(points) = build_series(&agg, ChartType::Radar) else {
            panic!("expected categorical series");
        };
        assert_eq!(points.last().map(|p| p.name.as_str()), Some("g6"));
    }

    #[test]
    fn test_series_tracks_method() {
        let rows = vec![
            Row::new().with("k", "a").with("v", 2.0),
            Row::new().with("k", "a").with("v", 4.0),
        ];
        let agg = aggregate(&rows, "k", "v", AggregationMethod::Max);
        assert_eq!(
            build_series(&agg, ChartType::Bar),
            ChartSeries::Categorical(vec![CategoryPoint { name: "a".to_string(), value: 4.0 }])
        );
        let agg = agg.with_method(AggregationMethod::Count);
        assert_eq!(
            build_series(&agg, ChartType::Bar),
            ChartSeries::Categorical(vec![CategoryPoint { name: "a".to_string(), value: 2.0 }])
        );
    }

    #[test]
    fn test_scatter_series_is_ungrouped() {
        let rows = vec![
            Row::new().with("x", 1.0).with("y", 2.0),
            Row::new().with("x", 1.0).with("y", 3.0),
        ];
        let agg = aggregate(&rows, "x", "y", AggregationMethod::Sum);
        match build_series(&agg, ChartType::Scatter) {
            ChartSeries::Scatter(points) => {
                assert_eq!(points.len(), 2);
                assert_eq!(points[1].row, rows[1]);
            }
            other => panic!("unexpected series {:?}", other),
        }
    }

    #[test]
    fn test_chart_availability() {
        let table = Table::new(
            vec!["city".to_string(), "size".to_string(), "sales".to_string()],
            vec![
                Row::new().with("city", "A").with("size", 1.0).with("sales", 10.0),
                Row::new().with("city", "B").with("size", 2.0).with("sales", 20.0),
            ],
        );
        let for_city = available_chart_types(&table, "city", "sales");
        assert!(for_city.contains(&ChartType::Radar));
        assert!(!for_city.contains(&ChartType::Scatter));
        assert!(is_chart_available(ChartType::Scatter, &table, "size", "sales"));
        assert!(!is_chart_available(ChartType::Radar, &table, "sales", "city"));
        assert!(is_chart_available(ChartType::Bar, &table, "sales", "city"));
    }

    #[test]
    fn test_chart_type_from_str() {
        assert_eq!("PIE".parse::<ChartType>().unwrap(), ChartType::Pie);
        assert!("donut".parse::<ChartType>().is_err());
    }
}
