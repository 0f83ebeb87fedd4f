use log::info;

use crate::aggregate::{aggregate_table, Aggregation, AggregationMethod};
use crate::coerce::{categorical_columns, numeric_columns};
use crate::data::Table;
use crate::drilldown::{drill_down, DetailRow, DrillDownConfig, Selection};
use crate::series::{available_chart_types, build_series, ChartSeries, ChartType};

/// Interactive session state.
///
/// Holds the inputs the pure functions need and decides what to recompute
/// when one of them changes: a new table or new axes trigger a fresh pass and
/// clear the selection; a new method, chart type or drill-down config reuse
/// the existing pass.
#[derive(Debug, Default)]
pub struct Explorer {
    table: Option<Table>,
    x_axis: Option<String>,
    y_axis: Option<String>,
    method: AggregationMethod,
    chart: ChartType,
    drill_config: DrillDownConfig,
    aggregation: Option<Aggregation>,
    selection: Selection,
}

/// First categorical column for x; first numeric column other than x for y.
pub fn default_axes(table: &Table) -> (Option<String>, Option<String>) {
    let x = categorical_columns(table)
        .first()
        .copied()
        .or_else(|| table.headers.first().map(String::as_str))
        .map(str::to_string);
    let y = numeric_columns(table)
        .into_iter()
        .find(|c| Some(*c) != x.as_deref())
        .map(str::to_string);
    (x, y)
}

impl Explorer {
    pub fn new(method: AggregationMethod, chart: ChartType, drill_config: DrillDownConfig) -> Self {
        Self {
            method,
            chart,
            drill_config,
            ..Self::default()
        }
    }

    /// Replace the table in full. Axes survive when the new table still has
    /// them, otherwise defaults are chosen.
    pub fn load(&mut self, table: Table) {
        let keep = |axis: &Option<String>| axis.as_ref().filter(|a| table.has_column(a)).cloned();
        let (default_x, default_y) = default_axes(&table);
        self.x_axis = keep(&self.x_axis).or(default_x);
        self.y_axis = keep(&self.y_axis).or(default_y);
        info!(
            "table loaded: {} rows, axes {:?}/{:?}",
            table.rows.len(),
            self.x_axis,
            self.y_axis
        );
        self.table = Some(table);
        self.recompute();
    }

    pub fn set_axes(&mut self, x_axis: &str, y_axis: &str) {
        self.x_axis = Some(x_axis.to_string());
        self.y_axis = Some(y_axis.to_string());
        self.recompute();
    }

    /// Only the exposed value changes; rows are not rescanned.
    pub fn set_method(&mut self, method: AggregationMethod) {
        self.method = method;
        if let Some(aggregation) = self.aggregation.as_mut() {
            aggregation.set_method(method);
        }
    }

    pub fn set_chart_type(&mut self, chart: ChartType) {
        self.chart = chart;
    }

    pub fn set_drill_config(&mut self, config: DrillDownConfig) {
        self.drill_config = config;
    }

    fn recompute(&mut self) {
        self.selection.clear();
        self.aggregation = match (&self.table, &self.x_axis, &self.y_axis) {
            (Some(table), Some(x), Some(y)) => Some(aggregate_table(table, x, y, self.method)),
            _ => None,
        };
    }

    /// Toggle the drill-down target. Returns whether the selection changed.
    pub fn toggle_category(&mut self, category: &str) -> bool {
        match &self.aggregation {
            Some(aggregation) => self.selection.toggle(aggregation, category),
            None => false,
        }
    }

    pub fn table(&self) -> Option<&Table> {
        self.table.as_ref()
    }

    pub fn axes(&self) -> (Option<&str>, Option<&str>) {
        (self.x_axis.as_deref(), self.y_axis.as_deref())
    }

    pub fn method(&self) -> AggregationMethod {
        self.method
    }

    pub fn chart_type(&self) -> ChartType {
        self.chart
    }

    pub fn drill_config(&self) -> &DrillDownConfig {
        &self.drill_config
    }

    pub fn aggregation(&self) -> Option<&Aggregation> {
        self.aggregation.as_ref()
    }

    pub fn selected_category(&self) -> Option<&str> {
        self.selection.selected()
    }

    pub fn series(&self) -> Option<ChartSeries<'_>> {
        self.aggregation.as_ref().map(|a| build_series(a, self.chart))
    }

    /// Drill-down rows for the selected category; empty without a selection.
    pub fn detail(&self) -> Vec<DetailRow> {
        match (&self.aggregation, self.selection.selected()) {
            (Some(aggregation), Some(category)) => drill_down(aggregation, category, &self.drill_config),
            _ => Vec::new(),
        }
    }

    pub fn available_chart_types(&self) -> Vec<ChartType> {
        match (&self.table, &self.x_axis, &self.y_axis) {
            (Some(table), Some(x), Some(y)) => available_chart_types(table, x, y),
            _ => Vec::new(),
        }
    }
}
