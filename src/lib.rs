// Library exports for chartdrill

pub mod aggregate;
pub mod coerce;
pub mod csv_reader;
pub mod data;
pub mod drilldown;
pub mod explorer;
pub mod export;
pub mod graph;
pub mod loader;
pub mod series;
pub mod xlsx_reader;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::aggregate::AggregationMethod;
use crate::drilldown::DrillDownConfig;
use crate::series::ChartType;

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[serde(rename = "png")]
    #[default]
    Png,
    #[serde(rename = "svg")]
    Svg,
}

impl OutputFormat {
    /// Guess the format from an output path, defaulting to PNG.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("svg") => OutputFormat::Svg,
            _ => OutputFormat::Png,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderOptions {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default, rename = "type")]
    pub format: OutputFormat,
    #[serde(default)]
    pub color: Option<String>,
}

fn default_width() -> u32 { 800 }
fn default_height() -> u32 { 600 }

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            format: OutputFormat::Png,
            color: None,
        }
    }
}

/// File-backed defaults for the CLI; every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub render: RenderOptions,
    #[serde(default)]
    pub method: AggregationMethod,
    #[serde(default)]
    pub chart: ChartType,
    #[serde(default)]
    pub drill_down: DrillDownConfig,
}

impl Settings {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))
    }
}
