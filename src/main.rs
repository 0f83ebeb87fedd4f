use anyhow::{bail, Context, Result};
use chartdrill::aggregate::{aggregate_table, Aggregation, AggregationMethod};
use chartdrill::coerce::{display_string, is_numeric_column};
use chartdrill::data::{CellValue, Row, Table};
use chartdrill::drilldown::{drill_down, parse_top_n, SortOrder, NUMERIC_VALUE_FIELD};
use chartdrill::export::{export_records, format_records, ExportFormat};
use chartdrill::graph::Canvas;
use chartdrill::loader::load_source;
use chartdrill::series::{available_chart_types, build_series, is_chart_available, ChartType};
use chartdrill::{OutputFormat, Settings};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "chartdrill")]
#[command(about = "Aggregate tabular data by category, chart it and drill into the records", long_about = None)]
struct Cli {
    /// JSON settings file (render, method, chart, drillDown)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct AxisArgs {
    /// Input file (csv, txt, xlsx, xls, json), or '-' for CSV on stdin
    file: String,
    /// Category column (x-axis)
    #[arg(long)]
    x: String,
    /// Value column (y-axis)
    #[arg(long)]
    y: String,
    /// average, sum, count, min or max
    #[arg(long)]
    method: Option<AggregationMethod>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List columns and whether each one looks numeric
    Columns {
        /// Input file, or '-' for CSV on stdin
        file: String,
    },
    /// Print the per-category summary table
    Summary {
        #[command(flatten)]
        axes: AxisArgs,
        /// Print JSON instead of an aligned table
        #[arg(long)]
        json: bool,
    },
    /// Render a chart to a PNG or SVG file
    Render {
        #[command(flatten)]
        axes: AxisArgs,
        /// bar, line, area, pie, scatter or radar
        #[arg(long)]
        chart: Option<ChartType>,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        #[arg(long)]
        title: Option<String>,
    },
    /// Show the records behind one category
    Drill {
        #[command(flatten)]
        axes: AxisArgs,
        #[arg(long)]
        category: String,
        /// asc, desc or none
        #[arg(long)]
        sort: Option<SortOrder>,
        /// Maximum rows to show (non-positive values fall back to 10)
        #[arg(long, allow_hyphen_values = true)]
        top: Option<String>,
        #[arg(long)]
        show_filters: bool,
    },
    /// Export the summary table, or one category's records, as CSV or JSON
    Export {
        #[command(flatten)]
        axes: AxisArgs,
        /// Export this category's records instead of the summary
        #[arg(long)]
        category: Option<String>,
        /// csv or json (defaults to the output extension, then csv)
        #[arg(long)]
        format: Option<ExportFormat>,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => Settings::from_path(path)?,
        None => Settings::default(),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Command::Columns { file } => {
            let table = load_source(&file)?;
            let rows: Vec<Vec<String>> = table
                .headers
                .iter()
                .map(|h| {
                    let kind = if is_numeric_column(&table, h) { "numeric" } else { "categorical" };
                    vec![h.clone(), kind.to_string()]
                })
                .collect();
            write_table(&mut out, &["column", "kind"], &rows)?;
        }
        Command::Summary { axes, json } => {
            let (_, aggregation) = analyze(&axes, &settings)?;
            if aggregation.is_empty() {
                writeln!(out, "No valid data for '{}' by '{}'", axes.y, axes.x)?;
            } else if json {
                if let Some(payload) = format_records(&summary_with_value(&aggregation), ExportFormat::Json)? {
                    writeln!(out, "{}", payload)?;
                }
            } else {
                let records = summary_with_value(&aggregation);
                let headers: Vec<&str> = records[0].keys().collect();
                write_table(&mut out, &headers, &cells(&records, &headers))?;
            }
        }
        Command::Render { axes, chart, output, width, height, title } => {
            let (table, aggregation) = analyze(&axes, &settings)?;
            let chart = chart.unwrap_or(settings.chart);
            if !is_chart_available(chart, &table, &axes.x, &axes.y) {
                let offered: Vec<String> = available_chart_types(&table, &axes.x, &axes.y)
                    .iter()
                    .map(|c| c.to_string())
                    .collect();
                bail!(
                    "Chart type '{}' needs numeric columns; available for '{}'/'{}': {}",
                    chart,
                    axes.x,
                    axes.y,
                    offered.join(", ")
                );
            }
            if aggregation.is_empty() {
                bail!("No valid data for '{}' by '{}'", axes.y, axes.x);
            }

            let mut render = settings.render.clone();
            render.width = width.unwrap_or(render.width);
            render.height = height.unwrap_or(render.height);
            if output.extension().is_some() {
                render.format = OutputFormat::from_path(&output);
            }
            let title = title.unwrap_or_else(|| format!("{} of {} by {}", aggregation.method(), axes.y, axes.x));

            let bytes = Canvas::new(&render, Some(title))
                .render(chart, &build_series(&aggregation, chart))
                .context("Failed to render chart")?;
            std::fs::write(&output, bytes).with_context(|| format!("Failed to write {}", output.display()))?;
            info!("wrote {}", output.display());
        }
        Command::Drill { axes, category, sort, top, show_filters } => {
            let (_, aggregation) = analyze(&axes, &settings)?;
            let mut config = settings.drill_down.clone();
            config.sort_order = sort.unwrap_or(config.sort_order);
            if let Some(raw) = top {
                config.top_n = parse_top_n(&raw);
            }
            config.show_filters |= show_filters;

            let detail = drill_down(&aggregation, &category, &config);
            if detail.is_empty() {
                writeln!(out, "No records for category '{}'", category)?;
            } else {
                if config.show_filters {
                    let total = aggregation.group(&category).map(|g| g.count).unwrap_or(0);
                    writeln!(
                        out,
                        "sort: {}, top: {}, showing {} of {}",
                        config.sort_order,
                        config.top_n,
                        detail.len(),
                        total
                    )?;
                }
                let records: Vec<Row> = detail.iter().map(|d| d.to_display_row()).collect();
                let mut headers: Vec<&str> = records[0].keys().filter(|k| *k != NUMERIC_VALUE_FIELD).collect();
                headers.push(NUMERIC_VALUE_FIELD);
                write_table(&mut out, &headers, &cells(&records, &headers))?;
            }
        }
        Command::Export { axes, category, format, output } => {
            let (_, aggregation) = analyze(&axes, &settings)?;
            let format = format.unwrap_or_else(|| {
                output
                    .extension()
                    .and_then(|e| e.to_str())
                    .and_then(|e| e.parse().ok())
                    .unwrap_or_default()
            });
            let records: Vec<Row> = match &category {
                Some(category) => drill_down(&aggregation, category, &settings.drill_down)
                    .into_iter()
                    .map(|d| d.row)
                    .collect(),
                None => aggregation.summary_rows(),
            };
            match export_records(&records, format, &output)? {
                Some(path) => writeln!(out, "Exported {} records to {}", records.len(), path.display())?,
                None => writeln!(out, "Nothing to export")?,
            }
        }
    }

    out.flush().context("Failed to flush stdout")?;
    Ok(())
}

/// Load the input and run one aggregation pass over the chosen axes.
fn analyze(axes: &AxisArgs, settings: &Settings) -> Result<(Table, Aggregation)> {
    let table = load_source(&axes.file).with_context(|| format!("Failed to load '{}'", axes.file))?;
    for column in [&axes.x, &axes.y] {
        if !table.has_column(column) {
            bail!("Column '{}' not found (available: {})", column, table.headers.join(", "));
        }
    }
    let method = axes.method.unwrap_or(settings.method);
    let aggregation = aggregate_table(&table, &axes.x, &axes.y, method);
    Ok((table, aggregation))
}

fn summary_with_value(aggregation: &Aggregation) -> Vec<Row> {
    let method = aggregation.method();
    aggregation
        .summary_rows()
        .into_iter()
        .zip(aggregation.groups())
        .map(|(mut row, group)| {
            row.insert("value", group.value(method));
            row
        })
        .collect()
}

fn cells(records: &[Row], headers: &[&str]) -> Vec<Vec<String>> {
    records
        .iter()
        .map(|r| {
            headers
                .iter()
                .map(|h| match r.get(h) {
                    None | Some(CellValue::Null) => String::new(),
                    Some(v) => display_string(v),
                })
                .collect()
        })
        .collect()
}

fn write_table(out: &mut impl Write, headers: &[&str], rows: &[Vec<String>]) -> Result<()> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let line = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    writeln!(out, "{}", line(headers.to_vec()))?;
    for row in rows {
        writeln!(out, "{}", line(row.iter().map(String::as_str).collect()))?;
    }
    Ok(())
}
