use anyhow::{Context, Result};
use image::ImageEncoder;
use log::info;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::f64::consts::PI;
use std::ops::Range;

use crate::series::{CategoryPoint, ChartSeries, ChartType};
use crate::{OutputFormat, RenderOptions};

const GRID_COLOR: RGBColor = RGBColor(200, 200, 200);

/// Largest bitmap rendered in memory, in pixels.
const MAX_IMAGE_PIXELS: usize = 100_000_000;

/// Renders one chart series to PNG or SVG bytes.
pub struct Canvas {
    width: u32,
    height: u32,
    format: OutputFormat,
    color: RGBColor,
    title: Option<String>,
}

impl Canvas {
    pub fn new(options: &RenderOptions, title: Option<String>) -> Self {
        Self {
            width: options.width,
            height: options.height,
            format: options.format.clone(),
            color: parse_color(&options.color),
            title,
        }
    }

    /// Draw `series` as `chart` and encode it in the configured format.
    pub fn render(&self, chart: ChartType, series: &ChartSeries) -> Result<Vec<u8>> {
        if series.is_empty() {
            anyhow::bail!("No valid data to plot");
        }

        let bytes = match self.format {
            OutputFormat::Png => {
                let size = (self.width as usize)
                    .checked_mul(self.height as usize)
                    .filter(|px| (1..=MAX_IMAGE_PIXELS).contains(px))
                    .and_then(|px| px.checked_mul(3))
                    .with_context(|| format!("Invalid image size {}x{}", self.width, self.height))?;
                let mut buffer = vec![0u8; size];
                {
                    let root = BitMapBackend::with_buffer(&mut buffer, (self.width, self.height))
                        .into_drawing_area();
                    self.draw(&root, chart, series)?;
                    root.present().context("Failed to present drawing")?;
                }
                encode_png(&buffer, self.width, self.height)?
            }
            OutputFormat::Svg => {
                let mut svg = String::new();
                {
                    let root = SVGBackend::with_string(&mut svg, (self.width, self.height))
                        .into_drawing_area();
                    self.draw(&root, chart, series)?;
                    root.present().context("Failed to present drawing")?;
                }
                svg.into_bytes()
            }
        };

        info!("rendered {} chart with {} points ({} bytes)", chart, series.len(), bytes.len());
        Ok(bytes)
    }

    fn caption(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }

    fn draw<DB: DrawingBackend>(
        &self,
        root: &DrawingArea<DB, Shift>,
        chart: ChartType,
        series: &ChartSeries,
    ) -> Result<()>
    where
        DB::ErrorType: 'static,
    {
        root.fill(&WHITE).context("Failed to fill background")?;

        match series {
            ChartSeries::Scatter(points) => {
                let points: Vec<(f64, f64)> = points.iter().map(|p| (p.x, p.y)).collect();
                self.draw_scatter(root, &points)
            }
            ChartSeries::Categorical(points) => match chart {
                ChartType::Line => self.draw_line(root, points, false),
                ChartType::Area => self.draw_line(root, points, true),
                ChartType::Pie => self.draw_pie(root, points),
                ChartType::Radar => self.draw_radar(root, points),
                ChartType::Bar | ChartType::Scatter => self.draw_bars(root, points),
            },
        }
    }

    fn draw_bars<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>, points: &[CategoryPoint]) -> Result<()>
    where
        DB::ErrorType: 'static,
    {
        let num_categories = points.len();
        let y_range = padded_range(points.iter().map(|p| p.value).chain(std::iter::once(0.0)));

        let mut chart = ChartBuilder::on(root)
            .margin(10)
            .caption(self.caption(), ("sans-serif", 20))
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(0.0..(num_categories as f64), y_range)
            .context("Failed to build chart")?;

        chart
            .configure_mesh()
            .x_labels(num_categories)
            .x_label_formatter(&|x| category_label(points, *x))
            .draw()
            .context("Failed to draw mesh")?;

        let bar_width = 0.8;
        chart
            .draw_series(points.iter().enumerate().map(|(idx, p)| {
                let x_center = idx as f64 + 0.5;
                Rectangle::new(
                    [(x_center - bar_width / 2.0, 0.0), (x_center + bar_width / 2.0, p.value)],
                    self.color.filled(),
                )
            }))
            .context("Failed to draw bars")?;

        Ok(())
    }

    fn draw_line<DB: DrawingBackend>(
        &self,
        root: &DrawingArea<DB, Shift>,
        points: &[CategoryPoint],
        fill: bool,
    ) -> Result<()>
    where
        DB::ErrorType: 'static,
    {
        let num_categories = points.len();
        let y_range = padded_range(points.iter().map(|p| p.value).chain(std::iter::once(0.0)));

        let mut chart = ChartBuilder::on(root)
            .margin(10)
            .caption(self.caption(), ("sans-serif", 20))
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(0.0..(num_categories as f64), y_range)
            .context("Failed to build chart")?;

        chart
            .configure_mesh()
            .x_labels(num_categories)
            .x_label_formatter(&|x| category_label(points, *x))
            .draw()
            .context("Failed to draw mesh")?;

        let coords: Vec<(f64, f64)> = points
            .iter()
            .enumerate()
            .map(|(idx, p)| (idx as f64 + 0.5, p.value))
            .collect();

        if fill {
            chart
                .draw_series(
                    AreaSeries::new(coords.clone(), 0.0, self.color.mix(0.3).filled())
                        .border_style(self.color.stroke_width(2)),
                )
                .context("Failed to draw area series")?;
        } else {
            chart
                .draw_series(LineSeries::new(coords.clone(), self.color.stroke_width(2)))
                .context("Failed to draw line series")?;
        }

        chart
            .draw_series(coords.iter().map(|&(x, y)| Circle::new((x, y), 3, self.color.filled())))
            .context("Failed to draw line markers")?;

        Ok(())
    }

    fn draw_scatter<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>, points: &[(f64, f64)]) -> Result<()>
    where
        DB::ErrorType: 'static,
    {
        let x_range = padded_range(points.iter().map(|p| p.0));
        let y_range = padded_range(points.iter().map(|p| p.1));

        let mut chart = ChartBuilder::on(root)
            .margin(10)
            .caption(self.caption(), ("sans-serif", 20))
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(x_range, y_range)
            .context("Failed to build chart")?;

        chart.configure_mesh().draw().context("Failed to draw mesh")?;

        chart
            .draw_series(points.iter().map(|&(x, y)| Circle::new((x, y), 4, self.color.filled())))
            .context("Failed to draw point series")?;

        Ok(())
    }

    /// Slices for positive values only; the first slice starts at 12 o'clock.
    fn draw_pie<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>, points: &[CategoryPoint]) -> Result<()>
    where
        DB::ErrorType: 'static,
    {
        let area = root
            .titled(self.caption(), ("sans-serif", 20))
            .context("Failed to draw title")?;
        let (w, h) = area.dim_in_pixel();
        let center = (w as i32 / 2, h as i32 / 2);
        let radius = w.min(h) as f64 * 0.35;

        let total: f64 = points.iter().map(|p| p.value).filter(|v| *v > 0.0).sum();
        if total <= 0.0 {
            anyhow::bail!("Pie chart needs at least one positive value");
        }

        let mut start = -PI / 2.0;
        for (idx, point) in points.iter().enumerate().filter(|(_, p)| p.value > 0.0) {
            let sweep = point.value / total * 2.0 * PI;
            // one vertex per ~2 degrees of arc
            let steps = ((sweep / (PI / 90.0)).ceil() as usize).max(1);

            let mut outline = vec![center];
            outline.extend((0..=steps).map(|s| polar(center, radius, start + sweep * s as f64 / steps as f64)));
            area.draw(&Polygon::new(outline, Palette99::pick(idx).filled()))
                .context("Failed to draw pie slice")?;

            let label_at = polar(center, radius * 1.15, start + sweep / 2.0);
            area.draw(&Text::new(point.name.clone(), label_at, ("sans-serif", 14.0).into_font()))
                .context("Failed to draw pie label")?;

            start += sweep;
        }

        Ok(())
    }

    /// One spoke per category, scaled to the largest value; negatives sit at the center.
    fn draw_radar<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>, points: &[CategoryPoint]) -> Result<()>
    where
        DB::ErrorType: 'static,
    {
        let area = root
            .titled(self.caption(), ("sans-serif", 20))
            .context("Failed to draw title")?;
        let (w, h) = area.dim_in_pixel();
        let center = (w as i32 / 2, h as i32 / 2);
        let radius = w.min(h) as f64 * 0.38;

        let n = points.len();
        let angle = |i: usize| -PI / 2.0 + 2.0 * PI * i as f64 / n as f64;
        let max = points.iter().map(|p| p.value).fold(0.0, f64::max);
        let scale = if max > 0.0 { max } else { 1.0 };

        for ring in 1..=4 {
            let r = radius * ring as f64 / 4.0;
            area.draw(&PathElement::new(closed((0..n).map(|i| polar(center, r, angle(i))).collect()), GRID_COLOR.stroke_width(1)))
                .context("Failed to draw radar grid")?;
        }

        for (i, point) in points.iter().enumerate() {
            let tip = polar(center, radius, angle(i));
            area.draw(&PathElement::new(vec![center, tip], GRID_COLOR.stroke_width(1)))
                .context("Failed to draw radar spoke")?;
            let label_at = polar(center, radius * 1.12, angle(i));
            area.draw(&Text::new(point.name.clone(), label_at, ("sans-serif", 14.0).into_font()))
                .context("Failed to draw radar label")?;
        }

        let shape: Vec<(i32, i32)> = points
            .iter()
            .enumerate()
            .map(|(i, p)| polar(center, radius * p.value.max(0.0) / scale, angle(i)))
            .collect();
        area.draw(&Polygon::new(shape.clone(), self.color.mix(0.3).filled()))
            .context("Failed to draw radar area")?;
        area.draw(&PathElement::new(closed(shape), self.color.stroke_width(2)))
            .context("Failed to draw radar outline")?;

        Ok(())
    }
}

fn category_label(points: &[CategoryPoint], x: f64) -> String {
    points
        .get(x as usize)
        .map(|p| p.name.clone())
        .unwrap_or_default()
}

fn polar(center: (i32, i32), radius: f64, angle: f64) -> (i32, i32) {
    (
        center.0 + (radius * angle.cos()).round() as i32,
        center.1 + (radius * angle.sin()).round() as i32,
    )
}

fn closed(mut path: Vec<(i32, i32)>) -> Vec<(i32, i32)> {
    if let Some(&first) = path.first() {
        path.push(first);
    }
    path
}

/// Data range padded by 5%, or by 1 when the data is a single value.
fn padded_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !min.is_finite() || !max.is_finite() {
        return 0.0..1.0;
    }
    if min == max {
        (min - 1.0)..(max + 1.0)
    } else {
        let padding = (max - min) * 0.05;
        (min - padding)..(max + padding)
    }
}

fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let mut png_bytes = Vec::new();
    image::codecs::png::PngEncoder::new(&mut png_bytes)
        .write_image(buffer, width, height, image::ColorType::Rgb8)
        .context("Failed to encode PNG")?;
    Ok(png_bytes)
}

/// Parse a named or `#rrggbb` color.
fn parse_color(color_str: &Option<String>) -> RGBColor {
    match color_str.as_deref() {
        Some("red") => RED,
        Some("green") => GREEN,
        Some("blue") => BLUE,
        Some("black") => BLACK,
        Some("yellow") => YELLOW,
        Some("cyan") => CYAN,
        Some("magenta") => MAGENTA,
        Some(hex) if hex.len() == 7 && hex.starts_with('#') => {
            let channel = |i: usize| hex.get(i..i + 2).and_then(|c| u8::from_str_radix(c, 16).ok());
            match (channel(1), channel(3), channel(5)) {
                (Some(r), Some(g), Some(b)) => RGBColor(r, g, b),
                _ => BLUE,
            }
        }
        _ => BLUE, // default
    }
}
