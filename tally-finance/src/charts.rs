//! Render analysis summaries to SVG charts.
//!
//! Empty summaries still produce a file: a titled placeholder reading "No data".

use plotters::coord::Shift;
use plotters::prelude::*;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use tally_core::{Error, Result};

use crate::analysis::Analysis;

const SIZE: (u32, u32) = (1000, 600);
const FONT: &str = "sans-serif";

/// Output locations for the three charts
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPaths {
    pub by_category: PathBuf,
    pub monthly: PathBuf,
    pub share: PathBuf,
}

impl ChartPaths {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            by_category: dir.join("chart_spend_by_category.svg"),
            monthly: dir.join("chart_monthly_spend.svg"),
            share: dir.join("chart_category_share.svg"),
        }
    }

    pub fn all(&self) -> [&Path; 3] {
        [&self.by_category, &self.monthly, &self.share]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartOptions {
    /// Bars in the by-category chart
    pub top_categories: usize,
    /// Slices in the share chart before folding into "Other"
    pub share_top: usize,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            top_categories: 12,
            share_top: 8,
        }
    }
}

pub fn render_all(analysis: &Analysis, paths: &ChartPaths, options: &ChartOptions) -> Result<()> {
    render_spend_by_category(analysis, &paths.by_category, options.top_categories)?;
    render_monthly_spend(analysis, &paths.monthly)?;
    render_category_share(analysis, &paths.share, options.share_top)?;
    Ok(())
}

pub fn render_spend_by_category(analysis: &Analysis, path: &Path, top: usize) -> Result<()> {
    let (labels, values): (Vec<String>, Vec<f64>) = analysis
        .by_category
        .iter()
        .take(top)
        .map(|(c, t)| (c.to_string(), *t))
        .unzip();
    render_bars(
        path,
        "Top Categories by Total Spending",
        "Spending",
        &labels,
        &values,
        |v| format!("{v:.2}"),
    )
}

pub fn render_category_share(analysis: &Analysis, path: &Path, top: usize) -> Result<()> {
    let (labels, values): (Vec<String>, Vec<f64>) = analysis
        .top_shares(top)
        .into_iter()
        .map(|(label, share)| (label, share * 100.0))
        .unzip();
    render_bars(
        path,
        "Spending Share by Category",
        "Share (%)",
        &labels,
        &values,
        |v| format!("{v:.1}%"),
    )
}

pub fn render_monthly_spend(analysis: &Analysis, path: &Path) -> Result<()> {
    let title = "Monthly Spending Trend";
    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;
    if analysis.by_month.is_empty() {
        return placeholder(&root, title);
    }

    let labels: Vec<String> = analysis.by_month.iter().map(|(m, _)| m.to_string()).collect();
    let values: Vec<f64> = analysis.by_month.iter().map(|(_, t)| *t).collect();
    let n = values.len();

    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 24))
        .margin(16)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d((0..n).into_segmented(), 0.0..y_max(&values))
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_label_formatter(&|v| segment_label(&labels, v))
        .x_desc("Month")
        .y_desc("Spending")
        .draw()
        .map_err(chart_err)?;

    chart
        .draw_series(LineSeries::new(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| (SegmentValue::CenterOf(i), *v)),
            &BLUE,
        ))
        .map_err(chart_err)?;
    chart
        .draw_series(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| Circle::new((SegmentValue::CenterOf(i), *v), 4, BLUE.filled())),
        )
        .map_err(chart_err)?;

    root.present().map_err(chart_err)?;
    Ok(())
}

fn render_bars(
    path: &Path,
    title: &str,
    y_desc: &str,
    labels: &[String],
    values: &[f64],
    value_label: impl Fn(f64) -> String,
) -> Result<()> {
    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;
    if values.is_empty() {
        return placeholder(&root, title);
    }
    let n = values.len();

    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 24))
        .margin(16)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d((0..n).into_segmented(), 0.0..y_max(values))
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_label_formatter(&|v| segment_label(labels, v))
        .y_desc(y_desc)
        .draw()
        .map_err(chart_err)?;

    chart
        .draw_series(values.iter().enumerate().map(|(i, v)| {
            let mut bar = Rectangle::new(
                [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), *v)],
                BLUE.mix(0.6).filled(),
            );
            bar.set_margin(0, 0, 8, 8);
            bar
        }))
        .map_err(chart_err)?;

    chart
        .draw_series(values.iter().enumerate().map(|(i, v)| {
            Text::new(
                value_label(*v),
                (SegmentValue::CenterOf(i), *v),
                (FONT, 12).into_font(),
            )
        }))
        .map_err(chart_err)?;

    root.present().map_err(chart_err)?;
    Ok(())
}

fn placeholder(root: &DrawingArea<SVGBackend<'_>, Shift>, title: &str) -> Result<()> {
    let area = root.titled(title, (FONT, 24)).map_err(chart_err)?;
    let (w, h) = area.dim_in_pixel();
    area.draw(&Text::new(
        "No data",
        (w as i32 / 2 - 40, h as i32 / 2),
        (FONT, 20).into_font(),
    ))
    .map_err(chart_err)?;
    root.present().map_err(chart_err)?;
    Ok(())
}

fn segment_label(labels: &[String], v: &SegmentValue<usize>) -> String {
    match v {
        SegmentValue::CenterOf(i) => labels.get(*i).cloned().unwrap_or_default(),
        _ => String::new(),
    }
}

/// Headroom above the tallest value so value labels fit
fn y_max(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(0.0, f64::max);
    if max > 0.0 { max * 1.15 } else { 1.0 }
}

fn chart_err(e: impl Display) -> Error {
    Error::Chart(e.to_string())
}
