//! Scatter chart of share price against one ratio, with the least-squares line.

use analysis_core::{AnalysisError, CorrelationResult, FundamentalsTable, QuarterClass, RatioColumn};
use plotters::prelude::*;
use plotters::series::DashedLineSeries;
use std::path::Path;

const CHART_SIZE: (u32, u32) = (1600, 1200);
const FONT: &str = "sans-serif";

/// Everything needed to label and place one chart.
#[derive(Debug, Clone, Copy)]
pub struct ReportRequest<'a> {
    pub company_label: &'a str,
    pub human_title: &'a str,
    pub y_axis_label: &'a str,
    /// Prefix of the console line, e.g. `ROA`.
    pub console_label: &'a str,
    pub output_path: &'a Path,
}

#[derive(Debug, Clone, Copy)]
struct ScatterPoint {
    x: f64,
    y: f64,
    class: QuarterClass,
}

pub fn chart_title(company_label: &str, human_title: &str) -> String {
    format!("{} Share Price vs. {}", company_label, human_title)
}

pub fn format_correlation(correlation: Option<f64>) -> String {
    match correlation {
        Some(r) => format!("{:.5}", r),
        None => "undefined".to_string(),
    }
}

/// Bitmap text has no line breaks, so the two parts are separated by spacing.
pub fn x_axis_label(correlation: Option<f64>) -> String {
    format!("Share Price  Correlation: {}", format_correlation(correlation))
}

pub fn console_line(console_label: &str, correlation: Option<f64>) -> String {
    match correlation {
        Some(r) => format!("{} Correlation: {}", console_label, r),
        None => format!("{} Correlation: undefined", console_label),
    }
}

fn quarter_color(class: QuarterClass) -> RGBColor {
    match class {
        QuarterClass::AnnualFiling => RED,
        QuarterClass::Interim => BLUE,
    }
}

fn render_err<E: std::fmt::Display>(e: E) -> AnalysisError {
    AnalysisError::Render(e.to_string())
}

/// Pad a value range so points do not sit on the chart border.
fn padded_range(min: f64, max: f64) -> std::ops::Range<f64> {
    let span = max - min;
    let pad = if span.abs() < f64::EPSILON {
        (min.abs() * 0.1).max(1.0)
    } else {
        span * 0.05
    };
    (min - pad)..(max + pad)
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

/// Compute correlation and fit, draw the chart, and print the correlation.
///
/// The chart is drawn into a temporary file next to `output_path` and renamed
/// into place only after a successful render.
pub fn render_report(
    table: &FundamentalsTable,
    column: &RatioColumn,
    request: &ReportRequest<'_>,
) -> Result<CorrelationResult, AnalysisError> {
    if column.len() != table.len() {
        return Err(AnalysisError::MisalignedSeries(format!(
            "{}: column '{}' has {} values for {} records",
            request.company_label,
            column.name,
            column.len(),
            table.len()
        )));
    }
    if column.defined_count() == 0 {
        return Err(AnalysisError::InsufficientData(format!(
            "{}: {} is undefined for every quarter",
            request.company_label, request.human_title
        )));
    }

    let prices = table.stock_prices();
    let result = quant_analysis::correlate(&prices, &column.values)?;

    let points: Vec<ScatterPoint> = table
        .records()
        .iter()
        .zip(prices.iter().zip(&column.values))
        .filter_map(|(record, (x, y))| match (x, y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some(ScatterPoint {
                x: *x,
                y: *y,
                class: record
                    .quarter_class
                    .unwrap_or_else(|| QuarterClass::from_period_id(&record.period_id)),
            }),
            _ => None,
        })
        .collect();

    let dir = request
        .output_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let staged = tempfile::Builder::new()
        .prefix(".ratio-report-")
        .suffix(".png")
        .tempfile_in(dir)?;

    draw_chart(staged.path(), &points, &result, request)?;
    staged
        .persist(request.output_path)
        .map_err(|e| AnalysisError::Io(e.error))?;

    tracing::debug!(
        path = %request.output_path.display(),
        points = points.len(),
        "chart written"
    );
    println!("{}", console_line(request.console_label, result.correlation));

    Ok(result)
}

fn draw_chart(
    path: &Path,
    points: &[ScatterPoint],
    result: &CorrelationResult,
    request: &ReportRequest<'_>,
) -> Result<(), AnalysisError> {
    let (x_min, x_max) = min_max(points.iter().map(|p| p.x));
    let line = [
        (x_min, result.slope * x_min + result.intercept),
        (x_max, result.slope * x_max + result.intercept),
    ];
    let (y_min, y_max) = min_max(points.iter().map(|p| p.y).chain(line.iter().map(|p| p.1)));

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(chart_title(request.company_label, request.human_title), (FONT, 36))
        .margin(30)
        .x_label_area_size(90)
        .y_label_area_size(110)
        .build_cartesian_2d(padded_range(x_min, x_max), padded_range(y_min, y_max))
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .x_desc(x_axis_label(result.correlation))
        .y_desc(request.y_axis_label)
        .axis_desc_style((FONT, 24))
        .label_style((FONT, 18))
        .draw()
        .map_err(render_err)?;

    for class in [QuarterClass::Interim, QuarterClass::AnnualFiling] {
        let color = quarter_color(class);
        chart
            .draw_series(
                points
                    .iter()
                    .filter(|p| p.class == class)
                    .map(|p| Circle::new((p.x, p.y), 6, color.filled())),
            )
            .map_err(render_err)?
            .label(class.to_label())
            .legend(move |(x, y)| Circle::new((x, y), 6, color.filled()));
    }

    chart
        .draw_series(DashedLineSeries::new(line, 12, 8, RED.stroke_width(3)))
        .map_err(render_err)?
        .label("Line-of-Best-Fit")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 24, y)], RED.stroke_width(3)));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.85))
        .border_style(BLACK)
        .label_font((FONT, 20))
        .draw()
        .map_err(render_err)?;

    root.present().map_err(render_err)?;
    Ok(())
}
