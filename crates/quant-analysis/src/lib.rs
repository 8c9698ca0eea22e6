//! Correlation and least-squares fitting between a ratio series and share price.
//!
//! Both entry points accept `Option<f64>` series and use pairwise deletion:
//! a position contributes only when both sides are defined.

use analysis_core::{AnalysisError, CorrelationResult};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Closed-form `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
    pub observations: usize,
}

impl LineFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Collect the positions where both series are defined and finite.
pub fn complete_pairs(x: &[Option<f64>], y: &[Option<f64>]) -> (Vec<f64>, Vec<f64>) {
    x.iter()
        .zip(y.iter())
        .filter_map(|(a, b)| match (a, b) {
            (Some(a), Some(b)) if a.is_finite() && b.is_finite() => Some((*a, *b)),
            _ => None,
        })
        .unzip()
}

/// Sample variance is treated as zero below this, scaled by the series magnitude.
fn has_zero_variance(data: &[f64]) -> bool {
    let mean = data.iter().mean();
    let variance = data.iter().variance();
    !variance.is_finite() || variance <= f64::EPSILON * (1.0 + mean * mean)
}

/// Pearson product-moment correlation over fully-defined slices of equal length.
/// Returns `None` for fewer than two points or a zero-variance side.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    if has_zero_variance(x) || has_zero_variance(y) {
        return None;
    }

    let covariance = x.iter().covariance(y.iter());
    let sd_x = x.iter().std_dev();
    let sd_y = y.iter().std_dev();
    let r = covariance / (sd_x * sd_y);
    if r.is_finite() {
        Some(r.clamp(-1.0, 1.0))
    } else {
        None
    }
}

/// Pearson correlation ignoring positions where either value is undefined.
/// Series of different lengths have no defined correlation.
pub fn correlation(x: &[Option<f64>], y: &[Option<f64>]) -> Option<f64> {
    if x.len() != y.len() {
        return None;
    }
    let (xs, ys) = complete_pairs(x, y);
    pearson(&xs, &ys)
}

/// Ordinary least squares via the normal equations.
pub fn fit_line(x: &[Option<f64>], y: &[Option<f64>]) -> Result<LineFit, AnalysisError> {
    if x.len() != y.len() {
        return Err(AnalysisError::MisalignedSeries(format!(
            "cannot fit {} x values against {} y values",
            x.len(),
            y.len()
        )));
    }
    let (xs, ys) = complete_pairs(x, y);
    let n = xs.len();
    if n < 2 {
        return Err(AnalysisError::InsufficientData(format!(
            "need at least 2 complete pairs to fit a line, found {}",
            n
        )));
    }
    if has_zero_variance(&xs) {
        return Err(AnalysisError::DegenerateFit(
            "independent variable has zero variance".to_string(),
        ));
    }

    let x_mean = xs.iter().mean();
    let y_mean = ys.iter().mean();

    let mut ss_xy = 0.0;
    let mut ss_xx = 0.0;
    for (xi, yi) in xs.iter().zip(&ys) {
        let dx = xi - x_mean;
        ss_xy += dx * (yi - y_mean);
        ss_xx += dx * dx;
    }

    let slope = ss_xy / ss_xx;
    let intercept = y_mean - slope * x_mean;

    Ok(LineFit {
        slope,
        intercept,
        observations: n,
    })
}

/// Correlation and fitted line in one pass, as consumed by the report emitter.
pub fn correlate(x: &[Option<f64>], y: &[Option<f64>]) -> Result<CorrelationResult, AnalysisError> {
    let fit = fit_line(x, y)?;
    Ok(CorrelationResult {
        correlation: correlation(x, y),
        slope: fit.slope,
        intercept: fit.intercept,
        observations: fit.observations,
    })
}
