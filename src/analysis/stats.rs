//! Descriptive statistics over plain `f64` slices.
//!
//! Means, extremes and the median come from `statrs`. Quartiles use linear
//! interpolation between closest ranks, the box-plot convention. The paired
//! statistics (Pearson's R and the least-squares line) share one pass over
//! the centered values so that `correlate(xs, xs)` is exactly 1.

use crate::error::{AnalysisError, Result};
use crate::models::{Distribution, LinearFit};
use statrs::statistics::{Data, OrderStatistics, Statistics};

/// Arithmetic mean of a non-empty slice.
pub fn mean(values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        return Err(AnalysisError::DegenerateInput(
            "cannot take the mean of an empty sequence".to_string(),
        ));
    }

    Ok(values.mean())
}

/// Pearson product-moment correlation coefficient between `xs` and `ys`.
///
/// Both sequences must have the same length of at least 2. Returns
/// `DegenerateInput` when either sequence has zero variance, or when the
/// values are too large for the centered sums to stay finite.
pub fn correlate(xs: &[f64], ys: &[f64]) -> Result<f64> {
    let sums = CenteredSums::of(xs, ys)?;

    if sums.sxx == 0.0 || sums.syy == 0.0 {
        return Err(AnalysisError::DegenerateInput(
            "correlation is undefined when a sequence has zero variance".to_string(),
        ));
    }

    // Split the root only when the product overflows; sqrt(sxx * sxx) == sxx
    // keeps correlate(xs, xs) exact.
    let mut denominator = (sums.sxx * sums.syy).sqrt();
    if denominator.is_infinite() {
        denominator = sums.sxx.sqrt() * sums.syy.sqrt();
    }
    if !denominator.is_finite() || !sums.sxy.is_finite() {
        return Err(AnalysisError::DegenerateInput(
            "correlation is undefined for values of this magnitude".to_string(),
        ));
    }

    let r = sums.sxy / denominator;
    if !r.is_finite() {
        return Err(AnalysisError::DegenerateInput(format!(
            "correlation evaluated to {}",
            r
        )));
    }

    Ok(r.clamp(-1.0, 1.0))
}

/// Least-squares straight line through `(xs[i], ys[i])`.
pub fn fit_line(xs: &[f64], ys: &[f64]) -> Result<LinearFit> {
    let sums = CenteredSums::of(xs, ys)?;

    if sums.sxx == 0.0 {
        return Err(AnalysisError::DegenerateInput(
            "cannot fit a line when x has zero variance".to_string(),
        ));
    }

    if !sums.sxx.is_finite() || !sums.sxy.is_finite() {
        return Err(AnalysisError::DegenerateInput(
            "cannot fit a line to values of this magnitude".to_string(),
        ));
    }

    let slope = sums.sxy / sums.sxx;
    let intercept = sums.mean_y - slope * sums.mean_x;
    if !slope.is_finite() || !intercept.is_finite() {
        return Err(AnalysisError::DegenerateInput(format!(
            "line fit evaluated to slope {} and intercept {}",
            slope, intercept
        )));
    }

    Ok(LinearFit { slope, intercept })
}

/// Box-plot summary (min, quartiles, median, max) plus the mean.
pub fn distribution(values: &[f64]) -> Result<Distribution> {
    let mean = mean(values)?;
    let mut data = Data::new(values.to_vec());

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    Ok(Distribution {
        count: values.len(),
        min: Statistics::min(values),
        lower_quartile: linear_quantile(&sorted, 0.25),
        median: data.median(),
        upper_quartile: linear_quantile(&sorted, 0.75),
        max: Statistics::max(values),
        mean,
    })
}

/// Quantile `q` of an ascending, non-empty slice, interpolating linearly
/// between the two closest ranks at position `(n - 1) * q`.
fn linear_quantile(sorted: &[f64], q: f64) -> f64 {
    let position = (sorted.len() - 1) as f64 * q;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;

    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

struct CenteredSums {
    mean_x: f64,
    mean_y: f64,
    sxx: f64,
    syy: f64,
    sxy: f64,
}

impl CenteredSums {
    fn of(xs: &[f64], ys: &[f64]) -> Result<Self> {
        if xs.len() != ys.len() || xs.len() < 2 {
            return Err(AnalysisError::InsufficientData {
                xs: xs.len(),
                ys: ys.len(),
            });
        }

        let mean_x = xs.mean();
        let mean_y = ys.mean();

        let (sxx, syy, sxy) = xs.iter().zip(ys).fold(
            (0.0, 0.0, 0.0),
            |(sxx, syy, sxy), (x, y)| {
                let dx = x - mean_x;
                let dy = y - mean_y;
                (sxx + dx * dx, syy + dy * dy, sxy + dx * dy)
            },
        );

        Ok(Self {
            mean_x,
            mean_y,
            sxx,
            syy,
            sxy,
        })
    }
}
