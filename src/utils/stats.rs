//! Statistical utility functions.

use crate::error::{ForecastError, Result};
use statrs::distribution::{ContinuousCDF, Normal};

/// Two-sided standard normal critical value for a confidence level.
///
/// # Example
/// ```
/// use demandcast::utils::z_score;
///
/// // 95% confidence level -> z ≈ 1.96
/// let z = z_score(0.95).unwrap();
/// assert!((z - 1.96).abs() < 0.01);
/// ```
pub fn z_score(confidence_level: f64) -> Result<f64> {
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(ForecastError::invalid("confidence_level", confidence_level));
    }
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| ForecastError::invalid("normal distribution", e))?;
    Ok(normal.inverse_cdf(0.5 + confidence_level / 2.0))
}

/// Calculate the mean of a slice (NaN when empty).
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n-1 denominator).
///
/// A single value has zero spread; an empty slice yields NaN.
pub fn sample_std(values: &[f64]) -> f64 {
    match values.len() {
        0 => f64::NAN,
        1 => 0.0,
        n => {
            let m = mean(values);
            let sum_sq: f64 = values.iter().map(|x| (x - m).powi(2)).sum();
            (sum_sq / (n - 1) as f64).sqrt()
        }
    }
}

/// Empirical quantile with linear interpolation between order statistics.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

/// Mean absolute error between two slices (NaN when empty or mismatched).
pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / actual.len() as f64
}
