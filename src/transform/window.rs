//! Lag and rolling-window functions over positional series.
//!
//! Positions without enough history are NaN; callers convert to `Option`.

/// Shift a series forward by `k` positions.
///
/// `lag(x, k)[i] == x[i - k]` for `i >= k`, NaN otherwise.
pub fn lag(series: &[f64], k: usize) -> Vec<f64> {
    (0..series.len())
        .map(|i| if i >= k { series[i - k] } else { f64::NAN })
        .collect()
}

/// Trailing mean over `window` positions, including the current one.
///
/// The first `window - 1` positions are NaN.
pub fn rolling_mean(series: &[f64], window: usize) -> Vec<f64> {
    if window == 0 {
        return vec![f64::NAN; series.len()];
    }
    (0..series.len())
        .map(|i| {
            if i + 1 < window {
                f64::NAN
            } else {
                series[i + 1 - window..=i].iter().sum::<f64>() / window as f64
            }
        })
        .collect()
}
