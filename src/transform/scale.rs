//! Z-score scaling for model inputs.

/// Fitted z-score parameters.
///
/// Constant inputs get a unit scale so transforms stay finite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Standardizer {
    pub center: f64,
    pub scale: f64,
}

impl Standardizer {
    /// Fit on a sample using the sample standard deviation (n-1).
    pub fn fit(series: &[f64]) -> Self {
        if series.is_empty() {
            return Self {
                center: 0.0,
                scale: 1.0,
            };
        }

        let n = series.len() as f64;
        let mean = series.iter().sum::<f64>() / n;
        let variance = if series.len() > 1 {
            series.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)
        } else {
            0.0
        };
        let std = variance.sqrt();

        Self {
            center: mean,
            scale: if std < 1e-10 { 1.0 } else { std },
        }
    }

    pub fn transform_value(&self, x: f64) -> f64 {
        (x - self.center) / self.scale
    }

    pub fn inverse_value(&self, z: f64) -> f64 {
        z * self.scale + self.center
    }

    pub fn transform(&self, data: &[f64]) -> Vec<f64> {
        data.iter().map(|&x| self.transform_value(x)).collect()
    }
}

/// Standardize data to zero mean and unit variance.
pub fn standardize(series: &[f64]) -> (Vec<f64>, Standardizer) {
    let scaler = Standardizer::fit(series);
    (scaler.transform(series), scaler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn standardize_basic() {
        let (data, scaler) = standardize(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_relative_eq!(scaler.center, 3.0, epsilon = 1e-10);
        assert_relative_eq!(scaler.scale, 2.5_f64.sqrt(), epsilon = 1e-10);
        let mean: f64 = data.iter().sum::<f64>() / data.len() as f64;
        assert_relative_eq!(mean, 0.0, epsilon = 1e-10);
    }

    #[test]
    fn constant_series_gets_unit_scale() {
        let (data, scaler) = standardize(&[10.0; 6]);
        assert_eq!(scaler.scale, 1.0);
        assert!(data.iter().all(|&z| z == 0.0));
    }

    #[test]
    fn inverse_recovers_original() {
        let scaler = Standardizer::fit(&[3.0, 7.0, 11.0]);
        for x in [3.0, 7.0, 11.0, 42.0] {
            assert_relative_eq!(
                scaler.inverse_value(scaler.transform_value(x)),
                x,
                epsilon = 1e-10
            );
        }
    }

    #[test]
    fn empty_series() {
        let (data, scaler) = standardize(&[]);
        assert!(data.is_empty());
        assert_eq!(scaler.scale, 1.0);
    }
}
