//! Least-squares regression over named design columns.
//!
//! Columns are standardized before solving the normal equations, then the
//! coefficients are mapped back to the original scale. Constant columns,
//! such as a promotion flag that never fired, get a zero coefficient instead
//! of making the system singular.

use crate::error::{ForecastError, Result};
use crate::transform::Standardizer;

/// A named design column.
pub type Column = (String, Vec<f64>);

/// Fitted linear model `y = intercept + sum(coef_i * x_i)`.
#[derive(Debug, Clone)]
pub struct LinearFit {
    /// Intercept term on the original scale.
    pub intercept: f64,
    /// Coefficients on the original scale, aligned with `column_names`.
    pub coefficients: Vec<f64>,
    /// Column names in fit order.
    pub column_names: Vec<String>,
}

impl LinearFit {
    /// Predict from columns matched by name; extra columns are ignored.
    pub fn predict(&self, columns: &[Column]) -> Result<Vec<f64>> {
        let n = self.rows(columns)?;
        let mut predictions = vec![self.intercept; n];
        self.accumulate(columns, &mut predictions, |_| true)?;
        Ok(predictions)
    }

    /// Contribution of the columns selected by `keep`, without the intercept.
    pub fn partial_predict<F>(&self, columns: &[Column], keep: F) -> Result<Vec<f64>>
    where
        F: Fn(&str) -> bool,
    {
        let n = self.rows(columns)?;
        let mut out = vec![0.0; n];
        self.accumulate(columns, &mut out, keep)?;
        Ok(out)
    }

    pub fn num_columns(&self) -> usize {
        self.coefficients.len()
    }

    fn rows(&self, columns: &[Column]) -> Result<usize> {
        match self.column_names.first() {
            Some(first) => Ok(find_column(columns, first)?.len()),
            None => Ok(columns.first().map(|(_, v)| v.len()).unwrap_or(0)),
        }
    }

    fn accumulate<F>(&self, columns: &[Column], out: &mut [f64], keep: F) -> Result<()>
    where
        F: Fn(&str) -> bool,
    {
        for (name, coef) in self.column_names.iter().zip(self.coefficients.iter()) {
            if !keep(name) {
                continue;
            }
            let values = find_column(columns, name)?;
            if values.len() != out.len() {
                return Err(ForecastError::invalid(
                    format!("length of column '{name}'"),
                    values.len(),
                ));
            }
            for (o, x) in out.iter_mut().zip(values.iter()) {
                *o += coef * x;
            }
        }
        Ok(())
    }
}

fn find_column<'a>(columns: &'a [Column], name: &str) -> Result<&'a [f64]> {
    columns
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_slice())
        .ok_or_else(|| ForecastError::invalid("design column", format!("'{name}' missing")))
}

/// Fit a ridge-stabilized least-squares regression.
///
/// # Arguments
/// * `y` - Target values (length n)
/// * `columns` - Named design columns (each length n), intercept implied
/// * `ridge` - Penalty added to the diagonal of the standardized normal equations
pub fn fit_linear(y: &[f64], columns: &[Column], ridge: f64) -> Result<LinearFit> {
    let n = y.len();
    if n == 0 {
        return Err(ForecastError::invalid("regression rows", 0));
    }
    for (name, values) in columns {
        if values.len() != n {
            return Err(ForecastError::invalid(
                format!("length of column '{name}'"),
                values.len(),
            ));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::invalid(
                format!("column '{name}'"),
                "non-finite value",
            ));
        }
    }

    let y_mean = y.iter().sum::<f64>() / n as f64;
    if columns.is_empty() {
        return Ok(LinearFit {
            intercept: y_mean,
            coefficients: vec![],
            column_names: vec![],
        });
    }

    let k = columns.len();
    let scalers: Vec<Standardizer> = columns.iter().map(|(_, v)| Standardizer::fit(v)).collect();
    // A constant column centers to all zeros; only the ridge term keeps its row.
    let z_cols: Vec<Vec<f64>> = columns
        .iter()
        .zip(scalers.iter())
        .map(|((_, v), s)| s.transform(v))
        .collect();

    // Centered target: the intercept is recovered afterwards.
    let yc: Vec<f64> = y.iter().map(|v| v - y_mean).collect();

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for i in 0..k {
        for j in i..k {
            let dot: f64 = z_cols[i].iter().zip(z_cols[j].iter()).map(|(a, b)| a * b).sum();
            xtx[i][j] = dot;
            xtx[j][i] = dot;
        }
        xty[i] = z_cols[i].iter().zip(yc.iter()).map(|(a, b)| a * b).sum();
    }

    for (i, row) in xtx.iter_mut().enumerate() {
        row[i] += ridge.max(1e-8);
    }

    let beta = solve_symmetric(&xtx, &xty).ok_or_else(|| {
        ForecastError::model_failure(
            "least_squares",
            "normal equations are not positive definite",
        )
    })?;

    let coefficients: Vec<f64> = beta
        .iter()
        .zip(scalers.iter())
        .map(|(b, s)| b / s.scale)
        .collect();
    let intercept = y_mean
        - coefficients
            .iter()
            .zip(scalers.iter())
            .map(|(c, s)| c * s.center)
            .sum::<f64>();

    if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
        return Err(ForecastError::model_failure(
            "least_squares",
            "non-finite coefficients",
        ));
    }

    Ok(LinearFit {
        intercept,
        coefficients,
        column_names: columns.iter().map(|(name, _)| name.clone()).collect(),
    })
}

/// Solve a symmetric positive definite system `A x = b` by Cholesky decomposition.
fn solve_symmetric(a: &[Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    if n == 0 || a.len() != n {
        return None;
    }

    // A = L L'
    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }

            if i == j {
                if sum <= 0.0 {
                    return None;
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }

    // L y = b
    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i][j] * y[j];
        }
        y[i] = sum / l[i][i];
    }

    // L' x = y
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in (i + 1)..n {
            sum -= l[j][i] * x[j];
        }
        x[i] = sum / l[i][i];
    }

    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn col(name: &str, values: Vec<f64>) -> Column {
        (name.to_string(), values)
    }

    #[test]
    fn fit_simple_linear() {
        // y = 2 + 3*x
        let y = vec![5.0, 8.0, 11.0, 14.0, 17.0];
        let fit = fit_linear(&y, &[col("x", vec![1.0, 2.0, 3.0, 4.0, 5.0])], 0.0).unwrap();

        assert_relative_eq!(fit.intercept, 2.0, epsilon = 1e-5);
        assert_relative_eq!(fit.coefficients[0], 3.0, epsilon = 1e-5);
    }

    #[test]
    fn fit_multiple_columns() {
        let x1 = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let x2 = vec![0.5, 2.5, 1.0, 3.0, 1.5, 3.5, 2.0, 4.0];
        let y: Vec<f64> = x1
            .iter()
            .zip(x2.iter())
            .map(|(a, b)| 1.0 + 2.0 * a + 3.0 * b)
            .collect();

        let fit = fit_linear(&y, &[col("x1", x1), col("x2", x2)], 0.0).unwrap();

        assert_relative_eq!(fit.intercept, 1.0, epsilon = 1e-4);
        assert_relative_eq!(fit.coefficients[0], 2.0, epsilon = 1e-4);
        assert_relative_eq!(fit.coefficients[1], 3.0, epsilon = 1e-4);
        assert_eq!(fit.column_names, vec!["x1", "x2"]);
    }

    #[test]
    fn constant_column_gets_zero_coefficient() {
        let y = vec![5.0, 8.0, 11.0, 14.0, 17.0];
        let columns = [
            col("x", vec![1.0, 2.0, 3.0, 4.0, 5.0]),
            col("promotion", vec![0.0; 5]),
        ];
        let fit = fit_linear(&y, &columns, 0.0).unwrap();

        assert_relative_eq!(fit.coefficients[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(fit.coefficients[0], 3.0, epsilon = 1e-5);
    }

    #[test]
    fn no_columns_fits_mean() {
        let fit = fit_linear(&[2.0, 4.0, 6.0], &[], 0.0).unwrap();
        assert_relative_eq!(fit.intercept, 4.0, epsilon = 1e-12);
        assert_eq!(fit.num_columns(), 0);
    }

    #[test]
    fn predict_matches_by_name() {
        let y = vec![5.0, 8.0, 11.0, 14.0, 17.0];
        let fit = fit_linear(&y, &[col("x", vec![1.0, 2.0, 3.0, 4.0, 5.0])], 0.0).unwrap();

        let future = [col("unused", vec![0.0; 3]), col("x", vec![6.0, 7.0, 8.0])];
        let predictions = fit.predict(&future).unwrap();
        assert_relative_eq!(predictions[0], 20.0, epsilon = 1e-4);
        assert_relative_eq!(predictions[2], 26.0, epsilon = 1e-4);

        assert!(fit.predict(&[col("wrong", vec![1.0])]).is_err());
    }

    #[test]
    fn partial_predict_selects_columns() {
        let x1 = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let x2 = vec![1.0, 0.0, 1.0, 0.0, 0.0, 1.0];
        let y: Vec<f64> = x1.iter().zip(x2.iter()).map(|(a, b)| 10.0 + a + 5.0 * b).collect();
        let columns = [col("trend", x1), col("promo", x2)];
        let fit = fit_linear(&y, &columns, 0.0).unwrap();

        let promo = fit.partial_predict(&columns, |name| name == "promo").unwrap();
        assert_relative_eq!(promo[0], 5.0, epsilon = 1e-4);
        assert_relative_eq!(promo[1], 0.0, epsilon = 1e-4);
    }

    #[test]
    fn fit_rejects_mismatched_lengths() {
        assert!(fit_linear(&[1.0, 2.0, 3.0], &[col("x", vec![1.0, 2.0])], 0.0).is_err());
        assert!(fit_linear(&[], &[], 0.0).is_err());
    }

    #[test]
    fn fit_rejects_non_finite_columns() {
        let result = fit_linear(&[1.0, 2.0], &[col("x", vec![1.0, f64::NAN])], 0.0);
        assert!(result.is_err());
    }
}
