//! Seasonal regression forecaster.
//!
//! Demand is regressed on a linear trend, weekly and yearly Fourier terms and
//! the declared covariates. Prediction intervals come from the in-sample
//! residual spread and widen with the distance from the last observation.

use super::traits::{ensure_finite, validate_request, Forecaster};
use crate::core::{Covariate, PointForecast, RegressorSet, TimeSeriesDataset};
use crate::error::{ForecastError, Result};
use crate::utils::{fit_linear, sample_std, z_score, Column, LinearFit};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const WEEKLY_PERIOD: f64 = 7.0;
const YEARLY_PERIOD: f64 = 365.25;

/// Configuration for [`SeasonalRegressionModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalRegressionConfig {
    pub name: String,
    /// Minimum number of observations to fit.
    pub min_history: usize,
    /// Number of weekly Fourier pairs (at most 3).
    pub weekly_order: usize,
    /// Number of yearly Fourier pairs.
    pub yearly_order: usize,
    /// Yearly terms are only fitted once the history spans this many days.
    pub yearly_min_span_days: usize,
    /// Interval growth per horizon step; half-width is `z * sigma * sqrt(1 + growth * h)`.
    pub interval_growth: f64,
    /// Ridge penalty on the standardized design.
    pub ridge: f64,
}

impl Default for SeasonalRegressionConfig {
    fn default() -> Self {
        Self {
            name: "seasonal_regression".to_string(),
            min_history: 14,
            weekly_order: 3,
            yearly_order: 6,
            yearly_min_span_days: 365,
            interval_growth: 0.1,
            ridge: 1e-8,
        }
    }
}

/// Additive decomposition of a seasonal regression forecast.
///
/// `trend + weekly + yearly + regressors == mean` for every horizon day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalComponents {
    pub dates: Vec<NaiveDate>,
    /// Intercept plus the linear trend.
    pub trend: Vec<f64>,
    pub weekly: Vec<f64>,
    /// All zeros when the history is too short for yearly terms.
    pub yearly: Vec<f64>,
    pub regressors: Vec<f64>,
    pub mean: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

/// Trend + Fourier seasonality + covariate regression.
///
/// # Example
///
/// ```
/// use demandcast::core::{GapPolicy, MarketConditions, Observation, RegressorSet, SeriesKey, TimeSeriesDataset};
/// use demandcast::models::{Forecaster, SeasonalRegressionModel};
/// use chrono::{Duration, NaiveDate};
///
/// let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let history = (0..28).map(|i| {
///     Observation::new(start + Duration::days(i), 20.0 + (i % 7) as f64, MarketConditions::new(3.5))
/// });
/// let dataset = TimeSeriesDataset::new(SeriesKey::new("SKU-1", "S1"), history.collect(), GapPolicy::Preserve).unwrap();
///
/// let model = SeasonalRegressionModel::new();
/// let forecast = model.forecast(&dataset, 7, &RegressorSet::none()).unwrap();
/// assert_eq!(forecast.horizon(), 7);
/// ```
#[derive(Debug, Clone)]
pub struct SeasonalRegressionModel {
    config: SeasonalRegressionConfig,
    confidence_level: f64,
    z: f64,
}

struct FittedSeasonal {
    fit: LinearFit,
    sigma: f64,
    covariates: Vec<Covariate>,
    yearly: bool,
    last_offset: f64,
}

impl SeasonalRegressionModel {
    /// Create a model with default settings at a 95% confidence level.
    pub fn new() -> Self {
        Self {
            config: SeasonalRegressionConfig::default(),
            confidence_level: 0.95,
            z: 1.959963984540054,
        }
    }

    pub fn from_config(config: SeasonalRegressionConfig, confidence_level: f64) -> Result<Self> {
        if config.min_history < 2 {
            return Err(ForecastError::invalid("min_history", config.min_history));
        }
        if config.weekly_order > 3 {
            return Err(ForecastError::invalid("weekly_order", config.weekly_order));
        }
        if !config.interval_growth.is_finite() || config.interval_growth < 0.0 {
            return Err(ForecastError::invalid(
                "interval_growth",
                config.interval_growth,
            ));
        }
        if !config.ridge.is_finite() || config.ridge < 0.0 {
            return Err(ForecastError::invalid("ridge", config.ridge));
        }
        let z = z_score(confidence_level)?;
        Ok(Self {
            config,
            confidence_level,
            z,
        })
    }

    pub fn with_confidence_level(self, confidence_level: f64) -> Result<Self> {
        Self::from_config(self.config, confidence_level)
    }

    pub fn with_interval_growth(self, growth: f64) -> Result<Self> {
        let config = SeasonalRegressionConfig {
            interval_growth: growth,
            ..self.config
        };
        Self::from_config(config, self.confidence_level)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn config(&self) -> &SeasonalRegressionConfig {
        &self.config
    }

    pub fn confidence_level(&self) -> f64 {
        self.confidence_level
    }

    /// Forecast broken down into trend, seasonal and regressor parts.
    pub fn components(
        &self,
        dataset: &TimeSeriesDataset,
        horizon_days: usize,
        regressors: &RegressorSet,
    ) -> Result<SeasonalComponents> {
        validate_request(self.name(), self.min_history(), dataset, horizon_days)?;
        let fitted = self.fit(dataset, regressors)?;
        let columns = self.future_design(&fitted, dataset, horizon_days, regressors);

        let part = |prefix: &str| -> Result<Vec<f64>> {
            fitted
                .fit
                .partial_predict(&columns, |name| name.starts_with(prefix))
        };
        let trend: Vec<f64> = part("trend")?
            .into_iter()
            .map(|t| t + fitted.fit.intercept)
            .collect();
        let weekly = part("weekly_")?;
        let yearly = part("yearly_")?;
        let covariate_columns: Vec<String> =
            fitted.covariates.iter().flat_map(|c| c.columns()).collect();
        let regressor_part = fitted
            .fit
            .partial_predict(&columns, |name| covariate_columns.iter().any(|c| c == name))?;

        let (mean, lower, upper) = self.bounds(&fitted, fitted.fit.predict(&columns)?)?;
        Ok(SeasonalComponents {
            dates: dataset.future_dates(horizon_days),
            trend,
            weekly,
            yearly,
            regressors: regressor_part,
            mean,
            lower,
            upper,
        })
    }

    fn fit(&self, dataset: &TimeSeriesDataset, regressors: &RegressorSet) -> Result<FittedSeasonal> {
        let covariates = dataset.resolve_regressors(regressors)?;
        let offsets = dataset.day_offsets();
        let last_offset = offsets.last().copied().unwrap_or(0.0);
        let yearly = self.config.yearly_order > 0
            && last_offset + 1.0 >= self.config.yearly_min_span_days as f64;

        let mut columns = self.calendar_design(&offsets, yearly);
        columns.extend(dataset.covariate_columns(&covariates));

        let demand = dataset.demand();
        let fit = fit_linear(&demand, &columns, self.config.ridge).map_err(|e| match e {
            ForecastError::ModelExecution { reason, .. } => {
                ForecastError::model_failure(self.name(), reason)
            }
            other => other,
        })?;

        let fitted_values = fit.predict(&columns)?;
        let residuals: Vec<f64> = demand
            .iter()
            .zip(fitted_values.iter())
            .map(|(y, f)| y - f)
            .collect();
        let sigma = sample_std(&residuals);
        if !sigma.is_finite() {
            return Err(ForecastError::model_failure(
                self.name(),
                "residual spread is not finite",
            ));
        }

        Ok(FittedSeasonal {
            fit,
            sigma,
            covariates,
            yearly,
            last_offset,
        })
    }

    fn calendar_design(&self, offsets: &[f64], yearly: bool) -> Vec<Column> {
        let mut columns = vec![("trend".to_string(), offsets.to_vec())];
        columns.extend(fourier_terms(
            "weekly",
            offsets,
            WEEKLY_PERIOD,
            self.config.weekly_order,
        ));
        if yearly {
            columns.extend(fourier_terms(
                "yearly",
                offsets,
                YEARLY_PERIOD,
                self.config.yearly_order,
            ));
        }
        columns
    }

    fn future_design(
        &self,
        fitted: &FittedSeasonal,
        dataset: &TimeSeriesDataset,
        horizon_days: usize,
        regressors: &RegressorSet,
    ) -> Vec<Column> {
        let offsets: Vec<f64> = (1..=horizon_days)
            .map(|h| fitted.last_offset + h as f64)
            .collect();
        let mut columns = self.calendar_design(&offsets, fitted.yearly);
        columns.extend(dataset.future_covariate_columns(
            &fitted.covariates,
            horizon_days,
            regressors,
        ));
        columns
    }

    fn bounds(
        &self,
        fitted: &FittedSeasonal,
        mean: Vec<f64>,
    ) -> Result<(Vec<f64>, Vec<f64>, Vec<f64>)> {
        ensure_finite(self.name(), "mean", &mean)?;
        let (lower, upper) = mean
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let h = (i + 1) as f64;
                let half = self.z * fitted.sigma * (1.0 + self.config.interval_growth * h).sqrt();
                (m - half, m + half)
            })
            .unzip();
        Ok((mean, lower, upper))
    }
}

impl Default for SeasonalRegressionModel {
    fn default() -> Self {
        Self::new()
    }
}

impl Forecaster for SeasonalRegressionModel {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn min_history(&self) -> usize {
        self.config.min_history
    }

    fn forecast(
        &self,
        dataset: &TimeSeriesDataset,
        horizon_days: usize,
        regressors: &RegressorSet,
    ) -> Result<PointForecast> {
        validate_request(self.name(), self.min_history(), dataset, horizon_days)?;
        let fitted = self.fit(dataset, regressors)?;
        let columns = self.future_design(&fitted, dataset, horizon_days, regressors);
        let (mean, lower, upper) = self.bounds(&fitted, fitted.fit.predict(&columns)?)?;

        let start = dataset.future_dates(1)[0];
        PointForecast::from_series(start, self.confidence_level, &mean, &lower, &upper)
    }
}

/// Sine/cosine pairs `sin(2πkt/P)`, `cos(2πkt/P)` for `k = 1..=order`.
fn fourier_terms(prefix: &str, t: &[f64], period: f64, order: usize) -> Vec<Column> {
    let mut columns = Vec::with_capacity(2 * order);
    for k in 1..=order {
        let freq = 2.0 * PI * k as f64 / period;
        columns.push((
            format!("{prefix}_sin{k}"),
            t.iter().map(|x| (freq * x).sin()).collect(),
        ));
        columns.push((
            format!("{prefix}_cos{k}"),
            t.iter().map(|x| (freq * x).cos()).collect(),
        ));
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GapPolicy, MarketConditions, Observation, SeriesKey};
    use approx::assert_relative_eq;
    use chrono::Duration;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 2).unwrap()
    }

    fn build(demand: impl Fn(i64) -> f64, conditions: impl Fn(i64) -> MarketConditions, n: i64) -> TimeSeriesDataset {
        let observations = (0..n)
            .map(|i| Observation::new(start() + Duration::days(i), demand(i), conditions(i)))
            .collect();
        TimeSeriesDataset::new(SeriesKey::new("P1", "L1"), observations, GapPolicy::Preserve)
            .unwrap()
    }

    fn weekly_series(n: i64) -> TimeSeriesDataset {
        let pattern = [10.0, 12.0, 11.0, 13.0, 15.0, 20.0, 18.0];
        let noise = [0.3, -0.2, 0.1, -0.4, 0.2, 0.0, -0.1, 0.4, -0.3, 0.1, 0.2];
        build(
            |i| pattern[(i % 7) as usize] + noise[(i % 11) as usize],
            |_| MarketConditions::new(5.0),
            n,
        )
    }

    #[test]
    fn test_recovers_weekly_pattern() {
        let ds = weekly_series(56);
        let model = SeasonalRegressionModel::new();
        let fc = model.forecast(&ds, 7, &RegressorSet::none()).unwrap();

        // day 56 is a Monday-aligned repeat of day 0
        assert_relative_eq!(fc.means()[0], 10.0, epsilon = 0.6);
        assert_relative_eq!(fc.means()[5], 20.0, epsilon = 0.6);
    }

    #[test]
    fn test_bounds_ordered_and_widening() {
        let ds = weekly_series(42);
        let fc = SeasonalRegressionModel::new()
            .forecast(&ds, 30, &RegressorSet::none())
            .unwrap();

        for p in fc.points() {
            assert!(p.lower_bound <= p.mean && p.mean <= p.upper_bound);
        }
        let widths = fc.widths();
        for pair in widths.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
        assert!(widths[29] > widths[0]);
    }

    #[test]
    fn test_zero_growth_gives_constant_width() {
        let ds = weekly_series(42);
        let model = SeasonalRegressionModel::new().with_interval_growth(0.0).unwrap();
        let widths = model.forecast(&ds, 10, &RegressorSet::none()).unwrap().widths();
        assert_relative_eq!(widths[0], widths[9], epsilon = 1e-9);
    }

    #[test]
    fn test_constant_demand_has_tight_bounds() {
        let ds = build(|_| 10.0, |_| MarketConditions::new(2.0), 30);
        let fc = SeasonalRegressionModel::new()
            .forecast(&ds, 7, &RegressorSet::none())
            .unwrap();
        for p in fc.points() {
            assert_relative_eq!(p.mean, 10.0, epsilon = 1e-6);
            assert!(p.width() < 1e-4);
        }
    }

    #[test]
    fn test_promotion_regressor_lifts_forecast() {
        let ds = build(
            |i| if i % 5 == 0 { 30.0 } else { 10.0 },
            |i| MarketConditions::new(5.0).with_promotion(i % 5 == 0),
            40,
        );
        let model = SeasonalRegressionModel::new();
        let with_promo = RegressorSet::new(["promotion"])
            .with_scenario(vec![MarketConditions::new(5.0).with_promotion(true)]);
        let fc = model.forecast(&ds, 2, &with_promo).unwrap();

        assert!(fc.means()[0] > 25.0);
        // the second day holds the last observation, which had no promotion
        assert!(fc.means()[1] < 15.0);
    }

    #[test]
    fn test_components_sum_to_mean() {
        let ds = build(
            |i| 10.0 + 0.1 * i as f64 + if i % 3 == 0 { 4.0 } else { 0.0 },
            |i| MarketConditions::new(4.0 + (i % 4) as f64 * 0.5).with_promotion(i % 3 == 0),
            60,
        );
        let regressors = RegressorSet::new(["price", "promotion"]);
        let model = SeasonalRegressionModel::new();
        let parts = model.components(&ds, 5, &regressors).unwrap();
        let fc = model.forecast(&ds, 5, &regressors).unwrap();

        for h in 0..5 {
            let sum = parts.trend[h] + parts.weekly[h] + parts.yearly[h] + parts.regressors[h];
            assert_relative_eq!(sum, parts.mean[h], epsilon = 1e-8);
            assert_relative_eq!(parts.mean[h], fc.means()[h], epsilon = 1e-12);
        }
        assert!(parts.yearly.iter().all(|y| *y == 0.0));
    }

    #[test]
    fn test_yearly_terms_need_a_full_year() {
        let ds = build(
            |i| 50.0 + 10.0 * (2.0 * PI * i as f64 / 365.25).sin(),
            |_| MarketConditions::new(1.0),
            400,
        );
        let parts = SeasonalRegressionModel::new()
            .components(&ds, 3, &RegressorSet::none())
            .unwrap();
        assert!(parts.yearly.iter().any(|y| y.abs() > 1.0));
    }

    #[test]
    fn test_insufficient_history() {
        let ds = weekly_series(10);
        let err = SeasonalRegressionModel::new()
            .forecast(&ds, 7, &RegressorSet::none())
            .unwrap_err();
        assert_eq!(
            err,
            ForecastError::InsufficientHistory {
                model: "seasonal_regression".to_string(),
                needed: 14,
                got: 10,
            }
        );
    }

    #[test]
    fn test_unknown_regressor() {
        let ds = weekly_series(20);
        let err = SeasonalRegressionModel::new()
            .forecast(&ds, 7, &RegressorSet::new(["temperature"]))
            .unwrap_err();
        assert!(matches!(err, ForecastError::UnknownRegressor { .. }));
    }

    #[test]
    fn test_does_not_mutate_dataset() {
        let ds = weekly_series(30);
        let before = ds.clone();
        let _ = SeasonalRegressionModel::new().forecast(&ds, 7, &RegressorSet::new(["price"]));
        assert_eq!(ds, before);
    }

    #[test]
    fn test_config_validation() {
        let bad_growth = SeasonalRegressionConfig {
            interval_growth: -1.0,
            ..Default::default()
        };
        assert!(SeasonalRegressionModel::from_config(bad_growth, 0.95).is_err());

        let bad_order = SeasonalRegressionConfig {
            weekly_order: 4,
            ..Default::default()
        };
        assert!(SeasonalRegressionModel::from_config(bad_order, 0.95).is_err());
    }

    #[test]
    fn test_fourier_terms_shape() {
        let t: Vec<f64> = (0..14).map(|i| i as f64).collect();
        let terms = fourier_terms("weekly", &t, 7.0, 2);
        assert_eq!(terms.len(), 4);
        assert_eq!(terms[0].0, "weekly_sin1");
        assert_eq!(terms[3].0, "weekly_cos2");
        assert_relative_eq!(terms[1].1[7], 1.0, epsilon = 1e-12);
    }
}
