//! Lookback-window sequence forecaster.
//!
//! A small feed-forward network maps the last `lookback` demand values plus the
//! target day's covariates to next-day demand. Multi-step forecasts are built
//! recursively. The network is a point estimator, so intervals come from the
//! empirical distribution of one-step errors on a held-out tail of the history.

use super::traits::{ensure_finite, validate_request, Forecaster};
use crate::core::{Covariate, PointForecast, RegressorSet, TimeSeriesDataset};
use crate::error::{ForecastError, Result};
use crate::transform::{standardize, Standardizer};
use crate::utils::{quantile, Column};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Configuration for [`SequenceModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    pub name: String,
    /// Number of past observations fed to the network.
    pub lookback: usize,
    /// Trailing observations held out to measure one-step errors.
    pub holdout: usize,
    pub hidden_units: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    /// Seed for weight initialization; equal seeds give equal forecasts.
    pub seed: u64,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            name: "sequence".to_string(),
            lookback: 7,
            holdout: 14,
            hidden_units: 8,
            epochs: 300,
            learning_rate: 0.05,
            seed: 42,
        }
    }
}

/// One-hidden-layer tanh network trained on standardized demand.
///
/// Observations are treated as consecutive steps; datasets with preserved
/// gaps should be filled before use if calendar spacing matters.
#[derive(Debug, Clone)]
pub struct SequenceModel {
    config: SequenceConfig,
    confidence_level: f64,
}

impl SequenceModel {
    pub fn new() -> Self {
        Self {
            config: SequenceConfig::default(),
            confidence_level: 0.95,
        }
    }

    pub fn from_config(config: SequenceConfig, confidence_level: f64) -> Result<Self> {
        if config.lookback == 0 {
            return Err(ForecastError::invalid("lookback", config.lookback));
        }
        if config.holdout < 2 {
            return Err(ForecastError::invalid("holdout", config.holdout));
        }
        if config.hidden_units == 0 {
            return Err(ForecastError::invalid("hidden_units", config.hidden_units));
        }
        if config.epochs == 0 {
            return Err(ForecastError::invalid("epochs", config.epochs));
        }
        if !config.learning_rate.is_finite() || config.learning_rate <= 0.0 {
            return Err(ForecastError::invalid("learning_rate", config.learning_rate));
        }
        if !(confidence_level > 0.0 && confidence_level < 1.0) {
            return Err(ForecastError::invalid("confidence_level", confidence_level));
        }
        Ok(Self {
            config,
            confidence_level,
        })
    }

    pub fn with_confidence_level(self, confidence_level: f64) -> Result<Self> {
        Self::from_config(self.config, confidence_level)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn config(&self) -> &SequenceConfig {
        &self.config
    }

    /// One-step errors (actual - predicted) over the holdout tail.
    ///
    /// The network is trained on the history before the holdout and each
    /// prediction uses the true preceding window.
    pub fn backtest_errors(
        &self,
        dataset: &TimeSeriesDataset,
        regressors: &RegressorSet,
    ) -> Result<Vec<f64>> {
        validate_request(self.name(), self.min_history(), dataset, 1)?;
        let covariates = dataset.resolve_regressors(regressors)?;
        let demand = dataset.demand();
        let columns = dataset.covariate_columns(&covariates);
        let split = demand.len() - self.config.holdout;

        let train_columns: Vec<Column> = columns
            .iter()
            .map(|(name, values)| (name.clone(), values[..split].to_vec()))
            .collect();
        let trained = self.train(&demand[..split], &train_columns)?;

        let lookback = self.config.lookback;
        let errors: Vec<f64> = (split..demand.len())
            .map(|t| {
                let exog: Vec<f64> = columns.iter().map(|(_, v)| v[t]).collect();
                let predicted = trained.predict_next(&demand[t - lookback..t], &exog);
                demand[t] - predicted
            })
            .collect();
        ensure_finite(self.name(), "backtest error", &errors)?;
        Ok(errors)
    }

    fn train(&self, demand: &[f64], columns: &[Column]) -> Result<TrainedSequence> {
        let lookback = self.config.lookback;
        let (z_demand, demand_scaler) = standardize(demand);
        let column_scalers: Vec<Standardizer> =
            columns.iter().map(|(_, v)| Standardizer::fit(v)).collect();
        let z_columns: Vec<Vec<f64>> = columns
            .iter()
            .zip(column_scalers.iter())
            .map(|((_, v), s)| s.transform(v))
            .collect();

        let mut inputs = Vec::with_capacity(demand.len().saturating_sub(lookback));
        let mut targets = Vec::with_capacity(inputs.capacity());
        for t in lookback..demand.len() {
            let mut x = z_demand[t - lookback..t].to_vec();
            x.extend(z_columns.iter().map(|c| c[t]));
            inputs.push(x);
            targets.push(z_demand[t]);
        }
        if inputs.is_empty() {
            return Err(ForecastError::InsufficientHistory {
                model: self.name().to_string(),
                needed: lookback + 1,
                got: demand.len(),
            });
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut network = Mlp::init(lookback + columns.len(), self.config.hidden_units, &mut rng);
        let loss = network.train(&inputs, &targets, self.config.epochs, self.config.learning_rate);
        if !loss.is_finite() || !network.is_finite() {
            return Err(ForecastError::model_failure(
                self.name(),
                format!("training diverged (loss {loss})"),
            ));
        }

        Ok(TrainedSequence {
            network,
            demand_scaler,
            column_scalers,
        })
    }
}

impl Default for SequenceModel {
    fn default() -> Self {
        Self::new()
    }
}

impl Forecaster for SequenceModel {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn min_history(&self) -> usize {
        self.config.lookback + self.config.holdout + 7
    }

    fn forecast(
        &self,
        dataset: &TimeSeriesDataset,
        horizon_days: usize,
        regressors: &RegressorSet,
    ) -> Result<PointForecast> {
        validate_request(self.name(), self.min_history(), dataset, horizon_days)?;
        let covariates: Vec<Covariate> = dataset.resolve_regressors(regressors)?;
        let demand = dataset.demand();
        let columns = dataset.covariate_columns(&covariates);
        let future = dataset.future_covariate_columns(&covariates, horizon_days, regressors);

        let errors = self.backtest_errors(dataset, regressors)?;
        let alpha = 1.0 - self.confidence_level;
        let below = quantile(&errors, alpha / 2.0).min(0.0);
        let above = quantile(&errors, 1.0 - alpha / 2.0).max(0.0);

        let trained = self.train(&demand, &columns)?;
        let lookback = self.config.lookback;
        let mut window = demand[demand.len() - lookback..].to_vec();
        let mut mean = Vec::with_capacity(horizon_days);
        for h in 0..horizon_days {
            let exog: Vec<f64> = future.iter().map(|(_, v)| v[h]).collect();
            let next = trained.predict_next(&window, &exog);
            mean.push(next);
            window.remove(0);
            window.push(next);
        }
        ensure_finite(self.name(), "mean", &mean)?;

        let (lower, upper): (Vec<f64>, Vec<f64>) = mean
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let spread = ((i + 1) as f64).sqrt();
                (m + below * spread, m + above * spread)
            })
            .unzip();

        let start = dataset.future_dates(1)[0];
        PointForecast::from_series(start, self.confidence_level, &mean, &lower, &upper)
    }
}

struct TrainedSequence {
    network: Mlp,
    demand_scaler: Standardizer,
    column_scalers: Vec<Standardizer>,
}

impl TrainedSequence {
    /// Predict the next demand value from raw-scale inputs.
    fn predict_next(&self, window: &[f64], exog: &[f64]) -> f64 {
        let mut x: Vec<f64> = window
            .iter()
            .map(|v| self.demand_scaler.transform_value(*v))
            .collect();
        x.extend(
            exog.iter()
                .zip(self.column_scalers.iter())
                .map(|(v, s)| s.transform_value(*v)),
        );
        self.demand_scaler.inverse_value(self.network.forward(&x).1)
    }
}

#[derive(Debug, Clone)]
struct Mlp {
    w1: Vec<Vec<f64>>,
    b1: Vec<f64>,
    w2: Vec<f64>,
    b2: f64,
}

impl Mlp {
    fn init(inputs: usize, hidden: usize, rng: &mut StdRng) -> Self {
        let a = 1.0 / (inputs as f64).sqrt();
        let b = 1.0 / (hidden as f64).sqrt();
        Self {
            w1: (0..hidden)
                .map(|_| (0..inputs).map(|_| rng.gen_range(-a..a)).collect())
                .collect(),
            b1: vec![0.0; hidden],
            w2: (0..hidden).map(|_| rng.gen_range(-b..b)).collect(),
            b2: 0.0,
        }
    }

    fn forward(&self, x: &[f64]) -> (Vec<f64>, f64) {
        let hidden: Vec<f64> = self
            .w1
            .iter()
            .zip(self.b1.iter())
            .map(|(row, b)| (row.iter().zip(x).map(|(w, v)| w * v).sum::<f64>() + b).tanh())
            .collect();
        let out = hidden.iter().zip(self.w2.iter()).map(|(h, w)| h * w).sum::<f64>() + self.b2;
        (hidden, out)
    }

    /// Full-batch gradient descent on mean squared error; returns the final loss.
    fn train(&mut self, inputs: &[Vec<f64>], targets: &[f64], epochs: usize, lr: f64) -> f64 {
        let n = inputs.len() as f64;
        let mut loss = f64::NAN;
        for _ in 0..epochs {
            let mut gw1 = vec![vec![0.0; self.w1[0].len()]; self.w1.len()];
            let mut gb1 = vec![0.0; self.b1.len()];
            let mut gw2 = vec![0.0; self.w2.len()];
            let mut gb2 = 0.0;
            let mut sse = 0.0;

            for (x, t) in inputs.iter().zip(targets) {
                let (hidden, out) = self.forward(x);
                let err = out - t;
                sse += err * err;
                let g = 2.0 * err / n;
                gb2 += g;
                for j in 0..hidden.len() {
                    gw2[j] += g * hidden[j];
                    let pre = g * self.w2[j] * (1.0 - hidden[j] * hidden[j]);
                    gb1[j] += pre;
                    for (gw, v) in gw1[j].iter_mut().zip(x) {
                        *gw += pre * v;
                    }
                }
            }

            loss = sse / n;
            if !loss.is_finite() {
                return loss;
            }

            for j in 0..self.w2.len() {
                self.w2[j] -= lr * gw2[j];
                self.b1[j] -= lr * gb1[j];
                for (w, g) in self.w1[j].iter_mut().zip(&gw1[j]) {
                    *w -= lr * g;
                }
            }
            self.b2 -= lr * gb2;
        }
        loss
    }

    fn is_finite(&self) -> bool {
        self.b2.is_finite()
            && self.w2.iter().chain(self.b1.iter()).all(|v| v.is_finite())
            && self.w1.iter().flatten().all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GapPolicy, MarketConditions, Observation, SeriesKey};
    use chrono::{Duration, NaiveDate};

    fn build(demand: impl Fn(i64) -> f64, n: i64) -> TimeSeriesDataset {
        let start = NaiveDate::from_ymd_opt(2024, 2, 5).unwrap();
        let observations = (0..n)
            .map(|i| {
                Observation::new(
                    start + Duration::days(i),
                    demand(i),
                    MarketConditions::new(3.0).with_promotion(i % 6 == 0),
                )
            })
            .collect();
        TimeSeriesDataset::new(SeriesKey::new("P9", "L2"), observations, GapPolicy::Preserve)
            .unwrap()
    }

    fn weekly(i: i64) -> f64 {
        [8.0, 9.0, 10.0, 12.0, 14.0, 18.0, 16.0][(i % 7) as usize] + ((i * 7919) % 5) as f64 * 0.2
    }

    #[test]
    fn test_min_history_follows_window_sizes() {
        let model = SequenceModel::new();
        assert_eq!(model.min_history(), 28);

        let config = SequenceConfig {
            lookback: 14,
            holdout: 10,
            ..Default::default()
        };
        let model = SequenceModel::from_config(config, 0.9).unwrap();
        assert_eq!(model.min_history(), 31);
    }

    #[test]
    fn test_forecast_shape_and_bounds() {
        let ds = build(weekly, 70);
        let fc = SequenceModel::new()
            .forecast(&ds, 10, &RegressorSet::none())
            .unwrap();

        assert_eq!(fc.horizon(), 10);
        assert_eq!(fc.start_date(), ds.last_date().unwrap() + Duration::days(1));
        for p in fc.points() {
            assert!(p.lower_bound <= p.mean && p.mean <= p.upper_bound);
        }
        let widths = fc.widths();
        for pair in widths.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }

    #[test]
    fn test_forecast_is_deterministic_for_a_seed() {
        let ds = build(weekly, 60);
        let a = SequenceModel::new().forecast(&ds, 5, &RegressorSet::none()).unwrap();
        let b = SequenceModel::new().forecast(&ds, 5, &RegressorSet::none()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_constant_demand_stays_flat() {
        let ds = build(|_| 10.0, 40);
        let fc = SequenceModel::new()
            .forecast(&ds, 7, &RegressorSet::none())
            .unwrap();
        for m in fc.means() {
            assert!((m - 10.0).abs() < 0.5, "mean drifted to {m}");
        }
    }

    #[test]
    fn test_tracks_level_of_series() {
        let ds = build(weekly, 120);
        let fc = SequenceModel::new()
            .forecast(&ds, 7, &RegressorSet::new(["promotion"]))
            .unwrap();
        let avg = fc.total_demand() / 7.0;
        assert!(avg > 8.0 && avg < 18.0, "average forecast {avg}");
    }

    #[test]
    fn test_backtest_errors_cover_holdout() {
        let ds = build(weekly, 50);
        let errors = SequenceModel::new()
            .backtest_errors(&ds, &RegressorSet::none())
            .unwrap();
        assert_eq!(errors.len(), 14);
    }

    #[test]
    fn test_divergent_training_is_model_failure() {
        let config = SequenceConfig {
            learning_rate: 1e6,
            epochs: 500,
            ..Default::default()
        };
        let model = SequenceModel::from_config(config, 0.95).unwrap();
        let ds = build(weekly, 60);
        let err = model.forecast(&ds, 3, &RegressorSet::none()).unwrap_err();
        assert!(err.is_recoverable_by_ensemble(), "unexpected error {err:?}");
    }

    #[test]
    fn test_insufficient_history() {
        let ds = build(weekly, 20);
        let err = SequenceModel::new()
            .forecast(&ds, 3, &RegressorSet::none())
            .unwrap_err();
        assert!(matches!(
            err,
            ForecastError::InsufficientHistory { needed: 28, got: 20, .. }
        ));
    }

    #[test]
    fn test_config_validation() {
        let config = SequenceConfig {
            lookback: 0,
            ..Default::default()
        };
        assert!(SequenceModel::from_config(config, 0.95).is_err());
        assert!(SequenceModel::from_config(SequenceConfig::default(), 0.0).is_err());
    }

    #[test]
    fn test_zero_epochs_rejected() {
        let config = SequenceConfig {
            epochs: 0,
            ..Default::default()
        };
        let err = SequenceModel::from_config(config, 0.95).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidInput { ref parameter, .. } if parameter == "epochs"));
    }
}
