//! Forecaster trait and the closed set of model variants behind it.

use super::seasonal::{SeasonalRegressionConfig, SeasonalRegressionModel};
use super::sequence::{SequenceConfig, SequenceModel};
use crate::core::{PointForecast, RegressorSet, TimeSeriesDataset};
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

/// Common interface for all forecasting models.
///
/// Implementations fit on every call and never mutate the dataset, so one
/// model value can serve many series concurrently.
pub trait Forecaster {
    /// Model name, used as the key in ensemble weights and components.
    fn name(&self) -> &str;

    /// Minimum number of observations needed to train.
    fn min_history(&self) -> usize;

    /// Forecast `horizon_days` days past the last observation.
    fn forecast(
        &self,
        dataset: &TimeSeriesDataset,
        horizon_days: usize,
        regressors: &RegressorSet,
    ) -> Result<PointForecast>;
}

/// Checks shared by every model before fitting.
pub(crate) fn validate_request(
    model: &str,
    min_history: usize,
    dataset: &TimeSeriesDataset,
    horizon_days: usize,
) -> Result<()> {
    if horizon_days == 0 {
        return Err(ForecastError::invalid("horizon_days", horizon_days));
    }
    if dataset.len() < min_history {
        return Err(ForecastError::InsufficientHistory {
            model: model.to_string(),
            needed: min_history,
            got: dataset.len(),
        });
    }
    Ok(())
}

/// Reject model output that is not a usable number.
pub(crate) fn ensure_finite(model: &str, what: &str, values: &[f64]) -> Result<()> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(h) => Err(ForecastError::model_failure(
            model,
            format!("non-finite {what} at horizon step {}", h + 1),
        )),
        None => Ok(()),
    }
}

/// Model selection by configuration.
///
/// # Example
///
/// ```
/// use demandcast::models::ModelConfig;
///
/// let json = r#"{"kind": "sequence", "name": "mlp", "lookback": 14}"#;
/// let config: ModelConfig = serde_json::from_str(json).unwrap();
/// assert_eq!(config.name(), "mlp");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelConfig {
    SeasonalRegression(SeasonalRegressionConfig),
    Sequence(SequenceConfig),
}

impl ModelConfig {
    pub fn name(&self) -> &str {
        match self {
            ModelConfig::SeasonalRegression(c) => &c.name,
            ModelConfig::Sequence(c) => &c.name,
        }
    }

    /// The default model line-up: one of each variant.
    pub fn defaults() -> Vec<ModelConfig> {
        vec![
            ModelConfig::SeasonalRegression(SeasonalRegressionConfig::default()),
            ModelConfig::Sequence(SequenceConfig::default()),
        ]
    }
}

/// A configured forecasting model.
#[derive(Debug, Clone)]
pub enum ForecastModel {
    SeasonalRegression(SeasonalRegressionModel),
    Sequence(SequenceModel),
}

impl ForecastModel {
    /// Build a model from its configuration.
    pub fn from_config(config: &ModelConfig, confidence_level: f64) -> Result<Self> {
        Ok(match config {
            ModelConfig::SeasonalRegression(c) => ForecastModel::SeasonalRegression(
                SeasonalRegressionModel::from_config(c.clone(), confidence_level)?,
            ),
            ModelConfig::Sequence(c) => {
                ForecastModel::Sequence(SequenceModel::from_config(c.clone(), confidence_level)?)
            }
        })
    }
}

impl From<SeasonalRegressionModel> for ForecastModel {
    fn from(model: SeasonalRegressionModel) -> Self {
        ForecastModel::SeasonalRegression(model)
    }
}

impl From<SequenceModel> for ForecastModel {
    fn from(model: SequenceModel) -> Self {
        ForecastModel::Sequence(model)
    }
}

impl Forecaster for ForecastModel {
    fn name(&self) -> &str {
        match self {
            ForecastModel::SeasonalRegression(m) => m.name(),
            ForecastModel::Sequence(m) => m.name(),
        }
    }

    fn min_history(&self) -> usize {
        match self {
            ForecastModel::SeasonalRegression(m) => m.min_history(),
            ForecastModel::Sequence(m) => m.min_history(),
        }
    }

    fn forecast(
        &self,
        dataset: &TimeSeriesDataset,
        horizon_days: usize,
        regressors: &RegressorSet,
    ) -> Result<PointForecast> {
        match self {
            ForecastModel::SeasonalRegression(m) => m.forecast(dataset, horizon_days, regressors),
            ForecastModel::Sequence(m) => m.forecast(dataset, horizon_days, regressors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GapPolicy, MarketConditions, Observation, SeriesKey};
    use chrono::{Duration, NaiveDate};

    fn dataset(n: usize) -> TimeSeriesDataset {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let observations = (0..n)
            .map(|i| {
                Observation::new(
                    start + Duration::days(i as i64),
                    10.0 + (i % 7) as f64,
                    MarketConditions::new(4.0),
                )
            })
            .collect();
        TimeSeriesDataset::new(SeriesKey::new("P1", "L1"), observations, GapPolicy::Preserve)
            .unwrap()
    }

    #[test]
    fn test_validate_request_rejects_zero_horizon() {
        let result = validate_request("m", 14, &dataset(20), 0);
        assert!(matches!(result, Err(ForecastError::InvalidInput { .. })));
    }

    #[test]
    fn test_validate_request_reports_needed_and_got() {
        let result = validate_request("m", 14, &dataset(10), 7);
        assert_eq!(
            result,
            Err(ForecastError::InsufficientHistory {
                model: "m".to_string(),
                needed: 14,
                got: 10,
            })
        );
    }

    #[test]
    fn test_ensure_finite() {
        assert!(ensure_finite("m", "mean", &[1.0, 2.0]).is_ok());
        let err = ensure_finite("m", "mean", &[1.0, f64::NAN]).unwrap_err();
        assert!(err.is_recoverable_by_ensemble());
    }

    #[test]
    fn test_model_config_tagging() {
        let json = r#"[
            {"kind": "seasonal_regression"},
            {"kind": "sequence", "name": "lstm_like", "hidden_units": 4}
        ]"#;
        let configs: Vec<ModelConfig> = serde_json::from_str(json).unwrap();
        assert_eq!(configs[0].name(), "seasonal_regression");
        assert_eq!(configs[1].name(), "lstm_like");

        let value = serde_json::to_value(&configs[1]).unwrap();
        assert_eq!(value["kind"], "sequence");
    }

    #[test]
    fn test_forecast_model_delegates() {
        let models: Vec<ForecastModel> = ModelConfig::defaults()
            .iter()
            .map(|c| ForecastModel::from_config(c, 0.9).unwrap())
            .collect();
        assert_eq!(models[0].name(), "seasonal_regression");
        assert_eq!(models[0].min_history(), 14);
        assert_eq!(models[1].name(), "sequence");

        let ds = dataset(60);
        for model in &models {
            let fc = model.forecast(&ds, 5, &RegressorSet::none()).unwrap();
            assert_eq!(fc.horizon(), 5);
            assert_eq!(fc.start_date(), ds.last_date().unwrap() + Duration::days(1));
            assert_eq!(fc.confidence_level(), 0.9);
        }
    }

    #[test]
    fn test_from_config_rejects_bad_level() {
        let config = ModelConfig::SeasonalRegression(SeasonalRegressionConfig::default());
        assert!(ForecastModel::from_config(&config, 1.5).is_err());
    }
}
