//! Engine configuration.
//!
//! Every field has a default, so a partial JSON document is enough:
//!
//! ```
//! use demandcast::EngineConfig;
//!
//! let config = EngineConfig::from_json_str(r#"{
//!     "confidence_level": 0.9,
//!     "weighting": {"policy": "performance_based", "window": 28}
//! }"#).unwrap();
//! assert_eq!(config.models.len(), 2);
//! ```

use crate::error::{ForecastError, Result};
use crate::inventory::OptimizerConfig;
use crate::models::{ModelConfig, WeightingPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Configuration for a [`crate::ForecastEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Confidence level of every forecast interval.
    pub confidence_level: f64,
    /// Models run for each forecast, in order.
    pub models: Vec<ModelConfig>,
    pub weighting: WeightingPolicy,
    /// Forecast/actual pairs kept per model for performance weighting.
    pub tracker_capacity: usize,
    pub optimizer: OptimizerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confidence_level: 0.95,
            models: ModelConfig::defaults(),
            weighting: WeightingPolicy::default(),
            tracker_capacity: crate::models::ensemble::DEFAULT_CAPACITY,
            optimizer: OptimizerConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ForecastError::Config {
            reason: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::from_json_str(&json)
    }

    pub fn with_confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = level;
        self
    }

    pub fn with_models(mut self, models: Vec<ModelConfig>) -> Self {
        self.models = models;
        self
    }

    pub fn with_weighting(mut self, weighting: WeightingPolicy) -> Self {
        self.weighting = weighting;
        self
    }

    pub fn with_optimizer(mut self, optimizer: OptimizerConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(ForecastError::Config {
                reason: format!("confidence_level must be in (0, 1), got {}", self.confidence_level),
            });
        }
        if self.models.is_empty() {
            return Err(ForecastError::Config {
                reason: "at least one model is required".to_string(),
            });
        }
        let mut names = BTreeSet::new();
        for model in &self.models {
            if !names.insert(model.name()) {
                return Err(ForecastError::Config {
                    reason: format!("model name '{}' is used twice", model.name()),
                });
            }
        }
        if self.tracker_capacity == 0 {
            return Err(ForecastError::Config {
                reason: "tracker_capacity must be positive".to_string(),
            });
        }
        self.weighting.validate()?;
        self.optimizer.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SequenceConfig, SeasonalRegressionConfig};

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.models.len(), 2);
    }

    #[test]
    fn test_partial_json() {
        let config = EngineConfig::from_json_str(
            r#"{"models": [{"kind": "seasonal_regression", "interval_growth": 0.2}],
                "optimizer": {"lead_time_days": 10}}"#,
        )
        .unwrap();
        assert_eq!(config.confidence_level, 0.95);
        assert_eq!(config.optimizer.lead_time_days, 10);
        assert_eq!(config.optimizer.safety_factor, 1.65);
        match &config.models[0] {
            ModelConfig::SeasonalRegression(c) => assert_eq!(c.interval_growth, 0.2),
            other => panic!("unexpected model {other:?}"),
        }
    }

    #[test]
    fn test_rejects_duplicate_model_names() {
        let config = EngineConfig::default().with_models(vec![
            ModelConfig::Sequence(SequenceConfig::default()),
            ModelConfig::Sequence(SequenceConfig::default()),
        ]);
        assert!(matches!(config.validate(), Err(ForecastError::Config { .. })));
    }

    #[test]
    fn test_rejects_bad_confidence_level() {
        assert!(EngineConfig::default().with_confidence_level(1.0).validate().is_err());
        assert!(EngineConfig::from_json_str(r#"{"confidence_level": -0.5}"#).is_err());
    }

    #[test]
    fn test_rejects_empty_models() {
        assert!(EngineConfig::default().with_models(vec![]).validate().is_err());
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let err = EngineConfig::from_json_str("{not json").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }

    #[test]
    fn test_round_trip() {
        let config = EngineConfig::default().with_models(vec![ModelConfig::SeasonalRegression(
            SeasonalRegressionConfig {
                name: "prophet_like".to_string(),
                ..Default::default()
            },
        )]);
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(EngineConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::from_json_file("/nonexistent/demandcast.json").unwrap_err();
        assert!(matches!(err, ForecastError::Config { .. }));
    }
}
