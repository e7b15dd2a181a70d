//! Error types for the demandcast engine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Coarse classification of a [`ForecastError`].
///
/// Callers branch on this rather than on individual variants when deciding
/// whether to fix the request, fetch more history, or skip a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or out-of-range request parameters.
    InputValidation,
    /// Too little history or too short a horizon.
    InsufficientData,
    /// A forecasting model failed internally.
    ModelExecution,
    /// Invalid cost or engine configuration.
    Configuration,
    /// A requested dataset does not exist.
    NotFound,
    /// An external collaborator (narrator) failed.
    Collaborator,
}

/// Errors that can occur while forecasting or optimizing inventory.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum ForecastError {
    /// A request parameter is outside its valid range.
    #[error("invalid {parameter}: {value}")]
    InvalidInput { parameter: String, value: String },

    /// A regressor was requested that the dataset does not carry.
    #[error("unknown regressor '{name}' (available: {})", .available.join(", "))]
    UnknownRegressor { name: String, available: Vec<String> },

    /// Two observations share a calendar day.
    #[error("duplicate observation date {date}")]
    DuplicateDate { date: NaiveDate },

    /// Observation dates are not increasing.
    #[error("observation dates out of order: {next} follows {previous}")]
    UnorderedDates { previous: NaiveDate, next: NaiveDate },

    /// The dataset is shorter than a model's minimum training window.
    #[error("insufficient history for {model}: need at least {needed} observations, got {got}")]
    InsufficientHistory {
        model: String,
        needed: usize,
        got: usize,
    },

    /// The forecast horizon is shorter than the lead time.
    #[error("insufficient horizon: need at least {needed} days, got {got}")]
    InsufficientHorizon { needed: usize, got: usize },

    /// Component forecasts do not cover the same dates.
    #[error("horizon mismatch for {model}: expected {expected}, got {got}")]
    HorizonMismatch {
        model: String,
        expected: String,
        got: String,
    },

    /// A model failed while fitting or predicting.
    #[error("model {model} failed: {reason}")]
    ModelExecution { model: String, reason: String },

    /// Every model in an ensemble run failed.
    #[error("no viable forecast: all {} models failed", .failures.len())]
    NoViableForecast { failures: Vec<(String, ForecastError)> },

    /// Holding cost is not positive, so EOQ is undefined.
    #[error(
        "invalid cost parameters: holding cost rate {holding_cost_rate} x unit cost {unit_cost} must be positive"
    )]
    InvalidCostParameters { holding_cost_rate: f64, unit_cost: f64 },

    /// No dataset exists for the requested key.
    #[error("dataset not found for product {product_id} at location {location_id}")]
    DatasetNotFound {
        product_id: String,
        location_id: String,
    },

    /// The insight narrator failed.
    #[error("narration failed: {reason}")]
    Narration { reason: String },

    /// Engine configuration is invalid or could not be loaded.
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

impl ForecastError {
    /// Convenience constructor for [`ForecastError::InvalidInput`].
    pub fn invalid(parameter: impl Into<String>, value: impl ToString) -> Self {
        Self::InvalidInput {
            parameter: parameter.into(),
            value: value.to_string(),
        }
    }

    /// Convenience constructor for [`ForecastError::ModelExecution`].
    pub fn model_failure(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModelExecution {
            model: model.into(),
            reason: reason.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. }
            | Self::UnknownRegressor { .. }
            | Self::DuplicateDate { .. }
            | Self::UnorderedDates { .. }
            | Self::HorizonMismatch { .. } => ErrorKind::InputValidation,
            Self::InsufficientHistory { .. } | Self::InsufficientHorizon { .. } => {
                ErrorKind::InsufficientData
            }
            Self::ModelExecution { .. } | Self::NoViableForecast { .. } => {
                ErrorKind::ModelExecution
            }
            Self::InvalidCostParameters { .. } | Self::Config { .. } => ErrorKind::Configuration,
            Self::DatasetNotFound { .. } => ErrorKind::NotFound,
            Self::Narration { .. } => ErrorKind::Collaborator,
        }
    }

    /// Whether the ensemble may drop the failing model and carry on.
    pub fn is_recoverable_by_ensemble(&self) -> bool {
        matches!(self, Self::ModelExecution { .. })
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config {
            reason: err.to_string(),
        }
    }
}
