//! Forecasting models.
//!
//! Models form a closed set of variants behind [`Forecaster`]; callers pick
//! variants through [`ModelConfig`] and the ensemble treats them uniformly.

mod traits;

pub mod ensemble;
pub mod seasonal;
pub mod sequence;

pub use ensemble::{EnsembleForecaster, PerformanceRecord, PerformanceTracker, WeightingPolicy};
pub use seasonal::{SeasonalComponents, SeasonalRegressionConfig, SeasonalRegressionModel};
pub use sequence::{SequenceConfig, SequenceModel};
pub use traits::{ForecastModel, Forecaster, ModelConfig};
