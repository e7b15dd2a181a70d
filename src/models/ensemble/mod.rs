//! Ensemble forecasting.
//!
//! Blends the output of several models with a pluggable weighting policy and
//! keeps the rolling error history that performance weighting reads.

mod forecaster;
mod tracker;
mod weighting;

pub use forecaster::EnsembleForecaster;
pub use tracker::{PerformanceRecord, PerformanceTracker, DEFAULT_CAPACITY};
pub use weighting::{WeightingPolicy, MIN_TRAILING_ERROR};
