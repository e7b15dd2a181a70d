//! Core data structures: observations, datasets and forecasts.

mod covariates;
mod dataset;
mod forecast;
mod observation;

pub use covariates::{Covariate, RegressorSet};
pub use dataset::{FeatureView, GapPolicy, SeriesKey, TimeSeriesDataset, TimeSeriesDatasetBuilder};
pub use forecast::{ForecastPoint, PointForecast, ReconciledForecast};
pub use observation::{CalendarFeatures, MarketConditions, Observation, Season, WeatherCategory};
