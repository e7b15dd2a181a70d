//! # demandcast
//!
//! Demand forecasting and inventory replenishment for retail series.
//!
//! A seasonal regression model and a small recurrent-style sequence model are
//! blended by an ensemble whose weights can follow recent accuracy. The blended
//! forecast drives reorder point, safety stock and economic order quantity
//! calculations for each product at each location.
//!
//! ```
//! use std::sync::Arc;
//! use chrono::{Duration, NaiveDate};
//! use demandcast::prelude::*;
//!
//! let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let key = SeriesKey::new("SKU-1", "STORE-1");
//! let dataset = TimeSeriesDataset::builder(key.clone())
//!     .observations((0..60).map(|i| {
//!         Observation::new(start + Duration::days(i), 20.0 + (i % 7) as f64, MarketConditions::new(4.5))
//!     }))
//!     .build()
//!     .unwrap();
//!
//! let provider = InMemoryDatasetProvider::new().with_dataset(dataset);
//! let engine = ForecastEngine::new(EngineConfig::default(), Arc::new(provider)).unwrap();
//! let plan = engine.plan(&PlanRequest::new(key, 40.0).with_horizon(14)).unwrap();
//! assert!(plan.recommendation.status.needs_reorder());
//! ```

#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)]

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod models;
pub mod transform;
pub mod utils;

pub use config::EngineConfig;
pub use engine::{
    BatchReport, DatasetProvider, ForecastEngine, InMemoryDatasetProvider, InsightContext,
    InsightNarrator, ModelSelection, PlanFailure, PlanRequest, ProductPlan,
};
pub use error::{ErrorKind, ForecastError, Result};

pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::core::{
        GapPolicy, MarketConditions, Observation, PointForecast, ReconciledForecast, RegressorSet,
        SeriesKey, TimeSeriesDataset,
    };
    pub use crate::engine::{
        DatasetProvider, ForecastEngine, InMemoryDatasetProvider, InsightNarrator, ModelSelection,
        PlanRequest, ProductPlan,
    };
    pub use crate::error::{ForecastError, Result};
    pub use crate::inventory::{CostParameters, InventoryOptimizer, InventoryStatus, ReorderRecommendation};
    pub use crate::models::{EnsembleForecaster, Forecaster, WeightingPolicy};
}
