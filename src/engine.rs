//! Forecast-to-replenishment pipeline.
//!
//! [`ForecastEngine`] is the entry point for callers: it loads history through a
//! [`DatasetProvider`], runs the configured models through the ensemble, turns
//! the blended forecast into a [`ReorderRecommendation`] and optionally asks an
//! [`InsightNarrator`] for a text explanation. Batches fan out one task per
//! series and join before summarizing.

use crate::config::EngineConfig;
use crate::core::{PointForecast, ReconciledForecast, RegressorSet, SeriesKey, TimeSeriesDataset};
use crate::error::{ForecastError, Result};
use crate::inventory::{
    CostParameters, InventoryHealthSummary, InventoryOptimizer, ReorderRecommendation,
};
use crate::models::{EnsembleForecaster, ForecastModel, Forecaster, PerformanceTracker};
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Source of demand history.
pub trait DatasetProvider: Send + Sync {
    /// Fails with [`ForecastError::DatasetNotFound`] when the key is unknown.
    fn dataset(&self, key: &SeriesKey) -> Result<TimeSeriesDataset>;
}

/// Datasets held in memory, keyed by series.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDatasetProvider {
    datasets: HashMap<SeriesKey, TimeSeriesDataset>,
}

impl InMemoryDatasetProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a dataset.
    pub fn insert(&mut self, dataset: TimeSeriesDataset) {
        self.datasets.insert(dataset.key().clone(), dataset);
    }

    pub fn with_dataset(mut self, dataset: TimeSeriesDataset) -> Self {
        self.insert(dataset);
        self
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &SeriesKey> {
        self.datasets.keys()
    }
}

impl FromIterator<TimeSeriesDataset> for InMemoryDatasetProvider {
    fn from_iter<I: IntoIterator<Item = TimeSeriesDataset>>(iter: I) -> Self {
        let mut provider = Self::new();
        for dataset in iter {
            provider.insert(dataset);
        }
        provider
    }
}

impl DatasetProvider for InMemoryDatasetProvider {
    fn dataset(&self, key: &SeriesKey) -> Result<TimeSeriesDataset> {
        self.datasets
            .get(key)
            .cloned()
            .ok_or_else(|| ForecastError::DatasetNotFound {
                product_id: key.product_id.clone(),
                location_id: key.location_id.clone(),
            })
    }
}

/// Produces a free-text explanation of a plan. The engine never parses it.
pub trait InsightNarrator: Send + Sync {
    fn narrate(&self, context: &InsightContext) -> Result<String>;
}

/// Structured summary handed to an [`InsightNarrator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightContext {
    pub product_id: String,
    pub location_id: String,
    pub horizon_days: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub confidence_level: f64,
    pub total_forecast_demand: f64,
    pub peak_date: NaiveDate,
    pub peak_demand: f64,
    /// Widest interval over the horizon, as a share of its mean.
    pub max_relative_uncertainty: f64,
    pub model_weights: BTreeMap<String, f64>,
    pub excluded_models: Vec<String>,
    pub recommendation: ReorderRecommendation,
}

impl InsightContext {
    pub fn new(forecast: &ReconciledForecast, recommendation: &ReorderRecommendation) -> Self {
        let blended = forecast.forecast();
        let peak = blended
            .points()
            .iter()
            .fold(&blended.points()[0], |best, p| if p.mean > best.mean { p } else { best });
        let max_relative_uncertainty = blended
            .points()
            .iter()
            .filter(|p| p.mean.abs() > f64::EPSILON)
            .map(|p| p.width() / p.mean.abs())
            .fold(0.0, f64::max);

        Self {
            product_id: recommendation.product_id.clone(),
            location_id: recommendation.location_id.clone(),
            horizon_days: blended.horizon(),
            start_date: blended.start_date(),
            end_date: blended.end_date(),
            confidence_level: blended.confidence_level(),
            total_forecast_demand: blended.total_demand(),
            peak_date: peak.date,
            peak_demand: peak.mean,
            max_relative_uncertainty,
            model_weights: forecast.weights().clone(),
            excluded_models: forecast.excluded_models().keys().cloned().collect(),
            recommendation: recommendation.clone(),
        }
    }
}

/// Which configured models to run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSelection {
    #[default]
    All,
    Only(Vec<String>),
}

/// Everything needed to plan replenishment for one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub key: SeriesKey,
    pub current_stock: f64,
    #[serde(default = "default_horizon")]
    pub horizon_days: usize,
    #[serde(default)]
    pub regressors: RegressorSet,
    #[serde(default)]
    pub models: ModelSelection,
    /// Falls back to the engine's optimizer configuration when unset.
    #[serde(default)]
    pub lead_time_days: Option<usize>,
    #[serde(default)]
    pub safety_factor: Option<f64>,
    #[serde(default)]
    pub cost: Option<CostParameters>,
    #[serde(default)]
    pub narrate: bool,
}

fn default_horizon() -> usize {
    30
}

impl PlanRequest {
    pub fn new(key: SeriesKey, current_stock: f64) -> Self {
        Self {
            key,
            current_stock,
            horizon_days: default_horizon(),
            regressors: RegressorSet::none(),
            models: ModelSelection::All,
            lead_time_days: None,
            safety_factor: None,
            cost: None,
            narrate: false,
        }
    }

    pub fn with_horizon(mut self, days: usize) -> Self {
        self.horizon_days = days;
        self
    }

    pub fn with_regressors(mut self, regressors: RegressorSet) -> Self {
        self.regressors = regressors;
        self
    }

    pub fn with_models(mut self, models: ModelSelection) -> Self {
        self.models = models;
        self
    }

    pub fn with_lead_time(mut self, days: usize) -> Self {
        self.lead_time_days = Some(days);
        self
    }

    pub fn with_safety_factor(mut self, factor: f64) -> Self {
        self.safety_factor = Some(factor);
        self
    }

    pub fn with_cost(mut self, cost: CostParameters) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn with_narration(mut self) -> Self {
        self.narrate = true;
        self
    }
}

/// Result of planning one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPlan {
    pub forecast: ReconciledForecast,
    pub recommendation: ReorderRecommendation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration_error: Option<ForecastError>,
}

/// A series that could not be planned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanFailure {
    pub key: SeriesKey,
    pub error: ForecastError,
}

/// Outcome of a batch run. Plans and failures are in request order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub plans: Vec<ProductPlan>,
    pub failures: Vec<PlanFailure>,
    /// Summary over the successful plans.
    pub summary: InventoryHealthSummary,
}

/// The forecasting and replenishment engine.
pub struct ForecastEngine {
    config: EngineConfig,
    models: Vec<ForecastModel>,
    ensemble: EnsembleForecaster,
    optimizer: InventoryOptimizer,
    provider: Arc<dyn DatasetProvider>,
    narrator: Option<Arc<dyn InsightNarrator>>,
}

impl ForecastEngine {
    pub fn new(config: EngineConfig, provider: Arc<dyn DatasetProvider>) -> Result<Self> {
        config.validate()?;
        let models = config
            .models
            .iter()
            .map(|m| ForecastModel::from_config(m, config.confidence_level))
            .collect::<Result<Vec<_>>>()?;
        let tracker = Arc::new(PerformanceTracker::with_capacity(config.tracker_capacity));
        let ensemble = EnsembleForecaster::new(config.weighting.clone()).with_tracker(tracker);
        let optimizer = InventoryOptimizer::from_config(&config.optimizer)?;

        Ok(Self {
            config,
            models,
            ensemble,
            optimizer,
            provider,
            narrator: None,
        })
    }

    pub fn with_narrator(mut self, narrator: Arc<dyn InsightNarrator>) -> Self {
        self.narrator = Some(narrator);
        self
    }

    /// Share a performance history with other engines or tests.
    pub fn with_tracker(mut self, tracker: Arc<PerformanceTracker>) -> Self {
        self.ensemble = self.ensemble.with_tracker(tracker);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn models(&self) -> &[ForecastModel] {
        &self.models
    }

    pub fn tracker(&self) -> &Arc<PerformanceTracker> {
        self.ensemble.tracker()
    }

    /// Load a series and forecast it with the selected models.
    #[instrument(skip(self, regressors, selection), fields(series = %key), err)]
    pub fn forecast(
        &self,
        key: &SeriesKey,
        horizon_days: usize,
        regressors: &RegressorSet,
        selection: &ModelSelection,
    ) -> Result<ReconciledForecast> {
        let dataset = self.provider.dataset(key)?;
        self.forecast_dataset(&dataset, horizon_days, regressors, selection)
    }

    /// Forecast a dataset the caller already holds.
    pub fn forecast_dataset(
        &self,
        dataset: &TimeSeriesDataset,
        horizon_days: usize,
        regressors: &RegressorSet,
        selection: &ModelSelection,
    ) -> Result<ReconciledForecast> {
        let models = self.select_models(selection)?;
        self.ensemble
            .forecast(dataset, horizon_days, regressors, &models)
    }

    /// Turn a forecast and live stock into a recommendation.
    pub fn evaluate(
        &self,
        key: &SeriesKey,
        current_stock: f64,
        forecast: &PointForecast,
        lead_time_days: usize,
        safety_factor: f64,
        cost: Option<&CostParameters>,
    ) -> Result<ReorderRecommendation> {
        self.optimizer.evaluate(
            key,
            current_stock,
            forecast,
            lead_time_days,
            safety_factor,
            cost,
        )
    }

    pub fn summarize(
        &self,
        recommendations: &[ReorderRecommendation],
        high_risk_days_threshold: f64,
    ) -> InventoryHealthSummary {
        self.optimizer
            .summarize(recommendations, high_risk_days_threshold)
    }

    /// Forecast, evaluate and optionally narrate one series.
    #[instrument(skip(self, request), fields(series = %request.key), err)]
    pub fn plan(&self, request: &PlanRequest) -> Result<ProductPlan> {
        let lead_time_days = request
            .lead_time_days
            .unwrap_or(self.config.optimizer.lead_time_days);
        let safety_factor = request
            .safety_factor
            .unwrap_or(self.config.optimizer.safety_factor);

        let forecast = self.forecast(
            &request.key,
            request.horizon_days,
            &request.regressors,
            &request.models,
        )?;
        let recommendation = self.evaluate(
            &request.key,
            request.current_stock,
            forecast.forecast(),
            lead_time_days,
            safety_factor,
            request.cost.as_ref(),
        )?;

        let (narrative, narration_error) = match (&self.narrator, request.narrate) {
            (Some(narrator), true) => {
                let context = InsightContext::new(&forecast, &recommendation);
                match narrator.narrate(&context) {
                    Ok(text) => (Some(text), None),
                    Err(err) => {
                        warn!(error = %err, "narration failed");
                        (None, Some(err))
                    }
                }
            }
            (None, true) => {
                warn!("narration requested but no narrator is configured");
                let err = ForecastError::Narration {
                    reason: "no narrator configured".to_string(),
                };
                (None, Some(err))
            }
            (_, false) => (None, None),
        };

        Ok(ProductPlan {
            forecast,
            recommendation,
            narrative,
            narration_error,
        })
    }

    /// Plan many series in parallel and summarize the successes.
    pub fn plan_batch(&self, requests: &[PlanRequest]) -> BatchReport {
        let outcomes: Vec<(SeriesKey, Result<ProductPlan>)> = requests
            .par_iter()
            .map(|request| (request.key.clone(), self.plan(request)))
            .collect();

        let mut plans = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for (key, outcome) in outcomes {
            match outcome {
                Ok(plan) => plans.push(plan),
                Err(error) => failures.push(PlanFailure { key, error }),
            }
        }

        let recommendations: Vec<ReorderRecommendation> =
            plans.iter().map(|p| p.recommendation.clone()).collect();
        let summary = self.summarize(
            &recommendations,
            self.config.optimizer.high_risk_days_threshold,
        );
        info!(
            planned = plans.len(),
            failed = failures.len(),
            needing_reorder = summary.products_needing_reorder,
            "batch planning finished"
        );

        BatchReport {
            plans,
            failures,
            summary,
        }
    }

    /// Feed observed demand back so performance weighting can learn.
    pub fn record_actuals(
        &self,
        forecast: &ReconciledForecast,
        actuals: &[(NaiveDate, f64)],
    ) -> Result<usize> {
        self.ensemble.record_actuals(forecast, actuals)
    }

    fn select_models(&self, selection: &ModelSelection) -> Result<Vec<ForecastModel>> {
        match selection {
            ModelSelection::All => Ok(self.models.clone()),
            ModelSelection::Only(names) => {
                if names.is_empty() {
                    return Err(ForecastError::invalid("model_selection", "no models named"));
                }
                names
                    .iter()
                    .map(|name| {
                        self.models
                            .iter()
                            .find(|m| m.name() == name.as_str())
                            .cloned()
                            .ok_or_else(|| {
                                ForecastError::invalid("model_selection", format!("unknown model '{name}'"))
                            })
                    })
                    .collect()
            }
        }
    }
}
