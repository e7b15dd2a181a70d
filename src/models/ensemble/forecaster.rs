//! Weighted blending of component forecasts.
//!
//! Per date, the reconciled mean, lower bound and upper bound are each the
//! weighted sum of the component values. Bounds are not combined as
//! independent variances: component models share the same history and their
//! errors are correlated, so the weighted bound is a conservative envelope.

use super::tracker::PerformanceTracker;
use super::weighting::WeightingPolicy;
use crate::core::{PointForecast, ReconciledForecast, RegressorSet, TimeSeriesDataset};
use crate::error::{ForecastError, Result};
use crate::models::{ForecastModel, Forecaster};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Combines forecasts from several models into one.
///
/// The performance tracker is the only mutable state; pass one in with
/// [`EnsembleForecaster::with_tracker`] to share or pre-seed it.
#[derive(Debug, Clone, Default)]
pub struct EnsembleForecaster {
    policy: WeightingPolicy,
    tracker: Arc<PerformanceTracker>,
}

impl EnsembleForecaster {
    pub fn new(policy: WeightingPolicy) -> Self {
        Self {
            policy,
            tracker: Arc::new(PerformanceTracker::new()),
        }
    }

    /// Use an existing tracker instead of a fresh one.
    pub fn with_tracker(mut self, tracker: Arc<PerformanceTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn policy(&self) -> &WeightingPolicy {
        &self.policy
    }

    pub fn tracker(&self) -> &Arc<PerformanceTracker> {
        &self.tracker
    }

    /// Weights the current policy assigns to the given models.
    pub fn weights_for(&self, models: &[String]) -> BTreeMap<String, f64> {
        self.policy.weights(models, &self.tracker)
    }

    /// Blend component forecasts.
    ///
    /// Weights are normalized over the components present; a component with
    /// no weight entry gets zero. If every weight is zero the components are
    /// blended equally.
    pub fn combine(
        &self,
        components: BTreeMap<String, PointForecast>,
        weights: &BTreeMap<String, f64>,
    ) -> Result<ReconciledForecast> {
        let (reference_name, reference) = components
            .iter()
            .next()
            .ok_or_else(|| ForecastError::invalid("component_forecasts", "empty"))?;

        for (name, w) in weights {
            if !w.is_finite() || *w < 0.0 {
                return Err(ForecastError::invalid(format!("weight for {name}"), w));
            }
        }
        for (name, forecast) in &components {
            if !forecast.same_horizon(reference) {
                return Err(ForecastError::HorizonMismatch {
                    model: name.clone(),
                    expected: describe_horizon(reference),
                    got: describe_horizon(forecast),
                });
            }
            if forecast.confidence_level() != reference.confidence_level() {
                return Err(ForecastError::invalid(
                    format!("confidence level of {name} (expected {} as for {reference_name})", reference.confidence_level()),
                    forecast.confidence_level(),
                ));
            }
        }

        let applied = normalize(&components, weights);
        debug!(weights = ?applied, "blending component forecasts");

        let horizon = reference.horizon();
        let mut mean = vec![0.0; horizon];
        let mut lower = vec![0.0; horizon];
        let mut upper = vec![0.0; horizon];
        for (name, forecast) in &components {
            let w = applied[name];
            for (h, p) in forecast.points().iter().enumerate() {
                mean[h] += w * p.mean;
                lower[h] += w * p.lower_bound;
                upper[h] += w * p.upper_bound;
            }
        }

        let blended = PointForecast::from_series(
            reference.start_date(),
            reference.confidence_level(),
            &mean,
            &lower,
            &upper,
        )?;
        Ok(ReconciledForecast::new(
            blended,
            applied,
            components,
            BTreeMap::new(),
        ))
    }

    /// Blend the successful outcomes of a model run.
    ///
    /// Models that failed with a model-execution error are dropped and their
    /// weight is redistributed proportionally among the survivors. Any other
    /// error is returned as is.
    pub fn combine_outcomes(
        &self,
        outcomes: Vec<(String, Result<PointForecast>)>,
        weights: &BTreeMap<String, f64>,
    ) -> Result<ReconciledForecast> {
        if outcomes.is_empty() {
            return Err(ForecastError::invalid("models", 0));
        }

        let mut survivors = BTreeMap::new();
        let mut excluded = BTreeMap::new();
        for (name, outcome) in outcomes {
            match outcome {
                Ok(forecast) => {
                    survivors.insert(name, forecast);
                }
                Err(err) if err.is_recoverable_by_ensemble() => {
                    warn!(model = %name, error = %err, "excluding model from ensemble");
                    excluded.insert(name, err);
                }
                Err(err) => return Err(err),
            }
        }

        if survivors.is_empty() {
            return Err(ForecastError::NoViableForecast {
                failures: excluded.into_iter().collect(),
            });
        }

        let reconciled = self.combine(survivors, weights)?;
        let (forecast, applied, components) = reconciled.into_parts();
        Ok(ReconciledForecast::new(forecast, applied, components, excluded))
    }

    /// Run every model on the dataset and blend the results.
    pub fn forecast(
        &self,
        dataset: &TimeSeriesDataset,
        horizon_days: usize,
        regressors: &RegressorSet,
        models: &[ForecastModel],
    ) -> Result<ReconciledForecast> {
        let names: Vec<String> = models.iter().map(|m| m.name().to_string()).collect();
        let mut seen = BTreeSet::new();
        for name in &names {
            if !seen.insert(name) {
                return Err(ForecastError::invalid("model name", format!("'{name}' is used twice")));
            }
        }

        let outcomes = models
            .iter()
            .map(|m| (m.name().to_string(), m.forecast(dataset, horizon_days, regressors)))
            .collect();
        let weights = self.weights_for(&names);
        self.combine_outcomes(outcomes, &weights)
    }

    /// Feed observed demand back into the performance history.
    pub fn record_actuals(
        &self,
        reconciled: &ReconciledForecast,
        actuals: &[(NaiveDate, f64)],
    ) -> Result<usize> {
        self.tracker.record_forecast(reconciled, actuals)
    }
}

fn normalize(
    components: &BTreeMap<String, PointForecast>,
    weights: &BTreeMap<String, f64>,
) -> BTreeMap<String, f64> {
    let raw: BTreeMap<String, f64> = components
        .keys()
        .map(|name| (name.clone(), weights.get(name).copied().unwrap_or(0.0)))
        .collect();
    // Scale by the largest weight first so the sum cannot overflow.
    let largest = raw.values().copied().fold(0.0, f64::max);
    let raw: BTreeMap<String, f64> = if largest > 0.0 {
        raw.into_iter().map(|(name, w)| (name, w / largest)).collect()
    } else {
        raw
    };
    let total: f64 = raw.values().sum();
    if total > 0.0 {
        raw.into_iter().map(|(name, w)| (name, w / total)).collect()
    } else {
        debug!("all weights are zero; falling back to equal weights");
        let equal = 1.0 / components.len() as f64;
        raw.into_keys().map(|name| (name, equal)).collect()
    }
}

fn describe_horizon(forecast: &PointForecast) -> String {
    format!(
        "{}..={} ({} days)",
        forecast.start_date(),
        forecast.end_date(),
        forecast.horizon()
    )
}
