//! Rolling forecast-vs-actual history used for performance weighting.

use crate::core::ReconciledForecast;
use crate::error::{ForecastError, Result};
use crate::utils::mae;
use chrono::NaiveDate;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Default number of pairs kept per model.
pub const DEFAULT_CAPACITY: usize = 90;

/// One forecast/actual pair for a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub date: NaiveDate,
    pub forecast: f64,
    pub actual: f64,
}

impl PerformanceRecord {
    pub fn absolute_error(&self) -> f64 {
        (self.actual - self.forecast).abs()
    }
}

/// Bounded per-model history of forecast errors.
///
/// Each model name is an independent entry: a write takes that entry's
/// exclusive lock, and reads copy the entry under the same lock, so weight
/// computation never sees a half-applied update. Share it between ensembles
/// or threads through an `Arc`.
#[derive(Debug)]
pub struct PerformanceTracker {
    history: DashMap<String, VecDeque<PerformanceRecord>>,
    capacity: usize,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Keep at most `capacity` pairs per model (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            history: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record a forecast/actual pair. A pair for an already recorded date replaces it.
    pub fn record(&self, model: &str, date: NaiveDate, forecast: f64, actual: f64) -> Result<()> {
        check_pair(model, date, forecast, actual)?;
        self.insert(model, date, forecast, actual);
        Ok(())
    }

    fn insert(&self, model: &str, date: NaiveDate, forecast: f64, actual: f64) {
        let record = PerformanceRecord {
            date,
            forecast,
            actual,
        };
        let mut entry = self.history.entry(model.to_string()).or_default();
        match entry.iter().position(|r| r.date == date) {
            Some(i) => entry[i] = record,
            None => {
                // Keep the deque date-ordered so the trailing window is the most recent one.
                let at = entry.iter().position(|r| r.date > date).unwrap_or(entry.len());
                entry.insert(at, record);
                while entry.len() > self.capacity {
                    entry.pop_front();
                }
            }
        }
    }

    /// Record every component forecast of a reconciled run against observed demand.
    ///
    /// Actuals on dates outside the forecast horizon are ignored. Returns the
    /// number of pairs recorded. Nothing is recorded unless every pair is valid.
    pub fn record_forecast(
        &self,
        reconciled: &ReconciledForecast,
        actuals: &[(NaiveDate, f64)],
    ) -> Result<usize> {
        let mut pairs = Vec::new();
        for (model, forecast) in reconciled.component_forecasts() {
            for point in forecast.points() {
                if let Some((_, actual)) = actuals.iter().find(|(d, _)| *d == point.date) {
                    check_pair(model, point.date, point.mean, *actual)?;
                    pairs.push((model.as_str(), point.date, point.mean, *actual));
                }
            }
        }
        for &(model, date, forecast, actual) in &pairs {
            self.insert(model, date, forecast, actual);
        }
        Ok(pairs.len())
    }

    /// Mean absolute error over the most recent `window` pairs, or `None` without history.
    pub fn trailing_mae(&self, model: &str, window: usize) -> Option<f64> {
        let records = self.history(model);
        if records.is_empty() || window == 0 {
            return None;
        }
        let recent = &records[records.len().saturating_sub(window)..];
        let actual: Vec<f64> = recent.iter().map(|r| r.actual).collect();
        let forecast: Vec<f64> = recent.iter().map(|r| r.forecast).collect();
        Some(mae(&actual, &forecast))
    }

    /// Copy of one model's history, oldest first.
    pub fn history(&self, model: &str) -> Vec<PerformanceRecord> {
        self.history
            .get(model)
            .map(|entry| entry.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Copy of every model's history.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<PerformanceRecord>> {
        self.history
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().iter().copied().collect()))
            .collect()
    }

    pub fn clear(&self) {
        self.history.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.history.iter().all(|entry| entry.value().is_empty())
    }
}

fn check_pair(model: &str, date: NaiveDate, forecast: f64, actual: f64) -> Result<()> {
    if !forecast.is_finite() {
        return Err(ForecastError::invalid(format!("forecast for {model} on {date}"), forecast));
    }
    if !actual.is_finite() || actual < 0.0 {
        return Err(ForecastError::invalid(format!("actual demand on {date}"), actual));
    }
    Ok(())
}

impl Default for PerformanceTracker {
    fn default() -> Self {
        Self::new()
    }
}
