//! Per-product, per-location daily demand history.

use super::covariates::{Covariate, RegressorSet};
use super::observation::{MarketConditions, Observation};
use crate::error::{ForecastError, Result};
use crate::transform::{lag, rolling_mean};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one demand series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub product_id: String,
    pub location_id: String,
}

impl SeriesKey {
    pub fn new(product_id: impl Into<String>, location_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            location_id: location_id.into(),
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.product_id, self.location_id)
    }
}

/// Policy for missing calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    /// Keep gaps; they are reported by [`TimeSeriesDataset::gaps`].
    #[default]
    Preserve,
    /// Insert missing days repeating the previous day's demand and conditions.
    ForwardFill,
    /// Insert missing days with zero demand and the previous day's conditions.
    ZeroDemand,
}

/// Lag and moving-average features derived from demand.
///
/// Each entry is aligned with the dataset's observations; `None` means the
/// required earlier days are not in the history.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureView {
    pub dates: Vec<NaiveDate>,
    pub lag_1: Vec<Option<f64>>,
    pub lag_7: Vec<Option<f64>>,
    /// Trailing 7-day mean including the current day.
    pub moving_average_7: Vec<Option<f64>>,
}

/// An immutable, date-ordered demand history.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesDataset {
    key: SeriesKey,
    observations: Vec<Observation>,
    gap_policy: GapPolicy,
}

/// Builder for constructing a [`TimeSeriesDataset`].
#[derive(Debug, Clone)]
pub struct TimeSeriesDatasetBuilder {
    key: SeriesKey,
    observations: Vec<Observation>,
    gap_policy: GapPolicy,
}

impl TimeSeriesDatasetBuilder {
    pub fn new(key: SeriesKey) -> Self {
        Self {
            key,
            observations: Vec::new(),
            gap_policy: GapPolicy::default(),
        }
    }

    pub fn observation(mut self, observation: Observation) -> Self {
        self.observations.push(observation);
        self
    }

    pub fn observations(mut self, observations: impl IntoIterator<Item = Observation>) -> Self {
        self.observations.extend(observations);
        self
    }

    pub fn gap_policy(mut self, policy: GapPolicy) -> Self {
        self.gap_policy = policy;
        self
    }

    pub fn build(self) -> Result<TimeSeriesDataset> {
        TimeSeriesDataset::new(self.key, self.observations, self.gap_policy)
    }
}

impl TimeSeriesDataset {
    /// Create a dataset, validating ordering and applying the gap policy.
    pub fn new(
        key: SeriesKey,
        observations: Vec<Observation>,
        gap_policy: GapPolicy,
    ) -> Result<Self> {
        for obs in &observations {
            obs.validate()?;
        }
        for pair in observations.windows(2) {
            let (prev, next) = (pair[0].date, pair[1].date);
            if next == prev {
                return Err(ForecastError::DuplicateDate { date: next });
            }
            if next < prev {
                return Err(ForecastError::UnorderedDates {
                    previous: prev,
                    next,
                });
            }
        }

        let observations = match gap_policy {
            GapPolicy::Preserve => observations,
            GapPolicy::ForwardFill => fill_gaps(observations, true),
            GapPolicy::ZeroDemand => fill_gaps(observations, false),
        };

        Ok(Self {
            key,
            observations,
            gap_policy,
        })
    }

    pub fn builder(key: SeriesKey) -> TimeSeriesDatasetBuilder {
        TimeSeriesDatasetBuilder::new(key)
    }

    pub fn key(&self) -> &SeriesKey {
        &self.key
    }

    pub fn gap_policy(&self) -> GapPolicy {
        self.gap_policy
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn demand(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.demand_units).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.observations.iter().map(|o| o.date).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.date)
    }

    pub fn last_conditions(&self) -> Option<&MarketConditions> {
        self.observations.last().map(|o| &o.conditions)
    }

    /// Day offset of every observation from the first one.
    pub fn day_offsets(&self) -> Vec<f64> {
        match self.first_date() {
            Some(first) => self
                .observations
                .iter()
                .map(|o| (o.date - first).num_days() as f64)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Calendar days missing between the first and last observation.
    pub fn gaps(&self) -> Vec<NaiveDate> {
        let mut missing = Vec::new();
        for pair in self.observations.windows(2) {
            let mut day = pair[0].date + Duration::days(1);
            while day < pair[1].date {
                missing.push(day);
                day += Duration::days(1);
            }
        }
        missing
    }

    pub fn has_gaps(&self) -> bool {
        self.observations
            .windows(2)
            .any(|pair| (pair[1].date - pair[0].date).num_days() > 1)
    }

    /// Demand recorded on a given date, if any.
    pub fn demand_on(&self, date: NaiveDate) -> Option<f64> {
        self.observations
            .binary_search_by_key(&date, |o| o.date)
            .ok()
            .map(|i| self.observations[i].demand_units)
    }

    /// Compute the lag-1, lag-7 and 7-day moving-average view.
    ///
    /// Lags are calendar lags: with preserved gaps, a lag whose date is missing is `None`.
    pub fn features(&self) -> FeatureView {
        let dates = self.dates();

        if !self.has_gaps() {
            let demand = self.demand();
            let to_option = |v: Vec<f64>| -> Vec<Option<f64>> {
                v.into_iter().map(|x| (!x.is_nan()).then_some(x)).collect()
            };
            return FeatureView {
                lag_1: to_option(lag(&demand, 1)),
                lag_7: to_option(lag(&demand, 7)),
                moving_average_7: to_option(rolling_mean(&demand, 7)),
                dates,
            };
        }

        let lag_by = |days: i64| -> Vec<Option<f64>> {
            dates
                .iter()
                .map(|d| self.demand_on(*d - Duration::days(days)))
                .collect()
        };
        let moving_average_7 = dates
            .iter()
            .map(|d| {
                let window: Option<Vec<f64>> = (0..7)
                    .map(|k| self.demand_on(*d - Duration::days(k)))
                    .collect();
                window.map(|w| w.iter().sum::<f64>() / 7.0)
            })
            .collect();

        FeatureView {
            lag_1: lag_by(1),
            lag_7: lag_by(7),
            moving_average_7,
            dates,
        }
    }

    /// Names of the regressors this dataset can supply.
    pub fn covariate_schema(&self) -> Vec<String> {
        let mut names: Vec<String> = Covariate::ALWAYS_AVAILABLE
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        let has_competitor = !self.observations.is_empty()
            && self
                .observations
                .iter()
                .all(|o| o.conditions.competitor_price.is_some());
        if has_competitor {
            names.push(Covariate::CompetitorPrice.name().to_string());
        }
        names
    }

    /// Resolve requested regressor names against this dataset's schema.
    ///
    /// Scenario entries are checked like observed conditions, dated by the
    /// horizon day they describe.
    pub fn resolve_regressors(&self, regressors: &RegressorSet) -> Result<Vec<Covariate>> {
        let schema = self.covariate_schema();
        let covariates = regressors
            .names()
            .iter()
            .map(|name| {
                Covariate::from_name(name)
                    .filter(|_| schema.iter().any(|s| s == name))
                    .ok_or_else(|| ForecastError::UnknownRegressor {
                        name: name.clone(),
                        available: schema.clone(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let scenario = regressors.scenario();
        for (date, conditions) in self.future_dates(scenario.len()).into_iter().zip(scenario) {
            conditions.validate(date)?;
        }
        Ok(covariates)
    }

    /// Historical design columns for the given covariates, one per encoded column.
    pub fn covariate_columns(&self, covariates: &[Covariate]) -> Vec<(String, Vec<f64>)> {
        let mut columns = Vec::new();
        for cov in covariates {
            let names = cov.columns();
            let mut values = vec![Vec::with_capacity(self.len()); names.len()];
            for obs in &self.observations {
                for (col, v) in values.iter_mut().zip(cov.encode(obs.date, &obs.conditions)) {
                    col.push(v);
                }
            }
            columns.extend(names.into_iter().zip(values));
        }
        columns
    }

    /// The horizon dates, starting the day after the last observation.
    pub fn future_dates(&self, horizon: usize) -> Vec<NaiveDate> {
        match self.last_date() {
            Some(last) => (1..=horizon as i64)
                .map(|h| last + Duration::days(h))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Market conditions for each horizon day.
    ///
    /// Scenario entries are used where given; remaining days, and a missing
    /// competitor price, hold the last observed values.
    pub fn future_conditions(
        &self,
        horizon: usize,
        regressors: &RegressorSet,
    ) -> Vec<(NaiveDate, MarketConditions)> {
        let last = self.last_conditions().cloned().unwrap_or_default();
        self.future_dates(horizon)
            .into_iter()
            .enumerate()
            .map(|(h, date)| {
                let mut conditions = regressors
                    .scenario()
                    .get(h)
                    .cloned()
                    .unwrap_or_else(|| last.clone());
                if conditions.competitor_price.is_none() {
                    conditions.competitor_price = last.competitor_price;
                }
                (date, conditions)
            })
            .collect()
    }

    /// Future design columns matching [`TimeSeriesDataset::covariate_columns`].
    pub fn future_covariate_columns(
        &self,
        covariates: &[Covariate],
        horizon: usize,
        regressors: &RegressorSet,
    ) -> Vec<(String, Vec<f64>)> {
        let future = self.future_conditions(horizon, regressors);
        let mut columns = Vec::new();
        for cov in covariates {
            let names = cov.columns();
            let mut values = vec![Vec::with_capacity(horizon); names.len()];
            for (date, conditions) in &future {
                for (col, v) in values.iter_mut().zip(cov.encode(*date, conditions)) {
                    col.push(v);
                }
            }
            columns.extend(names.into_iter().zip(values));
        }
        columns
    }

    /// A new dataset holding only the first `len` observations.
    pub fn truncate(&self, len: usize) -> Self {
        Self {
            key: self.key.clone(),
            observations: self.observations[..len.min(self.len())].to_vec(),
            gap_policy: self.gap_policy,
        }
    }
}

fn fill_gaps(observations: Vec<Observation>, carry_demand: bool) -> Vec<Observation> {
    let mut filled: Vec<Observation> = Vec::with_capacity(observations.len());
    for obs in observations {
        if let Some(prev) = filled.last().cloned() {
            let mut day = prev.date + Duration::days(1);
            while day < obs.date {
                let mut synthetic = prev.clone();
                synthetic.date = day;
                if !carry_demand {
                    synthetic.demand_units = 0.0;
                }
                filled.push(synthetic);
                day += Duration::days(1);
            }
        }
        filled.push(obs);
    }
    filled
}
