//! Forecast value objects: point forecasts with bounds and reconciled ensembles.

use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One horizon day of a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub mean: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl ForecastPoint {
    pub fn new(date: NaiveDate, mean: f64, lower_bound: f64, upper_bound: f64) -> Self {
        Self {
            date,
            mean,
            lower_bound,
            upper_bound,
        }
    }

    pub fn width(&self) -> f64 {
        self.upper_bound - self.lower_bound
    }
}

#[derive(Serialize, Deserialize)]
struct PointForecastRepr {
    confidence_level: f64,
    points: Vec<ForecastPoint>,
}

/// A forecast over a contiguous horizon of days.
///
/// Invariants, checked on construction and deserialization:
/// every point satisfies `lower_bound <= mean <= upper_bound` with finite
/// values, and dates advance by exactly one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PointForecastRepr", into = "PointForecastRepr")]
pub struct PointForecast {
    confidence_level: f64,
    points: Vec<ForecastPoint>,
}

impl TryFrom<PointForecastRepr> for PointForecast {
    type Error = ForecastError;

    fn try_from(repr: PointForecastRepr) -> Result<Self> {
        PointForecast::new(repr.confidence_level, repr.points)
    }
}

impl From<PointForecast> for PointForecastRepr {
    fn from(forecast: PointForecast) -> Self {
        Self {
            confidence_level: forecast.confidence_level,
            points: forecast.points,
        }
    }
}

impl PointForecast {
    /// Create a forecast, validating bounds and date contiguity.
    pub fn new(confidence_level: f64, points: Vec<ForecastPoint>) -> Result<Self> {
        if !(confidence_level > 0.0 && confidence_level < 1.0) {
            return Err(ForecastError::invalid("confidence_level", confidence_level));
        }
        if points.is_empty() {
            return Err(ForecastError::invalid("horizon_days", 0));
        }
        for p in &points {
            let finite = p.mean.is_finite() && p.lower_bound.is_finite() && p.upper_bound.is_finite();
            if !finite || p.lower_bound > p.mean || p.mean > p.upper_bound {
                return Err(ForecastError::invalid(
                    format!("forecast bounds on {}", p.date),
                    format!("{} <= {} <= {}", p.lower_bound, p.mean, p.upper_bound),
                ));
            }
        }
        for pair in points.windows(2) {
            if pair[1].date != pair[0].date + Duration::days(1) {
                return Err(ForecastError::invalid(
                    "forecast dates",
                    format!("{} does not follow {}", pair[1].date, pair[0].date),
                ));
            }
        }
        Ok(Self {
            confidence_level,
            points,
        })
    }

    /// Build a forecast from parallel slices starting at `start`.
    pub fn from_series(
        start: NaiveDate,
        confidence_level: f64,
        mean: &[f64],
        lower: &[f64],
        upper: &[f64],
    ) -> Result<Self> {
        if lower.len() != mean.len() || upper.len() != mean.len() {
            return Err(ForecastError::invalid(
                "forecast series lengths",
                format!("{}/{}/{}", lower.len(), mean.len(), upper.len()),
            ));
        }
        let points = mean
            .iter()
            .zip(lower.iter().zip(upper.iter()))
            .enumerate()
            .map(|(h, (&m, (&l, &u)))| ForecastPoint::new(start + Duration::days(h as i64), m, l, u))
            .collect();
        Self::new(confidence_level, points)
    }

    pub fn confidence_level(&self) -> f64 {
        self.confidence_level
    }

    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    pub fn horizon(&self) -> usize {
        self.points.len()
    }

    pub fn start_date(&self) -> NaiveDate {
        self.points[0].date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.points[self.points.len() - 1].date
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn means(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.mean).collect()
    }

    pub fn lower(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.lower_bound).collect()
    }

    pub fn upper(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.upper_bound).collect()
    }

    pub fn widths(&self) -> Vec<f64> {
        self.points.iter().map(ForecastPoint::width).collect()
    }

    /// Sum of the mean forecast over the horizon.
    pub fn total_demand(&self) -> f64 {
        self.points.iter().map(|p| p.mean).sum()
    }

    /// Whether two forecasts cover the same dates in the same order.
    pub fn same_horizon(&self, other: &PointForecast) -> bool {
        self.points.len() == other.points.len()
            && self
                .points
                .iter()
                .zip(other.points.iter())
                .all(|(a, b)| a.date == b.date)
    }
}

/// A blended forecast plus the component forecasts it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledForecast {
    #[serde(flatten)]
    forecast: PointForecast,
    /// Normalized weights actually applied, by model name.
    weights: BTreeMap<String, f64>,
    component_forecasts: BTreeMap<String, PointForecast>,
    /// Models dropped from this run, with the error that excluded them.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    excluded_models: BTreeMap<String, ForecastError>,
}

impl ReconciledForecast {
    pub(crate) fn new(
        forecast: PointForecast,
        weights: BTreeMap<String, f64>,
        component_forecasts: BTreeMap<String, PointForecast>,
        excluded_models: BTreeMap<String, ForecastError>,
    ) -> Self {
        Self {
            forecast,
            weights,
            component_forecasts,
            excluded_models,
        }
    }

    /// The blended forecast.
    pub fn forecast(&self) -> &PointForecast {
        &self.forecast
    }

    pub fn weights(&self) -> &BTreeMap<String, f64> {
        &self.weights
    }

    pub fn component_forecasts(&self) -> &BTreeMap<String, PointForecast> {
        &self.component_forecasts
    }

    pub fn excluded_models(&self) -> &BTreeMap<String, ForecastError> {
        &self.excluded_models
    }

    pub fn into_forecast(self) -> PointForecast {
        self.forecast
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        PointForecast,
        BTreeMap<String, f64>,
        BTreeMap<String, PointForecast>,
    ) {
        (self.forecast, self.weights, self.component_forecasts)
    }
}

impl AsRef<PointForecast> for ReconciledForecast {
    fn as_ref(&self) -> &PointForecast {
        &self.forecast
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[test]
    fn forecast_from_series_assigns_contiguous_dates() {
        let fc = PointForecast::from_series(
            start(),
            0.95,
            &[10.0, 11.0, 12.0],
            &[8.0, 8.5, 9.0],
            &[12.0, 13.5, 15.0],
        )
        .unwrap();

        assert_eq!(fc.horizon(), 3);
        assert_eq!(fc.start_date(), start());
        assert_eq!(fc.end_date(), start() + Duration::days(2));
        assert_eq!(fc.means(), vec![10.0, 11.0, 12.0]);
        assert_eq!(fc.widths(), vec![4.0, 5.0, 6.0]);
        assert_eq!(fc.total_demand(), 33.0);
    }

    #[test]
    fn forecast_rejects_inverted_bounds() {
        let result = PointForecast::from_series(start(), 0.95, &[10.0], &[11.0], &[12.0]);
        assert!(matches!(result, Err(ForecastError::InvalidInput { .. })));
    }

    #[test]
    fn forecast_rejects_non_finite_values() {
        let result = PointForecast::from_series(start(), 0.95, &[f64::NAN], &[0.0], &[1.0]);
        assert!(result.is_err());
    }

    #[test]
    fn forecast_rejects_date_gaps() {
        let points = vec![
            ForecastPoint::new(start(), 1.0, 0.0, 2.0),
            ForecastPoint::new(start() + Duration::days(2), 1.0, 0.0, 2.0),
        ];
        assert!(PointForecast::new(0.95, points).is_err());
    }

    #[test]
    fn forecast_rejects_bad_confidence_level() {
        assert!(PointForecast::from_series(start(), 1.0, &[1.0], &[0.0], &[2.0]).is_err());
        assert!(PointForecast::from_series(start(), 0.0, &[1.0], &[0.0], &[2.0]).is_err());
    }

    #[test]
    fn forecast_rejects_empty_horizon() {
        assert!(PointForecast::new(0.95, vec![]).is_err());
    }

    #[test]
    fn deserialization_enforces_invariants() {
        let fc = PointForecast::from_series(start(), 0.9, &[5.0, 6.0], &[4.0, 4.0], &[6.0, 8.0])
            .unwrap();
        let json = serde_json::to_string(&fc).unwrap();
        let back: PointForecast = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fc);

        let broken = json.replace("\"lower_bound\":4.0", "\"lower_bound\":9.0");
        assert!(serde_json::from_str::<PointForecast>(&broken).is_err());
    }

    #[test]
    fn same_horizon_compares_dates() {
        let a = PointForecast::from_series(start(), 0.95, &[1.0, 1.0], &[0.0, 0.0], &[2.0, 2.0])
            .unwrap();
        let b = PointForecast::from_series(
            start() + Duration::days(1),
            0.95,
            &[1.0, 1.0],
            &[0.0, 0.0],
            &[2.0, 2.0],
        )
        .unwrap();
        assert!(a.same_horizon(&a.clone()));
        assert!(!a.same_horizon(&b));
    }
}
