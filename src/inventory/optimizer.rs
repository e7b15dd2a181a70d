//! Reorder point, safety stock and economic order quantity.
//!
//! Demand variability is the sample standard deviation (n - 1) of the
//! forecast means over the lead time; a one-day lead time has zero spread.
//! Negative forecast means are read as zero demand.
//!
//! The reorder point never falls as the lead time grows when the safety
//! factor is zero. With a positive safety factor the spread term can shrink
//! for a longer window, so only the lead-time demand is monotone.

use super::recommendation::{
    InventoryHealthSummary, InventoryStatus, ReorderRecommendation, StockoutHorizon,
};
use crate::core::{PointForecast, SeriesKey};
use crate::error::{ForecastError, Result};
use crate::utils::{mean, sample_std};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Cost inputs for the economic order quantity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostParameters {
    /// Fixed cost per order placed.
    pub ordering_cost: f64,
    /// Annual holding cost as a fraction of unit cost, in [0, 1].
    pub holding_cost_rate: f64,
    pub unit_cost: f64,
}

impl CostParameters {
    pub fn new(ordering_cost: f64, holding_cost_rate: f64, unit_cost: f64) -> Self {
        Self {
            ordering_cost,
            holding_cost_rate,
            unit_cost,
        }
    }
}

/// Defaults used when a request leaves inventory parameters unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub lead_time_days: usize,
    pub safety_factor: f64,
    pub high_risk_days_threshold: f64,
    /// Days used to annualize average daily demand for EOQ.
    pub days_per_year: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            lead_time_days: 7,
            safety_factor: 1.65,
            high_risk_days_threshold: 7.0,
            days_per_year: 365.0,
        }
    }
}

impl OptimizerConfig {
    pub fn with_lead_time(mut self, days: usize) -> Self {
        self.lead_time_days = days;
        self
    }

    pub fn with_safety_factor(mut self, factor: f64) -> Self {
        self.safety_factor = factor;
        self
    }

    pub fn with_high_risk_threshold(mut self, days: f64) -> Self {
        self.high_risk_days_threshold = days;
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_lead_time(self.lead_time_days)?;
        check_safety_factor(self.safety_factor)?;
        if !self.high_risk_days_threshold.is_finite() || self.high_risk_days_threshold < 0.0 {
            return Err(ForecastError::invalid(
                "high_risk_days_threshold",
                self.high_risk_days_threshold,
            ));
        }
        if !self.days_per_year.is_finite() || self.days_per_year <= 0.0 {
            return Err(ForecastError::invalid("days_per_year", self.days_per_year));
        }
        Ok(())
    }
}

/// Intermediate values of a reorder point calculation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReorderPointBreakdown {
    /// Mean forecast demand over the lead time.
    pub average_daily_demand: f64,
    pub demand_std: f64,
    pub lead_time_demand: f64,
    pub safety_stock: f64,
    pub reorder_point: f64,
}

/// Stateless inventory calculations.
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryOptimizer {
    days_per_year: f64,
}

impl InventoryOptimizer {
    pub fn new() -> Self {
        Self {
            days_per_year: OptimizerConfig::default().days_per_year,
        }
    }

    pub fn from_config(config: &OptimizerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            days_per_year: config.days_per_year,
        })
    }

    /// Reorder point for the first `lead_time_days` of the forecast.
    ///
    /// `average_daily_demand * lead_time_days + safety_factor * demand_std * sqrt(lead_time_days)`
    pub fn reorder_point(
        &self,
        forecast: &PointForecast,
        lead_time_days: usize,
        safety_factor: f64,
    ) -> Result<f64> {
        Ok(self
            .reorder_point_breakdown(forecast, lead_time_days, safety_factor)?
            .reorder_point)
    }

    pub fn reorder_point_breakdown(
        &self,
        forecast: &PointForecast,
        lead_time_days: usize,
        safety_factor: f64,
    ) -> Result<ReorderPointBreakdown> {
        check_lead_time(lead_time_days)?;
        check_safety_factor(safety_factor)?;
        if forecast.horizon() < lead_time_days {
            return Err(ForecastError::InsufficientHorizon {
                needed: lead_time_days,
                got: forecast.horizon(),
            });
        }

        let window: Vec<f64> = forecast.means()[..lead_time_days]
            .iter()
            .map(|m| m.max(0.0))
            .collect();
        let average_daily_demand = mean(&window);
        let demand_std = sample_std(&window);
        let lead_time = lead_time_days as f64;
        let lead_time_demand = average_daily_demand * lead_time;
        let safety_stock = safety_factor * demand_std * lead_time.sqrt();

        Ok(ReorderPointBreakdown {
            average_daily_demand,
            demand_std,
            lead_time_demand,
            safety_stock,
            reorder_point: lead_time_demand + safety_stock,
        })
    }

    /// Economic order quantity `sqrt(2 * D * S / (h * c))`.
    pub fn economic_order_quantity(
        &self,
        annual_demand: f64,
        ordering_cost: f64,
        holding_cost_rate: f64,
        unit_cost: f64,
    ) -> Result<f64> {
        if !annual_demand.is_finite() || annual_demand < 0.0 {
            return Err(ForecastError::invalid("annual_demand", annual_demand));
        }
        if !ordering_cost.is_finite() || ordering_cost < 0.0 {
            return Err(ForecastError::invalid("ordering_cost", ordering_cost));
        }
        let holding_cost = holding_cost_rate * unit_cost;
        let rate_in_range = (0.0..=1.0).contains(&holding_cost_rate);
        if !rate_in_range || !unit_cost.is_finite() || holding_cost.is_nan() || holding_cost <= 0.0 {
            return Err(ForecastError::InvalidCostParameters {
                holding_cost_rate,
                unit_cost,
            });
        }
        Ok((2.0 * annual_demand * ordering_cost / holding_cost).sqrt())
    }

    /// Build a recommendation from current stock and a demand forecast.
    ///
    /// Invalid cost parameters do not fail the evaluation: the order quantity
    /// is left out and the error is kept on the recommendation.
    pub fn evaluate(
        &self,
        key: &SeriesKey,
        current_stock: f64,
        forecast: &PointForecast,
        lead_time_days: usize,
        safety_factor: f64,
        cost: Option<&CostParameters>,
    ) -> Result<ReorderRecommendation> {
        if !current_stock.is_finite() || current_stock < 0.0 {
            return Err(ForecastError::invalid("current_stock", current_stock));
        }
        let breakdown = self.reorder_point_breakdown(forecast, lead_time_days, safety_factor)?;
        let average_daily_demand = mean(&forecast.means());

        let days_until_stockout = if average_daily_demand > 0.0 {
            StockoutHorizon::Days(current_stock / average_daily_demand)
        } else {
            StockoutHorizon::Unbounded
        };

        let (optimal_order_quantity, order_quantity_error) = match cost {
            None => (None, None),
            Some(c) => {
                let annual_demand = average_daily_demand.max(0.0) * self.days_per_year;
                match self.economic_order_quantity(
                    annual_demand,
                    c.ordering_cost,
                    c.holding_cost_rate,
                    c.unit_cost,
                ) {
                    Ok(q) => (Some(q), None),
                    Err(err) => {
                        warn!(series = %key, error = %err, "omitting order quantity");
                        (None, Some(err))
                    }
                }
            }
        };

        let status = if current_stock == 0.0 {
            InventoryStatus::OutOfStock
        } else if current_stock <= breakdown.reorder_point {
            InventoryStatus::ReorderNeeded
        } else {
            InventoryStatus::Sufficient
        };

        let reorder_quantity = if status.needs_reorder() {
            optimal_order_quantity
                .unwrap_or(0.0)
                .max(breakdown.reorder_point - current_stock)
                .max(0.0)
        } else {
            0.0
        };
        let unit_cost = cost.map(|c| c.unit_cost).filter(|u| u.is_finite());

        Ok(ReorderRecommendation {
            product_id: key.product_id.clone(),
            location_id: key.location_id.clone(),
            current_stock,
            reorder_point: breakdown.reorder_point,
            safety_stock: breakdown.safety_stock,
            optimal_order_quantity,
            average_daily_demand,
            days_until_stockout,
            status,
            reorder_quantity,
            demand_std: breakdown.demand_std,
            lead_time_days,
            unit_cost,
            reorder_value: unit_cost.map(|u| reorder_quantity * u),
            order_quantity_error,
        })
    }

    /// Aggregate recommendations into a health summary.
    pub fn summarize(
        &self,
        recommendations: &[ReorderRecommendation],
        high_risk_days_threshold: f64,
    ) -> InventoryHealthSummary {
        InventoryHealthSummary::from_recommendations(recommendations, high_risk_days_threshold)
    }
}

impl Default for InventoryOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

fn check_lead_time(lead_time_days: usize) -> Result<()> {
    if lead_time_days == 0 {
        return Err(ForecastError::invalid("lead_time_days", lead_time_days));
    }
    Ok(())
}

fn check_safety_factor(safety_factor: f64) -> Result<()> {
    if !safety_factor.is_finite() || safety_factor < 0.0 {
        return Err(ForecastError::invalid("safety_factor", safety_factor));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PointForecast;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn forecast(means: &[f64]) -> PointForecast {
        let lower: Vec<f64> = means.iter().map(|m| m - 1.0).collect();
        let upper: Vec<f64> = means.iter().map(|m| m + 1.0).collect();
        PointForecast::from_series(
            NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            0.95,
            means,
            &lower,
            &upper,
        )
        .unwrap()
    }

    fn key() -> SeriesKey {
        SeriesKey::new("SKU-7", "WH-1")
    }

    #[test]
    fn test_constant_demand_reorder_point() {
        let opt = InventoryOptimizer::new();
        let fc = forecast(&[10.0; 30]);
        let b = opt.reorder_point_breakdown(&fc, 7, 1.5).unwrap();

        assert_eq!(b.demand_std, 0.0);
        assert_eq!(b.safety_stock, 0.0);
        assert_relative_eq!(b.reorder_point, 70.0, epsilon = 1e-12);
    }

    #[test]
    fn test_reorder_point_with_variability() {
        let opt = InventoryOptimizer::new();
        // sample std of [8, 12] is sqrt(8)
        let fc = forecast(&[8.0, 12.0, 100.0]);
        let rp = opt.reorder_point(&fc, 2, 2.0).unwrap();
        assert_relative_eq!(rp, 20.0 + 2.0 * 8f64.sqrt() * 2f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_single_day_lead_time_has_zero_spread() {
        let opt = InventoryOptimizer::new();
        let b = opt.reorder_point_breakdown(&forecast(&[5.0, 50.0]), 1, 3.0).unwrap();
        assert_eq!(b.safety_stock, 0.0);
        assert_eq!(b.reorder_point, 5.0);
    }

    #[test]
    fn test_negative_means_count_as_zero_demand() {
        let opt = InventoryOptimizer::new();
        let b = opt.reorder_point_breakdown(&forecast(&[-4.0, 6.0, 9.0]), 2, 0.0).unwrap();
        assert_relative_eq!(b.lead_time_demand, 6.0, epsilon = 1e-12);
        assert_relative_eq!(b.average_daily_demand, 3.0, epsilon = 1e-12);
        assert_relative_eq!(b.demand_std, 18f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_lead_time_monotonicity_needs_zero_safety_factor() {
        let opt = InventoryOptimizer::new();
        let fc = forecast(&[0.0, 100.0, 50.0, 50.0]);

        // the spread term shrinks from L=2 to L=3, outweighing the extra day
        let short = opt.reorder_point(&fc, 2, 5.0).unwrap();
        let long = opt.reorder_point(&fc, 3, 5.0).unwrap();
        assert!(long < short);

        let short = opt.reorder_point(&fc, 2, 0.0).unwrap();
        let long = opt.reorder_point(&fc, 3, 0.0).unwrap();
        assert_relative_eq!(short, 100.0, epsilon = 1e-12);
        assert_relative_eq!(long, 150.0, epsilon = 1e-12);
    }

    #[test]
    fn test_horizon_shorter_than_lead_time() {
        let opt = InventoryOptimizer::new();
        let err = opt.reorder_point(&forecast(&[1.0; 5]), 7, 1.0).unwrap_err();
        assert_eq!(err, ForecastError::InsufficientHorizon { needed: 7, got: 5 });
    }

    #[test]
    fn test_reorder_point_rejects_bad_inputs() {
        let opt = InventoryOptimizer::new();
        let fc = forecast(&[1.0; 5]);
        assert!(opt.reorder_point(&fc, 0, 1.0).is_err());
        assert!(opt.reorder_point(&fc, 3, -0.5).is_err());
    }

    #[test]
    fn test_eoq_textbook_example() {
        let opt = InventoryOptimizer::new();
        let q = opt.economic_order_quantity(1200.0, 50.0, 0.2, 10.0).unwrap();
        assert_relative_eq!(q, 244.95, epsilon = 0.01);
    }

    #[test]
    fn test_eoq_zero_demand() {
        let opt = InventoryOptimizer::new();
        assert_eq!(opt.economic_order_quantity(0.0, 50.0, 0.2, 10.0).unwrap(), 0.0);
    }

    #[test]
    fn test_eoq_zero_holding_rate() {
        let opt = InventoryOptimizer::new();
        let err = opt.economic_order_quantity(1200.0, 50.0, 0.0, 10.0).unwrap_err();
        assert_eq!(
            err,
            ForecastError::InvalidCostParameters {
                holding_cost_rate: 0.0,
                unit_cost: 10.0,
            }
        );
        assert!(opt.economic_order_quantity(1200.0, 50.0, 1.5, 10.0).is_err());
        assert!(opt.economic_order_quantity(1200.0, 50.0, 0.2, 0.0).is_err());
    }

    #[test]
    fn test_evaluate_out_of_stock() {
        let opt = InventoryOptimizer::new();
        let rec = opt
            .evaluate(&key(), 0.0, &forecast(&[0.0; 10]), 7, 1.5, None)
            .unwrap();
        assert_eq!(rec.status, InventoryStatus::OutOfStock);
        assert!(rec.days_until_stockout.is_unbounded());
        assert_eq!(rec.reorder_quantity, 0.0);
    }

    #[test]
    fn test_evaluate_zero_demand_is_unbounded() {
        let opt = InventoryOptimizer::new();
        let rec = opt
            .evaluate(&key(), 40.0, &forecast(&[0.0; 10]), 7, 1.5, None)
            .unwrap();
        assert_eq!(rec.days_until_stockout, StockoutHorizon::Unbounded);
        assert_eq!(rec.status, InventoryStatus::Sufficient);
    }

    #[test]
    fn test_evaluate_reorder_needed_with_costs() {
        let opt = InventoryOptimizer::new();
        let cost = CostParameters::new(50.0, 0.2, 10.0);
        let rec = opt
            .evaluate(&key(), 30.0, &forecast(&[10.0; 14]), 7, 1.5, Some(&cost))
            .unwrap();

        assert_eq!(rec.status, InventoryStatus::ReorderNeeded);
        assert_relative_eq!(rec.reorder_point, 70.0, epsilon = 1e-12);
        assert_relative_eq!(rec.average_daily_demand, 10.0, epsilon = 1e-12);
        assert_eq!(rec.days_until_stockout, StockoutHorizon::Days(3.0));
        // annual demand 3650 -> EOQ sqrt(2 * 3650 * 50 / 2)
        let eoq = (2.0f64 * 3650.0 * 50.0 / 2.0).sqrt();
        assert_relative_eq!(rec.optimal_order_quantity.unwrap(), eoq, epsilon = 1e-9);
        assert_relative_eq!(rec.reorder_quantity, eoq, epsilon = 1e-9);
        assert_relative_eq!(rec.reorder_value.unwrap(), eoq * 10.0, epsilon = 1e-9);
        assert_eq!(rec.product_id, "SKU-7");
    }

    #[test]
    fn test_evaluate_keeps_invalid_cost_error() {
        let opt = InventoryOptimizer::new();
        let cost = CostParameters::new(50.0, 0.0, 10.0);
        let rec = opt
            .evaluate(&key(), 30.0, &forecast(&[10.0; 14]), 7, 1.5, Some(&cost))
            .unwrap();

        assert_eq!(rec.optimal_order_quantity, None);
        assert!(matches!(
            rec.order_quantity_error,
            Some(ForecastError::InvalidCostParameters { .. })
        ));
        // falls back to the gap up to the reorder point
        assert_relative_eq!(rec.reorder_quantity, 40.0, epsilon = 1e-12);
    }

    #[test]
    fn test_evaluate_rejects_negative_stock() {
        let opt = InventoryOptimizer::new();
        let err = opt
            .evaluate(&key(), -1.0, &forecast(&[1.0; 7]), 7, 1.0, None)
            .unwrap_err();
        assert!(matches!(err, ForecastError::InvalidInput { .. }));
    }

    #[test]
    fn test_summarize() {
        let opt = InventoryOptimizer::new();
        let cost = CostParameters::new(20.0, 0.25, 4.0);
        let recs = vec![
            opt.evaluate(&key(), 0.0, &forecast(&[5.0; 10]), 7, 1.0, Some(&cost))
                .unwrap(),
            opt.evaluate(&key(), 20.0, &forecast(&[5.0; 10]), 7, 1.0, Some(&cost))
                .unwrap(),
            opt.evaluate(&key(), 500.0, &forecast(&[5.0; 10]), 7, 1.0, Some(&cost))
                .unwrap(),
            opt.evaluate(&key(), 10.0, &forecast(&[0.0; 10]), 7, 1.0, None)
                .unwrap(),
        ];
        let summary = opt.summarize(&recs, 7.0);

        assert_eq!(summary.total_products, 4);
        assert_eq!(summary.products_needing_reorder, 2);
        assert_relative_eq!(summary.reorder_percentage, 50.0, epsilon = 1e-12);
        // 0 and 4 days of cover are below 7; 100 days and unbounded are not
        assert_eq!(summary.high_risk_products, 2);
        assert_relative_eq!(
            summary.average_days_until_stockout.unwrap(),
            (0.0 + 4.0 + 100.0) / 3.0,
            epsilon = 1e-12
        );
        let expected_value: f64 = recs.iter().filter_map(|r| r.reorder_value).sum();
        assert_relative_eq!(summary.total_reorder_value, expected_value, epsilon = 1e-12);
        assert!(summary.total_reorder_value > 0.0);
    }

    #[test]
    fn test_config_validation() {
        assert!(OptimizerConfig::default().validate().is_ok());
        assert!(OptimizerConfig::default().with_lead_time(0).validate().is_err());
        assert!(InventoryOptimizer::from_config(&OptimizerConfig::default().with_safety_factor(-1.0)).is_err());
    }
}
