//! Reorder recommendations and their aggregate health summary.

use crate::error::ForecastError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stock position relative to the reorder point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryStatus {
    Sufficient,
    ReorderNeeded,
    OutOfStock,
}

impl InventoryStatus {
    /// Whether an order should be placed now.
    pub fn needs_reorder(&self) -> bool {
        !matches!(self, InventoryStatus::Sufficient)
    }
}

impl fmt::Display for InventoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InventoryStatus::Sufficient => "stock sufficient",
            InventoryStatus::ReorderNeeded => "reorder needed",
            InventoryStatus::OutOfStock => "out of stock",
        };
        f.write_str(label)
    }
}

/// Days of cover at the forecast demand rate.
///
/// `Unbounded` when the forecast expects no demand, so stock never runs out.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockoutHorizon {
    Days(f64),
    Unbounded,
}

impl StockoutHorizon {
    pub fn days(&self) -> Option<f64> {
        match self {
            StockoutHorizon::Days(d) => Some(*d),
            StockoutHorizon::Unbounded => None,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, StockoutHorizon::Unbounded)
    }

    /// True only for a finite horizon strictly below `threshold` days.
    pub fn is_below(&self, threshold: f64) -> bool {
        self.days().is_some_and(|d| d < threshold)
    }
}

/// Inventory control parameters for one product at one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderRecommendation {
    pub product_id: String,
    pub location_id: String,
    pub current_stock: f64,
    pub reorder_point: f64,
    pub safety_stock: f64,
    /// Economic order quantity; absent when no cost parameters were given or
    /// they were invalid (see `order_quantity_error`).
    pub optimal_order_quantity: Option<f64>,
    /// Mean forecast demand over the whole horizon.
    pub average_daily_demand: f64,
    pub days_until_stockout: StockoutHorizon,
    pub status: InventoryStatus,
    /// Units to order now; zero when stock is sufficient.
    pub reorder_quantity: f64,
    /// Sample standard deviation of forecast demand over the lead time.
    pub demand_std: f64,
    pub lead_time_days: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_cost: Option<f64>,
    /// `reorder_quantity * unit_cost` when a unit cost is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reorder_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_quantity_error: Option<ForecastError>,
}

/// Aggregate view over a set of recommendations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryHealthSummary {
    pub total_products: usize,
    /// Recommendations with status `ReorderNeeded` or `OutOfStock`.
    pub products_needing_reorder: usize,
    /// Share of products needing reorder, in percent (0 for an empty set).
    pub reorder_percentage: f64,
    /// Products whose finite days of cover fall below the threshold.
    pub high_risk_products: usize,
    /// Mean over finite days of cover; `None` when every horizon is unbounded.
    pub average_days_until_stockout: Option<f64>,
    pub total_reorder_value: f64,
}

impl InventoryHealthSummary {
    /// Aggregate recommendations. Pure; the input is not modified.
    pub fn from_recommendations(
        recommendations: &[ReorderRecommendation],
        high_risk_days_threshold: f64,
    ) -> Self {
        let total_products = recommendations.len();
        let products_needing_reorder = recommendations
            .iter()
            .filter(|r| r.status.needs_reorder())
            .count();
        let reorder_percentage = if total_products == 0 {
            0.0
        } else {
            products_needing_reorder as f64 / total_products as f64 * 100.0
        };
        let high_risk_products = recommendations
            .iter()
            .filter(|r| r.days_until_stockout.is_below(high_risk_days_threshold))
            .count();

        let finite: Vec<f64> = recommendations
            .iter()
            .filter_map(|r| r.days_until_stockout.days())
            .collect();
        let average_days_until_stockout = if finite.is_empty() {
            None
        } else {
            Some(finite.iter().sum::<f64>() / finite.len() as f64)
        };

        let total_reorder_value = recommendations.iter().filter_map(|r| r.reorder_value).sum();

        Self {
            total_products,
            products_needing_reorder,
            reorder_percentage,
            high_risk_products,
            average_days_until_stockout,
            total_reorder_value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stockout_horizon_threshold() {
        assert!(StockoutHorizon::Days(2.0).is_below(3.0));
        assert!(!StockoutHorizon::Days(3.0).is_below(3.0));
        assert!(!StockoutHorizon::Unbounded.is_below(f64::INFINITY));
        assert_eq!(StockoutHorizon::Unbounded.days(), None);
    }

    #[test]
    fn test_stockout_horizon_serde() {
        let json = serde_json::to_string(&StockoutHorizon::Unbounded).unwrap();
        assert_eq!(json, "\"unbounded\"");
        let json = serde_json::to_string(&StockoutHorizon::Days(4.5)).unwrap();
        assert_eq!(json, "{\"days\":4.5}");
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(InventoryStatus::OutOfStock.to_string(), "out of stock");
        assert!(InventoryStatus::OutOfStock.needs_reorder());
        assert!(!InventoryStatus::Sufficient.needs_reorder());
        assert_eq!(
            serde_json::to_string(&InventoryStatus::ReorderNeeded).unwrap(),
            "\"reorder_needed\""
        );
    }

    #[test]
    fn test_empty_summary() {
        let summary = InventoryHealthSummary::from_recommendations(&[], 7.0);
        assert_eq!(summary.total_products, 0);
        assert_eq!(summary.reorder_percentage, 0.0);
        assert_eq!(summary.average_days_until_stockout, None);
        assert_eq!(summary.total_reorder_value, 0.0);
    }
}
