//! Inventory optimization on top of a demand forecast.

mod optimizer;
mod recommendation;

pub use optimizer::{CostParameters, InventoryOptimizer, OptimizerConfig, ReorderPointBreakdown};
pub use recommendation::{
    InventoryHealthSummary, InventoryStatus, ReorderRecommendation, StockoutHorizon,
};
