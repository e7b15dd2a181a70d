//! Ensemble weighting policies.

use super::tracker::PerformanceTracker;
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Smallest trailing error used for inverse-error weights.
pub const MIN_TRAILING_ERROR: f64 = 1e-10;

/// How raw ensemble weights are chosen before normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum WeightingPolicy {
    /// Every model gets `1 / M`.
    #[default]
    Equal,
    /// Fixed weights by model name; unlisted models get zero.
    Static { weights: BTreeMap<String, f64> },
    /// Weight proportional to the inverse trailing mean absolute error over
    /// the last `window` forecast/actual pairs.
    ///
    /// Models without history keep the equal share `1 / M`; the remaining
    /// mass is split among models with history in proportion to `1 / MAE`.
    /// A non-finite MAE gives zero weight.
    PerformanceBased { window: usize },
}

impl WeightingPolicy {
    pub fn validate(&self) -> Result<()> {
        match self {
            WeightingPolicy::Equal => Ok(()),
            WeightingPolicy::Static { weights } => {
                for (name, w) in weights {
                    if !w.is_finite() || *w < 0.0 {
                        return Err(ForecastError::invalid(format!("weight for {name}"), w));
                    }
                }
                Ok(())
            }
            WeightingPolicy::PerformanceBased { window } => {
                if *window == 0 {
                    Err(ForecastError::invalid("performance window", window))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Raw weights for the given models. Not necessarily normalized.
    pub fn weights(&self, models: &[String], tracker: &PerformanceTracker) -> BTreeMap<String, f64> {
        if models.is_empty() {
            return BTreeMap::new();
        }
        let equal = 1.0 / models.len() as f64;

        match self {
            WeightingPolicy::Equal => models.iter().map(|m| (m.clone(), equal)).collect(),
            WeightingPolicy::Static { weights } => models
                .iter()
                .map(|m| (m.clone(), weights.get(m).copied().unwrap_or(0.0)))
                .collect(),
            WeightingPolicy::PerformanceBased { window } => {
                let inverse: Vec<(String, Option<f64>)> = models
                    .iter()
                    .map(|m| {
                        let inv = tracker.trailing_mae(m, *window).map(|mae| {
                            if mae.is_finite() {
                                1.0 / mae.max(MIN_TRAILING_ERROR)
                            } else {
                                0.0
                            }
                        });
                        (m.clone(), inv)
                    })
                    .collect();

                let warm: Vec<f64> = inverse.iter().filter_map(|(_, inv)| *inv).collect();
                let warm_share = equal * warm.len() as f64;
                let warm_total: f64 = warm.iter().sum();

                inverse
                    .into_iter()
                    .map(|(m, inv)| {
                        let w = match inv {
                            None => equal,
                            Some(_) if warm_total <= 0.0 => 0.0,
                            Some(v) => warm_share * v / warm_total,
                        };
                        (m, w)
                    })
                    .collect()
            }
        }
    }
}
