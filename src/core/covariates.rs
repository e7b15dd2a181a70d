//! Declared regressors and their numeric encoding.
//!
//! Categorical covariates are one-hot encoded against a reference level
//! (sunny weather, winter season) so that the regression design stays full rank.

use super::observation::{MarketConditions, Season, WeatherCategory};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// A covariate that models may regress demand on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Covariate {
    Price,
    DiscountPct,
    Promotion,
    Weather,
    Season,
    CompetitorPrice,
}

impl Covariate {
    /// Covariates every dataset carries.
    pub const ALWAYS_AVAILABLE: [Covariate; 5] = [
        Covariate::Price,
        Covariate::DiscountPct,
        Covariate::Promotion,
        Covariate::Weather,
        Covariate::Season,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Covariate::Price => "price",
            Covariate::DiscountPct => "discount_pct",
            Covariate::Promotion => "promotion",
            Covariate::Weather => "weather",
            Covariate::Season => "season",
            Covariate::CompetitorPrice => "competitor_price",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "price" => Some(Covariate::Price),
            "discount_pct" => Some(Covariate::DiscountPct),
            "promotion" => Some(Covariate::Promotion),
            "weather" => Some(Covariate::Weather),
            "season" => Some(Covariate::Season),
            "competitor_price" => Some(Covariate::CompetitorPrice),
            _ => None,
        }
    }

    /// Names of the design-matrix columns this covariate expands into.
    pub fn columns(&self) -> Vec<String> {
        match self {
            Covariate::Weather => WeatherCategory::ALL[1..]
                .iter()
                .map(|w| format!("weather_{}", w.as_str()))
                .collect(),
            Covariate::Season => Season::ALL[1..]
                .iter()
                .map(|s| format!("season_{}", s.as_str()))
                .collect(),
            other => vec![other.name().to_string()],
        }
    }

    /// Encode the covariate for one day.
    ///
    /// `competitor_price` must already be resolved; a missing value encodes as NaN.
    pub fn encode(&self, date: NaiveDate, conditions: &MarketConditions) -> Vec<f64> {
        match self {
            Covariate::Price => vec![conditions.price],
            Covariate::DiscountPct => vec![conditions.discount_pct],
            Covariate::Promotion => vec![if conditions.promotion { 1.0 } else { 0.0 }],
            Covariate::Weather => WeatherCategory::ALL[1..]
                .iter()
                .map(|w| indicator(conditions.weather == *w))
                .collect(),
            Covariate::Season => {
                let season = Season::from_month(date.month());
                Season::ALL[1..]
                    .iter()
                    .map(|s| indicator(season == *s))
                    .collect()
            }
            Covariate::CompetitorPrice => vec![conditions.competitor_price.unwrap_or(f64::NAN)],
        }
    }
}

fn indicator(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

/// The regressors requested for a forecast, plus an optional future scenario.
///
/// Horizon days without a scenario entry hold the last observed conditions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegressorSet {
    names: Vec<String>,
    #[serde(default)]
    scenario: Vec<MarketConditions>,
}

impl RegressorSet {
    /// No regressors: models use only trend and seasonality or lagged demand.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.sort();
        names.dedup();
        Self {
            names,
            scenario: Vec::new(),
        }
    }

    /// Attach planned market conditions for the first horizon days.
    pub fn with_scenario(mut self, scenario: Vec<MarketConditions>) -> Self {
        self.scenario = scenario;
        self
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn scenario(&self) -> &[MarketConditions] {
        &self.scenario
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
