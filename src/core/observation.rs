//! Daily observations and the covariates attached to them.

use crate::error::{ForecastError, Result};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Weather condition recorded for a trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCategory {
    #[default]
    Sunny,
    Cloudy,
    Rainy,
    Snowy,
}

impl WeatherCategory {
    /// All categories, reference level first.
    pub const ALL: [WeatherCategory; 4] = [
        WeatherCategory::Sunny,
        WeatherCategory::Cloudy,
        WeatherCategory::Rainy,
        WeatherCategory::Snowy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherCategory::Sunny => "sunny",
            WeatherCategory::Cloudy => "cloudy",
            WeatherCategory::Rainy => "rainy",
            WeatherCategory::Snowy => "snowy",
        }
    }
}

/// Meteorological season (northern hemisphere).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    /// All seasons, reference level first.
    pub const ALL: [Season; 4] = [Season::Winter, Season::Spring, Season::Summer, Season::Autumn];

    pub fn from_month(month: u32) -> Self {
        match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Autumn,
            _ => Season::Winter,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
        }
    }
}

/// Calendar features derived from a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarFeatures {
    /// Monday = 0 .. Sunday = 6.
    pub day_of_week: u32,
    pub day_of_year: u32,
    pub month: u32,
    pub is_weekend: bool,
    pub season: Season,
}

impl CalendarFeatures {
    pub fn from_date(date: NaiveDate) -> Self {
        let weekday = date.weekday();
        Self {
            day_of_week: weekday.num_days_from_monday(),
            day_of_year: date.ordinal(),
            month: date.month(),
            is_weekend: matches!(weekday, Weekday::Sat | Weekday::Sun),
            season: Season::from_month(date.month()),
        }
    }
}

/// Market conditions on a given day: everything about a day except its demand.
///
/// Also used to describe future days in a covariate scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConditions {
    pub price: f64,
    /// Discount in percent, 0..=100.
    pub discount_pct: f64,
    pub promotion: bool,
    pub weather: WeatherCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competitor_price: Option<f64>,
}

impl Default for MarketConditions {
    fn default() -> Self {
        Self {
            price: 0.0,
            discount_pct: 0.0,
            promotion: false,
            weather: WeatherCategory::Sunny,
            competitor_price: None,
        }
    }
}

impl MarketConditions {
    pub fn new(price: f64) -> Self {
        Self {
            price,
            ..Default::default()
        }
    }

    pub fn with_discount(mut self, discount_pct: f64) -> Self {
        self.discount_pct = discount_pct;
        self
    }

    pub fn with_promotion(mut self, promotion: bool) -> Self {
        self.promotion = promotion;
        self
    }

    pub fn with_weather(mut self, weather: WeatherCategory) -> Self {
        self.weather = weather;
        self
    }

    pub fn with_competitor_price(mut self, price: f64) -> Self {
        self.competitor_price = Some(price);
        self
    }

    pub(crate) fn validate(&self, date: NaiveDate) -> Result<()> {
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(ForecastError::invalid(
                format!("price on {date}"),
                self.price,
            ));
        }
        if !(0.0..=100.0).contains(&self.discount_pct) {
            return Err(ForecastError::invalid(
                format!("discount_pct on {date}"),
                self.discount_pct,
            ));
        }
        if let Some(cp) = self.competitor_price {
            if !cp.is_finite() || cp < 0.0 {
                return Err(ForecastError::invalid(
                    format!("competitor_price on {date}"),
                    cp,
                ));
            }
        }
        Ok(())
    }
}

/// One day of history for a product at a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub demand_units: f64,
    #[serde(default)]
    pub inventory_level_at_open: f64,
    #[serde(flatten)]
    pub conditions: MarketConditions,
}

impl Observation {
    pub fn new(date: NaiveDate, demand_units: f64, conditions: MarketConditions) -> Self {
        Self {
            date,
            demand_units,
            inventory_level_at_open: 0.0,
            conditions,
        }
    }

    pub fn with_inventory_level(mut self, level: f64) -> Self {
        self.inventory_level_at_open = level;
        self
    }

    pub fn calendar(&self) -> CalendarFeatures {
        CalendarFeatures::from_date(self.date)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !self.demand_units.is_finite() || self.demand_units < 0.0 {
            return Err(ForecastError::invalid(
                format!("demand_units on {}", self.date),
                self.demand_units,
            ));
        }
        if !self.inventory_level_at_open.is_finite() || self.inventory_level_at_open < 0.0 {
            return Err(ForecastError::invalid(
                format!("inventory_level_at_open on {}", self.date),
                self.inventory_level_at_open,
            ));
        }
        self.conditions.validate(self.date)
    }
}
