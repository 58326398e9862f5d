//! Forecast seed and output types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::feature::{FeatureVector, day_of_year};

/// The single real observation a forecast starts from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeedObservation {
    /// Date of the observation (forecast day 0)
    pub date: NaiveDate,
    /// Observed features for that date
    pub features: FeatureVector,
}

impl SeedObservation {
    #[must_use]
    pub fn new(date: NaiveDate, max_temp: f64, min_temp: f64, humidity: f64) -> Self {
        Self {
            date,
            features: FeatureVector::observed(date, max_temp, min_temp, humidity),
        }
    }

    /// Whether the feature `day_of_year` agrees with the seed date
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.features.day_of_year == day_of_year(self.date)
    }
}

/// One projected day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastStep {
    pub date: NaiveDate,
    /// Predicted maximum temperature in Celsius
    pub max_temp: f64,
    /// Predicted minimum temperature in Celsius
    pub min_temp: f64,
    /// Predicted relative humidity in percent
    pub humidity: f64,
}

impl ForecastStep {
    /// Feature vector the next day is predicted from
    #[must_use]
    pub fn features(&self) -> FeatureVector {
        FeatureVector::observed(self.date, self.max_temp, self.min_temp, self.humidity)
    }

    /// Physical plausibility: `max >= min` and humidity within 0-100 %.
    /// Models are independent, so this is not guaranteed.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.max_temp >= self.min_temp && (0.0..=100.0).contains(&self.humidity)
    }

    /// Format temperature range with unit
    #[must_use]
    pub fn format_temperatures(&self) -> String {
        format!("{:.1}°C / {:.1}°C", self.max_temp, self.min_temp)
    }

    /// Format humidity with unit
    #[must_use]
    pub fn format_humidity(&self) -> String {
        format!("{:.0}%", self.humidity)
    }
}

/// A complete forecast run for one city
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast {
    pub city: String,
    pub seed: SeedObservation,
    /// Projected days, `seed.date + 1` onwards
    pub steps: Vec<ForecastStep>,
    /// When this forecast was generated
    pub generated_at: DateTime<Utc>,
}

impl Forecast {
    #[must_use]
    pub fn new(city: String, seed: SeedObservation, steps: Vec<ForecastStep>) -> Self {
        Self {
            city,
            seed,
            steps,
            generated_at: Utc::now(),
        }
    }

    /// Steps that break `max >= min` or the humidity bounds
    #[must_use]
    pub fn inconsistent_days(&self) -> Vec<NaiveDate> {
        self.steps
            .iter()
            .filter(|step| !step.is_consistent())
            .map(|step| step.date)
            .collect()
    }
}
