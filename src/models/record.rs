//! Historical daily observations

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::feature::{FeatureVector, Target};

/// A row as read from a historical source, before cleaning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub date: NaiveDate,
    pub max_temp: Option<f64>,
    pub min_temp: Option<f64>,
    pub humidity: Option<f64>,
}

impl RawRecord {
    /// Complete record, or `None` when any field is missing or not finite
    #[must_use]
    pub fn complete(&self) -> Option<HistoricalRecord> {
        let finite = |value: Option<f64>| value.filter(|v| v.is_finite());
        Some(HistoricalRecord {
            date: self.date,
            max_temp: finite(self.max_temp)?,
            min_temp: finite(self.min_temp)?,
            humidity: finite(self.humidity)?,
        })
    }
}

/// One fully observed day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub date: NaiveDate,
    /// Maximum temperature in Celsius
    pub max_temp: f64,
    /// Minimum temperature in Celsius
    pub min_temp: f64,
    /// Relative humidity in percent
    pub humidity: f64,
}

impl HistoricalRecord {
    #[must_use]
    pub fn new(date: NaiveDate, max_temp: f64, min_temp: f64, humidity: f64) -> Self {
        Self {
            date,
            max_temp,
            min_temp,
            humidity,
        }
    }

    /// Feature vector for this day; `day_of_year` comes from this record's own date
    #[must_use]
    pub fn features(&self) -> FeatureVector {
        FeatureVector::observed(self.date, self.max_temp, self.min_temp, self.humidity)
    }

    /// Observed value of a target variable
    #[must_use]
    pub fn value_of(&self, target: Target) -> f64 {
        match target {
            Target::MaxTemp => self.max_temp,
            Target::MinTemp => self.min_temp,
            Target::Humidity => self.humidity,
        }
    }
}
