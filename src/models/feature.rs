//! Feature vector, feature schema and regression targets
//!
//! The schema is the contract between training and inference: every model is
//! trained on rows produced by [`FeatureVector::to_row`] and every forecast
//! step feeds rows produced by the same function. Numeric models have no
//! column names at prediction time, so field order lives here and nowhere else.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of numeric inputs a model consumes
pub const FEATURE_COUNT: usize = 4;

/// Ordered input field names of the current schema
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = ["max_temp", "min_temp", "humidity", "day_of_year"];

/// Current schema version. Bump on any change to [`FEATURE_NAMES`] or to how a
/// field is derived; stored models with another version stop loading.
pub const SCHEMA_VERSION: u32 = 1;

/// Day of the year for a calendar date, in `1..=366`
#[must_use]
pub fn day_of_year(date: NaiveDate) -> u32 {
    date.ordinal()
}

/// One model input row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Daily maximum temperature in Celsius
    pub max_temp: f64,
    /// Daily minimum temperature in Celsius
    pub min_temp: f64,
    /// Relative humidity in percent
    pub humidity: f64,
    /// Day of year of the observation date (1-366)
    pub day_of_year: u32,
}

impl FeatureVector {
    /// Build a feature vector for an observation taken on `date`
    #[must_use]
    pub fn observed(date: NaiveDate, max_temp: f64, min_temp: f64, humidity: f64) -> Self {
        Self {
            max_temp,
            min_temp,
            humidity,
            day_of_year: day_of_year(date),
        }
    }

    /// Numeric row in schema order
    #[must_use]
    pub fn to_row(&self) -> [f64; FEATURE_COUNT] {
        [
            self.max_temp,
            self.min_temp,
            self.humidity,
            f64::from(self.day_of_year),
        ]
    }

    /// Whether `day_of_year` is inside `1..=366`
    #[must_use]
    pub fn has_valid_day_of_year(&self) -> bool {
        (1..=366).contains(&self.day_of_year)
    }

    /// Value of the field a target predicts
    #[must_use]
    pub fn value_of(&self, target: Target) -> f64 {
        match target {
            Target::MaxTemp => self.max_temp,
            Target::MinTemp => self.min_temp,
            Target::Humidity => self.humidity,
        }
    }
}

/// Ordered, versioned description of the model inputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: u32,
    pub names: Vec<String>,
}

impl FeatureSchema {
    /// Schema compiled into this build
    #[must_use]
    pub fn current() -> Self {
        Self {
            version: SCHEMA_VERSION,
            names: FEATURE_NAMES.iter().map(|name| (*name).to_string()).collect(),
        }
    }

    /// Compare a stored schema against this one, describing the first difference
    pub fn check_compatible(&self, version: u32, names: &[String]) -> Result<(), String> {
        if version != self.version {
            return Err(format!(
                "schema version {version} does not match expected version {}",
                self.version
            ));
        }
        if names != self.names.as_slice() {
            return Err(format!(
                "feature layout [{}] does not match expected [{}]",
                names.join(", "),
                self.names.join(", ")
            ));
        }
        Ok(())
    }
}

/// The three regression targets, all predicted from the same features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    MaxTemp,
    MinTemp,
    Humidity,
}

impl Target {
    /// All targets in the order models are trained, stored and invoked
    pub const ALL: [Target; 3] = [Target::MaxTemp, Target::MinTemp, Target::Humidity];

    /// Short target name used by the model store
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Target::MaxTemp => "max",
            Target::MinTemp => "min",
            Target::Humidity => "humidity",
        }
    }

    /// Artifact file stem for this target
    #[must_use]
    pub fn artifact_stem(self) -> &'static str {
        match self {
            Target::MaxTemp => "model_max_temp",
            Target::MinTemp => "model_min_temp",
            Target::Humidity => "model_humidity",
        }
    }

    /// Parse a short target name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|target| target.name() == name)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case(date(2021, 1, 1), 1)]
    #[case(date(2021, 12, 31), 365)]
    #[case(date(2020, 12, 31), 366)]
    #[case(date(2020, 3, 1), 61)]
    #[case(date(2021, 3, 1), 60)]
    fn test_day_of_year(#[case] day: NaiveDate, #[case] expected: u32) {
        assert_eq!(day_of_year(day), expected);
    }

    #[test]
    fn test_row_follows_schema_order() {
        let features = FeatureVector::observed(date(2022, 7, 19), 32.0, 26.0, 78.0);
        assert_eq!(features.day_of_year, 200);
        assert_eq!(features.to_row(), [32.0, 26.0, 78.0, 200.0]);
        assert_eq!(FeatureSchema::current().names, FEATURE_NAMES);
    }

    #[test]
    fn test_schema_compatibility() {
        let schema = FeatureSchema::current();
        assert!(schema.check_compatible(SCHEMA_VERSION, &schema.names).is_ok());

        let err = schema.check_compatible(SCHEMA_VERSION + 1, &schema.names).unwrap_err();
        assert!(err.contains("schema version"));

        let reordered: Vec<String> = ["min_temp", "max_temp", "humidity", "day_of_year"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let err = schema.check_compatible(SCHEMA_VERSION, &reordered).unwrap_err();
        assert!(err.contains("feature layout"));
    }

    #[test]
    fn test_target_names() {
        for target in Target::ALL {
            assert_eq!(Target::from_name(target.name()), Some(target));
        }
        assert_eq!(Target::from_name("pressure"), None);
        assert_eq!(Target::Humidity.artifact_stem(), "model_humidity");
    }

    #[test]
    fn test_day_of_year_range_check() {
        let mut features = FeatureVector::observed(date(2020, 12, 31), 20.0, 10.0, 50.0);
        assert!(features.has_valid_day_of_year());
        features.day_of_year = 367;
        assert!(!features.has_valid_day_of_year());
        features.day_of_year = 0;
        assert!(!features.has_valid_day_of_year());
    }
}
