//! Data models for the skycast application
//!
//! This module contains the core value types organized by concern:
//! - Feature: feature vector, versioned feature schema and regression targets
//! - Record: raw and cleaned historical observations
//! - Forecast: seed observation and projected forecast steps

pub mod feature;
pub mod forecast;
pub mod record;

// Re-export all public types for convenient access
pub use feature::{FEATURE_COUNT, FEATURE_NAMES, FeatureSchema, FeatureVector, SCHEMA_VERSION, Target, day_of_year};
pub use forecast::{Forecast, ForecastStep, SeedObservation};
pub use record::{HistoricalRecord, RawRecord};
