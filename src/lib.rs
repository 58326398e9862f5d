//! `skycast` - Next-day weather forecasting from daily history
//!
//! This library trains one regressor per target (maximum temperature, minimum
//! temperature, relative humidity) on day-to-next-day pairs, stores them, and
//! rolls them forward from a live observation into a multi-day forecast.

pub mod config;
pub mod dataset;
pub mod ensemble;
pub mod error;
pub mod forecast_service;
pub mod forecaster;
pub mod history;
pub mod logging;
pub mod models;
pub mod regressor;
pub mod store;
pub mod weather;

// Re-export core types for public API
pub use config::SkycastConfig;
pub use dataset::{DatasetSummary, PreparedDataset};
pub use ensemble::{EnsembleTrainer, ModelEnsemble, TrainedModel, TrainingReport};
pub use error::SkycastError;
pub use forecast_service::{ForecastService, TrainingService};
pub use forecaster::Forecaster;
pub use models::{FeatureSchema, FeatureVector, Forecast, ForecastStep, SeedObservation, Target};
pub use regressor::{ForestConfig, RandomForest, Regressor};
pub use store::ModelStore;
pub use weather::{ObservationSource, OpenWeatherClient};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, SkycastError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
