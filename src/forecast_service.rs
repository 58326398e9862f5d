//! Training and forecast orchestration
//!
//! Wires the historical adapter, preparer, trainer and store together for
//! training, and the store, observation source and forecaster for forecasts.

use std::path::Path;

use tracing::{info, instrument, warn};

use crate::dataset::{self, DatasetSummary};
use crate::ensemble::{EnsembleTrainer, TrainingReport};
use crate::forecaster::Forecaster;
use crate::history;
use crate::models::{Forecast, RawRecord};
use crate::regressor::{ForestConfig, RandomForest};
use crate::store::ModelStore;
use crate::weather::ObservationSource;
use crate::Result;

/// Trains the three models and writes them to a store
#[derive(Debug, Clone)]
pub struct TrainingService {
    store: ModelStore,
    forest: ForestConfig,
}

impl TrainingService {
    #[must_use]
    pub fn new(store: ModelStore, forest: ForestConfig) -> Self {
        Self { store, forest }
    }

    /// Train from a historical CSV file
    pub fn train_from_csv(&self, path: &Path) -> Result<TrainingReport> {
        let raw = history::load_csv(path)?;
        self.train_records(&raw)
    }

    /// Clean, prepare, train and persist. Nothing is written unless all
    /// three models train successfully.
    #[instrument(name = "train_models", level = "info", skip_all, fields(rows = raw.len()))]
    pub fn train_records(&self, raw: &[RawRecord]) -> Result<TrainingReport> {
        let prepared = dataset::prepare_raw(raw)?;
        let (ensemble, report) = EnsembleTrainer::random_forest(self.forest.clone()).train(&prepared)?;
        let paths = self.store.save_ensemble(&ensemble)?;
        info!("Saved {} models to {}", paths.len(), self.store.directory().display());
        Ok(report)
    }
}

/// Summarise a historical CSV file after cleaning
pub fn summarize_csv(path: &Path) -> Result<DatasetSummary> {
    let raw = history::load_csv(path)?;
    DatasetSummary::from_records(&dataset::clean(&raw))
}

/// Produces live multi-day forecasts from stored models
#[derive(Debug, Clone)]
pub struct ForecastService {
    store: ModelStore,
    horizon: usize,
}

impl ForecastService {
    #[must_use]
    pub fn new(store: ModelStore, horizon: usize) -> Self {
        Self { store, horizon }
    }

    #[must_use]
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Load models, fetch today's seed for `city`, and roll the forecast forward.
    ///
    /// Models are loaded before any network call, so a missing or stale model
    /// fails fast without touching the upstream source.
    #[instrument(name = "run_forecast", level = "info", skip(self, source), fields(horizon = self.horizon))]
    pub async fn run<S: ObservationSource>(&self, source: &S, city: &str) -> Result<Forecast> {
        let ensemble = self.store.load_ensemble::<RandomForest>()?;
        let seed = source.fetch_seed(city).await?;

        let steps = Forecaster::new(&ensemble).forecast(&seed, self.horizon)?;
        let forecast = Forecast::new(city.to_string(), seed, steps);

        let inconsistent = forecast.inconsistent_days();
        if !inconsistent.is_empty() {
            warn!("{} projected day(s) have max below min or humidity out of range", inconsistent.len());
        }
        info!("Forecast {} day(s) for {city} starting {}", forecast.steps.len(), seed.date);
        Ok(forecast)
    }
}
