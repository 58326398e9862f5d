//! Model ensemble
//!
//! Three independently trained regressors, one per target, sharing one
//! feature schema. Training clones a single configured prototype per target so
//! every model gets identical hyperparameters.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::dataset::PreparedDataset;
use crate::models::{FeatureVector, SCHEMA_VERSION, Target};
use crate::regressor::{ForestConfig, RandomForest, Regressor, mean_squared_error, r2_score};
use crate::{Result, SkycastError};

/// A fitted regressor tagged with its target and the schema it expects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel<R> {
    target: Target,
    schema_version: u32,
    regressor: R,
}

impl<R: Regressor> TrainedModel<R> {
    #[must_use]
    pub fn new(target: Target, schema_version: u32, regressor: R) -> Self {
        Self {
            target,
            schema_version,
            regressor,
        }
    }

    #[must_use]
    pub fn target(&self) -> Target {
        self.target
    }

    #[must_use]
    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    #[must_use]
    pub fn regressor(&self) -> &R {
        &self.regressor
    }

    #[must_use]
    pub fn predict(&self, features: &FeatureVector) -> f64 {
        self.regressor.predict(features)
    }
}

/// One prediction from each model for the same feature vector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnsemblePrediction {
    pub max_temp: f64,
    pub min_temp: f64,
    pub humidity: f64,
}

/// The three models used together at inference time
#[derive(Debug, Clone, PartialEq)]
pub struct ModelEnsemble<R> {
    max_temp: TrainedModel<R>,
    min_temp: TrainedModel<R>,
    humidity: TrainedModel<R>,
}

impl<R: Regressor> ModelEnsemble<R> {
    /// Assemble an ensemble, checking each model sits in its own slot, is
    /// fitted, and that all three share one schema version
    pub fn new(
        max_temp: TrainedModel<R>,
        min_temp: TrainedModel<R>,
        humidity: TrainedModel<R>,
    ) -> Result<Self> {
        let slots = [
            (Target::MaxTemp, &max_temp),
            (Target::MinTemp, &min_temp),
            (Target::Humidity, &humidity),
        ];
        for (expected, model) in slots {
            if model.target() != expected {
                return Err(SkycastError::training(format!(
                    "model for '{}' placed in the '{expected}' slot",
                    model.target()
                )));
            }
            if !model.regressor().is_fitted() {
                return Err(SkycastError::training(format!("model for '{expected}' is not fitted")));
            }
            if model.schema_version() != max_temp.schema_version() {
                return Err(SkycastError::training(format!(
                    "models disagree on schema version ({} vs {})",
                    model.schema_version(),
                    max_temp.schema_version()
                )));
            }
        }
        Ok(Self {
            max_temp,
            min_temp,
            humidity,
        })
    }

    /// Model for one target
    #[must_use]
    pub fn model(&self, target: Target) -> &TrainedModel<R> {
        match target {
            Target::MaxTemp => &self.max_temp,
            Target::MinTemp => &self.min_temp,
            Target::Humidity => &self.humidity,
        }
    }

    #[must_use]
    pub fn schema_version(&self) -> u32 {
        self.max_temp.schema_version()
    }

    /// Invoke all three models on the same feature vector
    #[must_use]
    pub fn predict(&self, features: &FeatureVector) -> EnsemblePrediction {
        EnsemblePrediction {
            max_temp: self.max_temp.predict(features),
            min_temp: self.min_temp.predict(features),
            humidity: self.humidity.predict(features),
        }
    }

    /// Consume the ensemble into its three models
    #[must_use]
    pub fn into_models(self) -> [TrainedModel<R>; 3] {
        [self.max_temp, self.min_temp, self.humidity]
    }
}

/// In-sample fit quality of one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetReport {
    pub target: Target,
    pub r2: f64,
    pub mse: f64,
}

/// Summary of one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub samples: usize,
    pub schema_version: u32,
    pub targets: Vec<TargetReport>,
}

/// Trains the three models from one configured prototype
#[derive(Debug, Clone)]
pub struct EnsembleTrainer<R> {
    prototype: R,
}

impl EnsembleTrainer<RandomForest> {
    /// Trainer for random forests with the given hyperparameters
    #[must_use]
    pub fn random_forest(config: ForestConfig) -> Self {
        Self::new(RandomForest::new(config))
    }
}

impl<R: Regressor + Clone> EnsembleTrainer<R> {
    #[must_use]
    pub fn new(prototype: R) -> Self {
        Self { prototype }
    }

    /// Train one model per target. Blocks until all three are fitted.
    #[instrument(name = "train_ensemble", level = "info", skip_all, fields(samples = dataset.len()))]
    pub fn train(&self, dataset: &PreparedDataset) -> Result<(ModelEnsemble<R>, TrainingReport)> {
        validate_alignment(dataset)?;

        let mut reports = Vec::with_capacity(Target::ALL.len());
        let mut fit = |target: Target| -> Result<TrainedModel<R>> {
            let (features, targets) = dataset.columns(target);
            let mut regressor = self.prototype.clone();
            regressor.fit(&features, &targets)?;

            let report = TargetReport {
                target,
                r2: r2_score(&regressor, &features, &targets),
                mse: mean_squared_error(&regressor, &features, &targets),
            };
            info!(
                "Trained '{}' model on {} samples (R² {:.4}, MSE {:.4})",
                target,
                features.len(),
                report.r2,
                report.mse
            );
            reports.push(report);
            Ok(TrainedModel::new(target, SCHEMA_VERSION, regressor))
        };

        let max_temp = fit(Target::MaxTemp)?;
        let min_temp = fit(Target::MinTemp)?;
        let humidity = fit(Target::Humidity)?;
        let ensemble = ModelEnsemble::new(max_temp, min_temp, humidity)?;

        Ok((
            ensemble,
            TrainingReport {
                samples: dataset.len(),
                schema_version: SCHEMA_VERSION,
                targets: reports,
            },
        ))
    }
}

/// Abort on empty or misaligned sequences instead of truncating
fn validate_alignment(dataset: &PreparedDataset) -> Result<()> {
    let expected = dataset.len();
    if expected == 0 {
        return Err(SkycastError::training("training sequence is empty"));
    }
    for target in Target::ALL {
        let examples = dataset.examples(target);
        if examples.len() != expected {
            return Err(SkycastError::training(format!(
                "'{target}' has {} examples, expected {expected}",
                examples.len()
            )));
        }
        let misaligned = examples
            .iter()
            .zip(&dataset.max_temp)
            .position(|(a, b)| a.features != b.features);
        if let Some(index) = misaligned {
            return Err(SkycastError::training(format!(
                "'{target}' feature row {index} differs from the shared feature rows"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::prepare;
    use crate::models::HistoricalRecord;
    use crate::regressor::TreeConfig;
    use chrono::{Duration, NaiveDate};

    fn records(n: usize) -> Vec<HistoricalRecord> {
        let start = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
        (0..n)
            .map(|i| {
                let season = (i as f64 / 365.0 * std::f64::consts::TAU).sin();
                HistoricalRecord::new(
                    start + Duration::days(i as i64),
                    31.0 + 5.0 * season + (i % 3) as f64 * 0.3,
                    22.0 + 6.0 * season - (i % 4) as f64 * 0.2,
                    72.0 - 10.0 * season + (i % 5) as f64,
                )
            })
            .collect()
    }

    fn trainer() -> EnsembleTrainer<RandomForest> {
        EnsembleTrainer::random_forest(ForestConfig {
            n_estimators: 8,
            tree: TreeConfig {
                max_depth: Some(8),
                ..TreeConfig::default()
            },
            ..ForestConfig::default()
        })
    }

    #[test]
    fn test_train_produces_three_tagged_models() {
        let dataset = prepare(&records(200)).unwrap();
        let (ensemble, report) = trainer().train(&dataset).unwrap();

        for target in Target::ALL {
            let model = ensemble.model(target);
            assert_eq!(model.target(), target);
            assert_eq!(model.schema_version(), SCHEMA_VERSION);
            assert_eq!(model.regressor().n_trees(), 8);
        }
        assert_eq!(report.samples, 199);
        assert_eq!(report.targets.len(), 3);
        assert!(report.targets.iter().all(|t| t.r2 > 0.5));
    }

    #[test]
    fn test_training_is_reproducible() {
        let dataset = prepare(&records(150)).unwrap();
        let (a, _) = trainer().train(&dataset).unwrap();
        let (b, _) = trainer().train(&dataset).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_misaligned_dataset_aborts() {
        let mut dataset = prepare(&records(50)).unwrap();
        dataset.humidity.pop();
        let err = trainer().train(&dataset).unwrap_err();
        assert!(matches!(err, SkycastError::Training { .. }));

        let mut dataset = prepare(&records(50)).unwrap();
        dataset.min_temp[3].features.humidity += 1.0;
        let err = trainer().train(&dataset).unwrap_err();
        assert!(err.to_string().contains("feature row 3"));
    }

    #[test]
    fn test_empty_dataset_aborts() {
        let dataset = PreparedDataset {
            max_temp: Vec::new(),
            min_temp: Vec::new(),
            humidity: Vec::new(),
        };
        assert!(matches!(trainer().train(&dataset), Err(SkycastError::Training { .. })));
    }

    #[test]
    fn test_ensemble_rejects_wrong_slot_and_unfitted_models() {
        let dataset = prepare(&records(60)).unwrap();
        let (ensemble, _) = trainer().train(&dataset).unwrap();
        let [max, min, hum] = ensemble.into_models();

        let err = ModelEnsemble::new(min.clone(), max.clone(), hum.clone()).unwrap_err();
        assert!(err.to_string().contains("slot"));

        let unfitted = TrainedModel::new(Target::Humidity, SCHEMA_VERSION, RandomForest::new(ForestConfig::default()));
        assert!(ModelEnsemble::new(max.clone(), min.clone(), unfitted).is_err());

        let other_schema = TrainedModel::new(Target::Humidity, SCHEMA_VERSION + 1, hum.regressor().clone());
        assert!(ModelEnsemble::new(max, min, other_schema).is_err());
    }
}
