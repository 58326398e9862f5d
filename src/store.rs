//! Model store
//!
//! One self-contained postcard artifact per target (`model_max_temp`,
//! `model_min_temp`, `model_humidity`), each carrying the feature schema it was
//! trained on. A load either returns a complete, schema-compatible model or
//! fails as a whole.

use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::ensemble::{ModelEnsemble, TrainedModel};
use crate::models::{FeatureSchema, Target};
use crate::regressor::Regressor;
use crate::{Result, SkycastError};

const ARTIFACT_MAGIC: [u8; 4] = *b"SKYM";
const ARTIFACT_FORMAT: u16 = 1;
const ARTIFACT_EXTENSION: &str = "postcard";

/// Leading fields shared by every artifact format version
#[derive(Serialize, Deserialize)]
struct ArtifactHeader {
    magic: [u8; 4],
    format: u16,
}

#[derive(Serialize, Deserialize)]
struct ModelArtifact<R> {
    header: ArtifactHeader,
    target: Target,
    schema_version: u32,
    feature_names: Vec<String>,
    trained_at: DateTime<Utc>,
    regressor: R,
}

/// File-system store for trained models
#[derive(Debug, Clone)]
pub struct ModelStore {
    directory: PathBuf,
    schema: FeatureSchema,
}

impl ModelStore {
    /// Store rooted at `directory`, expecting the current feature schema
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self::with_schema(directory, FeatureSchema::current())
    }

    /// Store that checks loaded models against an explicit schema
    pub fn with_schema(directory: impl Into<PathBuf>, schema: FeatureSchema) -> Self {
        Self {
            directory: directory.into(),
            schema,
        }
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Artifact location for a target
    #[must_use]
    pub fn path_for(&self, target: Target) -> PathBuf {
        self.directory
            .join(target.artifact_stem())
            .with_extension(ARTIFACT_EXTENSION)
    }

    /// Whether an artifact exists for a target
    #[must_use]
    pub fn contains(&self, target: Target) -> bool {
        self.path_for(target).is_file()
    }

    /// Persist a model snapshot tagged with its target and schema version.
    /// The artifact is written to a temporary file and renamed into place.
    #[instrument(name = "save_model", level = "debug", skip(self, model), fields(target = %model.target()))]
    pub fn save<R: Regressor + Serialize>(&self, model: &TrainedModel<R>) -> Result<PathBuf> {
        fs::create_dir_all(&self.directory)?;

        let artifact = ModelArtifact {
            header: ArtifactHeader {
                magic: ARTIFACT_MAGIC,
                format: ARTIFACT_FORMAT,
            },
            target: model.target(),
            schema_version: model.schema_version(),
            feature_names: self.schema.names.clone(),
            trained_at: Utc::now(),
            regressor: model.regressor(),
        };
        let bytes = postcard::to_stdvec(&artifact).map_err(|e| {
            SkycastError::from(io::Error::new(ErrorKind::InvalidData, format!("failed to encode model: {e}")))
        })?;

        let path = self.path_for(model.target());
        let staging = path.with_extension(format!("{ARTIFACT_EXTENSION}.tmp"));
        {
            let mut file = fs::File::create(&staging)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&staging, &path)?;

        info!("Saved '{}' model ({} bytes) to {}", model.target(), bytes.len(), path.display());
        Ok(path)
    }

    /// Load the model stored for a target
    #[instrument(name = "load_model", level = "debug", skip(self))]
    pub fn load<R: Regressor + DeserializeOwned>(&self, target: Target) -> Result<TrainedModel<R>> {
        let path = self.path_for(target);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SkycastError::model_not_found(target, path));
            }
            Err(e) => return Err(e.into()),
        };

        let (header, _): (ArtifactHeader, _) = postcard::take_from_bytes(&bytes)
            .map_err(|e| SkycastError::incompatible_schema(target, format!("unreadable artifact header: {e}")))?;
        if header.magic != ARTIFACT_MAGIC {
            return Err(SkycastError::incompatible_schema(target, "not a model artifact"));
        }
        if header.format != ARTIFACT_FORMAT {
            return Err(SkycastError::incompatible_schema(
                target,
                format!("artifact format {} is not supported (expected {ARTIFACT_FORMAT})", header.format),
            ));
        }

        let artifact: ModelArtifact<R> = postcard::from_bytes(&bytes)
            .map_err(|e| SkycastError::incompatible_schema(target, format!("corrupt artifact: {e}")))?;

        if artifact.target != target {
            return Err(SkycastError::incompatible_schema(
                target,
                format!("artifact holds a '{}' model", artifact.target),
            ));
        }
        self.schema
            .check_compatible(artifact.schema_version, &artifact.feature_names)
            .map_err(|message| SkycastError::incompatible_schema(target, message))?;
        if !artifact.regressor.is_fitted() {
            return Err(SkycastError::incompatible_schema(target, "artifact holds an unfitted model"));
        }

        debug!(
            "Loaded '{}' model trained at {} from {}",
            target,
            artifact.trained_at,
            path.display()
        );
        Ok(TrainedModel::new(target, artifact.schema_version, artifact.regressor))
    }

    /// Persist all three models of an ensemble
    pub fn save_ensemble<R: Regressor + Serialize>(&self, ensemble: &ModelEnsemble<R>) -> Result<Vec<PathBuf>> {
        Target::ALL
            .into_iter()
            .map(|target| self.save(ensemble.model(target)))
            .collect()
    }

    /// Load all three models; fails if any one is missing or incompatible
    pub fn load_ensemble<R: Regressor + DeserializeOwned>(&self) -> Result<ModelEnsemble<R>> {
        let max_temp = self.load(Target::MaxTemp)?;
        let min_temp = self.load(Target::MinTemp)?;
        let humidity = self.load(Target::Humidity)?;
        info!("Loaded model ensemble from {}", self.directory.display());
        ModelEnsemble::new(max_temp, min_temp, humidity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeatureVector, SCHEMA_VERSION};
    use crate::regressor::{ForestConfig, RandomForest};
    use tempfile::TempDir;

    fn fitted_forest(seed: u64) -> RandomForest {
        let features: Vec<FeatureVector> = (0..60)
            .map(|i| FeatureVector {
                max_temp: 28.0 + (i % 7) as f64,
                min_temp: 20.0 + (i % 5) as f64,
                humidity: 65.0 + (i % 11) as f64,
                day_of_year: i + 1,
            })
            .collect();
        let targets: Vec<f64> = features.iter().map(|f| f.max_temp + 0.5).collect();
        let mut forest = RandomForest::new(ForestConfig {
            n_estimators: 5,
            seed,
            ..ForestConfig::default()
        });
        forest.fit(&features, &targets).unwrap();
        forest
    }

    fn probe() -> FeatureVector {
        FeatureVector {
            max_temp: 32.0,
            min_temp: 26.0,
            humidity: 78.0,
            day_of_year: 200,
        }
    }

    #[test]
    fn test_save_then_load_predicts_identically() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());
        let model = TrainedModel::new(Target::MaxTemp, SCHEMA_VERSION, fitted_forest(42));

        let path = store.save(&model).unwrap();
        assert!(path.ends_with("model_max_temp.postcard"));
        assert!(store.contains(Target::MaxTemp));

        let loaded: TrainedModel<RandomForest> = store.load(Target::MaxTemp).unwrap();
        assert_eq!(loaded.predict(&probe()).to_bits(), model.predict(&probe()).to_bits());
        assert_eq!(loaded, model);
    }

    #[test]
    fn test_missing_model() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());
        let err = store.load::<RandomForest>(Target::MinTemp).unwrap_err();
        assert!(matches!(err, SkycastError::ModelNotFound { target: Target::MinTemp, .. }));
    }

    #[test]
    fn test_schema_version_mismatch() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());
        let stale = TrainedModel::new(Target::Humidity, SCHEMA_VERSION + 1, fitted_forest(1));
        store.save(&stale).unwrap();

        let err = store.load::<RandomForest>(Target::Humidity).unwrap_err();
        assert!(matches!(err, SkycastError::IncompatibleSchema { .. }));
    }

    #[test]
    fn test_feature_layout_mismatch() {
        let dir = TempDir::new().unwrap();
        let mut reordered = FeatureSchema::current();
        reordered.names.swap(0, 1);
        ModelStore::with_schema(dir.path(), reordered)
            .save(&TrainedModel::new(Target::MaxTemp, SCHEMA_VERSION, fitted_forest(1)))
            .unwrap();

        let err = ModelStore::new(dir.path()).load::<RandomForest>(Target::MaxTemp).unwrap_err();
        assert!(err.to_string().contains("feature layout"));
    }

    #[test]
    fn test_corrupt_artifact_is_incompatible() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());
        fs::write(store.path_for(Target::MinTemp), b"not a model").unwrap();
        let err = store.load::<RandomForest>(Target::MinTemp).unwrap_err();
        assert!(matches!(err, SkycastError::IncompatibleSchema { .. }));

        // A valid header followed by a truncated body
        let model = TrainedModel::new(Target::MinTemp, SCHEMA_VERSION, fitted_forest(2));
        let path = store.save(&model).unwrap();
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
        let err = store.load::<RandomForest>(Target::MinTemp).unwrap_err();
        assert!(matches!(err, SkycastError::IncompatibleSchema { .. }));
    }

    #[test]
    fn test_artifact_under_wrong_name() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());
        let path = store
            .save(&TrainedModel::new(Target::MaxTemp, SCHEMA_VERSION, fitted_forest(3)))
            .unwrap();
        fs::copy(path, store.path_for(Target::MinTemp)).unwrap();

        let err = store.load::<RandomForest>(Target::MinTemp).unwrap_err();
        assert!(err.to_string().contains("holds a 'max' model"));
    }

    #[test]
    fn test_ensemble_load_fails_when_one_artifact_missing() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());
        store
            .save(&TrainedModel::new(Target::MaxTemp, SCHEMA_VERSION, fitted_forest(1)))
            .unwrap();
        store
            .save(&TrainedModel::new(Target::MinTemp, SCHEMA_VERSION, fitted_forest(2)))
            .unwrap();

        let err = store.load_ensemble::<RandomForest>().unwrap_err();
        assert!(matches!(err, SkycastError::ModelNotFound { target: Target::Humidity, .. }));
    }
}
