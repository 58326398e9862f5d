//! Integration tests for skycast: CSV on disk through training, storage and forecasting

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{Duration, NaiveDate};
use skycast::models::day_of_year;
use skycast::{
    ForecastService, ForestConfig, ModelStore, ObservationSource, SeedObservation, SkycastError, Target,
    TrainingService,
};
use tempfile::TempDir;

/// Seed provider standing in for the live weather API
struct StubSource {
    seed: Option<SeedObservation>,
}

impl ObservationSource for StubSource {
    async fn fetch_seed(&self, _city: &str) -> skycast::Result<SeedObservation> {
        self.seed
            .ok_or_else(|| SkycastError::upstream("stub source is offline"))
    }
}

fn seed() -> SeedObservation {
    SeedObservation::new(NaiveDate::from_ymd_opt(2022, 7, 19).unwrap(), 32.0, 26.0, 78.0)
}

/// Two years of synthetic daily history in the raw export layout
fn write_history(dir: &Path) -> PathBuf {
    let start = NaiveDate::from_ymd_opt(2017, 1, 1).unwrap();
    let mut csv = String::from("Name,Date time,Maximum Temperature,Minimum Temperature,Relative Humidity\n");
    for i in 0..730 {
        let date = start + Duration::days(i);
        let season = (f64::from(day_of_year(date)) / 365.25 * std::f64::consts::TAU).sin();
        let wobble = (i % 5) as f64 * 0.2;
        writeln!(
            csv,
            "Kolkata,{},{:.1},{:.1},{:.1}",
            date.format("%m/%d/%Y"),
            31.0 + 5.0 * season + wobble,
            22.0 + 6.0 * season - wobble,
            72.0 - 9.0 * season + wobble * 2.0
        )
        .unwrap();
    }
    // A day with a missing reading is dropped during cleaning
    csv.push_str("Kolkata,01/01/2019,28.0,,70.0\n");

    let path = dir.join("history.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

fn small_forest() -> ForestConfig {
    ForestConfig {
        n_estimators: 10,
        ..ForestConfig::default()
    }
}

#[tokio::test]
async fn test_train_store_and_forecast() {
    let dir = TempDir::new().unwrap();
    let history = write_history(dir.path());
    let store = ModelStore::new(dir.path().join("models"));

    let report = TrainingService::new(store.clone(), small_forest())
        .train_from_csv(&history)
        .unwrap();
    assert_eq!(report.samples, 729);
    for target in Target::ALL {
        assert!(store.contains(target), "missing artifact for {target}");
    }

    let source = StubSource { seed: Some(seed()) };
    let service = ForecastService::new(store, 7);
    let first = service.run(&source, "Kolkata").await.unwrap();
    let second = service.run(&source, "Kolkata").await.unwrap();

    assert_eq!(first.steps.len(), 7);
    for (i, step) in first.steps.iter().enumerate() {
        assert_eq!(step.date, seed().date + Duration::days(i as i64 + 1));
        assert!(step.max_temp.is_finite() && step.min_temp.is_finite() && step.humidity.is_finite());
    }
    // Same models and seed give the same forecast
    assert_eq!(first.steps, second.steps);
}

#[tokio::test]
async fn test_upstream_failure_halts_forecast() {
    let dir = TempDir::new().unwrap();
    let history = write_history(dir.path());
    let store = ModelStore::new(dir.path().join("models"));
    TrainingService::new(store.clone(), small_forest())
        .train_from_csv(&history)
        .unwrap();

    let err = ForecastService::new(store, 7)
        .run(&StubSource { seed: None }, "Kolkata")
        .await
        .unwrap_err();

    assert!(matches!(err, SkycastError::UpstreamUnavailable { .. }));
    assert!(err.user_message().contains("Halting forecast"));
}

#[tokio::test]
async fn test_forecast_without_models() {
    let dir = TempDir::new().unwrap();
    let err = ForecastService::new(ModelStore::new(dir.path()), 7)
        .run(&StubSource { seed: Some(seed()) }, "Kolkata")
        .await
        .unwrap_err();

    assert!(matches!(err, SkycastError::ModelNotFound { target: Target::MaxTemp, .. }));
    assert!(err.user_message().contains("skycast train"));
}

fn skycast(dir: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_skycast"));
    command
        .arg("--config")
        .arg(dir.join("absent.toml"))
        .env("SKYCAST_MODELS__DIRECTORY", dir.join("models"))
        .env("SKYCAST_MODELS__N_ESTIMATORS", "5")
        .env_remove("RUST_LOG");
    command
}

#[test]
fn test_cli_help() {
    let dir = TempDir::new().unwrap();
    let output = skycast(dir.path()).arg("--help").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("train"));
    assert!(stdout.contains("forecast"));
    assert!(stdout.contains("summary"));
}

#[test]
fn test_cli_train_and_summary() {
    let dir = TempDir::new().unwrap();
    let history = write_history(dir.path());

    let output = skycast(dir.path()).arg("train").arg("--data").arg(&history).output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Models saved"));
    assert!(dir.path().join("models").join("model_humidity.postcard").is_file());

    let output = skycast(dir.path()).arg("summary").arg("--data").arg(&history).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2017-01-01"));
    assert!(stdout.contains("max_temp"));
}

#[test]
fn test_cli_forecast_without_models_fails() {
    let dir = TempDir::new().unwrap();
    let output = skycast(dir.path()).arg("forecast").output().unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("skycast train"));
}
