//! Configuration management for skycast
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::SkycastError;
use crate::regressor::{ForestConfig, TreeConfig};
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure for skycast
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkycastConfig {
    /// Live weather API configuration
    #[serde(default)]
    pub weather: WeatherConfig,
    /// Model training and storage configuration
    #[serde(default)]
    pub models: ModelsConfig,
    /// Forecast settings
    #[serde(default)]
    pub forecast: ForecastConfig,
    /// Historical data settings
    #[serde(default)]
    pub data: DataConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Weather API configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// OpenWeatherMap API key
    pub api_key: Option<String>,
    /// Base URL for weather API
    #[serde(default = "default_weather_base_url")]
    pub base_url: String,
    /// City forecast when none is given on the command line
    #[serde(default = "default_city")]
    pub city: String,
    /// Request timeout in seconds
    #[serde(default = "default_weather_timeout")]
    pub timeout_seconds: u32,
    /// Maximum number of retries for failed requests
    #[serde(default = "default_weather_max_retries")]
    pub max_retries: u32,
    /// Number of 3-hour forecast entries summarised into the seed (8 = 24h)
    #[serde(default = "default_window_entries")]
    pub window_entries: usize,
}

/// Model training and storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Directory holding the model artifacts
    #[serde(default = "default_models_directory")]
    pub directory: PathBuf,
    /// Trees per forest
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
    /// Seed for bootstrap sampling
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,
    /// Training threads (unset = all cores)
    #[serde(default)]
    pub n_jobs: Option<usize>,
    /// Maximum tree depth (unset = unlimited)
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,
    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,
}

/// Forecast settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Days projected after the seed
    #[serde(default = "default_horizon_days")]
    pub horizon_days: usize,
}

/// Historical data settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// CSV file used for training
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_weather_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_city() -> String {
    "Kolkata".to_string()
}

fn default_weather_timeout() -> u32 {
    30
}

fn default_weather_max_retries() -> u32 {
    3
}

fn default_window_entries() -> usize {
    8
}

fn default_models_directory() -> PathBuf {
    PathBuf::from("models")
}

fn default_n_estimators() -> usize {
    100
}

fn default_random_seed() -> u64 {
    42
}

fn default_min_samples_split() -> usize {
    2
}

fn default_min_samples_leaf() -> usize {
    1
}

fn default_horizon_days() -> usize {
    7
}

fn default_history_path() -> PathBuf {
    PathBuf::from("data/Kolkata_weather_data(2017-2022).csv")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_weather_base_url(),
            city: default_city(),
            timeout_seconds: default_weather_timeout(),
            max_retries: default_weather_max_retries(),
            window_entries: default_window_entries(),
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            directory: default_models_directory(),
            n_estimators: default_n_estimators(),
            random_seed: default_random_seed(),
            n_jobs: None,
            max_depth: None,
            min_samples_split: default_min_samples_split(),
            min_samples_leaf: default_min_samples_leaf(),
        }
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon_days: default_horizon_days(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            history_path: default_history_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl ModelsConfig {
    /// Forest hyperparameters for training
    #[must_use]
    pub fn forest_config(&self) -> ForestConfig {
        ForestConfig {
            n_estimators: self.n_estimators,
            seed: self.random_seed,
            n_jobs: self.n_jobs,
            bootstrap: true,
            tree: TreeConfig {
                max_depth: self.max_depth,
                min_samples_split: self.min_samples_split,
                min_samples_leaf: self.min_samples_leaf,
                max_features: None,
            },
        }
    }
}

impl SkycastConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Environment overrides, e.g. SKYCAST_WEATHER__API_KEY
        builder = builder.add_source(
            Environment::with_prefix("SKYCAST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: SkycastConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        // Apply defaults for missing values
        config.apply_defaults();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("skycast").join("config.toml"))
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.weather.base_url.is_empty() {
            self.weather.base_url = default_weather_base_url();
        }
        if self.weather.city.trim().is_empty() {
            self.weather.city = default_city();
        }
        if self.weather.timeout_seconds == 0 {
            self.weather.timeout_seconds = default_weather_timeout();
        }
        if self.weather.window_entries == 0 {
            self.weather.window_entries = default_window_entries();
        }
        if self.models.directory.as_os_str().is_empty() {
            self.models.directory = default_models_directory();
        }
        if self.data.history_path.as_os_str().is_empty() {
            self.data.history_path = default_history_path();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_api_keys()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate API keys and credentials
    pub fn validate_api_keys(&self) -> Result<()> {
        // The key is only needed for live forecasts, so it may be absent
        if let Some(api_key) = &self.weather.api_key {
            if api_key.is_empty() {
                return Err(SkycastError::config(
                    "Weather API key cannot be empty if provided. Either remove it or provide a valid key.",
                )
                .into());
            }

            if api_key.len() < 8 {
                return Err(SkycastError::config(
                    "Weather API key appears to be invalid (too short). Please check your API key.",
                )
                .into());
            }

            if api_key.len() > 100 {
                return Err(SkycastError::config(
                    "Weather API key appears to be invalid (too long). Please check your API key.",
                )
                .into());
            }
        }

        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.weather.timeout_seconds > 300 {
            return Err(SkycastError::config("Weather API timeout cannot exceed 300 seconds").into());
        }

        if self.weather.max_retries > 10 {
            return Err(SkycastError::config("Weather API max retries cannot exceed 10").into());
        }

        if !(1..=30).contains(&self.forecast.horizon_days) {
            return Err(SkycastError::config("Forecast horizon must be between 1 and 30 days").into());
        }

        if self.models.n_estimators == 0 {
            return Err(SkycastError::config("Model n_estimators must be at least 1").into());
        }

        if self.models.min_samples_split < 2 {
            return Err(SkycastError::config("Model min_samples_split must be at least 2").into());
        }

        if self.models.min_samples_leaf == 0 {
            return Err(SkycastError::config("Model min_samples_leaf must be at least 1").into());
        }

        if self.models.n_jobs == Some(0) || self.models.max_depth == Some(0) {
            return Err(SkycastError::config("Model n_jobs and max_depth must be at least 1 when set").into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(SkycastError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(SkycastError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        if !self.weather.base_url.starts_with("http://") && !self.weather.base_url.starts_with("https://") {
            return Err(SkycastError::config("Weather API base URL must be a valid HTTP or HTTPS URL").into());
        }

        Ok(())
    }
}
