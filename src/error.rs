//! Error types and handling for the skycast application

use std::path::PathBuf;

use thiserror::Error;

use crate::models::Target;

/// Main error type for the skycast library
#[derive(Error, Debug)]
pub enum SkycastError {
    /// Insufficient or invalid historical data
    #[error("Data error: {message}")]
    Data { message: String },

    /// A training precondition was violated
    #[error("Training error: {message}")]
    Training { message: String },

    /// No stored model exists for a target
    #[error("Model not found for target '{target}' at {}", .path.display())]
    ModelNotFound { target: Target, path: PathBuf },

    /// A stored model cannot be used with the current feature schema
    #[error("Incompatible model for target '{target}': {message}")]
    IncompatibleSchema { target: Target, message: String },

    /// The live observation source could not supply a seed
    #[error("Upstream unavailable: {message}")]
    UpstreamUnavailable { message: String },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// CSV decoding errors
    #[error("CSV error: {source}")]
    Csv {
        #[from]
        source: csv::Error,
    },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl SkycastError {
    /// Create a new data error
    pub fn data<S: Into<String>>(message: S) -> Self {
        Self::Data {
            message: message.into(),
        }
    }

    /// Create a new training error
    pub fn training<S: Into<String>>(message: S) -> Self {
        Self::Training {
            message: message.into(),
        }
    }

    /// Create a new model-not-found error
    pub fn model_not_found(target: Target, path: impl Into<PathBuf>) -> Self {
        Self::ModelNotFound {
            target,
            path: path.into(),
        }
    }

    /// Create a new incompatible-schema error
    pub fn incompatible_schema<S: Into<String>>(target: Target, message: S) -> Self {
        Self::IncompatibleSchema {
            target,
            message: message.into(),
        }
    }

    /// Create a new upstream error
    pub fn upstream<S: Into<String>>(message: S) -> Self {
        Self::UpstreamUnavailable {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Stable identifier of the failure kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            SkycastError::Data { .. } => "data",
            SkycastError::Training { .. } => "training",
            SkycastError::ModelNotFound { .. } => "model_not_found",
            SkycastError::IncompatibleSchema { .. } => "incompatible_schema",
            SkycastError::UpstreamUnavailable { .. } => "upstream_unavailable",
            SkycastError::Config { .. } => "config",
            SkycastError::Csv { .. } => "csv",
            SkycastError::Io { .. } => "io",
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            SkycastError::Data { message } => {
                format!("The historical dataset cannot be used: {message}")
            }
            SkycastError::Training { message } => format!("Training aborted: {message}"),
            SkycastError::ModelNotFound { target, .. } => format!(
                "No trained '{target}' model found. Please run `skycast train` first."
            ),
            SkycastError::IncompatibleSchema { target, .. } => format!(
                "The stored '{target}' model was trained with a different feature layout. Please retrain with `skycast train`."
            ),
            SkycastError::UpstreamUnavailable { message } => {
                format!("Could not retrieve live weather data ({message}). Halting forecast.")
            }
            SkycastError::Config { message } => format!("Configuration error: {message}"),
            SkycastError::Csv { .. } => {
                "The historical CSV file could not be read. Please check its format.".to_string()
            }
            SkycastError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
        }
    }
}
