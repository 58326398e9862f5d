//! Dataset preparation
//!
//! Turns a cleaned, chronologically ordered series of daily observations into
//! three index-aligned sequences of labelled examples, one per target. Day `i`
//! supplies the features and day `i + 1` supplies the label, so the final day
//! never becomes a feature row.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{FeatureVector, HistoricalRecord, RawRecord, Target};
use crate::{Result, SkycastError};

/// Minimum number of valid records needed to form one training pair
pub const MIN_RECORDS: usize = 2;

/// Features from day D paired with a target value from day D+1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub features: FeatureVector,
    pub target: f64,
}

/// Three aligned example sequences sharing the same feature rows
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedDataset {
    pub max_temp: Vec<TrainingExample>,
    pub min_temp: Vec<TrainingExample>,
    pub humidity: Vec<TrainingExample>,
}

impl PreparedDataset {
    /// Examples for one target
    #[must_use]
    pub fn examples(&self, target: Target) -> &[TrainingExample] {
        match target {
            Target::MaxTemp => &self.max_temp,
            Target::MinTemp => &self.min_temp,
            Target::Humidity => &self.humidity,
        }
    }

    /// Number of examples per target
    #[must_use]
    pub fn len(&self) -> usize {
        self.max_temp.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.max_temp.is_empty()
    }

    /// Split one target's examples into feature rows and labels
    #[must_use]
    pub fn columns(&self, target: Target) -> (Vec<FeatureVector>, Vec<f64>) {
        self.examples(target)
            .iter()
            .map(|example| (example.features, example.target))
            .unzip()
    }
}

/// Drop rows with any missing or non-finite field
#[must_use]
pub fn clean(raw: &[RawRecord]) -> Vec<HistoricalRecord> {
    let records: Vec<HistoricalRecord> = raw.iter().filter_map(RawRecord::complete).collect();
    debug!(
        "Cleaning kept {} of {} rows ({} dropped)",
        records.len(),
        raw.len(),
        raw.len() - records.len()
    );
    records
}

/// Build next-day training examples from valid records.
///
/// Fails with a data error when fewer than [`MIN_RECORDS`] records are given
/// or when dates are not strictly increasing.
pub fn prepare(records: &[HistoricalRecord]) -> Result<PreparedDataset> {
    if records.len() < MIN_RECORDS {
        return Err(SkycastError::data(format!(
            "{} valid record(s) after cleaning, at least {MIN_RECORDS} are required to form a training pair",
            records.len()
        )));
    }

    if let Some(pair) = records.windows(2).find(|pair| pair[1].date <= pair[0].date) {
        return Err(SkycastError::data(format!(
            "records must be in strictly increasing date order, found {} followed by {}",
            pair[0].date, pair[1].date
        )));
    }

    let pairs = records.windows(2);
    let mut dataset = PreparedDataset {
        max_temp: Vec::with_capacity(records.len() - 1),
        min_temp: Vec::with_capacity(records.len() - 1),
        humidity: Vec::with_capacity(records.len() - 1),
    };

    for pair in pairs {
        let (today, tomorrow) = (&pair[0], &pair[1]);
        let features = today.features();
        dataset.max_temp.push(TrainingExample {
            features,
            target: tomorrow.value_of(Target::MaxTemp),
        });
        dataset.min_temp.push(TrainingExample {
            features,
            target: tomorrow.value_of(Target::MinTemp),
        });
        dataset.humidity.push(TrainingExample {
            features,
            target: tomorrow.value_of(Target::Humidity),
        });
    }

    debug!("Prepared {} training examples per target", dataset.len());
    Ok(dataset)
}

/// Clean raw rows and prepare them in one step
pub fn prepare_raw(raw: &[RawRecord]) -> Result<PreparedDataset> {
    prepare(&clean(raw))
}

/// Descriptive statistics for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl ColumnSummary {
    fn from_values(name: &str, values: &[f64]) -> Self {
        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        // Sample standard deviation, zero for a single value
        let std_dev = if count > 1 {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64).sqrt()
        } else {
            0.0
        };
        Self {
            name: name.to_string(),
            count,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean,
            std_dev,
        }
    }
}

/// Column statistics and Pearson correlations of the observed variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub first_date: chrono::NaiveDate,
    pub last_date: chrono::NaiveDate,
    pub columns: Vec<ColumnSummary>,
    /// Row-major correlation matrix over `columns`
    pub correlation: Vec<Vec<f64>>,
}

impl DatasetSummary {
    /// Summarise cleaned records; data error when empty
    pub fn from_records(records: &[HistoricalRecord]) -> Result<Self> {
        let (Some(first), Some(last)) = (records.first(), records.last()) else {
            return Err(SkycastError::data("no valid records to summarise"));
        };

        let series: Vec<(&str, Vec<f64>)> = Target::ALL
            .iter()
            .map(|&target| {
                let name = match target {
                    Target::MaxTemp => "max_temp",
                    Target::MinTemp => "min_temp",
                    Target::Humidity => "humidity",
                };
                (name, records.iter().map(|r| r.value_of(target)).collect())
            })
            .collect();

        let columns = series
            .iter()
            .map(|(name, values)| ColumnSummary::from_values(name, values))
            .collect();

        let correlation = series
            .iter()
            .map(|(_, a)| series.iter().map(|(_, b)| pearson(a, b)).collect())
            .collect();

        Ok(Self {
            first_date: first.date,
            last_date: last.date,
            columns,
            correlation,
        })
    }
}

/// Pearson correlation; NaN when either series is constant
fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a).powi(2);
        var_b += (y - mean_b).powi(2);
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}
