//! Autoregressive forecaster
//!
//! Starting from one seed observation, each step invokes the three models on
//! the same feature vector, then builds the next day's vector from their three
//! outputs and the next calendar date. Errors in any variable therefore feed
//! into all three models on the following day. The loop is a fixed-length
//! unroll with no I/O, so a forecaster can be shared across threads.

use chrono::{Days, NaiveDate};
use tracing::trace;

use crate::ensemble::ModelEnsemble;
use crate::models::{FeatureVector, ForecastStep, SeedObservation, day_of_year};
use crate::regressor::Regressor;
use crate::{Result, SkycastError};

/// Default number of projected days
pub const DEFAULT_HORIZON: usize = 7;

/// Rolls an ensemble forward from a seed observation
#[derive(Debug)]
pub struct Forecaster<'a, R> {
    ensemble: &'a ModelEnsemble<R>,
}

// Only a shared reference is held, so no bounds on `R`
impl<R> Clone for Forecaster<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for Forecaster<'_, R> {}

impl<'a, R: Regressor> Forecaster<'a, R> {
    #[must_use]
    pub fn new(ensemble: &'a ModelEnsemble<R>) -> Self {
        Self { ensemble }
    }

    /// Project `horizon` days after the seed date.
    ///
    /// Returns exactly `horizon` steps dated `seed.date + 1 ..= seed.date + horizon`;
    /// the seed day itself is not included. Fails with a data error when the
    /// seed's `day_of_year` is out of range or disagrees with its date.
    pub fn forecast(&self, seed: &SeedObservation, horizon: usize) -> Result<Vec<ForecastStep>> {
        if !seed.features.has_valid_day_of_year() {
            return Err(SkycastError::data(format!(
                "seed day_of_year {} is outside 1..=366",
                seed.features.day_of_year
            )));
        }
        if !seed.is_consistent() {
            return Err(SkycastError::data(format!(
                "seed day_of_year {} does not match its date {} (day {})",
                seed.features.day_of_year,
                seed.date,
                day_of_year(seed.date)
            )));
        }

        let mut steps = Vec::with_capacity(horizon);
        let mut date = seed.date;
        let mut features = seed.features;

        for day in 1..=horizon {
            let (step, next) = self.advance(date, &features)?;
            trace!(day, date = %step.date, max = step.max_temp, min = step.min_temp, humidity = step.humidity, "projected day");
            steps.push(step);
            date = step.date;
            features = next;
        }

        Ok(steps)
    }

    /// One transition: predict from `features` observed on `date`, returning the
    /// step for the following day and the feature vector it becomes
    pub fn advance(&self, date: NaiveDate, features: &FeatureVector) -> Result<(ForecastStep, FeatureVector)> {
        let prediction = self.ensemble.predict(features);
        let next_date = next_day(date)?;

        let step = ForecastStep {
            date: next_date,
            max_temp: prediction.max_temp,
            min_temp: prediction.min_temp,
            humidity: prediction.humidity,
        };
        let next = FeatureVector {
            max_temp: prediction.max_temp,
            min_temp: prediction.min_temp,
            humidity: prediction.humidity,
            day_of_year: day_of_year(next_date),
        };
        Ok((step, next))
    }
}

/// Following calendar day
fn next_day(date: NaiveDate) -> Result<NaiveDate> {
    date.checked_add_days(Days::new(1))
        .ok_or_else(|| SkycastError::data(format!("cannot advance past {date}")))
}
