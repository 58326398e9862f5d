//! Regression algorithms
//!
//! The rest of the crate only depends on the [`Regressor`] capability set:
//! trainable, deterministic for a fixed seed, and able to predict one value
//! from one [`FeatureVector`]. The random forest is the shipped implementation.

pub mod forest;
pub mod tree;

pub use forest::{ForestConfig, RandomForest};
pub use tree::{RegressionTree, TreeConfig};

use crate::Result;
use crate::models::FeatureVector;

/// A trainable single-output regressor over the feature schema
pub trait Regressor: Send + Sync {
    /// Fit on aligned feature rows and targets, replacing any previous state.
    /// Must be deterministic for the same configuration and input order.
    fn fit(&mut self, features: &[FeatureVector], targets: &[f64]) -> Result<()>;

    /// Predict one value
    fn predict(&self, features: &FeatureVector) -> f64;

    /// Whether `fit` has completed successfully
    fn is_fitted(&self) -> bool;
}

/// Mean squared error of a regressor over a labelled set
pub fn mean_squared_error<R: Regressor + ?Sized>(model: &R, features: &[FeatureVector], targets: &[f64]) -> f64 {
    if features.is_empty() {
        return 0.0;
    }
    features
        .iter()
        .zip(targets)
        .map(|(row, target)| (model.predict(row) - target).powi(2))
        .sum::<f64>()
        / features.len() as f64
}

/// Coefficient of determination (R²); zero for a constant target
pub fn r2_score<R: Regressor + ?Sized>(model: &R, features: &[FeatureVector], targets: &[f64]) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }
    let mean = targets.iter().sum::<f64>() / targets.len() as f64;
    let ss_tot: f64 = targets.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return 0.0;
    }
    let ss_res: f64 = features
        .iter()
        .zip(targets)
        .map(|(row, target)| (target - model.predict(row)).powi(2))
        .sum();
    1.0 - ss_res / ss_tot
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Predicts the max temperature unchanged
    struct Persistence;

    impl Regressor for Persistence {
        fn fit(&mut self, _features: &[FeatureVector], _targets: &[f64]) -> Result<()> {
            Ok(())
        }

        fn predict(&self, features: &FeatureVector) -> f64 {
            features.max_temp
        }

        fn is_fitted(&self) -> bool {
            true
        }
    }

    fn row(max_temp: f64) -> FeatureVector {
        FeatureVector {
            max_temp,
            min_temp: 0.0,
            humidity: 0.0,
            day_of_year: 1,
        }
    }

    #[test]
    fn test_metrics() {
        let features = vec![row(1.0), row(2.0), row(3.0)];
        assert_eq!(mean_squared_error(&Persistence, &features, &[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(r2_score(&Persistence, &features, &[1.0, 2.0, 3.0]), 1.0);
        assert_eq!(mean_squared_error(&Persistence, &features, &[2.0, 3.0, 4.0]), 1.0);
        assert_eq!(r2_score(&Persistence, &features, &[5.0, 5.0, 5.0]), 0.0);
    }
}
