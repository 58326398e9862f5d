//! Random forest regressor
//!
//! Bootstrap-aggregated regression trees. Tree `i` draws its bootstrap sample
//! and its feature order from a generator seeded with `seed + i`, and the
//! forest averages trees in index order, so a fitted forest is bit-for-bit
//! reproducible for a given seed and input order whatever the thread count.

use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tree::{RegressionTree, Row, TreeConfig};
use super::Regressor;
use crate::models::{FEATURE_COUNT, FeatureVector};
use crate::{Result, SkycastError};

/// Random forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees in the forest
    pub n_estimators: usize,
    /// Random seed
    pub seed: u64,
    /// Worker threads used while fitting (None = all cores)
    pub n_jobs: Option<usize>,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Per-tree growth limits
    pub tree: TreeConfig,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            seed: 42,
            n_jobs: None,
            bootstrap: true,
            tree: TreeConfig::default(),
        }
    }
}

/// Random forest model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<RegressionTree>,
    feature_importances: Vec<f64>,
    n_samples: usize,
}

impl RandomForest {
    /// Create an unfitted forest
    #[must_use]
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            feature_importances: Vec::new(),
            n_samples: 0,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    /// Number of trees
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Number of rows the forest was fitted on
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Normalised feature importances in schema order
    #[must_use]
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    fn grow_trees(&self, rows: &[Row], targets: &[f64]) -> Vec<RegressionTree> {
        let n = rows.len();
        (0..self.config.n_estimators)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(i as u64));
                let sample: Vec<usize> = if self.config.bootstrap {
                    (0..n).map(|_| rng.random_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                RegressionTree::fit(&self.config.tree, rows, targets, sample, &mut rng)
            })
            .collect()
    }
}

impl Regressor for RandomForest {
    fn fit(&mut self, features: &[FeatureVector], targets: &[f64]) -> Result<()> {
        if features.is_empty() {
            return Err(SkycastError::training("cannot fit a forest on zero rows"));
        }
        if features.len() != targets.len() {
            return Err(SkycastError::training(format!(
                "{} feature rows but {} targets",
                features.len(),
                targets.len()
            )));
        }
        if self.config.n_estimators == 0 {
            return Err(SkycastError::training("n_estimators must be at least 1"));
        }

        let rows: Vec<Row> = features.iter().map(FeatureVector::to_row).collect();

        let trees = match self.config.n_jobs {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| SkycastError::training(format!("failed to start worker pool: {e}")))?;
                pool.install(|| self.grow_trees(&rows, targets))
            }
            None => self.grow_trees(&rows, targets),
        };

        let mut importances = vec![0.0; FEATURE_COUNT];
        for tree in &trees {
            for (total, value) in importances.iter_mut().zip(tree.importances()) {
                *total += value;
            }
        }
        let sum: f64 = importances.iter().sum();
        if sum > 0.0 {
            for value in &mut importances {
                *value /= sum;
            }
        }

        debug!(
            "Fitted {} trees on {} rows ({} nodes in total)",
            trees.len(),
            rows.len(),
            trees.iter().map(RegressionTree::n_nodes).sum::<usize>()
        );

        self.trees = trees;
        self.feature_importances = importances;
        self.n_samples = rows.len();
        Ok(())
    }

    fn predict(&self, features: &FeatureVector) -> f64 {
        if self.trees.is_empty() {
            return f64::NAN;
        }
        let row = features.to_row();
        let total: f64 = self.trees.iter().map(|tree| tree.predict(&row)).sum();
        total / self.trees.len() as f64
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}
