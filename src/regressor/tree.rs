//! CART regression tree
//!
//! Nodes live in a flat arena and are grown with an explicit work stack, so
//! neither fitting nor prediction recurses. Splits minimise the summed squared
//! error of the two children; candidate thresholds are midpoints between
//! consecutive distinct feature values.

use rand::rngs::StdRng;
use rand::RngExt;
use serde::{Deserialize, Serialize};

use crate::models::FEATURE_COUNT;

/// Feature row in schema order
pub type Row = [f64; FEATURE_COUNT];

/// Growth limits for a single tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Maximum depth (None = grow until leaves are pure or too small)
    pub max_depth: Option<usize>,
    /// Minimum samples a node needs before it may split
    pub min_samples_split: usize,
    /// Minimum samples each child must keep
    pub min_samples_leaf: usize,
    /// Features considered per split (None = all)
    pub max_features: Option<usize>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    improvement: f64,
}

/// A fitted regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
    /// Unnormalised squared-error reduction per feature
    importances: Vec<f64>,
}

impl RegressionTree {
    /// Grow a tree over `sample`, a list of row indices that may repeat
    pub fn fit(
        config: &TreeConfig,
        rows: &[Row],
        targets: &[f64],
        sample: Vec<usize>,
        rng: &mut StdRng,
    ) -> Self {
        let mut tree = Self {
            nodes: vec![Node::Leaf { value: 0.0 }],
            importances: vec![0.0; FEATURE_COUNT],
        };
        let max_depth = config.max_depth.unwrap_or(usize::MAX);
        let min_split = config.min_samples_split.max(2);
        let min_leaf = config.min_samples_leaf.max(1);

        let mut stack = vec![(0usize, sample, 0usize)];
        while let Some((slot, indices, depth)) = stack.pop() {
            let value = mean(indices.iter().map(|&i| targets[i]));
            let splittable =
                depth < max_depth && indices.len() >= min_split && !is_constant(&indices, targets);

            let split = if splittable {
                best_split(config, rows, targets, &indices, min_leaf, rng)
            } else {
                None
            };

            let Some(split) = split else {
                tree.nodes[slot] = Node::Leaf { value };
                continue;
            };

            let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .partition(|&&i| rows[i][split.feature] <= split.threshold);

            let left = tree.nodes.len();
            let right = left + 1;
            tree.nodes.push(Node::Leaf { value: 0.0 });
            tree.nodes.push(Node::Leaf { value: 0.0 });
            tree.nodes[slot] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };
            tree.importances[split.feature] += split.improvement;

            stack.push((right, right_indices, depth + 1));
            stack.push((left, left_indices, depth + 1));
        }

        tree
    }

    /// Predict the target for one row
    #[must_use]
    pub fn predict(&self, row: &Row) -> f64 {
        let mut index = 0;
        loop {
            match self.nodes[index] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }

    /// Squared-error reduction attributed to each feature
    #[must_use]
    pub fn importances(&self) -> &[f64] {
        &self.importances
    }

    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, Node::Leaf { .. }))
            .count()
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn is_constant(indices: &[usize], targets: &[f64]) -> bool {
    let first = targets[indices[0]];
    indices.iter().all(|&i| targets[i] == first)
}

/// Candidate features for one split, in a seeded order when subsampling
fn candidate_features(config: &TreeConfig, rng: &mut StdRng) -> Vec<usize> {
    let mut features: Vec<usize> = (0..FEATURE_COUNT).collect();
    let take = config.max_features.unwrap_or(FEATURE_COUNT).clamp(1, FEATURE_COUNT);
    if take < FEATURE_COUNT {
        // Partial Fisher-Yates
        for i in 0..take {
            let j = rng.random_range(i..FEATURE_COUNT);
            features.swap(i, j);
        }
        features.truncate(take);
    }
    features
}

fn best_split(
    config: &TreeConfig,
    rows: &[Row],
    targets: &[f64],
    indices: &[usize],
    min_leaf: usize,
    rng: &mut StdRng,
) -> Option<SplitCandidate> {
    let n = indices.len();
    let total_sum: f64 = indices.iter().map(|&i| targets[i]).sum();
    let parent_score = total_sum * total_sum / n as f64;

    let mut best: Option<SplitCandidate> = None;
    let mut sorted = indices.to_vec();

    for feature in candidate_features(config, rng) {
        sorted.sort_by(|&a, &b| rows[a][feature].total_cmp(&rows[b][feature]));

        let mut left_sum = 0.0;
        for k in 0..n - 1 {
            left_sum += targets[sorted[k]];
            let here = rows[sorted[k]][feature];
            let next = rows[sorted[k + 1]][feature];
            if here == next {
                continue;
            }

            let n_left = k + 1;
            let n_right = n - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }

            let right_sum = total_sum - left_sum;
            // SSE(parent) - SSE(children), the sum-of-squares terms cancel
            let improvement = left_sum * left_sum / n_left as f64
                + right_sum * right_sum / n_right as f64
                - parent_score;

            if improvement > best.map_or(0.0, |b| b.improvement) {
                let mut threshold = (here + next) / 2.0;
                if threshold >= next {
                    threshold = here;
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    improvement,
                });
            }
        }
    }

    best
}
