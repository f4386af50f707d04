//! Regression decision tree

use crate::error::{ForecastError, Result};
use crate::models::{check_feature_width, validate_training_data, RegressionModel, TrainedRegressor};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Decision tree configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Maximum depth of tree (None = grow until leaves are pure)
    pub max_depth: Option<usize>,
    /// Minimum samples required to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf node
    pub min_samples_leaf: usize,
    /// Maximum features to consider for split (None = all)
    pub max_features: Option<usize>,
    /// Random seed for reproducibility
    pub seed: u64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }
}

/// Tree node. Children are indices into the tree's node arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Fitted regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    config: TreeConfig,
    /// Root is always `nodes[0]`
    nodes: Vec<TreeNode>,
    n_features: usize,
}

/// Sum and sum of squares of a set of targets
#[derive(Debug, Clone, Copy, Default)]
struct Moments {
    n: usize,
    sum: f64,
    sum_sq: f64,
}

impl Moments {
    fn of(targets: &[f64], indices: &[usize]) -> Self {
        let mut m = Moments::default();
        for &i in indices {
            m.add(targets[i]);
        }
        m
    }

    fn add(&mut self, y: f64) {
        self.n += 1;
        self.sum += y;
        self.sum_sq += y * y;
    }

    fn mean(&self) -> f64 {
        if self.n == 0 {
            0.0
        } else {
            self.sum / self.n as f64
        }
    }

    /// Sum of squared deviations from the mean
    fn sse(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        (self.sum_sq - self.sum * self.sum / self.n as f64).max(0.0)
    }

    fn minus(&self, other: &Moments) -> Moments {
        Moments {
            n: self.n - other.n,
            sum: self.sum - other.sum,
            sum_sq: self.sum_sq - other.sum_sq,
        }
    }
}

impl TreeConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_depth == Some(0) {
            return Err(ForecastError::InvalidParameter(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if self.min_samples_split < 2 {
            return Err(ForecastError::InvalidParameter(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        if self.min_samples_leaf < 1 {
            return Err(ForecastError::InvalidParameter(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        if self.max_features == Some(0) {
            return Err(ForecastError::InvalidParameter(
                "max_features must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl RegressionModel for TreeConfig {
    type Trained = DecisionTree;

    fn fit(&self, features: &[Vec<f64>], targets: &[f64]) -> Result<DecisionTree> {
        self.validate()?;
        let n_features = validate_training_data(features, targets)?;

        let mut builder = TreeBuilder {
            config: self,
            features,
            targets,
            n_features,
            nodes: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(self.seed),
        };
        let indices: Vec<usize> = (0..features.len()).collect();
        builder.build(indices, 0);

        Ok(DecisionTree {
            config: self.clone(),
            nodes: builder.nodes,
            n_features,
        })
    }

    fn name(&self) -> &str {
        "Decision Tree"
    }
}

struct TreeBuilder<'a> {
    config: &'a TreeConfig,
    features: &'a [Vec<f64>],
    targets: &'a [f64],
    n_features: usize,
    nodes: Vec<TreeNode>,
    rng: ChaCha8Rng,
}

impl<'a> TreeBuilder<'a> {
    /// Grow the subtree over `indices`, returning its node index
    fn build(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let moments = Moments::of(self.targets, &indices);
        let node_idx = self.nodes.len();
        self.nodes.push(TreeNode::Leaf {
            value: moments.mean(),
            n_samples: moments.n,
        });

        let depth_reached = self.config.max_depth.map_or(false, |max| depth >= max);
        if depth_reached || moments.n < self.config.min_samples_split || moments.sse() < 1e-12 {
            return node_idx;
        }

        let Some((feature, threshold)) = self.best_split(&indices, &moments) else {
            return node_idx;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.features[i][feature] <= threshold);

        let left = self.build(left_idx, depth + 1);
        let right = self.build(right_idx, depth + 1);
        self.nodes[node_idx] = TreeNode::Split {
            feature,
            threshold,
            left,
            right,
        };

        node_idx
    }

    /// Variance-reduction split over a random subset of features
    fn best_split(&mut self, indices: &[usize], parent: &Moments) -> Option<(usize, f64)> {
        let max_features = self
            .config
            .max_features
            .unwrap_or(self.n_features)
            .min(self.n_features);

        let mut candidates: Vec<usize> = (0..self.n_features).collect();
        if max_features < self.n_features {
            candidates.shuffle(&mut self.rng);
            candidates.truncate(max_features);
        }

        let min_leaf = self.config.min_samples_leaf;
        let parent_sse = parent.sse();
        let mut best_gain = 1e-12;
        let mut best: Option<(usize, f64)> = None;

        let mut sorted = indices.to_vec();
        for feature in candidates {
            sorted.sort_by(|&a, &b| self.features[a][feature].total_cmp(&self.features[b][feature]));

            let mut left = Moments::default();
            for pos in 0..sorted.len() - 1 {
                left.add(self.targets[sorted[pos]]);

                let here = self.features[sorted[pos]][feature];
                let next = self.features[sorted[pos + 1]][feature];
                if here == next {
                    continue;
                }

                let right = parent.minus(&left);
                if left.n < min_leaf || right.n < min_leaf {
                    continue;
                }

                let gain = parent_sse - (left.sse() + right.sse());
                if gain > best_gain {
                    let mid = (here + next) / 2.0;
                    let threshold = if mid < next { mid } else { here };
                    best_gain = gain;
                    best = Some((feature, threshold));
                }
            }
        }

        best
    }
}

impl DecisionTree {
    /// Number of nodes in the tree
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Depth of the tree (a single leaf has depth 1)
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 1usize)];
        while let Some((idx, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            if let Some(TreeNode::Split { left, right, .. }) = self.nodes.get(idx) {
                stack.push((*left, depth + 1));
                stack.push((*right, depth + 1));
            }
        }
        max_depth
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }
}

impl TrainedRegressor for DecisionTree {
    fn predict_one(&self, features: &[f64]) -> Result<f64> {
        check_feature_width(self.n_features, features)?;

        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(TreeNode::Leaf { value, .. }) => return Ok(*value),
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    idx = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                None => {
                    return Err(ForecastError::ValidationError(format!(
                        "Decision tree references missing node {}",
                        idx
                    )))
                }
            }
        }
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn name(&self) -> &str {
        "Decision Tree"
    }
}
