//! Random Forest regressor (bagged decision trees)

use super::decision_tree::{DecisionTree, TreeConfig};
use crate::error::{ForecastError, Result};
use crate::models::{check_feature_width, validate_training_data, RegressionModel, TrainedRegressor};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Random Forest configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Number of trees in the forest
    pub n_trees: usize,
    /// Maximum depth of each tree (None = unbounded)
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered per split (None = all)
    pub max_features: Option<usize>,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Random seed
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            seed: 42,
        }
    }
}

impl ForestConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_trees == 0 {
            return Err(ForecastError::InvalidParameter(
                "A forest needs at least one tree".to_string(),
            ));
        }
        self.tree_config(0).validate()
    }

    fn tree_config(&self, tree_idx: usize) -> TreeConfig {
        TreeConfig {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features,
            seed: self.seed.wrapping_add(tree_idx as u64),
        }
    }

    /// Row indices drawn with replacement for one tree
    fn bootstrap_indices(&self, n: usize, tree_idx: usize) -> Vec<usize> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(tree_idx as u64));
        (0..n).map(|_| rng.gen_range(0..n)).collect()
    }
}

/// Random Forest model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RegressionModel for ForestConfig {
    type Trained = RandomForest;

    fn fit(&self, features: &[Vec<f64>], targets: &[f64]) -> Result<RandomForest> {
        self.validate()?;
        let n_features = validate_training_data(features, targets)?;
        let n_samples = features.len();

        // Build trees in parallel
        let trees = (0..self.n_trees)
            .into_par_iter()
            .map(|i| {
                let tree_config = self.tree_config(i);

                if self.bootstrap {
                    let indices = self.bootstrap_indices(n_samples, i);
                    let sample_features: Vec<Vec<f64>> =
                        indices.iter().map(|&j| features[j].clone()).collect();
                    let sample_targets: Vec<f64> = indices.iter().map(|&j| targets[j]).collect();
                    tree_config.fit(&sample_features, &sample_targets)
                } else {
                    tree_config.fit(features, targets)
                }
            })
            .collect::<Result<Vec<DecisionTree>>>()?;

        Ok(RandomForest {
            config: self.clone(),
            trees,
            n_features,
        })
    }

    fn name(&self) -> &str {
        "Random Forest"
    }
}

impl RandomForest {
    /// Number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }
}

impl TrainedRegressor for RandomForest {
    fn predict_one(&self, features: &[f64]) -> Result<f64> {
        check_feature_width(self.n_features, features)?;
        if self.trees.is_empty() {
            return Err(ForecastError::ValidationError(
                "Random forest has no trees".to_string(),
            ));
        }

        let mut sum = 0.0;
        for tree in &self.trees {
            sum += tree.predict_one(features)?;
        }
        Ok(sum / self.trees.len() as f64)
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn name(&self) -> &str {
        "Random Forest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let features: Vec<Vec<f64>> = (0..200)
            .map(|i| vec![i as f64 / 20.0, (i as f64 / 10.0).sin()])
            .collect();
        let targets = features
            .iter()
            .enumerate()
            .map(|(i, x)| x[0] + x[1] * 2.0 + 0.1 * (i as f64 % 5.0))
            .collect();
        (features, targets)
    }

    #[test]
    fn test_random_forest_regression() {
        let (features, targets) = sample_data();
        let config = ForestConfig {
            n_trees: 10,
            max_depth: Some(5),
            ..Default::default()
        };

        let forest = config.fit(&features, &targets).unwrap();
        assert_eq!(forest.n_trees(), 10);
        assert_eq!(forest.n_features(), 2);

        let predictions = forest.predict(&features).unwrap();
        let mse = predictions
            .iter()
            .zip(&targets)
            .map(|(p, t)| (p - t).powi(2))
            .sum::<f64>()
            / targets.len() as f64;
        assert!(mse < 1.0, "in-sample mse too high: {}", mse);
    }

    #[test]
    fn test_same_seed_same_model() {
        let (features, targets) = sample_data();
        let config = ForestConfig {
            n_trees: 5,
            ..Default::default()
        };

        let a = config.fit(&features, &targets).unwrap();
        let b = config.fit(&features, &targets).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_prediction_stays_within_target_range() {
        let (features, targets) = sample_data();
        let forest = ForestConfig {
            n_trees: 8,
            ..Default::default()
        }
        .fit(&features, &targets)
        .unwrap();

        let min = targets.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = targets.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let p = forest.predict_one(&[100.0, -5.0]).unwrap();
        assert!(p >= min && p <= max);
    }

    #[test]
    fn test_invalid_config() {
        let config = ForestConfig {
            n_trees: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ForestConfig {
            min_samples_split: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
