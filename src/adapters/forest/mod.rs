//! Random forest adapter: Implementation of Classifier.
//!
//! Bagged CART trees with a probability vote:
//! - bootstrap samples of size n, drawn with replacement
//! - Gini impurity, `floor(sqrt(n_features))` candidate features per split
//! - trees grown until leaves are pure or hold a single sample
//!
//! Every tree draws its own ChaCha20 stream from the forest seed, so a
//! fitted forest is reproducible from `(rows, labels, params)`.

mod tree;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::ports::{Classifier, ModelError};

use tree::{DecisionTree, TreeParams};

/// Default number of trees.
pub const DEFAULT_TREES: usize = 100;

/// Default forest seed.
pub const DEFAULT_FOREST_SEED: u64 = 42;

/// Forest hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub seed: u64,
    /// Candidate features per split; `None` means `floor(sqrt(n_features))`.
    pub max_features: Option<usize>,
    pub min_samples_split: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: DEFAULT_TREES,
            seed: DEFAULT_FOREST_SEED,
            max_features: None,
            min_samples_split: 2,
        }
    }
}

impl ForestParams {
    fn resolved_max_features(&self, n_features: usize) -> usize {
        self.max_features
            .unwrap_or_else(|| (n_features as f64).sqrt().floor() as usize)
            .clamp(1, n_features.max(1))
    }
}

/// Random forest binary classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    #[must_use]
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            n_features: 0,
            trees: Vec::new(),
        }
    }

    #[must_use]
    pub fn params(&self) -> &ForestParams {
        &self.params
    }
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(ForestParams::default())
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, rows: &[Vec<f64>], labels: &[u8]) -> Result<(), ModelError> {
        if rows.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if rows.len() != labels.len() {
            return Err(ModelError::InvalidParameter(format!(
                "{} rows but {} labels",
                rows.len(),
                labels.len()
            )));
        }
        if self.params.n_trees == 0 {
            return Err(ModelError::InvalidParameter("n_trees must be positive".into()));
        }

        let n_features = rows[0].len();
        if let Some(row) = rows.iter().find(|r| r.len() != n_features) {
            return Err(ModelError::FeatureCount {
                got: row.len(),
                expected: n_features,
            });
        }
        if let Some(&label) = labels.iter().find(|&&l| l > 1) {
            return Err(ModelError::InvalidLabel(f64::from(label)));
        }

        let tree_params = TreeParams {
            max_features: self.params.resolved_max_features(n_features),
            min_samples_split: self.params.min_samples_split,
        };

        let n = rows.len();
        let mut seeder = ChaCha20Rng::seed_from_u64(self.params.seed);
        let trees: Vec<DecisionTree> = (0..self.params.n_trees)
            .map(|_| {
                let mut rng = ChaCha20Rng::seed_from_u64(seeder.gen());
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                DecisionTree::grow(rows, labels, bootstrap, n_features, tree_params, &mut rng)
            })
            .collect();

        tracing::debug!(
            trees = trees.len(),
            samples = n,
            features = n_features,
            max_features = tree_params.max_features,
            "Random forest fitted"
        );

        self.n_features = n_features;
        self.trees = trees;
        Ok(())
    }

    fn predict_proba(&self, row: &[f64]) -> Result<f64, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        if row.len() != self.n_features {
            return Err(ModelError::FeatureCount {
                got: row.len(),
                expected: self.n_features,
            });
        }

        let sum: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        Ok((sum / self.trees.len() as f64).clamp(0.0, 1.0))
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn feature_importances(&self) -> Vec<f64> {
        let mut totals = vec![0.0; self.n_features];
        for tree in &self.trees {
            for (total, value) in totals.iter_mut().zip(tree.normalized_importances()) {
                *total += value;
            }
        }

        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            totals.iter_mut().for_each(|v| *v /= sum);
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two informative features plus one noise column.
    fn toy_data(n: usize) -> (Vec<Vec<f64>>, Vec<u8>) {
        let mut rng = ChaCha20Rng::seed_from_u64(99);
        let mut rows = Vec::with_capacity(n);
        let mut labels = Vec::with_capacity(n);
        for _ in 0..n {
            let a: f64 = rng.gen_range(0.0..10.0);
            let b: f64 = rng.gen_range(0.0..10.0);
            let noise: f64 = rng.gen_range(0.0..1.0);
            labels.push(u8::from(a + b > 10.0));
            rows.push(vec![a, b, noise]);
        }
        (rows, labels)
    }

    fn small_params() -> ForestParams {
        ForestParams {
            n_trees: 15,
            ..ForestParams::default()
        }
    }

    #[test]
    fn test_unfitted_forest() {
        let forest = RandomForest::default();
        assert_eq!(forest.predict_proba(&[1.0]), Err(ModelError::NotFitted));
        assert_eq!(forest.n_features(), 0);
    }

    #[test]
    fn test_fit_and_predict() {
        let (rows, labels) = toy_data(300);
        let mut forest = RandomForest::new(small_params());
        forest.fit(&rows, &labels).expect("Should fit");

        assert_eq!(forest.trees.len(), 15);
        let high = forest.predict_proba(&[9.0, 9.0, 0.5]).expect("Should predict");
        let low = forest.predict_proba(&[1.0, 1.0, 0.5]).expect("Should predict");
        assert!(high > 0.8, "high = {high}");
        assert!(low < 0.2, "low = {low}");
    }

    #[test]
    fn test_probabilities_in_unit_interval() {
        let (rows, labels) = toy_data(120);
        let mut forest = RandomForest::new(small_params());
        forest.fit(&rows, &labels).expect("Should fit");

        for row in &rows {
            let p = forest.predict_proba(row).expect("Should predict");
            assert!((0.0..=1.0).contains(&p));
        }
        let extreme = forest
            .predict_proba(&[f64::MAX, -f64::MAX, 0.0])
            .expect("Should predict");
        assert!((0.0..=1.0).contains(&extreme));
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (rows, labels) = toy_data(100);
        let mut a = RandomForest::new(small_params());
        let mut b = RandomForest::new(small_params());
        a.fit(&rows, &labels).expect("Should fit");
        b.fit(&rows, &labels).expect("Should fit");
        assert_eq!(a, b);
    }

    #[test]
    fn test_importances_normalized_and_ranked() {
        let (rows, labels) = toy_data(300);
        let mut forest = RandomForest::new(small_params());
        forest.fit(&rows, &labels).expect("Should fit");

        let importances = forest.feature_importances();
        let sum: f64 = importances.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(importances[0] > importances[2]);
        assert!(importances[1] > importances[2]);
    }

    #[test]
    fn test_rejects_bad_input() {
        let mut forest = RandomForest::default();
        assert_eq!(forest.fit(&[], &[]), Err(ModelError::EmptyTrainingSet));
        assert_eq!(
            forest.fit(&[vec![1.0], vec![2.0]], &[0, 2]),
            Err(ModelError::InvalidLabel(2.0))
        );
        assert_eq!(
            forest.fit(&[vec![1.0], vec![2.0, 3.0]], &[0, 1]),
            Err(ModelError::FeatureCount { got: 2, expected: 1 })
        );
    }

    #[test]
    fn test_wrong_row_width_at_prediction() {
        let (rows, labels) = toy_data(50);
        let mut forest = RandomForest::new(small_params());
        forest.fit(&rows, &labels).expect("Should fit");
        assert_eq!(
            forest.predict_proba(&[1.0, 2.0]),
            Err(ModelError::FeatureCount { got: 2, expected: 3 })
        );
    }

    #[test]
    fn test_default_max_features() {
        let params = ForestParams::default();
        assert_eq!(params.resolved_max_features(3), 1);
        assert_eq!(params.resolved_max_features(9), 3);
        assert_eq!(params.resolved_max_features(1), 1);
    }

    #[test]
    fn test_serde_preserves_predictions() {
        let (rows, labels) = toy_data(80);
        let mut forest = RandomForest::new(small_params());
        forest.fit(&rows, &labels).expect("Should fit");

        let json = serde_json::to_string(&forest).expect("Should serialize");
        let restored: RandomForest = serde_json::from_str(&json).expect("Should deserialize");
        let row = [4.0, 7.0, 0.3];
        let before = forest.predict_proba(&row).expect("Should predict");
        let after = restored.predict_proba(&row).expect("Should predict");
        assert!((before - after).abs() < 1e-12);
    }
}
