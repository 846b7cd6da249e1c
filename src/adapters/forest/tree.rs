//! CART decision tree grown with the Gini criterion.
//!
//! Nodes live in a flat arena and the tree is grown with an explicit work
//! stack, so fully grown trees on large cohorts never recurse.

use rand::seq::SliceRandom;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

/// One arena node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Rows with `row[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Fraction of positive training samples that reached this leaf.
    Leaf { positive_fraction: f64 },
}

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_features: usize,
    pub min_samples_split: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    /// Unnormalized total Gini decrease per feature.
    impurity_decrease: Vec<f64>,
}

struct Pending {
    node: usize,
    samples: Vec<usize>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    children_impurity: f64,
}

/// Gini impurity of a binary node, `2p(1 - p)`.
fn gini(positives: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = positives as f64 / total as f64;
    2.0 * p * (1.0 - p)
}

impl DecisionTree {
    /// Grow a tree on `samples` (indices into `rows`, repeats allowed).
    pub fn grow(
        rows: &[Vec<f64>],
        labels: &[u8],
        samples: Vec<usize>,
        n_features: usize,
        params: TreeParams,
        rng: &mut ChaCha20Rng,
    ) -> Self {
        let mut nodes = vec![Node::Leaf {
            positive_fraction: 0.0,
        }];
        let mut impurity_decrease = vec![0.0; n_features];
        let mut stack = vec![Pending { node: 0, samples }];

        while let Some(Pending { node, samples }) = stack.pop() {
            let total = samples.len();
            let positives = samples.iter().filter(|&&i| labels[i] == 1).count();
            let positive_fraction = if total == 0 {
                0.0
            } else {
                positives as f64 / total as f64
            };

            let pure = positives == 0 || positives == total;
            if total < params.min_samples_split.max(2) || pure {
                nodes[node] = Node::Leaf { positive_fraction };
                continue;
            }

            let Some(best) = best_split(rows, labels, &samples, n_features, params.max_features, rng)
            else {
                nodes[node] = Node::Leaf { positive_fraction };
                continue;
            };

            impurity_decrease[best.feature] +=
                total as f64 * gini(positives, total) - best.children_impurity;

            let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
                .into_iter()
                .partition(|&i| rows[i][best.feature] <= best.threshold);

            let left = nodes.len();
            let right = left + 1;
            nodes.push(Node::Leaf {
                positive_fraction: 0.0,
            });
            nodes.push(Node::Leaf {
                positive_fraction: 0.0,
            });
            nodes[node] = Node::Split {
                feature: best.feature,
                threshold: best.threshold,
                left,
                right,
            };

            stack.push(Pending {
                node: right,
                samples: right_samples,
            });
            stack.push(Pending {
                node: left,
                samples: left_samples,
            });
        }

        Self {
            nodes,
            impurity_decrease,
        }
    }

    /// Leaf positive fraction reached by `row`.
    #[must_use]
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { positive_fraction } => return *positive_fraction,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Per-feature importances normalized to sum to 1 (all zeros for a stump leaf).
    #[must_use]
    pub fn normalized_importances(&self) -> Vec<f64> {
        let total: f64 = self.impurity_decrease.iter().sum();
        if total > 0.0 {
            self.impurity_decrease.iter().map(|v| v / total).collect()
        } else {
            vec![0.0; self.impurity_decrease.len()]
        }
    }
}

/// Search a random subset of features for the split minimizing weighted
/// child impurity.
///
/// Features are visited in random order. Constant features do not count
/// toward `max_features`, and the search keeps going past `max_features`
/// until at least one valid split is found.
fn best_split(
    rows: &[Vec<f64>],
    labels: &[u8],
    samples: &[usize],
    n_features: usize,
    max_features: usize,
    rng: &mut ChaCha20Rng,
) -> Option<BestSplit> {
    let mut features: Vec<usize> = (0..n_features).collect();
    features.shuffle(rng);

    let total = samples.len();
    let total_positives = samples.iter().filter(|&&i| labels[i] == 1).count();
    let mut best: Option<BestSplit> = None;
    let mut visited = 0;

    let mut column: Vec<(f64, u8)> = Vec::with_capacity(total);
    for feature in features {
        if visited >= max_features && best.is_some() {
            break;
        }

        column.clear();
        column.extend(samples.iter().map(|&i| (rows[i][feature], labels[i])));
        column.sort_by(|a, b| a.0.total_cmp(&b.0));

        if column[0].0 == column[total - 1].0 {
            continue;
        }
        visited += 1;

        let mut left_positives = 0;
        for split_at in 1..total {
            left_positives += usize::from(column[split_at - 1].1);
            let (lower, upper) = (column[split_at - 1].0, column[split_at].0);
            if lower == upper {
                continue;
            }

            let right_positives = total_positives - left_positives;
            let right_total = total - split_at;
            let impurity = split_at as f64 * gini(left_positives, split_at)
                + right_total as f64 * gini(right_positives, right_total);

            if best.as_ref().map_or(true, |b| impurity < b.children_impurity) {
                let mut threshold = lower + (upper - lower) / 2.0;
                if threshold >= upper || !threshold.is_finite() {
                    threshold = lower;
                }
                best = Some(BestSplit {
                    feature,
                    threshold,
                    children_impurity: impurity,
                });
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn params(max_features: usize) -> TreeParams {
        TreeParams {
            max_features,
            min_samples_split: 2,
        }
    }

    #[test]
    fn test_separable_data_grows_single_split() {
        let rows = vec![vec![1.0], vec![2.0], vec![3.0], vec![10.0], vec![11.0]];
        let labels = vec![0, 0, 0, 1, 1];
        let mut rng = ChaCha20Rng::seed_from_u64(7);

        let tree = DecisionTree::grow(&rows, &labels, (0..5).collect(), 1, params(1), &mut rng);

        assert_eq!(tree.nodes.len(), 3);
        match &tree.nodes[0] {
            Node::Split { threshold, left, right, .. } => {
                assert_eq!(*threshold, 6.5);
                assert!(matches!(tree.nodes[*left], Node::Leaf { .. }));
                assert!(matches!(tree.nodes[*right], Node::Leaf { .. }));
            }
            other => panic!("Expected split, got {other:?}"),
        }
        assert_eq!(tree.predict(&[2.5]), 0.0);
        assert_eq!(tree.predict(&[6.5]), 0.0);
        assert_eq!(tree.predict(&[6.6]), 1.0);
    }

    #[test]
    fn test_pure_node_is_leaf() {
        let rows = vec![vec![1.0], vec![2.0]];
        let labels = vec![1, 1];
        let mut rng = ChaCha20Rng::seed_from_u64(7);

        let tree = DecisionTree::grow(&rows, &labels, vec![0, 1], 1, params(1), &mut rng);
        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.predict(&[100.0]), 1.0);
        assert_eq!(tree.normalized_importances(), vec![0.0]);
    }

    #[test]
    fn test_unsplittable_mixed_node_keeps_fraction() {
        let rows = vec![vec![5.0], vec![5.0], vec![5.0], vec![5.0]];
        let labels = vec![1, 0, 0, 0];
        let mut rng = ChaCha20Rng::seed_from_u64(7);

        let tree = DecisionTree::grow(&rows, &labels, (0..4).collect(), 1, params(1), &mut rng);
        assert_eq!(tree.predict(&[5.0]), 0.25);
    }

    #[test]
    fn test_search_skips_constant_feature() {
        // Feature 0 is constant, feature 1 separates the classes.
        let rows = vec![vec![3.0, 0.0], vec![3.0, 1.0], vec![3.0, 5.0], vec![3.0, 6.0]];
        let labels = vec![0, 0, 1, 1];

        for seed in 0..8 {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let tree = DecisionTree::grow(&rows, &labels, (0..4).collect(), 2, params(1), &mut rng);
            assert_eq!(tree.normalized_importances(), vec![0.0, 1.0]);
        }
    }

    #[test]
    fn test_deep_tree_does_not_overflow() {
        // Alternating labels on a line force a maximally deep tree.
        let n = 1000;
        let rows: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64]).collect();
        let labels: Vec<u8> = (0..n).map(|i| u8::from(i % 2 == 0)).collect();
        let mut rng = ChaCha20Rng::seed_from_u64(1);

        let tree = DecisionTree::grow(&rows, &labels, (0..n).collect(), 1, params(1), &mut rng);
        for (row, label) in rows.iter().zip(&labels).step_by(37) {
            assert_eq!(tree.predict(row), f64::from(*label));
        }
    }
}
