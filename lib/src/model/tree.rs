//! CART classification tree with Gini impurity.
//!
//! Nodes live in a flat arena and are grown with an explicit work stack, so
//! depth is bounded by memory rather than the call stack. At every node a
//! random subset of `max_features` columns is searched, which is what makes
//! the tree usable as a random-forest member.

use crate::model::{argmax_lowest, check_training_data, Classifier, InferenceModel, ModelError};
use ndarray::{ArrayView1, ArrayView2};
use rand::seq::index;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Minimum score gain over the parent for a split to count.
const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        class: usize,
    },
    /// Rows with `x[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Unfitted decision tree.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    /// Columns searched per node; `None` searches all of them.
    pub max_features: Option<usize>,
    /// Nodes with fewer rows become leaves.
    pub min_samples_split: usize,
    pub max_depth: Option<usize>,
    pub seed: u64,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self {
            max_features: None,
            min_samples_split: 2,
            max_depth: None,
            seed: 0,
        }
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_features(mut self, m: usize) -> Self {
        self.max_features = Some(m);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn resolved_max_features(&self, n_features: usize) -> Result<usize, ModelError> {
        match self.max_features {
            None => Ok(n_features),
            Some(m) if m >= 1 && m <= n_features => Ok(m),
            Some(m) => Err(ModelError::InvalidParameter(format!(
                "max_features must lie in 1..={n_features}, got {m}"
            ))),
        }
    }

    /// Grow a tree on the rows listed in `samples` (repeats allowed).
    ///
    /// Inputs are assumed already validated by the caller.
    pub(crate) fn grow<R: Rng>(
        &self,
        x: ArrayView2<f64>,
        y: &[usize],
        n_classes: usize,
        samples: Vec<usize>,
        max_features: usize,
        rng: &mut R,
    ) -> FittedDecisionTree {
        let n_features = x.ncols();
        let mut nodes = vec![Node::Leaf { class: 0 }];
        let mut stack = vec![(0usize, samples, 0usize)];

        while let Some((id, rows, depth)) = stack.pop() {
            let mut counts = vec![0usize; n_classes];
            for &i in &rows {
                counts[y[i]] += 1;
            }
            let majority = argmax_lowest(&counts);
            let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
            let depth_reached = self.max_depth.is_some_and(|d| depth >= d);

            if pure || depth_reached || rows.len() < self.min_samples_split {
                nodes[id] = Node::Leaf { class: majority };
                continue;
            }

            let features = index::sample(rng, n_features, max_features).into_vec();
            match best_split(x, y, n_classes, &rows, &counts, &features) {
                None => nodes[id] = Node::Leaf { class: majority },
                Some((feature, threshold)) => {
                    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
                        rows.iter().partition(|&&i| x[[i, feature]] <= threshold);
                    let left = nodes.len();
                    let right = left + 1;
                    nodes.push(Node::Leaf { class: majority });
                    nodes.push(Node::Leaf { class: majority });
                    nodes[id] = Node::Split {
                        feature,
                        threshold,
                        left,
                        right,
                    };
                    stack.push((right, right_rows, depth + 1));
                    stack.push((left, left_rows, depth + 1));
                }
            }
        }

        FittedDecisionTree {
            nodes,
            n_classes,
            n_features,
        }
    }
}

/// Search `features` for the split with the lowest weighted Gini impurity.
///
/// Maximizes `sum(l_c^2)/n_l + sum(r_c^2)/n_r`, which is equivalent and can
/// be updated in constant time as rows move from right to left.
fn best_split(
    x: ArrayView2<f64>,
    y: &[usize],
    n_classes: usize,
    rows: &[usize],
    counts: &[usize],
    features: &[usize],
) -> Option<(usize, f64)> {
    let n = rows.len() as f64;
    let parent_sq: f64 = counts.iter().map(|&c| (c * c) as f64).sum();
    let mut best_score = parent_sq / n + MIN_GAIN;
    let mut best = None;

    let mut column: Vec<(f64, usize)> = Vec::with_capacity(rows.len());
    let mut left = vec![0usize; n_classes];
    let mut right = vec![0usize; n_classes];

    for &feature in features {
        column.clear();
        column.extend(rows.iter().map(|&i| (x[[i, feature]], y[i])));
        column.sort_by(|a, b| a.0.total_cmp(&b.0));

        left.iter_mut().for_each(|c| *c = 0);
        right.copy_from_slice(counts);
        let mut left_sq = 0.0;
        let mut right_sq = parent_sq;

        for k in 0..column.len() - 1 {
            let class = column[k].1;
            left_sq += (2 * left[class] + 1) as f64;
            left[class] += 1;
            right_sq -= (2 * right[class] - 1) as f64;
            right[class] -= 1;

            let (value, next) = (column[k].0, column[k + 1].0);
            if !(value < next) {
                continue;
            }
            let n_left = (k + 1) as f64;
            let score = left_sq / n_left + right_sq / (n - n_left);
            if score > best_score {
                best_score = score;
                let mid = value + (next - value) / 2.0;
                let threshold = if mid < next { mid } else { value };
                best = Some((feature, threshold));
            }
        }
    }
    best
}

/// Fitted decision tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedDecisionTree {
    nodes: Vec<Node>,
    n_classes: usize,
    n_features: usize,
}

impl FittedDecisionTree {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

impl InferenceModel for FittedDecisionTree {
    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict(&self, row: ArrayView1<f64>) -> usize {
        let mut id = 0;
        loop {
            match self.nodes[id] {
                Node::Leaf { class } => return class,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => id = if row[feature] <= threshold { left } else { right },
            }
        }
    }
}

impl Classifier for DecisionTree {
    type Fitted = FittedDecisionTree;

    fn fit(
        &self,
        x: ArrayView2<f64>,
        y: &[usize],
        n_classes: usize,
    ) -> Result<FittedDecisionTree, ModelError> {
        check_training_data(x, y, n_classes)?;
        let max_features = self.resolved_max_features(x.ncols())?;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        Ok(self.grow(x, y, n_classes, (0..x.nrows()).collect(), max_features, &mut rng))
    }
}
