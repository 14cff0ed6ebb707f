//! Random forest of CART trees with out-of-bag error tracking.
//!
//! Every tree is grown on a bootstrap sample drawn with its own RNG, seeded
//! from the forest seed and the tree index, so the fitted forest is identical
//! no matter how many worker threads built it. Rows a tree never saw vote on
//! that tree's out-of-bag estimate.

use crate::model::tree::{DecisionTree, FittedDecisionTree};
use crate::model::{argmax_lowest, check_training_data, Classifier, InferenceModel, ModelError};
use ndarray::{ArrayView1, ArrayView2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Spreads consecutive tree indices across the seed space.
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Hyperparameters of a random forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestParams {
    pub n_trees: usize,
    /// Predictors sampled at each split (`mtry`); `None` means `floor(sqrt(p))`.
    pub max_features: Option<usize>,
    pub seed: u64,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_features: None,
            seed: 0,
        }
    }
}

/// Unfitted random forest.
#[derive(Debug, Clone, Default)]
pub struct RandomForest {
    params: RandomForestParams,
}

impl RandomForest {
    pub fn new(params: RandomForestParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RandomForestParams {
        &self.params
    }

    fn resolved_max_features(&self, n_features: usize) -> Result<usize, ModelError> {
        match self.params.max_features {
            None => Ok(((n_features as f64).sqrt().floor() as usize).clamp(1, n_features)),
            Some(m) if m >= 1 && m <= n_features => Ok(m),
            Some(m) => Err(ModelError::InvalidParameter(format!(
                "mtry must lie in 1..={n_features}, got {m}"
            ))),
        }
    }
}

impl Classifier for RandomForest {
    type Fitted = FittedRandomForest;

    fn fit(
        &self,
        x: ArrayView2<f64>,
        y: &[usize],
        n_classes: usize,
    ) -> Result<FittedRandomForest, ModelError> {
        check_training_data(x, y, n_classes)?;
        if self.params.n_trees == 0 {
            return Err(ModelError::InvalidParameter(
                "a forest needs at least one tree".to_string(),
            ));
        }
        let max_features = self.resolved_max_features(x.ncols())?;
        let n = x.nrows();
        let grower = DecisionTree::default();

        let grown: Vec<(FittedDecisionTree, Vec<usize>)> = (0..self.params.n_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng =
                    ChaCha8Rng::seed_from_u64(self.params.seed ^ (t as u64).wrapping_mul(SEED_STRIDE));
                let mut in_bag = vec![false; n];
                let sample: Vec<usize> = (0..n)
                    .map(|_| {
                        let i = rng.gen_range(0..n);
                        in_bag[i] = true;
                        i
                    })
                    .collect();
                let tree = grower.grow(x, y, n_classes, sample, max_features, &mut rng);
                let out_of_bag = (0..n).filter(|&i| !in_bag[i]).collect();
                (tree, out_of_bag)
            })
            .collect();

        let mut votes = vec![vec![0u32; n_classes]; n];
        let mut oob_curve = Vec::with_capacity(grown.len());
        for (tree, out_of_bag) in &grown {
            for &i in out_of_bag {
                votes[i][tree.predict(x.row(i))] += 1;
            }
            oob_curve.push(oob_error_rate(&votes, y));
        }
        let oob_error = oob_curve.last().copied().unwrap_or(f64::NAN);

        tracing::debug!(
            n_trees = grown.len(),
            mtry = max_features,
            oob_error,
            "fitted random forest"
        );

        Ok(FittedRandomForest {
            trees: grown.into_iter().map(|(tree, _)| tree).collect(),
            n_classes,
            n_features: x.ncols(),
            max_features,
            oob_error,
            oob_curve,
        })
    }
}

/// Misclassification rate over rows that received at least one OOB vote.
fn oob_error_rate(votes: &[Vec<u32>], y: &[usize]) -> f64 {
    let mut voted = 0usize;
    let mut wrong = 0usize;
    for (row, &truth) in votes.iter().zip(y) {
        if row.iter().any(|&v| v > 0) {
            voted += 1;
            if argmax_lowest(row) != truth {
                wrong += 1;
            }
        }
    }
    if voted == 0 {
        f64::NAN
    } else {
        wrong as f64 / voted as f64
    }
}

/// Fitted random forest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedRandomForest {
    trees: Vec<FittedDecisionTree>,
    n_classes: usize,
    n_features: usize,
    max_features: usize,
    oob_error: f64,
    oob_curve: Vec<f64>,
}

impl FittedRandomForest {
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Predictors sampled per split.
    pub fn max_features(&self) -> usize {
        self.max_features
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Out-of-bag misclassification rate of the whole forest.
    pub fn oob_error(&self) -> f64 {
        self.oob_error
    }

    /// Out-of-bag error after `1..=n_trees` trees.
    pub fn oob_curve(&self) -> &[f64] {
        &self.oob_curve
    }

    pub fn trees(&self) -> &[FittedDecisionTree] {
        &self.trees
    }
}

impl InferenceModel for FittedRandomForest {
    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict(&self, row: ArrayView1<f64>) -> usize {
        let mut votes = vec![0u32; self.n_classes];
        for tree in &self.trees {
            votes[tree.predict(row)] += 1;
        }
        argmax_lowest(&votes)
    }

    fn predict_batch(&self, x: ArrayView2<f64>) -> Vec<usize> {
        (0..x.nrows())
            .into_par_iter()
            .map(|i| self.predict(x.row(i)))
            .collect()
    }
}
