//! Stratified k-fold cross-validation.

use crate::model::{Classifier, InferenceModel, ModelError};
use ndarray::{ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

/// Fold assignment that keeps every class spread evenly across folds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StratifiedKFold {
    k: usize,
    seed: u64,
}

impl StratifiedKFold {
    /// # Errors
    /// [`ModelError::InvalidParameter`] for fewer than two folds.
    pub fn new(k: usize, seed: u64) -> Result<Self, ModelError> {
        if k < 2 {
            return Err(ModelError::InvalidParameter(format!(
                "cross-validation needs at least 2 folds, got {k}"
            )));
        }
        Ok(Self { k, seed })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Held-out row indices of each fold, sorted.
    ///
    /// Rows of each class are shuffled and dealt round-robin; the dealing
    /// position carries over between classes so fold sizes differ by at
    /// most one.
    ///
    /// # Errors
    /// [`ModelError::InvalidParameter`] if there are fewer rows than folds.
    pub fn folds(&self, y: &[usize]) -> Result<Vec<Vec<usize>>, ModelError> {
        if y.len() < self.k {
            return Err(ModelError::InvalidParameter(format!(
                "{} rows cannot fill {} folds",
                y.len(),
                self.k
            )));
        }

        let n_classes = y.iter().max().map_or(0, |m| m + 1);
        let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
        for (i, &label) in y.iter().enumerate() {
            by_class[label].push(i);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut folds = vec![Vec::new(); self.k];
        let mut position = 0;
        for mut rows in by_class {
            rows.shuffle(&mut rng);
            for i in rows {
                folds[position % self.k].push(i);
                position += 1;
            }
        }
        for fold in &mut folds {
            fold.sort_unstable();
        }
        Ok(folds)
    }
}

/// Accuracy of `predicted` against `truth`.
pub fn accuracy(predicted: &[usize], truth: &[usize]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let correct = predicted.iter().zip(truth).filter(|(p, t)| p == t).count();
    correct as f64 / truth.len() as f64
}

/// Mean held-out accuracy of `model` over `folds`, folds evaluated in parallel.
pub fn cross_validate<C: Classifier>(
    model: &C,
    x: ArrayView2<f64>,
    y: &[usize],
    n_classes: usize,
    folds: &[Vec<usize>],
) -> Result<f64, ModelError> {
    let scores: Vec<f64> = folds
        .par_iter()
        .map(|held_out| {
            let mut is_held_out = vec![false; y.len()];
            for &i in held_out {
                is_held_out[i] = true;
            }
            let train: Vec<usize> = (0..y.len()).filter(|&i| !is_held_out[i]).collect();

            let x_train = x.select(Axis(0), &train);
            let y_train: Vec<usize> = train.iter().map(|&i| y[i]).collect();
            let fitted = model.fit(x_train.view(), &y_train, n_classes)?;

            let x_test = x.select(Axis(0), held_out);
            let y_test: Vec<usize> = held_out.iter().map(|&i| y[i]).collect();
            Ok(accuracy(&fitted.predict_batch(x_test.view()), &y_test))
        })
        .collect::<Result<_, ModelError>>()?;

    if scores.is_empty() {
        return Err(ModelError::EmptyData("no folds to evaluate".to_string()));
    }
    Ok(scores.iter().sum::<f64>() / scores.len() as f64)
}
