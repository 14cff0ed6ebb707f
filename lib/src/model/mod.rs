//! Classifiers trained on the projected feature matrix.
//!
//! Each model comes in two types: an unfitted value that carries only
//! hyperparameters and implements [`Classifier`], and the fitted value
//! returned by [`Classifier::fit`], which implements [`InferenceModel`] and
//! holds nothing but what prediction needs.
//!
//! Labels are dense class indices `0..n_classes` as produced by the
//! [`LabelEncoder`](crate::preprocessing::LabelEncoder).

use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod forest;
pub mod svm;
pub mod tree;

pub use forest::{FittedRandomForest, RandomForest, RandomForestParams};
pub use svm::{estimate_sigma, FittedSvc, Svc, SvcParams};
pub use tree::{DecisionTree, FittedDecisionTree};

/// Errors raised while fitting a classifier.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Empty training data: {0}")]
    EmptyData(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("{rows} rows but {labels} labels")]
    LabelMismatch { rows: usize, labels: usize },

    #[error("Label {label} out of range for {n_classes} classes")]
    LabelOutOfRange { label: usize, n_classes: usize },

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Unfitted classifier: hyperparameters only.
pub trait Classifier: Clone + Send + Sync {
    type Fitted: InferenceModel;

    /// Fit on `x` (one row per sample) with labels in `0..n_classes`.
    ///
    /// # Errors
    /// [`ModelError`] for empty input, mismatched lengths, labels outside
    /// `0..n_classes` or invalid hyperparameters.
    fn fit(&self, x: ArrayView2<f64>, y: &[usize], n_classes: usize)
        -> Result<Self::Fitted, ModelError>;
}

/// Fitted classifier.
pub trait InferenceModel: Send + Sync {
    fn n_classes(&self) -> usize;

    fn predict(&self, row: ArrayView1<f64>) -> usize;

    fn predict_batch(&self, x: ArrayView2<f64>) -> Vec<usize> {
        x.rows().into_iter().map(|row| self.predict(row)).collect()
    }
}

/// Shared argument checks for every [`Classifier::fit`].
pub(crate) fn check_training_data(
    x: ArrayView2<f64>,
    y: &[usize],
    n_classes: usize,
) -> Result<(), ModelError> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(ModelError::EmptyData(format!(
            "{} rows x {} features",
            x.nrows(),
            x.ncols()
        )));
    }
    if x.nrows() != y.len() {
        return Err(ModelError::LabelMismatch {
            rows: x.nrows(),
            labels: y.len(),
        });
    }
    if let Some(&label) = y.iter().find(|&&label| label >= n_classes) {
        return Err(ModelError::LabelOutOfRange { label, n_classes });
    }
    Ok(())
}

/// Index of the largest count; ties go to the lowest index.
pub(crate) fn argmax_lowest<T: PartialOrd + Copy>(counts: &[T]) -> usize {
    let mut best = 0;
    for (i, &c) in counts.iter().enumerate().skip(1) {
        if c > counts[best] {
            best = i;
        }
    }
    best
}

/// A fitted model of either family, as chosen by the trainer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    Forest(FittedRandomForest),
    Svm(FittedSvc),
}

impl TrainedModel {
    /// Forest-only: out-of-bag error after each additional tree.
    pub fn oob_curve(&self) -> Option<&[f64]> {
        match self {
            TrainedModel::Forest(forest) => Some(forest.oob_curve()),
            TrainedModel::Svm(_) => None,
        }
    }
}

impl InferenceModel for TrainedModel {
    fn n_classes(&self) -> usize {
        match self {
            TrainedModel::Forest(m) => m.n_classes(),
            TrainedModel::Svm(m) => m.n_classes(),
        }
    }

    fn predict(&self, row: ArrayView1<f64>) -> usize {
        match self {
            TrainedModel::Forest(m) => m.predict(row),
            TrainedModel::Svm(m) => m.predict(row),
        }
    }

    fn predict_batch(&self, x: ArrayView2<f64>) -> Vec<usize> {
        match self {
            TrainedModel::Forest(m) => m.predict_batch(x),
            TrainedModel::Svm(m) => m.predict_batch(x),
        }
    }
}
