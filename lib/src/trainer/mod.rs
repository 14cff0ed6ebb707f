//! Hyperparameter tuning for the three candidate configurations.
//!
//! A [`Trainer`] is built once with [`TrainerBuilder`] and then fits, inside a
//! single fixed-size worker pool:
//!
//! 1. a random forest whose `mtry` is tuned by stratified k-fold CV,
//! 2. a random forest whose `mtry` is tuned by out-of-bag accuracy,
//! 3. an RBF support vector classifier whose cost is tuned by k-fold CV.
//!
//! Each yields a [`TunedModel`] carrying the refit model and the score of
//! every candidate. Candidate ties go to the first candidate in grid order.

pub mod cv;

pub use cv::{accuracy, cross_validate, StratifiedKFold};

use crate::model::{
    estimate_sigma, Classifier, InferenceModel, ModelError, RandomForest, RandomForestParams, Svc,
    SvcParams, TrainedModel,
};
use ndarray::ArrayView2;
use rayon::ThreadPool;
use serde::Serialize;
use std::sync::Arc;

/// How a candidate's accuracy was estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resampling {
    CrossValidation { folds: usize },
    OutOfBag,
}

impl std::fmt::Display for Resampling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resampling::CrossValidation { folds } => write!(f, "{folds}-fold CV"),
            Resampling::OutOfBag => write!(f, "out-of-bag"),
        }
    }
}

/// Accuracy of one hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateScore {
    /// e.g. `mtry=8` or `C=0.5`.
    pub label: String,
    pub accuracy: f64,
}

/// A tuned configuration ready for evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct TunedModel {
    pub name: String,
    pub resampling: Resampling,
    pub candidates: Vec<CandidateScore>,
    /// Label of the chosen candidate.
    pub best: String,
    /// Resampled accuracy of the chosen candidate.
    pub accuracy: f64,
    #[serde(skip)]
    pub model: TrainedModel,
}

/// The three tuned configurations, in fixed comparison order, plus the
/// worker pool they were trained on.
#[derive(Debug, Clone)]
pub struct TrainedModels {
    pub forest_cv: TunedModel,
    pub forest_oob: TunedModel,
    pub svm: TunedModel,
    pool: Arc<ThreadPool>,
}

impl TrainedModels {
    /// Configurations in comparison order: forest-CV, forest-OOB, SVM.
    pub fn in_order(&self) -> [&TunedModel; 3] {
        [&self.forest_cv, &self.forest_oob, &self.svm]
    }

    /// Highest resampled accuracy; ties go to the earlier configuration.
    pub fn best(&self) -> &TunedModel {
        let mut best = &self.forest_cv;
        for candidate in [&self.forest_oob, &self.svm] {
            if comparable(candidate.accuracy) > comparable(best.accuracy) {
                best = candidate;
            }
        }
        best
    }

    /// Threads in the training pool.
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `op` on the training pool.
    pub fn install<R, F>(&self, op: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    /// Predictions of the best configuration, computed on the training pool.
    pub fn predict_best(&self, x: ArrayView2<f64>) -> Vec<usize> {
        let best = self.best();
        self.install(|| best.model.predict_batch(x))
    }
}

/// NaN scores (no out-of-bag rows) rank below every real score.
fn comparable(accuracy: f64) -> f64 {
    if accuracy.is_nan() {
        f64::NEG_INFINITY
    } else {
        accuracy
    }
}

/// Index of the highest score; ties go to the first.
fn first_best(scores: &[CandidateScore]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, s) in scores.iter().enumerate() {
        match best {
            Some(b) if comparable(scores[b].accuracy) >= comparable(s.accuracy) => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Default `mtry` grid: `floor(linspace(2, p, 3))`, deduplicated and
/// clamped to `[1, p]`.
pub fn default_mtry_grid(n_features: usize) -> Vec<usize> {
    let p = n_features.max(1);
    let lo = 2.0f64.min(p as f64);
    let hi = p as f64;
    let mut grid: Vec<usize> = (0..3)
        .map(|i| (lo + (hi - lo) * i as f64 / 2.0).floor() as usize)
        .map(|m| m.clamp(1, p))
        .collect();
    grid.dedup();
    grid
}

/// Tuning orchestration for the three configurations.
#[derive(Debug, Clone)]
pub struct Trainer {
    pub(crate) folds: usize,
    pub(crate) workers: usize,
    pub(crate) seed: u64,
    pub(crate) n_trees: usize,
    pub(crate) mtry_grid: Option<Vec<usize>>,
    pub(crate) cost_grid: Vec<f64>,
    pub(crate) sigma: Option<f64>,
    pub(crate) svm_tolerance: f64,
    pub(crate) svm_max_iter: usize,
}

/// Fluent builder for [`Trainer`].
///
/// Defaults:
/// - `folds`: 10
/// - `workers`: 4
/// - `n_trees`: 100
/// - `cost_grid`: [0.25, 0.5, 1.0]
/// - `sigma`: estimated from the training data
#[derive(Debug, Clone)]
pub struct TrainerBuilder {
    inner: Trainer,
}

impl Default for TrainerBuilder {
    fn default() -> Self {
        Self {
            inner: Trainer {
                folds: 10,
                workers: 4,
                seed: 3433,
                n_trees: 100,
                mtry_grid: None,
                cost_grid: vec![0.25, 0.5, 1.0],
                sigma: None,
                svm_tolerance: 1e-3,
                svm_max_iter: 1_000_000,
            },
        }
    }
}

impl TrainerBuilder {
    pub fn folds(mut self, folds: usize) -> Self {
        self.inner.folds = folds;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.inner.workers = workers;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.inner.seed = seed;
        self
    }

    pub fn n_trees(mut self, n_trees: usize) -> Self {
        self.inner.n_trees = n_trees;
        self
    }

    /// Explicit `mtry` values instead of the default grid.
    pub fn mtry_grid(mut self, grid: Option<Vec<usize>>) -> Self {
        self.inner.mtry_grid = grid;
        self
    }

    pub fn cost_grid(mut self, grid: Vec<f64>) -> Self {
        self.inner.cost_grid = grid;
        self
    }

    /// Fixed kernel width instead of the data-driven estimate.
    pub fn sigma(mut self, sigma: Option<f64>) -> Self {
        self.inner.sigma = sigma;
        self
    }

    pub fn svm_tolerance(mut self, tolerance: f64) -> Self {
        self.inner.svm_tolerance = tolerance;
        self
    }

    pub fn svm_max_iter(mut self, max_iter: usize) -> Self {
        self.inner.svm_max_iter = max_iter;
        self
    }

    pub fn build(self) -> Trainer {
        self.inner
    }
}

impl Trainer {
    pub fn builder() -> TrainerBuilder {
        TrainerBuilder::default()
    }

    fn mtry_candidates(&self, n_features: usize) -> Result<Vec<usize>, ModelError> {
        let grid = match &self.mtry_grid {
            Some(grid) => grid.clone(),
            None => default_mtry_grid(n_features),
        };
        if grid.is_empty() {
            return Err(ModelError::InvalidParameter("empty mtry grid".to_string()));
        }
        Ok(grid)
    }

    fn forest(&self, mtry: usize) -> RandomForest {
        RandomForest::new(RandomForestParams {
            n_trees: self.n_trees,
            max_features: Some(mtry),
            seed: self.seed,
        })
    }

    /// Fit all three configurations inside one pool of `workers` threads.
    pub fn fit_all(
        &self,
        x: ArrayView2<f64>,
        y: &[usize],
        n_classes: usize,
    ) -> Result<TrainedModels, ModelError> {
        if self.workers == 0 {
            return Err(ModelError::InvalidParameter(
                "worker pool needs at least one thread".to_string(),
            ));
        }
        let pool = Arc::new(
            rayon::ThreadPoolBuilder::new()
                .num_threads(self.workers)
                .build()?,
        );
        tracing::info!(workers = self.workers, "training pool ready");

        let (forest_cv, forest_oob, svm) = pool.install(|| {
            Ok::<_, ModelError>((
                self.tune_forest_cv(x, y, n_classes)?,
                self.tune_forest_oob(x, y, n_classes)?,
                self.tune_svm(x, y, n_classes)?,
            ))
        })?;
        Ok(TrainedModels {
            forest_cv,
            forest_oob,
            svm,
            pool,
        })
    }

    /// Random forest, `mtry` chosen by stratified k-fold CV, refit on all rows.
    pub fn tune_forest_cv(
        &self,
        x: ArrayView2<f64>,
        y: &[usize],
        n_classes: usize,
    ) -> Result<TunedModel, ModelError> {
        let folds = StratifiedKFold::new(self.folds, self.seed)?.folds(y)?;
        let grid = self.mtry_candidates(x.ncols())?;

        let mut candidates = Vec::with_capacity(grid.len());
        for &mtry in &grid {
            let accuracy = cross_validate(&self.forest(mtry), x, y, n_classes, &folds)?;
            tracing::debug!(mtry, accuracy, "forest CV candidate");
            candidates.push(CandidateScore {
                label: format!("mtry={mtry}"),
                accuracy,
            });
        }

        let best = first_best(&candidates)
            .ok_or_else(|| ModelError::InvalidParameter("empty mtry grid".to_string()))?;
        let model = self.forest(grid[best]).fit(x, y, n_classes)?;
        tracing::info!(mtry = grid[best], accuracy = candidates[best].accuracy, "random forest (CV) tuned");

        Ok(TunedModel {
            name: "Random forest (k-fold CV)".to_string(),
            resampling: Resampling::CrossValidation { folds: self.folds },
            best: candidates[best].label.clone(),
            accuracy: candidates[best].accuracy,
            candidates,
            model: TrainedModel::Forest(model),
        })
    }

    /// Random forest, `mtry` chosen by out-of-bag accuracy on all rows.
    pub fn tune_forest_oob(
        &self,
        x: ArrayView2<f64>,
        y: &[usize],
        n_classes: usize,
    ) -> Result<TunedModel, ModelError> {
        let grid = self.mtry_candidates(x.ncols())?;

        let mut candidates = Vec::with_capacity(grid.len());
        let mut fitted = Vec::with_capacity(grid.len());
        for &mtry in &grid {
            let forest = self.forest(mtry).fit(x, y, n_classes)?;
            let accuracy = 1.0 - forest.oob_error();
            tracing::debug!(mtry, accuracy, "forest OOB candidate");
            candidates.push(CandidateScore {
                label: format!("mtry={mtry}"),
                accuracy,
            });
            fitted.push(forest);
        }

        let best = first_best(&candidates)
            .ok_or_else(|| ModelError::InvalidParameter("empty mtry grid".to_string()))?;
        tracing::info!(mtry = grid[best], accuracy = candidates[best].accuracy, "random forest (OOB) tuned");

        Ok(TunedModel {
            name: "Random forest (out-of-bag)".to_string(),
            resampling: Resampling::OutOfBag,
            best: candidates[best].label.clone(),
            accuracy: candidates[best].accuracy,
            candidates,
            model: TrainedModel::Forest(fitted.swap_remove(best)),
        })
    }

    /// RBF support vector classifier, cost chosen by k-fold CV, refit on all rows.
    pub fn tune_svm(
        &self,
        x: ArrayView2<f64>,
        y: &[usize],
        n_classes: usize,
    ) -> Result<TunedModel, ModelError> {
        if self.cost_grid.is_empty() {
            return Err(ModelError::InvalidParameter("empty cost grid".to_string()));
        }
        let sigma = match self.sigma {
            Some(sigma) => sigma,
            None => estimate_sigma(x, self.seed)?,
        };
        let folds = StratifiedKFold::new(self.folds, self.seed)?.folds(y)?;
        let svc = |cost: f64| {
            Svc::new(SvcParams {
                cost,
                sigma,
                tolerance: self.svm_tolerance,
                max_iter: self.svm_max_iter,
                ..SvcParams::default()
            })
        };

        let mut candidates = Vec::with_capacity(self.cost_grid.len());
        for &cost in &self.cost_grid {
            let accuracy = cross_validate(&svc(cost), x, y, n_classes, &folds)?;
            tracing::debug!(cost, sigma, accuracy, "SVM CV candidate");
            candidates.push(CandidateScore {
                label: format!("C={cost}"),
                accuracy,
            });
        }

        let best = first_best(&candidates)
            .ok_or_else(|| ModelError::InvalidParameter("empty cost grid".to_string()))?;
        let cost = self.cost_grid[best];
        let model = svc(cost).fit(x, y, n_classes)?;
        tracing::info!(cost, sigma, accuracy = candidates[best].accuracy, "RBF SVM tuned");

        Ok(TunedModel {
            name: "RBF support vector machine (k-fold CV)".to_string(),
            resampling: Resampling::CrossValidation { folds: self.folds },
            best: format!("C={cost}, sigma={sigma:.4}"),
            accuracy: candidates[best].accuracy,
            candidates,
            model: TrainedModel::Svm(model),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InferenceModel;
    use ndarray::Array2;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rand_distr::{Distribution, Normal};

    fn blobs(n_per_class: usize) -> (Array2<f64>, Vec<usize>) {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let noise = Normal::new(0.0, 0.4).unwrap();
        let centers = [[0.0, 0.0, 0.0], [3.0, 0.0, 1.0], [0.0, 3.0, -1.0]];
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for i in 0..3 * n_per_class {
            let class = i % 3;
            data.extend(centers[class].iter().map(|c| c + noise.sample(&mut rng)));
            labels.push(class);
        }
        (Array2::from_shape_vec((labels.len(), 3), data).unwrap(), labels)
    }

    fn score(label: &str, accuracy: f64) -> CandidateScore {
        CandidateScore {
            label: label.to_string(),
            accuracy,
        }
    }

    #[test]
    fn test_default_mtry_grid() {
        assert_eq!(default_mtry_grid(50), vec![2, 26, 50]);
        assert_eq!(default_mtry_grid(3), vec![2, 3]);
        assert_eq!(default_mtry_grid(2), vec![2]);
        assert_eq!(default_mtry_grid(1), vec![1]);
    }

    #[test]
    fn test_first_best_keeps_grid_order() {
        let scores = [score("a", 0.8), score("b", 0.9), score("c", 0.9)];
        assert_eq!(first_best(&scores), Some(1));
        assert_eq!(first_best(&[]), None);
    }

    #[test]
    fn test_first_best_ranks_nan_last() {
        let scores = [score("a", 0.8), score("b", f64::NAN), score("c", 0.7)];
        assert_eq!(first_best(&scores), Some(0));
        let scores = [score("a", f64::NAN), score("b", 0.6)];
        assert_eq!(first_best(&scores), Some(1));
        let scores = [score("a", f64::NAN), score("b", f64::NAN)];
        assert_eq!(first_best(&scores), Some(0));
    }

    #[test]
    fn test_builder_defaults() {
        let trainer = Trainer::builder().build();
        assert_eq!(trainer.folds, 10);
        assert_eq!(trainer.workers, 4);
        assert_eq!(trainer.n_trees, 100);
        assert_eq!(trainer.cost_grid, vec![0.25, 0.5, 1.0]);
    }

    #[test]
    fn test_fit_all_on_blobs() {
        let (x, y) = blobs(20);
        let trainer = Trainer::builder().folds(3).n_trees(15).workers(2).seed(5).build();
        let models = trainer.fit_all(x.view(), &y, 3).unwrap();

        for tuned in models.in_order() {
            assert!(
                tuned.accuracy > 0.8,
                "{} accuracy {}",
                tuned.name,
                tuned.accuracy
            );
            assert!(!tuned.candidates.is_empty());
            let predictions = tuned.model.predict_batch(x.view());
            assert_eq!(predictions.len(), y.len());
        }
        assert_eq!(models.forest_cv.candidates.len(), 2);
        assert_eq!(models.svm.candidates.len(), 3);
        assert!(models.forest_oob.model.oob_curve().is_some());
        assert!(models.svm.model.oob_curve().is_none());
    }

    #[test]
    fn test_best_prefers_earlier_on_tie() {
        let (x, y) = blobs(6);
        let trainer = Trainer::builder().folds(2).n_trees(3).workers(1).build();
        let mut models = trainer.fit_all(x.view(), &y, 3).unwrap();
        models.forest_cv.accuracy = 0.9;
        models.forest_oob.accuracy = 0.9;
        models.svm.accuracy = 0.9;
        assert_eq!(models.best().name, models.forest_cv.name);
        models.svm.accuracy = 0.95;
        assert_eq!(models.best().name, models.svm.name);
    }

    #[test]
    fn test_best_skips_nan_accuracy() {
        let (x, y) = blobs(6);
        let trainer = Trainer::builder().folds(2).n_trees(3).workers(1).build();
        let mut models = trainer.fit_all(x.view(), &y, 3).unwrap();
        models.forest_cv.accuracy = 0.7;
        models.forest_oob.accuracy = f64::NAN;
        models.svm.accuracy = 0.6;
        assert_eq!(models.best().name, models.forest_cv.name);
        models.forest_cv.accuracy = f64::NAN;
        assert_eq!(models.best().name, models.svm.name);
    }

    #[test]
    fn test_prediction_runs_on_training_pool() {
        let (x, y) = blobs(10);
        let trainer = Trainer::builder().folds(2).n_trees(5).workers(3).build();
        let models = trainer.fit_all(x.view(), &y, 3).unwrap();

        assert_eq!(models.workers(), 3);
        assert_eq!(models.install(rayon::current_num_threads), 3);
        assert!(models.install(|| rayon::current_thread_index().is_some()));
        assert_eq!(
            models.predict_best(x.view()),
            models.best().model.predict_batch(x.view())
        );
    }

    #[test]
    fn test_zero_workers_rejected() {
        let (x, y) = blobs(4);
        let trainer = Trainer::builder().workers(0).build();
        assert!(trainer.fit_all(x.view(), &y, 3).is_err());
    }
}
