//! End-to-end orchestration.
//!
//! Stages hand explicit values to each other:
//!
//! ```text
//! RawTable -> LoadedData -> Partitioned<LabeledTable> -> Partitioned<NumericTable>
//!          -> Partitioned<Array2<f64>> (filtered, scaled, projected)
//!          -> TrainedModels -> Evaluation -> AnalysisReport
//! ```
//!
//! Every fitted step learns from the training subset only; the evaluation
//! subset is touched by `transform` and `predict_batch`, nothing else.
//! Training and evaluation prediction share one pool of `workers` threads.

use crate::config::PipelineConfig;
use crate::dataset::{load_csv, LabeledTable, NumericTable, RawTable, Schema, StratifiedSplit};
use crate::error::PipelineResult;
use crate::metrics::ConfusionMatrix;
use crate::model::TrainedModel;
use crate::preprocessing::{
    CoercionSummary, FittedLabelEncoder, FittedMissingnessFilter, FittedPca,
    FittedStandardScaler, FittedTransformer, LabelEncoder, MissingnessFilter, Pca,
    StandardScaler, Transformer, TypeNormalizer,
};
use crate::report::{AnalysisReport, ModelSummary, ScorePoint};
use crate::trainer::{TrainedModels, Trainer};
use ndarray::Array2;
use std::path::Path;

/// Pruned table plus the label encoding learned from the full label column.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub schema: Schema,
    pub table: LabeledTable,
    pub encoder: FittedLabelEncoder,
    /// Encoded label of every row.
    pub labels: Vec<usize>,
}

/// Training and evaluation views of one stage's data.
#[derive(Debug, Clone)]
pub struct Partitioned<T> {
    pub train: T,
    pub eval: T,
    pub train_labels: Vec<usize>,
    pub eval_labels: Vec<usize>,
}

impl<T> Partitioned<T> {
    /// Apply `f` to both subsets, keeping the labels.
    pub fn try_map<U, E>(self, mut f: impl FnMut(&T) -> Result<U, E>) -> Result<Partitioned<U>, E> {
        Ok(Partitioned {
            train: f(&self.train)?,
            eval: f(&self.eval)?,
            train_labels: self.train_labels,
            eval_labels: self.eval_labels,
        })
    }
}

/// Fitted preprocessing steps, all learned from the training subset.
#[derive(Debug, Clone)]
pub struct FittedPreprocessing {
    pub coercion: CoercionSummary,
    pub filter: FittedMissingnessFilter,
    pub scaler: FittedStandardScaler,
    pub pca: FittedPca,
}

impl FittedPreprocessing {
    /// Names of the filtered columns the scaler found constant.
    pub fn zero_variance_columns(&self) -> Vec<String> {
        let kept = self.filter.kept_names();
        self.scaler
            .zero_variance()
            .iter()
            .map(|&j| kept[j].to_string())
            .collect()
    }
}

/// Predictions of the selected configuration on the evaluation subset.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub selected: String,
    pub predictions: Vec<usize>,
    pub confusion: ConfusionMatrix,
}

/// The configured pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// # Errors
    /// [`ConfigError`](crate::config::ConfigError) if the configuration is out of range.
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Resolve the schema, prune metadata columns and encode labels.
    pub fn load(&self, raw: &RawTable) -> PipelineResult<LoadedData> {
        let schema = Schema::from_headers(raw.headers(), &self.config.schema())?;
        let table = schema.prune(raw)?;
        let (encoder, labels) = LabelEncoder::new().fit_transform(table.labels())?;
        tracing::info!(
            rows = table.n_rows(),
            predictors = table.n_predictors(),
            classes = encoder.n_classes(),
            "loaded table"
        );
        Ok(LoadedData {
            schema,
            table,
            encoder,
            labels,
        })
    }

    /// Stratified split on the encoded label.
    pub fn partition(&self, loaded: &LoadedData) -> PipelineResult<Partitioned<LabeledTable>> {
        let split = StratifiedSplit::new(self.config.train_fraction, self.config.seed)?
            .split(&loaded.labels)?;
        tracing::info!(
            train = split.train().len(),
            eval = split.eval().len(),
            "partitioned rows"
        );
        Ok(Partitioned {
            train: loaded.table.select_rows(split.train()),
            eval: loaded.table.select_rows(split.eval()),
            train_labels: split.train().iter().map(|&i| loaded.labels[i]).collect(),
            eval_labels: split.eval().iter().map(|&i| loaded.labels[i]).collect(),
        })
    }

    /// Coerce both subsets to numbers.
    pub fn normalize(
        &self,
        data: Partitioned<LabeledTable>,
    ) -> PipelineResult<(Partitioned<NumericTable>, CoercionSummary)> {
        let normalizer = TypeNormalizer::new();
        let mut summary = CoercionSummary::default();
        let numeric = data.try_map(|table| {
            let (numeric, part) = normalizer.normalize(table)?;
            summary.merge(&part);
            Ok::<_, crate::preprocessing::PreprocessingError>(numeric)
        })?;
        tracing::info!(
            unreadable = summary.total_failures(),
            columns = summary.failures.len(),
            blank = summary.blank_cells,
            "coerced predictors to numbers"
        );
        Ok((numeric, summary))
    }

    /// Missingness filter, scaler and PCA, each fit on the training subset.
    pub fn preprocess(
        &self,
        data: Partitioned<NumericTable>,
        coercion: CoercionSummary,
    ) -> PipelineResult<(Partitioned<Array2<f64>>, FittedPreprocessing)> {
        let filter = MissingnessFilter::new(self.config.missing_threshold)?.fit(&data.train)?;
        tracing::info!(
            kept = filter.n_features_out(),
            dropped = filter.n_features_in() - filter.n_features_out(),
            "filtered mostly-missing columns"
        );
        let dense = data.try_map(|table| filter.transform(table)?.to_dense())?;

        let scaler = StandardScaler::new()
            .with_zero_variance(self.config.zero_variance)
            .fit(&dense.train)?;
        if !scaler.zero_variance().is_empty() {
            let names: Vec<&str> = scaler
                .zero_variance()
                .iter()
                .map(|&j| filter.kept_names()[j])
                .collect();
            tracing::warn!(columns = ?names, policy = ?self.config.zero_variance, "zero-variance columns");
        }
        let scaled = dense.try_map(|x| scaler.transform(x))?;

        let pca = Pca::new(self.config.variance_threshold)?.fit(&scaled.train)?;
        tracing::info!(
            components = pca.n_components(),
            variance = pca.retained_variance(),
            "projected onto principal components"
        );
        let projected = scaled.try_map(|x| pca.transform(x))?;

        Ok((
            projected,
            FittedPreprocessing {
                coercion,
                filter,
                scaler,
                pca,
            },
        ))
    }

    fn trainer(&self) -> Trainer {
        Trainer::builder()
            .folds(self.config.cv_folds)
            .workers(self.config.workers)
            .seed(self.config.seed)
            .n_trees(self.config.n_trees)
            .mtry_grid(self.config.mtry_grid.clone())
            .cost_grid(self.config.cost_grid.clone())
            .sigma(self.config.sigma)
            .svm_tolerance(self.config.svm_tolerance)
            .svm_max_iter(self.config.svm_max_iter)
            .build()
    }

    /// Tune the three configurations on the projected training subset.
    pub fn train(
        &self,
        data: &Partitioned<Array2<f64>>,
        n_classes: usize,
    ) -> PipelineResult<TrainedModels> {
        Ok(self
            .trainer()
            .fit_all(data.train.view(), &data.train_labels, n_classes)?)
    }

    /// Predict the evaluation subset with the best configuration, on the
    /// same worker pool the models were trained on.
    pub fn evaluate(
        &self,
        models: &TrainedModels,
        data: &Partitioned<Array2<f64>>,
        classes: &[String],
    ) -> Evaluation {
        let best = models.best();
        let predictions = models.predict_best(data.eval.view());
        let confusion = ConfusionMatrix::new(classes.to_vec(), &data.eval_labels, &predictions);
        tracing::info!(
            selected = %best.name,
            error_rate = confusion.error_rate(),
            "evaluated selected configuration"
        );
        Evaluation {
            selected: best.name.clone(),
            predictions,
            confusion,
        }
    }

    /// Run every stage on an in-memory table.
    pub fn run_table(&self, raw: &RawTable) -> PipelineResult<AnalysisReport> {
        let loaded = self.load(raw)?;
        let partitioned = self.partition(&loaded)?;
        let (train_rows, eval_rows) = (partitioned.train.n_rows(), partitioned.eval.n_rows());
        let (numeric, coercion) = self.normalize(partitioned)?;
        let (projected, fitted) = self.preprocess(numeric, coercion)?;

        let classes = loaded.encoder.classes();
        let models = self.train(&projected, classes.len())?;
        let evaluation = self.evaluate(&models, &projected, classes);

        let eval_scores = projected
            .eval
            .rows()
            .into_iter()
            .zip(projected.eval_labels.iter().zip(&evaluation.predictions))
            .map(|(row, (&truth, &predicted))| ScorePoint {
                pc1: row[0],
                pc2: row.get(1).copied().unwrap_or(0.0),
                truth: classes[truth].clone(),
                predicted: classes[predicted].clone(),
                correct: truth == predicted,
            })
            .collect();

        Ok(AnalysisReport {
            n_rows: loaded.table.n_rows(),
            n_predictors: loaded.table.n_predictors(),
            classes: classes.to_vec(),
            train_rows,
            eval_rows,
            dropped_missing: fitted
                .filter
                .dropped_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            kept_predictors: fitted.filter.n_features_out(),
            zero_variance_columns: fitted.zero_variance_columns(),
            coercion: fitted.coercion.clone(),
            n_components: fitted.pca.n_components(),
            retained_variance: fitted.pca.retained_variance(),
            models: models.in_order().into_iter().map(ModelSummary::from).collect(),
            selected: evaluation.selected,
            error_rate: evaluation.confusion.error_rate(),
            kappa: evaluation.confusion.kappa(),
            confusion: evaluation.confusion,
            eval_scores,
            oob_curve: reported_oob_curve(&models),
        })
    }

    /// Load a CSV file and run every stage.
    pub fn run_path<P: AsRef<Path>>(&self, path: P) -> PipelineResult<AnalysisReport> {
        let raw = load_csv(path)?;
        self.run_table(&raw)
    }
}

/// OOB curve of the better forest configuration (ties to the CV-tuned one).
fn reported_oob_curve(models: &TrainedModels) -> Vec<f64> {
    let forest = if models.forest_oob.accuracy > models.forest_cv.accuracy {
        &models.forest_oob.model
    } else {
        &models.forest_cv.model
    };
    match forest {
        TrainedModel::Forest(f) => f.oob_curve().to_vec(),
        TrainedModel::Svm(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::SyntheticConfig;
    use crate::model::InferenceModel;

    fn small_config() -> PipelineConfig {
        PipelineConfig {
            cv_folds: 3,
            n_trees: 10,
            workers: 2,
            ..PipelineConfig::default()
        }
    }

    fn table() -> RawTable {
        SyntheticConfig {
            n_rows: 200,
            n_predictors: 8,
            sparse_columns: 3,
            separation: 2.0,
            ..SyntheticConfig::default()
        }
        .generate()
        .unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PipelineConfig {
            train_fraction: 0.0,
            ..PipelineConfig::default()
        };
        assert!(Pipeline::new(config).is_err());
    }

    #[test]
    fn test_preprocess_learns_from_training_only() {
        let pipeline = Pipeline::new(small_config()).unwrap();
        let loaded = pipeline.load(&table()).unwrap();
        let partitioned = pipeline.partition(&loaded).unwrap();
        let (numeric, coercion) = pipeline.normalize(partitioned).unwrap();
        let (projected, fitted) = pipeline.preprocess(numeric, coercion).unwrap();

        // Sparse summary columns are dropped, sensor columns kept.
        assert_eq!(fitted.filter.n_features_out(), 8);
        assert!(fitted
            .filter
            .dropped_names()
            .iter()
            .all(|name| name.starts_with("kurtosis_")));

        assert_eq!(projected.train.ncols(), projected.eval.ncols());
        assert_eq!(projected.train.nrows(), projected.train_labels.len());
        assert_eq!(projected.eval.nrows(), projected.eval_labels.len());

        // Training scores are centered; evaluation scores need not be.
        let mean = projected.train.mean_axis(ndarray::Axis(0)).unwrap();
        assert!(mean.iter().all(|m| m.abs() < 1e-9));
    }

    #[test]
    fn test_zero_variance_column_reported() {
        let mut raw = table();
        let constant = raw.headers().iter().position(|h| h == "sensor_0").unwrap();
        let headers = raw.headers().to_vec();
        let rows = raw
            .rows()
            .iter()
            .map(|row| {
                let mut row = row.clone();
                row[constant] = "1.5".to_string();
                row
            })
            .collect();
        raw = RawTable::new(headers, rows).unwrap();

        let report = Pipeline::new(small_config()).unwrap().run_table(&raw).unwrap();
        assert_eq!(report.zero_variance_columns, vec!["sensor_0".to_string()]);
    }

    #[test]
    fn test_evaluation_uses_configured_workers() {
        let pipeline = Pipeline::new(small_config()).unwrap();
        let loaded = pipeline.load(&table()).unwrap();
        let (numeric, coercion) = pipeline
            .normalize(pipeline.partition(&loaded).unwrap())
            .unwrap();
        let (projected, _) = pipeline.preprocess(numeric, coercion).unwrap();
        let models = pipeline
            .train(&projected, loaded.encoder.n_classes())
            .unwrap();
        assert_eq!(models.workers(), 2);

        let evaluation = pipeline.evaluate(&models, &projected, loaded.encoder.classes());
        let direct = models.best().model.predict_batch(projected.eval.view());
        assert_eq!(evaluation.predictions, direct);
        assert_eq!(evaluation.confusion.total(), projected.eval_labels.len());
    }

    #[test]
    fn test_reported_oob_curve_has_one_entry_per_tree() {
        let report = Pipeline::new(small_config()).unwrap().run_table(&table()).unwrap();
        assert_eq!(report.oob_curve.len(), 10);
        assert_eq!(report.models.len(), 3);
        assert_eq!(report.eval_scores.len(), report.eval_rows);
    }
}
