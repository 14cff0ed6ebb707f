//! # activity-quality
//!
//! Classification of weight-lifting exercise quality from wearable
//! activity-monitor readings, with strict separation between what is learned
//! from the training subset and what is merely applied to the evaluation
//! subset.
//!
//! ## Core Design Principles
//!
//! - **Stateful Type Safety**: every learned step has an unfitted type with
//!   `fit` and a fitted type with only `transform`/`predict`, so evaluation
//!   data cannot leak into a fitted statistic.
//! - **Explicit stages**: each pipeline stage returns a value
//!   ([`pipeline::LoadedData`], [`pipeline::Partitioned`],
//!   [`trainer::TrainedModels`], [`pipeline::Evaluation`]); there is no
//!   ambient state.
//! - **Deterministic parallelism**: training runs on a fixed-size `rayon`
//!   pool and every tree, fold and split draws from its own seeded RNG.
//!
//! ## Quick Start
//!
//! ```no_run
//! use activity_quality::{Pipeline, PipelineConfig};
//!
//! let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
//! let report = pipeline.run_path("pml-training.csv").unwrap();
//! println!("{report}");
//! report.write_plot_data("plots").unwrap();
//! ```
//!
//! ## Module Structure
//!
//! - `dataset`: CSV loading, column schema, stratified split, synthetic tables
//! - `preprocessing`: coercion, missingness filter, scaler, PCA, label encoder
//! - `model`: decision tree, random forest, RBF support vector classifier
//! - `trainer`: cross-validation and hyperparameter tuning
//! - `metrics`: confusion matrix and derived rates
//! - `report`: the final report, its JSON form and plot data
//! - `pipeline`: stage orchestration
//! - `config`: run configuration

/// Run configuration.
pub mod config;

/// Data loading utilities and dataset abstractions.
pub mod dataset;

/// Crate-level error type.
pub mod error;

/// Small dense linear-algebra helpers.
pub mod linalg;

/// Classification metrics.
pub mod metrics;

/// Classifiers with compile-time fitted/unfitted separation.
pub mod model;

/// Stage orchestration.
pub mod pipeline;

/// Data preprocessing transformers.
pub mod preprocessing;

/// Analysis report and renderings.
pub mod report;

/// Parameter persistence.
pub mod serialization;

/// Cross-validation and hyperparameter tuning.
pub mod trainer;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use pipeline::Pipeline;
pub use report::AnalysisReport;

/// Crate version, for report headers and `--version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
