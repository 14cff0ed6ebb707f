//! Dataset abstractions for the activity-monitor tables.
//!
//! Data moves through three shapes:
//!
//! - [`RawTable`]: header plus text rows exactly as read from CSV.
//! - [`LabeledTable`]: predictor columns (still text) and the label column,
//!   after the metadata columns are pruned by a [`Schema`].
//! - [`NumericTable`]: named predictor columns of `Option<f64>` once the
//!   [`TypeNormalizer`](crate::preprocessing::TypeNormalizer) has run;
//!   `None` marks a missing value.
//!
//! Row assignment to training and evaluation subsets is handled by
//! [`StratifiedSplit`].
//!
//! # Example
//!
//! ```no_run
//! use activity_quality::dataset::{load_csv, Schema, SchemaConfig};
//!
//! let raw = load_csv("pml-training.csv").unwrap();
//! let schema = Schema::from_headers(raw.headers(), &SchemaConfig::default()).unwrap();
//! let table = schema.prune(&raw).unwrap();
//! assert!(table.n_predictors() > 0);
//! ```

use std::path::PathBuf;
use thiserror::Error;

pub mod loader;
pub mod schema;
pub mod split;
pub mod synthetic;
pub mod table;

pub use loader::load_csv;
pub use schema::{ColumnRole, Schema, SchemaConfig};
pub use split::{Partition, StratifiedSplit};
pub use synthetic::SyntheticConfig;
pub use table::{LabeledTable, NumericTable, RawTable, TextColumn};

/// Errors raised while loading or reshaping a dataset.
///
/// Every variant is fatal for a pipeline run.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The input file could not be opened or read.
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The CSV reader rejected the input.
    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    /// The configured label column is not in the header.
    #[error("Label column '{0}' not found in header")]
    MissingLabelColumn(String),
    /// The label column sits inside the block of metadata columns.
    #[error("Label column '{label}' is at position {position}, inside the first {meta_columns} metadata columns")]
    LabelInMetaBlock {
        label: String,
        position: usize,
        meta_columns: usize,
    },
    /// Nothing is left to predict with after pruning.
    #[error("No predictor columns remain after dropping {meta_columns} metadata columns from {total} columns")]
    NoPredictors { meta_columns: usize, total: usize },
    /// Empty data provided where non-empty was required.
    #[error("Empty data: {0}")]
    EmptyData(String),
    /// A row has no label value.
    #[error("Row {row} has an empty label")]
    EmptyLabel { row: usize },
    /// A row does not have as many fields as the header.
    #[error("Row {row} has {got} fields, header has {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        got: usize,
    },
    /// Column lengths disagree.
    #[error("Column '{column}' has {got} values, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        got: usize,
    },
    /// Split parameters are unusable.
    #[error("Invalid split: {0}")]
    InvalidSplit(String),
}
