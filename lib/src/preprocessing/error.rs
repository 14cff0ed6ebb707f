//! Error types for the cleaning, scaling and projection stages.

use thiserror::Error;

/// Error type for preprocessing operations.
#[derive(Debug, Error)]
pub enum PreprocessingError {
    /// Shape mismatch between expected and actual matrix dimensions.
    #[error("Invalid shape: expected {expected}, got {got}")]
    InvalidShape { expected: String, got: String },
    /// A column still holds missing values where a dense matrix is required.
    #[error("Missing values: column '{column}' has {count} missing value(s)")]
    MissingValues { column: String, count: usize },
    /// NaN or infinity reached a numeric stage.
    #[error("{stage}: input contains non-finite values")]
    NonFinite { stage: &'static str },
    /// The stage needs spread in the data and found none.
    #[error("{stage}: {reason}")]
    DegenerateVariance { stage: &'static str, reason: String },
    /// An iterative solver stopped before converging.
    #[error("{stage} did not converge within {iterations} iterations")]
    NotConverged {
        stage: &'static str,
        iterations: usize,
    },
    /// Fewer rows than the statistic needs.
    #[error("{stage} needs at least {needed} rows, got {got}")]
    TooFewRows {
        stage: &'static str,
        needed: usize,
        got: usize,
    },
    /// Invalid hyperparameter value.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// Empty data provided where non-empty was required.
    #[error("Empty data: {0}")]
    EmptyData(String),
    /// Feature dimension mismatch.
    #[error("Feature mismatch: expected {expected_features} features, got {got_features}")]
    FeatureMismatch {
        expected_features: usize,
        got_features: usize,
    },
    /// The transformer cannot reverse its transformation.
    #[error("Inverse transform not supported by {0}")]
    NotInvertible(&'static str),
    /// Fitted parameters could not be encoded or decoded.
    #[error("Parameter encoding: {0}")]
    Serialization(#[from] bincode::Error),
    /// I/O error while saving or loading fitted parameters.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
