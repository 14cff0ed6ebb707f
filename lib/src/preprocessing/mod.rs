//! Data preprocessing transformers for the activity-monitor pipeline.
//!
//! Stateful steps follow a type-state split: an unfitted [`Transformer`]
//! holds hyperparameters and learns from the training subset, the
//! [`FittedTransformer`] it returns can only transform. No fitted statistic
//! ever sees the evaluation subset.
//!
//! # Core Traits
//!
//! - [`Transformer`]: Unfitted transformer with hyperparameters
//! - [`FittedTransformer`]: Fitted transformer ready for inference
//!
//! # Available Steps
//!
//! ## Coercion
//! - [`TypeNormalizer`]: Text predictors to `Option<f64>`, unreadable cells become missing
//!
//! ## Column selection
//! - [`MissingnessFilter`]: Drop columns that are mostly missing in the training subset
//!
//! ## Scaling
//! - [`StandardScaler`]: Z-score normalization with an explicit [`ZeroVariancePolicy`]
//!
//! ## Decomposition
//! - [`Pca`]: Projection onto the leading components up to a variance threshold
//!
//! ## Encoding
//! - [`LabelEncoder`]: Class names to indices
//!
//! # Example
//!
//! ```ignore
//! use activity_quality::preprocessing::{Pca, StandardScaler, Transformer, FittedTransformer};
//!
//! let scaler = StandardScaler::new().fit(&train)?;
//! let pca = Pca::new(0.95)?.fit(&scaler.transform(&train)?)?;
//!
//! // Save for later use
//! pca.save_to_file("pca.bin")?;
//!
//! let eval_scores = pca.transform(&scaler.transform(&eval)?)?;
//! ```

pub mod coercion;
pub mod decomposition;
pub mod encoding;
pub mod error;
pub mod missingness;
pub mod scaling;
pub mod traits;

// Re-export main types
pub use coercion::{parse_cell, CoercionSummary, TypeNormalizer};
pub use decomposition::{FittedPca, Pca, PcaParams};
pub use encoding::{FittedLabelEncoder, LabelEncoder, LabelEncoderParams};
pub use error::PreprocessingError;
pub use missingness::{FittedMissingnessFilter, MissingnessFilter, MissingnessFilterParams};
pub use scaling::{
    FittedStandardScaler, StandardScaler, StandardScalerConfig, StandardScalerParams,
    ZeroVariancePolicy,
};
pub use traits::{FittedTransformer, Transformer};
