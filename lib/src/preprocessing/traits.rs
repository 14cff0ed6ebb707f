//! Fit/transform split for the learned preprocessing stages.
//!
//! [`Transformer`] holds hyperparameters and learns from the training
//! subset; [`FittedTransformer`] holds the learned statistics and can only
//! apply them. A fitted value has no `fit`, so the evaluation subset can
//! only ever pass through `transform`.

use std::path::Path;

use crate::preprocessing::error::PreprocessingError;
use crate::serialization::SerializableParams;

/// An unfitted stage: missingness filter, scaler or PCA.
///
/// ```ignore
/// let fitted = StandardScaler::new().fit(&train)?;
/// let scaled_train = fitted.transform(&train)?;
/// let scaled_eval = fitted.transform(&eval)?;
/// ```
pub trait Transformer: Clone {
    /// Data the stage learns from and applies to.
    type Input;
    /// Data produced by `transform`.
    type Output;
    /// Learned statistics in serializable form.
    type Params: SerializableParams<Error = bincode::Error>;
    /// The fitted stage.
    type Fitted: FittedTransformer<Params = Self::Params, Input = Self::Input, Output = Self::Output>;

    /// Learn the stage's statistics from the training subset.
    fn fit(&self, data: &Self::Input) -> Result<Self::Fitted, PreprocessingError>;

    /// Fit and transform the same data.
    fn fit_transform(&self, data: &Self::Input) -> Result<Self::Output, PreprocessingError> {
        self.fit(data)?.transform(data)
    }
}

/// A fitted stage. `extract_params` followed by `from_params` gives back an
/// equivalent stage.
pub trait FittedTransformer: Clone {
    type Input;
    type Output;
    type Params: SerializableParams<Error = bincode::Error>;

    /// Apply the learned statistics. Fails if `data` does not have the
    /// columns seen during fit.
    fn transform(&self, data: &Self::Input) -> Result<Self::Output, PreprocessingError>;

    /// Undo `transform`, or [`PreprocessingError::NotInvertible`] for lossy
    /// stages such as column filters.
    fn inverse_transform(&self, data: &Self::Output) -> Result<Self::Input, PreprocessingError>;

    fn extract_params(&self) -> Self::Params;

    fn from_params(params: Self::Params) -> Result<Self, PreprocessingError>
    where
        Self: Sized;

    /// Write the learned statistics as `bincode`.
    fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), PreprocessingError> {
        let bytes = self.extract_params().to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Read statistics written by [`save_to_file`](Self::save_to_file).
    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, PreprocessingError>
    where
        Self: Sized,
    {
        let bytes = std::fs::read(path)?;
        Self::from_params(Self::Params::from_bytes(&bytes)?)
    }

    /// Columns expected by `transform`.
    fn n_features_in(&self) -> usize;

    /// Columns produced by `transform`.
    fn n_features_out(&self) -> usize;
}
