//! Principal component analysis with a cumulative-variance cutoff.
//!
//! Fitting centers the training matrix on its own column means, takes the
//! eigen-decomposition of the sample covariance and keeps the smallest number
//! of leading components whose explained-variance ratios reach the threshold.
//! Transforming any later subset reuses the training mean and loadings.
//!
//! Component signs are normalized so the largest-magnitude loading of each
//! component is positive, which makes scores reproducible across runs.

use crate::linalg::{covariance, symmetric_eigen};
use crate::preprocessing::error::PreprocessingError;
use crate::preprocessing::traits::{FittedTransformer, Transformer};
use ndarray::{s, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Slack on the cumulative-ratio comparison so an exact 0.95 is not lost to rounding.
const RATIO_SLACK: f64 = 1e-12;

/// Unfitted PCA.
#[derive(Clone, Debug)]
pub struct Pca {
    variance_threshold: f64,
}

impl Pca {
    /// Keep the fewest components explaining at least `variance_threshold`
    /// of the total variance.
    ///
    /// # Errors
    /// [`PreprocessingError::InvalidParameter`] unless `0 < variance_threshold <= 1`.
    pub fn new(variance_threshold: f64) -> Result<Self, PreprocessingError> {
        if !(variance_threshold > 0.0 && variance_threshold <= 1.0) {
            return Err(PreprocessingError::InvalidParameter(format!(
                "variance threshold must lie in (0, 1], got {variance_threshold}"
            )));
        }
        Ok(Self { variance_threshold })
    }

    pub fn variance_threshold(&self) -> f64 {
        self.variance_threshold
    }
}

/// Serializable parameters for a fitted PCA.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PcaParams {
    pub variance_threshold: f64,
    pub mean: Vec<f64>,
    /// Row-major `n_features x n_features` loadings, components as columns.
    pub loadings: Vec<f64>,
    pub eigenvalues: Vec<f64>,
    pub n_components: usize,
}

impl Transformer for Pca {
    type Input = Array2<f64>;
    type Output = Array2<f64>;
    type Params = PcaParams;
    type Fitted = FittedPca;

    fn fit(&self, data: &Array2<f64>) -> Result<FittedPca, PreprocessingError> {
        let (rows, cols) = data.dim();
        if cols == 0 {
            return Err(PreprocessingError::EmptyData(
                "Cannot fit PCA without features".to_string(),
            ));
        }
        if rows < 2 {
            return Err(PreprocessingError::TooFewRows {
                stage: "PCA",
                needed: 2,
                got: rows,
            });
        }

        let mean = data
            .mean_axis(Axis(0))
            .ok_or_else(|| PreprocessingError::EmptyData("no rows".to_string()))?;
        let centered = data - &mean;
        let (values, mut loadings) = symmetric_eigen(&covariance(&centered))?;
        let eigenvalues = values.mapv(|v| v.max(0.0));

        let total: f64 = eigenvalues.sum();
        if !(total > 0.0) {
            return Err(PreprocessingError::DegenerateVariance {
                stage: "PCA",
                reason: "total variance is zero".to_string(),
            });
        }

        for mut component in loadings.columns_mut() {
            let pivot = component
                .iter()
                .copied()
                .fold(0.0f64, |best, v| if v.abs() > best.abs() { v } else { best });
            if pivot < 0.0 {
                component.mapv_inplace(|v| -v);
            }
        }

        let mut cumulative = 0.0;
        let mut n_components = cols;
        for (i, v) in eigenvalues.iter().enumerate() {
            cumulative += v / total;
            if cumulative >= self.variance_threshold - RATIO_SLACK {
                n_components = i + 1;
                break;
            }
        }

        Ok(FittedPca {
            variance_threshold: self.variance_threshold,
            mean,
            loadings,
            eigenvalues,
            n_components,
        })
    }
}

/// Fitted PCA projecting onto the retained components.
#[derive(Clone, Debug)]
pub struct FittedPca {
    variance_threshold: f64,
    mean: Array1<f64>,
    loadings: Array2<f64>,
    eigenvalues: Array1<f64>,
    n_components: usize,
}

impl FittedPca {
    /// Number of retained components.
    pub fn n_components(&self) -> usize {
        self.n_components
    }

    /// Training column means.
    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    /// Loadings of the retained components, one column per component.
    pub fn components(&self) -> Array2<f64> {
        self.loadings.slice(s![.., ..self.n_components]).to_owned()
    }

    /// Eigenvalues of every component, descending.
    pub fn eigenvalues(&self) -> &Array1<f64> {
        &self.eigenvalues
    }

    /// Fraction of total variance explained by every component.
    pub fn explained_variance_ratio(&self) -> Array1<f64> {
        let total = self.eigenvalues.sum();
        self.eigenvalues.mapv(|v| v / total)
    }

    /// Cumulative explained variance of the retained components.
    pub fn retained_variance(&self) -> f64 {
        self.explained_variance_ratio()
            .iter()
            .take(self.n_components)
            .sum()
    }

    pub fn variance_threshold(&self) -> f64 {
        self.variance_threshold
    }
}

impl FittedTransformer for FittedPca {
    type Input = Array2<f64>;
    type Output = Array2<f64>;
    type Params = PcaParams;

    fn transform(&self, data: &Array2<f64>) -> Result<Array2<f64>, PreprocessingError> {
        if data.ncols() != self.mean.len() {
            return Err(PreprocessingError::FeatureMismatch {
                expected_features: self.mean.len(),
                got_features: data.ncols(),
            });
        }
        let centered = data - &self.mean;
        Ok(centered.dot(&self.loadings.slice(s![.., ..self.n_components])))
    }

    fn inverse_transform(&self, data: &Array2<f64>) -> Result<Array2<f64>, PreprocessingError> {
        if data.ncols() != self.n_components {
            return Err(PreprocessingError::FeatureMismatch {
                expected_features: self.n_components,
                got_features: data.ncols(),
            });
        }
        let components = self.loadings.slice(s![.., ..self.n_components]);
        Ok(data.dot(&components.t()) + &self.mean)
    }

    fn extract_params(&self) -> PcaParams {
        PcaParams {
            variance_threshold: self.variance_threshold,
            mean: self.mean.to_vec(),
            loadings: self.loadings.iter().copied().collect(),
            eigenvalues: self.eigenvalues.to_vec(),
            n_components: self.n_components,
        }
    }

    fn from_params(params: PcaParams) -> Result<Self, PreprocessingError> {
        let p = params.mean.len();
        if params.eigenvalues.len() != p || params.n_components == 0 || params.n_components > p {
            return Err(PreprocessingError::InvalidParameter(format!(
                "inconsistent PCA parameters: {p} features, {} eigenvalues, {} components",
                params.eigenvalues.len(),
                params.n_components
            )));
        }
        let loadings = Array2::from_shape_vec((p, p), params.loadings).map_err(|e| {
            PreprocessingError::InvalidShape {
                expected: format!("{p}x{p} loadings"),
                got: e.to_string(),
            }
        })?;

        Ok(Self {
            variance_threshold: params.variance_threshold,
            mean: Array1::from(params.mean),
            loadings,
            eigenvalues: Array1::from(params.eigenvalues),
            n_components: params.n_components,
        })
    }

    fn n_features_in(&self) -> usize {
        self.mean.len()
    }

    fn n_features_out(&self) -> usize {
        self.n_components
    }
}
