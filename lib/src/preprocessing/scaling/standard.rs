//! Standard Scaler (Z-score normalization).
//!
//! Transforms features by removing the mean and scaling to unit variance.
//!
//! The standard score of a sample `x` is calculated as:
//! ```text
//! z = (x - u) / s
//! ```
//! where `u` is the mean of the training samples, and `s` is the sample
//! standard deviation (`n - 1` denominator).
//!
//! Constant columns have no usable `s`. What happens to them is decided by
//! [`ZeroVariancePolicy`] at construction time instead of producing
//! undefined values.
//!
//! # Example
//! ```ignore
//! use activity_quality::preprocessing::{StandardScaler, Transformer, FittedTransformer};
//!
//! let fitted = StandardScaler::new().fit(&train)?;
//! let scaled_train = fitted.transform(&train)?;
//! let scaled_eval = fitted.transform(&eval)?;
//! ```

use crate::preprocessing::error::PreprocessingError;
use crate::preprocessing::traits::{FittedTransformer, Transformer};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Standard deviations at or below this are treated as zero.
pub const ZERO_VARIANCE_EPS: f64 = 1e-12;

/// What to do with a column whose training standard deviation is zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroVariancePolicy {
    /// Remove the column from every transformed subset.
    #[default]
    Drop,
    /// Keep the column, centered but not divided.
    Passthrough,
}

/// Configuration for StandardScaler.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StandardScalerConfig {
    pub zero_variance: ZeroVariancePolicy,
}

/// Serializable parameters for a fitted StandardScaler.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StandardScalerParams {
    pub config: StandardScalerConfig,
    /// Mean of every input feature.
    pub mean: Vec<f64>,
    /// Divisor of every input feature (1.0 for zero-variance passthrough columns).
    pub std: Vec<f64>,
    /// Input features that survive `transform`.
    pub kept: Vec<usize>,
    /// Input features found to have zero variance.
    pub zero_variance: Vec<usize>,
}

/// StandardScaler transformer (unfitted).
#[derive(Clone, Debug, Default)]
pub struct StandardScaler {
    config: StandardScalerConfig,
}

impl StandardScaler {
    /// Create a new StandardScaler that drops zero-variance columns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the handling of zero-variance columns.
    pub fn with_zero_variance(mut self, policy: ZeroVariancePolicy) -> Self {
        self.config.zero_variance = policy;
        self
    }
}

impl Transformer for StandardScaler {
    type Input = Array2<f64>;
    type Output = Array2<f64>;
    type Params = StandardScalerParams;
    type Fitted = FittedStandardScaler;

    fn fit(&self, data: &Array2<f64>) -> Result<FittedStandardScaler, PreprocessingError> {
        let (rows, cols) = data.dim();

        if rows < 2 {
            return Err(PreprocessingError::TooFewRows {
                stage: "StandardScaler",
                needed: 2,
                got: rows,
            });
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(PreprocessingError::NonFinite {
                stage: "StandardScaler",
            });
        }

        let mean = data
            .mean_axis(Axis(0))
            .ok_or_else(|| PreprocessingError::EmptyData("no rows".to_string()))?;
        let raw_std = data.std_axis(Axis(0), 1.0);

        let zero_variance: Vec<usize> = (0..cols)
            .filter(|&j| !(raw_std[j] > ZERO_VARIANCE_EPS))
            .collect();

        let kept: Vec<usize> = match self.config.zero_variance {
            ZeroVariancePolicy::Drop => (0..cols).filter(|j| !zero_variance.contains(j)).collect(),
            ZeroVariancePolicy::Passthrough => (0..cols).collect(),
        };

        if kept.is_empty() {
            return Err(PreprocessingError::DegenerateVariance {
                stage: "StandardScaler",
                reason: "every column has zero variance".to_string(),
            });
        }

        let std = raw_std.mapv(|s| if s > ZERO_VARIANCE_EPS { s } else { 1.0 });

        Ok(FittedStandardScaler {
            config: self.config.clone(),
            mean,
            std,
            kept,
            zero_variance,
        })
    }
}

/// Fitted StandardScaler ready for inference.
#[derive(Clone, Debug)]
pub struct FittedStandardScaler {
    config: StandardScalerConfig,
    mean: Array1<f64>,
    std: Array1<f64>,
    kept: Vec<usize>,
    zero_variance: Vec<usize>,
}

impl FittedStandardScaler {
    /// Get the mean values for each input feature.
    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    /// Get the divisor for each input feature.
    pub fn std(&self) -> &Array1<f64> {
        &self.std
    }

    /// Input features retained by `transform`.
    pub fn kept(&self) -> &[usize] {
        &self.kept
    }

    /// Input features whose training standard deviation was zero.
    pub fn zero_variance(&self) -> &[usize] {
        &self.zero_variance
    }
}

impl FittedTransformer for FittedStandardScaler {
    type Input = Array2<f64>;
    type Output = Array2<f64>;
    type Params = StandardScalerParams;

    fn transform(&self, data: &Array2<f64>) -> Result<Array2<f64>, PreprocessingError> {
        let (_, cols) = data.dim();

        if cols != self.mean.len() {
            return Err(PreprocessingError::FeatureMismatch {
                expected_features: self.mean.len(),
                got_features: cols,
            });
        }

        let selected = data.select(Axis(1), &self.kept);
        let mean = self.mean.select(Axis(0), &self.kept);
        let std = self.std.select(Axis(0), &self.kept);
        Ok((selected - &mean) / &std)
    }

    fn inverse_transform(&self, data: &Array2<f64>) -> Result<Array2<f64>, PreprocessingError> {
        let (_, cols) = data.dim();

        if cols != self.kept.len() {
            return Err(PreprocessingError::FeatureMismatch {
                expected_features: self.kept.len(),
                got_features: cols,
            });
        }

        let mean = self.mean.select(Axis(0), &self.kept);
        let std = self.std.select(Axis(0), &self.kept);
        Ok(data * &std + &mean)
    }

    fn extract_params(&self) -> StandardScalerParams {
        StandardScalerParams {
            config: self.config.clone(),
            mean: self.mean.to_vec(),
            std: self.std.to_vec(),
            kept: self.kept.clone(),
            zero_variance: self.zero_variance.clone(),
        }
    }

    fn from_params(params: StandardScalerParams) -> Result<Self, PreprocessingError> {
        if params.mean.len() != params.std.len() {
            return Err(PreprocessingError::InvalidShape {
                expected: format!("{} std values", params.mean.len()),
                got: format!("{}", params.std.len()),
            });
        }
        if params.kept.iter().any(|&j| j >= params.mean.len()) {
            return Err(PreprocessingError::InvalidParameter(
                "kept feature index out of range".to_string(),
            ));
        }

        Ok(Self {
            config: params.config,
            mean: Array1::from(params.mean),
            std: Array1::from(params.std),
            kept: params.kept,
            zero_variance: params.zero_variance,
        })
    }

    fn n_features_in(&self) -> usize {
        self.mean.len()
    }

    fn n_features_out(&self) -> usize {
        self.kept.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn create_test_data() -> Array2<f64> {
        array![[0.0, 1.0], [0.0, 1.0], [1.0, 3.0], [3.0, 7.0]]
    }

    #[test]
    fn test_standard_scaler_fit() {
        let fitted = StandardScaler::new().fit(&create_test_data()).unwrap();
        let mean = fitted.mean();
        assert!((mean[0] - 1.0).abs() < 1e-12);
        assert!((mean[1] - 3.0).abs() < 1e-12);
        // sample std of [0, 0, 1, 3] = sqrt(6 / 3)
        assert!((fitted.std()[0] - 2.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_standard_scaler_transform() {
        let data = create_test_data();
        let transformed = StandardScaler::new().fit_transform(&data).unwrap();

        let mean = transformed.mean_axis(Axis(0)).unwrap();
        let std = transformed.std_axis(Axis(0), 1.0);
        for j in 0..2 {
            assert!(mean[j].abs() < 1e-10, "mean[{j}] = {}", mean[j]);
            assert!((std[j] - 1.0).abs() < 1e-10, "std[{j}] = {}", std[j]);
        }
    }

    #[test]
    fn test_standard_scaler_inverse_transform() {
        let data = create_test_data();
        let fitted = StandardScaler::new().fit(&data).unwrap();

        let transformed = fitted.transform(&data).unwrap();
        let recovered = fitted.inverse_transform(&transformed).unwrap();

        for (o, r) in data.iter().zip(recovered.iter()) {
            assert!((o - r).abs() < 1e-10);
        }
    }

    #[test]
    fn test_eval_uses_training_statistics() {
        let train = create_test_data();
        let eval = array![[1.0, 3.0], [5.0, 3.0]];
        let fitted = StandardScaler::new().fit(&train).unwrap();
        let scaled = fitted.transform(&eval).unwrap();

        // Row equal to the training mean maps to zero.
        assert!(scaled[[0, 0]].abs() < 1e-12);
        assert!(scaled[[0, 1]].abs() < 1e-12);
        assert!((scaled[[1, 0]] - 4.0 / 2.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_constant_feature_dropped() {
        let data = array![[5.0, 1.0, 2.0], [5.0, 2.0, 4.0], [5.0, 3.0, 7.0]];
        let fitted = StandardScaler::new().fit(&data).unwrap();

        assert_eq!(fitted.zero_variance(), &[0]);
        assert_eq!(fitted.kept(), &[1, 2]);

        let transformed = fitted.transform(&data).unwrap();
        assert_eq!(transformed.ncols(), 2);
        assert!(transformed.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_constant_feature_passthrough() {
        let data = array![[5.0, 1.0], [5.0, 2.0], [5.0, 3.0]];
        let fitted = StandardScaler::new()
            .with_zero_variance(ZeroVariancePolicy::Passthrough)
            .fit(&data)
            .unwrap();

        let transformed = fitted.transform(&data).unwrap();
        assert_eq!(transformed.ncols(), 2);
        assert!(transformed.column(0).iter().all(|&v| v == 0.0));
        assert!((fitted.std()[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_all_constant_is_error() {
        let data = array![[1.0], [1.0], [1.0]];
        assert!(StandardScaler::new().fit(&data).is_err());
    }

    #[test]
    fn test_standard_scaler_feature_mismatch() {
        let fitted = StandardScaler::new().fit(&create_test_data()).unwrap();
        let wrong_data = array![[1.0, 2.0, 3.0]];
        assert!(matches!(
            fitted.transform(&wrong_data),
            Err(PreprocessingError::FeatureMismatch {
                expected_features: 2,
                got_features: 3
            })
        ));
    }

    #[test]
    fn test_standard_scaler_too_few_rows() {
        let data = Array2::<f64>::zeros((1, 2));
        assert!(StandardScaler::new().fit(&data).is_err());
    }

    #[test]
    fn test_standard_scaler_rejects_nan() {
        let data = array![[1.0, f64::NAN], [2.0, 3.0]];
        assert!(matches!(
            StandardScaler::new().fit(&data),
            Err(PreprocessingError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_standard_scaler_save_load_file() {
        let data = create_test_data();
        let fitted = StandardScaler::new().fit(&data).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler.bin");
        fitted.save_to_file(&path).unwrap();
        let loaded = FittedStandardScaler::load_from_file(&path).unwrap();

        assert_eq!(loaded.n_features_in(), fitted.n_features_in());
        let t1 = fitted.transform(&data).unwrap();
        let t2 = loaded.transform(&data).unwrap();
        for (a, b) in t1.iter().zip(t2.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }
}
