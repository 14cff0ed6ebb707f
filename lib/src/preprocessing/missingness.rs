//! Missingness filter.
//!
//! Drops predictor columns whose fraction of missing values in the training
//! subset reaches a threshold. The kept-column list is learned once and then
//! applied unchanged to every other subset.
//!
//! # Example
//! ```ignore
//! use activity_quality::preprocessing::{MissingnessFilter, Transformer, FittedTransformer};
//!
//! let fitted = MissingnessFilter::new(0.8)?.fit(&train)?;
//! let train = fitted.transform(&train)?.to_dense()?;
//! let eval = fitted.transform(&eval)?.to_dense()?;
//! ```

use crate::dataset::NumericTable;
use crate::preprocessing::error::PreprocessingError;
use crate::preprocessing::traits::{FittedTransformer, Transformer};
use serde::{Deserialize, Serialize};

/// Serializable parameters for a fitted filter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MissingnessFilterParams {
    pub threshold: f64,
    /// Column names seen during fit, in order.
    pub input_names: Vec<String>,
    /// Indices into `input_names` that survive.
    pub kept: Vec<usize>,
    /// Missing fraction of every input column in the training subset.
    pub fractions: Vec<f64>,
}

/// Missingness filter (unfitted).
#[derive(Clone, Debug)]
pub struct MissingnessFilter {
    threshold: f64,
}

impl MissingnessFilter {
    /// Columns with missing fraction `>= threshold` are dropped.
    ///
    /// # Errors
    /// [`PreprocessingError::InvalidParameter`] unless `0 < threshold <= 1`.
    pub fn new(threshold: f64) -> Result<Self, PreprocessingError> {
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(PreprocessingError::InvalidParameter(format!(
                "missingness threshold must lie in (0, 1], got {threshold}"
            )));
        }
        Ok(Self { threshold })
    }
}

impl Transformer for MissingnessFilter {
    type Input = NumericTable;
    type Output = NumericTable;
    type Params = MissingnessFilterParams;
    type Fitted = FittedMissingnessFilter;

    fn fit(&self, data: &NumericTable) -> Result<FittedMissingnessFilter, PreprocessingError> {
        if data.n_rows() == 0 {
            return Err(PreprocessingError::EmptyData(
                "Cannot fit MissingnessFilter on empty data".to_string(),
            ));
        }

        let fractions: Vec<f64> = (0..data.n_cols()).map(|i| data.missing_fraction(i)).collect();
        let kept: Vec<usize> = fractions
            .iter()
            .enumerate()
            .filter(|(_, &f)| f < self.threshold)
            .map(|(i, _)| i)
            .collect();

        if kept.is_empty() {
            return Err(PreprocessingError::EmptyData(format!(
                "every column is at least {:.0}% missing",
                self.threshold * 100.0
            )));
        }

        Ok(FittedMissingnessFilter {
            threshold: self.threshold,
            input_names: data.names().to_vec(),
            kept,
            fractions,
        })
    }
}

/// Fitted missingness filter.
#[derive(Clone, Debug)]
pub struct FittedMissingnessFilter {
    threshold: f64,
    input_names: Vec<String>,
    kept: Vec<usize>,
    fractions: Vec<f64>,
}

impl FittedMissingnessFilter {
    pub fn kept_names(&self) -> Vec<&str> {
        self.kept.iter().map(|&i| self.input_names[i].as_str()).collect()
    }

    pub fn dropped_names(&self) -> Vec<&str> {
        (0..self.input_names.len())
            .filter(|i| !self.kept.contains(i))
            .map(|i| self.input_names[i].as_str())
            .collect()
    }

    /// Training-subset missing fraction per input column.
    pub fn fractions(&self) -> &[f64] {
        &self.fractions
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl FittedTransformer for FittedMissingnessFilter {
    type Input = NumericTable;
    type Output = NumericTable;
    type Params = MissingnessFilterParams;

    fn transform(&self, data: &NumericTable) -> Result<NumericTable, PreprocessingError> {
        if data.names() != self.input_names.as_slice() {
            return Err(PreprocessingError::FeatureMismatch {
                expected_features: self.input_names.len(),
                got_features: data.n_cols(),
            });
        }
        Ok(data.select_columns(&self.kept))
    }

    fn inverse_transform(&self, _data: &NumericTable) -> Result<NumericTable, PreprocessingError> {
        Err(PreprocessingError::NotInvertible("MissingnessFilter"))
    }

    fn extract_params(&self) -> MissingnessFilterParams {
        MissingnessFilterParams {
            threshold: self.threshold,
            input_names: self.input_names.clone(),
            kept: self.kept.clone(),
            fractions: self.fractions.clone(),
        }
    }

    fn from_params(params: MissingnessFilterParams) -> Result<Self, PreprocessingError> {
        if params.kept.iter().any(|&i| i >= params.input_names.len()) {
            return Err(PreprocessingError::InvalidParameter(
                "kept column index out of range".to_string(),
            ));
        }
        Ok(Self {
            threshold: params.threshold,
            input_names: params.input_names,
            kept: params.kept,
            fractions: params.fractions,
        })
    }

    fn n_features_in(&self) -> usize {
        self.input_names.len()
    }

    fn n_features_out(&self) -> usize {
        self.kept.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Column with `missing` of `n` cells missing.
    fn column(n: usize, missing: usize) -> Vec<Option<f64>> {
        (0..n)
            .map(|i| if i < missing { None } else { Some(i as f64) })
            .collect()
    }

    fn table(n: usize, missing: &[usize]) -> NumericTable {
        NumericTable::new(
            (0..missing.len()).map(|i| format!("c{i}")).collect(),
            missing.iter().map(|&m| column(n, m)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_threshold_boundary() {
        // 79% kept, 80% and 81% dropped
        let train = table(100, &[0, 79, 80, 81]);
        let fitted = MissingnessFilter::new(0.8).unwrap().fit(&train).unwrap();
        assert_eq!(fitted.kept_names(), vec!["c0", "c1"]);
        assert_eq!(fitted.dropped_names(), vec!["c2", "c3"]);
    }

    #[test]
    fn test_eval_gets_identical_columns() {
        let train = table(100, &[0, 79, 81]);
        // The evaluation subset is fully populated in the sparse column, yet
        // it is still dropped because the decision comes from training data.
        let eval = table(20, &[20, 0, 0]);
        let fitted = MissingnessFilter::new(0.8).unwrap().fit(&train).unwrap();

        let train_out = fitted.transform(&train).unwrap();
        let eval_out = fitted.transform(&eval).unwrap();
        assert_eq!(train_out.names(), eval_out.names());
        assert_eq!(eval_out.names(), &["c0".to_string(), "c1".to_string()][..]);
    }

    #[test]
    fn test_retained_partial_column_fails_dense_gate() {
        let train = table(10, &[0, 3]);
        let fitted = MissingnessFilter::new(0.8).unwrap().fit(&train).unwrap();
        let filtered = fitted.transform(&train).unwrap();
        assert!(matches!(
            filtered.to_dense(),
            Err(PreprocessingError::MissingValues { count: 3, .. })
        ));
    }

    #[test]
    fn test_all_columns_dropped_is_error() {
        let train = table(10, &[9, 10]);
        assert!(MissingnessFilter::new(0.8).unwrap().fit(&train).is_err());
    }

    #[test]
    fn test_schema_mismatch() {
        let fitted = MissingnessFilter::new(0.8)
            .unwrap()
            .fit(&table(10, &[0, 0]))
            .unwrap();
        let other = table(10, &[0, 0, 0]);
        assert!(matches!(
            fitted.transform(&other),
            Err(PreprocessingError::FeatureMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_threshold() {
        assert!(MissingnessFilter::new(0.0).is_err());
        assert!(MissingnessFilter::new(1.5).is_err());
    }

    #[test]
    fn test_params_round_trip() {
        let fitted = MissingnessFilter::new(0.8)
            .unwrap()
            .fit(&table(100, &[0, 90]))
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filter.bin");
        fitted.save_to_file(&path).unwrap();
        let loaded = FittedMissingnessFilter::load_from_file(&path).unwrap();
        assert_eq!(loaded.kept_names(), fitted.kept_names());
        assert_eq!(loaded.n_features_out(), 1);
    }

    #[test]
    fn test_not_invertible() {
        let train = table(10, &[0]);
        let fitted = MissingnessFilter::new(0.8).unwrap().fit(&train).unwrap();
        assert!(fitted.inverse_transform(&train).is_err());
    }
}
