//! Run configuration.
//!
//! Every field has a default, so a JSON file only needs the values it
//! changes:
//!
//! ```json
//! { "seed": 7, "workers": 8, "mtry_grid": [2, 10, 27] }
//! ```

use crate::dataset::SchemaConfig;
use crate::preprocessing::ZeroVariancePolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub label_column: String,
    /// Leading identifier/timestamp columns removed before modeling.
    pub meta_columns: usize,
    pub train_fraction: f64,
    pub seed: u64,
    /// Columns at least this fraction missing in training are dropped.
    pub missing_threshold: f64,
    /// Cumulative explained variance kept by PCA.
    pub variance_threshold: f64,
    pub zero_variance: ZeroVariancePolicy,
    pub cv_folds: usize,
    pub workers: usize,
    pub n_trees: usize,
    pub mtry_grid: Option<Vec<usize>>,
    pub cost_grid: Vec<f64>,
    /// Fixed RBF width; estimated from the training data when absent.
    pub sigma: Option<f64>,
    pub svm_tolerance: f64,
    pub svm_max_iter: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            label_column: "classe".to_string(),
            meta_columns: 7,
            train_fraction: 0.75,
            seed: 3433,
            missing_threshold: 0.8,
            variance_threshold: 0.95,
            zero_variance: ZeroVariancePolicy::Drop,
            cv_folds: 10,
            workers: 4,
            n_trees: 100,
            mtry_grid: None,
            cost_grid: vec![0.25, 0.5, 1.0],
            sigma: None,
            svm_tolerance: 1e-3,
            svm_max_iter: 1_000_000,
        }
    }
}

impl PipelineConfig {
    /// Read a JSON file; missing fields keep their defaults.
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn schema(&self) -> SchemaConfig {
        SchemaConfig {
            label_column: self.label_column.clone(),
            meta_columns: self.meta_columns,
        }
    }

    /// Check ranges before anything is loaded.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.label_column.trim().is_empty() {
            return Err(invalid("label_column", "must not be empty"));
        }
        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            return Err(invalid(
                "train_fraction",
                format!("{} is outside (0, 1)", self.train_fraction),
            ));
        }
        if !(self.missing_threshold > 0.0 && self.missing_threshold <= 1.0) {
            return Err(invalid(
                "missing_threshold",
                format!("{} is outside (0, 1]", self.missing_threshold),
            ));
        }
        if !(self.variance_threshold > 0.0 && self.variance_threshold <= 1.0) {
            return Err(invalid(
                "variance_threshold",
                format!("{} is outside (0, 1]", self.variance_threshold),
            ));
        }
        if self.cv_folds < 2 {
            return Err(invalid("cv_folds", "need at least 2 folds"));
        }
        if self.workers == 0 {
            return Err(invalid("workers", "need at least 1 worker"));
        }
        if self.n_trees == 0 {
            return Err(invalid("n_trees", "need at least 1 tree"));
        }
        if let Some(grid) = &self.mtry_grid {
            if grid.is_empty() || grid.contains(&0) {
                return Err(invalid("mtry_grid", "values must be positive and non-empty"));
            }
        }
        if self.cost_grid.is_empty() || self.cost_grid.iter().any(|c| !(*c > 0.0)) {
            return Err(invalid("cost_grid", "values must be positive and non-empty"));
        }
        if let Some(sigma) = self.sigma {
            if !(sigma > 0.0 && sigma.is_finite()) {
                return Err(invalid("sigma", format!("{sigma} is not positive")));
            }
        }
        if !(self.svm_tolerance > 0.0) {
            return Err(invalid("svm_tolerance", "must be positive"));
        }
        if self.svm_max_iter == 0 {
            return Err(invalid("svm_max_iter", "must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.schema().meta_columns, 7);
        assert_eq!(config.schema().label_column, "classe");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"seed": 7, "zero_variance": "passthrough"}"#).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.zero_variance, ZeroVariancePolicy::Passthrough);
        assert_eq!(config.workers, 4);
        assert_eq!(config.cost_grid, vec![0.25, 0.5, 1.0]);
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"workers": 2, "mtry_grid": [2, 5]}}"#).unwrap();
        let config = PipelineConfig::from_json(file.path()).unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.mtry_grid, Some(vec![2, 5]));
    }

    #[test]
    fn test_from_json_errors() {
        assert!(matches!(
            PipelineConfig::from_json("/definitely/not/here.json"),
            Err(ConfigError::Io { .. })
        ));
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            PipelineConfig::from_json(file.path()),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let cases = [
            PipelineConfig {
                train_fraction: 1.0,
                ..PipelineConfig::default()
            },
            PipelineConfig {
                missing_threshold: 0.0,
                ..PipelineConfig::default()
            },
            PipelineConfig {
                cv_folds: 1,
                ..PipelineConfig::default()
            },
            PipelineConfig {
                workers: 0,
                ..PipelineConfig::default()
            },
            PipelineConfig {
                mtry_grid: Some(vec![0]),
                ..PipelineConfig::default()
            },
            PipelineConfig {
                cost_grid: vec![],
                ..PipelineConfig::default()
            },
            PipelineConfig {
                sigma: Some(-1.0),
                ..PipelineConfig::default()
            },
        ];
        for config in cases {
            assert!(config.validate().is_err(), "{config:?}");
        }
    }
}
