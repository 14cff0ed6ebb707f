//! Label encoding for the activity-class column.
//!
//! Maps class names to integer indices (0, 1, 2, ...) in sorted order, so
//! `A..E` become `0..4` regardless of the order rows arrive in.

use crate::preprocessing::error::PreprocessingError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Label encoder for class names.
///
/// # Example
/// ```ignore
/// use activity_quality::preprocessing::LabelEncoder;
///
/// let labels = vec!["B".to_string(), "A".to_string(), "B".to_string()];
/// let fitted = LabelEncoder::new().fit(&labels)?;
///
/// assert_eq!(fitted.transform(&labels)?, vec![1, 0, 1]);
/// assert_eq!(fitted.classes(), &["A", "B"]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct LabelEncoder;

impl LabelEncoder {
    /// Create a new LabelEncoder.
    pub fn new() -> Self {
        Self
    }

    /// Fit the encoder to the labels and return the fitted encoder.
    pub fn fit<S: AsRef<str>>(&self, labels: &[S]) -> Result<FittedLabelEncoder, PreprocessingError> {
        if labels.is_empty() {
            return Err(PreprocessingError::EmptyData(
                "Cannot fit LabelEncoder on empty data".to_string(),
            ));
        }

        let mut classes: BTreeSet<&str> = BTreeSet::new();
        for label in labels {
            let label = label.as_ref();
            if label.is_empty() {
                return Err(PreprocessingError::InvalidParameter(
                    "LabelEncoder expects non-empty labels".to_string(),
                ));
            }
            classes.insert(label);
        }

        Ok(FittedLabelEncoder::from_classes(
            classes.into_iter().map(str::to_string).collect(),
        ))
    }

    /// Fit and transform in one step.
    pub fn fit_transform<S: AsRef<str>>(
        &self,
        labels: &[S],
    ) -> Result<(FittedLabelEncoder, Vec<usize>), PreprocessingError> {
        let fitted = self.fit(labels)?;
        let encoded = fitted.transform(labels)?;
        Ok((fitted, encoded))
    }
}

/// Serializable parameters for a fitted LabelEncoder.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LabelEncoderParams {
    /// Unique classes in sorted order.
    pub classes: Vec<String>,
}

/// Fitted LabelEncoder ready for inference.
#[derive(Clone, Debug)]
pub struct FittedLabelEncoder {
    classes: Vec<String>,
    class_to_idx: HashMap<String, usize>,
}

impl FittedLabelEncoder {
    fn from_classes(classes: Vec<String>) -> Self {
        let class_to_idx = classes
            .iter()
            .enumerate()
            .map(|(idx, class)| (class.clone(), idx))
            .collect();
        Self {
            classes,
            class_to_idx,
        }
    }

    /// Get the unique classes.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Get the number of classes.
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Index of a single class name.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.class_to_idx.get(label).copied()
    }

    /// Transform labels to encoded indices.
    pub fn transform<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<usize>, PreprocessingError> {
        labels
            .iter()
            .map(|label| {
                let label = label.as_ref();
                self.index_of(label).ok_or_else(|| {
                    PreprocessingError::InvalidParameter(format!("Unknown label value: {label}"))
                })
            })
            .collect()
    }

    /// Inverse transform: convert indices back to class names.
    pub fn inverse_transform(&self, encoded: &[usize]) -> Result<Vec<String>, PreprocessingError> {
        encoded
            .iter()
            .map(|&idx| {
                self.classes.get(idx).cloned().ok_or_else(|| {
                    PreprocessingError::InvalidParameter(format!(
                        "Invalid encoded index: {idx} (n_classes={})",
                        self.classes.len()
                    ))
                })
            })
            .collect()
    }

    /// Count of each class in an encoded label vector.
    pub fn counts(&self, encoded: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.classes.len()];
        for &idx in encoded {
            if let Some(c) = counts.get_mut(idx) {
                *c += 1;
            }
        }
        counts
    }

    /// Extract parameters for serialization.
    pub fn extract_params(&self) -> LabelEncoderParams {
        LabelEncoderParams {
            classes: self.classes.clone(),
        }
    }

    /// Create from serialized parameters.
    pub fn from_params(params: LabelEncoderParams) -> Result<Self, PreprocessingError> {
        if params.classes.is_empty() {
            return Err(PreprocessingError::InvalidParameter(
                "LabelEncoder needs at least one class".to_string(),
            ));
        }
        if params.classes.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PreprocessingError::InvalidParameter(
                "LabelEncoder classes must be sorted and unique".to_string(),
            ));
        }
        Ok(Self::from_classes(params.classes))
    }
}
