//! Static column roles and metadata pruning.
//!
//! Roles come from position and name only: the first `meta_columns` columns
//! are bookkeeping (row index, subject, timestamps, window markers), the
//! column named `label_column` is the outcome, everything else predicts.

use crate::dataset::{DatasetError, LabeledTable, RawTable, TextColumn};
use serde::{Deserialize, Serialize};

/// Role of a column in the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnRole {
    /// Identifier or timestamp; dropped before any statistics.
    Meta,
    /// Measurement used as a model input.
    Predictor,
    /// Outcome class.
    Label,
}

/// How to assign roles to a header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Name of the outcome column.
    pub label_column: String,
    /// Number of leading metadata columns to drop.
    pub meta_columns: usize,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            label_column: "classe".to_string(),
            meta_columns: 7,
        }
    }
}

/// Column roles for one header, declared once at load time.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    names: Vec<String>,
    roles: Vec<ColumnRole>,
    label_index: usize,
}

impl Schema {
    /// Tag every header column with its role.
    ///
    /// # Errors
    /// - [`DatasetError::MissingLabelColumn`] if no column has the label name
    /// - [`DatasetError::LabelInMetaBlock`] if the label would be pruned
    /// - [`DatasetError::NoPredictors`] if pruning leaves nothing to predict with
    pub fn from_headers(headers: &[String], config: &SchemaConfig) -> Result<Self, DatasetError> {
        let label_index = headers
            .iter()
            .position(|h| h == &config.label_column)
            .ok_or_else(|| DatasetError::MissingLabelColumn(config.label_column.clone()))?;

        if label_index < config.meta_columns {
            return Err(DatasetError::LabelInMetaBlock {
                label: config.label_column.clone(),
                position: label_index,
                meta_columns: config.meta_columns,
            });
        }

        let roles: Vec<ColumnRole> = (0..headers.len())
            .map(|i| {
                if i == label_index {
                    ColumnRole::Label
                } else if i < config.meta_columns {
                    ColumnRole::Meta
                } else {
                    ColumnRole::Predictor
                }
            })
            .collect();

        if !roles.contains(&ColumnRole::Predictor) {
            return Err(DatasetError::NoPredictors {
                meta_columns: config.meta_columns,
                total: headers.len(),
            });
        }

        Ok(Self {
            names: headers.to_vec(),
            roles,
            label_index,
        })
    }

    pub fn roles(&self) -> &[ColumnRole] {
        &self.roles
    }

    pub fn role_of(&self, name: &str) -> Option<ColumnRole> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.roles[i])
    }

    pub fn label_name(&self) -> &str {
        &self.names[self.label_index]
    }

    /// Names of the metadata columns that pruning drops.
    pub fn meta_names(&self) -> Vec<&str> {
        self.names_with(ColumnRole::Meta)
    }

    pub fn predictor_names(&self) -> Vec<&str> {
        self.names_with(ColumnRole::Predictor)
    }

    fn names_with(&self, role: ColumnRole) -> Vec<&str> {
        self.names
            .iter()
            .zip(&self.roles)
            .filter(|(_, r)| **r == role)
            .map(|(n, _)| n.as_str())
            .collect()
    }

    /// Drop metadata columns and split off the label.
    ///
    /// # Errors
    /// - [`DatasetError::LengthMismatch`] if the table was not read with this header
    /// - [`DatasetError::EmptyLabel`] if a row has a blank label
    pub fn prune(&self, raw: &RawTable) -> Result<LabeledTable, DatasetError> {
        if raw.headers() != self.names.as_slice() {
            return Err(DatasetError::LengthMismatch {
                column: "<header>".to_string(),
                expected: self.names.len(),
                got: raw.n_cols(),
            });
        }

        let mut labels = Vec::with_capacity(raw.n_rows());
        for (row, value) in raw.column(self.label_index).enumerate() {
            let value = value.trim();
            if value.is_empty() {
                return Err(DatasetError::EmptyLabel { row });
            }
            labels.push(value.to_string());
        }

        let predictors = self
            .roles
            .iter()
            .enumerate()
            .filter(|(_, role)| **role == ColumnRole::Predictor)
            .map(|(i, _)| TextColumn {
                name: self.names[i].clone(),
                cells: raw.column(i).map(str::to_string).collect(),
            })
            .collect();

        LabeledTable::new(predictors, labels)
    }
}
