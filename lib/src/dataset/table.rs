//! In-memory table types.

use crate::dataset::DatasetError;
use crate::preprocessing::PreprocessingError;
use ndarray::Array2;

/// Header plus text rows, exactly as read.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Build a table, rejecting rows whose width differs from the header.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, DatasetError> {
        let expected = headers.len();
        if let Some((row, record)) = rows
            .iter()
            .enumerate()
            .find(|(_, record)| record.len() != expected)
        {
            return Err(DatasetError::RaggedRow {
                row,
                expected,
                got: record.len(),
            });
        }
        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the column with exactly this name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cells of one column, top to bottom.
    pub fn column(&self, index: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(move |row| row[index].as_str())
    }
}

/// A named column of text cells.
#[derive(Debug, Clone, PartialEq)]
pub struct TextColumn {
    pub name: String,
    pub cells: Vec<String>,
}

/// Predictor columns (text) and the label column after metadata pruning.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledTable {
    predictors: Vec<TextColumn>,
    labels: Vec<String>,
}

impl LabeledTable {
    pub fn new(predictors: Vec<TextColumn>, labels: Vec<String>) -> Result<Self, DatasetError> {
        let expected = labels.len();
        for column in &predictors {
            if column.cells.len() != expected {
                return Err(DatasetError::LengthMismatch {
                    column: column.name.clone(),
                    expected,
                    got: column.cells.len(),
                });
            }
        }
        Ok(Self { predictors, labels })
    }

    pub fn n_rows(&self) -> usize {
        self.labels.len()
    }

    pub fn n_predictors(&self) -> usize {
        self.predictors.len()
    }

    pub fn predictors(&self) -> &[TextColumn] {
        &self.predictors
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn predictor_names(&self) -> Vec<&str> {
        self.predictors.iter().map(|c| c.name.as_str()).collect()
    }

    /// New table holding only the given rows, in the given order.
    ///
    /// # Panics
    /// Panics if an index is out of bounds.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        let predictors = self
            .predictors
            .iter()
            .map(|column| TextColumn {
                name: column.name.clone(),
                cells: indices.iter().map(|&i| column.cells[i].clone()).collect(),
            })
            .collect();
        let labels = indices.iter().map(|&i| self.labels[i].clone()).collect();
        Self { predictors, labels }
    }
}

/// Named numeric columns where `None` marks a missing value.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericTable {
    names: Vec<String>,
    columns: Vec<Vec<Option<f64>>>,
    n_rows: usize,
}

impl NumericTable {
    pub fn new(
        names: Vec<String>,
        columns: Vec<Vec<Option<f64>>>,
    ) -> Result<Self, PreprocessingError> {
        if names.len() != columns.len() {
            return Err(PreprocessingError::InvalidShape {
                expected: format!("{} columns", names.len()),
                got: format!("{} columns", columns.len()),
            });
        }
        let n_rows = columns.first().map_or(0, Vec::len);
        for (name, column) in names.iter().zip(&columns) {
            if column.len() != n_rows {
                return Err(PreprocessingError::InvalidShape {
                    expected: format!("{n_rows} rows"),
                    got: format!("{} rows in '{name}'", column.len()),
                });
            }
        }
        Ok(Self {
            names,
            columns,
            n_rows,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn columns(&self) -> &[Vec<Option<f64>>] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn missing_count(&self, column: usize) -> usize {
        self.columns[column].iter().filter(|v| v.is_none()).count()
    }

    /// Fraction of missing cells in a column; 0 for an empty table.
    pub fn missing_fraction(&self, column: usize) -> f64 {
        if self.n_rows == 0 {
            return 0.0;
        }
        self.missing_count(column) as f64 / self.n_rows as f64
    }

    /// New table holding only the given columns, in the given order.
    pub fn select_columns(&self, indices: &[usize]) -> Self {
        Self {
            names: indices.iter().map(|&i| self.names[i].clone()).collect(),
            columns: indices.iter().map(|&i| self.columns[i].clone()).collect(),
            n_rows: self.n_rows,
        }
    }

    /// Dense `(n_rows, n_cols)` matrix.
    ///
    /// This is the completeness gate in front of scaling and PCA: no
    /// imputation happens here.
    ///
    /// # Errors
    /// [`PreprocessingError::MissingValues`] naming the first column that
    /// still holds a missing value.
    pub fn to_dense(&self) -> Result<Array2<f64>, PreprocessingError> {
        for (i, name) in self.names.iter().enumerate() {
            let count = self.missing_count(i);
            if count > 0 {
                return Err(PreprocessingError::MissingValues {
                    column: name.clone(),
                    count,
                });
            }
        }
        Ok(Array2::from_shape_fn((self.n_rows, self.n_cols()), |(r, c)| {
            self.columns[c][r].unwrap_or(f64::NAN)
        }))
    }
}
