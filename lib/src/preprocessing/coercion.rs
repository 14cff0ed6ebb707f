//! Text-to-number coercion of predictor columns.
//!
//! Many sensor columns arrive as text because a few cells hold spreadsheet
//! artifacts such as `#DIV/0!`. Coercion never fails: any cell that is not
//! a finite number becomes a missing value and is counted.

use crate::dataset::{LabeledTable, NumericTable};
use crate::preprocessing::error::PreprocessingError;
use serde::Serialize;

/// Per-column count of non-empty cells that could not be read as numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoercionSummary {
    /// `(column, failures)` for columns with at least one failure.
    pub failures: Vec<(String, usize)>,
    /// Cells that were blank or `NA` to begin with.
    pub blank_cells: usize,
}

impl CoercionSummary {
    pub fn total_failures(&self) -> usize {
        self.failures.iter().map(|(_, n)| n).sum()
    }

    /// Fold another subset's counts into this one, column by column.
    pub fn merge(&mut self, other: &CoercionSummary) {
        self.blank_cells += other.blank_cells;
        for (column, count) in &other.failures {
            match self.failures.iter_mut().find(|(name, _)| name == column) {
                Some((_, total)) => *total += count,
                None => self.failures.push((column.clone(), *count)),
            }
        }
    }
}

/// Outcome of reading one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Cell {
    Value(f64),
    Blank,
    Unreadable,
}

fn read_cell(raw: &str) -> Cell {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "NA" {
        return Cell::Blank;
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Cell::Value(v),
        _ => Cell::Unreadable,
    }
}

/// Parse one cell as a finite number; anything else is `None`.
pub fn parse_cell(raw: &str) -> Option<f64> {
    match read_cell(raw) {
        Cell::Value(v) => Some(v),
        Cell::Blank | Cell::Unreadable => None,
    }
}

/// Stateless converter from [`LabeledTable`] predictors to a [`NumericTable`].
///
/// Labels are not touched; they are encoded separately by the
/// [`LabelEncoder`](crate::preprocessing::LabelEncoder).
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeNormalizer;

impl TypeNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Coerce every predictor column.
    pub fn normalize(
        &self,
        table: &LabeledTable,
    ) -> Result<(NumericTable, CoercionSummary), PreprocessingError> {
        let mut summary = CoercionSummary::default();
        let mut names = Vec::with_capacity(table.n_predictors());
        let mut columns = Vec::with_capacity(table.n_predictors());

        for column in table.predictors() {
            let mut failures = 0usize;
            let values: Vec<Option<f64>> = column
                .cells
                .iter()
                .map(|cell| match read_cell(cell) {
                    Cell::Value(v) => Some(v),
                    Cell::Blank => {
                        summary.blank_cells += 1;
                        None
                    }
                    Cell::Unreadable => {
                        failures += 1;
                        None
                    }
                })
                .collect();
            if failures > 0 {
                tracing::debug!(column = %column.name, failures, "coerced unreadable cells to missing");
                summary.failures.push((column.name.clone(), failures));
            }
            names.push(column.name.clone());
            columns.push(values);
        }

        Ok((NumericTable::new(names, columns)?, summary))
    }
}
