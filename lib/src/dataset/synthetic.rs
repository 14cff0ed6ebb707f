//! Synthetic activity-monitor tables with the real file's layout.
//!
//! Seven metadata columns, `n_predictors` Gaussian sensor columns whose mean
//! depends on the class, optional sparse summary-statistic columns that are
//! mostly blank or `#DIV/0!`, and a `classe` column with exact proportions.
//! Intended for smoke-tests and benchmarks, not for judging models.

use crate::dataset::{DatasetError, RawTable};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

const META_HEADERS: [&str; 7] = [
    "X",
    "user_name",
    "raw_timestamp_part_1",
    "raw_timestamp_part_2",
    "cvtd_timestamp",
    "new_window",
    "num_window",
];

const SUBJECTS: [&str; 6] = ["adelmo", "carlitos", "charles", "eurico", "jeremy", "pedro"];

/// Parameters of the generated table.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticConfig {
    pub n_rows: usize,
    pub n_predictors: usize,
    pub class_names: Vec<String>,
    /// Relative class sizes; normalized internally.
    pub class_proportions: Vec<f64>,
    /// Extra columns that are blank except on window-summary rows.
    pub sparse_columns: usize,
    /// Fraction of rows that are not window-summary rows.
    pub sparse_missing_fraction: f64,
    /// Scale of the class-dependent mean offsets.
    pub separation: f64,
    /// Standard deviation of the per-cell noise.
    pub noise: f64,
    pub label_column: String,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            n_rows: 1000,
            n_predictors: 50,
            class_names: ["A", "B", "C", "D", "E"].iter().map(|s| s.to_string()).collect(),
            class_proportions: vec![0.28, 0.19, 0.17, 0.16, 0.20],
            sparse_columns: 0,
            sparse_missing_fraction: 0.98,
            separation: 1.0,
            noise: 1.0,
            label_column: "classe".to_string(),
            seed: 2011,
        }
    }
}

impl SyntheticConfig {
    /// Exact per-class row counts (largest-remainder rounding).
    pub fn class_counts(&self) -> Vec<usize> {
        let total: f64 = self.class_proportions.iter().sum();
        let exact: Vec<f64> = self
            .class_proportions
            .iter()
            .map(|p| p / total * self.n_rows as f64)
            .collect();
        let mut counts: Vec<usize> = exact.iter().map(|e| e.floor() as usize).collect();
        let assigned: usize = counts.iter().sum();

        let mut by_remainder: Vec<usize> = (0..exact.len()).collect();
        by_remainder.sort_by(|&a, &b| {
            let ra = exact[a] - exact[a].floor();
            let rb = exact[b] - exact[b].floor();
            rb.total_cmp(&ra).then(a.cmp(&b))
        });
        for &i in by_remainder.iter().take(self.n_rows.saturating_sub(assigned)) {
            counts[i] += 1;
        }
        counts
    }

    /// Generate the table.
    ///
    /// # Errors
    /// [`DatasetError::EmptyData`] for zero rows, predictors or classes, and
    /// [`DatasetError::LengthMismatch`] if names and proportions disagree.
    pub fn generate(&self) -> Result<RawTable, DatasetError> {
        if self.n_rows == 0 || self.n_predictors == 0 || self.class_names.is_empty() {
            return Err(DatasetError::EmptyData(
                "synthetic table needs rows, predictors and classes".to_string(),
            ));
        }
        if self.class_names.len() != self.class_proportions.len() {
            return Err(DatasetError::LengthMismatch {
                column: "class_proportions".to_string(),
                expected: self.class_names.len(),
                got: self.class_proportions.len(),
            });
        }
        if self.class_proportions.iter().any(|p| !(*p > 0.0)) {
            return Err(DatasetError::EmptyData(
                "class proportions must be positive".to_string(),
            ));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let standard = Normal::new(0.0, 1.0).map_err(|e| DatasetError::EmptyData(e.to_string()))?;
        let noise =
            Normal::new(0.0, self.noise.max(0.0)).map_err(|e| DatasetError::EmptyData(e.to_string()))?;

        let mut classes: Vec<usize> = self
            .class_counts()
            .iter()
            .enumerate()
            .flat_map(|(c, &n)| std::iter::repeat(c).take(n))
            .collect();
        classes.shuffle(&mut rng);

        let offsets: Vec<Vec<f64>> = (0..self.class_names.len())
            .map(|_| {
                (0..self.n_predictors)
                    .map(|_| standard.sample(&mut rng) * self.separation)
                    .collect()
            })
            .collect();

        let mut headers: Vec<String> = META_HEADERS.iter().map(|s| s.to_string()).collect();
        headers.extend((0..self.n_predictors).map(|j| format!("sensor_{j}")));
        headers.extend((0..self.sparse_columns).map(|j| format!("kurtosis_sensor_{j}")));
        headers.push(self.label_column.clone());

        let rows = classes
            .iter()
            .enumerate()
            .map(|(row, &class)| {
                let summary_row = rng.gen::<f64>() >= self.sparse_missing_fraction;
                let mut cells = vec![
                    (row + 1).to_string(),
                    SUBJECTS[row % SUBJECTS.len()].to_string(),
                    (1_322_489_729 + row as u64).to_string(),
                    rng.gen_range(0..1_000_000u32).to_string(),
                    "28/11/2011 14:13".to_string(),
                    if summary_row { "yes" } else { "no" }.to_string(),
                    (row / 20).to_string(),
                ];
                for offset in &offsets[class] {
                    cells.push(format!("{:.5}", offset + noise.sample(&mut rng)));
                }
                for j in 0..self.sparse_columns {
                    cells.push(match (summary_row, (row + j) % 5) {
                        (false, _) => String::new(),
                        (true, 0) => "#DIV/0!".to_string(),
                        (true, _) => format!("{:.5}", standard.sample(&mut rng)),
                    });
                }
                cells.push(self.class_names[class].clone());
                cells
            })
            .collect();

        RawTable::new(headers, rows)
    }
}
