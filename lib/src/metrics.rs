//! Classification metrics on the evaluation subset.

use serde::Serialize;
use std::fmt;

/// `k x k` counts with rows = true class, columns = predicted class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    classes: Vec<String>,
    counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    /// Tally `predicted` against `truth`; both hold indices into `classes`.
    ///
    /// Pairs with an index outside `classes` are ignored.
    pub fn new(classes: Vec<String>, truth: &[usize], predicted: &[usize]) -> Self {
        let k = classes.len();
        let mut counts = vec![vec![0; k]; k];
        for (&t, &p) in truth.iter().zip(predicted) {
            if t < k && p < k {
                counts[t][p] += 1;
            }
        }
        Self { classes, counts }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn counts(&self) -> &[Vec<usize>] {
        &self.counts
    }

    pub fn get(&self, truth: usize, predicted: usize) -> usize {
        self.counts[truth][predicted]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        (0..self.classes.len()).map(|i| self.counts[i][i]).sum()
    }

    /// Rows per true class.
    pub fn row_totals(&self) -> Vec<usize> {
        self.counts.iter().map(|row| row.iter().sum()).collect()
    }

    /// Rows per predicted class.
    pub fn col_totals(&self) -> Vec<usize> {
        (0..self.classes.len())
            .map(|j| self.counts.iter().map(|row| row[j]).sum())
            .collect()
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.correct() as f64 / total as f64
    }

    /// `1 - correct / total`.
    pub fn error_rate(&self) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        1.0 - self.accuracy()
    }

    /// Sensitivity per class; `None` for classes absent from the truth.
    pub fn recall(&self) -> Vec<Option<f64>> {
        self.row_totals()
            .iter()
            .enumerate()
            .map(|(i, &n)| (n > 0).then(|| self.counts[i][i] as f64 / n as f64))
            .collect()
    }

    /// Positive predictive value per class; `None` for never-predicted classes.
    pub fn precision(&self) -> Vec<Option<f64>> {
        self.col_totals()
            .iter()
            .enumerate()
            .map(|(j, &n)| (n > 0).then(|| self.counts[j][j] as f64 / n as f64))
            .collect()
    }

    /// Cohen's kappa: agreement corrected for chance.
    pub fn kappa(&self) -> f64 {
        let total = self.total() as f64;
        if total == 0.0 {
            return 0.0;
        }
        let observed = self.correct() as f64 / total;
        let expected: f64 = self
            .row_totals()
            .iter()
            .zip(self.col_totals())
            .map(|(&r, c)| r as f64 * c as f64)
            .sum::<f64>()
            / (total * total);
        if (1.0 - expected).abs() < f64::EPSILON {
            return if observed >= 1.0 { 1.0 } else { 0.0 };
        }
        (observed - expected) / (1.0 - expected)
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .counts
            .iter()
            .flatten()
            .map(|c| c.to_string().len())
            .chain(self.classes.iter().map(String::len))
            .max()
            .unwrap_or(1)
            .max(5);
        let label_width = self.classes.iter().map(String::len).max().unwrap_or(0).max(10);

        writeln!(f, "{:>label_width$}  predicted", "")?;
        write!(f, "{:>label_width$}", "truth")?;
        for class in &self.classes {
            write!(f, " {class:>width$}")?;
        }
        writeln!(f)?;
        for (class, row) in self.classes.iter().zip(&self.counts) {
            write!(f, "{class:>label_width$}")?;
            for count in row {
                write!(f, " {count:>width$}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classes(k: usize) -> Vec<String> {
        ["A", "B", "C", "D", "E"][..k].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_orientation_rows_are_truth() {
        let cm = ConfusionMatrix::new(classes(2), &[0, 0, 0, 1], &[0, 1, 1, 1]);
        assert_eq!(cm.get(0, 1), 2);
        assert_eq!(cm.get(1, 0), 0);
        assert_eq!(cm.row_totals(), vec![3, 1]);
        assert_eq!(cm.col_totals(), vec![1, 3]);
    }

    #[test]
    fn test_error_rate() {
        let cm = ConfusionMatrix::new(classes(3), &[0, 1, 2, 2], &[0, 1, 2, 0]);
        assert_eq!(cm.total(), 4);
        assert!((cm.accuracy() - 0.75).abs() < 1e-12);
        assert!((cm.error_rate() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_recall_precision() {
        let cm = ConfusionMatrix::new(classes(3), &[0, 0, 1, 1], &[0, 1, 1, 1]);
        let recall = cm.recall();
        assert_eq!(recall[0], Some(0.5));
        assert_eq!(recall[1], Some(1.0));
        assert_eq!(recall[2], None);
        let precision = cm.precision();
        assert_eq!(precision[0], Some(1.0));
        assert!((precision[1].unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(precision[2], None);
    }

    #[test]
    fn test_kappa() {
        let perfect = ConfusionMatrix::new(classes(2), &[0, 1, 0, 1], &[0, 1, 0, 1]);
        assert!((perfect.kappa() - 1.0).abs() < 1e-12);

        // observed 0.5, expected 0.5
        let chance = ConfusionMatrix::new(classes(2), &[0, 0, 1, 1], &[0, 1, 0, 1]);
        assert!(chance.kappa().abs() < 1e-12);
    }

    #[test]
    fn test_empty() {
        let cm = ConfusionMatrix::new(classes(2), &[], &[]);
        assert_eq!(cm.total(), 0);
        assert_eq!(cm.error_rate(), 0.0);
        assert_eq!(cm.kappa(), 0.0);
    }

    #[test]
    fn test_display_lists_classes() {
        let cm = ConfusionMatrix::new(classes(2), &[0, 1], &[0, 0]);
        let text = cm.to_string();
        assert!(text.contains("truth"));
        assert!(text.lines().count() == 4);
        assert!(text.contains('A') && text.contains('B'));
    }
}
