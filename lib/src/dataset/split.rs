//! Stratified train/evaluation partitioning.

use crate::dataset::DatasetError;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// Disjoint training and evaluation row indices, both sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    train: Vec<usize>,
    eval: Vec<usize>,
}

impl Partition {
    pub fn train(&self) -> &[usize] {
        &self.train
    }

    pub fn eval(&self) -> &[usize] {
        &self.eval
    }

    /// Total number of rows covered.
    pub fn len(&self) -> usize {
        self.train.len() + self.eval.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Stratified random split keyed on the label.
///
/// Each label stratum is shuffled with a seeded ChaCha8 generator and its
/// first `round(train_fraction * stratum_len)` rows go to training. Strata
/// are visited in label order, so a fixed seed always yields the same
/// partition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StratifiedSplit {
    train_fraction: f64,
    seed: u64,
}

impl StratifiedSplit {
    /// # Errors
    /// [`DatasetError::InvalidSplit`] unless `0 < train_fraction < 1`.
    pub fn new(train_fraction: f64, seed: u64) -> Result<Self, DatasetError> {
        if !(train_fraction > 0.0 && train_fraction < 1.0) {
            return Err(DatasetError::InvalidSplit(format!(
                "train fraction must lie in (0, 1), got {train_fraction}"
            )));
        }
        Ok(Self {
            train_fraction,
            seed,
        })
    }

    pub fn train_fraction(&self) -> f64 {
        self.train_fraction
    }

    /// Partition row indices `0..labels.len()`.
    pub fn split<L: Ord>(&self, labels: &[L]) -> Result<Partition, DatasetError> {
        if labels.is_empty() {
            return Err(DatasetError::EmptyData(
                "Cannot split an empty label column".to_string(),
            ));
        }

        let mut strata: BTreeMap<&L, Vec<usize>> = BTreeMap::new();
        for (i, label) in labels.iter().enumerate() {
            strata.entry(label).or_default().push(i);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut train = Vec::new();
        let mut eval = Vec::new();

        for (_, mut rows) in strata {
            rows.shuffle(&mut rng);
            let n_train = (self.train_fraction * rows.len() as f64).round() as usize;
            let (head, tail) = rows.split_at(n_train.min(rows.len()));
            train.extend_from_slice(head);
            eval.extend_from_slice(tail);
        }

        train.sort_unstable();
        eval.sort_unstable();
        Ok(Partition { train, eval })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels_with_counts(counts: &[(char, usize)]) -> Vec<char> {
        let mut labels: Vec<char> = counts
            .iter()
            .flat_map(|&(c, n)| std::iter::repeat(c).take(n))
            .collect();
        // Interleave so strata are not contiguous blocks.
        labels.shuffle(&mut ChaCha8Rng::seed_from_u64(99));
        labels
    }

    fn proportions(labels: &[char], rows: &[usize]) -> BTreeMap<char, f64> {
        let mut counts = BTreeMap::new();
        for &r in rows {
            *counts.entry(labels[r]).or_insert(0usize) += 1;
        }
        counts
            .into_iter()
            .map(|(k, v)| (k, v as f64 / rows.len() as f64))
            .collect()
    }

    #[test]
    fn test_rejects_bad_fraction() {
        assert!(StratifiedSplit::new(0.0, 1).is_err());
        assert!(StratifiedSplit::new(1.0, 1).is_err());
        assert!(StratifiedSplit::new(f64::NAN, 1).is_err());
        assert!(StratifiedSplit::new(0.75, 1).is_ok());
    }

    #[test]
    fn test_split_is_deterministic() {
        let labels = labels_with_counts(&[('A', 40), ('B', 33), ('C', 27)]);
        let split = StratifiedSplit::new(0.75, 42).unwrap();
        assert_eq!(split.split(&labels).unwrap(), split.split(&labels).unwrap());

        let other = StratifiedSplit::new(0.75, 43).unwrap();
        assert_ne!(split.split(&labels).unwrap(), other.split(&labels).unwrap());
    }

    #[test]
    fn test_split_is_disjoint_and_complete() {
        let labels = labels_with_counts(&[('A', 13), ('B', 7), ('C', 1)]);
        let partition = StratifiedSplit::new(0.75, 7).unwrap().split(&labels).unwrap();
        let mut all: Vec<usize> = partition
            .train()
            .iter()
            .chain(partition.eval())
            .copied()
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..labels.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_rounds_per_stratum() {
        // round(0.75 * 10) = 8 (7.5 rounds up), round(0.75 * 6) = 5 (4.5 rounds up)
        let labels = labels_with_counts(&[('A', 10), ('B', 6)]);
        let partition = StratifiedSplit::new(0.75, 3).unwrap().split(&labels).unwrap();
        assert_eq!(partition.train().len(), 13);
        assert_eq!(partition.eval().len(), 3);
    }

    #[test]
    fn test_split_preserves_proportions() {
        let labels = labels_with_counts(&[
            ('A', 280),
            ('B', 190),
            ('C', 170),
            ('D', 160),
            ('E', 200),
        ]);
        let partition = StratifiedSplit::new(0.75, 3433).unwrap().split(&labels).unwrap();
        let everything: Vec<usize> = (0..labels.len()).collect();
        let full = proportions(&labels, &everything);
        let train = proportions(&labels, partition.train());
        let eval = proportions(&labels, partition.eval());

        for (class, p) in &full {
            assert!((train[class] - p).abs() <= 0.02, "train {class}");
            assert!((eval[class] - p).abs() <= 0.02, "eval {class}");
        }
    }

    #[test]
    fn test_split_empty_labels() {
        let labels: Vec<char> = Vec::new();
        assert!(StratifiedSplit::new(0.5, 1).unwrap().split(&labels).is_err());
    }
}
