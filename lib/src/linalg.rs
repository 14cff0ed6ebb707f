//! Small dense linear-algebra helpers on top of `ndarray`.

use crate::preprocessing::error::PreprocessingError;
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2};

/// QR sweeps allowed before the eigen-solver gives up.
const MAX_EIGEN_ITER: usize = 10_000;

/// Sample covariance of the columns of an already-centered matrix.
pub fn covariance(centered: &Array2<f64>) -> Array2<f64> {
    let n = centered.nrows();
    let denom = if n > 1 { (n - 1) as f64 } else { 1.0 };
    centered.t().dot(centered) / denom
}

/// Eigen-decomposition of a symmetric matrix.
///
/// Returns `(values, vectors)` with eigenvalues in descending order and the
/// matching eigenvectors as columns of `vectors`.
///
/// # Errors
/// [`PreprocessingError::InvalidShape`] for non-square input,
/// [`PreprocessingError::NonFinite`] for non-finite entries and
/// [`PreprocessingError::NotConverged`] if the solver runs out of iterations.
pub fn symmetric_eigen(a: &Array2<f64>) -> Result<(Array1<f64>, Array2<f64>), PreprocessingError> {
    let (rows, cols) = a.dim();
    if rows != cols {
        return Err(PreprocessingError::InvalidShape {
            expected: "square matrix".to_string(),
            got: format!("{rows}x{cols}"),
        });
    }
    if a.iter().any(|v| !v.is_finite()) {
        return Err(PreprocessingError::NonFinite {
            stage: "symmetric_eigen",
        });
    }

    let n = rows;
    let matrix = DMatrix::from_row_slice(n, n, &a.iter().copied().collect::<Vec<f64>>());
    let eigen = SymmetricEigen::try_new(matrix, f64::EPSILON, MAX_EIGEN_ITER).ok_or(
        PreprocessingError::NotConverged {
            stage: "symmetric_eigen",
            iterations: MAX_EIGEN_ITER,
        },
    )?;

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| {
        eigen.eigenvalues[j]
            .total_cmp(&eigen.eigenvalues[i])
            .then(i.cmp(&j))
    });

    let values = Array1::from_iter(order.iter().map(|&i| eigen.eigenvalues[i]));
    let vectors = Array2::from_shape_fn((n, n), |(row, col)| eigen.eigenvectors[(row, order[col])]);
    Ok((values, vectors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rand_distr::{Distribution, Normal};

    #[test]
    fn test_diagonal_matrix() {
        let a = array![[1.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 2.0]];
        let (values, vectors) = symmetric_eigen(&a).unwrap();
        assert!((values[0] - 3.0).abs() < 1e-12);
        assert!((values[1] - 2.0).abs() < 1e-12);
        assert!((values[2] - 1.0).abs() < 1e-12);
        assert!((vectors[[1, 0]].abs() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_two_by_two() {
        // eigenvalues 3 and 1, eigenvectors (1, 1)/sqrt2 and (1, -1)/sqrt2
        let a = array![[2.0, 1.0], [1.0, 2.0]];
        let (values, vectors) = symmetric_eigen(&a).unwrap();
        assert!((values[0] - 3.0).abs() < 1e-10);
        assert!((values[1] - 1.0).abs() < 1e-10);
        let h = 1.0 / 2.0f64.sqrt();
        assert!((vectors[[0, 0]].abs() - h).abs() < 1e-10);
        assert!((vectors[[1, 0]].abs() - h).abs() < 1e-10);
        assert!((vectors[[0, 0]] - vectors[[1, 0]]).abs() < 1e-10);
    }

    #[test]
    fn test_reconstruction() {
        let a = array![
            [4.0, 1.0, -2.0, 0.5],
            [1.0, 3.0, 0.0, 1.5],
            [-2.0, 0.0, 5.0, -1.0],
            [0.5, 1.5, -1.0, 2.0]
        ];
        let (values, vectors) = symmetric_eigen(&a).unwrap();
        let rebuilt = vectors.dot(&Array2::from_diag(&values)).dot(&vectors.t());
        for (x, y) in a.iter().zip(rebuilt.iter()) {
            assert!((x - y).abs() < 1e-9, "{x} vs {y}");
        }
        // orthonormal columns
        let gram = vectors.t().dot(&vectors);
        for i in 0..4 {
            for j in 0..4 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((gram[[i, j]] - expected).abs() < 1e-9);
            }
        }
        for w in values.windows(2) {
            assert!(w[0] >= w[1]);
        }
    }

    #[test]
    fn test_low_rank_covariance() {
        // Covariance of 200 samples near a 5-dimensional subspace of R^30.
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let normal = Normal::new(0.0, 1.0).unwrap();
        let latent = Array2::from_shape_fn((200, 5), |_| normal.sample(&mut rng));
        let mixing = Array2::from_shape_fn((5, 30), |_| normal.sample(&mut rng));
        let noise = Array2::from_shape_fn((200, 30), |_| 0.01 * normal.sample(&mut rng));
        let data = latent.dot(&mixing) + noise;
        let centered = &data - &data.mean_axis(ndarray::Axis(0)).unwrap();
        let cov = covariance(&centered);

        let (values, vectors) = symmetric_eigen(&cov).unwrap();
        let rebuilt = vectors.dot(&Array2::from_diag(&values)).dot(&vectors.t());
        for (x, y) in cov.iter().zip(rebuilt.iter()) {
            assert!((x - y).abs() < 1e-8, "{x} vs {y}");
        }
        let gram = vectors.t().dot(&vectors);
        for ((i, j), g) in gram.indexed_iter() {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert!((g - expected).abs() < 1e-9);
        }
        for w in values.to_vec().windows(2) {
            assert!(w[0] >= w[1]);
        }
        let signal: f64 = values.iter().take(5).sum();
        assert!(signal / values.sum() > 0.999);
        assert!(values.iter().all(|v| *v > -1e-9));
    }

    #[test]
    fn test_rejects_non_finite() {
        let a = array![[1.0, f64::NAN], [f64::NAN, 1.0]];
        assert!(matches!(
            symmetric_eigen(&a),
            Err(PreprocessingError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_covariance() {
        let centered = array![[-1.0, -2.0], [0.0, 0.0], [1.0, 2.0]];
        let cov = covariance(&centered);
        assert!((cov[[0, 0]] - 1.0).abs() < 1e-12);
        assert!((cov[[0, 1]] - 2.0).abs() < 1e-12);
        assert!((cov[[1, 1]] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_non_square() {
        let a = Array2::<f64>::zeros((2, 3));
        assert!(symmetric_eigen(&a).is_err());
    }
}
