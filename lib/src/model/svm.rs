//! Support vector classifier with a Gaussian (RBF) kernel.
//!
//! Binary machines are trained with sequential minimal optimization using
//! the maximal violating pair as working set; multiclass problems are handled
//! one-vs-one, with one machine per pair of classes present in the training
//! labels and majority voting at prediction time.
//!
//! The kernel is `k(x, z) = exp(-sigma * ||x - z||^2)`.

use crate::model::{argmax_lowest, check_training_data, Classifier, InferenceModel, ModelError};
use ndarray::{ArrayView1, ArrayView2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

/// Replacement for non-positive curvature in the two-variable subproblem.
const TAU: f64 = 1e-12;

/// Hyperparameters of an RBF support vector classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvcParams {
    /// Box constraint `C`.
    pub cost: f64,
    /// Inverse kernel width.
    pub sigma: f64,
    /// Stopping tolerance on the maximal KKT violation.
    pub tolerance: f64,
    /// SMO iteration cap per binary machine.
    pub max_iter: usize,
    /// Kernel rows kept in memory per binary machine.
    pub cache_rows: usize,
}

impl Default for SvcParams {
    fn default() -> Self {
        Self {
            cost: 1.0,
            sigma: 1.0,
            tolerance: 1e-3,
            max_iter: 1_000_000,
            cache_rows: 256,
        }
    }
}

impl SvcParams {
    fn validate(&self) -> Result<(), ModelError> {
        if !(self.cost > 0.0 && self.cost.is_finite()) {
            return Err(ModelError::InvalidParameter(format!(
                "cost must be positive, got {}",
                self.cost
            )));
        }
        if !(self.sigma > 0.0 && self.sigma.is_finite()) {
            return Err(ModelError::InvalidParameter(format!(
                "sigma must be positive, got {}",
                self.sigma
            )));
        }
        if !(self.tolerance > 0.0) {
            return Err(ModelError::InvalidParameter(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if self.max_iter == 0 || self.cache_rows == 0 {
            return Err(ModelError::InvalidParameter(
                "max_iter and cache_rows must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn rbf(a: ArrayView1<f64>, b: ArrayView1<f64>, sigma: f64) -> f64 {
    let d2: f64 = a.iter().zip(b.iter()).map(|(x, z)| (x - z) * (x - z)).sum();
    (-sigma * d2).exp()
}

/// FIFO cache of kernel rows over one binary subproblem.
struct KernelCache<'a> {
    x: ArrayView2<'a, f64>,
    rows: &'a [usize],
    sigma: f64,
    capacity: usize,
    cached: HashMap<usize, Rc<Vec<f64>>>,
    order: VecDeque<usize>,
}

impl<'a> KernelCache<'a> {
    fn new(x: ArrayView2<'a, f64>, rows: &'a [usize], sigma: f64, capacity: usize) -> Self {
        Self {
            x,
            rows,
            sigma,
            capacity,
            cached: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn row(&mut self, i: usize) -> Rc<Vec<f64>> {
        if let Some(row) = self.cached.get(&i) {
            return Rc::clone(row);
        }
        let xi = self.x.row(self.rows[i]);
        let row: Rc<Vec<f64>> = Rc::new(
            self.rows
                .iter()
                .map(|&t| rbf(xi, self.x.row(t), self.sigma))
                .collect(),
        );
        if self.order.len() >= self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.cached.remove(&evicted);
            }
        }
        self.order.push_back(i);
        self.cached.insert(i, Rc::clone(&row));
        row
    }
}

/// Outcome of one binary SMO run.
struct BinarySolution {
    alpha: Vec<f64>,
    rho: f64,
    iterations: usize,
    converged: bool,
}

/// Solve the C-SVC dual for labels `y` in {-1, +1}.
fn solve_binary(
    x: ArrayView2<f64>,
    rows: &[usize],
    y: &[f64],
    params: &SvcParams,
) -> BinarySolution {
    let n = rows.len();
    let c = params.cost;
    let mut cache = KernelCache::new(x.reborrow(), rows, params.sigma, params.cache_rows);
    let mut alpha = vec![0.0; n];
    let mut grad = vec![-1.0; n];

    let is_upper = |a: f64| a >= c;
    let is_lower = |a: f64| a <= 0.0;

    let mut iterations = 0;
    let mut converged = false;
    while iterations < params.max_iter {
        // i maximizes -y G over I_up
        let mut g_max = f64::NEG_INFINITY;
        let mut i_sel = None;
        for t in 0..n {
            let in_up = if y[t] > 0.0 { !is_upper(alpha[t]) } else { !is_lower(alpha[t]) };
            if in_up && -y[t] * grad[t] >= g_max {
                g_max = -y[t] * grad[t];
                i_sel = Some(t);
            }
        }
        let Some(i) = i_sel else {
            converged = true;
            break;
        };

        // j maximizes y G over I_low
        let mut g_max2 = f64::NEG_INFINITY;
        let mut j_sel = None;
        for t in 0..n {
            let in_low = if y[t] > 0.0 { !is_lower(alpha[t]) } else { !is_upper(alpha[t]) };
            if in_low && y[t] * grad[t] >= g_max2 {
                g_max2 = y[t] * grad[t];
                j_sel = Some(t);
            }
        }

        if g_max + g_max2 < params.tolerance {
            converged = true;
            break;
        }
        let Some(j) = j_sel else {
            converged = true;
            break;
        };
        iterations += 1;

        let k_i = cache.row(i);
        let k_j = cache.row(j);
        let (old_i, old_j) = (alpha[i], alpha[j]);
        let q_ij = y[i] * y[j] * k_i[j];

        if y[i] != y[j] {
            let quad = 2.0 + 2.0 * q_ij;
            let quad = if quad > 0.0 { quad } else { TAU };
            let delta = (-grad[i] - grad[j]) / quad;
            let diff = alpha[i] - alpha[j];
            alpha[i] += delta;
            alpha[j] += delta;
            if diff > 0.0 {
                if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = diff;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = -diff;
            }
            if diff > 0.0 {
                if alpha[i] > c {
                    alpha[i] = c;
                    alpha[j] = c - diff;
                }
            } else if alpha[j] > c {
                alpha[j] = c;
                alpha[i] = c + diff;
            }
        } else {
            let quad = 2.0 - 2.0 * q_ij;
            let quad = if quad > 0.0 { quad } else { TAU };
            let delta = (grad[i] - grad[j]) / quad;
            let sum = alpha[i] + alpha[j];
            alpha[i] -= delta;
            alpha[j] += delta;
            if sum > c {
                if alpha[i] > c {
                    alpha[i] = c;
                    alpha[j] = sum - c;
                }
            } else if alpha[j] < 0.0 {
                alpha[j] = 0.0;
                alpha[i] = sum;
            }
            if sum > c {
                if alpha[j] > c {
                    alpha[j] = c;
                    alpha[i] = sum - c;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = sum;
            }
        }

        let (d_i, d_j) = (alpha[i] - old_i, alpha[j] - old_j);
        for t in 0..n {
            grad[t] += y[t] * (y[i] * k_i[t] * d_i + y[j] * k_j[t] * d_j);
        }
    }

    // rho from free variables, or the midpoint of the feasible interval.
    let mut ub = f64::INFINITY;
    let mut lb = f64::NEG_INFINITY;
    let mut free = 0usize;
    let mut free_sum = 0.0;
    for t in 0..n {
        let yg = y[t] * grad[t];
        if is_upper(alpha[t]) {
            if y[t] < 0.0 {
                ub = ub.min(yg);
            } else {
                lb = lb.max(yg);
            }
        } else if is_lower(alpha[t]) {
            if y[t] > 0.0 {
                ub = ub.min(yg);
            } else {
                lb = lb.max(yg);
            }
        } else {
            free += 1;
            free_sum += yg;
        }
    }
    let rho = if free > 0 {
        free_sum / free as f64
    } else {
        (ub + lb) / 2.0
    };

    BinarySolution {
        alpha,
        rho,
        iterations,
        converged,
    }
}

/// One-vs-one machine separating `positive` (decision > 0) from `negative`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BinaryMachine {
    positive: usize,
    negative: usize,
    support_vectors: Vec<Vec<f64>>,
    /// `alpha_i * y_i` per support vector.
    coef: Vec<f64>,
    rho: f64,
}

impl BinaryMachine {
    fn decision(&self, row: ArrayView1<f64>, sigma: f64) -> f64 {
        let sum: f64 = self
            .support_vectors
            .iter()
            .zip(&self.coef)
            .map(|(sv, coef)| {
                let d2: f64 = sv.iter().zip(row.iter()).map(|(a, b)| (a - b) * (a - b)).sum();
                coef * (-sigma * d2).exp()
            })
            .sum();
        sum - self.rho
    }
}

/// Unfitted RBF support vector classifier.
#[derive(Debug, Clone, Default)]
pub struct Svc {
    params: SvcParams,
}

impl Svc {
    pub fn new(params: SvcParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SvcParams {
        &self.params
    }
}

impl Classifier for Svc {
    type Fitted = FittedSvc;

    fn fit(&self, x: ArrayView2<f64>, y: &[usize], n_classes: usize) -> Result<FittedSvc, ModelError> {
        check_training_data(x, y, n_classes)?;
        self.params.validate()?;

        let mut counts = vec![0usize; n_classes];
        for &label in y {
            counts[label] += 1;
        }
        let present: Vec<usize> = (0..n_classes).filter(|&c| counts[c] > 0).collect();
        let default_class = argmax_lowest(&counts);

        let pairs: Vec<(usize, usize)> = present
            .iter()
            .enumerate()
            .flat_map(|(k, &a)| present[k + 1..].iter().map(move |&b| (a, b)))
            .collect();

        let params = &self.params;
        let machines: Vec<BinaryMachine> = pairs
            .par_iter()
            .map(|&(a, b)| {
                let rows: Vec<usize> = (0..y.len()).filter(|&i| y[i] == a || y[i] == b).collect();
                let signs: Vec<f64> = rows
                    .iter()
                    .map(|&i| if y[i] == a { 1.0 } else { -1.0 })
                    .collect();
                let solution = solve_binary(x, &rows, &signs, params);
                if !solution.converged {
                    tracing::warn!(
                        positive = a,
                        negative = b,
                        iterations = solution.iterations,
                        "SMO reached the iteration limit before converging"
                    );
                }

                let mut support_vectors = Vec::new();
                let mut coef = Vec::new();
                for (k, &alpha) in solution.alpha.iter().enumerate() {
                    if alpha > 0.0 {
                        support_vectors.push(x.row(rows[k]).to_vec());
                        coef.push(alpha * signs[k]);
                    }
                }
                BinaryMachine {
                    positive: a,
                    negative: b,
                    support_vectors,
                    coef,
                    rho: solution.rho,
                }
            })
            .collect();

        let n_support: usize = machines.iter().map(|m| m.coef.len()).sum();
        tracing::debug!(
            cost = params.cost,
            sigma = params.sigma,
            machines = machines.len(),
            n_support,
            "fitted support vector classifier"
        );

        Ok(FittedSvc {
            params: self.params.clone(),
            n_classes,
            n_features: x.ncols(),
            default_class,
            machines,
        })
    }
}

/// Fitted one-vs-one RBF classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedSvc {
    params: SvcParams,
    n_classes: usize,
    n_features: usize,
    /// Answer when fewer than two classes were present in training.
    default_class: usize,
    machines: Vec<BinaryMachine>,
}

impl FittedSvc {
    pub fn params(&self) -> &SvcParams {
        &self.params
    }

    pub fn n_machines(&self) -> usize {
        self.machines.len()
    }

    /// Support vectors summed over all binary machines.
    pub fn n_support(&self) -> usize {
        self.machines.iter().map(|m| m.coef.len()).sum()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

impl InferenceModel for FittedSvc {
    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict(&self, row: ArrayView1<f64>) -> usize {
        if self.machines.is_empty() {
            return self.default_class;
        }
        let mut votes = vec![0u32; self.n_classes];
        for machine in &self.machines {
            let winner = if machine.decision(row, self.params.sigma) > 0.0 {
                machine.positive
            } else {
                machine.negative
            };
            votes[winner] += 1;
        }
        argmax_lowest(&votes)
    }

    fn predict_batch(&self, x: ArrayView2<f64>) -> Vec<usize> {
        (0..x.nrows())
            .into_par_iter()
            .map(|i| self.predict(x.row(i)))
            .collect()
    }
}

/// Linear-interpolation quantile of sorted data.
fn quantile(sorted: &[f64], p: f64) -> f64 {
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Data-driven kernel width.
///
/// Inverse squared distances `1 / ||x_a - x_b||^2` are collected over `n / 2`
/// random pairs of rows (coinciding pairs skipped); the estimate is the mean
/// of their 10th and 90th percentiles.
///
/// # Errors
/// [`ModelError::EmptyData`] with fewer than two rows or when every sampled
/// pair coincides.
pub fn estimate_sigma(x: ArrayView2<f64>, seed: u64) -> Result<f64, ModelError> {
    let n = x.nrows();
    if n < 2 {
        return Err(ModelError::EmptyData(format!(
            "sigma estimation needs at least 2 rows, got {n}"
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let pairs = (n / 2).max(1);
    let mut inverse: Vec<f64> = (0..pairs)
        .map(|_| {
            let a = rng.gen_range(0..n);
            let b = rng.gen_range(0..n);
            x.row(a)
                .iter()
                .zip(x.row(b).iter())
                .map(|(u, v)| (u - v) * (u - v))
                .sum::<f64>()
        })
        .filter(|d| *d > 0.0)
        .map(|d| 1.0 / d)
        .collect();

    if inverse.is_empty() {
        return Err(ModelError::EmptyData(
            "all sampled row pairs coincide".to_string(),
        ));
    }
    inverse.sort_by(f64::total_cmp);
    Ok((quantile(&inverse, 0.1) + quantile(&inverse, 0.9)) / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};
    use rand_distr::{Distribution, Normal};

    fn two_blobs(n: usize) -> (Array2<f64>, Vec<usize>) {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let noise = Normal::new(0.0, 0.3).unwrap();
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for i in 0..2 * n {
            let class = i % 2;
            let center = if class == 0 { -2.0 } else { 2.0 };
            data.push(center + noise.sample(&mut rng));
            data.push(noise.sample(&mut rng));
            labels.push(class);
        }
        (Array2::from_shape_vec((2 * n, 2), data).unwrap(), labels)
    }

    fn svc(cost: f64, sigma: f64) -> Svc {
        Svc::new(SvcParams {
            cost,
            sigma,
            ..SvcParams::default()
        })
    }

    #[test]
    fn test_binary_separable() {
        let (x, y) = two_blobs(20);
        let fitted = svc(1.0, 0.5).fit(x.view(), &y, 2).unwrap();
        assert_eq!(fitted.n_machines(), 1);
        assert_eq!(fitted.predict_batch(x.view()), y);
        assert_eq!(fitted.predict(array![-2.0, 0.0].view()), 0);
        assert_eq!(fitted.predict(array![2.0, 0.0].view()), 1);
        assert!(fitted.n_support() < y.len());
    }

    #[test]
    fn test_alpha_respects_box_and_equality() {
        let (x, y) = two_blobs(15);
        let rows: Vec<usize> = (0..y.len()).collect();
        let signs: Vec<f64> = y.iter().map(|&c| if c == 0 { 1.0 } else { -1.0 }).collect();
        let params = SvcParams {
            cost: 0.5,
            sigma: 0.5,
            ..SvcParams::default()
        };
        let solution = solve_binary(x.view(), &rows, &signs, &params);
        assert!(solution.converged);
        for &a in &solution.alpha {
            assert!((0.0..=0.5 + 1e-12).contains(&a));
        }
        let balance: f64 = solution.alpha.iter().zip(&signs).map(|(a, s)| a * s).sum();
        assert!(balance.abs() < 1e-9, "sum alpha_i y_i = {balance}");
    }

    #[test]
    fn test_solve_binary_on_row_subset() {
        // One-vs-one machines see only the rows of their two classes.
        let (x, y) = two_blobs(12);
        let params = SvcParams {
            cost: 1.0,
            sigma: 0.5,
            ..SvcParams::default()
        };
        let solution = {
            let rows: Vec<usize> = (0..y.len()).filter(|i| i % 3 != 0).collect();
            let signs: Vec<f64> = rows
                .iter()
                .map(|&i| if y[i] == 0 { 1.0 } else { -1.0 })
                .collect();
            solve_binary(x.view(), &rows, &signs, &params)
        };
        assert!(solution.converged);
        assert_eq!(solution.alpha.len(), 16);
        assert!(solution.alpha.iter().any(|&a| a > 0.0));
    }

    #[test]
    fn test_multiclass_one_vs_one() {
        let x = array![
            [0.0, 0.0],
            [0.2, 0.1],
            [0.1, 0.3],
            [5.0, 0.0],
            [5.2, 0.1],
            [4.9, 0.3],
            [0.0, 5.0],
            [0.3, 5.1],
            [0.1, 4.8]
        ];
        let y = [0, 0, 0, 1, 1, 1, 2, 2, 2];
        let fitted = svc(1.0, 0.5).fit(x.view(), &y, 3).unwrap();
        assert_eq!(fitted.n_machines(), 3);
        assert_eq!(fitted.predict_batch(x.view()), y.to_vec());
    }

    #[test]
    fn test_absent_class_gets_no_machine() {
        let (x, y) = two_blobs(5);
        // classes 0 and 1 present out of 4
        let fitted = svc(1.0, 0.5).fit(x.view(), &y, 4).unwrap();
        assert_eq!(fitted.n_machines(), 1);
        assert_eq!(fitted.n_classes(), 4);
    }

    #[test]
    fn test_single_class_predicts_it() {
        let x = array![[0.0], [1.0], [2.0]];
        let fitted = svc(1.0, 1.0).fit(x.view(), &[2, 2, 2], 3).unwrap();
        assert_eq!(fitted.n_machines(), 0);
        assert_eq!(fitted.predict(array![10.0].view()), 2);
    }

    #[test]
    fn test_invalid_params() {
        let (x, y) = two_blobs(3);
        assert!(svc(0.0, 1.0).fit(x.view(), &y, 2).is_err());
        assert!(svc(1.0, -1.0).fit(x.view(), &y, 2).is_err());
    }

    #[test]
    fn test_kernel_cache_evicts_oldest() {
        let x = array![[0.0], [1.0], [2.0]];
        let rows = [0, 1, 2];
        let mut cache = KernelCache::new(x.view(), &rows, 1.0, 2);
        let r0 = cache.row(0);
        assert!((r0[0] - 1.0).abs() < 1e-12);
        assert!((r0[1] - (-1.0f64).exp()).abs() < 1e-12);
        cache.row(1);
        cache.row(2);
        assert!(!cache.cached.contains_key(&0));
        assert_eq!(cache.order.len(), 2);
    }

    #[test]
    fn test_estimate_sigma() {
        let (x, _) = two_blobs(50);
        let sigma = estimate_sigma(x.view(), 3).unwrap();
        assert!(sigma.is_finite() && sigma > 0.0);
        assert_eq!(sigma, estimate_sigma(x.view(), 3).unwrap());

        let same = Array2::<f64>::ones((4, 2));
        assert!(estimate_sigma(same.view(), 3).is_err());
    }

    #[test]
    fn test_quantile() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((quantile(&v, 0.1) - 1.4).abs() < 1e-12);
        assert!((quantile(&v, 0.9) - 4.6).abs() < 1e-12);
        assert!((quantile(&[7.0], 0.5) - 7.0).abs() < 1e-12);
    }
}
