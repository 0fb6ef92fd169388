//! Sequential Minimal Optimization (SMO) solver implementation
//!
//! Solves the C-SVC dual
//!
//! ```text
//! min 0.5 * a^T Q a - e^T a   s.t.  y^T a = 0,  0 <= a_i <= C_i
//! ```
//!
//! with `Q_ij = y_i y_j K_ij` over a precomputed kernel matrix. Each step
//! optimizes the maximal violating pair (the steepest feasible direction)
//! and keeps the full gradient up to date, so the stopping rule is an
//! exact KKT gap test.

use crate::core::{CVError, Matrix, Result, SvmConfig};
use log::{debug, warn};

/// Smallest curvature used when the kernel is not positive definite on a pair
const TAU: f64 = 1e-12;

/// Result of optimization process
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Lagrange multipliers (alpha values)
    pub alpha: Vec<f64>,
    /// Offset of the decision function: f(x) = sum a_i y_i K(x_i, x) - rho
    pub rho: f64,
    /// Indices of support vectors (where alpha > 0)
    pub support_vectors: Vec<usize>,
    /// Number of pair updates performed
    pub iterations: usize,
    /// Final dual objective value: sum(a) - 0.5 * a^T Q a
    pub objective_value: f64,
}

/// SMO solver for the SVM dual problem
#[derive(Debug, Clone)]
pub struct SMOSolver {
    tolerance: f64,
    max_iterations: usize,
}

impl SMOSolver {
    /// Create a new SMO solver with the given stopping tolerance and iteration cap
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
        }
    }

    pub fn from_config(config: &SvmConfig) -> Self {
        Self::new(config.tolerance, config.max_iterations)
    }

    /// Solve the SVM optimization problem
    ///
    /// `kernel` is the n x n training kernel, `y` holds +1/-1 labels and
    /// `upper` the per-sample box constraint C_i.
    pub fn solve(&self, kernel: &Matrix, y: &[f64], upper: &[f64]) -> Result<OptimizationResult> {
        let n = y.len();
        if n == 0 {
            return Err(CVError::EmptyDataset);
        }
        if kernel.rows() != n || kernel.cols() != n {
            return Err(CVError::DimensionMismatch {
                expected: n,
                actual: kernel.rows(),
            });
        }
        if upper.len() != n {
            return Err(CVError::DimensionMismatch {
                expected: n,
                actual: upper.len(),
            });
        }

        // Validate labels are binary (-1 or +1)
        for &label in y {
            if label != 1.0 && label != -1.0 {
                return Err(CVError::InvalidLabel(label));
            }
        }

        let n_positive = y.iter().filter(|&&l| l > 0.0).count();
        if n_positive == 0 || n_positive == n {
            return Err(CVError::training(format!(
                "training data contains a single class ({n} samples)"
            )));
        }

        if let Some(bad) = upper.iter().find(|c| !c.is_finite() || **c <= 0.0) {
            return Err(CVError::Configuration(format!(
                "box constraint must be positive, got {bad}"
            )));
        }

        // Initially alpha = 0, so the gradient of the dual objective is -e
        let mut alpha = vec![0.0; n];
        let mut gradient = vec![-1.0; n];
        let mut iterations = 0;

        while let Some((i, j)) = self.select_working_set(&alpha, &gradient, y, upper) {
            if iterations >= self.max_iterations {
                warn!(
                    "SMO reached the iteration limit ({}) before converging",
                    self.max_iterations
                );
                break;
            }
            self.take_step(i, j, kernel, y, upper, &mut alpha, &mut gradient);
            iterations += 1;
        }

        debug!("SMO finished after {iterations} iterations on {n} samples");

        let rho = self.calculate_rho(&alpha, &gradient, y, upper);

        // Find support vectors (where alpha > 0)
        let support_vectors: Vec<usize> = alpha
            .iter()
            .enumerate()
            .filter_map(|(i, &a)| if a > 0.0 { Some(i) } else { None })
            .collect();

        let objective_value = self.calculate_objective(&alpha, &gradient);

        Ok(OptimizationResult {
            alpha,
            rho,
            support_vectors,
            iterations,
            objective_value,
        })
    }

    /// Pick the maximal violating pair, or `None` once the KKT gap is below tolerance
    ///
    /// i maximizes -y_t G_t over I_up, j minimizes it over I_low.
    fn select_working_set(
        &self,
        alpha: &[f64],
        gradient: &[f64],
        y: &[f64],
        upper: &[f64],
    ) -> Option<(usize, usize)> {
        let mut g_max = f64::NEG_INFINITY;
        let mut g_min = f64::INFINITY;
        let mut best_i = None;
        let mut best_j = None;

        for t in 0..y.len() {
            let value = -y[t] * gradient[t];
            let below_upper = alpha[t] < upper[t];
            let above_lower = alpha[t] > 0.0;

            let in_up = if y[t] > 0.0 { below_upper } else { above_lower };
            let in_low = if y[t] > 0.0 { above_lower } else { below_upper };

            if in_up && value > g_max {
                g_max = value;
                best_i = Some(t);
            }
            if in_low && value < g_min {
                g_min = value;
                best_j = Some(t);
            }
        }

        match (best_i, best_j) {
            (Some(i), Some(j)) if g_max - g_min >= self.tolerance && i != j => Some((i, j)),
            _ => None,
        }
    }

    /// Perform the analytic two-variable update for i and j
    #[allow(clippy::too_many_arguments)]
    fn take_step(
        &self,
        i: usize,
        j: usize,
        kernel: &Matrix,
        y: &[f64],
        upper: &[f64],
        alpha: &mut [f64],
        gradient: &mut [f64],
    ) {
        let c_i = upper[i];
        let c_j = upper[j];
        let alpha_i_old = alpha[i];
        let alpha_j_old = alpha[j];
        let k_ii = kernel.get(i, i);
        let k_jj = kernel.get(j, j);
        let k_ij = kernel.get(i, j);

        if y[i] != y[j] {
            // Different signs: alpha_i - alpha_j stays constant
            let mut quad = k_ii + k_jj - 2.0 * k_ij;
            if quad <= 0.0 {
                quad = TAU;
            }
            let delta = (-gradient[i] - gradient[j]) / quad;
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

            if diff > c_i - c_j {
                if alpha[i] > c_i {
                    alpha[i] = c_i;
                    alpha[j] = c_i - diff;
                }
            } else if alpha[j] > c_j {
                alpha[j] = c_j;
                alpha[i] = c_j + diff;
            }
        } else {
            // Same signs: alpha_i + alpha_j stays constant
            let mut quad = k_ii + k_jj - 2.0 * k_ij;
            if quad <= 0.0 {
                quad = TAU;
            }
            let delta = (gradient[i] - gradient[j]) / quad;
            let sum = alpha[i] + alpha[j];
            alpha[i] -= delta;
            alpha[j] += delta;

            if sum > c_i {
                if alpha[i] > c_i {
                    alpha[i] = c_i;
                    alpha[j] = sum - c_i;
                }
            } else if alpha[j] < 0.0 {
                alpha[j] = 0.0;
                alpha[i] = sum;
            }

            if sum > c_j {
                if alpha[j] > c_j {
                    alpha[j] = c_j;
                    alpha[i] = sum - c_j;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = sum;
            }
        }

        // G_k += Q_ki * d_alpha_i + Q_kj * d_alpha_j
        let delta_i = alpha[i] - alpha_i_old;
        let delta_j = alpha[j] - alpha_j_old;
        let row_i = kernel.row(i);
        let row_j = kernel.row(j);
        for k in 0..y.len() {
            gradient[k] += y[k] * (y[i] * row_i[k] * delta_i + y[j] * row_j[k] * delta_j);
        }
    }

    /// Offset from free support vectors, or the midpoint of the feasible
    /// interval when every multiplier sits at a bound
    fn calculate_rho(&self, alpha: &[f64], gradient: &[f64], y: &[f64], upper: &[f64]) -> f64 {
        let mut ub = f64::INFINITY;
        let mut lb = f64::NEG_INFINITY;
        let mut sum_free = 0.0;
        let mut n_free = 0usize;

        for t in 0..y.len() {
            let yg = y[t] * gradient[t];
            if alpha[t] >= upper[t] {
                if y[t] < 0.0 {
                    ub = ub.min(yg);
                } else {
                    lb = lb.max(yg);
                }
            } else if alpha[t] <= 0.0 {
                if y[t] > 0.0 {
                    ub = ub.min(yg);
                } else {
                    lb = lb.max(yg);
                }
            } else {
                n_free += 1;
                sum_free += yg;
            }
        }

        if n_free > 0 {
            sum_free / n_free as f64
        } else {
            (ub + lb) / 2.0
        }
    }

    /// sum(a) - 0.5 a^T Q a, using G = Q a - e
    fn calculate_objective(&self, alpha: &[f64], gradient: &[f64]) -> f64 {
        alpha
            .iter()
            .zip(gradient)
            .map(|(&a, &g)| 0.5 * a * (1.0 - g))
            .sum()
    }
}
