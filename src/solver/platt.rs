//! Platt scaling: map decision values to positive-class probabilities
//!
//! Fits `P(y = 1 | f) = 1 / (1 + exp(A f + B))` with the Newton method and
//! backtracking line search of Lin, Lin and Weng (2007), using Platt's
//! regularized targets instead of hard 0/1 labels.

use log::warn;
use serde::{Deserialize, Serialize};

const MAX_ITERATIONS: usize = 100;
const MIN_STEP: f64 = 1e-10;
/// Added to the Hessian diagonal so it stays positive definite
const SIGMA: f64 = 1e-12;
const EPS: f64 = 1e-5;

/// Fitted sigmoid coefficients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlattScaling {
    pub a: f64,
    pub b: f64,
}

impl PlattScaling {
    /// Fit A and B from decision values and +1/-1 labels
    pub fn fit(decision_values: &[f64], y: &[f64]) -> Self {
        let (a, b) = sigmoid_train(decision_values, y);
        Self { a, b }
    }

    /// Positive-class probability of a single decision value
    pub fn probability(&self, decision_value: f64) -> f64 {
        sigmoid_predict(decision_value, self.a, self.b)
    }
}

/// Newton fit of the sigmoid coefficients (A, B)
pub fn sigmoid_train(decision_values: &[f64], y: &[f64]) -> (f64, f64) {
    let prior1 = y.iter().filter(|&&l| l > 0.0).count() as f64;
    let prior0 = y.len() as f64 - prior1;

    let hi_target = (prior1 + 1.0) / (prior1 + 2.0);
    let lo_target = 1.0 / (prior0 + 2.0);
    let targets: Vec<f64> = y
        .iter()
        .map(|&l| if l > 0.0 { hi_target } else { lo_target })
        .collect();

    let mut a = 0.0;
    let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
    let mut fval = objective(decision_values, &targets, a, b);

    let mut iter = 0;
    while iter < MAX_ITERATIONS {
        // Gradient and Hessian of the negative log-likelihood
        let mut h11 = SIGMA;
        let mut h22 = SIGMA;
        let mut h21 = 0.0;
        let mut g1 = 0.0;
        let mut g2 = 0.0;
        for (&f, &t) in decision_values.iter().zip(&targets) {
            let f_ab = f * a + b;
            let (p, q) = if f_ab >= 0.0 {
                let e = (-f_ab).exp();
                (e / (1.0 + e), 1.0 / (1.0 + e))
            } else {
                let e = f_ab.exp();
                (1.0 / (1.0 + e), e / (1.0 + e))
            };
            let d2 = p * q;
            h11 += f * f * d2;
            h22 += d2;
            h21 += f * d2;
            let d1 = t - p;
            g1 += f * d1;
            g2 += d1;
        }

        if g1.abs() < EPS && g2.abs() < EPS {
            break;
        }

        // Newton direction: -H^-1 g
        let det = h11 * h22 - h21 * h21;
        let d_a = -(h22 * g1 - h21 * g2) / det;
        let d_b = -(-h21 * g1 + h11 * g2) / det;
        let gd = g1 * d_a + g2 * d_b;

        let mut step = 1.0;
        while step >= MIN_STEP {
            let new_a = a + step * d_a;
            let new_b = b + step * d_b;
            let new_f = objective(decision_values, &targets, new_a, new_b);
            if new_f < fval + 0.0001 * step * gd {
                a = new_a;
                b = new_b;
                fval = new_f;
                break;
            }
            step /= 2.0;
        }

        if step < MIN_STEP {
            warn!("Platt scaling line search failed to make progress");
            break;
        }
        iter += 1;
    }

    if iter >= MAX_ITERATIONS {
        warn!("Platt scaling reached the iteration limit ({MAX_ITERATIONS})");
    }

    (a, b)
}

/// Numerically stable 1 / (1 + exp(A f + B))
pub fn sigmoid_predict(decision_value: f64, a: f64, b: f64) -> f64 {
    let f_ab = decision_value * a + b;
    if f_ab >= 0.0 {
        let e = (-f_ab).exp();
        e / (1.0 + e)
    } else {
        1.0 / (1.0 + f_ab.exp())
    }
}

fn objective(decision_values: &[f64], targets: &[f64], a: f64, b: f64) -> f64 {
    decision_values
        .iter()
        .zip(targets)
        .map(|(&f, &t)| {
            let f_ab = f * a + b;
            if f_ab >= 0.0 {
                t * f_ab + (1.0 + (-f_ab).exp()).ln()
            } else {
                (t - 1.0) * f_ab + (1.0 + f_ab.exp()).ln()
            }
        })
        .sum()
}
